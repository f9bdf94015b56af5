pub mod assignments;
pub mod chat;
pub mod groups;
pub mod health;
pub mod lessons;
pub mod progress;
pub mod protocols;
pub mod users;

use crate::error::AppError;

/// Run a blocking store call off the async executor.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> coach_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))?;
    Ok(result?)
}

/// Dates are compared in UTC.
pub(crate) fn today() -> chrono::NaiveDate {
    chrono::Utc::now().date_naive()
}
