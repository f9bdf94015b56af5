use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use coach_agent::{FunctionsClient, WebhookClient};
use coach_core::config::CoachConfig;
use coach_core::types::Actor;
use coach_core::Store;

pub const USER_HEADER: &str = "x-coach-user";
pub const PRODUCT_HEADER: &str = "x-coach-product";
const FALLBACK_USER: &str = "operator";

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub root: PathBuf,
    pub config: Arc<CoachConfig>,
    pub store: Arc<Store>,
    /// `None` when no webhook is configured; chat requests then get 503.
    pub chat: Option<WebhookClient>,
    /// Group changes are mirrored here when `agent.functions_url` is set.
    pub functions: Option<FunctionsClient>,
}

impl AppState {
    pub fn new(root: PathBuf, config: CoachConfig, store: Store) -> anyhow::Result<Self> {
        let chat = match &config.agent.webhook_url {
            Some(url) => Some(WebhookClient::new(
                url.clone(),
                config.agent.default_agent.clone(),
                Duration::from_secs(config.agent.timeout_secs),
            )?),
            None => None,
        };
        let functions = match &config.agent.functions_url {
            Some(url) => Some(FunctionsClient::new(
                url.clone(),
                Duration::from_secs(config.agent.timeout_secs),
            )?),
            None => None,
        };
        Ok(Self {
            root,
            config: Arc::new(config),
            store: Arc::new(store),
            chat,
            functions,
        })
    }

    /// Load `.coach/config.yaml` under `root` and open its database.
    pub fn load(root: PathBuf) -> anyhow::Result<Self> {
        let config = CoachConfig::load(&root)?;
        let store = Store::open(&config.database_path(&root))?;
        Self::new(root, config, store)
    }
}

/// The acting user and product for a request, read from the
/// `x-coach-user` / `x-coach-product` headers. Missing headers fall back to
/// the configured tenant product and the `operator` user.
#[derive(Debug, Clone)]
pub struct RequestActor(pub Actor);

impl FromRequestParts<AppState> for RequestActor {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let user = header(USER_HEADER).unwrap_or_else(|| FALLBACK_USER.to_string());
        let product = header(PRODUCT_HEADER).unwrap_or_else(|| state.config.tenant.product_id.clone());
        Ok(RequestActor(Actor::new(user, product)))
    }
}
