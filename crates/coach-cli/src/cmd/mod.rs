pub mod assign;
pub mod config;
pub mod group;
pub mod init;
pub mod lesson;
pub mod protocol;
pub mod serve;
pub mod user;

use anyhow::Context;
use coach_core::config::CoachConfig;
use coach_core::types::Actor;
use coach_core::Store;
use std::path::Path;

/// An initialized workspace opened for one command.
pub struct Workspace {
    pub config: CoachConfig,
    pub store: Store,
    pub actor: Actor,
}

impl Workspace {
    pub fn open(root: &Path, user: &str) -> anyhow::Result<Self> {
        let config = CoachConfig::load(root).context("failed to load config")?;
        let db = config.database_path(root);
        let store = Store::open(&db).with_context(|| format!("failed to open {}", db.display()))?;
        let actor = Actor::new(user, config.tenant.product_id.clone());
        Ok(Self {
            config,
            store,
            actor,
        })
    }
}

/// Dates are compared in UTC.
pub fn today() -> chrono::NaiveDate {
    chrono::Utc::now().date_naive()
}
