use crate::error::{CoachError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// TenantConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConfig {
    pub name: String,
    /// Product line every operation is scoped to unless the caller says otherwise.
    #[serde(default = "default_product")]
    pub product_id: String,
}

fn default_product() -> String {
    "default".to_string()
}

// ---------------------------------------------------------------------------
// DatabaseConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from(paths::DEFAULT_DB_FILE)
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    3151
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// AgentConfig
// ---------------------------------------------------------------------------

/// Endpoints for the chat workflow webhook and the serverless function boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub functions_url: Option<String>,
    #[serde(default = "default_agent")]
    pub default_agent: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_agent() -> String {
    "coach".to_string()
}

fn default_timeout() -> u64 {
    30
}

// ---------------------------------------------------------------------------
// CoachConfig (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoachConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    pub tenant: TenantConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

fn default_version() -> u32 {
    1
}

impl CoachConfig {
    pub fn new(tenant_name: impl Into<String>) -> Self {
        Self {
            version: 1,
            tenant: TenantConfig {
                name: tenant_name.into(),
                product_id: default_product(),
            },
            database: DatabaseConfig::default(),
            server: ServerConfig::default(),
            agent: AgentConfig {
                webhook_url: None,
                functions_url: None,
                default_agent: default_agent(),
                timeout_secs: default_timeout(),
            },
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(CoachError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: CoachConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn database_path(&self, root: &Path) -> PathBuf {
        paths::database_path(root, &self.database.path)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.tenant.product_id.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "tenant.product_id is empty".to_string(),
            });
        }

        for (key, url) in [
            ("agent.webhook_url", &self.agent.webhook_url),
            ("agent.functions_url", &self.agent.functions_url),
        ] {
            if let Some(url) = url {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Error,
                        message: format!("{key} '{url}' is not an http(s) URL"),
                    });
                }
            }
        }

        if self.agent.webhook_url.is_none() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "agent.webhook_url is not set; chat is disabled".to_string(),
            });
        }

        if self.agent.timeout_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "agent.timeout_secs is 0; requests will time out immediately"
                    .to_string(),
            });
        }

        if self.server.port == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "server.port is 0; the OS will pick a port on each start".to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
