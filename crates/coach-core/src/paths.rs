use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const COACH_DIR: &str = ".coach";
pub const CONFIG_FILE: &str = ".coach/config.yaml";
pub const DEFAULT_DB_FILE: &str = ".coach/coach.sqlite3";
pub const EXPORTS_DIR: &str = ".coach/exports";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn coach_dir(root: &Path) -> PathBuf {
    root.join(COACH_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn exports_dir(root: &Path) -> PathBuf {
    root.join(EXPORTS_DIR)
}

/// Resolve a configured database path; relative paths are taken from `root`.
pub fn database_path(root: &Path, configured: &Path) -> PathBuf {
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        root.join(configured)
    }
}
