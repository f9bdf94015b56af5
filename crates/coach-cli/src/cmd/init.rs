use crate::output::print_json;
use anyhow::Context;
use coach_core::{config::CoachConfig, paths, Store};
use std::path::Path;

pub fn run(root: &Path, name: Option<&str>, product: Option<&str>, json: bool) -> anyhow::Result<()> {
    let existing = paths::config_path(root).exists();
    let config = if existing {
        CoachConfig::load(root).context("failed to load existing config")?
    } else {
        let tenant = name.map(str::to_string).unwrap_or_else(|| {
            root.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "coach".to_string())
        });
        let mut config = CoachConfig::new(tenant);
        if let Some(product) = product {
            config.tenant.product_id = product.to_string();
        }
        config.save(root).context("failed to write config")?;
        config
    };

    let exports = paths::exports_dir(root);
    std::fs::create_dir_all(&exports)
        .with_context(|| format!("failed to create {}", exports.display()))?;

    let db = config.database_path(root);
    Store::open(&db).with_context(|| format!("failed to create {}", db.display()))?;

    if json {
        print_json(&serde_json::json!({
            "root": root,
            "tenant": config.tenant.name,
            "product_id": config.tenant.product_id,
            "database": db,
            "created": !existing,
        }))?;
    } else if existing {
        println!("Workspace already initialized in {}", root.display());
    } else {
        println!("Initialized coach workspace '{}' in {}", config.tenant.name, root.display());
        println!("  config:   {}", paths::config_path(root).display());
        println!("  database: {}", db.display());
    }
    Ok(())
}
