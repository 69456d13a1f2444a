//! `tiller init` — write the default configuration file.

use std::path::{Path, PathBuf};

use tiller_config::AppConfig;

pub fn run(path: Option<PathBuf>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = super::config_path(path);
    if write_default(&path, force)? {
        println!("Created {}", path.display());
        println!("Set the API key variables named by `api_key_env`, then run `tiller`.");
    } else {
        println!("Config already exists at {}", path.display());
        println!("Edit it manually, or re-run with --force to overwrite it.");
    }
    Ok(())
}

/// Returns false when the file exists and `force` is not set.
fn write_default(path: &Path, force: bool) -> std::io::Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, AppConfig::default_toml())?;
    Ok(true)
}
