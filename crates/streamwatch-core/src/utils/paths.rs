use std::fs;
use std::path::PathBuf;

const DATA_DIR: &str = ".streamwatch";
const DB_FILE: &str = "streamwatch.db";
const CONFIG_FILE: &str = "config.yaml";

/// Get data directory path.
///
/// Priority:
/// 1. `STREAMWATCH_DATA_DIR` environment variable (for container deployments)
/// 2. `~/.streamwatch`
pub fn get_data_dir() -> Result<PathBuf, String> {
    let data_dir = if let Ok(custom_dir) = std::env::var("STREAMWATCH_DATA_DIR") {
        PathBuf::from(custom_dir)
    } else {
        let home = dirs::home_dir().ok_or("Cannot determine home directory")?;
        home.join(DATA_DIR)
    };

    if !data_dir.exists() {
        fs::create_dir_all(&data_dir)
            .map_err(|e| format!("Failed to create data directory: {}", e))?;
    }

    Ok(data_dir)
}

pub fn get_db_path() -> Result<PathBuf, String> {
    Ok(get_data_dir()?.join(DB_FILE))
}

pub fn get_default_config_path() -> Result<PathBuf, String> {
    Ok(get_data_dir()?.join(CONFIG_FILE))
}

pub fn get_log_dir() -> Result<PathBuf, String> {
    Ok(get_data_dir()?.join("logs"))
}
