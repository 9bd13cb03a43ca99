use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration file used when neither `--config` nor `POLAGENT_CONFIG`
/// is given
pub const DEFAULT_CONFIG_FILE: &str = "polagent.yaml";

/// Load a `.env` file from the current directory, if there is one.
/// Variables already set in the environment win.
pub fn load_dotenv() {
    if let Ok(dir) = env::current_dir() {
        let env_file = dir.join(".env");
        if env_file.exists() {
            dotenv::from_path(&env_file).ok();
        }
    }
}

/// Resolve the agent configuration path against the current directory
pub fn config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    let base = env::current_dir().context("Failed to get current directory")?;
    Ok(config_path_with_base(explicit, &base))
}

fn config_path_with_base(explicit: Option<&Path>, base: &Path) -> PathBuf {
    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    if path.is_relative() {
        base.join(path)
    } else {
        path
    }
}
