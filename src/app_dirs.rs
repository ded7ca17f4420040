use directories::ProjectDirs;
use std::path::PathBuf;

const APP_NAME: &str = "retrowordle";

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// Progress data lives under $HOME/.local/state/retrowordle
    pub fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(PathBuf::from(home).join(".local").join("state").join(APP_NAME))
        } else {
            ProjectDirs::from("", "", APP_NAME).map(|proj_dirs| proj_dirs.data_local_dir().to_path_buf())
        }
    }

    pub fn config_path() -> PathBuf {
        if let Some(pd) = ProjectDirs::from("", "", APP_NAME) {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("retrowordle_config.json")
        }
    }
}
