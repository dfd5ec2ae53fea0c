//! Optional user configuration file

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::{duration_secs, duration_secs_opt};
use super::session::OpenMode;

/// Settings read from `config.toml`; every field is optional
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Fallback address when neither `--servername` nor
    /// `NVIM_LISTEN_ADDRESS` is set
    pub servername: Option<String>,

    /// Editor binary used when `NVIM_CMD` is unset
    pub editor: Option<PathBuf>,

    /// How long to wait for a connection before treating the session as gone
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Upper bound on `--remote-wait`
    #[serde(with = "duration_secs_opt")]
    pub wait_timeout: Option<Duration>,

    /// Default open command for files
    pub open_mode: OpenMode,

    /// Keep going after `--remote-expr` (post-hook and wait still run)
    pub continue_after_expr: bool,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            servername: None,
            editor: None,
            connect_timeout: Duration::from_secs(5),
            wait_timeout: None,
            open_mode: OpenMode::Edit,
            continue_after_expr: false,
        }
    }
}
