//! Server configuration from environment variables.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

const DEFAULT_BIND: &str = "0.0.0.0:3000";
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    /// When set, student-authored messages deliver to teachers only until
    /// the teacher reveals them.
    pub moderated_intake: bool,
}

impl Config {
    pub fn from_env() -> Self {
        let bind_addr = env::var("NOTEBOARD_BIND")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| {
                DEFAULT_BIND
                    .parse()
                    .unwrap_or(SocketAddr::from(([0, 0, 0, 0], 3000)))
            });
        let upload_dir = env::var("NOTEBOARD_UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_UPLOAD_DIR));
        let max_upload_bytes = env::var("NOTEBOARD_MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
        let moderated_intake = env::var("NOTEBOARD_MODERATED_INTAKE")
            .map(|s| matches!(s.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Config {
            bind_addr,
            upload_dir,
            max_upload_bytes,
            moderated_intake,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            moderated_intake: false,
        }
    }
}
