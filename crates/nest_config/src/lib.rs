//! Nest configuration — environment variables with `.cfg` file defaults.
//!
//! A `.cfg` file in the working directory is a line-oriented `KEY=VALUE`
//! source; it only fills in variables the environment does not already set.
//! Call [`init`] before touching any of the lazy endpoints.

use lazy_static::lazy_static;

const CFG_FILE: &str = ".cfg";

lazy_static! {
    /// SPIFFE Workload API endpoint.
    pub static ref SOCKET_PATH: String = std::env::var("SOCKET_PATH")
        .unwrap_or_else(|_| "unix:///tmp/spire-agent/public/api.sock".into());
    /// Base URL of the key directory.
    pub static ref KEYDIR_URL: String =
        std::env::var("NEST_KEYDIR_URL").unwrap_or_else(|_| "http://localhost:8888".into());
    /// Bind address for the key directory server.
    pub static ref KEYDIR_BIND: String =
        std::env::var("NEST_KEYDIR_BIND").unwrap_or_else(|_| "0.0.0.0:8888".into());
}

/// Seed missing environment variables from `.cfg`, if present.
pub fn init() {
    let Ok(text) = std::fs::read_to_string(CFG_FILE) else {
        tracing::debug!("no {CFG_FILE} file, relying on the environment");
        return;
    };
    for (key, value) in parse_cfg(&text) {
        if std::env::var(&key).is_err() {
            std::env::set_var(&key, &value);
        }
    }
}

fn parse_cfg(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let (key, value) = line.split_once('=')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}
