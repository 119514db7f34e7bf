use std::env;
use std::path::PathBuf;

use tracing::warn;

/// Runtime configuration resolved from the environment. Every knob has a
/// development default so a bare `cargo run` works.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: PathBuf,
    pub pyq_index_file: PathBuf,
    pub client_url: Option<String>,
    /// Accounts signing up with this email are seeded as admins; authorization
    /// itself checks the role on the account, never the email.
    pub admin_email: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: port_from_env("PORT", 3000),
            data_dir: PathBuf::from(var_or("STUDY_DATA_DIR", "data")),
            pyq_index_file: PathBuf::from(var_or("PYQ_INDEX_FILE", "pyq-data.json")),
            client_url: env::var("CLIENT_URL").ok().filter(|v| !v.is_empty()),
            admin_email: env::var("ADMIN_EMAIL").ok().filter(|v| !v.is_empty()),
        }
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn port_from_env(key: &str, default: u16) -> u16 {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("Invalid {} value {:?} ({}), using {}", key, raw, e, default);
            default
        }),
        Err(_) => default,
    }
}
