//! Loading service configuration (credentials + optional form bank) from TOML.
//!
//! See `AppConfig` and `CredentialCfg` for the expected schema.

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::{Form, User};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub credentials: Vec<CredentialCfg>,
  #[serde(default)]
  pub forms: Vec<Form>,
}

/// One bearer token and the user it authenticates as.
///
/// ```toml
/// [[credentials]]
/// token = "s3cret"
/// user = { id = "u1", name = "Ada", email = "ada@example.com", isPro = true }
/// ```
#[derive(Clone, Debug, Deserialize)]
pub struct CredentialCfg {
  pub token: String,
  pub user: User,
}

/// Attempt to load `AppConfig` from FORMLET_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_app_config_from_env() -> Option<AppConfig> {
  let path = std::env::var("FORMLET_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AppConfig>(&s) {
      Ok(cfg) => {
        info!(target: "formlet_backend", %path, "Loaded service config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "formlet_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "formlet_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
