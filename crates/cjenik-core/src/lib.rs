pub mod app_config;
pub mod config;
pub mod model;

pub use app_config::AppConfig;
pub use config::{load_app_config, load_app_config_from_env};
pub use model::{effective_barcode, round2, InvalidProduct, Product, Store};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var: {0}")]
    MissingEnvVar(String),

    #[error("invalid env var {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
