pub mod accounts;
pub mod app_config;
pub mod config;
pub mod entity;
pub mod error;
pub mod filename;
pub mod layout;

pub use accounts::{Account, Credentials};
pub use app_config::AppConfig;
pub use config::{load_app_config, load_app_config_from_env};
pub use entity::{Entity, EntityKind, ItemIdList};
pub use error::ConfigError;
