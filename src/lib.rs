pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use crate::adapters::{http::HttpClassifier, terminal::TerminalRenderer};
pub use crate::config::toml_config::TomlConfig;
#[cfg(feature = "cli")]
pub use crate::config::CliConfig;
pub use crate::core::{controller::MarkerController, state::WidgetState};
pub use crate::domain::model::{Indicator, Position, Slot};
pub use crate::utils::error::{ClientError, Result};
