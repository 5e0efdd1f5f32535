pub mod controller;
pub mod state;

pub use crate::domain::model::{Indicator, Position, Slot, StationMarker};
pub use crate::domain::ports::{Classifier, ConfigProvider, MarkerRenderer};
pub use crate::utils::error::Result;
