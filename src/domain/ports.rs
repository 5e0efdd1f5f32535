use crate::domain::model::{
    ClassificationOutcome, ClassificationRequest, FailurePolicy, Indicator, MapView, Position,
    Slot, StationMarker, StationSeed,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Remote similarity classifier.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, request: &ClassificationRequest) -> Result<ClassificationOutcome>;
}

/// Drawing surface for the two station markers and the indicator.
pub trait MarkerRenderer: Send {
    fn set_view(&mut self, _view: &MapView) {}
    fn render_marker(&mut self, marker: &StationMarker);
    fn remove_marker(&mut self, slot: Slot);
    fn update_position(&mut self, slot: Slot, position: Position);
    fn set_draggable(&mut self, slot: Slot, enabled: bool);
    fn show_indicator(&mut self, indicator: Indicator);
    fn show_error(&mut self, _message: &str) {}
}

pub trait ConfigProvider: Send + Sync {
    fn api_endpoint(&self) -> &str;
    fn similarity_threshold(&self) -> f64;
    fn label_debounce(&self) -> Duration;
    fn request_timeout(&self) -> Option<Duration>;
    fn failure_policy(&self) -> FailurePolicy;
    fn default_label(&self) -> &str;
    fn initial_stations(&self) -> Vec<StationSeed>;
    fn map_view(&self) -> MapView;
}
