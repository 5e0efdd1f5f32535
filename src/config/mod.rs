pub mod toml_config;

use crate::domain::model::{FailurePolicy, MapView, StationSeed};
use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
#[cfg(feature = "cli")]
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8282/api";
pub const DEFAULT_THRESHOLD: f64 = 0.5;
pub const DEFAULT_LABEL: &str = "Main Station";

/// 命令列參數；未指定的設定值保持 `None`，讓 TOML 設定檔的值能生效
#[cfg(feature = "cli")]
#[derive(Debug, Clone, Default, Serialize, Deserialize, Parser)]
#[command(name = "statsimi-client")]
#[command(about = "Compare two labeled stations with a station similarity classifier")]
pub struct CliConfig {
    #[arg(long, help = "Classifier URL [default: http://localhost:8282/api]")]
    pub api_endpoint: Option<String>,

    #[arg(long, help = "Scores above this are similar [default: 0.5]")]
    pub threshold: Option<f64>,

    #[arg(long, help = "Delay label edits before classifying (ms) [default: 0]")]
    pub label_debounce_ms: Option<u64>,

    #[arg(long, help = "Give up on a classification request after this many seconds")]
    pub timeout_secs: Option<u64>,

    #[arg(long, help = "keep-stale or surface [default: keep-stale]")]
    pub failure_policy: Option<FailurePolicy>,

    #[arg(long, help = "Label of stations placed by a click [default: Main Station]")]
    pub default_label: Option<String>,

    #[arg(long, help = "Start with an empty map")]
    pub no_default_stations: bool,

    #[arg(long, help = "Read commands from this file instead of stdin")]
    pub script: Option<String>,

    #[arg(short, long, help = "Load settings from a TOML file")]
    pub config: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log as JSON lines")]
    pub log_json: bool,
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("api_endpoint", self.api_endpoint())?;
        validation::validate_range("threshold", self.similarity_threshold(), 0.0, 1.0)?;
        validation::validate_non_empty_string("default_label", self.default_label())?;
        if let Some(timeout) = self.timeout_secs {
            validation::validate_range("timeout_secs", timeout, 1, 3600)?;
        }
        Ok(())
    }
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn api_endpoint(&self) -> &str {
        self.api_endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }

    fn similarity_threshold(&self) -> f64 {
        self.threshold.unwrap_or(DEFAULT_THRESHOLD)
    }

    fn label_debounce(&self) -> Duration {
        Duration::from_millis(self.label_debounce_ms.unwrap_or(0))
    }

    fn request_timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy.unwrap_or_default()
    }

    fn default_label(&self) -> &str {
        self.default_label.as_deref().unwrap_or(DEFAULT_LABEL)
    }

    fn initial_stations(&self) -> Vec<StationSeed> {
        if self.no_default_stations {
            Vec::new()
        } else {
            StationSeed::defaults()
        }
    }

    fn map_view(&self) -> MapView {
        MapView::default()
    }
}
