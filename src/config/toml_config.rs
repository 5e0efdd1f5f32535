#[cfg(feature = "cli")]
use crate::config::CliConfig;
use crate::config::{DEFAULT_ENDPOINT, DEFAULT_LABEL, DEFAULT_THRESHOLD};
use crate::domain::model::{FailurePolicy, MapView, Position, StationSeed};
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{ClientError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub classification: ClassificationConfig,
    #[serde(default)]
    pub map: MapConfig,
    /// 未設定時使用預設的兩個車站；空陣列代表空白地圖
    pub stations: Option<Vec<StationSeed>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub endpoint: String,
    pub timeout_seconds: Option<u64>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_seconds: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassificationConfig {
    pub threshold: Option<f64>,
    pub label_debounce_ms: Option<u64>,
    pub on_failure: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapConfig {
    /// `[latitude, longitude]`
    pub center: Option<[f64; 2]>,
    pub zoom: Option<u8>,
    pub default_label: Option<String>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ClientError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| ClientError::ConfigValidation {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${CLASSIFIER_URL})，未定義的變數保持原樣
    fn substitute_env_vars(content: &str) -> String {
        let re = env_var_pattern();
        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    /// 命令列明確指定的值覆寫設定檔內容，需在 `validate()` 之前呼叫
    #[cfg(feature = "cli")]
    pub fn apply_cli_overrides(&mut self, cli: &CliConfig) {
        if let Some(endpoint) = &cli.api_endpoint {
            self.service.endpoint = endpoint.clone();
            tracing::info!("🔧 Classifier endpoint overridden to: {}", endpoint);
        }
        if let Some(timeout) = cli.timeout_secs {
            self.service.timeout_seconds = Some(timeout);
            tracing::info!("🔧 Request timeout overridden to: {}s", timeout);
        }
        if let Some(threshold) = cli.threshold {
            self.classification.threshold = Some(threshold);
            tracing::info!("🔧 Similarity threshold overridden to: {}", threshold);
        }
        if let Some(debounce) = cli.label_debounce_ms {
            self.classification.label_debounce_ms = Some(debounce);
            tracing::info!("🔧 Label debounce overridden to: {}ms", debounce);
        }
        if let Some(policy) = cli.failure_policy {
            self.classification.on_failure = Some(policy.as_str().to_string());
            tracing::info!("🔧 Failure policy overridden to: {}", policy.as_str());
        }
        if let Some(label) = &cli.default_label {
            self.map.default_label = Some(label.clone());
            tracing::info!("🔧 Default label overridden to: {}", label);
        }
        if cli.no_default_stations {
            self.stations = Some(Vec::new());
            tracing::info!("🔧 Starting with an empty map");
        }
    }

    fn on_failure(&self) -> Result<FailurePolicy> {
        match &self.classification.on_failure {
            None => Ok(FailurePolicy::default()),
            Some(raw) => raw
                .parse()
                .map_err(|reason| ClientError::InvalidConfigValue {
                    field: "classification.on_failure".to_string(),
                    value: raw.clone(),
                    reason,
                }),
        }
    }
}

fn env_var_pattern() -> Regex {
    // 固定的樣式，編譯不會失敗
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap()
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("service.endpoint", &self.service.endpoint)?;
        if let Some(timeout) = self.service.timeout_seconds {
            validation::validate_range("service.timeout_seconds", timeout, 1, 3600)?;
        }
        if let Some(threshold) = self.classification.threshold {
            validation::validate_range("classification.threshold", threshold, 0.0, 1.0)?;
        }
        self.on_failure()?;

        if let Some([lat, lon]) = self.map.center {
            validation::validate_range("map.center.latitude", lat, -90.0, 90.0)?;
            validation::validate_range("map.center.longitude", lon, -180.0, 180.0)?;
        }
        if let Some(zoom) = self.map.zoom {
            validation::validate_range("map.zoom", zoom, 0, 23)?;
        }
        if let Some(label) = &self.map.default_label {
            validation::validate_non_empty_string("map.default_label", label)?;
        }
        if let Some(stations) = &self.stations {
            validation::validate_stations("stations", stations)?;
        }
        Ok(())
    }
}

impl ConfigProvider for TomlConfig {
    fn api_endpoint(&self) -> &str {
        &self.service.endpoint
    }

    fn similarity_threshold(&self) -> f64 {
        self.classification.threshold.unwrap_or(DEFAULT_THRESHOLD)
    }

    fn label_debounce(&self) -> Duration {
        Duration::from_millis(self.classification.label_debounce_ms.unwrap_or(0))
    }

    fn request_timeout(&self) -> Option<Duration> {
        self.service.timeout_seconds.map(Duration::from_secs)
    }

    fn failure_policy(&self) -> FailurePolicy {
        // validate() 已檢查過格式
        self.on_failure().unwrap_or_default()
    }

    fn default_label(&self) -> &str {
        self.map.default_label.as_deref().unwrap_or(DEFAULT_LABEL)
    }

    fn initial_stations(&self) -> Vec<StationSeed> {
        self.stations.clone().unwrap_or_else(StationSeed::defaults)
    }

    fn map_view(&self) -> MapView {
        let default = MapView::default();
        MapView {
            center: self
                .map
                .center
                .map(|[lat, lon]| Position::new(lat, lon))
                .unwrap_or(default.center),
            zoom: self.map.zoom.unwrap_or(default.zoom),
        }
    }
}
