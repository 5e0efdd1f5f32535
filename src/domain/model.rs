use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 地圖上的座標（十進位度數）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Text shown next to the label input, five decimals like the map readout.
    pub fn readout(&self) -> String {
        format!("{:.5}, {:.5}", self.latitude, self.longitude)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.readout())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    First,
    Second,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::First, Slot::Second];

    pub fn index(self) -> usize {
        match self {
            Slot::First => 0,
            Slot::Second => 1,
        }
    }

    /// Suffix of the query parameters this slot fills (`name1`, `lat2`, ...).
    pub fn number(self) -> u8 {
        match self {
            Slot::First => 1,
            Slot::Second => 2,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(Slot::First),
            2 => Some(Slot::Second),
            _ => None,
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            Slot::First => "pop1",
            Slot::Second => "pop2",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "station {}", self.number())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationMarker {
    pub slot: Slot,
    pub position: Position,
    pub label: String,
    /// A drag gesture is in progress.
    pub dragging: bool,
    pub draggable: bool,
}

impl StationMarker {
    pub fn new(slot: Slot, position: Position, label: impl Into<String>) -> Self {
        Self {
            slot,
            position,
            label: label.into(),
            dragging: false,
            draggable: true,
        }
    }
}

/// Query sent to the classification service; field names are the wire names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRequest {
    pub name1: String,
    pub name2: String,
    pub lat1: f64,
    pub lon1: f64,
    pub lat2: f64,
    pub lon2: f64,
}

impl ClassificationRequest {
    pub fn from_markers(first: &StationMarker, second: &StationMarker) -> Self {
        Self {
            name1: first.label.trim().to_string(),
            name2: second.label.trim().to_string(),
            lat1: first.position.latitude,
            lon1: first.position.longitude,
            lat2: second.position.latitude,
            lon2: second.position.longitude,
        }
    }
}

/// What the service answered for a request that reached it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClassificationOutcome {
    Score(f64),
    /// JSON body without a usable numeric `res` field.
    Malformed,
}

impl ClassificationOutcome {
    pub fn from_body(body: &serde_json::Value) -> Self {
        match body.get("res").and_then(serde_json::Value::as_f64) {
            Some(score) if score.is_finite() => ClassificationOutcome::Score(score),
            _ => ClassificationOutcome::Malformed,
        }
    }

    /// Malformed answers count as "not similar".
    pub fn verdict(self, threshold: f64) -> Verdict {
        match self {
            ClassificationOutcome::Score(score) if score > threshold => Verdict::Similar,
            _ => Verdict::NotSimilar,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Similar,
    NotSimilar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    #[default]
    Neutral,
    Similar,
    NotSimilar,
}

impl Indicator {
    pub fn text(self) -> &'static str {
        match self {
            Indicator::Neutral => "",
            Indicator::Similar => "Similar",
            Indicator::NotSimilar => "Not similar",
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            Indicator::Neutral => "",
            Indicator::Similar => "simi",
            Indicator::NotSimilar => "notsimi",
        }
    }
}

impl From<Verdict> for Indicator {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Similar => Indicator::Similar,
            Verdict::NotSimilar => Indicator::NotSimilar,
        }
    }
}

/// Last verdict applied to the indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictRecord {
    pub seq: u64,
    pub verdict: Verdict,
    pub score: Option<f64>,
    pub received_at: DateTime<Utc>,
}

/// How a failed request (transport, status, undecodable body) affects the indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Indicator keeps whatever it showed before.
    #[default]
    KeepStale,
    /// Indicator goes back to neutral and the error is shown.
    Surface,
}

impl FailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePolicy::KeepStale => "keep_stale",
            FailurePolicy::Surface => "surface",
        }
    }
}

impl std::str::FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "keep_stale" | "stale" => Ok(FailurePolicy::KeepStale),
            "surface" => Ok(FailurePolicy::Surface),
            other => Err(format!(
                "unknown failure policy '{}', expected keep_stale or surface",
                other
            )),
        }
    }
}

/// A station placed when the widget starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationSeed {
    pub latitude: f64,
    pub longitude: f64,
    pub label: String,
}

impl StationSeed {
    pub fn position(&self) -> Position {
        Position::new(self.latitude, self.longitude)
    }

    pub fn defaults() -> Vec<StationSeed> {
        vec![
            StationSeed {
                latitude: 48.00199,
                longitude: 7.81989,
                label: "Freiburg im Breisgau, Bissierstr.".to_string(),
            },
            StationSeed {
                latitude: 48.00223,
                longitude: 7.82006,
                label: "Freiburg Bissierstraße".to_string(),
            },
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    pub center: Position,
    pub zoom: u8,
}

impl Default for MapView {
    fn default() -> Self {
        Self {
            center: Position::new(48.00210, 7.81997),
            zoom: 18,
        }
    }
}
