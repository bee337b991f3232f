use crate::utils::error::{ConsoleError, Result};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// A calendar day as written by the operator. Months are 1-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarDate {
    year: i32,
    month: u32,
    day: u32,
}

impl CalendarDate {
    pub fn new(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self::from)
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn day(&self) -> u32 {
        self.day
    }
}

impl From<NaiveDate> for CalendarDate {
    fn from(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
        }
    }
}

impl FromStr for CalendarDate {
    type Err = ConsoleError;

    /// 接受 `YYYY-MM-DD`、`YYYY-MM`、`YYYY`、帶時間的 ISO 字串與 RFC 3339，日期照字面取，不做時區轉換
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").map(|dt| dt.date()))
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").map(|dt| dt.date()))
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").map(|dt| dt.date()))
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
            .or_else(|_| DateTime::parse_from_rfc3339(s).map(|dt| dt.date_naive()))
            .ok()
            .or_else(|| reduced_precision(s))
            .map(Self::from)
            .ok_or_else(|| ConsoleError::ValidationError {
                message: format!("Unparsable date: '{}'", s),
            })
    }
}

/// ISO 8601 reduced forms: `YYYY-MM` is the first of the month, `YYYY` the first of January.
fn reduced_precision(s: &str) -> Option<NaiveDate> {
    let is_digits = |part: &str, len: usize| part.len() == len && part.bytes().all(|b| b.is_ascii_digit());
    match s.split_once('-') {
        Some((year, month)) if is_digits(year, 4) && is_digits(month, 2) => {
            NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)
        }
        None if is_digits(s, 4) => NaiveDate::from_ymd_opt(s.parse().ok()?, 1, 1),
        _ => None,
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// Fractional month distance. `NaN` when either date could not be parsed.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct MonthSpan(f64);

impl MonthSpan {
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    pub fn invalid() -> Self {
        Self(f64::NAN)
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn is_numeric(&self) -> bool {
        !self.0.is_nan()
    }

    pub fn meets(&self, min_months: f64) -> bool {
        self.is_numeric() && self.0 >= min_months
    }
}

impl fmt::Display for MonthSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_numeric() {
            write!(f, "{:.4}", self.0)
        } else {
            write!(f, "NaN")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationVerdict {
    Valid,
    Invalid { reason: String },
}

impl ValidationVerdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationVerdict::Valid)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ValidationVerdict::Valid => None,
            ValidationVerdict::Invalid { reason } => Some(reason),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Device {
    #[default]
    Cpu,
    Gpu,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "CPU"),
            Device::Gpu => write!(f, "GPU"),
        }
    }
}

/// Knobs of a training run other than the date window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingParams {
    pub coin_number: u32,
    pub processes: u32,
    pub device: Device,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            coin_number: 11,
            processes: 1,
            device: Device::Cpu,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainOneShotRequest {
    #[serde(rename = "coinnum")]
    pub coin_number: u32,
    #[serde(rename = "starttrainingdate")]
    pub start_date: String,
    #[serde(rename = "endtrainingdate")]
    pub end_date: String,
    #[serde(rename = "numprocesses")]
    pub processes: u32,
    pub device: Device,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalDataRequest {
    #[serde(rename = "coinnum")]
    pub coin_number: u32,
    #[serde(rename = "starttrainingdate")]
    pub start_date: String,
    #[serde(rename = "endtrainingdate")]
    pub end_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRequest {
    #[serde(rename = "startdtstr")]
    pub start_date: String,
    #[serde(rename = "enddtstr")]
    pub end_date: String,
    #[serde(rename = "modeltouse")]
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableCoinsRequest {
    /// The backend only answers `isall = true`.
    #[serde(rename = "isall")]
    pub all: bool,
    #[serde(rename = "startdate")]
    pub start_date: String,
    #[serde(rename = "enddate")]
    pub end_date: String,
}

/// Empty strings mean "no bound" on either side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistoryRequest {
    /// Comma separated, e.g. `BTC,ETH`. Empty for every coin.
    #[serde(rename = "coinlist")]
    pub coins: String,
    #[serde(rename = "startdate")]
    pub start_date: String,
    #[serde(rename = "enddate")]
    pub end_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNetworkConfig {
    #[serde(rename = "inst_name")]
    pub name: String,
    #[serde(rename = "inst_definition")]
    pub definition: serde_json::Value,
    pub user: String,
}

/// Stored as a new version of the named network; the backend keeps the definition as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfigUpdate {
    #[serde(rename = "instance_to_update")]
    pub name: String,
    #[serde(rename = "instance_definition_to_update")]
    pub definition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfigDeletion {
    #[serde(rename = "instance_to_delete")]
    pub name: String,
    #[serde(rename = "instance_version_to_delete")]
    pub version: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelKeyRequest {
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelLabelRequest {
    pub key: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotRequest {
    pub key: String,
    /// Benchmark algorithms drawn next to the model.
    pub algos: Vec<String>,
}

/// Generic job response; fields the console does not know about are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl StatusResponse {
    /// 後端用空字串表示沒有錯誤
    pub fn error(&self) -> Option<&str> {
        self.error_msg.as_deref().filter(|msg| !msg.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataDateRange {
    #[serde(default)]
    pub min_date: String,
    #[serde(default)]
    pub max_date: String,
    #[serde(default)]
    pub error_msg: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Streaming,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected,
    Message(String),
    Disconnected,
    Failed { reason: String },
}
