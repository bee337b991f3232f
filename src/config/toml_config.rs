use crate::core::log_buffer::DEFAULT_CAPACITY;
use crate::core::ConfigProvider;
use crate::domain::channel::{ChannelRegistry, ChannelSpec};
use crate::domain::model::{Device, TrainingParams};
use crate::utils::error::{ConsoleError, Result};
use crate::utils::validation::{self, Validate, HTTP_SCHEMES, WS_SCHEMES};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub console: Option<ConsoleSection>,
    pub api: ApiSection,
    pub stream: StreamSection,
    pub validation: Option<ValidationSection>,
    pub training: Option<TrainingSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleSection {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSection {
    pub base_url: String,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSection {
    pub base_url: String,
    pub buffer_capacity: Option<usize>,
    pub connect_timeout_seconds: Option<u64>,
    #[serde(default)]
    pub channels: Vec<ChannelSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSection {
    pub min_months: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSection {
    pub coin_number: Option<u32>,
    pub processes: Option<u32>,
    pub device: Option<Device>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ConsoleError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ConsoleError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${BACKEND_HOST})，未設定的保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConsoleError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_url("api.base_url", &self.api.base_url, HTTP_SCHEMES)?;
        validation::validate_url("stream.base_url", &self.stream.base_url, WS_SCHEMES)?;

        if let Some(capacity) = self.stream.buffer_capacity {
            validation::validate_positive_number("stream.buffer_capacity", capacity, 1)?;
        }
        if let Some(timeout) = self.api.timeout_seconds {
            validation::validate_positive_number("api.timeout_seconds", timeout as usize, 1)?;
        }
        if let Some(timeout) = self.stream.connect_timeout_seconds {
            validation::validate_positive_number("stream.connect_timeout_seconds", timeout as usize, 1)?;
        }
        validation::validate_range("validation.min_months", self.min_months(), 0.0, 120.0)?;

        for channel in &self.stream.channels {
            validation::validate_non_empty_string("stream.channels.key", &channel.key)?;
            validation::validate_non_empty_string("stream.channels.path", &channel.path)?;
        }

        Ok(())
    }
}

impl ConfigProvider for TomlConfig {
    fn api_base_url(&self) -> &str {
        &self.api.base_url
    }

    fn stream_base_url(&self) -> &str {
        &self.stream.base_url
    }

    fn buffer_capacity(&self) -> usize {
        self.stream.buffer_capacity.unwrap_or(DEFAULT_CAPACITY)
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_seconds.unwrap_or(30))
    }

    fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.stream.connect_timeout_seconds.unwrap_or(10))
    }

    fn min_months(&self) -> f64 {
        self.validation
            .as_ref()
            .and_then(|v| v.min_months)
            .unwrap_or(crate::core::date_range::DEFAULT_MIN_MONTHS)
    }

    fn training_defaults(&self) -> TrainingParams {
        let defaults = TrainingParams::default();
        match &self.training {
            Some(training) => TrainingParams {
                coin_number: training.coin_number.unwrap_or(defaults.coin_number),
                processes: training.processes.unwrap_or(defaults.processes),
                device: training.device.unwrap_or(defaults.device),
            },
            None => defaults,
        }
    }

    fn channels(&self) -> ChannelRegistry {
        let mut registry = ChannelRegistry::with_builtin();
        for channel in &self.stream.channels {
            registry.register(channel.clone());
        }
        registry
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::channel::ChannelFraming;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASIC: &str = r#"
[console]
name = "research-console"

[api]
base_url = "http://localhost:5000"

[stream]
base_url = "ws://localhost:5000"
"#;

    #[test]
    fn test_parse_basic_toml_config() {
        let config = TomlConfig::from_toml_str(BASIC).unwrap();

        assert_eq!(config.api_base_url(), "http://localhost:5000");
        assert_eq!(config.buffer_capacity(), 10_000);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.min_months(), 1.0);
        assert_eq!(config.training_defaults(), TrainingParams::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_training_and_channel_sections() {
        let toml_content = r#"
[api]
base_url = "https://research.internal"
timeout_seconds = 120

[stream]
base_url = "wss://research.internal"
buffer_capacity = 500

[[stream.channels]]
key = "BACKTEST"
path = "/api/ws/backtest-log"

[stream.channels.framing]
type = "event_envelope"
start_event = "backtest_stream_start"
message_event = "server-msg"

[validation]
min_months = 3.0

[training]
coin_number = 20
device = "GPU"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.buffer_capacity(), 500);
        assert_eq!(config.min_months(), 3.0);

        let training = config.training_defaults();
        assert_eq!(training.coin_number, 20);
        assert_eq!(training.processes, 1);
        assert_eq!(training.device, Device::Gpu);

        let registry = config.channels();
        let backtest = registry.get("backtest").unwrap();
        assert!(matches!(
            backtest.framing,
            ChannelFraming::EventEnvelope { ref stop_event, .. } if stop_event.is_none()
        ));
        assert!(registry.get("TRAINING").is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("RESEARCH_CONSOLE_TEST_API", "http://10.0.0.5:5000");

        let toml_content = r#"
[api]
base_url = "${RESEARCH_CONSOLE_TEST_API}"

[stream]
base_url = "ws://10.0.0.5:5000"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.api.base_url, "http://10.0.0.5:5000");

        std::env::remove_var("RESEARCH_CONSOLE_TEST_API");
    }

    #[test]
    fn test_config_validation() {
        let wrong_scheme = BASIC.replace("ws://localhost:5000", "http://localhost:5000");
        let config = TomlConfig::from_toml_str(&wrong_scheme).unwrap();
        assert!(config.validate().is_err());

        let zero_capacity = format!("{}buffer_capacity = 0\n", BASIC);
        let config = TomlConfig::from_toml_str(&zero_capacity).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(BASIC.as_bytes()).unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.console.unwrap().name, "research-console");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            TomlConfig::from_file("/definitely/not/here.toml"),
            Err(ConsoleError::IoError(_))
        ));
    }
}
