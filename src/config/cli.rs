use crate::config::toml_config::TomlConfig;
use crate::core::date_range::DEFAULT_MIN_MONTHS;
use crate::core::launcher::DEFAULT_CONFIG_USER;
use crate::core::log_buffer::DEFAULT_CAPACITY;
use crate::core::ConfigProvider;
use crate::domain::channel::ChannelRegistry;
use crate::domain::model::{Device, TrainingParams};
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate, HTTP_SCHEMES, WS_SCHEMES};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "research-console")]
#[command(about = "Operator console for the trading-model research backend")]
pub struct CliConfig {
    #[arg(long, global = true, default_value = "http://localhost:5000")]
    pub api_base_url: String,

    #[arg(long, global = true, default_value = "ws://localhost:5000")]
    pub stream_base_url: String,

    #[arg(long, global = true, default_value_t = DEFAULT_CAPACITY)]
    pub buffer_capacity: usize,

    /// HTTP request timeout in seconds
    #[arg(long, global = true, default_value = "30")]
    pub request_timeout: u64,

    /// Stream connect timeout in seconds
    #[arg(long, global = true, default_value = "10")]
    pub connect_timeout: u64,

    #[arg(long, global = true, default_value_t = DEFAULT_MIN_MONTHS)]
    pub min_months: f64,

    /// TOML file replacing the connection settings above
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Serialize, Deserialize, Subcommand)]
pub enum Command {
    /// Check that a start/end pair is far enough apart
    Validate {
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
    },
    /// Launch a one-shot training run
    Train {
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        #[arg(long)]
        coins: Option<u32>,
        #[arg(long)]
        processes: Option<u32>,
        #[arg(long, value_enum)]
        device: Option<Device>,
    },
    /// Ask the backend to fetch market history for a window
    Download {
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        #[arg(long)]
        coins: Option<u32>,
    },
    /// Backtest a trained model over a window
    Backtest {
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        #[arg(long)]
        model: String,
    },
    /// List stored models
    Models {
        /// Print full model metadata instead of names
        #[arg(long)]
        all: bool,
    },
    /// Delete a trained model by key
    DeleteModel { key: String },
    /// Set the label shown for a trained model
    RelabelModel { key: String, label: String },
    /// Chart a trained model's results against benchmark algorithms
    PlotModel {
        key: String,
        #[arg(long, value_delimiter = ',')]
        algos: Vec<String>,
    },
    /// List stored network configs, latest version of each
    Networks,
    /// Store a new network config from a JSON file
    SaveNetwork {
        name: String,
        #[arg(long)]
        definition_file: String,
        #[arg(long, default_value = DEFAULT_CONFIG_USER)]
        user: String,
    },
    /// Store a JSON file as the next version of a network config
    UpdateNetwork {
        name: String,
        #[arg(long)]
        definition_file: String,
    },
    /// Mark one version of a network config as deleted
    DeleteNetwork {
        name: String,
        #[arg(long)]
        version: u32,
    },
    /// List benchmark algorithms
    Algos,
    /// Show the span of stored market data
    DataRange,
    /// List coins with stored market data
    Coins,
    /// Print stored price rows, newest first
    History {
        /// Comma separated; all coins when omitted
        #[arg(long, value_delimiter = ',')]
        coins: Vec<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
    },
    /// Follow a live stream until Ctrl-C
    Tail {
        channel: String,
        /// Ticker symbol, TICKER channel only
        #[arg(long)]
        symbol: Option<String>,
        /// Exchange stream type, e.g. trade or kline_1m
        #[arg(long)]
        stream: Option<String>,
    },
    /// Round-trip a message through the echo channel
    Echo {
        message: String,
        /// Seconds to wait for the reply
        #[arg(long, default_value = "5")]
        wait: u64,
    },
}

/// Command-line values layered over configured training defaults.
pub trait TrainingOverrides {
    fn apply_to(&self, params: TrainingParams) -> TrainingParams;
}

impl TrainingOverrides for Command {
    fn apply_to(&self, mut params: TrainingParams) -> TrainingParams {
        match self {
            Command::Train {
                coins,
                processes,
                device,
                ..
            } => {
                if let Some(coins) = coins {
                    params.coin_number = *coins;
                }
                if let Some(processes) = processes {
                    params.processes = *processes;
                }
                if let Some(device) = device {
                    params.device = *device;
                }
            }
            Command::Download { coins: Some(coins), .. } => params.coin_number = *coins,
            _ => {}
        }
        params
    }
}

impl CliConfig {
    /// 有 --config 就以 TOML 為準，否則用命令列參數
    pub fn provider(&self) -> Result<Box<dyn ConfigProvider>> {
        match &self.config {
            Some(path) => {
                tracing::info!("📁 Loading configuration from: {}", path);
                let config = TomlConfig::from_file(path)?;
                config.validate()?;
                Ok(Box::new(config))
            }
            None => {
                self.validate()?;
                Ok(Box::new(self.clone()))
            }
        }
    }
}

impl ConfigProvider for CliConfig {
    fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    fn stream_base_url(&self) -> &str {
        &self.stream_base_url
    }

    fn buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    fn min_months(&self) -> f64 {
        self.min_months
    }

    fn training_defaults(&self) -> TrainingParams {
        TrainingParams::default()
    }

    fn channels(&self) -> ChannelRegistry {
        ChannelRegistry::with_builtin()
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("api_base_url", &self.api_base_url, HTTP_SCHEMES)?;
        validation::validate_url("stream_base_url", &self.stream_base_url, WS_SCHEMES)?;
        validation::validate_positive_number("buffer_capacity", self.buffer_capacity, 1)?;
        validation::validate_positive_number("request_timeout", self.request_timeout as usize, 1)?;
        validation::validate_positive_number("connect_timeout", self.connect_timeout as usize, 1)?;
        validation::validate_range("min_months", self.min_months, 0.0, 120.0)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CliConfig::parse_from(["research-console", "models"]);
        assert_eq!(config.api_base_url, "http://localhost:5000");
        assert_eq!(config.buffer_capacity, 10_000);
        assert_eq!(config.min_months, 1.0);
        assert!(config.validate().is_ok());
        assert!(config.provider().is_ok());
    }

    #[test]
    fn test_train_overrides() {
        let config = CliConfig::parse_from([
            "research-console",
            "train",
            "--start",
            "2021-01-01",
            "--end",
            "2021-03-01",
            "--coins",
            "20",
            "--device",
            "gpu",
        ]);
        let params = config.command.apply_to(TrainingParams::default());
        assert_eq!(params.coin_number, 20);
        assert_eq!(params.processes, 1);
        assert_eq!(params.device, Device::Gpu);
    }

    #[test]
    fn test_invalid_stream_scheme_rejected() {
        let config = CliConfig::parse_from([
            "research-console",
            "--stream-base-url",
            "http://localhost:5000",
            "algos",
        ]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_record_management_commands() {
        let config = CliConfig::parse_from(["research-console", "history", "--coins", "BTC,ETH", "--start", "2021-06"]);
        match config.command {
            Command::History { coins, start, end } => {
                assert_eq!(coins, vec!["BTC", "ETH"]);
                assert_eq!(start.as_deref(), Some("2021-06"));
                assert_eq!(end, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let config = CliConfig::parse_from(["research-console", "save-network", "cnn", "--definition-file", "cnn.json"]);
        match config.command {
            Command::SaveNetwork { name, user, .. } => {
                assert_eq!(name, "cnn");
                assert_eq!(user, "system");
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let config = CliConfig::parse_from(["research-console", "plot-model", "k1", "--algos", "ubah,best"]);
        assert!(matches!(config.command, Command::PlotModel { ref algos, .. } if algos.len() == 2));
    }
}
