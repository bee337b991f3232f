use crate::core::date_range::validate_minimum_span;
use crate::core::JobApi;
use crate::domain::model::{
    AvailableCoinsRequest, BacktestRequest, CalendarDate, DataDateRange, HistoricalDataRequest,
    ModelKeyRequest, ModelLabelRequest, NetworkConfigDeletion, NetworkConfigUpdate, NewNetworkConfig,
    PlotRequest, PriceHistoryRequest, StatusResponse, TrainOneShotRequest, TrainingParams,
    ValidationVerdict,
};
use crate::utils::error::{ConsoleError, Result};
use serde_json::Value;

/// Author recorded on network configs saved from the console.
pub const DEFAULT_CONFIG_USER: &str = "system";

/// Gates every remote job behind the date-range check.
pub struct JobLauncher<A: JobApi> {
    api: A,
    min_months: f64,
}

impl<A: JobApi> JobLauncher<A> {
    pub fn new(api: A, min_months: f64) -> Self {
        Self { api, min_months }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn check_range(&self, start: &str, end: &str) -> ValidationVerdict {
        validate_minimum_span(start, end, self.min_months)
    }

    /// Normalized `YYYY-MM-DD` pair, or the verdict's reason as a `ValidationError`.
    fn guarded_range(&self, start: &str, end: &str) -> Result<(String, String)> {
        if let ValidationVerdict::Invalid { reason } = self.check_range(start, end) {
            tracing::warn!("🚫 Refusing to launch job for {:?}..{:?}: {}", start, end, reason);
            return Err(ConsoleError::ValidationError { message: reason });
        }
        // 通過驗證代表兩個日期都能解析
        let start: CalendarDate = start.parse()?;
        let end: CalendarDate = end.parse()?;
        Ok((start.to_string(), end.to_string()))
    }

    pub async fn train_one_shot(&self, params: &TrainingParams, start: &str, end: &str) -> Result<StatusResponse> {
        let (start_date, end_date) = self.guarded_range(start, end)?;
        let request = TrainOneShotRequest {
            coin_number: params.coin_number,
            start_date,
            end_date,
            processes: params.processes,
            device: params.device,
        };

        tracing::info!(
            "🚀 Launching one-shot training {}..{} ({} coins, {} processes, {})",
            request.start_date,
            request.end_date,
            request.coin_number,
            request.processes,
            request.device
        );
        let response = self.api.train_one_shot(&request).await?;
        log_outcome("Training", &response);
        Ok(response)
    }

    pub async fn download_historical_data(&self, coin_number: u32, start: &str, end: &str) -> Result<StatusResponse> {
        let (start_date, end_date) = self.guarded_range(start, end)?;
        let request = HistoricalDataRequest {
            coin_number,
            start_date,
            end_date,
        };

        tracing::info!(
            "📥 Downloading historical data {}..{} for {} coins",
            request.start_date,
            request.end_date,
            request.coin_number
        );
        let response = self.api.download_historical_data(&request).await?;
        log_outcome("Data download", &response);
        Ok(response)
    }

    pub async fn run_backtest(&self, model: &str, start: &str, end: &str) -> Result<StatusResponse> {
        require("model", model)?;
        let (start_date, end_date) = self.guarded_range(start, end)?;
        let request = BacktestRequest {
            start_date,
            end_date,
            model: model.to_string(),
        };

        tracing::info!(
            "📈 Backtesting '{}' over {}..{}",
            request.model,
            request.start_date,
            request.end_date
        );
        let response = self.api.run_backtest(&request).await?;
        log_outcome("Backtest", &response);
        Ok(response)
    }

    pub async fn benchmark_algos(&self) -> Result<Vec<String>> {
        self.api.benchmark_algos().await
    }

    pub async fn data_date_range(&self) -> Result<DataDateRange> {
        self.api.data_date_range().await
    }

    pub async fn available_coins(&self) -> Result<Vec<String>> {
        let request = AvailableCoinsRequest {
            all: true,
            start_date: String::new(),
            end_date: String::new(),
        };
        self.api.available_coins(&request).await
    }

    /// Stored candles, newest first. Bounds are optional and not held to the minimum span.
    pub async fn price_history(&self, coins: &[String], start: Option<&str>, end: Option<&str>) -> Result<Vec<Value>> {
        let coins: Vec<&str> = coins
            .iter()
            .map(|coin| coin.trim())
            .filter(|coin| !coin.is_empty())
            .collect();
        let request = PriceHistoryRequest {
            coins: coins.join(","),
            start_date: optional_date(start)?,
            end_date: optional_date(end)?,
        };

        tracing::info!(
            "📥 Fetching price history for [{}] {}..{}",
            request.coins,
            request.start_date,
            request.end_date
        );
        let rows = self.api.price_history(&request).await?;
        tracing::info!("✅ {} price rows", rows.len());
        Ok(rows)
    }

    pub async fn model_names(&self) -> Result<Vec<String>> {
        self.api.model_names().await
    }

    pub async fn network_configs(&self) -> Result<Vec<Value>> {
        self.api.network_configs().await
    }

    pub async fn save_network_config(&self, name: &str, definition: Value, user: &str) -> Result<StatusResponse> {
        require("name", name)?;
        require("user", user)?;
        let request = NewNetworkConfig {
            name: name.trim().to_string(),
            definition,
            user: user.to_string(),
        };

        tracing::info!("💾 Saving network config '{}' as {}", request.name, request.user);
        let response = self.api.save_network_config(&request).await?;
        log_outcome("Network config save", &response);
        Ok(response)
    }

    /// Saves `definition` as the next version of `name`.
    pub async fn update_network_config(&self, name: &str, definition: &Value) -> Result<StatusResponse> {
        require("name", name)?;
        let request = NetworkConfigUpdate {
            name: name.trim().to_string(),
            definition: definition.to_string(),
        };

        tracing::info!("💾 Updating network config '{}'", request.name);
        let response = self.api.update_network_config(&request).await?;
        log_outcome("Network config update", &response);
        Ok(response)
    }

    pub async fn delete_network_config(&self, name: &str, version: u32) -> Result<StatusResponse> {
        require("name", name)?;
        let request = NetworkConfigDeletion {
            name: name.trim().to_string(),
            version,
        };

        tracing::info!("🗑️ Deleting network config '{}' v{}", request.name, request.version);
        let response = self.api.delete_network_config(&request).await?;
        log_outcome("Network config delete", &response);
        Ok(response)
    }

    pub async fn all_models(&self) -> Result<Vec<Value>> {
        self.api.all_models().await
    }

    pub async fn delete_model(&self, key: &str) -> Result<StatusResponse> {
        require("key", key)?;
        let request = ModelKeyRequest { key: key.to_string() };

        tracing::info!("🗑️ Deleting trained model '{}'", request.key);
        let response = self.api.delete_model(&request).await?;
        log_outcome("Model delete", &response);
        Ok(response)
    }

    /// An empty label clears it.
    pub async fn relabel_model(&self, key: &str, label: &str) -> Result<StatusResponse> {
        require("key", key)?;
        let request = ModelLabelRequest {
            key: key.to_string(),
            label: label.to_string(),
        };

        tracing::info!("🏷️ Labelling model '{}' as {:?}", request.key, request.label);
        let response = self.api.relabel_model(&request).await?;
        log_outcome("Model relabel", &response);
        Ok(response)
    }

    pub async fn plot_model_results(&self, key: &str, algos: &[String]) -> Result<Value> {
        require("key", key)?;
        let request = PlotRequest {
            key: key.to_string(),
            algos: algos.to_vec(),
        };

        tracing::info!("📊 Plotting '{}' against {:?}", request.key, request.algos);
        self.api.plot_model_results(&request).await
    }
}

/// `ValidationError` when `value` is blank.
fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ConsoleError::ValidationError {
            message: format!("{} must not be empty", field),
        });
    }
    Ok(())
}

fn optional_date(value: Option<&str>) -> Result<String> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => Ok(value.parse::<CalendarDate>()?.to_string()),
        None => Ok(String::new()),
    }
}

fn log_outcome(job: &str, response: &StatusResponse) {
    match response.error() {
        Some(err) => tracing::warn!("⚠️ {} finished with backend error: {}", job, err),
        None => tracing::info!(
            "✅ {} accepted: {}",
            job,
            response.status_msg.as_deref().unwrap_or("no status message")
        ),
    }
}
