use crate::domain::model::{
    AvailableCoinsRequest, BacktestRequest, DataDateRange, HistoricalDataRequest, ModelKeyRequest,
    ModelLabelRequest, NetworkConfigDeletion, NetworkConfigUpdate, NewNetworkConfig, PlotRequest,
    PriceHistoryRequest, StatusResponse, TrainOneShotRequest,
};
use crate::domain::ports::JobApi;
use crate::utils::error::{ConsoleError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use url::Url;

const TRAIN_ONE_SHOT: &str = "/api/training/train-one-shot";
const HISTORICAL_DATA: &str = "/api/training/get-historical-data";
const RUN_BACKTEST: &str = "/api/backtesting/run-backtest-for-date-range-with-model";
const BENCHMARK_ALGOS: &str = "/api/backtesting/get-benchmark-algos";
const DATA_DATE_RANGE: &str = "/api/data/get-min-max-data-dates";
const AVAILABLE_COINS: &str = "/api/data/get-avail-coins";
const PRICE_HISTORY: &str = "/api/data/get-hist-data";
const MODEL_NAMES: &str = "/api/config/nn/get-names-list";
const NETWORK_CONFIGS: &str = "/api/config/nn/get-all";
const SAVE_NETWORK_CONFIG: &str = "/api/config/nn/save-new-instance";
const UPDATE_NETWORK_CONFIG: &str = "/api/config/nn/update-instance";
const DELETE_NETWORK_CONFIG: &str = "/api/config/nn/delete-instance";
const ALL_MODELS: &str = "/api/models/get-all";
const DELETE_MODEL: &str = "/api/models/delete-model-with-key";
const RELABEL_MODEL: &str = "/api/models/update-key-label";
const PLOT_MODEL_RESULTS: &str = "/api/models/plot-results";

#[derive(Debug, Deserialize)]
struct NamesList {
    #[serde(default)]
    nn_list: Vec<String>,
    #[serde(default)]
    error_msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AlgoList {
    #[serde(default)]
    algo_list: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CoinList {
    #[serde(default)]
    coin_list: Vec<String>,
}

/// Listing responses carry their rows under one field, usually as a JSON
/// document encoded in a string.
#[derive(Debug, Deserialize)]
struct Records {
    #[serde(default, alias = "hist_data", alias = "nn_instances", alias = "models")]
    records: Value,
    #[serde(default)]
    error_msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(rename = "chartData", default)]
    chart_data: Value,
}

/// `JobApi` over the research backend's JSON HTTP endpoints.
#[derive(Debug, Clone)]
pub struct HttpJobApi {
    base_url: Url,
    client: Client,
}

impl HttpJobApi {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
        let url = self.endpoint(path)?;
        tracing::debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        Self::decode(response).await
    }

    async fn post_json<B: Serialize + ?Sized, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let url = self.endpoint(path)?;
        tracing::debug!("POST {}", url);
        let response = self.client.post(url).json(body).send().await?;
        Self::decode(response).await
    }

    async fn decode<R: DeserializeOwned>(response: reqwest::Response) -> Result<R> {
        let status = response.status();
        tracing::debug!("API response status: {}", status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConsoleError::ApiStatusError {
                status: status.as_u16(),
                body,
            });
        }

        // 先取文字再解析，錯誤訊息才帶得到原始內容
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn get_records(&self, path: &str) -> Result<Vec<Value>> {
        let value: Value = self.get_json(path).await?;
        Self::unwrap_records(path, value)
    }

    fn unwrap_records(path: &str, value: Value) -> Result<Vec<Value>> {
        if value.is_array() {
            return json_records(value);
        }
        let listing: Records = serde_json::from_value(value)?;
        let rows = json_records(listing.records)?;
        // 有資料時後端仍可能附帶 error_msg，只在空結果時提示
        if rows.is_empty() {
            if let Some(msg) = listing.error_msg.as_deref().filter(|msg| !msg.is_empty()) {
                tracing::warn!("⚠️ {} returned no rows: {}", path, msg);
            }
        }
        Ok(rows)
    }
}

/// Accepts an array, a string holding a JSON array, or nothing.
fn json_records(value: Value) -> Result<Vec<Value>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(rows) => Ok(rows),
        Value::String(text) if text.trim().is_empty() => Ok(Vec::new()),
        Value::String(text) => match serde_json::from_str(&text)? {
            Value::Array(rows) => Ok(rows),
            other => Err(not_a_listing(&other)),
        },
        other => Err(not_a_listing(&other)),
    }
}

fn not_a_listing(value: &Value) -> ConsoleError {
    ConsoleError::SerializationError(serde::de::Error::custom(format!(
        "expected a list of records, got {}",
        value
    )))
}

#[async_trait]
impl JobApi for HttpJobApi {
    async fn train_one_shot(&self, request: &TrainOneShotRequest) -> Result<StatusResponse> {
        self.post_json(TRAIN_ONE_SHOT, request).await
    }

    async fn download_historical_data(&self, request: &HistoricalDataRequest) -> Result<StatusResponse> {
        self.post_json(HISTORICAL_DATA, request).await
    }

    async fn run_backtest(&self, request: &BacktestRequest) -> Result<StatusResponse> {
        self.post_json(RUN_BACKTEST, request).await
    }

    async fn benchmark_algos(&self) -> Result<Vec<String>> {
        let list: AlgoList = self.get_json(BENCHMARK_ALGOS).await?;
        Ok(list.algo_list)
    }

    async fn data_date_range(&self) -> Result<DataDateRange> {
        self.get_json(DATA_DATE_RANGE).await
    }

    async fn available_coins(&self, request: &AvailableCoinsRequest) -> Result<Vec<String>> {
        let list: CoinList = self.post_json(AVAILABLE_COINS, request).await?;
        Ok(list.coin_list)
    }

    async fn price_history(&self, request: &PriceHistoryRequest) -> Result<Vec<Value>> {
        let value: Value = self.post_json(PRICE_HISTORY, request).await?;
        Self::unwrap_records(PRICE_HISTORY, value)
    }

    async fn model_names(&self) -> Result<Vec<String>> {
        let list: NamesList = self.get_json(MODEL_NAMES).await?;
        if let Some(msg) = list.error_msg.as_deref().filter(|msg| !msg.is_empty()) {
            tracing::warn!("⚠️ Backend reported an error listing models: {}", msg);
        }
        Ok(list.nn_list)
    }

    async fn network_configs(&self) -> Result<Vec<Value>> {
        self.get_records(NETWORK_CONFIGS).await
    }

    async fn save_network_config(&self, request: &NewNetworkConfig) -> Result<StatusResponse> {
        self.post_json(SAVE_NETWORK_CONFIG, request).await
    }

    async fn update_network_config(&self, request: &NetworkConfigUpdate) -> Result<StatusResponse> {
        self.post_json(UPDATE_NETWORK_CONFIG, request).await
    }

    async fn delete_network_config(&self, request: &NetworkConfigDeletion) -> Result<StatusResponse> {
        self.post_json(DELETE_NETWORK_CONFIG, request).await
    }

    async fn all_models(&self) -> Result<Vec<Value>> {
        self.get_records(ALL_MODELS).await
    }

    async fn delete_model(&self, request: &ModelKeyRequest) -> Result<StatusResponse> {
        self.post_json(DELETE_MODEL, request).await
    }

    async fn relabel_model(&self, request: &ModelLabelRequest) -> Result<StatusResponse> {
        self.post_json(RELABEL_MODEL, request).await
    }

    async fn plot_model_results(&self, request: &PlotRequest) -> Result<Value> {
        let chart: ChartData = self.post_json(PLOT_MODEL_RESULTS, request).await?;
        // 圖表資料是字串化的 JSON
        match chart.chart_data {
            Value::String(text) => Ok(serde_json::from_str(&text)?),
            other => Ok(other),
        }
    }
}
