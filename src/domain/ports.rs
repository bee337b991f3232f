use crate::domain::channel::{ChannelRegistry, ChannelSpec};
use crate::domain::model::{
    AvailableCoinsRequest, BacktestRequest, DataDateRange, HistoricalDataRequest, ModelKeyRequest,
    ModelLabelRequest, NetworkConfigDeletion, NetworkConfigUpdate, NewNetworkConfig, PlotRequest,
    PriceHistoryRequest, StatusResponse, TrainOneShotRequest, TrainingParams,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;

pub trait ConfigProvider: Send + Sync {
    fn api_base_url(&self) -> &str;
    fn stream_base_url(&self) -> &str;
    fn buffer_capacity(&self) -> usize;
    fn request_timeout(&self) -> Duration;
    fn connect_timeout(&self) -> Duration;
    fn min_months(&self) -> f64;
    fn training_defaults(&self) -> TrainingParams;
    fn channels(&self) -> ChannelRegistry;
}

/// The remote job-control service.
///
/// Record listings come back as JSON objects, one per row, in backend order.
#[async_trait]
pub trait JobApi: Send + Sync {
    // 訓練與回測
    async fn train_one_shot(&self, request: &TrainOneShotRequest) -> Result<StatusResponse>;
    async fn download_historical_data(&self, request: &HistoricalDataRequest) -> Result<StatusResponse>;
    async fn run_backtest(&self, request: &BacktestRequest) -> Result<StatusResponse>;
    async fn benchmark_algos(&self) -> Result<Vec<String>>;

    // 市場資料
    async fn data_date_range(&self) -> Result<DataDateRange>;
    async fn available_coins(&self, request: &AvailableCoinsRequest) -> Result<Vec<String>>;
    async fn price_history(&self, request: &PriceHistoryRequest) -> Result<Vec<Value>>;

    // 網路設定
    async fn model_names(&self) -> Result<Vec<String>>;
    async fn network_configs(&self) -> Result<Vec<Value>>;
    async fn save_network_config(&self, request: &NewNetworkConfig) -> Result<StatusResponse>;
    async fn update_network_config(&self, request: &NetworkConfigUpdate) -> Result<StatusResponse>;
    async fn delete_network_config(&self, request: &NetworkConfigDeletion) -> Result<StatusResponse>;

    // 訓練好的模型
    async fn all_models(&self) -> Result<Vec<Value>>;
    async fn delete_model(&self, request: &ModelKeyRequest) -> Result<StatusResponse>;
    async fn relabel_model(&self, request: &ModelLabelRequest) -> Result<StatusResponse>;
    /// Chart series for a trained model against the requested benchmarks.
    async fn plot_model_results(&self, request: &PlotRequest) -> Result<Value>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Text(String),
    Closed,
    Failed(String),
}

/// An open connection: frames to send and frames received, in delivery order.
/// Dropping the outbound sender closes the connection.
pub struct StreamLink {
    pub outbound: mpsc::UnboundedSender<OutboundFrame>,
    pub inbound: mpsc::UnboundedReceiver<InboundFrame>,
}

#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Resolves once the connection is ready to carry frames.
    async fn open(&self, channel: &ChannelSpec) -> Result<StreamLink>;
}
