use anyhow::Result;
use httpmock::prelude::*;
use research_console::core::date_range::MIN_SPAN_MESSAGE;
use research_console::domain::model::{Device, TrainingParams};
use research_console::{ConsoleError, HttpJobApi, JobLauncher};
use serde_json::json;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use url::Url;

fn launcher(server: &MockServer) -> JobLauncher<HttpJobApi> {
    let base_url = Url::parse(&server.base_url()).unwrap();
    let api = HttpJobApi::new(base_url, Duration::from_secs(5)).unwrap();
    JobLauncher::new(api, 1.0)
}

#[tokio::test]
async fn test_train_one_shot_posts_normalized_dates() -> Result<()> {
    let server = MockServer::start_async().await;
    let train_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/training/train-one-shot")
                .json_body(json!({
                    "coinnum": 11,
                    "starttrainingdate": "2021-06-01",
                    "endtrainingdate": "2021-08-15",
                    "numprocesses": 4,
                    "device": "GPU"
                }));
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!({ "status_msg": "OK!" }));
        })
        .await;

    let params = TrainingParams {
        coin_number: 11,
        processes: 4,
        device: Device::Gpu,
    };
    let response = launcher(&server)
        .train_one_shot(&params, "2021-06-01T00:00:00", "2021-08-15")
        .await?;

    train_mock.assert_async().await;
    assert_eq!(response.status_msg.as_deref(), Some("OK!"));
    assert_eq!(response.error(), None);
    Ok(())
}

#[tokio::test]
async fn test_short_window_is_rejected_before_any_request() {
    let server = MockServer::start_async().await;
    let train_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/training/train-one-shot");
            then.status(200).json_body(json!({ "status_msg": "OK!" }));
        })
        .await;

    let launcher = launcher(&server);
    let err = assert_err!(
        launcher
            .train_one_shot(&TrainingParams::default(), "2021-06-15", "2021-07-01")
            .await
    );
    assert!(matches!(err, ConsoleError::ValidationError { ref message } if message == MIN_SPAN_MESSAGE));

    let err = launcher
        .download_historical_data(11, "not-a-date", "2021-07-01")
        .await
        .unwrap_err();
    assert!(matches!(err, ConsoleError::ValidationError { .. }));

    train_mock.assert_hits_async(0).await;
}

#[tokio::test]
async fn test_download_historical_data() {
    let server = MockServer::start_async().await;
    let download_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/training/get-historical-data")
                .json_body(json!({
                    "coinnum": 8,
                    "starttrainingdate": "2020-01-01",
                    "endtrainingdate": "2020-06-01"
                }));
            then.status(200)
                .json_body(json!({ "status_msg": "Downloaded 8 coins" }));
        })
        .await;

    let response = launcher(&server)
        .download_historical_data(8, "2020-01-01", "2020-06-01")
        .await
        .unwrap();

    download_mock.assert_async().await;
    assert_eq!(response.status_msg.as_deref(), Some("Downloaded 8 coins"));
}

#[tokio::test]
async fn test_backtest_response_is_passed_through() {
    let server = MockServer::start_async().await;
    let backtest_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/backtesting/run-backtest-for-date-range-with-model")
                .json_body(json!({
                    "startdtstr": "2021-01-01",
                    "enddtstr": "2021-04-01",
                    "modeltouse": "cnn-v3"
                }));
            then.status(200).json_body(json!({
                "is_error": false,
                "error_msg": "",
                "pc_vector": [1.0, 1.01, 0.99]
            }));
        })
        .await;

    let response = launcher(&server)
        .run_backtest("cnn-v3", "2021-01-01", "2021-04-01")
        .await
        .unwrap();

    backtest_mock.assert_async().await;
    assert_eq!(response.is_error, Some(false));
    assert_eq!(response.error(), None);
    assert_eq!(response.extra["pc_vector"], json!([1.0, 1.01, 0.99]));
}

#[tokio::test]
async fn test_backend_failure_maps_to_status_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/training/train-one-shot");
            then.status(500).body("internal error");
        })
        .await;

    let err = launcher(&server)
        .train_one_shot(&TrainingParams::default(), "2021-01-01", "2021-03-01")
        .await
        .unwrap_err();

    match err {
        ConsoleError::ApiStatusError { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "internal error");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_payload_is_serialization_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/data/get-min-max-data-dates");
            then.status(200).body("not json");
        })
        .await;

    let err = launcher(&server).data_date_range().await.unwrap_err();
    assert!(matches!(err, ConsoleError::SerializationError(_)));
}

#[tokio::test]
async fn test_listing_endpoints() -> Result<()> {
    let server = MockServer::start_async().await;
    let names_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/config/nn/get-names-list");
            then.status(200).json_body(json!({ "nn_list": ["cnn-v1", "cnn-v3"] }));
        })
        .await;
    let algos_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/backtesting/get-benchmark-algos");
            then.status(200).json_body(json!({ "algo_list": ["ubah", "best", "crp"] }));
        })
        .await;
    let range_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/data/get-min-max-data-dates");
            then.status(200).json_body(json!({
                "min_date": "2019-01-01 00:00:00",
                "max_date": "2021-12-31 23:30:00",
                "error_msg": ""
            }));
        })
        .await;
    let models_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/models/get-all");
            then.status(200).json_body(json!([{ "key": "cnn-v1", "label": "baseline" }]));
        })
        .await;

    let launcher = launcher(&server);
    assert_eq!(launcher.model_names().await?, vec!["cnn-v1", "cnn-v3"]);
    assert_eq!(launcher.benchmark_algos().await?, vec!["ubah", "best", "crp"]);

    let range = assert_ok!(launcher.data_date_range().await);
    assert_eq!(range.min_date, "2019-01-01 00:00:00");
    assert_eq!(range.max_date, "2021-12-31 23:30:00");

    let models = launcher.all_models().await?;
    assert_eq!(models[0]["label"], "baseline");

    names_mock.assert_async().await;
    algos_mock.assert_async().await;
    range_mock.assert_async().await;
    models_mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_models_listing_decodes_encoded_records() -> Result<()> {
    let server = MockServer::start_async().await;
    let records = json!([
        { "key": "1700000000", "label": "baseline", "test_pv": 1.42 },
        { "key": "1690000000", "label": null, "test_pv": 0.97 }
    ]);
    let models_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/models/get-all");
            then.status(200).json_body(json!({ "models": records.to_string() }));
        })
        .await;

    let models = launcher(&server).all_models().await?;

    models_mock.assert_async().await;
    assert_eq!(models.len(), 2);
    assert_eq!(models[0]["label"], "baseline");
    assert_eq!(models[1]["test_pv"], 0.97);
    Ok(())
}

#[tokio::test]
async fn test_market_data_routes() -> Result<()> {
    let server = MockServer::start_async().await;
    let coins_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/data/get-avail-coins")
                .json_body(json!({ "isall": true, "startdate": "", "enddate": "" }));
            then.status(200)
                .json_body(json!({ "coin_list": ["BTC", "ETH", "XRP"], "error_msg": "" }));
        })
        .await;
    let rows = json!([
        { "date": 1622505600, "isodate": "2021-06-01 00:00:00", "coin": "ETH", "close": 0.072 }
    ]);
    let history_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/data/get-hist-data")
                .json_body(json!({ "coinlist": "ETH", "startdate": "2021-06-01", "enddate": "" }));
            then.status(200).json_body(json!({
                "hist_data": rows.to_string(),
                "error_msg": "No Data found..."
            }));
        })
        .await;

    let launcher = launcher(&server);
    assert_eq!(launcher.available_coins().await?, vec!["BTC", "ETH", "XRP"]);

    let history = launcher
        .price_history(&["ETH".to_string()], Some("2021-06-01T00:00:00"), None)
        .await?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["isodate"], "2021-06-01 00:00:00");

    coins_mock.assert_async().await;
    history_mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_network_config_routes() -> Result<()> {
    let server = MockServer::start_async().await;
    let list_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/config/nn/get-all");
            then.status(200).json_body(json!({
                "nn_instances": r#"[{"instance_name":"cnn","version":3,"created_by":"system"}]"#
            }));
        })
        .await;
    let save_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/config/nn/save-new-instance").json_body(json!({
                "inst_name": "cnn",
                "inst_definition": { "layers": [{ "type": "EIIE_Dense" }] },
                "user": "system"
            }));
            then.status(200).json_body(json!({ "is_error": false, "error_msg": "" }));
        })
        .await;
    let update_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/config/nn/update-instance").json_body(json!({
                "instance_to_update": "cnn",
                "instance_definition_to_update": r#"{"layers":[]}"#
            }));
            then.status(200).json_body(json!({
                "is_error": false,
                "error_msg": "",
                "Name": "cnn",
                "Version": 4,
                "Definition": r#"{"layers":[]}"#,
                "CreateUser": "system",
                "CreateDate": "2021-05-01 10:00:00",
                "UpdateDate": "2021-06-01 10:00:00"
            }));
        })
        .await;
    let delete_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/config/nn/delete-instance")
                .json_body(json!({ "instance_to_delete": "cnn", "instance_version_to_delete": 3 }));
            then.status(200)
                .json_body(json!({ "is_error": false, "error_msg": "", "updated_rows": 1 }));
        })
        .await;

    let launcher = launcher(&server);
    let configs = launcher.network_configs().await?;
    assert_eq!(configs[0]["instance_name"], "cnn");

    let saved = launcher
        .save_network_config("cnn", json!({ "layers": [{ "type": "EIIE_Dense" }] }), "system")
        .await?;
    assert_eq!(saved.is_error, Some(false));

    let updated = launcher.update_network_config("cnn", &json!({ "layers": [] })).await?;
    assert_eq!(updated.extra["Version"], 4);

    let deleted = launcher.delete_network_config("cnn", 3).await?;
    assert_eq!(deleted.extra["updated_rows"], 1);

    list_mock.assert_async().await;
    save_mock.assert_async().await;
    update_mock.assert_async().await;
    delete_mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_trained_model_routes() -> Result<()> {
    let server = MockServer::start_async().await;
    let delete_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/models/delete-model-with-key")
                .json_body(json!({ "key": "1700000000" }));
            then.status(200)
                .json_body(json!({ "is_error": false, "error_msg": "", "updated_rows": 1 }));
        })
        .await;
    let label_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/models/update-key-label")
                .json_body(json!({ "key": "1700000000", "label": "keeper" }));
            then.status(200).json_body(json!({
                "is_error": true,
                "error_msg": "no such key",
                "updated_rows": 0
            }));
        })
        .await;
    let chart = json!({ "labels": ["1700000000", "ubah"], "series": [[1.0, 1.1], [1.0, 1.02]] });
    let plot_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/models/plot-results")
                .json_body(json!({ "key": "1700000000", "algos": ["ubah"] }));
            then.status(200).json_body(json!({ "chartData": chart.to_string() }));
        })
        .await;

    let launcher = launcher(&server);
    let deleted = launcher.delete_model("1700000000").await?;
    assert_eq!(deleted.error(), None);

    let relabelled = launcher.relabel_model("1700000000", "keeper").await?;
    assert_eq!(relabelled.is_error, Some(true));
    assert_eq!(relabelled.error(), Some("no such key"));

    let plotted = launcher
        .plot_model_results("1700000000", &["ubah".to_string()])
        .await?;
    assert_eq!(plotted, chart);

    delete_mock.assert_async().await;
    label_mock.assert_async().await;
    plot_mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_blank_model_name_is_validation_error() {
    let server = MockServer::start_async().await;
    let backtest_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/backtesting/run-backtest-for-date-range-with-model");
            then.status(200).json_body(json!({ "is_error": false }));
        })
        .await;

    let err = launcher(&server)
        .run_backtest("   ", "2021-01-01", "2021-04-01")
        .await
        .unwrap_err();

    assert!(matches!(err, ConsoleError::ValidationError { .. }), "{err:?}");
    backtest_mock.assert_hits_async(0).await;
}
