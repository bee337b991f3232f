use clap::Parser;
use research_console::config::{CliConfig, Command, TrainingOverrides};
use research_console::core::ConfigProvider;
use research_console::domain::channel::ChannelSpec;
use research_console::domain::model::{SessionEvent, ValidationVerdict};
use research_console::utils::error::{ConsoleError, ErrorSeverity, Result};
use research_console::utils::logger;
use research_console::utils::validation::{validate_url, HTTP_SCHEMES, WS_SCHEMES};
use research_console::{
    months_between, validate_minimum_span, HttpJobApi, JobLauncher, StreamSession, WebSocketTransport,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting research-console");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    if let Err(e) = run(&cli).await {
        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low | ErrorSeverity::High => 1,
            ErrorSeverity::Medium => 2, // 可重試
            ErrorSeverity::Critical => 3,
        };
        std::process::exit(exit_code);
    }
}

async fn run(cli: &CliConfig) -> Result<()> {
    let provider = cli.provider()?;

    match &cli.command {
        Command::Validate { start, end } => {
            println!("Span: {} months", months_between(start, end));
            match validate_minimum_span(start, end, provider.min_months()) {
                ValidationVerdict::Valid => {
                    println!("✅ Valid");
                    Ok(())
                }
                ValidationVerdict::Invalid { reason } => Err(ConsoleError::ValidationError { message: reason }),
            }
        }
        Command::Train { start, end, .. } => {
            let params = cli.command.apply_to(provider.training_defaults());
            let response = launcher(provider.as_ref())?
                .train_one_shot(&params, start, end)
                .await?;
            print_json(&response)
        }
        Command::Download { start, end, .. } => {
            let params = cli.command.apply_to(provider.training_defaults());
            let response = launcher(provider.as_ref())?
                .download_historical_data(params.coin_number, start, end)
                .await?;
            print_json(&response)
        }
        Command::Backtest { start, end, model } => {
            let response = launcher(provider.as_ref())?.run_backtest(model, start, end).await?;
            print_json(&response)
        }
        Command::Models { all } => {
            let launcher = launcher(provider.as_ref())?;
            if *all {
                print_json(&launcher.all_models().await?)
            } else {
                print_lines(launcher.model_names().await?)
            }
        }
        Command::DeleteModel { key } => print_json(&launcher(provider.as_ref())?.delete_model(key).await?),
        Command::RelabelModel { key, label } => {
            print_json(&launcher(provider.as_ref())?.relabel_model(key, label).await?)
        }
        Command::PlotModel { key, algos } => {
            print_json(&launcher(provider.as_ref())?.plot_model_results(key, algos).await?)
        }
        Command::Networks => print_json(&launcher(provider.as_ref())?.network_configs().await?),
        Command::SaveNetwork {
            name,
            definition_file,
            user,
        } => {
            let definition = read_definition(definition_file)?;
            let response = launcher(provider.as_ref())?
                .save_network_config(name, definition, user)
                .await?;
            print_json(&response)
        }
        Command::UpdateNetwork { name, definition_file } => {
            let definition = read_definition(definition_file)?;
            let response = launcher(provider.as_ref())?
                .update_network_config(name, &definition)
                .await?;
            print_json(&response)
        }
        Command::DeleteNetwork { name, version } => {
            print_json(&launcher(provider.as_ref())?.delete_network_config(name, *version).await?)
        }
        Command::Algos => print_lines(launcher(provider.as_ref())?.benchmark_algos().await?),
        Command::DataRange => print_json(&launcher(provider.as_ref())?.data_date_range().await?),
        Command::Coins => print_lines(launcher(provider.as_ref())?.available_coins().await?),
        Command::History { coins, start, end } => {
            let rows = launcher(provider.as_ref())?
                .price_history(coins, start.as_deref(), end.as_deref())
                .await?;
            print_json(&rows)
        }
        Command::Tail {
            channel,
            symbol,
            stream,
        } => tail(provider.as_ref(), channel, symbol.as_deref(), stream.as_deref()).await,
        Command::Echo { message, wait } => echo(provider.as_ref(), message, Duration::from_secs(*wait)).await,
    }
}

fn launcher(provider: &dyn ConfigProvider) -> Result<JobLauncher<HttpJobApi>> {
    let base_url = validate_url("api_base_url", provider.api_base_url(), HTTP_SCHEMES)?;
    let api = HttpJobApi::new(base_url, provider.request_timeout())?;
    Ok(JobLauncher::new(api, provider.min_months()))
}

fn session(provider: &dyn ConfigProvider, channel: ChannelSpec) -> Result<StreamSession<WebSocketTransport>> {
    let base_url = validate_url("stream_base_url", provider.stream_base_url(), WS_SCHEMES)?;
    let transport = WebSocketTransport::new(base_url, provider.connect_timeout());
    Ok(StreamSession::new(Arc::new(transport), channel, provider.buffer_capacity()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_lines(lines: Vec<String>) -> Result<()> {
    for line in lines {
        println!("{}", line);
    }
    Ok(())
}

fn read_definition(path: &str) -> Result<serde_json::Value> {
    tracing::debug!("Reading network definition from {}", path);
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

async fn tail(provider: &dyn ConfigProvider, key: &str, symbol: Option<&str>, stream: Option<&str>) -> Result<()> {
    let mut channel = provider.channels().get(key)?.clone();
    if channel.key == ChannelSpec::TICKER && (symbol.is_some() || stream.is_some()) {
        channel = ChannelSpec::exchange_ticker(symbol.unwrap_or("btcusdt"), stream.unwrap_or("trade"));
    }

    let session = session(provider, channel)?;
    let (tx, mut events) = mpsc::unbounded_channel();
    let _subscription = session.subscribe(move |event| {
        let _ = tx.send(event.clone());
    });
    session.start()?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(SessionEvent::Connected) => {
                    tracing::info!("📡 Streaming '{}' (Ctrl-C to stop)", session.channel().key);
                }
                Some(SessionEvent::Message(line)) => println!("{}", line),
                Some(SessionEvent::Failed { reason }) => {
                    return Err(ConsoleError::TransportError { message: reason });
                }
                Some(SessionEvent::Disconnected) | None => break,
            },
            _ = &mut ctrl_c => {
                session.stop();
                break;
            }
        }
    }

    tracing::info!("📊 {} lines in console buffer", session.buffer().len());
    Ok(())
}

async fn echo(provider: &dyn ConfigProvider, message: &str, wait: Duration) -> Result<()> {
    let channel = provider.channels().get(ChannelSpec::ECHO)?.clone();
    let session = session(provider, channel)?;
    let (tx, mut events) = mpsc::unbounded_channel();
    let _subscription = session.subscribe(move |event| {
        let _ = tx.send(event.clone());
    });
    session.start()?;

    let deadline = tokio::time::Instant::now() + provider.connect_timeout() + wait;
    let mut sent = false;
    loop {
        let event = tokio::time::timeout_at(deadline, events.recv())
            .await
            .map_err(|_| ConsoleError::TransportError {
                message: "no echo received before the deadline".to_string(),
            })?;

        match event {
            Some(SessionEvent::Connected) if !sent => {
                session.send(message)?;
                sent = true;
            }
            Some(SessionEvent::Message(reply)) => {
                println!("{}", reply);
                session.stop();
                return Ok(());
            }
            Some(SessionEvent::Failed { reason }) => {
                return Err(ConsoleError::TransportError { message: reason });
            }
            Some(SessionEvent::Connected) => {}
            Some(SessionEvent::Disconnected) | None => {
                return Err(ConsoleError::TransportError {
                    message: "echo session ended without a reply".to_string(),
                });
            }
        }
    }
}
