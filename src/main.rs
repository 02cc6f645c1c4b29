use anyhow::Context;
use clap::Parser;
use kafka_forwarder::config::{LogConfig, DEFAULT_CONFIG_PATH};
use kafka_forwarder::forward::CredentialMap;
use kafka_forwarder::logging::{self, LogRotation};
use kafka_forwarder::process::{self, Action, ControlCommand, PidFile, APP_NAME};
use kafka_forwarder::{Config, ConsumerLoop, KafkaSource, Pipeline};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "kafka-forwarder")]
#[command(about = "Forwards Kafka records to an HTTP sink", long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[arg(short, long, help = "Run as daemon")]
    daemon: bool,

    #[arg(short, long, value_enum, help = "Control a running instance")]
    signal: Option<ControlCommand>,

    #[arg(short, long, help = "Enable JSON output for logs")]
    json_logs: bool,

    #[arg(short, long, help = "Verbose logging")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match Config::from_file(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("load {:?} err: {}", args.config, e);
            std::process::exit(1);
        }
    };

    init_logging(&config.log, config.log_file().as_deref(), args.json_logs, args.verbose)
        .context("initialize logging")?;

    if let Err(e) = config.validate() {
        error!("{}", e);
        return Err(e).context("validate configuration");
    }

    if !process::is_daemon_child() {
        let pid_file = PidFile::new(config.pid_file());
        match process::dispatch(args.signal, args.daemon, &pid_file)? {
            Action::Exit(code) => std::process::exit(code),
            Action::Daemonize => {
                let pid = process::daemonize(&pid_file)?;
                println!("daemon started with PID {}", pid);
                std::process::exit(0);
            }
            Action::Run => {}
        }
    }

    info!(
        sink_url = %config.forward.url,
        concurrency = config.forward.concurrency,
        max_retries = config.forward.max_retries,
        compress = config.forward.compress,
        kafka_brokers = ?config.kafka.brokers,
        kafka_topic = %config.kafka.topic,
        kafka_group_id = %config.kafka.group_id,
        "Configuration summary"
    );

    let credentials = CredentialMap::from_config(&config.app_id).context("load app-id tokens")?;
    for app_id in credentials.app_ids() {
        info!(app_id, "Forwarding enabled for app-id");
    }

    let source = KafkaSource::new(&config.kafka).context("create Kafka consumer")?;
    let pipeline = Arc::new(Pipeline::from_config(&config.forward, credentials).context("start pipeline")?);

    let cancel = CancellationToken::new();
    let consumer = ConsumerLoop::new(source, pipeline.clone()).spawn(cancel.clone());

    shutdown_signal().await.context("listen for shutdown signals")?;
    info!("{} shutting down", APP_NAME);

    // Stop intake first, then let the workers drain the queue.
    cancel.cancel();
    match consumer.await {
        Ok(Ok(enqueued)) => info!(enqueued, "Consumer stopped"),
        Ok(Err(e)) => error!(error = %e, "Consumer stopped with error"),
        Err(e) => error!(error = %e, "Consumer task panicked"),
    }
    pipeline.stop().await;

    info!("{} exit", APP_NAME);
    Ok(())
}

fn init_logging(log: &LogConfig, log_file: Option<&Path>, json: bool, verbose: bool) -> anyhow::Result<()> {
    if !log.dir.is_empty() {
        std::fs::create_dir_all(&log.dir).with_context(|| format!("make log dir {}", log.dir))?;
    }

    let env_filter = if verbose {
        EnvFilter::new("kafka_forwarder=debug,info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("kafka_forwarder={},warn", level_directive(&log.level))))
    };

    let (writer, ansi) = match log_file {
        Some(path) => {
            let file = logging::rotating_file(path, LogRotation::from_config(log));
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stdout), true),
    };

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(false)
            .with_writer(writer)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_ansi(ansi)
            .with_writer(writer)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    Ok(())
}

fn level_directive(level: &str) -> &'static str {
    match level.to_ascii_lowercase().as_str() {
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    }
}

async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    #[cfg(unix)]
    let sigterm = terminate.recv();

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<Option<()>>();

    tokio::select! {
        result = signal::ctrl_c() => {
            result?;
            info!("Received SIGINT");
        }
        _ = sigterm => {
            info!("Received SIGTERM");
        }
    }

    Ok(())
}
