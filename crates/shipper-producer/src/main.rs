//! shipper-producer - Icinga log shipper, producing side
//!
//! Tails an Icinga log file and publishes each host and service event to a
//! durable NATS JetStream subject.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use shipper_bus::{BusConfig, ClientIdentity, Credentials, DEFAULT_NATS_PORT, NatsBus};
use shipper_producer::{Producer, ProducerConfig, RetryPolicy};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "shipper-producer")]
#[command(about = "Tails an Icinga log and publishes its events to NATS")]
#[command(version)]
struct Cli {
    /// Icinga log file to ship
    #[arg(long, env = "SHIPPER_FILE")]
    file: PathBuf,

    /// NATS server host
    #[arg(long, env = "SHIPPER_SERVER")]
    server: String,

    /// NATS server port
    #[arg(long, env = "SHIPPER_PORT", default_value_t = DEFAULT_NATS_PORT)]
    port: u16,

    /// Cluster id, used to namespace streams
    #[arg(long, env = "SHIPPER_CLUSTER", default_value = "test")]
    cluster: String,

    /// NATS user name
    #[arg(long, env = "SHIPPER_USERNAME", requires = "password")]
    username: Option<String>,

    /// NATS password
    #[arg(long, env = "SHIPPER_PASSWORD", requires = "username", hide_env_values = true)]
    password: Option<String>,

    /// Producer name; the client id is `<producer>_<hostname>`
    #[arg(long, env = "SHIPPER_PRODUCER", default_value = "producer")]
    producer: String,

    /// Subject to publish to
    #[arg(long, env = "SHIPPER_SUBJECT", default_value = "icinga")]
    subject: String,

    /// Checkpoint file holding the resume offset
    #[arg(long, env = "SHIPPER_CHECKPOINT", default_value = "seek")]
    checkpoint: PathBuf,

    /// Exit if the log file does not exist instead of waiting for it
    #[arg(long)]
    must_exist: bool,

    /// Save the published offset every N seconds (0 saves only on shutdown)
    #[arg(long, env = "SHIPPER_CHECKPOINT_INTERVAL_SECS", default_value_t = 0)]
    checkpoint_interval_secs: u64,

    /// Capacity of the queue between tailer and publisher
    #[arg(long, default_value_t = 1024)]
    queue_capacity: usize,

    /// Publish attempts per event before it is dropped
    #[arg(long, default_value_t = 3)]
    publish_attempts: u32,

    /// Timeout for each bus request, in seconds
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,

    /// Time allowed to publish queued events on shutdown, in seconds
    #[arg(long, default_value_t = 5)]
    drain_timeout_secs: u64,
}

impl Cli {
    fn bus_config(&self) -> BusConfig {
        let mut config = BusConfig::new(self.server.clone(), self.cluster.clone())
            .with_port(self.port)
            .with_request_timeout(Duration::from_secs(self.timeout_secs));
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            config = config.with_credentials(Credentials::new(username.clone(), password.clone()));
        }
        config
    }

    fn producer_config(&self) -> ProducerConfig {
        let interval = (self.checkpoint_interval_secs > 0)
            .then(|| Duration::from_secs(self.checkpoint_interval_secs));
        ProducerConfig::new(self.file.clone())
            .with_checkpoint(self.checkpoint.clone())
            .with_topic(self.subject.clone())
            .with_must_exist(self.must_exist)
            .with_queue_capacity(self.queue_capacity)
            .with_checkpoint_interval(interval)
            .with_drain_timeout(Duration::from_secs(self.drain_timeout_secs))
            .with_retry(RetryPolicy::default().with_max_attempts(self.publish_attempts))
    }
}

/// Parses arguments, printing usage to stdout on error.
fn parse_args() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            println!("{}", e.render());
            std::process::exit(e.exit_code());
        }
        Err(e) => e.exit(),
    }
}

/// Cancels `token` on SIGINT or SIGTERM.
fn spawn_signal_handler(token: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut term) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = term.recv() => {}
                    }
                }
                Err(e) => {
                    error!(error = %e, "cannot install SIGTERM handler");
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        info!("shutdown requested");
        token.cancel();
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = parse_args();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let identity = ClientIdentity::for_this_host(cli.producer.clone())?;
    let config = cli.producer_config();
    config.validate()?;

    let bus = match NatsBus::connect(&cli.bus_config(), &identity).await {
        Ok(bus) => bus,
        Err(e) => {
            error!(error = %e, "cannot connect to bus");
            return Err(e.into());
        }
    };

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let report = Producer::new(config, bus).run(shutdown).await?;
    info!(
        published = report.published,
        dropped = report.dropped,
        checkpoint = report.checkpoint,
        "producer exited"
    );
    Ok(())
}
