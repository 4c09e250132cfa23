//! shipper-consumer - Icinga log shipper, consuming side
//!
//! Durably subscribes to shipped Icinga events and indexes each one into
//! Elasticsearch under `logstash-YYYY.MM.DD`.

use std::time::Duration;

use clap::Parser;
use shipper_bus::{
    BusConfig, ClientIdentity, Credentials, DEFAULT_NATS_PORT, NatsBus, StartPolicy,
};
use shipper_consumer::{Consumer, ConsumerConfig};
use shipper_index::{ElasticsearchConfig, ElasticsearchStore};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "shipper-consumer")]
#[command(about = "Indexes Icinga events from NATS into Elasticsearch")]
#[command(version)]
struct Cli {
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

    /// Consumer name; the durable is `<consumer>_<hostname><queue-group>`
    #[arg(long, env = "SHIPPER_CONSUMER", default_value = "consumer")]
    consumer: String,

    /// Subject to subscribe to
    #[arg(long, env = "SHIPPER_SUBJECT", default_value = "icinga")]
    subject: String,

    /// Queue group shared by load-balanced consumers. It is appended to the
    /// durable name, so members share work only when their `--consumer`
    /// names and hostnames also match
    #[arg(long, env = "SHIPPER_QUEUE_GROUP")]
    queue_group: Option<String>,

    /// Elasticsearch base URL
    #[arg(long, env = "SHIPPER_ES", default_value = "http://localhost:9200")]
    es: String,

    /// Messages indexed concurrently
    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// Deliver only messages published after a new durable is created
    #[arg(long)]
    start_new: bool,

    /// Delete the durable cursor on exit
    #[arg(long)]
    delete_durable_on_exit: bool,

    /// Timeout for each bus and index request, in seconds
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,
}

impl Cli {
    fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn bus_config(&self) -> BusConfig {
        let mut config = BusConfig::new(self.server.clone(), self.cluster.clone())
            .with_port(self.port)
            .with_request_timeout(self.timeout());
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            config = config.with_credentials(Credentials::new(username.clone(), password.clone()));
        }
        config
    }

    fn consumer_config(&self, identity: &ClientIdentity) -> ConsumerConfig {
        let start = if self.start_new {
            StartPolicy::New
        } else {
            StartPolicy::DeliverAll
        };
        ConsumerConfig::new(identity.durable_name(self.queue_group.as_deref()))
            .with_topic(self.subject.clone())
            .with_queue_group(self.queue_group.clone())
            .with_start(start)
            .with_delete_durable_on_exit(self.delete_durable_on_exit)
            .with_worker_count(self.workers)
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

    let identity = ClientIdentity::for_this_host(cli.consumer.clone())?;
    let config = cli.consumer_config(&identity);
    config.validate()?;

    let store = ElasticsearchStore::new(
        ElasticsearchConfig::new(cli.es.clone()).with_timeout(cli.timeout()),
    )?;
    let bus = match NatsBus::connect(&cli.bus_config(), &identity).await {
        Ok(bus) => bus,
        Err(e) => {
            error!(error = %e, "cannot connect to bus");
            return Err(e.into());
        }
    };

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let report = Consumer::new(config, bus, store).run(shutdown).await?;
    info!(
        handled = report.handled,
        failed = report.failed,
        "consumer exited"
    );
    Ok(())
}
