use std::{io, net::SocketAddr, path::PathBuf};

use clap::Parser;
use ledger::{
    config::{self, Config},
    publisher::{self, Publisher},
    stream::KinesisClient,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use rand::{SeedableRng, rngs::StdRng};
use time::{Date, format_description::BorrowedFormatItem, macros::format_description};
use tokio::runtime::{Builder, Runtime};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, util::SubscriberInitExt};

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

#[derive(thiserror::Error, Debug)]
enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("Publisher returned an error: {0}")]
    Publisher(#[from] publisher::Error),
    #[error("Failed to install prometheus recorder: {0}")]
    Prometheus(#[from] metrics_exporter_prometheus::BuildError),
}

fn parse_date(input: &str) -> Result<Date, String> {
    Date::parse(input, DATE_FORMAT).map_err(|err| format!("expected YYYY-MM-DD: {err}"))
}

#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
struct Cli {
    /// path of the file seeding the environment, ignored if absent
    #[clap(long, default_value_os_t = config::default_env_file())]
    env_file: PathBuf,
    /// number of batches to put
    #[clap(long, default_value_t = publisher::DEFAULT_ITERATIONS)]
    iterations: u32,
    /// number of records per batch, at most 500
    #[clap(long, default_value_t = publisher::DEFAULT_BATCH_SIZE)]
    batch_size: usize,
    /// seed for payload generation, random if not given
    #[clap(long)]
    seed: Option<u64>,
    /// effective date stamped on every ledger entry
    #[clap(long, default_value = "2022-01-01", value_parser = parse_date)]
    effective_date: Date,
    /// address to bind a prometheus exporter to, served only while the run
    /// is in progress
    #[clap(long)]
    prometheus_addr: Option<SocketAddr>,
}

async fn inner_main(cli: Cli, config: Config) -> Result<(), Error> {
    if let Some(addr) = cli.prometheus_addr {
        PrometheusBuilder::new().with_http_listener(addr).install()?;
        info!("Prometheus exporter listening on {addr}");
    }

    let rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let publisher_config = publisher::Config {
        iterations: cli.iterations,
        batch_size: cli.batch_size,
        payment: ledger_payload::payment::Config {
            effective_date: cli.effective_date,
        },
    };

    let client = KinesisClient::connect(&config).await;
    let publisher = Publisher::new(client, config.stream.clone(), publisher_config, rng)?;

    let mut stdout = io::stdout().lock();
    let summary = publisher.run(&mut stdout).await?;
    info!(
        batches = summary.batches,
        records = summary.records,
        bytes = summary.bytes,
        "Run complete in {:?}",
        summary.elapsed
    );
    Ok(())
}

/// The run itself is sequential. With an exporter a second worker answers
/// scrapes while batches are being built.
fn build_runtime(cli: &Cli) -> io::Result<Runtime> {
    let mut builder = if cli.prometheus_addr.is_some() {
        let mut builder = Builder::new_multi_thread();
        builder.worker_threads(2);
        builder
    } else {
        Builder::new_current_thread()
    };
    builder.enable_io().enable_time().build()
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(false)
        .with_writer(io::stderr)
        .finish()
        .init();

    let cli = Cli::parse();
    let version = env!("CARGO_PKG_VERSION");
    info!("Starting ledger {version} run.");

    let config = Config::load(&cli.env_file);
    info!(stream = %config.stream, region = %config.region, "Loaded configuration");

    let runtime = build_runtime(&cli)?;
    let res = runtime.block_on(inner_main(cli, config));
    if let Err(err) = &res {
        error!("Run failed: {err}");
    }
    res
}
