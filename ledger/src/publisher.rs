//! The batch publisher.
//!
//! The publisher confirms its stream is reachable and then, for a fixed
//! number of iterations, builds one batch of payments and puts it in a single
//! call. It is strictly sequential: one batch in flight, no retries. The
//! first error of any kind ends the run.
//!
//! ## Metrics
//!
//! `requests_sent`: Total put calls issued
//! `request_ok`: Put calls that returned a response
//! `request_failure`: Put calls that failed outright
//! `records_written`: Records in accepted put calls
//! `bytes_written`: Payload bytes in accepted put calls
//!

use std::{
    io::{self, Write},
    time::{Duration, Instant},
};

use metrics::counter;
use rand::rngs::StdRng;
use tracing::{debug, info};

use ledger_payload::{Batch, Payments, batch};

use crate::stream::{self, StreamClient};

/// The default number of put calls per run.
pub const DEFAULT_ITERATIONS: u32 = 10;
/// The default number of records per put call.
pub const DEFAULT_BATCH_SIZE: usize = batch::MAXIMUM_RECORDS;

#[derive(thiserror::Error, Debug)]
/// Errors produced by [`Publisher`].
pub enum Error {
    /// See [`crate::stream::Error`] for details.
    #[error(transparent)]
    Stream(#[from] stream::Error),
    /// Building a batch failed, including serialization of any record.
    #[error("Payload error: {0}")]
    Payload(#[from] ledger_payload::Error),
    /// Writing progress output failed.
    #[error("Io error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Configuration of [`Publisher`].
pub struct Config {
    /// Number of batches to put
    pub iterations: u32,
    /// Number of records per batch
    pub batch_size: usize,
    /// Payload generator settings
    pub payment: ledger_payload::payment::Config,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            batch_size: DEFAULT_BATCH_SIZE,
            payment: ledger_payload::payment::Config::default(),
        }
    }
}

/// What a completed run accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    /// Batches accepted
    pub batches: u32,
    /// Records in accepted batches
    pub records: u64,
    /// Payload bytes in accepted batches
    pub bytes: u64,
    /// Wall-clock time of the put loop
    pub elapsed: Duration,
}

#[derive(Debug)]
/// Pushes batches of payments into one stream.
pub struct Publisher<C> {
    client: C,
    stream: String,
    iterations: u32,
    batch_size: usize,
    payments: Payments,
    rng: StdRng,
    metric_labels: Vec<(String, String)>,
}

impl<C> Publisher<C>
where
    C: StreamClient,
{
    /// Create a new [`Publisher`]
    ///
    /// # Errors
    ///
    /// Function will return an error if the configured batch size does not
    /// fit in one put call.
    pub fn new(client: C, stream: String, config: Config, rng: StdRng) -> Result<Self, Error> {
        batch::check_size(config.batch_size)?;

        let metric_labels = vec![
            ("component".to_string(), "publisher".to_string()),
            ("stream".to_string(), stream.clone()),
        ];

        Ok(Self {
            client,
            stream,
            iterations: config.iterations,
            batch_size: config.batch_size,
            payments: Payments::new(&config.payment),
            rng,
            metric_labels,
        })
    }

    /// Run [`Publisher`] to completion, writing progress to `out`.
    ///
    /// The stream is described before any batch is built. Each put response
    /// is written to `out` whole, followed at the end by the elapsed time of
    /// the put loop.
    ///
    /// # Errors
    ///
    /// Function will return an error if the stream cannot be described, if a
    /// batch cannot be built, if a put call fails or if `out` cannot be
    /// written to. Nothing further is sent after an error.
    pub async fn run<W>(mut self, out: &mut W) -> Result<Summary, Error>
    where
        W: Write,
    {
        let summary = self.client.describe_stream(&self.stream).await?;
        info!(
            stream = %summary.name,
            status = summary.status.as_deref().unwrap_or("unknown"),
            shards = summary.shard_count,
            "stream verified"
        );

        writeln!(out, "Sending data to Kinesis")?;
        let labels = &self.metric_labels;

        let mut batches = 0_u32;
        let mut records = 0_u64;
        let mut bytes = 0_u64;
        let start = Instant::now();
        for iteration in 0..self.iterations {
            let batch = Batch::construct(&mut self.rng, &self.payments, self.batch_size)?;
            let batch_records = batch.len() as u64;
            let batch_bytes = batch.total_bytes();

            counter!("requests_sent", labels).increment(1);
            let response = match self.client.put_records(&self.stream, &batch).await {
                Ok(response) => response,
                Err(err) => {
                    debug!("Put {iteration} to {stream} failed", stream = self.stream);
                    counter!("request_failure", labels).increment(1);
                    return Err(err.into());
                }
            };
            counter!("request_ok", labels).increment(1);
            counter!("records_written", labels).increment(batch_records);
            counter!("bytes_written", labels).increment(batch_bytes);
            debug!(
                iteration,
                records = batch_records,
                bytes = batch_bytes,
                "batch accepted"
            );

            writeln!(out, "{response:?}")?;
            batches += 1;
            records += batch_records;
            bytes += batch_bytes;
        }
        let elapsed = start.elapsed();
        writeln!(out, "{elapsed:?}")?;

        Ok(Summary {
            batches,
            records,
            bytes,
            elapsed,
        })
    }
}
