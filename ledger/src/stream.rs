//! The stream client seam.
//!
//! [`StreamClient`] is everything the publisher needs from the broker: a way
//! to confirm the stream is there and a way to put one batch. [`KinesisClient`]
//! speaks to AWS Kinesis, tests substitute their own implementation.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_kinesis::{
    Client,
    config::Credentials,
    error::{BuildError, DisplayErrorContext},
    operation::put_records::PutRecordsOutput,
    primitives::Blob,
    types::{PutRecordsRequestEntry, StreamDescription},
};
use tracing::debug;

use ledger_payload::Batch;

use crate::config::Config;

const CREDENTIALS_PROVIDER: &str = "ledger-environment";

fn with_causes(err: &aws_sdk_kinesis::Error) -> DisplayErrorContext<&aws_sdk_kinesis::Error> {
    DisplayErrorContext(err)
}

#[derive(thiserror::Error, Debug)]
/// Errors produced by [`StreamClient`] implementations.
pub enum Error {
    /// The stream could not be described
    #[error("Failed to describe stream {stream}: {}", with_causes(.source))]
    Describe {
        /// Target stream
        stream: String,
        /// Underlying service error
        #[source]
        source: Box<aws_sdk_kinesis::Error>,
    },
    /// The put call itself failed
    #[error("Failed to put records to stream {stream}: {}", with_causes(.source))]
    PutRecords {
        /// Target stream
        stream: String,
        /// Underlying service error
        #[source]
        source: Box<aws_sdk_kinesis::Error>,
    },
    /// A request entry could not be built
    #[error("Failed to build request entry: {0}")]
    Entry(#[from] BuildError),
}

/// What a describe call tells us about the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSummary {
    /// Stream name
    pub name: String,
    /// Stream ARN, if reported
    pub arn: Option<String>,
    /// Stream status, if reported
    pub status: Option<String>,
    /// Number of shards in the description
    pub shard_count: usize,
}

impl StreamSummary {
    fn from_description(name: &str, description: Option<&StreamDescription>) -> Self {
        match description {
            Some(desc) => Self {
                name: desc.stream_name().to_string(),
                arn: Some(desc.stream_arn().to_string()),
                status: Some(desc.stream_status().as_str().to_string()),
                shard_count: desc.shards().len(),
            },
            None => Self {
                name: name.to_string(),
                arn: None,
                status: None,
                shard_count: 0,
            },
        }
    }
}

/// Outcome of one record within a put call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordResult {
    /// Shard the record landed on
    pub shard_id: Option<String>,
    /// Sequence number assigned by the shard
    pub sequence_number: Option<String>,
    /// Per-record error code
    pub error_code: Option<String>,
    /// Per-record error message
    pub error_message: Option<String>,
}

/// The response of one put call, rendered whole to the operator.
///
/// Per-record failures are carried here but nothing downstream inspects
/// them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutRecordsResponse {
    /// Number of records the service rejected
    pub failed_record_count: Option<i32>,
    /// Server side encryption in effect
    pub encryption_type: Option<String>,
    /// One result per submitted record, in submission order
    pub records: Vec<RecordResult>,
}

impl From<PutRecordsOutput> for PutRecordsResponse {
    fn from(output: PutRecordsOutput) -> Self {
        Self {
            failed_record_count: output.failed_record_count(),
            encryption_type: output.encryption_type().map(|e| e.as_str().to_string()),
            records: output
                .records()
                .iter()
                .map(|entry| RecordResult {
                    shard_id: entry.shard_id().map(str::to_string),
                    sequence_number: entry.sequence_number().map(str::to_string),
                    error_code: entry.error_code().map(str::to_string),
                    error_message: entry.error_message().map(str::to_string),
                })
                .collect(),
        }
    }
}

#[async_trait]
/// The broker operations the publisher relies on
pub trait StreamClient {
    /// Describe `stream`, failing if it cannot be reached.
    async fn describe_stream(&self, stream: &str) -> Result<StreamSummary, Error>;
    /// Put every record of `batch` into `stream` in a single call.
    async fn put_records(&self, stream: &str, batch: &Batch)
    -> Result<PutRecordsResponse, Error>;
}

#[derive(Debug, Clone)]
/// A [`StreamClient`] speaking to AWS Kinesis.
pub struct KinesisClient {
    client: Client,
}

impl KinesisClient {
    /// Create a new [`KinesisClient`] from static connection settings.
    ///
    /// No network traffic happens here. An empty endpoint leaves endpoint
    /// resolution to the SDK and an empty session token is treated as
    /// absent.
    pub async fn connect(config: &Config) -> Self {
        let sdk_config = sdk_config(config).await;
        debug!(region = %config.region, endpoint = %config.endpoint, "built kinesis client");

        Self {
            client: Client::new(&sdk_config),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

async fn sdk_config(config: &Config) -> SdkConfig {
    let credentials = Credentials::new(
        config.access_key_id.clone(),
        config.secret_access_key.clone(),
        non_empty(&config.session_token),
        None,
        CREDENTIALS_PROVIDER,
    );

    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.region.clone()))
        .credentials_provider(credentials);
    if let Some(endpoint) = non_empty(&config.endpoint) {
        loader = loader.endpoint_url(endpoint);
    }
    loader.load().await
}

#[async_trait]
impl StreamClient for KinesisClient {
    async fn describe_stream(&self, stream: &str) -> Result<StreamSummary, Error> {
        let output = self
            .client
            .describe_stream()
            .stream_name(stream)
            .send()
            .await
            .map_err(|err| Error::Describe {
                stream: stream.to_string(),
                source: Box::new(aws_sdk_kinesis::Error::from(err)),
            })?;
        Ok(StreamSummary::from_description(
            stream,
            output.stream_description(),
        ))
    }

    async fn put_records(
        &self,
        stream: &str,
        batch: &Batch,
    ) -> Result<PutRecordsResponse, Error> {
        let entries = batch
            .records()
            .iter()
            .map(|record| {
                PutRecordsRequestEntry::builder()
                    .data(Blob::new(record.data.to_vec()))
                    .partition_key(record.partition_key)
                    .build()
            })
            .collect::<Result<Vec<_>, _>>()?;

        let output = self
            .client
            .put_records()
            .stream_name(stream)
            .set_records(Some(entries))
            .send()
            .await
            .map_err(|err| Error::PutRecords {
                stream: stream.to_string(),
                source: Box::new(aws_sdk_kinesis::Error::from(err)),
            })?;
        Ok(output.into())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use aws_sdk_kinesis::{
        operation::put_records::PutRecordsOutput,
        types::{EncryptionType, PutRecordsResultEntry},
    };
    use base64::{Engine, engine::general_purpose::STANDARD};
    use ledger_payload::{
        Batch, Payments,
        batch::{MAXIMUM_RECORDS, PARTITION_KEY},
    };
    use rand::{SeedableRng, rngs::SmallRng};
    use warp::{Filter, http::StatusCode};

    use super::{
        Error, KinesisClient, PutRecordsResponse, RecordResult, StreamClient, StreamSummary,
        sdk_config,
    };
    use crate::config::Config;

    /// One request as seen by [`fake_kinesis`].
    #[derive(Debug)]
    struct Captured {
        target: String,
        security_token: Option<String>,
        body: serde_json::Value,
    }

    /// Serve `reply` with `status` to every request on an ephemeral port,
    /// recording what was sent.
    fn fake_kinesis(status: StatusCode, reply: String) -> (String, Arc<Mutex<Vec<Captured>>>) {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&captured);
        let route = warp::post()
            .and(warp::header::<String>("x-amz-target"))
            .and(warp::header::optional::<String>("x-amz-security-token"))
            .and(warp::body::bytes())
            .map(
                move |target: String,
                      security_token: Option<String>,
                      body: warp::hyper::body::Bytes| {
                    let body = serde_json::from_slice(&body).expect("request body is not json");
                    sink.lock().expect("lock poisoned").push(Captured {
                        target,
                        security_token,
                        body,
                    });
                    warp::reply::with_status(
                        warp::reply::with_header(
                            reply.clone(),
                            "content-type",
                            "application/x-amz-json-1.1",
                        ),
                        status,
                    )
                },
            );

        let (addr, serve_fut) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        let _server_handle = tokio::spawn(serve_fut);
        (format!("http://{addr}"), captured)
    }

    fn local_config(endpoint: String) -> Config {
        Config {
            stream: "payments".to_string(),
            region: "us-east-1".to_string(),
            endpoint,
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: String::new(),
        }
    }

    fn batch_of(size: usize) -> Batch {
        let mut rng = SmallRng::seed_from_u64(7);
        Batch::construct(&mut rng, &Payments::default(), size).expect("failed to construct batch")
    }

    #[tokio::test]
    async fn put_sends_every_record_in_one_request() {
        let accepted = vec![r#"{"SequenceNumber":"1","ShardId":"shardId-000000000000"}"#; MAXIMUM_RECORDS];
        let reply = format!(
            r#"{{"FailedRecordCount":0,"Records":[{}]}}"#,
            accepted.join(",")
        );
        let (endpoint, captured) = fake_kinesis(StatusCode::OK, reply);
        let client = KinesisClient::connect(&local_config(endpoint)).await;
        let batch = batch_of(MAXIMUM_RECORDS);

        let response = client
            .put_records("payments", &batch)
            .await
            .expect("put should succeed");
        assert_eq!(response.failed_record_count, Some(0));
        assert_eq!(response.records.len(), MAXIMUM_RECORDS);

        let captured = captured.lock().expect("lock poisoned");
        assert_eq!(captured.len(), 1);
        let request = &captured[0];
        assert_eq!(request.target, "Kinesis_20131202.PutRecords");
        assert_eq!(request.security_token, None);
        assert_eq!(request.body["StreamName"], "payments");
        let entries = request.body["Records"]
            .as_array()
            .expect("records are not an array");
        assert_eq!(entries.len(), MAXIMUM_RECORDS);
        for (entry, record) in entries.iter().zip(batch.records()) {
            assert_eq!(entry["PartitionKey"], PARTITION_KEY);
            let data = STANDARD
                .decode(entry["Data"].as_str().expect("data is not a string"))
                .expect("data is not base64");
            assert!(data.ends_with(b"\n"));
            assert_eq!(&data[..], &record.data[..]);
        }
    }

    #[tokio::test]
    async fn rejected_put_is_put_records_error() {
        let reply = r#"{"__type":"ResourceNotFoundException","message":"Stream payments not found"}"#;
        let (endpoint, captured) = fake_kinesis(StatusCode::BAD_REQUEST, reply.to_string());
        let config = Config {
            session_token: "sesame".to_string(),
            ..local_config(endpoint)
        };
        let client = KinesisClient::connect(&config).await;

        let err = client
            .put_records("payments", &batch_of(3))
            .await
            .expect_err("put should fail");
        match &err {
            Error::PutRecords { stream, source } => {
                assert_eq!(stream, "payments");
                assert!(matches!(
                    **source,
                    aws_sdk_kinesis::Error::ResourceNotFoundException(_)
                ));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("Stream payments not found"));

        let captured = captured.lock().expect("lock poisoned");
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].security_token.as_deref(), Some("sesame"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_reports_cause() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("failed to bind");
        let addr = listener.local_addr().expect("no local address");
        drop(listener);
        let client = KinesisClient::connect(&local_config(format!("http://{addr}"))).await;

        let err = client
            .describe_stream("payments")
            .await
            .expect_err("nothing is listening");
        let rendered = err.to_string();
        assert!(rendered.starts_with("Failed to describe stream payments: unhandled error"));
        assert!(rendered.contains("dispatch failure"), "{rendered}");
    }

    #[tokio::test]
    async fn empty_endpoint_leaves_resolution_to_sdk() {
        let default = sdk_config(&local_config(String::new())).await;
        assert_eq!(default.endpoint_url(), None);

        let local = sdk_config(&local_config("http://localhost:4566".to_string())).await;
        assert_eq!(local.endpoint_url(), Some("http://localhost:4566"));
    }

    #[test]
    fn summary_without_description_keeps_requested_name() {
        let summary = StreamSummary::from_description("payments", None);
        assert_eq!(summary.name, "payments");
        assert_eq!(summary.arn, None);
        assert_eq!(summary.shard_count, 0);
    }

    #[test]
    fn response_keeps_partial_failures_verbatim() {
        let output = PutRecordsOutput::builder()
            .failed_record_count(1)
            .encryption_type(EncryptionType::None)
            .records(
                PutRecordsResultEntry::builder()
                    .shard_id("shardId-000000000000")
                    .sequence_number("1")
                    .build(),
            )
            .records(
                PutRecordsResultEntry::builder()
                    .error_code("ProvisionedThroughputExceededException")
                    .error_message("Rate exceeded")
                    .build(),
            )
            .build()
            .expect("output should build");

        let response = PutRecordsResponse::from(output);
        assert_eq!(response.failed_record_count, Some(1));
        assert_eq!(response.encryption_type.as_deref(), Some("NONE"));
        assert_eq!(
            response.records,
            vec![
                RecordResult {
                    shard_id: Some("shardId-000000000000".to_string()),
                    sequence_number: Some("1".to_string()),
                    ..RecordResult::default()
                },
                RecordResult {
                    error_code: Some("ProvisionedThroughputExceededException".to_string()),
                    error_message: Some("Rate exceeded".to_string()),
                    ..RecordResult::default()
                },
            ]
        );
    }
}
