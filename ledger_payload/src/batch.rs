//! Construct record batches for use by the publisher.
//!
//! A batch is the unit of one `PutRecords` call: a run of independently
//! serialized records, each tagged with the partition key the broker routes
//! on. Batches are built fresh per call, nothing is cached.

use bytes::{BufMut, Bytes, BytesMut, buf::Writer};
use rand::Rng;
use tracing::trace;

use crate::Error;

/// The partition key carried by every record.
///
/// All records land on the same shard as a result.
pub const PARTITION_KEY: &str = "ledger";
/// The largest number of records a single put accepts.
pub const MAXIMUM_RECORDS: usize = 500;

/// A single serialized record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// The key the broker uses to route this record
    pub partition_key: &'static str,
    /// The newline terminated bytes of this record
    pub data: Bytes,
}

/// A batch of records destined for one put call
#[derive(Debug, Clone)]
pub struct Batch {
    records: Vec<Record>,
    total_bytes: u64,
}

/// Check that `size` records fit into one batch.
///
/// # Errors
///
/// Returns [`Error::BatchSize`] if `size` is zero or above
/// [`MAXIMUM_RECORDS`].
pub fn check_size(size: usize) -> Result<(), Error> {
    if size == 0 || size > MAXIMUM_RECORDS {
        return Err(Error::BatchSize {
            requested: size,
            maximum: MAXIMUM_RECORDS,
        });
    }
    Ok(())
}

impl Batch {
    /// Construct a new batch of `size` records of form defined by
    /// `serializer`.
    ///
    /// # Errors
    ///
    /// Function will return an error if `size` is out of bounds or if any
    /// single record fails to serialize. No partial batch is returned.
    pub fn construct<R, S>(rng: &mut R, serializer: &S, size: usize) -> Result<Self, Error>
    where
        S: crate::Serialize,
        R: Rng + ?Sized,
    {
        check_size(size)?;

        let mut records = Vec::with_capacity(size);
        let mut total_bytes = 0_u64;
        for _ in 0..size {
            let record = construct_record(rng, serializer)?;
            total_bytes += record.data.len() as u64;
            records.push(record);
        }
        trace!(records = records.len(), total_bytes, "constructed batch");

        Ok(Self {
            records,
            total_bytes,
        })
    }

    /// The records of this batch, in construction order.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// The number of records in this batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether this batch holds no records. Constructed batches never are.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The sum of the payload bytes of every record.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }
}

#[inline]
fn construct_record<R, S>(rng: &mut R, serializer: &S) -> Result<Record, Error>
where
    S: crate::Serialize,
    R: Rng + ?Sized,
{
    let mut writer: Writer<BytesMut> = BytesMut::new().writer();
    serializer.to_bytes(rng, &mut writer)?;
    Ok(Record {
        partition_key: PARTITION_KEY,
        data: writer.into_inner().freeze(),
    })
}
