//! Payment payload.
//!
//! Every payment carries two ledger entries: the charge itself and a flat
//! fee. Identifiers are random and make no claim to uniqueness.

use std::io::Write;

use rand::Rng;
use serde::{Deserialize, Serialize};
use time::{Date, macros::date};

use crate::{Error, Generator};

/// Exclusive upper bound of a charge amount.
pub const CHARGE_AMOUNT_LIMIT: u64 = 10_000_000;
/// The amount of every `charge_fee` entry.
pub const FEE_AMOUNT: u64 = 10;
/// Exclusive upper bound of merchant and payment identifiers.
pub const ID_LIMIT: u32 = 10_000;
/// The installment number of every entry.
pub const INSTALLMENT: u32 = 1;

/// The kind of a ledger [`Entry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// The amount charged to the customer
    Charge,
    /// The fee taken on the charge
    ChargeFee,
}

/// A single ledger entry of a [`Payment`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Whether this is a charge or its fee
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Amount in minor units
    pub amount: u64,
    /// Installment number, always 1
    pub installment: u32,
    /// Calendar date the entry takes effect, `YYYY-MM-DD`
    pub effective_date: String,
}

/// A synthetic payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Decimal merchant identifier
    pub merchant_id: String,
    /// Decimal payment identifier
    pub payment_id: String,
    /// Amount of the charge entry
    pub amount: u64,
    /// Charge then fee, in that order
    pub entries: Vec<Entry>,
}

/// Configuration for [`Payments`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// The effective date stamped on every entry
    pub effective_date: Date,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            effective_date: date!(2022 - 01 - 01),
        }
    }
}

#[derive(Debug, Clone)]
/// Payment payload generator
pub struct Payments {
    effective_date: String,
}

impl Payments {
    /// Create a new instance of `Payments`
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            effective_date: config.effective_date.to_string(),
        }
    }

    fn entry(&self, kind: EntryKind, amount: u64) -> Entry {
        Entry {
            kind,
            amount,
            installment: INSTALLMENT,
            effective_date: self.effective_date.clone(),
        }
    }
}

impl Default for Payments {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl<'a> Generator<'a> for Payments {
    type Output = Payment;
    type Error = Error;

    fn generate<R>(&'a self, rng: &mut R) -> Result<Self::Output, Error>
    where
        R: Rng + ?Sized,
    {
        let amount = rng.random_range(0..CHARGE_AMOUNT_LIMIT);
        let charge = self.entry(EntryKind::Charge, amount);
        let charge_fee = self.entry(EntryKind::ChargeFee, FEE_AMOUNT);

        Ok(Payment {
            merchant_id: rng.random_range(0..ID_LIMIT).to_string(),
            payment_id: rng.random_range(0..ID_LIMIT).to_string(),
            amount,
            entries: vec![charge, charge_fee],
        })
    }
}

impl crate::Serialize for Payments {
    fn to_bytes<W, R>(&self, rng: &mut R, writer: &mut W) -> Result<(), Error>
    where
        R: Rng + ?Sized,
        W: Write,
    {
        let payment = self.generate(rng)?;
        serde_json::to_writer(&mut *writer, &payment)?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}
