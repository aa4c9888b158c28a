//! Quota ledger
//!
//! Append-only log of executed actions, used to cap how many actions of a
//! kind an account performs per UTC calendar day. The sled store serialises
//! concurrent writers itself; callers never lock around it.
//!
//! Keys are `{address}|{kind}|{timestamp}|{id}` so a prefix scan on
//! `{address}|{kind}|{date}` returns one day's rows in chronological order.

use alloy::primitives::Address;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

use crate::types::{ActionKind, QuotaRecord};

/// Ledger errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupt ledger row: {0}")]
    Corrupt(String),
}

impl From<sled::Error> for LedgerError {
    fn from(err: sled::Error) -> Self {
        LedgerError::Storage(err.to_string())
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Durable per-day action counter shared by all account loops
#[async_trait]
pub trait QuotaLedger: Send + Sync {
    /// Append one record
    async fn append(&self, record: &QuotaRecord) -> LedgerResult<()>;

    /// Records of `kind` for `address` on `date` (UTC), newest first
    async fn query_on(
        &self,
        address: Address,
        kind: ActionKind,
        date: NaiveDate,
    ) -> LedgerResult<Vec<QuotaRecord>>;

    /// Records of `kind` for `address` today (UTC), newest first
    async fn query_today(&self, address: Address, kind: ActionKind) -> LedgerResult<Vec<QuotaRecord>> {
        self.query_on(address, kind, Utc::now().date_naive()).await
    }

    /// Number of records of `kind` for `address` today
    async fn count_today(&self, address: Address, kind: ActionKind) -> LedgerResult<u32> {
        Ok(self.query_today(address, kind).await?.len() as u32)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LedgerRow {
    address: String,
    timestamp: String,
    kind: ActionKind,
}

impl From<&QuotaRecord> for LedgerRow {
    fn from(record: &QuotaRecord) -> Self {
        Self {
            address: format!("{:#x}", record.address),
            timestamp: format_timestamp(&record.timestamp),
            kind: record.kind,
        }
    }
}

impl TryFrom<LedgerRow> for QuotaRecord {
    type Error = LedgerError;

    fn try_from(row: LedgerRow) -> LedgerResult<Self> {
        let address = Address::from_str(&row.address)
            .map_err(|err| LedgerError::Corrupt(format!("address {}: {}", row.address, err)))?;
        let timestamp = DateTime::parse_from_rfc3339(&row.timestamp)
            .map_err(|err| LedgerError::Corrupt(format!("timestamp {}: {}", row.timestamp, err)))?
            .with_timezone(&Utc);
        Ok(QuotaRecord {
            address,
            timestamp,
            kind: row.kind,
        })
    }
}

fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn day_prefix(address: Address, kind: ActionKind, date: NaiveDate) -> String {
    format!("{:#x}|{}|{}", address, kind, date.format("%Y-%m-%d"))
}

/// sled-backed ledger
#[derive(Clone)]
pub struct SledLedger {
    db: sled::Db,
}

impl SledLedger {
    /// Open (or create) the ledger at `path`
    pub fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// In-memory ledger removed on drop
    pub fn temporary() -> LedgerResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }
}

#[async_trait]
impl QuotaLedger for SledLedger {
    async fn append(&self, record: &QuotaRecord) -> LedgerResult<()> {
        let row = LedgerRow::from(record);
        let id = self.db.generate_id()?;
        let key = format!("{:#x}|{}|{}|{:020}", record.address, record.kind, row.timestamp, id);
        let value = serde_json::to_vec(&row).map_err(|err| LedgerError::Storage(err.to_string()))?;

        self.db.insert(key.as_bytes(), value)?;
        self.db.flush_async().await?;

        debug!(address = %record.address, kind = %record.kind, "Quota record appended");
        Ok(())
    }

    async fn query_on(
        &self,
        address: Address,
        kind: ActionKind,
        date: NaiveDate,
    ) -> LedgerResult<Vec<QuotaRecord>> {
        let prefix = day_prefix(address, kind, date);
        let mut records = Vec::new();
        for entry in self.db.scan_prefix(prefix.as_bytes()).rev() {
            let (_, value) = entry?;
            let row: LedgerRow =
                serde_json::from_slice(&value).map_err(|err| LedgerError::Corrupt(err.to_string()))?;
            records.push(QuotaRecord::try_from(row)?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn record_at(address: Address, kind: ActionKind, timestamp: DateTime<Utc>) -> QuotaRecord {
        QuotaRecord {
            address,
            timestamp,
            kind,
        }
    }

    #[tokio::test]
    async fn test_query_today_filters_by_address_and_kind() {
        let ledger = SledLedger::temporary().unwrap();
        let a = Address::repeat_byte(0xaa);
        let b = Address::repeat_byte(0xbb);

        ledger.append(&QuotaRecord::now(a, ActionKind::WrapUnwrap)).await.unwrap();
        ledger.append(&QuotaRecord::now(a, ActionKind::WrapUnwrap)).await.unwrap();
        ledger.append(&QuotaRecord::now(a, ActionKind::SelfTransfer)).await.unwrap();
        ledger.append(&QuotaRecord::now(b, ActionKind::WrapUnwrap)).await.unwrap();

        assert_eq!(ledger.count_today(a, ActionKind::WrapUnwrap).await.unwrap(), 2);
        assert_eq!(ledger.count_today(a, ActionKind::SelfTransfer).await.unwrap(), 1);
        assert_eq!(ledger.count_today(b, ActionKind::WrapUnwrap).await.unwrap(), 1);
        assert_eq!(ledger.count_today(b, ActionKind::RawCall).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_records_from_other_days_are_ignored() {
        let ledger = SledLedger::temporary().unwrap();
        let address = Address::repeat_byte(0x01);
        let yesterday = Utc::now() - Duration::days(1);

        ledger
            .append(&record_at(address, ActionKind::PeerTransfer, yesterday))
            .await
            .unwrap();

        assert_eq!(ledger.count_today(address, ActionKind::PeerTransfer).await.unwrap(), 0);
        let past = ledger
            .query_on(address, ActionKind::PeerTransfer, yesterday.date_naive())
            .await
            .unwrap();
        assert_eq!(past.len(), 1);
    }

    #[tokio::test]
    async fn test_query_returns_newest_first() {
        let ledger = SledLedger::temporary().unwrap();
        let address = Address::repeat_byte(0x02);
        let day = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();

        for minutes in [5, 1, 30] {
            ledger
                .append(&record_at(address, ActionKind::RawCall, day + Duration::minutes(minutes)))
                .await
                .unwrap();
        }

        let records = ledger
            .query_on(address, ActionKind::RawCall, day.date_naive())
            .await
            .unwrap();
        let minutes: Vec<i64> = records
            .iter()
            .map(|r| (r.timestamp - day).num_minutes())
            .collect();
        assert_eq!(minutes, vec![30, 5, 1]);
    }

    #[tokio::test]
    async fn test_ledger_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let address = Address::repeat_byte(0x03);
        {
            let ledger = SledLedger::open(dir.path().join("ledger")).unwrap();
            ledger.append(&QuotaRecord::now(address, ActionKind::ContractCall)).await.unwrap();
        }
        let ledger = SledLedger::open(dir.path().join("ledger")).unwrap();
        assert_eq!(ledger.count_today(address, ActionKind::ContractCall).await.unwrap(), 1);
    }
}
