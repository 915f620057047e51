use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::parse::{parse_transactions, parse_wallet};
use super::types::{TransactionRecord, Wallet};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {what}: {message}")]
    Decode { what: String, message: String },

    #[error("data source worker disconnected")]
    Disconnected,
}

/// Supplier of wallet and transaction data for one address at a time.
///
/// "No data" for an address is `Ok(None)` / an empty list, never an error.
pub trait ChainSource: Send + Sync {
    fn wallet(&self, address: &str) -> Result<Option<Wallet>, SourceError>;

    /// Most recent transactions touching `address`, newest first, at most `limit`.
    fn transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>, SourceError>;

    fn display_name(&self, _address: &str) -> Option<String> {
        None
    }

    /// Forget anything remembered from earlier calls so the next lookup
    /// reaches the underlying data.
    fn invalidate(&self) {}
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSnapshot {
    wallets: HashMap<String, Value>,
    transactions: HashMap<String, Value>,
    names: HashMap<String, String>,
}

/// Offline source backed by a JSON snapshot of upstream API responses:
///
/// ```json
/// { "wallets": { "<address>": { ... } },
///   "transactions": { "<address>": [ ... ] },
///   "names": { "<address>": "display name" } }
/// ```
#[derive(Debug, Default)]
pub struct SnapshotSource {
    wallets: HashMap<String, Wallet>,
    transactions: HashMap<String, Vec<TransactionRecord>>,
    names: HashMap<String, String>,
}

impl SnapshotSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let source = Self::from_json(&raw).map_err(|error| match error {
            SourceError::Decode { message, .. } => SourceError::Decode {
                what: path.display().to_string(),
                message,
            },
            other => other,
        })?;
        log::info!(
            "loaded snapshot {} ({} wallets, {} transaction lists)",
            path.display(),
            source.wallets.len(),
            source.transactions.len()
        );
        Ok(source)
    }

    pub fn from_json(raw: &str) -> Result<Self, SourceError> {
        let snapshot: RawSnapshot =
            serde_json::from_str(raw).map_err(|error| SourceError::Decode {
                what: "snapshot".to_owned(),
                message: error.to_string(),
            })?;

        let mut wallets = HashMap::with_capacity(snapshot.wallets.len());
        for (address, value) in &snapshot.wallets {
            match parse_wallet(address, value) {
                Some(wallet) => {
                    wallets.insert(address.clone(), wallet);
                }
                None => log::warn!("skipping undecodable wallet record for {address}"),
            }
        }

        let transactions = snapshot
            .transactions
            .iter()
            .map(|(address, value)| {
                let mut records = parse_transactions(value);
                records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
                (address.clone(), records)
            })
            .collect();

        let names = snapshot
            .names
            .into_iter()
            .filter(|(_, name)| !name.trim().is_empty())
            .collect();

        Ok(Self {
            wallets,
            transactions,
            names,
        })
    }
}

impl ChainSource for SnapshotSource {
    fn wallet(&self, address: &str) -> Result<Option<Wallet>, SourceError> {
        Ok(self.wallets.get(address).cloned())
    }

    fn transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>, SourceError> {
        Ok(self
            .transactions
            .get(address)
            .map(|records| records.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    fn display_name(&self, address: &str) -> Option<String> {
        self.names.get(address).cloned()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const SNAPSHOT: &str = r#"{
        "wallets": {
            "A": {"balance": 4.0, "transactionCount": 3},
            "broken": 7
        },
        "transactions": {
            "A": [
                {"signature": "old", "timestamp": 10, "accounts": ["A", "B"]},
                {"signature": "new", "timestamp": 20, "accounts": ["A", "C"]},
                {"signature": "mid", "timestamp": 15}
            ]
        },
        "names": {"A": "Alice", "B": "  "}
    }"#;

    #[test]
    fn serves_records_newest_first_with_limit() {
        let source = SnapshotSource::from_json(SNAPSHOT).expect("snapshot decodes");
        let records = source.transactions("A", 2).expect("in-memory source");
        let signatures = records
            .iter()
            .map(|record| record.signature.as_str())
            .collect::<Vec<_>>();
        assert_eq!(signatures, ["new", "mid"]);
        assert!(source.transactions("Z", 50).expect("in-memory").is_empty());
    }

    #[test]
    fn unknown_address_is_no_data_not_error() {
        let source = SnapshotSource::from_json(SNAPSHOT).expect("snapshot decodes");
        assert!(source.wallet("nobody").expect("no error").is_none());
        assert!(source.wallet("broken").expect("no error").is_none());
        assert_eq!(source.wallet("A").expect("no error").map(|w| w.transaction_count), Some(3));
        assert_eq!(source.display_name("A").as_deref(), Some("Alice"));
        assert_eq!(source.display_name("B"), None);
    }

    #[test]
    fn open_reports_io_and_decode_failures() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = SnapshotSource::open(&dir.path().join("missing.json"));
        assert!(matches!(missing, Err(SourceError::Io { .. })));

        let path = dir.path().join("bad.json");
        let mut file = std::fs::File::create(&path).expect("create file");
        file.write_all(b"{ not json").expect("write file");
        let bad = SnapshotSource::open(&path);
        assert!(matches!(bad, Err(SourceError::Decode { .. })));
    }
}
