//! Decoding of upstream JSON into the strict record types.
//!
//! Upstream payloads follow the Helius enhanced-transaction shape, but any
//! field may be missing or carry the wrong type. Missing or unusable fields
//! become absent values here; a record that is not even an object is
//! skipped. Nothing past this module sees raw JSON.

use serde::Deserialize;
use serde::de::IgnoredAny;
use serde_json::Value;

use super::types::{
    NativeTransfer, NodeType, ProtocolCategory, ProtocolTag, TokenBalance, TokenTransfer,
    TransactionRecord, Wallet,
};

const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Number(f64),
    Text(String),
    Other(IgnoredAny),
}

impl RawNumber {
    fn as_f64(&self) -> Option<f64> {
        let value = match self {
            Self::Number(value) => *value,
            Self::Text(text) => text.trim().parse::<f64>().ok()?,
            Self::Other(_) => return None,
        };
        value.is_finite().then_some(value)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawTransaction {
    signature: Value,
    timestamp: Option<RawNumber>,
    block_time: Option<RawNumber>,
    token_transfers: Value,
    native_transfers: Value,
    accounts: Value,
    account_data: Value,
    program_ids: Value,
    instructions: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawTransfer {
    from_user_account: Option<String>,
    to_user_account: Option<String>,
    from: Option<String>,
    to: Option<String>,
    token_amount: Option<RawNumber>,
    amount: Option<RawNumber>,
    mint: Option<String>,
}

impl RawTransfer {
    fn endpoints(&self) -> (Option<String>, Option<String>) {
        (
            non_empty(self.from_user_account.as_deref().or(self.from.as_deref())),
            non_empty(self.to_user_account.as_deref().or(self.to.as_deref())),
        )
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawInstruction {
    program_id: Value,
    inner_instructions: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawWallet {
    address: Value,
    balance: Option<RawNumber>,
    lamports: Option<RawNumber>,
    token_balances: Value,
    transaction_count: Option<RawNumber>,
    first_activity_at: Option<RawNumber>,
    last_activity_at: Option<RawNumber>,
    label: Value,
    #[serde(rename = "type")]
    wallet_type: Value,
    protocol_id: Value,
    protocol_name: Value,
    protocol_category: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTokenBalance {
    mint: Option<String>,
    amount: Option<RawNumber>,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

fn text(value: &Value) -> Option<String> {
    non_empty(value.as_str())
}

fn items(value: &Value) -> &[Value] {
    value.as_array().map(Vec::as_slice).unwrap_or_default()
}

fn lenient<T: Default + for<'de> Deserialize<'de>>(value: &Value) -> Option<T> {
    if !value.is_object() {
        return None;
    }
    T::deserialize(value).ok()
}

/// Seconds since the epoch. Millisecond timestamps are scaled down.
fn normalize_timestamp(raw: Option<&RawNumber>) -> Option<i64> {
    let value = raw?.as_f64()?;
    if value < 0.0 {
        return None;
    }
    let seconds = if value > 1.0e12 { value / 1000.0 } else { value };
    Some(seconds as i64)
}

fn program_ids_from_instructions(instructions: &[Value], out: &mut Vec<String>) {
    for instruction in instructions.iter().filter_map(lenient::<RawInstruction>) {
        if let Some(program_id) = text(&instruction.program_id)
            && !out.contains(&program_id)
        {
            out.push(program_id);
        }
        program_ids_from_instructions(items(&instruction.inner_instructions), out);
    }
}

pub fn parse_transaction(value: &Value) -> Option<TransactionRecord> {
    let raw = lenient::<RawTransaction>(value)?;

    let token_transfers = items(&raw.token_transfers)
        .iter()
        .filter_map(lenient::<RawTransfer>)
        .map(|transfer| {
            let (from, to) = transfer.endpoints();
            TokenTransfer {
                from,
                to,
                amount: transfer
                    .token_amount
                    .as_ref()
                    .or(transfer.amount.as_ref())
                    .and_then(RawNumber::as_f64)
                    .unwrap_or(0.0),
                mint: non_empty(transfer.mint.as_deref()),
            }
        })
        .collect();

    let native_transfers = items(&raw.native_transfers)
        .iter()
        .filter_map(lenient::<RawTransfer>)
        .map(|transfer| {
            let (from, to) = transfer.endpoints();
            let amount = transfer
                .amount
                .as_ref()
                .and_then(RawNumber::as_f64)
                .filter(|amount| *amount >= 0.0)
                .unwrap_or(0.0);
            NativeTransfer {
                from,
                to,
                amount: amount as u64,
            }
        })
        .collect();

    let mut accounts: Vec<String> = Vec::new();
    let listed = items(&raw.accounts).iter().filter_map(text).chain(
        items(&raw.account_data)
            .iter()
            .filter_map(|entry| entry.get("account").and_then(text)),
    );
    for account in listed {
        if !accounts.contains(&account) {
            accounts.push(account);
        }
    }

    let mut program_ids: Vec<String> = Vec::new();
    for program_id in items(&raw.program_ids).iter().filter_map(text) {
        if !program_ids.contains(&program_id) {
            program_ids.push(program_id);
        }
    }
    program_ids_from_instructions(items(&raw.instructions), &mut program_ids);

    Some(TransactionRecord {
        signature: text(&raw.signature).unwrap_or_default(),
        timestamp: normalize_timestamp(raw.timestamp.as_ref().or(raw.block_time.as_ref()))
            .unwrap_or(0),
        token_transfers,
        native_transfers,
        accounts,
        program_ids,
    })
}

pub fn parse_transactions(value: &Value) -> Vec<TransactionRecord> {
    let Some(entries) = value.as_array() else {
        log::warn!("transaction payload is not an array, treating it as empty");
        return Vec::new();
    };

    let mut records = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        match parse_transaction(entry) {
            Some(record) => records.push(record),
            None => log::warn!("skipping undecodable transaction at index {index}"),
        }
    }
    records
}

/// Decode a wallet record. `address` is the key the record was found under
/// and wins over an address field inside the record.
pub fn parse_wallet(address: &str, value: &Value) -> Option<Wallet> {
    let raw = lenient::<RawWallet>(value)?;
    let address = non_empty(Some(address)).or_else(|| text(&raw.address))?;

    let balance = raw
        .balance
        .as_ref()
        .and_then(RawNumber::as_f64)
        .or_else(|| {
            raw.lamports
                .as_ref()
                .and_then(RawNumber::as_f64)
                .map(|lamports| lamports / LAMPORTS_PER_SOL)
        })
        .filter(|balance| *balance >= 0.0)
        .unwrap_or(0.0);

    let token_balances = items(&raw.token_balances)
        .iter()
        .filter_map(lenient::<RawTokenBalance>)
        .filter_map(|entry| {
            Some(TokenBalance {
                mint: non_empty(entry.mint.as_deref())?,
                amount: entry.amount.as_ref().and_then(RawNumber::as_f64).unwrap_or(0.0),
            })
        })
        .collect();

    let protocol_id = text(&raw.protocol_id);
    let protocol_name = text(&raw.protocol_name);
    let protocol_category = text(&raw.protocol_category);
    let protocol = if protocol_id.is_some() || protocol_category.is_some() {
        let id = protocol_id.unwrap_or_default();
        Some(ProtocolTag {
            name: protocol_name.unwrap_or_else(|| id.clone()),
            id,
            category: protocol_category
                .as_deref()
                .map(ProtocolCategory::from_label)
                .unwrap_or(ProtocolCategory::Other),
        })
    } else {
        None
    };

    Some(Wallet {
        address,
        balance,
        token_balances,
        transaction_count: raw
            .transaction_count
            .as_ref()
            .and_then(RawNumber::as_f64)
            .filter(|count| *count >= 0.0)
            .map(|count| count as u64)
            .unwrap_or(0),
        first_activity_at: normalize_timestamp(raw.first_activity_at.as_ref()),
        last_activity_at: normalize_timestamp(raw.last_activity_at.as_ref()),
        label: text(&raw.label),
        wallet_type: raw.wallet_type.as_str().and_then(NodeType::from_label),
        protocol,
        derived_protocol: None,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_helius_shaped_transaction() {
        let value = json!({
            "signature": "5h6xBEauJ3PK6SWCZ1PGjBvj8vDdWG3KpwATGy1ARAXFSDwt8GFXM7W5Ncn16wmqokgpiKRLuS83KUxyZyv2sUYv",
            "timestamp": 1_700_000_000,
            "tokenTransfers": [
                {"fromUserAccount": "A", "toUserAccount": "B", "tokenAmount": 12.5, "mint": "M"},
                {"fromUserAccount": "", "toUserAccount": "B", "tokenAmount": "3"}
            ],
            "nativeTransfers": [
                {"fromUserAccount": "A", "toUserAccount": "C", "amount": 5000}
            ],
            "accountData": [{"account": "A"}, {"account": "B"}, {"account": "A"}],
            "instructions": [
                {
                    "programId": "JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4",
                    "innerInstructions": [{"programId": "whirLbMiicVdio4qvUfM5KAg6Ct8VwpYzGff3uctyCc"}]
                }
            ]
        });

        let record = parse_transaction(&value).expect("object decodes");
        assert_eq!(record.timestamp, 1_700_000_000);
        assert_eq!(record.token_transfers.len(), 2);
        assert_eq!(record.token_transfers[0].amount, 12.5);
        assert_eq!(record.token_transfers[1].from, None);
        assert_eq!(record.token_transfers[1].amount, 3.0);
        assert_eq!(record.native_transfers[0].amount, 5000);
        assert_eq!(record.accounts, ["A", "B"]);
        assert_eq!(
            record.program_ids,
            [
                "JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4",
                "whirLbMiicVdio4qvUfM5KAg6Ct8VwpYzGff3uctyCc"
            ]
        );
    }

    #[test]
    fn missing_fields_become_absent() {
        let record = parse_transaction(&json!({"tokenTransfers": "nope", "timestamp": "x"}))
            .expect("object decodes");
        assert!(record.signature.is_empty());
        assert_eq!(record.timestamp, 0);
        assert!(record.token_transfers.is_empty());
        assert!(record.accounts.is_empty());
    }

    #[test]
    fn broken_entries_are_skipped_not_fatal() {
        let records = parse_transactions(&json!([
            {"signature": "one", "accounts": ["A", "B"]},
            42,
            "garbage",
            {"signature": "two", "blockTime": 1_700_000_000_123_i64}
        ]));
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].timestamp, 1_700_000_000);
        assert!(parse_transactions(&json!({"not": "an array"})).is_empty());
    }

    #[test]
    fn decodes_wallet_with_defaults() {
        let wallet = parse_wallet(
            "W",
            &json!({
                "lamports": 2_500_000_000_u64,
                "transactionCount": 17,
                "type": "exchange",
                "protocolCategory": "lending",
                "tokenBalances": [{"mint": "M", "amount": "4.5"}, {"amount": 1}]
            }),
        )
        .expect("object decodes");

        assert_eq!(wallet.address, "W");
        assert_eq!(wallet.balance, 2.5);
        assert_eq!(wallet.transaction_count, 17);
        assert_eq!(wallet.wallet_type, Some(NodeType::Exchange));
        assert_eq!(wallet.token_balances.len(), 1);
        let protocol = wallet.protocol.expect("category alone yields a tag");
        assert_eq!(protocol.category, ProtocolCategory::Lending);
        assert!(parse_wallet("W", &json!(null)).is_none());
    }
}
