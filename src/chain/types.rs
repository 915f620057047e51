use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TokenTransfer {
    pub from: Option<String>,
    pub to: Option<String>,
    pub amount: f64,
    pub mint: Option<String>,
}

/// Movement of lamports between two accounts.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NativeTransfer {
    pub from: Option<String>,
    pub to: Option<String>,
    pub amount: u64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransactionRecord {
    pub signature: String,
    pub timestamp: i64,
    pub token_transfers: Vec<TokenTransfer>,
    pub native_transfers: Vec<NativeTransfer>,
    /// Source-first, in the order the transaction lists them.
    pub accounts: Vec<String>,
    pub program_ids: Vec<String>,
}

impl TransactionRecord {
    /// Whether `address` shows up anywhere in this transaction.
    pub fn involves(&self, address: &str) -> bool {
        self.accounts.iter().any(|account| account == address)
            || self.token_transfers.iter().any(|transfer| {
                transfer.from.as_deref() == Some(address) || transfer.to.as_deref() == Some(address)
            })
            || self.native_transfers.iter().any(|transfer| {
                transfer.from.as_deref() == Some(address) || transfer.to.as_deref() == Some(address)
            })
    }

    /// Every address named by the transaction, first occurrence first.
    pub fn counterparties(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        let transfer_ends = self
            .token_transfers
            .iter()
            .flat_map(|transfer| [transfer.from.as_deref(), transfer.to.as_deref()])
            .chain(
                self.native_transfers
                    .iter()
                    .flat_map(|transfer| [transfer.from.as_deref(), transfer.to.as_deref()]),
            )
            .flatten();

        for address in transfer_ends.chain(self.accounts.iter().map(String::as_str)) {
            if !address.is_empty() && !seen.contains(&address) {
                seen.push(address);
            }
        }
        seen
    }
}

/// Distinct token mints `address` sent or received across `transactions`.
pub fn mints_moved_by<'a>(transactions: &'a [TransactionRecord], address: &str) -> Vec<&'a str> {
    let mut mints = Vec::new();
    for transfer in transactions.iter().flat_map(|tx| &tx.token_transfers) {
        let touches =
            transfer.from.as_deref() == Some(address) || transfer.to.as_deref() == Some(address);
        if let Some(mint) = transfer.mint.as_deref()
            && touches
            && !mints.contains(&mint)
        {
            mints.push(mint);
        }
    }
    mints
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TokenBalance {
    pub mint: String,
    pub amount: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProtocolCategory {
    Dex,
    Aggregator,
    Lending,
    Staking,
    NftMarketplace,
    Infrastructure,
    Other,
}

impl ProtocolCategory {
    pub fn label(self) -> &'static str {
        match self {
            Self::Dex => "DEX",
            Self::Aggregator => "Aggregator",
            Self::Lending => "Lending",
            Self::Staking => "Staking",
            Self::NftMarketplace => "NFT marketplace",
            Self::Infrastructure => "Infrastructure",
            Self::Other => "Other",
        }
    }

    /// Lenient mapping for free-form category strings from upstream data.
    pub fn from_label(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "dex" | "amm" | "exchange" | "swap" => Self::Dex,
            "aggregator" => Self::Aggregator,
            "lending" | "borrowing" => Self::Lending,
            "staking" | "liquid-staking" | "liquid staking" => Self::Staking,
            "nft" | "nft-marketplace" | "nft marketplace" | "marketplace" => Self::NftMarketplace,
            "infrastructure" | "system" | "token" => Self::Infrastructure,
            _ => Self::Other,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtocolTag {
    pub id: String,
    pub name: String,
    pub category: ProtocolCategory,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeType {
    Unknown,
    Exchange,
    Protocol,
    User,
    Contract,
    HighActivity,
    Main,
}

impl NodeType {
    pub fn label(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Exchange => "exchange",
            Self::Protocol => "protocol",
            Self::User => "user",
            Self::Contract => "contract",
            Self::HighActivity => "high-activity",
            Self::Main => "main",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "unknown" => Some(Self::Unknown),
            "exchange" | "cex" => Some(Self::Exchange),
            "protocol" | "defi" => Some(Self::Protocol),
            "user" | "wallet" => Some(Self::User),
            "contract" | "program" => Some(Self::Contract),
            "high-activity" | "high_activity" | "whale" => Some(Self::HighActivity),
            "main" => Some(Self::Main),
            _ => None,
        }
    }

    pub fn from_category(category: ProtocolCategory) -> Self {
        match category {
            ProtocolCategory::Dex | ProtocolCategory::Aggregator => Self::Exchange,
            ProtocolCategory::Infrastructure => Self::Contract,
            ProtocolCategory::Lending
            | ProtocolCategory::Staking
            | ProtocolCategory::NftMarketplace
            | ProtocolCategory::Other => Self::Protocol,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Wallet {
    pub address: String,
    /// Native balance in SOL.
    pub balance: f64,
    pub token_balances: Vec<TokenBalance>,
    pub transaction_count: u64,
    pub first_activity_at: Option<i64>,
    pub last_activity_at: Option<i64>,
    pub label: Option<String>,
    pub wallet_type: Option<NodeType>,
    /// Protocol the data source attributes the wallet to.
    pub protocol: Option<ProtocolTag>,
    /// Protocol inferred from the wallet's own transactions. Ranks below an
    /// explicit type when classifying.
    pub derived_protocol: Option<ProtocolTag>,
}

impl Wallet {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(from: &str, to: &str, mint: Option<&str>) -> TokenTransfer {
        TokenTransfer {
            from: Some(from.to_owned()),
            to: Some(to.to_owned()),
            amount: 1.0,
            mint: mint.map(str::to_owned),
        }
    }

    #[test]
    fn mints_moved_are_distinct_and_scoped_to_the_address() {
        let transactions = vec![
            TransactionRecord {
                token_transfers: vec![transfer("A", "B", Some("USDC")), transfer("C", "D", Some("BONK"))],
                ..Default::default()
            },
            TransactionRecord {
                token_transfers: vec![transfer("B", "A", Some("USDC")), transfer("B", "A", None)],
                ..Default::default()
            },
            TransactionRecord {
                token_transfers: vec![transfer("E", "A", Some("JUP"))],
                ..Default::default()
            },
        ];
        assert_eq!(mints_moved_by(&transactions, "A"), vec!["USDC", "JUP"]);
        assert!(mints_moved_by(&transactions, "Z").is_empty());
    }
}
