use std::collections::HashMap;

use crate::chain::{ProtocolRegistry, ProtocolTag, TransactionRecord};
use crate::config::GraphConfig;

const SIGNATURE_SPLIT_LEN: usize = 8;

/// Which part of the transaction data a connection was derived from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AggregationStrategy {
    TokenTransfers,
    NativeTransfers,
    AccountCoOccurrence,
    SignatureSplit,
}

impl AggregationStrategy {
    pub fn label(self) -> &'static str {
        match self {
            Self::TokenTransfers => "token transfers",
            Self::NativeTransfers => "native transfers",
            Self::AccountCoOccurrence => "shared accounts",
            Self::SignatureSplit => "signature placeholder",
        }
    }

    /// Connections that carry no transferred value, only a count.
    pub fn is_count_only(self) -> bool {
        matches!(self, Self::AccountCoOccurrence | Self::SignatureSplit)
    }
}

/// Aggregated activity from `source` to `target`.
#[derive(Clone, Debug, PartialEq)]
pub struct Connection {
    pub source: String,
    pub target: String,
    /// Token units for token transfers, lamports for native transfers, 0 for count-only.
    pub value: f64,
    pub transaction_count: u64,
    pub last_interaction_time: i64,
    pub protocol: Option<ProtocolTag>,
    pub strategy: AggregationStrategy,
}

impl Connection {
    /// Values only add up within one strategy: token units and lamports do
    /// not mix. A count-only connection takes over the first valued one.
    fn absorb(&mut self, other: &Connection) {
        if self.strategy == other.strategy {
            self.value += other.value;
        } else if self.strategy.is_count_only() && !other.strategy.is_count_only() {
            self.value = other.value;
            self.strategy = other.strategy;
        }
        self.transaction_count += other.transaction_count;
        self.last_interaction_time = self.last_interaction_time.max(other.last_interaction_time);
        if self.protocol.is_none() {
            self.protocol = other.protocol.clone();
        }
    }
}

/// Directional connections keyed by `(source, target)`, in first-seen order.
#[derive(Clone, Debug, Default)]
pub struct ConnectionSet {
    connections: Vec<Connection>,
    index_by_pair: HashMap<(String, String), usize>,
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn as_slice(&self) -> &[Connection] {
        &self.connections
    }

    #[cfg(test)]
    pub fn get(&self, source: &str, target: &str) -> Option<&Connection> {
        self.index_by_pair
            .get(&(source.to_owned(), target.to_owned()))
            .map(|&index| &self.connections[index])
    }

    /// Record one observation. Self-loops and empty endpoints are dropped.
    fn observe(
        &mut self,
        source: &str,
        target: &str,
        amount: f64,
        timestamp: i64,
        protocol: Option<&ProtocolTag>,
        strategy: AggregationStrategy,
    ) -> bool {
        if source.is_empty() || target.is_empty() || source == target {
            return false;
        }

        let amount = if amount.is_finite() { amount.max(0.0) } else { 0.0 };
        self.add(Connection {
            source: source.to_owned(),
            target: target.to_owned(),
            value: amount,
            transaction_count: 1,
            last_interaction_time: timestamp,
            protocol: protocol.cloned(),
            strategy,
        });
        true
    }

    fn add(&mut self, connection: Connection) {
        let key = (connection.source.clone(), connection.target.clone());
        match self.index_by_pair.get(&key) {
            Some(&index) => self.connections[index].absorb(&connection),
            None => {
                self.index_by_pair.insert(key, self.connections.len());
                self.connections.push(connection);
            }
        }
    }

    /// Fold another batch in. Values and counts add up, the last interaction
    /// time keeps the later of the two; nothing is ever overwritten.
    pub fn merge<I>(&mut self, connections: I)
    where
        I: IntoIterator<Item = Connection>,
    {
        for connection in connections {
            if connection.source != connection.target {
                self.add(connection);
            }
        }
    }

    pub fn into_vec(self) -> Vec<Connection> {
        self.connections
    }
}

/// Reduces a batch of transactions to weighted connections.
///
/// The strategies are tried in order for the whole batch: token transfers,
/// then native transfers, then shared accounts (with the signature split as
/// an opt-in last resort). A later strategy only runs when every earlier one
/// produced nothing for the entire batch.
pub struct ConnectionAggregator<'a> {
    registry: &'a ProtocolRegistry,
    max_account_targets: usize,
    signature_fallback: bool,
}

impl<'a> ConnectionAggregator<'a> {
    pub fn new(registry: &'a ProtocolRegistry, config: &GraphConfig) -> Self {
        Self {
            registry,
            max_account_targets: config.max_account_targets,
            signature_fallback: config.signature_fallback,
        }
    }

    pub fn aggregate(&self, transactions: &[TransactionRecord]) -> Vec<Connection> {
        let by_tokens = self.from_token_transfers(transactions);
        if !by_tokens.is_empty() {
            return by_tokens.into_vec();
        }

        let by_native = self.from_native_transfers(transactions);
        if !by_native.is_empty() {
            return by_native.into_vec();
        }

        let by_accounts = self.from_accounts(transactions);
        if by_accounts.is_empty() && !transactions.is_empty() {
            log::debug!(
                "no connections derivable from {} transactions",
                transactions.len()
            );
        }
        by_accounts.into_vec()
    }

    fn from_token_transfers(&self, transactions: &[TransactionRecord]) -> ConnectionSet {
        let mut set = ConnectionSet::new();
        for transaction in transactions {
            let protocol = self.registry.resolve(&transaction.program_ids);
            for transfer in &transaction.token_transfers {
                let (Some(from), Some(to)) = (transfer.from.as_deref(), transfer.to.as_deref())
                else {
                    continue;
                };
                set.observe(
                    from,
                    to,
                    transfer.amount,
                    transaction.timestamp,
                    protocol,
                    AggregationStrategy::TokenTransfers,
                );
            }
        }
        set
    }

    fn from_native_transfers(&self, transactions: &[TransactionRecord]) -> ConnectionSet {
        let mut set = ConnectionSet::new();
        for transaction in transactions {
            let protocol = self.registry.resolve(&transaction.program_ids);
            for transfer in &transaction.native_transfers {
                let (Some(from), Some(to)) = (transfer.from.as_deref(), transfer.to.as_deref())
                else {
                    continue;
                };
                set.observe(
                    from,
                    to,
                    transfer.amount as f64,
                    transaction.timestamp,
                    protocol,
                    AggregationStrategy::NativeTransfers,
                );
            }
        }
        set
    }

    fn from_accounts(&self, transactions: &[TransactionRecord]) -> ConnectionSet {
        let mut set = ConnectionSet::new();
        for transaction in transactions {
            let protocol = self.registry.resolve(&transaction.program_ids);

            if let [source, targets @ ..] = transaction.accounts.as_slice()
                && !targets.is_empty()
            {
                for target in targets.iter().take(self.max_account_targets) {
                    set.observe(
                        source,
                        target,
                        0.0,
                        transaction.timestamp,
                        protocol,
                        AggregationStrategy::AccountCoOccurrence,
                    );
                }
                continue;
            }

            if self.signature_fallback
                && let Some((source, target)) = signature_pseudo_pair(&transaction.signature)
            {
                set.observe(
                    &source,
                    &target,
                    0.0,
                    transaction.timestamp,
                    protocol,
                    AggregationStrategy::SignatureSplit,
                );
            }
        }
        set
    }
}

/// Two placeholder ids cut from a signature. They name no real account.
fn signature_pseudo_pair(signature: &str) -> Option<(String, String)> {
    let mut chars = signature.chars();
    let source = chars.by_ref().take(SIGNATURE_SPLIT_LEN).collect::<String>();
    let target = chars.take(SIGNATURE_SPLIT_LEN).collect::<String>();
    if source.chars().count() < SIGNATURE_SPLIT_LEN || target.chars().count() < SIGNATURE_SPLIT_LEN
    {
        return None;
    }
    Some((source, target))
}

/// Aggregate with the built-in protocol registry and default heuristics.
#[cfg(test)]
pub fn aggregate(transactions: &[TransactionRecord]) -> Vec<Connection> {
    let registry = ProtocolRegistry::builtin();
    ConnectionAggregator::new(&registry, &GraphConfig::default()).aggregate(transactions)
}
