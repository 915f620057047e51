use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;

use crate::chain::{ChainSource, ProtocolRegistry, SourceError, TransactionRecord, Wallet};
use crate::config::GraphConfig;
use crate::network::{
    ConnectionAggregator, ConnectionSet, GraphBuilder, WalletGraph, derive_affiliations,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FetchMode {
    /// New root address; replaces the current session.
    Fresh,
    /// Same address again; new transactions merge into the session.
    Refresh,
}

#[derive(Clone, Debug)]
pub(crate) struct PipelineRequest {
    pub(crate) address: String,
    pub(crate) generation: u64,
    pub(crate) mode: FetchMode,
    pub(crate) limit: usize,
    pub(crate) max_wallet_lookups: usize,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct PipelineBatch {
    pub(crate) root: Option<Wallet>,
    pub(crate) transactions: Vec<TransactionRecord>,
    pub(crate) counterparties: Vec<Wallet>,
    pub(crate) names: HashMap<String, String>,
}

#[derive(Debug)]
pub(crate) struct PipelineMessage {
    pub(crate) address: String,
    pub(crate) generation: u64,
    pub(crate) mode: FetchMode,
    pub(crate) outcome: Result<PipelineBatch, SourceError>,
}

/// Pulls the root wallet, its transactions and the wallets it dealt with.
pub(crate) fn fetch_batch(
    source: &dyn ChainSource,
    request: &PipelineRequest,
) -> Result<PipelineBatch, SourceError> {
    let address = request.address.as_str();
    if request.mode == FetchMode::Refresh {
        source.invalidate();
    }
    let root = source.wallet(address)?;
    let transactions = source.transactions(address, request.limit)?;

    let mut lookups: Vec<&str> = Vec::new();
    for transaction in &transactions {
        for counterparty in transaction.counterparties() {
            if counterparty != address && !lookups.contains(&counterparty) {
                lookups.push(counterparty);
            }
        }
    }
    lookups.truncate(request.max_wallet_lookups);

    let mut counterparties = Vec::with_capacity(lookups.len());
    for counterparty in &lookups {
        match source.wallet(counterparty) {
            Ok(Some(wallet)) => counterparties.push(wallet),
            Ok(None) => {}
            Err(error) => log::warn!("skipping wallet lookup for {counterparty}: {error}"),
        }
    }

    let names = std::iter::once(address)
        .chain(lookups.iter().copied())
        .filter_map(|id| source.display_name(id).map(|name| (id.to_owned(), name)))
        .collect();

    log::info!(
        "fetched {} transactions and {} counterparty wallets for {address}",
        transactions.len(),
        counterparties.len()
    );

    Ok(PipelineBatch {
        root,
        transactions,
        counterparties,
        names,
    })
}

/// Runs [`fetch_batch`] on a worker thread and reports back over `tx`.
pub(crate) fn spawn_fetch(
    source: Arc<dyn ChainSource>,
    request: PipelineRequest,
    tx: Sender<PipelineMessage>,
) {
    thread::spawn(move || {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            fetch_batch(source.as_ref(), &request)
        }))
        .unwrap_or_else(|_| {
            log::error!("fetch worker for {} panicked", request.address);
            Err(SourceError::Disconnected)
        });

        let message = PipelineMessage {
            address: request.address,
            generation: request.generation,
            mode: request.mode,
            outcome,
        };
        if tx.send(message).is_err() {
            log::debug!("result receiver dropped before fetch finished");
        }
    });
}

/// Tracks which request is current so superseded results can be dropped.
#[derive(Debug, Default)]
pub(crate) struct RequestTracker {
    generation: u64,
    active: Option<String>,
}

impl RequestTracker {
    pub(crate) fn start(&mut self, address: &str) -> u64 {
        self.generation += 1;
        self.active = Some(address.to_owned());
        self.generation
    }

    pub(crate) fn cancel(&mut self) {
        self.generation += 1;
        self.active = None;
    }

    pub(crate) fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub(crate) fn accept(&self, message: &PipelineMessage) -> bool {
        message.generation == self.generation
            && self.active.as_deref() == Some(message.address.as_str())
    }
}

/// Everything known about the address being explored, accumulated across
/// fetches.
#[derive(Debug)]
pub(crate) struct Session {
    address: String,
    transactions: Vec<TransactionRecord>,
    seen_signatures: HashSet<String>,
    connections: ConnectionSet,
    wallets: Vec<Wallet>,
    names: HashMap<String, String>,
}

impl Session {
    pub(crate) fn new(address: &str) -> Self {
        Self {
            address: address.to_owned(),
            transactions: Vec::new(),
            seen_signatures: HashSet::new(),
            connections: ConnectionSet::new(),
            wallets: Vec::new(),
            names: HashMap::new(),
        }
    }

    pub(crate) fn address(&self) -> &str {
        &self.address
    }

    pub(crate) fn transactions(&self) -> &[TransactionRecord] {
        &self.transactions
    }

    pub(crate) fn connections(&self) -> &ConnectionSet {
        &self.connections
    }

    pub(crate) fn wallet(&self, address: &str) -> Option<&Wallet> {
        self.wallets.iter().find(|wallet| wallet.address == address)
    }

    /// Folds a batch in and returns how many transactions were new.
    ///
    /// Transactions whose signature was already seen are ignored, so
    /// refetching the same page leaves the connections untouched.
    pub(crate) fn apply(&mut self, batch: PipelineBatch, aggregator: &ConnectionAggregator<'_>) -> usize {
        let fresh = batch
            .transactions
            .into_iter()
            .filter(|transaction| {
                transaction.signature.is_empty()
                    || self.seen_signatures.insert(transaction.signature.clone())
            })
            .collect::<Vec<_>>();

        if !fresh.is_empty() {
            self.connections.merge(aggregator.aggregate(&fresh));
        }

        for wallet in batch.root.into_iter().chain(batch.counterparties) {
            self.upsert_wallet(wallet);
        }
        self.names.extend(batch.names);

        let added = fresh.len();
        self.transactions.extend(fresh);
        added
    }

    fn upsert_wallet(&mut self, wallet: Wallet) {
        match self
            .wallets
            .iter_mut()
            .find(|known| known.address == wallet.address)
        {
            Some(known) => *known = wallet,
            None => self.wallets.push(wallet),
        }
    }

    pub(crate) fn graph(&self, config: &GraphConfig, registry: &ProtocolRegistry) -> WalletGraph {
        let mut wallets = self.wallets.clone();
        derive_affiliations(
            &mut wallets,
            &self.transactions,
            registry,
            config.protocol_dominance_ratio,
        );

        GraphBuilder::new(config)
            .with_registry(registry)
            .with_names(&self.names)
            .with_focus(&self.address)
            .build(&wallets, self.connections.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;
    use crate::chain::{NodeType, ProtocolCategory, SnapshotSource, TokenTransfer};

    fn transfer(signature: &str, from: &str, to: &str, amount: f64) -> TransactionRecord {
        TransactionRecord {
            signature: signature.to_owned(),
            timestamp: 100,
            token_transfers: vec![TokenTransfer {
                from: Some(from.to_owned()),
                to: Some(to.to_owned()),
                amount,
                mint: Some("X".to_owned()),
            }],
            ..TransactionRecord::default()
        }
    }

    fn batch(transactions: Vec<TransactionRecord>) -> PipelineBatch {
        PipelineBatch {
            root: Some(Wallet::new("A")),
            transactions,
            ..PipelineBatch::default()
        }
    }

    fn message(address: &str, generation: u64) -> PipelineMessage {
        PipelineMessage {
            address: address.to_owned(),
            generation,
            mode: FetchMode::Fresh,
            outcome: Ok(PipelineBatch::default()),
        }
    }

    #[test]
    fn superseded_results_are_rejected() {
        let mut tracker = RequestTracker::default();
        let first = tracker.start("A");
        let second = tracker.start("B");

        assert!(!tracker.accept(&message("A", first)));
        assert!(!tracker.accept(&message("A", second)));
        assert!(tracker.accept(&message("B", second)));

        tracker.cancel();
        assert!(!tracker.accept(&message("B", second)));
        assert_eq!(tracker.active(), None);
    }

    #[test]
    fn refresh_merges_only_unseen_transactions() {
        let registry = ProtocolRegistry::builtin();
        let config = GraphConfig::default();
        let aggregator = ConnectionAggregator::new(&registry, &config);
        let mut session = Session::new("A");

        let added = session.apply(
            batch(vec![transfer("s1", "A", "B", 100.0), transfer("s2", "A", "B", 50.0)]),
            &aggregator,
        );
        assert_eq!(added, 2);

        let added = session.apply(
            batch(vec![transfer("s2", "A", "B", 50.0), transfer("s3", "A", "B", 25.0)]),
            &aggregator,
        );
        assert_eq!(added, 1);

        let connection = session.connections().get("A", "B").expect("A→B");
        assert_eq!(connection.value, 175.0);
        assert_eq!(connection.transaction_count, 3);
        assert_eq!(session.transactions().len(), 3);
    }

    #[test]
    fn session_graph_is_rooted_at_the_searched_address() {
        let registry = ProtocolRegistry::builtin();
        let config = GraphConfig::default();
        let aggregator = ConnectionAggregator::new(&registry, &config);
        let mut session = Session::new("A");
        session.apply(
            PipelineBatch {
                counterparties: vec![Wallet {
                    transaction_count: 900,
                    ..Wallet::new("B")
                }],
                ..batch(vec![transfer("s1", "A", "B", 1.0)])
            },
            &aggregator,
        );

        let graph = session.graph(&config, &registry);
        assert_eq!(graph.root_id.as_deref(), Some("A"));
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(session.wallet("B").map(|wallet| wallet.transaction_count), Some(900));
    }

    #[test]
    fn explicit_type_outranks_derived_protocol() {
        let registry = ProtocolRegistry::builtin();
        let config = GraphConfig::default();
        let aggregator = ConnectionAggregator::new(&registry, &config);
        let mut session = Session::new("A");
        let swap = TransactionRecord {
            program_ids: vec!["JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4".to_owned()],
            ..transfer("s1", "A", "B", 10.0)
        };
        session.apply(
            PipelineBatch {
                root: Some(Wallet {
                    wallet_type: Some(NodeType::User),
                    ..Wallet::new("A")
                }),
                counterparties: vec![Wallet::new("B")],
                ..batch(vec![swap])
            },
            &aggregator,
        );

        let graph = session.graph(&config, &registry);
        let a = graph.node("A").expect("root node");
        assert_eq!(a.node_type, NodeType::User);
        assert_eq!(a.protocol.as_ref().map(|tag| tag.id.as_str()), Some("jupiter"));

        let b = graph.node("B").expect("counterparty node");
        assert_eq!(b.node_type, NodeType::from_category(ProtocolCategory::Aggregator));
        assert!(session.wallet("A").is_some_and(|wallet| wallet.derived_protocol.is_none()));
    }

    const SNAPSHOT: &str = r#"{
        "wallets": {
            "A": {"balance": 2.0, "transactionCount": 2},
            "B": {"balance": 20.0, "transactionCount": 9}
        },
        "transactions": {
            "A": [
                {"signature": "s1", "timestamp": 5,
                 "tokenTransfers": [{"fromUserAccount": "A", "toUserAccount": "B", "tokenAmount": 3}]},
                {"signature": "s2", "timestamp": 6,
                 "tokenTransfers": [{"fromUserAccount": "C", "toUserAccount": "A", "tokenAmount": 1}]}
            ]
        },
        "names": {"B": "Bob"}
    }"#;

    #[test]
    fn fetch_batch_collects_counterparties_and_names() {
        let source = SnapshotSource::from_json(SNAPSHOT).expect("snapshot");
        let request = PipelineRequest {
            address: "A".to_owned(),
            generation: 1,
            mode: FetchMode::Fresh,
            limit: 50,
            max_wallet_lookups: 8,
        };

        let batch = fetch_batch(&source, &request).expect("in-memory source");
        assert_eq!(batch.root.as_ref().map(|wallet| wallet.balance), Some(2.0));
        assert_eq!(batch.transactions.len(), 2);
        let looked_up = batch
            .counterparties
            .iter()
            .map(|wallet| wallet.address.as_str())
            .collect::<Vec<_>>();
        assert_eq!(looked_up, ["B"]);
        assert_eq!(batch.names.get("B").map(String::as_str), Some("Bob"));
    }

    #[test]
    fn spawned_fetch_reports_its_generation() {
        let source: Arc<dyn ChainSource> =
            Arc::new(SnapshotSource::from_json(SNAPSHOT).expect("snapshot"));
        let (tx, rx) = mpsc::channel();
        spawn_fetch(
            source,
            PipelineRequest {
                address: "A".to_owned(),
                generation: 7,
                mode: FetchMode::Refresh,
                limit: 1,
                max_wallet_lookups: 0,
            },
            tx,
        );

        let message = rx.recv_timeout(Duration::from_secs(5)).expect("worker reply");
        assert_eq!(message.generation, 7);
        assert_eq!(message.mode, FetchMode::Refresh);
        let batch = message.outcome.expect("fetch succeeds");
        assert_eq!(batch.transactions.len(), 1);
        assert!(batch.counterparties.is_empty());
    }
}
