use std::collections::{HashMap, HashSet, VecDeque};

use crate::chain::{NodeType, ProtocolCategory, ProtocolRegistry, ProtocolTag, Wallet};
use crate::config::GraphConfig;
use crate::util::short_address;

use super::aggregate::{AggregationStrategy, Connection};

#[derive(Clone, Debug, PartialEq)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub node_type: NodeType,
    pub category: Option<ProtocolCategory>,
    pub balance: f64,
    pub activity: u64,
    pub connection_count: usize,
    pub is_root: bool,
    pub protocol: Option<ProtocolTag>,
    /// Endpoint of a connection with no wallet record behind it.
    pub synthesized: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub value: f64,
    pub transaction_count: u64,
    pub last_interaction_time: i64,
    pub thickness: f32,
    pub category: Option<ProtocolCategory>,
    pub strategy: AggregationStrategy,
}

pub fn edge_thickness(transaction_count: u64) -> f32 {
    (1.0 + (transaction_count as f32).ln_1p() * 1.4).min(7.0)
}

#[derive(Clone, Debug, Default)]
pub struct WalletGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub root_id: Option<String>,
    index_by_id: HashMap<String, usize>,
}

impl WalletGraph {
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.index_by_id.get(id).map(|&index| &self.nodes[index])
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Indices of edges with `id` at either end.
    pub fn edges_touching(&self, id: &str) -> Vec<usize> {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, edge)| edge.source == id || edge.target == id)
            .map(|(index, _)| index)
            .collect()
    }

    /// Shortest path from the root to `target`, ignoring edge direction.
    pub fn path_from_root(&self, target: &str) -> Option<Vec<String>> {
        let root = self.root_id.as_deref()?;
        if !self.index_by_id.contains_key(target) {
            return None;
        }
        if target == root {
            return Some(vec![root.to_owned()]);
        }

        let mut neighbors: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &self.edges {
            neighbors
                .entry(edge.source.as_str())
                .or_default()
                .push(edge.target.as_str());
            neighbors
                .entry(edge.target.as_str())
                .or_default()
                .push(edge.source.as_str());
        }

        let mut queue = VecDeque::from([root]);
        let mut visited = HashSet::from([root]);
        let mut parent: HashMap<&str, &str> = HashMap::new();

        while let Some(current) = queue.pop_front() {
            if current == target {
                break;
            }
            for &next in neighbors.get(current).into_iter().flatten() {
                if visited.insert(next) {
                    parent.insert(next, current);
                    queue.push_back(next);
                }
            }
        }

        if !visited.contains(target) {
            return None;
        }

        let mut path = vec![target.to_owned()];
        let mut cursor = target;
        while cursor != root {
            cursor = parent.get(cursor)?;
            path.push(cursor.to_owned());
        }
        path.reverse();
        Some(path)
    }
}

/// Turns wallets and aggregated connections into a renderable graph.
///
/// Building is pure: inputs are not modified and the same inputs always
/// produce the same graph.
pub struct GraphBuilder<'a> {
    config: &'a GraphConfig,
    registry: Option<&'a ProtocolRegistry>,
    names: Option<&'a HashMap<String, String>>,
    focus: Option<&'a str>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(config: &'a GraphConfig) -> Self {
        Self {
            config,
            registry: None,
            names: None,
            focus: None,
        }
    }

    pub fn with_registry(mut self, registry: &'a ProtocolRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_names(mut self, names: &'a HashMap<String, String>) -> Self {
        self.names = Some(names);
        self
    }

    /// Address being explored. It becomes the root when it is in the graph.
    pub fn with_focus(mut self, address: &'a str) -> Self {
        self.focus = Some(address);
        self
    }

    fn display_label(&self, address: &str, wallet_label: Option<&str>) -> String {
        wallet_label
            .map(str::to_owned)
            .or_else(|| self.names.and_then(|names| names.get(address).cloned()))
            .unwrap_or_else(|| short_address(address))
    }

    fn registry_tag(&self, address: &str) -> Option<ProtocolTag> {
        self.registry
            .and_then(|registry| registry.lookup(address))
            .cloned()
    }

    fn classify(&self, wallet: &Wallet, protocol: Option<&ProtocolTag>, connections: usize) -> NodeType {
        if let Some(protocol) = protocol {
            return NodeType::from_category(protocol.category);
        }
        if let Some(wallet_type) = wallet.wallet_type {
            return wallet_type;
        }
        if let Some(derived) = &wallet.derived_protocol {
            return NodeType::from_category(derived.category);
        }
        if connections > self.config.high_activity_connections {
            return NodeType::HighActivity;
        }
        if wallet.balance > self.config.exchange_balance_threshold {
            return NodeType::Exchange;
        }
        if wallet.balance > self.config.user_balance_threshold {
            return NodeType::User;
        }
        NodeType::Unknown
    }

    pub fn build(&self, wallets: &[Wallet], connections: &[Connection]) -> WalletGraph {
        let mut connection_counts: HashMap<&str, usize> = HashMap::new();
        let mut connection_activity: HashMap<&str, u64> = HashMap::new();
        let mut connection_protocol: HashMap<&str, &ProtocolTag> = HashMap::new();
        for connection in connections {
            for end in [connection.source.as_str(), connection.target.as_str()] {
                *connection_counts.entry(end).or_default() += 1;
                *connection_activity.entry(end).or_default() += connection.transaction_count;
                if let Some(protocol) = &connection.protocol {
                    connection_protocol.entry(end).or_insert(protocol);
                }
            }
        }

        let mut nodes: Vec<GraphNode> = Vec::with_capacity(wallets.len());
        let mut index_by_id: HashMap<String, usize> = HashMap::new();

        for wallet in wallets {
            if wallet.address.is_empty() || index_by_id.contains_key(&wallet.address) {
                continue;
            }

            let address = wallet.address.as_str();
            let protocol = wallet
                .protocol
                .clone()
                .or_else(|| self.registry_tag(address));
            let connection_count = connection_counts.get(address).copied().unwrap_or(0);
            let node_type = self.classify(wallet, protocol.as_ref(), connection_count);
            let protocol = protocol.or_else(|| wallet.derived_protocol.clone());

            index_by_id.insert(wallet.address.clone(), nodes.len());
            nodes.push(GraphNode {
                id: wallet.address.clone(),
                label: self.display_label(address, wallet.label.as_deref()),
                node_type,
                category: protocol.as_ref().map(|protocol| protocol.category),
                balance: wallet.balance.max(0.0),
                activity: wallet.transaction_count,
                connection_count,
                is_root: false,
                protocol,
                synthesized: false,
            });
        }

        for connection in connections {
            for end in [connection.source.as_str(), connection.target.as_str()] {
                if end.is_empty() || index_by_id.contains_key(end) {
                    continue;
                }

                let protocol = self
                    .registry_tag(end)
                    .or_else(|| connection_protocol.get(end).map(|&tag| tag.clone()));
                let node_type = protocol
                    .as_ref()
                    .map(|protocol| NodeType::from_category(protocol.category))
                    .unwrap_or(NodeType::Unknown);

                index_by_id.insert(end.to_owned(), nodes.len());
                nodes.push(GraphNode {
                    id: end.to_owned(),
                    label: self.display_label(end, None),
                    node_type,
                    category: protocol.as_ref().map(|protocol| protocol.category),
                    balance: 0.0,
                    activity: connection_activity.get(end).copied().unwrap_or(0),
                    connection_count: connection_counts.get(end).copied().unwrap_or(0),
                    is_root: false,
                    protocol,
                    synthesized: true,
                });
            }
        }

        let root_index = self
            .focus
            .and_then(|focus| index_by_id.get(focus).copied())
            .or_else(|| most_active(&nodes, |node| !node.synthesized))
            .or_else(|| most_active(&nodes, |_| true));
        if let Some(index) = root_index {
            nodes[index].is_root = true;
        }

        let edges = connections
            .iter()
            .filter(|connection| {
                connection.source != connection.target
                    && index_by_id.contains_key(&connection.source)
                    && index_by_id.contains_key(&connection.target)
            })
            .map(|connection| GraphEdge {
                source: connection.source.clone(),
                target: connection.target.clone(),
                value: connection.value,
                transaction_count: connection.transaction_count,
                last_interaction_time: connection.last_interaction_time,
                thickness: edge_thickness(connection.transaction_count),
                category: connection.protocol.as_ref().map(|protocol| protocol.category),
                strategy: connection.strategy,
            })
            .collect();

        WalletGraph {
            root_id: root_index.map(|index| nodes[index].id.clone()),
            nodes,
            edges,
            index_by_id,
        }
    }
}

/// Highest activity among nodes passing `filter`; the first one wins ties.
fn most_active(nodes: &[GraphNode], filter: impl Fn(&GraphNode) -> bool) -> Option<usize> {
    let mut best: Option<(usize, u64)> = None;
    for (index, node) in nodes.iter().enumerate().filter(|(_, node)| filter(node)) {
        if best.is_none_or(|(_, activity)| node.activity > activity) {
            best = Some((index, node.activity));
        }
    }
    best.map(|(index, _)| index)
}

#[cfg(test)]
pub fn build_graph(wallets: &[Wallet], connections: &[Connection]) -> WalletGraph {
    let config = GraphConfig::default();
    GraphBuilder::new(&config).build(wallets, connections)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet(address: &str, balance: f64, transaction_count: u64) -> Wallet {
        Wallet {
            balance,
            transaction_count,
            ..Wallet::new(address)
        }
    }

    fn connection(source: &str, target: &str, count: u64) -> Connection {
        Connection {
            source: source.to_owned(),
            target: target.to_owned(),
            value: count as f64 * 10.0,
            transaction_count: count,
            last_interaction_time: 0,
            protocol: None,
            strategy: AggregationStrategy::TokenTransfers,
        }
    }

    #[test]
    fn single_wallet_without_connections() {
        let graph = build_graph(&[wallet("A", 1.0, 3)], &[]);
        assert_eq!(graph.nodes.len(), 1);
        assert!(graph.edges.is_empty());
        assert!(graph.nodes[0].is_root);
        assert_eq!(graph.root_id.as_deref(), Some("A"));
    }

    #[test]
    fn empty_input_has_no_root() {
        let graph = build_graph(&[], &[]);
        assert!(graph.is_empty());
        assert!(graph.root_id.is_none());
    }

    #[test]
    fn every_edge_endpoint_is_a_node() {
        let wallets = [wallet("A", 1.0, 5)];
        let connections = [
            connection("A", "B", 2),
            connection("C", "A", 1),
            connection("C", "D", 4),
        ];
        let graph = build_graph(&wallets, &connections);

        assert_eq!(graph.edges.len(), 3);
        for edge in &graph.edges {
            assert!(graph.node(&edge.source).is_some());
            assert!(graph.node(&edge.target).is_some());
        }

        let synthesized = graph.node("C").expect("placeholder exists");
        assert!(synthesized.synthesized);
        assert_eq!(synthesized.balance, 0.0);
        assert_eq!(synthesized.activity, 5);
        assert_eq!(synthesized.node_type, NodeType::Unknown);
    }

    #[test]
    fn root_is_most_active_wallet_first_wins_ties() {
        let wallets = [wallet("A", 1.0, 3), wallet("B", 1.0, 9), wallet("C", 1.0, 9)];
        let graph = build_graph(&wallets, &[]);
        let roots = graph.nodes.iter().filter(|node| node.is_root).collect::<Vec<_>>();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].id, "B");
    }

    #[test]
    fn focus_overrides_activity_rule() {
        let config = GraphConfig::default();
        let wallets = [wallet("A", 1.0, 3), wallet("B", 1.0, 9)];
        let graph = GraphBuilder::new(&config)
            .with_focus("A")
            .build(&wallets, &[connection("A", "Z", 1)]);
        assert_eq!(graph.root_id.as_deref(), Some("A"));
        assert_eq!(graph.nodes.iter().filter(|node| node.is_root).count(), 1);

        let unknown_focus = GraphBuilder::new(&config)
            .with_focus("nope")
            .build(&wallets, &[]);
        assert_eq!(unknown_focus.root_id.as_deref(), Some("B"));
    }

    #[test]
    fn classification_follows_precedence() {
        let config = GraphConfig::default();
        let lending = ProtocolTag {
            id: "solend".to_owned(),
            name: "Solend".to_owned(),
            category: ProtocolCategory::Lending,
        };
        let wallets = [
            Wallet {
                protocol: Some(lending),
                wallet_type: Some(NodeType::User),
                ..wallet("P", 5_000.0, 1)
            },
            Wallet {
                wallet_type: Some(NodeType::Contract),
                ..wallet("T", 5_000.0, 1)
            },
            wallet("H", 5_000.0, 1),
            wallet("X", 5_000.0, 1),
            wallet("U", 50.0, 1),
            wallet("N", 0.5, 1),
        ];
        let connections = ["a", "b", "c", "d"]
            .iter()
            .map(|target| connection("H", target, 1))
            .collect::<Vec<_>>();

        let graph = GraphBuilder::new(&config).build(&wallets, &connections);
        let type_of = |id: &str| graph.node(id).map(|node| node.node_type);
        assert_eq!(type_of("P"), Some(NodeType::Protocol));
        assert_eq!(type_of("T"), Some(NodeType::Contract));
        assert_eq!(type_of("H"), Some(NodeType::HighActivity));
        assert_eq!(type_of("X"), Some(NodeType::Exchange));
        assert_eq!(type_of("U"), Some(NodeType::User));
        assert_eq!(type_of("N"), Some(NodeType::Unknown));
    }

    #[test]
    fn derived_protocol_ranks_below_explicit_type() {
        let config = GraphConfig::default();
        let lending = ProtocolTag {
            id: "solend".to_owned(),
            name: "Solend".to_owned(),
            category: ProtocolCategory::Lending,
        };
        let wallets = [
            Wallet {
                wallet_type: Some(NodeType::Contract),
                derived_protocol: Some(lending.clone()),
                ..wallet("T", 1.0, 1)
            },
            Wallet {
                derived_protocol: Some(lending.clone()),
                ..wallet("D", 5_000.0, 1)
            },
        ];

        let graph = GraphBuilder::new(&config).build(&wallets, &[]);
        let explicit = graph.node("T").expect("T");
        assert_eq!(explicit.node_type, NodeType::Contract);
        assert_eq!(explicit.protocol.as_ref(), Some(&lending));

        let derived = graph.node("D").expect("D");
        assert_eq!(derived.node_type, NodeType::Protocol);
        assert_eq!(derived.category, Some(ProtocolCategory::Lending));
    }

    #[test]
    fn placeholders_inherit_protocol_metadata() {
        let config = GraphConfig::default();
        let registry = ProtocolRegistry::builtin();
        let raydium = registry
            .lookup("675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8")
            .cloned();
        let connections = [
            Connection {
                protocol: raydium,
                ..connection("A", "pool", 1)
            },
            connection("A", "JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4", 1),
        ];

        let graph = GraphBuilder::new(&config)
            .with_registry(&registry)
            .build(&[wallet("A", 1.0, 2)], &connections);

        let pool = graph.node("pool").expect("placeholder");
        assert_eq!(pool.category, Some(ProtocolCategory::Dex));
        assert_eq!(pool.node_type, NodeType::Exchange);

        let jupiter = graph
            .node("JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4")
            .expect("placeholder");
        assert_eq!(jupiter.protocol.as_ref().map(|tag| tag.id.as_str()), Some("jupiter"));
        assert_eq!(graph.edges[0].category, Some(ProtocolCategory::Dex));
    }

    #[test]
    fn labels_prefer_wallet_label_then_names() {
        let config = GraphConfig::default();
        let names = HashMap::from([("B".to_owned(), "Bob".to_owned())]);
        let wallets = [
            Wallet {
                label: Some("Alice".to_owned()),
                ..wallet("A", 1.0, 1)
            },
            wallet("B", 1.0, 1),
        ];
        let graph = GraphBuilder::new(&config)
            .with_names(&names)
            .build(&wallets, &[connection("A", "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin", 1)]);
        assert_eq!(graph.nodes[0].label, "Alice");
        assert_eq!(graph.nodes[1].label, "Bob");
        assert_eq!(graph.nodes[2].label, "9xQe…VFin");
    }

    #[test]
    fn build_does_not_touch_inputs_and_is_repeatable() {
        let wallets = vec![wallet("A", 20.0, 4), wallet("B", 2.0, 1)];
        let connections = vec![connection("A", "B", 2), connection("B", "C", 1)];
        let wallets_before = wallets.clone();

        let first = build_graph(&wallets, &connections);
        let second = build_graph(&wallets, &connections);
        assert_eq!(first.nodes, second.nodes);
        assert_eq!(first.edges, second.edges);
        assert_eq!(wallets, wallets_before);
    }

    #[test]
    fn path_from_root_ignores_direction() {
        let graph = build_graph(
            &[wallet("A", 1.0, 10)],
            &[connection("A", "B", 1), connection("C", "B", 1), connection("D", "E", 1)],
        );
        assert_eq!(
            graph.path_from_root("C"),
            Some(vec!["A".to_owned(), "B".to_owned(), "C".to_owned()])
        );
        assert_eq!(graph.path_from_root("E"), None);
        assert_eq!(graph.path_from_root("A"), Some(vec!["A".to_owned()]));
    }

    #[test]
    fn thicker_edges_for_more_transactions() {
        assert!(edge_thickness(1) < edge_thickness(5));
        assert!(edge_thickness(10_000) <= 7.0);
    }
}
