mod affiliation;
mod aggregate;
mod model;

pub use affiliation::derive_affiliations;
#[cfg(test)]
pub use aggregate::aggregate;
pub use aggregate::{AggregationStrategy, Connection, ConnectionAggregator, ConnectionSet};
#[cfg(test)]
pub use model::build_graph;
pub use model::{GraphBuilder, GraphNode, WalletGraph};
