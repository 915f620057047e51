mod address;
mod cache;
mod parse;
mod protocols;
mod source;
mod types;

pub use address::is_valid_address;
pub use cache::CachedSource;
pub use protocols::ProtocolRegistry;
pub use source::{ChainSource, SnapshotSource, SourceError};
pub use types::{
    NodeType, ProtocolCategory, ProtocolTag, TransactionRecord, Wallet, mints_moved_by,
};
#[cfg(test)]
pub use types::{NativeTransfer, TokenTransfer};
