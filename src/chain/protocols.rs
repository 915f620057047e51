use std::collections::HashMap;

use super::types::{ProtocolCategory, ProtocolTag};

const BUILTIN_PROGRAMS: &[(&str, &str, &str, ProtocolCategory)] = &[
    (
        "11111111111111111111111111111111",
        "system",
        "System Program",
        ProtocolCategory::Infrastructure,
    ),
    (
        "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA",
        "spl-token",
        "SPL Token",
        ProtocolCategory::Infrastructure,
    ),
    (
        "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb",
        "spl-token-2022",
        "SPL Token 2022",
        ProtocolCategory::Infrastructure,
    ),
    (
        "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL",
        "associated-token",
        "Associated Token Account",
        ProtocolCategory::Infrastructure,
    ),
    (
        "ComputeBudget111111111111111111111111111111",
        "compute-budget",
        "Compute Budget",
        ProtocolCategory::Infrastructure,
    ),
    (
        "JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4",
        "jupiter",
        "Jupiter",
        ProtocolCategory::Aggregator,
    ),
    (
        "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8",
        "raydium",
        "Raydium AMM",
        ProtocolCategory::Dex,
    ),
    (
        "CAMMCzo5YL8w4VFF8KVHrK22GGUsp5VTaW7grrKgrWqK",
        "raydium-clmm",
        "Raydium CLMM",
        ProtocolCategory::Dex,
    ),
    (
        "whirLbMiicVdio4qvUfM5KAg6Ct8VwpYzGff3uctyCc",
        "orca",
        "Orca Whirlpools",
        ProtocolCategory::Dex,
    ),
    (
        "LBUZKhRxPF3XUpBCjp4YzTKgLccjZhTSDM9YuVaPwxo",
        "meteora",
        "Meteora DLMM",
        ProtocolCategory::Dex,
    ),
    (
        "6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P",
        "pump-fun",
        "Pump.fun",
        ProtocolCategory::Dex,
    ),
    (
        "So1endDq2YkqhipRh3WViPa8hdiSpxWy6z3Z6tMCpAo",
        "solend",
        "Solend",
        ProtocolCategory::Lending,
    ),
    (
        "KLend2g3cP87fffoy8q1mQqGKjrxjC8boSyAYavgmjD",
        "kamino-lend",
        "Kamino Lend",
        ProtocolCategory::Lending,
    ),
    (
        "MarBmsSgKXdrN1egZf5sqe1TMai9K1rChYNDJgjq7aD",
        "marinade",
        "Marinade",
        ProtocolCategory::Staking,
    ),
    (
        "Stake11111111111111111111111111111111111111",
        "stake",
        "Stake Program",
        ProtocolCategory::Staking,
    ),
    (
        "M2mx93ekt1fmXSVkTrUL9xVFHkmME8HTUi5Cyc5aF7K",
        "magic-eden",
        "Magic Eden",
        ProtocolCategory::NftMarketplace,
    ),
    (
        "TSWAPaqyCSx2KABk68Shruf4rp7CxcNi8hAsbdwmHbN",
        "tensor",
        "Tensor",
        ProtocolCategory::NftMarketplace,
    ),
];

/// Static lookup of known program ids to the application they belong to.
#[derive(Clone, Debug, Default)]
pub struct ProtocolRegistry {
    programs: HashMap<String, ProtocolTag>,
}

impl ProtocolRegistry {
    pub fn builtin() -> Self {
        let mut registry = Self::default();
        for &(program_id, id, name, category) in BUILTIN_PROGRAMS {
            registry.register(program_id, id, name, category);
        }
        registry
    }

    pub fn register(&mut self, program_id: &str, id: &str, name: &str, category: ProtocolCategory) {
        self.programs.insert(
            program_id.to_owned(),
            ProtocolTag {
                id: id.to_owned(),
                name: name.to_owned(),
                category,
            },
        );
    }

    pub fn lookup(&self, program_id: &str) -> Option<&ProtocolTag> {
        self.programs.get(program_id)
    }

    /// First application-level protocol among `program_ids`. Runtime programs
    /// (system, token, compute budget) are touched by nearly every
    /// transaction, so they never tag a transaction on their own.
    pub fn resolve<'a, I>(&self, program_ids: I) -> Option<&ProtocolTag>
    where
        I: IntoIterator<Item = &'a String>,
    {
        program_ids
            .into_iter()
            .filter_map(|program_id| self.lookup(program_id))
            .find(|tag| tag.category != ProtocolCategory::Infrastructure)
    }

    /// Distinct application-level protocols touched by `program_ids`, in order.
    pub fn resolve_all<'a, I>(&self, program_ids: I) -> Vec<&ProtocolTag>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut tags: Vec<&ProtocolTag> = Vec::new();
        for tag in program_ids
            .into_iter()
            .filter_map(|program_id| self.lookup(program_id))
        {
            if tag.category != ProtocolCategory::Infrastructure
                && !tags.iter().any(|known| known.id == tag.id)
            {
                tags.push(tag);
            }
        }
        tags
    }
}
