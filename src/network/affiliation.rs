use std::collections::HashMap;

use crate::chain::{ProtocolRegistry, ProtocolTag, TransactionRecord, Wallet};

/// Records, for wallets that carry no protocol, the protocol dominating their
/// transactions in `derived_protocol`.
///
/// A protocol dominates when its programs appear in at least `ratio` of the
/// transactions involving the wallet. Ties go to the protocol seen first.
pub fn derive_affiliations(
    wallets: &mut [Wallet],
    transactions: &[TransactionRecord],
    registry: &ProtocolRegistry,
    ratio: f64,
) {
    let tagged = transactions
        .iter()
        .map(|transaction| (transaction, registry.resolve_all(&transaction.program_ids)))
        .collect::<Vec<_>>();

    for wallet in wallets.iter_mut().filter(|wallet| wallet.protocol.is_none()) {
        if let Some(tag) = dominant_protocol(&wallet.address, &tagged, ratio) {
            log::debug!("wallet {} affiliated with {}", wallet.address, tag.name);
            wallet.derived_protocol = Some(tag.clone());
        }
    }
}

fn dominant_protocol<'a>(
    address: &str,
    tagged: &[(&TransactionRecord, Vec<&'a ProtocolTag>)],
    ratio: f64,
) -> Option<&'a ProtocolTag> {
    let mut involved = 0usize;
    let mut order: Vec<&'a ProtocolTag> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();

    for (transaction, tags) in tagged {
        if !transaction.involves(address) {
            continue;
        }
        involved += 1;
        for &tag in tags {
            let count = counts.entry(tag.id.as_str()).or_default();
            if *count == 0 {
                order.push(tag);
            }
            *count += 1;
        }
    }

    if involved == 0 {
        return None;
    }

    let mut best: Option<(&'a ProtocolTag, usize)> = None;
    for tag in order {
        let count = counts.get(tag.id.as_str()).copied().unwrap_or(0);
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((tag, count));
        }
    }

    best.filter(|&(_, count)| count as f64 / involved as f64 >= ratio)
        .map(|(tag, _)| tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ProtocolCategory;

    const JUPITER: &str = "JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4";
    const SYSTEM: &str = "11111111111111111111111111111111";

    fn transaction(accounts: &[&str], programs: &[&str]) -> TransactionRecord {
        TransactionRecord {
            accounts: accounts.iter().map(|account| (*account).to_owned()).collect(),
            program_ids: programs.iter().map(|program| (*program).to_owned()).collect(),
            ..TransactionRecord::default()
        }
    }

    #[test]
    fn dominant_protocol_tags_wallet() {
        let registry = ProtocolRegistry::builtin();
        let mut wallets = vec![Wallet::new("A"), Wallet::new("B")];
        let transactions = [
            transaction(&["A", "X"], &[JUPITER, SYSTEM]),
            transaction(&["A", "Y"], &[SYSTEM]),
            transaction(&["A", "Z"], &[SYSTEM]),
            transaction(&["B", "Z"], &[SYSTEM]),
        ];

        derive_affiliations(&mut wallets, &transactions, &registry, 0.3);

        let tag = wallets[0]
            .derived_protocol
            .as_ref()
            .expect("jupiter dominates A");
        assert_eq!(tag.id, "jupiter");
        assert_eq!(tag.category, ProtocolCategory::Aggregator);
        assert!(wallets[0].protocol.is_none());
        assert!(wallets[1].derived_protocol.is_none());
    }

    #[test]
    fn below_ratio_and_existing_tags_are_left_alone() {
        let registry = ProtocolRegistry::builtin();
        let existing = ProtocolTag {
            id: "custom".to_owned(),
            name: "Custom".to_owned(),
            category: ProtocolCategory::Other,
        };
        let mut wallets = vec![
            Wallet::new("A"),
            Wallet {
                protocol: Some(existing.clone()),
                ..Wallet::new("B")
            },
        ];
        let mut transactions = vec![transaction(&["A", "B"], &[JUPITER])];
        transactions.extend((0..4).map(|_| transaction(&["A"], &[SYSTEM])));

        derive_affiliations(&mut wallets, &transactions, &registry, 0.3);

        assert!(wallets[0].derived_protocol.is_none());
        assert_eq!(wallets[1].protocol.as_ref(), Some(&existing));
        assert!(wallets[1].derived_protocol.is_none());
    }
}
