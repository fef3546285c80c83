use serde::{Deserialize, Serialize};

use crate::ProbeResult;

#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    /// Usable results, cheapest first; equal prices keep catalog order.
    pub priced: Vec<ProbeResult>,
    pub cheapest: Option<ProbeResult>,
}

impl Ranking {
    pub fn is_empty(&self) -> bool {
        self.priced.is_empty()
    }

    /// One tier per priced entry. Equal prices share the tier of the first
    /// position holding that price.
    pub fn tiers(&self) -> Vec<PriceTier> {
        let len = self.priced.len();
        let mut tiers = Vec::with_capacity(len);
        let mut first_index = 0;

        for (index, result) in self.priced.iter().enumerate() {
            if index > 0 && self.priced[index - 1].price() != result.price() {
                first_index = index;
            }
            tiers.push(PriceTier::for_position(first_index, len));
        }

        tiers
    }
}

/// Coarse bucket of a priced result within its ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceTier {
    Low,
    Mid,
    High,
}

impl PriceTier {
    pub fn for_position(index: usize, len: usize) -> Self {
        if len <= 1 {
            return PriceTier::Low;
        }
        let percentile = index as f64 / (len - 1) as f64;
        if percentile <= 0.33 {
            PriceTier::Low
        } else if percentile <= 0.66 {
            PriceTier::Mid
        } else {
            PriceTier::High
        }
    }
}

pub fn aggregate(results: &[ProbeResult]) -> Ranking {
    let mut priced: Vec<ProbeResult> = results
        .iter()
        .filter(|r| !r.failed() && !r.sold_out() && r.price().is_some())
        .cloned()
        .collect();

    // `sort_by` is stable.
    priced.sort_by(|a, b| {
        let a = a.price().unwrap_or(f64::INFINITY);
        let b = b.price().unwrap_or(f64::INFINITY);
        a.total_cmp(&b)
    });

    let cheapest = priced.first().cloned();
    Ranking { priced, cheapest }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Outcome, ProbeCandidate};

    fn result(cid: u64, outcome: Outcome) -> ProbeResult {
        ProbeResult::new(
            ProbeCandidate {
                label: format!("L{cid}"),
                cid,
                url: format!("https://www.agoda.com/h?cid={cid}"),
            },
            outcome,
        )
    }

    fn priced(cid: u64, price: f64) -> ProbeResult {
        result(cid, Outcome::Priced { hotel_name: Some("Grand".to_string()), price })
    }

    #[test]
    fn test_failed_dropped_and_sorted() {
        let results = vec![priced(1, 500.0), result(2, Outcome::failed("timeout")), priced(3, 300.0)];
        let ranking = aggregate(&results);

        let prices: Vec<f64> = ranking.priced.iter().filter_map(|r| r.price()).collect();
        assert_eq!(prices, vec![300.0, 500.0]);
        assert_eq!(ranking.cheapest.as_ref().map(|r| r.cid()), Some(3));
    }

    #[test]
    fn test_nothing_priced() {
        let results = vec![
            result(1, Outcome::failed("blocked")),
            result(2, Outcome::SoldOut { hotel_name: Some("Grand".to_string()) }),
            priced(3, 0.0),
        ];
        let ranking = aggregate(&results);
        assert!(ranking.is_empty());
        assert!(ranking.cheapest.is_none());
    }

    #[test]
    fn test_ties_keep_catalog_order() {
        let results = vec![priced(7, 200.0), priced(2, 100.0), priced(5, 200.0), priced(1, 100.0)];
        let ranking = aggregate(&results);
        let order: Vec<u64> = ranking.priced.iter().map(|r| r.cid()).collect();
        assert_eq!(order, vec![2, 1, 7, 5]);
    }

    #[test]
    fn test_idempotent() {
        let results = vec![priced(1, 3.0), priced(2, 1.0), priced(3, 2.0), priced(4, 1.0)];
        let first = aggregate(&results);
        let second = aggregate(&first.priced);
        assert_eq!(first, second);
        assert_eq!(first, aggregate(&results));
    }

    #[test]
    fn test_cheapest_is_minimum() {
        let results: Vec<_> = [820.5, 99.9, 431.0, 99.95, 1200.0]
            .into_iter()
            .enumerate()
            .map(|(i, p)| priced(i as u64, p))
            .collect();
        let ranking = aggregate(&results);
        assert_eq!(ranking.cheapest.and_then(|r| r.price()), Some(99.9));
    }

    #[test]
    fn test_tiers() {
        assert_eq!(PriceTier::for_position(0, 1), PriceTier::Low);
        let tiers: Vec<_> = (0..4).map(|i| PriceTier::for_position(i, 4)).collect();
        assert_eq!(tiers, vec![PriceTier::Low, PriceTier::Mid, PriceTier::High, PriceTier::High]);
    }

    #[test]
    fn test_equal_prices_share_tier() {
        let all_same: Vec<_> = (1..=4).map(|cid| priced(cid, 100.0)).collect();
        assert_eq!(aggregate(&all_same).tiers(), vec![PriceTier::Low; 4]);

        let results = vec![priced(1, 100.0), priced(2, 200.0), priced(3, 200.0), priced(4, 200.0), priced(5, 300.0)];
        assert_eq!(
            aggregate(&results).tiers(),
            vec![PriceTier::Low, PriceTier::Low, PriceTier::Low, PriceTier::Low, PriceTier::High]
        );
    }
}
