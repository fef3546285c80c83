//! Candidate referral identifiers: a curated list plus a random sample.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

pub type Cid = u64;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Cannot draw {requested} unique identifiers, range only has {available} free values")]
    RangeExhausted { requested: usize, available: u64 },

    #[error("Invalid sampling range: {start}..={end}")]
    InvalidRange { start: Cid, end: Cid },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Catalog file error: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    pub label: String,
    pub cid: Cid,
}

impl Identifier {
    pub fn new(label: impl Into<String>, cid: Cid) -> Self {
        Self {
            label: label.into(),
            cid,
        }
    }

    pub fn auto(cid: Cid) -> Self {
        Self::new(format!("AUTO-{cid}"), cid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffiliateLink {
    pub label: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomSampling {
    pub sample_size: usize,
    pub range_start: Cid,
    pub range_end: Cid,
}

impl Default for RandomSampling {
    fn default() -> Self {
        Self {
            sample_size: 200,
            range_start: 1_000_001,
            range_end: 1_999_999,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default = "default_curated")]
    pub curated: Vec<Identifier>,
    #[serde(default)]
    pub sampling: Option<RandomSampling>,
    #[serde(default)]
    pub affiliates: Vec<AffiliateLink>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            curated: default_curated(),
            sampling: Some(RandomSampling::default()),
            affiliates: Vec::new(),
        }
    }
}

impl Catalog {
    pub fn curated_only(curated: Vec<Identifier>) -> Self {
        Self {
            curated,
            sampling: None,
            affiliates: Vec::new(),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, CatalogError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let catalog = Self::from_toml_str(&content)?;
        info!(
            "Loaded catalog from {}: {} curated identifiers, {} affiliate links",
            path.display(),
            catalog.curated.len(),
            catalog.affiliates.len()
        );
        Ok(catalog)
    }

    pub fn with_sampling(mut self, sampling: Option<RandomSampling>) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_affiliates(mut self, affiliates: Vec<AffiliateLink>) -> Self {
        self.affiliates = affiliates;
        self
    }

    /// Curated identifiers in order, duplicates dropped, followed by the
    /// random sample (if configured) in ascending order.
    pub fn identifiers<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<Identifier>, CatalogError> {
        let mut seen = HashSet::new();
        let mut identifiers: Vec<Identifier> = self
            .curated
            .iter()
            .filter(|id| seen.insert(id.cid))
            .cloned()
            .collect();

        if let Some(sampling) = &self.sampling {
            let sampled = sample_unique(
                rng,
                sampling.sample_size,
                sampling.range_start,
                sampling.range_end,
                &seen,
            )?;
            debug!("Sampled {} identifiers", sampled.len());
            identifiers.extend(sampled.into_iter().map(Identifier::auto));
        }

        Ok(identifiers)
    }
}

/// Draws `count` distinct values from `start..=end` that are not in `exclude`.
///
/// Always terminates: sampling is done without replacement over index space.
pub fn sample_unique<R: Rng + ?Sized>(
    rng: &mut R,
    count: usize,
    start: Cid,
    end: Cid,
    exclude: &HashSet<Cid>,
) -> Result<Vec<Cid>, CatalogError> {
    if end < start {
        return Err(CatalogError::InvalidRange { start, end });
    }
    if count == 0 {
        return Ok(Vec::new());
    }

    let span = (end - start)
        .checked_add(1)
        .ok_or(CatalogError::InvalidRange { start, end })?;
    let length = usize::try_from(span).map_err(|_| CatalogError::InvalidRange { start, end })?;

    let overlap = exclude.iter().filter(|cid| (start..=end).contains(*cid)).count();
    let available = span - overlap as u64;
    if count as u64 > available {
        return Err(CatalogError::RangeExhausted {
            requested: count,
            available,
        });
    }

    // At most `overlap` of the drawn values can be excluded.
    let amount = (count + overlap).min(length);
    let mut values: Vec<Cid> = rand::seq::index::sample(rng, length, amount)
        .into_iter()
        .map(|offset| start + offset as Cid)
        .filter(|cid| !exclude.contains(cid))
        .take(count)
        .collect();
    values.sort_unstable();

    Ok(values)
}

fn default_curated() -> Vec<Identifier> {
    [
        ("Google Maps 1", 1833982),
        ("Google Maps 2", 1917615),
        ("Google Maps 3", 1829668),
        ("Google Search 1", 1908617),
        ("Google Search 2", 1921868),
        ("Google Search 3", 1922847),
        ("Naver", 1881505),
        ("Bing", 1911217),
        ("Daum", 1908762),
        ("DuckDuckGo", 1895204),
        ("KB Kookmin Card", 1563295),
        ("Woori Card", 1654104),
        ("Woori Card (Master)", 1932810),
        ("BC Card", 1748498),
        ("Shinhan Card", 1760133),
        ("Shinhan Card (Master)", 1917257),
        ("Toss", 1917334),
        ("Hana Card", 1729471),
        ("KakaoPay", 1845109),
        ("Mastercard", 1889572),
        ("UnionPay", 1801110),
        ("Visa", 1889319),
        ("Korean Air", 1904827),
        ("Asiana Airlines", 1806212),
        ("Air Seoul", 1800120),
    ]
    .into_iter()
    .map(|(label, cid)| Identifier::new(label, cid))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_sample_fills_small_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let values = sample_unique(&mut rng, 50, 1, 100, &HashSet::new()).unwrap();

        assert_eq!(values.len(), 50);
        let distinct: HashSet<_> = values.iter().collect();
        assert_eq!(distinct.len(), 50);
        assert!(values.iter().all(|v| (1..=100).contains(v)));
    }

    #[test]
    fn test_sample_whole_range() {
        let mut rng = StdRng::seed_from_u64(1);
        let values = sample_unique(&mut rng, 100, 1, 100, &HashSet::new()).unwrap();
        assert_eq!(values, (1..=100).collect::<Vec<_>>());
    }

    #[test]
    fn test_sample_respects_exclusions() {
        let mut rng = StdRng::seed_from_u64(3);
        let exclude: HashSet<Cid> = (1..=10).collect();
        let values = sample_unique(&mut rng, 10, 1, 20, &exclude).unwrap();
        assert_eq!(values, (11..=20).collect::<Vec<_>>());
    }

    #[test]
    fn test_sample_exhausted() {
        let mut rng = StdRng::seed_from_u64(3);
        let exclude: HashSet<Cid> = [5].into_iter().collect();
        let err = sample_unique(&mut rng, 10, 1, 10, &exclude).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::RangeExhausted { requested: 10, available: 9 }
        ));
        assert!(matches!(
            sample_unique(&mut rng, 1, 10, 1, &HashSet::new()),
            Err(CatalogError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_seeded_sampling_is_reproducible() {
        let catalog = Catalog::default();
        let a = catalog.identifiers(&mut StdRng::seed_from_u64(42)).unwrap();
        let b = catalog.identifiers(&mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_identifiers_unique_and_labeled() {
        let catalog = Catalog::curated_only(vec![
            Identifier::new("Naver", 1881505),
            Identifier::new("Naver again", 1881505),
            Identifier::new("Bing", 1911217),
        ])
        .with_sampling(Some(RandomSampling {
            sample_size: 5,
            range_start: 1881500,
            range_end: 1881510,
        }));

        let ids = catalog.identifiers(&mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(ids.len(), 7);
        assert_eq!(ids[0], Identifier::new("Naver", 1881505));
        assert_eq!(ids[1], Identifier::new("Bing", 1911217));

        let distinct: HashSet<_> = ids.iter().map(|id| id.cid).collect();
        assert_eq!(distinct.len(), ids.len());
        for id in &ids[2..] {
            assert_eq!(id.label, format!("AUTO-{}", id.cid));
        }
    }

    #[test]
    fn test_catalog_from_toml() {
        let catalog = Catalog::from_toml_str(
            r#"
            [[curated]]
            label = "Naver"
            cid = 1881505

            [sampling]
            sample_size = 3
            range_start = 1
            range_end = 10

            [[affiliates]]
            label = "Summer deals"
            url = "https://www.agoda.com/deals?cid=1881505"
            "#,
        )
        .unwrap();

        assert_eq!(catalog.curated, vec![Identifier::new("Naver", 1881505)]);
        assert_eq!(catalog.sampling.as_ref().map(|s| s.sample_size), Some(3));
        assert_eq!(catalog.affiliates.len(), 1);
    }

    #[test]
    fn test_catalog_toml_defaults() {
        let catalog = Catalog::from_toml_str("").unwrap();
        assert_eq!(catalog.curated.len(), 25);
        assert!(catalog.sampling.is_none());
    }

    #[test]
    fn test_catalog_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Catalog::load(dir.path().join("missing.toml")),
            Err(CatalogError::Io(_))
        ));

        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[[curated]]\nlabel = 5\n").unwrap();
        assert!(matches!(Catalog::load(&path), Err(CatalogError::Toml(_))));
    }
}
