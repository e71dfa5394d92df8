//! Turns raw index hits into ranked product results.
//!
//! Ranking keeps the index's order: it scores each hit, joins it against the
//! catalog by row id and applies the gender filter, but never re-sorts.
//! Hits without a catalog row are dropped.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::catalog::{Catalog, ProductRecord};
use crate::retrieval::index::Neighbor;

/// Convert a distance into a similarity score in (0, 1].
///
/// `score(0) == 1` and the score falls towards 0 as distance grows.
/// Negative distances (float noise on identical vectors) count as 0.
pub fn score(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

/// Which gender category results may belong to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenderFilter {
    #[default]
    #[serde(alias = "all")]
    All,
    #[serde(alias = "men")]
    Men,
    #[serde(alias = "women")]
    Women,
}

impl GenderFilter {
    /// Whether a product with the given gender category passes the filter.
    pub fn admits(&self, gender: &str) -> bool {
        match self {
            GenderFilter::All => true,
            GenderFilter::Men => gender == "Men",
            GenderFilter::Women => gender == "Women",
        }
    }
}

impl fmt::Display for GenderFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GenderFilter::All => "All",
            GenderFilter::Men => "Men",
            GenderFilter::Women => "Women",
        };
        f.write_str(name)
    }
}

impl FromStr for GenderFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(GenderFilter::All),
            "men" => Ok(GenderFilter::Men),
            "women" => Ok(GenderFilter::Women),
            _ => Err(format!("unknown gender filter {s:?}, expected all, men or women")),
        }
    }
}

/// A scored retrieval hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CandidateMatch {
    pub distance: f32,
    /// Catalog row the hit points at
    #[serde(rename = "row_id")]
    pub product_id: i64,
    pub score: f32,
}

impl From<Neighbor> for CandidateMatch {
    fn from(neighbor: Neighbor) -> Self {
        Self {
            distance: neighbor.distance,
            product_id: neighbor.id,
            score: score(neighbor.distance),
        }
    }
}

/// A hit joined with its product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRow {
    #[serde(flatten)]
    pub candidate: CandidateMatch,
    #[serde(flatten)]
    pub product: ProductRecord,
}

/// Results in descending score order.
pub type RankedResult = Vec<RankedRow>;

/// Score, join and filter index hits.
///
/// `neighbors` must already be nearest first, as returned by the index; that
/// order is kept. At most `k` hits are considered, so filtering can leave
/// fewer than `k` rows even when more matching products exist.
pub fn rank(
    neighbors: &[Neighbor],
    k: usize,
    catalog: &Catalog,
    filter: GenderFilter,
) -> RankedResult {
    neighbors
        .iter()
        .take(k)
        .filter_map(|neighbor| {
            let Some(product) = catalog.get_by_id(neighbor.id) else {
                log::debug!("dropping hit {}: no catalog row", neighbor.id);
                return None;
            };

            Some(RankedRow {
                candidate: CandidateMatch::from(*neighbor),
                product: product.clone(),
            })
        })
        .filter(|row| filter.admits(&row.product.gender))
        .collect()
}
