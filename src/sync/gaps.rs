use super::context::ChainContext;
use crate::db::DbError;

/// Ids inside `[min, max]` of `known` that are absent from it. `known` must be
/// sorted ascending.
pub fn missing_ids(known: &[u64]) -> Vec<u64> {
    known
        .windows(2)
        .flat_map(|pair| pair[0].saturating_add(1)..pair[1])
        .collect()
}

/// Ids below the lowest entry of `known`. Auction ids start at 1, so an id
/// that was never classified can sit before the first known one. `known`
/// must be sorted ascending.
pub fn leading_ids(known: &[u64]) -> Vec<u64> {
    match known.first() {
        Some(&lowest) => (1..lowest).collect(),
        None => Vec::new(),
    }
}

/// Unclassified ids at or below the highest classified id, split by where
/// they sit.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MissingIds {
    /// `1..lowest`, ascending.
    pub leading: Vec<u64>,
    /// Inside `[lowest, highest]`, ascending.
    pub gaps: Vec<u64>,
}

impl MissingIds {
    pub fn is_empty(&self) -> bool {
        self.leading.is_empty() && self.gaps.is_empty()
    }

    /// Every missing id, oldest first.
    pub fn into_ordered(self) -> Vec<u64> {
        let mut ids = self.leading;
        ids.extend(self.gaps);
        ids
    }
}

pub async fn find_missing(ctx: &ChainContext) -> Result<MissingIds, DbError> {
    let known = ctx.store.classified_ids(ctx.chain_id()).await?;
    Ok(MissingIds {
        leading: leading_ids(&known),
        gaps: missing_ids(&known),
    })
}

/// Auction ids between the lowest and highest classified id that are neither
/// a winner nor a tombstone. Reads the store only.
pub async fn find_gaps(ctx: &ChainContext) -> Result<Vec<u64>, DbError> {
    Ok(find_missing(ctx).await?.gaps)
}
