//! Deciding whether an asset may be deleted.

use crate::content::Asset;
use crate::error::Result;
use crate::store::ContentStore;
use chrono::{DateTime, TimeDelta, Utc};

/// True if nothing references `asset` and it was created more than
/// `retention` before `now`.
///
/// The reference lookup runs first and ignores versions; an asset created
/// exactly `retention` ago is kept, and so is everything when `now -
/// retention` falls outside the representable time range.
pub fn is_eligible<S: ContentStore + ?Sized>(
    store: &S,
    asset: &Asset,
    now: DateTime<Utc>,
    retention: TimeDelta,
) -> Result<bool> {
    if store.reference_count(&asset.id.without_version())? > 0 {
        return Ok(false);
    }

    Ok(now
        .checked_sub_signed(retention)
        .is_some_and(|cutoff| asset.created < cutoff))
}
