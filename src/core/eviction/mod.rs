//! # Eviction Module
//!
//! Keeps the cache inside two independent caps: entry count and total byte
//! size.
//!
//! ## Policy
//! - Nothing happens while both caps hold.
//! - Once either cap is exceeded, non-favorite wallpapers are removed
//!   least recently used first until *both* the count and the size are at or
//!   below the target utilization (a percentage of each cap). Stopping below
//!   the hard cap leaves headroom so the next add does not evict again.
//! - Favorites are never evicted, even if that leaves a cap exceeded.
//! - A file that cannot be deleted is logged and its record kept; the pass
//!   moves on to the next candidate.
//! - A pass may spare one wallpaper. Adding a wallpaper spares it, so an add
//!   never hands back a record whose file was just deleted.

use crate::core::store::{RecordFilter, RecordOrder, RecordQuery, Store};
use crate::error::CacheError;
use crate::events::{CacheEvent, EventSender, EvictionSummary};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Default maximum number of cached wallpapers
pub const DEFAULT_MAX_ENTRIES: usize = 1000;
/// Default maximum total size (5000 MiB)
pub const DEFAULT_MAX_SIZE_BYTES: u64 = 5000 * 1024 * 1024;
/// Default share of each cap that eviction reduces to
pub const DEFAULT_TARGET_PERCENT: u8 = 90;

/// Count and size caps with a target utilization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheLimits {
    pub max_entries: usize,
    pub max_size_bytes: u64,
    /// 1..=100
    pub target_percent: u8,
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            target_percent: DEFAULT_TARGET_PERCENT,
        }
    }
}

impl CacheLimits {
    /// Build limits, rejecting zero caps. The target is clamped to 1..=100.
    pub fn new(
        max_entries: usize,
        max_size_bytes: u64,
        target_percent: u8,
    ) -> Result<Self, CacheError> {
        if max_entries == 0 {
            return Err(CacheError::invalid("max_entries", "must be greater than 0"));
        }
        if max_size_bytes == 0 {
            return Err(CacheError::invalid("max_size_bytes", "must be greater than 0"));
        }
        Ok(Self {
            max_entries,
            max_size_bytes,
            target_percent: target_percent.clamp(1, 100),
        })
    }

    /// Entry count an eviction pass reduces to
    pub fn target_entries(&self) -> usize {
        // never above max_entries, so narrowing back cannot truncate
        (self.max_entries as u128 * self.target_percent as u128 / 100) as usize
    }

    /// Byte size an eviction pass reduces to
    pub fn target_bytes(&self) -> u64 {
        (self.max_size_bytes as u128 * self.target_percent as u128 / 100) as u64
    }

    /// Whether either hard cap is exceeded
    pub fn exceeded_by(&self, count: usize, bytes: u64) -> bool {
        count > self.max_entries || bytes > self.max_size_bytes
    }

    fn satisfied_by(&self, count: usize, bytes: u64) -> bool {
        count <= self.target_entries() && bytes <= self.target_bytes()
    }
}

/// Enforces [`CacheLimits`] on a [`Store`]
pub struct EvictionEngine<'a> {
    store: &'a Store,
    limits: CacheLimits,
    events: &'a EventSender,
    spared: Option<&'a str>,
}

impl<'a> EvictionEngine<'a> {
    pub fn new(store: &'a Store, limits: CacheLimits, events: &'a EventSender) -> Self {
        Self {
            store,
            limits,
            events,
            spared: None,
        }
    }

    /// Never evict `id` during this pass
    pub fn sparing(mut self, id: &'a str) -> Self {
        self.spared = Some(id);
        self
    }

    /// Run one eviction pass.
    ///
    /// Every removal is its own short write, so readers are never blocked
    /// for the length of the whole pass.
    pub fn enforce(&self) -> Result<EvictionSummary, CacheError> {
        let (mut count, mut bytes) = self.store.totals()?;
        if !self.limits.exceeded_by(count, bytes) {
            debug!(count, bytes, "Cache within limits");
            return Ok(EvictionSummary {
                remaining_count: count,
                remaining_bytes: bytes,
                ..Default::default()
            });
        }

        info!(
            count,
            bytes,
            max_entries = self.limits.max_entries,
            max_size_bytes = self.limits.max_size_bytes,
            "Cache over limits, evicting"
        );

        let candidates = self.store.query_all(&RecordQuery::new(
            RecordFilter::all().favorite(false),
            RecordOrder::LastUsedAsc,
        ))?;

        let mut summary = EvictionSummary::default();
        for candidate in candidates {
            if self.limits.satisfied_by(count, bytes) {
                break;
            }
            if self.spared == Some(candidate.id.as_str()) {
                continue;
            }

            match self.store.remove(&candidate.id) {
                Ok(removed) => {
                    count = count.saturating_sub(1);
                    bytes = bytes.saturating_sub(removed.size_bytes);
                    summary.removed += 1;
                    debug!(
                        id = %removed.id,
                        path = %removed.local_path.display(),
                        "Evicted wallpaper"
                    );
                    self.events.send(CacheEvent::Evicted {
                        id: removed.id,
                        path: removed.local_path,
                        size_bytes: removed.size_bytes,
                    });
                }
                Err(CacheError::FileSystem { path, source }) => {
                    warn!(
                        id = %candidate.id,
                        path = %path.display(),
                        error = %source,
                        "Could not delete wallpaper file, skipping"
                    );
                    summary.skipped += 1;
                }
                // removed by someone else since the scan
                Err(CacheError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        let (remaining_count, remaining_bytes) = self.store.totals()?;
        summary.remaining_count = remaining_count;
        summary.remaining_bytes = remaining_bytes;

        if self.limits.exceeded_by(remaining_count, remaining_bytes) {
            warn!(
                remaining_count,
                remaining_bytes,
                "Cache still over limits after eviction, only favorites or kept files remain"
            );
        }
        info!(
            removed = summary.removed,
            skipped = summary.skipped,
            remaining_count,
            remaining_bytes,
            "Eviction complete"
        );
        self.events.send(CacheEvent::EvictionCompleted(summary.clone()));

        Ok(summary)
    }
}
