//! # Batch Range Calculator
//!
//! Inclusive, 1-based record ranges for paged ERP fetches, per-entity batch
//! size limits, and the skip-list of ranges known to break the ERP.
//!
//! ## Range Arithmetic
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  cursor (records consumed)   batch_size   →   range                     │
//! │  ─────────────────────────   ──────────       ──────────────            │
//! │            0                     20           [1, 20]                   │
//! │           20                     20           [21, 40]                  │
//! │         3194                     11           [3195, 3205]              │
//! │                                                                         │
//! │  Bad range products [3201, 3210] overlaps [3195, 3205]:                │
//! │                                                                         │
//! │   3195 ········ 3201 ████████████ 3210 ······                           │
//! │   └──── requested ─────┘                                               │
//! │                                                                         │
//! │   → whole requested range skipped, cursor jumps to 3210,               │
//! │     next request starts at 3211                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use ts_rs::TS;

use crate::types::EntityType;

// =============================================================================
// Batch Range
// =============================================================================

/// Inclusive `[start, end]` range of 1-based record positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BatchRange {
    pub start: u64,
    pub end: u64,
}

impl BatchRange {
    /// Range following `start_index` consumed records.
    ///
    /// `start = start_index + 1`, `end = start + batch_size - 1`. A zero batch
    /// size is treated as one.
    ///
    /// ## Example
    /// ```rust
    /// use verial_core::batch::BatchRange;
    ///
    /// let range = BatchRange::next(0, 20);
    /// assert_eq!((range.start, range.end), (1, 20));
    /// assert_eq!(range.size(), 20);
    /// ```
    pub fn next(start_index: u64, batch_size: u64) -> Self {
        let start = start_index.saturating_add(1);
        let end = start.saturating_add(batch_size.max(1) - 1);
        BatchRange { start, end }
    }

    /// Number of positions in the range.
    pub fn size(&self) -> u64 {
        effective_size(self.start, self.end)
    }

    /// True when the two inclusive ranges share at least one position.
    pub fn overlaps(&self, start: u64, end: u64) -> bool {
        self.start <= end && start <= self.end
    }

    pub fn contains(&self, position: u64) -> bool {
        self.start <= position && position <= self.end
    }
}

impl fmt::Display for BatchRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// `end - start + 1`, or zero for an inverted range.
pub fn effective_size(start: u64, end: u64) -> u64 {
    if end < start {
        0
    } else {
        end - start + 1
    }
}

// =============================================================================
// Limits & Bad Ranges
// =============================================================================

/// Inclusive bounds on the batch size for one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchLimits {
    pub min: u64,
    pub max: u64,
}

impl BatchLimits {
    pub const fn new(min: u64, max: u64) -> Self {
        BatchLimits { min, max }
    }

    /// Built-in limits: products 1-200, orders 1-100, customers 1-100.
    pub const fn defaults_for(entity: EntityType) -> Self {
        match entity {
            EntityType::Products => BatchLimits::new(1, 200),
            EntityType::Orders => BatchLimits::new(1, 100),
            EntityType::Customers => BatchLimits::new(1, 100),
        }
    }

    pub fn clamp(&self, size: u64) -> u64 {
        let min = self.min.max(1);
        size.clamp(min, self.max.max(min))
    }
}

/// A range of positions the ERP is known to fail on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadRange {
    pub entity: EntityType,
    pub start: u64,
    pub end: u64,
}

/// Ranges skipped for every installation.
pub const DEFAULT_BAD_RANGES: &[BadRange] = &[BadRange {
    entity: EntityType::Products,
    start: 3201,
    end: 3210,
}];

/// What the next batch should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangePlan {
    /// Fetch this range.
    Fetch(BatchRange),
    /// Skip `requested` because it overlaps `bad`; continue from `next_cursor`.
    Skip {
        requested: BatchRange,
        bad: BadRange,
        next_cursor: u64,
    },
}

// =============================================================================
// Calculator
// =============================================================================

/// Range planning with per-entity limits and the bad-range skip list.
#[derive(Debug, Clone)]
pub struct BatchRangeCalculator {
    limits: HashMap<EntityType, BatchLimits>,
    bad_ranges: Vec<BadRange>,
}

impl Default for BatchRangeCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchRangeCalculator {
    /// Calculator with the built-in limits and bad ranges.
    pub fn new() -> Self {
        let limits = EntityType::ALL
            .iter()
            .map(|entity| (*entity, BatchLimits::defaults_for(*entity)))
            .collect();

        BatchRangeCalculator {
            limits,
            bad_ranges: DEFAULT_BAD_RANGES.to_vec(),
        }
    }

    /// Replaces the limits for one entity.
    pub fn with_limits(mut self, entity: EntityType, limits: BatchLimits) -> Self {
        self.limits.insert(entity, limits);
        self
    }

    /// Adds ranges to the skip list. Inverted ranges are ignored.
    pub fn with_bad_ranges(mut self, extra: impl IntoIterator<Item = BadRange>) -> Self {
        for range in extra {
            if range.start <= range.end && !self.bad_ranges.contains(&range) {
                self.bad_ranges.push(range);
            }
        }
        self.bad_ranges.sort_by_key(|r| (r.start, r.end));
        self
    }

    /// See [`BatchRange::next`].
    pub fn next_range(&self, start_index: u64, batch_size: u64) -> BatchRange {
        BatchRange::next(start_index, batch_size)
    }

    /// See [`effective_size`].
    pub fn effective_size(&self, start: u64, end: u64) -> u64 {
        effective_size(start, end)
    }

    pub fn limits(&self, entity: EntityType) -> BatchLimits {
        self.limits
            .get(&entity)
            .copied()
            .unwrap_or_else(|| BatchLimits::defaults_for(entity))
    }

    /// Clamps a requested batch size into the entity's limits.
    pub fn clamp_batch_size(&self, entity: EntityType, requested: u64) -> u64 {
        self.limits(entity).clamp(requested)
    }

    /// First configured bad range for `entity` that overlaps `range`.
    pub fn overlapping_bad_range(&self, entity: EntityType, range: &BatchRange) -> Option<BadRange> {
        self.bad_ranges
            .iter()
            .find(|bad| bad.entity == entity && range.overlaps(bad.start, bad.end))
            .copied()
    }

    pub fn bad_ranges(&self) -> &[BadRange] {
        &self.bad_ranges
    }

    /// Plans the batch following `cursor`.
    pub fn plan(&self, entity: EntityType, cursor: u64, batch_size: u64) -> RangePlan {
        let requested = self.next_range(cursor, self.clamp_batch_size(entity, batch_size));
        match self.overlapping_bad_range(entity, &requested) {
            Some(bad) => RangePlan::Skip {
                requested,
                bad,
                next_cursor: bad.end.max(cursor),
            },
            None => RangePlan::Fetch(requested),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
