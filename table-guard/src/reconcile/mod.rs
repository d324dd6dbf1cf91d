//! Table/order reconciliation core
//!
//! Pure functions over a [`Snapshot`]: no store access, no clock reads
//! except in [`detect`] itself.

pub mod canonical;
pub mod detect;
pub mod finding;
pub mod fix;
pub mod normalize;
pub mod snapshot;

pub use canonical::pick_canonical_open_order_for_table;
pub use detect::{DetectReport, SeverityCounts, detect, detect_at};
pub use finding::{Finding, FindingCode, Severity};
pub use fix::{Fix, FixKey, FixSet, OrderPatch, OrderTarget, TablePatch, TableTarget, coalesce};
pub use normalize::{NormalizedTable, normalize};
pub use snapshot::Snapshot;
