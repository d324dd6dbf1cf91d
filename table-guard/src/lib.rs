//! Table Guard - 桌台/订单一致性对账
//!
//! Tables and open orders are two denormalized views of the same fact
//! (which order occupies which table). Independent writers can leave them
//! disagreeing; this crate detects and repairs that.
//!
//! # 模块结构
//!
//! ```text
//! table-guard/src/
//! ├── reconcile/     # normalizer, detector, fixes, snapshots (pure)
//! ├── store/         # store trait + in-memory store
//! ├── worker.rs      # single pass + periodic worker
//! ├── core/          # configuration
//! ├── utils/         # logging
//! └── cli.rs         # command implementations for the binary
//! ```

pub mod cli;
pub mod core;
pub mod reconcile;
pub mod store;
pub mod utils;
pub mod worker;

pub use core::Config;
pub use reconcile::{
    DetectReport, Finding, FindingCode, Fix, NormalizedTable, Severity, Snapshot, detect,
    detect_at, normalize,
};
pub use store::{MemoryStore, StoreError, StoreResult, TableOrderStore};
pub use worker::{PassReport, ReconcileWorker, Reconciler};

// Re-export logger functions
pub use utils::logger::{cleanup_old_logs, init_logger, init_logger_with_file};

/// Initialize logging from configuration
pub fn setup_logging(config: &Config) -> anyhow::Result<()> {
    init_logger_with_file(&config.log_level, config.log_json, config.log_dir.as_deref())
}
