pub mod logger;

pub use logger::{RECONCILE_TARGET, init_logger, init_logger_with_file};
