pub mod config;
pub mod error;
pub mod metrics;
pub mod prober;
pub mod report;
pub mod scheduler;
pub mod stats;
pub mod util;
