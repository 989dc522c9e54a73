//! Bronze-layer ingestion: one raw retail extract in, three lineage-tagged
//! entity tables (`products`, `sales`, `return_reasons`) out.

pub mod config;
pub mod error;
pub mod extract;
pub mod lineage;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod projection;
pub mod store;
pub mod types;

pub use config::Config;
pub use error::{BronzeError, Result};
pub use pipeline::{BronzePipeline, RunReport};
