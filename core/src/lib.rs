pub mod audit;
pub mod classifier;
pub mod engine;
pub mod ingest;
pub mod lifecycle;
pub mod model;
pub mod remediation;
pub mod report;
pub mod severity;
pub mod storage;
pub mod store;

pub mod error;
