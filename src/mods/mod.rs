//! Mod installation: planning, fetching, materializing and reconciling

mod archive;
mod engine;
mod fetch;
mod plan;

pub use archive::{materialize, ArchiveFormat, MaterializeError, Materialized};
pub use engine::{ReconcileReport, Reconciler};
pub use fetch::{Fetcher, HttpFetcher};
pub use plan::{Install, InstallTarget, Operation, OperationPlan, Removal};
