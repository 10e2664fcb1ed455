//! Offline resource cache.
//!
//! Sits between the application and the network and keeps responses in named,
//! versioned partitions that outlive a single run:
//! - `install` pre-populates the static partition from a fixed manifest
//! - `activate` removes partitions left behind by older versions
//! - `fetch` answers reads cache-first and stores successful responses

mod http;
mod network;
mod route;
mod storage;
mod worker;

pub use http::{Request, Response};
pub use network::{HttpNetwork, Network};
pub use route::RouteTable;
pub use storage::{NoopStore, ResourceStore, SqliteStore};
pub use worker::{OfflineWorker, PartitionNames, WorkerOptions};

#[cfg(test)]
pub(crate) use worker::testing;
