//! Client boundary to the coordination service
//!
//! Provides the pieces a holder needs to talk to a cluster:
//! - [`CoordinationSession`] - session contract (reads re-arm one-shot watches)
//! - [`SessionFactory`] - resolves the cluster and opens sessions
//! - [`Connector`] - transport seam a deployment implements
//! - [`MemoryCluster`] - embedded in-process backend (reference + tests + CLI)
//!
//! # Basic Usage
//! ```no_run
//! use std::sync::Arc;
//!
//! use confkeeper::{ConfigStore, MemoryCluster, Settings};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let settings = Settings::load(None).unwrap();
//!
//!     let cluster = MemoryCluster::new();
//!     cluster.ensure(&settings.store.path).unwrap();
//!
//!     let store = ConfigStore::open(Arc::new(cluster.connector()), &settings)
//!         .await
//!         .unwrap();
//!
//!     println!("flush_interval = {:?}", store.get("flush_interval"));
//!
//!     store.shutdown().await;
//! }
//! ```

mod factory;
mod memory;
mod session;

pub use factory::*;
pub use memory::*;
pub use session::*;
