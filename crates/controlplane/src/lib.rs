//! # controlplane
//!
//! Blocking REST client for the Synadia control plane.
//!
//! [`HttpStore`] implements [`declarative::RemoteStore`], so the lifecycle
//! engine can drive real clusters, streams and users through it. The
//! [`lookup`] module offers read-only queries (data sources) over any store.
//!
//! ## Example
//!
//! ```no_run
//! use controlplane::{HttpStore, lookup};
//! use declarative::CallContext;
//!
//! let store = HttpStore::new(controlplane::DEFAULT_ENDPOINT, "my-token").unwrap();
//! let ids = lookup::cluster_ids(&store, &CallContext::new()).unwrap();
//! println!("{} clusters", ids.len());
//! ```
//!
//! ## Routes
//!
//! | Kind      | Collection                                      |
//! |-----------|-------------------------------------------------|
//! | cluster   | `/organizations/{organization_id}/clusters` or `/clusters` |
//! | stream    | `/clusters/{cluster_id}/streams`                |
//! | consumer  | `/clusters/{cluster_id}/streams/{stream_id}/consumers` |
//! | user      | `/organizations/{organization_id}/users` or `/users` |
//!
//! See [`routes::Route`] for the complete table.

pub mod client;
pub mod error;
pub mod lookup;
pub mod routes;

pub use client::{DEFAULT_ENDPOINT, DEFAULT_TIMEOUT, HttpStore};
pub use error::{Error, Result};
pub use lookup::Entity;
