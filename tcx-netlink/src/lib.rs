//! Namespace-aware access to Linux traffic control objects.
//!
//! [`NetworkNamespace::with_socket`] runs work against an rtnetlink socket bound to a network
//! namespace, [`RtnetlinkBackend`] dumps qdiscs, classes and filters through such sockets, and
//! [`ObjectFetcher`] turns the dumps into typed objects for a single device.
#![doc(issue_tracker_base_url = "https://github.com/chainbound/tcx/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod backend;
pub mod error;
pub mod fetch;
pub mod namespace;
pub mod object;
pub mod xstats;

pub use backend::{RtnetlinkBackend, TcBackend};
pub use error::{Error, Result};
pub use fetch::ObjectFetcher;
pub use namespace::{NamespaceSocket, NetworkNamespace};
pub use object::{BaseStats, Category, ClassObject, Device, FilterObject, QdiscObject, TcObject};
