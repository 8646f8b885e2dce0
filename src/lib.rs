//! dnsmasq webhook
//!
//! An [external-dns] webhook provider that manages DNS records on a router whose resolver is
//! [dnsmasq], e.g. a Firewalla box.
//!
//! Records live as one configuration file per record in a directory dnsmasq reads with
//! `conf-dir`. The webhook lists records by parsing that directory, applies external-dns
//! change-sets by writing and deleting files, and restarts the resolver once per applied
//! change-set. Change-sets are applied strictly one at a time, in arrival order.
//!
//! [external-dns]: https://github.com/kubernetes-sigs/external-dns
//! [dnsmasq]: https://thekelleys.org.uk/dnsmasq/doc.html
//!
#![warn(clippy::pedantic)]

pub mod api;
pub mod apply;
pub mod config;
pub mod error;
pub mod record;
pub mod record_store;
pub mod reload;

pub use api::new as new_http;
pub use apply::{ChangeApplier, Changes, MutationSerializer};
pub use config::{Config, SharedConfig};
pub use record::{Record, RecordKind};
pub use record_store::{DirectoryStore, DynRecordStore, RecordStore};
