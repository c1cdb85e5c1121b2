//! `reactor-core`: the per-node control loop of a sharded, replicated key-value store.
//!
//! A [`Reactor`](reactor::Reactor) drives a single local storage region through whatever
//! replication role the cluster's [`Blueprint`](blueprint::Blueprint) assigns to this node —
//! `primary`, `secondary`, or `nothing` — while publishing its progress into a gossiped
//! [`Directory`](directory::Directory) and coordinating with peers through a shared
//! [`BranchHistory`](branch_history::BranchHistory).
//!
//! This crate does not choose the blueprint, resolve divergent data, or serve end-user queries —
//! those are the responsibilities of an external orchestrator, an operator, and the data path
//! respectively. It owns only the state machine that keeps a region's replicas converging safely.
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod activity;
pub mod backfill;
pub mod blueprint;
pub mod branch_history;
pub mod config;
pub mod directory;
pub mod drainer;
pub mod entry;
pub mod error;
pub mod interruptor;
pub mod mailbox;
pub mod master;
pub mod peer;
pub mod reactor;
pub mod reconciler;
pub mod region;
pub mod runners;
pub mod safety;
pub mod store;
pub mod version;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use activity::{Activity, ActivityMap, ReactorActivityId, ReactorBusinessCard};
pub use blueprint::{Blueprint, Role};
pub use config::ReactorConfig;
pub use error::{ErrorCategory, ReactorError, ReactorResult};
pub use interruptor::Interruptor;
pub use peer::PeerId;
pub use reactor::Reactor;
pub use region::Region;
pub use version::{BranchId, Version, VersionRange};
