#![warn(missing_docs)]

//! Process-manager bootstrap client for the weft broker.
//!
//! At startup every broker rank must learn its identity (rank, size, job
//! namespace) and exchange small configuration strings (endpoint URIs,
//! public keys) with its peers through whatever process-management interface
//! the surrounding launcher provides. This crate hides the four ways that
//! can happen behind one handle:
//!
//! - a wire-protocol client over a launcher-provided file descriptor,
//! - a dynamically loaded legacy (flat-C) library,
//! - a dynamically loaded modern (namespaced, typed) library,
//! - a singleton universe when no launcher is present.
//!
//! [`Pmi::create`] probes for them in that order and the returned handle
//! routes `init` / `get_params` / `kvs_put` / `kvs_commit` / `kvs_get` /
//! `barrier` / `finalize` to the selected backend until it is dropped.

mod dispatch;
mod dso;
mod factory;
mod params;
mod pmi1;
mod pmix;
mod status;
#[cfg(test)]
mod testutil;
mod wire;

pub use dispatch::{Mode, Pmi};
pub use params::{KVSNAME_MAX, PmiParams};
pub use status::{PmiError, Result};
pub use wire::{NoWire, WireClient, WireConnector};
