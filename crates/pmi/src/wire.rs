//! Named interface to the external wire-protocol client.
//!
//! Launchers that speak the line-oriented key/value protocol hand the broker
//! a pre-connected file descriptor plus rank and size. The protocol codec
//! lives outside this crate; the bootstrap core only drives it through
//! [`WireClient`].

use std::os::fd::RawFd;

use crate::Result;

/// One rank's connection to a launcher-provided wire-protocol endpoint.
pub trait WireClient {
	/// Session handshake with the launcher.
	fn init(&mut self) -> Result<()>;
	/// Orderly session teardown.
	fn finalize(&mut self) -> Result<()>;
	/// Rank advertised by the launcher at connection time.
	fn rank(&self) -> i32;
	/// Job size advertised by the launcher at connection time.
	fn size(&self) -> i32;
	/// Fetch the job's kvsname into `buf`, NUL-terminated.
	fn kvs_get_my_name(&mut self, buf: &mut [u8]) -> Result<()>;
	/// Send one key/value binding. The wire protocol commits per put, so
	/// there is no separate commit operation on this trait.
	fn kvs_put(&mut self, kvsname: &str, key: &str, value: &str) -> Result<()>;
	/// Fetch the value bound to `key` into `buf`, NUL-terminated.
	fn kvs_get(&mut self, kvsname: &str, key: &str, buf: &mut [u8]) -> Result<()>;
	/// All-ranks synchronization point.
	fn barrier(&mut self) -> Result<()>;
}

/// Constructor seam for [`WireClient`].
///
/// The factory calls this once with the values parsed from `PMI_FD`,
/// `PMI_RANK` and `PMI_SIZE`. Returning `None` declines wire mode and lets
/// selection fall through to the remaining backends.
pub trait WireConnector {
	/// Attempt to connect over the launcher-provided descriptor.
	fn connect(&self, fd: RawFd, rank: i32, size: i32, debug: i32) -> Option<Box<dyn WireClient>>;
}

/// Connector for embedders without a wire implementation; always declines.
pub struct NoWire;

impl WireConnector for NoWire {
	fn connect(&self, _fd: RawFd, _rank: i32, _size: i32, _debug: i32) -> Option<Box<dyn WireClient>> {
		None
	}
}
