//! Uniform dispatch over the selected backend.
//!
//! A [`Pmi`] handle owns exactly one backend variant for its whole lifetime.
//! Every operation matches on the variant exhaustively, so each backend is
//! statically required to answer the full operation set.

use std::ffi::c_int;
use std::fmt;

use crate::params::{KVSNAME_MAX, PmiParams, from_c_buf};
use crate::pmi1::{self, Pmi1Api};
use crate::pmix::PmixState;
use crate::status::{PmiError, Result};
use crate::wire::WireClient;

/// Backend variant selected at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
	/// No launcher: one rank, no external store.
	Singleton,
	/// Launcher-provided wire protocol over a file descriptor.
	Wire1,
	/// Dynamically loaded legacy library.
	Dlopen,
	/// Dynamically loaded modern library.
	Pmix,
}

impl Mode {
	/// Trace rendering of the variant.
	pub fn as_str(self) -> &'static str {
		match self {
			Mode::Singleton => "singleton",
			Mode::Wire1 => "wire.1",
			Mode::Dlopen => "dlopen",
			Mode::Pmix => "pmix",
		}
	}
}

impl fmt::Display for Mode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

pub(crate) enum Backend {
	Singleton,
	Wire(Box<dyn WireClient>),
	Dlopen(Box<dyn Pmi1Api>),
	Pmix(PmixState),
}

impl Backend {
	fn mode(&self) -> Mode {
		match self {
			Backend::Singleton => Mode::Singleton,
			Backend::Wire(_) => Mode::Wire1,
			Backend::Dlopen(_) => Mode::Dlopen,
			Backend::Pmix(_) => Mode::Pmix,
		}
	}
}

/// Bootstrap handle through which the broker reaches its process manager.
///
/// Constructed once by [`Pmi::create`] or [`Pmi::create_pmix`]; the selected
/// backend never changes afterwards.
pub struct Pmi {
	pub(crate) backend: Backend,
	pub(crate) prefix: &'static str,
	pub(crate) debug: i32,
	/// Cached rank for traces; -1 until `get_params` succeeds.
	pub(crate) rank: i32,
}

impl Pmi {
	pub(crate) fn with_backend(backend: Backend, prefix: &'static str, debug: i32) -> Self {
		Self {
			backend,
			prefix,
			debug,
			rank: -1,
		}
	}

	/// The backend variant this handle multiplexes to.
	pub fn mode(&self) -> Mode {
		self.backend.mode()
	}

	/// Perform the session handshake with the process manager.
	pub fn init(&mut self) -> Result<()> {
		let ret = match &mut self.backend {
			Backend::Singleton => Ok(()),
			Backend::Wire(cli) => cli.init(),
			Backend::Dlopen(api) => pmi1::init(api.as_ref()),
			Backend::Pmix(px) => px.init(),
		};
		self.trace(format_args!("init"), &ret);
		ret
	}

	/// Report rank, size, and the job's kvsname.
	pub fn get_params(&mut self) -> Result<PmiParams> {
		let ret = match &mut self.backend {
			Backend::Singleton => Ok(PmiParams {
				rank: 0,
				size: 1,
				kvsname: "singleton".to_owned(),
			}),
			Backend::Wire(cli) => {
				let rank = cli.rank();
				let size = cli.size();
				let mut buf = [0u8; KVSNAME_MAX + 1];
				cli.kvs_get_my_name(&mut buf).map(|()| PmiParams {
					rank,
					size,
					kvsname: from_c_buf(&buf),
				})
			}
			Backend::Dlopen(api) => pmi1::get_params(api.as_ref()),
			Backend::Pmix(px) => px.get_params(),
		};
		if let Ok(params) = &ret {
			// Cached exactly once, after the whole operation succeeded;
			// traces carry it from here on.
			self.rank = params.rank;
		}
		match &ret {
			Ok(p) => self.trace(
				format_args!("get_params (rank={} size={} kvsname={})", p.rank, p.size, p.kvsname),
				&Ok(()),
			),
			Err(e) => self.trace(
				format_args!("get_params (rank=-1 size=-1 kvsname=<none>)"),
				&Err(*e),
			),
		}
		ret
	}

	/// Enqueue one key/value binding. Durable only after the next commit and
	/// barrier, except on backends that commit per put.
	pub fn kvs_put(&mut self, kvsname: &str, key: &str, value: &str) -> Result<()> {
		let ret = match &mut self.backend {
			Backend::Singleton => Ok(()),
			Backend::Wire(cli) => cli.kvs_put(kvsname, key, value),
			Backend::Dlopen(api) => pmi1::kvs_put(api.as_ref(), kvsname, key, value),
			Backend::Pmix(px) => px.kvs_put(kvsname, key, value),
		};
		self.trace(
			format_args!("kvs_put (kvsname={kvsname} key={key} value={value})"),
			&ret,
		);
		ret
	}

	/// Flush pending puts to the manager.
	pub fn kvs_commit(&mut self, kvsname: &str) -> Result<()> {
		let ret = match &mut self.backend {
			Backend::Singleton => Ok(()),
			// The wire protocol commits per put.
			Backend::Wire(_) => Ok(()),
			Backend::Dlopen(api) => pmi1::kvs_commit(api.as_ref(), kvsname),
			Backend::Pmix(px) => px.kvs_commit(),
		};
		self.trace(format_args!("kvs_commit (kvsname={kvsname})"), &ret);
		ret
	}

	/// Fetch the value bound to `key` into `value`, NUL-terminated and
	/// truncated to `value.len() - 1` bytes.
	pub fn kvs_get(&mut self, kvsname: &str, key: &str, value: &mut [u8]) -> Result<()> {
		let ret = match &mut self.backend {
			Backend::Singleton => Err(PmiError::Fail),
			Backend::Wire(cli) => cli.kvs_get(kvsname, key, value),
			Backend::Dlopen(api) => pmi1::kvs_get(api.as_ref(), kvsname, key, value),
			Backend::Pmix(px) => px.kvs_get(kvsname, key, value),
		};
		match &ret {
			Ok(()) => self.trace(
				format_args!(
					"kvs_get (kvsname={kvsname} key={key} value={})",
					from_c_buf(value)
				),
				&Ok(()),
			),
			Err(e) => self.trace(
				format_args!("kvs_get (kvsname={kvsname} key={key} value=<none>)"),
				&Err(*e),
			),
		}
		ret
	}

	/// All-ranks synchronization. Once this returns success, every committed
	/// put from every rank is visible to `kvs_get`.
	pub fn barrier(&mut self) -> Result<()> {
		let ret = match &mut self.backend {
			Backend::Singleton => Ok(()),
			Backend::Wire(cli) => cli.barrier(),
			Backend::Dlopen(api) => pmi1::barrier(api.as_ref()),
			Backend::Pmix(px) => px.barrier(),
		};
		self.trace(format_args!("barrier"), &ret);
		ret
	}

	/// Tear down the session. Backend teardown failures are traced but do
	/// not fail the caller; destruction follows regardless.
	pub fn finalize(&mut self) -> Result<()> {
		let ret = match &mut self.backend {
			Backend::Singleton => Ok(()),
			Backend::Wire(cli) => cli.finalize(),
			Backend::Dlopen(api) => pmi1::finalize(api.as_ref()),
			Backend::Pmix(px) => px.finalize(),
		};
		self.trace(format_args!("finalize"), &ret);
		Ok(())
	}

	fn trace(&self, op: fmt::Arguments<'_>, ret: &Result<()>) {
		if self.debug > 0 {
			tracing::debug!(
				"{}",
				format_trace(self.prefix, self.backend.mode(), self.rank, op, ret)
			);
		}
	}
}

impl Drop for Pmi {
	fn drop(&mut self) {
		// Backend teardown must not disturb the caller's errno.
		let saved = errno();
		drop(std::mem::replace(&mut self.backend, Backend::Singleton));
		set_errno(saved);
	}
}

pub(crate) fn format_trace(
	prefix: &str,
	mode: Mode,
	rank: i32,
	op: fmt::Arguments<'_>,
	ret: &Result<()>,
) -> String {
	let status = match ret {
		Ok(()) => "success".to_owned(),
		Err(e) => e.to_string(),
	};
	format!("{prefix}-{mode}[{rank}]: {op} = {status}")
}

#[cfg(target_os = "macos")]
use libc::__error as errno_location;
#[cfg(not(target_os = "macos"))]
use libc::__errno_location as errno_location;

fn errno() -> c_int {
	unsafe { *errno_location() }
}

fn set_errno(value: c_int) {
	unsafe { *errno_location() = value };
}
