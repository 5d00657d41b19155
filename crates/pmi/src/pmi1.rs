//! Legacy flat-C process-manager interface, bound behind the uniform
//! operations.
//!
//! The legacy library operates on a global implicit context: every entry
//! point is a free function and statuses are plain integers in the neutral
//! numbering.

use std::ffi::{CStr, c_char, c_int};

use crate::dso::{self, LibList, ObjectFile, Opener};
use crate::params::{KVSNAME_MAX, PmiParams};
use crate::status::{self, Result};

/// Base name tried when `PMI_LIBRARY` is not set.
pub(crate) const DEFAULT_LIBRARY: &str = "libpmi.so";

/// Exported by shims that route the legacy interface back into a broker;
/// loading one from the broker itself would recurse.
const SENTINEL: &str = "flux_pmi_library";

type InitFn = unsafe extern "C" fn(spawned: *mut c_int) -> c_int;
type FinalizeFn = unsafe extern "C" fn() -> c_int;
type GetSizeFn = unsafe extern "C" fn(size: *mut c_int) -> c_int;
type GetRankFn = unsafe extern "C" fn(rank: *mut c_int) -> c_int;
type BarrierFn = unsafe extern "C" fn() -> c_int;
type KvsGetMyNameFn = unsafe extern "C" fn(kvsname: *mut c_char, length: c_int) -> c_int;
type KvsPutFn =
	unsafe extern "C" fn(kvsname: *const c_char, key: *const c_char, value: *const c_char) -> c_int;
type KvsCommitFn = unsafe extern "C" fn(kvsname: *const c_char) -> c_int;
type KvsGetFn = unsafe extern "C" fn(
	kvsname: *const c_char,
	key: *const c_char,
	value: *mut c_char,
	length: c_int,
) -> c_int;

/// Resolved legacy entry points. Exists only with every field resolved.
struct Pmi1Table {
	init: InitFn,
	finalize: FinalizeFn,
	get_size: GetSizeFn,
	get_rank: GetRankFn,
	barrier: BarrierFn,
	kvs_get_my_name: KvsGetMyNameFn,
	kvs_put: KvsPutFn,
	kvs_commit: KvsCommitFn,
	kvs_get: KvsGetFn,
}

/// Uniform view of the legacy interface, seamed for tests.
pub(crate) trait Pmi1Api {
	fn init(&self, spawned: &mut c_int) -> c_int;
	fn finalize(&self) -> c_int;
	fn get_size(&self, size: &mut c_int) -> c_int;
	fn get_rank(&self, rank: &mut c_int) -> c_int;
	fn barrier(&self) -> c_int;
	fn kvs_get_my_name(&self, buf: &mut [u8]) -> c_int;
	fn kvs_put(&self, kvsname: &CStr, key: &CStr, value: &CStr) -> c_int;
	fn kvs_commit(&self, kvsname: &CStr) -> c_int;
	fn kvs_get(&self, kvsname: &CStr, key: &CStr, buf: &mut [u8]) -> c_int;
}

/// Loaded legacy library: the open handle plus its resolved table.
struct Pmi1Dso<O: ObjectFile> {
	_object: O,
	table: Pmi1Table,
}

impl<O: ObjectFile> Pmi1Api for Pmi1Dso<O> {
	fn init(&self, spawned: &mut c_int) -> c_int {
		unsafe { (self.table.init)(spawned) }
	}

	fn finalize(&self) -> c_int {
		unsafe { (self.table.finalize)() }
	}

	fn get_size(&self, size: &mut c_int) -> c_int {
		unsafe { (self.table.get_size)(size) }
	}

	fn get_rank(&self, rank: &mut c_int) -> c_int {
		unsafe { (self.table.get_rank)(rank) }
	}

	fn barrier(&self) -> c_int {
		unsafe { (self.table.barrier)() }
	}

	fn kvs_get_my_name(&self, buf: &mut [u8]) -> c_int {
		unsafe { (self.table.kvs_get_my_name)(buf.as_mut_ptr().cast(), buf.len() as c_int) }
	}

	fn kvs_put(&self, kvsname: &CStr, key: &CStr, value: &CStr) -> c_int {
		unsafe { (self.table.kvs_put)(kvsname.as_ptr(), key.as_ptr(), value.as_ptr()) }
	}

	fn kvs_commit(&self, kvsname: &CStr) -> c_int {
		unsafe { (self.table.kvs_commit)(kvsname.as_ptr()) }
	}

	fn kvs_get(&self, kvsname: &CStr, key: &CStr, buf: &mut [u8]) -> c_int {
		unsafe {
			(self.table.kvs_get)(
				kvsname.as_ptr(),
				key.as_ptr(),
				buf.as_mut_ptr().cast(),
				buf.len() as c_int,
			)
		}
	}
}

fn resolve(object: &impl ObjectFile) -> Option<Pmi1Table> {
	Some(Pmi1Table {
		init: dso::entry(object, "PMI_Init")?,
		finalize: dso::entry(object, "PMI_Finalize")?,
		get_size: dso::entry(object, "PMI_Get_size")?,
		get_rank: dso::entry(object, "PMI_Get_rank")?,
		barrier: dso::entry(object, "PMI_Barrier")?,
		kvs_get_my_name: dso::entry(object, "PMI_KVS_Get_my_name")?,
		kvs_put: dso::entry(object, "PMI_KVS_Put")?,
		kvs_commit: dso::entry(object, "PMI_KVS_Commit")?,
		kvs_get: dso::entry(object, "PMI_KVS_Get")?,
	})
}

/// Locate and bind the legacy library. Partial loads never escape: a missing
/// entry point drops the handle and reports nothing loaded.
pub(crate) fn load<O>(
	opener: &O,
	libs: &dyn LibList,
	library: Option<&str>,
	debug: i32,
) -> Option<Box<dyn Pmi1Api>>
where
	O: Opener,
	O::Object: 'static,
{
	let name = library.unwrap_or(DEFAULT_LIBRARY);
	let object = dso::open_library(opener, libs, name, SENTINEL, "pmi-debug", debug)?;
	let Some(table) = resolve(&object) else {
		tracing::debug!("pmi-debug-dlopen: dlsym: {name} is missing required symbols");
		return None;
	};
	Some(Box::new(Pmi1Dso { _object: object, table }))
}

pub(crate) fn init(api: &dyn Pmi1Api) -> Result<()> {
	// Respawn is unsupported; the spawned flag is discarded.
	let mut spawned = 0;
	status::from_raw(api.init(&mut spawned))
}

pub(crate) fn get_params(api: &dyn Pmi1Api) -> Result<PmiParams> {
	let mut rank = 0;
	status::from_raw(api.get_rank(&mut rank))?;
	let mut size = 0;
	status::from_raw(api.get_size(&mut size))?;
	let mut buf = [0u8; KVSNAME_MAX + 1];
	status::from_raw(api.kvs_get_my_name(&mut buf))?;
	Ok(PmiParams {
		rank,
		size,
		kvsname: crate::params::from_c_buf(&buf),
	})
}

pub(crate) fn kvs_put(api: &dyn Pmi1Api, kvsname: &str, key: &str, value: &str) -> Result<()> {
	let kvsname = status::cstring(kvsname)?;
	let key = status::cstring(key)?;
	let value = status::cstring(value)?;
	status::from_raw(api.kvs_put(&kvsname, &key, &value))
}

pub(crate) fn kvs_commit(api: &dyn Pmi1Api, kvsname: &str) -> Result<()> {
	let kvsname = status::cstring(kvsname)?;
	status::from_raw(api.kvs_commit(&kvsname))
}

pub(crate) fn kvs_get(api: &dyn Pmi1Api, kvsname: &str, key: &str, value: &mut [u8]) -> Result<()> {
	let kvsname = status::cstring(kvsname)?;
	let key = status::cstring(key)?;
	status::from_raw(api.kvs_get(&kvsname, &key, value))
}

pub(crate) fn barrier(api: &dyn Pmi1Api) -> Result<()> {
	status::from_raw(api.barrier())
}

pub(crate) fn finalize(api: &dyn Pmi1Api) -> Result<()> {
	status::from_raw(api.finalize())
}

#[cfg(test)]
mod tests;
