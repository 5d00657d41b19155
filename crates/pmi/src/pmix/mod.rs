//! Modern process-manager backend: explicit proc identifiers, typed values,
//! and info vectors, bound behind the uniform operations.

pub(crate) mod abi;
pub(crate) mod convert;

use std::ffi::{CStr, c_char, c_int, c_void};
use std::ptr;

use abi::{OwnedValue, PmixDataType, PmixInfo, PmixProc, PmixScope, PmixStatus, PmixValue};

use crate::dso::{self, LibList, ObjectFile, Opener};
use crate::params::PmiParams;
use crate::status::{self, PmiError, Result};

/// Base name tried when `PMIX_LIBRARY` is not set.
pub(crate) const DEFAULT_LIBRARY: &str = "libpmix.so";

/// Exported by shims that route the modern interface back into a broker;
/// loading one from the broker itself would recurse.
const SENTINEL: &str = "flux_pmix_library";

/// Key the legacy surface reserves for the launcher-computed process map.
const ANL_MAPPING_KEY: &str = "PMI_process_mapping";

type InitFn =
	unsafe extern "C" fn(proc_: *mut PmixProc, info: *const PmixInfo, ninfo: usize) -> PmixStatus;
type FinalizeFn = unsafe extern "C" fn(info: *const c_void, ninfo: c_int) -> PmixStatus;
type GetFn = unsafe extern "C" fn(
	proc_: *const PmixProc,
	key: *const c_char,
	info: *const PmixInfo,
	ninfo: usize,
	val: *mut *mut PmixValue,
) -> PmixStatus;
type FenceFn = unsafe extern "C" fn(
	procs: *const PmixProc,
	nprocs: usize,
	info: *const PmixInfo,
	ninfo: usize,
) -> PmixStatus;
type PutFn =
	unsafe extern "C" fn(scope: PmixScope, key: *const c_char, val: *mut PmixValue) -> PmixStatus;
type CommitFn = unsafe extern "C" fn() -> PmixStatus;

/// Resolved modern entry points. Exists only with every field resolved.
struct PmixTable {
	init: InitFn,
	finalize: FinalizeFn,
	get: GetFn,
	fence: FenceFn,
	put: PutFn,
	commit: CommitFn,
}

/// Uniform view of the modern interface, seamed for tests.
pub(crate) trait PmixApi {
	/// Handshake with a null info vector, reporting the caller's identity.
	fn init(&self) -> (PmixStatus, PmixProc);
	/// The "finalize self" null-handle form defined by the interface.
	fn finalize_self(&self) -> PmixStatus;
	/// Look up `key` on `target`, yielding the value when one is returned.
	fn get(&self, target: &PmixProc, key: &CStr, info: &[PmixInfo])
	-> (PmixStatus, Option<OwnedValue>);
	/// Fence over all procs of the job.
	fn fence_all(&self, info: &[PmixInfo]) -> PmixStatus;
	/// Publish one boxed value.
	fn put(&self, scope: PmixScope, key: &CStr, value: &mut PmixValue) -> PmixStatus;
	/// Flush published values to the manager.
	fn commit(&self) -> PmixStatus;
}

/// Loaded modern library: the open handle plus its resolved table.
struct PmixDso<O: ObjectFile> {
	_object: O,
	table: PmixTable,
}

impl<O: ObjectFile> PmixApi for PmixDso<O> {
	fn init(&self) -> (PmixStatus, PmixProc) {
		let mut proc_ = PmixProc::new();
		let rc = unsafe { (self.table.init)(&mut proc_, ptr::null(), 0) };
		(rc, proc_)
	}

	fn finalize_self(&self) -> PmixStatus {
		unsafe { (self.table.finalize)(ptr::null(), 0) }
	}

	fn get(
		&self,
		target: &PmixProc,
		key: &CStr,
		info: &[PmixInfo],
	) -> (PmixStatus, Option<OwnedValue>) {
		let mut val: *mut PmixValue = ptr::null_mut();
		let info_ptr = if info.is_empty() { ptr::null() } else { info.as_ptr() };
		let rc =
			unsafe { (self.table.get)(target, key.as_ptr(), info_ptr, info.len(), &mut val) };
		(rc, unsafe { OwnedValue::from_raw(val) })
	}

	fn fence_all(&self, info: &[PmixInfo]) -> PmixStatus {
		let info_ptr = if info.is_empty() { ptr::null() } else { info.as_ptr() };
		unsafe { (self.table.fence)(ptr::null(), 0, info_ptr, info.len()) }
	}

	fn put(&self, scope: PmixScope, key: &CStr, value: &mut PmixValue) -> PmixStatus {
		unsafe { (self.table.put)(scope, key.as_ptr(), value) }
	}

	fn commit(&self) -> PmixStatus {
		unsafe { (self.table.commit)() }
	}
}

fn resolve(object: &impl ObjectFile) -> Option<PmixTable> {
	Some(PmixTable {
		init: dso::entry(object, "PMIx_Init")?,
		finalize: dso::entry(object, "PMIx_Finalize")?,
		get: dso::entry(object, "PMIx_Get")?,
		fence: dso::entry(object, "PMIx_Fence")?,
		put: dso::entry(object, "PMIx_Put")?,
		commit: dso::entry(object, "PMIx_Commit")?,
	})
}

/// Locate and bind the modern library. Partial loads never escape: a missing
/// entry point drops the handle and reports nothing loaded.
pub(crate) fn load<O>(
	opener: &O,
	libs: &dyn LibList,
	library: Option<&str>,
	debug: i32,
) -> Option<Box<dyn PmixApi>>
where
	O: Opener,
	O::Object: 'static,
{
	let name = library.unwrap_or(DEFAULT_LIBRARY);
	let object = dso::open_library(opener, libs, name, SENTINEL, "pmix-debug", debug)?;
	let Some(table) = resolve(&object) else {
		tracing::debug!("pmix-debug-dlopen: dlsym: {name} is missing required symbols");
		return None;
	};
	Some(Box::new(PmixDso { _object: object, table }))
}

/// Identity reported by a successful init.
struct Identity {
	myproc: PmixProc,
	/// Self proc with the wildcard rank, for job-scoped attribute lookups.
	wildcard: PmixProc,
}

/// Modern-backend state: the bound library plus the identity from init.
pub(crate) struct PmixState {
	api: Box<dyn PmixApi>,
	ident: Option<Identity>,
}

impl PmixState {
	pub fn new(api: Box<dyn PmixApi>) -> Self {
		Self { api, ident: None }
	}

	pub fn init(&mut self) -> Result<()> {
		let (rc, myproc) = self.api.init();
		if rc != PmixStatus::SUCCESS {
			// No reachable server; the caller may still fall back to
			// running as a singleton.
			return Err(PmiError::Init);
		}
		let mut wildcard = myproc;
		wildcard.rank = abi::RANK_WILDCARD;
		self.ident = Some(Identity { myproc, wildcard });
		Ok(())
	}

	pub fn get_params(&mut self) -> Result<PmiParams> {
		let Some(ident) = &self.ident else {
			return Err(PmiError::Init);
		};
		// Job-scoped keys are expected to be available at startup; mark the
		// query optional so an absent key reports immediately. The directive
		// is written field by field (see abi module doc).
		let info = [PmixInfo::boolean(abi::OPTIONAL, true)];
		let (rc, val) = self.api.get(&ident.wildcard, abi::JOB_SIZE, &info);
		convert::status_result(rc)?;
		let val = val.ok_or(PmiError::Fail)?;
		let size = convert::convert_int(val.value()).map_err(convert::status_error)?;
		Ok(PmiParams {
			rank: ident.myproc.rank as i32,
			size,
			kvsname: String::from_utf8_lossy(ident.myproc.nspace_bytes()).into_owned(),
		})
	}

	/// The kvsname argument is unused: the modern interface scopes puts by
	/// the session namespace implicitly.
	pub fn kvs_put(&mut self, _kvsname: &str, key: &str, value: &str) -> Result<()> {
		let key = status::cstring(key)?;
		let value = status::cstring(value)?;
		let mut val = PmixValue::string(&value);
		convert::status_result(self.api.put(abi::SCOPE_GLOBAL, &key, &mut val))
	}

	pub fn kvs_commit(&mut self) -> Result<()> {
		convert::status_result(self.api.commit())
	}

	pub fn kvs_get(&mut self, kvsname: &str, key: &str, value: &mut [u8]) -> Result<()> {
		if key == ANL_MAPPING_KEY {
			return self.get_anl_mapping(value);
		}
		// No rank is known for the key; the undefined-rank sentinel makes
		// this a job-scoped lookup in `kvsname`.
		let mut proc_ = PmixProc::new();
		proc_.set_nspace(kvsname);
		proc_.rank = abi::RANK_UNDEF;
		let ckey = status::cstring(key)?;
		let (rc, val) = self.api.get(&proc_, &ckey, &[]);
		let rc = match (rc, val) {
			(PmixStatus::SUCCESS, Some(val)) => {
				if val.dtype() != PmixDataType::STRING {
					PmixStatus::ERROR
				} else {
					let payload = val.string().map(CStr::to_bytes).unwrap_or_default();
					abi::copy_out(value, payload);
					PmixStatus::SUCCESS
				}
			}
			// Success with nothing returned: nothing to copy, but the
			// output contract still wants a terminated buffer.
			(PmixStatus::SUCCESS, None) => {
				abi::copy_out(value, &[]);
				PmixStatus::SUCCESS
			}
			(rc, _) => rc,
		};
		convert::status_result(rc)
	}

	/// The process map is looked up as the job-level attribute some
	/// launchers precompute. When it is absent the lookup fails; the map is
	/// deliberately not synthesized here.
	fn get_anl_mapping(&self, value: &mut [u8]) -> Result<()> {
		let Some(ident) = &self.ident else {
			return Err(PmiError::Init);
		};
		let (rc, val) = self.api.get(&ident.wildcard, abi::ANL_MAP, &[]);
		match (rc, val) {
			(PmixStatus::SUCCESS, Some(val)) => match val.string() {
				Some(s) => {
					abi::copy_out(value, s.to_bytes());
					Ok(())
				}
				None => Err(PmiError::Fail),
			},
			_ => Err(PmiError::Fail),
		}
	}

	pub fn barrier(&mut self) -> Result<()> {
		// Collect job data during the fence so every committed put is
		// visible to gets on any rank afterwards.
		let info = [PmixInfo::boolean(abi::COLLECT_DATA, true)];
		convert::status_result(self.api.fence_all(&info))
	}

	/// Teardown uses the "finalize self" form; its status is discarded.
	pub fn finalize(&mut self) -> Result<()> {
		let _ = self.api.finalize_self();
		Ok(())
	}
}
