//! ABI-stable declarations for the modern process-manager library.
//!
//! Only the field layouts are relied upon. The library's own convenience
//! constructors and load helpers are never used: they would require linking
//! against it at build time, and this crate binds it at runtime only.

use std::ffi::{CStr, c_char, c_int, c_uint};

/// Longest namespace name, excluding the terminator.
pub(crate) const MAX_NSLEN: usize = 255;
/// Longest reserved key, excluding the terminator.
pub(crate) const MAX_KEYLEN: usize = 511;

/// Rank sentinel: no rank is known for the query (job-scoped data lookup).
pub(crate) const RANK_UNDEF: u32 = u32::MAX;
/// Rank sentinel: the job as a whole (job-scoped attribute lookup).
pub(crate) const RANK_WILDCARD: u32 = u32::MAX - 1;

/// Job attribute: total number of ranks.
pub(crate) const JOB_SIZE: &CStr = c"pmix.job.size";
/// Query directive: the key is expected to be available immediately.
pub(crate) const OPTIONAL: &CStr = c"pmix.optional";
/// Fence directive: collect job data so later gets see every committed put.
pub(crate) const COLLECT_DATA: &CStr = c"pmix.collect";
/// Job attribute: launcher-precomputed process map in ANL notation.
pub(crate) const ANL_MAP: &CStr = c"pmix.anl.map";

/// Status code returned by every modern entry point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(transparent)]
pub(crate) struct PmixStatus(pub c_int);

impl PmixStatus {
	pub const SUCCESS: Self = Self(0);
	pub const ERROR: Self = Self(-1);
	pub const EXISTS: Self = Self(-11);
	pub const ERR_WOULD_BLOCK: Self = Self(-15);
	pub const ERR_UNKNOWN_DATA_TYPE: Self = Self(-16);
	pub const ERR_PROC_ENTRY_NOT_FOUND: Self = Self(-17);
	pub const ERR_TYPE_MISMATCH: Self = Self(-18);
	pub const ERR_UNPACK_INADEQUATE_SPACE: Self = Self(-19);
	pub const ERR_UNPACK_FAILURE: Self = Self(-20);
	pub const ERR_PACK_FAILURE: Self = Self(-21);
	pub const ERR_PACK_MISMATCH: Self = Self(-22);
	pub const ERR_NO_PERMISSIONS: Self = Self(-23);
	pub const ERR_TIMEOUT: Self = Self(-24);
	pub const ERR_UNREACH: Self = Self(-25);
	pub const ERR_IN_ERRNO: Self = Self(-26);
	pub const ERR_BAD_PARAM: Self = Self(-27);
	pub const ERR_RESOURCE_BUSY: Self = Self(-28);
	pub const ERR_OUT_OF_RESOURCE: Self = Self(-29);
	pub const ERR_DATA_VALUE_NOT_FOUND: Self = Self(-30);
	pub const ERR_INIT: Self = Self(-31);
	pub const ERR_NOMEM: Self = Self(-32);
	pub const ERR_INVALID_ARG: Self = Self(-33);
	pub const ERR_INVALID_KEY: Self = Self(-34);
	pub const ERR_INVALID_KEY_LENGTH: Self = Self(-35);
	pub const ERR_INVALID_VAL: Self = Self(-36);
	pub const ERR_INVALID_VAL_LENGTH: Self = Self(-37);
	pub const ERR_INVALID_LENGTH: Self = Self(-38);
	pub const ERR_INVALID_NUM_ARGS: Self = Self(-39);
	pub const ERR_INVALID_ARGS: Self = Self(-40);
	pub const ERR_INVALID_NUM_PARSED: Self = Self(-41);
	pub const ERR_INVALID_KEYVALP: Self = Self(-42);
	pub const ERR_INVALID_SIZE: Self = Self(-43);
	pub const ERR_INVALID_NAMESPACE: Self = Self(-44);
	pub const ERR_SERVER_NOT_AVAIL: Self = Self(-45);
	pub const ERR_NOT_FOUND: Self = Self(-46);
	pub const ERR_NOT_SUPPORTED: Self = Self(-47);
	pub const ERR_UNPACK_READ_PAST_END_OF_BUFFER: Self = Self(-50);
	pub const ERR_LOST_CONNECTION_TO_SERVER: Self = Self(-101);
	pub const ERR_LOST_PEER_CONNECTION: Self = Self(-102);
	pub const ERR_LOST_CONNECTION_TO_CLIENT: Self = Self(-103);
}

/// Discriminant of [`PmixValue`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(transparent)]
pub(crate) struct PmixDataType(pub u16);

impl PmixDataType {
	pub const BOOL: Self = Self(1);
	pub const BYTE: Self = Self(2);
	pub const STRING: Self = Self(3);
	pub const SIZE: Self = Self(4);
	pub const INT: Self = Self(6);
	pub const INT8: Self = Self(7);
	pub const INT16: Self = Self(8);
	pub const INT32: Self = Self(9);
	pub const INT64: Self = Self(10);
	pub const UINT: Self = Self(11);
	pub const UINT8: Self = Self(12);
	pub const UINT16: Self = Self(13);
	pub const UINT32: Self = Self(14);
	pub const UINT64: Self = Self(15);
}

/// Data placement scope of a put.
pub(crate) type PmixScope = u8;
/// Visible to every rank in the job.
pub(crate) const SCOPE_GLOBAL: PmixScope = 3;

/// Process identifier: namespace plus rank.
#[derive(Clone, Copy)]
#[repr(C)]
pub(crate) struct PmixProc {
	pub nspace: [c_char; MAX_NSLEN + 1],
	pub rank: u32,
}

impl PmixProc {
	pub fn new() -> Self {
		Self {
			nspace: [0; MAX_NSLEN + 1],
			rank: RANK_UNDEF,
		}
	}

	/// Bounded namespace write, always NUL-terminated.
	pub fn set_nspace(&mut self, nspace: &str) {
		copy_into(&mut self.nspace, nspace.as_bytes());
	}

	pub fn nspace_bytes(&self) -> &[u8] {
		let bytes = c_buf_bytes(&self.nspace);
		let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
		&bytes[..end]
	}
}

/// Payload union. Only the members this crate touches are declared; the
/// padding member keeps the union at the ABI size of the largest C member.
#[repr(C)]
pub(crate) union PmixValueData {
	pub flag: bool,
	pub byte: u8,
	pub string: *mut c_char,
	pub size: usize,
	pub integer: c_int,
	pub int8: i8,
	pub int16: i16,
	pub int32: i32,
	pub int64: i64,
	pub uint: c_uint,
	pub uint8: u8,
	pub uint16: u16,
	pub uint32: u32,
	pub uint64: u64,
	_sized: [u8; 16],
}

/// Typed value container.
#[repr(C)]
pub(crate) struct PmixValue {
	pub dtype: PmixDataType,
	pub data: PmixValueData,
}

impl PmixValue {
	/// Box a string payload for a put. Borrows `value`; the library copies
	/// the payload during the call.
	pub fn string(value: &CStr) -> Self {
		Self {
			dtype: PmixDataType::STRING,
			data: PmixValueData {
				string: value.as_ptr().cast_mut(),
			},
		}
	}
}

/// Directive entry of an info vector.
#[repr(C)]
pub(crate) struct PmixInfo {
	pub key: [c_char; MAX_KEYLEN + 1],
	pub flags: u32,
	pub value: PmixValue,
}

impl PmixInfo {
	/// Single boolean directive, written field by field.
	pub fn boolean(key: &CStr, flag: bool) -> Self {
		let mut info: Self = unsafe { std::mem::zeroed() };
		copy_into(&mut info.key, key.to_bytes());
		info.flags = 0;
		info.value.dtype = PmixDataType::BOOL;
		info.value.data.flag = flag;
		info
	}
}

/// Value returned by the library. Released through the process allocator on
/// drop, matching the header's release macro; the library allocates with the
/// same allocator.
pub(crate) struct OwnedValue {
	ptr: *mut PmixValue,
}

impl OwnedValue {
	/// Adopt a library-allocated value.
	///
	/// # Safety
	/// `ptr` must be null or a value the loaded library allocated for the
	/// caller, not released elsewhere.
	pub unsafe fn from_raw(ptr: *mut PmixValue) -> Option<Self> {
		(!ptr.is_null()).then_some(Self { ptr })
	}

	pub fn value(&self) -> &PmixValue {
		unsafe { &*self.ptr }
	}

	pub fn dtype(&self) -> PmixDataType {
		self.value().dtype
	}

	/// String payload, when the value is string-typed with a non-null
	/// pointer.
	pub fn string(&self) -> Option<&CStr> {
		if self.dtype() != PmixDataType::STRING {
			return None;
		}
		let s = unsafe { self.value().data.string };
		if s.is_null() {
			return None;
		}
		Some(unsafe { CStr::from_ptr(s) })
	}
}

impl Drop for OwnedValue {
	fn drop(&mut self) {
		unsafe {
			let value = &mut *self.ptr;
			if value.dtype == PmixDataType::STRING && !value.data.string.is_null() {
				libc::free(value.data.string.cast());
			}
			libc::free(self.ptr.cast());
		}
	}
}

/// Bounded NUL-terminated copy into a fixed C buffer.
pub(crate) fn copy_into(dst: &mut [c_char], src: &[u8]) {
	if dst.is_empty() {
		return;
	}
	let n = src.len().min(dst.len() - 1);
	for (d, &s) in dst.iter_mut().zip(&src[..n]) {
		*d = s as c_char;
	}
	dst[n] = 0;
}

/// Bounded NUL-terminated copy into a caller buffer: at most `dst.len() - 1`
/// payload bytes.
pub(crate) fn copy_out(dst: &mut [u8], src: &[u8]) {
	if dst.is_empty() {
		return;
	}
	let n = src.len().min(dst.len() - 1);
	dst[..n].copy_from_slice(&src[..n]);
	dst[n] = 0;
}

fn c_buf_bytes(buf: &[c_char]) -> &[u8] {
	unsafe { &*(std::ptr::from_ref(buf) as *const [u8]) }
}
