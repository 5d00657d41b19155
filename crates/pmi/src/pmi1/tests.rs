use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ffi::c_void;
use std::path::PathBuf;

use super::*;
use crate::status::{PmiError, raw};
use crate::testutil::{FakeOpener, FixedLibList, some_addr};

/// Legacy library double backed by an in-memory store.
struct MockPmi1 {
	rank: c_int,
	size: c_int,
	name: &'static str,
	store: RefCell<HashMap<(String, String), String>>,
	spawned_seen: Cell<bool>,
	rank_status: c_int,
	size_status: c_int,
}

impl MockPmi1 {
	fn new(rank: c_int, size: c_int, name: &'static str) -> Self {
		Self {
			rank,
			size,
			name,
			store: RefCell::new(HashMap::new()),
			spawned_seen: Cell::new(false),
			rank_status: raw::SUCCESS,
			size_status: raw::SUCCESS,
		}
	}
}

fn fill(buf: &mut [u8], s: &str) -> c_int {
	if buf.len() <= s.len() {
		return raw::ERR_INVALID_LENGTH;
	}
	buf[..s.len()].copy_from_slice(s.as_bytes());
	buf[s.len()] = 0;
	raw::SUCCESS
}

impl Pmi1Api for MockPmi1 {
	fn init(&self, spawned: &mut c_int) -> c_int {
		*spawned = 0;
		self.spawned_seen.set(true);
		raw::SUCCESS
	}

	fn finalize(&self) -> c_int {
		raw::SUCCESS
	}

	fn get_size(&self, size: &mut c_int) -> c_int {
		*size = self.size;
		self.size_status
	}

	fn get_rank(&self, rank: &mut c_int) -> c_int {
		*rank = self.rank;
		self.rank_status
	}

	fn barrier(&self) -> c_int {
		raw::SUCCESS
	}

	fn kvs_get_my_name(&self, buf: &mut [u8]) -> c_int {
		fill(buf, self.name)
	}

	fn kvs_put(&self, kvsname: &CStr, key: &CStr, value: &CStr) -> c_int {
		self.store.borrow_mut().insert(
			(
				kvsname.to_str().unwrap().to_owned(),
				key.to_str().unwrap().to_owned(),
			),
			value.to_str().unwrap().to_owned(),
		);
		raw::SUCCESS
	}

	fn kvs_commit(&self, _kvsname: &CStr) -> c_int {
		raw::SUCCESS
	}

	fn kvs_get(&self, kvsname: &CStr, key: &CStr, buf: &mut [u8]) -> c_int {
		let store = self.store.borrow();
		match store.get(&(
			kvsname.to_str().unwrap().to_owned(),
			key.to_str().unwrap().to_owned(),
		)) {
			Some(value) => fill(buf, value),
			None => raw::FAIL,
		}
	}
}

#[test]
fn init_discards_spawned_flag() {
	let api = MockPmi1::new(0, 1, "job");
	assert_eq!(init(&api), Ok(()));
	assert!(api.spawned_seen.get());
}

#[test]
fn get_params_reports_identity() {
	let api = MockPmi1::new(3, 16, "kvs_745");
	let params = get_params(&api).unwrap();
	assert_eq!(params.rank, 3);
	assert_eq!(params.size, 16);
	assert_eq!(params.kvsname, "kvs_745");
}

#[test]
fn get_params_stops_at_first_failure() {
	let mut api = MockPmi1::new(3, 16, "kvs_745");
	api.size_status = raw::ERR_INVALID_SIZE;
	assert_eq!(get_params(&api), Err(PmiError::InvalidSize));
}

#[test]
fn put_commit_barrier_get_round_trips() {
	let api = MockPmi1::new(0, 1, "job");
	kvs_put(&api, "job", "endpoint", "tcp://10.0.0.1:8500").unwrap();
	kvs_commit(&api, "job").unwrap();
	barrier(&api).unwrap();

	let mut buf = [0u8; 64];
	kvs_get(&api, "job", "endpoint", &mut buf).unwrap();
	assert_eq!(crate::params::from_c_buf(&buf), "tcp://10.0.0.1:8500");
}

#[test]
fn get_missing_key_fails() {
	let api = MockPmi1::new(0, 1, "job");
	let mut buf = [0u8; 16];
	assert_eq!(kvs_get(&api, "job", "nope", &mut buf), Err(PmiError::Fail));
}

#[test]
fn interior_nul_in_key_is_invalid() {
	let api = MockPmi1::new(0, 1, "job");
	assert_eq!(kvs_put(&api, "job", "k\0ey", "v"), Err(PmiError::InvalidArg));
}

// Loader-level coverage uses real function pointers resolved through a fake
// object so the symbol cast path is exercised.

unsafe extern "C" fn stub_init(spawned: *mut c_int) -> c_int {
	unsafe { *spawned = 0 };
	raw::SUCCESS
}

unsafe extern "C" fn stub_status_ok() -> c_int {
	raw::SUCCESS
}

unsafe extern "C" fn stub_get_rank(rank: *mut c_int) -> c_int {
	unsafe { *rank = 7 };
	raw::SUCCESS
}

unsafe extern "C" fn stub_get_size(size: *mut c_int) -> c_int {
	unsafe { *size = 32 };
	raw::SUCCESS
}

unsafe extern "C" fn stub_get_my_name(kvsname: *mut c_char, length: c_int) -> c_int {
	let name = b"stubjob\0";
	if (length as usize) < name.len() {
		return raw::ERR_INVALID_LENGTH;
	}
	unsafe { std::ptr::copy_nonoverlapping(name.as_ptr(), kvsname.cast(), name.len()) };
	raw::SUCCESS
}

unsafe extern "C" fn stub_kvs_put(
	_kvsname: *const c_char,
	_key: *const c_char,
	_value: *const c_char,
) -> c_int {
	raw::SUCCESS
}

unsafe extern "C" fn stub_kvs_commit(_kvsname: *const c_char) -> c_int {
	raw::SUCCESS
}

unsafe extern "C" fn stub_kvs_get(
	_kvsname: *const c_char,
	_key: *const c_char,
	_value: *mut c_char,
	_length: c_int,
) -> c_int {
	raw::FAIL
}

fn full_symbol_set() -> Vec<(&'static str, *mut c_void)> {
	vec![
		("PMI_Init", stub_init as *mut c_void),
		("PMI_Finalize", stub_status_ok as *mut c_void),
		("PMI_Get_size", stub_get_size as *mut c_void),
		("PMI_Get_rank", stub_get_rank as *mut c_void),
		("PMI_Barrier", stub_status_ok as *mut c_void),
		("PMI_KVS_Get_my_name", stub_get_my_name as *mut c_void),
		("PMI_KVS_Put", stub_kvs_put as *mut c_void),
		("PMI_KVS_Commit", stub_kvs_commit as *mut c_void),
		("PMI_KVS_Get", stub_kvs_get as *mut c_void),
	]
}

#[test]
fn load_binds_every_entry_point() {
	let mut opener = FakeOpener::new();
	opener.insert("/fake/libpmi.so", &full_symbol_set());
	let list = FixedLibList(vec![PathBuf::from("/fake/libpmi.so")]);

	let api = load(&opener, &list, None, 0).expect("load");
	let params = get_params(api.as_ref()).unwrap();
	assert_eq!(params.rank, 7);
	assert_eq!(params.size, 32);
	assert_eq!(params.kvsname, "stubjob");
	assert_eq!(barrier(api.as_ref()), Ok(()));
}

#[test]
fn missing_symbol_rejects_the_library() {
	let mut symbols = full_symbol_set();
	symbols.retain(|&(name, _)| name != "PMI_Barrier");

	let mut opener = FakeOpener::new();
	opener.insert("/fake/libpmi.so", &symbols);
	let list = FixedLibList(vec![PathBuf::from("/fake/libpmi.so")]);

	assert!(load(&opener, &list, None, 1).is_none());
}

#[test]
fn sentinel_library_is_never_bound() {
	let mut symbols = full_symbol_set();
	symbols.push(("flux_pmi_library", some_addr()));

	let mut opener = FakeOpener::new();
	opener.insert("/fake/libpmi.so", &symbols);
	let list = FixedLibList(vec![PathBuf::from("/fake/libpmi.so")]);

	assert!(load(&opener, &list, None, 0).is_none());
}
