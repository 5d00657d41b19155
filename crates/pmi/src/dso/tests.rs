use std::path::PathBuf;

use super::*;
use crate::testutil::{FakeOpener, FixedLibList, some_addr};

#[test]
fn explicit_path_is_sole_candidate() {
	let list = LdPathList::with_search(vec![PathBuf::from("/opt/lib")]);
	assert_eq!(
		list.candidates("/usr/lib64/libpmi.so"),
		vec![PathBuf::from("/usr/lib64/libpmi.so")]
	);
}

#[test]
fn bare_name_searches_in_order_then_falls_back_to_loader() {
	let list = LdPathList::with_search(vec![PathBuf::from("/a"), PathBuf::from("/b")]);
	assert_eq!(
		list.candidates("libpmi.so"),
		vec![
			PathBuf::from("/a/libpmi.so"),
			PathBuf::from("/b/libpmi.so"),
			PathBuf::from("libpmi.so"),
		]
	);
}

#[test]
fn first_viable_candidate_wins() {
	let mut opener = FakeOpener::new();
	opener.insert("/a/lib.so", &[("sym", some_addr())]);
	opener.insert("/b/lib.so", &[("sym", some_addr())]);
	let list = FixedLibList(vec![PathBuf::from("/a/lib.so"), PathBuf::from("/b/lib.so")]);

	let object = open_library(&opener, &list, "lib.so", "sentinel", "pmi-debug", 0);
	assert!(object.is_some());
	// Enumeration stops at the winner.
	assert_eq!(*opener.opened.borrow(), vec![PathBuf::from("/a/lib.so")]);
}

#[test]
fn open_failures_fall_through_to_next_candidate() {
	let mut opener = FakeOpener::new();
	opener.insert("/b/lib.so", &[]);
	let list = FixedLibList(vec![PathBuf::from("/missing/lib.so"), PathBuf::from("/b/lib.so")]);

	let object = open_library(&opener, &list, "lib.so", "sentinel", "pmi-debug", 1);
	assert!(object.is_some());
	assert_eq!(opener.opened.borrow().len(), 2);
}

#[test]
fn sentinel_export_skips_the_candidate() {
	let mut opener = FakeOpener::new();
	opener.insert("/shim/lib.so", &[("flux_pmi_library", some_addr())]);
	opener.insert("/real/lib.so", &[]);
	let list = FixedLibList(vec![PathBuf::from("/shim/lib.so"), PathBuf::from("/real/lib.so")]);

	let object =
		open_library(&opener, &list, "lib.so", "flux_pmi_library", "pmi-debug", 1).unwrap();
	assert!(object.symbol("flux_pmi_library").is_none());
}

#[test]
fn sentinel_only_candidate_fails_the_load() {
	let mut opener = FakeOpener::new();
	opener.insert("/shim/lib.so", &[("flux_pmi_library", some_addr())]);
	let list = FixedLibList(vec![PathBuf::from("/shim/lib.so")]);

	assert!(open_library(&opener, &list, "lib.so", "flux_pmi_library", "pmi-debug", 0).is_none());
}

#[test]
fn no_candidates_yields_nothing() {
	let opener = FakeOpener::new();
	let list = FixedLibList(Vec::new());
	assert!(open_library(&opener, &list, "lib.so", "sentinel", "pmi-debug", 0).is_none());
}
