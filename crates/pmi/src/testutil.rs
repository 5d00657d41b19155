//! Fake loader collaborators shared by the backend tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::c_void;
use std::path::{Path, PathBuf};

use crate::dso::{LibList, ObjectFile, Opener};

/// In-memory dynamic object with a hand-built export table.
pub(crate) struct FakeObject {
	symbols: HashMap<String, *mut c_void>,
}

impl ObjectFile for FakeObject {
	fn symbol(&self, symbol: &str) -> Option<*mut c_void> {
		self.symbols.get(symbol).copied()
	}
}

/// Opener over a fixed path → export-table map, recording every open.
pub(crate) struct FakeOpener {
	objects: HashMap<PathBuf, Vec<(String, *mut c_void)>>,
	pub opened: RefCell<Vec<PathBuf>>,
}

impl FakeOpener {
	pub fn new() -> Self {
		Self {
			objects: HashMap::new(),
			opened: RefCell::new(Vec::new()),
		}
	}

	pub fn insert(&mut self, path: &str, symbols: &[(&str, *mut c_void)]) {
		self.objects.insert(
			PathBuf::from(path),
			symbols.iter().map(|&(n, a)| (n.to_owned(), a)).collect(),
		);
	}
}

impl Opener for FakeOpener {
	type Object = FakeObject;

	fn open(&self, path: &Path) -> Result<FakeObject, String> {
		self.opened.borrow_mut().push(path.to_path_buf());
		match self.objects.get(path) {
			Some(symbols) => Ok(FakeObject {
				symbols: symbols.iter().cloned().collect(),
			}),
			None => Err(format!("{}: cannot open shared object file", path.display())),
		}
	}
}

/// Fixed candidate list, independent of the environment.
pub(crate) struct FixedLibList(pub Vec<PathBuf>);

impl LibList for FixedLibList {
	fn candidates(&self, _name: &str) -> Vec<PathBuf> {
		self.0.clone()
	}
}

/// Placeholder export address for symbol-presence tests.
pub(crate) fn some_addr() -> *mut c_void {
	// Any non-null address works; presence is all the loader checks here.
	0x1 as *mut c_void
}
