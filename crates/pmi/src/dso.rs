//! Dynamic-library discovery and symbol resolution.
//!
//! Both dynamically loaded backends go through the same machinery: enumerate
//! candidate paths for a base name, open the first candidate that is not the
//! broker's own shim, then resolve the ABI's required entry points.

use std::ffi::{CString, c_void};
use std::path::{Path, PathBuf};

use libloading::os::unix::{Library, RTLD_GLOBAL, RTLD_NOW};

/// Candidate-path enumerator for a library base name.
///
/// The enumeration order is authoritative: the first candidate that opens
/// and survives the sentinel check wins.
pub(crate) trait LibList {
	/// Candidate paths (or loader-resolvable names), best first.
	fn candidates(&self, name: &str) -> Vec<PathBuf>;
}

/// Default enumerator. An explicit path is yielded verbatim; a bare name is
/// tried against the configured search directories and finally handed to the
/// loader as-is, so its own search order applies last.
pub(crate) struct LdPathList {
	search: Vec<PathBuf>,
}

impl LdPathList {
	/// Search directories from `LD_LIBRARY_PATH`.
	pub fn from_env() -> Self {
		let search = std::env::var("LD_LIBRARY_PATH")
			.map(|v| std::env::split_paths(&v).collect())
			.unwrap_or_default();
		Self { search }
	}

	#[cfg(test)]
	pub fn with_search(search: Vec<PathBuf>) -> Self {
		Self { search }
	}
}

impl LibList for LdPathList {
	fn candidates(&self, name: &str) -> Vec<PathBuf> {
		if name.contains('/') {
			return vec![PathBuf::from(name)];
		}
		self.search
			.iter()
			.map(|dir| dir.join(name))
			.chain([PathBuf::from(name)])
			.collect()
	}
}

/// A single opened dynamic object.
pub(crate) trait ObjectFile {
	/// Address of `symbol`, if the object exports it.
	fn symbol(&self, symbol: &str) -> Option<*mut c_void>;
}

/// `dlopen` seam. Production code opens real libraries; tests substitute
/// objects with hand-built symbol tables.
pub(crate) trait Opener {
	/// Object type kept alive for as long as its symbols are in use.
	type Object: ObjectFile;

	/// Open `path`, reporting the loader's error text on failure.
	fn open(&self, path: &Path) -> std::result::Result<Self::Object, String>;
}

/// Opens libraries with immediate binding and global visibility. Global
/// visibility is required: the loaded library may resolve sibling symbols
/// through the process scope.
pub(crate) struct DlOpener;

pub(crate) struct DlObject {
	lib: Option<Library>,
}

impl ObjectFile for DlObject {
	fn symbol(&self, symbol: &str) -> Option<*mut c_void> {
		let name = CString::new(symbol).ok()?;
		let lib = self.lib.as_ref()?;
		unsafe { lib.get::<*mut c_void>(name.as_bytes_with_nul()) }
			.ok()
			.map(|sym| sym.into_raw())
	}
}

impl Drop for DlObject {
	fn drop(&mut self) {
		// Sanitized builds keep the handle mapped: closing it produces
		// false leak reports for callbacks left behind by the library.
		if cfg!(feature = "asan-leak-dso")
			&& let Some(lib) = self.lib.take()
		{
			std::mem::forget(lib);
		}
	}
}

impl Opener for DlOpener {
	type Object = DlObject;

	fn open(&self, path: &Path) -> std::result::Result<DlObject, String> {
		match unsafe { Library::open(Some(path), RTLD_NOW | RTLD_GLOBAL) } {
			Ok(lib) => Ok(DlObject { lib: Some(lib) }),
			Err(e) => Err(e.to_string()),
		}
	}
}

/// Open the first candidate for `name` that loads and does not export
/// `sentinel`. Libraries exporting the sentinel are shims that route back
/// into a broker; loading one from the broker itself would recurse.
pub(crate) fn open_library<O: Opener>(
	opener: &O,
	libs: &dyn LibList,
	name: &str,
	sentinel: &str,
	prefix: &str,
	debug: i32,
) -> Option<O::Object> {
	for path in libs.candidates(name) {
		match opener.open(&path) {
			Err(err) => {
				if debug > 0 {
					tracing::debug!("{prefix}-dlopen: {err}");
				}
			}
			Ok(object) if object.symbol(sentinel).is_some() => {
				if debug > 0 {
					tracing::debug!("{prefix}-dlopen: skipping {}", path.display());
				}
			}
			Ok(object) => {
				if debug > 0 {
					tracing::debug!("{prefix}-dlopen: library name {}", path.display());
				}
				return Some(object);
			}
		}
	}
	None
}

/// Resolve `name` from `object` as an entry-point of type `F`.
///
/// `F` must be a pointer-sized `extern "C"` function pointer type; this is
/// the `dlsym` result cast.
pub(crate) fn entry<F>(object: &impl ObjectFile, name: &str) -> Option<F> {
	let addr = object.symbol(name)?;
	Some(unsafe { std::mem::transmute_copy::<*mut c_void, F>(&addr) })
}

#[cfg(test)]
mod tests;
