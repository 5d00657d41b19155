//! Neutral status taxonomy shared by every backend.

use std::ffi::{CString, c_int};

use thiserror::Error;

/// Raw status codes of the legacy flat-C interface. The dynamically loaded
/// legacy library reports these directly; the other backends never see them.
pub(crate) mod raw {
	use std::ffi::c_int;

	pub const SUCCESS: c_int = 0;
	pub const FAIL: c_int = -1;
	pub const ERR_INIT: c_int = 1;
	pub const ERR_NOMEM: c_int = 2;
	pub const ERR_INVALID_ARG: c_int = 3;
	pub const ERR_INVALID_KEY: c_int = 4;
	pub const ERR_INVALID_KEY_LENGTH: c_int = 5;
	pub const ERR_INVALID_VAL: c_int = 6;
	pub const ERR_INVALID_VAL_LENGTH: c_int = 7;
	pub const ERR_INVALID_LENGTH: c_int = 8;
	pub const ERR_INVALID_NUM_ARGS: c_int = 9;
	pub const ERR_INVALID_ARGS: c_int = 10;
	pub const ERR_INVALID_NUM_PARSED: c_int = 11;
	pub const ERR_INVALID_KEYVALP: c_int = 12;
	pub const ERR_INVALID_SIZE: c_int = 13;
}

/// Errors reported by bootstrap operations.
///
/// Validation errors are reported unchanged. Transport, namespace, and type
/// errors from the richer backend are indistinguishable to the broker and
/// collapse to [`PmiError::Fail`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum PmiError {
	/// The session handshake failed or was never performed.
	#[error("PMI not initialized")]
	Init,
	/// Invalid size argument.
	#[error("invalid size argument")]
	InvalidSize,
	/// Invalid keyvalp argument.
	#[error("invalid keyvalp argument")]
	InvalidKeyvalp,
	/// Invalid num_parsed argument.
	#[error("invalid num_parsed argument")]
	InvalidNumParsed,
	/// Invalid args argument.
	#[error("invalid args argument")]
	InvalidArgs,
	/// Invalid number of arguments.
	#[error("invalid number of arguments")]
	InvalidNumArgs,
	/// Invalid length argument.
	#[error("invalid length argument")]
	InvalidLength,
	/// Invalid value length argument.
	#[error("invalid val length argument")]
	InvalidValLength,
	/// Invalid value argument.
	#[error("invalid val argument")]
	InvalidVal,
	/// Invalid key length argument.
	#[error("invalid key length argument")]
	InvalidKeyLength,
	/// Invalid key argument.
	#[error("invalid key argument")]
	InvalidKey,
	/// Invalid argument.
	#[error("invalid argument")]
	InvalidArg,
	/// Out of memory, or an input buffer was too small.
	#[error("input buffer not large enough")]
	NoMem,
	/// The operation failed.
	#[error("operation failed")]
	Fail,
}

/// Result of a bootstrap operation.
pub type Result<T> = std::result::Result<T, PmiError>;

/// Map a raw legacy status code onto the neutral taxonomy. Total: codes the
/// taxonomy does not recognize report as [`PmiError::Fail`].
pub(crate) fn from_raw(rc: c_int) -> Result<()> {
	match rc {
		raw::SUCCESS => Ok(()),
		raw::FAIL => Err(PmiError::Fail),
		raw::ERR_INIT => Err(PmiError::Init),
		raw::ERR_NOMEM => Err(PmiError::NoMem),
		raw::ERR_INVALID_ARG => Err(PmiError::InvalidArg),
		raw::ERR_INVALID_KEY => Err(PmiError::InvalidKey),
		raw::ERR_INVALID_KEY_LENGTH => Err(PmiError::InvalidKeyLength),
		raw::ERR_INVALID_VAL => Err(PmiError::InvalidVal),
		raw::ERR_INVALID_VAL_LENGTH => Err(PmiError::InvalidValLength),
		raw::ERR_INVALID_LENGTH => Err(PmiError::InvalidLength),
		raw::ERR_INVALID_NUM_ARGS => Err(PmiError::InvalidNumArgs),
		raw::ERR_INVALID_ARGS => Err(PmiError::InvalidArgs),
		raw::ERR_INVALID_NUM_PARSED => Err(PmiError::InvalidNumParsed),
		raw::ERR_INVALID_KEYVALP => Err(PmiError::InvalidKeyvalp),
		raw::ERR_INVALID_SIZE => Err(PmiError::InvalidSize),
		_ => Err(PmiError::Fail),
	}
}

/// Convert a key or value for a C-ABI call. Interior NUL bytes cannot cross
/// the boundary and report as an invalid argument.
pub(crate) fn cstring(s: &str) -> Result<CString> {
	CString::new(s).map_err(|_| PmiError::InvalidArg)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn raw_codes_round_trip() {
		assert_eq!(from_raw(raw::SUCCESS), Ok(()));
		assert_eq!(from_raw(raw::ERR_INIT), Err(PmiError::Init));
		assert_eq!(from_raw(raw::ERR_NOMEM), Err(PmiError::NoMem));
		assert_eq!(from_raw(raw::ERR_INVALID_SIZE), Err(PmiError::InvalidSize));
		assert_eq!(from_raw(raw::ERR_INVALID_KEYVALP), Err(PmiError::InvalidKeyvalp));
		assert_eq!(from_raw(raw::FAIL), Err(PmiError::Fail));
	}

	#[test]
	fn unknown_codes_collapse_to_fail() {
		assert_eq!(from_raw(14), Err(PmiError::Fail));
		assert_eq!(from_raw(-7), Err(PmiError::Fail));
		assert_eq!(from_raw(c_int::MAX), Err(PmiError::Fail));
	}

	#[test]
	fn display_strings() {
		assert_eq!(PmiError::Fail.to_string(), "operation failed");
		assert_eq!(PmiError::Init.to_string(), "PMI not initialized");
		assert_eq!(PmiError::InvalidKeyLength.to_string(), "invalid key length argument");
	}

	#[test]
	fn cstring_rejects_interior_nul() {
		assert!(cstring("ok").is_ok());
		assert_eq!(cstring("bad\0key").unwrap_err(), PmiError::InvalidArg);
	}
}
