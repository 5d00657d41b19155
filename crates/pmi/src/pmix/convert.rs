//! Translation from modern-backend statuses and typed values to the neutral
//! surface.

use std::ffi::c_int;

use super::abi::{PmixDataType, PmixStatus, PmixValue};
use crate::status::{PmiError, Result};

/// Collapse a modern status onto the neutral taxonomy.
///
/// Validation statuses map 1:1. Transport, availability, namespace, and
/// type-mismatch statuses all report as [`PmiError::Fail`]: the broker
/// aborts bootstrap on any of them, so finer discrimination would be
/// discarded. Unrecognized codes also report as `Fail`.
pub(crate) fn status_result(rc: PmixStatus) -> Result<()> {
	match rc {
		PmixStatus::SUCCESS => Ok(()),

		PmixStatus::ERR_INVALID_SIZE => Err(PmiError::InvalidSize),
		PmixStatus::ERR_INVALID_KEYVALP => Err(PmiError::InvalidKeyvalp),
		PmixStatus::ERR_INVALID_NUM_PARSED => Err(PmiError::InvalidNumParsed),
		PmixStatus::ERR_INVALID_ARGS => Err(PmiError::InvalidArgs),
		PmixStatus::ERR_INVALID_NUM_ARGS => Err(PmiError::InvalidNumArgs),
		PmixStatus::ERR_INVALID_LENGTH => Err(PmiError::InvalidLength),
		PmixStatus::ERR_INVALID_VAL_LENGTH => Err(PmiError::InvalidValLength),
		PmixStatus::ERR_INVALID_VAL => Err(PmiError::InvalidVal),
		PmixStatus::ERR_INVALID_KEY_LENGTH => Err(PmiError::InvalidKeyLength),
		PmixStatus::ERR_INVALID_KEY => Err(PmiError::InvalidKey),
		PmixStatus::ERR_INVALID_ARG => Err(PmiError::InvalidArg),
		PmixStatus::ERR_NOMEM => Err(PmiError::NoMem),

		PmixStatus::ERR_INIT => Err(PmiError::Init),

		PmixStatus::ERR_UNPACK_READ_PAST_END_OF_BUFFER
		| PmixStatus::ERR_LOST_CONNECTION_TO_SERVER
		| PmixStatus::ERR_LOST_PEER_CONNECTION
		| PmixStatus::ERR_LOST_CONNECTION_TO_CLIENT
		| PmixStatus::ERR_NOT_SUPPORTED
		| PmixStatus::ERR_NOT_FOUND
		| PmixStatus::ERR_SERVER_NOT_AVAIL
		| PmixStatus::ERR_INVALID_NAMESPACE
		| PmixStatus::ERR_DATA_VALUE_NOT_FOUND
		| PmixStatus::ERR_OUT_OF_RESOURCE
		| PmixStatus::ERR_RESOURCE_BUSY
		| PmixStatus::ERR_BAD_PARAM
		| PmixStatus::ERR_IN_ERRNO
		| PmixStatus::ERR_UNREACH
		| PmixStatus::ERR_TIMEOUT
		| PmixStatus::ERR_NO_PERMISSIONS
		| PmixStatus::ERR_PACK_MISMATCH
		| PmixStatus::ERR_PACK_FAILURE
		| PmixStatus::ERR_UNPACK_FAILURE
		| PmixStatus::ERR_UNPACK_INADEQUATE_SPACE
		| PmixStatus::ERR_TYPE_MISMATCH
		| PmixStatus::ERR_PROC_ENTRY_NOT_FOUND
		| PmixStatus::ERR_UNKNOWN_DATA_TYPE
		| PmixStatus::ERR_WOULD_BLOCK
		| PmixStatus::EXISTS
		| PmixStatus::ERROR => Err(PmiError::Fail),

		_ => Err(PmiError::Fail),
	}
}

/// Error form of [`status_result`] for contexts that already know the call
/// did not succeed.
pub(crate) fn status_error(rc: PmixStatus) -> PmiError {
	match status_result(rc) {
		Ok(()) => PmiError::Fail,
		Err(e) => e,
	}
}

/// Coerce a scalar typed value into a host int. Wider payloads assign
/// truncating; the caller checks plausibility separately. Non-scalar kinds
/// report bad-parameter at the modern level, which the status table then
/// collapses.
pub(crate) fn convert_int(kv: &PmixValue) -> std::result::Result<c_int, PmixStatus> {
	let value = unsafe {
		match kv.dtype {
			PmixDataType::INT => kv.data.integer,
			PmixDataType::INT8 => kv.data.int8.into(),
			PmixDataType::INT16 => kv.data.int16.into(),
			PmixDataType::INT32 => kv.data.int32,
			PmixDataType::INT64 => kv.data.int64 as c_int,
			PmixDataType::UINT => kv.data.uint as c_int,
			PmixDataType::UINT8 => kv.data.uint8.into(),
			PmixDataType::UINT16 => kv.data.uint16.into(),
			PmixDataType::UINT32 => kv.data.uint32 as c_int,
			PmixDataType::UINT64 => kv.data.uint64 as c_int,
			PmixDataType::BYTE => kv.data.byte.into(),
			PmixDataType::SIZE => kv.data.size as c_int,
			PmixDataType::BOOL => kv.data.flag.into(),
			_ => return Err(PmixStatus::ERR_BAD_PARAM),
		}
	};
	Ok(value)
}
