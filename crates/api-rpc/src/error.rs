//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use eqsans_core::error::{AppError, RemoteError};
use jsonrpsee::types::ErrorObjectOwned;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4002;
    pub const NOT_AUTHENTICATED: i32 = 4010;
    pub const FORBIDDEN: i32 = 4030;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const DB_ERROR: i32 = 5001;
    pub const REMOTE_UNAVAILABLE: i32 = 5003;
    pub const REMOTE_PAYLOAD: i32 = 5004;
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    match err {
        AppError::Remote(e) => remote_to_rpc_error(e),
        AppError::Validation(msg) => {
            ErrorObjectOwned::owned(code::VALIDATION_ERROR, msg, None::<()>)
        }
        AppError::Domain(e) => {
            ErrorObjectOwned::owned(code::VALIDATION_ERROR, e.to_string(), None::<()>)
        }
        AppError::Serialization(e) => {
            ErrorObjectOwned::owned(code::VALIDATION_ERROR, e.to_string(), None::<()>)
        }
        AppError::NotFound(msg) => ErrorObjectOwned::owned(code::NOT_FOUND, msg, None::<()>),
        AppError::Conflict(msg) => ErrorObjectOwned::owned(code::CONFLICT, msg, None::<()>),
        AppError::Forbidden(msg) => ErrorObjectOwned::owned(code::FORBIDDEN, msg, None::<()>),
        AppError::Database(msg) => ErrorObjectOwned::owned(code::DB_ERROR, msg, None::<()>),
        AppError::Config(msg) => ErrorObjectOwned::owned(code::INTERNAL_ERROR, msg, None::<()>),
        AppError::Internal(msg) => ErrorObjectOwned::owned(code::INTERNAL_ERROR, msg, None::<()>),
    }
}

pub fn remote_to_rpc_error(err: RemoteError) -> ErrorObjectOwned {
    let code = match &err {
        RemoteError::Auth(_) => code::NOT_AUTHENTICATED,
        RemoteError::Connectivity(_) => code::REMOTE_UNAVAILABLE,
        RemoteError::Parse(_) | RemoteError::Rejected(_) => code::REMOTE_PAYLOAD,
    };
    ErrorObjectOwned::owned(code, err.to_string(), None::<()>)
}
