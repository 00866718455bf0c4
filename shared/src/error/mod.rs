//! Unified error system
//!
//! - [`ErrorCode`]: standardized numeric codes
//! - [`AppError`]: error with code, message and details, rendered as JSON by axum
//! - [`ApiResponse`]: response envelope shared by success and failure
//!
//! # Example
//!
//! ```
//! use shared::error::{AppError, ErrorCode, ApiResponse};
//!
//! let err = AppError::with_message(ErrorCode::InvalidState, "order is not awaiting payment");
//! let response = ApiResponse::<()>::error(&err);
//! assert_eq!(response.code, Some(4002));
//! ```

mod codes;
mod http;
mod types;

pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::{ApiResponse, AppError, AppResult};
