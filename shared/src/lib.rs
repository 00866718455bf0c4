//! Shared types for the P2P trading platform
//!
//! Domain models, wire-stable order stream events, the unified error
//! system and small utilities used by the trade server and its clients.

pub mod error;
pub mod models;
pub mod order;
pub mod util;

// Re-exports
pub use error::{ApiResponse, AppError, AppResult, ErrorCode};
pub use order::{OrderStreamEvent, OrderView};
pub use serde::{Deserialize, Serialize};
