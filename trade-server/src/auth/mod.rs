//! 认证模块
//!
//! - [`JwtService`] - 令牌校验
//! - [`CurrentClient`] - 当前客户端 (axum extractor)

pub mod extractor;
pub mod jwt;

pub use extractor::CurrentClient;
pub use jwt::{Claims, JwtConfig, JwtError, JwtService};
