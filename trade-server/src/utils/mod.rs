//! 工具模块 - 通用工具函数和类型
//!
//! - [`TradeError`] - 服务层统一错误
//! - [`Clock`] - 可替换的时钟
//! - 日志初始化

pub mod error;
pub mod logger;
pub mod time;

pub use error::{TradeError, TradeResult};
pub use time::{Clock, ManualClock, SystemClock};
