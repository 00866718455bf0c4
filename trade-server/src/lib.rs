//! P2P Trade Server - 点对点资产交易订单引擎
//!
//! # 架构概述
//!
//! 买卖双方围绕一个挂单 (offer) 下单，订单在固定的状态图上流转：
//!
//! ```text
//! WAIT_PAYMENT ──markPaid──▶ PAID ──release──▶ RELEASED
//!      │                      │
//!      └──cancel──▶ CANCELLED ◀──resolve── DISPUTE ◀──dispute──┘
//! ```
//!
//! 每次转换都是存储层的一次 compare-and-set，并发的手动操作与超时清扫
//! 只会有一个成功。
//!
//! # 模块结构
//!
//! ```text
//! trade-server/src/
//! ├── core/          # 配置、状态、后台任务、服务启动
//! ├── auth/          # JWT 认证
//! ├── api/           # HTTP 路由和 WebSocket 流
//! ├── store/         # redb 存储
//! ├── orders/        # 订单动作表与生命周期服务
//! ├── offers/        # 挂单上下架
//! ├── sweeper/       # 超时订单清扫
//! ├── broadcast/     # 订阅者注册表
//! ├── notify/        # 站内通知
//! ├── chat/          # 订单聊天
//! ├── escrow/        # 托管账本钩子
//! └── utils/         # 错误、时钟、日志
//! ```

pub mod api;
pub mod auth;
pub mod broadcast;
pub mod chat;
pub mod core;
pub mod escrow;
pub mod notify;
pub mod offers;
pub mod orders;
pub mod store;
pub mod sweeper;
pub mod utils;

// Re-export 公共类型
pub use auth::{CurrentClient, JwtService};
pub use core::{Config, Server, ServerState};
pub use orders::{OrderService, Role};
pub use store::Storage;
pub use utils::{Clock, ManualClock, SystemClock, TradeError, TradeResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// Create the work directory layout and start logging
pub fn setup_environment(config: &Config) -> std::io::Result<()> {
    config.ensure_work_dir_structure()?;
    let log_dir = config.log_dir();
    init_logger_with_file(Some(&config.log_level), config.log_json, Some(&log_dir));
    Ok(())
}
