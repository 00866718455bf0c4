//! 订阅者注册表
//!
//! 每个连接持有一个有界 mpsc 接收端，由该连接唯一的写循环消费，
//! 因此对同一连接的写入天然串行。注册表只保存发送端。
//!
//! ```text
//!                         ┌───────────────────────────┐
//!  publish(key, event) ──►│ Mutex<HashMap<key, subs>> │
//!                         └─────┬──────────┬──────────┘
//!                      try_send │          │ try_send 失败 → 移除并关闭
//!                               ▼          ▼
//!                         [conn A rx]  [conn B rx] ──► ws writer loop
//! ```
//!
//! - [`StatusBroadcaster`]: keyed by order id, pushes `order.status_changed`
//! - [`CreationBroadcaster`]: keyed by client id, pushes `order.created`
//! - [`OfferFeed`]: one public key, pushes offer `created` / `updated` / `deleted`

mod created;
mod offers;
mod registry;
mod status;

pub use created::CreationBroadcaster;
pub use offers::OfferFeed;
pub use registry::{SubscriberId, SubscriberRegistry, Subscription};
pub use status::StatusBroadcaster;

/// Per-connection buffer; a subscriber this far behind is treated as dead
pub const SUBSCRIBER_BUFFER: usize = 64;
