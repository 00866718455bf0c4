use std::sync::Arc;

use crate::auth::JwtService;
use crate::chat::{ChatCache, ChatService, MemoryChatCache};
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::core::{Config, Result};
use crate::escrow::{EscrowLedger, LoggingLedger};
use crate::notify::NotificationDispatcher;
use crate::offers::OfferService;
use crate::orders::OrderService;
use crate::store::Storage;
use crate::sweeper::ExpirySweeper;
use crate::utils::{Clock, SystemClock};

/// 服务器状态 - 持有所有服务的共享引用
///
/// 使用 Arc 实现浅拷贝，axum 每个请求 clone 一次。
///
/// | 字段 | 说明 |
/// |------|------|
/// | config | 配置项 (不可变) |
/// | storage | redb 存储 |
/// | orders | 订单生命周期 + 状态/创建广播 |
/// | offers | 挂单上下架 |
/// | notifications | 通知持久化与推送 |
/// | chat | 订单聊天 |
/// | jwt_service | 令牌校验 |
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub storage: Storage,
    pub orders: Arc<OrderService>,
    pub offers: Arc<OfferService>,
    pub notifications: Arc<NotificationDispatcher>,
    pub chat: Arc<ChatService>,
    pub jwt_service: Arc<JwtService>,
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("config", &self.config)
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}

impl ServerState {
    /// 组装服务 (测试可注入时钟、账本和缓存)
    pub fn assemble(
        config: Config,
        storage: Storage,
        clock: Arc<dyn Clock>,
        ledger: Arc<dyn EscrowLedger>,
        chat_cache: Arc<dyn ChatCache>,
    ) -> Self {
        let notifications = Arc::new(NotificationDispatcher::new(storage.clone(), clock.clone()));
        let orders = Arc::new(OrderService::new(
            storage.clone(),
            clock.clone(),
            notifications.clone(),
            ledger,
            config.arbiter_ids.clone(),
        ));
        let offers = Arc::new(OfferService::new(
            storage.clone(),
            clock.clone(),
            config.max_active_offers,
        ));
        let chat = Arc::new(ChatService::new(
            storage.clone(),
            clock,
            chat_cache,
            config.chat_cache_limit,
        ));
        let jwt_service = Arc::new(JwtService::with_config(config.jwt.clone()));

        Self {
            config,
            storage,
            orders,
            offers,
            notifications,
            chat,
            jwt_service,
        }
    }

    /// 初始化服务器状态
    ///
    /// 1. 工作目录结构
    /// 2. 数据库 (work_dir/trade.redb)
    /// 3. 各服务 (系统时钟、日志账本、内存聊天缓存)
    pub fn initialize(config: &Config) -> Result<Self> {
        config.ensure_work_dir_structure()?;
        let db_path = config.database_path();
        let storage = Storage::open(&db_path)?;
        tracing::info!(path = %db_path.display(), "Storage opened");

        Ok(Self::assemble(
            config.clone(),
            storage,
            Arc::new(SystemClock),
            Arc::new(LoggingLedger),
            Arc::new(MemoryChatCache::new(config.chat_cache_limit)),
        ))
    }

    pub fn jwt_service(&self) -> Arc<JwtService> {
        self.jwt_service.clone()
    }

    pub fn expiry_sweeper(&self) -> ExpirySweeper {
        ExpirySweeper::new(
            self.orders.clone(),
            self.config.expirer_interval(),
            self.config.order_expirer_batch,
        )
    }

    /// 启动后台任务：订单过期清扫
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new();
        let sweeper = Arc::new(self.expiry_sweeper());
        let token = tasks.shutdown_token();
        tasks.spawn("order_expirer", TaskKind::Periodic, sweeper.run(token));
        tracing::info!(count = tasks.len(), "Background tasks started");
        tasks
    }
}
