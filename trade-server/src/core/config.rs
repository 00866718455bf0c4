use crate::auth::JwtConfig;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// 服务器配置
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | ./data | 工作目录 (数据库、日志) |
/// | HTTP_PORT | 8080 | HTTP / WebSocket 端口 |
/// | ENVIRONMENT | development | 运行环境 |
/// | LOG_LEVEL | info | 默认日志级别 |
/// | LOG_JSON | false | JSON 日志 |
/// | JWT_SECRET | 临时密钥 | HS256 密钥 |
/// | MAX_ACTIVE_OFFERS | 3 | 每个用户可同时上架的挂单数 |
/// | ORDER_EXPIRER_INTERVAL_MS | 30000 | 过期清扫间隔 |
/// | ORDER_EXPIRER_BATCH | 100 | 每轮清扫数量上限 |
/// | CHAT_CACHE_LIMIT | 50 | 聊天历史缓存条数 |
/// | ARBITER_IDS | (空) | 仲裁员 client id, 逗号分隔 |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/srv/trade HTTP_PORT=9000 ARBITER_IDS=ops-1,ops-2 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub work_dir: String,
    pub http_port: u16,
    /// development | staging | production
    pub environment: String,
    pub log_level: String,
    pub log_json: bool,
    pub jwt: JwtConfig,
    pub max_active_offers: usize,
    pub order_expirer_interval_ms: u64,
    pub order_expirer_batch: usize,
    pub chat_cache_limit: usize,
    pub arbiter_ids: HashSet<String>,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Comma separated ids, blanks dropped
pub fn parse_id_list(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    /// 从环境变量加载配置，未设置或无法解析的项使用默认值
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or(defaults.work_dir),
            http_port: env_or("HTTP_PORT", defaults.http_port),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            log_level: std::env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_json: env_or("LOG_JSON", defaults.log_json),
            jwt: JwtConfig::from_secret(std::env::var("JWT_SECRET").ok()),
            max_active_offers: env_or("MAX_ACTIVE_OFFERS", defaults.max_active_offers),
            order_expirer_interval_ms: env_or(
                "ORDER_EXPIRER_INTERVAL_MS",
                defaults.order_expirer_interval_ms,
            ),
            order_expirer_batch: env_or("ORDER_EXPIRER_BATCH", defaults.order_expirer_batch),
            chat_cache_limit: env_or("CHAT_CACHE_LIMIT", defaults.chat_cache_limit),
            arbiter_ids: std::env::var("ARBITER_IDS")
                .map(|raw| parse_id_list(&raw))
                .unwrap_or_default(),
        }
    }

    /// 使用自定义值覆盖部分配置 (测试用，不读取环境变量)
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        Self {
            work_dir: work_dir.into(),
            http_port,
            ..Self::default()
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("trade.redb")
    }

    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("logs")
    }

    pub fn expirer_interval(&self) -> Duration {
        Duration::from_millis(self.order_expirer_interval_ms.max(1))
    }

    /// 确保工作目录结构存在
    pub fn ensure_work_dir_structure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.work_dir)?;
        std::fs::create_dir_all(self.log_dir())?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            work_dir: "./data".into(),
            http_port: 8080,
            environment: "development".into(),
            log_level: "info".into(),
            log_json: false,
            jwt: JwtConfig::default(),
            max_active_offers: 3,
            order_expirer_interval_ms: 30_000,
            order_expirer_batch: 100,
            chat_cache_limit: 50,
            arbiter_ids: HashSet::new(),
        }
    }
}
