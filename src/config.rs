//! 配置模块
use crate::error::{ChatError, Result};
use crate::types::Model;
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

// ===============================================================================================
// 配置模块
// ===============================================================================================

/// 聊天客户端配置
///
/// 支持 Builder 模式和环境变量配置
#[derive(Debug, Clone)]
pub struct Config {
    /// 服务端基础 URL
    pub(crate) api_base: String,
    /// 请求未指定模型时使用的模型
    pub(crate) model: Model,
    /// 请求未携带开发者消息时使用的默认值
    pub(crate) developer_message: Option<String>,
    /// 整个请求（含流式读取）的超时时间，默认不限制
    pub(crate) timeout: Option<Duration>,
    /// 两次读取之间允许的最长间隔
    pub(crate) read_timeout: Duration,
    /// 建立连接的超时时间
    pub(crate) connect_timeout: Duration,
    /// 连接池空闲超时时间
    pub(crate) pool_idle_timeout: Duration,
    /// 每个主机的最大空闲连接数
    pub(crate) pool_max_idle_per_host: usize,
    /// TCP Keepalive
    pub(crate) tcp_keepalive: Duration,
    /// TCP Nodelay
    pub(crate) tcp_nodelay: bool,
    /// 非法字节替换为 U+FFFD 而不是报错
    pub(crate) lossy_decoding: bool,
    /// API 密钥持久化文件
    pub(crate) credential_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8000".into(),
            model: Model::default(),
            developer_message: None,
            timeout: None,
            read_timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(10),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 4,
            tcp_keepalive: Duration::from_secs(60),
            tcp_nodelay: true,
            lossy_decoding: false,
            credential_path: None,
        }
    }
}

/// 生成 Config Builder 方法的宏
///
/// 自动生成 `with_field_name` 形式的 builder 方法
macro_rules! config_builder {
    ($field:ident, $type:ty) => {
        paste::paste! {
            #[doc = "设置 `"]
            #[doc = stringify!($field)]
            #[doc = "`"]
            pub fn [<with_ $field>](mut self, $field: $type) -> Self {
                self.$field = $field;
                self
            }
        }
    };
    ($field:ident, $type:ty, option) => {
        paste::paste! {
            #[doc = "设置 `"]
            #[doc = stringify!($field)]
            #[doc = "`"]
            pub fn [<with_ $field>](mut self, $field: $type) -> Self {
                self.$field = Some($field);
                self
            }
        }
    };
}

impl Config {
    pub fn api_base(&self) -> &str { &self.api_base }
    pub fn model(&self) -> Model { self.model }
    pub fn developer_message(&self) -> Option<&str> { self.developer_message.as_deref() }
    pub fn timeout(&self) -> Option<Duration> { self.timeout }
    pub fn read_timeout(&self) -> Duration { self.read_timeout }
    pub fn lossy_decoding(&self) -> bool { self.lossy_decoding }
    pub fn credential_path(&self) -> Option<&PathBuf> { self.credential_path.as_ref() }

    /// 拼接服务端接口地址
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_base.trim_end_matches('/'), path)
    }

    /// 从环境变量和 `.env` 文件加载配置
    ///
    /// 环境变量会覆盖 `.env` 文件中的设置；API 密钥由每个请求自行携带，这里不读取。
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        let mut config = Config::default();

        if let Ok(api_base) = env::var("CHAT_API_BASE") {
            config.api_base = api_base;
        }
        if let Ok(model) = env::var("CHAT_MODEL") {
            config.model = model
                .parse()
                .map_err(|_| ChatError::Config(format!("CHAT_MODEL 无效: {}", model)))?;
        }
        if let Ok(message) = env::var("CHAT_DEVELOPER_MESSAGE") {
            config.developer_message = Some(message);
        }
        if let Ok(path) = env::var("CHAT_CREDENTIAL_PATH") {
            config.credential_path = Some(PathBuf::from(path));
        }

        Ok(config)
    }

    // 使用宏生成 builder 方法
    config_builder!(api_base, String);
    config_builder!(model, Model);
    config_builder!(developer_message, String, option);
    config_builder!(timeout, Duration, option);
    config_builder!(read_timeout, Duration);
    config_builder!(connect_timeout, Duration);
    config_builder!(pool_idle_timeout, Duration);
    config_builder!(pool_max_idle_per_host, usize);
    config_builder!(tcp_keepalive, Duration);
    config_builder!(tcp_nodelay, bool);
    config_builder!(lossy_decoding, bool);
    config_builder!(credential_path, PathBuf, option);
}
