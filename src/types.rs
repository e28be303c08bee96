//! 数据结构模块

use crate::{
    config::Config,
    error::{ChatError, Result},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

// ================================================================================================
// 请求结构
// ================================================================================================

/// 支持的模型
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Model {
    #[default]
    #[serde(rename = "gpt-4.1-mini")]
    Gpt41Mini,
    #[serde(rename = "gpt-4.1")]
    Gpt41,
    #[serde(rename = "gpt-4.1-nano")]
    Gpt41Nano,
    #[serde(rename = "gpt-4o")]
    Gpt4o,
    #[serde(rename = "gpt-4o-mini")]
    Gpt4oMini,
    #[serde(rename = "gpt-3.5-turbo")]
    Gpt35Turbo,
}

impl Model {
    /// 全部支持的模型
    pub const ALL: [Model; 6] = [
        Model::Gpt41Mini,
        Model::Gpt41,
        Model::Gpt41Nano,
        Model::Gpt4o,
        Model::Gpt4oMini,
        Model::Gpt35Turbo,
    ];

    /// 线上使用的模型标识
    pub fn as_str(&self) -> &'static str {
        match self {
            Model::Gpt41Mini => "gpt-4.1-mini",
            Model::Gpt41 => "gpt-4.1",
            Model::Gpt41Nano => "gpt-4.1-nano",
            Model::Gpt4o => "gpt-4o",
            Model::Gpt4oMini => "gpt-4o-mini",
            Model::Gpt35Turbo => "gpt-3.5-turbo",
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Model {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self> {
        Model::ALL
            .into_iter()
            .find(|m| m.as_str() == s.trim())
            .ok_or_else(|| ChatError::InvalidRequest(format!("不支持的模型: {}", s)))
    }
}

/// 一次聊天请求
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatRequest {
    /// API 密钥（非空）
    pub api_key: String,
    /// 模型，未指定时使用配置中的模型
    pub model: Option<Model>,
    /// 用户消息（非空）
    pub user_message: String,
    /// 开发者消息
    pub developer_message: Option<String>,
}

impl ChatRequest {
    pub fn new(api_key: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            user_message: user_message.into(),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: Model) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_developer_message(mut self, message: impl Into<String>) -> Self {
        self.developer_message = Some(message.into());
        self
    }

    /// 校验必填字段
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(ChatError::InvalidRequest("API 密钥不能为空".into()));
        }
        if self.user_message.trim().is_empty() {
            return Err(ChatError::InvalidRequest("用户消息不能为空".into()));
        }
        Ok(())
    }
}

/// `POST /api/chat` 的请求体
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatBody {
    pub api_key: String,
    pub user_message: String,
    pub model: Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub developer_message: Option<String>,
}

impl ChatBody {
    /// 由请求构建请求体，请求中缺省的模型和开发者消息取自配置
    pub fn resolve(req: &ChatRequest, config: &Config) -> Self {
        // 空白的开发者消息会被服务端忽略，这里直接省略
        let developer_message = req
            .developer_message
            .as_deref()
            .or(config.developer_message())
            .filter(|m| !m.trim().is_empty())
            .map(str::to_string);
        Self {
            api_key: req.api_key.clone(),
            user_message: req.user_message.clone(),
            model: req.model.unwrap_or(config.model()),
            developer_message,
        }
    }
}

// ================================================================================================
// 辅助接口响应结构
// ================================================================================================

/// `GET /api/health` 响应体
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// `POST /api/test-openai` 响应体
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ConnectionReport {
    /// "success" 或 "error"
    #[serde(default)]
    pub status: String,
    pub message: Option<String>,
    pub response: Option<String>,
    pub model_used: Option<String>,
    pub error: Option<String>,
}

impl ConnectionReport {
    pub fn is_success(&self) -> bool {
        self.status == "success" && self.error.is_none()
    }
}

// ================================================================================================
// 会话与消息模型
// ================================================================================================

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// 会话标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub(crate) fn next() -> Self {
        SessionId(NEXT_SESSION.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// 会话状态
///
/// `Idle -> Sending -> Streaming -> {Completed | Failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Sending,
    Streaming,
    Completed,
    Failed,
}

impl SessionState {
    /// 发送中或接收中
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Sending | SessionState::Streaming)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed)
    }
}

/// 消息角色
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    #[default]
    User,
    Assistant,
}

/// 渲染层持有的一条消息
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageRecord {
    pub role: Role,
    pub text: String,
    pub is_loading: bool,
    /// 失败时附加的错误描述
    pub error: Option<String>,
}

impl MessageRecord {
    pub fn pending(role: Role) -> Self {
        Self {
            role,
            is_loading: true,
            ..Default::default()
        }
    }

    /// 展示给用户的文本：已接收的部分内容之后追加错误描述
    pub fn display_text(&self) -> String {
        match (&self.error, self.text.is_empty()) {
            (None, _) => self.text.clone(),
            (Some(err), true) => err.clone(),
            (Some(err), false) => format!("{}\n\n{}", self.text, err),
        }
    }
}

/// 会话结束后的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub id: SessionId,
    /// `Completed` 或 `Failed`
    pub state: SessionState,
    /// 累积的文本（失败时为已接收的部分）
    pub text: String,
    pub error: Option<String>,
}

impl SessionOutcome {
    pub fn is_success(&self) -> bool {
        self.state == SessionState::Completed
    }
}
