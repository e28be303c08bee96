//! 错误处理模块

use crate::types::SessionId;
use thiserror::Error;

/// streamchat 库的统一错误类型
///
/// 所有错误对当前会话都是终结性的，但不会让客户端本身失效：
/// 客户端总会回到空闲状态并接受下一次 `submit`。
#[derive(Debug, Error)]
pub enum ChatError {
    /// 请求参数无效（在任何网络调用之前被拒绝）
    #[error("请求参数无效: {0}")]
    InvalidRequest(String),

    /// 已有请求正在发送或接收中
    #[error("客户端忙: 已有请求正在进行中")]
    Busy,

    /// 会话不是当前活动会话（已结束或从未存在）
    #[error("未知会话: {0}")]
    UnknownSession(SessionId),

    /// HTTP 请求相关错误
    #[error("HTTP请求失败: {0}")]
    Http(#[from] reqwest::Error),

    /// 服务端返回非 2xx 状态码
    #[error("请求失败，状态码 {status}: {body}")]
    Status { status: u16, body: String },

    /// 无法解析的字节序列
    #[error("UTF8解码错误: {0}")]
    Decode(String),

    /// JSON 序列化/反序列化错误
    #[error("JSON处理错误: {0}")]
    Json(String),

    /// 配置相关错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 后台任务异常退出
    #[error("后台任务错误: {0}")]
    Task(String),
}

impl ChatError {
    /// 是否属于传输层错误
    ///
    /// 解码错误对用户而言与传输错误同等对待。
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ChatError::Http(_) | ChatError::Status { .. } | ChatError::Decode(_)
        )
    }

    /// 非 2xx 响应的状态码
    pub fn status(&self) -> Option<u16> {
        match self {
            ChatError::Status { status, .. } => Some(*status),
            ChatError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// streamchat 库的 Result 类型别名
pub type Result<T> = std::result::Result<T, ChatError>;

impl From<serde_json::Error> for ChatError {
    fn from(e: serde_json::Error) -> Self {
        ChatError::Json(e.to_string())
    }
}

impl From<std::str::Utf8Error> for ChatError {
    fn from(e: std::str::Utf8Error) -> Self {
        ChatError::Decode(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_mentions_code() {
        let err = ChatError::Status {
            status: 401,
            body: "Unauthorized".into(),
        };
        assert!(err.to_string().contains("401"));
        assert_eq!(err.status(), Some(401));
        assert!(err.is_transport());
    }

    #[test]
    fn test_local_errors_are_not_transport() {
        assert!(!ChatError::Busy.is_transport());
        assert!(!ChatError::InvalidRequest("x".into()).is_transport());
        assert!(ChatError::Decode("bad".into()).is_transport());
    }
}
