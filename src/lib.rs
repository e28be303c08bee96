//! # streamchat - 单请求流式聊天客户端
//!
//! streamchat 把用户输入转发给提供 `POST /api/chat` 的聊天服务，
//! 并把流式返回的文本增量地推送给渲染层。
//!
//! ## 主要特性
//!
//! - 🔄 **流式响应**：逐块读取响应体，渲染层每次收到完整的累积文本。
//! - 🧩 **增量解码**：跨块边界被拆开的多字节字符会被正确拼接。
//! - 🚦 **单请求保证**：同一时间最多一个请求处于发送或接收状态。
//! - 🛡️ **错误处理**：所有错误都会以可见文本报告给渲染层，已收到的部分内容不会丢失。
//! - 🔧 **灵活配置**：支持环境变量和 Builder 模式。
//!
//! ## 快速开始
//!
//! ```rust,no_run
//! use streamchat::{ChatRequest, Config, MemorySink, StreamingChatClient};
//! use streamchat::error::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::from_env()?;
//!     let client = StreamingChatClient::new(config, MemorySink::new());
//!
//!     let handle = client.submit(ChatRequest::new("sk-...", "你好，世界！"))?;
//!     let outcome = handle.wait().await?;
//!     println!("模型响应: {}", outcome.text);
//!
//!     Ok(())
//! }
//! ```

// 模块定义
pub mod client;
pub mod config;
pub mod credentials;
pub mod decoder;
pub mod error;
pub mod session;
pub mod sink;
pub mod transport;
pub mod types;

pub use client::{SessionHandle, StreamingChatClient};
pub use config::Config;
pub use error::{ChatError, Result};
pub use sink::{MemorySink, MessageHandle, MessageSink};
pub use transport::{ChatTransport, HttpTransport};
pub use types::{ChatRequest, MessageRecord, Model, Role, SessionId, SessionOutcome, SessionState};
