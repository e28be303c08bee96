//! # 流式响应示例
//!
//! 这个示例展示了如何使用 streamchat 的流式功能：
//! - 从环境变量加载配置
//! - 实现一个把消息打印到终端的渲染层
//! - 提交请求并实时输出累积文本
//!
//! 运行前需要启动提供 `/api/chat` 的服务端，并设置 `OPENAI_API_KEY`
//! （或在 `CHAT_CREDENTIAL_PATH` 中保存过密钥）。

use std::io::Write;
use std::sync::Mutex;
use streamchat::error::{ChatError, Result};
use streamchat::{ChatRequest, Config, MessageHandle, MessageSink, Role, StreamingChatClient};

/// 终端渲染层：累积文本每次只打印新增的部分
#[derive(Default)]
struct ConsoleSink {
    next: Mutex<usize>,
    printed: Mutex<usize>,
}

impl MessageSink for ConsoleSink {
    fn create_pending_message(&self, role: Role) -> MessageHandle {
        let mut next = self.next.lock().unwrap();
        *next += 1;
        *self.printed.lock().unwrap() = 0;
        match role {
            Role::User => print!("🧑 "),
            Role::Assistant => print!("🤖 "),
            Role::System => {}
        }
        MessageHandle(*next)
    }

    fn update_message(&self, _handle: MessageHandle, cumulative_text: &str) {
        let mut printed = self.printed.lock().unwrap();
        print!("{}", &cumulative_text[*printed..]);
        *printed = cumulative_text.len();
        std::io::stdout().flush().ok();
    }

    fn finalize_message(&self, _handle: MessageHandle, success: bool, error_text: Option<&str>) {
        if !success {
            if let Some(err) = error_text {
                eprint!("\n❌ {}", err);
            }
        }
        println!();
    }
}

/// 主函数：演示流式文本生成
#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    // 从环境变量加载配置
    let config = Config::from_env()?;
    let client = StreamingChatClient::new(config, ConsoleSink::default());

    let health = client.health_check().await?;
    println!("服务状态: {}", health.status);

    let api_key = std::env::var("OPENAI_API_KEY")
        .ok()
        .or_else(|| client.remembered_api_key())
        .ok_or_else(|| ChatError::Config("OPENAI_API_KEY not found".into()))?;

    let request = ChatRequest::new(api_key, "请写一段关于大海的短文。")
        .with_developer_message("You are a helpful AI assistant.");

    let outcome = client.submit(request)?.wait().await?;
    println!("\n状态: {:?}, 共 {} 个字符", outcome.state, outcome.text.chars().count());

    Ok(())
}
