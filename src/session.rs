//! 流式会话模块
use crate::{
    decoder::Utf8Decoder,
    error::{ChatError, Result},
    sink::MessageHandle,
    types::{SessionId, SessionOutcome, SessionState},
};
use log::{debug, error};

/// 会话产生的、需要推送给渲染层的通知
///
/// 会话本身不接触渲染层；客户端释放内部锁之后再按顺序投递。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// 新的累积文本
    Update(String),
    /// 结束消息
    Finalize {
        success: bool,
        error: Option<String>,
    },
}

/// 一次请求/响应交换的生命周期对象
///
/// 由客户端独占持有；渲染层只接收推送，不读取这里的状态。
#[derive(Debug)]
pub struct StreamSession {
    id: SessionId,
    state: SessionState,
    accumulated_text: String,
    decoder: Utf8Decoder,
    message: Option<MessageHandle>,
    notices: Vec<Notice>,
    error: Option<String>,
}

impl StreamSession {
    /// 创建会话，初始状态为 `Sending`
    pub fn new(id: SessionId, lossy: bool) -> Self {
        let decoder = if lossy {
            Utf8Decoder::lossy()
        } else {
            Utf8Decoder::new()
        };
        Self {
            id,
            state: SessionState::Sending,
            accumulated_text: String::new(),
            decoder,
            message: None,
            notices: Vec::new(),
            error: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn accumulated_text(&self) -> &str {
        &self.accumulated_text
    }

    /// 渲染层中对应的助手消息
    pub fn message(&self) -> Option<MessageHandle> {
        self.message
    }

    pub fn attach_message(&mut self, message: MessageHandle) {
        self.message = Some(message);
    }

    /// 取走尚未投递的通知
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn ensure_active(&self) -> Result<()> {
        if self.state.is_active() {
            Ok(())
        } else {
            Err(ChatError::UnknownSession(self.id))
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!("{}: {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
    }

    /// 响应头已到达
    pub fn on_response_start(&mut self) -> Result<()> {
        self.ensure_active()?;
        if self.state == SessionState::Sending {
            self.transition(SessionState::Streaming);
        }
        Ok(())
    }

    fn append(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.accumulated_text.push_str(text);
        self.notices
            .push(Notice::Update(self.accumulated_text.clone()));
    }

    /// 处理一个字节块
    ///
    /// 渲染层总是收到完整的累积文本；没有新字符解码出来时不通知。
    /// 解码失败会让会话进入 `Failed`，已接收的文本保留。
    pub fn on_chunk(&mut self, bytes: &[u8]) -> Result<()> {
        self.on_response_start()?;
        debug!("{}: chunk of {} byte(s)", self.id, bytes.len());
        match self.decoder.decode(bytes) {
            Ok(text) => {
                self.append(&text);
                Ok(())
            }
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// 流正常结束
    pub fn on_complete(&mut self) -> Result<()> {
        // 零字节响应也要经过 Streaming
        self.on_response_start()?;
        match self.decoder.finish() {
            Ok(text) => {
                self.append(&text);
                self.transition(SessionState::Completed);
                self.notices.push(Notice::Finalize {
                    success: true,
                    error: None,
                });
                Ok(())
            }
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// 请求或读取失败
    pub fn on_error(&mut self, err: &ChatError) -> Result<()> {
        self.ensure_active()?;
        self.fail(err);
        Ok(())
    }

    fn fail(&mut self, err: &ChatError) {
        let text = format!("Error: {}", err);
        error!("{} failed after {} byte(s): {}", self.id, self.accumulated_text.len(), err);
        self.transition(SessionState::Failed);
        self.notices.push(Notice::Finalize {
            success: false,
            error: Some(text.clone()),
        });
        self.error = Some(text);
    }

    pub fn outcome(&self) -> SessionOutcome {
        SessionOutcome {
            id: self.id,
            state: self.state,
            text: self.accumulated_text.clone(),
            error: self.error.clone(),
        }
    }
}
