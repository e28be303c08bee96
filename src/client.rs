//! 流式聊天客户端核心模块
use crate::{
    config::Config,
    credentials::CredentialStore,
    error::{ChatError, Result},
    session::{Notice, StreamSession},
    sink::{MessageHandle, MessageSink},
    transport::{ChatTransport, HttpTransport},
    types::{
        ChatBody, ChatRequest, ConnectionReport, HealthStatus, Role, SessionId, SessionOutcome,
        SessionState,
    },
};
use futures::StreamExt;
use log::{debug, info, warn};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::{runtime::Handle, task::JoinHandle};

// ================================================================================================
// 核心客户端模块
// ================================================================================================

/// 流式聊天客户端
///
/// 负责整个请求生命周期：构建请求、打开流式连接、增量解码并把累积文本推送给渲染层。
/// 同一时间最多只有一个会话处于 `Sending` 或 `Streaming` 状态。
pub struct StreamingChatClient<S: MessageSink, T: ChatTransport = HttpTransport> {
    sink: Arc<S>,
    transport: Arc<T>,
    config: Arc<Config>,
    active: Arc<Mutex<Option<StreamSession>>>,
    credentials: Option<CredentialStore>,
    remembered_key: Arc<Mutex<Option<String>>>,
}

impl<S: MessageSink, T: ChatTransport> Clone for StreamingChatClient<S, T> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            transport: Arc::clone(&self.transport),
            config: Arc::clone(&self.config),
            active: Arc::clone(&self.active),
            credentials: self.credentials.clone(),
            remembered_key: Arc::clone(&self.remembered_key),
        }
    }
}

/// 一次会话操作的结果
struct Applied {
    result: Result<()>,
    state: SessionState,
    finished: Option<SessionOutcome>,
}

impl Applied {
    fn into_state(self) -> Result<SessionState> {
        self.result.map(|()| self.state)
    }
}

/// `submit` 返回的会话句柄
#[derive(Debug)]
pub struct SessionHandle {
    id: SessionId,
    task: JoinHandle<Result<SessionOutcome>>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// 等待会话结束
    pub async fn wait(self) -> Result<SessionOutcome> {
        self.task
            .await
            .map_err(|e| ChatError::Task(e.to_string()))?
    }
}

impl<S: MessageSink> StreamingChatClient<S, HttpTransport> {
    /// 使用 HTTP 传输层创建客户端
    pub fn new(config: Config, sink: S) -> Self {
        let transport = HttpTransport::new(config.clone());
        Self::with_transport(config, sink, transport)
    }

    /// 检查服务端是否可用
    pub async fn health_check(&self) -> Result<HealthStatus> {
        self.transport.health().await
    }

    /// 让服务端用给定密钥测试上游连通性
    pub async fn test_connection(&self, api_key: &str) -> Result<ConnectionReport> {
        if api_key.trim().is_empty() {
            return Err(ChatError::InvalidRequest("API 密钥不能为空".into()));
        }
        self.transport.test_connection(api_key).await
    }
}

impl<S: MessageSink, T: ChatTransport> StreamingChatClient<S, T> {
    /// 使用自定义传输层创建客户端
    ///
    /// 配置了密钥文件时会在这里读取已保存的密钥。
    pub fn with_transport(config: Config, sink: S, transport: T) -> Self {
        let credentials = config.credential_path.clone().map(CredentialStore::new);
        let remembered = credentials.as_ref().and_then(CredentialStore::load);

        Self {
            sink: Arc::new(sink),
            transport: Arc::new(transport),
            config: Arc::new(config),
            active: Arc::new(Mutex::new(None)),
            credentials,
            remembered_key: Arc::new(Mutex::new(remembered)),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn slot(&self) -> MutexGuard<'_, Option<StreamSession>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ============================================================================================
    // 状态查询
    // ============================================================================================

    /// 当前状态，没有活动会话时为 `Idle`
    pub fn state(&self) -> SessionState {
        self.slot()
            .as_ref()
            .map_or(SessionState::Idle, StreamSession::state)
    }

    /// 是否有请求正在进行（发送按钮应被禁用）
    pub fn is_busy(&self) -> bool {
        self.state().is_active()
    }

    pub fn active_session(&self) -> Option<SessionId> {
        self.slot().as_ref().map(StreamSession::id)
    }

    /// 活动会话目前累积的文本
    pub fn accumulated_text(&self) -> Option<String> {
        self.slot()
            .as_ref()
            .map(|s| s.accumulated_text().to_string())
    }

    /// 启动时读取或最近一次提交使用的密钥
    pub fn remembered_api_key(&self) -> Option<String> {
        self.remembered_key
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    // ============================================================================================
    // 提交
    // ============================================================================================

    /// 提交一次请求
    ///
    /// 立即返回句柄，请求在 tokio 运行时上异步执行。
    /// 空密钥或空消息返回 `InvalidRequest`；已有活动会话时返回 `Busy`，且不影响该会话。
    pub fn submit(&self, request: ChatRequest) -> Result<SessionHandle> {
        request.validate()?;
        let runtime = Handle::try_current().map_err(|e| ChatError::Task(e.to_string()))?;
        let body = ChatBody::resolve(&request, &self.config);

        let id = {
            let mut slot = self.slot();
            if let Some(current) = slot.as_ref().filter(|s| s.state().is_active()) {
                warn!("rejecting submit while {} is {:?}", current.id(), current.state());
                return Err(ChatError::Busy);
            }
            let id = SessionId::next();
            *slot = Some(StreamSession::new(id, self.config.lossy_decoding));
            id
        };
        info!("{} submitted (model {})", id, body.model);

        // 渲染层回调期间不持有锁，回调里可以查询客户端状态
        let user = self.sink.create_pending_message(Role::User);
        self.sink.update_message(user, &request.user_message);
        self.sink.finalize_message(user, true, None);

        let message = self.sink.create_pending_message(Role::Assistant);
        if let Some(session) = self.slot().as_mut().filter(|s| s.id() == id) {
            session.attach_message(message);
        }

        self.remember(&request.api_key, &runtime);

        let client = self.clone();
        let task = runtime.spawn(async move { client.drive(id, body).await });
        Ok(SessionHandle { id, task })
    }

    fn remember(&self, api_key: &str, runtime: &Handle) {
        *self
            .remembered_key
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(api_key.to_string());
        if let Some(store) = self.credentials.clone() {
            let generation = store.next_generation();
            let api_key = api_key.to_string();
            runtime.spawn(async move { store.write(generation, &api_key).await });
        }
    }

    /// 读取循环：按到达顺序逐块处理，直到会话结束
    async fn drive(self, id: SessionId, body: ChatBody) -> Result<SessionOutcome> {
        let applied = match self.transport.open(body).await {
            Err(e) => self.apply(id, |s| s.on_error(&e))?,
            Ok(mut stream) => {
                self.apply(id, StreamSession::on_response_start)?;
                loop {
                    let applied = match stream.next().await {
                        Some(Ok(bytes)) => self.apply(id, |s| s.on_chunk(&bytes))?,
                        Some(Err(e)) => self.apply(id, |s| s.on_error(&e))?,
                        None => self.apply(id, StreamSession::on_complete)?,
                    };
                    if applied.finished.is_some() {
                        break applied;
                    }
                }
            }
        };
        applied.finished.ok_or(ChatError::UnknownSession(id))
    }

    /// 对活动会话执行一次操作；进入终态后丢弃会话，客户端回到 `Idle`
    ///
    /// 状态变更在锁内完成，通知在释放锁之后投递。
    fn apply<F>(&self, id: SessionId, op: F) -> Result<Applied>
    where
        F: FnOnce(&mut StreamSession) -> Result<()>,
    {
        let (applied, message, notices) = {
            let mut slot = self.slot();
            let session = match slot.as_mut() {
                Some(session) if session.id() == id => session,
                _ => return Err(ChatError::UnknownSession(id)),
            };

            let result = op(&mut *session);
            let state = session.state();
            let message = session.message();
            let notices = session.take_notices();
            let finished = state.is_terminal().then(|| session.outcome());
            if let Some(outcome) = &finished {
                info!("{} finished as {:?} ({} chars)", id, outcome.state, outcome.text.chars().count());
                *slot = None;
            } else {
                debug!("{} is {:?}", id, state);
            }
            let applied = Applied {
                result,
                state,
                finished,
            };
            (applied, message, notices)
        };

        self.dispatch(id, message, notices);
        Ok(applied)
    }

    fn dispatch(&self, id: SessionId, message: Option<MessageHandle>, notices: Vec<Notice>) {
        let Some(message) = message else {
            if !notices.is_empty() {
                warn!("{} has no message yet, dropping {} notice(s)", id, notices.len());
            }
            return;
        };
        for notice in notices {
            match notice {
                Notice::Update(text) => self.sink.update_message(message, &text),
                Notice::Finalize { success, error } => {
                    self.sink.finalize_message(message, success, error.as_deref())
                }
            }
        }
    }

    // ============================================================================================
    // 会话事件
    // ============================================================================================

    /// 处理一个字节块，返回处理后的状态
    pub fn on_chunk(&self, id: SessionId, bytes: &[u8]) -> Result<SessionState> {
        self.apply(id, |s| s.on_chunk(bytes))?.into_state()
    }

    /// 流正常结束
    pub fn on_complete(&self, id: SessionId) -> Result<SessionState> {
        self.apply(id, StreamSession::on_complete)?.into_state()
    }

    /// 请求或读取失败
    pub fn on_error(&self, id: SessionId, error: ChatError) -> Result<SessionState> {
        self.apply(id, |s| s.on_error(&error))?.into_state()
    }
}
