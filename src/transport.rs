//! HTTP 传输模块
use crate::{
    config::Config,
    error::{ChatError, Result},
    types::{ChatBody, ConnectionReport, HealthStatus},
};
use bytes::Bytes;
use futures::{
    future::BoxFuture,
    stream::BoxStream,
    FutureExt, StreamExt,
};
use log::{debug, error};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE},
    Client, Response,
};
use std::sync::Arc;

/// 传输层返回的字节流
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// 聊天接口路径
pub const CHAT_PATH: &str = "/api/chat";
/// 健康检查接口路径
pub const HEALTH_PATH: &str = "/api/health";
/// 上游连通性测试接口路径
pub const TEST_CONNECTION_PATH: &str = "/api/test-openai";

/// 不透明的传输层：发出请求，返回可读取的字节流
///
/// 非 2xx 响应必须以 `ChatError::Status` 返回。
pub trait ChatTransport: Send + Sync + 'static {
    fn open(&self, body: ChatBody) -> BoxFuture<'static, Result<ByteStream>>;
}

// ================================================================================================
// reqwest 实现
// ================================================================================================

/// 基于 reqwest 的传输层
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Arc<Client>,
    config: Arc<Config>,
}

impl HttpTransport {
    /// 创建一个新的 `HttpTransport` 实例
    pub fn new(config: Config) -> Self {
        let mut builder = Client::builder()
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .tcp_keepalive(config.tcp_keepalive)
            .tcp_nodelay(config.tcp_nodelay)
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout);
        // 长回答只受读取间隔限制，整体超时仅在显式配置时生效
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .unwrap_or_else(|e| {
                error!("Failed to build reqwest client: {}", e);
                Client::new()
            });

        Self {
            client: Arc::new(client),
            config: Arc::new(config),
        }
    }

    fn build_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("text/plain"));
        headers
    }

    /// 非 2xx 响应转换为带状态码的错误
    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ChatError::Status {
            status: status.as_u16(),
            body,
        })
    }

    /// `GET /api/health`
    pub async fn health(&self) -> Result<HealthStatus> {
        let endpoint = self.config.endpoint(HEALTH_PATH);
        let response = self.client.get(&endpoint).send().await?;
        let response = Self::check_status(response).await?;
        Ok(response.json::<HealthStatus>().await?)
    }

    /// `POST /api/test-openai`
    pub async fn test_connection(&self, api_key: &str) -> Result<ConnectionReport> {
        let endpoint = self.config.endpoint(TEST_CONNECTION_PATH);
        let params = serde_json::json!({ "api_key": api_key });
        let response = self
            .client
            .post(&endpoint)
            .headers(Self::build_headers())
            .json(&params)
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        Ok(response.json::<ConnectionReport>().await?)
    }
}

impl ChatTransport for HttpTransport {
    fn open(&self, body: ChatBody) -> BoxFuture<'static, Result<ByteStream>> {
        let client = Arc::clone(&self.client);
        let endpoint = self.config.endpoint(CHAT_PATH);
        async move {
            debug!("POST {} (model {})", endpoint, body.model);
            let response = client
                .post(&endpoint)
                .headers(Self::build_headers())
                .json(&body)
                .send()
                .await?;
            let response = Self::check_status(response).await?;
            let stream = response
                .bytes_stream()
                .map(|chunk| chunk.map_err(ChatError::from));
            Ok(stream.boxed())
        }
        .boxed()
    }
}
