//! Integration tests against a mock chat backend.

use std::time::Duration;
use streamchat::{
    ChatError, ChatRequest, Config, MemorySink, Model, Role, SessionState, StreamingChatClient,
};
use tempfile::tempdir;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> Config {
    let _ = env_logger::builder().is_test(true).try_init();
    Config::default().with_api_base(server.uri())
}

#[tokio::test]
async fn test_chat_streams_body_text() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_json(serde_json::json!({
            "api_key": "sk-test",
            "user_message": "Say hi",
            "model": "gpt-4.1",
            "developer_message": "Be friendly."
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain; charset=utf-8")
                .set_body_string("Hi there! 👋 你好"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = StreamingChatClient::new(config_for(&mock_server), MemorySink::new());
    let request = ChatRequest::new("sk-test", "Say hi")
        .with_model(Model::Gpt41)
        .with_developer_message("Be friendly.");

    let outcome = client.submit(request).unwrap().wait().await.unwrap();
    assert_eq!(outcome.state, SessionState::Completed);
    assert_eq!(outcome.text, "Hi there! 👋 你好");

    let records = client.sink().records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].role, Role::User);
    assert_eq!(records[1].role, Role::Assistant);
    assert_eq!(records[1].text, "Hi there! 👋 你好");
    assert!(!records[1].is_loading);
    assert!(records[1].error.is_none());
}

#[tokio::test]
async fn test_chat_unauthorized_reports_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(serde_json::json!({ "detail": "Incorrect API key provided" })),
        )
        .mount(&mock_server)
        .await;

    let client = StreamingChatClient::new(config_for(&mock_server), MemorySink::new());
    let outcome = client
        .submit(ChatRequest::new("sk-bad", "hi"))
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(outcome.state, SessionState::Failed);
    assert_eq!(outcome.text, "");
    let error = outcome.error.unwrap();
    assert!(error.contains("401"));
    assert!(error.contains("Incorrect API key provided"));

    let records = client.sink().records();
    assert_eq!(records[1].display_text(), error);
    assert!(!client.is_busy());
}

#[tokio::test]
async fn test_chat_busy_while_request_pending() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("slow answer")
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = StreamingChatClient::new(config_for(&mock_server), MemorySink::new());
    let handle = client.submit(ChatRequest::new("sk-test", "first")).unwrap();
    assert!(client.is_busy());
    assert!(matches!(
        client.submit(ChatRequest::new("sk-test", "second")),
        Err(ChatError::Busy)
    ));

    let outcome = handle.wait().await.unwrap();
    assert_eq!(outcome.text, "slow answer");
    assert_eq!(client.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_stalled_backend_hits_read_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("too late")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let config = config_for(&mock_server).with_read_timeout(Duration::from_millis(200));
    assert_eq!(config.timeout(), None);
    let client = StreamingChatClient::new(config, MemorySink::new());

    let outcome = client
        .submit(ChatRequest::new("sk-test", "hi"))
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(outcome.state, SessionState::Failed);
    assert_eq!(outcome.text, "");
    assert!(!client.is_busy());
}

#[tokio::test]
async fn test_connection_refused_fails_session() {
    // nothing listens on port 1
    let config = Config::default()
        .with_api_base("http://127.0.0.1:1".to_string())
        .with_connect_timeout(Duration::from_secs(2));
    let client = StreamingChatClient::new(config, MemorySink::new());

    let outcome = client
        .submit(ChatRequest::new("sk-test", "hi"))
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(outcome.state, SessionState::Failed);
    assert!(outcome.error.unwrap().starts_with("Error: "));
    assert!(client.submit(ChatRequest::new("sk-test", "again")).is_ok());
}

#[tokio::test]
async fn test_health_check() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": "ok" })))
        .mount(&mock_server)
        .await;

    let client = StreamingChatClient::new(config_for(&mock_server), MemorySink::new());
    let health = client.health_check().await.unwrap();
    assert!(health.is_ok());
}

#[tokio::test]
async fn test_connection_report() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/test-openai"))
        .and(body_json(serde_json::json!({ "api_key": "sk-test" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "success",
            "message": "OpenAI API is working!",
            "response": "Hello, OpenAI API is working!",
            "model_used": "gpt-3.5-turbo"
        })))
        .mount(&mock_server)
        .await;

    let client = StreamingChatClient::new(config_for(&mock_server), MemorySink::new());
    let report = client.test_connection("sk-test").await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.model_used.as_deref(), Some("gpt-3.5-turbo"));

    assert!(matches!(
        client.test_connection("  ").await,
        Err(ChatError::InvalidRequest(_))
    ));
}

#[tokio::test]
async fn test_api_key_is_remembered_across_clients() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&mock_server)
        .await;

    let dir = tempdir().unwrap();
    let key_path = dir.path().join("streamchat_api_key");
    let config = config_for(&mock_server).with_credential_path(key_path.clone());

    let client = StreamingChatClient::new(config.clone(), MemorySink::new());
    assert!(client.remembered_api_key().is_none());
    client
        .submit(ChatRequest::new("sk-remember-me", "hi"))
        .unwrap()
        .wait()
        .await
        .unwrap();

    for _ in 0..100 {
        let stored = std::fs::read_to_string(&key_path).unwrap_or_default();
        if stored == "sk-remember-me" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let restarted = StreamingChatClient::new(config, MemorySink::new());
    assert_eq!(restarted.remembered_api_key().as_deref(), Some("sk-remember-me"));
}
