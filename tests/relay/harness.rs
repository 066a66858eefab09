use dootask_ai::Config;
use dootask_ai::core::conversations::{
    ChatMessage, ChatStore, NewAgent, NewAiModel, SqliteChatStore,
};
use dootask_ai::transport::channels::DooTaskConnector;
use dootask_ai::transport::gateway::{AppState, build_app};
use serde_json::{Value, json};
use sqlx::sqlite::SqlitePoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const PLACEHOLDER_ID: i64 = 500;
pub const BOT_UID: i64 = 1001;

/// A relay bound to an ephemeral port, with mocked chat platform and
/// inference service behind it.
pub struct RelayServer {
    pub addr: SocketAddr,
    pub platform: MockServer,
    pub inference: MockServer,
    pub store: Arc<SqliteChatStore>,
    pub agent_id: i64,
    http: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for RelayServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn platform_ok(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "ret": 1,
        "msg": "success",
        "data": data,
    }))
}

impl RelayServer {
    pub async fn start() -> Self {
        let platform = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/dialog/msg/sendtext"))
            .respond_with(platform_ok(json!({"id": PLACEHOLDER_ID, "dialog_id": 9})))
            .mount(&platform)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/dialog/msg/stream"))
            .respond_with(platform_ok(json!({})))
            .mount(&platform)
            .await;
        let inference = MockServer::start().await;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite should open");
        let store = Arc::new(
            SqliteChatStore::new(pool)
                .await
                .expect("chat schema should be created"),
        );
        let agent_id = seed_agent(&store).await;

        let mut config = Config::default();
        config.dootask.base_url = platform.uri();
        config.inference.base_url = Some(inference.uri());
        config.inference.max_retries = 0;
        config.stream.compression_interval_ms = 10;
        let config = Arc::new(config);

        let connector = Arc::new(
            DooTaskConnector::new(platform.uri()).expect("platform connector should build"),
        );
        let state = AppState::new(Arc::clone(&config), store.clone(), connector)
            .expect("relay state should build");
        let app = build_app(state, &config.gateway.cors_origins);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("ephemeral relay listener should bind");
        let addr = listener
            .local_addr()
            .expect("ephemeral relay listener should expose local address");
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            platform,
            inference,
            store,
            agent_id,
            http: reqwest::Client::new(),
            handle,
        }
    }

    pub fn url(&self, route: &str) -> String {
        format!("http://{}{route}", self.addr)
    }

    pub async fn post_webhook(&self, fields: &[(&str, String)]) -> reqwest::Response {
        self.http
            .post(self.url("/service/webhook"))
            .form(fields)
            .send()
            .await
            .expect("webhook request should complete")
    }

    /// Body of a relay connection, read until the server closes it.
    pub async fn read_stream(&self, stream_id: &str) -> String {
        let response = self
            .http
            .get(self.url(&format!("/service/stream/{stream_id}")))
            .send()
            .await
            .expect("relay request should complete");
        tokio::time::timeout(Duration::from_secs(10), response.text())
            .await
            .expect("relay connection should end")
            .expect("relay body should be readable")
    }

    /// Stream id announced through the platform's stream notice.
    pub async fn announced_stream_id(&self) -> String {
        let requests = self
            .platform
            .received_requests()
            .await
            .expect("request recording should be enabled");
        let notice = requests
            .iter()
            .find(|request| request.url.path() == "/api/dialog/msg/stream")
            .expect("a stream notice should have been sent");
        let body: Value =
            serde_json::from_slice(&notice.body).expect("stream notice should be JSON");
        let url = body["stream_url"]
            .as_str()
            .expect("stream notice should carry a URL");
        url.rsplit('/')
            .next()
            .expect("stream URL should end in an id")
            .to_string()
    }

    pub async fn platform_calls(&self, endpoint: &str) -> Vec<Value> {
        self.platform
            .received_requests()
            .await
            .expect("request recording should be enabled")
            .iter()
            .filter(|request| request.url.path() == endpoint)
            .map(|request| serde_json::from_slice(&request.body).unwrap_or(Value::Null))
            .collect()
    }

    pub async fn messages(&self) -> Vec<ChatMessage> {
        let Some(conversation) = self
            .store
            .find_conversation(self.agent_id, "42", "9")
            .await
            .expect("conversation lookup should succeed")
        else {
            return Vec::new();
        };
        self.store
            .messages_for_conversation(conversation.id)
            .await
            .expect("message listing should succeed")
    }
}

async fn seed_agent(store: &SqliteChatStore) -> i64 {
    let model_id = store
        .insert_ai_model(&NewAiModel {
            name: "m".into(),
            provider: "openai".into(),
            model_name: "gpt-4o".into(),
            is_enabled: true,
            ..NewAiModel::default()
        })
        .await
        .expect("model should insert");
    store
        .insert_agent(&NewAgent {
            name: "helper".into(),
            bot_id: BOT_UID,
            user_id: 1,
            ai_model_id: Some(model_id),
            is_active: true,
            ..NewAgent::default()
        })
        .await
        .expect("agent should insert")
}

/// Form fields of a direct-dialog webhook from user 42 in dialog 9.
pub fn direct_message(text: &str) -> Vec<(&'static str, String)> {
    vec![
        ("text", text.to_string()),
        ("token", "bot-token".into()),
        ("session_id", "3".into()),
        ("dialog_id", "9".into()),
        ("dialog_type", "user".into()),
        ("msg_id", "77".into()),
        ("msg_uid", "42".into()),
        ("msg_user", r#"{"userid":42,"lang":"en"}"#.into()),
        ("bot_uid", BOT_UID.to_string()),
    ]
}

/// An inference body that streams `Hel` + `lo` and a final message.
pub fn hello_body() -> String {
    concat!(
        "data: {\"type\":\"token\",\"content\":\"Hel\"}\n",
        "data: {\"type\":\"token\",\"content\":\"lo\"}\n",
        "data: {\"type\":\"message\",\"content\":{\"type\":\"ai\",\"content\":\"Hello\",",
        "\"usage_metadata\":{\"input_tokens\":3,\"output_tokens\":4}}}\n",
        "data: [DONE]\n",
    )
    .to_string()
}

/// Content of every frame in a relay body, concatenated.
pub fn frame_text(body: &str) -> String {
    body.lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .filter_map(|data| serde_json::from_str::<Value>(data).ok())
        .filter_map(|value| value["content"].as_str().map(str::to_string))
        .collect()
}
