use super::types::{
    ApiEnvelope, ConvertedMessage, DialogMessage, MessageList, SendTextRequest, SentMessage,
    StreamNotice,
};
use super::{ChatPlatform, PlatformConnector, PlatformFuture};
use crate::error::PlatformError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

const SEND_TEXT: &str = "api/dialog/msg/sendtext";
const STREAM_NOTICE: &str = "api/dialog/msg/stream";
const MESSAGE_LIST: &str = "api/dialog/msg/list";
const CONVERT_FOR_AI: &str = "api/dialog/msg/webhookmsg2ai";

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Builds per-token [`DooTaskClient`]s sharing one connection pool.
#[derive(Clone)]
pub struct DooTaskConnector {
    base_url: String,
    http: reqwest::Client,
}

impl DooTaskConnector {
    pub fn new(base_url: impl Into<String>) -> Result<Self, PlatformError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| PlatformError::Client(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            http,
        })
    }

    pub fn client(&self, token: &str) -> DooTaskClient {
        DooTaskClient {
            base_url: self.base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            http: self.http.clone(),
        }
    }
}

impl PlatformConnector for DooTaskConnector {
    fn connect(&self, token: &str) -> Arc<dyn ChatPlatform> {
        Arc::new(self.client(token))
    }
}

/// Chat-platform API client authenticated with one bot token.
#[derive(Clone)]
pub struct DooTaskClient {
    base_url: String,
    token: String,
    http: reqwest::Client,
}

impl DooTaskClient {
    fn url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.base_url)
    }

    async fn post<B, T>(&self, endpoint: &str, body: &B) -> Result<T, PlatformError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.url(endpoint))
            .header("token", &self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| request_error(endpoint, &e))?;
        unwrap_envelope(endpoint, response).await
    }

    async fn get<Q, T>(&self, endpoint: &str, query: &Q) -> Result<T, PlatformError>
    where
        Q: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .get(self.url(endpoint))
            .header("token", &self.token)
            .query(query)
            .send()
            .await
            .map_err(|e| request_error(endpoint, &e))?;
        unwrap_envelope(endpoint, response).await
    }
}

fn request_error(endpoint: &str, err: &reqwest::Error) -> PlatformError {
    PlatformError::Request {
        endpoint: endpoint.to_string(),
        message: err.to_string(),
    }
}

async fn unwrap_envelope<T: DeserializeOwned>(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<T, PlatformError> {
    let status = response.status();
    if !status.is_success() {
        return Err(PlatformError::Rejected {
            endpoint: endpoint.to_string(),
            message: format!("HTTP {status}"),
        });
    }
    let envelope: ApiEnvelope<T> =
        response
            .json()
            .await
            .map_err(|e| PlatformError::Decode {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            })?;
    if envelope.ret != 1 {
        return Err(PlatformError::Rejected {
            endpoint: endpoint.to_string(),
            message: envelope.msg,
        });
    }
    envelope.data.ok_or_else(|| PlatformError::Decode {
        endpoint: endpoint.to_string(),
        message: "response has no data".into(),
    })
}

impl ChatPlatform for DooTaskClient {
    fn send_text<'a>(&'a self, request: &'a SendTextRequest) -> PlatformFuture<'a, SentMessage> {
        Box::pin(async move { self.post(SEND_TEXT, request).await })
    }

    fn notify_stream<'a>(&'a self, user_id: i64, stream_url: &'a str) -> PlatformFuture<'a, ()> {
        Box::pin(async move {
            let notice = StreamNotice {
                userid: user_id,
                stream_url,
            };
            let _: serde_json::Value = self.post(STREAM_NOTICE, &notice).await?;
            Ok(())
        })
    }

    fn recent_messages(&self, dialog_id: i64, take: usize) -> PlatformFuture<'_, Vec<DialogMessage>> {
        Box::pin(async move {
            let list: MessageList = self
                .get(MESSAGE_LIST, &[("dialog_id", dialog_id.to_string()), ("take", take.to_string())])
                .await?;
            Ok(list.list)
        })
    }

    fn convert_for_ai<'a>(&'a self, text: &'a str) -> PlatformFuture<'a, String> {
        Box::pin(async move {
            let converted: ConvertedMessage = self
                .post(CONVERT_FOR_AI, &serde_json::json!({ "msg": text }))
                .await?;
            Ok(converted.msg)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ok(data: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ret": 1,
            "msg": "success",
            "data": data,
        }))
    }

    #[tokio::test]
    async fn send_text_returns_created_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/dialog/msg/sendtext"))
            .and(header("token", "bot-token"))
            .and(body_partial_json(serde_json::json!({"text": "...", "reply_id": 3})))
            .respond_with(ok(serde_json::json!({"id": 88, "dialog_id": 9})))
            .expect(1)
            .mount(&server)
            .await;

        let client = DooTaskConnector::new(server.uri()).unwrap().client("bot-token");
        let sent = client
            .send_text(&SendTextRequest::placeholder(9, 3))
            .await
            .unwrap();
        assert_eq!(sent.id, 88);
        assert_eq!(sent.dialog_id, 9);
    }

    #[tokio::test]
    async fn rejected_call_surfaces_platform_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/dialog/msg/stream"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ret": 0,
                "msg": "token expired",
                "data": {},
            })))
            .mount(&server)
            .await;

        let client = DooTaskConnector::new(server.uri()).unwrap().client("t");
        let err = client
            .notify_stream(1, "http://x/service/stream/abc")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("token expired"));
    }

    #[tokio::test]
    async fn recent_messages_passes_take() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/dialog/msg/list"))
            .and(query_param("dialog_id", "9"))
            .and(query_param("take", "10"))
            .respond_with(ok(serde_json::json!({
                "list": [
                    {"id": 2, "type": "text", "msg": {"text": "newest", "type": "md"}},
                    {"id": 1, "type": "file", "msg": {}},
                ]
            })))
            .mount(&server)
            .await;

        let client = DooTaskConnector::new(server.uri()).unwrap().client("t");
        let messages = client.recent_messages(9, 10).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].msg.text, "newest");
    }

    #[tokio::test]
    async fn convert_for_ai_unwraps_msg() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/dialog/msg/webhookmsg2ai"))
            .respond_with(ok(serde_json::json!({"msg": "task #12: fix login"})))
            .mount(&server)
            .await;

        let client = DooTaskConnector::new(server.uri()).unwrap().client("t");
        let converted = client.convert_for_ai("<!--task 12-->").await.unwrap();
        assert_eq!(converted, "task #12: fix login");
    }
}
