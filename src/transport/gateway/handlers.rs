use crate::core::conversations::{MessageRole, MessageStatus, NewMessage};
use crate::core::invoker::{compose_user_message, resolve_agent};
use crate::core::relay::{RelayEvent, RelayFrame, claim_run, missing_stream_frame, relay_frames};
use crate::core::session::{StreamSession, normalize_lang};
use crate::error::RelayError;
use crate::transport::channels::dootask::SendTextRequest;
use crate::utils::text::truncate_stored_content;
use axum::{
    body::Body,
    extract::{Form, Path, Query, State, rejection::FormRejection},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use futures_util::{Stream, StreamExt, stream};
use std::convert::Infallible;

use super::base_url::{BaseUrlQuery, resolve_base_url};
use super::webhook::WebhookForm;
use super::AppState;

/// GET /health
pub(super) async fn handle_health(State(_state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /service/webhook
pub(super) async fn handle_webhook(
    State(state): State<AppState>,
    Query(query): Query<BaseUrlQuery>,
    headers: HeaderMap,
    form: Result<Form<WebhookForm>, FormRejection>,
) -> Response {
    let Form(form) = match form {
        Ok(form) => form,
        Err(e) => {
            tracing::warn!("rejected webhook body: {e}");
            let body = serde_json::json!({
                "code": "VALIDATION_001",
                "message": "invalid webhook form",
                "data": e.body_text(),
            });
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }
    };

    if form.is_unaddressed_group() {
        return StatusCode::OK.into_response();
    }

    let base_url = resolve_base_url(&query, &headers, &state.config.gateway.fallback_base_url());
    let dialog_id = form.dialog_id;
    match accept_webhook(&state, form, base_url).await {
        Ok(Some(session)) => {
            tracing::info!(
                stream_id = %session.stream_id,
                dialog_id,
                send_id = session.context.send_id,
                "stream registered"
            );
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(dialog_id, "webhook handling failed: {e}"),
    }
    StatusCode::OK.into_response()
}

/// Register a stream for one chat message. `Ok(None)` means the bot has no
/// usable agent and the sender was told so.
async fn accept_webhook(
    state: &AppState,
    form: WebhookForm,
    base_url: String,
) -> Result<Option<StreamSession>, RelayError> {
    let token = if form.token.is_empty() {
        state.config.dootask.bot_token.clone().unwrap_or_default()
    } else {
        form.token.clone()
    };
    let platform = state.connector.connect(&token);

    let agent = match resolve_agent(state.store.as_ref(), form.bot_uid).await {
        Ok(agent) => agent,
        Err(RelayError::Setup(setup)) => {
            tracing::info!(bot_uid = form.bot_uid, "webhook for unusable agent: {setup}");
            let text = t!(setup.notice_key(), locale = &form.lang()).to_string();
            if let Err(e) = platform
                .send_text(&SendTextRequest::notice(form.dialog_id, text))
                .await
            {
                tracing::warn!(dialog_id = form.dialog_id, "failed to send agent notice: {e}");
            }
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let placeholder = platform
        .send_text(&SendTextRequest::placeholder(form.dialog_id, form.msg_id))
        .await?;
    let session = StreamSession::new(form.into_context(token, placeholder.id, base_url));
    state.buffer.save_session(&session).await?;

    let context = &session.context;
    if let Err(e) = platform
        .notify_stream(context.msg_uid, &session.stream_url())
        .await
    {
        tracing::warn!(stream_id = %session.stream_id, "failed to announce stream: {e}");
    }

    let conversation = state
        .store
        .find_or_create_conversation(agent.id, &context.user_key(), &context.dialog_key())
        .await?;
    let text = compose_user_message(platform.as_ref(), context)
        .await
        .unwrap_or_else(|_| context.text.clone());
    state
        .store
        .insert_message(&NewMessage {
            conversation_id: conversation.id,
            send_id: context.send_id,
            role: MessageRole::User,
            content: truncate_stored_content(&text),
            status: MessageStatus::Pending,
            tokens_used: 0,
            response_time_ms: None,
            mcp_used: None,
        })
        .await?;

    Ok(Some(session))
}

/// GET /service/stream/{stream_id}
pub(super) async fn handle_stream(
    State(state): State<AppState>,
    Path(stream_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let session = match state.buffer.load_session(&stream_id).await {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(stream_id = %stream_id, "session lookup failed: {e}");
            None
        }
    };
    let Some(session) = session else {
        let lang = headers
            .get("language")
            .and_then(|v| v.to_str().ok())
            .map_or_else(|| "en".to_string(), normalize_lang);
        return event_stream_response(stream::iter([missing_stream_frame(&lang)]));
    };

    match claim_run(&state.buffer, &stream_id).await {
        Ok(true) => {
            state.runs.spawn(session.clone());
        }
        Ok(false) => {
            tracing::debug!(stream_id = %stream_id, "joining existing run");
        }
        Err(e) => {
            tracing::warn!(stream_id = %stream_id, "claim failed: {e}");
            let frame = RelayFrame::new(
                session.context.send_id,
                RelayEvent::Error,
                t!("stream.read_failed", locale = &session.context.lang),
            );
            return event_stream_response(stream::iter([frame]));
        }
    }

    event_stream_response(relay_frames(state.buffer.clone(), session, state.relay))
}

fn event_stream_response<S>(frames: S) -> Response
where
    S: Stream<Item = RelayFrame> + Send + 'static,
{
    let body = frames.map(|frame| Ok::<_, Infallible>(frame.encode()));
    let mut response = Response::new(Body::from_stream(body));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/event-stream; charset=utf-8"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-cache"),
    );
    headers.insert(
        header::CONNECTION,
        header::HeaderValue::from_static("keep-alive"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        header::HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        header::HeaderValue::from_static("Cache-Control"),
    );
    headers.insert("x-accel-buffering", header::HeaderValue::from_static("no"));
    response
}
