use axum::http::{HeaderMap, header};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BaseUrlQuery {
    #[serde(default)]
    pub server_url: Option<String>,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Externally visible base URL of this service for one request.
///
/// Order: an absolute `server_url` query parameter, then the forwarded or
/// direct host headers, then `fallback`.
pub fn resolve_base_url(query: &BaseUrlQuery, headers: &HeaderMap, fallback: &str) -> String {
    if let Some(raw) = query.server_url.as_deref().map(str::trim)
        && !raw.is_empty()
    {
        match url::Url::parse(raw) {
            Ok(_) => return raw.trim_end_matches('/').to_string(),
            Err(e) => tracing::debug!(server_url = raw, "ignoring server_url: {e}"),
        }
    }

    let host = header_str(headers, "x-forwarded-host")
        .or_else(|| header_str(headers, header::HOST.as_str()));
    if let Some(host) = host {
        let scheme = match header_str(headers, "x-forwarded-proto") {
            Some(proto) if proto.eq_ignore_ascii_case("https") => "https",
            _ => "http",
        };
        return format!("{scheme}://{host}");
    }

    fallback.trim_end_matches('/').to_string()
}
