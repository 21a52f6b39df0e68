//! Anonymous session middleware.
//!
//! Every API route passes through [`ensure_session`]: a request carrying a
//! valid `sessionId` cookie keeps it unchanged, anything else gets a freshly
//! minted identifier attached to the response. Minting never blocks and never
//! fails the request. The `hasPreferences` cookie is a client routing marker,
//! not a security control, so it is readable by scripts.

use axum::http::{header, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use cookie::{Cookie, SameSite};

use compass_core::{
    is_valid_session_id, new_session_id, HAS_PREFERENCES_COOKIE, SESSION_COOKIE,
    SESSION_COOKIE_MAX_AGE_SECS,
};

/// Per-request session identity, injected into request extensions.
#[derive(Clone, Debug)]
pub struct SessionContext {
    /// The session identifier for this request.
    pub session_id: String,
    /// Whether the identifier was minted for this request (cookie absent or
    /// invalid). Exactly one Set-Cookie per session lifetime.
    pub is_new: bool,
    /// Whether the `hasPreferences` marker cookie is set.
    pub has_preferences: bool,
}

fn cookie_value(headers: &axum::http::HeaderMap, name: &str) -> Option<String> {
    headers.get_all(header::COOKIE).iter().find_map(|value| {
        let raw = value.to_str().ok()?;
        Cookie::split_parse(raw.to_string())
            .filter_map(|c| c.ok())
            .find(|c| c.name() == name)
            .map(|c| c.value().to_string())
    })
}

/// Build the `Set-Cookie` value for a session identifier.
pub fn session_cookie(session_id: &str) -> String {
    Cookie::build((SESSION_COOKIE, session_id))
        .path("/")
        .max_age(cookie::time::Duration::seconds(SESSION_COOKIE_MAX_AGE_SECS))
        .http_only(true)
        .same_site(SameSite::Strict)
        .build()
        .to_string()
}

/// Build the `Set-Cookie` value for the `hasPreferences` routing marker.
pub fn has_preferences_cookie() -> String {
    Cookie::build((HAS_PREFERENCES_COOKIE, "true"))
        .path("/")
        .max_age(cookie::time::Duration::seconds(SESSION_COOKIE_MAX_AGE_SECS))
        .http_only(false)
        .same_site(SameSite::Strict)
        .build()
        .to_string()
}

/// Build the expiring `Set-Cookie` values used by session reset. The next
/// request mints a fresh identifier; identifiers are never reused.
pub fn clear_session_cookies() -> [String; 2] {
    let expire = |name: &'static str| {
        Cookie::build((name, ""))
            .path("/")
            .expires(cookie::time::OffsetDateTime::UNIX_EPOCH)
            .same_site(SameSite::Strict)
            .build()
            .to_string()
    };
    [expire(SESSION_COOKIE), expire(HAS_PREFERENCES_COOKIE)]
}

/// Attach a session identity to the request, minting one when needed.
pub async fn ensure_session(mut request: axum::extract::Request, next: Next) -> Response {
    let existing = cookie_value(request.headers(), SESSION_COOKIE)
        .filter(|id| is_valid_session_id(id));
    let has_preferences = cookie_value(request.headers(), HAS_PREFERENCES_COOKIE)
        .map(|v| v == "true")
        .unwrap_or(false);

    let (session_id, is_new) = match existing {
        Some(id) => (id, false),
        None => (new_session_id(), true),
    };

    let ctx = SessionContext {
        session_id: session_id.clone(),
        is_new,
        has_preferences,
    };
    request.extensions_mut().insert(ctx);

    let mut response = next.run(request).await;

    if is_new {
        if let Ok(value) = HeaderValue::from_str(&session_cookie(&session_id)) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    #[test]
    fn test_session_cookie_attributes() {
        let value = session_cookie("abc123");
        assert!(value.starts_with("sessionId=abc123"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("SameSite=Strict"));
        assert!(value.contains("Path=/"));
        assert!(value.contains("Max-Age=31536000"));
    }

    #[test]
    fn test_marker_cookie_is_script_readable() {
        let value = has_preferences_cookie();
        assert!(value.starts_with("hasPreferences=true"));
        assert!(!value.contains("HttpOnly"));
        assert!(value.contains("SameSite=Strict"));
    }

    #[test]
    fn test_clear_cookies_expire_both() {
        let [session, marker] = clear_session_cookies();
        assert!(session.starts_with("sessionId="));
        assert!(marker.starts_with("hasPreferences="));
        for value in [&session, &marker] {
            assert!(value.contains("Expires=Thu, 01 Jan 1970"), "got {}", value);
        }
    }

    #[test]
    fn test_cookie_value_finds_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("other=1; sessionId=V1StGXR8_Z5jdHi6B-myT; hasPreferences=true"),
        );
        assert_eq!(
            cookie_value(&headers, SESSION_COOKIE).as_deref(),
            Some("V1StGXR8_Z5jdHi6B-myT")
        );
        assert_eq!(
            cookie_value(&headers, HAS_PREFERENCES_COOKIE).as_deref(),
            Some("true")
        );
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn test_cookie_value_absent_header() {
        let headers = HeaderMap::new();
        assert_eq!(cookie_value(&headers, SESSION_COOKIE), None);
    }

    fn session_app() -> axum::Router {
        async fn echo_session(
            axum::Extension(ctx): axum::Extension<SessionContext>,
        ) -> String {
            ctx.session_id
        }
        axum::Router::new()
            .route("/", axum::routing::get(echo_session))
            .layer(axum::middleware::from_fn(ensure_session))
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_first_request_mints_exactly_one_cookie() {
        use tower::ServiceExt;

        let response = session_app()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let set_cookies: Vec<String> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(set_cookies.len(), 1);
        assert!(set_cookies[0].starts_with("sessionId="));

        let minted = body_string(response).await;
        assert!(is_valid_session_id(&minted));
        assert!(set_cookies[0].starts_with(&format!("sessionId={}", minted)));
    }

    #[tokio::test]
    async fn test_returning_cookie_is_reused_without_set_cookie() {
        use tower::ServiceExt;

        let app = session_app();

        let first = app
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let minted = body_string(first).await;

        let second = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/")
                    .header(header::COOKIE, format!("sessionId={}", minted))
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(second.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(body_string(second).await, minted);
    }

    #[tokio::test]
    async fn test_malformed_cookie_gets_fresh_identity() {
        use tower::ServiceExt;

        let response = session_app()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/")
                    .header(header::COOKIE, "sessionId=not~a valid$id")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let set_cookies: Vec<&HeaderValue> =
            response.headers().get_all(header::SET_COOKIE).iter().collect();
        assert_eq!(set_cookies.len(), 1);

        let fresh = body_string(response).await;
        assert!(is_valid_session_id(&fresh));
        assert_ne!(fresh, "not~a valid$id");
    }
}
