//! Request authentication hook and shipped schemes.
//!
//! [`Auth`] runs as the last outbound stage before dispatch, after
//! serialization and interception, so it sees the final headers and wire
//! payload. Implementations mutate the request, typically by setting the
//! `Authorization` header, and may perform asynchronous work of their
//! own (token refresh, challenge round trips) before returning.

use crate::error::Result;
use crate::request::MutableRequest;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// Asynchronous authentication hook.
#[async_trait]
pub trait Auth: Send + Sync {
    /// Authenticates the outgoing request in place.
    async fn authenticate(&self, request: &mut MutableRequest) -> Result<()>;
}

/// No-op authentication; the default for every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

#[async_trait]
impl Auth for NoAuth {
    async fn authenticate(&self, _request: &mut MutableRequest) -> Result<()> {
        Ok(())
    }
}

/// HTTP Basic authentication.
///
/// # Example
///
/// ```rust
/// use courier_core::auth::BasicAuth;
///
/// let auth = BasicAuth::new("aladdin", "opensesame");
/// ```
#[derive(Debug, Clone)]
pub struct BasicAuth {
    username: String,
    password: String,
}

impl BasicAuth {
    /// Creates the scheme from a username/password pair.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

#[async_trait]
impl Auth for BasicAuth {
    async fn authenticate(&self, request: &mut MutableRequest) -> Result<()> {
        let credentials = BASE64.encode(format!("{}:{}", self.username, self.password));
        request
            .headers_mut()
            .set("Authorization", format!("Basic {credentials}"));
        Ok(())
    }
}

/// Bearer token authentication.
#[derive(Debug, Clone)]
pub struct BearerAuth {
    token: String,
}

impl BearerAuth {
    /// Creates the scheme from an opaque token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl Auth for BearerAuth {
    async fn authenticate(&self, request: &mut MutableRequest) -> Result<()> {
        request
            .headers_mut()
            .set("Authorization", format!("Bearer {}", self.token));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestSnapshot;
    use crate::store::Store;
    use http::Method;
    use url::Url;

    fn request() -> MutableRequest {
        let snapshot = RequestSnapshot::for_test(
            Method::GET,
            Url::parse("http://localhost/secret").unwrap(),
        );
        MutableRequest::from_snapshot(&snapshot, Store::new().leaf())
    }

    #[tokio::test]
    async fn basic_auth_sets_encoded_header() {
        let mut req = request();
        BasicAuth::new("aladdin", "opensesame")
            .authenticate(&mut req)
            .await
            .unwrap();
        assert_eq!(
            req.headers().get("authorization"),
            Some("Basic YWxhZGRpbjpvcGVuc2VzYW1l")
        );
    }

    #[tokio::test]
    async fn bearer_auth_sets_token_header() {
        let mut req = request();
        BearerAuth::new("t0ken").authenticate(&mut req).await.unwrap();
        assert_eq!(req.headers().get("authorization"), Some("Bearer t0ken"));
    }

    #[tokio::test]
    async fn no_auth_leaves_request_untouched() {
        let mut req = request();
        NoAuth.authenticate(&mut req).await.unwrap();
        assert!(req.headers().is_empty());
    }
}
