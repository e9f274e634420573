use std::sync::OnceLock;

use axum::{extract::Request, http::header::AUTHORIZATION, middleware::Next, response::Response};
use reqwest::Client;
use tastebite_core::app_error::AppError;

use crate::api::sessions;

static HTTP_CLIENT: OnceLock<Client> = OnceLock::new();

fn http_client() -> &'static Client {
    HTTP_CLIENT.get_or_init(Client::new)
}

fn extract_bearer_token(header: &str) -> Option<&str> {
    let token = header.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

/// Route layer for customer-facing routes: resolves the caller's session
/// against the session provider and injects the user id as an extension.
/// Loss of session is a 401 the client answers by redirecting to auth.
pub async fn customers_authorization(mut req: Request, next: Next) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_bearer_token)
        .ok_or(AppError::Unauthorized)?
        .to_string();

    let session = sessions::get_current_session(http_client(), &token)
        .await
        .map_err(|err| match err.downcast::<AppError>() {
            Ok(err @ AppError::ServiceUnreachable(_)) => err,
            _ => AppError::Unauthorized,
        })?;

    req.extensions_mut().insert(session.id);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::extract_bearer_token;

    #[test]
    fn bearer_tokens_are_extracted() {
        assert_eq!(extract_bearer_token("Bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer_token("Bearer  abc123 "), Some("abc123"));
    }

    #[test]
    fn malformed_authorization_headers_yield_none() {
        assert_eq!(extract_bearer_token("abc123"), None);
        assert_eq!(extract_bearer_token("Basic abc123"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
    }
}
