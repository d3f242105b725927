use tower_sessions::Session;

use crate::error::StudioError;
use crate::preview::generate_token;

const CSRF_TOKEN_KEY: &str = "csrf_token";

/// Returns the session's CSRF token, minting one on first use.
pub(crate) async fn csrf_token(session: &Session) -> Result<String, StudioError> {
    if let Some(existing) = session.get::<String>(CSRF_TOKEN_KEY).await? {
        return Ok(existing);
    }
    let token = generate_token();
    session.insert(CSRF_TOKEN_KEY, token.clone()).await?;
    Ok(token)
}

pub(crate) async fn validate_csrf(session: &Session, token: &str) -> Result<(), StudioError> {
    let stored = session.get::<String>(CSRF_TOKEN_KEY).await?;
    match stored {
        Some(expected) if !token.is_empty() && expected == token => Ok(()),
        _ => Err(StudioError::Unauthorized),
    }
}
