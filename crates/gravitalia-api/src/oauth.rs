use std::time::Duration;

use axum::{
    extract::{Query, State},
    response::Redirect,
};
use rand::Rng;
use tracing::{info, warn};

use gravitalia_types::api::OAuthCallbackQuery;

use crate::error::ApiError;
use crate::state::AppState;
use crate::upstream::UpstreamError;
use crate::users::deletion_key;

pub const STATE_TTL: Duration = Duration::from_secs(500);
const STATE_LEN: usize = 24;
const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

fn random_state() -> String {
    let mut rng = rand::rng();
    (0..STATE_LEN)
        .map(|_| LETTERS[rng.random_range(0..LETTERS.len())] as char)
        .collect()
}

fn provider_error(e: UpstreamError) -> ApiError {
    match e {
        UpstreamError::Rejected { .. } => ApiError::InvalidCode,
        other => ApiError::Upstream(other),
    }
}

/// `GET /callback`: starts the login flow, or finishes it when the
/// provider sends the browser back with a known `state` and a `code`.
pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<OAuthCallbackQuery>,
) -> Result<Redirect, ApiError> {
    let known_state = match query.state.as_deref().filter(|s| !s.is_empty()) {
        Some(s) => state.cache.get(s).await?.is_some(),
        None => false,
    };
    let code = query.code.filter(|c| !c.is_empty());

    let Some(code) = code.filter(|_| known_state) else {
        let fresh = random_state();
        state.cache.set(&fresh, "ok", STATE_TTL).await?;
        let links = &state.links;
        return Ok(Redirect::temporary(&format!(
            "{}/oauth2/authorize?client_id={}&scope=identity&redirect_uri={}&response_type=code&state={}",
            links.oauth_host, links.client_id, links.redirect_url, fresh
        )));
    };

    let token = state.oauth.exchange_code(&code).await.map_err(provider_error)?;
    let user = state.oauth.fetch_user(&token).await.map_err(provider_error)?;
    if user.vanity.is_empty() {
        return Err(ApiError::InvalidCode);
    }

    if state.cache.get(&deletion_key(&user.vanity)).await?.is_some() {
        return Err(ApiError::Cooldown("Account deleted too soon"));
    }

    if state.graph.create_user(&user.vanity).await? {
        info!("New account {}", user.vanity);
        let search = state.search.clone();
        tokio::spawn(async move {
            if let Err(e) = search.add_user(&user).await {
                warn!("Failed to index {}: {}", user.vanity, e);
            }
        });
    }

    Ok(Redirect::temporary(&format!(
        "{}/callback?token={}",
        state.links.frontend_url, token
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_is_24_letters() {
        let s = random_state();
        assert_eq!(s.len(), STATE_LEN);
        assert!(s.bytes().all(|b| b.is_ascii_alphabetic()));
        assert_ne!(s, random_state());
    }
}
