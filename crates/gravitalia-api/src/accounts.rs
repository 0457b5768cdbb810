use std::time::Duration;

use axum::{
    Json,
    extract::{Query, State},
};
use tracing::info;

use gravitalia_types::api::{DataQuery, Envelope, SuspendQuery};
use gravitalia_types::models::UserExport;

use crate::error::ApiError;
use crate::middleware::Caller;
use crate::state::AppState;

pub const EXPORT_COOLDOWN: Duration = Duration::from_secs(24 * 3600);
pub const DATA_REQUESTED: &str = "Data requested less than 24 hours ago";

fn export_key(vanity: &str) -> String {
    format!("{vanity}-data")
}

/// `POST /account/suspend?vanity=&suspend=`, global key only.
pub async fn suspend(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<SuspendQuery>,
) -> Result<Json<Envelope>, ApiError> {
    if caller != Caller::Admin {
        return Err(ApiError::InvalidToken);
    }
    let vanity = query
        .vanity
        .filter(|v| !v.is_empty())
        .ok_or(ApiError::InvalidQuery)?;
    let suspended = match query.suspend.as_deref() {
        None => true,
        Some(value) => value.parse::<bool>().map_err(|_| ApiError::InvalidQuery)?,
    };

    if !state.graph.set_suspended(&vanity, suspended).await? {
        return Err(ApiError::InvalidUser);
    }
    info!("Set suspended={} on {}", suspended, vanity);
    Ok(Json(Envelope::ok("OK")))
}

/// `GET /account/data`: the caller's data, once per day. The global key
/// with `?vanity=` skips the limit.
pub async fn export_data(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<DataQuery>,
) -> Result<Json<UserExport>, ApiError> {
    let vanity = match caller {
        Caller::Admin => {
            let vanity = query
                .vanity
                .filter(|v| !v.is_empty())
                .ok_or(ApiError::InvalidQuery)?;
            return state
                .graph
                .export_user(&vanity)
                .await?
                .map(Json)
                .ok_or(ApiError::InvalidUser);
        }
        Caller::User(vanity) => vanity,
        Caller::Anonymous => return Err(ApiError::InvalidToken),
    };

    let key = export_key(&vanity);
    if state.cache.get(&key).await?.is_some() {
        return Err(ApiError::RateLimited(DATA_REQUESTED));
    }
    let export = state
        .graph
        .export_user(&vanity)
        .await?
        .ok_or(ApiError::InvalidUser)?;
    state.cache.set(&key, "ok", EXPORT_COOLDOWN).await?;

    Ok(Json(export))
}
