use std::time::Duration;

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
};
use tracing::{info, warn};

use gravitalia_types::api::{Envelope, PageQuery, UpdateUserRequest, UserResponse};
use gravitalia_types::relation::RelationKind;

use crate::error::ApiError;
use crate::middleware::{Caller, MaybeViewer, Viewer};
use crate::posts::spawn_image_cleanup;
use crate::state::AppState;
use crate::visibility::can_view_profile;

pub const ME: &str = "@me";

/// How long a deleted account is refused at login.
pub const DELETION_COOLDOWN: Duration = Duration::from_secs(3600);

pub fn deletion_key(vanity: &str) -> String {
    format!("{vanity}-gd")
}

/// `GET /users/{vanity|@me}`
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    MaybeViewer(viewer): MaybeViewer,
    Query(page): Query<PageQuery>,
) -> Result<Json<UserResponse>, ApiError> {
    let vanity = if id == ME {
        viewer.clone().ok_or(ApiError::InvalidToken)?
    } else {
        id
    };

    let profile = state
        .graph
        .profile(&vanity)
        .await?
        .filter(|p| !p.suspended)
        .ok_or(ApiError::InvalidUser)?;

    let access_post =
        can_view_profile(state.graph.as_ref(), viewer.as_deref(), &vanity, &profile).await?;
    let followed_by_viewer = match viewer.as_deref() {
        Some(viewer) if viewer != vanity => {
            state
                .graph
                .relation_exists(viewer, RelationKind::Subscriber, &vanity)
                .await?
        }
        _ => false,
    };
    let posts = if access_post {
        state
            .graph
            .user_posts(&vanity, page.skip.unwrap_or(0))
            .await?
    } else {
        Vec::new()
    };

    Ok(Json(UserResponse {
        followers: profile.followers,
        following: profile.following,
        public: profile.public,
        suspended: profile.suspended,
        access_post,
        followed_by_viewer,
        posts,
    }))
}

/// `PATCH /users/@me`
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Viewer(vanity): Viewer,
    body: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<Envelope>, ApiError> {
    if id != ME {
        return Err(ApiError::InvalidUser);
    }
    let Json(body) = body?;

    if let Some(public) = body.public {
        if !state.graph.set_public(&vanity, public).await? {
            return Err(ApiError::InvalidUser);
        }
    }
    Ok(Json(Envelope::ok("OK")))
}

/// `DELETE /users/@me` with a token, or `DELETE /users/{vanity}` with the
/// global key.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    caller: Caller,
) -> Result<Json<Envelope>, ApiError> {
    let vanity = match (id.as_str(), caller) {
        (ME, Caller::User(vanity)) => vanity,
        (ME, _) => return Err(ApiError::InvalidToken),
        (_, Caller::Admin) => id.clone(),
        _ => return Err(ApiError::InvalidToken),
    };

    if state.graph.profile(&vanity).await?.is_none() {
        return Err(ApiError::InvalidUser);
    }
    let hashes = state.graph.delete_user(&vanity).await?;
    state
        .cache
        .set(&deletion_key(&vanity), "ok", DELETION_COOLDOWN)
        .await?;
    info!("Deleted account {} ({} images)", vanity, hashes.len());

    spawn_image_cleanup(&state, hashes);
    let search = state.search.clone();
    tokio::spawn(async move {
        if let Err(e) = search.remove_user(&vanity).await {
            warn!("Failed to remove {} from search: {}", vanity, e);
        }
    });

    Ok(Json(Envelope::ok("OK")))
}
