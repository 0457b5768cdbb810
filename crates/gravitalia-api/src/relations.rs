use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
};
use tracing::debug;

use gravitalia_types::api::{Envelope, ExistsQuery, RelationRequest, ResolveRequestBody};
use gravitalia_types::events::{Notification, NotificationKind};
use gravitalia_types::relation::{ListKind, RelationKind, Toggle};

use crate::error::ApiError;
use crate::middleware::Viewer;
use crate::state::AppState;
use crate::visibility::can_view;

pub const CREATED_RELATION: &str = "Created relation";
pub const DELETED_RELATION: &str = "Deleted relation";
pub const ADDED_REQUEST: &str = "Request added";

fn toggled(outcome: Toggle) -> Envelope {
    match outcome {
        Toggle::Created => Envelope::ok(CREATED_RELATION),
        Toggle::Deleted => Envelope::ok(DELETED_RELATION),
    }
}

/// `POST /relation/{kind}` with `{"id": target}`.
pub async fn toggle_relation(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Viewer(vanity): Viewer,
    body: Result<Json<RelationRequest>, JsonRejection>,
) -> Result<Json<Envelope>, ApiError> {
    let kind: RelationKind = kind.parse().map_err(|_| ApiError::InvalidRelation)?;
    if !kind.is_toggleable() {
        return Err(ApiError::InvalidRelation);
    }

    let Json(body) = body?;
    let target = body.id.trim();
    if target.is_empty() || target == vanity {
        return Err(ApiError::InvalidBody);
    }

    let envelope = match kind {
        RelationKind::Subscriber => subscribe(&state, &vanity, target).await?,
        RelationKind::Block => {
            let outcome = state
                .graph
                .toggle_block(&vanity, target)
                .await?
                .ok_or(ApiError::InvalidUser)?;
            toggled(outcome)
        }
        RelationKind::Like | RelationKind::View => {
            let author = state
                .graph
                .post_author(target)
                .await?
                .ok_or(ApiError::InvalidPost)?;
            if !can_view(state.graph.as_ref(), Some(&vanity), &author).await? {
                return Err(ApiError::NoPostAccess);
            }
            let outcome = state
                .graph
                .toggle_relation(&vanity, kind, target)
                .await?
                .ok_or(ApiError::InvalidPost)?;

            if kind == RelationKind::Like && outcome == Toggle::Created && author != vanity {
                state.dispatcher.publish(
                    &author,
                    Notification {
                        kind: NotificationKind::PostLike,
                        from: vanity.clone(),
                        to: target.to_string(),
                        important: true,
                    },
                );
            }
            toggled(outcome)
        }
        RelationKind::Love => {
            let post = state
                .graph
                .comment_post(target)
                .await?
                .ok_or(ApiError::InvalidComment)?;
            let author = state
                .graph
                .post_author(&post)
                .await?
                .ok_or(ApiError::InvalidPost)?;
            if !can_view(state.graph.as_ref(), Some(&vanity), &author).await? {
                return Err(ApiError::NoPostAccess);
            }
            let outcome = state
                .graph
                .toggle_relation(&vanity, kind, target)
                .await?
                .ok_or(ApiError::InvalidComment)?;
            toggled(outcome)
        }
        RelationKind::Request => return Err(ApiError::InvalidRelation),
    };

    debug!("{} toggled {} on {}: {}", vanity, kind, target, envelope.message);
    Ok(Json(envelope))
}

/// Subscribing to a private account files a request instead.
async fn subscribe(state: &AppState, vanity: &str, target: &str) -> Result<Envelope, ApiError> {
    if state.graph.blocked_between(vanity, target).await? {
        return Err(ApiError::Blocked);
    }
    let profile = state
        .graph
        .profile(target)
        .await?
        .ok_or(ApiError::InvalidUser)?;
    if profile.suspended {
        return Err(ApiError::InvalidUser);
    }

    let already_subscribed = state
        .graph
        .relation_exists(vanity, RelationKind::Subscriber, target)
        .await?;
    if profile.public || already_subscribed {
        let outcome = state
            .graph
            .toggle_relation(vanity, RelationKind::Subscriber, target)
            .await?
            .ok_or(ApiError::InvalidUser)?;
        return Ok(toggled(outcome));
    }

    let outcome = state
        .graph
        .toggle_relation(vanity, RelationKind::Request, target)
        .await?
        .ok_or(ApiError::InvalidUser)?;
    match outcome {
        Toggle::Created => {
            state.dispatcher.publish(
                target,
                Notification {
                    kind: NotificationKind::RequestSubscription,
                    from: vanity.to_string(),
                    to: target.to_string(),
                    important: true,
                },
            );
            Ok(Envelope::ok(ADDED_REQUEST))
        }
        Toggle::Deleted => Ok(Envelope::ok(DELETED_RELATION)),
    }
}

/// `GET /relation/{kind}?target=`: message is `"true"` or `"false"`.
pub async fn relation_exists(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Viewer(vanity): Viewer,
    Query(query): Query<ExistsQuery>,
) -> Result<Json<Envelope>, ApiError> {
    let kind: RelationKind = kind.parse().map_err(|_| ApiError::InvalidRelation)?;
    let target = query
        .target
        .filter(|t| !t.trim().is_empty())
        .ok_or(ApiError::InvalidQuery)?;

    let exists = state.graph.relation_exists(&vanity, kind, target.trim()).await?;
    Ok(Json(Envelope::ok(exists.to_string())))
}

/// `POST /requests/{vanity}` with `{"accept": bool}`, called by the
/// private account that received the request.
pub async fn resolve_request(
    State(state): State<AppState>,
    Path(requester): Path<String>,
    Viewer(vanity): Viewer,
    body: Result<Json<ResolveRequestBody>, JsonRejection>,
) -> Result<Json<Envelope>, ApiError> {
    let Json(body) = body?;
    if requester == vanity {
        return Err(ApiError::InvalidBody);
    }

    if !state
        .graph
        .resolve_request(&requester, &vanity, body.accept)
        .await?
    {
        return Err(ApiError::InvalidRelation);
    }

    if body.accept {
        state.dispatcher.publish(
            &requester,
            Notification {
                kind: NotificationKind::SubscriptionAccepted,
                from: vanity.clone(),
                to: requester.clone(),
                important: false,
            },
        );
        Ok(Json(Envelope::ok(CREATED_RELATION)))
    } else {
        Ok(Json(Envelope::ok(DELETED_RELATION)))
    }
}

/// `GET /list/{subscriber|subscription|block|request}`.
pub async fn list(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Viewer(vanity): Viewer,
) -> Result<Json<Vec<String>>, ApiError> {
    let kind: ListKind = kind.parse().map_err(|_| ApiError::InvalidList)?;
    Ok(Json(state.graph.relation_list(&vanity, kind).await?))
}
