use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
};
use chrono::Utc;
use tracing::debug;

use gravitalia_db::{NewComment, NewReply};
use gravitalia_types::api::{CommentQuery, Envelope, NewCommentRequest};
use gravitalia_types::models::CommentView;

use crate::error::ApiError;
use crate::middleware::{MaybeViewer, Viewer};
use crate::state::AppState;
use crate::visibility::can_view;

pub const MAX_COMMENT_LEN: usize = 500;

async fn ensure_visible(state: &AppState, post_id: &str, viewer: Option<&str>) -> Result<(), ApiError> {
    let author = state
        .graph
        .post_author(post_id)
        .await?
        .ok_or(ApiError::InvalidPost)?;
    if !can_view(state.graph.as_ref(), viewer, &author).await? {
        return Err(ApiError::NoPostAccess);
    }
    Ok(())
}

/// `GET /comment/{post_id}?skip=&reply=`
pub async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    MaybeViewer(viewer): MaybeViewer,
    Query(query): Query<CommentQuery>,
) -> Result<Json<Vec<CommentView>>, ApiError> {
    ensure_visible(&state, &post_id, viewer.as_deref()).await?;
    let skip = query.skip.unwrap_or(0);

    let comments = match query.reply.as_deref().filter(|r| !r.is_empty()) {
        Some(comment_id) => {
            state
                .graph
                .replies(&post_id, comment_id, skip, viewer.as_deref())
                .await?
        }
        None => {
            state
                .graph
                .comments(&post_id, skip, viewer.as_deref())
                .await?
        }
    };
    Ok(Json(comments))
}

/// `POST /comment/{post_id}` with `{"content": .., "reply_to": ..}`.
///
/// A reply always hangs off the top-level comment of its thread, even
/// when it answers another reply.
pub async fn add_comment(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Viewer(vanity): Viewer,
    body: Result<Json<NewCommentRequest>, JsonRejection>,
) -> Result<Json<Envelope>, ApiError> {
    let Json(req) = body?;
    let text = req.content.trim();
    if text.is_empty() || text.chars().count() > MAX_COMMENT_LEN {
        return Err(ApiError::InvalidBody);
    }
    ensure_visible(&state, &post_id, Some(&vanity)).await?;

    let id = state.ids.next_id();
    let timestamp = Utc::now().timestamp();

    let added = match req.reply_to.filter(|r| !r.is_empty()) {
        Some(answered) => {
            let thread_post = state.graph.comment_post(&answered).await?;
            if thread_post.as_deref() != Some(post_id.as_str()) {
                return Err(ApiError::InvalidComment);
            }
            let root = state
                .graph
                .comment_root(&answered)
                .await?
                .unwrap_or_else(|| answered.clone());
            state
                .graph
                .add_reply(NewReply {
                    id: id.clone(),
                    root,
                    answered,
                    author: vanity.clone(),
                    text: text.to_string(),
                    timestamp,
                })
                .await?
        }
        None => {
            state
                .graph
                .add_comment(NewComment {
                    id: id.clone(),
                    post_id: post_id.clone(),
                    author: vanity.clone(),
                    text: text.to_string(),
                    timestamp,
                })
                .await?
        }
    };
    if !added {
        return Err(ApiError::InvalidComment);
    }

    debug!("{} commented {} on {}", vanity, id, post_id);
    Ok(Json(Envelope::ok(id)))
}

/// `DELETE /comment/{id}`, author only. Replies go with it.
pub async fn delete_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Viewer(vanity): Viewer,
) -> Result<Json<Envelope>, ApiError> {
    if !state.graph.delete_comment(&id, &vanity).await? {
        return Err(ApiError::InvalidComment);
    }
    Ok(Json(Envelope::ok("Deleted comment")))
}
