use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use futures_util::future::{join_all, try_join_all};
use tracing::{info, warn};

use gravitalia_db::NewPost;
use gravitalia_types::api::{Envelope, NewPostRequest};
use gravitalia_types::models::PostDetail;

use crate::error::ApiError;
use crate::middleware::{MaybeViewer, Viewer};
use crate::state::AppState;
use crate::upstream::ImageModel;
use crate::visibility::can_view;

pub const MAX_IMAGES: usize = 5;
const NUDE: &str = "nude";

/// Deletes images in the background. Failures are only logged.
pub fn spawn_image_cleanup(state: &AppState, hashes: Vec<String>) {
    for hash in hashes {
        let media = state.media.clone();
        tokio::spawn(async move {
            if let Err(e) = media.delete(&hash).await {
                warn!("Failed to delete image {}: {}", hash, e);
            }
        });
    }
}

/// `POST /posts/new`
pub async fn create_post(
    State(state): State<AppState>,
    Viewer(vanity): Viewer,
    body: Result<Json<NewPostRequest>, JsonRejection>,
) -> Result<Json<Envelope>, ApiError> {
    let Json(req) = body?;
    if req.images.is_empty() {
        return Err(ApiError::InvalidBody);
    }
    if req.images.len() > MAX_IMAGES {
        return Err(ApiError::TooManyImages);
    }
    let images = req
        .images
        .iter()
        .map(|image| STANDARD.decode(image).map(Bytes::from))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ApiError::InvalidBody)?;

    // Every image is checked for nudity, the first one is also tagged.
    let verdicts = try_join_all(
        images
            .iter()
            .map(|image| state.media.classify(ImageModel::Nudity, image.clone())),
    );
    let tag = state.media.classify(ImageModel::Tags, images[0].clone());
    let (tag, verdicts) = tokio::try_join!(tag, verdicts)?;
    if verdicts.iter().any(|verdict| verdict == NUDE) {
        return Err(ApiError::ProhibitedContent);
    }

    // Every upload is awaited so the ones that landed can be removed if
    // another failed.
    let uploads = join_all(images.into_iter().map(|image| state.media.upload(image))).await;
    let mut hash = Vec::with_capacity(uploads.len());
    let mut failure = None;
    for upload in uploads {
        match upload {
            Ok(h) => hash.push(h),
            Err(e) => {
                failure.get_or_insert(e);
            }
        }
    }
    if let Some(e) = failure {
        spawn_image_cleanup(&state, hash);
        return Err(ApiError::Upload(e));
    }

    let id = state.ids.next_id();
    let created = state
        .graph
        .create_post(NewPost {
            id: id.clone(),
            author: vanity.clone(),
            description: req.description,
            text: req.text,
            hash: hash.clone(),
            tag,
        })
        .await?;
    if !created {
        spawn_image_cleanup(&state, hash);
        return Err(ApiError::InvalidUser);
    }

    info!("{} created post {}", vanity, id);
    Ok(Json(Envelope::ok(id)))
}

/// `GET /posts/{id}`
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    MaybeViewer(viewer): MaybeViewer,
) -> Result<Json<PostDetail>, ApiError> {
    let author = state
        .graph
        .post_author(&id)
        .await?
        .ok_or(ApiError::InvalidPost)?;
    if !can_view(state.graph.as_ref(), viewer.as_deref(), &author).await? {
        return Err(ApiError::NoPostAccess);
    }

    let post = state
        .graph
        .post(&id, viewer.as_deref())
        .await?
        .ok_or(ApiError::InvalidPost)?;
    Ok(Json(post))
}

/// `DELETE /posts/{id}`, author only.
pub async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Viewer(vanity): Viewer,
) -> Result<Json<Envelope>, ApiError> {
    let hashes = state
        .graph
        .delete_post(&id, &vanity)
        .await?
        .ok_or(ApiError::InvalidPost)?;

    info!("{} deleted post {}", vanity, id);
    spawn_image_cleanup(&state, hashes);
    Ok(Json(Envelope::ok("OK")))
}
