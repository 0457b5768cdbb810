//! The "for you" feed: three candidate generators merged in a fixed
//! order, then re-ranked by similarity with the viewer's recent likes.

use std::collections::HashSet;

use axum::{Json, extract::State};
use tracing::debug;

use gravitalia_db::GraphRepo;
use gravitalia_types::models::{Candidate, FeedPost};

use crate::error::{ApiError, FeedError};
use crate::middleware::Viewer;
use crate::state::AppState;

/// Keeps the first occurrence of every key, preserving order.
pub fn dedupe_by<T, F>(items: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(key(item).to_string()))
        .collect()
}

pub async fn assemble_feed(graph: &dyn GraphRepo, viewer: &str) -> Result<Vec<FeedPost>, FeedError> {
    let (affinity, following, community) = tokio::try_join!(
        async { graph.affinity_candidates(viewer).await.map_err(FeedError::Affinity) },
        async { graph.following_candidates(viewer).await.map_err(FeedError::Following) },
        async { graph.community_candidates(viewer).await.map_err(FeedError::Community) },
    )?;

    let merged: Vec<Candidate> = affinity.into_iter().chain(following).chain(community).collect();
    let pool: Vec<String> = dedupe_by(merged, |c| c.id.as_str())
        .into_iter()
        .map(|c| c.id)
        .collect();
    if pool.is_empty() {
        return Ok(Vec::new());
    }

    let ranked = graph
        .rank_candidates(viewer, &pool)
        .await
        .map_err(FeedError::Ranking)?;
    debug!("Feed for {}: {} candidates, {} ranked", viewer, pool.len(), ranked.len());
    Ok(dedupe_by(ranked, |p| p.id.as_str()))
}

/// `GET /recommendation/for_you_feed`
pub async fn for_you_feed(
    State(state): State<AppState>,
    Viewer(vanity): Viewer,
) -> Result<Json<Vec<FeedPost>>, ApiError> {
    Ok(Json(assemble_feed(state.graph.as_ref(), &vanity).await?))
}

/// `GET /recommendation/most_liked`
pub async fn most_liked(State(state): State<AppState>) -> Result<Json<Vec<FeedPost>>, ApiError> {
    Ok(Json(state.graph.most_liked().await?))
}
