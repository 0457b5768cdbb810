use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{debug, error};

use gravitalia_db::{CacheError, DbError};
use gravitalia_types::api::Envelope;

use crate::upstream::UpstreamError;

/// A candidate generator failed. The feed is never served partially.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("cannot get latest liked posts")]
    Affinity(#[source] DbError),
    #[error("cannot get last following posts")]
    Following(#[source] DbError),
    #[error("cannot get last community posts")]
    Community(#[source] DbError),
    #[error("cannot rank posts")]
    Ranking(#[source] DbError),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Invalid body")]
    InvalidBody,
    #[error("Invalid relation")]
    InvalidRelation,
    #[error("Invalid query")]
    InvalidQuery,
    #[error("Invalid list")]
    InvalidList,
    #[error("Invalid user")]
    InvalidUser,
    /// Same message as `InvalidUser`; a block is not disclosed.
    #[error("Invalid user")]
    Blocked,
    #[error("Invalid post")]
    InvalidPost,
    #[error("Invalid comment")]
    InvalidComment,
    #[error("No access to this post")]
    NoPostAccess,
    #[error("Maximum images exceeded")]
    TooManyImages,
    #[error("Content does not comply with our rules")]
    ProhibitedContent,
    #[error("Invalid code")]
    InvalidCode,
    #[error("{0}")]
    Cooldown(&'static str),
    #[error("{0}")]
    RateLimited(&'static str),
    #[error("{0}")]
    Feed(#[from] FeedError),
    #[error("Couldn't get database reponse")]
    Database(#[from] DbError),
    #[error("Internal server error")]
    Cache(#[from] CacheError),
    #[error("Error occurs when uploading content")]
    Upload(#[source] UpstreamError),
    #[error("Internal server error")]
    Upstream(#[from] UpstreamError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::InvalidBody
            | Self::InvalidRelation
            | Self::InvalidQuery
            | Self::InvalidList
            | Self::TooManyImages
            | Self::ProhibitedContent
            | Self::InvalidCode
            | Self::Cooldown(_) => StatusCode::BAD_REQUEST,
            Self::InvalidUser | Self::InvalidPost | Self::InvalidComment => StatusCode::NOT_FOUND,
            Self::Blocked => StatusCode::CONFLICT,
            Self::NoPostAccess => StatusCode::FORBIDDEN,
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Feed(_)
            | Self::Database(_)
            | Self::Cache(_)
            | Self::Upload(_)
            | Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!("Rejected body: {}", rejection.body_text());
        Self::InvalidBody
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Feed(FeedError::Affinity(e))
            | Self::Feed(FeedError::Following(e))
            | Self::Feed(FeedError::Community(e))
            | Self::Feed(FeedError::Ranking(e)) => error!("{}: {}", self, e),
            Self::Database(e) => error!("Database error: {}", e),
            Self::Cache(e) => error!("Cache error: {}", e),
            Self::Upload(e) | Self::Upstream(e) => error!("Upstream error: {}", e),
            _ => {}
        }

        (self.status(), Json(Envelope::err(self.to_string()))).into_response()
    }
}
