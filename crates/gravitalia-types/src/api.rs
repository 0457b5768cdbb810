use serde::{Deserialize, Serialize};

use crate::models::PostSummary;

// -- JWT Claims --

/// Claims carried by the access tokens the OAuth provider issues. The
/// subject is the caller's vanity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

// -- Envelope --

/// Every non-payload response: `{"error": bool, "message": string}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub error: bool,
    pub message: String,
}

impl Envelope {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            error: false,
            message: message.into(),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: message.into(),
        }
    }
}

// -- Relations --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelationRequest {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct ExistsQuery {
    pub target: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolveRequestBody {
    pub accept: bool,
}

// -- Users --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserRequest {
    pub public: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub followers: i64,
    pub following: i64,
    pub public: bool,
    pub suspended: bool,
    pub access_post: bool,
    pub followed_by_viewer: bool,
    pub posts: Vec<PostSummary>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub skip: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SuspendQuery {
    pub vanity: Option<String>,
    pub suspend: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DataQuery {
    pub vanity: Option<String>,
}

// -- Posts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewPostRequest {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub text: String,
    /// Base64-encoded image bytes.
    #[serde(default)]
    pub images: Vec<String>,
}

// -- Comments --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewCommentRequest {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub reply_to: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentQuery {
    pub skip: Option<u32>,
    pub reply: Option<String>,
}

// -- Gateway --

#[derive(Debug, Default, Deserialize)]
pub struct GatewayQuery {
    pub token: Option<String>,
}

// -- OAuth --

#[derive(Debug, Default, Deserialize)]
pub struct OAuthCallbackQuery {
    pub state: Option<String>,
    pub code: Option<String>,
}

/// User returned by the OAuth provider's `/users/@me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthUser {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub vanity: String,
    #[serde(default)]
    pub flags: u32,
}
