use serde::{Deserialize, Serialize};

/// Counters and flags shown on a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub followers: i64,
    pub following: i64,
    pub public: bool,
    pub suspended: bool,
}

/// A post as listed on a profile page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    pub id: String,
    pub description: String,
    pub text: String,
    pub hash: Vec<String>,
    pub like: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentView {
    pub id: String,
    pub text: String,
    pub timestamp: i64,
    pub user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replied_to: Option<String>,
    pub love: i64,
    pub me_loved: bool,
}

/// Full post as returned by `GET /posts/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDetail {
    pub id: String,
    pub description: String,
    pub text: String,
    pub hash: Vec<String>,
    pub like: i64,
    pub author: String,
    pub me_liked: bool,
    pub comments: Vec<CommentView>,
}

/// A post proposed by one of the feed generators, before ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub description: String,
    pub text: String,
    pub tag: String,
}

/// A ranked feed entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedPost {
    pub id: String,
    pub description: String,
    pub author: String,
    pub hash: Vec<String>,
    pub like: i64,
    pub me_liked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedPost {
    pub id: String,
    pub description: String,
    pub text: String,
    pub hash: Vec<String>,
    pub tag: Option<String>,
    pub likes: i64,
    /// `Create` or `Like`.
    pub relation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedComment {
    pub id: String,
    pub text: String,
    pub timestamp: i64,
}

/// Everything stored about a user, for the data export route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserExport {
    pub vanity: String,
    pub community: Option<i64>,
    pub rank: Option<f64>,
    pub public: bool,
    pub suspended: bool,
    pub posts: Vec<ExportedPost>,
    pub comments: Vec<ExportedComment>,
}
