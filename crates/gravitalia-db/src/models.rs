/// Input for `GraphRepo::create_post`.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub id: String,
    pub author: String,
    pub description: String,
    pub text: String,
    pub hash: Vec<String>,
    pub tag: String,
}

/// A top-level comment on a post.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub id: String,
    pub post_id: String,
    pub author: String,
    pub text: String,
    pub timestamp: i64,
}

/// A reply. Replies hang off the top-level comment of their thread
/// (`root`) while remembering whose comment they answered.
#[derive(Debug, Clone)]
pub struct NewReply {
    pub id: String,
    pub root: String,
    pub answered: String,
    pub author: String,
    pub text: String,
    pub timestamp: i64,
}
