pub mod cache;
pub mod error;
pub mod memgraph;
pub mod memory;
pub mod models;

use async_trait::async_trait;
use gravitalia_types::models::{
    Candidate, CommentView, FeedPost, PostDetail, PostSummary, Profile, UserExport,
};
use gravitalia_types::relation::{ListKind, RelationKind, Toggle};

pub use cache::{Cache, CacheError, MemoryCache, RedisCache};
pub use error::{DbError, Result};
pub use memgraph::Memgraph;
pub use memory::MemoryGraph;
pub use models::{NewComment, NewPost, NewReply};

/// Posts per profile page.
pub const POSTS_PER_PAGE: u32 = 12;
/// Comments (or replies) per page.
pub const COMMENTS_PER_PAGE: u32 = 20;
/// Posts kept by the similarity ranking.
pub const RANKED_LIMIT: usize = 15;
/// How many recent likes seed the similarity ranking.
pub const RECENT_LIKES: usize = 10;

/// Access to the social graph.
///
/// Absent rows are reported as `None`, `false` or an empty list; only
/// driver failures and undecodable rows are errors.
#[async_trait]
pub trait GraphRepo: Send + Sync {
    // -- Users --

    /// Creates the user if missing. Returns whether a node was created.
    async fn create_user(&self, vanity: &str) -> Result<bool>;
    async fn profile(&self, vanity: &str) -> Result<Option<Profile>>;
    async fn set_public(&self, vanity: &str, public: bool) -> Result<bool>;
    async fn set_suspended(&self, vanity: &str, suspended: bool) -> Result<bool>;
    /// Removes the user, their posts with every comment under them, and
    /// their own comments. Returns the image hashes of the removed posts.
    async fn delete_user(&self, vanity: &str) -> Result<Vec<String>>;
    async fn user_posts(&self, vanity: &str, skip: u32) -> Result<Vec<PostSummary>>;
    async fn relation_list(&self, vanity: &str, kind: ListKind) -> Result<Vec<String>>;
    async fn export_user(&self, vanity: &str) -> Result<Option<UserExport>>;

    // -- Relations --

    async fn relation_exists(&self, actor: &str, kind: RelationKind, target: &str) -> Result<bool>;
    /// `None` when the actor or the target does not exist.
    async fn toggle_relation(
        &self,
        actor: &str,
        kind: RelationKind,
        target: &str,
    ) -> Result<Option<Toggle>>;
    /// Drops Subscriber and Request edges between the pair in both
    /// directions, then toggles the Block edge, in one transaction.
    async fn toggle_block(&self, actor: &str, target: &str) -> Result<Option<Toggle>>;
    /// Whether a Block edge exists in either direction.
    async fn blocked_between(&self, a: &str, b: &str) -> Result<bool>;
    /// Removes the pending request and, when accepted, creates the
    /// Subscriber edge. Returns `false` if no request was pending.
    async fn resolve_request(&self, requester: &str, target: &str, accept: bool) -> Result<bool>;

    // -- Posts --

    async fn create_post(&self, post: NewPost) -> Result<bool>;
    async fn post(&self, id: &str, viewer: Option<&str>) -> Result<Option<PostDetail>>;
    async fn post_author(&self, id: &str) -> Result<Option<String>>;
    /// `None` when the post does not exist or is not owned by `author`.
    async fn delete_post(&self, id: &str, author: &str) -> Result<Option<Vec<String>>>;

    // -- Comments --

    async fn comment_post(&self, comment_id: &str) -> Result<Option<String>>;
    async fn comment_root(&self, comment_id: &str) -> Result<Option<String>>;
    async fn add_comment(&self, comment: NewComment) -> Result<bool>;
    async fn add_reply(&self, reply: NewReply) -> Result<bool>;
    async fn delete_comment(&self, id: &str, author: &str) -> Result<bool>;
    async fn comments(
        &self,
        post_id: &str,
        skip: u32,
        viewer: Option<&str>,
    ) -> Result<Vec<CommentView>>;
    async fn replies(
        &self,
        post_id: &str,
        comment_id: &str,
        skip: u32,
        viewer: Option<&str>,
    ) -> Result<Vec<CommentView>>;

    // -- Feed --

    async fn following_candidates(&self, viewer: &str) -> Result<Vec<Candidate>>;
    async fn community_candidates(&self, viewer: &str) -> Result<Vec<Candidate>>;
    async fn affinity_candidates(&self, viewer: &str) -> Result<Vec<Candidate>>;
    async fn rank_candidates(&self, viewer: &str, pool: &[String]) -> Result<Vec<FeedPost>>;
    async fn most_liked(&self) -> Result<Vec<FeedPost>>;

    // -- Ranking --

    async fn refresh_page_rank(&self) -> Result<()>;
    async fn refresh_communities(&self) -> Result<()>;
}
