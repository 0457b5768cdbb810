//! In-process [`GraphRepo`] used by tests and `GRAPH_URL=memory`.
//!
//! Mirrors the Cypher queries of [`crate::Memgraph`]: same filters, same
//! ordering, same page sizes. Structural edges (Create, Show, Comment,
//! Reply, Wrote) live on the nodes; user relations live in one edge set.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use gravitalia_types::models::{
    Candidate, CommentView, ExportedComment, ExportedPost, FeedPost, PostDetail, PostSummary,
    Profile, UserExport,
};
use gravitalia_types::relation::{ListKind, RelationKind, TargetLabel, Toggle};

use crate::error::{DbError, Result};
use crate::models::{NewComment, NewPost, NewReply};
use crate::{COMMENTS_PER_PAGE, GraphRepo, POSTS_PER_PAGE, RANKED_LIMIT, RECENT_LIKES};

const PAGE_RANK_DAMPING: f64 = 0.85;
const PAGE_RANK_ITERATIONS: usize = 20;

#[derive(Debug, Clone)]
struct UserNode {
    public: bool,
    suspended: bool,
    community: Option<i64>,
    rank: Option<f64>,
}

#[derive(Debug, Clone)]
struct PostNode {
    author: String,
    description: String,
    text: String,
    hash: Vec<String>,
    tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Thread {
    /// Top-level comment on a post.
    Post(String),
    /// Reply attached to a top-level comment.
    Reply(String),
}

#[derive(Debug, Clone)]
struct CommentNode {
    author: String,
    text: String,
    timestamp: i64,
    thread: Thread,
    replied_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Edge {
    from: String,
    kind: RelationKind,
    to: String,
}

impl Edge {
    fn new(from: &str, kind: RelationKind, to: &str) -> Self {
        Self {
            from: from.to_string(),
            kind,
            to: to.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum NodeKey {
    User(String),
    Post(String),
    Comment(String),
}

/// Snowflake ids are decimal strings without leading zeros, so a longer
/// id is a larger one. Matches `toInteger(id)` ordering in Cypher.
fn id_cmp(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[derive(Default)]
struct State {
    users: HashMap<String, UserNode>,
    posts: HashMap<String, PostNode>,
    comments: HashMap<String, CommentNode>,
    edges: HashSet<Edge>,
}

impl State {
    fn has(&self, from: &str, kind: RelationKind, to: &str) -> bool {
        self.edges.contains(&Edge::new(from, kind, to))
    }

    fn target_exists(&self, label: TargetLabel, id: &str) -> bool {
        match label {
            TargetLabel::User => self.users.contains_key(id),
            TargetLabel::Post => self.posts.contains_key(id),
            TargetLabel::Comment => self.comments.contains_key(id),
        }
    }

    fn incoming(&self, kind: RelationKind, to: &str) -> impl Iterator<Item = &str> {
        self.edges
            .iter()
            .filter(move |e| e.kind == kind && e.to == to)
            .map(|e| e.from.as_str())
    }

    fn outgoing(&self, from: &str, kind: RelationKind) -> impl Iterator<Item = &str> {
        self.edges
            .iter()
            .filter(move |e| e.kind == kind && e.from == from)
            .map(|e| e.to.as_str())
    }

    fn count_incoming(&self, kind: RelationKind, to: &str) -> i64 {
        self.incoming(kind, to).count() as i64
    }

    fn drop_edges_to(&mut self, label: TargetLabel, id: &str) {
        self.edges.retain(|e| !(e.kind.target() == label && e.to == id));
    }

    fn remove_comment(&mut self, id: &str) {
        let replies: Vec<String> = self
            .comments
            .iter()
            .filter(|(_, c)| c.thread == Thread::Reply(id.to_string()))
            .map(|(reply, _)| reply.clone())
            .collect();
        for reply in replies {
            self.comments.remove(&reply);
            self.drop_edges_to(TargetLabel::Comment, &reply);
        }
        self.comments.remove(id);
        self.drop_edges_to(TargetLabel::Comment, id);
    }

    fn remove_post(&mut self, id: &str) -> Vec<String> {
        let top_level: Vec<String> = self
            .comments
            .iter()
            .filter(|(_, c)| c.thread == Thread::Post(id.to_string()))
            .map(|(comment, _)| comment.clone())
            .collect();
        for comment in top_level {
            self.remove_comment(&comment);
        }
        self.drop_edges_to(TargetLabel::Post, id);
        self.posts.remove(id).map(|p| p.hash).unwrap_or_default()
    }

    fn toggle(&mut self, actor: &str, kind: RelationKind, target: &str) -> Option<Toggle> {
        if !self.users.contains_key(actor) || !self.target_exists(kind.target(), target) {
            return None;
        }
        let edge = Edge::new(actor, kind, target);
        if self.edges.remove(&edge) {
            Some(Toggle::Deleted)
        } else {
            self.edges.insert(edge);
            Some(Toggle::Created)
        }
    }

    fn candidate(&self, id: &str) -> Option<Candidate> {
        self.posts.get(id).map(|p| Candidate {
            id: id.to_string(),
            description: p.description.clone(),
            text: p.text.clone(),
            tag: p.tag.clone().unwrap_or_default(),
        })
    }

    fn feed_post(&self, id: &str, viewer: Option<&str>) -> Option<FeedPost> {
        self.posts.get(id).map(|p| FeedPost {
            id: id.to_string(),
            description: p.description.clone(),
            author: p.author.clone(),
            hash: p.hash.clone(),
            like: self.count_incoming(RelationKind::Like, id),
            me_liked: viewer.is_some_and(|v| self.has(v, RelationKind::Like, id)),
        })
    }

    fn unviewed(&self, viewer: &str, post: &str) -> bool {
        !self.has(viewer, RelationKind::View, post)
    }

    /// Whether `viewer` may see posts by `author`.
    fn visible(&self, viewer: &str, author: &str) -> bool {
        let Some(user) = self.users.get(author) else {
            return false;
        };
        if user.suspended {
            return false;
        }
        if viewer == author {
            return true;
        }
        if self.has(viewer, RelationKind::Block, author) || self.has(author, RelationKind::Block, viewer) {
            return false;
        }
        user.public || self.has(viewer, RelationKind::Subscriber, author)
    }

    /// Feed eligibility: not yet viewed, and visible.
    fn eligible(&self, viewer: &str, post: &str) -> bool {
        self.posts
            .get(post)
            .is_some_and(|p| self.unviewed(viewer, post) && self.visible(viewer, &p.author))
    }

    fn candidates(&self, mut ids: Vec<String>, limit: usize) -> Vec<Candidate> {
        ids.sort_by(|a, b| id_cmp(b, a));
        ids.truncate(limit);
        ids.iter().filter_map(|id| self.candidate(id)).collect()
    }

    fn comment_page(
        &self,
        thread: &Thread,
        skip: u32,
        viewer: Option<&str>,
    ) -> Vec<CommentView> {
        let mut page: Vec<(&String, &CommentNode)> = self
            .comments
            .iter()
            .filter(|(_, c)| &c.thread == thread && self.users.contains_key(&c.author))
            .collect();
        page.sort_by(|(a_id, a), (b_id, b)| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| id_cmp(a_id, b_id))
        });
        page.into_iter()
            .skip(skip as usize)
            .take(COMMENTS_PER_PAGE as usize)
            .map(|(id, c)| CommentView {
                id: id.clone(),
                text: c.text.clone(),
                timestamp: c.timestamp,
                user: c.author.clone(),
                replied_to: c.replied_to.clone(),
                love: self.count_incoming(RelationKind::Love, id),
                me_loved: viewer.is_some_and(|v| self.has(v, RelationKind::Love, id)),
            })
            .collect()
    }

    fn likers(&self, post: &str) -> HashSet<&str> {
        self.incoming(RelationKind::Like, post).collect()
    }
}

fn jaccard(a: &HashSet<&str>, b: &HashSet<&str>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

#[derive(Default)]
pub struct MemoryGraph {
    state: Mutex<State>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut State) -> T,
    {
        let mut state = self.state.lock().map_err(|_| DbError::Poisoned)?;
        Ok(f(&mut state))
    }

    /// Assigns a community id directly, bypassing the ranking job.
    pub fn set_community(&self, vanity: &str, community: i64) -> Result<bool> {
        self.with_state(|s| match s.users.get_mut(vanity) {
            Some(user) => {
                user.community = Some(community);
                true
            }
            None => false,
        })
    }

    pub fn community(&self, vanity: &str) -> Result<Option<i64>> {
        self.with_state(|s| s.users.get(vanity).and_then(|u| u.community))
    }

    pub fn rank(&self, vanity: &str) -> Result<Option<f64>> {
        self.with_state(|s| s.users.get(vanity).and_then(|u| u.rank))
    }
}

#[async_trait]
impl GraphRepo for MemoryGraph {
    async fn create_user(&self, vanity: &str) -> Result<bool> {
        self.with_state(|s| {
            if s.users.contains_key(vanity) {
                return false;
            }
            s.users.insert(
                vanity.to_string(),
                UserNode {
                    public: true,
                    suspended: false,
                    community: None,
                    rank: None,
                },
            );
            true
        })
    }

    async fn profile(&self, vanity: &str) -> Result<Option<Profile>> {
        self.with_state(|s| {
            let user = s.users.get(vanity)?;
            Some(Profile {
                followers: s.count_incoming(RelationKind::Subscriber, vanity),
                following: s.outgoing(vanity, RelationKind::Subscriber).count() as i64,
                public: user.public,
                suspended: user.suspended,
            })
        })
    }

    async fn set_public(&self, vanity: &str, public: bool) -> Result<bool> {
        self.with_state(|s| match s.users.get_mut(vanity) {
            Some(user) => {
                user.public = public;
                true
            }
            None => false,
        })
    }

    async fn set_suspended(&self, vanity: &str, suspended: bool) -> Result<bool> {
        self.with_state(|s| match s.users.get_mut(vanity) {
            Some(user) => {
                user.suspended = suspended;
                true
            }
            None => false,
        })
    }

    async fn delete_user(&self, vanity: &str) -> Result<Vec<String>> {
        let hashes = self.with_state(|s| {
            let posts: Vec<String> = s
                .posts
                .iter()
                .filter(|(_, p)| p.author == vanity)
                .map(|(id, _)| id.clone())
                .collect();
            let mut hashes = Vec::new();
            for post in posts {
                hashes.extend(s.remove_post(&post));
            }

            let comments: Vec<String> = s
                .comments
                .iter()
                .filter(|(_, c)| c.author == vanity)
                .map(|(id, _)| id.clone())
                .collect();
            for comment in comments {
                s.remove_comment(&comment);
            }

            s.users.remove(vanity);
            s.edges
                .retain(|e| e.from != vanity && !(e.kind.target() == TargetLabel::User && e.to == vanity));
            hashes
        })?;
        debug!("Deleted user {} with {} images", vanity, hashes.len());
        Ok(hashes)
    }

    async fn user_posts(&self, vanity: &str, skip: u32) -> Result<Vec<PostSummary>> {
        self.with_state(|s| {
            let mut ids: Vec<&String> = s
                .posts
                .iter()
                .filter(|(_, p)| p.author == vanity)
                .map(|(id, _)| id)
                .collect();
            ids.sort_by(|a, b| id_cmp(b, a));
            ids.into_iter()
                .skip(skip as usize)
                .take(POSTS_PER_PAGE as usize)
                .filter_map(|id| {
                    let p = s.posts.get(id)?;
                    Some(PostSummary {
                        id: id.clone(),
                        description: p.description.clone(),
                        text: p.text.clone(),
                        hash: p.hash.clone(),
                        like: s.count_incoming(RelationKind::Like, id),
                    })
                })
                .collect()
        })
    }

    async fn relation_list(&self, vanity: &str, kind: ListKind) -> Result<Vec<String>> {
        self.with_state(|s| {
            let mut names: Vec<String> = match kind {
                ListKind::Subscriber => s.incoming(RelationKind::Subscriber, vanity).map(String::from).collect(),
                ListKind::Subscription => s.outgoing(vanity, RelationKind::Subscriber).map(String::from).collect(),
                ListKind::Block => s.outgoing(vanity, RelationKind::Block).map(String::from).collect(),
                ListKind::Request => s.incoming(RelationKind::Request, vanity).map(String::from).collect(),
            };
            names.sort();
            names
        })
    }

    async fn export_user(&self, vanity: &str) -> Result<Option<UserExport>> {
        self.with_state(|s| {
            let user = s.users.get(vanity)?;

            let exported = |id: &str, relation: &str| {
                s.posts.get(id).map(|p| ExportedPost {
                    id: id.to_string(),
                    description: p.description.clone(),
                    text: p.text.clone(),
                    hash: p.hash.clone(),
                    tag: p.tag.clone(),
                    likes: s.count_incoming(RelationKind::Like, id),
                    relation: relation.to_string(),
                })
            };
            let mut posts: Vec<ExportedPost> = s
                .posts
                .iter()
                .filter(|(_, p)| p.author == vanity)
                .filter_map(|(id, _)| exported(id.as_str(), "Create"))
                .chain(
                    s.outgoing(vanity, RelationKind::Like)
                        .filter_map(|id| exported(id, "Like")),
                )
                .collect();
            posts.sort_by(|a, b| id_cmp(&b.id, &a.id).then_with(|| a.relation.cmp(&b.relation)));

            let mut comments: Vec<ExportedComment> = s
                .comments
                .iter()
                .filter(|(_, c)| c.author == vanity)
                .map(|(id, c)| ExportedComment {
                    id: id.clone(),
                    text: c.text.clone(),
                    timestamp: c.timestamp,
                })
                .collect();
            comments.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| id_cmp(&b.id, &a.id)));

            Some(UserExport {
                vanity: vanity.to_string(),
                community: user.community,
                rank: user.rank,
                public: user.public,
                suspended: user.suspended,
                posts,
                comments,
            })
        })
    }

    async fn relation_exists(&self, actor: &str, kind: RelationKind, target: &str) -> Result<bool> {
        self.with_state(|s| s.has(actor, kind, target))
    }

    async fn toggle_relation(
        &self,
        actor: &str,
        kind: RelationKind,
        target: &str,
    ) -> Result<Option<Toggle>> {
        self.with_state(|s| s.toggle(actor, kind, target))
    }

    async fn toggle_block(&self, actor: &str, target: &str) -> Result<Option<Toggle>> {
        self.with_state(|s| {
            s.edges.retain(|e| {
                let between = (e.from == actor && e.to == target) || (e.from == target && e.to == actor);
                !(between && matches!(e.kind, RelationKind::Subscriber | RelationKind::Request))
            });
            s.toggle(actor, RelationKind::Block, target)
        })
    }

    async fn blocked_between(&self, a: &str, b: &str) -> Result<bool> {
        self.with_state(|s| s.has(a, RelationKind::Block, b) || s.has(b, RelationKind::Block, a))
    }

    async fn resolve_request(&self, requester: &str, target: &str, accept: bool) -> Result<bool> {
        self.with_state(|s| {
            if !s.edges.remove(&Edge::new(requester, RelationKind::Request, target)) {
                return false;
            }
            if accept {
                s.edges.insert(Edge::new(requester, RelationKind::Subscriber, target));
            }
            true
        })
    }

    async fn create_post(&self, post: NewPost) -> Result<bool> {
        self.with_state(|s| {
            if !s.users.contains_key(&post.author) {
                return false;
            }
            s.posts.insert(
                post.id,
                PostNode {
                    author: post.author,
                    description: post.description,
                    text: post.text,
                    hash: post.hash,
                    tag: Some(post.tag),
                },
            );
            true
        })
    }

    async fn post(&self, id: &str, viewer: Option<&str>) -> Result<Option<PostDetail>> {
        self.with_state(|s| {
            let p = s.posts.get(id)?;
            Some(PostDetail {
                id: id.to_string(),
                description: p.description.clone(),
                text: p.text.clone(),
                hash: p.hash.clone(),
                like: s.count_incoming(RelationKind::Like, id),
                author: p.author.clone(),
                me_liked: viewer.is_some_and(|v| s.has(v, RelationKind::Like, id)),
                comments: s.comment_page(&Thread::Post(id.to_string()), 0, viewer),
            })
        })
    }

    async fn post_author(&self, id: &str) -> Result<Option<String>> {
        self.with_state(|s| s.posts.get(id).map(|p| p.author.clone()))
    }

    async fn delete_post(&self, id: &str, author: &str) -> Result<Option<Vec<String>>> {
        self.with_state(|s| match s.posts.get(id) {
            Some(p) if p.author == author => Some(s.remove_post(id)),
            _ => None,
        })
    }

    async fn comment_post(&self, comment_id: &str) -> Result<Option<String>> {
        self.with_state(|s| {
            let top = match &s.comments.get(comment_id)?.thread {
                Thread::Post(post) => return s.posts.contains_key(post).then(|| post.clone()),
                Thread::Reply(root) => s.comments.get(root)?,
            };
            match &top.thread {
                Thread::Post(post) if s.posts.contains_key(post) => Some(post.clone()),
                _ => None,
            }
        })
    }

    async fn comment_root(&self, comment_id: &str) -> Result<Option<String>> {
        self.with_state(|s| match &s.comments.get(comment_id)?.thread {
            Thread::Reply(root) => Some(root.clone()),
            Thread::Post(_) => None,
        })
    }

    async fn add_comment(&self, comment: NewComment) -> Result<bool> {
        self.with_state(|s| {
            if !s.posts.contains_key(&comment.post_id) || !s.users.contains_key(&comment.author) {
                return false;
            }
            s.comments.insert(
                comment.id,
                CommentNode {
                    author: comment.author,
                    text: comment.text,
                    timestamp: comment.timestamp,
                    thread: Thread::Post(comment.post_id),
                    replied_to: None,
                },
            );
            true
        })
    }

    async fn add_reply(&self, reply: NewReply) -> Result<bool> {
        self.with_state(|s| {
            let Some(answered) = s.comments.get(&reply.answered).map(|c| c.author.clone()) else {
                return false;
            };
            if !s.comments.contains_key(&reply.root) || !s.users.contains_key(&reply.author) {
                return false;
            }
            s.comments.insert(
                reply.id,
                CommentNode {
                    author: reply.author,
                    text: reply.text,
                    timestamp: reply.timestamp,
                    thread: Thread::Reply(reply.root),
                    replied_to: Some(answered),
                },
            );
            true
        })
    }

    async fn delete_comment(&self, id: &str, author: &str) -> Result<bool> {
        self.with_state(|s| match s.comments.get(id) {
            Some(c) if c.author == author => {
                s.remove_comment(id);
                true
            }
            _ => false,
        })
    }

    async fn comments(
        &self,
        post_id: &str,
        skip: u32,
        viewer: Option<&str>,
    ) -> Result<Vec<CommentView>> {
        self.with_state(|s| s.comment_page(&Thread::Post(post_id.to_string()), skip, viewer))
    }

    async fn replies(
        &self,
        post_id: &str,
        comment_id: &str,
        skip: u32,
        viewer: Option<&str>,
    ) -> Result<Vec<CommentView>> {
        self.with_state(|s| match s.comments.get(comment_id) {
            Some(c) if c.thread == Thread::Post(post_id.to_string()) => {
                s.comment_page(&Thread::Reply(comment_id.to_string()), skip, viewer)
            }
            _ => Vec::new(),
        })
    }

    async fn following_candidates(&self, viewer: &str) -> Result<Vec<Candidate>> {
        self.with_state(|s| {
            let followed: HashSet<&str> = s.outgoing(viewer, RelationKind::Subscriber).collect();
            let ids = s
                .posts
                .iter()
                .filter(|(id, p)| followed.contains(p.author.as_str()) && s.eligible(viewer, id))
                .map(|(id, _)| id.clone())
                .collect();
            s.candidates(ids, 20)
        })
    }

    async fn community_candidates(&self, viewer: &str) -> Result<Vec<Candidate>> {
        self.with_state(|s| {
            let Some(community) = s.users.get(viewer).and_then(|u| u.community) else {
                return Vec::new();
            };
            let members: HashSet<&str> = s
                .users
                .iter()
                .filter(|(_, u)| u.community == Some(community))
                .map(|(name, _)| name.as_str())
                .collect();

            let mut connections: HashMap<&str, usize> = HashMap::new();
            for edge in &s.edges {
                if edge.kind.target() == TargetLabel::Post
                    && members.contains(edge.from.as_str())
                    && s.posts.contains_key(&edge.to)
                {
                    *connections.entry(edge.to.as_str()).or_default() += 1;
                }
            }
            for (id, post) in &s.posts {
                if members.contains(post.author.as_str()) {
                    *connections.entry(id.as_str()).or_default() += 1;
                }
            }

            let mut ranked: Vec<(&str, usize)> = connections
                .into_iter()
                .filter(|(id, _)| s.eligible(viewer, id))
                .collect();
            ranked.sort_by(|(a_id, a), (b_id, b)| b.cmp(a).then_with(|| id_cmp(b_id, a_id)));
            ranked.truncate(100);

            let ids = ranked.into_iter().map(|(id, _)| id.to_string()).collect();
            s.candidates(ids, 30)
        })
    }

    async fn affinity_candidates(&self, viewer: &str) -> Result<Vec<Candidate>> {
        self.with_state(|s| {
            let latest_tag = s
                .outgoing(viewer, RelationKind::Like)
                .filter_map(|id| s.posts.get(id).and_then(|p| p.tag.as_deref()).map(|t| (id, t)))
                .max_by(|(a, _), (b, _)| id_cmp(a, b))
                .map(|(_, tag)| tag);
            let Some(tag) = latest_tag else {
                return Vec::new();
            };

            let ids = s
                .posts
                .iter()
                .filter(|(id, p)| p.tag.as_deref() == Some(tag) && s.eligible(viewer, id))
                .map(|(id, _)| id.clone())
                .collect();
            s.candidates(ids, 10)
        })
    }

    async fn rank_candidates(&self, viewer: &str, pool: &[String]) -> Result<Vec<FeedPost>> {
        self.with_state(|s| {
            let mut liked: Vec<&str> = s
                .outgoing(viewer, RelationKind::Like)
                .filter(|id| s.posts.contains_key(*id))
                .collect();
            liked.sort_by(|a, b| id_cmp(b, a));
            liked.truncate(RECENT_LIKES);
            if liked.is_empty() {
                return Vec::new();
            }
            let liked_sets: Vec<HashSet<&str>> = liked.iter().map(|id| s.likers(id)).collect();

            let mut seen = HashSet::new();
            let mut scored: Vec<(&str, f64)> = pool
                .iter()
                .filter(|id| {
                    s.posts
                        .get(id.as_str())
                        .is_some_and(|p| s.visible(viewer, &p.author))
                        && seen.insert(id.as_str())
                })
                .map(|id| {
                    let likers = s.likers(id);
                    let best = liked_sets
                        .iter()
                        .map(|other| jaccard(&likers, other))
                        .fold(0.0, f64::max);
                    (id.as_str(), best)
                })
                .collect();
            scored.sort_by(|(a_id, a), (b_id, b)| {
                b.partial_cmp(a)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| id_cmp(b_id, a_id))
            });
            scored.truncate(RANKED_LIMIT);

            scored
                .into_iter()
                .filter_map(|(id, _)| s.feed_post(id, Some(viewer)))
                .collect()
        })
    }

    async fn most_liked(&self) -> Result<Vec<FeedPost>> {
        self.with_state(|s| {
            let mut liked: Vec<(&str, i64)> = s
                .posts
                .iter()
                .filter(|(_, p)| {
                    s.users
                        .get(&p.author)
                        .is_some_and(|u| u.public && !u.suspended)
                })
                .map(|(id, _)| (id.as_str(), s.count_incoming(RelationKind::Like, id)))
                .filter(|(_, likes)| *likes > 0)
                .collect();
            liked.sort_by(|(a_id, a), (b_id, b)| b.cmp(a).then_with(|| id_cmp(b_id, a_id)));
            liked.truncate(20);
            liked
                .into_iter()
                .filter_map(|(id, _)| s.feed_post(id, None))
                .collect()
        })
    }

    async fn refresh_page_rank(&self) -> Result<()> {
        self.with_state(|s| {
            let users: Vec<String> = s.users.keys().cloned().collect();
            if users.is_empty() {
                return;
            }
            let n = users.len() as f64;
            let mut out: HashMap<&str, Vec<&str>> = HashMap::new();
            for edge in &s.edges {
                if edge.kind.target() == TargetLabel::User
                    && edge.kind != RelationKind::Block
                    && s.users.contains_key(&edge.to)
                {
                    out.entry(edge.from.as_str()).or_default().push(edge.to.as_str());
                }
            }

            let mut rank: HashMap<&str, f64> = users.iter().map(|u| (u.as_str(), 1.0 / n)).collect();
            for _ in 0..PAGE_RANK_ITERATIONS {
                let dangling: f64 = users
                    .iter()
                    .filter(|u| !out.contains_key(u.as_str()))
                    .map(|u| rank[u.as_str()])
                    .sum();
                let base = (1.0 - PAGE_RANK_DAMPING) / n + PAGE_RANK_DAMPING * dangling / n;
                let mut next: HashMap<&str, f64> = users.iter().map(|u| (u.as_str(), base)).collect();
                for (from, targets) in &out {
                    let share = PAGE_RANK_DAMPING * rank[from] / targets.len() as f64;
                    for to in targets {
                        if let Some(r) = next.get_mut(to) {
                            *r += share;
                        }
                    }
                }
                rank = next;
            }

            let rank: HashMap<String, f64> =
                rank.into_iter().map(|(u, r)| (u.to_string(), r)).collect();
            for (name, user) in s.users.iter_mut() {
                user.rank = rank.get(name).copied();
            }
        })
    }

    async fn refresh_communities(&self) -> Result<()> {
        self.with_state(|s| {
            let mut parent: HashMap<NodeKey, NodeKey> = HashMap::new();

            fn find(parent: &mut HashMap<NodeKey, NodeKey>, key: &NodeKey) -> NodeKey {
                let mut root = key.clone();
                while let Some(next) = parent.get(&root) {
                    if *next == root {
                        break;
                    }
                    root = next.clone();
                }
                parent.insert(key.clone(), root.clone());
                root
            }

            fn union(parent: &mut HashMap<NodeKey, NodeKey>, a: NodeKey, b: NodeKey) {
                let ra = find(parent, &a);
                let rb = find(parent, &b);
                if ra != rb {
                    parent.insert(ra, rb);
                }
            }

            for name in s.users.keys() {
                parent.insert(NodeKey::User(name.clone()), NodeKey::User(name.clone()));
            }
            for edge in &s.edges {
                if matches!(edge.kind, RelationKind::Block | RelationKind::View) {
                    continue;
                }
                let to = match edge.kind.target() {
                    TargetLabel::User => NodeKey::User(edge.to.clone()),
                    TargetLabel::Post => NodeKey::Post(edge.to.clone()),
                    TargetLabel::Comment => NodeKey::Comment(edge.to.clone()),
                };
                union(&mut parent, NodeKey::User(edge.from.clone()), to);
            }
            for (id, post) in &s.posts {
                union(&mut parent, NodeKey::User(post.author.clone()), NodeKey::Post(id.clone()));
            }
            for (id, comment) in &s.comments {
                union(
                    &mut parent,
                    NodeKey::User(comment.author.clone()),
                    NodeKey::Comment(id.clone()),
                );
            }

            let mut names: Vec<String> = s.users.keys().cloned().collect();
            names.sort();
            let mut ids: HashMap<NodeKey, i64> = HashMap::new();
            for name in names {
                let root = find(&mut parent, &NodeKey::User(name.clone()));
                let next = ids.len() as i64;
                let community = *ids.entry(root).or_insert(next);
                if let Some(user) = s.users.get_mut(&name) {
                    user.community = Some(community);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn graph_with(users: &[&str]) -> MemoryGraph {
        let graph = MemoryGraph::new();
        for user in users {
            graph.create_user(user).await.unwrap();
        }
        graph
    }

    async fn post(graph: &MemoryGraph, id: &str, author: &str, tag: &str) {
        let created = graph
            .create_post(NewPost {
                id: id.into(),
                author: author.into(),
                description: format!("post {id}"),
                text: String::new(),
                hash: vec![format!("hash-{id}")],
                tag: tag.into(),
            })
            .await
            .unwrap();
        assert!(created);
    }

    fn ids<T>(items: &[T], id: impl Fn(&T) -> &str) -> Vec<String> {
        items.iter().map(|i| id(i).to_string()).collect()
    }

    #[tokio::test]
    async fn create_user_is_idempotent() {
        let graph = MemoryGraph::new();
        assert!(graph.create_user("alice").await.unwrap());
        assert!(!graph.create_user("alice").await.unwrap());

        let profile = graph.profile("alice").await.unwrap().unwrap();
        assert!(profile.public);
        assert!(!profile.suspended);
        assert_eq!(profile.followers, 0);
    }

    #[tokio::test]
    async fn toggle_twice_restores_state() {
        let graph = graph_with(&["alice", "bob"]).await;
        post(&graph, "100", "bob", "cat").await;

        for (kind, target) in [
            (RelationKind::Subscriber, "bob"),
            (RelationKind::Block, "bob"),
            (RelationKind::Like, "100"),
            (RelationKind::View, "100"),
        ] {
            let first = graph.toggle_relation("alice", kind, target).await.unwrap();
            assert_eq!(first, Some(Toggle::Created));
            assert!(graph.relation_exists("alice", kind, target).await.unwrap());

            let second = graph.toggle_relation("alice", kind, target).await.unwrap();
            assert_eq!(second, Some(Toggle::Deleted));
            assert!(!graph.relation_exists("alice", kind, target).await.unwrap());
        }
    }

    #[tokio::test]
    async fn toggle_towards_missing_target() {
        let graph = graph_with(&["alice"]).await;
        assert_eq!(
            graph.toggle_relation("alice", RelationKind::Like, "404").await.unwrap(),
            None
        );
        assert_eq!(graph.toggle_block("alice", "ghost").await.unwrap(), None);
    }

    #[tokio::test]
    async fn block_clears_subscriptions_both_ways() {
        let graph = graph_with(&["alice", "bob"]).await;
        graph.toggle_relation("alice", RelationKind::Subscriber, "bob").await.unwrap();
        graph.toggle_relation("bob", RelationKind::Request, "alice").await.unwrap();

        assert_eq!(graph.toggle_block("alice", "bob").await.unwrap(), Some(Toggle::Created));
        assert!(!graph.relation_exists("alice", RelationKind::Subscriber, "bob").await.unwrap());
        assert!(!graph.relation_exists("bob", RelationKind::Request, "alice").await.unwrap());
        assert!(graph.blocked_between("bob", "alice").await.unwrap());
        assert_eq!(graph.relation_list("alice", ListKind::Block).await.unwrap(), vec!["bob"]);
    }

    #[tokio::test]
    async fn resolve_request() {
        let graph = graph_with(&["carol", "dave"]).await;
        assert!(!graph.resolve_request("dave", "carol", true).await.unwrap());

        graph.toggle_relation("dave", RelationKind::Request, "carol").await.unwrap();
        assert_eq!(graph.relation_list("carol", ListKind::Request).await.unwrap(), vec!["dave"]);

        assert!(graph.resolve_request("dave", "carol", true).await.unwrap());
        assert!(graph.relation_exists("dave", RelationKind::Subscriber, "carol").await.unwrap());
        assert!(graph.relation_list("carol", ListKind::Request).await.unwrap().is_empty());
        assert_eq!(graph.profile("carol").await.unwrap().unwrap().followers, 1);
    }

    #[tokio::test]
    async fn following_excludes_viewed_posts() {
        let graph = graph_with(&["alice", "bob"]).await;
        graph.toggle_relation("alice", RelationKind::Subscriber, "bob").await.unwrap();
        post(&graph, "101", "bob", "cat").await;
        post(&graph, "102", "bob", "dog").await;
        graph.toggle_relation("alice", RelationKind::View, "102").await.unwrap();

        let feed = graph.following_candidates("alice").await.unwrap();
        assert_eq!(ids(&feed, |c| c.id.as_str()), vec!["101"]);
        assert_eq!(feed[0].tag, "cat");
    }

    #[tokio::test]
    async fn following_is_most_recent_first() {
        let graph = graph_with(&["alice", "bob"]).await;
        graph.toggle_relation("alice", RelationKind::Subscriber, "bob").await.unwrap();
        post(&graph, "99", "bob", "cat").await;
        post(&graph, "100", "bob", "cat").await;

        let feed = graph.following_candidates("alice").await.unwrap();
        assert_eq!(ids(&feed, |c| c.id.as_str()), vec!["100", "99"]);
    }

    #[tokio::test]
    async fn affinity_follows_latest_liked_tag() {
        let graph = graph_with(&["alice", "bob"]).await;
        post(&graph, "101", "bob", "cat").await;
        post(&graph, "102", "bob", "dog").await;
        post(&graph, "103", "bob", "dog").await;
        post(&graph, "104", "bob", "cat").await;
        graph.toggle_relation("alice", RelationKind::Like, "101").await.unwrap();
        graph.toggle_relation("alice", RelationKind::Like, "102").await.unwrap();

        let feed = graph.affinity_candidates("alice").await.unwrap();
        assert_eq!(ids(&feed, |c| c.id.as_str()), vec!["103", "102"]);
    }

    #[tokio::test]
    async fn community_needs_a_community() {
        let graph = graph_with(&["alice", "bob"]).await;
        post(&graph, "101", "bob", "cat").await;
        assert!(graph.community_candidates("alice").await.unwrap().is_empty());

        graph.set_community("alice", 7).unwrap();
        graph.set_community("bob", 7).unwrap();
        let feed = graph.community_candidates("alice").await.unwrap();
        assert_eq!(ids(&feed, |c| c.id.as_str()), vec!["101"]);
    }

    #[tokio::test]
    async fn rank_is_empty_without_likes() {
        let graph = graph_with(&["alice", "bob"]).await;
        post(&graph, "101", "bob", "cat").await;
        let ranked = graph.rank_candidates("alice", &["101".into()]).await.unwrap();
        assert!(ranked.is_empty());
    }

    #[tokio::test]
    async fn rank_orders_by_liker_overlap() {
        let graph = graph_with(&["alice", "bob", "carol"]).await;
        post(&graph, "101", "bob", "cat").await;
        post(&graph, "102", "bob", "cat").await;
        post(&graph, "103", "bob", "cat").await;
        for (user, id) in [("alice", "101"), ("carol", "101"), ("carol", "103")] {
            graph.toggle_relation(user, RelationKind::Like, id).await.unwrap();
        }

        let pool = vec!["102".to_string(), "103".to_string(), "103".to_string()];
        let ranked = graph.rank_candidates("alice", &pool).await.unwrap();
        assert_eq!(ids(&ranked, |p| p.id.as_str()), vec!["103", "102"]);
        assert_eq!(ranked[0].like, 1);
        assert_eq!(ranked[0].author, "bob");
        assert!(!ranked[0].me_liked);
    }

    /// bob and dave are public; carol is private, mallory blocked alice and
    /// sam is suspended. Everyone posts about cats.
    async fn mixed_authors() -> MemoryGraph {
        let graph = graph_with(&["alice", "bob", "carol", "mallory", "sam", "dave"]).await;
        for (id, author) in [
            ("101", "bob"),
            ("102", "carol"),
            ("103", "mallory"),
            ("104", "sam"),
            ("105", "dave"),
        ] {
            post(&graph, id, author, "cat").await;
        }
        graph.set_public("carol", false).await.unwrap();
        graph.toggle_block("mallory", "alice").await.unwrap();
        graph.set_suspended("sam", true).await.unwrap();
        graph.toggle_relation("alice", RelationKind::Like, "101").await.unwrap();
        graph
    }

    #[tokio::test]
    async fn feed_skips_hidden_authors() {
        let graph = mixed_authors().await;

        let affinity = graph.affinity_candidates("alice").await.unwrap();
        assert_eq!(ids(&affinity, |c| c.id.as_str()), vec!["105", "101"]);

        for user in ["alice", "bob", "carol", "mallory", "sam", "dave"] {
            graph.set_community(user, 1).unwrap();
        }
        let community = graph.community_candidates("alice").await.unwrap();
        assert_eq!(ids(&community, |c| c.id.as_str()), vec!["105", "101"]);

        let pool: Vec<String> = ["101", "102", "103", "104", "105"].map(String::from).to_vec();
        let ranked = graph.rank_candidates("alice", &pool).await.unwrap();
        let mut ranked = ids(&ranked, |p| p.id.as_str());
        ranked.sort();
        assert_eq!(ranked, vec!["101", "105"]);
    }

    #[tokio::test]
    async fn subscribing_reveals_private_posts() {
        let graph = mixed_authors().await;
        graph.toggle_relation("alice", RelationKind::Subscriber, "carol").await.unwrap();

        let following = graph.following_candidates("alice").await.unwrap();
        assert_eq!(ids(&following, |c| c.id.as_str()), vec!["102"]);
        let affinity = graph.affinity_candidates("alice").await.unwrap();
        assert_eq!(ids(&affinity, |c| c.id.as_str()), vec!["105", "102", "101"]);
    }

    #[tokio::test]
    async fn most_liked_is_public_only() {
        let graph = mixed_authors().await;
        graph.toggle_relation("bob", RelationKind::Like, "102").await.unwrap();
        graph.toggle_relation("bob", RelationKind::Like, "104").await.unwrap();

        let top = graph.most_liked().await.unwrap();
        assert_eq!(ids(&top, |p| p.id.as_str()), vec!["101"]);
    }

    #[tokio::test]
    async fn replies_attach_to_thread_root() {
        let graph = graph_with(&["alice", "bob", "carol"]).await;
        post(&graph, "101", "alice", "cat").await;
        assert!(graph
            .add_comment(NewComment {
                id: "1".into(),
                post_id: "101".into(),
                author: "bob".into(),
                text: "nice".into(),
                timestamp: 10,
            })
            .await
            .unwrap());
        assert!(graph
            .add_reply(NewReply {
                id: "2".into(),
                root: "1".into(),
                answered: "1".into(),
                author: "carol".into(),
                text: "agreed".into(),
                timestamp: 11,
            })
            .await
            .unwrap());

        assert_eq!(graph.comment_root("2").await.unwrap().as_deref(), Some("1"));
        assert_eq!(graph.comment_root("1").await.unwrap(), None);
        assert_eq!(graph.comment_post("2").await.unwrap().as_deref(), Some("101"));

        let replies = graph.replies("101", "1", 0, None).await.unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].replied_to.as_deref(), Some("bob"));

        let top = graph.comments("101", 0, None).await.unwrap();
        assert_eq!(ids(&top, |c| c.id.as_str()), vec!["1"]);
    }

    #[tokio::test]
    async fn delete_post_cascades() {
        let graph = graph_with(&["alice", "bob"]).await;
        post(&graph, "101", "alice", "cat").await;
        graph
            .add_comment(NewComment {
                id: "1".into(),
                post_id: "101".into(),
                author: "bob".into(),
                text: "hi".into(),
                timestamp: 1,
            })
            .await
            .unwrap();
        graph.toggle_relation("bob", RelationKind::Love, "1").await.unwrap();

        assert_eq!(graph.delete_post("101", "bob").await.unwrap(), None);
        assert_eq!(
            graph.delete_post("101", "alice").await.unwrap(),
            Some(vec!["hash-101".to_string()])
        );
        assert!(graph.post("101", None).await.unwrap().is_none());
        assert_eq!(graph.comment_post("1").await.unwrap(), None);
        assert!(!graph.relation_exists("bob", RelationKind::Love, "1").await.unwrap());
    }

    #[tokio::test]
    async fn delete_user_returns_hashes() {
        let graph = graph_with(&["alice", "bob"]).await;
        post(&graph, "101", "alice", "cat").await;
        graph.toggle_relation("bob", RelationKind::Subscriber, "alice").await.unwrap();

        let hashes = graph.delete_user("alice").await.unwrap();
        assert_eq!(hashes, vec!["hash-101"]);
        assert!(graph.profile("alice").await.unwrap().is_none());
        assert_eq!(graph.profile("bob").await.unwrap().unwrap().following, 0);
    }

    #[tokio::test]
    async fn communities_follow_shared_activity() {
        let graph = graph_with(&["alice", "bob", "carol"]).await;
        post(&graph, "101", "alice", "cat").await;
        graph.toggle_relation("bob", RelationKind::Like, "101").await.unwrap();
        graph.toggle_relation("carol", RelationKind::Block, "alice").await.unwrap();

        graph.refresh_communities().await.unwrap();
        let alice = graph.community("alice").unwrap();
        assert!(alice.is_some());
        assert_eq!(alice, graph.community("bob").unwrap());
        assert_ne!(alice, graph.community("carol").unwrap());
    }

    #[tokio::test]
    async fn page_rank_favours_followed_users() {
        let graph = graph_with(&["alice", "bob", "carol"]).await;
        graph.toggle_relation("alice", RelationKind::Subscriber, "carol").await.unwrap();
        graph.toggle_relation("bob", RelationKind::Subscriber, "carol").await.unwrap();

        graph.refresh_page_rank().await.unwrap();
        let carol = graph.rank("carol").unwrap().unwrap();
        let alice = graph.rank("alice").unwrap().unwrap();
        assert!(carol > alice);
    }

    #[tokio::test]
    async fn export_lists_created_and_liked() {
        let graph = graph_with(&["alice", "bob"]).await;
        post(&graph, "101", "alice", "cat").await;
        post(&graph, "102", "bob", "dog").await;
        graph.toggle_relation("alice", RelationKind::Like, "102").await.unwrap();

        let export = graph.export_user("alice").await.unwrap().unwrap();
        let rows: Vec<_> = export.posts.iter().map(|p| (p.id.as_str(), p.relation.as_str())).collect();
        assert_eq!(rows, vec![("102", "Like"), ("101", "Create")]);
        assert!(graph.export_user("ghost").await.unwrap().is_none());
    }
}
