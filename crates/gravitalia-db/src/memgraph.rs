//! Cypher implementation of [`GraphRepo`] over Bolt.
//!
//! Every method runs in one explicit transaction. Rows are decoded into
//! scalar columns right after they are read; a row that does not match
//! the expected shape becomes [`DbError::MalformedRow`].

use async_trait::async_trait;
use neo4rs::{Graph, Query, Row, Txn, query};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use gravitalia_types::models::{
    Candidate, CommentView, ExportedComment, ExportedPost, FeedPost, PostDetail, PostSummary,
    Profile, UserExport,
};
use gravitalia_types::relation::{ListKind, RelationKind, Toggle};

use crate::error::{DbError, Result};
use crate::models::{NewComment, NewPost, NewReply};
use crate::{COMMENTS_PER_PAGE, GraphRepo, POSTS_PER_PAGE, RANKED_LIMIT, RECENT_LIKES};

// -- Users --

const CREATE_USER: &str = "MERGE (u:User {name: $id}) \
    ON CREATE SET u.public = true, u.suspended = false, u.fresh = true \
    WITH u, coalesce(u.fresh, false) AS created \
    REMOVE u.fresh \
    RETURN created;";

const PROFILE: &str = "MATCH (n:User {name: $id}) \
    OPTIONAL MATCH (n)-[:Subscriber]->(d:User) \
    WITH n, count(DISTINCT d) AS following \
    OPTIONAL MATCH (u:User)-[:Subscriber]->(n) \
    WITH n, following, count(DISTINCT u) AS followers \
    RETURN followers, following, n.public AS public, n.suspended AS suspended;";

const SET_PUBLIC: &str =
    "MATCH (u:User {name: $id}) SET u.public = $value RETURN u.name AS name;";

const SET_SUSPENDED: &str =
    "MATCH (u:User {name: $id}) SET u.suspended = $value RETURN u.name AS name;";

const USER_HASHES: &str =
    "MATCH (:User {name: $id})-[:Create]->(p:Post) RETURN p.hash AS hash;";

const DELETE_USER_POSTS: &str = "MATCH (:User {name: $id})-[:Create]->(p:Post) \
    OPTIONAL MATCH (p)<-[:Comment]-(c:Comment) \
    OPTIONAL MATCH (c)<-[:Reply]-(r:Comment) \
    DETACH DELETE r, c, p;";

const DELETE_USER_COMMENTS: &str = "MATCH (:User {name: $id})-[:Wrote]->(c:Comment) \
    OPTIONAL MATCH (c)<-[:Reply]-(r:Comment) \
    DETACH DELETE r, c;";

const DELETE_USER: &str = "MATCH (u:User {name: $id}) DETACH DELETE u;";

const USER_POSTS: &str = "MATCH (:User {name: $id})-[:Create]->(p:Post) \
    OPTIONAL MATCH (p)<-[l:Like]-(:User) \
    WITH p, count(DISTINCT l) AS likes \
    RETURN p.id AS id, p.description AS description, p.text AS text, p.hash AS hash, likes \
    ORDER BY toInteger(id) DESC SKIP $skip LIMIT $limit;";

const EXPORT_USER: &str = "MATCH (u:User {name: $id}) \
    RETURN u.community AS community, u.rank AS rank, u.public AS public, u.suspended AS suspended;";

const EXPORT_POSTS: &str = "MATCH (:User {name: $id})-[r:Create|Like]->(p:Post) \
    OPTIONAL MATCH (p)-[:Show]->(t:Tag) \
    OPTIONAL MATCH (p)<-[l:Like]-(:User) \
    WITH p, t, type(r) AS relation, count(DISTINCT l) AS likes \
    RETURN p.id AS id, p.description AS description, p.text AS text, p.hash AS hash, \
        t.name AS tag, likes, relation \
    ORDER BY toInteger(id) DESC;";

const EXPORT_COMMENTS: &str = "MATCH (:User {name: $id})-[:Wrote]->(c:Comment) \
    RETURN c.id AS id, c.text AS text, c.timestamp AS timestamp \
    ORDER BY timestamp DESC;";

// -- Relations --

const CLEAR_SUBSCRIPTIONS: &str =
    "MATCH (:User {name: $id})-[r:Subscriber|Request]-(:User {name: $to}) DELETE r;";

const BLOCKED_BETWEEN: &str =
    "MATCH (:User {name: $a})-[r:Block]-(:User {name: $b}) RETURN count(r) > 0 AS blocked;";

const RESOLVE_REQUEST: &str = "MATCH (a:User {name: $from})-[r:Request]->(b:User {name: $to}) \
    DELETE r \
    WITH a, b \
    FOREACH (_ IN CASE WHEN $accept THEN [1] ELSE [] END | MERGE (a)-[:Subscriber]->(b)) \
    RETURN a.name AS name;";

// -- Posts --

const CREATE_POST: &str = "MATCH (u:User {name: $author}) \
    CREATE (p:Post {id: $id, description: $description, text: $text, hash: $hash}) \
    CREATE (u)-[:Create]->(p) \
    MERGE (t:Tag {name: $tag}) \
    CREATE (p)-[:Show]->(t) \
    RETURN p.id AS id;";

const GET_POST: &str = "MATCH (author:User)-[:Create]->(p:Post {id: $id}) \
    OPTIONAL MATCH (p)<-[l:Like]-(:User) \
    WITH author, p, count(DISTINCT l) AS likes \
    OPTIONAL MATCH (:User {name: $viewer})-[ml:Like]->(p) \
    RETURN p.id AS id, p.description AS description, p.text AS text, p.hash AS hash, likes, \
        author.name AS author, ml IS NOT NULL AS me_liked;";

const POST_AUTHOR: &str = "MATCH (u:User)-[:Create]->(:Post {id: $id}) RETURN u.name AS author;";

const OWNED_POST_HASHES: &str =
    "MATCH (:User {name: $author})-[:Create]->(p:Post {id: $id}) RETURN p.hash AS hash;";

const DELETE_POST: &str = "MATCH (p:Post {id: $id}) \
    OPTIONAL MATCH (p)<-[:Comment]-(c:Comment) \
    OPTIONAL MATCH (c)<-[:Reply]-(r:Comment) \
    DETACH DELETE r, c, p;";

// -- Comments --

const COMMENT_POST: &str = "MATCH (c:Comment {id: $id}) \
    OPTIONAL MATCH (c)-[:Reply]->(root:Comment) \
    WITH coalesce(root, c) AS top \
    MATCH (top)-[:Comment]->(p:Post) \
    RETURN p.id AS post;";

const COMMENT_ROOT: &str =
    "MATCH (:Comment {id: $id})-[:Reply]->(root:Comment) RETURN root.id AS root;";

const ADD_COMMENT: &str = "MATCH (p:Post {id: $post}) \
    MATCH (u:User {name: $author}) \
    CREATE (c:Comment {id: $id, text: $text, timestamp: $timestamp}) \
    CREATE (c)-[:Comment]->(p) \
    CREATE (u)-[:Wrote]->(c) \
    RETURN c.id AS id;";

const ADD_REPLY: &str = "MATCH (root:Comment {id: $root}) \
    MATCH (target:User)-[:Wrote]->(:Comment {id: $answered}) \
    MATCH (u:User {name: $author}) \
    CREATE (c:Comment {id: $id, text: $text, timestamp: $timestamp, replied_to: target.name}) \
    CREATE (c)-[:Reply]->(root) \
    CREATE (u)-[:Wrote]->(c) \
    RETURN c.id AS id;";

const OWNED_COMMENT: &str =
    "MATCH (:User {name: $author})-[:Wrote]->(c:Comment {id: $id}) RETURN c.id AS id;";

const DELETE_COMMENT: &str = "MATCH (c:Comment {id: $id}) \
    OPTIONAL MATCH (c)<-[:Reply]-(r:Comment) \
    DETACH DELETE r, c;";

const COMMENT_COLUMNS: &str = "OPTIONAL MATCH (c)<-[love:Love]-(:User) \
    WITH c, u, count(DISTINCT love) AS loves \
    OPTIONAL MATCH (:User {name: $viewer})-[ml:Love]->(c) \
    RETURN c.id AS id, c.text AS text, c.timestamp AS timestamp, u.name AS user, \
        c.replied_to AS replied_to, loves, ml IS NOT NULL AS me_loved \
    ORDER BY timestamp ASC, toInteger(id) ASC SKIP $skip LIMIT $limit;";

// -- Feed --

// Applied to a post author `a` for the viewer `n`: the author is not
// suspended, neither blocked the other, and the posts are public to `n`.
macro_rules! visible_author {
    () => {
        "NOT coalesce(a.suspended, false) \
        AND NOT EXISTS((n)-[:Block]-(a)) \
        AND (a = n OR coalesce(a.public, true) OR EXISTS((n)-[:Subscriber]->(a)))"
    };
}

// Snowflake ids are compared as integers: string order breaks once ids
// gain a digit.
const FOLLOWING_CANDIDATES: &str = concat!(
    "MATCH (n:User {name: $id})-[:Subscriber]->(a:User)-[:Create]->(p:Post) \
    WHERE NOT EXISTS((n)-[:View]->(p)) AND ",
    visible_author!(),
    " OPTIONAL MATCH (p)-[:Show]->(t:Tag) \
    RETURN p.id AS id, p.description AS description, p.text AS text, t.name AS tag \
    ORDER BY toInteger(id) DESC LIMIT 20;"
);

const COMMUNITY_CANDIDATES: &str = concat!(
    "MATCH (n:User {name: $id}) WHERE n.community IS NOT NULL \
    MATCH (m:User {community: n.community})-[r]->(p:Post) \
    MATCH (a:User)-[:Create]->(p) \
    WHERE NOT EXISTS((n)-[:View]->(p)) AND ",
    visible_author!(),
    " WITH p, count(r) AS connections \
    ORDER BY connections DESC, toInteger(p.id) DESC LIMIT 100 \
    WITH p ORDER BY toInteger(p.id) DESC LIMIT 30 \
    OPTIONAL MATCH (p)-[:Show]->(t:Tag) \
    RETURN p.id AS id, p.description AS description, p.text AS text, t.name AS tag \
    ORDER BY toInteger(id) DESC;"
);

const AFFINITY_CANDIDATES: &str = concat!(
    "MATCH (n:User {name: $id})-[:Like]->(liked:Post)-[:Show]->(t:Tag) \
    WITH n, t, liked ORDER BY toInteger(liked.id) DESC LIMIT 1 \
    MATCH (a:User)-[:Create]->(p:Post)-[:Show]->(t) \
    WHERE NOT EXISTS((n)-[:View]->(p)) AND ",
    visible_author!(),
    " RETURN p.id AS id, p.description AS description, p.text AS text, t.name AS tag \
    ORDER BY toInteger(id) DESC LIMIT 10;"
);

const RANK_CANDIDATES: &str = concat!(
    "MATCH (n:User {name: $id})-[:Like]->(liked:Post) \
    WITH n, liked ORDER BY toInteger(liked.id) DESC LIMIT $recent \
    WITH n, collect(liked) AS liked_posts \
    MATCH (a:User)-[:Create]->(l:Post) WHERE l.id IN $pool AND ",
    visible_author!(),
    " WITH liked_posts, collect(l) AS posts \
    UNWIND posts AS src UNWIND liked_posts AS dst \
    WITH collect(src) AS sources, collect(dst) AS targets \
    CALL node_similarity.jaccard_pairwise(sources, targets) YIELD node1, similarity \
    WITH node1, max(similarity) AS similarity \
    ORDER BY similarity DESC, toInteger(node1.id) DESC LIMIT $limit \
    OPTIONAL MATCH (u:User)-[:Like]->(node1) \
    WITH node1, similarity, count(DISTINCT u) AS likes \
    MATCH (creator:User)-[:Create]->(node1) \
    OPTIONAL MATCH (:User {name: $id})-[r:Like]->(node1) \
    RETURN node1.id AS id, node1.description AS description, node1.hash AS hash, \
        creator.name AS author, likes, r IS NOT NULL AS me_liked \
    ORDER BY similarity DESC, toInteger(id) DESC;"
);

/// Anonymous: only public, active authors.
const MOST_LIKED: &str = "MATCH (u:User)-[:Create]->(p:Post)<-[r:Like]-(:User) \
    WHERE NOT coalesce(u.suspended, false) AND coalesce(u.public, true) \
    WITH p, u, count(DISTINCT r) AS likes \
    ORDER BY likes DESC, toInteger(p.id) DESC LIMIT 20 \
    RETURN p.id AS id, p.description AS description, p.hash AS hash, u.name AS author, \
        likes, false AS me_liked;";

// -- Ranking --

const PAGE_RANK: &str = "MATCH p=(:User)-[r]->(:User) WHERE type(r) <> 'Block' \
    WITH project(p) AS graph \
    CALL pagerank_online.update(graph) YIELD node, rank \
    SET node.rank = rank;";

const COMMUNITIES: &str = "MATCH p=(:User)-[r]->() WHERE type(r) <> 'Block' AND type(r) <> 'View' \
    WITH project(p) AS graph \
    CALL community_detection_online.update(graph) YIELD node, community_id \
    WITH node, community_id WHERE 'User' IN labels(node) \
    SET node.community = community_id;";

pub struct Memgraph {
    graph: Graph,
}

impl Memgraph {
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self> {
        let graph = Graph::new(uri, user, password).await?;
        info!("Graph connected at {}", uri);
        Ok(Self { graph })
    }

    /// Runs a single read or write statement and returns its rows.
    async fn fetch(&self, q: Query) -> Result<Vec<Row>> {
        let mut txn = self.graph.start_txn().await?;
        let rows = collect(&mut txn, q).await?;
        txn.commit().await?;
        Ok(rows)
    }

    async fn run(&self, q: Query) -> Result<()> {
        let mut txn = self.graph.start_txn().await?;
        txn.run(q).await?;
        txn.commit().await?;
        Ok(())
    }

    async fn flag(&self, name: &'static str, q: Query, column: &'static str) -> Result<bool> {
        let rows = self.fetch(q).await?;
        match rows.first() {
            Some(row) => column_of(row, name, column),
            None => Ok(false),
        }
    }

    async fn candidates(&self, name: &'static str, q: Query) -> Result<Vec<Candidate>> {
        self.fetch(q)
            .await?
            .iter()
            .map(|row| decode_candidate(row, name))
            .collect()
    }

    async fn feed(&self, name: &'static str, q: Query) -> Result<Vec<FeedPost>> {
        self.fetch(q)
            .await?
            .iter()
            .map(|row| decode_feed_post(row, name))
            .collect()
    }

    async fn comment_page(
        &self,
        name: &'static str,
        q: Query,
    ) -> Result<Vec<CommentView>> {
        self.fetch(q)
            .await?
            .iter()
            .map(|row| decode_comment(row, name))
            .collect()
    }
}

async fn collect(txn: &mut Txn, q: Query) -> Result<Vec<Row>> {
    let mut stream = txn.execute(q).await?;
    let mut rows = Vec::new();
    while let Some(row) = stream.next(txn.handle()).await? {
        rows.push(row);
    }
    Ok(rows)
}

fn column_of<T: DeserializeOwned>(row: &Row, name: &'static str, column: &'static str) -> Result<T> {
    row.get::<T>(column).map_err(|source| DbError::MalformedRow {
        query: name,
        column,
        source,
    })
}

fn hashes(rows: &[Row], name: &'static str) -> Result<Vec<String>> {
    let mut all = Vec::new();
    for row in rows {
        let hash: Option<Vec<String>> = column_of(row, name, "hash")?;
        all.extend(hash.unwrap_or_default());
    }
    Ok(all)
}

fn skip_param(skip: u32) -> i64 {
    i64::from(skip)
}

fn decode_candidate(row: &Row, name: &'static str) -> Result<Candidate> {
    Ok(Candidate {
        id: column_of(row, name, "id")?,
        description: column_of::<Option<String>>(row, name, "description")?.unwrap_or_default(),
        text: column_of::<Option<String>>(row, name, "text")?.unwrap_or_default(),
        tag: column_of::<Option<String>>(row, name, "tag")?.unwrap_or_default(),
    })
}

fn decode_feed_post(row: &Row, name: &'static str) -> Result<FeedPost> {
    Ok(FeedPost {
        id: column_of(row, name, "id")?,
        description: column_of::<Option<String>>(row, name, "description")?.unwrap_or_default(),
        author: column_of(row, name, "author")?,
        hash: column_of::<Option<Vec<String>>>(row, name, "hash")?.unwrap_or_default(),
        like: column_of(row, name, "likes")?,
        me_liked: column_of(row, name, "me_liked")?,
    })
}

fn decode_comment(row: &Row, name: &'static str) -> Result<CommentView> {
    Ok(CommentView {
        id: column_of(row, name, "id")?,
        text: column_of::<Option<String>>(row, name, "text")?.unwrap_or_default(),
        timestamp: column_of::<Option<i64>>(row, name, "timestamp")?.unwrap_or_default(),
        user: column_of(row, name, "user")?,
        replied_to: column_of(row, name, "replied_to")?,
        love: column_of(row, name, "loves")?,
        me_loved: column_of(row, name, "me_loved")?,
    })
}

fn decode_summary(row: &Row, name: &'static str) -> Result<PostSummary> {
    Ok(PostSummary {
        id: column_of(row, name, "id")?,
        description: column_of::<Option<String>>(row, name, "description")?.unwrap_or_default(),
        text: column_of::<Option<String>>(row, name, "text")?.unwrap_or_default(),
        hash: column_of::<Option<Vec<String>>>(row, name, "hash")?.unwrap_or_default(),
        like: column_of(row, name, "likes")?,
    })
}

/// Relation and label names come from the enums, never from input.
fn exists_query(kind: RelationKind) -> String {
    let target = kind.target();
    format!(
        "MATCH (:User {{name: $id}})-[r:{rel}]->(:{label} {{{key}: $to}}) \
         RETURN count(r) > 0 AS present;",
        rel = kind.as_str(),
        label = target.label(),
        key = target.key(),
    )
}

fn toggle_query(kind: RelationKind) -> String {
    let target = kind.target();
    format!(
        "MATCH (a:User {{name: $id}}) \
         MATCH (b:{label} {{{key}: $to}}) \
         OPTIONAL MATCH (a)-[r:{rel}]->(b) \
         WITH a, b, r, r IS NULL AS created \
         DELETE r \
         FOREACH (_ IN CASE WHEN created THEN [1] ELSE [] END | CREATE (a)-[:{rel}]->(b)) \
         RETURN created;",
        rel = kind.as_str(),
        label = target.label(),
        key = target.key(),
    )
}

fn list_query(kind: ListKind) -> &'static str {
    match kind {
        ListKind::Subscriber => {
            "MATCH (u:User)-[:Subscriber]->(:User {name: $id}) RETURN u.name AS name ORDER BY name;"
        }
        ListKind::Subscription => {
            "MATCH (:User {name: $id})-[:Subscriber]->(u:User) RETURN u.name AS name ORDER BY name;"
        }
        ListKind::Block => {
            "MATCH (:User {name: $id})-[:Block]->(u:User) RETURN u.name AS name ORDER BY name;"
        }
        ListKind::Request => {
            "MATCH (u:User)-[:Request]->(:User {name: $id}) RETURN u.name AS name ORDER BY name;"
        }
    }
}

fn decode_toggle(rows: &[Row], name: &'static str) -> Result<Option<Toggle>> {
    match rows.first() {
        Some(row) => {
            let created: bool = column_of(row, name, "created")?;
            Ok(Some(if created { Toggle::Created } else { Toggle::Deleted }))
        }
        None => Ok(None),
    }
}

#[async_trait]
impl GraphRepo for Memgraph {
    async fn create_user(&self, vanity: &str) -> Result<bool> {
        self.flag("create_user", query(CREATE_USER).param("id", vanity), "created")
            .await
    }

    async fn profile(&self, vanity: &str) -> Result<Option<Profile>> {
        let rows = self.fetch(query(PROFILE).param("id", vanity)).await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        Ok(Some(Profile {
            followers: column_of(row, "profile", "followers")?,
            following: column_of(row, "profile", "following")?,
            public: column_of::<Option<bool>>(row, "profile", "public")?.unwrap_or(true),
            suspended: column_of::<Option<bool>>(row, "profile", "suspended")?.unwrap_or(false),
        }))
    }

    async fn set_public(&self, vanity: &str, public: bool) -> Result<bool> {
        let q = query(SET_PUBLIC).param("id", vanity).param("value", public);
        Ok(!self.fetch(q).await?.is_empty())
    }

    async fn set_suspended(&self, vanity: &str, suspended: bool) -> Result<bool> {
        let q = query(SET_SUSPENDED).param("id", vanity).param("value", suspended);
        Ok(!self.fetch(q).await?.is_empty())
    }

    async fn delete_user(&self, vanity: &str) -> Result<Vec<String>> {
        let mut txn = self.graph.start_txn().await?;
        let rows = collect(&mut txn, query(USER_HASHES).param("id", vanity)).await?;
        let hashes = hashes(&rows, "delete_user")?;
        txn.run(query(DELETE_USER_POSTS).param("id", vanity)).await?;
        txn.run(query(DELETE_USER_COMMENTS).param("id", vanity)).await?;
        txn.run(query(DELETE_USER).param("id", vanity)).await?;
        txn.commit().await?;
        debug!("Deleted user {} with {} images", vanity, hashes.len());
        Ok(hashes)
    }

    async fn user_posts(&self, vanity: &str, skip: u32) -> Result<Vec<PostSummary>> {
        let q = query(USER_POSTS)
            .param("id", vanity)
            .param("skip", skip_param(skip))
            .param("limit", i64::from(POSTS_PER_PAGE));
        self.fetch(q)
            .await?
            .iter()
            .map(|row| decode_summary(row, "user_posts"))
            .collect()
    }

    async fn relation_list(&self, vanity: &str, kind: ListKind) -> Result<Vec<String>> {
        self.fetch(query(list_query(kind)).param("id", vanity))
            .await?
            .iter()
            .map(|row| column_of(row, "relation_list", "name"))
            .collect()
    }

    async fn export_user(&self, vanity: &str) -> Result<Option<UserExport>> {
        let mut txn = self.graph.start_txn().await?;
        let users = collect(&mut txn, query(EXPORT_USER).param("id", vanity)).await?;
        let Some(user) = users.first() else {
            txn.commit().await?;
            return Ok(None);
        };
        let post_rows = collect(&mut txn, query(EXPORT_POSTS).param("id", vanity)).await?;
        let comment_rows = collect(&mut txn, query(EXPORT_COMMENTS).param("id", vanity)).await?;
        txn.commit().await?;

        let name = "export_user";
        let posts = post_rows
            .iter()
            .map(|row| {
                Ok(ExportedPost {
                    id: column_of(row, name, "id")?,
                    description: column_of::<Option<String>>(row, name, "description")?
                        .unwrap_or_default(),
                    text: column_of::<Option<String>>(row, name, "text")?.unwrap_or_default(),
                    hash: column_of::<Option<Vec<String>>>(row, name, "hash")?.unwrap_or_default(),
                    tag: column_of(row, name, "tag")?,
                    likes: column_of(row, name, "likes")?,
                    relation: column_of(row, name, "relation")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let comments = comment_rows
            .iter()
            .map(|row| {
                Ok(ExportedComment {
                    id: column_of(row, name, "id")?,
                    text: column_of::<Option<String>>(row, name, "text")?.unwrap_or_default(),
                    timestamp: column_of::<Option<i64>>(row, name, "timestamp")?
                        .unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(UserExport {
            vanity: vanity.to_string(),
            community: column_of(user, name, "community")?,
            rank: column_of(user, name, "rank")?,
            public: column_of::<Option<bool>>(user, name, "public")?.unwrap_or(true),
            suspended: column_of::<Option<bool>>(user, name, "suspended")?.unwrap_or(false),
            posts,
            comments,
        }))
    }

    async fn relation_exists(&self, actor: &str, kind: RelationKind, target: &str) -> Result<bool> {
        let q = query(&exists_query(kind)).param("id", actor).param("to", target);
        self.flag("relation_exists", q, "present").await
    }

    async fn toggle_relation(
        &self,
        actor: &str,
        kind: RelationKind,
        target: &str,
    ) -> Result<Option<Toggle>> {
        let q = query(&toggle_query(kind)).param("id", actor).param("to", target);
        let rows = self.fetch(q).await?;
        decode_toggle(&rows, "toggle_relation")
    }

    async fn toggle_block(&self, actor: &str, target: &str) -> Result<Option<Toggle>> {
        let mut txn = self.graph.start_txn().await?;
        txn.run(query(CLEAR_SUBSCRIPTIONS).param("id", actor).param("to", target))
            .await?;
        let q = query(&toggle_query(RelationKind::Block))
            .param("id", actor)
            .param("to", target);
        let rows = collect(&mut txn, q).await?;
        txn.commit().await?;
        decode_toggle(&rows, "toggle_block")
    }

    async fn blocked_between(&self, a: &str, b: &str) -> Result<bool> {
        let q = query(BLOCKED_BETWEEN).param("a", a).param("b", b);
        self.flag("blocked_between", q, "blocked").await
    }

    async fn resolve_request(&self, requester: &str, target: &str, accept: bool) -> Result<bool> {
        let q = query(RESOLVE_REQUEST)
            .param("from", requester)
            .param("to", target)
            .param("accept", accept);
        Ok(!self.fetch(q).await?.is_empty())
    }

    async fn create_post(&self, post: NewPost) -> Result<bool> {
        let q = query(CREATE_POST)
            .param("author", post.author)
            .param("id", post.id)
            .param("description", post.description)
            .param("text", post.text)
            .param("hash", post.hash)
            .param("tag", post.tag);
        Ok(!self.fetch(q).await?.is_empty())
    }

    async fn post(&self, id: &str, viewer: Option<&str>) -> Result<Option<PostDetail>> {
        let viewer_param = viewer.unwrap_or_default();
        let rows = self
            .fetch(query(GET_POST).param("id", id).param("viewer", viewer_param))
            .await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };

        let name = "post";
        let mut detail = PostDetail {
            id: column_of(row, name, "id")?,
            description: column_of::<Option<String>>(row, name, "description")?.unwrap_or_default(),
            text: column_of::<Option<String>>(row, name, "text")?.unwrap_or_default(),
            hash: column_of::<Option<Vec<String>>>(row, name, "hash")?.unwrap_or_default(),
            like: column_of(row, name, "likes")?,
            author: column_of(row, name, "author")?,
            me_liked: column_of(row, name, "me_liked")?,
            comments: Vec::new(),
        };
        detail.comments = self.comments(id, 0, viewer).await?;
        Ok(Some(detail))
    }

    async fn post_author(&self, id: &str) -> Result<Option<String>> {
        let rows = self.fetch(query(POST_AUTHOR).param("id", id)).await?;
        rows.first()
            .map(|row| column_of(row, "post_author", "author"))
            .transpose()
    }

    async fn delete_post(&self, id: &str, author: &str) -> Result<Option<Vec<String>>> {
        let mut txn = self.graph.start_txn().await?;
        let rows = collect(
            &mut txn,
            query(OWNED_POST_HASHES).param("id", id).param("author", author),
        )
        .await?;
        if rows.is_empty() {
            txn.rollback().await?;
            return Ok(None);
        }
        let hashes = hashes(&rows, "delete_post")?;
        txn.run(query(DELETE_POST).param("id", id)).await?;
        txn.commit().await?;
        Ok(Some(hashes))
    }

    async fn comment_post(&self, comment_id: &str) -> Result<Option<String>> {
        let rows = self.fetch(query(COMMENT_POST).param("id", comment_id)).await?;
        rows.first()
            .map(|row| column_of(row, "comment_post", "post"))
            .transpose()
    }

    async fn comment_root(&self, comment_id: &str) -> Result<Option<String>> {
        let rows = self.fetch(query(COMMENT_ROOT).param("id", comment_id)).await?;
        rows.first()
            .map(|row| column_of(row, "comment_root", "root"))
            .transpose()
    }

    async fn add_comment(&self, comment: NewComment) -> Result<bool> {
        let q = query(ADD_COMMENT)
            .param("post", comment.post_id)
            .param("author", comment.author)
            .param("id", comment.id)
            .param("text", comment.text)
            .param("timestamp", comment.timestamp);
        Ok(!self.fetch(q).await?.is_empty())
    }

    async fn add_reply(&self, reply: NewReply) -> Result<bool> {
        let q = query(ADD_REPLY)
            .param("root", reply.root)
            .param("answered", reply.answered)
            .param("author", reply.author)
            .param("id", reply.id)
            .param("text", reply.text)
            .param("timestamp", reply.timestamp);
        Ok(!self.fetch(q).await?.is_empty())
    }

    async fn delete_comment(&self, id: &str, author: &str) -> Result<bool> {
        let mut txn = self.graph.start_txn().await?;
        let owned = collect(
            &mut txn,
            query(OWNED_COMMENT).param("id", id).param("author", author),
        )
        .await?;
        if owned.is_empty() {
            txn.rollback().await?;
            return Ok(false);
        }
        txn.run(query(DELETE_COMMENT).param("id", id)).await?;
        txn.commit().await?;
        Ok(true)
    }

    async fn comments(
        &self,
        post_id: &str,
        skip: u32,
        viewer: Option<&str>,
    ) -> Result<Vec<CommentView>> {
        let text = format!(
            "MATCH (:Post {{id: $post}})<-[:Comment]-(c:Comment)<-[:Wrote]-(u:User) {COMMENT_COLUMNS}"
        );
        let q = query(&text)
            .param("post", post_id)
            .param("viewer", viewer.unwrap_or_default())
            .param("skip", skip_param(skip))
            .param("limit", i64::from(COMMENTS_PER_PAGE));
        self.comment_page("comments", q).await
    }

    async fn replies(
        &self,
        post_id: &str,
        comment_id: &str,
        skip: u32,
        viewer: Option<&str>,
    ) -> Result<Vec<CommentView>> {
        let text = format!(
            "MATCH (:Post {{id: $post}})<-[:Comment]-(:Comment {{id: $comment}})\
             <-[:Reply]-(c:Comment)<-[:Wrote]-(u:User) {COMMENT_COLUMNS}"
        );
        let q = query(&text)
            .param("post", post_id)
            .param("comment", comment_id)
            .param("viewer", viewer.unwrap_or_default())
            .param("skip", skip_param(skip))
            .param("limit", i64::from(COMMENTS_PER_PAGE));
        self.comment_page("replies", q).await
    }

    async fn following_candidates(&self, viewer: &str) -> Result<Vec<Candidate>> {
        self.candidates("following_candidates", query(FOLLOWING_CANDIDATES).param("id", viewer))
            .await
    }

    async fn community_candidates(&self, viewer: &str) -> Result<Vec<Candidate>> {
        self.candidates("community_candidates", query(COMMUNITY_CANDIDATES).param("id", viewer))
            .await
    }

    async fn affinity_candidates(&self, viewer: &str) -> Result<Vec<Candidate>> {
        self.candidates("affinity_candidates", query(AFFINITY_CANDIDATES).param("id", viewer))
            .await
    }

    async fn rank_candidates(&self, viewer: &str, pool: &[String]) -> Result<Vec<FeedPost>> {
        let q = query(RANK_CANDIDATES)
            .param("id", viewer)
            .param("pool", pool.to_vec())
            .param("recent", RECENT_LIKES as i64)
            .param("limit", RANKED_LIMIT as i64);
        self.feed("rank_candidates", q).await
    }

    async fn most_liked(&self) -> Result<Vec<FeedPost>> {
        self.feed("most_liked", query(MOST_LIKED)).await
    }

    async fn refresh_page_rank(&self) -> Result<()> {
        self.run(query(PAGE_RANK)).await
    }

    async fn refresh_communities(&self) -> Result<()> {
        self.run(query(COMMUNITIES)).await
    }
}
