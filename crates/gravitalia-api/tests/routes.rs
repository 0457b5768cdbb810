use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use bytes::Bytes;
use http_body_util::BodyExt;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;

use gravitalia_api::middleware::TokenVerifier;
use gravitalia_api::snowflake::Snowflake;
use gravitalia_api::upstream::{ImageModel, MediaService, OAuthProvider, SearchIndex, UpstreamError};
use gravitalia_api::{AppState, AppStateInner, OAuthLinks, router};
use gravitalia_db::{GraphRepo, MemoryCache, MemoryGraph, NewPost};
use gravitalia_gateway::Dispatcher;
use gravitalia_types::api::{Claims, OAuthUser};
use gravitalia_types::events::{GatewayEvent, Notification, NotificationKind};
use gravitalia_types::relation::RelationKind;

const SECRET: &str = "test-secret";
const GLOBAL_AUTH: &str = "global-key";

/// Flags any image whose bytes start with `nude`; tags everything `cat`.
/// Uploads of images starting with `fail` are refused.
#[derive(Default)]
struct FakeMedia {
    uploads: Mutex<Vec<Bytes>>,
    deleted: Mutex<Vec<String>>,
}

#[async_trait]
impl MediaService for FakeMedia {
    async fn classify(&self, model: ImageModel, image: Bytes) -> Result<String, UpstreamError> {
        Ok(match model {
            ImageModel::Tags => "cat".into(),
            ImageModel::Nudity if image.starts_with(b"nude") => "nude".into(),
            ImageModel::Nudity => "safe".into(),
        })
    }

    async fn upload(&self, image: Bytes) -> Result<String, UpstreamError> {
        if image.starts_with(b"fail") {
            return Err(UpstreamError::Rejected {
                service: "media",
                message: "upload refused".into(),
            });
        }
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push(image);
        Ok(format!("hash{}", uploads.len()))
    }

    async fn delete(&self, hash: &str) -> Result<(), UpstreamError> {
        self.deleted.lock().unwrap().push(hash.to_string());
        Ok(())
    }
}

struct NoSearch;

#[async_trait]
impl SearchIndex for NoSearch {
    async fn add_user(&self, _user: &OAuthUser) -> Result<(), UpstreamError> {
        Ok(())
    }

    async fn remove_user(&self, _vanity: &str) -> Result<(), UpstreamError> {
        Ok(())
    }
}

struct FakeOAuth;

#[async_trait]
impl OAuthProvider for FakeOAuth {
    async fn exchange_code(&self, code: &str) -> Result<String, UpstreamError> {
        if code == "good" {
            Ok("provider-token".into())
        } else {
            Err(UpstreamError::Rejected {
                service: "oauth",
                message: "invalid code".into(),
            })
        }
    }

    async fn fetch_user(&self, _token: &str) -> Result<OAuthUser, UpstreamError> {
        Ok(OAuthUser {
            username: "Dave".into(),
            vanity: "dave".into(),
            flags: 0,
        })
    }
}

struct Harness {
    app: Router,
    graph: Arc<MemoryGraph>,
    media: Arc<FakeMedia>,
    dispatcher: Dispatcher,
}

async fn harness(users: &[&str]) -> Harness {
    let graph = Arc::new(MemoryGraph::new());
    for user in users {
        graph.create_user(user).await.unwrap();
    }
    let media = Arc::new(FakeMedia::default());
    let dispatcher = Dispatcher::new();

    let state: AppState = Arc::new(AppStateInner {
        graph: graph.clone(),
        cache: Arc::new(MemoryCache::new()),
        media: media.clone(),
        search: Arc::new(NoSearch),
        oauth: Arc::new(FakeOAuth),
        tokens: TokenVerifier::from_secret(SECRET),
        dispatcher: dispatcher.clone(),
        ids: Snowflake::new(0, 0),
        global_auth: GLOBAL_AUTH.into(),
        links: OAuthLinks {
            oauth_host: "https://oauth.example".into(),
            client_id: "gravitalia".into(),
            redirect_url: "https://api.example/callback".into(),
            frontend_url: "https://www.example".into(),
        },
    });

    Harness {
        app: router(state),
        graph,
        media,
        dispatcher,
    }
}

fn token(vanity: &str) -> String {
    let claims = Claims {
        sub: vanity.into(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        iat: None,
        iss: None,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn request(method: &str, uri: &str, auth: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn seed_post(graph: &MemoryGraph, id: &str, author: &str) {
    graph
        .create_post(NewPost {
            id: id.into(),
            author: author.into(),
            description: format!("post {id}"),
            text: String::new(),
            hash: vec![format!("img{id}")],
            tag: "cat".into(),
        })
        .await
        .unwrap();
}

fn notification(event: GatewayEvent) -> Notification {
    match event {
        GatewayEvent::Notification(notification) => notification,
        other => panic!("expected a notification, got {other:?}"),
    }
}

#[tokio::test]
async fn health_check() {
    let h = harness(&[]).await;
    let response = h.app.clone().oneshot(request("GET", "/", None, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"OK");
}

#[tokio::test]
async fn empty_feed_is_an_empty_list() {
    let h = harness(&["alice"]).await;
    let (status, body) = send(
        &h.app,
        request("GET", "/recommendation/for_you_feed", Some(&token("alice")), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn feed_requires_a_token() {
    let h = harness(&["alice"]).await;
    let (status, body) = send(&h.app, request("GET", "/recommendation/for_you_feed", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], true);

    let (status, _) = send(
        &h.app,
        request("GET", "/recommendation/for_you_feed", Some("garbage"), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn like_toggles_back_and_forth() {
    let h = harness(&["alice", "bob"]).await;
    seed_post(&h.graph, "100", "bob").await;
    let alice = token("alice");

    let like = || request("POST", "/relation/like", Some(&alice), Some(json!({ "id": "100" })));
    let (status, body) = send(&h.app, like()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Created relation");
    assert!(h.graph.relation_exists("alice", RelationKind::Like, "100").await.unwrap());

    let (_, body) = send(&h.app, like()).await;
    assert_eq!(body["message"], "Deleted relation");
    assert!(!h.graph.relation_exists("alice", RelationKind::Like, "100").await.unwrap());
}

#[tokio::test]
async fn relation_exists_reports_as_message() {
    let h = harness(&["alice", "bob"]).await;
    let alice = token("alice");
    send(
        &h.app,
        request("POST", "/relation/subscriber", Some(&alice), Some(json!({ "id": "bob" }))),
    )
    .await;

    let (status, body) = send(
        &h.app,
        request("GET", "/relation/subscriber?target=bob", Some(&alice), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "true");

    let (status, _) = send(&h.app, request("GET", "/relation/subscriber", Some(&alice), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_relation_is_rejected() {
    let h = harness(&["alice", "bob"]).await;
    let (status, body) = send(
        &h.app,
        request("POST", "/relation/create", Some(&token("alice")), Some(json!({ "id": "bob" }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], true);
}

#[tokio::test]
async fn blocked_users_cannot_subscribe() {
    let h = harness(&["alice", "bob"]).await;
    let (_, body) = send(
        &h.app,
        request("POST", "/relation/block", Some(&token("bob")), Some(json!({ "id": "alice" }))),
    )
    .await;
    assert_eq!(body["message"], "Created relation");

    let (status, body) = send(
        &h.app,
        request("POST", "/relation/subscriber", Some(&token("alice")), Some(json!({ "id": "bob" }))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Invalid user");
    assert!(
        !h.graph
            .relation_exists("alice", RelationKind::Subscriber, "bob")
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn private_account_gets_a_request() {
    let h = harness(&["alice", "bob"]).await;
    let (status, _) = send(
        &h.app,
        request("PATCH", "/users/@me", Some(&token("bob")), Some(json!({ "public": false }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &h.app,
        request("POST", "/relation/subscriber", Some(&token("alice")), Some(json!({ "id": "bob" }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Request added");
    assert!(!h.graph.relation_exists("alice", RelationKind::Subscriber, "bob").await.unwrap());
    assert!(h.graph.relation_exists("alice", RelationKind::Request, "bob").await.unwrap());

    let (_, pending) = send(&h.app, request("GET", "/list/request", Some(&token("bob")), None)).await;
    assert_eq!(pending, json!(["alice"]));

    let (status, body) = send(
        &h.app,
        request("POST", "/requests/alice", Some(&token("bob")), Some(json!({ "accept": true }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Created relation");
    assert!(h.graph.relation_exists("alice", RelationKind::Subscriber, "bob").await.unwrap());
    assert!(!h.graph.relation_exists("alice", RelationKind::Request, "bob").await.unwrap());
}

#[tokio::test]
async fn unknown_post_is_not_found() {
    let h = harness(&["alice"]).await;
    let (status, body) = send(&h.app, request("GET", "/posts/999", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": true, "message": "Invalid post" }));
}

#[tokio::test]
async fn private_posts_are_hidden_from_strangers() {
    let h = harness(&["alice", "bob"]).await;
    seed_post(&h.graph, "100", "bob").await;
    h.graph.set_public("bob", false).await.unwrap();

    let (status, _) = send(&h.app, request("GET", "/posts/100", Some(&token("alice")), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&h.app, request("GET", "/posts/100", Some(&token("bob")), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["author"], "bob");
}

#[tokio::test]
async fn create_post_uploads_safe_images() {
    let h = harness(&["alice"]).await;
    let (status, body) = send(
        &h.app,
        request(
            "POST",
            "/posts/new",
            Some(&token("alice")),
            Some(json!({ "description": "hello", "images": ["Y2F0", "ZG9n"] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["message"].as_str().unwrap().to_string();
    assert_eq!(h.media.uploads.lock().unwrap().len(), 2);

    let post = h.graph.post(&id, None).await.unwrap().unwrap();
    assert_eq!(post.author, "alice");
    assert_eq!(post.hash.len(), 2);
}

#[tokio::test]
async fn nude_images_are_refused() {
    let h = harness(&["alice"]).await;
    // "bnVkZQ==" is base64 for "nude".
    let (status, body) = send(
        &h.app,
        request(
            "POST",
            "/posts/new",
            Some(&token("alice")),
            Some(json!({ "images": ["Y2F0", "bnVkZQ=="] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], true);
    assert!(h.media.uploads.lock().unwrap().is_empty());
    assert!(h.graph.user_posts("alice", 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn too_many_images() {
    let h = harness(&["alice"]).await;
    let images = vec!["Y2F0"; 6];
    let (status, _) = send(
        &h.app,
        request("POST", "/posts/new", Some(&token("alice")), Some(json!({ "images": images }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn comments_and_replies() {
    let h = harness(&["alice", "bob"]).await;
    seed_post(&h.graph, "100", "bob").await;
    let alice = token("alice");

    let (status, body) = send(
        &h.app,
        request("POST", "/comment/100", Some(&alice), Some(json!({ "content": "nice" }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let root = body["message"].as_str().unwrap().to_string();

    let (status, _) = send(
        &h.app,
        request(
            "POST",
            "/comment/100",
            Some(&token("bob")),
            Some(json!({ "content": "thanks", "reply_to": root })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, comments) = send(&h.app, request("GET", "/comment/100", None, None)).await;
    assert_eq!(comments.as_array().unwrap().len(), 1);
    assert_eq!(comments[0]["text"], "nice");

    let (_, replies) = send(
        &h.app,
        request("GET", &format!("/comment/100?reply={root}"), None, None),
    )
    .await;
    assert_eq!(replies[0]["text"], "thanks");

    let (status, _) = send(
        &h.app,
        request("DELETE", &format!("/comment/{root}"), Some(&token("bob")), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &h.app,
        request("DELETE", &format!("/comment/{root}"), Some(&alice), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Deleted comment");
}

#[tokio::test]
async fn data_export_is_rate_limited() {
    let h = harness(&["alice"]).await;
    let alice = token("alice");

    let (status, body) = send(&h.app, request("GET", "/account/data", Some(&alice), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["vanity"], "alice");

    let (status, body) = send(&h.app, request("GET", "/account/data", Some(&alice), None)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], true);

    // The global key is not limited.
    let (status, _) = send(
        &h.app,
        request("GET", "/account/data?vanity=alice", Some(GLOBAL_AUTH), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn suspend_requires_global_key() {
    let h = harness(&["alice", "bob"]).await;
    let (status, _) = send(
        &h.app,
        request("POST", "/account/suspend?vanity=bob", Some(&token("alice")), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &h.app,
        request("POST", "/account/suspend?vanity=bob", Some(GLOBAL_AUTH), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&h.app, request("GET", "/users/bob", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleted_account_cannot_log_back_in() {
    let h = harness(&["dave"]).await;
    let (status, _) = send(&h.app, request("DELETE", "/users/@me", Some(&token("dave")), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(h.graph.profile("dave").await.unwrap().is_none());

    // Start the flow to get a known state.
    let response = h
        .app
        .clone()
        .oneshot(request("GET", "/callback", None, None))
        .await
        .unwrap();
    let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
    let state = location.rsplit("state=").next().unwrap().to_string();

    let (status, body) = send(
        &h.app,
        request("GET", &format!("/callback?state={state}&code=good"), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Account deleted too soon");
}

#[tokio::test]
async fn oauth_flow_creates_the_user() {
    let h = harness(&[]).await;
    let response = h
        .app
        .clone()
        .oneshot(request("GET", "/callback", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
    assert!(location.starts_with("https://oauth.example/oauth2/authorize?client_id=gravitalia"));
    let state = location.rsplit("state=").next().unwrap().to_string();
    assert_eq!(state.len(), 24);

    let response = h
        .app
        .clone()
        .oneshot(request("GET", &format!("/callback?state={state}&code=good"), None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers()[header::LOCATION],
        "https://www.example/callback?token=provider-token"
    );
    assert!(h.graph.profile("dave").await.unwrap().is_some());
}

#[tokio::test]
async fn bad_code_is_rejected() {
    let h = harness(&[]).await;
    let response = h
        .app
        .clone()
        .oneshot(request("GET", "/callback", None, None))
        .await
        .unwrap();
    let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
    let state = location.rsplit("state=").next().unwrap().to_string();

    let (status, _) = send(
        &h.app,
        request("GET", &format!("/callback?state={state}&code=bad"), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn like_notifies_the_author() {
    let h = harness(&["alice", "bob"]).await;
    seed_post(&h.graph, "100", "bob").await;
    let (_, mut bob) = h.dispatcher.register("bob");

    send(
        &h.app,
        request("POST", "/relation/like", Some(&token("alice")), Some(json!({ "id": "100" }))),
    )
    .await;

    let event = notification(bob.try_recv().unwrap());
    assert_eq!(event.kind, NotificationKind::PostLike);
    assert_eq!(event.from, "alice");
    assert_eq!(event.to, "100");
    assert!(event.important);

    // Unliking is silent.
    send(
        &h.app,
        request("POST", "/relation/like", Some(&token("alice")), Some(json!({ "id": "100" }))),
    )
    .await;
    assert!(bob.try_recv().is_err());
}

#[tokio::test]
async fn liking_your_own_post_is_silent() {
    let h = harness(&["bob"]).await;
    seed_post(&h.graph, "100", "bob").await;
    let (_, mut bob) = h.dispatcher.register("bob");

    let (_, body) = send(
        &h.app,
        request("POST", "/relation/like", Some(&token("bob")), Some(json!({ "id": "100" }))),
    )
    .await;
    assert_eq!(body["message"], "Created relation");
    assert!(bob.try_recv().is_err());
}

#[tokio::test]
async fn subscription_requests_notify_both_sides() {
    let h = harness(&["alice", "bob"]).await;
    h.graph.set_public("bob", false).await.unwrap();
    let (_, mut alice) = h.dispatcher.register("alice");
    let (_, mut bob) = h.dispatcher.register("bob");

    send(
        &h.app,
        request("POST", "/relation/subscriber", Some(&token("alice")), Some(json!({ "id": "bob" }))),
    )
    .await;
    let event = notification(bob.try_recv().unwrap());
    assert_eq!(event.kind, NotificationKind::RequestSubscription);
    assert_eq!(event.from, "alice");
    assert_eq!(event.to, "bob");
    assert!(alice.try_recv().is_err());

    send(
        &h.app,
        request("POST", "/requests/alice", Some(&token("bob")), Some(json!({ "accept": true }))),
    )
    .await;
    let event = notification(alice.try_recv().unwrap());
    assert_eq!(event.kind, NotificationKind::SubscriptionAccepted);
    assert_eq!(event.from, "bob");
    assert_eq!(event.to, "alice");
    assert!(!event.important);
    assert!(bob.try_recv().is_err());
}

#[tokio::test]
async fn public_subscription_is_silent() {
    let h = harness(&["alice", "bob"]).await;
    let (_, mut bob) = h.dispatcher.register("bob");

    let (_, body) = send(
        &h.app,
        request("POST", "/relation/subscriber", Some(&token("alice")), Some(json!({ "id": "bob" }))),
    )
    .await;
    assert_eq!(body["message"], "Created relation");
    assert!(bob.try_recv().is_err());
}

#[tokio::test]
async fn feed_hides_private_blocking_and_suspended_authors() {
    let h = harness(&["alice", "bob", "carol", "mallory", "sam", "dave"]).await;
    for (id, author) in [
        ("101", "bob"),
        ("102", "carol"),
        ("103", "mallory"),
        ("104", "sam"),
        ("105", "dave"),
    ] {
        seed_post(&h.graph, id, author).await;
    }
    h.graph.set_public("carol", false).await.unwrap();
    h.graph.toggle_block("mallory", "alice").await.unwrap();
    h.graph.set_suspended("sam", true).await.unwrap();
    h.graph
        .toggle_relation("alice", RelationKind::Like, "101")
        .await
        .unwrap();

    let (status, body) = send(
        &h.app,
        request("GET", "/recommendation/for_you_feed", Some(&token("alice")), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let mut ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|post| post["id"].as_str().unwrap())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["101", "105"]);
}

#[tokio::test]
async fn comment_length_is_capped() {
    let h = harness(&["alice", "bob"]).await;
    seed_post(&h.graph, "100", "bob").await;
    let alice = token("alice");

    let (status, _) = send(
        &h.app,
        request(
            "POST",
            "/comment/100",
            Some(&alice),
            Some(json!({ "content": "é".repeat(500) })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &h.app,
        request(
            "POST",
            "/comment/100",
            Some(&alice),
            Some(json!({ "content": "a".repeat(501) })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], true);

    let (status, _) = send(
        &h.app,
        request("POST", "/comment/100", Some(&alice), Some(json!({ "content": "" }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn failed_upload_removes_the_other_images() {
    let h = harness(&["alice"]).await;
    // "ZmFpbA==" is base64 for "fail".
    let (status, body) = send(
        &h.app,
        request(
            "POST",
            "/posts/new",
            Some(&token("alice")),
            Some(json!({ "images": ["Y2F0", "ZmFpbA==", "ZG9n"] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], true);
    assert!(h.graph.user_posts("alice", 0).await.unwrap().is_empty());

    // Cleanup runs in the background.
    for _ in 0..50 {
        if h.media.deleted.lock().unwrap().len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let mut deleted = h.media.deleted.lock().unwrap().clone();
    deleted.sort();
    assert_eq!(deleted, vec!["hash1", "hash2"]);
}
