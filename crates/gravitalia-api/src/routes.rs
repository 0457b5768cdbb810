use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    http::{HeaderMap, header},
    response::IntoResponse,
    routing::{get, post},
};

use gravitalia_gateway::handle_connection;
use gravitalia_types::api::GatewayQuery;

use crate::error::ApiError;
use crate::state::AppState;
use crate::{accounts, comments, oauth, posts, recommendation, relations, users};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/callback", get(oauth::callback))
        .route(
            "/users/{id}",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route("/account/suspend", post(accounts::suspend))
        .route("/account/data", get(accounts::export_data))
        .route(
            "/relation/{kind}",
            post(relations::toggle_relation).get(relations::relation_exists),
        )
        .route("/requests/{vanity}", post(relations::resolve_request))
        .route("/list/{kind}", get(relations::list))
        .route("/posts/new", post(posts::create_post))
        .route("/posts/{id}", get(posts::get_post).delete(posts::delete_post))
        .route(
            "/comment/{id}",
            get(comments::list_comments)
                .post(comments::add_comment)
                .delete(comments::delete_comment),
        )
        .route("/recommendation/for_you_feed", get(recommendation::for_you_feed))
        .route("/recommendation/most_liked", get(recommendation::most_liked))
        .route("/gateway", get(gateway))
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

/// Browsers cannot set headers on WebSocket requests, so the token may
/// also come as `?token=`.
async fn gateway(
    State(state): State<AppState>,
    Query(query): Query<GatewayQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    let token = query
        .token
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        })
        .ok_or(ApiError::InvalidToken)?;
    let vanity = state.tokens.verify(&token).ok_or(ApiError::InvalidToken)?;

    let dispatcher = state.dispatcher.clone();
    Ok(ws.on_upgrade(move |socket| handle_connection(socket, dispatcher, vanity)))
}
