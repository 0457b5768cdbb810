pub mod accounts;
pub mod comments;
pub mod error;
pub mod middleware;
pub mod oauth;
pub mod posts;
pub mod recommendation;
pub mod relations;
pub mod routes;
pub mod snowflake;
pub mod state;
pub mod upstream;
pub mod users;
pub mod visibility;

pub use error::{ApiError, FeedError};
pub use routes::router;
pub use state::{AppState, AppStateInner, OAuthLinks};
