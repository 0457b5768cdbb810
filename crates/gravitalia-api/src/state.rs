use std::sync::Arc;

use gravitalia_db::{Cache, GraphRepo};
use gravitalia_gateway::Dispatcher;

use crate::middleware::TokenVerifier;
use crate::snowflake::Snowflake;
use crate::upstream::{MediaService, OAuthProvider, SearchIndex};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub graph: Arc<dyn GraphRepo>,
    pub cache: Arc<dyn Cache>,
    pub media: Arc<dyn MediaService>,
    pub search: Arc<dyn SearchIndex>,
    pub oauth: Arc<dyn OAuthProvider>,
    pub tokens: TokenVerifier,
    pub dispatcher: Dispatcher,
    pub ids: Snowflake,
    /// Shared key of trusted internal callers. Empty disables admin routes.
    pub global_auth: String,
    pub links: OAuthLinks,
}

/// Where the login flow sends the browser.
#[derive(Debug, Clone)]
pub struct OAuthLinks {
    /// Provider front-end hosting `/oauth2/authorize`.
    pub oauth_host: String,
    pub client_id: String,
    /// Our own `/callback`, as registered with the provider.
    pub redirect_url: String,
    /// Front-end page receiving `?token=`.
    pub frontend_url: String,
}
