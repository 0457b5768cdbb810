use std::env;

use anyhow::Context;

/// Placeholder secrets that must not reach production.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

/// Selects the in-process graph or cache instead of a remote one.
pub const MEMORY: &str = "memory";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,

    pub graph_url: String,
    pub graph_username: String,
    pub graph_password: String,
    pub cache_url: String,

    pub jwt_secret: String,
    pub rsa_public_key: Option<String>,
    pub global_auth: String,

    pub tagger_url: String,
    pub uploader_url: String,
    pub search_url: String,
    pub search_auth: String,

    pub oauth_host: String,
    pub oauth_api: String,
    pub oauth_client_id: String,
    pub oauth_secret: String,
    pub redirect_url: String,
    pub frontend_url: String,

    pub region_id: u8,
    pub worker_id: u8,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parsed_or<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value.parse().with_context(|| format!("invalid {key}: {value}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let rsa_public_key = env::var("RSA_PUBLIC_KEY").ok().filter(|k| !k.trim().is_empty());
        let jwt_secret = env::var("JWT_SECRET").unwrap_or_default();
        if rsa_public_key.is_none()
            && (jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()))
        {
            anyhow::bail!("set RSA_PUBLIC_KEY, or a JWT_SECRET that is not a placeholder");
        }

        let global_auth = env::var("GLOBAL_AUTH").unwrap_or_default();
        if PLACEHOLDER_SECRETS.contains(&global_auth.as_str()) {
            anyhow::bail!("GLOBAL_AUTH is still a placeholder");
        }

        Ok(Self {
            host: var_or("HOST", "0.0.0.0"),
            port: parsed_or("PORT", 8888)?,
            graph_url: var_or("GRAPH_URL", "bolt://127.0.0.1:7687"),
            graph_username: var_or("GRAPH_USERNAME", ""),
            graph_password: var_or("GRAPH_PASSWORD", ""),
            cache_url: var_or("CACHE_URL", "redis://127.0.0.1:6379"),
            jwt_secret,
            rsa_public_key,
            global_auth,
            tagger_url: var_or("TAGGER_URL", "http://127.0.0.1:50051"),
            uploader_url: var_or("UPLOADER_URL", "http://127.0.0.1:50052"),
            search_url: var_or("SEARCH_URL", "http://127.0.0.1:7700"),
            search_auth: var_or("SEARCH_AUTH", ""),
            oauth_host: var_or("OAUTH_HOST", "https://oauth.gravitalia.com"),
            oauth_api: var_or("OAUTH_API", "https://oauth.gravitalia.com"),
            oauth_client_id: var_or("OAUTH_CLIENT_ID", "suba"),
            oauth_secret: var_or("OAUTH_SECRET", ""),
            redirect_url: var_or("REDIRECT_URL", "http://localhost:8888/callback"),
            frontend_url: var_or("FRONTEND_URL", "http://localhost:5173"),
            region_id: parsed_or("REGION_ID", 0)?,
            worker_id: parsed_or("WORKER_ID", 0)?,
        })
    }

    pub fn uses_memory_graph(&self) -> bool {
        self.graph_url == MEMORY
    }

    pub fn uses_memory_cache(&self) -> bool {
        self.cache_url == MEMORY
    }
}
