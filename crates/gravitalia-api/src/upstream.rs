//! Outbound collaborators: image classification and storage, the search
//! index and the OAuth provider. All of them speak JSON over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use gravitalia_types::api::OAuthUser;

pub const CLASSIFY_TIMEOUT: Duration = Duration::from_secs(5);
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(20);
pub const DELETE_TIMEOUT: Duration = Duration::from_secs(2);
const SEARCH_TIMEOUT: Duration = Duration::from_secs(5);
const OAUTH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{service} request failed: {source}")]
    Http {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} answered {status}")]
    Status {
        service: &'static str,
        status: reqwest::StatusCode,
    },

    #[error("{service} rejected the request: {message}")]
    Rejected {
        service: &'static str,
        message: String,
    },
}

/// Classifier models exposed by the tagging service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageModel {
    /// Returns a content tag such as `cat`.
    Tags,
    /// Returns `nude` for prohibited content.
    Nudity,
}

impl ImageModel {
    fn id(self) -> u8 {
        match self {
            Self::Tags => 0,
            Self::Nudity => 1,
        }
    }
}

#[async_trait]
pub trait MediaService: Send + Sync {
    async fn classify(&self, model: ImageModel, image: Bytes) -> Result<String, UpstreamError>;
    /// Stores the image and returns its hash.
    async fn upload(&self, image: Bytes) -> Result<String, UpstreamError>;
    async fn delete(&self, hash: &str) -> Result<(), UpstreamError>;
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn add_user(&self, user: &OAuthUser) -> Result<(), UpstreamError>;
    async fn remove_user(&self, vanity: &str) -> Result<(), UpstreamError>;
}

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Exchanges an authorization code for an access token.
    async fn exchange_code(&self, code: &str) -> Result<String, UpstreamError>;
    async fn fetch_user(&self, token: &str) -> Result<OAuthUser, UpstreamError>;
}

/// `{"error": bool, "message": string}` answers of the Gravitalia services.
#[derive(Debug, Deserialize)]
struct ServiceReply {
    #[serde(default)]
    error: bool,
    #[serde(default)]
    message: String,
}

async fn send(
    service: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<reqwest::Response, UpstreamError> {
    let response = request
        .send()
        .await
        .map_err(|source| UpstreamError::Http { service, source })?;
    let status = response.status();
    if !status.is_success() {
        return Err(UpstreamError::Status { service, status });
    }
    Ok(response)
}

async fn reply(
    service: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<String, UpstreamError> {
    let body: ServiceReply = send(service, request)
        .await?
        .json()
        .await
        .map_err(|source| UpstreamError::Http { service, source })?;
    if body.error {
        return Err(UpstreamError::Rejected {
            service,
            message: body.message,
        });
    }
    Ok(body.message)
}

pub struct HttpMedia {
    client: reqwest::Client,
    tagger_url: String,
    uploader_url: String,
}

impl HttpMedia {
    pub fn new(client: reqwest::Client, tagger_url: &str, uploader_url: &str) -> Self {
        Self {
            client,
            tagger_url: tagger_url.trim_end_matches('/').to_string(),
            uploader_url: uploader_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Serialize)]
struct PredictRequest {
    model: u8,
    data: String,
}

#[derive(Serialize)]
struct UploadRequest {
    data: String,
}

#[async_trait]
impl MediaService for HttpMedia {
    async fn classify(&self, model: ImageModel, image: Bytes) -> Result<String, UpstreamError> {
        let body = PredictRequest {
            model: model.id(),
            data: STANDARD.encode(&image),
        };
        let request = self
            .client
            .post(format!("{}/predict", self.tagger_url))
            .timeout(CLASSIFY_TIMEOUT)
            .json(&body);
        reply("tagger", request).await
    }

    async fn upload(&self, image: Bytes) -> Result<String, UpstreamError> {
        let body = UploadRequest {
            data: STANDARD.encode(&image),
        };
        let request = self
            .client
            .post(format!("{}/upload", self.uploader_url))
            .timeout(UPLOAD_TIMEOUT)
            .json(&body);
        reply("uploader", request).await
    }

    async fn delete(&self, hash: &str) -> Result<(), UpstreamError> {
        let request = self
            .client
            .delete(format!("{}/images/{}", self.uploader_url, hash))
            .timeout(DELETE_TIMEOUT);
        send("uploader", request).await?;
        Ok(())
    }
}

pub struct HttpSearch {
    client: reqwest::Client,
    url: String,
    auth: String,
}

impl HttpSearch {
    pub fn new(client: reqwest::Client, url: &str, auth: &str) -> Self {
        Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            auth: auth.to_string(),
        }
    }
}

#[derive(Serialize)]
struct SearchDocument<'a> {
    vanity: &'a str,
    username: &'a str,
    flags: u32,
}

#[derive(Serialize)]
struct SearchRemoval<'a> {
    vanity: &'a str,
}

#[async_trait]
impl SearchIndex for HttpSearch {
    async fn add_user(&self, user: &OAuthUser) -> Result<(), UpstreamError> {
        let document = SearchDocument {
            vanity: &user.vanity,
            username: &user.username,
            flags: user.flags,
        };
        let request = self
            .client
            .post(format!("{}/add", self.url))
            .header(reqwest::header::AUTHORIZATION, &self.auth)
            .timeout(SEARCH_TIMEOUT)
            .json(&document);
        send("search", request).await?;
        Ok(())
    }

    async fn remove_user(&self, vanity: &str) -> Result<(), UpstreamError> {
        let request = self
            .client
            .post(format!("{}/delete", self.url))
            .header(reqwest::header::AUTHORIZATION, &self.auth)
            .timeout(SEARCH_TIMEOUT)
            .json(&SearchRemoval { vanity });
        send("search", request).await?;
        Ok(())
    }
}

pub struct HttpOAuth {
    client: reqwest::Client,
    api_url: String,
    client_id: String,
    secret: String,
    redirect_url: String,
}

impl HttpOAuth {
    pub fn new(
        client: reqwest::Client,
        api_url: &str,
        client_id: &str,
        secret: &str,
        redirect_url: &str,
    ) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            secret: secret.to_string(),
            redirect_url: redirect_url.to_string(),
        }
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    code: &'a str,
    redirect_uri: &'a str,
}

#[async_trait]
impl OAuthProvider for HttpOAuth {
    async fn exchange_code(&self, code: &str) -> Result<String, UpstreamError> {
        let body = TokenRequest {
            client_id: &self.client_id,
            client_secret: &self.secret,
            code,
            redirect_uri: &self.redirect_url,
        };
        let request = self
            .client
            .post(format!("{}/oauth2/token", self.api_url))
            .timeout(OAUTH_TIMEOUT)
            .json(&body);
        reply("oauth", request).await
    }

    async fn fetch_user(&self, token: &str) -> Result<OAuthUser, UpstreamError> {
        let request = self
            .client
            .get(format!("{}/users/@me", self.api_url))
            .header(reqwest::header::AUTHORIZATION, token)
            .timeout(OAUTH_TIMEOUT);
        send("oauth", request)
            .await?
            .json()
            .await
            .map_err(|source| UpstreamError::Http {
                service: "oauth",
                source,
            })
    }
}
