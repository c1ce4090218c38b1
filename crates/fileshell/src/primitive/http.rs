//! `reqwest`-backed primitives.
//!
//! Every call builds its own request from a shared `Client` (which only pools
//! connections), so two calls in flight never observe each other's outcome.

use std::time::Duration;

use anyhow::Context;
use protocol::{Payload, Session};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};
use url::Url;

use super::{
    PrimitiveError, RemoteFilePrimitive, Verb, HEADER_REMOTE_GROUP, HEADER_REMOTE_HOME,
    HEADER_REMOTE_USER, HEADER_REQUESTED_WITH, REQUESTED_WITH_VALUE,
};
use crate::config::Config;

/// Primitives speaking HTTP to a file service rooted at `root`.
#[derive(Debug, Clone)]
pub struct HttpPrimitive {
    client: Client,
    /// Service root; always ends with `/`.
    root: Url,
}

impl HttpPrimitive {
    /// Create primitives from an existing client.
    pub fn new(client: Client, root: Url) -> Self {
        Self {
            client,
            root: with_trailing_slash(root),
        }
    }

    /// Build the client and root URL from configuration.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http.timeout_secs))
            .user_agent(config.http.user_agent.clone())
            .build()
            .context("Failed to build HTTP client")?;

        let root = config.root_url()?;
        Ok(Self::new(client, root))
    }

    pub fn root(&self) -> &Url {
        &self.root
    }

    /// Resolve a service path against the root.
    ///
    /// Each segment is percent-encoded on its own, so `?`, `#` and `%` in a
    /// file name stay part of the path.
    fn url(&self, target: &str) -> Result<Url, PrimitiveError> {
        let mut url = self.root.clone();
        url.path_segments_mut()
            .map_err(|_| {
                PrimitiveError::transport(0, format!("service root {} has no path", self.root))
            })?
            .pop_if_empty()
            .extend(target.trim_start_matches('/').split('/'));
        Ok(url)
    }

    fn request(
        &self,
        verb: Verb,
        url: Url,
        authorization: Option<&str>,
    ) -> RequestBuilder {
        let method = match verb {
            Verb::Read => Method::GET,
            Verb::Write => Method::PUT,
            Verb::Update => Method::POST,
            Verb::Delete => Method::DELETE,
        };
        let mut builder = self
            .client
            .request(method, url)
            .header(HEADER_REQUESTED_WITH, REQUESTED_WITH_VALUE);
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder
    }

    async fn send(
        &self,
        verb: Verb,
        target: &str,
        body: Option<&Payload>,
        authorization: Option<&str>,
    ) -> Result<Response, PrimitiveError> {
        let url = self.url(target)?;
        debug!(
            method = verb.method(),
            url = %url,
            authorized = authorization.is_some(),
            "Issuing request"
        );

        let mut builder = self.request(verb, url, authorization);
        if let Some(payload) = body {
            if let Some(content_type) = &payload.content_type {
                builder = builder.header(CONTENT_TYPE, content_type.as_str());
            }
            builder = builder.body(payload.data.clone());
        } else if verb == Verb::Write {
            builder = builder.body(Vec::<u8>::new());
        }

        let response = builder.send().await.map_err(transport_error)?;
        classify(response)
    }

    async fn into_payload(response: Response) -> Result<Payload, PrimitiveError> {
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let data = response.bytes().await.map_err(transport_error)?;
        Ok(Payload { data, content_type })
    }
}

impl RemoteFilePrimitive for HttpPrimitive {
    fn request_uri(&self, target: &str) -> String {
        self.url(target)
            .map(|url| url.path().to_string())
            .unwrap_or_else(|_| target.to_string())
    }

    fn locate(&self, target: &str) -> String {
        self.url(target)
            .map(String::from)
            .unwrap_or_else(|_| target.to_string())
    }

    async fn read(
        &self,
        target: &str,
        authorization: Option<&str>,
    ) -> Result<Payload, PrimitiveError> {
        let response = self.send(Verb::Read, target, None, authorization).await?;
        Self::into_payload(response).await
    }

    async fn write(
        &self,
        target: &str,
        payload: Option<&Payload>,
        authorization: Option<&str>,
    ) -> Result<Payload, PrimitiveError> {
        let response = self.send(Verb::Write, target, payload, authorization).await?;
        Self::into_payload(response).await
    }

    async fn update(
        &self,
        target: &str,
        payload: &Payload,
        authorization: Option<&str>,
    ) -> Result<Payload, PrimitiveError> {
        let response = self
            .send(Verb::Update, target, Some(payload), authorization)
            .await?;
        Self::into_payload(response).await
    }

    async fn delete(
        &self,
        target: &str,
        authorization: Option<&str>,
    ) -> Result<(), PrimitiveError> {
        self.send(Verb::Delete, target, None, authorization).await?;
        Ok(())
    }

    async fn probe(&self, authorization: Option<&str>) -> Result<Option<Session>, PrimitiveError> {
        let response = self.send(Verb::Read, "/", None, authorization).await?;
        let headers = response.headers();
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };

        Ok(header(HEADER_REMOTE_USER).map(|principal| Session {
            principal,
            group: header(HEADER_REMOTE_GROUP),
            home: header(HEADER_REMOTE_HOME),
        }))
    }
}

/// Map a response status onto the primitive outcome taxonomy.
fn classify(response: Response) -> Result<Response, PrimitiveError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            let challenge = response
                .headers()
                .get(WWW_AUTHENTICATE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            debug!(status = status.as_u16(), ?challenge, "Service requested authentication");
            Err(PrimitiveError::AuthenticationRequired { challenge })
        }
        StatusCode::NOT_FOUND => Err(PrimitiveError::NotFound {
            url: response.url().to_string(),
        }),
        other => {
            warn!(status = other.as_u16(), url = %response.url(), "Request failed");
            Err(PrimitiveError::transport(
                other.as_u16(),
                other.canonical_reason().unwrap_or("unexpected status"),
            ))
        }
    }
}

fn transport_error(err: reqwest::Error) -> PrimitiveError {
    let status = err.status().map(|s| s.as_u16()).unwrap_or(0);
    let message = if err.is_timeout() {
        format!("request timed out: {err}")
    } else {
        err.to_string()
    };
    PrimitiveError::Transport { status, message }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
