use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use common::auth::{bearer_header, is_token_expired, strip_bearer};
use common::config::WatchdogConfig;
use common::{HostInfo, LoginRequest, LoginResponse, sort_hosts};
use natural_order::natural_sort;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub const DEFAULT_API_URL: &str = "http://localhost:9999";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("Please login first")]
    NotLoggedIn,
    #[error("Session expired, please login again")]
    SessionExpired,
    #[error("Unauthorized (401): {0}")]
    Unauthorized(String),
    #[error("Client error ({status}): {message}")]
    Client { status: u16, message: String },
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },
}

impl ClientError {
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = server_message(body);
        let code = status.as_u16();

        if status == StatusCode::UNAUTHORIZED {
            Self::Unauthorized(message.unwrap_or_else(|| "Invalid or expired token".to_string()))
        } else if status.is_client_error() {
            Self::Client {
                status: code,
                message: message.unwrap_or_else(|| "Request parameter error".to_string()),
            }
        } else {
            Self::Server {
                status: code,
                message: message.unwrap_or_else(|| "Server internal error".to_string()),
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    #[serde(default)]
    message: String,
}

fn server_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.message.or(parsed.error))
        .filter(|message| !message.trim().is_empty())
}

#[derive(Clone)]
pub struct WatchdogClient {
    http: Client,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
}

impl WatchdogClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("failed to build http client")?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn set_token(&self, token: impl AsRef<str>) {
        let token = strip_bearer(token.as_ref()).to_string();
        *self.token.write().await = Some(token);
    }

    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    pub async fn clear_token(&self) {
        self.token.write().await.take();
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        let request = self.http.post(self.url("/login")).json(&LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        });

        let login: LoginResponse = self.send(request, "login").await?;
        self.set_token(&login.token).await;
        info!(username, "logged in to watchdog api");

        Ok(login)
    }

    pub async fn hosts(&self) -> Result<Vec<String>> {
        let request = self.authorized(self.http.get(self.url("/hosts"))).await?;
        let mut hosts: Vec<String> = self
            .send::<Option<Vec<String>>>(request, "host list")
            .await?
            .unwrap_or_default();
        natural_sort(&mut hosts);
        Ok(hosts)
    }

    /// Fetches miner details for one host, or for every host when `host` is
    /// `None`. Hosts and their miners come back in natural order.
    pub async fn host_info(&self, host: Option<&str>) -> Result<Vec<HostInfo>> {
        let request = self.authorized(self.list_request(host)).await?;

        let mut hosts = self
            .send::<Option<Vec<HostInfo>>>(request, "storage node list")
            .await?
            .unwrap_or_default();
        sort_hosts(&mut hosts);
        debug!(host_count = hosts.len(), "fetched storage node list");
        Ok(hosts)
    }

    pub async fn config(&self) -> Result<WatchdogConfig> {
        let request = self.authorized(self.http.get(self.url("/config"))).await?;
        let config: WatchdogConfig = self.send(request, "config").await?;
        Ok(config.with_defaults())
    }

    pub async fn set_config(&self, config: &WatchdogConfig) -> Result<String> {
        config.validate()?;

        let request = self
            .authorized(self.http.post(self.url("/config")).json(config))
            .await?;
        let body: MessageBody = self.send(request, "config update").await?;
        info!(hosts = config.hosts.len(), "submitted watchdog config");
        Ok(body.message)
    }

    fn list_request(&self, host: Option<&str>) -> RequestBuilder {
        let request = self.http.get(self.url("/list"));
        match host {
            Some(host) => request.query(&[("host", host)]),
            None => request,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.token().await.ok_or(ClientError::NotLoggedIn)?;

        if is_token_expired(&token) {
            warn!("stored token expired, clearing session");
            self.clear_token().await;
            return Err(ClientError::SessionExpired.into());
        }

        Ok(request.header(AUTHORIZATION, bearer_header(&token)))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let response = request
            .send()
            .await
            .with_context(|| format!("failed to contact watchdog api for {what}"))?;
        let status = response.status();

        if status.is_success() {
            return response
                .json::<T>()
                .await
                .with_context(|| format!("failed to decode {what} response"));
        }

        if status == StatusCode::UNAUTHORIZED {
            self.clear_token().await;
        }

        let body = response.text().await.unwrap_or_default();
        Err(ClientError::from_status(status, &body).into())
    }
}
