use crate::config::{ClientConfig, FolderConfig};
use crate::error::{SyncWatchError, SyncWatchResult};
use crate::syncthing::events::RawEvent;
use crate::syncthing::{EventSource, SyncthingApi};
use crate::watcher::notifier::{NotifyError, Notifier};
use async_trait::async_trait;
use backoff::ExponentialBackoff;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, trace, warn};

/// Prefix of messages shown in Syncthing's GUI.
const ERROR_PREFIX: &str = "[syncwatch] ";

/// Scanning this path is cheap and lets a request carry only the `next` parameter.
const MARKER_PATH: &str = ".stfolder";

/// Syncthing's long-poll lasts up to a minute; give it some slack.
const EVENTS_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Debug, Deserialize)]
struct SystemConfig {
    #[serde(default)]
    folders: Vec<FolderConfig>,
}

#[derive(Debug, Deserialize)]
struct Ignores {
    #[serde(default)]
    patterns: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InSync {
    config_in_sync: bool,
}

/// REST client for a running Syncthing instance.
#[derive(Debug, Clone)]
pub struct SyncthingClient {
    http: reqwest::Client,
    config: ClientConfig,
    delay_scan: Option<Duration>,
}

impl SyncthingClient {
    pub fn new(config: ClientConfig) -> SyncWatchResult<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(config.request_timeout)
            .build()?;

        Ok(SyncthingClient {
            http,
            config,
            delay_scan: None,
        })
    }

    /// Every scan request also pushes the folder's next full rescan by `delay`.
    pub fn with_delay_scan(mut self, delay: Option<Duration>) -> Self {
        self.delay_scan = delay;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        let mut req = self
            .http
            .request(method, format!("{}{}", self.config.target, endpoint));

        if let Some(token) = &self.config.csrf_token {
            req = req.header("X-CSRF-Token", token);
        }
        if let Some(user) = &self.config.user {
            req = req.basic_auth(user, self.config.password.as_deref());
        }
        if let Some(key) = &self.config.api_key {
            req = req.header("X-API-Key", key.trim());
        }
        req
    }

    fn check(endpoint: &str, res: Response) -> SyncWatchResult<Response> {
        match res.status() {
            StatusCode::OK => Ok(res),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SyncWatchError::Unauthorized),
            status => Err(SyncWatchError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            }),
        }
    }

    async fn get_json<T>(&self, endpoint: &str, query: &[(&str, &str)]) -> SyncWatchResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        trace!(endpoint, "GET");
        let res = self.request(Method::GET, endpoint).query(query).send().await?;
        Ok(Self::check(endpoint, res)?.json::<T>().await?)
    }

    pub async fn ping(&self) -> SyncWatchResult<()> {
        let _: serde_json::Value = self.get_json("/rest/system/ping", &[]).await?;
        Ok(())
    }

    /// Blocks until Syncthing answers, backing off exponentially. Rejected
    /// credentials end the wait immediately.
    pub async fn wait_until_ready(&self) -> SyncWatchResult<()> {
        let policy = ExponentialBackoff {
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        };

        backoff::future::retry(policy, || async {
            self.ping().await.map_err(|e| match e {
                SyncWatchError::Unauthorized => backoff::Error::permanent(e),
                e => {
                    warn!(url = %self.config.target, error = %e, "cannot connect to syncthing");
                    backoff::Error::transient(e)
                }
            })
        })
        .await?;

        info!(url = %self.config.target, "connected to syncthing");
        Ok(())
    }

    /// Asks for a scan of `subs` in `folder`. The response only arrives once the
    /// scan completed.
    async fn scan(
        &self,
        folder: &str,
        subs: &[String],
        next: Option<Duration>,
    ) -> Result<(), NotifyError> {
        let mut query: Vec<(&str, String)> = vec![("folder", folder.to_string())];
        query.extend(subs.iter().map(|sub| ("sub", sub.clone())));
        if let Some(next) = next {
            query.push(("next", next.as_secs().to_string()));
        }

        trace!(folder, ?subs, "POST /rest/db/scan");
        let res = self
            .request(Method::POST, "/rest/db/scan")
            .query(&query)
            .send()
            .await
            .map_err(|e| NotifyError::Retryable(e.to_string()))?;

        match Self::check("/rest/db/scan", res) {
            Ok(res) => res
                .bytes()
                .await
                .map(|_| ())
                .map_err(|e| NotifyError::Retryable(e.to_string())),
            Err(SyncWatchError::Unauthorized) => Err(NotifyError::Unauthorized),
            Err(e) => Err(NotifyError::Retryable(e.to_string())),
        }
    }
}

#[async_trait]
impl Notifier for SyncthingClient {
    async fn notify(&self, folder: &str, targets: &[String]) -> Result<(), NotifyError> {
        self.scan(folder, targets, self.delay_scan).await
    }

    async fn extend_rescan(&self, folder: &str, delay: Duration) -> Result<(), NotifyError> {
        self.scan(folder, &[MARKER_PATH.to_string()], Some(delay))
            .await
    }
}

#[async_trait]
impl EventSource for SyncthingClient {
    async fn events(&self, since: u64) -> SyncWatchResult<Vec<RawEvent>> {
        let endpoint = "/rest/events";
        let res = self
            .request(Method::GET, endpoint)
            .query(&[("since", since)])
            .timeout(EVENTS_TIMEOUT)
            .send()
            .await?;
        Ok(Self::check(endpoint, res)?.json().await?)
    }
}

#[async_trait]
impl SyncthingApi for SyncthingClient {
    async fn folders(&self) -> SyncWatchResult<Vec<FolderConfig>> {
        let config: SystemConfig = self.get_json("/rest/system/config", &[]).await?;
        Ok(config.folders)
    }

    async fn ignore_patterns(&self, folder: &str) -> SyncWatchResult<Vec<String>> {
        let endpoint = "/rest/db/ignores";
        let res = self
            .request(Method::GET, endpoint)
            .query(&[("folder", folder)])
            .send()
            .await?;

        if res.status() == StatusCode::INTERNAL_SERVER_ERROR {
            return Err(SyncWatchError::NotReady(format!(
                "{endpoint} for folder {folder}"
            )));
        }

        let ignores: Ignores = Self::check(endpoint, res)?.json().await?;
        Ok(ignores.patterns)
    }

    async fn config_in_sync(&self) -> SyncWatchResult<bool> {
        let in_sync: InSync = self.get_json("/rest/system/config/insync", &[]).await?;
        Ok(in_sync.config_in_sync)
    }

    async fn report_error(&self, message: &str) -> SyncWatchResult<()> {
        let endpoint = "/rest/system/error";
        trace!(error = message, "reporting error to syncthing");
        let res = self
            .request(Method::POST, endpoint)
            .header("Content-Type", "text/plain")
            .body(format!("{ERROR_PREFIX}{message}"))
            .send()
            .await?;
        Self::check(endpoint, res)?;
        Ok(())
    }
}
