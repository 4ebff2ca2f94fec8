//! HTTP helpers built on the execution engine.
//!
//! The engine owns no transport; this module translates reqwest's native
//! failures into the classifiable [`RequestError`] shape and offers the
//! common request shapes (fetch text, download to a destination, post
//! JSON) run through a [`ResilientExecutor`]. Use only from background or
//! batch contexts that can tolerate a long delay.

use crate::backoff::BackoffSchedule;
use crate::dest::Destination;
use crate::error::{AttemptResult, RequestError};
use crate::executor::ResilientExecutor;
use crate::policy::RetryPolicy;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use std::error::Error as StdError;
use std::future::Future;
use std::io;
use std::time::Duration;
use tracing::debug;

impl From<reqwest::Error> for RequestError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return RequestError::Timeout;
        }
        if error.is_connect() {
            if io_kind_in_chain(&error, io::ErrorKind::ConnectionRefused) {
                return RequestError::ConnectionRefused;
            }
            if chain_mentions(&error, "dns error")
                || chain_mentions(&error, "failed to lookup address")
            {
                return RequestError::HostNotFound;
            }
        }
        if let Some(status) = error.status() {
            return RequestError::http(status.as_u16(), error.to_string());
        }
        RequestError::Other(error.into())
    }
}

/// Whether any node in the error's cause chain is an io error of `kind`.
fn io_kind_in_chain(error: &(dyn StdError + 'static), kind: io::ErrorKind) -> bool {
    std::iter::successors(Some(error), |&node| node.source())
        .filter_map(|node| node.downcast_ref::<io::Error>())
        .any(|io_error| io_error.kind() == kind)
}

/// Whether any node in the error's cause chain mentions `needle`.
fn chain_mentions(error: &(dyn StdError + 'static), needle: &str) -> bool {
    std::iter::successors(Some(error), |&node| node.source())
        .any(|node| node.to_string().contains(needle))
}

/// Turn a non-2xx response into a classifiable [`RequestError`].
async fn check_response(response: Response) -> AttemptResult<Response> {
    let status = response.status();
    if !status.is_success() {
        let code = status.as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(RequestError::http(code, body));
    }
    Ok(response)
}

/// HTTP client wrapper that runs every request through the two-tier
/// engine.
///
/// The client holds the tier configuration; the idempotency declaration
/// is per request, since a GET and a POST against the same host carry
/// different retry obligations.
#[derive(Debug, Clone)]
pub struct RetryClient {
    client: Client,
    outer: RetryPolicy,
    outer_backoff: BackoffSchedule,
    inner: RetryPolicy,
    inner_backoff: BackoffSchedule,
}

impl Default for RetryClient {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

impl RetryClient {
    /// Create a retry client with the default tier configuration.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            outer: RetryPolicy::connection_level(),
            outer_backoff: BackoffSchedule::default(),
            inner: RetryPolicy::server_overload(),
            inner_backoff: BackoffSchedule::default(),
        }
    }

    /// Create a builder.
    pub fn builder() -> RetryClientBuilder {
        RetryClientBuilder::default()
    }

    /// The underlying reqwest client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Build an executor for one request.
    pub fn executor(&self, idempotent: bool, handled_message: Option<&str>) -> ResilientExecutor {
        let mut executor = ResilientExecutor::new(idempotent)
            .outer_policy(self.outer)
            .outer_backoff(self.outer_backoff)
            .inner_policy(self.inner)
            .inner_backoff(self.inner_backoff);
        if let Some(fragment) = handled_message {
            executor = executor.handled_message(fragment);
        }
        executor
    }

    /// GET a text resource, retrying transient failures.
    ///
    /// With `none_if_not_found`, a 404 resolves to `Ok(None)` instead of
    /// failing.
    pub async fn get_text(
        &self,
        url: &str,
        none_if_not_found: bool,
        handled_message: Option<&str>,
    ) -> Result<Option<String>, RequestError> {
        let executor = self.executor(true, handled_message);
        executor
            .execute(|| async {
                debug!(url, "GET text");
                let response = self.client.get(url).send().await.map_err(RequestError::from)?;
                if none_if_not_found && response.status() == StatusCode::NOT_FOUND {
                    return Ok(None);
                }
                let response = check_response(response).await?;
                let text = response.text().await.map_err(RequestError::from)?;
                Ok(Some(text))
            })
            .await
    }

    /// GET a resource and write its representation to `dest`, retrying
    /// transient failures.
    ///
    /// The whole fetch-and-write is one operation to the engine, so the
    /// destination must support idempotent overwrite. Storage failures
    /// are unclassified and propagate without retry.
    pub async fn download(
        &self,
        url: &str,
        dest: &dyn Destination,
        handled_message: Option<&str>,
    ) -> Result<(), RequestError> {
        let executor = self.executor(true, handled_message);
        executor
            .execute(|| async {
                debug!(url, "GET for download");
                let response = self.client.get(url).send().await.map_err(RequestError::from)?;
                let response = check_response(response).await?;
                let body = response.bytes().await.map_err(RequestError::from)?;
                dest.replace_with(&body)
                    .await
                    .map_err(|error| RequestError::Other(anyhow::Error::new(error)))?;
                Ok(())
            })
            .await
    }

    /// POST a JSON body, retrying transient failures.
    ///
    /// Declare `idempotent` only when repeating the request has the same
    /// effect as sending it once; otherwise only the unconditionally-safe
    /// failure classes (host-not-found, 503) are retried.
    pub async fn post_json<B>(
        &self,
        url: &str,
        body: &B,
        idempotent: bool,
        handled_message: Option<&str>,
    ) -> Result<Response, RequestError>
    where
        B: Serialize + Sync,
    {
        let executor = self.executor(idempotent, handled_message);
        executor
            .execute(|| async {
                debug!(url, "POST json");
                let response = self
                    .client
                    .post(url)
                    .json(body)
                    .send()
                    .await
                    .map_err(RequestError::from)?;
                check_response(response).await
            })
            .await
    }

    /// Run an arbitrary request closure through the engine.
    ///
    /// The closure performs exactly one attempt and reports failures as
    /// [`RequestError`] so they stay classifiable.
    pub async fn execute<T, F, Fut>(
        &self,
        idempotent: bool,
        handled_message: Option<&str>,
        op: F,
    ) -> Result<T, RequestError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = AttemptResult<T>>,
    {
        self.executor(idempotent, handled_message).execute(op).await
    }
}

/// Builder for [`RetryClient`].
#[derive(Debug, Default)]
pub struct RetryClientBuilder {
    client: Option<Client>,
    outer_attempts: Option<u32>,
    inner_attempts: Option<u32>,
    backoff_base: Option<Duration>,
    timeout: Option<Duration>,
}

impl RetryClientBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the underlying HTTP client.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the outer tier's retry budget.
    pub fn outer_attempts(mut self, n: u32) -> Self {
        self.outer_attempts = Some(n);
        self
    }

    /// Set the inner tier's retry budget.
    pub fn inner_attempts(mut self, n: u32) -> Self {
        self.inner_attempts = Some(n);
        self
    }

    /// Set the backoff base unit for both tiers.
    pub fn backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = Some(base);
        self
    }

    /// Set the per-attempt request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the retry client.
    pub fn build(self) -> RetryClient {
        let client = self.client.unwrap_or_else(|| {
            let mut builder = Client::builder();
            if let Some(timeout) = self.timeout {
                builder = builder.timeout(timeout);
            }
            builder.build().expect("failed to build reqwest client")
        });

        let mut retry_client = RetryClient::new(client);
        if let Some(n) = self.outer_attempts {
            retry_client.outer = retry_client.outer.max_attempts(n);
        }
        if let Some(n) = self.inner_attempts {
            retry_client.inner = retry_client.inner.max_attempts(n);
        }
        if let Some(base) = self.backoff_base {
            retry_client.outer_backoff = BackoffSchedule::new(base);
            retry_client.inner_backoff = BackoffSchedule::new(base);
        }
        retry_client
    }
}
