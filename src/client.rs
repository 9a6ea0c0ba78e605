use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use reqwest::{
    Method, RequestBuilder, StatusCode,
    header::{ACCEPT, USER_AGENT},
};
use serde::Serialize;
use serde_json::Value;
use tracing::Instrument;

use crate::{
    API_KEY_ENV, DEFAULT_BASE_URL, DEFAULT_CLIENT_HEADER, DEFAULT_CONNECT_TIMEOUT, TOKEN_PATH,
    contact_addresses::ContactAddressesClient,
    contacts::ContactsClient,
    core::{
        AuthOutcome, AuthState, TokenGrant, TokenResponse, TokenState, Tokens, decode_body,
        non_empty, redact, request_timeout, resolve_api_key,
    },
    errors::{Error, Result, TransportError, TransportErrorKind, ValidationError},
    gift_designations::GiftDesignationsClient,
    gifts::GiftsClient,
    http::{check_status, is_empty_payload, join_url, parse_base_url, query_pairs, sends_query},
    individuals::IndividualsClient,
    projects::ProjectsClient,
    recurring_gifts::RecurringGiftsClient,
};

/// Client configuration. Every field is optional.
///
/// `api_key` falls back to the `VIRTUOUS_KEY` environment variable. When an API
/// key is present it is always the bearer credential; the OAuth fields are
/// still tracked so `authenticate` can be used for inspection.
#[derive(Clone, Default)]
pub struct Config {
    /// Defaults to `https://api.virtuoussoftware.com`.
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// User-Agent header value.
    pub client_header: Option<String>,
    /// Pre-built transport, used as-is. `connect_timeout` and
    /// `danger_accept_invalid_certs` are ignored when set.
    pub http_client: Option<reqwest::Client>,
    /// Override the connect timeout (defaults to 5s).
    pub connect_timeout: Option<Duration>,
    /// Per-request timeout. Defaults to 60s on the built-in transport; with
    /// `http_client` it only applies when set, otherwise the transport's own
    /// timeout governs.
    pub timeout: Option<Duration>,
    /// Disable TLS certificate verification (local testing only).
    pub danger_accept_invalid_certs: bool,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .field("expires_at", &self.expires_at)
            .field("client_header", &self.client_header)
            .field("http_client", &self.http_client.as_ref().map(|_| "<client>"))
            .field("connect_timeout", &self.connect_timeout)
            .field("timeout", &self.timeout)
            .field("danger_accept_invalid_certs", &self.danger_accept_invalid_certs)
            .finish()
    }
}

/// Async client for the Virtuous API.
///
/// Cloning is cheap; clones share the same credentials and token state.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    base_url: reqwest::Url,
    api_key: Option<String>,
    client_header: String,
    http: reqwest::Client,
    request_timeout: Option<Duration>,
    tokens: Mutex<TokenState>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl Client {
    pub fn new(cfg: Config) -> Result<Self> {
        let base_url = parse_base_url(cfg.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL))?;
        let api_key = resolve_api_key(cfg.api_key, std::env::var(API_KEY_ENV).ok());
        let request_timeout = request_timeout(cfg.timeout, cfg.http_client.is_some());

        let http = match cfg.http_client {
            Some(client) => client,
            None => reqwest::Client::builder()
                .connect_timeout(cfg.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT))
                .redirect(reqwest::redirect::Policy::none())
                .danger_accept_invalid_certs(cfg.danger_accept_invalid_certs)
                .build()
                .map_err(|err| TransportError {
                    kind: TransportErrorKind::Connect,
                    message: "failed to build http client".to_string(),
                    source: Some(err),
                })?,
        };

        let client_header =
            non_empty(cfg.client_header).unwrap_or_else(|| DEFAULT_CLIENT_HEADER.to_string());

        Ok(Self {
            inner: Arc::new(ClientInner {
                base_url,
                api_key,
                client_header,
                http,
                request_timeout,
                tokens: Mutex::new(TokenState::new(
                    non_empty(cfg.access_token),
                    non_empty(cfg.refresh_token),
                    cfg.expires_at,
                )),
                refresh_lock: tokio::sync::Mutex::new(()),
            }),
        })
    }

    pub fn auth(&self) -> AuthClient {
        AuthClient {
            inner: self.inner.clone(),
        }
    }

    pub fn contacts(&self) -> ContactsClient {
        ContactsClient::new(self.inner.clone())
    }

    pub fn individuals(&self) -> IndividualsClient {
        IndividualsClient::new(self.inner.clone())
    }

    pub fn contact_addresses(&self) -> ContactAddressesClient {
        ContactAddressesClient::new(self.inner.clone())
    }

    pub fn gifts(&self) -> GiftsClient {
        GiftsClient::new(self.inner.clone())
    }

    pub fn recurring_gifts(&self) -> RecurringGiftsClient {
        RecurringGiftsClient::new(self.inner.clone())
    }

    pub fn gift_designations(&self) -> GiftDesignationsClient {
        GiftDesignationsClient::new(self.inner.clone())
    }

    pub fn projects(&self) -> ProjectsClient {
        ProjectsClient::new(self.inner.clone())
    }

    /// Shortcut for [`AuthClient::authenticate`].
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
        otp: Option<&str>,
    ) -> Result<AuthOutcome> {
        self.auth().authenticate(email, password, otp).await
    }

    /// `GET path` with `query` encoded as URL parameters. Pass `()` for none.
    pub async fn get(&self, path: &str, query: impl Serialize) -> Result<Option<Value>> {
        self.inner.call(Method::GET, path, &query).await
    }

    /// `POST path` with `body` as JSON.
    pub async fn post(&self, path: &str, body: impl Serialize) -> Result<Option<Value>> {
        self.inner.call(Method::POST, path, &body).await
    }

    /// `PUT path` with `body` as JSON.
    pub async fn put(&self, path: &str, body: impl Serialize) -> Result<Option<Value>> {
        self.inner.call(Method::PUT, path, &body).await
    }

    /// `PATCH path` with `body` as JSON.
    pub async fn patch(&self, path: &str, body: impl Serialize) -> Result<Option<Value>> {
        self.inner.call(Method::PATCH, path, &body).await
    }

    /// `DELETE path` with `query` encoded as URL parameters.
    pub async fn delete(&self, path: &str, query: impl Serialize) -> Result<Option<Value>> {
        self.inner.call(Method::DELETE, path, &query).await
    }

    /// Current OAuth credentials, for persisting between client instances.
    pub fn tokens(&self) -> Tokens {
        self.inner.state().tokens()
    }

    pub fn access_token(&self) -> Option<String> {
        self.tokens().access_token
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.tokens().refresh_token
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.tokens().expires_at
    }

    /// True once this client has obtained tokens from the token endpoint.
    pub fn refreshed(&self) -> bool {
        self.inner.state().refreshed()
    }

    pub fn auth_state(&self) -> AuthState {
        self.inner
            .state()
            .auth_state(self.inner.api_key.is_some(), Utc::now())
    }
}

/// Token acquisition and bearer-token selection.
#[derive(Clone)]
pub struct AuthClient {
    inner: Arc<ClientInner>,
}

impl AuthClient {
    /// Exchanges an email and password (plus the one-time password when
    /// two-factor is enabled) for OAuth tokens.
    ///
    /// A 202 from the token endpoint yields [`AuthOutcome::RequiresOtp`] and
    /// leaves the stored tokens untouched.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
        otp: Option<&str>,
    ) -> Result<AuthOutcome> {
        if email.trim().is_empty() {
            return Err(ValidationError::new("email is required")
                .with_field("email")
                .into());
        }
        if password.is_empty() {
            return Err(ValidationError::new("password is required")
                .with_field("password")
                .into());
        }
        let otp = otp.map(str::trim).filter(|s| !s.is_empty());

        let _guard = self.inner.refresh_lock.lock().await;
        let grant = TokenGrant::Password {
            username: email.trim(),
            password,
            otp,
        };
        match self.inner.request_token(grant).await? {
            Some(response) => {
                let tokens = {
                    let mut state = self.inner.state();
                    state.apply(response);
                    state.tokens()
                };
                tracing::info!(expires_at = ?tokens.expires_at, "authenticated with password grant");
                Ok(AuthOutcome::Authenticated(tokens))
            }
            None => {
                tracing::info!("two-factor authentication required");
                Ok(AuthOutcome::RequiresOtp)
            }
        }
    }

    /// The credential sent as `Authorization: Bearer`, refreshing the access
    /// token first when it is due. `None` when nothing is configured yet.
    pub async fn bearer_token(&self) -> Result<Option<String>> {
        self.inner.resolve_bearer_token().await
    }

    /// Refreshes the access token when a refresh token is held and the access
    /// token is missing or expired. Concurrent callers share one refresh.
    pub async fn ensure_fresh_token(&self) -> Result<()> {
        self.inner.ensure_fresh_token().await
    }
}

impl ClientInner {
    pub(crate) fn state(&self) -> MutexGuard<'_, TokenState> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn builder(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = join_url(&self.base_url, path)?;
        let builder = self
            .http
            .request(method, url)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, &self.client_header);
        Ok(match self.request_timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        })
    }

    async fn resolve_bearer_token(&self) -> Result<Option<String>> {
        if let Some(key) = &self.api_key {
            return Ok(Some(key.clone()));
        }
        self.ensure_fresh_token().await?;
        Ok(self.state().access_token().map(str::to_string))
    }

    async fn ensure_fresh_token(&self) -> Result<()> {
        if self.state().refresh_due(Utc::now()).is_none() {
            return Ok(());
        }
        let _guard = self.refresh_lock.lock().await;
        // Another caller may have refreshed while we waited.
        let refresh_token = {
            let state = self.state();
            state.refresh_due(Utc::now()).map(str::to_string)
        };
        let Some(refresh_token) = refresh_token else {
            return Ok(());
        };

        tracing::debug!("access token missing or expired; refreshing");
        match self
            .request_token(TokenGrant::RefreshToken(&refresh_token))
            .await?
        {
            Some(response) => {
                self.state().apply(response);
                Ok(())
            }
            None => Err(Error::TokenResponse(
                "refresh answered 202 (one-time password required)".into(),
            )),
        }
    }

    /// Posts a form-encoded grant without an Authorization header.
    /// `Ok(None)` means the endpoint answered 202.
    async fn request_token(&self, grant: TokenGrant<'_>) -> Result<Option<TokenResponse>> {
        let builder = self
            .builder(Method::POST, TOKEN_PATH)?
            .form(&grant.form());
        let span = tracing::debug_span!("virtuous.token", grant = grant.name());
        let (status, body) = self
            .send(builder, &Method::POST, TOKEN_PATH)
            .instrument(span)
            .await?;
        if status == StatusCode::ACCEPTED {
            return Ok(None);
        }
        TokenResponse::from_body(body).map(Some)
    }

    /// Serializes the payload and dispatches an authorized request.
    pub(crate) async fn call<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
    ) -> Result<Option<Value>> {
        let payload = serde_json::to_value(payload)?;
        if sends_query(&method) {
            self.execute(method, path, Some(&payload), None).await
        } else {
            self.execute(method, path, None, Some(&payload)).await
        }
    }

    pub(crate) async fn execute(
        &self,
        method: Method,
        path: &str,
        query: Option<&Value>,
        body: Option<&Value>,
    ) -> Result<Option<Value>> {
        let mut builder = self.builder(method.clone(), path)?;
        if let Some(query) = query {
            let pairs = query_pairs(query);
            if !pairs.is_empty() {
                builder = builder.query(&pairs);
            }
        }
        if let Some(body) = body {
            if is_empty_payload(body) {
                builder = builder.json(&serde_json::Map::new());
            } else {
                builder = builder.json(body);
            }
        }

        let bearer = self.resolve_bearer_token().await?;
        if let Some(token) = &bearer {
            builder = builder.bearer_auth(token);
        }

        let span = tracing::debug_span!("virtuous.http", method = %method, path = %path);
        let (_, body) = self.send(builder, &method, path).instrument(span).await?;
        if bearer.is_some() && self.api_key.is_none() {
            self.state().mark_used();
        }
        Ok(body)
    }

    async fn send(
        &self,
        builder: RequestBuilder,
        method: &Method,
        path: &str,
    ) -> Result<(StatusCode, Option<Value>)> {
        let start = Instant::now();
        let resp = builder.send().await.map_err(|err| {
            tracing::warn!(%method, path, error = %err, "transport error");
            TransportError::from(err)
        })?;
        let status = resp.status();
        let url = resp.url().clone();
        let bytes = resp.bytes().await.map_err(TransportError::from)?;

        if let Err(err) = check_status(status, &url, &bytes) {
            tracing::warn!(%status, %method, path, "request failed");
            return Err(err);
        }
        tracing::debug!(
            %status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "request completed"
        );
        Ok((status, decode_body(&bytes)?))
    }
}
