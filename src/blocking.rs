use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use reqwest::{
    Method, StatusCode, Url,
    blocking::{Client as HttpClient, RequestBuilder},
    header::{ACCEPT, USER_AGENT},
};
use serde::Serialize;
use serde_json::Value;

use crate::{
    API_KEY_ENV, DEFAULT_BASE_URL, DEFAULT_CLIENT_HEADER, DEFAULT_CONNECT_TIMEOUT, TOKEN_PATH,
    core::{
        AuthOutcome, AuthState, TokenGrant, TokenResponse, TokenState, Tokens, decode_body,
        non_empty, redact, request_timeout, resolve_api_key,
    },
    errors::{Error, Result, TransportError, TransportErrorKind, ValidationError},
    http::{check_status, is_empty_payload, join_url, parse_base_url, query_pairs, sends_query},
};

/// Blocking counterpart of [`crate::Config`]; fields behave the same way.
#[derive(Clone, Default)]
pub struct BlockingConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub client_header: Option<String>,
    pub http_client: Option<HttpClient>,
    /// Override the connect timeout (defaults to 5s).
    pub connect_timeout: Option<Duration>,
    /// Per-request timeout. Defaults to 60s on the built-in transport; with
    /// `http_client` it only applies when set.
    pub timeout: Option<Duration>,
    pub danger_accept_invalid_certs: bool,
}

impl fmt::Debug for BlockingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingConfig")
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

/// Blocking counterpart of [`crate::Client`] exposing the generic verbs and
/// authentication.
#[derive(Clone)]
pub struct BlockingClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    base_url: Url,
    api_key: Option<String>,
    client_header: String,
    http: HttpClient,
    request_timeout: Option<Duration>,
    tokens: Mutex<TokenState>,
    refresh_lock: Mutex<()>,
}

impl BlockingClient {
    pub fn new(cfg: BlockingConfig) -> Result<Self> {
        let base_url = parse_base_url(cfg.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL))?;
        let api_key = resolve_api_key(cfg.api_key, std::env::var(API_KEY_ENV).ok());
        let request_timeout = request_timeout(cfg.timeout, cfg.http_client.is_some());

        let http = match cfg.http_client {
            Some(client) => client,
            None => HttpClient::builder()
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

        Ok(Self {
            inner: Arc::new(ClientInner {
                base_url,
                api_key,
                client_header: non_empty(cfg.client_header)
                    .unwrap_or_else(|| DEFAULT_CLIENT_HEADER.to_string()),
                http,
                request_timeout,
                tokens: Mutex::new(TokenState::new(
                    non_empty(cfg.access_token),
                    non_empty(cfg.refresh_token),
                    cfg.expires_at,
                )),
                refresh_lock: Mutex::new(()),
            }),
        })
    }

    pub fn authenticate(
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

        let _guard = self.inner.refresh_guard();
        let grant = TokenGrant::Password {
            username: email.trim(),
            password,
            otp,
        };
        match self.inner.request_token(grant)? {
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

    /// See [`crate::AuthClient::bearer_token`].
    pub fn bearer_token(&self) -> Result<Option<String>> {
        self.inner.resolve_bearer_token()
    }

    pub fn get(&self, path: &str, query: impl Serialize) -> Result<Option<Value>> {
        self.inner.call(Method::GET, path, &query)
    }

    pub fn post(&self, path: &str, body: impl Serialize) -> Result<Option<Value>> {
        self.inner.call(Method::POST, path, &body)
    }

    pub fn put(&self, path: &str, body: impl Serialize) -> Result<Option<Value>> {
        self.inner.call(Method::PUT, path, &body)
    }

    pub fn patch(&self, path: &str, body: impl Serialize) -> Result<Option<Value>> {
        self.inner.call(Method::PATCH, path, &body)
    }

    pub fn delete(&self, path: &str, query: impl Serialize) -> Result<Option<Value>> {
        self.inner.call(Method::DELETE, path, &query)
    }

    pub fn tokens(&self) -> Tokens {
        self.inner.state().tokens()
    }

    pub fn refreshed(&self) -> bool {
        self.inner.state().refreshed()
    }

    pub fn auth_state(&self) -> AuthState {
        self.inner
            .state()
            .auth_state(self.inner.api_key.is_some(), Utc::now())
    }
}

impl ClientInner {
    fn state(&self) -> MutexGuard<'_, TokenState> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refresh_guard(&self) -> MutexGuard<'_, ()> {
        self.refresh_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
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

    fn resolve_bearer_token(&self) -> Result<Option<String>> {
        if let Some(key) = &self.api_key {
            return Ok(Some(key.clone()));
        }
        self.ensure_fresh_token()?;
        Ok(self.state().access_token().map(str::to_string))
    }

    fn ensure_fresh_token(&self) -> Result<()> {
        if self.state().refresh_due(Utc::now()).is_none() {
            return Ok(());
        }
        let _guard = self.refresh_guard();
        let refresh_token = {
            let state = self.state();
            state.refresh_due(Utc::now()).map(str::to_string)
        };
        let Some(refresh_token) = refresh_token else {
            return Ok(());
        };

        tracing::debug!("access token missing or expired; refreshing");
        match self.request_token(TokenGrant::RefreshToken(&refresh_token))? {
            Some(response) => {
                self.state().apply(response);
                Ok(())
            }
            None => Err(Error::TokenResponse(
                "refresh answered 202 (one-time password required)".into(),
            )),
        }
    }

    fn request_token(&self, grant: TokenGrant<'_>) -> Result<Option<TokenResponse>> {
        let builder = self
            .builder(Method::POST, TOKEN_PATH)?
            .form(&grant.form());
        let span = tracing::debug_span!("virtuous.token", grant = grant.name());
        let _enter = span.enter();
        let (status, body) = self.send(builder, &Method::POST, TOKEN_PATH)?;
        if status == StatusCode::ACCEPTED {
            return Ok(None);
        }
        TokenResponse::from_body(body).map(Some)
    }

    fn call<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
    ) -> Result<Option<Value>> {
        let payload = serde_json::to_value(payload)?;
        let mut builder = self.builder(method.clone(), path)?;
        if sends_query(&method) {
            let pairs = query_pairs(&payload);
            if !pairs.is_empty() {
                builder = builder.query(&pairs);
            }
        } else if is_empty_payload(&payload) {
            builder = builder.json(&serde_json::Map::new());
        } else {
            builder = builder.json(&payload);
        }

        let bearer = self.resolve_bearer_token()?;
        if let Some(token) = &bearer {
            builder = builder.bearer_auth(token);
        }

        let span = tracing::debug_span!("virtuous.http", method = %method, path = %path);
        let _enter = span.enter();
        let (_, body) = self.send(builder, &method, path)?;
        if bearer.is_some() && self.api_key.is_none() {
            self.state().mark_used();
        }
        Ok(body)
    }

    fn send(
        &self,
        builder: RequestBuilder,
        method: &Method,
        path: &str,
    ) -> Result<(StatusCode, Option<Value>)> {
        let start = Instant::now();
        let resp = builder.send().map_err(|err| {
            tracing::warn!(%method, path, error = %err, "transport error");
            TransportError::from(err)
        })?;
        let status = resp.status();
        let url = resp.url().clone();
        let bytes = resp.bytes().map_err(TransportError::from)?;

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
