//! Rust client for the Virtuous CRM API.
//!
//! Requests authenticate with either a static API key or OAuth tokens obtained
//! through the password grant. OAuth access tokens are refreshed lazily, right
//! before the request that needs them.
//!
//! ```no_run
//! # async fn run() -> virtuous::Result<()> {
//! use virtuous::{AuthOutcome, Client, Config};
//!
//! let client = Client::new(Config::default())?;
//! if let AuthOutcome::RequiresOtp = client.authenticate("me@example.org", "secret", None).await? {
//!     client.authenticate("me@example.org", "secret", Some("123456")).await?;
//! }
//! let contact = client.contacts().get(42).await?;
//! println!("{}", contact["name"]);
//!
//! // Persist these and pass them back through `Config` next time.
//! if client.refreshed() {
//!     let tokens = client.tokens();
//!     # let _ = tokens;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Payload keys are snake_case on the Rust side and camelCase on the wire; the
//! resource clients convert in both directions. The generic verbs
//! ([`Client::get`], [`Client::post`], ...) send and return payloads untouched.
#![cfg_attr(docsrs, feature(doc_cfg))]
// Allow large error types - boxing would change the public error shape
#![allow(clippy::result_large_err)]

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.virtuoussoftware.com";

/// Environment variable read for the API key when none is configured.
pub const API_KEY_ENV: &str = "VIRTUOUS_KEY";

/// Default User-Agent header value.
pub(crate) const DEFAULT_CLIENT_HEADER: &str = concat!("virtuous-rust/", env!("CARGO_PKG_VERSION"));

/// Default connection timeout (5 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Default request timeout (60 seconds).
pub const DEFAULT_REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

/// OAuth token endpoint, relative to the base URL.
pub(crate) const TOKEN_PATH: &str = "Token";

mod case;
mod client;
mod contact_addresses;
mod contacts;
mod core;
mod errors;
mod gift_designations;
mod gifts;
mod http;
mod individuals;
mod projects;
mod query;
mod recurring_gifts;

pub use case::{camelize, to_camel_case, to_snake_case, underscore};
pub use client::{AuthClient, Client, Config};
pub use contact_addresses::ContactAddressesClient;
pub use contacts::ContactsClient;
pub use crate::core::{AuthOutcome, AuthState, Tokens};
pub use errors::{
    APIError, APIErrorKind, Error, Result, TransportError, TransportErrorKind, ValidationError,
};
pub use gift_designations::GiftDesignationsClient;
pub use gifts::{GiftImport, GiftListOptions, GiftsClient};
pub use individuals::IndividualsClient;
pub use projects::ProjectsClient;
pub use query::{QueryCondition, QueryOptions};
pub use recurring_gifts::RecurringGiftsClient;

#[cfg(feature = "blocking")]
mod blocking;
#[cfg(feature = "blocking")]
pub use blocking::{BlockingClient, BlockingConfig};
