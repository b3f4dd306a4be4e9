//! HTTP Basic credentials
//!
//! [`basic_credentials`] only parses; whether a pair is good enough is decided
//! by the caller through [`Credentials::accepts`] or the [`require_auth`] filter.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use warp::{Filter, Rejection};

use crate::error::ApiError;

/// A username/password pair
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// True when neither part is set
    pub fn is_empty(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }

    /// Whether `presented` matches these expected credentials
    ///
    /// An expected pair without a username matches nothing, so an unconfigured
    /// credential can never be satisfied by a request that sends no header.
    pub fn accepts(&self, presented: &Credentials) -> bool {
        !self.username.is_empty() && self == presented
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Extract credentials from an `Authorization` header value
///
/// Returns empty credentials when the header is missing, is not `Basic`, or
/// its payload is not base64 of `user:pass`. The payload is the run of base64
/// characters right after `Basic `; anything following it is ignored. The pair
/// is split on the first colon, so passwords may contain colons.
///
/// A payload that decodes to bytes which are not UTF-8 also yields empty
/// credentials. Configured credentials are `String`s, so such a pair could
/// never compare equal to them anyway.
///
/// ```rust
/// use bus_server::auth::basic_credentials;
///
/// let creds = basic_credentials(Some("Basic Zm9vOmJhcg=="));
/// assert_eq!((creds.username.as_str(), creds.password.as_str()), ("foo", "bar"));
///
/// assert!(basic_credentials(Some("Basic !!!invalid!!!")).is_empty());
/// assert!(basic_credentials(None).is_empty());
/// ```
pub fn basic_credentials(header: Option<&str>) -> Credentials {
    header.and_then(parse_basic).unwrap_or_default()
}

fn parse_basic(header: &str) -> Option<Credentials> {
    let rest = header.strip_prefix("Basic ")?;
    let end = rest
        .find(|c: char| !is_base64_char(c))
        .unwrap_or(rest.len());
    let payload = &rest[..end];
    if payload.is_empty() {
        return None;
    }

    let decoded = STANDARD.decode(payload).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (username, password) = text.split_once(':')?;
    Some(Credentials::new(username, password))
}

fn is_base64_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=')
}

/// Warp filter that lets a request through only with the expected credentials
///
/// Rejects with [`ApiError::Unauthorized`], which the server turns into a 403.
///
/// ```rust,ignore
/// let lock = warp::path("lock_door")
///     .and(require_auth(config.credentials.clone()))
///     .map(|| "Locking the door.");
/// ```
pub fn require_auth(expected: Credentials) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and_then(move |header: Option<String>| {
            let expected = expected.clone();
            async move {
                if expected.accepts(&basic_credentials(header.as_deref())) {
                    Ok(())
                } else {
                    Err(warp::reject::custom(ApiError::Unauthorized))
                }
            }
        })
        .untuple_one()
}
