//! Session lifecycle: login payloads, token caching and renewal.

use crate::envelope::{Action, Payload};
use crate::error::{SoapError, SoapResult};
use crate::types::SecureString;
use crate::xml::{write_text_element, XmlElement};
use chrono::{DateTime, Utc};
use quick_xml::Writer;
use std::fmt;
use std::future::Future;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Element name of the token field in every authenticated request.
pub const SESSION_ID_ELEMENT: &str = "sessionId";

/// An authenticated session.
///
/// The API does not report its own expiry, so `expires_at` is always
/// `issued_at` plus the configured TTL.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl Session {
    /// Fails when `issued_at + ttl` is past the last representable instant.
    pub fn new(
        token: impl Into<String>,
        issued_at: DateTime<Utc>,
        ttl: chrono::Duration,
    ) -> SoapResult<Self> {
        let expires_at = issued_at.checked_add_signed(ttl).ok_or_else(|| {
            SoapError::Config(format!("session TTL {} overflows the expiry time", ttl))
        })?;
        Ok(Self {
            token: token.into(),
            issued_at,
            expires_at,
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Strictly after expiry; the expiry instant itself is still valid.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// The `sessionId` field value for a request.
    pub fn id(&self) -> SessionId {
        SessionId::from(self)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"***")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Token-bearing `sessionId` field of an authenticated request.
///
/// Travels as a bare text element; the expiry it remembers stays local and
/// does not take part in equality.
#[derive(Clone, Default)]
pub struct SessionId {
    token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl SessionId {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at: None,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Expiry of the session this id was taken from; unknown when decoded.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn write<W: Write>(&self, writer: &mut Writer<W>) -> SoapResult<()> {
        write_text_element(writer, SESSION_ID_ELEMENT, &self.token)
    }

    /// Read the `sessionId` child of a request element, if present.
    pub fn read(parent: &XmlElement) -> Option<Self> {
        parent
            .child(SESSION_ID_ELEMENT)
            .map(|element| Self::new(element.text.trim()))
    }
}

impl From<&Session> for SessionId {
    fn from(session: &Session) -> Self {
        Self {
            token: session.token.clone(),
            expires_at: Some(session.expires_at),
        }
    }
}

impl PartialEq for SessionId {
    fn eq(&self, other: &Self) -> bool {
        self.token == other.token
    }
}

impl Eq for SessionId {}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionId")
            .field("token", &"***")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Owns the cached session and renews it when it expires.
///
/// The lock is held across the renewal exchange so that concurrent callers
/// seeing an expired session wait for one login instead of starting their
/// own. The cached value is only replaced after a login succeeds.
#[derive(Debug)]
pub struct SessionManager {
    current: Mutex<Option<Session>>,
    ttl: chrono::Duration,
    logins: AtomicU64,
}

impl SessionManager {
    pub fn new(ttl: std::time::Duration) -> SoapResult<Self> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| SoapError::Config(format!("session TTL out of range: {}", e)))?;
        Ok(Self {
            current: Mutex::new(None),
            ttl,
            logins: AtomicU64::new(0),
        })
    }

    /// Return the cached session, logging in first if there is none or it
    /// has expired.
    ///
    /// `login` performs the exchange and returns the new token. A failure is
    /// returned as [`SoapError::Login`] and leaves the cache untouched.
    pub async fn valid_session<F, Fut>(&self, login: F) -> SoapResult<Session>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SoapResult<String>>,
    {
        let mut current = self.current.lock().await;

        match current.as_ref() {
            Some(session) if !session.is_expired() => return Ok(session.clone()),
            Some(session) => debug!(expired_at = %session.expires_at(), "Session expired, renewing"),
            None => debug!("No session, logging in"),
        }

        self.establish(&mut current, login).await
    }

    /// Log in unconditionally and replace the cached session.
    pub async fn renew<F, Fut>(&self, login: F) -> SoapResult<Session>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SoapResult<String>>,
    {
        let mut current = self.current.lock().await;
        self.establish(&mut current, login).await
    }

    async fn establish<F, Fut>(&self, current: &mut Option<Session>, login: F) -> SoapResult<Session>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SoapResult<String>>,
    {
        let issued_at = Utc::now();
        let token = match login().await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Login failed");
                return Err(SoapError::Login(Box::new(e)));
            }
        };
        if token.is_empty() {
            return Err(SoapError::Login(Box::new(SoapError::Decode(
                "login returned an empty session token".to_string(),
            ))));
        }

        let session = Session::new(token, issued_at, self.ttl)?;
        self.logins.fetch_add(1, Ordering::Relaxed);
        info!(expires_at = %session.expires_at(), "Session established");

        *current = Some(session.clone());
        Ok(session)
    }

    /// The cached session, without renewing it.
    pub async fn current(&self) -> Option<Session> {
        self.current.lock().await.clone()
    }

    /// Replace the cached session, e.g. with one obtained by an earlier process.
    pub async fn restore(&self, session: Session) {
        *self.current.lock().await = Some(session);
    }

    /// Number of successful logins performed by this manager.
    pub fn login_count(&self) -> u64 {
        self.logins.load(Ordering::Relaxed)
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }
}

/// `login` request carrying the API credentials.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoginRequest {
    pub username: SecureString,
    pub api_key: SecureString,
}

impl LoginRequest {
    pub fn new(username: impl Into<SecureString>, api_key: impl Into<SecureString>) -> Self {
        Self {
            username: username.into(),
            api_key: api_key.into(),
        }
    }
}

impl Payload for LoginRequest {
    const ELEMENT: &'static str = "login";

    fn write_fields<W: Write>(&self, writer: &mut Writer<W>) -> SoapResult<()> {
        self.username.write(writer, "username")?;
        self.api_key.write(writer, "apiKey")
    }

    fn read_fields(element: &XmlElement) -> SoapResult<Self> {
        Ok(Self {
            username: element.child("username").map(SecureString::read).unwrap_or_default(),
            api_key: element.child("apiKey").map(SecureString::read).unwrap_or_default(),
        })
    }
}

impl Action for LoginRequest {
    type Response = LoginResponse;

    const REQUIRES_SESSION: bool = false;

    fn set_session(&mut self, _session: &Session) {}
}

/// `loginResponse` carrying the new session token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginResponse {
    pub login_return: String,
}

impl Payload for LoginResponse {
    const ELEMENT: &'static str = "loginResponse";

    fn write_fields<W: Write>(&self, writer: &mut Writer<W>) -> SoapResult<()> {
        write_text_element(writer, "loginReturn", &self.login_return)
    }

    fn read_fields(element: &XmlElement) -> SoapResult<Self> {
        Ok(Self {
            login_return: element.child_string("loginReturn").trim().to_string(),
        })
    }
}
