//! SOAP client.
//!
//! Turns a typed action into one HTTP exchange: inject the session, wrap the
//! payload, post it, classify the reply, decode the body.

use crate::classifier::classify;
use crate::config::ClientConfig;
use crate::envelope::{Action, Envelope, API_NS};
use crate::error::{SoapError, SoapResult};
use crate::session::{LoginRequest, Session, SessionManager};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Transport};
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Content type of every request.
pub const REQUEST_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

/// Header naming the invoked action.
pub const SOAP_ACTION_HEADER: &str = "soapaction";

/// Called after every HTTP exchange with the request and the buffered response.
pub type RequestCompletionCallback = Arc<dyn Fn(&HttpRequest, &HttpResponse) + Send + Sync>;

/// Typed client for the catalog API.
///
/// Owns the session cache; share one instance (e.g. behind an `Arc`) between
/// concurrent callers so they reuse the same session.
pub struct Client {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    sessions: SessionManager,
    timeout: Duration,
    on_request_completed: Option<RequestCompletionCallback>,
}

impl Client {
    /// Create a client that talks HTTP through `reqwest`.
    pub fn new(config: ClientConfig) -> SoapResult<Self> {
        config.validate()?;
        let transport = HttpTransport::new(config.timeout())?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a client over a custom transport.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> SoapResult<Self> {
        config.validate()?;
        let sessions = SessionManager::new(config.session_ttl())?;
        let timeout = config.timeout();

        Ok(Self {
            config,
            transport,
            sessions,
            timeout,
            on_request_completed: None,
        })
    }

    /// Register a callback run after every HTTP exchange.
    #[must_use]
    pub fn on_request_completed<F>(mut self, callback: F) -> Self
    where
        F: Fn(&HttpRequest, &HttpResponse) + Send + Sync + 'static,
    {
        self.on_request_completed = Some(Arc::new(callback));
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// A session that is valid now, logging in if needed.
    pub async fn session(&self) -> SoapResult<Session> {
        self.sessions.valid_session(|| self.exchange_login()).await
    }

    /// Log in now, replacing any cached session.
    pub async fn login(&self) -> SoapResult<Session> {
        self.sessions.renew(|| self.exchange_login()).await
    }

    /// Perform one API call.
    ///
    /// Authenticated actions get the current session injected first. Nothing
    /// is retried: transport errors, faults and decode errors are returned as
    /// they occur.
    pub async fn call<A: Action>(&self, mut request: A) -> SoapResult<A::Response> {
        if A::REQUIRES_SESSION {
            let session = self.session().await?;
            request.set_session(&session);
        }
        self.send(request).await
    }

    async fn exchange_login(&self) -> SoapResult<String> {
        let request = LoginRequest::new(self.config.api_user.as_str(), self.config.api_key.clone());
        let response = self.send(request).await?;
        Ok(response.login_return)
    }

    async fn send<A: Action>(&self, request: A) -> SoapResult<A::Response> {
        let action = A::ELEMENT;
        let body = Envelope::wrap(request).encode()?;

        let request = HttpRequest {
            url: self.config.endpoint.clone(),
            action: action.to_string(),
            headers: self.headers(action)?,
            body: Bytes::from(body),
        };

        debug!(action = action, bytes = request.body.len(), "Sending SOAP request");
        if self.config.debug {
            trace!(action = action, body = %String::from_utf8_lossy(&request.body), "Request body");
        }

        let response = match tokio::time::timeout(self.timeout, self.transport.post(&request)).await {
            Ok(result) => result?,
            Err(_) => {
                debug!(action = action, timeout = ?self.timeout, "SOAP request timed out");
                return Err(SoapError::Timeout(self.timeout));
            }
        };

        debug!(
            action = action,
            status = response.status,
            bytes = response.body.len(),
            "Received SOAP response"
        );
        if self.config.debug {
            trace!(action = action, body = %String::from_utf8_lossy(&response.body), "Response body");
        }

        if let Some(ref callback) = self.on_request_completed {
            callback(&request, &response);
        }

        let body = classify(&response)?;
        let envelope = Envelope::<A::Response>::decode(&body)?;
        Ok(envelope.into_body())
    }

    fn headers(&self, action: &str) -> SoapResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(REQUEST_CONTENT_TYPE));
        headers.insert(ACCEPT, HeaderValue::from_static("text/xml"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.config.user_agent)
                .map_err(|e| SoapError::Config(format!("invalid user agent: {}", e)))?,
        );
        headers.insert(
            HeaderName::from_static(SOAP_ACTION_HEADER),
            HeaderValue::from_str(&format!("{}#{}", API_NS, action))
                .map_err(|e| SoapError::Encode(format!("invalid action name: {}", e)))?,
        );
        Ok(headers)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.config.endpoint)
            .field("timeout", &self.timeout)
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}
