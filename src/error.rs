//! Error types for the SOAP client.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// SOAP client errors.
#[derive(Error, Debug)]
pub enum SoapError {
    /// Network failure or an HTTP response that could not be read.
    #[error("transport error: {0}")]
    Transport(String),

    /// The per-call deadline elapsed before the exchange completed.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The server answered with a SOAP fault.
    #[error("SOAP fault: {0}")]
    Fault(ErrorResponse),

    /// The response could not be mapped into the expected payload.
    #[error("decode error: {0}")]
    Decode(String),

    /// The request could not be serialized.
    #[error("encode error: {0}")]
    Encode(String),

    /// The login exchange failed; the triggering call cannot proceed.
    #[error("login failed: {0}")]
    Login(#[source] Box<SoapError>),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SoapError {
    /// Fault detail, if this error (or the login failure it wraps) is a SOAP fault.
    pub fn fault(&self) -> Option<&ErrorResponse> {
        match self {
            Self::Fault(fault) => Some(fault),
            Self::Login(inner) => inner.fault(),
            _ => None,
        }
    }

    /// True when the server rejected the request at the protocol level.
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Fault(_))
    }

    /// True when the reply could not be understood.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

pub type SoapResult<T> = Result<T, SoapError>;

/// Protocol-level failure reported by the server.
///
/// Built from the fixed fault path `Body/Fault/{faultcode,faultstring}` and
/// `Body/Fault/Reason/Text`. An empty body produces an `ErrorResponse` with
/// no detail at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorResponse {
    /// HTTP status of the response that carried the fault
    pub http_status: u16,
    /// Fault code (`faultcode`)
    pub code: String,
    /// Fault message (`faultstring`)
    pub message: String,
    /// Fault reason text (`Reason/Text`)
    pub reason: String,
    /// Classification note, e.g. an unexpected content type
    pub note: Option<String>,
}

impl ErrorResponse {
    /// Create a fault with the given code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            ..Default::default()
        }
    }

    /// Set the fault reason text.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Set the HTTP status.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = status;
        self
    }

    /// Render this fault as a SOAP 1.1 fault document.
    pub fn to_xml(&self) -> String {
        let reason = if self.reason.is_empty() {
            String::new()
        } else {
            format!(
                "\n      <Reason>\n        <Text>{}</Text>\n      </Reason>",
                xml_escape(&self.reason)
            )
        };

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/">
  <SOAP-ENV:Body>
    <SOAP-ENV:Fault>
      <faultcode>{}</faultcode>
      <faultstring>{}</faultstring>{}
    </SOAP-ENV:Fault>
  </SOAP-ENV:Body>
</SOAP-ENV:Envelope>"#,
            xml_escape(&self.code),
            xml_escape(&self.message),
            reason
        )
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.http_status)?;
        if !self.code.is_empty() {
            write!(f, " [{}]", self.code)?;
        }
        if self.message.is_empty() {
            write!(f, " no fault detail")?;
        } else {
            write!(f, " {}", self.message)?;
        }
        if !self.reason.is_empty() {
            write!(f, " ({})", self.reason)?;
        }
        if let Some(ref note) = self.note {
            write!(f, "; {}", note)?;
        }
        Ok(())
    }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
