//! Field types with special wire encodings.

use crate::error::{SoapError, SoapResult};
use crate::xml::{write_cdata_element, write_text_element, XmlElement};
use chrono::NaiveDateTime;
use quick_xml::Writer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;

/// Wire layout of dates without a zone.
pub const LOCAL_DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Opaque string that is always sent as a CDATA section.
///
/// Credentials and free text go through this type so that reserved XML
/// characters reach the server untouched. `Debug` never prints the value.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecureString(String);

impl SecureString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn write<W: Write>(&self, writer: &mut Writer<W>, name: &str) -> SoapResult<()> {
        write_cdata_element(writer, name, &self.0)
    }

    pub fn read(element: &XmlElement) -> Self {
        Self(element.text.clone())
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecureString(***)")
    }
}

impl From<&str> for SecureString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SecureString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Date and time without a zone offset, as the API reports them.
///
/// The zero value stands for "no date" and travels as an empty element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalDateTime(Option<NaiveDateTime>);

impl LocalDateTime {
    pub fn new(value: NaiveDateTime) -> Self {
        Self(Some(value))
    }

    pub fn zero() -> Self {
        Self(None)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_none()
    }

    pub fn get(&self) -> Option<NaiveDateTime> {
        self.0
    }

    /// Parse the wire layout. Empty text is the zero value.
    pub fn parse(text: &str) -> SoapResult<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Self::zero());
        }
        NaiveDateTime::parse_from_str(text, LOCAL_DATE_TIME_FORMAT)
            .map(Self::new)
            .map_err(|e| SoapError::Decode(format!("invalid date {:?}: {}", text, e)))
    }

    pub fn write<W: Write>(&self, writer: &mut Writer<W>, name: &str) -> SoapResult<()> {
        write_text_element(writer, name, &self.to_string())
    }

    pub fn read(element: &XmlElement) -> SoapResult<Self> {
        Self::parse(&element.text)
    }
}

impl fmt::Display for LocalDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => write!(f, "{}", value.format(LOCAL_DATE_TIME_FORMAT)),
            None => Ok(()),
        }
    }
}

impl From<NaiveDateTime> for LocalDateTime {
    fn from(value: NaiveDateTime) -> Self {
        Self::new(value)
    }
}
