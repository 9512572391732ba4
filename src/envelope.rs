//! SOAP envelope encoding and decoding.
//!
//! Every request and response travels in the same envelope: fixed namespace
//! declarations on the root, an optional header, and a body holding exactly
//! one payload element.

use crate::error::{SoapError, SoapResult};
use crate::session::Session;
use crate::xml::{emit, parse_document, XmlElement};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use std::io::Write;

/// SOAP 1.1 envelope namespace.
pub const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";
pub const SOAP_ENC_NS: &str = "http://schemas.xmlsoap.org/soap/encoding/";
/// Namespace of the catalog API's own elements.
pub const API_NS: &str = "urn:Magento";

const ENV_PREFIX: &str = "SOAP-ENV";
const API_PREFIX: &str = "urn";

/// A typed body payload.
///
/// `ELEMENT` is the local name of the single element the payload occupies in
/// the body. Implementations write and read only the element's children; the
/// envelope owns the element itself.
pub trait Payload: Default + Sized {
    const ELEMENT: &'static str;

    fn write_fields<W: Write>(&self, writer: &mut Writer<W>) -> SoapResult<()>;

    fn read_fields(element: &XmlElement) -> SoapResult<Self>;
}

/// A request payload that can be sent as one API call.
pub trait Action: Payload + Send {
    /// Payload expected back in the response body.
    type Response: Payload + Send;

    /// Whether a session token must be injected before sending.
    const REQUIRES_SESSION: bool = true;

    /// Store the session in the payload's `sessionId` field. Actions that
    /// do not require a session leave this empty.
    fn set_session(&mut self, session: &Session);
}

/// A SOAP envelope around one payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope<P> {
    /// Header entries, empty when the header carries no data
    pub header: Vec<XmlElement>,
    /// Body payload
    pub body: P,
}

impl<P: Payload> Envelope<P> {
    /// Wrap a payload with an empty header.
    pub fn wrap(body: P) -> Self {
        Self {
            header: Vec::new(),
            body,
        }
    }

    /// Add a header entry.
    #[must_use]
    pub fn with_header(mut self, entry: XmlElement) -> Self {
        self.header.push(entry);
        self
    }

    pub fn into_body(self) -> P {
        self.body
    }

    /// Serialize into one XML document.
    pub fn encode(&self) -> SoapResult<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        emit(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let envelope_tag = format!("{}:Envelope", ENV_PREFIX);
        let env_ns_attr = format!("xmlns:{}", ENV_PREFIX);
        let api_ns_attr = format!("xmlns:{}", API_PREFIX);
        let root = BytesStart::new(envelope_tag.as_str()).with_attributes([
            (env_ns_attr.as_str(), SOAP_ENV_NS),
            ("xmlns:xsi", XSI_NS),
            ("xmlns:xsd", XSD_NS),
            (api_ns_attr.as_str(), API_NS),
            ("xmlns:soapenc", SOAP_ENC_NS),
        ]);
        emit(&mut writer, Event::Start(root))?;

        let header_tag = format!("{}:Header", ENV_PREFIX);
        if self.header.is_empty() {
            emit(&mut writer, Event::Empty(BytesStart::new(header_tag.as_str())))?;
        } else {
            emit(&mut writer, Event::Start(BytesStart::new(header_tag.as_str())))?;
            for entry in &self.header {
                entry.write(&mut writer)?;
            }
            emit(&mut writer, Event::End(BytesEnd::new(header_tag.as_str())))?;
        }

        let body_tag = format!("{}:Body", ENV_PREFIX);
        emit(&mut writer, Event::Start(BytesStart::new(body_tag.as_str())))?;

        let payload_tag = format!("{}:{}", API_PREFIX, P::ELEMENT);
        let encoding_attr = format!("{}:encodingStyle", ENV_PREFIX);
        let payload = BytesStart::new(payload_tag.as_str())
            .with_attributes([(encoding_attr.as_str(), SOAP_ENC_NS)]);
        emit(&mut writer, Event::Start(payload))?;
        self.body.write_fields(&mut writer)?;
        emit(&mut writer, Event::End(BytesEnd::new(payload_tag.as_str())))?;

        emit(&mut writer, Event::End(BytesEnd::new(body_tag.as_str())))?;
        emit(&mut writer, Event::End(BytesEnd::new(envelope_tag.as_str())))?;

        Ok(writer.into_inner())
    }

    /// Parse a document and decode its body into `P`.
    pub fn decode(data: &[u8]) -> SoapResult<Self> {
        let root = parse_document(data)?;
        Self::from_document(&root)
    }

    /// Decode an already parsed document.
    ///
    /// An empty body yields `P::default()`. A body whose single element is not
    /// `P::ELEMENT`, or that holds more than one element, is a decode error.
    pub fn from_document(root: &XmlElement) -> SoapResult<Self> {
        if root.name != "Envelope" {
            return Err(SoapError::Decode(format!(
                "expected SOAP Envelope, found <{}>",
                root.qname
            )));
        }

        let body = root
            .child("Body")
            .ok_or_else(|| SoapError::Decode("envelope has no Body".to_string()))?;

        let header = root
            .child("Header")
            .map(|h| h.children.clone())
            .unwrap_or_default();

        let payload = match body.children.as_slice() {
            [] if body.text.trim().is_empty() => P::default(),
            [] => {
                return Err(SoapError::Decode(format!(
                    "unexpected body shape: expected <{}>, found text content",
                    P::ELEMENT
                )))
            }
            [element] if element.name == P::ELEMENT => P::read_fields(element)?,
            [element] => {
                return Err(SoapError::Decode(format!(
                    "unexpected body shape: expected <{}>, found <{}>",
                    P::ELEMENT,
                    element.qname
                )))
            }
            elements => {
                return Err(SoapError::Decode(format!(
                    "unexpected body shape: expected one <{}>, found {} elements",
                    P::ELEMENT,
                    elements.len()
                )))
            }
        };

        Ok(Self {
            header,
            body: payload,
        })
    }
}
