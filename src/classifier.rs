//! Response classification.
//!
//! A buffered HTTP response is first sniffed for a SOAP fault. Only when no
//! fault is present is the same buffer handed on for typed decoding.

use crate::error::{ErrorResponse, SoapError, SoapResult};
use crate::transport::HttpResponse;
use crate::xml::{parse_document, XmlElement};
use bytes::Bytes;
use tracing::{debug, warn};

/// Media type the API is expected to answer with.
pub const SOAP_MEDIA_TYPE: &str = "text/xml";

/// Classify a buffered response.
///
/// Returns the body for decoding when the call succeeded at the protocol
/// level. An empty body or a fault with a non-empty `faultstring` yields
/// [`SoapError::Fault`]; a body that is not well-formed XML yields
/// [`SoapError::Decode`]. A content-type mismatch alone is not fatal.
pub fn classify(response: &HttpResponse) -> SoapResult<Bytes> {
    let note = check_content_type(response.content_type.as_deref());
    if let Some(ref note) = note {
        warn!(status = response.status, note = %note, "Unexpected response content type");
    }

    if response.body.is_empty() {
        debug!(status = response.status, "Empty response body");
        return Err(SoapError::Fault(ErrorResponse {
            http_status: response.status,
            note,
            ..Default::default()
        }));
    }

    let document = match parse_document(&response.body) {
        Ok(document) => document,
        Err(SoapError::Decode(detail)) => {
            return Err(SoapError::Decode(format!("malformed response: {}", detail)));
        }
        Err(e) => return Err(e),
    };

    if let Some(mut fault) = extract_fault(&document) {
        fault.http_status = response.status;
        fault.note = note;
        debug!(
            status = fault.http_status,
            code = %fault.code,
            message = %fault.message,
            "SOAP fault received"
        );
        return Err(SoapError::Fault(fault));
    }

    if !response.is_success() {
        debug!(status = response.status, "Non-2xx response without a fault, decoding body");
    }
    Ok(response.body.clone())
}

/// Read `Body/Fault` from a parsed document. Faults without a message are
/// not treated as faults.
pub fn extract_fault(document: &XmlElement) -> Option<ErrorResponse> {
    let fault = document.find(&["Body", "Fault"])?;
    let message = fault.child_string("faultstring");
    if message.trim().is_empty() {
        return None;
    }

    Some(ErrorResponse {
        code: fault.child_string("faultcode"),
        message,
        reason: fault
            .find(&["Reason", "Text"])
            .map(|text| text.text.clone())
            .unwrap_or_default(),
        ..Default::default()
    })
}

/// Compare the primary content type with [`SOAP_MEDIA_TYPE`], returning a
/// note on mismatch.
fn check_content_type(header: Option<&str>) -> Option<String> {
    let Some(header) = header else {
        return Some(format!("expected Content-Type {:?}, got none", SOAP_MEDIA_TYPE));
    };
    let primary = header.split(';').next().unwrap_or("").trim();
    if primary.eq_ignore_ascii_case(SOAP_MEDIA_TYPE) {
        None
    } else {
        Some(format!(
            "expected Content-Type {:?}, got {:?}",
            SOAP_MEDIA_TYPE, primary
        ))
    }
}
