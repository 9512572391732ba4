//! Typed SOAP client for the Magento catalog API.
//!
//! Builds SOAP envelopes around typed request payloads, posts them over
//! HTTP, and decodes the replies into typed responses. The client logs in on
//! first use and renews its session transparently once it expires.
//!
//! # Features
//!
//! - Fixed SOAP 1.1 envelope with all API namespaces declared
//! - CDATA encoding for credentials and opaque strings
//! - Zone-less `YYYY-MM-DD HH:MM:SS` dates
//! - Session caching with single-flight renewal across concurrent callers
//! - Fault detection before typed decoding, on one buffered body
//!
//! # Example
//!
//! ```ignore
//! use magento_soap::{Client, ClientConfig};
//! use magento_soap::catalog::{CatalogProductListRequest, Filters};
//!
//! let client = Client::new(ClientConfig::new(
//!     "https://shop.example.com/api/soap/",
//!     "api-user",
//!     "api-key",
//! ))?;
//!
//! let request = CatalogProductListRequest::new()
//!     .with_filters(Filters::default().with_complex_filter("sku", "like", "n26%"));
//! for product in client.catalog_product_list(request).await? {
//!     println!("{} {}", product.sku, product.name);
//! }
//! ```

pub mod catalog;
pub mod classifier;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod session;
pub mod transport;
pub mod types;
pub mod xml;

pub use client::Client;
pub use config::ClientConfig;
pub use envelope::{Action, Envelope, Payload};
pub use error::{ErrorResponse, SoapError, SoapResult};
pub use session::{Session, SessionId};
pub use types::{LocalDateTime, SecureString};
