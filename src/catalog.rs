//! Catalog product actions.

use crate::client::Client;
use crate::envelope::{Action, Payload};
use crate::error::SoapResult;
use crate::session::{Session, SessionId};
use crate::types::LocalDateTime;
use crate::xml::{emit, read_item_list, write_item_list, write_text_element, XmlElement};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use std::io::Write;

/// Simple `key = value` filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssociativeEntity {
    pub key: String,
    pub value: String,
}

/// Filter with an explicit operator, e.g. `sku like "AB%"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComplexFilter {
    pub key: String,
    /// Operator such as `eq`, `like`, `in`, `gt`
    pub operator: String,
    pub value: String,
}

/// Product list filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    pub filter: Vec<AssociativeEntity>,
    pub complex_filter: Vec<ComplexFilter>,
}

impl Filters {
    #[must_use]
    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter.push(AssociativeEntity {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn with_complex_filter(
        mut self,
        key: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.complex_filter.push(ComplexFilter {
            key: key.into(),
            operator: operator.into(),
            value: value.into(),
        });
        self
    }

    fn write<W: Write>(&self, writer: &mut Writer<W>) -> SoapResult<()> {
        start(writer, "filters")?;

        start(writer, "filter")?;
        for entity in &self.filter {
            start(writer, "item")?;
            write_text_element(writer, "key", &entity.key)?;
            write_text_element(writer, "value", &entity.value)?;
            end(writer, "item")?;
        }
        end(writer, "filter")?;

        start(writer, "complex_filter")?;
        for complex in &self.complex_filter {
            start(writer, "item")?;
            write_text_element(writer, "key", &complex.key)?;
            start(writer, "value")?;
            write_text_element(writer, "key", &complex.operator)?;
            write_text_element(writer, "value", &complex.value)?;
            end(writer, "value")?;
            end(writer, "item")?;
        }
        end(writer, "complex_filter")?;

        end(writer, "filters")
    }

    fn read(element: &XmlElement) -> Self {
        let filter = element
            .child("filter")
            .map(|list| {
                list.children_named("item")
                    .map(|item| AssociativeEntity {
                        key: item.child_string("key"),
                        value: item.child_string("value"),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let complex_filter = element
            .child("complex_filter")
            .map(|list| {
                list.children_named("item")
                    .map(|item| {
                        let condition = item.child("value");
                        ComplexFilter {
                            key: item.child_string("key"),
                            operator: condition.map(|c| c.child_string("key")).unwrap_or_default(),
                            value: condition.map(|c| c.child_string("value")).unwrap_or_default(),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            filter,
            complex_filter,
        }
    }
}

/// `catalogProductList` request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogProductListRequest {
    pub session_id: Option<SessionId>,
    pub filters: Option<Filters>,
    pub store_view: Option<String>,
}

impl CatalogProductListRequest {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = Some(filters);
        self
    }

    #[must_use]
    pub fn with_store_view(mut self, store_view: impl Into<String>) -> Self {
        self.store_view = Some(store_view.into());
        self
    }
}

impl Payload for CatalogProductListRequest {
    const ELEMENT: &'static str = "catalogProductList";

    fn write_fields<W: Write>(&self, writer: &mut Writer<W>) -> SoapResult<()> {
        if let Some(ref session_id) = self.session_id {
            session_id.write(writer)?;
        }
        if let Some(ref filters) = self.filters {
            filters.write(writer)?;
        }
        if let Some(ref store_view) = self.store_view {
            write_text_element(writer, "storeView", store_view)?;
        }
        Ok(())
    }

    fn read_fields(element: &XmlElement) -> SoapResult<Self> {
        Ok(Self {
            session_id: SessionId::read(element),
            filters: element.child("filters").map(Filters::read),
            store_view: element.child_text("storeView").map(str::to_string),
        })
    }
}

impl Action for CatalogProductListRequest {
    type Response = CatalogProductListResponse;

    fn set_session(&mut self, session: &Session) {
        self.session_id = Some(session.id());
    }
}

/// One row of a product list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogProductEntity {
    pub product_id: u64,
    pub sku: String,
    pub name: String,
    /// Attribute set id
    pub set: String,
    /// Product type (`simple`, `configurable`, ...)
    pub kind: String,
    pub category_ids: Vec<u64>,
    pub website_ids: Vec<u64>,
}

impl CatalogProductEntity {
    fn write<W: Write>(&self, writer: &mut Writer<W>) -> SoapResult<()> {
        start(writer, "item")?;
        write_text_element(writer, "product_id", &self.product_id.to_string())?;
        write_text_element(writer, "sku", &self.sku)?;
        write_text_element(writer, "name", &self.name)?;
        write_text_element(writer, "set", &self.set)?;
        write_text_element(writer, "type", &self.kind)?;
        write_item_list(writer, "category_ids", &self.category_ids)?;
        write_item_list(writer, "website_ids", &self.website_ids)?;
        end(writer, "item")
    }

    fn read(element: &XmlElement) -> SoapResult<Self> {
        Ok(Self {
            product_id: element.parse_child("product_id")?.unwrap_or_default(),
            sku: element.child_string("sku"),
            name: element.child_string("name"),
            set: element.child_string("set"),
            kind: element.child_string("type"),
            category_ids: read_item_list(element, "category_ids")?,
            website_ids: read_item_list(element, "website_ids")?,
        })
    }
}

/// `catalogProductListResponse`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogProductListResponse {
    pub store_view: Vec<CatalogProductEntity>,
}

impl Payload for CatalogProductListResponse {
    const ELEMENT: &'static str = "catalogProductListResponse";

    fn write_fields<W: Write>(&self, writer: &mut Writer<W>) -> SoapResult<()> {
        start(writer, "storeView")?;
        for entity in &self.store_view {
            entity.write(writer)?;
        }
        end(writer, "storeView")
    }

    fn read_fields(element: &XmlElement) -> SoapResult<Self> {
        let store_view = match element.child("storeView") {
            Some(list) => list
                .children_named("item")
                .map(CatalogProductEntity::read)
                .collect::<SoapResult<Vec<_>>>()?,
            None => Vec::new(),
        };
        Ok(Self { store_view })
    }
}

/// `catalogProductInfo` request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogProductInfoRequest {
    pub session_id: Option<SessionId>,
    /// Product id or SKU
    pub product: String,
    pub store_view: Option<String>,
    /// `sku` or `id`; the server guesses when absent
    pub identifier_type: Option<String>,
}

impl CatalogProductInfoRequest {
    pub fn new(product: impl Into<String>) -> Self {
        Self {
            product: product.into(),
            ..Default::default()
        }
    }

    /// Look the product up by SKU.
    pub fn by_sku(sku: impl Into<String>) -> Self {
        Self {
            identifier_type: Some("sku".to_string()),
            ..Self::new(sku)
        }
    }

    #[must_use]
    pub fn with_store_view(mut self, store_view: impl Into<String>) -> Self {
        self.store_view = Some(store_view.into());
        self
    }
}

impl Payload for CatalogProductInfoRequest {
    const ELEMENT: &'static str = "catalogProductInfo";

    fn write_fields<W: Write>(&self, writer: &mut Writer<W>) -> SoapResult<()> {
        if let Some(ref session_id) = self.session_id {
            session_id.write(writer)?;
        }
        write_text_element(writer, "productId", &self.product)?;
        if let Some(ref store_view) = self.store_view {
            write_text_element(writer, "storeView", store_view)?;
        }
        if let Some(ref identifier_type) = self.identifier_type {
            write_text_element(writer, "identifierType", identifier_type)?;
        }
        Ok(())
    }

    fn read_fields(element: &XmlElement) -> SoapResult<Self> {
        Ok(Self {
            session_id: SessionId::read(element),
            product: element.child_string("productId"),
            store_view: element.child_text("storeView").map(str::to_string),
            identifier_type: element.child_text("identifierType").map(str::to_string),
        })
    }
}

impl Action for CatalogProductInfoRequest {
    type Response = CatalogProductInfoResponse;

    fn set_session(&mut self, session: &Session) {
        self.session_id = Some(session.id());
    }
}

/// Product details returned by `catalogProductInfo`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogProductReturnEntity {
    pub product_id: u64,
    pub sku: String,
    pub set: String,
    pub kind: String,
    pub name: String,
    pub description: String,
    pub short_description: String,
    pub status: Option<u32>,
    pub weight: Option<f64>,
    pub price: Option<f64>,
    pub categories: Vec<u64>,
    pub websites: Vec<u64>,
    pub created_at: LocalDateTime,
    pub updated_at: LocalDateTime,
}

/// `catalogProductInfoResponse`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogProductInfoResponse {
    pub info: CatalogProductReturnEntity,
}

impl Payload for CatalogProductInfoResponse {
    const ELEMENT: &'static str = "catalogProductInfoResponse";

    fn write_fields<W: Write>(&self, writer: &mut Writer<W>) -> SoapResult<()> {
        let info = &self.info;
        start(writer, "info")?;
        write_text_element(writer, "product_id", &info.product_id.to_string())?;
        write_text_element(writer, "sku", &info.sku)?;
        write_text_element(writer, "set", &info.set)?;
        write_text_element(writer, "type", &info.kind)?;
        write_text_element(writer, "name", &info.name)?;
        write_text_element(writer, "description", &info.description)?;
        write_text_element(writer, "short_description", &info.short_description)?;
        write_optional(writer, "status", info.status)?;
        write_optional(writer, "weight", info.weight)?;
        write_optional(writer, "price", info.price)?;
        write_item_list(writer, "categories", &info.categories)?;
        write_item_list(writer, "websites", &info.websites)?;
        info.created_at.write(writer, "created_at")?;
        info.updated_at.write(writer, "updated_at")?;
        end(writer, "info")
    }

    fn read_fields(element: &XmlElement) -> SoapResult<Self> {
        let Some(info) = element.child("info") else {
            return Ok(Self::default());
        };

        let date = |name: &str| -> SoapResult<LocalDateTime> {
            info.child(name)
                .map(LocalDateTime::read)
                .transpose()
                .map(Option::unwrap_or_default)
        };

        Ok(Self {
            info: CatalogProductReturnEntity {
                product_id: info.parse_child("product_id")?.unwrap_or_default(),
                sku: info.child_string("sku"),
                set: info.child_string("set"),
                kind: info.child_string("type"),
                name: info.child_string("name"),
                description: info.child_string("description"),
                short_description: info.child_string("short_description"),
                status: info.parse_child("status")?,
                weight: info.parse_child("weight")?,
                price: info.parse_child("price")?,
                categories: read_item_list(info, "categories")?,
                websites: read_item_list(info, "websites")?,
                created_at: date("created_at")?,
                updated_at: date("updated_at")?,
            },
        })
    }
}

impl Client {
    /// List products matching the request's filters.
    pub async fn catalog_product_list(
        &self,
        request: CatalogProductListRequest,
    ) -> SoapResult<Vec<CatalogProductEntity>> {
        Ok(self.call(request).await?.store_view)
    }

    /// Fetch the details of one product.
    pub async fn catalog_product_info(
        &self,
        request: CatalogProductInfoRequest,
    ) -> SoapResult<CatalogProductReturnEntity> {
        Ok(self.call(request).await?.info)
    }
}

fn start<W: Write>(writer: &mut Writer<W>, name: &str) -> SoapResult<()> {
    emit(writer, Event::Start(BytesStart::new(name)))
}

fn end<W: Write>(writer: &mut Writer<W>, name: &str) -> SoapResult<()> {
    emit(writer, Event::End(BytesEnd::new(name)))
}

fn write_optional<W, T>(writer: &mut Writer<W>, name: &str, value: Option<T>) -> SoapResult<()>
where
    W: Write,
    T: ToString,
{
    match value {
        Some(value) => write_text_element(writer, name, &value.to_string()),
        None => Ok(()),
    }
}
