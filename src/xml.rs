//! XML document tree and writer helpers.
//!
//! Uses quick-xml which is safe against XXE by default (doesn't expand entities).
//! Elements are matched by local name, so whichever namespace prefix the
//! server picks (`SOAP-ENV:`, `soap:`, `ns1:`) is accepted.

use crate::error::{SoapError, SoapResult};
use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::fmt::Display;
use std::io::Write;
use std::str::FromStr;

/// An owned XML element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    /// Qualified name as written (`SOAP-ENV:Body`)
    pub qname: String,
    /// Local name (`Body`)
    pub name: String,
    /// Attributes in document order, keys qualified
    pub attributes: Vec<(String, String)>,
    /// Child elements in document order
    pub children: Vec<XmlElement>,
    /// Concatenated text and CDATA content
    pub text: String,
}

impl XmlElement {
    /// Create an empty element with the given qualified name.
    pub fn new(qname: impl Into<String>) -> Self {
        let qname = qname.into();
        let name = local_part(&qname).to_string();
        Self {
            qname,
            name,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }

    /// First child with the given local name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All children with the given local name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Follow a path of local names starting below this element.
    pub fn find(&self, path: &[&str]) -> Option<&XmlElement> {
        path.iter().try_fold(self, |element, name| element.child(name))
    }

    /// Attribute value by local or qualified key.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key || local_part(k) == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Text of the first child with the given name.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(XmlElement::text)
    }

    /// Text of a child as an owned string, empty when absent.
    pub fn child_string(&self, name: &str) -> String {
        self.child_text(name).unwrap_or_default().to_string()
    }

    /// Parse the text of a child. Missing or empty children yield `None`.
    pub fn parse_child<T>(&self, name: &str) -> SoapResult<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.child_text(name).map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => text.parse().map(Some).map_err(|e| {
                SoapError::Decode(format!("invalid value for <{}> in <{}>: {}", name, self.name, e))
            }),
        }
    }

    /// Write this element and its subtree.
    pub fn write<W: Write>(&self, writer: &mut Writer<W>) -> SoapResult<()> {
        let mut start = BytesStart::new(self.qname.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.children.is_empty() && self.text.is_empty() {
            return emit(writer, Event::Empty(start));
        }

        emit(writer, Event::Start(start))?;
        if !self.text.is_empty() {
            emit(writer, Event::Text(BytesText::new(&self.text)))?;
        }
        for child in &self.children {
            child.write(writer)?;
        }
        emit(writer, Event::End(BytesEnd::new(self.qname.as_str())))
    }
}

/// Parse raw bytes into an element tree.
pub fn parse_document(data: &[u8]) -> SoapResult<XmlElement> {
    let xml_str = std::str::from_utf8(data)
        .map_err(|e| SoapError::Decode(format!("invalid UTF-8: {}", e)))?;

    let mut reader = Reader::from_str(xml_str);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                if stack.is_empty() && root.is_some() {
                    return Err(multiple_roots());
                }
                stack.push(element_from_start(e)?);
            }

            Ok(Event::Empty(ref e)) => {
                let element = element_from_start(e)?;
                close_element(&mut stack, &mut root, element)?;
            }

            Ok(Event::End(ref e)) => {
                let element = stack.pop().ok_or_else(|| {
                    SoapError::Decode(format!(
                        "unexpected closing tag </{}>",
                        String::from_utf8_lossy(e.name().as_ref())
                    ))
                })?;
                close_element(&mut stack, &mut root, element)?;
            }

            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| SoapError::Decode(format!("invalid text content: {}", e)))?;
                push_text(&mut stack, &text)?;
            }

            Ok(Event::CData(e)) => {
                let text = String::from_utf8(e.into_inner().into_owned())
                    .map_err(|e| SoapError::Decode(format!("invalid CDATA content: {}", e)))?;
                push_text(&mut stack, &text)?;
            }

            // The API never sends a DTD.
            Ok(Event::DocType(_)) => {
                return Err(SoapError::Decode(
                    "DOCTYPE declarations are not allowed".to_string(),
                ));
            }

            Ok(Event::Eof) => break,

            Err(e) => {
                return Err(SoapError::Decode(format!(
                    "XML parse error at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }

            // Declarations, comments, processing instructions
            _ => {}
        }

        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(SoapError::Decode(format!(
            "unexpected end of document: <{}> is not closed",
            open.qname
        )));
    }

    root.ok_or_else(|| SoapError::Decode("document has no root element".to_string()))
}

/// Write `<name>text</name>` with the text escaped.
pub fn write_text_element<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> SoapResult<()> {
    emit(writer, Event::Start(BytesStart::new(name)))?;
    if !text.is_empty() {
        emit(writer, Event::Text(BytesText::new(text)))?;
    }
    emit(writer, Event::End(BytesEnd::new(name)))
}

/// Write `<name><![CDATA[text]]></name>`.
///
/// A literal `]]>` cannot appear inside one CDATA section, so the text is
/// split into consecutive sections around it.
pub fn write_cdata_element<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> SoapResult<()> {
    emit(writer, Event::Start(BytesStart::new(name)))?;
    let mut rest = text;
    while let Some(pos) = rest.find("]]>") {
        emit(writer, Event::CData(BytesCData::new(&rest[..pos + 2])))?;
        rest = &rest[pos + 2..];
    }
    emit(writer, Event::CData(BytesCData::new(rest)))?;
    emit(writer, Event::End(BytesEnd::new(name)))
}

/// Write a list as `<name><item>..</item>...</name>`.
pub fn write_item_list<W, T>(writer: &mut Writer<W>, name: &str, items: &[T]) -> SoapResult<()>
where
    W: Write,
    T: Display,
{
    if items.is_empty() {
        return emit(writer, Event::Empty(BytesStart::new(name)));
    }
    emit(writer, Event::Start(BytesStart::new(name)))?;
    for item in items {
        write_text_element(writer, "item", &item.to_string())?;
    }
    emit(writer, Event::End(BytesEnd::new(name)))
}

/// Read a list written by [`write_item_list`]. A missing list is empty.
pub fn read_item_list<T>(parent: &XmlElement, name: &str) -> SoapResult<Vec<T>>
where
    T: FromStr,
    T::Err: Display,
{
    let Some(list) = parent.child(name) else {
        return Ok(Vec::new());
    };
    list.children_named("item")
        .map(|item| {
            item.text.trim().parse().map_err(|e| {
                SoapError::Decode(format!("invalid <{}> item {:?}: {}", name, item.text, e))
            })
        })
        .collect()
}

pub(crate) fn emit<W: Write>(writer: &mut Writer<W>, event: Event<'_>) -> SoapResult<()> {
    writer
        .write_event(event)
        .map_err(|e| SoapError::Encode(e.to_string()))
}

fn element_from_start(e: &BytesStart) -> SoapResult<XmlElement> {
    let qname = std::str::from_utf8(e.name().as_ref())
        .map_err(|e| SoapError::Decode(format!("invalid element name: {}", e)))?
        .to_string();
    let mut element = XmlElement::new(qname);

    for attr in e.attributes() {
        let attr = attr.map_err(|e| SoapError::Decode(format!("invalid attribute: {}", e)))?;
        let key = std::str::from_utf8(attr.key.as_ref()).unwrap_or("").to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| SoapError::Decode(format!("invalid attribute value: {}", e)))?;
        element.attributes.push((key, value.into_owned()));
    }

    Ok(element)
}

fn close_element(
    stack: &mut Vec<XmlElement>,
    root: &mut Option<XmlElement>,
    mut element: XmlElement,
) -> SoapResult<()> {
    // Indentation between child elements is not content.
    if !element.children.is_empty() && element.text.trim().is_empty() {
        element.text.clear();
    }

    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_some() => return Err(multiple_roots()),
        None => *root = Some(element),
    }
    Ok(())
}

fn push_text(stack: &mut [XmlElement], text: &str) -> SoapResult<()> {
    match stack.last_mut() {
        Some(element) => element.text.push_str(text),
        None if text.trim().is_empty() => {}
        None => {
            return Err(SoapError::Decode(
                "text content outside the root element".to_string(),
            ))
        }
    }
    Ok(())
}

fn multiple_roots() -> SoapError {
    SoapError::Decode("document has more than one root element".to_string())
}

fn local_part(qname: &str) -> &str {
    qname.rsplit(':').next().unwrap_or(qname)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(f: impl FnOnce(&mut Writer<Vec<u8>>) -> SoapResult<()>) -> String {
        let mut writer = Writer::new(Vec::new());
        f(&mut writer).unwrap();
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[test]
    fn test_parse_matches_local_names() {
        let xml = r#"<?xml version="1.0"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <ns1:loginResponse xmlns:ns1="urn:Magento">
      <loginReturn>abc</loginReturn>
    </ns1:loginResponse>
  </soap:Body>
</soap:Envelope>"#;

        let root = parse_document(xml.as_bytes()).unwrap();
        assert_eq!(root.name, "Envelope");
        assert_eq!(root.qname, "soap:Envelope");
        assert_eq!(
            root.find(&["Body", "loginResponse", "loginReturn"]).map(XmlElement::text),
            Some("abc")
        );
        assert_eq!(root.attribute("xmlns:soap"), Some("http://schemas.xmlsoap.org/soap/envelope/"));
        assert!(root.child("Body").unwrap().text.is_empty());
    }

    #[test]
    fn test_text_is_unescaped_and_cdata_concatenated() {
        let xml = "<a><b>x &amp; y</b><c><![CDATA[p]]]]><![CDATA[>q]]></c></a>";
        let root = parse_document(xml.as_bytes()).unwrap();
        assert_eq!(root.child_text("b"), Some("x & y"));
        assert_eq!(root.child_text("c"), Some("p]]>q"));
    }

    #[test]
    fn test_truncated_document_is_rejected() {
        let err = parse_document(b"<a><b>text</b>").unwrap_err();
        assert!(err.is_decode());
        assert!(err.to_string().contains("not closed"));

        assert!(parse_document(b"<a><b>text</c></a>").unwrap_err().is_decode());
        assert!(parse_document(b"<a><b").unwrap_err().is_decode());
    }

    #[test]
    fn test_root_rules() {
        assert!(parse_document(b"").unwrap_err().to_string().contains("no root"));
        assert!(parse_document(b"<a/><b/>").unwrap_err().to_string().contains("more than one root"));
        assert!(parse_document(b"oops<a/>").is_err());
    }

    #[test]
    fn test_doctype_rejected() {
        let xml = r#"<?xml version="1.0"?>
<!DOCTYPE foo [<!ENTITY xxe SYSTEM "file:///etc/passwd">]>
<a>&xxe;</a>"#;
        let err = parse_document(xml.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("DOCTYPE"));
    }

    #[test]
    fn test_undeclared_entity_rejected() {
        let err = parse_document(b"<a>&xxe;</a>").unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn test_doctype_inside_cdata_is_text() {
        let xml = "<description><![CDATA[<!DOCTYPE html><!ENTITY x \"y\"><p>x</p>]]></description>";
        let parsed = parse_document(xml.as_bytes()).unwrap();
        assert_eq!(parsed.text(), r#"<!DOCTYPE html><!ENTITY x "y"><p>x</p>"#);

        let out = render(|w| write_cdata_element(w, "description", parsed.text()));
        assert_eq!(parse_document(out.as_bytes()).unwrap().text(), parsed.text());
    }

    #[test]
    fn test_cdata_writer_splits_terminator() {
        let out = render(|w| write_cdata_element(w, "apiKey", "a]]>b"));
        assert_eq!(out, "<apiKey><![CDATA[a]]]]><![CDATA[>b]]></apiKey>");

        let parsed = parse_document(out.as_bytes()).unwrap();
        assert_eq!(parsed.text(), "a]]>b");
    }

    #[test]
    fn test_item_lists() {
        let out = render(|w| {
            emit(w, Event::Start(BytesStart::new("p")))?;
            write_item_list(w, "ids", &[3, 5])?;
            write_item_list::<_, u32>(w, "none", &[])?;
            emit(w, Event::End(BytesEnd::new("p")))
        });
        assert_eq!(out, "<p><ids><item>3</item><item>5</item></ids><none/></p>");

        let parsed = parse_document(out.as_bytes()).unwrap();
        assert_eq!(read_item_list::<u32>(&parsed, "ids").unwrap(), vec![3, 5]);
        assert!(read_item_list::<u32>(&parsed, "none").unwrap().is_empty());
        assert!(read_item_list::<u32>(&parsed, "missing").unwrap().is_empty());
    }

    #[test]
    fn test_parse_child() {
        let root = parse_document(b"<p><id>42</id><empty/><bad>x</bad></p>").unwrap();
        assert_eq!(root.parse_child::<u32>("id").unwrap(), Some(42));
        assert_eq!(root.parse_child::<u32>("empty").unwrap(), None);
        assert_eq!(root.parse_child::<u32>("missing").unwrap(), None);
        assert!(root.parse_child::<u32>("bad").is_err());
    }

    #[test]
    fn test_element_write() {
        let element = XmlElement::new("SOAP-ENV:Header")
            .with_child(XmlElement::new("m:Trans").with_attribute("xmlns:m", "urn:t").with_text("<234>"));
        let out = render(|w| element.write(w));
        assert_eq!(
            out,
            r#"<SOAP-ENV:Header><m:Trans xmlns:m="urn:t">&lt;234&gt;</m:Trans></SOAP-ENV:Header>"#
        );
        assert_eq!(parse_document(out.as_bytes()).unwrap(), element);
    }
}
