// xml.rs — Small helpers over roxmltree for the template schema.
//
// Template files are read whole, decoded (UTF-8 with or without BOM, or
// UTF-16 with BOM), and walked by local element name; XML namespaces on
// element names are ignored.

use roxmltree::{Document, Node, ParsingOptions};

use crate::error::TemplateError;

/// Decode raw file bytes into text.
pub fn decode(bytes: &[u8]) -> Result<String, TemplateError> {
    let utf16 = |data: &[u8], le: bool| {
        let units: Vec<u16> = data
            .chunks_exact(2)
            .map(|c| {
                if le {
                    u16::from_le_bytes([c[0], c[1]])
                } else {
                    u16::from_be_bytes([c[0], c[1]])
                }
            })
            .collect();
        String::from_utf16(&units).map_err(|e| TemplateError::Markup(e.to_string()))
    };
    match bytes {
        [0xEF, 0xBB, 0xBF, rest @ ..] => {
            String::from_utf8(rest.to_vec()).map_err(|e| TemplateError::Markup(e.to_string()))
        }
        [0xFF, 0xFE, rest @ ..] => utf16(rest, true),
        [0xFE, 0xFF, rest @ ..] => utf16(rest, false),
        _ => String::from_utf8(bytes.to_vec()).map_err(|e| TemplateError::Markup(e.to_string())),
    }
}

/// Parse decoded text into a document.
pub fn parse(text: &str) -> Result<Document<'_>, TemplateError> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    Document::parse_with_options(text, options).map_err(|e| TemplateError::Markup(e.to_string()))
}

/// Element children of `node`, in document order.
pub fn elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|n| n.is_element())
}

/// Element children with the given local name.
pub fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    elements(node).filter(move |n| n.tag_name().name() == name)
}

/// First element child with the given local name.
pub fn child<'a, 'input: 'a>(node: Node<'a, 'input>, name: &'a str) -> Option<Node<'a, 'input>> {
    children(node, name).next()
}

/// Optional attribute, returned owned.
pub fn attr(node: Node<'_, '_>, name: &str) -> Option<String> {
    node.attribute(name).map(str::to_string)
}

/// Mandatory attribute; missing is a schema violation.
pub fn required_attr(node: Node<'_, '_>, name: &str) -> Result<String, TemplateError> {
    node.attribute(name).map(str::to_string).ok_or_else(|| {
        TemplateError::Schema(format!(
            "<{}> is missing the '{}' attribute",
            node.tag_name().name(),
            name
        ))
    })
}

/// Boolean attribute ("true"/"1" or "false"/"0"), with a default.
pub fn bool_attr(node: Node<'_, '_>, name: &str, default: bool) -> Result<bool, TemplateError> {
    match node.attribute(name).map(str::trim) {
        None => Ok(default),
        Some("true") | Some("1") => Ok(true),
        Some("false") | Some("0") => Ok(false),
        Some(other) => Err(TemplateError::Schema(format!(
            "<{}> attribute '{}' is not a boolean: '{}'",
            node.tag_name().name(),
            name,
            other
        ))),
    }
}

/// Unsigned 32-bit attribute, with a default.
pub fn u32_attr(node: Node<'_, '_>, name: &str, default: u32) -> Result<u32, TemplateError> {
    match node.attribute(name) {
        None => Ok(default),
        Some(raw) => parse_u32(node, name, raw),
    }
}

/// Optional unsigned 32-bit attribute.
pub fn opt_u32_attr(node: Node<'_, '_>, name: &str) -> Result<Option<u32>, TemplateError> {
    node.attribute(name)
        .map(|raw| parse_u32(node, name, raw))
        .transpose()
}

fn parse_u32(node: Node<'_, '_>, name: &str, raw: &str) -> Result<u32, TemplateError> {
    raw.trim().parse::<u32>().map_err(|_| {
        TemplateError::Schema(format!(
            "<{}> attribute '{}' is not an unsigned 32-bit number: '{}'",
            node.tag_name().name(),
            name,
            raw
        ))
    })
}

/// Concatenated text content of an element.
pub fn text(node: Node<'_, '_>) -> String {
    node.children()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_utf16_with_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for u in "<a/>".encode_utf16() {
            bytes.extend_from_slice(&u.to_le_bytes());
        }
        assert_eq!(decode(&bytes).unwrap(), "<a/>");
    }

    #[test]
    fn strips_utf8_bom() {
        assert_eq!(decode(b"\xEF\xBB\xBF<a/>").unwrap(), "<a/>");
    }

    #[test]
    fn attribute_helpers() {
        let doc = parse(r#"<e flag="true" n="12" bad="x"/>"#).unwrap();
        let e = doc.root_element();
        assert!(bool_attr(e, "flag", false).unwrap());
        assert!(!bool_attr(e, "missing", false).unwrap());
        assert_eq!(u32_attr(e, "n", 0).unwrap(), 12);
        assert_eq!(u32_attr(e, "missing", 7).unwrap(), 7);
        assert!(matches!(u32_attr(e, "bad", 0), Err(TemplateError::Schema(_))));
        assert!(required_attr(e, "nope").is_err());
    }

    #[test]
    fn children_match_local_names_across_namespaces() {
        let doc = parse(r#"<r xmlns="urn:x"><a/><b/><a/></r>"#).unwrap();
        assert_eq!(children(doc.root_element(), "a").count(), 2);
    }
}
