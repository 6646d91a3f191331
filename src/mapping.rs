use crate::document::{Document, Node};
use crate::element::Element;
use crate::error::Result;
use std::fmt::Display;

/// Write key/value pairs as a flat xml document.
///
/// The root element is `root`. Each entry becomes a `child` element with the key in
/// attribute `key_attr` and the value in attribute `value_attr`, in iteration order.
/// Output is compact and has no declaration.
///
/// ```
/// use indexmap::IndexMap;
///
/// let mut map = IndexMap::new();
/// map.insert("k1", "v1");
/// map.insert("k2", "v2");
/// let xml = xml_util::map_to_xml_string(&map, "root", "entry", "key", "value").unwrap();
/// assert_eq!(
///     xml,
///     r#"<root><entry key="k1" value="v1"/><entry key="k2" value="v2"/></root>"#
/// );
/// ```
pub fn map_to_xml_string<I, K, V>(
    entries: I,
    root: &str,
    child: &str,
    key_attr: &str,
    value_attr: &str,
) -> Result<String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Display,
    V: Display,
{
    let mut doc = Document::new();
    let root = Element::new(&mut doc, root);
    doc.push_root_node(Node::Element(root))?;
    for (key, value) in entries {
        Element::build(child)
            .attribute(key_attr, key.to_string())
            .attribute(value_attr, value.to_string())
            .push_to(&mut doc, root)?;
    }
    doc.to_compact_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_entry_order() {
        let entries = vec![("b", 2), ("a", 1)];
        let xml = map_to_xml_string(entries, "codes", "code", "id", "count").unwrap();
        assert_eq!(
            xml,
            r#"<codes><code id="b" count="2"/><code id="a" count="1"/></codes>"#
        );

        let mut map = BTreeMap::new();
        map.insert("z", "last");
        map.insert("a", "first");
        let xml = map_to_xml_string(&map, "r", "e", "k", "v").unwrap();
        assert_eq!(xml, r#"<r><e k="a" v="first"/><e k="z" v="last"/></r>"#);
    }

    #[test]
    fn test_empty_map() {
        let xml = map_to_xml_string(Vec::<(u8, u8)>::new(), "r", "e", "k", "v").unwrap();
        assert_eq!(xml, "<r/>");
    }

    #[test]
    fn test_values_are_escaped() {
        let xml = map_to_xml_string(vec![("a<b", "\"q\" & c")], "r", "e", "k", "v").unwrap();
        let doc = Document::parse_str(&xml).unwrap();
        let e = doc.elements_by_tag_name("e")[0];
        assert_eq!(e.attribute(&doc, "k"), Some("a<b"));
        assert_eq!(e.attribute(&doc, "v"), Some("\"q\" & c"));
    }

    #[test]
    fn test_same_key_attr_and_value_attr() {
        // value overwrites the key, as a repeated attribute set does
        let xml = map_to_xml_string(vec![("k", "v")], "r", "e", "a", "a").unwrap();
        assert_eq!(xml, r#"<r><e a="v"/></r>"#);
    }
}
