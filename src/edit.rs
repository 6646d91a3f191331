//! Tag-level queries and edits on a whole [`Document`].
//!
//! Lookups search every descendant of the scope, so nested elements with the same name
//! all match. Results are snapshots taken before any mutation happens.

use crate::document::{Document, Node};
use crate::element::Element;
use crate::error::{Error, Result};
use tracing::warn;

impl Document {
    /// All elements named `tag`, in document order. `"*"` matches all elements.
    pub fn elements_by_tag_name(&self, tag: &str) -> Vec<Element> {
        self.container().elements_by_tag_name(self, tag)
    }

    /// Whether an element named `tag` exists anywhere in the document.
    pub fn tag_exists(&self, tag: &str) -> bool {
        self.container()
            .descendants(self)
            .iter()
            .any(|elem| tag == "*" || elem.name(self) == tag)
    }

    /// Value of the first descendant of `scope` named `tag`. See [`Element::value()`].
    ///
    /// Returns `None` if `scope` is `None` or no descendant matches.
    pub fn tag_value(&self, scope: Option<Element>, tag: &str) -> Option<String> {
        scope?.tag_value(self, tag)
    }

    /// For every element named `tag`, replace its first child with a text node of `value`.
    /// Elements without children get the text node appended.
    ///
    /// Only the first child is replaced, whatever it is. Other children are kept, so an
    /// element with several children ends up with `value` followed by the rest.
    pub fn replace_tag_value(&mut self, tag: &str, value: &str) {
        for elem in self.elements_by_tag_name(tag) {
            if elem.has_children(self) {
                elem.remove_child(self, 0);
            }
            elem.insert_new(self, 0, Node::Text(value.to_string()));
        }
    }

    /// Append a new element `tag` with text `value` under the first element named `parent_tag`.
    ///
    /// If there is no such element, a new element named `parent_tag` is created but **not**
    /// attached anywhere in the document. The returned element then hangs under that
    /// detached parent and is not reachable from the root. Check with [`Element::is_attached()`].
    pub fn insert_new_tag_below(&mut self, parent_tag: &str, tag: &str, value: &str) -> Element {
        let parent = match self.elements_by_tag_name(parent_tag).first() {
            Some(parent) => *parent,
            None => {
                warn!(
                    parent = parent_tag,
                    tag, "parent tag not found, inserting under a detached element"
                );
                Element::new(self, parent_tag)
            }
        };
        let elem = Element::build(tag).text_content(value).finish(self);
        parent.push_new(self, Node::Element(elem));
        elem
    }

    /// Append a new element `tag` as last child of the root element.
    /// It has a single text child, or none if `value` is `None`.
    ///
    /// # Errors
    ///
    /// - [`Error::NoRootElement`]: The document has no root element.
    pub fn insert_tag_value(&mut self, tag: &str, value: Option<&str>) -> Result<Element> {
        let root = self.root_element().ok_or(Error::NoRootElement)?;
        let mut builder = Element::build(tag);
        if let Some(value) = value {
            builder = builder.text_content(value);
        }
        builder.push_to(self, root)
    }

    /// Append a new element `tag` with text `value` as last child of `parent`.
    pub fn insert_tag_in_element(
        &mut self,
        parent: Element,
        tag: &str,
        value: &str,
    ) -> Result<Element> {
        Element::build(tag).text_content(value).push_to(self, parent)
    }

    /// [`Document::replace_tag_value()`] if `tag` exists, otherwise
    /// [`Document::insert_tag_value()`].
    pub fn insert_or_update_tag_value(&mut self, tag: &str, value: &str) -> Result<()> {
        if self.tag_exists(tag) {
            self.replace_tag_value(tag, value);
        } else {
            self.insert_tag_value(tag, Some(value))?;
        }
        Ok(())
    }

    /// Remove every element named `tag` from its parent. Returns how many were removed.
    ///
    /// Removing the root element leaves the document without one.
    ///
    /// # Errors
    ///
    /// - [`Error::Detached`]: A matched element has no parent. Elements removed before
    /// the failure stay removed.
    pub fn delete_tag(&mut self, tag: &str) -> Result<usize> {
        let elems = self.elements_by_tag_name(tag);
        for elem in &elems {
            let parent = elem.parent(self).ok_or(Error::Detached)?;
            parent.remove_child_elem(self, *elem)?;
        }
        Ok(elems.len())
    }

    /// Set attribute `name` of `element` to `value`, creating it if needed.
    pub fn add_attribute(&mut self, element: Element, name: &str, value: &str) {
        element.set_attribute(self, name, value);
    }
}
