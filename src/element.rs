use crate::document::{Document, Node};
use crate::error::{Error, Result};
use indexmap::IndexMap;

#[derive(Debug)]
pub(crate) struct ElementData {
    name: String,
    attributes: IndexMap<String, String>, // q:attr="val" => {"q:attr": "val"}
    parent: Option<Element>,
    children: Vec<Node>,
}

/// Represents an XML element.
///
/// This struct only contains a unique usize id and implements trait `Copy`.
/// So you do not need to bother with having a reference.
///
/// Because the actual data of the element is stored in [`Document`],
/// most methods takes `&Document` or `&mut Document` as its first argument.
///
/// An element belongs to the document that created it.
/// Passing it to another document's methods is not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Element {
    id: usize,
}

impl Element {
    /// Create a new empty element with name.
    ///
    /// The new element is detached: it has no parent until it is pushed under another element.
    pub fn new<S: Into<String>>(doc: &mut Document, name: S) -> Element {
        Self::with_data(doc, name.into(), IndexMap::new())
    }

    /// Start building an element. See [`ElementBuilder`].
    pub fn build<S: Into<String>>(name: S) -> ElementBuilder {
        ElementBuilder::new(name)
    }

    pub(crate) fn with_data(
        doc: &mut Document,
        name: String,
        attributes: IndexMap<String, String>,
    ) -> Element {
        let elem = Element {
            id: doc.store.len(),
        };
        doc.store.push(ElementData {
            name,
            attributes,
            parent: None,
            children: vec![],
        });
        elem
    }

    pub(crate) fn container() -> (Element, ElementData) {
        let elem_data = ElementData {
            name: String::new(),
            attributes: IndexMap::new(),
            parent: None,
            children: Vec::new(),
        };
        (Element { id: 0 }, elem_data)
    }

    /// The container holds the top-level nodes of the document.
    /// It is not written out and can't be moved.
    pub fn is_container(&self) -> bool {
        self.id == 0
    }
}

impl Element {
    fn data<'a>(&self, doc: &'a Document) -> &'a ElementData {
        &doc.store[self.id]
    }

    fn mut_data<'a>(&self, doc: &'a mut Document) -> &'a mut ElementData {
        &mut doc.store[self.id]
    }

    /// Get the qualified name of the element, including its prefix if any.
    pub fn name<'a>(&self, doc: &'a Document) -> &'a str {
        &self.data(doc).name
    }

    /// Get attributes of element, in the order they were added.
    pub fn attributes<'a>(&self, doc: &'a Document) -> &'a IndexMap<String, String> {
        &self.data(doc).attributes
    }

    pub fn mut_attributes<'a>(&self, doc: &'a mut Document) -> &'a mut IndexMap<String, String> {
        &mut self.mut_data(doc).attributes
    }

    pub fn attribute<'a>(&self, doc: &'a Document, name: &str) -> Option<&'a str> {
        self.attributes(doc).get(name).map(|v| v.as_str())
    }

    /// Creates the attribute, or overwrites its value if it exists.
    /// An overwritten attribute keeps its position.
    pub fn set_attribute<S, T>(&self, doc: &mut Document, name: S, value: T)
    where
        S: Into<String>,
        T: Into<String>,
    {
        self.mut_attributes(doc).insert(name.into(), value.into());
    }

    pub fn remove_attribute(&self, doc: &mut Document, name: &str) -> Option<String> {
        self.mut_attributes(doc).shift_remove(name)
    }

    pub fn parent(&self, doc: &Document) -> Option<Element> {
        self.data(doc).parent
    }

    /// ```ignore
    /// self.parent(doc).is_some()
    /// ```
    pub fn has_parent(&self, doc: &Document) -> bool {
        self.parent(doc).is_some()
    }

    /// Whether the element is reachable from the document container.
    ///
    /// An element can have a parent and still be unreachable, if one of its
    /// ancestors is detached.
    pub fn is_attached(&self, doc: &Document) -> bool {
        let mut elem = *self;
        loop {
            if elem.is_container() {
                return true;
            }
            match elem.parent(doc) {
                Some(parent) => elem = parent,
                None => return false,
            }
        }
    }

    pub fn children<'a>(&self, doc: &'a Document) -> &'a Vec<Node> {
        &self.data(doc).children
    }

    /// ```ignore
    /// !self.children(doc).is_empty()
    /// ```
    pub fn has_children(&self, doc: &Document) -> bool {
        !self.children(doc).is_empty()
    }

    pub fn child_elements(&self, doc: &Document) -> Vec<Element> {
        self.children(doc)
            .iter()
            .filter_map(|node| node.as_element())
            .collect()
    }

    /// All descendant elements in document order. Does not include `self`.
    pub fn descendants(&self, doc: &Document) -> Vec<Element> {
        let mut elems = Vec::new();
        // children are pushed in reverse so they pop in document order
        let mut stack: Vec<Element> = self.child_elements(doc);
        stack.reverse();
        while let Some(elem) = stack.pop() {
            elems.push(elem);
            stack.extend(
                elem.children(doc)
                    .iter()
                    .rev()
                    .filter_map(|node| node.as_element()),
            );
        }
        elems
    }

    /// Descendant elements named `tag`, in document order. `"*"` matches all elements.
    ///
    /// The returned list is a snapshot: later changes to the tree don't affect it.
    pub fn elements_by_tag_name(&self, doc: &Document, tag: &str) -> Vec<Element> {
        let mut elems = self.descendants(doc);
        if tag != "*" {
            elems.retain(|elem| elem.name(doc) == tag);
        }
        elems
    }

    /// First child element with name `name`.
    pub fn find(&self, doc: &Document, name: &str) -> Option<Element> {
        self.children(doc)
            .iter()
            .filter_map(|node| node.as_element())
            .find(|elem| elem.name(doc) == name)
    }

    /// Value of the first descendant named `tag`. See [`Element::value()`].
    ///
    /// Returns `None` if there is no such descendant.
    pub fn tag_value(&self, doc: &Document, tag: &str) -> Option<String> {
        self.elements_by_tag_name(doc, tag)
            .first()
            .map(|elem| elem.value(doc))
    }

    /// Concatenates the values of the direct children, in order.
    ///
    /// Text, CDATA, comment and processing instruction children have a value.
    /// Child elements and doctypes contribute nothing.
    /// An element without children has an empty value.
    pub fn value(&self, doc: &Document) -> String {
        self.children(doc)
            .iter()
            .filter_map(|node| node.value())
            .collect()
    }

    pub(crate) fn build_text_content(&self, doc: &Document, buf: &mut String) {
        let mut stack: Vec<&Node> = self.children(doc).iter().rev().collect();
        while let Some(node) = stack.pop() {
            match node {
                Node::Element(elem) => stack.extend(elem.children(doc).iter().rev()),
                Node::Text(text) | Node::CData(text) => buf.push_str(text),
                _ => {}
            }
        }
    }

    /// Concatenate the text of all descendant text nodes.
    ///
    /// Implementation of [Node.textContent](https://developer.mozilla.org/en-US/docs/Web/API/Node/textContent)
    pub fn text_content(&self, doc: &Document) -> String {
        let mut buf = String::new();
        self.build_text_content(doc, &mut buf);
        buf
    }

    /// Clears all children and adds a single text node.
    pub fn set_text_content<S: Into<String>>(&self, doc: &mut Document, text: S) {
        self.clear_children(doc);
        self.push_new(doc, Node::Text(text.into()));
    }

    /// Equivalent to `vec.push()`.
    ///
    /// # Errors
    ///
    /// - [`Error::HasAParent`]: If node is an element, it must not have a parent.
    /// Call `elem.detach()` before.
    /// - [`Error::ContainerCannotMove`]: The container can't be a child.
    /// - [`Error::MultipleRootElements`]: The container already holds an element.
    /// - [`Error::TextOutsideRoot`]: Text other than whitespace, or CDATA, pushed to the container.
    pub fn push_child(&self, doc: &mut Document, node: Node) -> Result<()> {
        self.adopt(doc, &node, false)?;
        self.mut_data(doc).children.push(node);
        Ok(())
    }

    /// Equivalent to `vec.insert()`.
    ///
    /// # Errors
    ///
    /// Same as [`Element::push_child()`].
    ///
    /// # Panics
    ///
    /// Panics if `index > len`.
    pub fn insert_child(&self, doc: &mut Document, index: usize, node: Node) -> Result<()> {
        self.adopt(doc, &node, false)?;
        self.mut_data(doc).children.insert(index, node);
        Ok(())
    }

    /// Replaces the child at `index` and returns the old one.
    /// A replaced element is detached.
    ///
    /// # Errors
    ///
    /// Same as [`Element::push_child()`].
    ///
    /// # Panics
    ///
    /// Panics if index is out of bounds.
    pub fn replace_child(&self, doc: &mut Document, index: usize, node: Node) -> Result<Node> {
        let replaces_root = matches!(self.children(doc)[index], Node::Element(_));
        self.adopt(doc, &node, replaces_root)?;
        let old = std::mem::replace(&mut self.mut_data(doc).children[index], node);
        if let Node::Element(elem) = old {
            elem.mut_data(doc).parent = None;
        }
        Ok(old)
    }

    // For nodes that can't be rejected: text, or an element that was never attached.
    pub(crate) fn insert_new(&self, doc: &mut Document, index: usize, node: Node) {
        if let Node::Element(elem) = &node {
            debug_assert!(!elem.is_container() && !elem.has_parent(doc));
            elem.mut_data(doc).parent = Some(*self);
        }
        self.mut_data(doc).children.insert(index, node);
    }

    pub(crate) fn push_new(&self, doc: &mut Document, node: Node) {
        let len = self.children(doc).len();
        self.insert_new(doc, len, node);
    }

    // The container keeps at most one element and no text, so the document stays writable.
    fn adopt(&self, doc: &mut Document, node: &Node, replaces_root: bool) -> Result<()> {
        match node {
            Node::Element(elem) => {
                if elem.is_container() {
                    return Err(Error::ContainerCannotMove);
                }
                if elem.has_parent(doc) {
                    return Err(Error::HasAParent);
                }
                if self.is_container() && !replaces_root && doc.root_element().is_some() {
                    return Err(Error::MultipleRootElements);
                }
                elem.mut_data(doc).parent = Some(*self);
            }
            Node::Text(text) if self.is_container() && !text.trim().is_empty() => {
                return Err(Error::TextOutsideRoot);
            }
            Node::CData(_) if self.is_container() => return Err(Error::TextOutsideRoot),
            _ => {}
        }
        Ok(())
    }

    /// Equivalent to `vec.remove()`. A removed element is detached.
    ///
    /// # Panics
    ///
    /// Panics if index is out of bounds.
    pub fn remove_child(&self, doc: &mut Document, index: usize) -> Node {
        let node = self.mut_data(doc).children.remove(index);
        if let Node::Element(elem) = node {
            elem.mut_data(doc).parent = None;
        }
        node
    }

    /// Remove child element by value.
    ///
    /// # Errors
    ///
    /// - [Error::NotFound]: Element was not found among its children.
    pub fn remove_child_elem(&self, doc: &mut Document, element: Element) -> Result<()> {
        let pos = self
            .children(doc)
            .iter()
            .position(|n| n.as_element() == Some(element))
            .ok_or(Error::NotFound)?;
        self.remove_child(doc, pos);
        Ok(())
    }

    /// Removes all children. Child elements are detached.
    pub fn clear_children(&self, doc: &mut Document) {
        let children = std::mem::take(&mut self.mut_data(doc).children);
        for elem in children.iter().filter_map(|node| node.as_element()) {
            elem.mut_data(doc).parent = None;
        }
    }

    /// Remove self from its parent. Does nothing if it has no parent.
    pub fn detach(&self, doc: &mut Document) -> Result<()> {
        if self.is_container() {
            return Err(Error::ContainerCannotMove);
        }
        match self.parent(doc) {
            Some(parent) => parent.remove_child_elem(doc, *self),
            None => Ok(()),
        }
    }
}

/// Builds an element with attributes and text in one expression.
///
/// ```
/// use xml_util::{Document, Element};
///
/// let mut doc = Document::new();
/// let container = doc.container();
/// let root = Element::build("root")
///     .attribute("id", "1")
///     .text_content("hello")
///     .push_to(&mut doc, container)
///     .unwrap();
/// assert_eq!(root.value(&doc), "hello");
/// ```
#[derive(Debug, Clone)]
pub struct ElementBuilder {
    name: String,
    attributes: IndexMap<String, String>,
    text: Option<String>,
}

impl ElementBuilder {
    fn new<S: Into<String>>(name: S) -> ElementBuilder {
        ElementBuilder {
            name: name.into(),
            attributes: IndexMap::new(),
            text: None,
        }
    }

    pub fn attribute<S, T>(mut self, name: S, value: T) -> ElementBuilder
    where
        S: Into<String>,
        T: Into<String>,
    {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn text_content<S: Into<String>>(mut self, text: S) -> ElementBuilder {
        self.text = Some(text.into());
        self
    }

    /// Create the element without a parent.
    pub fn finish(self, doc: &mut Document) -> Element {
        let elem = Element::with_data(doc, self.name, self.attributes);
        if let Some(text) = self.text {
            elem.push_new(doc, Node::Text(text));
        }
        elem
    }

    /// Create the element and push it to `parent`.
    pub fn push_to(self, doc: &mut Document, parent: Element) -> Result<Element> {
        let elem = self.finish(doc);
        parent.push_child(doc, Node::Element(elem))?;
        Ok(elem)
    }
}
