use crate::element::{Element, ElementData};
use crate::error::{Error, Result};
use crate::parser::{DocumentParser, ReadOptions};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
    CData(String),
    PI(String),
    DocType(String),
}

impl Node {
    pub fn as_element(&self) -> Option<Element> {
        match self {
            Self::Element(elem) => Some(*elem),
            _ => None,
        }
    }

    /// Value of the node itself, as a DOM `nodeValue`.
    ///
    /// `Text`, `CData`, `Comment` and `PI` have their content as value.
    /// `Element` and `DocType` have none.
    pub fn value(&self) -> Option<&str> {
        match self {
            Node::Text(text) | Node::CData(text) | Node::Comment(text) | Node::PI(text) => {
                Some(text)
            }
            Node::Element(_) | Node::DocType(_) => None,
        }
    }

    pub(crate) fn build_text_content(&self, doc: &Document, buf: &mut String) {
        match self {
            Node::Element(elem) => elem.build_text_content(doc, buf),
            Node::Text(text) => buf.push_str(text),
            Node::CData(text) => buf.push_str(text),
            _ => {}
        }
    }

    /// Returns content if node is `Text` or `CData`.
    /// If node is `Element`, return [Element::text_content()]
    pub fn text_content(&self, doc: &Document) -> String {
        let mut buf = String::new();
        self.build_text_content(doc, &mut buf);
        buf
    }
}

/// How a document is written out.
///
/// `indent_size` of 0 writes everything on one line.
/// `write_decl` adds `<?xml version="1.0" encoding="UTF-8"?>` at the start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    pub indent_char: u8,
    pub indent_size: usize,
    pub write_decl: bool,
}

impl WriteOptions {
    /// Two space indentation, no declaration.
    pub fn pretty() -> WriteOptions {
        WriteOptions {
            indent_char: b' ',
            indent_size: 2,
            write_decl: false,
        }
    }

    /// No indentation, no declaration.
    pub fn compact() -> WriteOptions {
        WriteOptions {
            indent_char: b' ',
            indent_size: 0,
            write_decl: false,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.indent_size > 0 && self.indent_char != b' ' && self.indent_char != b'\t' {
            return Err(Error::Configuration(format!(
                "indent character must be a space or a tab, got {:?}",
                self.indent_char as char
            )));
        }
        Ok(())
    }
}

/// Two space indentation with declaration. Used when writing files.
impl Default for WriteOptions {
    fn default() -> WriteOptions {
        WriteOptions {
            write_decl: true,
            ..WriteOptions::pretty()
        }
    }
}

/// Represents a XML document.
///
/// Use [`Document::parse_str()`], [`Document::parse_reader()`], [`Document::parse_file()`]
/// or [`str::parse()`] to parse xml.
///
/// # Examples
/// ```
/// use xml_util::Document;
///
/// let mut doc = Document::parse_str(r#"<?xml version="1.0" encoding="UTF-8"?>
/// <package>
///     <metadata>
///         <author>Lewis Carol</author>
///     </metadata>
/// </package>
/// "#).unwrap();
/// doc.replace_tag_value("author", "Lewis Carroll");
/// assert_eq!(
///     doc.to_pretty_string().unwrap(),
///     "<package>\n  <metadata>\n    <author>Lewis Carroll</author>\n  </metadata>\n</package>"
/// );
/// ```
#[derive(Debug)]
pub struct Document {
    pub(crate) store: Vec<ElementData>,
    container: Element,

    pub(crate) version: String,
    pub(crate) standalone: bool,
}

impl Document {
    /// Create a blank new xml document.
    pub fn new() -> Document {
        let (container, container_data) = Element::container();
        Document {
            store: vec![container_data],
            container,
            version: String::new(), // set by the parser if there is a declaration
            standalone: false,
        }
    }

    /// Hidden element holding the top-level nodes of the document.
    pub fn container(&self) -> Element {
        self.container
    }

    /// True if no element was ever created in this document.
    pub fn is_empty(&self) -> bool {
        self.store.len() == 1
    }

    /// Get first element of document.
    pub fn root_element(&self) -> Option<Element> {
        self.container.child_elements(self).get(0).copied()
    }

    /// Get top-level nodes of document.
    pub fn root_nodes(&self) -> &Vec<Node> {
        self.container.children(self)
    }

    /// Push a node to the top level of the document.
    pub fn push_root_node(&mut self, node: Node) -> Result<()> {
        let container = self.container;
        container.push_child(self, node)
    }
}

impl Default for Document {
    fn default() -> Document {
        Document::new()
    }
}

// Read
impl Document {
    /// Parses xml string.
    ///
    /// # Errors
    ///
    /// Returns Errors from [`Document::parse_reader()`].
    pub fn parse_str(str: &str) -> Result<Document> {
        Self::parse_str_with_opts(str, ReadOptions::default())
    }

    /// The string is already UTF-8, so an `encoding` in its declaration is ignored
    /// unless `opts.encoding` says otherwise.
    pub fn parse_str_with_opts(str: &str, mut opts: ReadOptions) -> Result<Document> {
        if opts.encoding.is_none() {
            opts.encoding = Some("UTF-8".to_string());
        }
        Self::parse_reader_with_opts(str.as_bytes(), opts)
    }

    /// Parses xml file.
    ///
    /// # Errors
    ///
    /// Returns Errors from [`Document::parse_reader()`].
    /// A file that can't be opened is an [`Error::InvalidDocument`] too.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Document> {
        Self::parse_file_with_opts(path, ReadOptions::default())
    }

    pub fn parse_file_with_opts<P: AsRef<Path>>(path: P, opts: ReadOptions) -> Result<Document> {
        let path = path.as_ref();
        debug!(path = %path.display(), "parsing file");
        let file = File::open(path).map_err(|e| Error::InvalidDocument(e.into()))?;
        Self::parse_reader_with_opts(BufReader::new(file), opts)
    }

    /// Parses xml from reader. The encoding is detected from the BOM and the declaration.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidDocument`]: Input is not well-formed xml, can't be decoded,
    /// or the reader failed.
    /// - [`Error::Configuration`]: `opts.encoding` is not a known encoding label.
    pub fn parse_reader<R: Read>(reader: R) -> Result<Document> {
        Self::parse_reader_with_opts(reader, ReadOptions::default())
    }

    pub fn parse_reader_with_opts<R: Read>(reader: R, opts: ReadOptions) -> Result<Document> {
        DocumentParser::parse_reader(reader, opts)
    }

    /// Parses a file and writes it back with [`Document::to_pretty_string()`].
    pub fn pretty_print_file<P: AsRef<Path>>(path: P) -> Result<String> {
        Self::parse_file(path)?.to_pretty_string()
    }
}

// Write
impl Document {
    /// Writes document with two space indentation and without declaration.
    pub fn to_pretty_string(&self) -> Result<String> {
        self.write_str_with_opts(&WriteOptions::pretty())
    }

    /// Writes document on a single line, without declaration.
    pub fn to_compact_string(&self) -> Result<String> {
        self.write_str_with_opts(&WriteOptions::compact())
    }

    pub fn write_str_with_opts(&self, opts: &WriteOptions) -> Result<String> {
        let mut buf: Vec<u8> = Vec::with_capacity(200);
        self.write_with_opts(&mut buf, opts)?;
        Ok(String::from_utf8(buf)?)
    }

    /// Writes document to `dir/file_name` in UTF-8, with declaration and two space indentation.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`]: File could not be created or written.
    pub fn write_to_file<P: AsRef<Path>>(&self, dir: P, file_name: &str) -> Result<()> {
        let path = dir.as_ref().join(file_name);
        debug!(path = %path.display(), "writing document");
        let mut writer = BufWriter::new(File::create(&path)?);
        self.write(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Write document to writer with [`WriteOptions::default()`]. Will be written in UTF-8.
    pub fn write(&self, writer: &mut impl Write) -> Result<()> {
        self.write_with_opts(writer, &WriteOptions::default())
    }

    pub fn write_with_opts(&self, writer: &mut impl Write, opts: &WriteOptions) -> Result<()> {
        opts.validate()?;
        let container = self.container();
        if opts.indent_size > 0 {
            let mut writer = Writer::new_with_indent(writer, opts.indent_char, opts.indent_size);
            self.write_content(&mut writer, container, opts)
        } else {
            let mut writer = Writer::new(writer);
            self.write_content(&mut writer, container, opts)
        }
    }

    fn write_content(
        &self,
        writer: &mut Writer<impl Write>,
        container: Element,
        opts: &WriteOptions,
    ) -> Result<()> {
        if opts.write_decl {
            self.write_decl(writer)?;
        }
        self.write_nodes(writer, container.children(self), opts.indent_size > 0)?;
        writer.write_event(Event::Eof)?;
        Ok(())
    }

    fn write_decl(&self, writer: &mut Writer<impl Write>) -> Result<()> {
        let standalone = match self.standalone {
            true => Some("yes".as_bytes()),
            false => None,
        };
        let version = if self.version.is_empty() {
            "1.0"
        } else {
            self.version.as_str()
        };
        writer.write_event(Event::Decl(BytesDecl::new(
            version.as_bytes(),
            Some("UTF-8".as_bytes()),
            standalone,
        )))?;
        Ok(())
    }

    // Explicit stack: nesting depth is only bounded by memory.
    // When indenting, whitespace-only text is dropped and the writer adds its own.
    fn write_nodes(
        &self,
        writer: &mut Writer<impl Write>,
        nodes: &[Node],
        indent: bool,
    ) -> Result<()> {
        let written = |node: &&Node| !(indent && is_indentation(node));
        let mut stack: Vec<WriteStep> = nodes
            .iter()
            .filter(written)
            .rev()
            .map(WriteStep::Open)
            .collect();
        while let Some(step) = stack.pop() {
            let node = match step {
                WriteStep::Open(node) => node,
                WriteStep::Close(elem) => {
                    let name = elem.name(self).as_bytes();
                    writer.write_event(Event::End(BytesEnd::borrowed(name)))?;
                    continue;
                }
            };
            match node {
                Node::Element(elem) => {
                    let start = self.start_tag(*elem);
                    let children: Vec<&Node> =
                        elem.children(self).iter().filter(written).collect();
                    if children.is_empty() {
                        writer.write_event(Event::Empty(start))?;
                    } else {
                        writer.write_event(Event::Start(start))?;
                        stack.push(WriteStep::Close(*elem));
                        stack.extend(children.into_iter().rev().map(WriteStep::Open));
                    }
                }
                Node::Text(text) => {
                    writer.write_event(Event::Text(BytesText::from_plain_str(text)))?;
                }
                Node::DocType(text) => {
                    let text = format!(" {}", text);
                    writer.write_event(Event::DocType(BytesText::from_escaped_str(&text)))?;
                }
                // Comment, CData, and PI content is not escaped.
                Node::Comment(text) => {
                    writer.write_event(Event::Comment(BytesText::from_escaped_str(text)))?;
                }
                Node::CData(text) => {
                    writer.write_event(Event::CData(BytesText::from_escaped_str(text)))?;
                }
                Node::PI(text) => {
                    writer.write_event(Event::PI(BytesText::from_escaped_str(text)))?;
                }
            };
        }
        Ok(())
    }

    fn start_tag(&self, element: Element) -> BytesStart<'_> {
        let mut start = BytesStart::borrowed_name(element.name(self).as_bytes());
        for (key, val) in element.attributes(self) {
            start.push_attribute((key.as_str(), val.as_str()));
        }
        start
    }
}

enum WriteStep<'a> {
    Open(&'a Node),
    Close(Element),
}

// `Text("")` is kept: it marks `<tag></tag>` when parsed with `empty_text_node`.
fn is_indentation(node: &Node) -> bool {
    matches!(node, Node::Text(text) if !text.is_empty() && text.trim().is_empty())
}

impl FromStr for Document {
    type Err = Error;

    fn from_str(s: &str) -> Result<Document> {
        Document::parse_str(s)
    }
}
