use crate::document::{Document, Node};
use crate::element::Element;
use crate::error::{Error, ParseError, Result};
use encoding_rs::{Decoder, Encoding, UTF_16BE, UTF_16LE, UTF_8};
use indexmap::IndexMap;
use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::Reader;
use std::io::{BufRead, Read};
use tracing::{debug, trace};

type ParseResult<T> = std::result::Result<T, ParseError>;

pub(crate) struct DecodeReader<R: Read> {
    decoder: Option<Decoder>,
    inner: R,
    undecoded: [u8; 4096],
    undecoded_pos: usize,
    undecoded_cap: usize,
    remaining: [u8; 32], // Is there an encoding with > 32 bytes for a char?
    decoded: [u8; 12288],
    decoded_pos: usize,
    decoded_cap: usize,
    done: bool,
}

impl<R: Read> DecodeReader<R> {
    // If Decoder is not set, don't decode.
    pub(crate) fn new(reader: R, decoder: Option<Decoder>) -> DecodeReader<R> {
        DecodeReader {
            decoder,
            inner: reader,
            undecoded: [0; 4096],
            undecoded_pos: 0,
            undecoded_cap: 0,
            remaining: [0; 32],
            decoded: [0; 12288],
            decoded_pos: 0,
            decoded_cap: 0,
            done: false,
        }
    }

    pub(crate) fn set_decoder(&mut self, dec: Option<Decoder>) {
        self.decoder = dec;
        self.done = false;
    }

    fn fill_buf_decode(&mut self) -> std::io::Result<&[u8]> {
        if self.decoded_pos >= self.decoded_cap {
            debug_assert!(self.decoded_pos == self.decoded_cap);
            if self.done {
                return Ok(&[]);
            }
            let remaining = self.undecoded_cap - self.undecoded_pos;
            if remaining <= 32 {
                // Move remaining undecoded bytes at the end to start
                self.remaining[..remaining]
                    .copy_from_slice(&self.undecoded[self.undecoded_pos..self.undecoded_cap]);
                self.undecoded[..remaining].copy_from_slice(&self.remaining[..remaining]);
                let read = self.inner.read(&mut self.undecoded[remaining..])?;
                self.done = read == 0;
                self.undecoded_pos = 0;
                self.undecoded_cap = remaining + read;
            }

            let decoder = match self.decoder.as_mut() {
                Some(decoder) => decoder,
                None => return Ok(&[]),
            };
            let (_res, read, written, _replaced) = decoder.decode_to_utf8(
                &self.undecoded[self.undecoded_pos..self.undecoded_cap],
                &mut self.decoded,
                self.done,
            );
            self.undecoded_pos += read;
            self.decoded_cap = written;
            self.decoded_pos = 0;
        }
        Ok(&self.decoded[self.decoded_pos..self.decoded_cap])
    }

    fn fill_buf_without_decode(&mut self) -> std::io::Result<&[u8]> {
        if self.undecoded_pos >= self.undecoded_cap {
            debug_assert!(self.undecoded_pos == self.undecoded_cap);
            self.undecoded_cap = self.inner.read(&mut self.undecoded)?;
            self.undecoded_pos = 0;
        }
        Ok(&self.undecoded[self.undecoded_pos..self.undecoded_cap])
    }
}

impl<R: Read> Read for DecodeReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let available = self.fill_buf()?;
        let amt = std::cmp::min(available.len(), buf.len());
        buf[..amt].copy_from_slice(&available[..amt]);
        self.consume(amt);
        Ok(amt)
    }
}

impl<R: Read> BufRead for DecodeReader<R> {
    // Decoder may change from None to Some.
    fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
        match &self.decoder {
            Some(_) => self.fill_buf_decode(),
            None => self.fill_buf_without_decode(),
        }
    }
    fn consume(&mut self, amt: usize) {
        match &self.decoder {
            Some(_) => {
                self.decoded_pos = std::cmp::min(self.decoded_pos + amt, self.decoded_cap);
            }
            None => {
                self.undecoded_pos = std::cmp::min(self.undecoded_pos + amt, self.undecoded_cap);
            }
        }
    }
}

/// Options when parsing xml.
///
/// - `empty_text_node`: `<tag></tag>` will have a `Node::Text("")` as its children,
/// while `<tag />` won't. Off by default, so both have no children.
/// - `trim_text`: Trim whitespace around text, and drop whitespace-only text.
/// Off by default, so text is kept exactly as written, indentation included.
/// - `encoding`: Decode input with this encoding label (e.g. `"windows-1252"`),
/// ignoring the BOM and the declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    pub empty_text_node: bool,
    pub trim_text: bool,
    pub encoding: Option<String>,
}

impl Default for ReadOptions {
    fn default() -> ReadOptions {
        ReadOptions {
            empty_text_node: false,
            trim_text: false,
            encoding: None,
        }
    }
}

impl ReadOptions {
    fn forced_encoding(&self) -> Result<Option<&'static Encoding>> {
        match &self.encoding {
            Some(label) => Encoding::for_label(label.as_bytes())
                .map(Some)
                .ok_or_else(|| Error::Configuration(format!("unknown encoding label: {}", label))),
            None => Ok(None),
        }
    }
}

pub(crate) struct DocumentParser {
    document: Document,
    read_opts: ReadOptions,
}

impl DocumentParser {
    pub(crate) fn parse_reader<R: Read>(reader: R, opts: ReadOptions) -> Result<Document> {
        let forced = opts.forced_encoding()?;
        let mut parser = DocumentParser {
            document: Document::new(),
            read_opts: opts,
        };
        parser.parse_start(reader, forced)?;
        let document = parser.document;
        debug!(elements = document.store.len() - 1, "parsed document");
        Ok(document)
    }

    fn xml_reader<B: BufRead>(&self, inner: B) -> Reader<B> {
        let mut reader = Reader::from_reader(inner);
        reader.trim_text(self.read_opts.trim_text);
        reader
    }

    // Returns the declared encoding.
    fn handle_decl(&mut self, ev: &BytesDecl) -> ParseResult<Option<String>> {
        self.document.version = String::from_utf8(ev.version()?.to_vec())?;
        let encoding = match ev.encoding() {
            Some(res) => Some(String::from_utf8(res?.to_vec())?),
            None => None,
        };
        self.document.standalone = match ev.standalone() {
            Some(res) => {
                let val = std::str::from_utf8(&*res?)?.to_lowercase();
                if val == "yes" {
                    true
                } else if val == "no" {
                    false
                } else {
                    return Err(ParseError::MalformedXML(
                        "Standalone Document Declaration has non boolean value".to_string(),
                    ));
                }
            }
            None => false,
        };
        Ok(encoding)
    }

    fn handle_bytes_start(
        &mut self,
        element_stack: &[Element],
        ev: &BytesStart,
    ) -> ParseResult<Element> {
        let parent = element_stack[element_stack.len() - 1];
        if parent.is_container() && self.document.root_element().is_some() {
            return Err(ParseError::MalformedXML(
                "Document has more than one root element".to_string(),
            ));
        }
        let name = String::from_utf8(ev.name().to_vec())?;
        let mut attributes = IndexMap::new();
        for attr in ev.attributes() {
            let attr = attr?;
            let key = String::from_utf8(attr.key.to_vec())?;
            let value = String::from_utf8(attr.unescaped_value()?.to_vec())?;
            attributes.insert(key, value);
        }
        let mut_doc = &mut self.document;
        let element = Element::with_data(mut_doc, name, attributes);
        parent.push_new(mut_doc, Node::Element(element));
        Ok(element)
    }

    // Non-whitespace text and CDATA must be inside the root element.
    fn handle_text(&mut self, element_stack: &[Element], node: Node) -> ParseResult<()> {
        let parent = element_stack[element_stack.len() - 1];
        if parent.is_container() {
            return match node.value() {
                Some(text) if text.trim().is_empty() => Ok(()),
                _ => Err(ParseError::MalformedXML(
                    "Text outside of the root element".to_string(),
                )),
            };
        }
        parent.push_new(&mut self.document, node);
        Ok(())
    }

    fn parse_start<B: Read>(
        &mut self,
        reader: B,
        forced: Option<&'static Encoding>,
    ) -> ParseResult<()> {
        let mut bufreader = DecodeReader::new(reader, None);

        let init_encoding = match forced {
            Some(encoding) => {
                bufreader.set_decoder(Some(encoding.new_decoder_with_bom_removal()));
                Some(encoding)
            }
            None => {
                // Look at the BOM and the first bytes to guess the encoding of the declaration
                let bytes = bufreader.fill_buf()?;
                let init_encoding = match bytes {
                    [0xfe, 0xff, ..] => {
                        // UTF-16 BE BOM
                        bufreader.consume(2);
                        Some(UTF_16BE)
                    }
                    [0xff, 0xfe, ..] => {
                        // UTF-16 LE BOM
                        bufreader.consume(2);
                        Some(UTF_16LE)
                    }
                    [0xef, 0xbb, 0xbf, ..] => {
                        // UTF-8 BOM
                        bufreader.consume(3);
                        None
                    }
                    [0x00, 0x3c, 0x00, 0x3f, ..] => Some(UTF_16BE),
                    [0x3c, 0x00, 0x3f, 0x00, ..] => Some(UTF_16LE),
                    _ => None,
                };
                bufreader.set_decoder(init_encoding.map(|e| e.new_decoder_without_bom_handling()));
                init_encoding
            }
        };

        let mut xmlreader = self.xml_reader(bufreader);
        let mut element_stack: Vec<Element> = vec![self.document.container()];
        let mut buf = Vec::with_capacity(150);
        let event = xmlreader.read_event(&mut buf)?;
        trace!(event = ?event, "first xml event");
        if let Event::Decl(ev) = event {
            let declared = self.handle_decl(&ev)?;
            if let (Some(encoding_str), None) = (declared, forced) {
                let encoding =
                    Encoding::for_label(encoding_str.as_bytes()).ok_or(ParseError::CannotDecode)?;
                let encoding = if encoding == UTF_8 {
                    None
                } else {
                    Some(encoding)
                };
                // Encoding::for_label("UTF-16") defaults to UTF-16 LE, even though it could be UTF-16 BE
                if encoding != init_encoding
                    && !(encoding == Some(UTF_16LE) && init_encoding == Some(UTF_16BE))
                {
                    debug!(encoding = %encoding_str, "switching decoder to declared encoding");
                    let mut decode_reader = xmlreader.into_underlying_reader();
                    decode_reader
                        .set_decoder(encoding.map(|e| e.new_decoder_without_bom_handling()));
                    xmlreader = self.xml_reader(decode_reader);
                }
            }
        } else if self.handle_event(&mut element_stack, event)? {
            return Ok(());
        }
        buf.clear();
        self.parse_content(xmlreader, element_stack)
    }

    // Returns if document parsing is finished.
    fn handle_event(&mut self, element_stack: &mut Vec<Element>, event: Event) -> ParseResult<bool> {
        match event {
            Event::Start(ref ev) => {
                let element = self.handle_bytes_start(element_stack, ev)?;
                element_stack.push(element);
            }
            Event::End(_) => {
                // quick-xml checks if tag names match for us
                if element_stack.len() <= 1 {
                    return Err(ParseError::MalformedXML(
                        "Closing tag without opening tag".to_string(),
                    ));
                }
                let elem = element_stack[element_stack.len() - 1];
                element_stack.truncate(element_stack.len() - 1);
                let mut_doc = &mut self.document;
                if self.read_opts.empty_text_node && !elem.has_children(mut_doc) {
                    // distinguish <tag></tag> and <tag />
                    elem.push_new(mut_doc, Node::Text(String::new()));
                }
            }
            Event::Empty(ref ev) => {
                self.handle_bytes_start(element_stack, ev)?;
            }
            Event::Text(ev) => {
                let content = String::from_utf8(ev.unescaped()?.to_vec())?;
                self.handle_text(element_stack, Node::Text(content))?;
            }
            Event::CData(ev) => {
                let content = String::from_utf8(ev.to_vec())?;
                self.handle_text(element_stack, Node::CData(content))?;
            }
            // DocType, Comment and PI content is not escaped.
            Event::DocType(ev) => {
                let content = std::str::from_utf8(&ev)?.trim_start().to_string();
                let parent = element_stack[element_stack.len() - 1];
                parent.push_new(&mut self.document, Node::DocType(content));
            }
            Event::Comment(ev) => {
                let content = String::from_utf8(ev.to_vec())?;
                let parent = element_stack[element_stack.len() - 1];
                parent.push_new(&mut self.document, Node::Comment(content));
            }
            Event::PI(ev) => {
                let content = String::from_utf8(ev.to_vec())?;
                let parent = element_stack[element_stack.len() - 1];
                parent.push_new(&mut self.document, Node::PI(content));
            }
            Event::Decl(_) => {
                return Err(ParseError::MalformedXML(
                    "XML declaration is only allowed at the start of the document".to_string(),
                ));
            }
            Event::Eof => {
                if element_stack.len() > 1 {
                    let open = element_stack[element_stack.len() - 1];
                    return Err(ParseError::MalformedXML(format!(
                        "Unclosed element: {}",
                        open.name(&self.document)
                    )));
                }
                if self.document.root_element().is_none() {
                    return Err(ParseError::MalformedXML(
                        "Document has no root element".to_string(),
                    ));
                }
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn parse_content<B: BufRead>(
        &mut self,
        mut reader: Reader<B>,
        mut element_stack: Vec<Element>,
    ) -> ParseResult<()> {
        let mut buf = Vec::with_capacity(200); // reduce time increasing capacity at start.
        loop {
            let ev = reader.read_event(&mut buf)?;
            trace!(event = ?ev, "xml event");
            if self.handle_event(&mut element_stack, ev)? {
                return Ok(());
            }
            buf.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escaped_text_is_unescaped() {
        let doc = Document::parse_str("<a k=\"&lt;&amp;\">1 &lt; 2 &amp;&amp; 3</a>").unwrap();
        let a = doc.root_element().unwrap();
        assert_eq!(a.value(&doc), "1 < 2 && 3");
        assert_eq!(a.attribute(&doc, "k"), Some("<&"));
    }

    #[test]
    fn test_declaration_is_optional() {
        let doc = Document::parse_str("<a/>").unwrap();
        assert_eq!(doc.root_element().unwrap().name(&doc), "a");
        let doc = Document::parse_str("<?xml version=\"1.1\"?><a/>").unwrap();
        assert_eq!(doc.version, "1.1");
    }

    #[test]
    fn test_empty_text_node() {
        let doc = Document::parse_str("<r><a></a><b/></r>").unwrap();
        let r = doc.root_element().unwrap();
        assert!(r.child_elements(&doc).iter().all(|e| !e.has_children(&doc)));

        let opts = ReadOptions {
            empty_text_node: true,
            ..ReadOptions::default()
        };
        let doc = Document::parse_str_with_opts("<r><a></a><b/></r>", opts).unwrap();
        let r = doc.root_element().unwrap();
        let children = r.child_elements(&doc);
        assert_eq!(children[0].children(&doc), &vec![Node::Text(String::new())]);
        assert!(!children[1].has_children(&doc));
    }

    #[test]
    fn test_top_level_nodes() {
        let xml = "<?xml version=\"1.0\"?>\n<!DOCTYPE note>\n<!--before--><note/><?pi data?>";
        let doc = Document::parse_str(xml).unwrap();
        assert_eq!(
            doc.root_nodes(),
            &vec![
                Node::DocType("note".to_string()),
                Node::Comment("before".to_string()),
                Node::Element(doc.root_element().unwrap()),
                Node::PI("pi data".to_string()),
            ]
        );
    }

    #[test]
    fn test_not_well_formed() {
        for xml in &[
            "",
            "   ",
            "<a/><b/>",
            "text<a/>",
            "<a/>text",
            "<a>",
            "</a>",
            "<a></b>",
            "<a x=\"1\" x=\"2\"/>",
            "<a/><?xml version=\"1.0\"?>",
        ] {
            let res = Document::parse_str(xml);
            assert!(
                matches!(res, Err(Error::InvalidDocument(_))),
                "{:?} -> {:?}",
                xml,
                res
            );
        }
    }

    #[test]
    fn test_utf16() {
        let xml = "<?xml version=\"1.0\" encoding=\"UTF-16\"?><a>héllo</a>";
        let mut bytes = vec![0xff, 0xfe];
        for unit in xml.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let doc = Document::parse_reader(&bytes[..]).unwrap();
        assert_eq!(doc.root_element().unwrap().value(&doc), "héllo");
    }

    #[test]
    fn test_declared_encoding() {
        let mut bytes = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><a>".to_vec();
        bytes.push(0xe9); // é
        bytes.extend_from_slice(b"</a>");
        let doc = Document::parse_reader(&bytes[..]).unwrap();
        assert_eq!(doc.root_element().unwrap().value(&doc), "é");
    }

    #[test]
    fn test_forced_encoding() {
        let bytes = [b'<', b'a', b'>', 0xe9, b'<', b'/', b'a', b'>'];
        let opts = ReadOptions {
            encoding: Some("windows-1252".to_string()),
            ..ReadOptions::default()
        };
        let doc = Document::parse_reader_with_opts(&bytes[..], opts).unwrap();
        assert_eq!(doc.root_element().unwrap().value(&doc), "é");

        let opts = ReadOptions {
            encoding: Some("no-such-encoding".to_string()),
            ..ReadOptions::default()
        };
        let res = Document::parse_reader_with_opts(&bytes[..], opts);
        assert!(matches!(res, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_whitespace_is_kept() {
        let doc = Document::parse_str("\n<a> x <b/> </a>\n").unwrap();
        let a = doc.root_element().unwrap();
        assert_eq!(a.value(&doc), " x  ");
        assert_eq!(doc.root_nodes().len(), 1);

        let doc = Document::parse_str("<r><name>  John Smith  </name></r>").unwrap();
        assert_eq!(
            doc.tag_value(doc.root_element(), "name"),
            Some("  John Smith  ".to_string())
        );
    }

    #[test]
    fn test_trim_text() {
        let opts = ReadOptions {
            trim_text: true,
            ..ReadOptions::default()
        };
        let xml = "<r>\n  <name>  John Smith  </name>\n  <e> </e>\n</r>";
        let doc = Document::parse_str_with_opts(xml, opts).unwrap();
        let r = doc.root_element().unwrap();
        assert_eq!(r.children(&doc).len(), 2);
        assert_eq!(r.tag_value(&doc, "name"), Some("John Smith".to_string()));
        assert_eq!(r.tag_value(&doc, "e"), Some(String::new()));
    }
}
