use indexmap::IndexMap;
use itertools::Itertools;
use std::fmt;
use std::fmt::Write;
use std::path::Path;
use xml_util::{Document, Element, Node, ReadOptions};

#[derive(Clone)]
struct TStr(pub String);

impl PartialEq<Self> for TStr {
    fn eq(&self, other: &Self) -> bool {
        self.0.trim() == other.0.trim()
    }
}

impl fmt::Debug for TStr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\n{}\n", self.0.trim())
    }
}

fn to_yaml(doc: &Document) -> String {
    let mut buf = String::new();
    let mut depth: usize = 0;
    write_line("Root:", depth, &mut buf);
    depth += 1;
    render_nodes(doc, doc.root_nodes(), depth, &mut buf);
    buf
}

fn escape_newlines(text: &str) -> String {
    text.replace("\n", r"\n").replace("\r", r"\r")
}

fn render_nodes(doc: &Document, nodes: &[Node], depth: usize, buf: &mut String) {
    for node in nodes {
        match node {
            Node::Element(elem) => render_element(doc, *elem, depth, buf),
            Node::Text(text) => write_line(
                &format!("- Text: \"{}\"", escape_newlines(text)),
                depth,
                buf,
            ),
            Node::Comment(text) => write_line(
                &format!("- Comment: \"{}\"", escape_newlines(text)),
                depth,
                buf,
            ),
            Node::CData(text) => write_line(
                &format!("- CData: \"{}\"", escape_newlines(text)),
                depth,
                buf,
            ),
            Node::DocType(text) => write_line(
                &format!("- DocType: \"{}\"", escape_newlines(text)),
                depth,
                buf,
            ),
            Node::PI(text) => write_line(
                &format!("- PI: \"{}\"", escape_newlines(text)),
                depth,
                buf,
            ),
        }
    }
}

fn render_element(doc: &Document, elem: Element, mut depth: usize, buf: &mut String) {
    write_line("- Element:", depth, buf);
    depth += 2;

    write_line(&format!("name: {}", elem.name(doc)), depth, buf);

    let attrs = elem.attributes(doc);
    if !attrs.is_empty() {
        write_line("attributes:", depth, buf);
        write_attributes(attrs, depth, buf);
    }

    let children = elem.children(doc);
    if !children.is_empty() {
        write_line("children:", depth, buf);
        render_nodes(doc, children, depth + 1, buf);
    }
}

// Attributes are written in document order.
fn write_attributes(map: &IndexMap<String, String>, depth: usize, buf: &mut String) {
    for (key, val) in map {
        write_line(&format!("{}: \"{}\"", key, val), depth + 1, buf);
    }
}

fn write_line(text: &str, depth: usize, buf: &mut String) {
    let indent = " ".repeat(depth * 2);
    writeln!(buf, "{}{}", indent, text).unwrap();
}

// main test functions
//////////////////////

fn get_expected(file_name: &str) -> TStr {
    let yaml_file = Path::new("tests/documents").join(file_name);

    TStr(
        std::fs::read_to_string(&yaml_file)
            .unwrap()
            .lines()
            .map(|line| line.trim_end())
            .collect::<Vec<&str>>()
            .join("\n"),
    )
}

// Documents and xml files are supposed to have a 1:1 relationship.
// Then write is ok if read function is ok, and read(write(D)) == D
fn test_write(doc: &Document, opts: &ReadOptions) -> TStr {
    let expected = TStr(to_yaml(doc));
    let pretty = doc.to_pretty_string().unwrap();
    let compact = doc.to_compact_string().unwrap();
    // another parser must accept what we write
    roxmltree::Document::parse(&pretty).unwrap();
    roxmltree::Document::parse(&compact).unwrap();

    // indented output replaces whitespace text with its own
    let mut round_trips = vec![compact];
    if opts.trim_text {
        round_trips.push(pretty);
    }
    for written_xml in &round_trips {
        let new_doc = Document::parse_str_with_opts(written_xml, opts.clone()).unwrap();
        let result = TStr(to_yaml(&new_doc));
        assert!(
            expected == result,
            "\n===expected==={:?}\n===result==={:?}\nWRITING\n{}",
            expected,
            result,
            written_xml,
        );
    }
    expected
}

fn test<F, S>(xml_file: &str, expected: F)
where
    F: Fn(&ReadOptions) -> S,
    S: Into<String>,
{
    let xml_file = Path::new("tests/documents").join(xml_file);

    // Options
    let empty_text_node_opts = [true, false];
    let trim_text_opts = [true, false];
    let opts = [empty_text_node_opts, trim_text_opts];

    for k in opts.iter().multi_cartesian_product() {
        let read_options = ReadOptions {
            empty_text_node: *k[0],
            trim_text: *k[1],
            ..ReadOptions::default()
        };
        let expected_name: String = expected(&read_options).into();
        let expected = get_expected(&expected_name);
        let result = match Document::parse_file_with_opts(&xml_file, read_options.clone()) {
            Ok(doc) => test_write(&doc, &read_options),
            Err(error) => {
                println!("{:?}", error);
                let debug_str = format!("{:?}", error);
                let variant_name = debug_str.splitn(2, '(').next().unwrap();
                TStr(format!("error: {}", variant_name))
            }
        };

        assert!(
            expected == result,
            "\noptions: {:?}\n===expected==={:?}===result==={:?}\nREADING\n",
            read_options,
            expected,
            result,
        );
    }
}

#[test]
fn basic() {
    test("basic.xml", |opts| {
        if opts.trim_text {
            "basic.yaml"
        } else {
            "basic_whitespace.yaml"
        }
    })
}

#[test]
fn emptytag() {
    test("emptytag.xml", |opts| match (opts.empty_text_node, opts.trim_text) {
        (false, true) => "emptytag.yaml",
        (true, true) => "emptytag_emptytext.yaml",
        (false, false) => "emptytag_whitespace.yaml",
        (true, false) => "emptytag_emptytext_whitespace.yaml",
    })
}

#[test]
fn encoding1() {
    test("encoding1.xml", |_| "encoding1.yaml")
}

#[test]
fn error1() {
    test("error1.xml", |_| "error1.yaml")
}

#[test]
fn error2() {
    test("error2.xml", |_| "error2.yaml")
}

#[test]
fn nodes() {
    test("nodes.xml", |opts| {
        if opts.trim_text {
            "nodes.yaml"
        } else {
            "nodes_whitespace.yaml"
        }
    })
}

#[test]
fn namespace() {
    test("namespace.xml", |_| "namespace.yaml")
}

#[test]
fn standalone() {
    test("standalone.xml", |_| "standalone_err.yaml")
}
