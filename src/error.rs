use quick_xml::Error as XMLError;
use std::{str::Utf8Error, string::FromUtf8Error};
use thiserror::Error;

/// Wrapper around `std::Result`
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, Error)]
pub enum Error {
    /// Input could not be parsed into a document.
    /// Also returned when the file or stream could not be read.
    #[error("Invalid document: {0}")]
    InvalidDocument(#[from] ParseError),
    /// [`std::io`] error while writing.
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    /// [`ReadOptions`](crate::ReadOptions) or [`WriteOptions`](crate::WriteOptions)
    /// holds a value that can't be used.
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    /// The container element cannot have a parent.
    /// Use `element.is_container()` to check if it is a container before
    /// assigning it to another parent.
    #[error("Container element cannot move")]
    ContainerCannotMove,
    /// You need to call `element.detach()` before assigning another parent.
    #[error("Element already has a parent. Call detach() before changing parent.")]
    HasAParent,
    /// Element was not found among the children of its supposed parent.
    #[error("Element not found")]
    NotFound,
    /// Operation needs the element to have a parent.
    #[error("Element has no parent")]
    Detached,
    /// The document already has a root element.
    #[error("Document already has a root element")]
    MultipleRootElements,
    /// Only whitespace text can sit next to the root element.
    #[error("Text is not allowed outside the root element")]
    TextOutsideRoot,
    /// Operation needs a root element, but the document has none.
    #[error("Document has no root element")]
    NoRootElement,
}

/// Cause of [`Error::InvalidDocument`].
#[derive(Debug, Error)]
pub enum ParseError {
    /// Source could not be read.
    #[error("Cannot read source: {0}")]
    Io(#[source] std::io::Error),
    /// Decoding related error.
    /// Maybe the XML declaration has an encoding value that it doesn't recognize,
    /// or it doesn't match its actual encoding,
    #[error("Cannot decode XML")]
    CannotDecode,
    /// Assorted errors while parsing XML.
    #[error("Malformed XML: {0}")]
    MalformedXML(String),
}

impl From<XMLError> for ParseError {
    fn from(err: XMLError) -> ParseError {
        match err {
            XMLError::EndEventMismatch { expected, found } if expected.is_empty() => {
                ParseError::MalformedXML(format!("Closing tag without opening tag: {}", found))
            }
            XMLError::EndEventMismatch { expected, found } => ParseError::MalformedXML(format!(
                "Closing tag mismatch. Expected {}, found {}",
                expected, found,
            )),
            XMLError::Io(err) => ParseError::Io(err),
            XMLError::Utf8(_) => ParseError::CannotDecode,
            err => ParseError::MalformedXML(err.to_string()),
        }
    }
}

impl From<FromUtf8Error> for ParseError {
    fn from(_: FromUtf8Error) -> ParseError {
        ParseError::CannotDecode
    }
}

impl From<Utf8Error> for ParseError {
    fn from(_: Utf8Error) -> ParseError {
        ParseError::CannotDecode
    }
}

impl From<std::io::Error> for ParseError {
    fn from(err: std::io::Error) -> ParseError {
        ParseError::Io(err)
    }
}

// Writing only fails on the sink, so anything else the writer reports is still an io error.
impl From<XMLError> for Error {
    fn from(err: XMLError) -> Error {
        match err {
            XMLError::Io(err) => Error::Io(err),
            err => Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                err.to_string(),
            )),
        }
    }
}

impl From<FromUtf8Error> for Error {
    fn from(err: FromUtf8Error) -> Error {
        Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    }
}
