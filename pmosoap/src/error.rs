//! Error types for the SOAP client

use std::sync::Arc;

use crate::envelope::Response;
use crate::fault::Fault;

/// Result type alias for SOAP client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when using the SOAP client
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The service description could not be obtained.
    ///
    /// Retained by the client and returned by every call until the next
    /// successful load.
    #[error(transparent)]
    Description(Arc<DescriptionError>),

    /// No service description is installed
    #[error("WSDL definitions not found")]
    DescriptionMissing,

    /// The service description lists no service
    #[error("no services found in WSDL definitions")]
    NoServices,

    /// The first service has no port carrying an address
    #[error("service '{0}' exposes no port with a SOAP address")]
    NoEndpoint(String),

    /// The request envelope could not be serialized
    #[error("failed to serialize SOAP envelope: {0}")]
    Envelope(#[from] xmltree::Error),

    /// Transport or decode failure, with the outgoing payload attached
    #[error(transparent)]
    WithPayload(#[from] ErrorWithPayload),

    /// The response body carries a SOAP Fault
    #[error(transparent)]
    Fault(#[from] Fault),

    /// The response body could not be converted into the requested type
    #[error("failed to deserialize SOAP body: {0}")]
    Deserialize(#[from] quick_xml::DeError),

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] anyhow::Error),
}

impl Error {
    /// Outgoing payload attached to this error, if it carries one
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            Error::WithPayload(e) => Some(e.payload()),
            _ => None,
        }
    }

    /// Best-effort response decoded before a decode failure
    pub fn partial_response(&self) -> Option<&Response> {
        match self {
            Error::WithPayload(e) => e.partial_response(),
            _ => None,
        }
    }
}

impl From<DescriptionError> for Error {
    fn from(err: DescriptionError) -> Self {
        Error::Description(Arc::new(err))
    }
}

/// Failure to obtain or parse the service description
#[derive(Debug, thiserror::Error)]
pub enum DescriptionError {
    #[error("invalid WSDL locator '{locator}': {source}")]
    InvalidLocator {
        locator: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported WSDL locator scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("failed to fetch WSDL: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("failed to read WSDL: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed WSDL: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed WSDL: {0}")]
    Decode(#[from] DecodeError),

    #[error("expected <definitions> root element, found <{0}>")]
    NotAWsdl(String),

    /// Raised by custom loaders
    #[error("{0}")]
    Other(String),
}

/// Failure to decode a response envelope
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("unsupported XML encoding '{0}'")]
    UnsupportedEncoding(String),

    #[error("invalid {0} byte sequence in document")]
    InvalidBytes(&'static str),

    #[error("expected element type <Envelope>, found <{0}>")]
    NotAnEnvelope(String),

    #[error("document contains no SOAP Envelope")]
    MissingEnvelope,

    #[error("unexpected end of document inside SOAP Envelope")]
    UnexpectedEof,
}

/// Failure raised by a [`Transport`](crate::transport::Transport)
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("transport failure: {0}")]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl TransportError {
    /// Wrap any error raised by a custom transport
    pub fn other(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Other(err.into())
    }
}

/// Stage of the call pipeline that failed after the envelope was built
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to decode SOAP response: {0}")]
    Decode(#[from] DecodeError),
}

/// A call failure together with the exact payload that was sent
#[derive(Debug, thiserror::Error)]
#[error("{source}")]
pub struct ErrorWithPayload {
    #[source]
    source: CallError,
    payload: Vec<u8>,
    partial: Option<Box<Response>>,
}

impl ErrorWithPayload {
    pub fn new(source: impl Into<CallError>, payload: Vec<u8>) -> Self {
        Self {
            source: source.into(),
            payload,
            partial: None,
        }
    }

    /// Attach the response decoded before the failure
    pub fn with_partial_response(mut self, response: Response) -> Self {
        self.partial = Some(Box::new(response));
        self
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Pipeline stage that failed, transport or decode
    pub fn call_error(&self) -> &CallError {
        &self.source
    }

    pub fn partial_response(&self) -> Option<&Response> {
        self.partial.as_deref()
    }

    /// Take ownership of the payload, dropping the error
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

/// Returns the outgoing payload carried by `err`, or `None` when `err` is
/// not a payload-carrying error.
pub fn payload_from_error<'a>(err: &'a (dyn std::error::Error + 'static)) -> Option<&'a [u8]> {
    if let Some(e) = err.downcast_ref::<ErrorWithPayload>() {
        return Some(e.payload());
    }
    err.downcast_ref::<Error>().and_then(Error::payload)
}
