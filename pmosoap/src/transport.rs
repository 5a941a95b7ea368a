//! HTTP transport seam
//!
//! The call pipeline hands a fully prepared [`HttpRequest`] to a
//! [`Transport`]. The default implementation is [`reqwest::Client`]; tests and
//! embedders can supply their own.

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE};

use crate::error::TransportError;

pub const CONTENT_TYPE_XML: &str = "text/xml;charset=UTF-8";
pub const ACCEPT_XML: &str = "text/xml";
pub const SOAP_ACTION_HEADER: &str = "SOAPAction";

/// Username/password pair for HTTP basic authentication
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Both halves are set; partial credentials are never sent
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// POST request prepared by the call pipeline
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub soap_action: String,
    /// Only present when complete
    pub basic_auth: Option<Credentials>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and read the full response body.
    ///
    /// Non-2xx statuses are not errors: SOAP faults travel as HTTP 500.
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[async_trait]
impl Transport for reqwest::Client {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = reqwest::Client::post(self, &request.url)
            .header(CONTENT_TYPE, CONTENT_TYPE_XML)
            .header(ACCEPT, ACCEPT_XML)
            .header(SOAP_ACTION_HEADER, &request.soap_action);

        if let Some(credentials) = &request.basic_auth {
            builder = builder.basic_auth(&credentials.username, Some(&credentials.password));
        }

        let response = builder.body(request.body).send().await?;
        let status = response.status();
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse { status, body })
    }
}
