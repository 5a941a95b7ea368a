//! Service description consumed by the client
//!
//! [`Description`] is the subset of a WSDL document the call pipeline needs:
//! the target namespace, the services with their port addresses and the
//! SOAP action bound to each operation. Obtaining it is delegated to a
//! [`DescriptionLoader`]; [`WsdlLoader`] fetches and parses WSDL 1.1
//! documents over HTTP(S) or from `file://` locators.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::error::{DescriptionError, Error, Result};
use crate::wsdl;

/// Parsed service description
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Description {
    pub target_namespace: String,
    pub services: Vec<Service>,
    /// SOAP action keyed by operation name
    pub actions: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Service {
    pub name: String,
    pub ports: Vec<Port>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Port {
    pub name: String,
    pub binding: String,
    /// `soap:address` locations, in document order
    pub addresses: Vec<String>,
}

impl Description {
    /// Target namespace without its trailing `/`
    pub fn base_url(&self) -> &str {
        self.target_namespace
            .strip_suffix('/')
            .unwrap_or(&self.target_namespace)
    }

    /// SOAP action declared for `operation`, if any
    pub fn soap_action(&self, operation: &str) -> Option<&str> {
        self.actions
            .get(operation)
            .map(String::as_str)
            .filter(|action| !action.is_empty())
    }

    /// First address of the first port of the first service
    pub fn endpoint(&self) -> Result<&str> {
        let service = self.services.first().ok_or(Error::NoServices)?;
        service
            .ports
            .first()
            .and_then(|port| port.addresses.first())
            .map(String::as_str)
            .ok_or_else(|| Error::NoEndpoint(service.name.clone()))
    }
}

/// Source of service descriptions
#[async_trait]
pub trait DescriptionLoader: Send + Sync {
    async fn load(&self, source: &Url) -> std::result::Result<Description, DescriptionError>;
}

/// Validate a WSDL locator without touching the network
pub fn parse_locator(locator: &str) -> std::result::Result<Url, DescriptionError> {
    Url::parse(locator).map_err(|source| DescriptionError::InvalidLocator {
        locator: locator.to_string(),
        source,
    })
}

/// Loads WSDL 1.1 documents from `http`, `https` and `file` locators
#[derive(Debug, Clone, Default)]
pub struct WsdlLoader {
    http: reqwest::Client,
}

impl WsdlLoader {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn fetch(&self, source: &Url) -> std::result::Result<Vec<u8>, DescriptionError> {
        match source.scheme() {
            "http" | "https" => {
                let response = self
                    .http
                    .get(source.clone())
                    .send()
                    .await?
                    .error_for_status()?;
                Ok(response.bytes().await?.to_vec())
            }
            "file" => {
                let path = source
                    .to_file_path()
                    .map_err(|_| DescriptionError::UnsupportedScheme(source.to_string()))?;
                Ok(tokio::fs::read(path).await?)
            }
            other => Err(DescriptionError::UnsupportedScheme(other.to_string())),
        }
    }
}

#[async_trait]
impl DescriptionLoader for WsdlLoader {
    async fn load(&self, source: &Url) -> std::result::Result<Description, DescriptionError> {
        debug!(source = %source, "Fetching WSDL");
        let raw = self.fetch(source).await?;
        debug!(source = %source, bytes = raw.len(), "Parsing WSDL");
        wsdl::parse_wsdl(&raw)
    }
}
