//! Minimal WSDL 1.1 reader
//!
//! Only what the call pipeline consumes is extracted: `targetNamespace`,
//! `service/port/*:address@location` and
//! `binding/operation/*:operation@soapAction`. Element prefixes are ignored so
//! both SOAP 1.1 and SOAP 1.2 bindings are understood.

use std::collections::HashMap;

use quick_xml::NsReader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use tracing::debug;

use crate::charset::decode_document;
use crate::description::{Description, Port, Service};
use crate::error::DescriptionError;

/// Namespace of the WSDL SOAP 1.1 binding extension
pub const WSDL_SOAP11_NS: &str = "http://schemas.xmlsoap.org/wsdl/soap/";

/// Parse a WSDL document
///
/// When several bindings declare an action for the same operation, the first
/// SOAP 1.1 binding wins, since requests are sent as SOAP 1.1 envelopes.
/// Actions from other bindings are only used for operations no SOAP 1.1
/// binding declares.
pub fn parse_wsdl(raw: &[u8]) -> Result<Description, DescriptionError> {
    let text = decode_document(raw)?;
    let mut reader = NsReader::from_str(&text);
    reader.config_mut().trim_text(true);

    let mut description = Description::default();
    let mut seen_root = false;
    let mut depth = 0usize;

    let mut current_service: Option<Service> = None;
    let mut current_port: Option<Port> = None;
    let mut in_binding = false;
    // opération wsdl en cours et profondeur de sa balise ouvrante
    let mut current_operation: Option<(String, usize)> = None;
    let mut fallback_actions: HashMap<String, String> = HashMap::new();

    loop {
        let (element, is_empty) = match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                (e, false)
            }
            Event::Empty(e) => (e, true),
            Event::End(e) => {
                match e.local_name().as_ref() {
                    b"service" => {
                        if let Some(service) = current_service.take() {
                            description.services.push(service);
                        }
                    }
                    b"port" => {
                        if let (Some(service), Some(port)) =
                            (current_service.as_mut(), current_port.take())
                        {
                            service.ports.push(port);
                        }
                    }
                    b"binding" => in_binding = false,
                    // seule la balise fermante au même niveau termine l'opération :
                    // un soap:operation non vide (quel que soit son préfixe) ne compte pas
                    b"operation" => {
                        if current_operation
                            .as_ref()
                            .is_some_and(|(_, level)| *level == depth)
                        {
                            current_operation = None;
                        }
                    }
                    _ => {}
                }
                depth = depth.saturating_sub(1);
                continue;
            }
            Event::Eof => break,
            _ => continue,
        };

        if !seen_root {
            seen_root = true;
            let name = element.local_name();
            if name.as_ref() != b"definitions" {
                return Err(DescriptionError::NotAWsdl(
                    String::from_utf8_lossy(name.as_ref()).into_owned(),
                ));
            }
            description.target_namespace =
                attribute(&element, b"targetNamespace")?.unwrap_or_default();
            if is_empty {
                break;
            }
            continue;
        }

        match element.local_name().as_ref() {
            b"service" => {
                let service = Service {
                    name: attribute(&element, b"name")?.unwrap_or_default(),
                    ports: Vec::new(),
                };
                if is_empty {
                    description.services.push(service);
                } else {
                    current_service = Some(service);
                }
            }
            b"port" if current_service.is_some() => {
                let port = Port {
                    name: attribute(&element, b"name")?.unwrap_or_default(),
                    binding: attribute(&element, b"binding")?.unwrap_or_default(),
                    addresses: Vec::new(),
                };
                match (is_empty, current_service.as_mut()) {
                    (true, Some(service)) => service.ports.push(port),
                    _ => current_port = Some(port),
                }
            }
            b"address" => {
                if let (Some(port), Some(location)) =
                    (current_port.as_mut(), attribute(&element, b"location")?)
                {
                    port.addresses.push(location);
                }
            }
            b"binding" if !is_empty => in_binding = true,
            b"operation" if in_binding => match &current_operation {
                None if !is_empty => {
                    current_operation =
                        attribute(&element, b"name")?.map(|operation| (operation, depth));
                }
                Some((operation, _)) => {
                    if let Some(action) = attribute(&element, b"soapAction")? {
                        let (namespace, _) = reader.resolve_element(element.name());
                        let actions = if is_soap11(&namespace) {
                            &mut description.actions
                        } else {
                            &mut fallback_actions
                        };
                        actions.entry(operation.clone()).or_insert(action);
                    }
                }
                None => {}
            },
            _ => {}
        }
    }

    if !seen_root {
        return Err(DescriptionError::NotAWsdl(String::new()));
    }

    for (operation, action) in fallback_actions {
        description.actions.entry(operation).or_insert(action);
    }

    debug!(
        target_namespace = %description.target_namespace,
        services = description.services.len(),
        actions = description.actions.len(),
        "Parsed WSDL"
    );
    Ok(description)
}

fn is_soap11(namespace: &ResolveResult<'_>) -> bool {
    matches!(namespace, ResolveResult::Bound(Namespace(ns)) if *ns == WSDL_SOAP11_NS.as_bytes())
}

/// Unescaped value of the attribute whose local name is `name`
fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>, DescriptionError> {
    for attr in element.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.local_name().as_ref() == name {
            let raw = String::from_utf8_lossy(&attr.value);
            let value = quick_xml::escape::unescape(&raw).map_err(quick_xml::Error::from)?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}
