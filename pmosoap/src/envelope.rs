//! Enveloppe SOAP : construction des requêtes et décodage des réponses
//!
//! Le contenu du Header et du Body est traité comme du XML opaque : la
//! requête est sérialisée à partir des [`Params`], la réponse est restituée
//! sous forme d'octets bruts (`innerxml`) sans être réinterprétée.

use quick_xml::Reader;
use quick_xml::events::Event;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use xmltree::{Element, XMLNode};

use crate::charset::decode_document;
use crate::error::{DecodeError, Error, Result};
use crate::fault::Fault;
use crate::params::{HeaderParams, ParamValue, Params, Request};

/// Namespace de l'enveloppe SOAP 1.1
pub const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";

/// Indentation des enveloppes émises
const INDENT: &str = "    ";

/// Réponse décodée d'un appel SOAP
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Code HTTP de la réponse
    pub status: StatusCode,
    /// Contenu brut du Header (vide si absent)
    pub header: Vec<u8>,
    /// Contenu brut du Body
    pub body: Vec<u8>,
    /// Enveloppe envoyée, octet pour octet
    pub payload: Vec<u8>,
}

impl Response {
    pub(crate) fn new(status: StatusCode, payload: Vec<u8>) -> Self {
        Self {
            status,
            header: Vec::new(),
            body: Vec::new(),
            payload,
        }
    }

    /// Body as UTF-8 text
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// SOAP Fault carried by the Body, if any
    pub fn fault(&self) -> Option<Fault> {
        Fault::from_body(&self.body)
    }

    /// Deserialize the first element of the Body into `T`.
    ///
    /// A Body carrying a Fault yields [`Error::Fault`].
    pub fn unmarshal<T: DeserializeOwned>(&self) -> Result<T> {
        if let Some(fault) = self.fault() {
            return Err(Error::Fault(fault));
        }
        let body = self.body_text();
        Ok(quick_xml::de::from_str(body.trim())?)
    }
}

/// Sérialise l'enveloppe d'une requête.
///
/// * `namespace` - namespace de l'élément d'opération (`targetNamespace` sans `/` final)
/// * `header_name` - élément englobant les paramètres d'en-tête, s'il est défini
/// * `header_params` - paramètres d'en-tête ; le `soap:Header` est omis s'il n'y en a pas
pub fn build_request_envelope(
    namespace: &str,
    header_name: Option<&str>,
    header_params: &HeaderParams,
    request: &Request,
) -> std::result::Result<Vec<u8>, xmltree::Error> {
    let mut envelope = Element::new("soap:Envelope");
    envelope
        .attributes
        .insert("xmlns:soap".to_string(), SOAP_ENV_NS.to_string());
    envelope
        .attributes
        .insert("xmlns:xsi".to_string(), XSI_NS.to_string());
    envelope
        .attributes
        .insert("xmlns:xsd".to_string(), XSD_NS.to_string());

    if !header_params.is_empty() {
        let mut header = Element::new("soap:Header");
        match header_name {
            Some(name) => {
                let mut wrapper = Element::new(name);
                wrapper
                    .attributes
                    .insert("xmlns".to_string(), namespace.to_string());
                append_params(&mut wrapper, header_params);
                header.children.push(XMLNode::Element(wrapper));
            }
            None => append_params(&mut header, header_params),
        }
        envelope.children.push(XMLNode::Element(header));
    }

    let mut operation = Element::new(request.method());
    operation
        .attributes
        .insert("xmlns".to_string(), namespace.to_string());
    append_params(&mut operation, request.params());

    let mut body = Element::new("soap:Body");
    body.children.push(XMLNode::Element(operation));
    envelope.children.push(XMLNode::Element(body));

    let mut buf = Vec::new();
    let config = xmltree::EmitterConfig::new()
        .write_document_declaration(false)
        .perform_indent(true)
        .indent_string(INDENT);
    envelope.write_with_config(&mut buf, config)?;

    Ok(buf)
}

fn append_params(parent: &mut Element, params: &Params) {
    for (name, value) in params.iter() {
        append_value(parent, name, value);
    }
}

fn append_value(parent: &mut Element, name: &str, value: &ParamValue) {
    match value {
        ParamValue::Text(text) => {
            let mut child = Element::new(name);
            child.children.push(XMLNode::Text(text.clone()));
            parent.children.push(XMLNode::Element(child));
        }
        ParamValue::Nested(params) => {
            let mut child = Element::new(name);
            append_params(&mut child, params);
            parent.children.push(XMLNode::Element(child));
        }
        ParamValue::List(items) => {
            for item in items {
                append_value(parent, name, item);
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Section {
    Header,
    Body,
}

/// Décode une enveloppe de réponse dans `response`.
///
/// `response` est rempli au fil du décodage : en cas d'erreur, les sections
/// déjà lues restent disponibles.
pub fn decode_response_envelope(
    raw: &[u8],
    response: &mut Response,
) -> std::result::Result<(), DecodeError> {
    let text = decode_document(raw)?;
    let mut reader = Reader::from_str(&text);

    let mut depth = 0usize;
    let mut seen_envelope = false;
    let mut open_section: Option<(Section, usize)> = None;

    loop {
        let before = reader.buffer_position() as usize;
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                match depth {
                    1 => {
                        check_envelope(e.local_name().as_ref())?;
                        seen_envelope = true;
                    }
                    2 => {
                        open_section = section_of(e.local_name().as_ref())
                            .map(|section| (section, reader.buffer_position() as usize));
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => {
                if depth == 0 {
                    // <Envelope/> : enveloppe vide
                    return check_envelope(e.local_name().as_ref());
                }
            }
            Event::End(_) => {
                if depth == 2 {
                    if let Some((section, start)) = open_section.take() {
                        let inner = text.get(start..before).unwrap_or_default();
                        match section {
                            Section::Header => response.header = inner.as_bytes().to_vec(),
                            Section::Body => response.body = inner.as_bytes().to_vec(),
                        }
                    }
                }
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Ok(());
                }
            }
            Event::Eof => {
                return Err(if seen_envelope {
                    DecodeError::UnexpectedEof
                } else {
                    DecodeError::MissingEnvelope
                });
            }
            _ => {}
        }
    }
}

fn check_envelope(name: &[u8]) -> std::result::Result<(), DecodeError> {
    if name == b"Envelope" {
        Ok(())
    } else {
        Err(DecodeError::NotAnEnvelope(
            String::from_utf8_lossy(name).into_owned(),
        ))
    }
}

fn section_of(name: &[u8]) -> Option<Section> {
    match name {
        b"Header" => Some(Section::Header),
        b"Body" => Some(Section::Body),
        _ => None,
    }
}
