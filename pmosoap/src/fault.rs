//! SOAP Faults

use quick_xml::Reader;
use quick_xml::events::Event;

/// Erreur SOAP (Fault) lue dans le Body d'une réponse
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("SOAP fault {fault_code}: {fault_string}")]
pub struct Fault {
    /// Code du fault (ex: "soap:Server")
    pub fault_code: String,

    /// Description de l'erreur
    pub fault_string: String,

    /// Émetteur du fault, s'il est indiqué
    pub fault_actor: Option<String>,

    /// Contenu XML brut de `detail`
    pub detail: Option<String>,
}

impl Fault {
    /// Extract a Fault from raw Body content.
    ///
    /// Understands both SOAP 1.1 (`faultcode`, `faultstring`) and SOAP 1.2
    /// (`Code/Value`, `Reason/Text`) layouts. Returns `None` when the first
    /// element of the Body is not a `Fault` or the markup is malformed.
    pub fn from_body(body: &[u8]) -> Option<Fault> {
        let text = std::str::from_utf8(body).ok()?;
        let mut reader = Reader::from_str(text);

        // éléments ouverts, avec la position de début de leur contenu
        let mut path: Vec<(String, usize)> = Vec::new();
        let mut fault = Fault {
            fault_code: String::new(),
            fault_string: String::new(),
            fault_actor: None,
            detail: None,
        };

        loop {
            let before = reader.buffer_position() as usize;
            match reader.read_event().ok()? {
                Event::Start(e) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    if path.is_empty() && name != "Fault" {
                        return None;
                    }
                    path.push((name, reader.buffer_position() as usize));
                }
                Event::Empty(e) => {
                    if path.is_empty() {
                        return (e.local_name().as_ref() == b"Fault").then_some(fault);
                    }
                }
                Event::End(_) => {
                    let inner = path
                        .last()
                        .and_then(|(_, start)| text.get(*start..before))
                        .unwrap_or_default();
                    let names: Vec<&str> = path.iter().map(|(name, _)| name.as_str()).collect();
                    match field_of(&names) {
                        Some(Field::Code) => fault.fault_code = unescape_text(inner)?,
                        Some(Field::String) => fault.fault_string = unescape_text(inner)?,
                        Some(Field::Actor) => fault.fault_actor = Some(unescape_text(inner)?),
                        Some(Field::Detail) => fault.detail = Some(inner.to_string()),
                        None => {}
                    }
                    path.pop();
                    if path.is_empty() {
                        return Some(fault);
                    }
                }
                Event::Eof => return None,
                _ => {}
            }
        }
    }
}

fn unescape_text(raw: &str) -> Option<String> {
    quick_xml::escape::unescape(raw.trim())
        .ok()
        .map(|value| value.into_owned())
}

enum Field {
    Code,
    String,
    Actor,
    Detail,
}

fn field_of(path: &[&str]) -> Option<Field> {
    match path {
        ["Fault", "faultcode"] | ["Fault", "Code", "Value"] => Some(Field::Code),
        ["Fault", "faultstring"] | ["Fault", "Reason", "Text"] => Some(Field::String),
        ["Fault", "faultactor"] | ["Fault", "Role"] => Some(Field::Actor),
        ["Fault", "detail"] | ["Fault", "Detail"] => Some(Field::Detail),
        _ => None,
    }
}
