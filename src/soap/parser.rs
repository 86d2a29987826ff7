//! Parsing d'enveloppes SOAP.

use std::collections::HashMap;

use xmltree::Element;

use crate::error::UpnpError;
use crate::xmlutil::{child_text, xml_children};

/// Action UPnP extraite d'une requête de contrôle.
#[derive(Debug, Clone)]
pub struct SoapAction {
    /// Nom de l'action (ex: "SetTarget")
    pub name: String,

    /// Arguments de l'action
    pub args: HashMap<String, String>,
}

/// Erreur de parsing SOAP.
#[derive(Debug, thiserror::Error)]
pub enum SoapParseError {
    #[error("XML parse error: {0}")]
    XmlError(#[from] xmltree::ParseError),

    #[error("Missing SOAP Envelope")]
    MissingEnvelope,

    #[error("Missing SOAP Body")]
    MissingBody,

    #[error("No action found in SOAP Body")]
    NoAction,
}

/// Parse une enveloppe et retourne son élément Body.
fn soap_body(xml: &[u8]) -> Result<Element, SoapParseError> {
    let root = Element::parse(xml)?;

    if !root.name.ends_with("Envelope") {
        return Err(SoapParseError::MissingEnvelope);
    }

    xml_children(&root)
        .find(|e| e.name.ends_with("Body"))
        .cloned()
        .ok_or(SoapParseError::MissingBody)
}

/// Extrait l'action UPnP d'une requête de contrôle.
///
/// Le Body contient un unique élément `<u:ActionName>` dont les enfants
/// directs sont les arguments.
pub fn parse_soap_action(xml: &[u8]) -> Result<SoapAction, SoapParseError> {
    let body = soap_body(xml)?;

    let action_elem = xml_children(&body).next().ok_or(SoapParseError::NoAction)?;

    let mut args = HashMap::new();
    for child in xml_children(action_elem) {
        let value = child.get_text().unwrap_or_default().into_owned();
        args.insert(child.name.clone(), value);
    }

    Ok(SoapAction {
        name: action_elem.name.clone(),
        args,
    })
}

/// Décode la réponse d'une invocation d'action.
///
/// - réponse `<{action}Response>` présente: map des arguments de sortie
///   (vide si l'élément ne contient que du texte);
/// - sinon, Fault portant un détail UPnPError: erreur protocole avec ce
///   code et cette description;
/// - sinon: erreur protocole générique, code 0.
pub fn parse_action_response(
    xml: &[u8],
    action: &str,
) -> Result<HashMap<String, String>, UpnpError> {
    let body = soap_body(xml).map_err(|e| match e {
        SoapParseError::XmlError(e) => {
            UpnpError::invalid_xml(format!("Response is not a valid XML message: {e}"))
        }
        other => UpnpError::protocol(0, other.to_string()),
    })?;

    let response_name = format!("{action}Response");
    if let Some(response) = xml_children(&body).find(|e| e.name == response_name) {
        let mut outputs = HashMap::new();
        for child in xml_children(response) {
            let value = child.get_text().unwrap_or_default().into_owned();
            outputs.insert(child.name.clone(), value);
        }
        return Ok(outputs);
    }

    match extract_upnp_fault(&body) {
        Some((code, description)) => Err(UpnpError::protocol(code, description)),
        None => Err(UpnpError::protocol(
            0,
            "Response is not a valid UPnP/SOAP message",
        )),
    }
}

/// Cherche un détail UPnPError dans un Fault: (errorCode, errorDescription).
fn extract_upnp_fault(body: &Element) -> Option<(u32, String)> {
    let fault = xml_children(body).find(|e| e.name.ends_with("Fault"))?;
    let detail = xml_children(fault).find(|e| e.name == "detail")?;
    let upnp_error = xml_children(detail).find(|e| e.name == "UPnPError")?;

    let code = child_text(upnp_error, "errorCode")
        .and_then(|c| c.trim().parse::<u32>().ok())
        .unwrap_or(0);
    let description = child_text(upnp_error, "errorDescription").unwrap_or_default();

    Some((code, description))
}
