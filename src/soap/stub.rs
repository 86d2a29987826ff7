//! Stub d'invocation d'actions distantes.

use std::collections::HashMap;

use tracing::debug;

use super::{build_soap_request, parse_action_response};
use crate::error::UpnpError;

/// Descripteur immuable d'une action SCPD.
///
/// Les maps associent un nom d'argument à sa variable d'état liée
/// (relatedStateVariable), partitionnées par direction.
#[derive(Debug, Clone, Default)]
pub struct ActionDescriptor {
    pub name: String,
    pub inputs: HashMap<String, String>,
    pub outputs: HashMap<String, String>,
}

/// Invoque une action SOAP sur une URL de contrôle.
///
/// POST avec l'en-tête `SOAPACTION: "{serviceType}#{actionName}"`; le
/// corps de la réponse est lu quel que soit le statut HTTP pour pouvoir
/// décoder un éventuel Fault.
pub async fn invoke_action(
    client: &reqwest::Client,
    control_url: &str,
    service_type: &str,
    action: &str,
    inputs: &HashMap<String, String>,
) -> Result<HashMap<String, String>, UpnpError> {
    let args: Vec<(&str, &str)> = inputs
        .iter()
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect();

    let body = build_soap_request(service_type, action, &args)
        .map_err(|e| UpnpError::protocol(0, format!("Failed to build SOAP request: {e}")))?;

    let soap_action = format!(r#""{}#{}""#, service_type, action);
    debug!("📤 SOAP {} -> {}", action, control_url);

    let response = client
        .post(control_url)
        .header("Content-Type", r#"text/xml; charset="utf-8""#)
        .header("SOAPACTION", soap_action)
        .body(body)
        .send()
        .await
        .map_err(|e| UpnpError::transport(format!("HTTP request error: {e}")))?;

    let bytes = response
        .bytes()
        .await
        .map_err(|e| UpnpError::transport(format!("HTTP request error: {e}")))?;

    parse_action_response(&bytes, action)
}
