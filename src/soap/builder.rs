//! Construction d'enveloppes SOAP.

use xmltree::Element;

use crate::xmlutil::{emit_document, push_child, text_element};

const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const SOAP_ENCODING_NS: &str = "http://schemas.xmlsoap.org/soap/encoding/";
const UPNP_CONTROL_NS: &str = "urn:schemas-upnp-org:control-1-0";

fn build_soap_envelope_with_body(body_child: Element) -> Result<String, xmltree::Error> {
    let mut body = Element::new("s:Body");
    push_child(&mut body, body_child);

    let mut envelope = Element::new("s:Envelope");
    envelope
        .attributes
        .insert("xmlns:s".to_string(), SOAP_ENVELOPE_NS.to_string());
    envelope.attributes.insert(
        "s:encodingStyle".to_string(),
        SOAP_ENCODING_NS.to_string(),
    );
    push_child(&mut envelope, body);

    emit_document(&envelope)
}

/// Construit une requête SOAP UPnP.
///
/// # Arguments
///
/// * `service_urn` - URN du service (ex: "urn:schemas-upnp-org:service:SwitchPower:1")
/// * `action` - Nom de l'action (ex: "SetTarget")
/// * `args` - Paires nom/valeur des arguments d'entrée
pub fn build_soap_request(
    service_urn: &str,
    action: &str,
    args: &[(&str, &str)],
) -> Result<String, xmltree::Error> {
    let mut request_elem = Element::new(&format!("u:{}", action));
    request_elem
        .attributes
        .insert("xmlns:u".to_string(), service_urn.to_string());

    for (name, value) in args {
        push_child(&mut request_elem, text_element(name, *value));
    }

    build_soap_envelope_with_body(request_elem)
}

/// Construit une réponse SOAP UPnP (`<u:{action}Response>`).
pub fn build_soap_response(
    service_urn: &str,
    action: &str,
    values: &[(String, String)],
) -> Result<String, xmltree::Error> {
    let mut response_elem = Element::new(&format!("u:{}Response", action));
    response_elem
        .attributes
        .insert("xmlns:u".to_string(), service_urn.to_string());

    for (name, value) in values {
        push_child(&mut response_elem, text_element(name, value.clone()));
    }

    build_soap_envelope_with_body(response_elem)
}

/// Construit un SOAP Fault, avec le détail UPnPError quand un code est
/// connu.
pub fn build_soap_fault(
    fault_code: &str,
    fault_string: &str,
    upnp_error_code: Option<u32>,
    upnp_error_desc: Option<&str>,
) -> Result<String, xmltree::Error> {
    let mut fault = Element::new("s:Fault");
    push_child(&mut fault, text_element("faultcode", fault_code));
    push_child(&mut fault, text_element("faultstring", fault_string));

    if let (Some(code), Some(desc)) = (upnp_error_code, upnp_error_desc) {
        let mut upnp_error = Element::new("UPnPError");
        upnp_error
            .attributes
            .insert("xmlns".to_string(), UPNP_CONTROL_NS.to_string());
        push_child(&mut upnp_error, text_element("errorCode", code.to_string()));
        push_child(&mut upnp_error, text_element("errorDescription", desc));

        let mut detail = Element::new("detail");
        push_child(&mut detail, upnp_error);
        push_child(&mut fault, detail);
    }

    build_soap_envelope_with_body(fault)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request() {
        let xml = build_soap_request(
            "urn:schemas-upnp-org:service:SwitchPower:1",
            "SetTarget",
            &[("NewTargetValue", "1")],
        )
        .unwrap();

        assert!(xml.contains("u:SetTarget"));
        assert!(xml.contains("<NewTargetValue>1</NewTargetValue>"));
        assert!(xml.contains(r#"xmlns:u="urn:schemas-upnp-org:service:SwitchPower:1""#));
        assert!(xml.contains(r#"xmlns:s="http://schemas.xmlsoap.org/soap/envelope/""#));
    }

    #[test]
    fn test_build_response() {
        let values = vec![("ResultStatus".to_string(), "1".to_string())];
        let xml = build_soap_response(
            "urn:schemas-upnp-org:service:SwitchPower:1",
            "GetStatus",
            &values,
        )
        .unwrap();

        assert!(xml.contains("GetStatusResponse"));
        assert!(xml.contains("<ResultStatus>1</ResultStatus>"));
    }

    #[test]
    fn test_build_empty_response() {
        let xml = build_soap_response("urn:schemas-upnp-org:service:SwitchPower:1", "SetTarget", &[])
            .unwrap();
        assert!(xml.contains("SetTargetResponse"));
    }

    #[test]
    fn test_build_fault_with_upnp_detail() {
        let xml = build_soap_fault("s:Client", "UPnPError", Some(501), Some("boom")).unwrap();

        assert!(xml.contains("<faultcode>s:Client</faultcode>"));
        assert!(xml.contains("<detail>"));
        assert!(xml.contains("<errorCode>501</errorCode>"));
        assert!(xml.contains("<errorDescription>boom</errorDescription>"));
    }

    #[test]
    fn test_build_fault_without_detail() {
        let xml = build_soap_fault("s:Client", "Invalid Action", None, None).unwrap();
        assert!(!xml.contains("UPnPError"));
    }
}
