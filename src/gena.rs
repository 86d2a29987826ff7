//! Codec GENA: property sets d'événements et en-têtes d'abonnement.

use std::collections::HashMap;

use quick_xml::escape::escape;
use xmltree::Element;

use crate::error::UpnpError;
use crate::xmlutil::xml_children;

/// En-tête NT des requêtes d'événement.
pub const NT_EVENT: &str = "upnp:event";

/// En-tête NTS des notifications de changement d'état.
pub const NTS_PROPCHANGE: &str = "upnp:propchange";

/// Timeout d'abonnement par défaut, en secondes.
pub const DEFAULT_TIMEOUT_SECS: u64 = 1800;

/// Valeur TIMEOUT par défaut, telle qu'échangée sur le fil.
pub const DEFAULT_TIMEOUT_HEADER: &str = "Second-1800";

/// Rend un document propertyset pour une liste de variables.
pub fn render_property_set(variables: &[(String, String)]) -> String {
    let mut body = r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">"#.to_string();
    for (name, value) in variables {
        body.push_str(&format!(
            "<e:property><{0}>{1}</{0}></e:property>",
            name,
            escape(value.as_str())
        ));
    }
    body.push_str("</e:propertyset>");
    body
}

/// Extrait les paires nom/valeur d'un document propertyset.
pub fn parse_property_set(xml: &[u8]) -> Result<HashMap<String, String>, UpnpError> {
    let root = Element::parse(xml)
        .map_err(|e| UpnpError::invalid_xml(format!("Request is not a valid XML message: {e}")))?;

    let mut values = HashMap::new();
    for property in xml_children(&root).filter(|e| e.name == "property") {
        for child in xml_children(property) {
            let value = child.get_text().unwrap_or_default().into_owned();
            values.insert(child.name.clone(), value);
        }
    }
    Ok(values)
}

/// Interprète un en-tête TIMEOUT (`Second-N`).
///
/// Absent ou illisible, la valeur par défaut de 1800 s s'applique.
pub fn parse_timeout_header(raw: Option<&str>) -> u64 {
    let Some(value) = raw else {
        return DEFAULT_TIMEOUT_SECS;
    };
    let lower = value.trim().to_ascii_lowercase();
    if let Some(idx) = lower.find("second-") {
        if let Ok(seconds) = lower[idx + 7..].parse::<u64>() {
            return seconds;
        }
    }
    DEFAULT_TIMEOUT_SECS
}

/// Découpe un en-tête CALLBACK en URLs: retire les chevrons, sépare sur
/// les virgules.
pub fn parse_callback_header(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|part| {
            part.trim()
                .trim_matches(|c| c == '<' || c == '>')
                .to_string()
        })
        .filter(|url| !url.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_property_set() {
        let vars = vec![("Status".to_string(), "1".to_string())];
        let xml = render_property_set(&vars);
        assert!(xml.contains(r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">"#));
        assert!(xml.contains("<e:property><Status>1</Status></e:property>"));
    }

    #[test]
    fn test_render_escapes_values() {
        let vars = vec![("Name".to_string(), "a<b&c".to_string())];
        let xml = render_property_set(&vars);
        assert!(xml.contains("<Name>a&lt;b&amp;c</Name>"));
    }

    #[test]
    fn test_parse_property_set() {
        let xml = r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
            <e:property><Status>1</Status></e:property>
            <e:property><Target>0</Target></e:property>
        </e:propertyset>"#;
        let values = parse_property_set(xml.as_bytes()).unwrap();
        assert_eq!(values.get("Status"), Some(&"1".to_string()));
        assert_eq!(values.get("Target"), Some(&"0".to_string()));
    }

    #[test]
    fn test_parse_property_set_rejects_garbage() {
        assert!(parse_property_set(b"not xml at all <<<").is_err());
    }

    #[test]
    fn test_parse_timeout_header() {
        assert_eq!(parse_timeout_header(Some("Second-300")), 300);
        assert_eq!(parse_timeout_header(Some("second-60")), 60);
        assert_eq!(parse_timeout_header(Some("infinite")), DEFAULT_TIMEOUT_SECS);
        assert_eq!(parse_timeout_header(None), DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_parse_callback_header() {
        let urls = parse_callback_header("<http://10.0.0.2:8080/events?usn=a::b>");
        assert_eq!(urls, vec!["http://10.0.0.2:8080/events?usn=a::b"]);

        let urls = parse_callback_header("<http://a/cb>, <http://b/cb>");
        assert_eq!(urls, vec!["http://a/cb", "http://b/cb"]);

        assert!(parse_callback_header("").is_empty());
    }
}
