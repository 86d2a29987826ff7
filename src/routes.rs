//! Routage HTTP des requêtes UPnP entrantes.
//!
//! Une table fixe METHOD + chemin, relative au préfixe configuré:
//!
//! | Route | Rôle |
//! |---|---|
//! | `GET /device/desc.xml?udn=` | description d'un device |
//! | `GET /service/desc.xml?usn=` | SCPD d'un service |
//! | `POST /service/control?usn=` | invocation SOAP (en-tête SOAPACTION) |
//! | `NOTIFY /events?usn=` | événement GENA entrant (côté control point) |
//! | `SUBSCRIBE /service/events?usn=` | abonnement GENA (en-têtes CALLBACK, TIMEOUT) |
//! | `UNSUBSCRIBE /service/events?usn=` | désabonnement (en-tête SID) |
//!
//! Toute requête sous le préfixe sans entrée correspondante: 404. Les
//! méthodes SUBSCRIBE/UNSUBSCRIBE/NOTIFY n'étant pas standard, les
//! routes sont déclarées en `any` et tranchent sur la méthode.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use tracing::{error, info, warn};

use crate::error::{UpnpError, UpnpErrorKind};
use crate::gena::{DEFAULT_TIMEOUT_HEADER, parse_callback_header, parse_property_set};
use crate::peer::PeerInner;
use crate::soap::{
    SoapParseError, build_soap_fault, build_soap_response, error_codes, parse_soap_action,
};

const FALLBACK_FAULT: &str = "<?xml version=\"1.0\"?><s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\"><s:Body><s:Fault><faultcode>s:Server</faultcode><faultstring>Internal Error</faultstring></s:Fault></s:Body></s:Envelope>";

/// Construit le router du peer, monté sous son préfixe.
pub(crate) fn router(peer: Arc<PeerInner>) -> Router {
    let prefix = peer.prefix.clone();
    let routes = Router::new()
        .route("/device/desc.xml", any(device_description))
        .route("/service/desc.xml", any(service_description))
        .route("/service/control", any(control))
        .route("/service/events", any(service_events))
        .route("/events", any(remote_events))
        .fallback(not_found_handler)
        .with_state(peer);

    if prefix.is_empty() {
        routes
    } else {
        Router::new().nest(&prefix, routes)
    }
}

async fn not_found_handler() -> Response {
    not_found()
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not found").into_response()
}

fn xml_response(status: StatusCode, xml: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, r#"text/xml; charset="utf-8""#)],
        xml,
    )
        .into_response()
}

fn error_status(err: &UpnpError) -> StatusCode {
    match err.kind {
        UpnpErrorKind::BadRequest => StatusCode::BAD_REQUEST,
        UpnpErrorKind::NotFound => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn soap_fault_response(code: u32, message: &str) -> Response {
    let xml = build_soap_fault("s:Client", "UPnPError", Some(code), Some(message))
        .unwrap_or_else(|_| FALLBACK_FAULT.to_string());
    xml_response(StatusCode::INTERNAL_SERVER_ERROR, xml)
}

/// GET /device/desc.xml?udn=
async fn device_description(
    State(peer): State<Arc<PeerInner>>,
    method: Method,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if method != Method::GET {
        return not_found();
    }
    let udn = query.get("udn").cloned().unwrap_or_default();

    let device = peer.devices.read().unwrap().get(&udn).cloned();
    match device {
        Some(device) => match device.description_document() {
            Ok(xml) => xml_response(StatusCode::OK, xml),
            Err(e) => {
                error!("Failed to render device description: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
        None => (StatusCode::NOT_FOUND, "Device not found").into_response(),
    }
}

/// GET /service/desc.xml?usn=
async fn service_description(
    State(peer): State<Arc<PeerInner>>,
    method: Method,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if method != Method::GET {
        return not_found();
    }
    let usn = query.get("usn").cloned().unwrap_or_default();

    match peer.lookup_local_service(&usn) {
        Ok((_, service)) => match service.scpd_document() {
            Ok(xml) => xml_response(StatusCode::OK, xml),
            Err(e) => {
                error!("Failed to render SCPD: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
        Err(e) => {
            let status = error_status(&e);
            (status, e.message).into_response()
        }
    }
}

/// POST /service/control?usn= avec en-tête SOAPACTION.
///
/// L'implémentation est invoquée avec les arguments décodés; toute
/// erreur d'implémentation devient un Fault UPnP 501, toujours sous
/// forme de document SOAP.
async fn control(
    State(peer): State<Arc<PeerInner>>,
    method: Method,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    if method != Method::POST {
        return not_found();
    }
    let usn = query.get("usn").cloned().unwrap_or_default();

    let (_, service) = match peer.lookup_local_service(&usn) {
        Ok(found) => found,
        Err(e) => {
            let status = error_status(&e);
            let text = if e.kind == UpnpErrorKind::NotFound {
                "Service or action not found".to_string()
            } else {
                e.message
            };
            return (status, text).into_response();
        }
    };

    // SOAPACTION: "urn:...:service:X:1#ActionName"
    let action_name = headers
        .get("soapaction")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_matches('"'))
        .and_then(|v| v.rsplit('#').next())
        .unwrap_or("")
        .to_string();
    if action_name.is_empty() {
        return (StatusCode::NOT_FOUND, "Service or action not found").into_response();
    }

    let action = match parse_soap_action(body.as_bytes()) {
        Ok(action) => action,
        Err(SoapParseError::XmlError(e)) => {
            return (
                StatusCode::BAD_REQUEST,
                format!("Request is not a valid XML message: {e}"),
            )
                .into_response();
        }
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                "Request is not a valid UPnP/SOAP message",
            )
                .into_response();
        }
    };
    if action.name != action_name {
        return (
            StatusCode::BAD_REQUEST,
            "Request is not a valid UPnP/SOAP message",
        )
            .into_response();
    }

    match service.run_action(&action.name, &action.args) {
        Ok(outputs) => {
            let mut values: Vec<(String, String)> = outputs.into_iter().collect();
            values.sort();
            match build_soap_response(service.service_type(), &action.name, &values) {
                Ok(xml) => xml_response(StatusCode::OK, xml),
                Err(e) => {
                    error!("Failed to build SOAP response: {}", e);
                    soap_fault_response(error_codes::ACTION_FAILED, "Failed to build SOAP response")
                }
            }
        }
        Err(e) => {
            warn!("❌ Action {} failed: {}", action.name, e.message);
            soap_fault_response(e.code, &e.message)
        }
    }
}

/// NOTIFY /events?usn= — événement GENA entrant, ré-émis sur le
/// service distant correspondant.
async fn remote_events(
    State(peer): State<Arc<PeerInner>>,
    method: Method,
    Query(query): Query<HashMap<String, String>>,
    body: String,
) -> Response {
    if method.as_str() != "NOTIFY" {
        return not_found();
    }
    let usn = query.get("usn").cloned().unwrap_or_default();

    let service = match peer.lookup_remote_service(&usn) {
        Ok(service) => service,
        Err(e) => {
            let status = error_status(&e);
            return (status, e.message).into_response();
        }
    };

    match parse_property_set(body.as_bytes()) {
        Ok(values) => {
            service.emit_event(values);
            StatusCode::OK.into_response()
        }
        Err(e) => (StatusCode::BAD_REQUEST, e.message).into_response(),
    }
}

/// SUBSCRIBE / UNSUBSCRIBE /service/events?usn=
async fn service_events(
    State(peer): State<Arc<PeerInner>>,
    method: Method,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let usn = query.get("usn").cloned().unwrap_or_default();

    match method.as_str() {
        "SUBSCRIBE" => {
            let (device, service) = match peer.lookup_local_service(&usn) {
                Ok(found) => found,
                Err(e) => return error_status(&e).into_response(),
            };

            let callbacks = headers
                .get("callback")
                .and_then(|v| v.to_str().ok())
                .map(parse_callback_header)
                .unwrap_or_default();
            let sid = service.add_subscription(callbacks);
            let timeout = headers
                .get("timeout")
                .and_then(|v| v.to_str().ok())
                .unwrap_or(DEFAULT_TIMEOUT_HEADER)
                .to_string();

            info!("🔒 New subscription: SID={}, Timeout={}", sid, timeout);

            let date = chrono::Utc::now()
                .format("%a, %d %b %Y %H:%M:%S GMT")
                .to_string();
            (
                StatusCode::OK,
                [
                    (header::DATE, HeaderValue::from_str(&date).unwrap()),
                    (
                        header::SERVER,
                        HeaderValue::from_str(device.server())
                            .unwrap_or(HeaderValue::from_static("UPnP/1.1")),
                    ),
                    (
                        HeaderName::from_static("sid"),
                        HeaderValue::from_str(&sid).unwrap(),
                    ),
                    (
                        HeaderName::from_static("timeout"),
                        HeaderValue::from_str(&timeout)
                            .unwrap_or(HeaderValue::from_static(DEFAULT_TIMEOUT_HEADER)),
                    ),
                    (header::CONTENT_LENGTH, HeaderValue::from_static("0")),
                ],
            )
                .into_response()
        }
        "UNSUBSCRIBE" => {
            let (_, service) = match peer.lookup_local_service(&usn) {
                Ok(found) => found,
                Err(e) => return error_status(&e).into_response(),
            };
            if let Some(sid) = headers.get("sid").and_then(|v| v.to_str().ok()) {
                if service.remove_subscription(sid) {
                    info!("❌ Unsubscribe SID={}", sid);
                }
            }
            StatusCode::OK.into_response()
        }
        _ => not_found(),
    }
}
