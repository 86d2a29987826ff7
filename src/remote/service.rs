//! Proxy d'un service distant: actions, variables, abonnement GENA.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use xmltree::Element;

use crate::error::UpnpError;
use crate::gena::{NT_EVENT, parse_timeout_header};
use crate::peer::PeerInner;
use crate::remote::fetch_bytes;
use crate::soap::{ActionDescriptor, invoke_action};
use crate::xmlutil::{child_text, xml_children};

/// Événements observables sur un service distant.
#[derive(Debug, Clone)]
pub enum RemoteServiceEvent {
    /// Propriétés reçues dans un NOTIFY GENA.
    Changed(HashMap<String, String>),

    /// Le device a émis un byebye.
    Disappear,
}

/// Métadonnées d'une variable d'état lue dans le SCPD.
#[derive(Debug, Clone)]
pub struct StateVariableInfo {
    pub name: String,
    pub data_type: Option<String>,
    pub default_value: Option<String>,

    /// sendEvents; true quand l'attribut est absent.
    pub send_events: bool,

    pub multicast: bool,
    pub allowed_values: Option<Vec<String>>,
    pub allowed_range: Option<AllowedRange>,
}

/// allowedValueRange d'une variable d'état.
#[derive(Debug, Clone, Default)]
pub struct AllowedRange {
    pub minimum: Option<String>,
    pub maximum: Option<String>,
    pub step: Option<String>,
}

/// Table des actions et variables résolues depuis le SCPD.
#[derive(Debug, Clone, Default)]
pub struct ServiceProxy {
    pub actions: HashMap<String, ActionDescriptor>,
    pub variables: HashMap<String, StateVariableInfo>,
}

#[derive(Debug, Default)]
struct SubscriptionState {
    sid: Option<String>,
    renewal: Option<JoinHandle<()>>,
}

/// Service distant.
///
/// Les URLs SCPD/contrôle/événement sont absolues, résolues contre
/// l'URL de description du device parent.
#[derive(Debug)]
pub struct RemoteService {
    peer: Weak<PeerInner>,
    self_ref: Weak<RemoteService>,
    device_udn: String,
    usn: String,
    service_type: String,
    service_id: Option<String>,
    scpd_url: String,
    control_url: String,
    event_sub_url: String,

    /// Cache du proxy résolu; `bind` est idempotent.
    proxy: tokio::sync::Mutex<Option<Arc<ServiceProxy>>>,

    sub: Mutex<SubscriptionState>,
    events: broadcast::Sender<RemoteServiceEvent>,
    listeners: AtomicUsize,
}

impl RemoteService {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        peer: &Arc<PeerInner>,
        device_udn: String,
        service_type: String,
        service_id: Option<String>,
        scpd_url: String,
        control_url: String,
        event_sub_url: String,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(32);
        Arc::new_cyclic(|self_ref| Self {
            peer: Arc::downgrade(peer),
            self_ref: self_ref.clone(),
            usn: format!("{device_udn}::{service_type}"),
            device_udn,
            service_type,
            service_id,
            scpd_url,
            control_url,
            event_sub_url,
            proxy: tokio::sync::Mutex::new(None),
            sub: Mutex::new(SubscriptionState::default()),
            events,
            listeners: AtomicUsize::new(0),
        })
    }

    pub fn device_udn(&self) -> &str {
        &self.device_udn
    }

    /// `{UDN}::{serviceType}`
    pub fn usn(&self) -> &str {
        &self.usn
    }

    pub fn service_type(&self) -> &str {
        &self.service_type
    }

    pub fn service_id(&self) -> Option<&str> {
        self.service_id.as_deref()
    }

    pub fn scpd_url(&self) -> &str {
        &self.scpd_url
    }

    pub fn control_url(&self) -> &str {
        &self.control_url
    }

    pub fn event_sub_url(&self) -> &str {
        &self.event_sub_url
    }

    /// SID de l'abonnement GENA en cours, s'il existe.
    pub fn sid(&self) -> Option<String> {
        self.sub.lock().unwrap().sid.clone()
    }

    fn peer(&self) -> Result<Arc<PeerInner>, UpnpError> {
        self.peer
            .upgrade()
            .ok_or_else(|| UpnpError::transport("peer is closed"))
    }

    /// Résout les actions et variables du service.
    ///
    /// Idempotent: le premier appel va chercher le SCPD, les suivants
    /// retournent le proxy en cache.
    pub async fn bind(&self) -> Result<Arc<ServiceProxy>, UpnpError> {
        let mut slot = self.proxy.lock().await;
        if let Some(proxy) = slot.as_ref() {
            return Ok(proxy.clone());
        }

        let peer = self.peer()?;
        debug!("📥 Fetching SCPD at {}", self.scpd_url);
        let bytes = fetch_bytes(&peer.http, &self.scpd_url).await?;
        let proxy = Arc::new(parse_scpd(&bytes)?);

        *slot = Some(proxy.clone());
        Ok(proxy)
    }

    /// Invoque une action de ce service.
    pub async fn call(
        &self,
        action: &str,
        inputs: &HashMap<String, String>,
    ) -> Result<HashMap<String, String>, UpnpError> {
        let peer = self.peer()?;
        invoke_action(&peer.http, &self.control_url, &self.service_type, action, inputs).await
    }

    /// S'abonne aux événements du service.
    ///
    /// Le premier flux vivant déclenche le SUBSCRIBE GENA; la chute du
    /// dernier flux annule le timer de renouvellement et envoie
    /// l'UNSUBSCRIBE.
    pub fn subscribe_events(&self) -> EventStream {
        let service = self
            .self_ref
            .upgrade()
            .expect("RemoteService is alive while borrowed");
        let receiver = self.events.subscribe();
        if self.listeners.fetch_add(1, Ordering::SeqCst) == 0 {
            let subscriber = Arc::clone(&service);
            tokio::spawn(async move {
                subscriber.subscribe().await;
            });
        }
        EventStream { service, receiver }
    }

    pub(crate) fn emit_event(&self, values: HashMap<String, String>) {
        let _ = self.events.send(RemoteServiceEvent::Changed(values));
    }

    pub(crate) fn emit_disappear(&self) {
        let _ = self.events.send(RemoteServiceEvent::Disappear);
    }

    /// SUBSCRIBE initial, avec l'URL de callback construite sur
    /// l'adresse du peer.
    async fn subscribe(&self) {
        let Some(peer) = self.peer.upgrade() else {
            return;
        };
        let callback = format!(
            "<http://{}:{}{}/events?usn={}>",
            peer.hostname, peer.port, peer.prefix, self.usn
        );

        let method = reqwest::Method::from_bytes(b"SUBSCRIBE").unwrap();
        let result = peer
            .http
            .request(method, self.event_sub_url.as_str())
            .header("CALLBACK", &callback)
            .header("NT", NT_EVENT)
            .send()
            .await;

        match result {
            Ok(response) => {
                let sid = response
                    .headers()
                    .get("SID")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let timeout = parse_timeout_header(
                    response.headers().get("TIMEOUT").and_then(|v| v.to_str().ok()),
                );

                info!(
                    "🔒 Subscribed to {} (SID={}, timeout {}s)",
                    self.usn,
                    sid.as_deref().unwrap_or("none"),
                    timeout
                );

                self.sub.lock().unwrap().sid = sid;
                self.schedule_renewal(timeout);
            }
            Err(e) => {
                warn!("SUBSCRIBE to {} failed: {}", self.event_sub_url, e);
            }
        }
    }

    /// Programme le renouvellement une seconde avant l'expiration.
    fn schedule_renewal(&self, timeout_secs: u64) {
        let Some(service) = self.self_ref.upgrade() else {
            return;
        };
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(timeout_secs.saturating_sub(1))).await;
            service.renew().await;
        });

        let mut sub = self.sub.lock().unwrap();
        if let Some(previous) = sub.renewal.replace(handle) {
            previous.abort();
        }
    }

    /// SUBSCRIBE de renouvellement (SID seul, sans CALLBACK).
    ///
    /// En cas d'échec de transport, aucun renouvellement futur n'est
    /// programmé: l'abonnement expire silencieusement.
    async fn renew(&self) {
        let sid = self.sub.lock().unwrap().sid.clone();
        let Some(sid) = sid else {
            return;
        };
        let Some(peer) = self.peer.upgrade() else {
            return;
        };

        let method = reqwest::Method::from_bytes(b"SUBSCRIBE").unwrap();
        let result = peer
            .http
            .request(method, self.event_sub_url.as_str())
            .header("SID", &sid)
            .send()
            .await;

        match result {
            Ok(response) => {
                let timeout = parse_timeout_header(
                    response.headers().get("TIMEOUT").and_then(|v| v.to_str().ok()),
                );
                debug!("♻️ Renewed subscription {} for {}s", sid, timeout);
                self.schedule_renewal(timeout);
            }
            Err(e) => {
                warn!(
                    "Renewal of {} failed, subscription will lapse: {}",
                    sid, e
                );
            }
        }
    }

    /// Coupe l'abonnement: annule le timer puis envoie l'UNSUBSCRIBE.
    /// Le statut de la réponse n'est pas interprété.
    fn end_subscription(&self) {
        let (sid, renewal) = {
            let mut sub = self.sub.lock().unwrap();
            (sub.sid.take(), sub.renewal.take())
        };

        if let Some(handle) = renewal {
            handle.abort();
        }

        let (Some(sid), Some(peer)) = (sid, self.peer.upgrade()) else {
            return;
        };

        info!("❌ Unsubscribing {} (SID={})", self.usn, sid);
        let url = self.event_sub_url.clone();
        tokio::spawn(async move {
            let method = reqwest::Method::from_bytes(b"UNSUBSCRIBE").unwrap();
            let _ = peer
                .http
                .request(method, url.as_str())
                .header("SID", &sid)
                .send()
                .await;
        });
    }
}

/// Flux d'événements d'un service distant.
///
/// La chute du dernier flux d'un service coupe son abonnement GENA.
pub struct EventStream {
    service: Arc<RemoteService>,
    receiver: broadcast::Receiver<RemoteServiceEvent>,
}

impl EventStream {
    /// Prochain événement; None quand le service n'émettra plus.
    pub async fn recv(&mut self) -> Option<RemoteServiceEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Event stream lagged, {} events skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        if self.service.listeners.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.service.end_subscription();
        }
    }
}

/// Construit le proxy d'un service depuis son document SCPD.
fn parse_scpd(xml: &[u8]) -> Result<ServiceProxy, UpnpError> {
    let root = Element::parse(xml)
        .map_err(|e| UpnpError::invalid_xml(format!("SCPD is not a valid XML message: {e}")))?;

    let mut variables = HashMap::new();
    if let Some(table) = root.get_child("serviceStateTable") {
        for var_elem in xml_children(table).filter(|e| e.name == "stateVariable") {
            let Some(name) = child_text(var_elem, "name") else {
                continue;
            };
            let send_events = var_elem
                .attributes
                .get("sendEvents")
                .map(|v| v == "yes")
                .unwrap_or(true);
            let multicast = var_elem
                .attributes
                .get("multicast")
                .map(|v| v == "yes")
                .unwrap_or(false);

            let allowed_values = var_elem.get_child("allowedValueList").map(|list| {
                xml_children(list)
                    .filter(|e| e.name == "allowedValue")
                    .map(|e| e.get_text().unwrap_or_default().into_owned())
                    .collect::<Vec<_>>()
            });
            let allowed_range = var_elem.get_child("allowedValueRange").map(|range| AllowedRange {
                minimum: child_text(range, "minimum"),
                maximum: child_text(range, "maximum"),
                step: child_text(range, "step"),
            });

            variables.insert(
                name.clone(),
                StateVariableInfo {
                    name,
                    data_type: child_text(var_elem, "dataType"),
                    default_value: child_text(var_elem, "defaultValue"),
                    send_events,
                    multicast,
                    allowed_values,
                    allowed_range,
                },
            );
        }
    }

    let mut actions = HashMap::new();
    if let Some(list) = root.get_child("actionList") {
        for action_elem in xml_children(list).filter(|e| e.name == "action") {
            let Some(name) = child_text(action_elem, "name") else {
                continue;
            };
            let mut descriptor = ActionDescriptor {
                name: name.clone(),
                ..Default::default()
            };
            if let Some(args) = action_elem.get_child("argumentList") {
                for arg in xml_children(args).filter(|e| e.name == "argument") {
                    let (Some(arg_name), Some(related)) = (
                        child_text(arg, "name"),
                        child_text(arg, "relatedStateVariable"),
                    ) else {
                        continue;
                    };
                    match child_text(arg, "direction").as_deref() {
                        Some("in") => {
                            descriptor.inputs.insert(arg_name, related);
                        }
                        Some("out") => {
                            descriptor.outputs.insert(arg_name, related);
                        }
                        _ => {}
                    }
                }
            }
            actions.insert(name, descriptor);
        }
    }

    Ok(ServiceProxy { actions, variables })
}
