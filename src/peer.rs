//! Le Peer: racine du modèle UPnP.
//!
//! Un [`Peer`] possède ses devices locaux, le cache des devices
//! distants, un transport SSDP et le registre des écouteurs de
//! découverte. Il consomme les événements du transport: `ready` lance
//! les annonces périodiques, `notify`/`found` alimentent le cache
//! distant, `search` déclenche les réponses ciblées.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::advertise::{self, NOTIFY_INTERVAL};
use crate::config::{DeviceConfig, PeerConfig};
use crate::devices::Device;
use crate::remote::{RemoteDevice, RemoteService};
use crate::routes;
use crate::ssdp::{ALIVE, BYEBYE, ROOT_DEVICE, SSDP_ALL, SsdpEvent, SsdpHeaders, SsdpTransport};

/// Timeout des requêtes HTTP sortantes.
const HTTP_TIMEOUT: Duration = Duration::from_secs(2);

/// Délai de grâce entre le ByeBye final et la fermeture du transport.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Événements de cycle de vie du peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// Le transport SSDP est prêt, les annonces ont démarré.
    Ready,

    /// Le transport SSDP est fermé.
    Close,
}

/// Événements de découverte, publiés sur les canaux d'écoute.
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    /// Un device distant vient d'être lié.
    Device(Arc<RemoteDevice>),

    /// Un service d'un device distant vient d'être lié.
    Service(Arc<RemoteService>),
}

/// État partagé du peer.
pub(crate) struct PeerInner {
    pub(crate) prefix: String,
    pub(crate) hostname: String,
    pub(crate) port: u16,
    pub(crate) ssdp: Arc<dyn SsdpTransport>,
    pub(crate) http: reqwest::Client,

    /// Devices locaux (uuid -> Device)
    pub(crate) devices: RwLock<HashMap<String, Arc<Device>>>,

    /// Devices distants connus (UDN -> RemoteDevice)
    pub(crate) remote_devices: RwLock<HashMap<String, Arc<RemoteDevice>>>,

    /// Écouteurs de découverte, par canal (joker, root, URN, UDN)
    listeners: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<DiscoveryEvent>>>>,

    advertise_task: Mutex<Option<JoinHandle<()>>>,
    peer_events: broadcast::Sender<PeerEvent>,
}

impl PeerInner {
    /// Vrai si au moins un écouteur vivant existe sur ce canal.
    pub(crate) fn has_listener(&self, channel: &str) -> bool {
        let mut listeners = self.listeners.lock().unwrap();
        match listeners.get_mut(channel) {
            Some(senders) => {
                senders.retain(|tx| !tx.is_closed());
                if senders.is_empty() {
                    listeners.remove(channel);
                    false
                } else {
                    true
                }
            }
            None => false,
        }
    }

    /// Publie un événement de découverte sur un canal.
    pub(crate) fn emit(&self, channel: &str, event: DiscoveryEvent) {
        let mut listeners = self.listeners.lock().unwrap();
        if let Some(senders) = listeners.get_mut(channel) {
            senders.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    /// Résout un service local depuis un paramètre `usn`.
    pub(crate) fn lookup_local_service(
        &self,
        usn: &str,
    ) -> Result<(Arc<Device>, Arc<crate::services::Service>), crate::error::UpnpError> {
        let parts: Vec<&str> = usn.split("::").collect();
        if parts.len() != 2 {
            return Err(crate::error::UpnpError::bad_request(
                "Parameter usn is missing or not valid",
            ));
        }
        let device = self
            .devices
            .read()
            .unwrap()
            .get(parts[0])
            .cloned()
            .ok_or_else(|| crate::error::UpnpError::not_found("Service not found"))?;
        let service = device
            .get_service(parts[1])
            .ok_or_else(|| crate::error::UpnpError::not_found("Service not found"))?;
        Ok((device, service))
    }

    /// Résout un service distant depuis un paramètre `usn`.
    pub(crate) fn lookup_remote_service(
        &self,
        usn: &str,
    ) -> Result<Arc<RemoteService>, crate::error::UpnpError> {
        let parts: Vec<&str> = usn.split("::").collect();
        if parts.len() != 2 {
            return Err(crate::error::UpnpError::bad_request(
                "Parameter usn is missing or not valid",
            ));
        }
        let device = self
            .remote_devices
            .read()
            .unwrap()
            .get(parts[0])
            .cloned()
            .ok_or_else(|| crate::error::UpnpError::not_found("Service not found"))?;
        device
            .get_service(parts[1])
            .ok_or_else(|| crate::error::UpnpError::not_found("Service not found"))
    }
}

/// Peer UPnP: côté device et côté control point d'un même processus.
#[derive(Clone)]
pub struct Peer {
    pub(crate) inner: Arc<PeerInner>,
}

impl Peer {
    /// Crée un peer sur un transport SSDP.
    ///
    /// Doit être appelé dans un contexte tokio: la boucle d'événements
    /// du transport est lancée immédiatement.
    pub fn new(config: PeerConfig, ssdp: Arc<dyn SsdpTransport>) -> Self {
        let hostname = config.hostname.unwrap_or_else(default_hostname);
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");
        let (peer_events, _) = broadcast::channel(8);

        let events = ssdp.events();
        let inner = Arc::new(PeerInner {
            prefix: config.prefix,
            hostname,
            port: config.port,
            ssdp,
            http,
            devices: RwLock::new(HashMap::new()),
            remote_devices: RwLock::new(HashMap::new()),
            listeners: Mutex::new(HashMap::new()),
            advertise_task: Mutex::new(None),
            peer_events,
        });

        let loop_inner = Arc::clone(&inner);
        tokio::spawn(async move {
            run_event_loop(loop_inner, events).await;
        });

        Self { inner }
    }

    /// Démarre le transport SSDP.
    pub fn start(&self) {
        self.inner.ssdp.start();
    }

    /// Ferme le peer: arrête les annonces, émet un ByeBye final, puis
    /// ferme le transport après un délai de grâce.
    pub fn close(&self) {
        if let Some(task) = self.inner.advertise_task.lock().unwrap().take() {
            task.abort();
        }
        advertise::notify_all(&self.inner, BYEBYE);

        info!("👋 Peer closing, byebye sent");
        let ssdp = Arc::clone(&self.inner.ssdp);
        tokio::spawn(async move {
            tokio::time::sleep(CLOSE_GRACE).await;
            ssdp.close();
        });
    }

    pub fn prefix(&self) -> &str {
        &self.inner.prefix
    }

    pub fn hostname(&self) -> &str {
        &self.inner.hostname
    }

    pub fn port(&self) -> u16 {
        self.inner.port
    }

    /// Flux des événements de cycle de vie (ready/close).
    pub fn events(&self) -> broadcast::Receiver<PeerEvent> {
        self.inner.peer_events.subscribe()
    }

    /// Router axum servant description, contrôle et événements sous le
    /// préfixe configuré.
    pub fn router(&self) -> axum::Router {
        routes::router(Arc::clone(&self.inner))
    }

    /// Crée un device local. S'il est configuré auto_advertise, un
    /// ALIVE part immédiatement.
    pub fn create_device(&self, config: DeviceConfig) -> Arc<Device> {
        let device = Device::new(&self.inner, config);
        self.inner
            .devices
            .write()
            .unwrap()
            .insert(device.uuid().to_string(), device.clone());
        if device.available() {
            advertise::notify_device(&self.inner, &device, ALIVE);
        }
        device
    }

    /// Retire un device et annonce son départ.
    pub fn remove_device(&self, uuid: &str) {
        let removed = self.inner.devices.write().unwrap().remove(uuid);
        if let Some(device) = removed {
            advertise::notify_device(&self.inner, &device, BYEBYE);
        }
    }

    pub fn device(&self, uuid: &str) -> Option<Arc<Device>> {
        self.inner.devices.read().unwrap().get(uuid).cloned()
    }

    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.inner.devices.read().unwrap().values().cloned().collect()
    }

    pub fn remote_device(&self, udn: &str) -> Option<Arc<RemoteDevice>> {
        self.inner.remote_devices.read().unwrap().get(udn).cloned()
    }

    pub fn remote_devices(&self) -> Vec<Arc<RemoteDevice>> {
        self.inner
            .remote_devices
            .read()
            .unwrap()
            .values()
            .cloned()
            .collect()
    }

    /// S'abonne à un canal de découverte.
    ///
    /// L'enregistrement d'un écouteur sur le joker, le root device ou
    /// une cible `urn:`/`uuid:` déclenche une recherche active avec ce
    /// ST, par construction de l'API (pas d'appel séparé).
    pub fn listen(&self, target: &str) -> mpsc::UnboundedReceiver<DiscoveryEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .listeners
            .lock()
            .unwrap()
            .entry(target.to_string())
            .or_default()
            .push(tx);

        if target == SSDP_ALL
            || target == ROOT_DEVICE
            || target.starts_with("urn:")
            || target.starts_with("uuid:")
        {
            debug!("📤 Searching for {}", target);
            self.inner.ssdp.search(SsdpHeaders::search(target));
        }
        rx
    }
}

/// Première adresse IPv4 non-loopback de la machine.
fn default_hostname() -> String {
    if let Ok(interfaces) = get_if_addrs::get_if_addrs() {
        for iface in interfaces {
            if let std::net::IpAddr::V4(ipv4) = iface.ip() {
                if !ipv4.is_loopback() {
                    return ipv4.to_string();
                }
            }
        }
    }
    "0.0.0.0".to_string()
}

async fn run_event_loop(inner: Arc<PeerInner>, mut events: broadcast::Receiver<SsdpEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => handle_ssdp_event(&inner, event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("SSDP event stream lagged, {} events skipped", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn handle_ssdp_event(inner: &Arc<PeerInner>, event: SsdpEvent) {
    match event {
        SsdpEvent::Ready => {
            info!("✅ SSDP transport ready, starting periodic advertisement");
            advertise::notify_all(inner, ALIVE);

            let interval_inner = Arc::clone(inner);
            let task = tokio::spawn(async move {
                loop {
                    tokio::time::sleep(NOTIFY_INTERVAL).await;
                    advertise::notify_all(&interval_inner, ALIVE);
                }
            });
            if let Some(previous) = inner.advertise_task.lock().unwrap().replace(task) {
                previous.abort();
            }
            let _ = inner.peer_events.send(PeerEvent::Ready);
        }
        SsdpEvent::Close => {
            if let Some(task) = inner.advertise_task.lock().unwrap().take() {
                task.abort();
            }
            info!("✅ SSDP transport closed");
            let _ = inner.peer_events.send(PeerEvent::Close);
        }
        SsdpEvent::Search { headers, from } => {
            if let Some(st) = headers.st {
                advertise::respond(inner, &st, from);
            }
        }
        SsdpEvent::Notify { headers, .. } => {
            let nts = headers.nts.clone();
            match nts.as_deref() {
                Some(ALIVE) => {
                    let target = headers.nt.clone();
                    handle_alive(inner, target, headers);
                }
                Some(BYEBYE) => handle_byebye(inner, &headers),
                other => debug!("Ignoring NOTIFY with NTS {:?}", other),
            }
        }
        SsdpEvent::Found { headers, .. } => {
            let target = headers.st.clone();
            handle_alive(inner, target, headers);
        }
    }
}

/// Annonce alive ou réponse de recherche: crée et lie un RemoteDevice
/// si l'UDN est inconnu et qu'un écouteur est concerné.
fn handle_alive(inner: &Arc<PeerInner>, target: Option<String>, headers: SsdpHeaders) {
    let Some(udn) = headers.udn().map(str::to_string) else {
        return;
    };
    let Some(target) = target else {
        return;
    };

    if inner.remote_devices.read().unwrap().contains_key(&udn) {
        return;
    }
    if !(inner.has_listener(SSDP_ALL) || inner.has_listener(&target)) {
        return;
    }
    let Some(location) = headers.location else {
        return;
    };

    debug!("📥 New device {} announced at {}", udn, location);
    let device = Arc::new(RemoteDevice::new(inner, location, udn.clone()));
    inner
        .remote_devices
        .write()
        .unwrap()
        .insert(udn, device.clone());

    let bind_inner = Arc::clone(inner);
    tokio::spawn(async move {
        match device.bind().await {
            Ok(()) => emit_discovered(&bind_inner, &device, &target),
            Err(e) => warn!("Failed to bind remote device: {}", e),
        }
    });
}

/// Émet les événements de découverte dans l'ordre fixé: services
/// (joker puis type), device sur le joker, type, UDN, et root-device
/// seulement si l'annonce visait le root.
fn emit_discovered(inner: &Arc<PeerInner>, device: &Arc<RemoteDevice>, target: &str) {
    for service in device.services() {
        inner.emit(SSDP_ALL, DiscoveryEvent::Service(service.clone()));
        inner.emit(
            service.service_type(),
            DiscoveryEvent::Service(service.clone()),
        );
    }
    inner.emit(SSDP_ALL, DiscoveryEvent::Device(device.clone()));
    if let Some(device_type) = device.device_type() {
        inner.emit(&device_type, DiscoveryEvent::Device(device.clone()));
    }
    inner.emit(&device.udn(), DiscoveryEvent::Device(device.clone()));
    if target == ROOT_DEVICE {
        inner.emit(ROOT_DEVICE, DiscoveryEvent::Device(device.clone()));
    }
}

/// Byebye: retire l'UDN du cache et signale la disparition, service
/// par service puis device. Un UDN inconnu est un non-événement.
fn handle_byebye(inner: &Arc<PeerInner>, headers: &SsdpHeaders) {
    let Some(udn) = headers.udn() else {
        return;
    };
    let removed = inner.remote_devices.write().unwrap().remove(udn);
    if let Some(device) = removed {
        info!("👋 Device {} disappeared", udn);
        for service in device.services() {
            service.emit_disappear();
        }
        device.emit_disappear();
    }
}
