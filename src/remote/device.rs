//! Proxy d'un device distant découvert.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

use tokio::sync::broadcast;
use tracing::{debug, warn};
use url::Url;
use xmltree::Element;

use crate::error::UpnpError;
use crate::peer::PeerInner;
use crate::remote::service::RemoteService;
use crate::remote::fetch_bytes;
use crate::xmlutil::{child_text, xml_children};

/// Métadonnées lues dans la description d'un device distant.
#[derive(Debug, Clone, Default)]
pub struct RemoteDeviceMeta {
    pub device_type: Option<String>,
    pub friendly_name: Option<String>,
    pub manufacturer: Option<String>,
    pub manufacturer_url: Option<String>,
    pub model_description: Option<String>,
    pub model_name: Option<String>,
    pub model_number: Option<String>,
    pub model_url: Option<String>,
    pub serial_number: Option<String>,
    pub upc: Option<String>,
    pub icons: Vec<RemoteIcon>,
}

/// Icône d'un device distant, URL résolue en absolu.
#[derive(Debug, Clone, Default)]
pub struct RemoteIcon {
    pub mimetype: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
    pub depth: Option<String>,
    pub url: String,
}

/// Device distant, créé à la découverte et peuplé par [`bind`](Self::bind).
#[derive(Debug)]
pub struct RemoteDevice {
    peer: Weak<PeerInner>,
    description_url: String,
    udn: RwLock<String>,
    meta: RwLock<RemoteDeviceMeta>,

    /// Services du device (serviceType -> RemoteService)
    services: RwLock<HashMap<String, Arc<RemoteService>>>,

    disappear: broadcast::Sender<()>,
}

impl RemoteDevice {
    pub(crate) fn new(peer: &Arc<PeerInner>, description_url: String, udn: String) -> Self {
        let (disappear, _) = broadcast::channel(4);
        Self {
            peer: Arc::downgrade(peer),
            description_url,
            udn: RwLock::new(udn),
            meta: RwLock::new(RemoteDeviceMeta::default()),
            services: RwLock::new(HashMap::new()),
            disappear,
        }
    }

    pub fn udn(&self) -> String {
        self.udn.read().unwrap().clone()
    }

    pub fn description_url(&self) -> &str {
        &self.description_url
    }

    pub fn meta(&self) -> RemoteDeviceMeta {
        self.meta.read().unwrap().clone()
    }

    pub fn device_type(&self) -> Option<String> {
        self.meta.read().unwrap().device_type.clone()
    }

    pub fn services(&self) -> Vec<Arc<RemoteService>> {
        self.services.read().unwrap().values().cloned().collect()
    }

    pub fn get_service(&self, service_type: &str) -> Option<Arc<RemoteService>> {
        self.services.read().unwrap().get(service_type).cloned()
    }

    /// Flux notifié quand le device émet un byebye.
    pub fn on_disappear(&self) -> broadcast::Receiver<()> {
        self.disappear.subscribe()
    }

    pub(crate) fn emit_disappear(&self) {
        let _ = self.disappear.send(());
    }

    /// Résout une URL relative contre l'URL de description.
    fn resolve(&self, relative: &str) -> String {
        Url::parse(&self.description_url)
            .ok()
            .and_then(|base| base.join(relative).ok())
            .map(|url| url.to_string())
            .unwrap_or_else(|| relative.to_string())
    }

    /// Va chercher la description du device et peuple le proxy.
    ///
    /// Parse les métadonnées, la liste d'icônes et la liste de
    /// services; toutes les sous-URLs sont résolues contre l'URL de
    /// description.
    pub async fn bind(&self) -> Result<(), UpnpError> {
        let peer = self
            .peer
            .upgrade()
            .ok_or_else(|| UpnpError::transport("peer is closed"))?;

        debug!("📥 Fetching device description at {}", self.description_url);
        let bytes = fetch_bytes(&peer.http, &self.description_url).await?;

        let root = Element::parse(bytes.as_slice()).map_err(|e| {
            UpnpError::invalid_xml(format!("Description is not a valid XML message: {e}"))
        })?;
        let device_elem = root
            .get_child("device")
            .ok_or_else(|| UpnpError::protocol(0, "Description has no device element"))?;

        let mut meta = RemoteDeviceMeta {
            device_type: child_text(device_elem, "deviceType"),
            friendly_name: child_text(device_elem, "friendlyName"),
            manufacturer: child_text(device_elem, "manufacturer"),
            manufacturer_url: child_text(device_elem, "manufacturerURL"),
            model_description: child_text(device_elem, "modelDescription"),
            model_name: child_text(device_elem, "modelName"),
            model_number: child_text(device_elem, "modelNumber"),
            model_url: child_text(device_elem, "modelURL"),
            serial_number: child_text(device_elem, "serialNumber"),
            upc: child_text(device_elem, "UPC"),
            icons: Vec::new(),
        };

        if let Some(icon_list) = device_elem.get_child("iconList") {
            for icon in xml_children(icon_list).filter(|e| e.name == "icon") {
                let Some(url) = child_text(icon, "url") else {
                    continue;
                };
                meta.icons.push(RemoteIcon {
                    mimetype: child_text(icon, "mimetype"),
                    width: child_text(icon, "width"),
                    height: child_text(icon, "height"),
                    depth: child_text(icon, "depth"),
                    url: self.resolve(&url),
                });
            }
        }

        if let Some(udn) = child_text(device_elem, "UDN") {
            *self.udn.write().unwrap() = udn;
        }

        let udn = self.udn();
        let mut services = HashMap::new();
        if let Some(service_list) = device_elem.get_child("serviceList") {
            for entry in xml_children(service_list).filter(|e| e.name == "service") {
                let Some(service_type) = child_text(entry, "serviceType") else {
                    warn!("Service entry without serviceType in {}", self.description_url);
                    continue;
                };
                let service = RemoteService::new(
                    &peer,
                    udn.clone(),
                    service_type.clone(),
                    child_text(entry, "serviceId"),
                    self.resolve(&child_text(entry, "SCPDURL").unwrap_or_default()),
                    self.resolve(&child_text(entry, "controlURL").unwrap_or_default()),
                    self.resolve(&child_text(entry, "eventSubURL").unwrap_or_default()),
                );
                services.insert(service_type, service);
            }
        }

        *self.meta.write().unwrap() = meta;
        *self.services.write().unwrap() = services;

        debug!(
            "✅ Bound remote device {} ({} services)",
            udn,
            self.services.read().unwrap().len()
        );
        Ok(())
    }
}
