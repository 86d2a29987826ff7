//! Définition du Device UPnP local.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};

use tracing::info;
use xmltree::Element;

use crate::advertise;
use crate::config::{DeviceConfig, IconConfig, ServiceConfig};
use crate::peer::PeerInner;
use crate::services::Service;
use crate::ssdp::ALIVE;
use crate::xmlutil::{emit_document, push_child, text_element};

const DEVICE_NS: &str = "urn:schemas-upnp-org:device-1-0";
const UPNP_VERSION: &str = "UPnP/1.1";

/// Device UPnP local.
///
/// L'UUID est immuable après création. L'URN de type est dérivé de
/// domain/type/version sauf remplacement explicite.
#[derive(Debug)]
pub struct Device {
    peer: Weak<PeerInner>,
    prefix: String,
    http: reqwest::Client,

    uuid: String,
    udn: String,
    domain: Option<String>,
    device_type: String,
    server: String,
    description_url: String,
    config_id: u32,

    friendly_name: Option<String>,
    manufacturer: Option<String>,
    manufacturer_url: Option<String>,
    model_description: Option<String>,
    model_name: Option<String>,
    model_number: Option<String>,
    model_url: Option<String>,
    serial_number: Option<String>,
    upc: Option<String>,
    presentation_url: Option<String>,
    icons: Vec<IconConfig>,

    available: AtomicBool,

    /// Services du device (serviceType -> Service)
    services: RwLock<HashMap<String, Arc<Service>>>,

    /// Sous-devices (embedded devices)
    devices: RwLock<HashMap<String, Arc<Device>>>,
}

impl Device {
    pub(crate) fn new(peer: &Arc<PeerInner>, config: DeviceConfig) -> Arc<Self> {
        let uuid = config
            .uuid
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let version = config.version.unwrap_or_else(|| "1".to_string());
        let device_type = config.device_type_urn.unwrap_or_else(|| {
            format!(
                "urn:{}:device:{}:{}",
                config.domain.as_deref().unwrap_or(""),
                config.device_type.as_deref().unwrap_or(""),
                version
            )
        });
        let product_name = config.product_name.unwrap_or_else(|| "unknown".to_string());
        let product_version = config.product_version.unwrap_or_else(|| "0.0".to_string());
        let server = format!(
            "{}/{} {} {}/{}",
            std::env::consts::OS,
            std::env::consts::ARCH,
            UPNP_VERSION,
            product_name,
            product_version
        );

        Arc::new(Self {
            peer: Arc::downgrade(peer),
            prefix: peer.prefix.clone(),
            http: peer.http.clone(),
            udn: format!("uuid:{uuid}"),
            description_url: format!("{}/device/desc.xml?udn={}", peer.prefix, uuid),
            uuid,
            domain: config.domain,
            device_type,
            server,
            config_id: 1,
            friendly_name: config.friendly_name,
            manufacturer: config.manufacturer,
            manufacturer_url: config.manufacturer_url,
            model_description: config.model_description,
            model_name: config.model_name,
            model_number: config.model_number,
            model_url: config.model_url,
            serial_number: config.serial_number,
            upc: config.upc,
            presentation_url: config.presentation_url,
            icons: config.icons,
            available: AtomicBool::new(config.auto_advertise),
            services: RwLock::new(HashMap::new()),
            devices: RwLock::new(HashMap::new()),
        })
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// `uuid:{uuid}`
    pub fn udn(&self) -> &str {
        &self.udn
    }

    /// URN complet du type de device.
    pub fn device_type(&self) -> &str {
        &self.device_type
    }

    /// Bannière SERVER des annonces et réponses.
    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn description_url(&self) -> &str {
        &self.description_url
    }

    pub fn config_id(&self) -> u32 {
        self.config_id
    }

    pub fn friendly_name(&self) -> Option<&str> {
        self.friendly_name.as_deref()
    }

    pub fn available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Rend le device disponible et annonce un ALIVE immédiat.
    pub fn advertise(&self) {
        self.available.store(true, Ordering::SeqCst);
        if let Some(peer) = self.peer.upgrade() {
            info!("📡 Advertising device {} ({})", self.udn, self.device_type);
            advertise::notify_device(&peer, self, ALIVE);
        }
    }

    /// Crée un service et l'enregistre sous son serviceType.
    pub fn create_service(&self, config: ServiceConfig) -> Arc<Service> {
        let service = Arc::new(Service::new(
            &self.uuid,
            self.domain.as_deref(),
            &self.prefix,
            config,
            self.http.clone(),
        ));
        self.services
            .write()
            .unwrap()
            .insert(service.service_type().to_string(), service.clone());
        service
    }

    /// Retire un service. Le retrait n'est pas annoncé en ByeBye.
    pub fn remove_service(&self, service_type: &str) {
        self.services.write().unwrap().remove(service_type);
    }

    pub fn services(&self) -> Vec<Arc<Service>> {
        self.services.read().unwrap().values().cloned().collect()
    }

    pub fn get_service(&self, service_type: &str) -> Option<Arc<Service>> {
        self.services.read().unwrap().get(service_type).cloned()
    }

    /// Ajoute un sous-device (embedded device).
    pub fn add_device(&self, device: Arc<Device>) {
        self.devices
            .write()
            .unwrap()
            .insert(device.uuid().to_string(), device);
    }

    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.devices.read().unwrap().values().cloned().collect()
    }

    /// Élément `<device>` de la description.
    fn device_element(&self) -> Element {
        let mut elem = Element::new("device");

        push_child(&mut elem, text_element("deviceType", self.device_type.clone()));
        if let Some(name) = &self.friendly_name {
            push_child(&mut elem, text_element("friendlyName", name.clone()));
        }
        if let Some(manufacturer) = &self.manufacturer {
            push_child(&mut elem, text_element("manufacturer", manufacturer.clone()));
        }
        if let Some(url) = &self.manufacturer_url {
            push_child(&mut elem, text_element("manufacturerURL", url.clone()));
        }
        if let Some(description) = &self.model_description {
            push_child(&mut elem, text_element("modelDescription", description.clone()));
        }
        if let Some(name) = &self.model_name {
            push_child(&mut elem, text_element("modelName", name.clone()));
        }
        if let Some(number) = &self.model_number {
            push_child(&mut elem, text_element("modelNumber", number.clone()));
        }
        if let Some(url) = &self.model_url {
            push_child(&mut elem, text_element("modelURL", url.clone()));
        }
        if let Some(serial) = &self.serial_number {
            push_child(&mut elem, text_element("serialNumber", serial.clone()));
        }
        push_child(&mut elem, text_element("UDN", self.udn.clone()));
        if let Some(upc) = &self.upc {
            push_child(&mut elem, text_element("UPC", upc.clone()));
        }

        if !self.icons.is_empty() {
            let mut icon_list = Element::new("iconList");
            for icon in &self.icons {
                let mut icon_elem = Element::new("icon");
                push_child(&mut icon_elem, text_element("mimetype", icon.mimetype.clone()));
                push_child(&mut icon_elem, text_element("width", icon.width.to_string()));
                push_child(&mut icon_elem, text_element("height", icon.height.to_string()));
                push_child(&mut icon_elem, text_element("depth", icon.depth.to_string()));
                push_child(&mut icon_elem, text_element("url", icon.url.clone()));
                push_child(&mut icon_list, icon_elem);
            }
            push_child(&mut elem, icon_list);
        }

        let services = self.services.read().unwrap();
        if !services.is_empty() {
            let mut service_list = Element::new("serviceList");
            for service in services.values() {
                let mut service_elem = Element::new("service");
                push_child(
                    &mut service_elem,
                    text_element("serviceType", service.service_type()),
                );
                push_child(&mut service_elem, text_element("serviceId", service.service_id()));
                push_child(&mut service_elem, text_element("SCPDURL", service.scpd_url()));
                push_child(&mut service_elem, text_element("controlURL", service.control_url()));
                push_child(&mut service_elem, text_element("eventSubURL", service.event_sub_url()));
                push_child(&mut service_list, service_elem);
            }
            push_child(&mut elem, service_list);
        }

        let devices = self.devices.read().unwrap();
        if !devices.is_empty() {
            let mut device_list = Element::new("deviceList");
            for device in devices.values() {
                push_child(&mut device_list, device.device_element());
            }
            push_child(&mut elem, device_list);
        }

        if let Some(url) = &self.presentation_url {
            push_child(&mut elem, text_element("presentationURL", url.clone()));
        }

        elem
    }

    /// Document de description complet du device.
    pub fn description_document(&self) -> Result<String, xmltree::Error> {
        let mut root = Element::new("root");
        root.attributes
            .insert("xmlns".to_string(), DEVICE_NS.to_string());
        root.attributes
            .insert("configId".to_string(), self.config_id.to_string());

        let mut spec = Element::new("specVersion");
        push_child(&mut spec, text_element("major", "1"));
        push_child(&mut spec, text_element("minor", "1"));
        push_child(&mut root, spec);

        push_child(&mut root, self.device_element());

        emit_document(&root)
    }
}
