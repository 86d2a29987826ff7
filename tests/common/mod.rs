//! Outils partagés des tests d'intégration.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use tokio::sync::broadcast;

use pmopeer::services::ActionTable;
use pmopeer::ssdp::{SsdpEvent, SsdpHeaders, SsdpTransport};
use pmopeer::{
    ActionSchema, ArgumentSchema, DeviceConfig, Direction, ServiceConfig, ServiceDescription,
    UpnpError, VariableSchema,
};

static TRACING: Once = Once::new();

/// Initialise les logs des tests (RUST_LOG pour le filtre).
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Transport SSDP en mémoire: capture tout ce que le peer envoie et
/// permet d'injecter des événements réseau.
pub struct FakeSsdp {
    events: broadcast::Sender<SsdpEvent>,
    pub notifies: Mutex<Vec<SsdpHeaders>>,
    pub replies: Mutex<Vec<(SsdpHeaders, SocketAddr)>>,
    pub searches: Mutex<Vec<SsdpHeaders>>,
    pub started: AtomicBool,
    pub closed: AtomicBool,
}

impl FakeSsdp {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            events,
            notifies: Mutex::new(Vec::new()),
            replies: Mutex::new(Vec::new()),
            searches: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    /// Injecte un événement comme s'il venait du réseau.
    pub fn push(&self, event: SsdpEvent) {
        let _ = self.events.send(event);
    }

    pub fn notified_nts(&self) -> Vec<String> {
        self.notifies
            .lock()
            .unwrap()
            .iter()
            .filter_map(|h| h.nt.clone())
            .collect()
    }
}

impl SsdpTransport for FakeSsdp {
    fn start(&self) {
        self.started.store(true, Ordering::SeqCst);
        let _ = self.events.send(SsdpEvent::Ready);
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let _ = self.events.send(SsdpEvent::Close);
    }

    fn notify(&self, headers: SsdpHeaders) {
        self.notifies.lock().unwrap().push(headers);
    }

    fn reply(&self, headers: SsdpHeaders, address: SocketAddr) {
        self.replies.lock().unwrap().push((headers, address));
    }

    fn search(&self, headers: SsdpHeaders) {
        self.searches.lock().unwrap().push(headers);
    }

    fn events(&self) -> broadcast::Receiver<SsdpEvent> {
        self.events.subscribe()
    }
}

/// Attend qu'une condition devienne vraie (1 s max).
pub async fn wait_until<F: Fn() -> bool>(cond: F) -> bool {
    for _ in 0..50 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    cond()
}

pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

pub const SWITCH_POWER_TYPE: &str = "urn:schemas-upnp-org:service:SwitchPower:1";
pub const BINARY_LIGHT_TYPE: &str = "urn:schemas-upnp-org:device:BinaryLight:1";

/// Configuration d'un BinaryLight de test.
pub fn binary_light_config(auto_advertise: bool) -> DeviceConfig {
    DeviceConfig {
        domain: Some("schemas-upnp-org".to_string()),
        device_type: Some("BinaryLight".to_string()),
        friendly_name: Some("Test light".to_string()),
        manufacturer: Some("pmopeer".to_string()),
        model_name: Some("BinaryLight-1".to_string()),
        auto_advertise,
        ..Default::default()
    }
}

/// Configuration d'un SwitchPower avec GetStatus/SetTarget et une
/// action Boom qui échoue toujours.
pub fn switch_power_config() -> ServiceConfig {
    let implementation = ActionTable::new()
        .action("GetStatus", |service, _inputs| {
            let mut outputs = HashMap::new();
            outputs.insert(
                "ResultStatus".to_string(),
                service.get("Status").unwrap_or_default(),
            );
            Ok(outputs)
        })
        .action("SetTarget", |service, inputs| {
            let target = inputs.get("NewTargetValue").cloned().unwrap_or_default();
            service.set("Target", target.clone());
            service.set("Status", target);
            Ok(HashMap::new())
        })
        .action("Boom", |_service, _inputs| Err(UpnpError::action("boom")));

    ServiceConfig {
        service_type: Some("SwitchPower".to_string()),
        description: Some(ServiceDescription {
            actions: vec![
                ActionSchema {
                    name: "GetStatus".to_string(),
                    arguments: vec![ArgumentSchema {
                        name: "ResultStatus".to_string(),
                        direction: Direction::Out,
                        related_state_variable: "Status".to_string(),
                    }],
                },
                ActionSchema {
                    name: "SetTarget".to_string(),
                    arguments: vec![ArgumentSchema {
                        name: "NewTargetValue".to_string(),
                        direction: Direction::In,
                        related_state_variable: "Target".to_string(),
                    }],
                },
            ],
            variables: vec![
                VariableSchema {
                    name: "Status".to_string(),
                    data_type: "boolean".to_string(),
                    default_value: Some("0".to_string()),
                    ..Default::default()
                },
                VariableSchema {
                    name: "Target".to_string(),
                    data_type: "boolean".to_string(),
                    send_events: false,
                    ..Default::default()
                },
            ],
        }),
        implementation,
        ..Default::default()
    }
}
