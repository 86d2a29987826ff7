//! # pmopeer — pair UPnP 1.1
//!
//! Pile UPnP 1.1 complète côté device et côté control point:
//!
//! - annonce de devices locaux (ALIVE/BYEBYE, réponses aux M-SEARCH)
//!   au travers d'un transport SSDP fourni par l'application;
//! - service des documents de description, du contrôle SOAP et des
//!   abonnements GENA via un router axum;
//! - découverte de devices distants, liaison de leurs descriptions et
//!   SCPD, invocation d'actions et abonnement à leurs événements.
//!
//! ## Architecture
//!
//! - [`Peer`] : racine; devices locaux, cache distant, fan-out SSDP
//! - [`devices::Device`] / [`services::Service`] : modèle local
//! - [`remote::RemoteDevice`] / [`remote::RemoteService`] : proxies distants
//! - [`soap`] : codecs SOAP + stub d'invocation
//! - [`gena`] : codec des property sets et en-têtes d'abonnement
//! - [`ssdp`] : contrat du transport de découverte
//!
//! ## Exemple
//!
//! ```ignore
//! use pmopeer::{Peer, PeerConfig, DeviceConfig, ServiceConfig};
//! use pmopeer::services::ActionTable;
//!
//! let peer = Peer::new(PeerConfig::default(), transport);
//! let device = peer.create_device(DeviceConfig {
//!     domain: Some("schemas-upnp-org".into()),
//!     device_type: Some("BinaryLight".into()),
//!     friendly_name: Some("Kitchen light".into()),
//!     auto_advertise: true,
//!     ..Default::default()
//! });
//! let service = device.create_service(ServiceConfig {
//!     service_type: Some("SwitchPower".into()),
//!     implementation: ActionTable::new().action("GetStatus", |service, _inputs| {
//!         let mut outputs = std::collections::HashMap::new();
//!         outputs.insert("ResultStatus".into(), service.get("Status").unwrap_or_default());
//!         Ok(outputs)
//!     }),
//!     ..Default::default()
//! });
//! service.set("Status", "1");
//! service.notify(&[]);
//! ```

mod advertise;
mod routes;
mod xmlutil;

pub mod config;
pub mod devices;
pub mod error;
pub mod gena;
pub mod peer;
pub mod remote;
pub mod services;
pub mod soap;
pub mod ssdp;

pub use crate::config::{
    ActionSchema, ArgumentSchema, DeviceConfig, Direction, IconConfig, PeerConfig, ServiceConfig,
    ServiceDescription, ValueRange, VariableSchema,
};
pub use crate::error::{UpnpError, UpnpErrorKind};
pub use crate::peer::{DiscoveryEvent, Peer, PeerEvent};
