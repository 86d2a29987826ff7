//! Configuration des entités UPnP.
//!
//! Chaque entité (peer, device, service) est créée à partir d'une
//! structure de configuration explicite avec des valeurs par défaut
//! documentées. La description d'un service ([`ServiceDescription`])
//! pilote le rendu de son document SCPD.

use serde::{Deserialize, Serialize};

use crate::services::ActionTable;

/// Configuration d'un [`Peer`](crate::Peer).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
    /// Préfixe des routes HTTP UPnP (ex: "/upnp"). Vide = racine.
    pub prefix: String,

    /// Adresse annoncée dans les URLs de callback GENA.
    /// Par défaut: première adresse IPv4 non-loopback de la machine.
    pub hostname: Option<String>,

    /// Port HTTP annoncé dans LOCATION et les callbacks.
    pub port: u16,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            hostname: None,
            port: 8080,
        }
    }
}

/// Configuration d'un [`Device`](crate::devices::Device).
///
/// `device_type` est le nom court du type (ex: "BinaryLight"); l'URN
/// complet est dérivé de `domain`/`device_type`/`version`, sauf si
/// `device_type_urn` le remplace explicitement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// UUID du device. Généré (v4) si absent.
    pub uuid: Option<String>,

    pub domain: Option<String>,
    pub device_type: Option<String>,

    /// Version du type de device. Par défaut "1".
    pub version: Option<String>,

    /// URN complet, remplaçant la dérivation domain/type/version.
    pub device_type_urn: Option<String>,

    /// Nom et version du produit pour la bannière SERVER.
    pub product_name: Option<String>,
    pub product_version: Option<String>,

    pub friendly_name: Option<String>,
    pub manufacturer: Option<String>,
    pub manufacturer_url: Option<String>,
    pub model_description: Option<String>,
    pub model_name: Option<String>,
    pub model_number: Option<String>,
    pub model_url: Option<String>,
    pub serial_number: Option<String>,
    pub upc: Option<String>,
    pub presentation_url: Option<String>,

    pub icons: Vec<IconConfig>,

    /// Annoncer le device (ALIVE) dès sa création.
    pub auto_advertise: bool,
}

/// Icône listée dans la description d'un device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IconConfig {
    pub mimetype: String,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub url: String,
}

/// Configuration d'un [`Service`](crate::services::Service).
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    /// Domaine de l'URN. Par défaut: celui du device parent.
    pub domain: Option<String>,

    /// Nom court du type de service (ex: "SwitchPower").
    pub service_type: Option<String>,

    /// Version du type de service. Par défaut "1".
    pub version: Option<String>,

    /// serviceId complet, remplaçant la dérivation.
    pub service_id: Option<String>,

    /// URN complet, remplaçant la dérivation domain/type/version.
    pub service_type_urn: Option<String>,

    /// Actions et variables d'état pour le rendu SCPD.
    pub description: Option<ServiceDescription>,

    /// Implémentations des actions, par nom.
    pub implementation: ActionTable,
}

/// Description d'un service: la matière du document SCPD.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceDescription {
    pub actions: Vec<ActionSchema>,
    pub variables: Vec<VariableSchema>,
}

/// Une action déclarée dans le SCPD.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSchema {
    pub name: String,
    #[serde(default)]
    pub arguments: Vec<ArgumentSchema>,
}

/// Un argument d'action, lié à une variable d'état.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgumentSchema {
    pub name: String,
    pub direction: Direction,
    pub related_state_variable: String,
}

/// Direction d'un argument d'action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

/// Une variable d'état déclarée dans le SCPD.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VariableSchema {
    pub name: String,

    /// Type UPnP (ex: "string", "ui4", "boolean").
    pub data_type: String,

    pub default_value: Option<String>,

    /// Attribut sendEvents. Par défaut true.
    pub send_events: bool,

    /// Attribut multicast. Par défaut false.
    pub multicast: bool,

    pub allowed_values: Vec<String>,
    pub allowed_range: Option<ValueRange>,
}

impl Default for VariableSchema {
    fn default() -> Self {
        Self {
            name: String::new(),
            data_type: "string".to_string(),
            default_value: None,
            send_events: true,
            multicast: false,
            allowed_values: Vec::new(),
            allowed_range: None,
        }
    }
}

/// Plage de valeurs autorisées (allowedValueRange).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueRange {
    pub minimum: String,
    pub maximum: String,
    #[serde(default)]
    pub step: Option<String>,
}
