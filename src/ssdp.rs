//! Contrat du transport SSDP.
//!
//! Le cœur ne touche jamais à la socket multicast: il parle à un
//! transport externe au travers du trait [`SsdpTransport`] et consomme
//! ses événements [`SsdpEvent`]. Le transport est responsable de la
//! substitution du placeholder d'adresse dans LOCATION, interface par
//! interface.
//!
//! ## Constantes SSDP
//!
//! - **NTS alive**: `ssdp:alive`
//! - **NTS byebye**: `ssdp:byebye`
//! - **Cible racine**: `upnp:rootdevice`
//! - **Cible joker**: `ssdp:all`

use std::net::SocketAddr;

use tokio::sync::broadcast;

/// Valeur NTS d'une annonce d'arrivée.
pub const ALIVE: &str = "ssdp:alive";

/// Valeur NTS d'une annonce de départ.
pub const BYEBYE: &str = "ssdp:byebye";

/// Cible de recherche/notification du root device.
pub const ROOT_DEVICE: &str = "upnp:rootdevice";

/// Cible joker: tout device, tout service.
pub const SSDP_ALL: &str = "ssdp:all";

/// Placeholder d'adresse substitué par le transport pour chaque
/// interface réseau au moment de l'envoi.
pub const LOCATION_PLACEHOLDER: &str = "{{networkInterfaceAddress}}";

/// En-têtes SSDP lus et écrits par le cœur.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SsdpHeaders {
    pub nt: Option<String>,
    pub nts: Option<String>,
    pub st: Option<String>,
    pub usn: Option<String>,
    pub location: Option<String>,
    pub server: Option<String>,
    pub config_id: Option<u32>,
}

impl SsdpHeaders {
    /// En-têtes d'un M-SEARCH pour une cible donnée.
    pub fn search(st: impl Into<String>) -> Self {
        Self {
            st: Some(st.into()),
            ..Default::default()
        }
    }

    /// UDN = partie de l'USN avant le séparateur `::`.
    pub fn udn(&self) -> Option<&str> {
        self.usn
            .as_deref()
            .and_then(|usn| usn.split("::").next())
            .filter(|udn| !udn.is_empty())
    }
}

/// Événements émis par le transport SSDP.
#[derive(Debug, Clone)]
pub enum SsdpEvent {
    /// Le transport est prêt: les annonces périodiques peuvent démarrer.
    Ready,

    /// Le transport est fermé.
    Close,

    /// NOTIFY multicast reçu (alive ou byebye selon NTS).
    Notify { headers: SsdpHeaders, from: SocketAddr },

    /// M-SEARCH reçu d'un control point.
    Search { headers: SsdpHeaders, from: SocketAddr },

    /// Réponse unicast à l'un de nos M-SEARCH.
    Found { headers: SsdpHeaders, from: SocketAddr },
}

/// Transport SSDP multicast, fourni par l'application.
pub trait SsdpTransport: Send + Sync {
    /// Démarre l'écoute; doit émettre [`SsdpEvent::Ready`].
    fn start(&self);

    /// Ferme la socket; doit émettre [`SsdpEvent::Close`].
    fn close(&self);

    /// Envoie un NOTIFY multicast.
    fn notify(&self, headers: SsdpHeaders);

    /// Répond en unicast à un M-SEARCH.
    fn reply(&self, headers: SsdpHeaders, address: SocketAddr);

    /// Envoie un M-SEARCH multicast.
    fn search(&self, headers: SsdpHeaders);

    /// Flux des événements du transport.
    fn events(&self) -> broadcast::Receiver<SsdpEvent>;
}
