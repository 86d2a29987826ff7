//! Implémentation du Service UPnP local.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::{debug, warn};

use crate::config::{ServiceConfig, ServiceDescription};
use crate::error::UpnpError;
use crate::gena::{NT_EVENT, NTS_PROPCHANGE, render_property_set};
use crate::services::actions::{ActionArgs, ActionTable};
use crate::services::scpd;

/// Un abonné distant aux événements d'un service local.
#[derive(Debug, Clone)]
pub struct Subscription {
    /// URLs de callback, dans l'ordre de l'en-tête CALLBACK.
    pub callbacks: Vec<String>,

    /// Numéro de séquence GENA. Avance d'exactement un par appel à
    /// [`Service::notify`], quel que soit le nombre de callbacks.
    pub seq: u32,
}

/// Service UPnP local.
///
/// L'identité complète d'un service est `{uuid}::{serviceType}`; cette
/// paire est la clé de routage des requêtes de description, contrôle et
/// événement. L'état est un simple dictionnaire nom -> valeur texte,
/// accessible uniquement via [`get`](Self::get)/[`set`](Self::set);
/// `set` ne valide rien et ne notifie rien.
#[derive(Debug)]
pub struct Service {
    service_id: String,
    service_type: String,
    usn: String,
    scpd_url: String,
    control_url: String,
    event_sub_url: String,
    config_id: u32,
    description: Option<ServiceDescription>,
    implementation: ActionTable,
    state: RwLock<HashMap<String, String>>,
    subscriptions: RwLock<HashMap<String, Subscription>>,
    http: reqwest::Client,
}

impl Service {
    pub(crate) fn new(
        device_uuid: &str,
        device_domain: Option<&str>,
        prefix: &str,
        config: ServiceConfig,
        http: reqwest::Client,
    ) -> Self {
        let domain = config
            .domain
            .or_else(|| device_domain.map(str::to_string))
            .unwrap_or_default();
        let short_type = config.service_type.unwrap_or_default();
        let version = config.version.unwrap_or_else(|| "1".to_string());

        let service_id = config
            .service_id
            .unwrap_or_else(|| format!("urn:{domain}:serviceId:{short_type}"));
        let service_type = config
            .service_type_urn
            .unwrap_or_else(|| format!("urn:{domain}:service:{short_type}:{version}"));
        let usn = format!("{device_uuid}::{service_type}");

        Self {
            service_id,
            scpd_url: format!("{prefix}/service/desc.xml?usn={usn}"),
            control_url: format!("{prefix}/service/control?usn={usn}"),
            event_sub_url: format!("{prefix}/service/events?usn={usn}"),
            service_type,
            usn,
            config_id: 1,
            description: config.description,
            implementation: config.implementation,
            state: RwLock::new(HashMap::new()),
            subscriptions: RwLock::new(HashMap::new()),
            http,
        }
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    pub fn service_type(&self) -> &str {
        &self.service_type
    }

    /// `{uuid}::{serviceType}`
    pub fn usn(&self) -> &str {
        &self.usn
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

    pub fn config_id(&self) -> u32 {
        self.config_id
    }

    /// Valeur courante d'une variable d'état.
    pub fn get(&self, name: &str) -> Option<String> {
        self.state.read().unwrap().get(name).cloned()
    }

    /// Écrit une variable d'état. Aucune validation, aucune notification.
    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        self.state
            .write()
            .unwrap()
            .insert(name.into(), value.into());
    }

    /// Instantané de l'état complet.
    pub fn state(&self) -> HashMap<String, String> {
        self.state.read().unwrap().clone()
    }

    /// Notifie les abonnés.
    ///
    /// Sans nom, l'événement porte toutes les variables; sinon
    /// seulement celles demandées. Une livraison NOTIFY part vers
    /// chaque callback de chaque abonnement, puis le compteur de
    /// séquence de l'abonnement avance d'exactement un, que les
    /// livraisons aboutissent ou non.
    pub fn notify(&self, names: &[&str]) {
        let variables: Vec<(String, String)> = {
            let state = self.state.read().unwrap();
            if names.is_empty() {
                state.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
            } else {
                names
                    .iter()
                    .map(|name| {
                        (
                            name.to_string(),
                            state.get(*name).cloned().unwrap_or_default(),
                        )
                    })
                    .collect()
            }
        };

        let xml = render_property_set(&variables);

        let mut subscriptions = self.subscriptions.write().unwrap();
        for (sid, subscription) in subscriptions.iter_mut() {
            for callback in &subscription.callbacks {
                let client = self.http.clone();
                let callback = callback.clone();
                let sid = sid.clone();
                let seq = subscription.seq;
                let body = xml.clone();
                tokio::spawn(async move {
                    let method = reqwest::Method::from_bytes(b"NOTIFY").unwrap();
                    match client
                        .request(method, callback.as_str())
                        .header("Content-Type", r#"text/xml; charset="utf-8""#)
                        .header("NT", NT_EVENT)
                        .header("NTS", NTS_PROPCHANGE)
                        .header("SID", &sid)
                        .header("SEQ", seq.to_string())
                        .body(body)
                        .send()
                        .await
                    {
                        Ok(_) => debug!("✅ Notified subscriber {}", callback),
                        Err(e) => warn!("Failed to notify subscriber {}: {}", callback, e),
                    }
                });
            }
            subscription.seq += 1;
        }
    }

    /// Enregistre un nouvel abonnement et retourne son SID.
    ///
    /// Chaque SUBSCRIBE crée un abonnement neuf; les re-souscriptions ne
    /// sont pas dédupliquées.
    pub fn add_subscription(&self, callbacks: Vec<String>) -> String {
        let sid = format!("uuid:{}", uuid::Uuid::new_v4());
        self.subscriptions
            .write()
            .unwrap()
            .insert(sid.clone(), Subscription { callbacks, seq: 0 });
        sid
    }

    /// Supprime un abonnement. Retourne false s'il était déjà absent.
    pub fn remove_subscription(&self, sid: &str) -> bool {
        self.subscriptions.write().unwrap().remove(sid).is_some()
    }

    pub fn subscription(&self, sid: &str) -> Option<Subscription> {
        self.subscriptions.read().unwrap().get(sid).cloned()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().unwrap().len()
    }

    /// Exécute une implémentation d'action.
    ///
    /// Une action absente de la table ou une implémentation en échec
    /// produisent une erreur de code 501 destinée au Fault SOAP.
    pub fn run_action(&self, name: &str, inputs: &ActionArgs) -> Result<ActionArgs, UpnpError> {
        match self.implementation.get(name) {
            Some(handler) => handler(self, inputs),
            None => Err(UpnpError::action(format!(
                "Action '{name}' is not implemented"
            ))),
        }
    }

    /// Document SCPD du service.
    pub fn scpd_document(&self) -> Result<String, xmltree::Error> {
        let empty = ServiceDescription::default();
        let description = self.description.as_ref().unwrap_or(&empty);
        scpd::scpd_document(description, self.config_id)
    }
}
