//! Fan-out des annonces SSDP et des réponses aux recherches.
//!
//! Pour chaque device disponible, l'engin émet une séquence fixe
//! d'en-têtes: USN root-device, USN du device (UDN), USN du type de
//! device, puis un USN par service. Le placeholder d'adresse de
//! LOCATION est substitué par le transport, interface par interface.

use std::net::SocketAddr;
use std::time::Duration;

use tracing::debug;

use crate::devices::Device;
use crate::peer::PeerInner;
use crate::ssdp::{LOCATION_PLACEHOLDER, ROOT_DEVICE, SSDP_ALL, SsdpHeaders};

/// Période des annonces ALIVE.
pub(crate) const NOTIFY_INTERVAL: Duration = Duration::from_secs(10);

fn device_headers(inner: &PeerInner, device: &Device, nts: Option<&str>) -> SsdpHeaders {
    SsdpHeaders {
        location: Some(format!(
            "http://{}:{}{}",
            LOCATION_PLACEHOLDER,
            inner.port,
            device.description_url()
        )),
        server: Some(device.server().to_string()),
        config_id: Some(device.config_id()),
        nts: nts.map(str::to_string),
        ..Default::default()
    }
}

/// Séquence (NT, USN) annoncée pour un device: root, UDN, type, services.
fn announcement_sets(device: &Device) -> Vec<(String, String)> {
    let udn = device.udn();
    let mut sets = vec![
        (ROOT_DEVICE.to_string(), format!("{udn}::{ROOT_DEVICE}")),
        (udn.to_string(), udn.to_string()),
        (
            device.device_type().to_string(),
            format!("{}::{}", udn, device.device_type()),
        ),
    ];
    for service in device.services() {
        sets.push((
            service.service_type().to_string(),
            format!("{}::{}", udn, service.service_type()),
        ));
    }
    sets
}

/// NOTIFY (alive ou byebye) pour tous les devices du peer.
pub(crate) fn notify_all(inner: &PeerInner, nts: &str) {
    let devices: Vec<_> = inner.devices.read().unwrap().values().cloned().collect();
    for device in devices {
        notify_device(inner, &device, nts);
    }
}

/// NOTIFY (alive ou byebye) pour un device.
pub(crate) fn notify_device(inner: &PeerInner, device: &Device, nts: &str) {
    if !device.available() {
        return;
    }
    let base = device_headers(inner, device, Some(nts));
    for (nt, usn) in announcement_sets(device) {
        let mut headers = base.clone();
        headers.nt = Some(nt);
        headers.usn = Some(usn);
        inner.ssdp.notify(headers);
    }
}

/// Réponse ciblée à un M-SEARCH.
///
/// `ssdp:all` déroule toute la séquence; root-device, UDN et type de
/// device ne répondent que leur propre jeu; sinon seuls les services
/// dont le serviceType égale la cible répondent.
pub(crate) fn respond(inner: &PeerInner, st: &str, address: SocketAddr) {
    let devices: Vec<_> = inner.devices.read().unwrap().values().cloned().collect();
    for device in devices {
        if !device.available() {
            continue;
        }
        let udn = device.udn().to_string();

        let sets: Vec<(String, String)> = if st == SSDP_ALL {
            announcement_sets(&device)
        } else if st == ROOT_DEVICE {
            vec![(ROOT_DEVICE.to_string(), format!("{udn}::{ROOT_DEVICE}"))]
        } else if st == udn {
            vec![(st.to_string(), udn.clone())]
        } else if st == device.device_type() {
            vec![(st.to_string(), format!("{}::{}", udn, device.device_type()))]
        } else {
            device
                .services()
                .iter()
                .filter(|service| service.service_type() == st)
                .map(|service| {
                    (
                        st.to_string(),
                        format!("{}::{}", udn, service.service_type()),
                    )
                })
                .collect()
        };

        if sets.is_empty() {
            continue;
        }
        debug!("📡 Responding to M-SEARCH ST={} from {}", st, address);

        let base = device_headers(inner, &device, None);
        for (target, usn) in sets {
            let mut headers = base.clone();
            headers.st = Some(target);
            headers.usn = Some(usn);
            inner.ssdp.reply(headers, address);
        }
    }
}
