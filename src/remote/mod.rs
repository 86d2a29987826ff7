//! Proxies des devices et services distants.
//!
//! Un [`RemoteDevice`] est créé à la première annonce SSDP d'un UDN
//! inconnu, puis peuplé en allant chercher son document de description.
//! Chaque entrée de la serviceList devient un [`RemoteService`], qui
//! sait résoudre ses actions (SCPD), les invoquer (SOAP) et s'abonner à
//! ses événements (GENA).

mod device;
mod service;

pub use device::{RemoteDevice, RemoteDeviceMeta, RemoteIcon};
pub use service::{
    AllowedRange, EventStream, RemoteService, RemoteServiceEvent, ServiceProxy, StateVariableInfo,
};

use crate::error::UpnpError;

/// GET un document; statut >= 400 compte comme erreur de transport.
pub(crate) async fn fetch_bytes(
    client: &reqwest::Client,
    url: &str,
) -> Result<Vec<u8>, UpnpError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| UpnpError::transport(format!("HTTP request error: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(UpnpError::transport(format!("HTTP {status} fetching {url}")));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| UpnpError::transport(format!("HTTP request error: {e}")))?;

    Ok(bytes.to_vec())
}
