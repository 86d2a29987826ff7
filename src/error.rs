//! Erreurs UPnP communes.
//!
//! Toutes les erreurs visibles de l'API portent une catégorie, un code
//! UPnP numérique et un message. Le code vaut 0 quand aucun code n'est
//! connu; une action qui échoue est rapportée avec le code 501
//! (Action Failed).

use thiserror::Error;

/// Catégorie d'une erreur UPnP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpnpErrorKind {
    /// Échec du transport HTTP sortant (connexion, timeout)
    Transport,

    /// Document XML illisible
    InvalidXml,

    /// XML bien formé mais message UPnP/SOAP invalide, ou Fault UPnP
    Protocol,

    /// Une implémentation d'action a échoué
    Action,

    /// Device, service ou action introuvable
    NotFound,

    /// Requête malformée (paramètre usn/udn manquant ou invalide)
    BadRequest,
}

/// Erreur UPnP étiquetée.
#[derive(Debug, Clone, Error)]
#[error("{kind:?} ({code}): {message}")]
pub struct UpnpError {
    pub kind: UpnpErrorKind,
    pub code: u32,
    pub message: String,
}

impl UpnpError {
    pub fn new(kind: UpnpErrorKind, code: u32, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(UpnpErrorKind::Transport, 0, message)
    }

    pub fn invalid_xml(message: impl Into<String>) -> Self {
        Self::new(UpnpErrorKind::InvalidXml, 0, message)
    }

    pub fn protocol(code: u32, message: impl Into<String>) -> Self {
        Self::new(UpnpErrorKind::Protocol, code, message)
    }

    /// Échec d'une implémentation d'action, code UPnP 501.
    pub fn action(message: impl Into<String>) -> Self {
        Self::new(UpnpErrorKind::Action, 501, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(UpnpErrorKind::NotFound, 0, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(UpnpErrorKind::BadRequest, 0, message)
    }
}
