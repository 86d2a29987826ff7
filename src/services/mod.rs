//! Services UPnP locaux.
//!
//! Un [`Service`] appartient à un [`Device`](crate::devices::Device):
//! il porte l'état (variables), la table d'implémentation des actions,
//! et les abonnements GENA de ses souscripteurs distants.

mod actions;
mod scpd;
mod service;

pub use actions::{ActionArgs, ActionHandler, ActionTable};
pub use service::{Service, Subscription};
