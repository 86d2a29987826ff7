//! Devices UPnP locaux.
//!
//! Un [`Device`] est créé par son [`Peer`](crate::Peer), possède ses
//! services, et devient visible sur le réseau quand il est disponible
//! (annonce ALIVE immédiate puis périodique).

mod device;

pub use device::Device;
