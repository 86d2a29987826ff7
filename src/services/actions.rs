//! Table d'implémentation des actions d'un service.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::UpnpError;
use crate::services::Service;

/// Arguments d'entrée ou de sortie d'une action, par nom.
pub type ActionArgs = HashMap<String, String>;

/// Implémentation d'une action. Reçoit le service (pour `get`/`set`)
/// et les arguments décodés; retourne les arguments de sortie ou une
/// erreur qui sera rapportée en Fault UPnP 501.
pub type ActionHandler =
    Arc<dyn Fn(&Service, &ActionArgs) -> Result<ActionArgs, UpnpError> + Send + Sync>;

/// Table nom -> implémentation, fournie à la création du service.
#[derive(Clone, Default)]
pub struct ActionTable {
    handlers: HashMap<String, ActionHandler>,
}

impl ActionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ajoute une action, style builder.
    pub fn action<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Service, &ActionArgs) -> Result<ActionArgs, UpnpError> + Send + Sync + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn get(&self, name: &str) -> Option<ActionHandler> {
        self.handlers.get(name).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }
}

impl fmt::Debug for ActionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("ActionTable").field("actions", &names).finish()
    }
}
