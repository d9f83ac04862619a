//! Live port enumeration.

use crate::backend::{MidiBackend, PortDescriptor, PortDirection};
use crate::error::Result;
use std::sync::Arc;

/// Snapshot access to the device list for one direction.
///
/// Every call re-queries the backend; indices are only meaningful within
/// the snapshot they came from.
#[derive(Clone)]
pub struct PortCatalog {
    backend: Arc<dyn MidiBackend>,
}

impl PortCatalog {
    pub fn new(backend: Arc<dyn MidiBackend>) -> Self {
        Self { backend }
    }

    /// Index-ordered descriptors reflecting the device list at call time.
    pub fn enumerate(&self, direction: PortDirection) -> Result<Vec<PortDescriptor>> {
        self.backend.enumerate(direction)
    }

    /// Names only, for UI listing.
    pub fn names(&self, direction: PortDirection) -> Result<Vec<String>> {
        Ok(self
            .enumerate(direction)?
            .into_iter()
            .map(|p| p.name)
            .collect())
    }
}

impl std::fmt::Debug for PortCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortCatalog").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;

    #[test]
    fn test_enumerate_is_index_ordered() {
        let backend = MockBackend::new();
        backend.set_ports(PortDirection::Input, &["Keyboard", "Pads", "Synth 1"]);

        let catalog = PortCatalog::new(backend);
        let ports = catalog.enumerate(PortDirection::Input).unwrap();
        assert_eq!(ports.len(), 3);
        for (i, port) in ports.iter().enumerate() {
            assert_eq!(port.index, i);
        }
        assert_eq!(ports[2].name, "Synth 1");
    }

    #[test]
    fn test_enumerate_observes_hotplug() {
        let backend = MockBackend::new();
        let catalog = PortCatalog::new(backend.clone());

        assert!(catalog.enumerate(PortDirection::Output).unwrap().is_empty());

        backend.set_ports(PortDirection::Output, &["Synth 1"]);
        let ports = catalog.enumerate(PortDirection::Output).unwrap();
        assert_eq!(ports.len(), 1);
    }

    #[test]
    fn test_names() {
        let backend = MockBackend::new();
        backend.set_ports(PortDirection::Input, &["A", "B"]);

        let catalog = PortCatalog::new(backend);
        assert_eq!(
            catalog.names(PortDirection::Input).unwrap(),
            vec!["A".to_string(), "B".to_string()]
        );
    }
}
