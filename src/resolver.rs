//! Name-to-index resolution.
//!
//! OS MIDI enumeration renumbers devices and changes trailing numeric
//! suffixes between replugs ("Synth 1" coming back as "Synth 3"). Exact
//! match wins when names are stable; the suffix-stripped fallback restores
//! connectivity after renumbering without false-matching unrelated devices,
//! since the stripped comparison is still full-string equality.

use crate::backend::{PortDescriptor, PortDirection};
use crate::catalog::PortCatalog;
use crate::error::Result;

/// Drop one trailing `" <digits>"` group, if present.
pub fn strip_numeric_suffix(name: &str) -> &str {
    match name.rfind(' ') {
        Some(pos) => {
            let suffix = &name[pos + 1..];
            if !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) {
                &name[..pos]
            } else {
                name
            }
        }
        None => name,
    }
}

/// Resolve against an already-enumerated snapshot. First match wins:
/// exact name first, then suffix-stripped equality. `None` means "still
/// disconnected", never an error.
pub fn resolve_in<'a>(ports: &'a [PortDescriptor], desired: &str) -> Option<&'a PortDescriptor> {
    if let Some(port) = ports.iter().find(|p| p.name == desired) {
        return Some(port);
    }
    let stripped = strip_numeric_suffix(desired);
    ports
        .iter()
        .find(|p| strip_numeric_suffix(&p.name) == stripped)
}

/// One-shot resolution over a fresh catalog snapshot.
#[derive(Debug, Clone)]
pub struct PortResolver {
    catalog: PortCatalog,
}

impl PortResolver {
    pub fn new(catalog: PortCatalog) -> Self {
        Self { catalog }
    }

    pub fn resolve(
        &self,
        direction: PortDirection,
        desired: &str,
    ) -> Result<Option<PortDescriptor>> {
        let ports = self.catalog.enumerate(direction)?;
        Ok(resolve_in(&ports, desired).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;

    fn snapshot(names: &[&str]) -> Vec<PortDescriptor> {
        names
            .iter()
            .enumerate()
            .map(|(index, name)| PortDescriptor {
                index,
                name: name.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_exact_match_takes_precedence() {
        let ports = snapshot(&["Synth 1", "Synth 2"]);
        let hit = resolve_in(&ports, "Synth 1").unwrap();
        assert_eq!(hit.index, 0);

        // Exact match on the second entry must not fall through to the
        // suffix fallback (which would return index 0)
        let hit = resolve_in(&ports, "Synth 2").unwrap();
        assert_eq!(hit.index, 1);
    }

    #[test]
    fn test_suffix_fallback_after_renumber() {
        let ports = snapshot(&["Synth 3"]);
        let hit = resolve_in(&ports, "Synth 1").unwrap();
        assert_eq!(hit.index, 0);
        assert_eq!(hit.name, "Synth 3");
    }

    #[test]
    fn test_no_match_is_none() {
        let ports = snapshot(&["Other Device"]);
        assert!(resolve_in(&ports, "Synth 1").is_none());
    }

    #[test]
    fn test_stripped_comparison_is_full_equality() {
        // "Synth" is a prefix of "Synthesizer 2" but not equal after
        // stripping, so it must not match
        let ports = snapshot(&["Synthesizer 2"]);
        assert!(resolve_in(&ports, "Synth 1").is_none());
    }

    #[test]
    fn test_first_fallback_match_wins() {
        let ports = snapshot(&["Synth 4", "Synth 9"]);
        let hit = resolve_in(&ports, "Synth 1").unwrap();
        assert_eq!(hit.index, 0);
    }

    #[test]
    fn test_strip_numeric_suffix() {
        assert_eq!(strip_numeric_suffix("Synth 1"), "Synth");
        assert_eq!(strip_numeric_suffix("Synth 123"), "Synth");
        assert_eq!(strip_numeric_suffix("Synth"), "Synth");
        assert_eq!(strip_numeric_suffix("Synth X1"), "Synth X1");
        assert_eq!(strip_numeric_suffix("Port 2 3"), "Port 2");
        assert_eq!(strip_numeric_suffix("Synth "), "Synth ");
        assert_eq!(strip_numeric_suffix(""), "");
    }

    #[test]
    fn test_resolver_over_catalog() {
        let backend = MockBackend::new();
        backend.set_ports(PortDirection::Input, &["Keyboard 2"]);

        let resolver = PortResolver::new(PortCatalog::new(backend));
        let hit = resolver
            .resolve(PortDirection::Input, "Keyboard 1")
            .unwrap()
            .unwrap();
        assert_eq!(hit.name, "Keyboard 2");

        assert!(resolver
            .resolve(PortDirection::Output, "Keyboard 1")
            .unwrap()
            .is_none());
    }
}
