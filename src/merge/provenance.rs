//! Provenance tracking for merged values.

use std::collections::BTreeMap;

use crate::loader::Origin;
use crate::tree::KeyPath;

/// Which origin supplied each value, and which origins lost.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Provenance {
    /// Leaf path → origin whose value survived.
    winner: BTreeMap<KeyPath, Origin>,
    /// Path → origins whose value at that path was discarded, in fold order.
    shadowed: BTreeMap<KeyPath, Vec<Origin>>,
}

impl Provenance {
    pub(crate) fn set_winner(&mut self, path: KeyPath, origin: Origin) {
        self.winner.insert(path, origin);
    }

    pub(crate) fn add_shadowed(&mut self, path: KeyPath, origin: Origin) {
        let losers = self.shadowed.entry(path).or_default();
        if !losers.contains(&origin) {
            losers.push(origin);
        }
    }

    /// Origin of the value at `path`, or of its nearest recorded ancestor.
    pub fn origin_of(&self, path: &KeyPath) -> Option<&Origin> {
        let mut prefixes: Vec<KeyPath> = path.prefixes().collect();
        prefixes.reverse();
        prefixes.iter().find_map(|prefix| self.winner.get(prefix))
    }

    /// Origins shadowed at `path` or anywhere below it.
    pub fn shadowed_under(&self, path: &KeyPath) -> Vec<(&KeyPath, &Origin)> {
        self.shadowed
            .iter()
            .filter(|(key, _)| key.starts_with(path) || path.starts_with(key))
            .flat_map(|(key, origins)| origins.iter().map(move |o| (key, o)))
            .collect()
    }

    /// Origins whose value exactly at `path` was discarded.
    pub fn shadowed(&self, path: &KeyPath) -> &[Origin] {
        self.shadowed.get(path).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::SourceKind;

    #[test]
    fn test_origin_of_uses_nearest_ancestor() {
        let mut provenance = Provenance::default();
        let origin = Origin::new(SourceKind::File, "base.toml");
        provenance.set_winner(KeyPath::new(["trusted_domains"]), origin.clone());

        assert_eq!(
            provenance.origin_of(&KeyPath::new(["trusted_domains", "1"])),
            Some(&origin)
        );
        assert_eq!(provenance.origin_of(&KeyPath::new(["other"])), None);
    }

    #[test]
    fn test_shadowed_deduplicates() {
        let mut provenance = Provenance::default();
        let path = KeyPath::new(["loglevel"]);
        let origin = Origin::new(SourceKind::File, "low.toml");
        provenance.add_shadowed(path.clone(), origin.clone());
        provenance.add_shadowed(path.clone(), origin);
        assert_eq!(provenance.shadowed(&path).len(), 1);
    }
}
