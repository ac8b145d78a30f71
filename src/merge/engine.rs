//! Priority-ordered deep merge.

use crate::loader::{ConfigFragment, Origin};
use crate::merge::provenance::Provenance;
use crate::tree::{lookup, KeyPath, Mapping, Value};

/// The single tree produced by folding all fragments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedTree {
    root: Mapping,
    provenance: Provenance,
}

impl MergedTree {
    pub fn root(&self) -> &Mapping {
        &self.root
    }

    pub fn get(&self, path: &KeyPath) -> Option<&Value> {
        lookup(&self.root, path)
    }

    /// Origin that supplied the value at `path`.
    pub fn origin_of(&self, path: &KeyPath) -> Option<&Origin> {
        self.provenance.origin_of(path)
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// Every non-mapping node (and every empty mapping) with its path.
    pub fn leaves(&self) -> Vec<(KeyPath, &Value)> {
        let mut out = Vec::new();
        collect_leaves(&self.root, &KeyPath::root(), &mut out);
        out
    }

    /// Every unresolved reference with its path, in key order.
    pub fn references(&self) -> Vec<(KeyPath, String)> {
        let mut out = Vec::new();
        for (key, value) in &self.root {
            value.references(&KeyPath::new([key.clone()]), &mut out);
        }
        out
    }

    /// Package the merged tree as a fragment again.
    pub fn to_fragment(&self, origin: Origin, priority: i32) -> ConfigFragment {
        ConfigFragment::new(origin, priority, self.root.clone())
    }

    /// Replace the node at `path` (which may address a sequence element)
    /// and attribute it to `origin`. Returns false if `path` does not exist.
    pub(crate) fn replace(&mut self, path: &KeyPath, value: Value, origin: Origin) -> bool {
        let Some(slot) = node_mut(&mut self.root, path) else {
            return false;
        };
        *slot = value;
        self.provenance.set_winner(path.clone(), origin);
        true
    }
}

/// Merge fragments into one tree.
///
/// Fragments are ordered by priority (highest first) with ties broken by
/// origin identifier, then folded so that the value already in place wins
/// unless both sides are mappings. Sequences are never concatenated. The
/// result does not depend on the order of `fragments`.
pub fn merge(mut fragments: Vec<ConfigFragment>) -> MergedTree {
    fragments.sort_by(|a, b| {
        b.priority()
            .cmp(&a.priority())
            .then_with(|| a.origin().id().cmp(b.origin().id()))
            .then_with(|| a.origin().kind().cmp(&b.origin().kind()))
    });

    let mut merged = MergedTree::default();
    for fragment in &fragments {
        fold(
            &mut merged.root,
            fragment.tree(),
            &KeyPath::root(),
            fragment.origin(),
            &mut merged.provenance,
        );
    }

    tracing::debug!(
        fragments = fragments.len(),
        keys = merged.root.len(),
        "Fragments merged"
    );
    merged
}

fn fold(target: &mut Mapping, incoming: &Mapping, at: &KeyPath, origin: &Origin, provenance: &mut Provenance) {
    for (key, value) in incoming {
        let path = at.child(key.clone());
        match target.get_mut(key) {
            Some(Value::Mapping(existing)) => match value {
                Value::Mapping(more) => fold(existing, more, &path, origin, provenance),
                _ => provenance.add_shadowed(path, origin.clone()),
            },
            Some(_) => provenance.add_shadowed(path, origin.clone()),
            None => {
                claim(value, &path, origin, provenance);
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

fn claim(value: &Value, at: &KeyPath, origin: &Origin, provenance: &mut Provenance) {
    match value {
        Value::Mapping(map) if !map.is_empty() => {
            for (key, child) in map {
                claim(child, &at.child(key.clone()), origin, provenance);
            }
        }
        _ => provenance.set_winner(at.clone(), origin.clone()),
    }
}

fn collect_leaves<'a>(map: &'a Mapping, at: &KeyPath, out: &mut Vec<(KeyPath, &'a Value)>) {
    for (key, value) in map {
        let path = at.child(key.clone());
        match value {
            Value::Mapping(child) if !child.is_empty() => collect_leaves(child, &path, out),
            _ => out.push((path, value)),
        }
    }
}

/// Walk mappings by key and sequences by index.
fn node_mut<'a>(root: &'a mut Mapping, path: &KeyPath) -> Option<&'a mut Value> {
    let (first, rest) = path.segments().split_first()?;
    let mut current = root.get_mut(first)?;
    for segment in rest {
        current = match current {
            Value::Mapping(map) => map.get_mut(segment)?,
            Value::Sequence(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::SourceKind;

    fn fragment(id: &str, priority: i32, text: &str) -> ConfigFragment {
        let origin = Origin::new(SourceKind::File, id);
        let tree = crate::loader::parse_fragment(text, crate::loader::Format::Toml, &origin).unwrap();
        ConfigFragment::new(origin, priority, tree)
    }

    #[test]
    fn test_higher_priority_wins() {
        let merged = merge(vec![
            fragment("low.toml", 10, "log_level = \"info\"\n"),
            fragment("high.toml", 20, "log_level = \"debug\"\n"),
        ]);
        let path = KeyPath::new(["log_level"]);
        assert_eq!(merged.get(&path), Some(&Value::String("debug".into())));
        assert_eq!(merged.origin_of(&path).map(Origin::id), Some("high.toml"));
        assert_eq!(merged.provenance().shadowed(&path)[0].id(), "low.toml");
    }

    #[test]
    fn test_mappings_merge_and_sequences_replace() {
        let merged = merge(vec![
            fragment(
                "base.toml",
                10,
                "trusted_domains = [\"a\", \"b\"]\n[user_oidc]\nuse_pkce = true\nauto_provision = false\n",
            ),
            fragment(
                "override.toml",
                20,
                "trusted_domains = [\"c\"]\n[user_oidc]\nauto_provision = true\n",
            ),
        ]);
        assert_eq!(
            merged.get(&KeyPath::new(["trusted_domains"])),
            Some(&Value::Sequence(vec![Value::String("c".into())]))
        );
        assert_eq!(
            merged.get(&KeyPath::new(["user_oidc", "use_pkce"])),
            Some(&Value::Bool(true))
        );
        assert_eq!(
            merged.get(&KeyPath::new(["user_oidc", "auto_provision"])),
            Some(&Value::Bool(true))
        );
    }

    #[test]
    fn test_equal_priority_breaks_ties_on_origin() {
        let a = fragment("a.toml", 10, "x = 1\n");
        let b = fragment("b.toml", 10, "x = 2\n");
        let forward = merge(vec![a.clone(), b.clone()]);
        let backward = merge(vec![b, a]);
        assert_eq!(forward, backward);
        assert_eq!(forward.get(&KeyPath::new(["x"])), Some(&Value::Integer(1)));
    }

    #[test]
    fn test_type_conflict_keeps_winner() {
        let merged = merge(vec![
            fragment("high.toml", 20, "filelocking = 1\n"),
            fragment("low.toml", 10, "[filelocking]\nttl = 3600\n"),
        ]);
        assert_eq!(merged.get(&KeyPath::new(["filelocking"])), Some(&Value::Integer(1)));
    }

    #[test]
    fn test_replace_inside_sequence() {
        let mut merged = merge(vec![fragment(
            "base.toml",
            10,
            "trusted_domains = [\"a\", { \"$ref\" = \"env:DOMAIN\" }]\n",
        )]);
        let path = KeyPath::new(["trusted_domains", "1"]);
        assert_eq!(merged.references(), vec![(path.clone(), "env:DOMAIN".to_string())]);

        let origin = Origin::new(SourceKind::Environment, "DOMAIN");
        assert!(merged.replace(&path, Value::String("b".into()), origin.clone()));
        assert_eq!(merged.origin_of(&path), Some(&origin));
        assert!(!merged.replace(&KeyPath::new(["nope"]), Value::Bool(true), origin));
    }
}
