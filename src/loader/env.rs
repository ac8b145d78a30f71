//! Environment variable fragments.
//!
//! `PREFIX__USER_OIDC__USE_PKCE=true` becomes `user_oidc.use_pkce = "true"`.
//! Values always stay strings; the validator decides how to read them.

use crate::tree::{insert, KeyPath, Mapping, Value};

/// Separator between the prefix and each key segment.
pub const SEPARATOR: &str = "__";

/// Build a tree from the variables that carry `prefix`.
///
/// Pairs are processed in name order so conflicts are reported the same way
/// on every run. Returns the offending variable and reason on failure.
pub fn tree_from_pairs(prefix: &str, pairs: &[(String, String)]) -> Result<Mapping, (String, String)> {
    let marker = format!("{}{}", prefix, SEPARATOR);
    let mut matching: Vec<&(String, String)> = pairs
        .iter()
        .filter(|(name, _)| name.starts_with(&marker))
        .collect();
    matching.sort_by(|a, b| a.0.cmp(&b.0));

    let mut tree = Mapping::new();
    for (name, value) in matching {
        let rest = &name[marker.len()..];
        let segments: Vec<String> = rest.split(SEPARATOR).map(|s| s.to_ascii_lowercase()).collect();
        if segments.iter().any(String::is_empty) {
            return Err((name.clone(), "empty key segment".to_string()));
        }
        let path = KeyPath::new(segments);
        insert(&mut tree, &path, Value::String(value.clone())).map_err(|conflict| {
            (
                name.clone(),
                format!("key {} is both a value and a table", conflict),
            )
        })?;
    }
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::lookup;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_prefix_filter_and_nesting() {
        let vars = pairs(&[
            ("APP__SESSION_LIFETIME", "1800"),
            ("APP__USER_OIDC__USE_PKCE", "false"),
            ("OTHER__SESSION_LIFETIME", "5"),
            ("APPX", "ignored"),
        ]);
        let tree = tree_from_pairs("APP", &vars).unwrap();
        assert_eq!(tree.get("session_lifetime"), Some(&Value::String("1800".into())));
        assert_eq!(
            lookup(&tree, &KeyPath::new(["user_oidc", "use_pkce"])),
            Some(&Value::String("false".into()))
        );
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_scalar_and_table_conflict() {
        let vars = pairs(&[("APP__A", "1"), ("APP__A__B", "2")]);
        let (name, reason) = tree_from_pairs("APP", &vars).unwrap_err();
        assert_eq!(name, "APP__A__B");
        assert!(reason.contains("both a value and a table"));
    }

    #[test]
    fn test_empty_segment_rejected() {
        let vars = pairs(&[("APP____A", "1")]);
        assert!(tree_from_pairs("APP", &vars).is_err());
    }
}
