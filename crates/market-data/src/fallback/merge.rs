use std::collections::BTreeMap;

/// Requested symbols absent from the primary result, in request order.
pub fn missing_symbols<V>(requested: &[String], primary: &BTreeMap<String, V>) -> Vec<String> {
    requested
        .iter()
        .filter(|symbol| !primary.contains_key(symbol.as_str()))
        .cloned()
        .collect()
}

/// Merge secondary entries into the primary result.
///
/// Primary entries always win; a secondary entry is only added for a key the
/// primary does not have.
pub fn merge_quotes<V>(
    mut primary: BTreeMap<String, V>,
    secondary: BTreeMap<String, V>,
) -> BTreeMap<String, V> {
    for (symbol, value) in secondary {
        primary.entry(symbol).or_insert(value);
    }
    primary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, i32)]) -> BTreeMap<String, i32> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_primary_never_overwritten() {
        let merged = merge_quotes(map(&[("a", 1)]), map(&[("a", 2), ("b", 3)]));
        assert_eq!(merged, map(&[("a", 1), ("b", 3)]));
    }

    #[test]
    fn test_missing_symbols() {
        let requested = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(missing_symbols(&requested, &map(&[("b", 1)])), vec!["a", "c"]);
        assert!(missing_symbols(&requested, &map(&[("a", 1), ("b", 1), ("c", 1)])).is_empty());
    }
}
