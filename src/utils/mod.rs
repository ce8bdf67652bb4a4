mod toposort;

pub use toposort::dependency_sort;

/// Inserts `value` into `seen` and `into` iff `value` was not already present.
///
/// Used throughout the propagator to build insertion-ordered, deduplicated
/// containers (§5, §9 "Determinism").
pub fn push_unique<T: Clone + Eq + std::hash::Hash>(
    into: &mut Vec<T>,
    seen: &mut std::collections::HashSet<T>,
    value: T,
) {
    if seen.insert(value.clone()) {
        into.push(value);
    }
}

/// Maps non-alphanumeric characters to `_`, per the SQL DSL's identifier
/// sanitizer contract (§4.6).
pub fn sanitize_ident(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_non_alphanumeric() {
        assert_eq!(sanitize_ident("can-read#v2"), "can_read_v2");
        assert_eq!(sanitize_ident("simple"), "simple");
    }
}
