use std::collections::BTreeMap;

/// Maximum number of substitution passes before giving up on a fixpoint.
const MAX_PASSES: usize = 5;

/// Replace `${NAME}` and bare `$NAME` references with values from `vars`.
///
/// Substitution is applied repeatedly until a pass produces no change, so
/// values may themselves reference other variables. The pass count is capped
/// at 5; a self-referential chain simply stops changing and the residual text
/// is returned as-is. Names absent from `vars` are left verbatim — ebuilds
/// routinely reference variables supplied by the package manager environment.
///
/// Bare references are substituted longest name first, so a `$PN` site is
/// never clipped by the shorter `$P`.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use portage_manifest::resolve;
///
/// let mut vars = BTreeMap::new();
/// vars.insert("PN".to_string(), "foo".to_string());
/// vars.insert("P".to_string(), "${PN}-1.0".to_string());
/// assert_eq!(resolve("${P}.tar.gz", &vars), "foo-1.0.tar.gz");
/// assert_eq!(resolve("${WORKDIR}/src", &vars), "${WORKDIR}/src");
/// ```
pub fn resolve(text: &str, vars: &BTreeMap<String, String>) -> String {
    // Longest name first: `$P` must not fire inside a `$PN` reference.
    let mut keys: Vec<&str> = vars.keys().map(String::as_str).collect();
    keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let mut text = text.to_string();
    for _ in 0..MAX_PASSES {
        let before = text.clone();
        for key in &keys {
            let value = &vars[*key];
            text = text.replace(&format!("${{{key}}}"), value);
            text = text.replace(&format!("${key}"), value);
        }
        if text == before {
            break;
        }
    }
    text
}

/// Whether `s` is a shell variable name: a letter or underscore followed by
/// letters, digits or underscores.
pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn braced_and_bare() {
        let v = vars(&[("P", "foo-1.0")]);
        assert_eq!(resolve("${P}.tar.gz", &v), "foo-1.0.tar.gz");
        assert_eq!(resolve("$P.tar.gz", &v), "foo-1.0.tar.gz");
    }

    #[test]
    fn nested_references() {
        let v = vars(&[("PN", "foo"), ("PV", "1.0"), ("P", "${PN}-${PV}")]);
        assert_eq!(resolve("${P}", &v), "foo-1.0");
    }

    #[test]
    fn unresolved_left_verbatim() {
        let v = vars(&[("P", "foo-1.0")]);
        assert_eq!(resolve("${WORKDIR}/${P}", &v), "${WORKDIR}/foo-1.0");
    }

    #[test]
    fn idempotent_at_fixpoint() {
        let v = vars(&[("PN", "foo"), ("P", "${PN}-1.0")]);
        let once = resolve("${P}/${MISSING}", &v);
        assert_eq!(resolve(&once, &v), once);
    }

    #[test]
    fn self_reference_stops_at_cap() {
        let v = vars(&[("A", "x${A}")]);
        let resolved = resolve("${A}", &v);
        // One expansion per pass, capped; the residual reference survives.
        assert_eq!(resolved, "xxxxx${A}");
    }

    #[test]
    fn bare_reference_prefers_longest_name() {
        let v = vars(&[("P", "foo-1.0"), ("PN", "foo"), ("PV", "1.0")]);
        assert_eq!(resolve("$PN.tar.gz", &v), "foo.tar.gz");
        assert_eq!(resolve("$PV", &v), "1.0");
        assert_eq!(resolve("$P.tar.gz", &v), "foo-1.0.tar.gz");
        assert_eq!(resolve("$PN-$PV", &v), "foo-1.0");
    }

    #[test]
    fn empty_vars_is_noop() {
        let v = BTreeMap::new();
        assert_eq!(resolve("${P}-$PN", &v), "${P}-$PN");
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("P"));
        assert!(is_identifier("MY_PN"));
        assert!(is_identifier("_private"));
        assert!(is_identifier("V2"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("2V"));
        assert!(!is_identifier("FOO-BAR"));
        assert!(!is_identifier("a b"));
    }
}
