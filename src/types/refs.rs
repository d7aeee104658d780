//! Git ref-name helpers.
//!
//! Inbound events carry full ref names ("refs/heads/feature-a"); actor state
//! and triggers are keyed by bare branch names. These two functions are the
//! only place the mapping lives.

/// Prefix of branch refs.
pub const BRANCH_REF_PREFIX: &str = "refs/heads/";

/// Extracts the branch name from a branch ref.
///
/// Returns `None` for refs outside `refs/heads/` (tags, notes, etc.) and for
/// the degenerate "refs/heads/" with no name.
pub fn branch_name_from_ref(ref_name: &str) -> Option<&str> {
    match ref_name.strip_prefix(BRANCH_REF_PREFIX) {
        Some("") => None,
        other => other,
    }
}

/// Builds the full ref for a branch name.
pub fn branch_name_to_ref(branch: &str) -> String {
    format!("{BRANCH_REF_PREFIX}{branch}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn extracts_branch_name() {
        assert_eq!(branch_name_from_ref("refs/heads/main"), Some("main"));
        assert_eq!(
            branch_name_from_ref("refs/heads/feature/nested"),
            Some("feature/nested")
        );
    }

    #[test]
    fn rejects_non_branch_refs() {
        assert_eq!(branch_name_from_ref("refs/tags/v1.0"), None);
        assert_eq!(branch_name_from_ref("refs/heads/"), None);
        assert_eq!(branch_name_from_ref("main"), None);
    }

    proptest! {
        #[test]
        fn round_trip(name in "[a-zA-Z0-9][a-zA-Z0-9/_-]{0,60}") {
            let full = branch_name_to_ref(&name);
            prop_assert_eq!(branch_name_from_ref(&full), Some(name.as_str()));
            prop_assert_eq!(
                branch_name_to_ref(branch_name_from_ref(&full).unwrap()),
                full
            );
        }
    }
}
