//! Branch naming: `{issue_id}-{slug}` with a validated, sanitized slug.

const MAX_SLUG_LENGTH: usize = 100;

/// Sanitizes a string for use as part of a branch name.
///
/// Lowercases, maps spaces/dots/underscores to dashes, strips everything
/// outside `a-z0-9-`, collapses dash runs, trims edge dashes, and truncates
/// to `max_length` without leaving a trailing dash. May return an empty
/// string when the input has no usable characters.
pub fn sanitize_branch_slug(text: &str, max_length: usize) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_was_dash = false;
    for ch in text.trim().chars() {
        let mapped = match ch {
            ' ' | '.' | '_' | '-' => Some('-'),
            _ => {
                let lower = ch.to_ascii_lowercase();
                lower.is_ascii_alphanumeric().then_some(lower)
            }
        };
        match mapped {
            Some('-') => {
                if !last_was_dash && !slug.is_empty() {
                    slug.push('-');
                    last_was_dash = true;
                }
            }
            Some(ch) => {
                slug.push(ch);
                last_was_dash = false;
            }
            None => {}
        }
    }
    while slug.len() > max_length {
        slug.pop();
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Checks that a branch name is valid: non-empty, only `a-z0-9-`, no `..`,
/// no edge dashes.
pub fn is_valid_branch_name(name: &str) -> bool {
    if name.is_empty() || name.contains("..") {
        return false;
    }
    if name.starts_with('-') || name.ends_with('-') {
        return false;
    }
    name.chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-')
}

/// Builds the deterministic branch name for an issue:
/// `{issue_id}-{slug}`, falling back to the bare id when the slug empties
/// out. Panics only on programmer misuse (the sanitizer guarantees the
/// result passes the validator).
pub fn branch_name_for_issue(issue_id: u64, title: &str) -> String {
    let slug = sanitize_branch_slug(title, MAX_SLUG_LENGTH);
    let name = if slug.is_empty() {
        issue_id.to_string()
    } else {
        format!("{issue_id}-{slug}")
    };
    debug_assert!(is_valid_branch_name(&name), "sanitizer produced invalid branch name {name:?}");
    name
}

/// Extracts the issue number from a `{digits}-slug` branch name.
///
/// Lenient on purpose: a human may have renamed the branch, in which case
/// callers fall back to the PR number.
pub fn issue_number_from_branch(branch: &str) -> Option<u64> {
    let digits: String = branch.chars().take_while(|ch| ch.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    match branch[digits.len()..].chars().next() {
        Some('-') | Some(' ') => digits.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_branch_name_is_deterministic_slug() {
        assert_eq!(branch_name_for_issue(42, "Add user login"), "42-add-user-login");
        assert_eq!(
            branch_name_for_issue(7, "Fix config.loader_v2 (again)"),
            "7-fix-config-loader-v2-again"
        );
    }

    #[test]
    fn unit_branch_name_falls_back_to_bare_id() {
        assert_eq!(branch_name_for_issue(1, "???"), "1");
        assert_eq!(branch_name_for_issue(9, "   "), "9");
    }

    #[test]
    fn unit_branch_name_always_passes_validator() {
        for title in ["Add user login", "???", "..", "--weird--", "UPPER case", ""] {
            let name = branch_name_for_issue(13, title);
            assert!(is_valid_branch_name(&name), "{title:?} -> {name:?}");
        }
    }

    #[test]
    fn unit_sanitize_collapses_and_truncates_without_trailing_dash() {
        assert_eq!(sanitize_branch_slug("a  b..c", 100), "a-b-c");
        assert_eq!(sanitize_branch_slug("abc-def", 4), "abc");
        assert_eq!(sanitize_branch_slug("Тест", 100), "");
    }

    #[test]
    fn unit_validator_rejects_bad_shapes() {
        assert!(!is_valid_branch_name(""));
        assert!(!is_valid_branch_name("-leading"));
        assert!(!is_valid_branch_name("trailing-"));
        assert!(!is_valid_branch_name("has..dots"));
        assert!(!is_valid_branch_name("Upper"));
        assert!(is_valid_branch_name("42-add-user-login"));
    }

    #[test]
    fn unit_issue_number_from_branch_parses_digit_prefix() {
        assert_eq!(issue_number_from_branch("42-add-feature"), Some(42));
        assert_eq!(issue_number_from_branch("feature-42"), None);
        assert_eq!(issue_number_from_branch("42"), None);
        assert_eq!(issue_number_from_branch(""), None);
    }
}
