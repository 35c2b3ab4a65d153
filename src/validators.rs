//! Input validation for values handed to elevated commands
//!
//! Everything cufw passes to ufw through sudo/run0/pkexec goes through one
//! of these checks first.

/// Characters that never appear in a sane binary path
const FORBIDDEN_PATH_CHARS: &[char] = &[
    '$', '`', '|', '&', ';', '<', '>', '(', ')', '{', '}', '*', '?', '"', '\'', '\\', '!',
];

/// Validates a ufw rule number.
///
/// # Errors
///
/// Returns `Err` if the number is 0 (ufw numbers rules from 1).
///
/// # Examples
///
/// ```
/// use cufw::validators::validate_rule_number;
///
/// assert_eq!(validate_rule_number(4), Ok(4));
/// assert!(validate_rule_number(0).is_err());
/// ```
pub fn validate_rule_number(number: u32) -> Result<u32, String> {
    if number == 0 {
        Err("Rule numbers start at 1".to_string())
    } else {
        Ok(number)
    }
}

/// Validates the path of the ufw binary.
///
/// The path must be absolute, free of control characters and shell
/// metacharacters, and must not contain `..` components.
///
/// # Errors
///
/// Returns `Err` describing the first violated constraint.
pub fn validate_program_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("ufw path is empty".to_string());
    }

    if !path.starts_with('/') {
        return Err(format!("ufw path must be absolute: {path}"));
    }

    if path.chars().any(char::is_control) {
        return Err("ufw path contains control characters".to_string());
    }

    if path.contains(FORBIDDEN_PATH_CHARS) {
        return Err(format!("ufw path contains shell metacharacters: {path}"));
    }

    if path.split('/').any(|component| component == "..") {
        return Err(format!("ufw path must not contain '..': {path}"));
    }

    Ok(())
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_validate_rule_number_rejects_only_zero(number in any::<u32>()) {
            let result = validate_rule_number(number);
            if number == 0 {
                prop_assert!(result.is_err());
            } else {
                prop_assert_eq!(result, Ok(number));
            }
        }

        #[test]
        fn test_plain_absolute_paths_accepted(parts in proptest::collection::vec("[a-zA-Z0-9_.-]{1,12}", 1..5)) {
            prop_assume!(parts.iter().all(|p| p != ".."));
            let path = format!("/{}", parts.join("/"));
            prop_assert!(validate_program_path(&path).is_ok());
        }

        #[test]
        fn test_dangerous_chars_rejected(
            prefix in "/[a-z]{1,8}",
            bad in prop::sample::select(FORBIDDEN_PATH_CHARS.to_vec()),
        ) {
            let path = format!("{prefix}{bad}");
            prop_assert!(validate_program_path(&path).is_err());
        }
    }
}
