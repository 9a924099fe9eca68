//! Environment parsing shared by the `from_env` constructors.

/// Parses a boolean flag. Accepts `1`/`0` and `true`/`false` in any case,
/// ignoring surrounding whitespace.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "1" => Some(true),
        "0" => Some(false),
        v if v.eq_ignore_ascii_case("true") => Some(true),
        v if v.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

/// Reads a boolean environment variable, falling back to `default` when it
/// is unset or unparsable.
pub fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => parse_bool(&v).unwrap_or_else(|| {
            tracing::warn!(var = name, value = %v, default, "Ignoring unparsable boolean");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_booleans() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("FALSE"), Some(false));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool(" TRUE "), Some(true));
        assert_eq!(parse_bool("\tfalse\n"), Some(false));
        assert_eq!(parse_bool("yes-please"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn env_bool_falls_back_to_default() {
        let var = "SEQGUARD_TEST_ENV_BOOL";
        std::env::remove_var(var);
        assert!(env_bool(var, true));
        assert!(!env_bool(var, false));

        std::env::set_var(var, "garbage");
        assert!(env_bool(var, true));
        assert!(!env_bool(var, false));

        std::env::set_var(var, "false");
        assert!(!env_bool(var, true));

        std::env::remove_var(var);
    }
}
