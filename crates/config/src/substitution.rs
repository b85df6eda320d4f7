use anyhow::Result;
use regex::Regex;
use std::env;
use std::sync::OnceLock;
use tracing::{debug, warn};

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{(\w+)\}|\$(\w+)").expect("placeholder regex is valid"))
}

/// Substitute environment variables in the format ${VAR_NAME} or $VAR_NAME.
///
/// Unset variables keep their placeholder; the validator reports them.
pub fn substitute_env_vars(content: &str) -> Result<String> {
    let mut missing_vars = Vec::new();

    let result = placeholder_regex().replace_all(content, |caps: &regex::Captures| {
        let placeholder = &caps[0];
        let var_name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();

        match env::var(var_name) {
            Ok(value) => {
                debug!("Substituting environment variable: {}", var_name);
                value
            }
            Err(_) => {
                warn!("Environment variable '{}' not set", var_name);
                missing_vars.push(var_name.to_string());
                placeholder.to_string()
            }
        }
    });

    if !missing_vars.is_empty() {
        debug!(
            "Environment variables not set (may use defaults or fail validation): {:?}",
            missing_vars
        );
    }

    Ok(result.into_owned())
}

/// Check if a string contains unresolved environment variable placeholders
pub fn has_unresolved_env_vars(content: &str) -> bool {
    placeholder_regex().is_match(content)
}

/// Whether a credential variable is set to a non-empty value
pub fn credential_present(var_name: &str) -> bool {
    env::var(var_name).map(|v| !v.trim().is_empty()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitutes_both_forms() {
        env::set_var("CCPI_SUBST_TEST_PORT", "9100");
        let out = substitute_env_vars("a: ${CCPI_SUBST_TEST_PORT}\nb: $CCPI_SUBST_TEST_PORT").unwrap();
        assert_eq!(out, "a: 9100\nb: 9100");
    }

    #[test]
    fn test_missing_var_keeps_placeholder() {
        let out = substitute_env_vars("key: ${CCPI_SUBST_TEST_UNSET_VAR}").unwrap();
        assert_eq!(out, "key: ${CCPI_SUBST_TEST_UNSET_VAR}");
        assert!(has_unresolved_env_vars(&out));
    }

    #[test]
    fn test_templates_without_dollar_are_untouched() {
        let out = substitute_env_vars("path: /series?id={query}&key={credential}").unwrap();
        assert_eq!(out, "path: /series?id={query}&key={credential}");
    }

    #[test]
    fn test_credential_present() {
        env::set_var("CCPI_SUBST_TEST_KEY", "abc");
        env::set_var("CCPI_SUBST_TEST_BLANK", "  ");
        assert!(credential_present("CCPI_SUBST_TEST_KEY"));
        assert!(!credential_present("CCPI_SUBST_TEST_BLANK"));
        assert!(!credential_present("CCPI_SUBST_TEST_NEVER_SET"));
    }
}
