use crate::error::ConfigError;
use crate::placeholder::render;

/// Expand `{{ env.VAR }}` placeholders in raw config text
///
/// `{{ env.VAR | default("fallback") }}` uses the fallback when the variable
/// is unset. Lines starting with `#` are TOML comments and pass through
/// unchanged, so commented-out entries never require their variables.
pub(crate) fn expand_env(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());

    for (i, line) in input.lines().enumerate() {
        if i > 0 {
            output.push('\n');
        }

        if line.trim_start().starts_with('#') {
            output.push_str(line);
            continue;
        }

        let expanded = render(line, |key, default| {
            let Some(var_name) = key.strip_prefix("env.").filter(|rest| !rest.contains('.')) else {
                return Err(ConfigError::Expansion(format!(
                    "only variables scoped with 'env.' are supported: `{key}`"
                )));
            };

            match (std::env::var(var_name), default) {
                (Ok(value), _) => Ok(Some(value)),
                (Err(_), Some(default)) => Ok(Some(default.to_owned())),
                (Err(_), None) => Err(ConfigError::Expansion(format!(
                    "environment variable not found: `{var_name}`"
                ))),
            }
        })?;

        output.push_str(&expanded);
    }

    if input.ends_with('\n') {
        output.push('\n');
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_plain_text_through() {
        let input = "model = \"gpt-4o\"\n";
        assert_eq!(expand_env(input).unwrap(), input);
    }

    #[test]
    fn expands_set_variable() {
        temp_env::with_var("RELAY_TEST_MODEL", Some("claude"), || {
            let out = expand_env("model = \"{{ env.RELAY_TEST_MODEL }}\"").unwrap();
            assert_eq!(out, "model = \"claude\"");
        });
    }

    #[test]
    fn uses_default_for_unset_variable() {
        temp_env::with_var_unset("RELAY_TEST_REGION", || {
            let out = expand_env(r#"region = "{{ env.RELAY_TEST_REGION | default("us-east-1") }}""#).unwrap();
            assert_eq!(out, r#"region = "us-east-1""#);
        });
    }

    #[test]
    fn missing_variable_is_an_error() {
        temp_env::with_var_unset("RELAY_TEST_MISSING", || {
            let err = expand_env("key = \"{{ env.RELAY_TEST_MISSING }}\"").unwrap_err();
            assert!(err.to_string().contains("RELAY_TEST_MISSING"));
        });
    }

    #[test]
    fn rejects_unscoped_keys() {
        let err = expand_env("key = \"{{ vault.TOKEN }}\"").unwrap_err();
        assert!(err.to_string().contains("only variables scoped with 'env.'"));
    }

    #[test]
    fn comment_lines_are_not_expanded() {
        temp_env::with_var_unset("RELAY_TEST_MISSING", || {
            let input = "  # key = \"{{ env.RELAY_TEST_MISSING }}\"";
            assert_eq!(expand_env(input).unwrap(), input);
        });
    }
}
