use std::env;
use std::str::FromStr;

use tracing::warn;

/// Reads and parses an environment variable, falling back to `default` when it
/// is unset. A value that is set but does not parse is logged and ignored.
pub fn get_env_var_or<T>(var: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(e) => {
                warn!("Ignoring {}={:?}: {}", var, raw, e);
                default
            }
        },
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_variable_uses_default() {
        let value: usize = get_env_var_or("TECHMAP_TEST_SURELY_UNSET_VAR", 7);
        assert_eq!(value, 7);
    }
}
