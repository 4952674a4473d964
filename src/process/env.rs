//! Allow-listed environment for child processes.
//!
//! The child gets a minimal environment built from scratch: only variables on
//! the allow-list below are copied from the supervisor's own environment.
//! This is a security boundary — ambient credentials (cloud keys, SSH agent
//! sockets, user identifiers) must never reach a sidecar that only needs to
//! bind a loopback port and find its interpreter.
//!
//! Absent allow-listed variables are simply omitted; there are no error
//! conditions.

use std::collections::HashMap;

/// Variables the child is allowed to inherit.
///
/// Executable and library resolution, locale, temp directories, and one
/// explicit debug flag. Nothing else passes through.
const ALLOWED_VARS: &[&str] = &[
    // executable / library resolution
    "PATH",
    "LD_LIBRARY_PATH",
    "DYLD_LIBRARY_PATH",
    "DYLD_FALLBACK_LIBRARY_PATH",
    // locale
    "LANG",
    "LC_ALL",
    "LC_CTYPE",
    // temp directories
    "TMPDIR",
    "TEMP",
    "TMP",
    // windows needs these to run anything at all
    "SYSTEMROOT",
    "COMSPEC",
    // explicit opt-in debug flag for sidecars
    "SIDEVISOR_DEBUG",
];

/// Builds the sanitized child environment from the current process
/// environment and the fixed allow-list.
pub fn build_environment() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(key, _)| ALLOWED_VARS.iter().any(|allowed| allowed == key))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_variables_not_on_the_allow_list() {
        std::env::set_var("SIDEVISOR_TEST_AWS_SECRET", "hunter2");
        let env = build_environment();
        assert!(!env.contains_key("SIDEVISOR_TEST_AWS_SECRET"));
        std::env::remove_var("SIDEVISOR_TEST_AWS_SECRET");
    }

    #[test]
    fn allow_listed_variable_passes_only_while_set() {
        std::env::set_var("SIDEVISOR_DEBUG", "1");
        let env = build_environment();
        assert_eq!(env.get("SIDEVISOR_DEBUG").map(String::as_str), Some("1"));

        std::env::remove_var("SIDEVISOR_DEBUG");
        let env = build_environment();
        assert!(!env.contains_key("SIDEVISOR_DEBUG"));
    }
}
