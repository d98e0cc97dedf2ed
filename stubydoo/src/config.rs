//! Session configuration resolved from code and environment variables.
//!
//! A single struct resolved once when a [`Session`](crate::Session) is built
//! and read without further cost afterwards.

// =============================================================================
// Session Configuration
// =============================================================================

/// Environment variable overriding [`SessionConfig::test_prefix`].
pub const ENV_TEST_PREFIX: &str = "STUBYDOO_TEST_PREFIX";

/// Environment variable that disables the refusal to start over leftovers.
pub const ENV_ALLOW_UNVERIFIED: &str = "STUBYDOO_ALLOW_UNVERIFIED";

/// Settings shared by everything a session verifies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Name prefix identifying test cases when wrapping a whole group.
    pub test_prefix: String,

    /// Refuse to run a wrapped body while expectations from an earlier,
    /// unverified run are still pending.
    pub refuse_unverified: bool,

    /// Skip environment lookups entirely.
    pub ignore_environment: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            test_prefix: "test".to_string(),
            refuse_unverified: true,
            ignore_environment: true,
        }
    }
}

impl SessionConfig {
    /// Resolve configuration from the process environment.
    pub fn from_env() -> Self {
        Self::resolve(false)
    }

    /// Resolve configuration, consulting the environment unless
    /// `ignore_environment` is set.
    pub fn resolve(ignore_environment: bool) -> Self {
        Self {
            ignore_environment,
            ..Self::default()
        }
        .apply_environment()
    }

    /// Apply environment overrides on top of this configuration.
    ///
    /// A no-op when `ignore_environment` is set. Called by
    /// [`Session::with_config`](crate::Session::with_config).
    pub fn apply_environment(self) -> Self {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if self.ignore_environment {
            return self;
        }
        if let Some(prefix) = lookup(ENV_TEST_PREFIX).filter(|v| !v.is_empty()) {
            self.test_prefix = prefix;
        }
        if lookup(ENV_ALLOW_UNVERIFIED).is_some_and(|v| !v.is_empty() && v != "0") {
            self.refuse_unverified = false;
        }
        self
    }

    /// Builder-style prefix override.
    pub fn with_test_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.test_prefix = prefix.into();
        self
    }

    /// Builder-style switch for consulting the environment.
    pub fn with_environment(mut self, consult: bool) -> Self {
        self.ignore_environment = !consult;
        self
    }

    /// Builder-style refusal override.
    pub fn with_refuse_unverified(mut self, refuse: bool) -> Self {
        self.refuse_unverified = refuse;
        self
    }

    /// Whether `name` follows the test naming convention.
    #[inline]
    pub fn is_test_name(&self, name: &str) -> bool {
        name.starts_with(self.test_prefix.as_str())
    }
}

// =============================================================================
// Tests
// =============================================================================
