//! Unit of work configuration.

/// How the runner manages resource transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionMode {
    /// Begin a transaction on first use of each resource, commit or roll
    /// back all of them when the unit of work ends.
    #[default]
    Open,
    /// The caller already opened a transaction on every resource and will
    /// finish it; the runner only checks that one is open.
    Continue,
    /// Run commands without any transaction management.
    Ignore,
}

/// Configuration for a unit of work.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of records visited in one run before giving up.
    pub iteration_limit: usize,

    /// Resource transaction handling.
    pub transaction_mode: TransactionMode,

    /// Whether a command that is not ready fails the run (otherwise it is
    /// skipped with a warning).
    pub strict_readiness: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            iteration_limit: 100_000,
            transaction_mode: TransactionMode::Open,
            strict_readiness: true,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of visited records per run.
    #[must_use]
    pub const fn iteration_limit(mut self, limit: usize) -> Self {
        self.iteration_limit = limit;
        self
    }

    /// Sets the transaction mode.
    #[must_use]
    pub const fn transaction_mode(mut self, mode: TransactionMode) -> Self {
        self.transaction_mode = mode;
        self
    }

    /// Sets whether non-ready commands fail the run.
    #[must_use]
    pub const fn strict_readiness(mut self, value: bool) -> Self {
        self.strict_readiness = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.transaction_mode, TransactionMode::Open);
        assert!(config.strict_readiness);
        assert!(config.iteration_limit > 0);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .iteration_limit(10)
            .transaction_mode(TransactionMode::Ignore)
            .strict_readiness(false);

        assert_eq!(config.iteration_limit, 10);
        assert_eq!(config.transaction_mode, TransactionMode::Ignore);
        assert!(!config.strict_readiness);
    }
}
