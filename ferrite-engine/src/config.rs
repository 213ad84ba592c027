//! Configuration for the invocation engine.

/// Configuration for the invocation engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Call timeout applied when the invoker does not supply one, in
    /// milliseconds. `u64::MAX` disables monitor-driven call timeouts.
    pub default_call_timeout_millis: u64,
    /// Default number of invocation attempts before a retriable failure
    /// becomes terminal.
    pub default_try_count: u32,
    /// Default pause between slow retries in milliseconds.
    pub default_try_pause_millis: u64,
    /// How long to wait for outstanding backup acknowledgements after the
    /// primary has responded, in milliseconds.
    pub backup_timeout_millis: u64,
    /// Cadence of the monitor sweep over live invocations, in milliseconds.
    pub scan_interval_millis: u64,
    /// Number of local operation threads.
    pub operation_thread_count: usize,
    /// Number of threads servicing fast retries and callbacks.
    pub retry_thread_count: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_call_timeout_millis: 60_000,
            default_try_count: 250,
            default_try_pause_millis: 500,
            backup_timeout_millis: 5_000,
            scan_interval_millis: 1_000,
            operation_thread_count: 4,
            retry_thread_count: 2,
        }
    }
}

impl EngineConfig {
    /// Create configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `FERRITE_CALL_TIMEOUT_MS`: default call timeout
    /// - `FERRITE_TRY_COUNT`: default invocation attempts
    /// - `FERRITE_TRY_PAUSE_MS`: default pause between slow retries
    /// - `FERRITE_BACKUP_TIMEOUT_MS`: backup acknowledgement budget
    /// - `FERRITE_SCAN_INTERVAL_MS`: monitor sweep cadence
    /// - `FERRITE_OPERATION_THREADS`: local operation threads
    /// - `FERRITE_RETRY_THREADS`: retry/callback threads
    pub fn from_env() -> Self {
        let defaults = Self::default();

        fn parse<T: std::str::FromStr>(key: &str, default: T) -> T {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse::<T>().ok())
                .unwrap_or(default)
        }

        Self {
            default_call_timeout_millis: parse(
                "FERRITE_CALL_TIMEOUT_MS",
                defaults.default_call_timeout_millis,
            ),
            default_try_count: parse("FERRITE_TRY_COUNT", defaults.default_try_count),
            default_try_pause_millis: parse(
                "FERRITE_TRY_PAUSE_MS",
                defaults.default_try_pause_millis,
            ),
            backup_timeout_millis: parse(
                "FERRITE_BACKUP_TIMEOUT_MS",
                defaults.backup_timeout_millis,
            ),
            scan_interval_millis: parse("FERRITE_SCAN_INTERVAL_MS", defaults.scan_interval_millis),
            operation_thread_count: parse(
                "FERRITE_OPERATION_THREADS",
                defaults.operation_thread_count,
            ),
            retry_thread_count: parse("FERRITE_RETRY_THREADS", defaults.retry_thread_count),
        }
    }

    /// Set the default call timeout.
    #[must_use]
    pub fn with_default_call_timeout_millis(mut self, millis: u64) -> Self {
        self.default_call_timeout_millis = millis;
        self
    }

    /// Set the backup acknowledgement budget.
    #[must_use]
    pub fn with_backup_timeout_millis(mut self, millis: u64) -> Self {
        self.backup_timeout_millis = millis;
        self
    }

    /// Set the monitor sweep cadence.
    #[must_use]
    pub fn with_scan_interval_millis(mut self, millis: u64) -> Self {
        self.scan_interval_millis = millis.max(1);
        self
    }

    /// Set the number of local operation threads.
    #[must_use]
    pub fn with_operation_threads(mut self, count: usize) -> Self {
        self.operation_thread_count = count.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.default_call_timeout_millis, 60_000);
        assert_eq!(config.default_try_count, 250);
        assert_eq!(config.default_try_pause_millis, 500);
        assert_eq!(config.backup_timeout_millis, 5_000);
    }

    #[test]
    fn builder_clamps_threads() {
        let config = EngineConfig::default().with_operation_threads(0);
        assert_eq!(config.operation_thread_count, 1);
    }
}
