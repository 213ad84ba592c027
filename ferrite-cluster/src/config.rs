//! Configuration for the cluster view.

/// Configuration for the partition layout.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Number of partitions the grid's data is split into.
    pub partition_count: u32,
    /// Maximum number of replicas per partition, primary included.
    pub max_replica_count: u8,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            partition_count: 271,
            max_replica_count: 7,
        }
    }
}

impl ClusterConfig {
    /// Create configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `FERRITE_PARTITION_COUNT`: number of partitions
    /// - `FERRITE_MAX_REPLICA_COUNT`: replicas per partition
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let partition_count = std::env::var("FERRITE_PARTITION_COUNT")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(defaults.partition_count);

        let max_replica_count = std::env::var("FERRITE_MAX_REPLICA_COUNT")
            .ok()
            .and_then(|s| s.parse::<u8>().ok())
            .unwrap_or(defaults.max_replica_count);

        Self {
            partition_count,
            max_replica_count,
        }
    }

    /// Set the partition count.
    #[must_use]
    pub fn with_partition_count(mut self, count: u32) -> Self {
        self.partition_count = count.max(1);
        self
    }

    /// Set the replica count.
    #[must_use]
    pub fn with_max_replica_count(mut self, count: u8) -> Self {
        self.max_replica_count = count.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClusterConfig::default();
        assert_eq!(config.partition_count, 271);
        assert_eq!(config.max_replica_count, 7);
    }

    #[test]
    fn builder_clamps_to_one() {
        let config = ClusterConfig::default()
            .with_partition_count(0)
            .with_max_replica_count(0);
        assert_eq!(config.partition_count, 1);
        assert_eq!(config.max_replica_count, 1);
    }
}
