//! `FaultInjector` - Probabilistic Fault Injection
//!
//! `TigerStyle`: Explicit fault injection for chaos testing the storage
//! contract. Every fault a backend can hit in production has a named,
//! injectable counterpart here.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use super::rng::DeterministicRng;
use crate::constants::DST_FAULT_PROBABILITY_MAX;

/// Types of faults that can be injected into a storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultType {
    /// Backend connection drops mid-operation
    ConnectionDrop,
    /// Liveness check fails
    PingFail,
    /// A single write operation fails
    WriteFail,
    /// A read operation fails
    ReadFail,
    /// Transaction commit fails after writes were staged
    CommitFail,
    /// Truncate fails
    TruncateFail,
    /// Schema introspection (table/key listing) fails
    IntrospectionFail,
    /// Connection release fails
    CloseFail,
}

impl FaultType {
    /// Get the fault type name as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectionDrop => "connection_drop",
            Self::PingFail => "ping_fail",
            Self::WriteFail => "write_fail",
            Self::ReadFail => "read_fail",
            Self::CommitFail => "commit_fail",
            Self::TruncateFail => "truncate_fail",
            Self::IntrospectionFail => "introspection_fail",
            Self::CloseFail => "close_fail",
        }
    }
}

/// Configuration for a specific fault.
#[derive(Debug, Clone)]
pub struct FaultConfig {
    /// The type of fault
    pub fault_type: FaultType,
    /// Probability of injection (0.0 to 1.0)
    pub probability: f64,
    /// Optional operation filter (substring match)
    pub operation_filter: Option<String>,
    /// Maximum number of injections (None = unlimited)
    pub max_injections: Option<u64>,
}

impl FaultConfig {
    /// Create a new fault configuration.
    ///
    /// # Panics
    /// Panics if probability is not in [0, 1].
    #[must_use]
    pub fn new(fault_type: FaultType, probability: f64) -> Self {
        // Precondition
        assert!(
            (0.0..=DST_FAULT_PROBABILITY_MAX).contains(&probability),
            "probability must be in [0, {DST_FAULT_PROBABILITY_MAX}], got {probability}"
        );

        Self {
            fault_type,
            probability,
            operation_filter: None,
            max_injections: None,
        }
    }

    /// Set operation filter (fault only applies to matching operations).
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.operation_filter = Some(filter.into());
        self
    }

    /// Set maximum number of injections.
    #[must_use]
    pub fn with_max_injections(mut self, max: u64) -> Self {
        // Precondition
        assert!(max > 0, "max_injections must be positive");
        self.max_injections = Some(max);
        self
    }
}

/// Fault injection statistics.
#[derive(Debug, Default)]
struct FaultStats {
    injection_count: AtomicU64,
}

/// Fault injector for simulation testing.
///
/// `TigerStyle`:
/// - Explicit fault registration
/// - Deterministic through RNG
/// - Statistics tracked
/// - Interior mutability for sharing via Arc
#[derive(Debug)]
pub struct FaultInjector {
    /// RNG wrapped in Mutex for interior mutability (allows sharing via Arc)
    rng: Mutex<DeterministicRng>,
    configs: Vec<FaultConfig>,
    stats: HashMap<FaultType, FaultStats>,
    /// Current injection counts (wrapped in Mutex for interior mutability)
    injection_counts: Mutex<HashMap<FaultType, u64>>,
}

impl FaultInjector {
    /// Create a new fault injector with the given RNG.
    #[must_use]
    pub fn new(rng: DeterministicRng) -> Self {
        Self {
            rng: Mutex::new(rng),
            configs: Vec::new(),
            stats: HashMap::new(),
            injection_counts: Mutex::new(HashMap::new()),
        }
    }

    /// Register a fault configuration.
    ///
    /// Registration must happen before sharing via Arc.
    pub fn register(&mut self, config: FaultConfig) {
        self.stats.entry(config.fault_type).or_default();
        self.injection_counts
            .lock()
            .unwrap()
            .entry(config.fault_type)
            .or_insert(0);

        self.configs.push(config);
    }

    /// Check if a fault should be injected for the given operation.
    ///
    /// Returns the fault type if one should be injected, None otherwise.
    /// Uses interior mutability so it can be called on `&self` through an
    /// `Arc` shared across backends.
    pub fn should_inject(&self, operation: &str) -> Option<FaultType> {
        for config in &self.configs {
            if let Some(ref filter) = config.operation_filter {
                if !operation.contains(filter.as_str()) {
                    continue;
                }
            }

            if let Some(max) = config.max_injections {
                let counts = self.injection_counts.lock().unwrap();
                let count = counts.get(&config.fault_type).copied().unwrap_or(0);
                if count >= max {
                    continue;
                }
            }

            let should_inject = {
                let mut rng = self.rng.lock().unwrap();
                rng.next_bool(config.probability)
            };

            if should_inject {
                if let Some(stats) = self.stats.get(&config.fault_type) {
                    stats.injection_count.fetch_add(1, Ordering::Relaxed);
                }
                {
                    let mut counts = self.injection_counts.lock().unwrap();
                    if let Some(count) = counts.get_mut(&config.fault_type) {
                        *count += 1;
                    }
                }

                return Some(config.fault_type);
            }
        }

        None
    }

    /// Get injection statistics keyed by fault name.
    #[must_use]
    pub fn injection_stats(&self) -> HashMap<String, u64> {
        self.stats
            .iter()
            .map(|(fault_type, stats)| {
                (
                    fault_type.as_str().to_string(),
                    stats.injection_count.load(Ordering::Relaxed),
                )
            })
            .collect()
    }

    /// Get total number of injections.
    #[must_use]
    pub fn total_injections(&self) -> u64 {
        self.stats
            .values()
            .map(|s| s.injection_count.load(Ordering::Relaxed))
            .sum()
    }

    /// Reset all statistics.
    pub fn reset_stats(&self) {
        for stats in self.stats.values() {
            stats.injection_count.store(0, Ordering::Relaxed);
        }
        let mut counts = self.injection_counts.lock().unwrap();
        for count in counts.values_mut() {
            *count = 0;
        }
    }
}

/// Builder for `FaultInjector`.
///
/// `TigerStyle`: Builder pattern for clean configuration before sharing via Arc.
pub struct FaultInjectorBuilder {
    rng: DeterministicRng,
    configs: Vec<FaultConfig>,
}

impl FaultInjectorBuilder {
    /// Create a new builder with the given RNG.
    #[must_use]
    pub fn new(rng: DeterministicRng) -> Self {
        Self {
            rng,
            configs: Vec::new(),
        }
    }

    /// Add a fault configuration.
    #[must_use]
    pub fn with_fault(mut self, config: FaultConfig) -> Self {
        self.configs.push(config);
        self
    }

    /// Add common write-path faults.
    #[must_use]
    pub fn with_write_faults(self, probability: f64) -> Self {
        self.with_fault(FaultConfig::new(FaultType::WriteFail, probability))
            .with_fault(FaultConfig::new(FaultType::CommitFail, probability))
    }

    /// Add common connection faults.
    #[must_use]
    pub fn with_connection_faults(self, probability: f64) -> Self {
        self.with_fault(FaultConfig::new(FaultType::ConnectionDrop, probability))
            .with_fault(FaultConfig::new(FaultType::PingFail, probability))
    }

    /// Build the `FaultInjector`.
    #[must_use]
    pub fn build(self) -> FaultInjector {
        let mut injector = FaultInjector::new(self.rng);
        for config in self.configs {
            injector.register(config);
        }
        injector
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_no_faults_registered() {
        let injector = FaultInjector::new(DeterministicRng::new(42));

        for _ in 0..100 {
            assert!(injector.should_inject("any_operation").is_none());
        }
    }

    #[test]
    fn test_always_inject() {
        let mut injector = FaultInjector::new(DeterministicRng::new(42));
        injector.register(FaultConfig::new(FaultType::CommitFail, 1.0));

        for _ in 0..10 {
            assert_eq!(injector.should_inject("commit"), Some(FaultType::CommitFail));
        }
    }

    #[test]
    fn test_never_inject() {
        let mut injector = FaultInjector::new(DeterministicRng::new(42));
        injector.register(FaultConfig::new(FaultType::CommitFail, 0.0));

        for _ in 0..100 {
            assert!(injector.should_inject("commit").is_none());
        }
    }

    #[test]
    fn test_operation_filter() {
        let mut injector = FaultInjector::new(DeterministicRng::new(42));
        injector.register(FaultConfig::new(FaultType::WriteFail, 1.0).with_filter("upsert"));

        assert_eq!(injector.should_inject("upsert"), Some(FaultType::WriteFail));
        assert!(injector.should_inject("ping").is_none());
    }

    #[test]
    fn test_max_injections() {
        let mut injector = FaultInjector::new(DeterministicRng::new(42));
        injector.register(FaultConfig::new(FaultType::WriteFail, 1.0).with_max_injections(2));

        assert_eq!(injector.should_inject("op"), Some(FaultType::WriteFail));
        assert_eq!(injector.should_inject("op"), Some(FaultType::WriteFail));
        assert!(injector.should_inject("op").is_none());
    }

    #[test]
    fn test_injection_stats() {
        let mut injector = FaultInjector::new(DeterministicRng::new(42));
        injector.register(FaultConfig::new(FaultType::CommitFail, 1.0));

        injector.should_inject("commit");
        injector.should_inject("commit");
        injector.should_inject("commit");

        let stats = injector.injection_stats();
        assert_eq!(stats.get("commit_fail"), Some(&3));
        assert_eq!(injector.total_injections(), 3);

        injector.reset_stats();
        assert_eq!(injector.total_injections(), 0);
    }

    #[test]
    fn test_arc_sharing() {
        let injector = Arc::new(
            FaultInjectorBuilder::new(DeterministicRng::new(42))
                .with_fault(FaultConfig::new(FaultType::WriteFail, 1.0))
                .build(),
        );

        assert_eq!(injector.should_inject("upsert"), Some(FaultType::WriteFail));

        let injector2 = Arc::clone(&injector);
        assert_eq!(injector2.should_inject("upsert"), Some(FaultType::WriteFail));

        // Stats are shared
        assert_eq!(injector.total_injections(), 2);
    }

    #[test]
    #[should_panic(expected = "probability must be in")]
    fn test_invalid_probability() {
        let _ = FaultConfig::new(FaultType::WriteFail, 1.5);
    }

    #[test]
    #[should_panic(expected = "max_injections must be positive")]
    fn test_invalid_max_injections() {
        let _ = FaultConfig::new(FaultType::WriteFail, 0.5).with_max_injections(0);
    }

    #[test]
    fn test_fault_type_as_str() {
        assert_eq!(FaultType::CommitFail.as_str(), "commit_fail");
        assert_eq!(FaultType::ConnectionDrop.as_str(), "connection_drop");
        assert_eq!(FaultType::IntrospectionFail.as_str(), "introspection_fail");
    }
}
