//! Breaker registry.
//!
//! # Responsibilities
//! - Map dependency names to lazily created breakers
//! - Hand out the same `Arc<CircuitBreaker>` for the same name
//! - Snapshot every breaker's status for dashboards
//!
//! # Design Decisions
//! - Constructed once at startup and passed explicitly (`Arc<BreakerRegistry>`)
//!   instead of living in a global
//! - DashMap entry API: concurrent first lookups of a name build one breaker
//! - Entries are never removed
//! - Options are honored only when a breaker is first created; later lookups
//!   with different options get the existing breaker unchanged

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use dashmap::DashMap;

use crate::config::SubstrateConfig;
use crate::observability::metrics;
use crate::resilience::circuit_breaker::{BreakerOptions, BreakerStatus, CircuitBreaker, CircuitState};

/// Process-wide map of dependency name to breaker.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    defaults: BreakerOptions,
    overrides: HashMap<String, BreakerOptions>,
}

impl BreakerRegistry {
    /// Empty registry creating breakers with `defaults`.
    pub fn new(defaults: BreakerOptions) -> Self {
        Self {
            breakers: DashMap::new(),
            defaults,
            overrides: HashMap::new(),
        }
    }

    /// Registry using the configured defaults and per-dependency overrides.
    pub fn from_config(config: &SubstrateConfig) -> Self {
        let overrides = config
            .dependencies
            .keys()
            .map(|name| (name.clone(), config.breaker_options(name)))
            .collect();
        Self {
            breakers: DashMap::new(),
            defaults: (&config.breaker).into(),
            overrides,
        }
    }

    /// Options a new breaker for `name` would be created with.
    pub fn options_for(&self, name: &str) -> BreakerOptions {
        self.overrides.get(name).copied().unwrap_or(self.defaults)
    }

    /// Breaker for `name`, created from configured options on first use.
    pub fn get(&self, name: &str) -> Arc<CircuitBreaker> {
        self.get_with(name, self.options_for(name))
    }

    /// Breaker for `name`, created with `options` on first use.
    ///
    /// If the breaker already exists, `options` is ignored.
    pub fn get_with(&self, name: &str, options: BreakerOptions) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(name) {
            let breaker = existing.value().clone();
            drop(existing);
            if breaker.options() != options {
                tracing::debug!(
                    dependency = %name,
                    existing = ?breaker.options(),
                    requested = ?options,
                    "Breaker exists, ignoring requested options"
                );
            }
            return breaker;
        }

        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(dependency = %name, options = ?options, "Creating circuit breaker");
                metrics::record_breaker_state(name, CircuitState::Closed);
                Arc::new(CircuitBreaker::new(name, options))
            })
            .value()
            .clone()
    }

    /// Status of every registered breaker, sorted by name.
    pub fn all_status(&self) -> BTreeMap<String, BreakerStatus> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().status()))
            .collect()
    }

    /// Reset every registered breaker to Closed.
    pub fn reset_all(&self) {
        for entry in self.breakers.iter() {
            entry.value().reset();
        }
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use std::sync::Mutex;
    use ::metrics::{
        Counter, Gauge, GaugeFn, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
    };
    use crate::config::BreakerOverride;

    /// Records every gauge `set` as (name, dependency label, value).
    #[derive(Default)]
    struct GaugeLog(Arc<Mutex<Vec<(String, String, f64)>>>);

    struct LoggedGauge {
        name: String,
        dependency: String,
        log: Arc<Mutex<Vec<(String, String, f64)>>>,
    }

    impl GaugeFn for LoggedGauge {
        fn increment(&self, _: f64) {}
        fn decrement(&self, _: f64) {}
        fn set(&self, value: f64) {
            self.log.lock().unwrap().push((self.name.clone(), self.dependency.clone(), value));
        }
    }

    impl Recorder for GaugeLog {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
            Counter::noop()
        }

        fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
            let dependency = key
                .labels()
                .find(|l| l.key() == "dependency")
                .map(|l| l.value().to_string())
                .unwrap_or_default();
            Gauge::from_arc(Arc::new(LoggedGauge {
                name: key.name().to_string(),
                dependency,
                log: self.0.clone(),
            }))
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    #[test]
    fn test_same_name_same_instance() {
        let registry = BreakerRegistry::default();
        let a = registry.get("x");
        let b = registry.get("x");
        let c = registry.get("y");

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_new_breaker_publishes_closed_state() {
        let recorder = GaugeLog::default();
        let log = recorder.0.clone();
        let registry = BreakerRegistry::default();

        ::metrics::with_local_recorder(&recorder, || {
            registry.get("crm-sync");
            registry.get("crm-sync");
        });

        let sets = log.lock().unwrap().clone();
        assert_eq!(sets, vec![("substrate_breaker_state".to_string(), "crm-sync".to_string(), 0.0)]);
    }

    #[test]
    fn test_options_only_honored_on_creation() {
        let registry = BreakerRegistry::default();
        let first = BreakerOptions { failure_threshold: 2, ..Default::default() };
        let second = BreakerOptions { failure_threshold: 9, ..Default::default() };

        let a = registry.get_with("resend", first);
        let b = registry.get_with("resend", second);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.options().failure_threshold, 2);
    }

    #[test]
    fn test_from_config_applies_overrides() {
        let mut config = SubstrateConfig::default();
        config.breaker.cooldown_ms = 1_000;
        config.dependencies.insert(
            "openai".into(),
            BreakerOverride { failure_threshold: Some(3), ..Default::default() },
        );
        let registry = BreakerRegistry::from_config(&config);

        let openai = registry.get("openai");
        assert_eq!(openai.options().failure_threshold, 3);
        assert_eq!(openai.options().cooldown, Duration::from_secs(1));
        assert_eq!(registry.get("hubspot").options().failure_threshold, 5);
    }

    #[test]
    fn test_all_status_does_not_create_entries() {
        let registry = BreakerRegistry::default();
        assert!(registry.all_status().is_empty());

        registry.get("web-fetch");
        registry.get("claude-sonnet");
        let status = registry.all_status();
        assert_eq!(status.keys().collect::<Vec<_>>(), vec!["claude-sonnet", "web-fetch"]);
        assert_eq!(status["web-fetch"].state, CircuitState::Closed);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_concurrent_creation_yields_one_instance() {
        let registry = Arc::new(BreakerRegistry::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.get("fullenrich"))
            })
            .collect();

        let breakers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(breakers.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(registry.len(), 1);
    }
}
