//! Registry of available analyzers

use finproof_core::{AnalysisCategory, Analyzer, AnalyzerDescriptor, Error, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// Produces a fresh analyzer instance
pub type AnalyzerFactory = Arc<dyn Fn() -> Arc<dyn Analyzer> + Send + Sync>;

struct Entry {
    descriptor: AnalyzerDescriptor,
    factory: AnalyzerFactory,
}

/// Collects analyzer factories before the registry is frozen
#[derive(Default)]
pub struct RegistryBuilder {
    entries: HashMap<String, Entry>,
}

impl RegistryBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an analyzer factory
    ///
    /// The factory is invoked once to read the analyzer's descriptor; its name
    /// becomes the registry key. Registering a second factory under the same
    /// name fails and leaves the first registration in place.
    pub fn register<F>(&mut self, factory: F) -> Result<&mut Self>
    where
        F: Fn() -> Arc<dyn Analyzer> + Send + Sync + 'static,
    {
        let descriptor = factory().descriptor().clone();
        let name = descriptor.name.clone();

        if self.entries.contains_key(&name) {
            tracing::warn!(analyzer = %name, "Duplicate analyzer registration rejected");
            return Err(Error::DuplicateAnalyzer(name));
        }

        tracing::debug!(analyzer = %name, category = %descriptor.category, "Registered analyzer");
        self.entries.insert(
            name,
            Entry {
                descriptor,
                factory: Arc::new(factory),
            },
        );
        Ok(self)
    }

    /// Number of registrations so far
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Freeze the registrations
    pub fn build(self) -> AnalyzerRegistry {
        tracing::info!(count = self.entries.len(), "Analyzer registry built");
        AnalyzerRegistry {
            entries: self.entries,
        }
    }
}

/// Immutable name to analyzer map
///
/// Reads take no locks; share it behind an `Arc`.
pub struct AnalyzerRegistry {
    entries: HashMap<String, Entry>,
}

impl AnalyzerRegistry {
    /// Start building a registry
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Fresh analyzer instance for `name`
    pub fn get(&self, name: &str) -> Option<Arc<dyn Analyzer>> {
        self.entries.get(name).map(|e| (e.factory)())
    }

    /// Like [`get`](Self::get) but reports a missing name as an error
    pub fn require(&self, name: &str) -> Result<Arc<dyn Analyzer>> {
        self.get(name)
            .ok_or_else(|| Error::AnalyzerNotFound(name.to_string()))
    }

    pub fn descriptor(&self, name: &str) -> Option<&AnalyzerDescriptor> {
        self.entries.get(name).map(|e| &e.descriptor)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// All registered names, sorted
    pub fn list_names(&self) -> BTreeSet<String> {
        self.entries.keys().cloned().collect()
    }

    /// Descriptors grouped by category, each group ordered by name
    pub fn list_by_category(&self) -> BTreeMap<AnalysisCategory, Vec<AnalyzerDescriptor>> {
        let mut grouped: BTreeMap<AnalysisCategory, Vec<AnalyzerDescriptor>> = BTreeMap::new();
        for entry in self.entries.values() {
            grouped
                .entry(entry.descriptor.category)
                .or_default()
                .push(entry.descriptor.clone());
        }
        for descriptors in grouped.values_mut() {
            descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        }
        grouped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for AnalyzerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyzerRegistry")
            .field("analyzers", &self.list_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use finproof_core::{AnalysisParameters, AnalysisResult, ProgressReporter};

    struct Stub {
        descriptor: AnalyzerDescriptor,
        summary: &'static str,
    }

    impl Stub {
        fn factory(
            name: &'static str,
            category: AnalysisCategory,
            summary: &'static str,
        ) -> impl Fn() -> Arc<dyn Analyzer> + Send + Sync + 'static {
            move || {
                Arc::new(Stub {
                    descriptor: AnalyzerDescriptor::new(name, name, category),
                    summary,
                }) as Arc<dyn Analyzer>
            }
        }
    }

    #[async_trait]
    impl Analyzer for Stub {
        fn descriptor(&self) -> &AnalyzerDescriptor {
            &self.descriptor
        }

        async fn analyze(
            &self,
            params: &AnalysisParameters,
            _progress: &dyn ProgressReporter,
        ) -> AnalysisResult {
            AnalysisResult::new(self.name(), &params.symbol, self.summary)
        }
    }

    #[test]
    fn test_register_and_get() {
        let mut builder = RegistryBuilder::new();
        builder
            .register(Stub::factory("alpha", AnalysisCategory::Technical, "a"))
            .unwrap()
            .register(Stub::factory("beta", AnalysisCategory::Statistical, "b"))
            .unwrap();
        let registry = builder.build();

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("alpha"));
        assert!(registry.get("alpha").is_some());
        assert!(registry.get("gamma").is_none());
        assert!(matches!(
            registry.require("gamma"),
            Err(Error::AnalyzerNotFound(ref n)) if n == "gamma"
        ));
        assert_eq!(
            registry.descriptor("beta").unwrap().category,
            AnalysisCategory::Statistical
        );
    }

    #[tokio::test]
    async fn test_duplicate_keeps_first() {
        let mut builder = RegistryBuilder::new();
        builder
            .register(Stub::factory("dup", AnalysisCategory::Technical, "first"))
            .unwrap();
        let err = builder
            .register(Stub::factory("dup", AnalysisCategory::Nlp, "second"))
            .err()
            .unwrap();
        assert_eq!(err, Error::DuplicateAnalyzer("dup".to_string()));

        let registry = builder.build();
        assert_eq!(registry.len(), 1);
        let analyzer = registry.get("dup").unwrap();
        assert_eq!(analyzer.descriptor().category, AnalysisCategory::Technical);

        let params = AnalysisParameters::new("AAPL", finproof_core::MarketDataset::empty("AAPL"));
        let result = analyzer
            .analyze(&params, &finproof_core::NoopProgress)
            .await;
        assert_eq!(result.summary, "first");
    }

    #[test]
    fn test_list_by_category_sorted() {
        let mut builder = RegistryBuilder::new();
        builder
            .register(Stub::factory("zeta", AnalysisCategory::Technical, ""))
            .unwrap()
            .register(Stub::factory("eta", AnalysisCategory::Technical, ""))
            .unwrap()
            .register(Stub::factory("news", AnalysisCategory::Nlp, ""))
            .unwrap();
        let registry = builder.build();

        let grouped = registry.list_by_category();
        assert_eq!(grouped.len(), 2);
        let names: Vec<_> = grouped[&AnalysisCategory::Technical]
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(names, vec!["eta", "zeta"]);

        let all: Vec<_> = registry.list_names().into_iter().collect();
        assert_eq!(all, vec!["eta", "news", "zeta"]);
    }

    #[test]
    fn test_empty_registry() {
        let registry = AnalyzerRegistry::builder().build();
        assert!(registry.is_empty());
        assert!(registry.list_by_category().is_empty());
    }
}
