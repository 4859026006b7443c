//! Detection Engine: parallel fan-out over the snapshot, isolated per
//! detector, merged and sorted afterwards.

use crate::detectors::{
    BrokenLogicDetector, CircularDependencyDetector, Detector, FakeApiDetector,
    OrphanedExportDetector, UndefinedSymbolDetector,
};
use crate::OracleError;
use anatomist::Snapshot;
use common::{Indicator, WardenConfig};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// How one detector fared in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorOutcome {
    pub name: String,
    pub indicators: usize,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DetectorOutcome {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Merged output of every detector.
#[derive(Debug, Clone)]
pub struct DetectionRun {
    /// Sorted by [`Indicator::sort_key`].
    pub indicators: Vec<Indicator>,
    /// In registration order.
    pub outcomes: Vec<DetectorOutcome>,
    pub elapsed: Duration,
}

pub struct DetectionEngine {
    detectors: Vec<Arc<dyn Detector>>,
}

impl DetectionEngine {
    pub fn new(detectors: Vec<Arc<dyn Detector>>) -> Self {
        Self { detectors }
    }

    /// The five stock detectors, configured from `config`.
    ///
    /// # Errors
    /// `OracleError::Config` if a rule table holds an invalid regex.
    pub fn standard(config: &WardenConfig) -> Result<Self, OracleError> {
        let width = config.detection.snippet_width;
        Ok(Self::new(vec![
            Arc::new(FakeApiDetector::new(config.rules.fake_api_table()?, width)),
            Arc::new(UndefinedSymbolDetector::new(width)),
            Arc::new(BrokenLogicDetector::new(
                config.rules.broken_logic_table()?,
                width,
            )),
            Arc::new(OrphanedExportDetector::new(width)),
            Arc::new(CircularDependencyDetector::new(
                config.detection.dedupe_cycles,
                width,
            )),
        ]))
    }

    pub fn detector_names(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    /// Runs every detector in parallel. A detector that errors or panics
    /// contributes no indicators and is recorded as failed.
    pub fn run(&self, snapshot: &Snapshot) -> DetectionRun {
        let started = Instant::now();

        let results: Vec<(Vec<Indicator>, DetectorOutcome)> = self
            .detectors
            .par_iter()
            .map(|detector| run_isolated(detector.as_ref(), snapshot))
            .collect();

        let mut indicators = Vec::new();
        let mut outcomes = Vec::with_capacity(results.len());
        for (found, outcome) in results {
            indicators.extend(found);
            outcomes.push(outcome);
        }
        indicators.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        DetectionRun {
            indicators,
            outcomes,
            elapsed: started.elapsed(),
        }
    }
}

fn run_isolated(detector: &dyn Detector, snapshot: &Snapshot) -> (Vec<Indicator>, DetectorOutcome) {
    let name = detector.name();
    let started = Instant::now();
    let result = catch_unwind(AssertUnwindSafe(|| detector.detect(snapshot)));
    let duration_ms = started.elapsed().as_millis() as u64;

    let (found, error) = match result {
        Ok(Ok(found)) => (found, None),
        Ok(Err(e)) => (Vec::new(), Some(e.to_string())),
        Err(payload) => (Vec::new(), Some(panic_message(payload.as_ref()))),
    };

    match &error {
        Some(message) => error!(detector = name, error = %message, "detector failed"),
        None => debug!(detector = name, indicators = found.len(), duration_ms, "detector finished"),
    }

    let outcome = DetectorOutcome {
        name: name.to_string(),
        indicators: found.len(),
        duration_ms,
        error,
    };
    (found, outcome)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anatomist::FileCache;
    use common::config::CollectorConfig;
    use common::{CapabilitySet, DetectionType, Severity};

    struct Failing;
    impl Detector for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }
        fn detect(&self, _: &Snapshot) -> Result<Vec<Indicator>, OracleError> {
            Err(OracleError::Detector("boom".into()))
        }
    }

    struct Panicking;
    impl Detector for Panicking {
        fn name(&self) -> &'static str {
            "panicking"
        }
        fn detect(&self, _: &Snapshot) -> Result<Vec<Indicator>, OracleError> {
            panic!("detector bug")
        }
    }

    struct Fixed(&'static str, usize);
    impl Detector for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }
        fn detect(&self, _: &Snapshot) -> Result<Vec<Indicator>, OracleError> {
            Ok(vec![Indicator::new(
                DetectionType::BrokenLogic,
                Severity::Low,
                "z.ts",
                self.1,
                1,
            )])
        }
    }

    fn snapshot(sources: &[(&str, &str)]) -> Snapshot {
        Snapshot::from_cache(
            FileCache::from_sources("/p", sources.iter().copied()),
            Arc::new(CapabilitySet::v1()),
            &CollectorConfig::default(),
        )
    }

    #[test]
    fn test_failures_are_isolated() {
        let engine = DetectionEngine::new(vec![
            Arc::new(Fixed("first", 9)),
            Arc::new(Failing),
            Arc::new(Panicking),
            Arc::new(Fixed("second", 2)),
        ]);
        let run = engine.run(&snapshot(&[]));

        assert_eq!(run.indicators.len(), 2);
        assert_eq!(run.indicators[0].line, 2);
        let names: Vec<&str> = run.outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["first", "failing", "panicking", "second"]);
        assert!(run.outcomes[1].error.as_deref().unwrap().contains("boom"));
        assert!(run.outcomes[2]
            .error
            .as_deref()
            .unwrap()
            .contains("detector bug"));
        assert!(!run.outcomes[0].failed());
    }

    #[test]
    fn test_repeated_runs_are_identical() {
        let snap = snapshot(&[
            ("a.ts", "import './b';\nexport function x() {}\nfakeThing();\n"),
            ("b.ts", "import './a';\nif (true) { undefinedCall(); }\n"),
        ]);
        let engine = DetectionEngine::standard(&WardenConfig::default()).unwrap();
        let first = engine.run(&snap).indicators;
        for _ in 0..5 {
            assert_eq!(engine.run(&snap).indicators, first);
        }
        let kinds: std::collections::BTreeSet<DetectionType> =
            first.iter().map(|i| i.kind).collect();
        assert!(kinds.contains(&DetectionType::FakeApi));
        assert!(kinds.contains(&DetectionType::Circular));
        assert!(kinds.contains(&DetectionType::BrokenLogic));
        assert!(kinds.contains(&DetectionType::UndefinedFunction));
        assert!(kinds.contains(&DetectionType::Orphaned));
    }

    #[test]
    fn test_standard_engine_registers_five_detectors() {
        let engine = DetectionEngine::standard(&WardenConfig::default()).unwrap();
        assert_eq!(
            engine.detector_names(),
            vec![
                "fake_api",
                "undefined_symbol",
                "broken_logic",
                "orphaned_export",
                "circular_dependency"
            ]
        );
    }
}
