//! Layer-by-layer execution.
//!
//! Layers run strictly in order and every layer runs, whatever happened
//! before it. Inside a layer each check gets its own task so a panicking or
//! hanging check only fails itself.

use crate::check::{Check, CheckContext, CheckOutcome, CheckStatus, VerificationCheck};
use crate::checks::standard_checks;
use crate::layer::{LayerKind, LayerStatus, VerificationLayer};
use crate::report::VerificationReport;
use crate::GauntletError;
use common::WardenConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Slack on top of the command timeout before a whole check is abandoned.
const CHECK_GRACE: Duration = Duration::from_secs(30);

type CheckResult = (Result<Result<CheckOutcome, GauntletError>, tokio::time::error::Elapsed>, u64);

pub struct Gauntlet {
    layers: Vec<(LayerKind, Vec<Arc<dyn Check>>)>,
    check_timeout: Duration,
}

impl Gauntlet {
    /// An empty gauntlet: five layers, no checks.
    pub fn new(check_timeout: Duration) -> Self {
        Self {
            layers: LayerKind::ALL.iter().map(|k| (*k, Vec::new())).collect(),
            check_timeout,
        }
    }

    /// The stock checks, configured from `config.verification`.
    ///
    /// # Errors
    /// Invalid `error_pattern` or rule table regexes.
    pub fn standard(config: &WardenConfig) -> Result<Self, GauntletError> {
        let mut gauntlet = Self::new(
            Duration::from_secs(config.verification.timeout_secs) + CHECK_GRACE,
        );
        for (kind, checks) in standard_checks(config)? {
            for check in checks {
                gauntlet = gauntlet.with_check(kind, check);
            }
        }
        Ok(gauntlet)
    }

    pub fn with_check(mut self, layer: LayerKind, check: Arc<dyn Check>) -> Self {
        if let Some((_, checks)) = self.layers.iter_mut().find(|(k, _)| *k == layer) {
            checks.push(check);
        }
        self
    }

    pub fn check_count(&self) -> usize {
        self.layers.iter().map(|(_, c)| c.len()).sum()
    }

    pub async fn run(&self, ctx: Arc<CheckContext>) -> VerificationReport {
        let started = Instant::now();
        let mut layers = Vec::with_capacity(self.layers.len());

        for (kind, checks) in &self.layers {
            let layer = self.run_layer(*kind, checks, &ctx).await;
            match layer.status {
                LayerStatus::Passed => {
                    info!(layer = %kind, checks = layer.checks.len(), "layer passed")
                }
                status => warn!(
                    layer = %kind,
                    status = %status,
                    failed = layer.count(CheckStatus::Failed),
                    "layer did not pass"
                ),
            }
            layers.push(layer);
        }

        VerificationReport::build(ctx.root(), layers, started.elapsed())
    }

    async fn run_layer(
        &self,
        kind: LayerKind,
        checks: &[Arc<dyn Check>],
        ctx: &Arc<CheckContext>,
    ) -> VerificationLayer {
        let started = Instant::now();

        let handles: Vec<JoinHandle<CheckResult>> = checks
            .iter()
            .map(|check| {
                let check = Arc::clone(check);
                let ctx = Arc::clone(ctx);
                let limit = self.check_timeout;
                tokio::spawn(async move {
                    let t = Instant::now();
                    let result = tokio::time::timeout(limit, check.run(&ctx)).await;
                    (result, t.elapsed().as_millis() as u64)
                })
            })
            .collect();

        let mut records = Vec::with_capacity(checks.len());
        for (check, handle) in checks.iter().zip(handles) {
            let mut record = VerificationCheck::pending(check.as_ref(), kind);
            let (status, message) = match handle.await {
                Ok((Ok(Ok(CheckOutcome::Passed(detail))), ms)) => {
                    record.duration_ms = ms;
                    (CheckStatus::Passed, detail)
                }
                Ok((Ok(Ok(CheckOutcome::Failed(message))), ms)) => {
                    record.duration_ms = ms;
                    (failure_status(check.as_ref()), Some(message))
                }
                Ok((Ok(Err(e)), ms)) => {
                    record.duration_ms = ms;
                    (failure_status(check.as_ref()), Some(e.to_string()))
                }
                Ok((Err(_), ms)) => {
                    record.duration_ms = ms;
                    (
                        failure_status(check.as_ref()),
                        Some(format!("timed out after {}s", self.check_timeout.as_secs())),
                    )
                }
                Err(join) => (
                    failure_status(check.as_ref()),
                    Some(if join.is_panic() {
                        "check panicked".to_string()
                    } else {
                        format!("check task failed: {join}")
                    }),
                ),
            };

            if status != CheckStatus::Passed {
                warn!(check = check.id(), status = %status, error = ?message, "check did not pass");
            }
            if let Err(e) = record.resolve(status, message) {
                warn!(check = check.id(), error = %e, "check already resolved");
            }
            records.push(record);
        }

        VerificationLayer::new(kind, records, started.elapsed().as_millis() as u64)
    }
}

fn failure_status(check: &dyn Check) -> CheckStatus {
    if check.tolerated() {
        CheckStatus::Warning
    } else {
        CheckStatus::Failed
    }
}
