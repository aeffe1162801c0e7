//! Whole-run orchestration: execute the plan, then verify the end-state.

use std::fmt;

use anyhow::Result;
use tracing::info;

use crate::core::types::{Capability, FailurePolicy, StepStatus, VerificationResult};
use crate::io::run_log::RunLog;
use crate::probe;
use crate::step::{Host, Step, StepOutcome, run_step};

/// An abort-class step failure. Halts the sequence; no later step runs.
#[derive(Debug, Clone)]
pub struct StepFailure {
    pub step: String,
    pub detail: String,
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {} failed: {}", self.step, self.detail)
    }
}

impl std::error::Error for StepFailure {}

/// The final verification phase found required capabilities missing.
#[derive(Debug, Clone)]
pub struct VerificationFailure {
    pub missing: Vec<String>,
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "verification failed, missing: {}",
            self.missing.join(", ")
        )
    }
}

impl std::error::Error for VerificationFailure {}

/// Everything a completed run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub steps: Vec<StepOutcome>,
    pub readiness: Vec<VerificationResult>,
}

/// Execute every step in order, then probe every required capability.
///
/// `on_step` fires after each executed step (for console status lines).
/// Returns `Err` carrying [`StepFailure`] when an abort-class step fails and
/// [`VerificationFailure`] when the end-state check does not pass; in both
/// cases the run log already holds the diagnostic records.
pub fn run_sequence<F: FnMut(&StepOutcome)>(
    plan: &[Step],
    required: &[Capability],
    host: &Host,
    log: &mut RunLog,
    mut on_step: F,
) -> Result<RunSummary> {
    let mut steps = Vec::with_capacity(plan.len());

    for step in plan {
        let outcome = run_step(step, host, log)?;
        on_step(&outcome);
        let failed = outcome.status == StepStatus::Failed;
        let detail = outcome.detail.clone();
        steps.push(outcome);

        if failed && step.policy == FailurePolicy::Abort {
            return Err(StepFailure {
                step: step.name.to_string(),
                detail: detail.unwrap_or_else(|| "unknown failure".to_string()),
            }
            .into());
        }
    }

    log.info("verifying end-state")?;
    let readiness = probe::probe_all(required, host.commands);
    let missing: Vec<String> = readiness
        .iter()
        .filter(|result| !result.present)
        .map(|result| result.tool.clone())
        .collect();

    if !missing.is_empty() {
        log.fail(&format!("verification failed, missing: {}", missing.join(", ")))?;
        return Err(VerificationFailure { missing }.into());
    }

    for result in &readiness {
        let version = result.version.as_deref().unwrap_or("unknown version");
        log.ok(&format!("{} ready ({version})", result.tool))?;
    }
    info!(steps = steps.len(), "sequence complete");
    Ok(RunSummary { steps, readiness })
}
