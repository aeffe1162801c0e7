//! Step runner: one named unit of provisioning work with a failure policy.

use anyhow::Result;
use tracing::debug;

use crate::core::types::{FailurePolicy, StepStatus};
use crate::fallback::{self, FallbackChain};
use crate::io::fetch::Fetcher;
use crate::io::pkg::PackageManager;
use crate::io::process::CommandRunner;
use crate::io::run_log::RunLog;
use crate::io::svc::ServiceManager;
use crate::io::users::UserDirectory;

/// The external collaborators a step is allowed to touch.
///
/// Threaded explicitly through every step so there is no ambient host state;
/// tests swap in scripted implementations.
pub struct Host<'a> {
    pub pkg: &'a dyn PackageManager,
    pub svc: &'a dyn ServiceManager,
    pub users: &'a dyn UserDirectory,
    pub fetcher: &'a dyn Fetcher,
    pub commands: &'a dyn CommandRunner,
}

/// A step action. Returns the resulting status; `Err` is treated as
/// [`StepStatus::Failed`] with the error text as detail.
pub type Action = Box<dyn Fn(&Host, &mut RunLog) -> Result<StepStatus>>;

/// One unit of provisioning work.
pub struct Step {
    pub name: &'static str,
    pub policy: FailurePolicy,
    pub work: Work,
}

/// What a step actually does: a single action, or a fallback chain that is
/// accepted by a verification probe.
pub enum Work {
    Action(Action),
    Chain(FallbackChain),
}

impl Step {
    pub fn action(name: &'static str, policy: FailurePolicy, action: Action) -> Self {
        Self {
            name,
            policy,
            work: Work::Action(action),
        }
    }

    /// Chains target required end-states, so their failure always aborts.
    pub fn chain(name: &'static str, chain: FallbackChain) -> Self {
        Self {
            name,
            policy: FailurePolicy::Abort,
            work: Work::Chain(chain),
        }
    }
}

/// Result of running one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub name: &'static str,
    pub status: StepStatus,
    /// Failure detail, or the accepted fallback method for chains.
    pub detail: Option<String>,
}

/// Execute one step, appending records to the run log.
///
/// Failure policy is enforced by the caller ([`crate::sequence`]); this
/// function only maps the action result to an outcome. `Err` is reserved
/// for run log write failures.
pub fn run_step(step: &Step, host: &Host, log: &mut RunLog) -> Result<StepOutcome> {
    debug!(step = step.name, "running step");
    log.info(&format!("step {} started", step.name))?;

    let (status, detail) = match &step.work {
        Work::Action(action) => match action(host, log) {
            Ok(status) => (status, None),
            Err(err) => (StepStatus::Failed, Some(format!("{err:#}"))),
        },
        Work::Chain(chain) => {
            let resolution = fallback::resolve(chain, host, log)?;
            if resolution.result.present {
                let status = match resolution.method {
                    Some(_) => StepStatus::Completed,
                    None => StepStatus::Skipped,
                };
                (status, resolution.method.map(str::to_string))
            } else {
                let detail = format!(
                    "no method produced a working {}",
                    chain.capability.tool()
                );
                (StepStatus::Failed, Some(detail))
            }
        }
    };

    match status {
        StepStatus::Completed => log.ok(&format!("step {} completed", step.name))?,
        StepStatus::Skipped => log.ok(&format!("step {} skipped (already satisfied)", step.name))?,
        StepStatus::Failed => {
            let detail = detail.as_deref().unwrap_or("unknown failure");
            match step.policy {
                FailurePolicy::Abort => {
                    log.fail(&format!("step {} failed: {detail}", step.name))?;
                }
                FailurePolicy::Continue => {
                    log.info(&format!(
                        "step {} failed (best effort, continuing): {detail}",
                        step.name
                    ))?;
                }
            }
        }
    }

    Ok(StepOutcome {
        name: step.name,
        status,
        detail,
    })
}
