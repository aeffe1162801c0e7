//! Fallback resolver: ordered alternatives for one required end-state.
//!
//! Acceptance is always the verification probe, never an attempt's raw exit
//! status: a package-manager call that reports success does not guarantee
//! the capability actually works, and a download that errored may still
//! leave an earlier method usable.

use anyhow::Result;
use tracing::debug;

use crate::core::types::{Capability, VerificationResult};
use crate::io::run_log::RunLog;
use crate::probe;
use crate::step::Host;

/// One way of reaching the chain's end-state.
pub struct Attempt {
    pub name: &'static str,
    pub action: Box<dyn Fn(&Host, &mut RunLog) -> Result<()>>,
}

/// Ordered alternatives targeting the same capability, preferred method
/// first.
pub struct FallbackChain {
    pub capability: Capability,
    pub attempts: Vec<Attempt>,
}

/// Outcome of resolving a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub capability: Capability,
    /// Accepted attempt name; `None` when the capability was already
    /// present and no attempt ran.
    pub method: Option<&'static str>,
    pub result: VerificationResult,
}

/// Try each attempt in declared order, accepting the first whose probe
/// passes.
///
/// An attempt that errors outright (network failure, missing helper binary)
/// is recorded and resolution moves on; the chain only fails once every
/// member is exhausted and the probe still does not pass. Re-running a
/// resolved chain short-circuits on the initial probe.
pub fn resolve(chain: &FallbackChain, host: &Host, log: &mut RunLog) -> Result<Resolution> {
    let tool = chain.capability.tool();

    let initial = probe::probe(chain.capability, host.commands);
    if initial.present {
        log.ok(&format!("{tool} already present, nothing to do"))?;
        return Ok(Resolution {
            capability: chain.capability,
            method: None,
            result: initial,
        });
    }

    for attempt in &chain.attempts {
        log.info(&format!("{tool}: trying {}", attempt.name))?;
        if let Err(err) = (attempt.action)(host, log) {
            // Not fatal on its own; the next member may still succeed.
            log.info(&format!("{tool}: {} failed: {err:#}", attempt.name))?;
        }

        let result = probe::probe(chain.capability, host.commands);
        debug!(tool, attempt = attempt.name, present = result.present, "probed after attempt");
        if result.present {
            log.ok(&format!("{tool} available via {}", attempt.name))?;
            return Ok(Resolution {
                capability: chain.capability,
                method: Some(attempt.name),
                result,
            });
        }
        log.info(&format!(
            "{tool}: probe still failing after {}",
            attempt.name
        ))?;
    }

    log.fail(&format!("{tool}: all methods exhausted"))?;
    Ok(Resolution {
        capability: chain.capability,
        method: None,
        result: VerificationResult::missing(tool),
    })
}
