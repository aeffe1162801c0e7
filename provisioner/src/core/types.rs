//! Shared types for steps, chains, and verification results.

use serde::Serialize;

/// What the sequencer does when a step's action fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop the entire sequence immediately.
    Abort,
    /// Record the failure and move on to the next step.
    Continue,
}

/// Result of executing one step's action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// The action ran and reported success.
    Completed,
    /// The end-state already held, nothing was executed.
    Skipped,
    /// The action (or every fallback attempt) failed.
    Failed,
}

/// A capability the host must end up with.
///
/// Capabilities name end-states, not binaries: `Compose` is satisfied by
/// either the `docker compose` plugin subcommand or a standalone
/// `docker-compose` binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Docker,
    Compose,
    AwsCli,
    Eksctl,
    Kubectl,
}

impl Capability {
    /// Short name used in logs and the readiness report.
    pub fn tool(&self) -> &'static str {
        match self {
            Capability::Docker => "docker",
            Capability::Compose => "compose",
            Capability::AwsCli => "aws",
            Capability::Eksctl => "eksctl",
            Capability::Kubectl => "kubectl",
        }
    }
}

/// Read-only answer to "is this tool present and does it report a version".
///
/// Produced by probes; never mutates host state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub tool: String,
    pub present: bool,
    pub version: Option<String>,
}

impl VerificationResult {
    pub fn missing(tool: &str) -> Self {
        Self {
            tool: tool.to_string(),
            present: false,
            version: None,
        }
    }

    pub fn present(tool: &str, version: Option<String>) -> Self {
        Self {
            tool: tool.to_string(),
            present: true,
            version,
        }
    }
}
