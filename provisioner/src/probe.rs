//! Verification probes: read-only capability checks.
//!
//! Probes decide whether a fallback attempt actually worked and feed the
//! final readiness report. They only look up binaries and run version
//! subcommands, so calling them any number of times is safe.

use crate::core::types::{Capability, VerificationResult};
use crate::io::process::CommandRunner;

/// Check whether a capability is present and working.
pub fn probe(capability: Capability, commands: &dyn CommandRunner) -> VerificationResult {
    match capability {
        Capability::Docker => version_probe(commands, "docker", "docker", &["--version"]),
        Capability::Compose => compose_probe(commands),
        Capability::AwsCli => version_probe(commands, "aws", "aws", &["--version"]),
        Capability::Eksctl => version_probe(commands, "eksctl", "eksctl", &["version"]),
        Capability::Kubectl => {
            version_probe(commands, "kubectl", "kubectl", &["version", "--client"])
        }
    }
}

/// Probe every capability in `capabilities`, in order.
pub fn probe_all(
    capabilities: &[Capability],
    commands: &dyn CommandRunner,
) -> Vec<VerificationResult> {
    capabilities
        .iter()
        .map(|capability| probe(*capability, commands))
        .collect()
}

/// Compose is capability-oriented: the plugin subcommand and the standalone
/// binary are both acceptable surfaces.
fn compose_probe(commands: &dyn CommandRunner) -> VerificationResult {
    let plugin = version_probe(commands, "compose", "docker", &["compose", "version"]);
    if plugin.present {
        return plugin;
    }
    version_probe(commands, "compose", "docker-compose", &["--version"])
}

fn version_probe(
    commands: &dyn CommandRunner,
    tool: &str,
    program: &str,
    args: &[&str],
) -> VerificationResult {
    if commands.lookup(program).is_none() {
        return VerificationResult::missing(tool);
    }
    match commands.run(program, args) {
        Ok(output) if output.success => VerificationResult::present(tool, output.first_line()),
        _ => VerificationResult::missing(tool),
    }
}
