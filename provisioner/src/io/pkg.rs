//! Package manager adapter.

use anyhow::Result;

use crate::io::process::CommandRunner;

/// Abstraction over the host package manager.
///
/// `Err` means the package manager itself could not be invoked; an install
/// that ran and failed is `Ok(false)` so callers decide the failure policy.
pub trait PackageManager {
    fn install(&self, packages: &[&str]) -> Result<bool>;
    fn query_installed(&self, package: &str) -> Result<bool>;
}

/// `dnf`-backed implementation for Amazon Linux 2023.
pub struct DnfPackageManager<'a> {
    commands: &'a dyn CommandRunner,
}

impl<'a> DnfPackageManager<'a> {
    pub fn new(commands: &'a dyn CommandRunner) -> Self {
        Self { commands }
    }
}

impl PackageManager for DnfPackageManager<'_> {
    fn install(&self, packages: &[&str]) -> Result<bool> {
        let mut args = vec!["install", "-y"];
        args.extend_from_slice(packages);
        let output = self.commands.run("dnf", &args)?;
        Ok(output.success)
    }

    fn query_installed(&self, package: &str) -> Result<bool> {
        // rpm -q exits non-zero for unknown packages; that is the answer,
        // not an error.
        let output = self.commands.run("rpm", &["-q", package])?;
        Ok(output.success)
    }
}
