//! Service manager adapter.

use anyhow::Result;

use crate::io::process::CommandRunner;

/// Abstraction over the host service manager.
pub trait ServiceManager {
    /// Enable the service at boot and start it now. Re-asserting an already
    /// enabled and running service must succeed.
    fn enable_and_start(&self, service: &str) -> Result<bool>;
    fn is_active(&self, service: &str) -> Result<bool>;
}

/// `systemctl`-backed implementation.
pub struct SystemdServiceManager<'a> {
    commands: &'a dyn CommandRunner,
}

impl<'a> SystemdServiceManager<'a> {
    pub fn new(commands: &'a dyn CommandRunner) -> Self {
        Self { commands }
    }
}

impl ServiceManager for SystemdServiceManager<'_> {
    fn enable_and_start(&self, service: &str) -> Result<bool> {
        let output = self.commands.run("systemctl", &["enable", "--now", service])?;
        Ok(output.success)
    }

    fn is_active(&self, service: &str) -> Result<bool> {
        let output = self
            .commands
            .run("systemctl", &["is-active", "--quiet", service])?;
        Ok(output.success)
    }
}
