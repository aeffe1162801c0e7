//! User/group directory adapter.

use anyhow::{Context, Result};

use crate::io::process::CommandRunner;

/// Abstraction over the host user directory.
pub trait UserDirectory {
    fn user_exists(&self, name: &str) -> Result<bool>;

    /// Whether `name` is already a member of `group`. Unknown users are
    /// simply not members.
    fn user_in_group(&self, name: &str, group: &str) -> Result<bool>;

    /// Add `name` to `group`. Adding a user that is already a member must
    /// succeed (the underlying `usermod -aG` is a no-op in that case).
    fn add_user_to_group(&self, name: &str, group: &str) -> Result<bool>;
}

/// Real directory backed by the passwd database and `usermod`.
pub struct EtcUserDirectory<'a> {
    commands: &'a dyn CommandRunner,
}

impl<'a> EtcUserDirectory<'a> {
    pub fn new(commands: &'a dyn CommandRunner) -> Self {
        Self { commands }
    }
}

impl UserDirectory for EtcUserDirectory<'_> {
    fn user_exists(&self, name: &str) -> Result<bool> {
        let user = nix::unistd::User::from_name(name)
            .with_context(|| format!("look up user {name}"))?;
        Ok(user.is_some())
    }

    fn user_in_group(&self, name: &str, group: &str) -> Result<bool> {
        let output = self.commands.run("id", &["-nG", name])?;
        if !output.success {
            return Ok(false);
        }
        let groups = String::from_utf8_lossy(&output.stdout);
        Ok(groups.split_whitespace().any(|g| g == group))
    }

    fn add_user_to_group(&self, name: &str, group: &str) -> Result<bool> {
        let output = self.commands.run("usermod", &["-aG", group, name])?;
        Ok(output.success)
    }
}
