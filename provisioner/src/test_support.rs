//! Scripted host fakes for sequencer tests.
//!
//! Each fake implements one host adapter trait over in-memory tables, so
//! tests can stage any host condition (packages missing, installs that
//! "succeed" without effect, dead services, unreachable downloads) without
//! touching the machine running the tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result, anyhow};

use crate::io::fetch::Fetcher;
use crate::io::pkg::PackageManager;
use crate::io::process::{CommandOutput, CommandRunner};
use crate::io::svc::ServiceManager;
use crate::io::users::UserDirectory;
use crate::step::Host;

fn ok_output(stdout: &str) -> CommandOutput {
    CommandOutput {
        success: true,
        exit_code: Some(0),
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
        truncated: 0,
        timed_out: false,
    }
}

fn failed_output() -> CommandOutput {
    CommandOutput {
        success: false,
        exit_code: Some(1),
        stdout: Vec::new(),
        stderr: b"scripted failure".to_vec(),
        truncated: 0,
        timed_out: false,
    }
}

#[derive(Default)]
struct CommandTable {
    binaries: BTreeSet<String>,
    outputs: BTreeMap<String, CommandOutput>,
    calls: Vec<String>,
}

/// Scripted [`CommandRunner`]. Cloning shares the underlying tables, so a
/// fallback attempt can make a binary "appear" mid-test.
#[derive(Clone, Default)]
pub struct ScriptedCommands {
    inner: Rc<RefCell<CommandTable>>,
}

impl ScriptedCommands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `program` resolvable on the fake `PATH`.
    pub fn provide_binary(&self, program: &str) {
        self.inner.borrow_mut().binaries.insert(program.to_string());
    }

    pub fn remove_binary(&self, program: &str) {
        self.inner.borrow_mut().binaries.remove(program);
    }

    /// Script `line` (full command line, space-joined) to succeed silently.
    pub fn succeed_on(&self, line: &str) {
        self.succeed_with(line, "");
    }

    /// Script `line` to succeed with `stdout`.
    pub fn succeed_with(&self, line: &str, stdout: &str) {
        self.inner
            .borrow_mut()
            .outputs
            .insert(line.to_string(), ok_output(stdout));
    }

    /// Every command line run so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.inner.borrow().calls.clone()
    }
}

impl CommandRunner for ScriptedCommands {
    fn lookup(&self, program: &str) -> Option<PathBuf> {
        if self.inner.borrow().binaries.contains(program) {
            Some(PathBuf::from(format!("/usr/bin/{program}")))
        } else {
            None
        }
    }

    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let mut line = program.to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        let mut inner = self.inner.borrow_mut();
        inner.calls.push(line.clone());
        Ok(inner.outputs.get(&line).cloned().unwrap_or_else(failed_output))
    }
}

/// Scripted [`PackageManager`]: installs succeed only for packages staged
/// as installable.
#[derive(Default)]
pub struct ScriptedPackages {
    installed: RefCell<BTreeSet<String>>,
    installable: RefCell<BTreeSet<String>>,
    install_calls: RefCell<Vec<String>>,
}

impl ScriptedPackages {
    pub fn mark_installed(&self, package: &str) {
        self.installed.borrow_mut().insert(package.to_string());
    }

    pub fn allow_install(&self, package: &str) {
        self.installable.borrow_mut().insert(package.to_string());
    }

    pub fn install_calls(&self) -> Vec<String> {
        self.install_calls.borrow().clone()
    }
}

impl PackageManager for ScriptedPackages {
    fn install(&self, packages: &[&str]) -> Result<bool> {
        self.install_calls
            .borrow_mut()
            .push(packages.join(" "));
        let installable = self.installable.borrow();
        if packages.iter().all(|name| installable.contains(*name)) {
            let mut installed = self.installed.borrow_mut();
            for name in packages {
                installed.insert((*name).to_string());
            }
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn query_installed(&self, package: &str) -> Result<bool> {
        Ok(self.installed.borrow().contains(package))
    }
}

/// Scripted [`ServiceManager`].
#[derive(Default)]
pub struct ScriptedServices {
    active: RefCell<BTreeSet<String>>,
    enable_calls: RefCell<Vec<String>>,
}

impl ScriptedServices {
    pub fn mark_active(&self, service: &str) {
        self.active.borrow_mut().insert(service.to_string());
    }

    pub fn enable_calls(&self) -> Vec<String> {
        self.enable_calls.borrow().clone()
    }
}

impl ServiceManager for ScriptedServices {
    fn enable_and_start(&self, service: &str) -> Result<bool> {
        self.enable_calls.borrow_mut().push(service.to_string());
        self.active.borrow_mut().insert(service.to_string());
        Ok(true)
    }

    fn is_active(&self, service: &str) -> Result<bool> {
        Ok(self.active.borrow().contains(service))
    }
}

/// Scripted [`UserDirectory`]. Every add call is recorded, so tests can
/// assert that reruns do not repeat the mutation.
#[derive(Default)]
pub struct ScriptedUsers {
    users: RefCell<BTreeSet<String>>,
    memberships: RefCell<BTreeSet<(String, String)>>,
    add_calls: RefCell<Vec<(String, String)>>,
}

impl ScriptedUsers {
    pub fn add_user(&self, name: &str) {
        self.users.borrow_mut().insert(name.to_string());
    }

    /// Stage an existing membership without recording an add call.
    pub fn grant_membership(&self, name: &str, group: &str) {
        self.memberships
            .borrow_mut()
            .insert((name.to_string(), group.to_string()));
    }

    /// How many times `add_user_to_group` was invoked for this pair.
    pub fn add_call_count(&self, name: &str, group: &str) -> usize {
        self.add_calls
            .borrow()
            .iter()
            .filter(|(n, g)| n == name && g == group)
            .count()
    }
}

impl UserDirectory for ScriptedUsers {
    fn user_exists(&self, name: &str) -> Result<bool> {
        Ok(self.users.borrow().contains(name))
    }

    fn user_in_group(&self, name: &str, group: &str) -> Result<bool> {
        Ok(self
            .memberships
            .borrow()
            .contains(&(name.to_string(), group.to_string())))
    }

    fn add_user_to_group(&self, name: &str, group: &str) -> Result<bool> {
        self.add_calls
            .borrow_mut()
            .push((name.to_string(), group.to_string()));
        if !self.users.borrow().contains(name) {
            return Ok(false);
        }
        self.memberships
            .borrow_mut()
            .insert((name.to_string(), group.to_string()));
        Ok(true)
    }
}

/// Scripted [`Fetcher`]: serves only staged URLs, errors on anything else
/// (the "network failure" case in resolver tests).
#[derive(Default)]
pub struct ScriptedFetcher {
    texts: RefCell<BTreeMap<String, String>>,
    artifacts: RefCell<BTreeMap<String, Vec<u8>>>,
    fetched: RefCell<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn serve_text(&self, url: &str, body: &str) {
        self.texts
            .borrow_mut()
            .insert(url.to_string(), body.to_string());
    }

    pub fn serve_artifact(&self, url: &str, bytes: &[u8]) {
        self.artifacts
            .borrow_mut()
            .insert(url.to_string(), bytes.to_vec());
    }

    pub fn fetched_urls(&self) -> Vec<String> {
        self.fetched.borrow().clone()
    }
}

impl Fetcher for ScriptedFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        self.fetched.borrow_mut().push(url.to_string());
        let artifacts = self.artifacts.borrow();
        let bytes = artifacts
            .get(url)
            .ok_or_else(|| anyhow!("no scripted artifact for {url}"))?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        fs::write(dest, bytes).with_context(|| format!("write {}", dest.display()))?;
        Ok(())
    }

    fn fetch_text(&self, url: &str) -> Result<String> {
        self.fetched.borrow_mut().push(url.to_string());
        self.texts
            .borrow()
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("no scripted body for {url}"))
    }
}

/// Bundle of all scripted adapters plus a [`Host`] view over them.
#[derive(Default)]
pub struct ScriptedHost {
    pub commands: ScriptedCommands,
    pub packages: ScriptedPackages,
    pub services: ScriptedServices,
    pub users: ScriptedUsers,
    pub fetcher: ScriptedFetcher,
}

impl ScriptedHost {
    /// Bare host: nothing installed, nothing installable, no users.
    pub fn new() -> Self {
        Self::default()
    }

    /// Host already in the target end-state for the base (non-Kubernetes)
    /// plan: docker installed and active, compose plugin working, AWS CLI
    /// present, `ec2-user` exists.
    pub fn ready() -> Self {
        let host = Self::new();
        host.packages.mark_installed("docker");
        host.services.mark_active("docker");
        host.users.add_user("ec2-user");
        host.commands.provide_binary("docker");
        host.commands
            .succeed_with("docker --version", "Docker version 25.0.3, build 4debf41");
        host.commands
            .succeed_with("docker compose version", "Docker Compose version v2.29.7");
        host.commands.provide_binary("aws");
        host.commands
            .succeed_with("aws --version", "aws-cli/2.17.0 Python/3.11.8 Linux");
        host
    }

    pub fn host(&self) -> Host<'_> {
        Host {
            pkg: &self.packages,
            svc: &self.services,
            users: &self.users,
            fetcher: &self.fetcher,
            commands: &self.commands,
        }
    }
}
