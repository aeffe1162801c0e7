//! The static provisioning plan: which steps run, in which order, with
//! which fallback methods.
//!
//! Steps are defined up front before a run begins; nothing is created
//! dynamically mid-sequence. Every action is safe to re-run: installs are
//! skipped or re-asserted, group membership is append-only, and chains
//! short-circuit on their initial probe.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use serde_json::Value;

use crate::core::arch;
use crate::core::types::{Capability, FailurePolicy, StepStatus};
use crate::fallback::{Attempt, FallbackChain};
use crate::io::config::ProvisionerConfig;
use crate::io::fetch::make_executable;
use crate::io::run_log::RunLog;
use crate::step::{Host, Step};

const COMPOSE_RELEASE_URL: &str =
    "https://api.github.com/repos/docker/compose/releases/latest";
const COMPOSE_DOWNLOAD_BASE: &str = "https://github.com/docker/compose/releases/download";
const AWS_CLI_BUNDLE_BASE: &str = "https://awscli.amazonaws.com";
const EKSCTL_DOWNLOAD_BASE: &str =
    "https://github.com/eksctl-io/eksctl/releases/latest/download";
const KUBECTL_STABLE_URL: &str = "https://dl.k8s.io/release/stable.txt";
const KUBECTL_DOWNLOAD_BASE: &str = "https://dl.k8s.io/release";

/// What to provision on this run.
#[derive(Debug, Clone)]
pub struct PlanOptions {
    /// User added to the `docker` group.
    pub user: String,
    /// Also install Kubernetes client tooling (eksctl, kubectl).
    pub kubernetes: bool,
}

/// Pick the user added to the `docker` group: explicit argument first, then
/// the invoking sudo user, then the configured default.
pub fn resolve_target_user(
    arg: Option<&str>,
    sudo_user: Option<&str>,
    cfg: &ProvisionerConfig,
) -> String {
    arg.or(sudo_user)
        .map(str::to_string)
        .unwrap_or_else(|| cfg.default_user.clone())
}

/// Capabilities the final verification phase requires.
pub fn required_capabilities(kubernetes: bool) -> Vec<Capability> {
    let mut caps = vec![Capability::Docker, Capability::Compose, Capability::AwsCli];
    if kubernetes {
        caps.push(Capability::Eksctl);
        caps.push(Capability::Kubectl);
    }
    caps
}

/// Build the ordered step list for one run.
pub fn build_plan(opts: &PlanOptions, cfg: &ProvisionerConfig) -> Vec<Step> {
    let mut steps = vec![
        refresh_packages(),
        install_docker(),
        enable_docker_service(),
        docker_group(opts.user.clone()),
        Step::chain("compose", compose_chain(cfg)),
        Step::chain("aws-cli", aws_cli_chain()),
    ];
    if opts.kubernetes {
        steps.push(Step::chain("eksctl", eksctl_chain(cfg)));
        steps.push(Step::chain("kubectl", kubectl_chain(cfg)));
    }
    steps
}

/// Best-effort metadata/package refresh, mirroring `dnf update -y`.
fn refresh_packages() -> Step {
    Step::action(
        "refresh-packages",
        FailurePolicy::Continue,
        Box::new(|host, _log| {
            let output = host.commands.run("dnf", &["update", "-y"])?;
            if output.success {
                Ok(StepStatus::Completed)
            } else {
                Err(anyhow!("dnf update exited non-zero"))
            }
        }),
    )
}

fn install_docker() -> Step {
    Step::action(
        "install-docker",
        FailurePolicy::Abort,
        Box::new(|host, log| {
            if host.pkg.query_installed("docker")? {
                log.info("docker package already installed")?;
                return Ok(StepStatus::Skipped);
            }
            if host.pkg.install(&["docker"])? {
                Ok(StepStatus::Completed)
            } else {
                Err(anyhow!("package install of docker failed"))
            }
        }),
    )
}

fn enable_docker_service() -> Step {
    Step::action(
        "enable-docker-service",
        FailurePolicy::Abort,
        Box::new(|host, log| {
            let already = host.svc.is_active("docker")?;
            if !host.svc.enable_and_start("docker")? {
                return Err(anyhow!("could not enable and start docker service"));
            }
            if already {
                log.info("docker service was already active, re-asserted")?;
                return Ok(StepStatus::Skipped);
            }
            Ok(StepStatus::Completed)
        }),
    )
}

fn docker_group(user: String) -> Step {
    Step::action(
        "docker-group",
        FailurePolicy::Abort,
        Box::new(move |host, log| {
            if !host.users.user_exists(&user)? {
                return Err(anyhow!("user {user} does not exist"));
            }
            if host.users.user_in_group(&user, "docker")? {
                log.info(&format!("user {user} is already in the docker group"))?;
                return Ok(StepStatus::Skipped);
            }
            if !host.users.add_user_to_group(&user, "docker")? {
                return Err(anyhow!("could not add {user} to the docker group"));
            }
            log.info(&format!("user {user} is in the docker group"))?;
            Ok(StepStatus::Completed)
        }),
    )
}

/// Compose: prefer the native plugin package, fall back to a standalone
/// binary download.
fn compose_chain(cfg: &ProvisionerConfig) -> FallbackChain {
    let plugin_package = cfg.compose.plugin_package.clone();
    let fallback_version = cfg.compose.fallback_version.clone();
    let dest = cfg.install_dir.join("docker-compose");

    FallbackChain {
        capability: Capability::Compose,
        attempts: vec![
            Attempt {
                name: "plugin-package",
                action: Box::new(move |host, _log| {
                    if host.pkg.install(&[&plugin_package])? {
                        Ok(())
                    } else {
                        Err(anyhow!("package install of {plugin_package} failed"))
                    }
                }),
            },
            Attempt {
                name: "standalone-binary",
                action: Box::new(move |host, log| {
                    let version =
                        compose_release_version(host, log, &fallback_version)?;
                    let url = format!(
                        "{COMPOSE_DOWNLOAD_BASE}/{version}/docker-compose-linux-{}",
                        arch::host_machine()
                    );
                    host.fetcher.fetch(&url, &dest)?;
                    make_executable(&dest)?;
                    Ok(())
                }),
            },
        ],
    }
}

/// Latest compose release tag, or the configured pin when the lookup fails.
///
/// The substitution is logged at warn level: silently installing a stale
/// pinned version is a correctness risk worth surfacing.
fn compose_release_version(
    host: &Host,
    log: &mut RunLog,
    fallback_version: &str,
) -> Result<String> {
    match lookup_compose_tag(host) {
        Ok(tag) => Ok(tag),
        Err(err) => {
            log.warn(&format!(
                "compose release lookup failed ({err:#}); falling back to pinned {fallback_version}"
            ))?;
            Ok(fallback_version.to_string())
        }
    }
}

fn lookup_compose_tag(host: &Host) -> Result<String> {
    let body = host.fetcher.fetch_text(COMPOSE_RELEASE_URL)?;
    let release: Value = serde_json::from_str(&body).context("parse release json")?;
    let tag = release
        .get("tag_name")
        .and_then(Value::as_str)
        .context("release json has no tag_name")?;
    Ok(tag.to_string())
}

/// AWS CLI: prefer the distribution package, fall back to the official
/// installer bundle.
fn aws_cli_chain() -> FallbackChain {
    FallbackChain {
        capability: Capability::AwsCli,
        attempts: vec![
            Attempt {
                name: "distribution-package",
                action: Box::new(|host, _log| {
                    if host.pkg.install(&["awscli-2"])? {
                        Ok(())
                    } else {
                        Err(anyhow!("package install of awscli-2 failed"))
                    }
                }),
            },
            Attempt {
                name: "installer-bundle",
                action: Box::new(|host, _log| {
                    let url = format!(
                        "{AWS_CLI_BUNDLE_BASE}/awscli-exe-linux-{}.zip",
                        arch::host_machine()
                    );
                    let archive = PathBuf::from("/tmp/awscliv2.zip");
                    host.fetcher.fetch(&url, &archive)?;
                    run_checked(host, "unzip", &["-o", "-q", "/tmp/awscliv2.zip", "-d", "/tmp"])?;
                    // --update makes the installer idempotent over an
                    // existing installation.
                    run_checked(host, "/tmp/aws/install", &["--update"])?;
                    Ok(())
                }),
            },
        ],
    }
}

/// eksctl has no distribution package; the release tarball is the only
/// method, but the chain still gives it probe acceptance and rerun
/// short-circuiting.
fn eksctl_chain(cfg: &ProvisionerConfig) -> FallbackChain {
    let dest = cfg.install_dir.join("eksctl");

    FallbackChain {
        capability: Capability::Eksctl,
        attempts: vec![Attempt {
            name: "release-tarball",
            action: Box::new(move |host, _log| {
                let url = format!(
                    "{EKSCTL_DOWNLOAD_BASE}/eksctl_Linux_{}.tar.gz",
                    arch::host_token()
                );
                let archive = PathBuf::from("/tmp/eksctl.tar.gz");
                host.fetcher.fetch(&url, &archive)?;
                run_checked(host, "tar", &["-xzf", "/tmp/eksctl.tar.gz", "-C", "/tmp"])?;
                std::fs::copy("/tmp/eksctl", &dest)
                    .with_context(|| format!("install eksctl to {}", dest.display()))?;
                make_executable(&dest)?;
                Ok(())
            }),
        }],
    }
}

fn kubectl_chain(cfg: &ProvisionerConfig) -> FallbackChain {
    let fallback_version = cfg.kubectl.fallback_version.clone();
    let dest = cfg.install_dir.join("kubectl");

    FallbackChain {
        capability: Capability::Kubectl,
        attempts: vec![Attempt {
            name: "release-binary",
            action: Box::new(move |host, log| {
                let version = match host.fetcher.fetch_text(KUBECTL_STABLE_URL) {
                    Ok(body) => body.trim().to_string(),
                    Err(err) => {
                        log.warn(&format!(
                            "kubectl stable lookup failed ({err:#}); falling back to pinned {fallback_version}"
                        ))?;
                        fallback_version.clone()
                    }
                };
                let url = format!(
                    "{KUBECTL_DOWNLOAD_BASE}/{version}/bin/linux/{}/kubectl",
                    arch::host_token()
                );
                host.fetcher.fetch(&url, &dest)?;
                make_executable(&dest)?;
                Ok(())
            }),
        }],
    }
}

fn run_checked(host: &Host, program: &str, args: &[&str]) -> Result<()> {
    let output = host.commands.run(program, args)?;
    if !output.success {
        return Err(anyhow!(
            "{program} exited non-zero: {}",
            output.stderr_text().trim()
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::run_log::RunLog;
    use crate::step::Work;
    use crate::test_support::ScriptedHost;
    use std::os::unix::fs::PermissionsExt;

    fn options(kubernetes: bool) -> PlanOptions {
        PlanOptions {
            user: "ec2-user".to_string(),
            kubernetes,
        }
    }

    #[test]
    fn base_plan_has_docker_compose_and_aws() {
        let cfg = ProvisionerConfig::default();
        let plan = build_plan(&options(false), &cfg);
        let names: Vec<&str> = plan.iter().map(|step| step.name).collect();
        assert_eq!(
            names,
            vec![
                "refresh-packages",
                "install-docker",
                "enable-docker-service",
                "docker-group",
                "compose",
                "aws-cli",
            ]
        );
    }

    #[test]
    fn kubernetes_plan_appends_client_tooling() {
        let cfg = ProvisionerConfig::default();
        let plan = build_plan(&options(true), &cfg);
        let names: Vec<&str> = plan.iter().map(|step| step.name).collect();
        assert_eq!(&names[6..], &["eksctl", "kubectl"]);
    }

    #[test]
    fn only_refresh_is_best_effort() {
        let cfg = ProvisionerConfig::default();
        let plan = build_plan(&options(true), &cfg);
        for step in &plan {
            let expected = if step.name == "refresh-packages" {
                FailurePolicy::Continue
            } else {
                FailurePolicy::Abort
            };
            assert_eq!(step.policy, expected, "step {}", step.name);
        }
    }

    #[test]
    fn target_user_prefers_argument_then_sudo_user() {
        let cfg = ProvisionerConfig::default();
        assert_eq!(
            resolve_target_user(Some("deploy"), Some("admin"), &cfg),
            "deploy"
        );
        assert_eq!(resolve_target_user(None, Some("admin"), &cfg), "admin");
        assert_eq!(resolve_target_user(None, None, &cfg), "ec2-user");
    }

    #[test]
    fn required_capabilities_track_kubernetes_flag() {
        assert_eq!(
            required_capabilities(false),
            vec![Capability::Docker, Capability::Compose, Capability::AwsCli]
        );
        assert_eq!(required_capabilities(true).len(), 5);
    }

    fn chain_of<'a>(plan: &'a [Step], name: &str) -> &'a FallbackChain {
        let step = plan.iter().find(|step| step.name == name).expect("step");
        match &step.work {
            Work::Chain(chain) => chain,
            Work::Action(_) => panic!("step {name} is not a chain"),
        }
    }

    #[test]
    fn docker_group_skips_when_user_already_member() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = ProvisionerConfig::default();
        let plan = build_plan(&options(false), &cfg);
        let step = plan
            .iter()
            .find(|step| step.name == "docker-group")
            .expect("step");
        let action = match &step.work {
            Work::Action(action) => action,
            Work::Chain(_) => panic!("docker-group is not a chain"),
        };

        let scripted = ScriptedHost::new();
        scripted.users.add_user("ec2-user");
        scripted.users.grant_membership("ec2-user", "docker");

        let mut log = RunLog::create(temp.path()).expect("log");
        let status = action(&scripted.host(), &mut log).expect("action");
        assert_eq!(status, StepStatus::Skipped);
        assert_eq!(scripted.users.add_call_count("ec2-user", "docker"), 0);
    }

    #[test]
    fn compose_chain_prefers_plugin_then_standalone() {
        let cfg = ProvisionerConfig::default();
        let plan = build_plan(&options(false), &cfg);
        let chain = chain_of(&plan, "compose");
        let names: Vec<&str> = chain.attempts.iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["plugin-package", "standalone-binary"]);
    }

    #[test]
    fn aws_chain_prefers_package_then_installer_bundle() {
        let cfg = ProvisionerConfig::default();
        let plan = build_plan(&options(false), &cfg);
        let chain = chain_of(&plan, "aws-cli");
        let names: Vec<&str> = chain.attempts.iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["distribution-package", "installer-bundle"]);
    }

    #[test]
    fn compose_standalone_downloads_looked_up_release() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = ProvisionerConfig {
            install_dir: temp.path().join("bin"),
            ..ProvisionerConfig::default()
        };
        let plan = build_plan(&options(false), &cfg);
        let attempt = &chain_of(&plan, "compose").attempts[1];

        let scripted = ScriptedHost::new();
        scripted
            .fetcher
            .serve_text(COMPOSE_RELEASE_URL, r#"{"tag_name": "v2.30.1"}"#);
        let url = format!(
            "{COMPOSE_DOWNLOAD_BASE}/v2.30.1/docker-compose-linux-{}",
            arch::host_machine()
        );
        scripted.fetcher.serve_artifact(&url, b"compose-binary");

        let mut log = RunLog::create(temp.path()).expect("log");
        (attempt.action)(&scripted.host(), &mut log).expect("attempt");

        let dest = temp.path().join("bin").join("docker-compose");
        let mode = std::fs::metadata(&dest).expect("stat").permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        assert!(scripted.fetcher.fetched_urls().contains(&url));
    }

    #[test]
    fn compose_lookup_failure_substitutes_pin_and_warns() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = ProvisionerConfig {
            install_dir: temp.path().join("bin"),
            ..ProvisionerConfig::default()
        };
        let plan = build_plan(&options(false), &cfg);
        let attempt = &chain_of(&plan, "compose").attempts[1];

        let scripted = ScriptedHost::new();
        // No release body staged: the lookup fails, the pin takes over.
        let pinned_url = format!(
            "{COMPOSE_DOWNLOAD_BASE}/{}/docker-compose-linux-{}",
            cfg.compose.fallback_version,
            arch::host_machine()
        );
        scripted.fetcher.serve_artifact(&pinned_url, b"compose-binary");

        let mut log = RunLog::create(temp.path()).expect("log");
        (attempt.action)(&scripted.host(), &mut log).expect("attempt");

        let contents = std::fs::read_to_string(log.path()).expect("read");
        assert!(contents.contains("falling back to pinned"));
        assert!(contents.contains(&cfg.compose.fallback_version));
        assert!(scripted.fetcher.fetched_urls().contains(&pinned_url));
    }

    #[test]
    fn kubectl_lookup_failure_substitutes_pin_and_warns() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = ProvisionerConfig {
            install_dir: temp.path().join("bin"),
            ..ProvisionerConfig::default()
        };
        let plan = build_plan(&options(true), &cfg);
        let attempt = &chain_of(&plan, "kubectl").attempts[0];

        let scripted = ScriptedHost::new();
        // No stable.txt body staged: the lookup fails, the pin takes over.
        let pinned_url = format!(
            "{KUBECTL_DOWNLOAD_BASE}/{}/bin/linux/{}/kubectl",
            cfg.kubectl.fallback_version,
            arch::host_token()
        );
        scripted.fetcher.serve_artifact(&pinned_url, b"kubectl-binary");

        let mut log = RunLog::create(temp.path()).expect("log");
        (attempt.action)(&scripted.host(), &mut log).expect("attempt");

        let contents = std::fs::read_to_string(log.path()).expect("read");
        assert!(contents.contains("falling back to pinned"));
        assert!(contents.contains(&cfg.kubectl.fallback_version));
        assert!(scripted.fetcher.fetched_urls().contains(&pinned_url));
    }

    #[test]
    fn kubectl_download_uses_arch_token_and_stable_lookup() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = ProvisionerConfig {
            install_dir: temp.path().join("bin"),
            ..ProvisionerConfig::default()
        };
        let plan = build_plan(&options(true), &cfg);
        let attempt = &chain_of(&plan, "kubectl").attempts[0];

        let scripted = ScriptedHost::new();
        scripted.fetcher.serve_text(KUBECTL_STABLE_URL, "v1.32.0\n");
        let url = format!(
            "{KUBECTL_DOWNLOAD_BASE}/v1.32.0/bin/linux/{}/kubectl",
            arch::host_token()
        );
        scripted.fetcher.serve_artifact(&url, b"kubectl-binary");

        let mut log = RunLog::create(temp.path()).expect("log");
        (attempt.action)(&scripted.host(), &mut log).expect("attempt");

        assert!(scripted.fetcher.fetched_urls().contains(&url));
        assert!(temp.path().join("bin").join("kubectl").exists());
    }
}
