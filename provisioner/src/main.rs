//! Amazon Linux 2023 host provisioner.
//!
//! Installs Docker, a Docker Compose capability, and the AWS CLI (plus
//! eksctl/kubectl with `--kubernetes`) through an idempotent, fallback-aware
//! step sequence, then verifies the end-state and reports readiness.

use std::path::PathBuf;
use std::process::exit;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use provisioner::core::types::FailurePolicy;
use provisioner::io::config::{ProvisionerConfig, load_config};
use provisioner::io::fetch::HttpFetcher;
use provisioner::io::pkg::DnfPackageManager;
use provisioner::io::process::SystemCommandRunner;
use provisioner::io::run_log::RunLog;
use provisioner::io::svc::SystemdServiceManager;
use provisioner::io::users::EtcUserDirectory;
use provisioner::plan::{PlanOptions, build_plan, required_capabilities, resolve_target_user};
use provisioner::probe::probe_all;
use provisioner::report::{ReadinessReport, step_line, summary, write_report};
use provisioner::sequence::run_sequence;
use provisioner::step::Host;
use provisioner::{exit_codes, logging};

#[derive(Parser)]
#[command(
    name = "provisioner",
    version,
    about = "Provision an Amazon Linux 2023 host with Docker, Compose, and the AWS CLI"
)]
struct Cli {
    /// User to add to the docker group. Defaults to $SUDO_USER, then the
    /// configured default user.
    user: Option<String>,

    /// Also install Kubernetes client tooling (eksctl, kubectl).
    #[arg(long)]
    kubernetes: bool,

    /// Print the step plan without executing anything.
    #[arg(long)]
    plan: bool,

    /// Only run the read-only verification probes and report readiness.
    #[arg(long)]
    verify_only: bool,

    /// Configuration file.
    #[arg(long, default_value = "/etc/provisioner.toml")]
    config: PathBuf,

    /// Directory for run logs and report artifacts.
    #[arg(long, default_value = "/var/log/provisioner")]
    log_dir: PathBuf,
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            exit(exit_codes::FAILED);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let cfg = load_config(&cli.config)?;

    if cli.plan {
        return print_plan(&cli, &cfg);
    }
    if cli.verify_only {
        return verify_only(&cli, &cfg);
    }
    provision(&cli, &cfg)
}

/// List the steps a run would execute. Read-only, no root required.
fn print_plan(cli: &Cli, cfg: &ProvisionerConfig) -> Result<i32> {
    let user = resolve_target_user(
        cli.user.as_deref(),
        std::env::var("SUDO_USER").ok().as_deref(),
        cfg,
    );
    let opts = PlanOptions {
        user,
        kubernetes: cli.kubernetes,
    };
    for step in build_plan(&opts, cfg) {
        let policy = match step.policy {
            FailurePolicy::Abort => "required",
            FailurePolicy::Continue => "best-effort",
        };
        println!("{:<24} {policy}", step.name);
    }
    Ok(exit_codes::OK)
}

/// Probe every required capability and report. Read-only, no root required.
fn verify_only(cli: &Cli, cfg: &ProvisionerConfig) -> Result<i32> {
    let commands = SystemCommandRunner::new(
        Duration::from_secs(cfg.command_timeout_secs),
        cfg.output_limit_bytes,
    );
    let results = probe_all(&required_capabilities(cli.kubernetes), &commands);
    let report = ReadinessReport::from_results(results);
    println!("{}", summary(&report));
    if report.ready {
        Ok(exit_codes::OK)
    } else {
        Ok(exit_codes::FAILED)
    }
}

fn provision(cli: &Cli, cfg: &ProvisionerConfig) -> Result<i32> {
    if !nix::unistd::Uid::effective().is_root() {
        eprintln!("provisioner must run as root (try sudo)");
        return Ok(exit_codes::NOT_ROOT);
    }

    // The log exists before any provisioning action so early failures are
    // still captured.
    let mut log = RunLog::create(&cli.log_dir)?;
    let log_path = log.path().to_path_buf();

    let user = resolve_target_user(
        cli.user.as_deref(),
        std::env::var("SUDO_USER").ok().as_deref(),
        cfg,
    );
    let opts = PlanOptions {
        user: user.clone(),
        kubernetes: cli.kubernetes,
    };
    log.info(&format!(
        "provisioning started (user={user}, kubernetes={})",
        cli.kubernetes
    ))?;

    let commands = SystemCommandRunner::new(
        Duration::from_secs(cfg.command_timeout_secs),
        cfg.output_limit_bytes,
    );
    let fetcher = HttpFetcher::new(Duration::from_secs(cfg.download_timeout_secs))?;
    let pkg = DnfPackageManager::new(&commands);
    let svc = SystemdServiceManager::new(&commands);
    let users = EtcUserDirectory::new(&commands);
    let host = Host {
        pkg: &pkg,
        svc: &svc,
        users: &users,
        fetcher: &fetcher,
        commands: &commands,
    };

    let plan = build_plan(&opts, cfg);
    let required = required_capabilities(cli.kubernetes);

    match run_sequence(&plan, &required, &host, &mut log, |outcome| {
        println!("{}", step_line(outcome));
    }) {
        Ok(run) => {
            let report = ReadinessReport::from_results(run.readiness);
            println!("{}", summary(&report));
            let report_path = log_path.with_extension("report.json");
            write_report(&report_path, &report)?;
            println!("run log: {}", log_path.display());
            Ok(exit_codes::OK)
        }
        Err(err) => {
            eprintln!("{err:#}");
            eprintln!("diagnostics: {}", log_path.display());
            Ok(exit_codes::FAILED)
        }
    }
}
