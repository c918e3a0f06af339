use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};

use bidspm_runner::{
    color_enabled_stderr, exit_code_for_anyhow, exit_code_for_io_error, log_error_stderr,
    resolve_model, runtime_path, validate_model, Backend, ColorMode, ContainerConfigDoc,
    DryRunRunner, Orchestrator, ProcessRunner, RunConfig, RunContext,
    DEFAULT_CONFIG_FILE, DEFAULT_CONTAINER_CONFIG_FILE,
};

#[derive(Parser, Debug)]
#[command(
    name = "bidspm-runner",
    version,
    about = "Run containerized bidspm smoothing and statistics over tasks and subjects."
)]
struct Cli {
    /// Run configuration document
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Container backend document
    #[arg(long, default_value = DEFAULT_CONTAINER_CONFIG_FILE)]
    container_config: PathBuf,

    /// Color output mode
    #[arg(long, value_enum)]
    color: Option<ColorMode>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug, Clone)]
enum Cmd {
    /// Execute the full task/subject processing loop
    Run {
        /// Build and print every invocation without executing anything
        #[arg(long)]
        dry_run: bool,
        /// Process a single randomly selected subject per task
        #[arg(long)]
        pilot: bool,
    },
    /// Run diagnostics to check environment and configuration
    Doctor,
    /// Reclaim scratch directories older than the retention threshold
    Sweep {
        /// Retention threshold in hours
        #[arg(long, default_value_t = 24)]
        max_age_hours: u64,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Some(mode) = cli.color {
        bidspm_runner::set_color_mode(mode);
    }

    match &cli.command {
        Cmd::Doctor => run_doctor(&cli),
        Cmd::Sweep { max_age_hours } => run_sweep(&cli, *max_age_hours),
        Cmd::Run { dry_run, pilot } => run_pipeline(&cli, *dry_run, *pilot),
    }
}

fn fatal(msg: &str) {
    log_error_stderr(color_enabled_stderr(), &format!("bidspm-runner: {msg}"));
}

fn run_pipeline(cli: &Cli, dry_run: bool, pilot: bool) -> ExitCode {
    let cfg = match RunConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            fatal(&format!("{e:#}"));
            return ExitCode::from(exit_code_for_anyhow(&e));
        }
    };
    let doc = match ContainerConfigDoc::load(&cli.container_config) {
        Ok(d) => d,
        Err(e) => {
            fatal(&format!("{e:#}"));
            return ExitCode::from(exit_code_for_anyhow(&e));
        }
    };
    let backend = match Backend::from_doc(&doc) {
        Ok(b) => b,
        Err(e) => {
            fatal(&e.to_string());
            return ExitCode::from(exit_code_for_io_error(&e));
        }
    };

    // Runtime presence is checked before any work is committed; the probe
    // afterwards is advisory only.
    if !dry_run {
        match backend.runtime() {
            Ok(runtime) => bidspm_runner::compatibility_probe(&runtime),
            Err(e) => {
                fatal(&e.to_string());
                return ExitCode::from(exit_code_for_io_error(&e));
            }
        }
    }

    let ctx = RunContext::create(&cfg.wd, cfg.models_file.as_deref(), cfg.verbosity);
    ctx.debug(&format!(
        "backend: {} ({})",
        backend.runtime_program(),
        backend.image_display()
    ));

    let model = match &cfg.models_file {
        Some(reference) => match resolve_model(reference, &cfg.derivatives_dir) {
            Ok(m) => {
                if !dry_run {
                    if let Err(e) = validate_model(&cfg.model_validator, &m, &ctx) {
                        fatal(&format!("{e:#}"));
                        return ExitCode::from(exit_code_for_anyhow(&e));
                    }
                }
                Some(m)
            }
            Err(e) => {
                fatal(&e.to_string());
                return ExitCode::from(exit_code_for_io_error(&e));
            }
        },
        None => None,
    };

    let orchestrator = Orchestrator::new(&cfg, &backend, &ctx, model, pilot);
    let summary = if dry_run {
        orchestrator.execute(&mut DryRunRunner)
    } else {
        orchestrator.execute(&mut ProcessRunner)
    };

    match summary {
        Ok(s) => {
            match ctx.log_path() {
                Some(path) => ctx.log(&format!(
                    ">>> All processing complete. Logs saved to {}",
                    path.display()
                )),
                None => ctx.log(">>> All processing complete."),
            }
            if s.failed == 0 {
                ExitCode::from(0)
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            fatal(&format!("{e:#}"));
            ExitCode::from(exit_code_for_anyhow(&e))
        }
    }
}

fn run_sweep(cli: &Cli, max_age_hours: u64) -> ExitCode {
    let cfg = match RunConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            fatal(&format!("{e:#}"));
            return ExitCode::from(exit_code_for_anyhow(&e));
        }
    };
    let removed = bidspm_runner::sweep_scratch(
        &cfg.scratch_root(),
        Duration::from_secs(max_age_hours * 3600),
    );
    println!("sweep: removed {removed} scratch directories older than {max_age_hours}h");
    ExitCode::from(0)
}

fn run_doctor(cli: &Cli) -> ExitCode {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("bidspm-runner doctor");
    eprintln!("  version: v{}", version);
    eprintln!("  built: {} ({} {})",
        env!("BIDSPM_RUNNER_BUILD_DATE"),
        env!("BIDSPM_RUNNER_BUILD_TARGET"),
        env!("BIDSPM_RUNNER_BUILD_PROFILE"),
    );
    eprintln!("  rustc: {}", env!("BIDSPM_RUNNER_BUILD_RUSTC"));
    eprintln!("  host: {} / {}", std::env::consts::OS, std::env::consts::ARCH);

    for program in ["docker", "apptainer"] {
        match runtime_path(program) {
            Ok(p) => eprintln!("  {program}: {}", p.display()),
            Err(e) => eprintln!("  {program}: not found ({e})"),
        }
    }

    match ContainerConfigDoc::load(&cli.container_config).and_then(|d| Ok(Backend::from_doc(&d)?)) {
        Ok(b) => eprintln!(
            "  backend: {} (image: {})",
            b.runtime_program(),
            b.image_display()
        ),
        Err(e) => eprintln!("  backend: unavailable ({e:#})"),
    }

    match RunConfig::load(&cli.config) {
        Ok(cfg) => {
            eprintln!("  tasks: {}", cfg.tasks.join(", "));
            eprintln!("  space: {}", cfg.space);
            eprintln!(
                "  actions: smooth={} stats={} dataset={}",
                cfg.smooth, cfg.stats, cfg.dataset
            );
            eprintln!("  fmriprep: {}", cfg.fmriprep_dir.display());
        }
        Err(e) => eprintln!("  run config: unavailable ({e:#})"),
    }

    eprintln!("doctor: completed diagnostics.");
    ExitCode::from(0)
}
