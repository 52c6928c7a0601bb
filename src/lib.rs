// src/lib.rs

pub mod cli;
pub mod config;
pub mod confirm;
pub mod control;
pub mod coordinator;
pub mod errors;
pub mod launch;
pub mod logging;
pub mod process;
pub mod profile;
pub mod session;
pub mod types;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::confirm::{AutoApprove, ConfirmPrefs, ConfirmationPolicy, PrefsConfirmation};
use crate::control::{PromptSlot, TerminalPrompt};
use crate::coordinator::{
    Coordinator, CoordinatorOptions, TracingLifecycleBus,
    runtime::CoordinatorServices,
};
use crate::errors::RelaunchError;
use crate::launch::{
    AlwaysReady, BeforeStepProviders, CommandRunner, ShellStepProvider, SingleRunnerResolver,
};
use crate::profile::{ProfileId, RunProfile, profiles_from_config};
use crate::types::ExecutorKind;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - confirmation policy (terminal prompt or `--yes`)
/// - the run session coordinator and its backends
/// - initial profile launches
/// - the stdin control loop and Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let profiles: Arc<BTreeMap<ProfileId, Arc<RunProfile>>> = Arc::new(
        profiles_from_config(&cfg)
            .into_iter()
            .map(|(name, profile)| (name, Arc::new(profile)))
            .collect(),
    );

    // Prompt answers are routed through the control loop's stdin reader.
    let slot = PromptSlot::new();

    let policy: Arc<dyn ConfirmationPolicy> = if args.yes {
        Arc::new(AutoApprove)
    } else {
        let prefs_path = PathBuf::from(&cfg.settings.confirm_prefs_path);
        let prefs = ConfirmPrefs::load_or_default(&prefs_path)?;
        let prompt = Arc::new(TerminalPrompt::new(slot.clone()));
        Arc::new(PrefsConfirmation::new(prefs, Some(prefs_path), prompt))
    };

    let services = CoordinatorServices {
        resolver: Arc::new(SingleRunnerResolver::new(Arc::new(CommandRunner))),
        policy,
        bus: Arc::new(TracingLifecycleBus),
        providers: Arc::new(
            BeforeStepProviders::new().register("shell", Arc::new(ShellStepProvider)),
        ),
        gate: Arc::new(AlwaysReady),
    };

    let options = CoordinatorOptions::from_settings(&cfg.settings);
    let (coordinator, handle) = Coordinator::new(services, options);

    // Ctrl-C → graceful shutdown.
    {
        let handle = handle.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = handle.shutdown();
        });
    }

    // Launch the profiles named on the command line.
    for name in &args.profiles {
        let profile = profiles
            .get(name)
            .ok_or_else(|| RelaunchError::ProfileNotFound(name.clone()))?;
        info!(profile = %name, "launching startup profile");
        handle.restart_profile(Arc::clone(profile), ExecutorKind::Run)?;
    }

    // Interactive commands come in on stdin.
    tokio::spawn(control::run_control_loop(
        handle.clone(),
        Arc::clone(&profiles),
        slot,
    ));

    coordinator.run().await?;
    Ok(())
}

/// Simple dry-run output: print profiles and their policies.
fn print_dry_run(cfg: &ConfigFile) {
    println!("relaunch dry-run");
    println!(
        "  settings.wait_initial_delay_ms = {}",
        cfg.settings.wait_initial_delay_ms
    );
    println!(
        "  settings.wait_interval_ms = {}",
        cfg.settings.wait_interval_ms
    );
    if let Some(max) = cfg.settings.max_wait_checks {
        println!("  settings.max_wait_checks = {max}");
    }
    println!();

    println!("profiles ({}):", cfg.profile.len());
    for (name, profile) in cfg.profile.iter() {
        println!("  - {name}");
        println!("      cmd: {}", profile.cmd);
        if let Some(ref cwd) = profile.cwd {
            println!("      cwd: {cwd}");
        }
        if profile.singleton {
            println!("      singleton: true");
        }
        if let Some(ref stops) = profile.must_stop_for {
            println!("      must_stop_for: {stops:?}");
        }
        if profile.detach {
            println!("      detach: true");
        }
        for step in &profile.before {
            match &step.cmd {
                Some(cmd) => println!("      before[{}]: {}", step.provider, cmd),
                None => println!("      before[{}]", step.provider),
            }
        }
    }
}
