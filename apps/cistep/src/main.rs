//! cistep - Resolve and run CI source checkout steps
//!
//! Loads a source step definition and a build description, resolves the
//! branch, revision and patch the step should check out, and hands them to
//! the step's backend.

mod cli;
mod display;
mod error;
mod events;
mod logging;

use crate::cli::{Cli, Commands, GlobalArgs};
use crate::display::{CommandOutput, OutputRenderer};
use crate::error::CliError;
use crate::events::EventHandler;
use clap::Parser;
use cistep_config::{BuildDefinition, Config, StepDefinition};
use cistep_events::{EventEmitter, EventReceiver, EventSender};
use cistep_steps::{backend_for, InMemoryBuild, SourceStep};
use cistep_types::{ColorChoice, OutputFormat};
use std::path::Path;
use std::process;
use tokio::select;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Parse command line arguments first to check for JSON mode
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    init_tracing(json_mode, cli.global.debug);

    if let Err(e) = run(cli).await {
        error!("Application error: {}", e);
        if !json_mode {
            eprintln!("Error: {e}");
        }
        process::exit(1);
    }
}

/// Main application logic
async fn run(cli: Cli) -> Result<(), CliError> {
    info!("Starting cistep v{}", env!("CARGO_PKG_VERSION"));

    // 1. File config (or defaults), 2. environment, 3. CLI flags
    let mut config = Config::load_or_default(cli.global.config.as_deref()).await?;
    config.merge_env()?;
    apply_cli_config(&mut config, &cli.global);
    let json = config.general.default_output == OutputFormat::Json;
    let config_source = cli
        .global
        .config
        .as_deref()
        .map_or_else(|| "default".to_string(), |path| path.display().to_string());

    let colors_enabled = match config.general.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => console::Term::stdout().features().colors_supported(),
    };
    let renderer = OutputRenderer::new(json, colors_enabled);

    let (event_sender, event_receiver) = cistep_events::channel();
    let mut event_handler = EventHandler::new(colors_enabled, json);
    event_sender.emit_configuration_validated(config_source, config.warnings());

    let output = execute_command_with_events(
        cli.command,
        config,
        event_sender,
        event_receiver,
        &mut event_handler,
    )
    .await?;

    renderer.render(&output)?;

    if let CommandOutput::Run { result, .. } = output {
        if result.is_failure() {
            return Err(CliError::StepFailed(result));
        }
    }

    info!("Command completed successfully");
    Ok(())
}

fn apply_cli_config(config: &mut Config, global: &GlobalArgs) {
    if let Some(color) = global.color {
        config.general.color = color;
    }
    if global.json {
        config.general.default_output = OutputFormat::Json;
    }
}

/// Execute command with concurrent event handling
async fn execute_command_with_events(
    command: Commands,
    config: Config,
    event_sender: EventSender,
    mut event_receiver: EventReceiver,
    event_handler: &mut EventHandler,
) -> Result<CommandOutput, CliError> {
    let mut command_future = Box::pin(execute_command(command, config, event_sender));

    loop {
        select! {
            result = &mut command_future => {
                // Drain any remaining events
                while let Ok(event) = event_receiver.try_recv() {
                    event_handler.handle_event(event);
                }
                return result;
            }

            event = event_receiver.recv() => {
                match event {
                    Some(event) => event_handler.handle_event(event),
                    None => { /* Channel closed: keep waiting for command to finish */ }
                }
            }
        }
    }
}

async fn execute_command(
    command: Commands,
    config: Config,
    events: EventSender,
) -> Result<CommandOutput, CliError> {
    match command {
        Commands::Describe { step, done } => {
            let definition = StepDefinition::load_from_file(&step).await?;
            let backend = backend_for(&definition)?;
            let mut step = SourceStep::new(backend, &definition, &config.steps)?;
            // Without a build only keyword placeholders can be filled in
            let name = step
                .render_name(&InMemoryBuild::default())
                .map(str::to_string)
                .unwrap_or_else(|_| step.name().to_string());
            Ok(CommandOutput::Description {
                name,
                words: step.describe(done),
            })
        }

        Commands::Members { backend, group } => {
            let definition = StepDefinition {
                backend: Some(backend.clone()),
                ..StepDefinition::default()
            };
            let vcs = backend_for(&definition)?;
            let names: Vec<&str> = match &group {
                Some(group) => vec![group.as_str()],
                None => vcs.attr_group_names().to_vec(),
            };
            let groups = names
                .into_iter()
                .map(|name| (name.to_string(), vcs.attr_group_members(name)))
                .collect();
            Ok(CommandOutput::Members { backend, groups })
        }

        Commands::Run {
            step,
            build,
            branch,
        } => run_step(&step, build.as_deref(), branch, &config, events).await,
    }
}

async fn run_step(
    step_path: &Path,
    build_path: Option<&Path>,
    branch: Option<String>,
    config: &Config,
    events: EventSender,
) -> Result<CommandOutput, CliError> {
    let definition = StepDefinition::load_from_file(step_path).await?;
    let build = match build_path {
        Some(path) => BuildDefinition::load_from_file(path).await?,
        None => BuildDefinition::default(),
    };
    let build = InMemoryBuild::from_definition(build);

    let backend = backend_for(&definition)?;
    let mut step = SourceStep::new(backend, &definition, &config.steps)?
        .with_event_sender(events.clone());
    if branch.is_some() {
        step.set_branch(branch)?;
    }

    let interrupt = step.interrupt_handle();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.interrupt("interrupted by user");
        }
    });

    events.emit_operation_started(format!("run {}", step.name()));
    let result = step.start_step(&build).await;
    ctrl_c.abort();
    let result = result?;
    events.emit_operation_completed(format!("run {}", step.name()), !result.is_failure());

    Ok(CommandOutput::Run {
        name: step.name().to_string(),
        codebase: step.codebase().to_string(),
        branch: step.branch().map(str::to_string),
        result,
        description: step.describe(true),
        logs: step
            .logs()
            .iter()
            .map(|log| (log.name.clone(), log.text.clone()))
            .collect(),
        properties: build.properties(),
    })
}

/// Initialize tracing/logging
///
/// Logs go to stderr so stdout stays clean for results. JSON mode silences
/// logging unless debugging was requested, in which case records are JSON.
fn init_tracing(json_mode: bool, debug_enabled_flag: bool) {
    let debug_enabled = std::env::var("RUST_LOG").is_ok() || debug_enabled_flag;
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new("info,cistep=debug,cistep_steps=debug")
        })
    };

    if json_mode {
        if debug_enabled {
            tracing_subscriber::fmt()
                .json()
                .with_writer(std::io::stderr)
                .with_env_filter(filter())
                .init();
        } else {
            tracing_subscriber::fmt()
                .with_writer(std::io::sink)
                .with_env_filter("off")
                .init();
        }
    } else if debug_enabled {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter())
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter("warn")
            .without_time()
            .with_target(false)
            .init();
    }
}
