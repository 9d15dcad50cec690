use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use fb_app::{
    AppResult, IterationLog, LocalRunOptions, RandomPolicy, SimulatorSession, VanDerPolProvider,
    load_episode_config, run_local,
};
use fb_model::{
    Approver, AutoApprove, ResolveRequest, RoleAssignment, RoleSource, RoleStore, StateInclusion,
    VariableCatalog, load_description_yaml, reserved, resolve_roles,
};
use fb_sim::{LoadOptions, Values};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fb-cli")]
#[command(about = "FMU bridge CLI - model interface resolution and local episode runs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the variables a model description exposes
    Describe {
        /// Path to the model description YAML file
        description_path: PathBuf,
    },
    /// Resolve config/action/state roles for a model description
    Resolve {
        /// Path to the model description YAML file
        description_path: PathBuf,
        /// Ask before accepting each candidate assignment
        #[arg(long)]
        confirm: bool,
        /// Write the interface descriptor JSON here
        #[arg(long)]
        interface: Option<PathBuf>,
        #[command(flatten)]
        inclusion: InclusionArgs,
    },
    /// Run episodes of the built-in van der Pol model with a random policy
    RunDemo {
        /// Directory for the role file, extraction and logs
        #[arg(long, default_value = "demo")]
        workdir: PathBuf,
        #[arg(long, default_value_t = 2)]
        episodes: usize,
        #[arg(long, default_value_t = 50)]
        max_iterations: usize,
        /// Macro step per iteration
        #[arg(long)]
        step_size: Option<f64>,
        /// Micro step the macro step is divided into
        #[arg(long)]
        substep_size: Option<f64>,
        /// Damping parameter
        #[arg(long)]
        mu: Option<f64>,
        /// Episode config YAML (name: value)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Append every iteration to a CSV log
        #[arg(long)]
        log_iterations: bool,
        /// CSV log path (defaults to logs/<timestamp>_<env>_log.csv in the workdir)
        #[arg(long)]
        log_file: Option<PathBuf>,
        /// Log every backend call
        #[arg(long)]
        call_logging: bool,
        /// Random policy seed
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[command(flatten)]
        inclusion: InclusionArgs,
    },
}

#[derive(clap::Args)]
struct InclusionArgs {
    /// Include config parameters in the observed state
    #[arg(long)]
    include_config: bool,
    /// Include actions in the observed state
    #[arg(long)]
    include_actions: bool,
    /// Include other variables in the observed state
    #[arg(long)]
    include_other: bool,
}

impl From<&InclusionArgs> for StateInclusion {
    fn from(args: &InclusionArgs) -> Self {
        StateInclusion {
            include_config: args.include_config,
            include_actions: args.include_actions,
            include_other: args.include_other,
        }
    }
}

fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Describe { description_path } => cmd_describe(&description_path),
        Commands::Resolve {
            description_path,
            confirm,
            interface,
            inclusion,
        } => cmd_resolve(
            &description_path,
            confirm,
            interface.as_deref(),
            (&inclusion).into(),
        ),
        Commands::RunDemo {
            workdir,
            episodes,
            max_iterations,
            step_size,
            substep_size,
            mu,
            config,
            log_iterations,
            log_file,
            call_logging,
            seed,
            inclusion,
        } => {
            let mut episode_config = match &config {
                Some(path) => load_episode_config(path)?,
                None => Values::new(),
            };
            let overrides = [
                ("mu", mu),
                (reserved::STEP_SIZE, step_size),
                (reserved::SUBSTEP_SIZE, substep_size),
            ];
            for (name, value) in overrides {
                if let Some(value) = value {
                    episode_config.insert(name.to_string(), value);
                }
            }
            let demo = DemoArgs {
                workdir,
                episodes,
                max_iterations,
                episode_config,
                log_iterations,
                log_file,
                call_logging,
                seed,
                inclusion: (&inclusion).into(),
            };
            cmd_run_demo(&demo)
        }
    }
}

/// Prompts on stdin for every candidate.
struct StdinApprover;

impl Approver for StdinApprover {
    fn approve(&mut self, source: RoleSource, candidate: &RoleAssignment) -> bool {
        let origin = match source {
            RoleSource::Cached => "cached role file",
            RoleSource::Introspected => "variable causality",
        };
        println!("Role assignment from {origin}:\n{candidate}");
        print!("Accept this assignment? [y/N] ");
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Err(_) => false,
        }
    }
}

fn cmd_describe(description_path: &Path) -> AppResult<()> {
    let description = load_description_yaml(description_path)?;
    let catalog = VariableCatalog::build(&description)?;

    println!(
        "Model: {} (FMI {})",
        description.model_name,
        if description.fmi_version.is_empty() {
            "?"
        } else {
            description.fmi_version.as_str()
        }
    );
    println!(
        "Variables: {} usable, {} skipped",
        catalog.len(),
        description.variables.len() - catalog.len()
    );
    println!();
    println!("{:<24} {:>6} {:<8} {:<20} {:>12}", "name", "ref", "kind", "causality", "start");
    for var in catalog.iter() {
        let start = var
            .initial_value
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<24} {:>6} {:<8} {:<20} {:>12}",
            var.name,
            var.handle,
            format!("{:?}", var.kind),
            format!("{:?}", var.causality),
            start
        );
    }

    if !catalog.renames().is_empty() {
        println!();
        println!("Renamed:");
        for (from, to) in catalog.renames() {
            println!("  {from} -> {to}");
        }
    }
    Ok(())
}

fn cmd_resolve(
    description_path: &Path,
    confirm: bool,
    interface: Option<&Path>,
    inclusion: StateInclusion,
) -> AppResult<()> {
    let description = load_description_yaml(description_path)?;
    let catalog = VariableCatalog::build(&description)?;
    let store = RoleStore::for_model(description_path);

    let request = ResolveRequest {
        model_name: &description.model_name,
        catalog: &catalog,
        store: &store,
        inclusion,
    };
    let resolution = if confirm {
        resolve_roles(&request, &mut StdinApprover)?
    } else {
        resolve_roles(&request, &mut AutoApprove)?
    };

    println!("✓ Roles resolved from {:?}", resolution.source);
    println!("{}", resolution.assignment);
    println!("Role file: {}", store.canonical_path().display());

    if let Some(path) = interface {
        resolution.interface.save_json(path)?;
        println!("Interface descriptor written to {}", path.display());
    }
    Ok(())
}

struct DemoArgs {
    workdir: PathBuf,
    episodes: usize,
    max_iterations: usize,
    episode_config: Values,
    log_iterations: bool,
    log_file: Option<PathBuf>,
    call_logging: bool,
    seed: u64,
    inclusion: StateInclusion,
}

fn cmd_run_demo(args: &DemoArgs) -> AppResult<()> {
    std::fs::create_dir_all(&args.workdir)?;
    let model_path = args.workdir.join("vanDerPol.fmu");

    let options = LoadOptions {
        call_logging: args.call_logging,
        state_inclusion: args.inclusion,
        ..LoadOptions::default()
    };
    let mut sim = SimulatorSession::open(&VanDerPolProvider, &model_path, &options, &mut AutoApprove)?;
    println!("Running {} episodes of {}", args.episodes, sim.env_name());

    let log_path = args.log_iterations.then(|| {
        args.log_file
            .clone()
            .unwrap_or_else(|| args.workdir.join(IterationLog::default_path(sim.env_name())))
    });

    let actions = sim.session().assignment().inputs.clone();
    let mut policy = RandomPolicy::new(actions, -0.5, 0.5, args.seed);
    let run = LocalRunOptions {
        episodes: args.episodes,
        max_iterations: args.max_iterations,
        config: args.episode_config.clone(),
        log_path: log_path.clone(),
    };
    let summary = run_local(&mut sim, &mut policy, &run)?;

    println!(
        "✓ {} episodes, {} iterations, {} halted",
        summary.episodes, summary.iterations, summary.halted_episodes
    );
    for (name, value) in summary.final_state.iter() {
        println!("  {name} = {value:.6}");
    }
    if let Some(path) = log_path {
        println!("Iteration log: {}", path.display());
    }

    sim.close()
}
