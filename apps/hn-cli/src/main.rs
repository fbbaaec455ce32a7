use clap::{Parser, Subcommand, ValueEnum};
use hn_core::timing::{self, kernel_timing};
use hn_graph::CouplingMatrix;
use hn_project::{ProjectError, ProjectResult, load_yaml};
use hn_sim::{BoundarySource, SimResult, StepBoundary, StepRecord};
use hn_solver::{HydraulicInputs, HydraulicProblem, UnknownLayout};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hn-cli")]
#[command(about = "HeatNet CLI - district-heating network simulation tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate project file syntax, structure and topology
    Validate {
        /// Path to the project YAML file
        project_path: PathBuf,
    },
    /// List the hydraulic equations of the declared topology
    Equations {
        /// Path to the project YAML file
        project_path: PathBuf,
        #[arg(long, value_enum, default_value_t = Direction::Forerun)]
        direction: Direction,
    },
    /// Run the simulation and write the step records as JSON
    Run {
        /// Path to the project YAML file
        project_path: PathBuf,
        /// Output JSON file (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Override the number of hydraulic steps
        #[arg(long)]
        steps: Option<usize>,
        /// Solve forerun and return one after the other
        #[arg(long)]
        sequential: bool,
        /// Print a breakdown of kernel time
        #[arg(long)]
        timing: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Direction {
    Forerun,
    Return,
}

fn main() -> ProjectResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { project_path } => cmd_validate(&project_path),
        Commands::Equations {
            project_path,
            direction,
        } => cmd_equations(&project_path, direction),
        Commands::Run {
            project_path,
            output,
            steps,
            sequential,
            timing,
        } => cmd_run(&project_path, output.as_deref(), steps, sequential, timing),
    }
}

fn cmd_validate(project_path: &Path) -> ProjectResult<()> {
    eprintln!("Validating project: {}", project_path.display());
    let project = load_yaml(project_path)?;
    let network = hn_project::build_network(&project)?;
    hn_project::SeriesBoundary::new(&project, &network)?;
    eprintln!(
        "✓ Project is valid ({} nodes, {} pipes, reference '{}')",
        network.node_count(),
        network.pipe_count(),
        network.node_name(network.reference())
    );
    Ok(())
}

fn cmd_equations(project_path: &Path, direction: Direction) -> ProjectResult<()> {
    let project = load_yaml(project_path)?;
    let network = hn_project::build_network(&project)?;
    let forerun = CouplingMatrix::from_network(&network);
    let coupling = match direction {
        Direction::Forerun => forerun,
        Direction::Return => forerun.negated(),
    };
    let layout = UnknownLayout::new(&network);
    let inputs = HydraulicInputs {
        external_flows: vec![0.0; network.node_count()],
        reference_pressure: 0.0,
        rho: project.settings.to_config().water.rho,
        gravity: project.settings.gravity,
    };
    let problem = HydraulicProblem::new(&network, &coupling, &layout, &inputs)
        .map_err(|e| ProjectError::Sim(e.into()))?;
    for label in problem.equation_labels() {
        println!("{label}");
    }
    Ok(())
}

/// Renders one progress line per hydraulic step on stderr.
struct Progress<'a, S> {
    inner: &'a mut S,
    total: usize,
    started: Instant,
}

impl<S: BoundarySource> BoundarySource for Progress<'_, S> {
    fn boundary(
        &mut self,
        step: usize,
        time: chrono::NaiveDateTime,
        network: &hn_graph::Network,
    ) -> SimResult<StepBoundary> {
        let width = 28usize;
        let fraction = step as f64 / self.total.max(1) as f64;
        let filled = ((fraction * width as f64).round() as usize).min(width);
        eprint!(
            "\r[{}{}] {:>6.2}%  step={}/{}  t={}  elapsed={:.1}s",
            "#".repeat(filled),
            "-".repeat(width - filled),
            fraction * 100.0,
            step,
            self.total,
            time,
            self.started.elapsed().as_secs_f64()
        );
        let _ = io::stderr().flush();
        self.inner.boundary(step, time, network)
    }
}

fn cmd_run(
    project_path: &Path,
    output: Option<&Path>,
    steps: Option<usize>,
    sequential: bool,
    timing_enabled: bool,
) -> ProjectResult<()> {
    let mut project = load_yaml(project_path)?;
    debug!(path = %project_path.display(), "loaded project");
    if let Some(steps) = steps {
        project.settings.steps = steps;
        hn_project::validate_project(&project)?;
    }
    if sequential {
        project.settings.parallel_directions = false;
    }
    if timing_enabled {
        timing::enable_timing();
        kernel_timing::reset_all();
    }

    eprintln!("Running project: {} ({} steps)", project.name, project.settings.steps);
    let started = Instant::now();
    let (mut sim, mut series) = hn_project::prepare(&project)?;
    let mut source = Progress {
        inner: &mut series,
        total: project.settings.steps,
        started,
    };
    let records = sim.run(&mut source);
    eprint!("\r{}\r", " ".repeat(100));
    let records = records?;
    let elapsed = started.elapsed().as_secs_f64();

    eprintln!("✓ Simulation completed in {elapsed:.3}s");
    print_summary(&records);
    if timing_enabled {
        for line in kernel_timing::summary() {
            eprintln!("  {line}");
        }
    }

    let json = serde_json::to_string_pretty(&records)?;
    if let Some(path) = output {
        std::fs::write(path, json)?;
        eprintln!("✓ Wrote {} step records to {}", records.len(), path.display());
    } else {
        println!("{json}");
    }
    Ok(())
}

fn print_summary(records: &[StepRecord]) {
    let substeps: usize = records.iter().map(|r| r.substeps).sum();
    let flips: usize = records
        .iter()
        .map(|r| r.forerun.flipped_pipes.len() + r.ret.flipped_pipes.len())
        .sum();
    let unconverged = records
        .iter()
        .filter(|r| !(r.forerun.converged && r.ret.converged))
        .count();
    eprintln!("  Hydraulic steps:  {}", records.len());
    eprintln!("  Thermal substeps: {substeps}");
    eprintln!("  Direction flips:  {flips}");
    if unconverged > 0 {
        eprintln!("  Unconverged steps: {unconverged}");
    }
}
