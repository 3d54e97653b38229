use clap::{Parser, Subcommand};
use dc_app::{
    AppError, AppResult, RunMode, RunOptions, RunOutcome, RunProgressEvent, RunRequest, RunStage,
    project_service, run_service,
};
use dc_optim::{GridSpacing, RefluxGrid};
use dc_report::{CandidateRow, ColumnReport, OptimizationReport, SweepReport};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing::warn;

#[derive(Parser)]
#[command(name = "distilcol")]
#[command(about = "distilcol - staged distillation column simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate project file syntax and structure
    Validate {
        /// Path to the project YAML file
        project_path: PathBuf,
    },
    /// Show what a project describes
    Summary {
        /// Path to the project YAML file
        project_path: PathBuf,
    },
    /// Solve the column at one reflux ratio
    Simulate {
        /// Path to the project YAML file
        project_path: PathBuf,
        /// Override the project's reflux ratio
        #[arg(long)]
        reflux: Option<f64>,
        /// Report directory (defaults to .distilcol/runs next to the project)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Skip cache and force re-run
        #[arg(long)]
        no_cache: bool,
    },
    /// Find the cheapest reflux ratio meeting the separation constraints
    Optimize {
        /// Path to the project YAML file
        project_path: PathBuf,
        /// Report directory (defaults to .distilcol/runs next to the project)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Skip cache and force re-run
        #[arg(long)]
        no_cache: bool,
    },
    /// Evaluate cost and feasibility over a reflux grid
    Sweep {
        /// Path to the project YAML file
        project_path: PathBuf,
        /// First reflux ratio (defaults to the optimization lower bound)
        #[arg(long)]
        from: Option<f64>,
        /// Last reflux ratio (defaults to the optimization upper bound)
        #[arg(long)]
        to: Option<f64>,
        /// Number of grid points
        #[arg(long, default_value_t = 9)]
        points: usize,
        /// Space points logarithmically
        #[arg(long)]
        log: bool,
        /// Also write the candidate table to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Skip cache and force re-run
        #[arg(long)]
        no_cache: bool,
    },
    /// List cached runs for a project
    Runs {
        /// Path to the project YAML file
        project_path: PathBuf,
    },
    /// Show details of a cached run
    ShowRun {
        /// Path to the project YAML file
        project_path: PathBuf,
        /// Run ID to display
        run_id: String,
    },
    /// Export the stage profile of a cached run as CSV
    ExportStages {
        /// Path to the project YAML file
        project_path: PathBuf,
        /// Run ID
        run_id: String,
        /// Output CSV file path (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", failure_message(&err));
            ExitCode::FAILURE
        }
    }
}

fn failure_message(err: &AppError) -> String {
    format!("Error: {err}")
}

fn run(command: Commands) -> AppResult<()> {
    match command {
        Commands::Validate { project_path } => cmd_validate(&project_path),
        Commands::Summary { project_path } => cmd_summary(&project_path),
        Commands::Simulate {
            project_path,
            reflux,
            out,
            no_cache,
        } => {
            let mode = RunMode::Simulate {
                reflux_ratio: reflux,
            };
            cmd_run(&project_path, mode, run_options(out, no_cache), None)
        }
        Commands::Optimize {
            project_path,
            out,
            no_cache,
        } => cmd_run(
            &project_path,
            RunMode::Optimize,
            run_options(out, no_cache),
            None,
        ),
        Commands::Sweep {
            project_path,
            from,
            to,
            points,
            log,
            output,
            no_cache,
        } => {
            let grid = sweep_grid(&project_path, from, to, points, log)?;
            cmd_run(
                &project_path,
                RunMode::Sweep { grid },
                run_options(None, no_cache),
                output.as_deref(),
            )
        }
        Commands::Runs { project_path } => cmd_runs(&project_path),
        Commands::ShowRun {
            project_path,
            run_id,
        } => cmd_show_run(&project_path, &run_id),
        Commands::ExportStages {
            project_path,
            run_id,
            output,
        } => cmd_export_stages(&project_path, &run_id, output.as_deref()),
    }
}

fn run_options(out: Option<PathBuf>, no_cache: bool) -> RunOptions {
    RunOptions {
        use_cache: !no_cache,
        output_dir: out,
        ..RunOptions::default()
    }
}

/// Grid from explicit bounds, falling back to the project's optimization bounds.
fn sweep_grid(
    project_path: &Path,
    from: Option<f64>,
    to: Option<f64>,
    points: usize,
    log: bool,
) -> AppResult<RefluxGrid> {
    let spacing = if log {
        GridSpacing::Logarithmic
    } else {
        GridSpacing::Linear
    };
    let (start, end) = match (from, to) {
        (Some(start), Some(end)) => (start, end),
        _ => {
            let project = project_service::load_project(project_path)?;
            let defaults = run_service::default_sweep(&project, points)?;
            (from.unwrap_or(defaults.start), to.unwrap_or(defaults.end))
        }
    };
    Ok(RefluxGrid::new(start, end, points, spacing)?)
}

fn cmd_validate(project_path: &Path) -> AppResult<()> {
    println!("Validating project: {}", project_path.display());
    let project = project_service::load_project(project_path)?;
    project_service::validate_project(&project)?;
    println!("✓ Project is valid");
    Ok(())
}

fn cmd_summary(project_path: &Path) -> AppResult<()> {
    let project = project_service::load_project(project_path)?;
    let summary = project_service::summarize(&project);
    println!("Project: {}", summary.name);
    println!(
        "  Components: {} ({} from catalog)",
        summary.components.join(", "),
        summary.catalog_components
    );
    println!(
        "  Stages: {} (feed on stage {})",
        summary.stages, summary.feed_stage
    );
    println!("  Reflux ratio: {}", summary.reflux_ratio);
    if summary.has_optimization {
        println!("  Optimization: configured");
    }
    Ok(())
}

fn cmd_run(
    project_path: &Path,
    mode: RunMode,
    options: RunOptions,
    csv_output: Option<&Path>,
) -> AppResult<()> {
    let request = RunRequest {
        project_path,
        mode,
        options,
    };

    let mut last_emit = Instant::now();
    let mut last_stage = String::new();
    let response = run_service::ensure_run_with_progress(
        &request,
        Some(&mut |event| {
            let stage_key = format!("{:?}", event.stage);
            let emit_now = stage_key != last_stage || last_emit.elapsed().as_millis() >= 100;
            if emit_now {
                render_cli_progress(&event);
                last_stage = stage_key;
                last_emit = Instant::now();
            }
        }),
    )?;
    clear_progress_line();

    if response.loaded_from_cache {
        println!("✓ Loaded from cache: {}", response.run_id);
    } else {
        println!("✓ Run completed: {}", response.run_id);
    }
    println!("  Report: {}", response.report_dir.display());
    print_timing_summary(&response.timing);

    match &response.outcome {
        RunOutcome::Column(report) => print_column_report(report),
        RunOutcome::Optimization(report) => print_optimization_report(report),
        RunOutcome::Sweep(report) => {
            print_sweep_report(report);
            if let Some(path) = csv_output {
                write_csv(
                    &dc_report::candidate_table_csv(&report.components, &report.candidates),
                    Some(path),
                    report.candidates.len(),
                )?;
            }
        }
    }
    Ok(())
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(120));
    let _ = io::stdout().flush();
}

fn render_cli_progress(event: &RunProgressEvent) {
    let spinner = ['|', '/', '-', '\\'];
    let spin_idx = ((event.elapsed_wall_s * 10.0) as usize) % spinner.len();
    let mut line = format!(
        "\r{} {}  elapsed={:.2}s",
        spinner[spin_idx],
        event.stage.label(),
        event.elapsed_wall_s
    );
    if let Some(c) = &event.column {
        if let Some(sweep) = c.sweep {
            match c.max_sweeps {
                Some(max) => line.push_str(&format!("  sweep={sweep}/{max}")),
                None => line.push_str(&format!("  sweep={sweep}")),
            }
        }
        if let Some(residual) = c.residual {
            line.push_str(&format!("  residual={residual:.3e}"));
        }
        if let Some(failed) = c.failed_stages.filter(|f| *f > 0) {
            line.push_str(&format!("  failed_stages={failed}"));
        }
    } else if let Some(msg) = &event.message
        && event.stage != RunStage::Completed
    {
        line.push_str(&format!("  {msg}"));
    }
    print!("{line}");
    let _ = io::stdout().flush();
}

fn print_timing_summary(timing: &dc_app::RunTimingSummary) {
    println!("\nTiming summary:");
    if timing.load_cache_time_s > 0.0 {
        println!("  Cache load: {:.3}s", timing.load_cache_time_s);
    } else {
        let total = timing.total_time_s.max(1.0e-12);
        println!(
            "  Compile: {:.3}s ({:.1}%)",
            timing.compile_time_s,
            100.0 * timing.compile_time_s / total
        );
        println!(
            "  Solve:   {:.3}s ({:.1}%)",
            timing.solve_time_s,
            100.0 * timing.solve_time_s / total
        );
        println!(
            "  Save:    {:.3}s ({:.1}%)",
            timing.save_time_s,
            100.0 * timing.save_time_s / total
        );
    }
    println!("  Total:   {:.3}s", timing.total_time_s);
}

fn print_column_report(report: &ColumnReport) {
    let convergence = &report.convergence;
    if convergence.converged {
        println!(
            "\nConverged in {} sweeps (residual {:.3e})",
            convergence.iterations, convergence.residual
        );
    } else {
        warn!(
            sweeps = convergence.iterations,
            residual = convergence.residual,
            "column did not converge"
        );
        println!(
            "\nNOT converged after {} sweeps (residual {:.3e})",
            convergence.iterations, convergence.residual
        );
    }
    println!("  Reflux ratio:   {:.4}", report.reflux_ratio);
    println!("  Condenser duty: {:.1} W", report.condenser_duty_w);
    println!("  Reboiler duty:  {:.1} W", report.reboiler_duty_w);

    println!("\nProducts:");
    for product in &report.products {
        println!(
            "  {:<12} {:>10.4} mol/s  {:>8.2} K  {}  [{}]",
            product.name,
            product.flow_mol_s,
            product.temperature_k,
            product.phase,
            format_fractions(&report.components, &product.composition)
        );
    }

    println!("\nStages:");
    println!(
        "  {:>5}  {:<18} {:>8}  {:>10}  {:>10}  x",
        "stage", "kind", "T [K]", "L [mol/s]", "V [mol/s]"
    );
    for row in &report.stages {
        let marker = if row.convergence.converged { "" } else { " *" };
        println!(
            "  {:>5}  {:<18} {:>8.2}  {:>10.4}  {:>10.4}  [{}]{}",
            row.stage,
            row.kind,
            row.temperature_k,
            row.liquid_mol_s,
            row.vapor_mol_s,
            format_fractions(&report.components, &row.x),
            marker
        );
    }
}

fn print_optimization_report(report: &OptimizationReport) {
    println!(
        "\nOptimal reflux ratio: {:.4} ({})",
        report.reflux_ratio, report.strategy
    );
    println!(
        "  Cost: total {:.4} (condenser {:.4}, reboiler {:.4}, capital {:.4})",
        report.cost.total, report.cost.condenser, report.cost.reboiler, report.cost.capital
    );
    let feasible = report
        .candidates
        .iter()
        .filter(|c| c.outcome == "feasible")
        .count();
    println!(
        "  Candidates evaluated: {} ({} feasible)",
        report.candidates.len(),
        feasible
    );
    print_column_report(&report.column);
}

fn print_sweep_report(report: &SweepReport) {
    println!("\nReflux sweep:");
    println!(
        "  {:>10}  {:<14} {:>14}  {:>12}",
        "R", "outcome", "objective", "total cost"
    );
    for row in &report.candidates {
        print_candidate(row);
    }
}

fn print_candidate(row: &CandidateRow) {
    let cost = row
        .cost
        .as_ref()
        .map(|c| format!("{:.4}", c.total))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "  {:>10.4}  {:<14} {:>14.4e}  {:>12}",
        row.reflux_ratio, row.outcome, row.objective, cost
    );
}

fn format_fractions(names: &[String], fractions: &[f64]) -> String {
    names
        .iter()
        .zip(fractions)
        .map(|(name, x)| format!("{name}={x:.4}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn cmd_runs(project_path: &Path) -> AppResult<()> {
    let runs = run_service::list_runs(project_path)?;

    if runs.is_empty() {
        println!("No cached runs found");
    } else {
        println!("Cached runs:");
        for manifest in runs {
            println!(
                "  {} {:<9} ({})",
                manifest.run_id,
                manifest.run_type.as_str(),
                manifest.timestamp
            );
        }
    }
    Ok(())
}

fn cmd_show_run(project_path: &Path, run_id: &str) -> AppResult<()> {
    println!("Loading run: {}", run_id);

    let (manifest, outcome) = run_service::load_run(project_path, run_id)?;
    println!("\nRun Summary:");
    println!("  Project: {}", manifest.project_name);
    println!("  Type: {}", manifest.run_type.as_str());
    println!("  Timestamp: {}", manifest.timestamp);
    println!("  Solver version: {}", manifest.solver_version);

    match &outcome {
        RunOutcome::Column(report) => print_column_report(report),
        RunOutcome::Optimization(report) => print_optimization_report(report),
        RunOutcome::Sweep(report) => print_sweep_report(report),
    }
    Ok(())
}

fn cmd_export_stages(project_path: &Path, run_id: &str, output: Option<&Path>) -> AppResult<()> {
    let (_manifest, outcome) = run_service::load_run(project_path, run_id)?;
    let report = match &outcome {
        RunOutcome::Column(report) => report,
        RunOutcome::Optimization(report) => &report.column,
        RunOutcome::Sweep(_) => {
            return Err(AppError::InvalidInput(format!(
                "run {run_id} is a sweep and has no stage profile"
            )));
        }
    };
    write_csv(
        &dc_report::stage_table_csv(report),
        output,
        report.stages.len(),
    )
}

/// Write to file or stdout.
fn write_csv(csv: &str, output: Option<&Path>, rows: usize) -> AppResult<()> {
    if let Some(path) = output {
        std::fs::write(path, csv)?;
        println!("✓ Exported {} rows to {}", rows, path.display());
    } else {
        print!("{}", csv);
    }
    Ok(())
}
