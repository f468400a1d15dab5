//! Convert GameMaker projects to the current format with `ProjectTool`.
//!
//! `convert` rewrites one project or package in place and restores the
//! original layout when the tool fails. `batch` converts every project under
//! a directory into a separate output tree on a worker pool.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use converter::batch::run_batch;
use converter::convert::{ConvertOptions, convert_single_project};
use converter::core::types::ConvertMode;
use converter::discover::discover_tasks;
use converter::exit_codes;
use converter::io::config::{ConverterConfig, DEFAULT_CONFIG_FILE, load_config, write_config};
use converter::io::report::write_report;
use converter::io::tool::ProjectToolExe;
use converter::logging;

#[derive(Parser, Debug)]
#[command(
    name = "converter",
    version,
    about = "Convert GameMaker projects to the current format with ProjectTool"
)]
struct Cli {
    /// Config file; defaults apply when it does not exist.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log file, truncated at startup (overrides `log_path`).
    #[arg(long, global = true)]
    log: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a config file with default values.
    Init {
        /// Overwrite an existing config file.
        #[arg(short, long)]
        force: bool,
    },
    /// Convert one project file or package in place.
    Convert {
        /// `.yyp`, `.project.gmx`, `.yymp`, `.yymps`, `.yyz`, `.gmez` or `.gmz` file.
        project: PathBuf,
        /// Keep the original project next to the converted one.
        #[arg(long)]
        preserve: bool,
        #[command(flatten)]
        tool: ToolArgs,
    },
    /// Convert every project under a directory into an output directory.
    Batch {
        #[arg(long)]
        projects_dir: Option<PathBuf>,
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Number of projects converted at once.
        #[arg(long)]
        workers: Option<usize>,
        /// Write a JSON summary of the run.
        #[arg(long)]
        report: Option<PathBuf>,
        #[command(flatten)]
        tool: ToolArgs,
    },
}

#[derive(Args, Debug, Default)]
struct ToolArgs {
    /// Path to ProjectTool.exe.
    #[arg(long)]
    tool: Option<PathBuf>,
    /// Prefabs library folder.
    #[arg(long)]
    prefabs: Option<PathBuf>,
}

impl ToolArgs {
    fn apply(self, cfg: &mut ConverterConfig) {
        if let Some(tool) = self.tool {
            cfg.tool_path = tool;
        }
        if let Some(prefabs) = self.prefabs {
            cfg.prefabs_folder = prefabs;
        }
    }
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Convert {
            project,
            preserve,
            tool,
        } => {
            let mut cfg = load_config(&cli.config)?;
            tool.apply(&mut cfg);
            cfg.validate()?;
            init_logging(cli.log.as_deref(), &cfg)?;
            let mode = if preserve {
                ConvertMode::Preserve
            } else {
                ConvertMode::Replace
            };
            cmd_convert(&project, &cfg, mode)
        }
        Command::Batch {
            projects_dir,
            output_dir,
            workers,
            report,
            tool,
        } => {
            let mut cfg = load_config(&cli.config)?;
            tool.apply(&mut cfg);
            if projects_dir.is_some() {
                cfg.batch.projects_dir = projects_dir;
            }
            if output_dir.is_some() {
                cfg.batch.output_dir = output_dir;
            }
            if let Some(workers) = workers {
                cfg.batch.workers = workers;
            }
            if report.is_some() {
                cfg.batch.report_path = report;
            }
            cfg.validate()?;
            init_logging(cli.log.as_deref(), &cfg)?;
            cmd_batch(&cfg)
        }
    }
}

fn init_logging(flag: Option<&Path>, cfg: &ConverterConfig) -> Result<()> {
    logging::init(Some(flag.unwrap_or(cfg.log_path.as_path())))
}

fn cmd_init(path: &Path, force: bool) -> Result<i32> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &ConverterConfig::default())?;
    println!("wrote {}", path.display());
    Ok(exit_codes::OK)
}

fn cmd_convert(project: &Path, cfg: &ConverterConfig, mode: ConvertMode) -> Result<i32> {
    let tool = ProjectToolExe::new(&cfg.tool_path, &cfg.success_marker);
    let options = ConvertOptions::from_config(cfg, mode);
    let report = convert_single_project(project, &tool, &options)?;

    if report.succeeded() {
        println!("converted: {}", report.destination.display());
        return Ok(exit_codes::OK);
    }
    println!(
        "{}: {}",
        report.status,
        report.reason.as_deref().unwrap_or("unknown error")
    );
    for err in &report.rollback_errors {
        println!("  rollback: {err}");
    }
    Ok(exit_codes::FAILED)
}

fn cmd_batch(cfg: &ConverterConfig) -> Result<i32> {
    let projects_dir = cfg
        .batch
        .projects_dir
        .as_deref()
        .context("projects dir not set (use --projects-dir or [batch].projects_dir)")?;
    let output_dir = cfg
        .batch
        .output_dir
        .as_deref()
        .context("output dir not set (use --output-dir or [batch].output_dir)")?;
    if !projects_dir.is_dir() {
        bail!("projects dir {} does not exist", projects_dir.display());
    }
    fs::create_dir_all(output_dir)
        .with_context(|| format!("create output dir {}", output_dir.display()))?;

    let tasks = discover_tasks(projects_dir, output_dir)?;
    if tasks.is_empty() {
        info!(dir = %projects_dir.display(), "no projects found");
        println!("no projects found in {}", projects_dir.display());
        return Ok(exit_codes::OK);
    }

    let tool = ProjectToolExe::new(&cfg.tool_path, &cfg.success_marker);
    let options = ConvertOptions::from_config(cfg, ConvertMode::Replace);
    let report = run_batch(&tasks, &tool, &options, cfg.batch.workers)?;

    if let Some(path) = &cfg.batch.report_path {
        write_report(path, &report)?;
        info!(path = %path.display(), "wrote run report");
    }
    for result in report.results.iter().filter(|r| !r.succeeded()) {
        println!(
            "{}: {} ({})",
            result.status,
            result.source.display(),
            result.reason.as_deref().unwrap_or("unknown error")
        );
    }
    println!("converted {} of {} projects", report.converted, report.total);

    Ok(if report.all_succeeded() {
        exit_codes::OK
    } else {
        exit_codes::FAILED
    })
}
