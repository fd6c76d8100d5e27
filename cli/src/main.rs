use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use patcher::{Extractor, IndexedPatcher, Layout, PatchConfig, PatchReport, TreePatcher};
use tracing::{error, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Patch class files into the jars of an installed application
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Copy the configured classes out of a built distribution
    CopyClasses {
        /// the class list configuration
        #[arg(long)]
        conf: PathBuf,
        /// where the copied classes go, one directory per jar
        #[arg(long)]
        classes: PathBuf,
        /// location of the distribution jars below the root
        #[arg(long, default_value = "out/idea-ce/dist.all")]
        dist_dir: PathBuf,
        /// root of the build
        root_dir: PathBuf,
    },
    /// Replace classes in the jars below each target
    Patch {
        /// the root path of modified classes
        #[arg(long)]
        classes: PathBuf,
        /// the class list configuration, without it classes are matched by file name
        #[arg(long)]
        conf: Option<PathBuf>,
        /// how configured jars are located below a target
        #[arg(long, value_enum, default_value_t = LayoutArg::Flat)]
        layout: LayoutArg,
        /// only print which jars would be patched
        #[arg(long)]
        dry_run: bool,
        #[arg(required = true)]
        targets: Vec<PathBuf>,
    },
    /// Put every backed up jar below each target back in place
    Restore {
        #[arg(required = true)]
        targets: Vec<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LayoutArg {
    /// jars sit directly in the target
    Flat,
    /// jars may sit anywhere below the target
    Search,
}

impl From<LayoutArg> for Layout {
    fn from(value: LayoutArg) -> Self {
        match value {
            LayoutArg::Flat => Self::Flat,
            LayoutArg::Search => Self::Search,
        }
    }
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    match args.command {
        Command::CopyClasses {
            conf,
            classes,
            dist_dir,
            root_dir,
        } => copy_classes(conf, classes, root_dir.join(dist_dir)),
        Command::Patch {
            classes,
            conf,
            layout,
            dry_run,
            targets,
        } => patch(classes, conf, layout.into(), dry_run, &targets),
        Command::Restore { targets } => {
            let restored = patcher::restore(&targets)?;
            info!("restored {} archives", restored.len());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn copy_classes(conf: PathBuf, classes: PathBuf, dist_root: PathBuf) -> Result<ExitCode> {
    let config = PatchConfig::load(&conf)?;
    let extractor = Extractor::new(dist_root);

    let mut failed = false;
    for (name, group) in &config.groups {
        match extractor.extract_group(name, group, &classes) {
            Ok(copied) => info!("copied {} entries from {name}", copied.len()),
            Err(err) => {
                error!("unable to copy classes of {name}: {err}");
                failed = true;
            }
        }
    }

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn patch(
    classes: PathBuf,
    conf: Option<PathBuf>,
    layout: Layout,
    dry_run: bool,
    targets: &[PathBuf],
) -> Result<ExitCode> {
    let report = match conf {
        Some(conf) => {
            let config = PatchConfig::load(&conf)?;
            if dry_run {
                for (name, group) in &config.groups {
                    info!("{name} (alias {}): {:?}", group.alias, group.classes);
                }
                return Ok(ExitCode::SUCCESS);
            }
            TreePatcher::new(config, classes, layout.resolver()).run(targets)?
        }
        None => {
            let patcher = IndexedPatcher::new(&classes)
                .with_context(|| format!("unable to index {}", classes.display()))?;
            let plan = patcher.plan(targets)?;
            if plan.is_empty() {
                info!("no archive contains any of the staged classes");
            }
            plan.log();
            if dry_run {
                return Ok(ExitCode::SUCCESS);
            }
            patcher.apply(plan)
        }
    };

    Ok(summarize(&report))
}

fn summarize(report: &PatchReport) -> ExitCode {
    info!("patched {} archives", report.patched.len());
    if report.is_success() {
        return ExitCode::SUCCESS;
    }

    for failure in &report.failures {
        match &failure.group {
            Some(group) => error!("{} ({group}): {}", failure.archive, failure.error),
            None => error!("{}: {}", failure.archive, failure.error),
        }
    }
    ExitCode::FAILURE
}
