//! CLI wiring for the TuneForge pipeline.

use crate::driver::{tune_model, tune_unit, TuneOverrides};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tuneforge_ir::{tensor, DataType, ModelProgram, PrimUnit, ProgramInput, Target, UnitBuilder};
use tuneforge_tune::SearchConfig;

#[derive(Parser, Debug)]
#[command(name = "tuneforge", about = "TuneForge kernel-tuning toolkit")]
pub struct Cli {
    /// Target string, e.g. "llvm -num-cores=8" or "cuda".
    #[arg(long, default_value = "llvm")]
    pub target: String,

    #[arg(long, default_value = "tuneforge-work")]
    pub work_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Tune a single square-matmul unit and print the best trace found.
    TuneUnit {
        #[arg(long, default_value_t = 128)]
        dim: usize,
        #[arg(long, default_value_t = 32)]
        trials: usize,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Tune a small demo model graph and report the per-task schedules.
    TuneModel {
        #[arg(long, default_value_t = 3)]
        layers: usize,
        #[arg(long, default_value_t = 64)]
        dim: usize,
        #[arg(long, default_value_t = 16)]
        trials: usize,
        #[arg(long)]
        seed: Option<u64>,
    },
}

pub fn run_cli(cli: Cli) -> Result<()> {
    tracing_subscriber::fmt::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let Cli {
        target,
        work_dir,
        command,
    } = cli;
    let target = Target::parse(&target)?;
    std::fs::create_dir_all(&work_dir)?;

    match command {
        Command::TuneUnit { dim, trials, seed } => {
            let config = SearchConfig::ReplayTrace {
                trials_per_iter: 8,
                total_trials: trials,
            };
            let overrides = TuneOverrides {
                seed,
                ..TuneOverrides::default()
            };
            let best = tune_unit(
                ProgramInput::Unit(matmul_unit(dim)),
                &target,
                config,
                &work_dir,
                overrides,
            )?;
            match best {
                Some(schedule) => {
                    println!("best trace ({} steps):", schedule.trace().len());
                    for step in schedule.trace().steps() {
                        println!("- {:?}", step);
                    }
                }
                None => println!("no measurement within budget"),
            }
        }
        Command::TuneModel {
            layers,
            dim,
            trials,
            seed,
        } => {
            let mut model = ModelProgram::new("demo_model");
            for layer in 0..layers {
                model = model.with_node(format!("dense_{layer}"), matmul_unit(dim));
            }
            let config = SearchConfig::Evolutionary {
                trials_per_iter: 4,
                total_trials: trials,
                population: 8,
            };
            let overrides = TuneOverrides {
                seed,
                ..TuneOverrides::default()
            };
            let artifact = tune_model(&model, &target, config, &work_dir, None, overrides)?;
            info!(model = %artifact.name, tasks = artifact.schedules.len(), "model tuned");
            for (task_name, schedule) in &artifact.schedules {
                println!("{task_name}: {} trace steps", schedule.trace().len());
            }
        }
    }
    Ok(())
}

fn matmul_unit(dim: usize) -> PrimUnit {
    UnitBuilder::new()
        .matmul(
            "mm",
            tensor("a", &[dim, dim], DataType::F32),
            tensor("b", &[dim, dim], DataType::F32),
            tensor("c", &[dim, dim], DataType::F32),
        )
        .build()
}
