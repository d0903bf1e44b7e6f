//! Sweeps the MNIST classifier over cpu and gpu, both augmentation backends and every batch
//! size, then prints the raw results and the report. The gpu runs need an OpenCL GPU and a build
//! with `--features opencl`; without them the sweep stops at the first gpu run.

#[macro_use]
extern crate log;

use rusty_augbench::data::default_fetcher;
use rusty_augbench::report::render;
use rusty_augbench::*;
use std::env;
use std::process;
use std::sync::Arc;

fn main() {
    env_logger::init();

    match run() {
        Ok(_) => info!("Exited great."),
        Err(err) => {
            error!("Exited with error: {}", err);
            process::exit(1);
        }
    }
}

fn run() -> Result<()> {
    let root = env::current_dir()
        .map_err(|e| BenchError::data_unavailable(DatasetKind::Mnist, e))?;
    let data = DataSource::new(root, Arc::from(default_fetcher()?));
    let mut sweep = Sweep::new(
        SweepConfig::default(),
        ClassifierFactory::new(DatasetKind::Mnist, data),
        Trainer::new(),
    )?;
    let table = sweep.run()?;
    println!("{}", table);
    print!("{}", render(&table));
    Ok(())
}
