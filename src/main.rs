//! # Application Entry Point
//!
//! ## Usage
//! ```bash
//! migsurf --datapath data/popres --gridpath data/popres-grid \
//!         --mcmcpath chains/chain1 --nIndiv 1201 --nDemes 300
//! ```

use std::time::Instant;

use migsurf::config::Config;
use migsurf::io::input::Dataset;
use migsurf::pipelines::InferencePipeline;
use migsurf::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Initialize the tracing subscriber; `RUST_LOG` overrides the default level
fn init_logging() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(false))
        .init();
}

fn run() -> Result<()> {
    let start = Instant::now();

    let config = Config::parse_and_validate()?;
    init_logging();

    let n_threads = config.nthreads();
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build_global()
        .ok();

    println!("migsurf v0.1.0");
    println!("Data: {:?}", config.datapath);
    println!("Grid: {:?}", config.gridpath);
    println!("Chain output: {:?}", config.mcmcpath);
    println!(
        "Iterations: {} ({} burn-in, thin {})",
        config.num_mcmc_iter, config.num_burn_iter, config.num_thin_iter
    );

    let dataset = Dataset::load(&config)?;
    println!(
        "Loaded {} samples across {} of {} demes",
        config.n_indiv,
        dataset.graph.n_observed(),
        dataset.graph.n_demes()
    );

    let mut pipeline = InferencePipeline::new(config, dataset)?;
    pipeline.run()?;

    println!("\nCompleted in {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}
