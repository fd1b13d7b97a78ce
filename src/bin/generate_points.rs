//! Writes a file of random `x:y:z:mass` points for exercising the loader and
//! the reduction on large inputs.
use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "generate_points")]
struct Args {
    /// Number of points to write
    #[arg(short = 'n', long, default_value_t = 1_000_000)]
    count: usize,

    /// Output file [default: stdout]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Coordinates are drawn from [-spread, spread)
    #[arg(long, default_value_t = 1000.0)]
    spread: f64,

    /// Masses are drawn from (0, max-mass)
    #[arg(long, default_value_t = 100.0)]
    max_mass: f64,

    /// Fraction of lines replaced by garbage
    #[arg(long, default_value_t = 0.0)]
    noise: f64,

    /// Seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = Args::parse();
    anyhow::ensure!(
        args.spread > 0.0 && args.max_mass > 0.0,
        "--spread and --max-mass must be positive"
    );
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("couldn't create {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout().lock()),
    };
    let mut writer = BufWriter::new(sink);

    let now = std::time::Instant::now();
    let mut garbage = 0;
    for _ in 0..args.count {
        if args.noise > 0.0 && rng.gen_bool(args.noise.min(1.0)) {
            writeln!(writer, "not a point")?;
            garbage += 1;
            continue;
        }

        let x: f64 = rng.gen_range(-args.spread..args.spread);
        let y: f64 = rng.gen_range(-args.spread..args.spread);
        let z: f64 = rng.gen_range(-args.spread..args.spread);
        // Strictly positive so the reduction never meets a zero total mass
        let mass: f64 = args.max_mass * (1.0 - rng.gen::<f64>());
        writeln!(writer, "{x}:{y}:{z}:{mass}")?;
    }
    writer.flush()?;

    log::info!(
        "wrote {} lines ({garbage} garbage) in {:?}",
        args.count,
        now.elapsed()
    );

    Ok(())
}
