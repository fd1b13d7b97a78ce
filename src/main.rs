mod cli;

use anyhow::{Context, Result};
use clap::{error::ErrorKind, Parser};
use cli::Cli;
use std::path::Path;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(1),
            };
        }
    };

    if let Err(err) = init_logging(cli.log_file.as_deref()).and_then(|()| run(&cli)) {
        eprintln!("Error: {err:#}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    match log_file {
        Some(path) => simple_logging::log_to_file(path, log::LevelFilter::Trace)
            .with_context(|| format!("couldn't open log file {}", path.display())),
        None => {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
                .init();
            Ok(())
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli.config();
    log::debug!("{config:?}");

    let report = barycenter::run(&cli.file, &config).with_context(|| {
        format!("couldn't compute the barycenter of {}", cli.file.display())
    })?;

    if cli.json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.render_text());
    }

    Ok(())
}
