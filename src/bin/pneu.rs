use std::error::Error;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use pneu::config::PneuConfig;
use pneu::lang;
use pneu::net::{Marking, Net, io};
use pneu::options::{ExportFormat, Mode, Options};
use pneu::report::{BatchSummary, TraceDocument, write_audit_csv};
use pneu::sim::{render_snapshot, run_batch_with, run_story};

const DEFAULT_CONFIG: &str = "pneu.toml";

fn init_logger(verbose: bool) {
    let env = env_logger::Env::new()
        .filter_or("PNEU_LOG", "info")
        .write_style("PNEU_LOG_STYLE");
    let mut builder = env_logger::Builder::from_env(env);
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
}

/// `PNEU_FLAGS` 中的全局选项排在命令行参数之前.
fn parse_options() -> Result<Options, Box<dyn Error>> {
    let mut flags = shellwords::split(&std::env::var("PNEU_FLAGS").unwrap_or_default())?;
    for (i, arg) in std::env::args_os().enumerate().skip(1) {
        let arg = arg
            .into_string()
            .map_err(|arg| format!("Argument {i} is not valid Unicode: {arg:?}"))?;
        flags.push(arg);
    }
    Options::parse_from_args(&flags)
}

fn main() -> ExitCode {
    let options = match parse_options() {
        Ok(options) => options,
        Err(err) => match err.downcast::<clap::Error>() {
            Ok(err) => err.exit(),
            Err(err) => {
                eprintln!("error: {err}");
                return ExitCode::FAILURE;
            }
        },
    };

    init_logger(options.verbose);
    log::debug!("options: {:?}", options);

    match run(&options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(options: &Options) -> Result<()> {
    let config_path = options
        .config
        .as_deref()
        .unwrap_or(Path::new(DEFAULT_CONFIG));
    let config = PneuConfig::load_from_file(config_path)?;
    log::debug!("config: {:?}", config);

    let compiled = lang::compile_file(&options.file)?;
    for diagnostic in &compiled.diagnostics {
        log::warn!("{}: {}", options.file.display(), diagnostic);
    }
    if !compiled.is_clean() {
        bail!(
            "{} has {} problem(s), refusing to run",
            options.file.display(),
            compiled.diagnostics.len()
        );
    }
    let net = compiled.net;
    log::info!(
        "compiled {} ({} statements)",
        options.file.display(),
        compiled.statements.len()
    );
    net.log_diagnostics();

    match &options.mode {
        Mode::Batch {
            runs,
            steps,
            seed,
            csv,
            json,
        } => {
            let batch = config.batch(*runs, *steps, *seed);
            let outcome = run_batch_with(&net, &batch)?;

            let csv = csv.as_ref().unwrap_or(&config.csv);
            let rows = write_audit_csv(csv, &outcome.traces)
                .with_context(|| format!("failed to write audit log {}", csv.display()))?;
            if rows == 0 {
                log::warn!("no transition fired in any trial");
            }

            print!(
                "{}",
                BatchSummary::new(&outcome.statistics).with_top(config.summary_top)
            );

            let json = json.as_ref().unwrap_or(&config.json);
            TraceDocument::new(&net, outcome)
                .save(json)
                .with_context(|| format!("failed to write traces {}", json.display()))?;
        }
        Mode::Simulate { steps, seed, story } => {
            let steps = steps.unwrap_or(config.simulate_steps);
            let seed = seed.or(config.seed).unwrap_or_else(rand::random);
            simulate(&net, steps, seed, story)?;
        }
        Mode::Export { format, output } => {
            match format {
                ExportFormat::Json => io::write_json(output, &net)?,
                ExportFormat::Ron => io::write_ron(output, &net)?,
                ExportFormat::Pnml => io::write_pnml(output, &net)?,
                ExportFormat::Dot => net
                    .write_dot(output)
                    .with_context(|| format!("failed to write {}", output.display()))?,
            }
            log::info!("exported net to {}", output.display());
        }
    }
    Ok(())
}

fn simulate(net: &Net, steps: usize, seed: u64, story: &[String]) -> Result<()> {
    for label in story {
        if net.bus(label).is_empty() {
            log::warn!("story label '{}' names no transition", label);
        }
    }
    let trace = run_story(net, steps, seed, story)?;
    println!("seed {}", trace.seed);
    println!("step 0: {}", Marking::initial(net).render(net));
    for record in &trace.steps {
        println!(
            "step {}: fired [{}] -> {}",
            record.step,
            record.fired_labels.join(", "),
            render_snapshot(&record.marking)
        );
    }
    match trace.steps_to_quiescence() {
        Some(n) => println!("quiescent after {} step(s)", n),
        None => println!("step budget of {} exhausted", steps),
    }
    if !story.is_empty() {
        println!("story: {} of {} label(s) fired", trace.story_progress, story.len());
    }
    Ok(())
}
