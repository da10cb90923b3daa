//! Parsing Options.
//!
//! `pneu [-v] [-c CONFIG] <FILE> <batch|simulate|export>`; flags left unset
//! fall back to the values in [`crate::config::PneuConfig`].

use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use std::error::Error;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Ron,
    Dot,
    Pnml,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Batch {
        runs: Option<usize>,
        steps: Option<usize>,
        seed: Option<u64>,
        csv: Option<PathBuf>,
        json: Option<PathBuf>,
    },
    Simulate {
        steps: Option<usize>,
        seed: Option<u64>,
        story: Vec<String>,
    },
    Export {
        format: ExportFormat,
        output: PathBuf,
    },
}

fn steps_arg() -> Arg {
    Arg::new("steps")
        .long("steps")
        .value_name("N")
        .help("Maximum number of steps per run")
        .value_parser(value_parser!(usize))
}

fn seed_arg() -> Arg {
    Arg::new("seed")
        .long("seed")
        .value_name("SEED")
        .help("Master seed; trial i runs with SEED + i")
        .value_parser(value_parser!(u64))
}

fn make_options_parser() -> clap::Command {
    Command::new("pneu")
        .no_binary_name(true)
        .version("v0.1.0")
        .about("Stochastic executor for condition/event Petri nets")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable debug logging"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("TOML file with default run settings")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("file")
                .value_name("FILE")
                .help("Net source in .pn notation")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .subcommand(
            Command::new("batch")
                .about("Run many independent trials and aggregate them")
                .arg(
                    Arg::new("runs")
                        .short('n')
                        .long("runs")
                        .value_name("RUNS")
                        .help("Number of trials")
                        .value_parser(value_parser!(usize)),
                )
                .arg(steps_arg())
                .arg(seed_arg())
                .arg(
                    Arg::new("csv")
                        .long("csv")
                        .value_name("PATH")
                        .help("Audit log destination")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .value_name("PATH")
                        .help("Trace document destination")
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("simulate")
                .about("Run a single trial and print every step")
                .arg(steps_arg())
                .arg(seed_arg())
                .arg(
                    Arg::new("story")
                        .long("story")
                        .value_name("LABELS")
                        .help("Comma-separated labels to favour, in order")
                        .value_delimiter(',')
                        .action(ArgAction::Append),
                ),
        )
        .subcommand(
            Command::new("export")
                .about("Write the net structure")
                .arg(
                    Arg::new("format")
                        .long("format")
                        .required(true)
                        .value_parser(["json", "ron", "dot", "pnml"]),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("PATH")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub file: PathBuf,
    pub config: Option<PathBuf>,
    pub verbose: bool,
    pub mode: Mode,
}

fn path(matches: &ArgMatches, id: &str) -> Option<PathBuf> {
    matches.get_one::<PathBuf>(id).cloned()
}

impl Options {
    pub fn parse_from_str(s: &str) -> Result<Self, Box<dyn Error>> {
        let flags = shellwords::split(s)?;
        Self::parse_from_args(&flags)
    }

    pub fn parse_from_args(flags: &[String]) -> Result<Self, Box<dyn Error>> {
        let app = make_options_parser();
        let matches = app.try_get_matches_from(flags.iter())?;

        let mode = match matches.subcommand() {
            Some(("batch", sub)) => Mode::Batch {
                runs: sub.get_one::<usize>("runs").copied(),
                steps: sub.get_one::<usize>("steps").copied(),
                seed: sub.get_one::<u64>("seed").copied(),
                csv: path(sub, "csv"),
                json: path(sub, "json"),
            },
            Some(("simulate", sub)) => Mode::Simulate {
                steps: sub.get_one::<usize>("steps").copied(),
                seed: sub.get_one::<u64>("seed").copied(),
                story: sub
                    .get_many::<String>("story")
                    .map(|labels| labels.cloned().collect())
                    .unwrap_or_default(),
            },
            Some(("export", sub)) => {
                let format = match sub.get_one::<String>("format").map(String::as_str) {
                    Some("json") => ExportFormat::Json,
                    Some("ron") => ExportFormat::Ron,
                    Some("dot") => ExportFormat::Dot,
                    Some("pnml") => ExportFormat::Pnml,
                    _ => return Err("UnsupportedExportFormat")?,
                };
                let output = path(sub, "output").ok_or("MissingOutput")?;
                Mode::Export { format, output }
            }
            _ => return Err("MissingCommand")?,
        };

        let file = path(&matches, "file").ok_or("MissingFile")?;
        Ok(Options {
            file,
            config: path(&matches, "config"),
            verbose: matches.get_flag("verbose"),
            mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_batch() {
        let options =
            Options::parse_from_str("-v net.pn batch -n 10 --steps 5 --seed 3 --csv out/a.csv")
                .unwrap();
        assert!(options.verbose);
        assert_eq!(options.file, PathBuf::from("net.pn"));
        assert_eq!(
            options.mode,
            Mode::Batch {
                runs: Some(10),
                steps: Some(5),
                seed: Some(3),
                csv: Some(PathBuf::from("out/a.csv")),
                json: None,
            }
        );
    }

    #[test]
    fn test_parse_simulate_defaults() {
        let options = Options::parse_from_str("-c pneu.toml net.pn simulate").unwrap();
        assert!(!options.verbose);
        assert_eq!(options.config, Some(PathBuf::from("pneu.toml")));
        assert_eq!(
            options.mode,
            Mode::Simulate {
                steps: None,
                seed: None,
                story: Vec::new(),
            }
        );
    }

    #[test]
    fn test_parse_simulate_story() {
        let options =
            Options::parse_from_str("net.pn simulate --story insert,refund --seed 1").unwrap();
        assert_eq!(
            options.mode,
            Mode::Simulate {
                steps: None,
                seed: Some(1),
                story: vec!["insert".to_string(), "refund".to_string()],
            }
        );
    }

    #[test]
    fn test_parse_export_pnml() {
        let options = Options::parse_from_str("net.pn export --format pnml -o net.pnml").unwrap();
        assert_eq!(
            options.mode,
            Mode::Export {
                format: ExportFormat::Pnml,
                output: PathBuf::from("net.pnml"),
            }
        );
    }

    #[test]
    fn test_parse_export() {
        let options = Options::parse_from_str("net.pn export --format dot -o 'out dir/net.dot'").unwrap();
        assert_eq!(
            options.mode,
            Mode::Export {
                format: ExportFormat::Dot,
                output: PathBuf::from("out dir/net.dot"),
            }
        );
    }

    #[test]
    fn test_parse_from_str_err() {
        let options = Options::parse_from_str("net.pn export --format png -o net.png");
        assert!(options.is_err());
    }

    #[test]
    fn test_parse_from_args_err() {
        let options = Options::parse_from_args(&[
            "net.pn".to_owned(),
            "batch".to_owned(),
            "-n".to_owned(),
            "many".to_owned(),
        ]);
        assert!(options.is_err());
    }

    #[test]
    fn test_missing_command_is_err() {
        assert!(Options::parse_from_str("net.pn").is_err());
        assert!(Options::parse_from_str("net.pn simulate 'unterminated").is_err());
    }
}
