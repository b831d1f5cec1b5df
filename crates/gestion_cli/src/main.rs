//! `gestion` command line.
//!
//! # Responsibility
//! - Parse arguments, resolve configuration and start logging.
//! - Dispatch to one register per subcommand; each opens only its own store.

#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gestion_core::{init_from_config, AppConfig, ConfigOverrides};
use log::{error, info};
use std::path::PathBuf;

mod library;
mod maintenance;
mod meters;
mod orders;
mod output;
mod quotes;
mod tasks;

/// Record-keeping registers: orders, quotes, meters, maintenance, documents
/// and tasks.
#[derive(Parser, Debug)]
#[command(name = "gestion", version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: <config dir>/gestion/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the register databases
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Directory for rolling log files
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// trace | debug | info | warn | error
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Directory for export files given without a directory
    #[arg(long, global = true)]
    export_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Purchase orders register
    Orders {
        #[command(subcommand)]
        command: orders::OrdersCommand,
    },
    /// Quotes register
    Quotes {
        #[command(subcommand)]
        command: quotes::QuotesCommand,
    },
    /// Utility meters, readings and consumption reports
    Meters {
        #[command(subcommand)]
        command: meters::MetersCommand,
    },
    /// Maintenance register and calendar
    Maintenance {
        #[command(subcommand)]
        command: maintenance::MaintenanceCommand,
    },
    /// Document library
    Library {
        #[command(subcommand)]
        command: library::LibraryCommand,
    },
    /// Task manager
    Tasks {
        #[command(subcommand)]
        command: tasks::TasksCommand,
    },
}

impl Command {
    fn register(&self) -> &'static str {
        match self {
            Self::Orders { .. } => "orders",
            Self::Quotes { .. } => "quotes",
            Self::Meters { .. } => "meters",
            Self::Maintenance { .. } => "maintenance",
            Self::Library { .. } => "library",
            Self::Tasks { .. } => "tasks",
        }
    }
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            config_file: self.config.clone(),
            data_dir: self.data_dir.clone(),
            log_dir: self.log_dir.clone(),
            log_level: self.log_level.clone(),
            export_dir: self.export_dir.clone(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config =
        AppConfig::resolve(&cli.overrides()).context("failed to resolve configuration")?;
    if let Err(err) = init_from_config(&config) {
        eprintln!("warning: file logging disabled: {err}");
    }

    let register = cli.command.register();
    info!("event=cli_command module=cli status=start register={register}");
    let result = match cli.command {
        Command::Orders { command } => orders::run(&config, command),
        Command::Quotes { command } => quotes::run(&config, command),
        Command::Meters { command } => meters::run(&config, command),
        Command::Maintenance { command } => maintenance::run(&config, command),
        Command::Library { command } => library::run(&config, command),
        Command::Tasks { command } => tasks::run(&config, command),
    };
    match &result {
        Ok(()) => info!("event=cli_command module=cli status=ok register={register}"),
        Err(_) => error!("event=cli_command module=cli status=error register={register}"),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use crate::library::LibraryCommand;
    use crate::maintenance::MaintenanceCommand;
    use crate::meters::MetersCommand;
    use crate::orders::OrdersCommand;
    use crate::quotes::QuotesCommand;
    use crate::tasks::TasksCommand;
    use chrono::NaiveDate;
    use clap::{CommandFactory, Parser};
    use gestion_core::model::task::TaskStatus;

    fn parse(args: &[&str]) -> Command {
        let mut argv = vec!["gestion"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().command
    }

    #[test]
    fn command_line_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn meters_set_active_takes_an_explicit_value() {
        assert!(matches!(
            parse(&["meters", "set-active", "4", "false"]),
            Command::Meters {
                command: MetersCommand::SetActive { id: 4, active: false }
            }
        ));
        assert!(matches!(
            parse(&["meters", "set-active", "4", "true"]),
            Command::Meters {
                command: MetersCommand::SetActive { id: 4, active: true }
            }
        ));
        assert!(Cli::try_parse_from(["gestion", "meters", "set-active", "4"]).is_err());
    }

    #[test]
    fn meters_reading_commands() {
        match parse(&["meters", "read", "EAU-A1", "2024-03-01", "152.5", "--reset"]) {
            Command::Meters {
                command:
                    MetersCommand::Read {
                        meter,
                        date,
                        index,
                        reset,
                        ..
                    },
            } => {
                assert_eq!(meter, "EAU-A1");
                assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
                assert_eq!(index, 152.5);
                assert!(reset);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(matches!(
            parse(&["meters", "update-reading", "7", "--index", "140"]),
            Command::Meters {
                command: MetersCommand::UpdateReading {
                    id: 7,
                    index: Some(_),
                    date: None,
                    reset: false,
                    ..
                }
            }
        ));
    }

    #[test]
    fn register_specific_subcommands_parse() {
        assert!(matches!(
            parse(&["quotes", "accept", "12", "--no"]),
            Command::Quotes {
                command: QuotesCommand::Accept { id: 12, no: true }
            }
        ));
        assert!(matches!(
            parse(&["orders", "summary", "2024"]),
            Command::Orders {
                command: OrdersCommand::Summary { year: 2024 }
            }
        ));
        assert!(matches!(
            parse(&["library", "parse", "LYON-PLAN-BET-RDC-V02.pdf"]),
            Command::Library {
                command: LibraryCommand::Parse { .. }
            }
        ));
        assert!(matches!(
            parse(&["maintenance", "done", "3", "--date", "2024-05-03"]),
            Command::Maintenance {
                command: MaintenanceCommand::Done { id: 3, date: Some(_), .. }
            }
        ));
        assert!(matches!(
            parse(&["tasks", "status", "9", "done"]),
            Command::Tasks {
                command: TasksCommand::Status {
                    id: 9,
                    status: TaskStatus::Done
                }
            }
        ));
        assert!(Cli::try_parse_from(["gestion", "tasks", "status", "9", "later"]).is_err());
    }

    #[test]
    fn global_flags_are_accepted_after_the_subcommand() {
        let cli = Cli::try_parse_from([
            "gestion",
            "tasks",
            "list",
            "--data-dir",
            "/srv/gestion",
            "--log-level",
            "warn",
        ])
        .unwrap();
        assert_eq!(cli.data_dir.as_deref(), Some(std::path::Path::new("/srv/gestion")));
        assert_eq!(cli.overrides().log_level.as_deref(), Some("warn"));
    }
}
