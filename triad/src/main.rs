//! Three-role code-running conversation CLI.
//!
//! `triad run "task"` drives a Proposer, Validator, and Executor through a
//! bounded conversation: code proposals are safety-reviewed, then persisted
//! and run in a disposable container, until the Proposer signals completion
//! or a limit fires.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use triad::core::termination::default_termination;
use triad::core::types::{Message, Source};
use triad::driver::{DriverConfig, StopReason, run_conversation};
use triad::exit_codes;
use triad::io::config::{TriadConfig, load_config, write_config};
use triad::io::fragment_store::FragmentStore;
use triad::io::model::OpenAiModelClient;
use triad::io::sandbox::DockerSandbox;
use triad::io::workspace::WorkDir;
use triad::logging;
use triad::roles::{ExecutorAgent, ProposerAgent, Role, ValidatorAgent};

#[derive(Parser)]
#[command(
    name = "triad",
    version,
    about = "Three-role code-running conversation loop"
)]
struct Cli {
    /// Path to the run configuration.
    #[arg(long, default_value = "triad.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default `triad.toml` for editing.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Run one conversation for the given task.
    Run {
        /// The task to solve, given to the Proposer as the opening message.
        task: String,

        /// Override the configured hard cap on messages.
        #[arg(long)]
        max_turns: Option<usize>,

        /// Seed the history with this Proposer preamble after the task.
        #[arg(long)]
        preamble: Option<String>,
    },
}

fn main() {
    logging::init();
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
        Command::Run {
            task,
            max_turns,
            preamble,
        } => cmd_run(&cli.config, &task, max_turns, preamble),
    }
}

fn cmd_init(path: &PathBuf, force: bool) -> Result<i32> {
    if path.exists() && !force {
        println!("{} already exists (use --force to overwrite)", path.display());
        return Ok(exit_codes::OK);
    }
    write_config(path, &TriadConfig::default())
        .with_context(|| format!("write {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(exit_codes::OK)
}

fn cmd_run(
    config_path: &PathBuf,
    task: &str,
    max_turns: Option<usize>,
    preamble: Option<String>,
) -> Result<i32> {
    let mut config =
        load_config(config_path).with_context(|| format!("load {}", config_path.display()))?;
    if let Some(cap) = max_turns {
        config.max_turns = cap;
    }
    config.validate()?;

    let cancel = Arc::new(AtomicBool::new(false));
    let workdir = WorkDir::create()?;
    let sandbox = DockerSandbox::start(&config.sandbox, workdir.path(), Some(Arc::clone(&cancel)))
        .context("start sandbox container")?;
    let client = OpenAiModelClient::new(&config.model);

    let proposer = ProposerAgent::new(&client)?;
    let validator = ValidatorAgent::new(&client)?;
    let executor = ExecutorAgent::new(
        &sandbox,
        FragmentStore::new(workdir.path()),
        Duration::from_secs(config.sandbox.fragment_timeout_secs),
    );
    let roles: [&dyn Role; 3] = [&proposer, &validator, &executor];

    let driver_config = DriverConfig {
        max_turns: config.max_turns,
        deadline: (config.run_timeout_secs > 0)
            .then(|| Instant::now() + Duration::from_secs(config.run_timeout_secs)),
    };
    let mut seed = vec![Message::text(Source::User, task)];
    if let Some(preamble) = preamble {
        seed.push(Message::text(Source::Proposer, preamble));
    }
    for message in &seed {
        println!("{}: {}", message.source.as_str(), message.content);
    }

    let outcome = run_conversation(
        &roles,
        seed,
        &default_termination(config.max_turns),
        &driver_config,
        &cancel,
        |message| println!("{}: {}", message.source.as_str(), message.content),
    )?;

    println!("Task completed: {}", outcome.stop);
    Ok(match outcome.stop {
        StopReason::Condition(_) => exit_codes::OK,
        StopReason::TurnCap(_) => exit_codes::TURN_CAP,
        StopReason::Cancelled(_) => exit_codes::CANCELLED,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::parse_from(["triad", "init"]);
        assert!(matches!(cli.command, Command::Init { force: false }));
    }

    #[test]
    fn parse_init_force() {
        let cli = Cli::parse_from(["triad", "init", "--force"]);
        assert!(matches!(cli.command, Command::Init { force: true }));
    }

    #[test]
    fn parse_run_with_overrides() {
        let cli = Cli::parse_from([
            "triad",
            "run",
            "add 2 and 2",
            "--max-turns",
            "6",
            "--config",
            "custom.toml",
            "--preamble",
            "Ok, let's write code",
        ]);
        assert_eq!(cli.config, PathBuf::from("custom.toml"));
        match cli.command {
            Command::Run {
                task,
                max_turns,
                preamble,
            } => {
                assert_eq!(task, "add 2 and 2");
                assert_eq!(max_turns, Some(6));
                assert_eq!(preamble.as_deref(), Some("Ok, let's write code"));
            }
            Command::Init { .. } => panic!("expected run"),
        }
    }
}
