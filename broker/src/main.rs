//! Message expiry store and timer trigger processor.
//!
//! Keeps buffered messages in `.broker/store.json` (three indexed partitions)
//! and processes timer `TRIGGER` commands against a scenario of armed timers
//! and workflow state, printing the records a broker would append.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;

use broker::core::message::{Message, lossy};
use broker::core::types::{ElementInstanceRef, TimerCommand, TimerInstance, TriggerOutcome};
use broker::exit_codes;
use broker::io::catch_event::DefaultCatchEventBehavior;
use broker::io::clock::{Clock, FixedClock, SystemClock};
use broker::io::config::load_config;
use broker::io::init::{BrokerPaths, InitOptions, init_broker};
use broker::io::log_writer::{LoggedRecord, RecordingWriter};
use broker::io::memory_kv::MemoryEngine;
use broker::io::message_store::MessageStore;
use broker::io::scenario::{Scenario, load_scenario, write_scenario};
use broker::logging;
use broker::timer_trigger::TriggerTimerProcessor;

#[derive(Parser)]
#[command(
    name = "broker",
    version,
    about = "Message expiry store and timer trigger processor"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `.broker/` with default config, an empty store, and no timers.
    Init {
        /// Overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },
    /// Operate on buffered messages.
    Message {
        #[command(subcommand)]
        action: MessageAction,
    },
    /// Process timer commands.
    Timer {
        #[command(subcommand)]
        action: TimerAction,
    },
}

#[derive(Subcommand)]
enum MessageAction {
    /// Store a message, replacing any with the same name and correlation key.
    Put {
        #[arg(long)]
        name: String,
        #[arg(long)]
        correlation_key: String,
        /// Absolute expiry deadline in epoch milliseconds.
        #[arg(long, allow_hyphen_values = true)]
        ttl: i64,
        #[arg(long, default_value = "")]
        id: String,
        #[arg(long, default_value = "")]
        payload: String,
    },
    /// Print the message stored under a name and correlation key.
    Find {
        #[arg(long)]
        name: String,
        #[arg(long)]
        correlation_key: String,
    },
    /// Check whether a message with this id was stored.
    Exists {
        #[arg(long)]
        name: String,
        #[arg(long)]
        correlation_key: String,
        #[arg(long)]
        id: String,
    },
    /// Delete the stored message and its index entries.
    Remove {
        #[arg(long)]
        name: String,
        #[arg(long)]
        correlation_key: String,
    },
    /// Print messages whose deadline is at or before a timestamp, oldest first.
    Expired {
        #[arg(long, allow_hyphen_values = true)]
        before: i64,
    },
}

#[derive(Subcommand)]
enum TimerAction {
    /// Process one TRIGGER command and print the records it produced.
    Trigger {
        /// Scenario file (defaults to `.broker/timers.json`).
        #[arg(long)]
        scenario: Option<PathBuf>,
        /// Timer key.
        #[arg(long)]
        key: u64,
        /// Owning element instance to address (-1 for none).
        #[arg(long, allow_hyphen_values = true)]
        element_instance: Option<i64>,
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
    let paths = BrokerPaths::new(".");
    match cli.command {
        Command::Init { force } => {
            init_broker(&paths.root, &InitOptions { force })?;
            Ok(exit_codes::OK)
        }
        Command::Message { action } => cmd_message(&paths, action),
        Command::Timer {
            action:
                TimerAction::Trigger {
                    scenario,
                    key,
                    element_instance,
                },
        } => {
            let scenario_path = scenario.unwrap_or_else(|| paths.timers_path.clone());
            cmd_trigger(&scenario_path, key, element_instance)
        }
    }
}

fn open_store(paths: &BrokerPaths) -> Result<MessageStore<MemoryEngine>> {
    let config = load_config(&paths.config_path)?;
    let engine = MemoryEngine::open(&paths.store_path)?;
    MessageStore::open(engine, &config.store).context("open message store")
}

fn cmd_message(paths: &BrokerPaths, action: MessageAction) -> Result<i32> {
    let mut store = open_store(paths)?;
    let code = match action {
        MessageAction::Put {
            name,
            correlation_key,
            ttl,
            id,
            payload,
        } => {
            let message = Message::new(name, correlation_key, ttl)
                .with_id(id)
                .with_payload(payload);
            store.put(&message)?;
            exit_codes::OK
        }
        MessageAction::Find {
            name,
            correlation_key,
        } => match store.find(name.as_bytes(), correlation_key.as_bytes())? {
            Some(message) => {
                println!("{}", message_json(&message));
                exit_codes::OK
            }
            None => exit_codes::NOT_FOUND,
        },
        MessageAction::Exists {
            name,
            correlation_key,
            id,
        } => {
            let candidate = Message::new(name, correlation_key, 0).with_id(id);
            if store.exists(&candidate)? {
                exit_codes::OK
            } else {
                exit_codes::NOT_FOUND
            }
        }
        MessageAction::Remove {
            name,
            correlation_key,
        } => match store.find(name.as_bytes(), correlation_key.as_bytes())? {
            Some(message) => {
                store.remove(&message)?;
                exit_codes::OK
            }
            None => exit_codes::NOT_FOUND,
        },
        MessageAction::Expired { before } => {
            for message in store.find_before(before)? {
                println!("{}", message_json(&message));
            }
            exit_codes::OK
        }
    };
    store.close().context("flush message store")?;
    Ok(code)
}

fn cmd_trigger(scenario_path: &Path, key: u64, element_instance: Option<i64>) -> Result<i32> {
    let mut scenario = load_scenario(scenario_path)?;
    let owner = element_instance
        .map(ElementInstanceRef::try_from)
        .transpose()
        .context("parse --element-instance")?;
    let command = scenario.trigger_command(key, owner);

    let (outcome, records, timers) = match scenario.now_ms {
        Some(now_ms) => trigger(&scenario, &command, FixedClock(now_ms))?,
        None => trigger(&scenario, &command, SystemClock)?,
    };
    for record in &records {
        println!("{}", serde_json::to_string(record).context("serialize record")?);
    }

    scenario.timers = timers;
    write_scenario(scenario_path, &scenario)?;
    Ok(match outcome {
        TriggerOutcome::Rejected(_) => exit_codes::REJECTED,
        TriggerOutcome::Triggered { .. } => exit_codes::OK,
    })
}

fn trigger<C: Clock>(
    scenario: &Scenario,
    command: &TimerCommand,
    clock: C,
) -> Result<(TriggerOutcome, Vec<LoggedRecord>, Vec<TimerInstance>)> {
    let mut timers = scenario.timer_state();
    let instances = scenario.element_instances();
    let workflows = scenario.workflow_repository();
    let behavior = DefaultCatchEventBehavior::new(&instances, clock);
    let mut writer = RecordingWriter::new();

    let outcome = TriggerTimerProcessor::new(&mut timers, &instances, &workflows, behavior)
        .process(command, &mut writer)
        .with_context(|| format!("trigger timer {}", command.key))?;

    Ok((outcome, writer.into_records(), timers.timers()))
}

fn message_json(message: &Message) -> serde_json::Value {
    json!({
        "name": lossy(&message.name),
        "correlation_key": lossy(&message.correlation_key),
        "time_to_live": message.time_to_live,
        "id": lossy(&message.id),
        "payload": lossy(&message.payload),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init_force() {
        let cli = Cli::parse_from(["broker", "init", "--force"]);
        assert!(matches!(cli.command, Command::Init { force: true }));
    }

    /// Deadlines may be negative; clap must not read them as flags.
    #[test]
    fn parse_message_put_with_negative_ttl() {
        let cli = Cli::parse_from([
            "broker",
            "message",
            "put",
            "--name",
            "order",
            "--correlation-key",
            "o-1",
            "--ttl",
            "-5",
        ]);
        let Command::Message {
            action: MessageAction::Put { ttl, id, .. },
        } = cli.command
        else {
            panic!("expected message put");
        };
        assert_eq!(ttl, -5);
        assert!(id.is_empty());
    }

    #[test]
    fn parse_timer_trigger_unowned() {
        let cli = Cli::parse_from([
            "broker",
            "timer",
            "trigger",
            "--key",
            "3",
            "--element-instance",
            "-1",
        ]);
        let Command::Timer {
            action:
                TimerAction::Trigger {
                    scenario,
                    key,
                    element_instance,
                },
        } = cli.command
        else {
            panic!("expected timer trigger");
        };
        assert!(scenario.is_none());
        assert_eq!(key, 3);
        assert_eq!(element_instance, Some(-1));
    }

    #[test]
    fn message_json_renders_bytes_as_text() {
        let message = Message::new("order", "o-1", 10).with_payload("{\"a\":1}");
        let json = message_json(&message);
        assert_eq!(json["name"], "order");
        assert_eq!(json["time_to_live"], 10);
        assert_eq!(json["payload"], "{\"a\":1}");
    }
}
