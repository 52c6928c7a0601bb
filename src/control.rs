// src/control.rs

//! Interactive control loop.
//!
//! Reads commands from stdin (`run`, `stop`, `list`, `quit`) and forwards
//! them to the coordinator. While a confirmation prompt is pending, the
//! next stdin line answers the prompt instead of being parsed as a command.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::confirm::{Prompt, PromptAnswer};
use crate::coordinator::CoordinatorHandle;
use crate::profile::{ProfileId, RunProfile};
use crate::types::ExecutorKind;

/// Slot the terminal prompt parks its answer channel in.
///
/// The control loop checks the slot before parsing each line; a registered
/// waiter receives the line verbatim.
#[derive(Clone, Default)]
pub struct PromptSlot {
    inner: Arc<Mutex<Option<oneshot::Sender<String>>>>,
}

impl PromptSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self) -> oneshot::Receiver<String> {
        let (tx, rx) = oneshot::channel();
        *self.inner.lock().unwrap() = Some(tx);
        rx
    }

    /// Deliver a line to the pending waiter, if any. Returns `true` when
    /// the line was consumed as a prompt answer.
    fn deliver(&self, line: &str) -> bool {
        let waiter = self.inner.lock().unwrap().take();
        match waiter {
            Some(tx) => {
                let _ = tx.send(line.to_string());
                true
            }
            None => false,
        }
    }
}

/// Confirmation prompt printed to the terminal and answered via stdin.
pub struct TerminalPrompt {
    slot: PromptSlot,
}

impl TerminalPrompt {
    pub fn new(slot: PromptSlot) -> Self {
        Self { slot }
    }
}

impl Prompt for TerminalPrompt {
    fn ask(&self, question: String) -> Pin<Box<dyn Future<Output = PromptAnswer> + Send + '_>> {
        let rx = self.slot.register();
        Box::pin(async move {
            println!("{question}");
            println!("  [y]es / [n]o / [a]lways (yes, and don't ask again)");

            match rx.await {
                Ok(line) => parse_prompt_answer(&line),
                // Stdin closed while waiting: treat as declined.
                Err(_) => PromptAnswer {
                    approved: false,
                    ask_again: true,
                },
            }
        })
    }
}

fn parse_prompt_answer(line: &str) -> PromptAnswer {
    match line.trim().to_lowercase().as_str() {
        "y" | "yes" => PromptAnswer {
            approved: true,
            ask_again: true,
        },
        "a" | "always" => PromptAnswer {
            approved: true,
            ask_again: false,
        },
        _ => PromptAnswer {
            approved: false,
            ask_again: true,
        },
    }
}

/// A parsed control command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run {
        profile: String,
        executor: ExecutorKind,
    },
    Stop {
        profile: String,
    },
    List,
    Quit,
    Help,
}

/// Parse one stdin line into a command. `None` for empty/unknown input.
pub fn parse_command(line: &str) -> Option<Command> {
    let mut words = line.split_whitespace();
    let verb = words.next()?;

    match verb.to_lowercase().as_str() {
        "run" => {
            let profile = words.next()?.to_string();
            let executor = match words.next() {
                Some(word) => word.parse().ok()?,
                None => ExecutorKind::Run,
            };
            Some(Command::Run { profile, executor })
        }
        "stop" => Some(Command::Stop {
            profile: words.next()?.to_string(),
        }),
        "list" | "ls" => Some(Command::List),
        "quit" | "exit" | "q" => Some(Command::Quit),
        "help" | "?" => Some(Command::Help),
        _ => None,
    }
}

/// Read stdin until EOF or `quit`, executing commands against the
/// coordinator. Intended to be spawned; the coordinator loop is the main
/// future.
pub async fn run_control_loop(
    handle: CoordinatorHandle,
    profiles: Arc<BTreeMap<ProfileId, Arc<RunProfile>>>,
    slot: PromptSlot,
) {
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    println!("relaunch ready; type `help` for commands");

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("stdin closed; shutting down");
                let _ = handle.shutdown();
                return;
            }
            Err(e) => {
                warn!(error = %e, "failed to read stdin; shutting down");
                let _ = handle.shutdown();
                return;
            }
        };

        if slot.deliver(&line) {
            continue;
        }

        let command = match parse_command(&line) {
            Some(c) => c,
            None => {
                if !line.trim().is_empty() {
                    println!("unknown command: {line}");
                }
                continue;
            }
        };

        match command {
            Command::Run { profile, executor } => match profiles.get(&profile) {
                Some(p) => {
                    if let Err(e) = handle.restart_profile(Arc::clone(p), executor) {
                        warn!(error = %e, "failed to submit restart request");
                    }
                }
                None => println!("no such profile: {profile}"),
            },
            Command::Stop { profile } => {
                if let Err(e) = handle.stop_profile(profile) {
                    warn!(error = %e, "failed to submit stop request");
                }
            }
            Command::List => {
                let snapshot = handle.registry().snapshot();
                if snapshot.is_empty() {
                    println!("no tracked runs");
                } else {
                    for run in snapshot.iter() {
                        let state = match run.descriptor.process() {
                            Some(h) if h.is_terminated() => "terminated",
                            Some(h) if h.is_terminating() => "terminating",
                            Some(_) => "running",
                            None => "no process",
                        };
                        println!(
                            "  {} {} [{}] {}",
                            run.descriptor.execution_id(),
                            run.descriptor.display_name(),
                            run.executor,
                            state
                        );
                    }
                }
            }
            Command::Quit => {
                let _ = handle.shutdown();
                return;
            }
            Command::Help => {
                println!("commands:");
                println!("  run <profile> [run|debug]   launch or restart a profile");
                println!("  stop <profile>              stop running instances");
                println!("  list                        show tracked runs");
                println!("  quit                        stop everything and exit");
            }
        }
    }
}
