use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser};
use log::info;
use tokio::io::{AsyncBufReadExt, BufReader};

mod config;
mod controller;
mod event_bus;
mod extractor;
mod greeter;
mod llm_manager;
mod logger;
mod providers;
mod recommender;
mod response_parser;
mod session;
mod task_store;
mod ui;

use config::Config;
use controller::{AddOutcome, TodoController};
use event_bus::{Event, EventBus};
use llm_manager::{LLMManager, LLMProvider};
use providers::offline::OfflineProvider;
use providers::openai::OpenAIProvider;
use session::Session;
use ui::TerminalUI;

#[derive(Parser)]
#[command(name = "todo_ranker", version, about)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<String>,
    /// Verbose logging (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    /// Answer locally instead of calling the model service
    #[arg(long)]
    offline: bool,
    /// No colors, no spinners
    #[arg(long)]
    plain: bool,
    /// Tasks to add and rank in one go; starts the interactive shell when empty
    tasks: Vec<String>,
}

#[derive(Debug, PartialEq)]
enum Command {
    Add(String),
    Recommend,
    List,
    Why,
    Dismiss,
    Help,
    Quit,
    Nothing,
}

fn parse_command(line: &str) -> Command {
    let line = line.trim();
    let (head, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    match head.to_lowercase().as_str() {
        "" => Command::Nothing,
        "add" => Command::Add(rest.trim().to_string()),
        "rec" | "recommend" if rest.is_empty() => Command::Recommend,
        "list" | "ls" if rest.is_empty() => Command::List,
        "why" if rest.is_empty() => Command::Why,
        "dismiss" if rest.is_empty() => Command::Dismiss,
        "help" | "?" if rest.is_empty() => Command::Help,
        "quit" | "exit" | "q" if rest.is_empty() => Command::Quit,
        _ => Command::Add(line.to_string()),
    }
}

/// Wires the shell to the controller for one session.
struct Shell<'a> {
    controller: TodoController<'a>,
    ui: TerminalUI,
    bus: Arc<EventBus>,
}

impl Shell<'_> {
    async fn add(&self, session: &mut Session, input: &str) {
        let spinner = self.ui.spinner("Reading your task...");
        let today = chrono::Local::now().date_naive();
        let outcome = self.controller.add_task(session, input, today).await;
        if let Some(bar) = spinner {
            bar.finish_and_clear();
        }

        match outcome {
            Ok(outcome @ AddOutcome::Added { .. }) => {
                if outcome.is_invalid_task() {
                    self.ui
                        .warning("Could not find a task in that description; stored as Invalid Task");
                } else {
                    self.ui.success("Task added successfully");
                }
            }
            Ok(AddOutcome::Duplicate(title)) => {
                self.ui.warning(&format!("Task already exists: {}", title));
            }
            Ok(AddOutcome::Ignored) => {}
            Err(e) => self.ui.error(&format!("Could not add task: {}", e)),
        }
    }

    /// Returns whether a recommendation was applied.
    async fn recommend(&self, session: &mut Session) -> bool {
        if !session.can_recommend() {
            self.ui.warning("Add a task first; there is nothing to rank yet");
            return false;
        }

        let spinner = self.ui.spinner("Generating...");
        let result = self.controller.recommend(session).await;
        if let Some(bar) = spinner {
            bar.finish_and_clear();
        }

        match result {
            Ok(Some(report)) => {
                if let Some(rec) = &session.last_recommendation {
                    self.ui.recommendation(rec);
                }
                self.ui.merge_report(&report);
                true
            }
            Ok(None) => false,
            Err(e) => {
                self.ui.error(&format!("Could not generate recommendation: {}", e));
                false
            }
        }
    }

    fn show(&self, session: &Session) {
        if session.show_info {
            self.ui.info_banner();
        }
        self.ui.table(session.store.records());
    }

    async fn status(&self, session: &Session) {
        self.ui.status(session.store.len(), &self.bus.get_metrics().await);
    }

    /// Add every task, then rank once. Fails when no ranking was applied.
    async fn run_batch(&self, session: &mut Session, tasks: &[String]) -> Result<()> {
        for task in tasks {
            self.add(session, task).await;
        }
        let ranked = self.recommend(session).await;
        self.ui.table(session.store.records());
        self.status(session).await;
        if !ranked {
            bail!("No recommendation was applied to the {} task(s) in the list", session.store.len());
        }
        Ok(())
    }

    async fn run_interactive(&self, session: &mut Session) -> Result<()> {
        self.show(session);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            print!("> ");
            std::io::stdout().flush()?;

            let Some(line) = lines.next_line().await.context("Failed to read input")? else {
                break;
            };

            match parse_command(&line) {
                Command::Nothing => continue,
                Command::Quit => break,
                Command::Help => self.ui.help(),
                Command::Dismiss => {
                    session.dismiss_info();
                    self.show(session);
                }
                Command::List => self.show(session),
                Command::Why => match &session.last_recommendation {
                    Some(rec) => self.ui.recommendation(rec),
                    None => self.ui.warning("No recommendation yet; type `rec` to get one"),
                },
                Command::Add(text) => {
                    self.add(session, &text).await;
                    self.show(session);
                }
                Command::Recommend => {
                    self.recommend(session).await;
                    self.show(session);
                    self.status(session).await;
                }
            }
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    logger::init(args.verbose);

    let (mut config, config_path) = Config::load(&args.config).context("Failed to load configuration")?;
    config.merge_with_args(args.plain);
    let config = Arc::new(config);

    let bus = Arc::new(EventBus::new(100));
    logger::spawn_event_logger(&bus);
    bus.emit(Event::ConfigLoaded { path: config_path }).await?;

    let provider: Box<dyn LLMProvider> = if args.offline {
        Box::new(OfflineProvider)
    } else {
        Box::new(
            OpenAIProvider::from_config(&config.gateway)
                .context("Cannot reach the model service without an API key (try --offline)")?,
        )
    };
    let llm = LLMManager::new(provider, config.clone()).with_event_bus(bus.clone());
    info!("Using {} provider", llm.provider_name());

    let mut session = Session::new(config.ui.show_info);
    bus.emit(Event::SessionStarted {
        session_id: session.id.to_string(),
    })
    .await?;
    info!("Session {} started", session.id);

    let shell = Shell {
        controller: TodoController::new(&llm).with_event_bus(bus.clone()),
        ui: TerminalUI::new(&config.ui),
        bus: bus.clone(),
    };

    let spinner = shell.ui.spinner("Warming up...");
    let greeting = shell.controller.greeting(&mut session).await;
    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }
    shell.ui.start(&greeting)?;

    if args.tasks.is_empty() {
        shell.run_interactive(&mut session).await
    } else {
        shell.run_batch(&mut session, &args.tasks).await
    }
}
