use std::io::Write;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{AppError, Level, Notification};
use crate::models::{ProfileUpdate, Session, SignUpOutcome, Task};
use crate::services::{
    BoardEvent, DayRolloverScheduler, LocalClock, Screen, SessionController, TaskBoard,
};
use crate::view::{self, Filter};

#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_version_flag = true)]
pub struct ShellLine {
    #[command(subcommand)]
    pub command: ShellCommand,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum ShellCommand {
    /// Sign in with e-mail and password
    Signin { email: String, password: String },
    /// Create an account
    Signup { email: String, password: String },
    /// Sign out and forget the task list
    Logout,
    /// Show the profile, or edit it with `profile set`
    Profile {
        #[command(subcommand)]
        action: Option<ProfileAction>,
    },
    /// List tasks: all, active or completed
    List { filter: Option<Filter> },
    /// Add a task, optionally with a time of day
    Add {
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
        /// Time as HH:MM
        #[arg(long)]
        at: Option<String>,
    },
    /// Flip a task between open and done (list number or id)
    Toggle { reference: String },
    /// Delete a task (list number or id)
    Delete { reference: String },
    /// Completion statistics
    Stats,
    /// Clear completed tasks now
    Purge,
    /// Leave the shell
    #[command(alias = "exit")]
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum ProfileAction {
    Set {
        #[arg(long)]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        /// Date of birth as YYYY-MM-DD
        #[arg(long)]
        dob: Option<NaiveDate>,
        #[arg(long)]
        gender: Option<String>,
        #[arg(long, default_value = "")]
        location: String,
    },
}

/// Splits a shell line into words; double quotes group words.
pub fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut has_word = false;

    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                has_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if has_word {
                    words.push(std::mem::take(&mut current));
                    has_word = false;
                }
            }
            c => {
                current.push(c);
                has_word = true;
            }
        }
    }
    if has_word {
        words.push(current);
    }
    words
}

pub fn parse_line(line: &str) -> Result<Option<ShellCommand>, clap::Error> {
    let words = split_words(line);
    if words.is_empty() {
        return Ok(None);
    }
    ShellLine::try_parse_from(words).map(|parsed| Some(parsed.command))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Shell {
    controller: SessionController,
    filter: Filter,
    rollover_secs: u64,
    rollover: Option<(String, JoinHandle<()>)>,
}

impl Shell {
    pub fn new(controller: SessionController, rollover_secs: u64) -> Self {
        Self {
            controller,
            filter: Filter::All,
            rollover_secs,
            rollover: None,
        }
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    /// Owner whose board the rollover task is currently watching.
    pub fn rollover_owner(&self) -> Option<&str> {
        self.rollover.as_ref().map(|(owner, _)| owner.as_str())
    }

    pub async fn start(&mut self) -> Result<(), AppError> {
        let result = self.controller.start().await;
        self.screen_changed();
        result.map(|_| ())
    }

    pub fn prompt(&self) {
        let marker = match self.controller.screen() {
            Screen::Loader => "…",
            Screen::Auth => "auth",
            Screen::Profile => "profile",
            Screen::Dashboard => "todo",
        };
        print!("{}> ", marker);
        std::io::stdout().flush().ok();
    }

    pub async fn handle_line(&mut self, line: &str) -> Flow {
        let command = match parse_line(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Flow::Continue,
            Err(e) => {
                println!("{}", e.render());
                return Flow::Continue;
            }
        };

        debug!("shell command: {:?}", command);
        if command == ShellCommand::Quit {
            return Flow::Quit;
        }

        if let Err(e) = self.dispatch(command).await {
            show(&e.notification());
        }
        Flow::Continue
    }

    pub async fn handle_session(&mut self, session: Option<Session>) {
        let result = self.controller.handle_session(session).await;
        self.screen_changed();
        if let Err(e) = result {
            show(&e.notification());
        }
    }

    pub fn handle_event(&mut self, event: BoardEvent) {
        match event {
            BoardEvent::AllComplete => show(&Notification::success("All tasks completed!")),
            BoardEvent::Changed => self.render_list(),
            BoardEvent::Purged(count) => {
                show(&Notification::info(format!("Cleared {} completed tasks", count)));
                self.render_list();
            }
            BoardEvent::Failed(note) => show(&note),
        }
    }

    async fn dispatch(&mut self, command: ShellCommand) -> Result<(), AppError> {
        match command {
            ShellCommand::Signin { email, password } => {
                self.controller.sign_in(&email, &password).await?;
                show(&Notification::success("Welcome back!"));
            }
            ShellCommand::Signup { email, password } => {
                let outcome = self.controller.sign_up(&email, &password).await?;
                let message = match outcome {
                    SignUpOutcome::SignedIn(_) => "Account created!",
                    SignUpOutcome::ConfirmationRequired(_) => {
                        "Account created! Please check your email."
                    }
                };
                show(&Notification::success(message));
            }
            ShellCommand::Logout => {
                self.controller.sign_out().await?;
                self.screen_changed();
                show(&Notification::success("Logged out successfully"));
            }
            ShellCommand::Profile { action: None } => {
                let profile = self.controller.profile().ok_or(AppError::Unauthenticated)?;
                println!("{}", view::render_greeting(profile, &Local::now()));
                println!("Name: {}", profile.full_name());
                if let Some(dob) = profile.dob {
                    println!("Born: {}", dob);
                }
                if let Some(gender) = &profile.gender {
                    println!("Gender: {}", gender);
                }
            }
            ShellCommand::Profile {
                action:
                    Some(ProfileAction::Set {
                        first_name,
                        last_name,
                        dob,
                        gender,
                        location,
                    }),
            } => {
                let update = ProfileUpdate {
                    first_name,
                    last_name,
                    dob,
                    gender,
                    location,
                };
                let result = self.controller.update_profile(update).await;
                self.screen_changed();
                result?;
                show(&Notification::success("Profile updated!"));
            }
            ShellCommand::List { filter } => {
                if let Some(filter) = filter {
                    self.filter = filter;
                }
                self.render_list();
            }
            ShellCommand::Add { title, at } => {
                let board = self.board()?;
                board.add(&title.join(" "), at.as_deref()).await?;
                self.render_list();
            }
            ShellCommand::Toggle { reference } => {
                let board = self.board()?;
                let task = self.resolve(&board, &reference)?;
                // the confirmation reports failures through the event channel
                let _ = board.toggle(&task.id, !task.is_completed)?;
                self.render_list();
            }
            ShellCommand::Delete { reference } => {
                let board = self.board()?;
                let task = self.resolve(&board, &reference)?;
                let _ = board.delete(&task.id)?;
                self.render_list();
            }
            ShellCommand::Stats => {
                let board = self.board()?;
                println!("{}", view::render_stats(&board.stats(&Local::now())));
            }
            ShellCommand::Purge => {
                let board = self.board()?;
                let purged = board.purge_completed().await?;
                info!("Manual purge removed {} tasks", purged);
            }
            ShellCommand::Quit => {}
        }
        Ok(())
    }

    fn board(&self) -> Result<TaskBoard, AppError> {
        match (self.controller.screen(), self.controller.board()) {
            (Screen::Dashboard, Some(board)) => Ok(board.clone()),
            _ => Err(AppError::Unauthenticated),
        }
    }

    /// A 1-based position in the current view, or a task id.
    fn resolve(&self, board: &TaskBoard, reference: &str) -> Result<Task, AppError> {
        let visible = board.view(self.filter);
        if let Ok(position) = reference.parse::<usize>() {
            if let Some(task) = position.checked_sub(1).and_then(|i| visible.get(i)) {
                return Ok(task.clone());
            }
        }
        board
            .snapshot()
            .into_iter()
            .find(|t| t.id == reference)
            .ok_or(AppError::NotFound)
    }

    fn render_list(&self) {
        if let Ok(board) = self.board() {
            let stats = board.stats(&Local::now());
            println!("{}", view::render_tasks(&board.snapshot(), self.filter, &stats));
        }
    }

    /// Starts or stops the rollover task to follow the active board.
    fn screen_changed(&mut self) {
        let active = self.board().ok();
        let current_owner = self.rollover.as_ref().map(|(owner, _)| owner.as_str());

        if active.as_ref().map(TaskBoard::owner_id) == current_owner {
            return;
        }

        if let Some((_, handle)) = self.rollover.take() {
            handle.abort();
        }

        match active {
            Some(board) => {
                if let Some(profile) = self.controller.profile() {
                    println!("{}", view::render_greeting(profile, &Local::now()));
                }
                self.filter = Filter::All;
                self.render_list();

                let owner = board.owner_id().to_string();
                let scheduler = DayRolloverScheduler::new(board, LocalClock, self.rollover_secs);
                self.rollover = Some((owner, tokio::spawn(scheduler.start())));
            }
            None => match self.controller.screen() {
                Screen::Profile => {
                    println!("Tell us about yourself: profile set --first-name <name> …")
                }
                _ => println!("Sign in with `signin <email> <password>` or `signup`."),
            },
        }
    }
}

fn show(note: &Notification) {
    let tag = match note.level {
        Level::Info => "i",
        Level::Success => "✓",
        Level::Error => "!",
    };
    println!("[{}] {}", tag, note.message);
}
