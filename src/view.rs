use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDate, TimeZone};

use crate::error::AppError;
use crate::models::task::{format_time_12h, split_title};
use crate::models::{Profile, Task};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Filter {
    #[default]
    All,
    Active,
    Completed,
}

impl Filter {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            Filter::All => true,
            Filter::Active => !task.is_completed,
            Filter::Completed => task.is_completed,
        }
    }
}

impl FromStr for Filter {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Filter::All),
            "active" => Ok(Filter::Active),
            "completed" => Ok(Filter::Completed),
            other => Err(AppError::Validation(format!("Unknown filter: {}", other))),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Filter::All => "all",
            Filter::Active => "active",
            Filter::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Tasks matching `filter`, in mirror order.
pub fn filter_tasks(tasks: &[Task], filter: Filter) -> Vec<&Task> {
    tasks.iter().filter(|t| filter.matches(t)).collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub active: usize,
    /// Rounded completion rate, 0 for an empty list.
    pub completion_percent: u32,
    /// Unrounded completion ratio in `0.0..=1.0`.
    pub progress: f64,
    /// Some completed task was created on `now`'s calendar day.
    pub completed_today: bool,
}

impl TaskStats {
    pub fn from_tasks<Tz: TimeZone>(tasks: &[Task], now: &DateTime<Tz>) -> Self {
        let total = tasks.len();
        let completed = tasks.iter().filter(|t| t.is_completed).count();
        let progress = if total > 0 {
            completed as f64 / total as f64
        } else {
            0.0
        };

        let today = now.date_naive();
        let tz = now.timezone();
        let completed_today = tasks
            .iter()
            .any(|t| t.is_completed && t.created_at.with_timezone(&tz).date_naive() == today);

        Self {
            total,
            completed,
            active: total - completed,
            completion_percent: (progress * 100.0).round() as u32,
            progress,
            completed_today,
        }
    }

    pub fn streak_label(&self) -> &'static str {
        if self.completed_today { "1 Day" } else { "0 Days" }
    }
}

/// One row as the user sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskView {
    pub id: String,
    pub title: String,
    pub time: Option<String>,
    pub created_on: NaiveDate,
    pub completed: bool,
}

impl TaskView {
    pub fn from_task(task: &Task) -> Self {
        Self::in_timezone(task, &Local)
    }

    pub fn in_timezone<Tz: TimeZone>(task: &Task, tz: &Tz) -> Self {
        let (title, time) = split_title(&task.title);
        Self {
            id: task.id.clone(),
            title: title.to_string(),
            time: time.map(format_time_12h),
            created_on: task.created_at.with_timezone(tz).date_naive(),
            completed: task.is_completed,
        }
    }
}

impl fmt::Display for TaskView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.completed { "x" } else { " " };
        write!(f, "[{}] {}", mark, self.title)?;
        if let Some(time) = &self.time {
            write!(f, "  @ {}", time)?;
        }
        write!(f, "  ({})", self.created_on.format("%Y-%m-%d"))
    }
}

/// Numbered task list followed by the progress line.
pub fn render_tasks(tasks: &[Task], filter: Filter, stats: &TaskStats) -> String {
    let visible = filter_tasks(tasks, filter);
    let mut out = String::new();

    if visible.is_empty() {
        out.push_str("  No tasks here yet.\n");
    }
    for (index, task) in visible.iter().enumerate() {
        out.push_str(&format!("{:>3}. {}\n", index + 1, TaskView::from_task(task)));
    }

    out.push_str(&format!(
        "  {} total, {} active, {} completed ({}%)  [{}]",
        stats.total,
        stats.active,
        stats.completed,
        stats.completion_percent,
        filter
    ));
    out
}

pub fn render_stats(stats: &TaskStats) -> String {
    format!(
        "Completed: {}\nCompletion rate: {}%\nStreak: {}",
        stats.completed,
        stats.completion_percent,
        stats.streak_label()
    )
}

pub fn render_greeting<Tz: TimeZone>(profile: &Profile, now: &DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    format!(
        "({}) Hello, {} | {} | {}",
        profile.avatar_initial(),
        profile.display_first_name(),
        profile.display_location(),
        now.format("%A, %B %-d, %Y")
    )
}
