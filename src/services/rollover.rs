use std::time::Duration;

use chrono::{Local, NaiveDate};
use tracing::{info, warn};

use crate::error::AppError;
use crate::services::board::{BoardEvent, TaskBoard};

pub const DEFAULT_INTERVAL_SECS: u64 = 10;

pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Wall-clock date in the machine's timezone.
pub struct LocalClock;

impl Clock for LocalClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// End-of-day cleanup.
///
/// Polls the calendar date every `interval` and purges completed tasks when
/// the date has moved on since the last check. The purge can trail midnight
/// by up to one interval.
pub struct DayRolloverScheduler<C: Clock> {
    board: TaskBoard,
    clock: C,
    interval: Duration,
    last_date: NaiveDate,
}

impl<C: Clock> DayRolloverScheduler<C> {
    pub fn new(board: TaskBoard, clock: C, interval_secs: u64) -> Self {
        let last_date = clock.today();
        Self {
            board,
            clock,
            interval: Duration::from_secs(interval_secs),
            last_date,
        }
    }

    pub fn last_date(&self) -> NaiveDate {
        self.last_date
    }

    /// Runs the poll loop forever; abort the task to stop it.
    pub async fn start(mut self) {
        info!("Starting day rollover scheduler (interval: {:?})", self.interval);

        loop {
            tokio::time::sleep(self.interval).await;

            match self.check().await {
                Ok(Some(purged)) => info!("New day: cleared {} completed tasks", purged),
                Ok(None) => {}
                Err(e) => {
                    warn!("Day rollover purge failed: {:?}", e);
                    self.board.notify(BoardEvent::Failed(e.notification()));
                }
            }
        }
    }

    /// Purges if the date changed since the previous check. Returns the
    /// number of purged tasks, or `None` when it is still the same day.
    pub async fn check(&mut self) -> Result<Option<usize>, AppError> {
        let today = self.clock.today();
        if today == self.last_date {
            return Ok(None);
        }

        info!("Date changed from {} to {}", self.last_date, today);
        self.last_date = today;
        self.board.purge_completed().await.map(Some)
    }
}
