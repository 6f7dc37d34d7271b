use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, TimeZone};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{AppError, Notification};
use crate::models::task::encode_title;
use crate::models::{NewTask, Task};
use crate::services::mirror::TaskMirror;
use crate::supabase::TaskStore;
use crate::view::{Filter, TaskStats, filter_tasks};

/// Things that happen to the board outside the caller's await.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardEvent {
    /// A toggle completed the last open task.
    AllComplete,
    /// The mirror changed in the background (revert or reload).
    Changed,
    /// Completed tasks were cleared.
    Purged(usize),
    /// A background confirmation failed.
    Failed(Notification),
}

/// Remote confirmation of an optimistic change.
///
/// Dropping it detaches the confirmation; revert/reload still happens and the
/// outcome is still reported on the event channel.
#[derive(Debug)]
pub struct Pending {
    handle: JoinHandle<Result<(), AppError>>,
}

impl Pending {
    /// Waits until the remote call and its revert/reload logic have run.
    pub async fn settle(self) -> Result<(), AppError> {
        self.handle
            .await
            .map_err(|e| AppError::remote("confirm", e.to_string()))?
    }
}

#[derive(Debug)]
pub struct Toggled {
    pub all_complete: bool,
    pub pending: Pending,
}

/// Session-scoped task list for one owner.
///
/// Clones share the same mirror. Mutations update the mirror first and
/// confirm with the store afterwards, so `toggle` and `delete` must be called
/// from within a tokio runtime.
#[derive(Clone)]
pub struct TaskBoard {
    owner_id: String,
    mirror: Arc<Mutex<TaskMirror>>,
    store: Arc<dyn TaskStore>,
    events: mpsc::UnboundedSender<BoardEvent>,
}

impl TaskBoard {
    pub fn new(
        owner_id: impl Into<String>,
        store: Arc<dyn TaskStore>,
        events: mpsc::UnboundedSender<BoardEvent>,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            mirror: Arc::new(Mutex::new(TaskMirror::new())),
            store,
            events,
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    fn mirror(&self) -> MutexGuard<'_, TaskMirror> {
        self.mirror.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn notify(&self, event: BoardEvent) {
        self.events.send(event).ok();
    }

    pub fn snapshot(&self) -> Vec<Task> {
        self.mirror().tasks().to_vec()
    }

    pub fn view(&self, filter: Filter) -> Vec<Task> {
        filter_tasks(self.mirror().tasks(), filter)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn stats<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> TaskStats {
        TaskStats::from_tasks(self.mirror().tasks(), now)
    }

    /// Replaces the mirror with the owner's rows. On failure the mirror is
    /// left empty.
    pub async fn load(&self) -> Result<(), AppError> {
        match self.store.select_tasks(&self.owner_id).await {
            Ok(tasks) => {
                info!("Loaded {} tasks", tasks.len());
                self.mirror().replace(tasks);
                Ok(())
            }
            Err(e) => {
                self.mirror().clear();
                Err(e)
            }
        }
    }

    /// Inserts a task and prepends the row the server returns.
    pub async fn add(&self, title: &str, time: Option<&str>) -> Result<Task, AppError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::Validation("Task title cannot be empty".to_string()));
        }

        let new_task = NewTask::new(self.owner_id.clone(), encode_title(title, time));
        let task = self.store.insert_task(&new_task).await?;
        self.mirror().prepend(task.clone());
        Ok(task)
    }

    /// Sets the completion flag locally and confirms it in the background,
    /// restoring the previous value if the update fails. Until then, reloads
    /// keep showing the new value.
    pub fn toggle(&self, id: &str, completed: bool) -> Result<Toggled, AppError> {
        let applied = self
            .mirror()
            .apply_toggle(id, completed)
            .ok_or(AppError::NotFound)?;

        if applied.all_complete {
            info!("All tasks completed");
            self.notify(BoardEvent::AllComplete);
        }

        let board = self.clone();
        let command = applied.command;
        let handle = tokio::spawn(async move {
            let result = board
                .store
                .update_completed(&command.id, command.next)
                .await;

            match &result {
                Ok(()) => {
                    board.mirror().confirm_toggle(&command);
                }
                Err(e) => {
                    warn!("Reverting toggle of {}: {}", command.id, e);
                    board.mirror().revert_toggle(&command);
                    board.notify(BoardEvent::Changed);
                    board.notify(BoardEvent::Failed(e.notification()));
                }
            }
            result
        });

        Ok(Toggled {
            all_complete: applied.all_complete,
            pending: Pending { handle },
        })
    }

    /// Removes the task locally and deletes it in the background. A failed
    /// delete reloads the whole list from the store.
    pub fn delete(&self, id: &str) -> Result<Pending, AppError> {
        self.mirror().apply_delete(id).ok_or(AppError::NotFound)?;

        let board = self.clone();
        let id = id.to_string();
        let handle = tokio::spawn(async move {
            let result = board.store.delete_task(&id).await;

            match &result {
                Ok(()) => {
                    board.mirror().confirm_delete(&id);
                }
                Err(e) => {
                    warn!("Delete of {} failed, reloading: {}", id, e);
                    board.mirror().abandon_delete(&id);
                    if let Err(reload) = board.load().await {
                        warn!("Reload after failed delete also failed: {}", reload);
                    }
                    board.notify(BoardEvent::Changed);
                    board.notify(BoardEvent::Failed(e.notification()));
                }
            }
            result
        });

        Ok(Pending { handle })
    }

    /// Clears completed tasks locally and remotely. Returns how many were
    /// removed from the mirror.
    pub async fn purge_completed(&self) -> Result<usize, AppError> {
        let removed = self.mirror().remove_completed();
        if removed.is_empty() {
            return Ok(0);
        }

        if let Err(e) = self.store.delete_completed(&self.owner_id).await {
            warn!("Purge failed, reloading: {}", e);
            if let Err(reload) = self.load().await {
                warn!("Reload after failed purge also failed: {}", reload);
            }
            self.notify(BoardEvent::Changed);
            return Err(e);
        }

        info!("Purged {} completed tasks", removed.len());
        self.notify(BoardEvent::Purged(removed.len()));
        Ok(removed.len())
    }

    /// Forgets every row; used on logout.
    pub fn clear(&self) {
        self.mirror().clear();
    }
}
