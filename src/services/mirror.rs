use crate::models::Task;

/// In-memory copy of the owner's task rows, newest first.
///
/// Pure state: every method is synchronous, and the caller decides when to
/// talk to the remote store. The all-complete latch remembers whether the
/// mirror was already fully completed so the completion signal fires once per
/// transition into that state.
///
/// Toggles and deletes stay recorded until the caller confirms or reverts
/// them, and a `replace` re-applies whatever is still unconfirmed on top of
/// the fresh rows.
#[derive(Debug, Default)]
pub struct TaskMirror {
    tasks: Vec<Task>,
    all_complete: bool,
    unconfirmed_toggles: Vec<ToggleCommand>,
    unconfirmed_deletes: Vec<String>,
}

/// A completion change that has been applied locally but not yet confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleCommand {
    pub id: String,
    pub previous: bool,
    pub next: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleApplied {
    pub command: ToggleCommand,
    /// Set when this toggle moved the mirror into the all-complete state.
    pub all_complete: bool,
}

impl TaskMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn is_all_complete(&self) -> bool {
        !self.tasks.is_empty() && self.tasks.iter().all(|t| t.is_completed)
    }

    /// Swaps in a fresh row set, keeping unconfirmed local changes.
    pub fn replace(&mut self, mut tasks: Vec<Task>) {
        tasks.retain(|t| !self.unconfirmed_deletes.contains(&t.id));
        for command in &self.unconfirmed_toggles {
            if let Some(task) = tasks.iter_mut().find(|t| t.id == command.id) {
                task.is_completed = command.next;
            }
        }
        self.tasks = tasks;
        self.relatch();
    }

    pub fn has_unconfirmed(&self) -> bool {
        !self.unconfirmed_toggles.is_empty() || !self.unconfirmed_deletes.is_empty()
    }

    pub fn clear(&mut self) {
        self.replace(Vec::new());
    }

    pub fn prepend(&mut self, task: Task) {
        self.tasks.insert(0, task);
        self.relatch();
    }

    /// Applies a completion change and reports whether it completed the list.
    pub fn apply_toggle(&mut self, id: &str, completed: bool) -> Option<ToggleApplied> {
        let task = self.tasks.iter_mut().find(|t| t.id == id)?;
        let command = ToggleCommand {
            id: id.to_string(),
            previous: task.is_completed,
            next: completed,
        };
        task.is_completed = completed;
        self.unconfirmed_toggles.push(command.clone());

        let was_all_complete = self.all_complete;
        self.relatch();
        let all_complete = completed && self.all_complete && !was_all_complete;

        Some(ToggleApplied {
            command,
            all_complete,
        })
    }

    /// The store accepted the toggle.
    pub fn confirm_toggle(&mut self, command: &ToggleCommand) {
        forget(&mut self.unconfirmed_toggles, command);
    }

    /// Restores the value a failed toggle overwrote. Returns false if the
    /// record has gone away in the meantime.
    pub fn revert_toggle(&mut self, command: &ToggleCommand) -> bool {
        forget(&mut self.unconfirmed_toggles, command);
        let reverted = match self.tasks.iter_mut().find(|t| t.id == command.id) {
            Some(task) => {
                task.is_completed = command.previous;
                true
            }
            None => false,
        };
        self.relatch();
        reverted
    }

    /// Removes the record until the delete is confirmed or abandoned.
    pub fn apply_delete(&mut self, id: &str) -> Option<Task> {
        let index = self.tasks.iter().position(|t| t.id == id)?;
        let task = self.tasks.remove(index);
        self.unconfirmed_deletes.push(task.id.clone());
        self.relatch();
        Some(task)
    }

    pub fn confirm_delete(&mut self, id: &str) {
        forget(&mut self.unconfirmed_deletes, &id.to_string());
    }

    /// Drops the pending delete so the next `replace` shows the row again.
    pub fn abandon_delete(&mut self, id: &str) {
        forget(&mut self.unconfirmed_deletes, &id.to_string());
    }

    /// Drops every completed record, returning what was removed.
    pub fn remove_completed(&mut self) -> Vec<Task> {
        let (completed, active): (Vec<Task>, Vec<Task>) =
            self.tasks.drain(..).partition(|t| t.is_completed);
        self.tasks = active;
        self.relatch();
        completed
    }

    fn relatch(&mut self) {
        self.all_complete = self.is_all_complete();
    }
}

fn forget<T: PartialEq>(pending: &mut Vec<T>, item: &T) {
    if let Some(index) = pending.iter().position(|p| p == item) {
        pending.remove(index);
    }
}
