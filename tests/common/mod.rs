#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Semaphore, mpsc, watch};
use todo_client::error::AppError;
use todo_client::models::{NewTask, Session, SignUpOutcome, Task};
use todo_client::services::{BoardEvent, TaskBoard};
use todo_client::supabase::{AuthProvider, MemoryBackend, TaskStore};

pub const OWNER: &str = "owner-1";

/// TaskStore over a MemoryBackend that can fail on demand and hold mutating
/// calls until the test releases them.
pub struct FlakyStore {
    pub backend: Arc<MemoryBackend>,
    pub fail_select: AtomicBool,
    pub fail_insert: AtomicBool,
    pub fail_update: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_purge: AtomicBool,
    pub remote_calls: AtomicUsize,
    gated: AtomicBool,
    gate: Semaphore,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            backend: Arc::new(MemoryBackend::new()),
            fail_select: AtomicBool::new(false),
            fail_insert: AtomicBool::new(false),
            fail_update: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            fail_purge: AtomicBool::new(false),
            remote_calls: AtomicUsize::new(0),
            gated: AtomicBool::new(false),
            gate: Semaphore::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.remote_calls.load(Ordering::SeqCst)
    }

    /// Mutating calls block until `release` is called.
    pub fn hold(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    pub fn set(flag: &AtomicBool, value: bool) {
        flag.store(value, Ordering::SeqCst);
    }

    /// Injected failures return at once, even while writes are held.
    async fn enter(&self, flag: &AtomicBool, operation: &'static str) -> Result<(), AppError> {
        self.remote_calls.fetch_add(1, Ordering::SeqCst);
        if flag.load(Ordering::SeqCst) {
            return Err(AppError::remote(operation, "injected failure"));
        }
        if self.gated.load(Ordering::SeqCst) {
            self.gate
                .acquire()
                .await
                .expect("gate closed")
                .forget();
        }
        Ok(())
    }
}

#[async_trait]
impl TaskStore for FlakyStore {
    async fn select_tasks(&self, owner_id: &str) -> Result<Vec<Task>, AppError> {
        // reads are never gated so that reloads can run while writes are held
        self.remote_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_select.load(Ordering::SeqCst) {
            return Err(AppError::remote("select", "injected failure"));
        }
        self.backend.select_tasks(owner_id).await
    }

    async fn insert_task(&self, task: &NewTask) -> Result<Task, AppError> {
        self.enter(&self.fail_insert, "insert").await?;
        self.backend.insert_task(task).await
    }

    async fn update_completed(&self, id: &str, is_completed: bool) -> Result<(), AppError> {
        self.enter(&self.fail_update, "update").await?;
        self.backend.update_completed(id, is_completed).await
    }

    async fn delete_task(&self, id: &str) -> Result<(), AppError> {
        self.enter(&self.fail_delete, "delete").await?;
        self.backend.delete_task(id).await
    }

    async fn delete_completed(&self, owner_id: &str) -> Result<(), AppError> {
        self.enter(&self.fail_purge, "purge").await?;
        self.backend.delete_completed(owner_id).await
    }
}

pub fn board_for(
    store: &Arc<FlakyStore>,
    owner: &str,
) -> (TaskBoard, mpsc::UnboundedReceiver<BoardEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TaskBoard::new(owner, store.clone(), tx), rx)
}

/// Seeds rows straight into the backend, oldest first.
pub async fn seed(store: &FlakyStore, owner: &str, titles: &[(&str, bool)]) -> Vec<Task> {
    let mut rows = Vec::new();
    for (title, done) in titles {
        let row = store
            .backend
            .insert_task(&NewTask::new(owner, title.to_string()))
            .await
            .expect("Failed to seed task");
        if *done {
            store
                .backend
                .update_completed(&row.id, true)
                .await
                .expect("Failed to seed completion");
        }
        rows.push(row);
    }
    rows
}

pub async fn assert_matches_store(board: &TaskBoard, store: &FlakyStore) {
    let remote = store
        .backend
        .select_tasks(board.owner_id())
        .await
        .expect("Failed to read backend");
    assert_eq!(board.snapshot(), remote, "mirror drifted from the store");
}

pub fn drain(rx: &mut mpsc::UnboundedReceiver<BoardEvent>) -> Vec<BoardEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Auth collaborator that cannot be reached.
pub struct UnreachableAuth {
    session: watch::Sender<Option<Session>>,
}

impl UnreachableAuth {
    pub fn new() -> Arc<Self> {
        let (session, _) = watch::channel(None);
        Arc::new(Self { session })
    }
}

#[async_trait]
impl AuthProvider for UnreachableAuth {
    async fn health(&self) -> Result<(), AppError> {
        Err(AppError::RemoteUnavailable("connection refused".to_string()))
    }

    fn current_session(&self) -> Option<Session> {
        None
    }

    async fn sign_in(&self, _email: &str, _password: &str) -> Result<Session, AppError> {
        Err(AppError::RemoteUnavailable("connection refused".to_string()))
    }

    async fn sign_up(&self, _email: &str, _password: &str) -> Result<SignUpOutcome, AppError> {
        Err(AppError::RemoteUnavailable("connection refused".to_string()))
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }
}
