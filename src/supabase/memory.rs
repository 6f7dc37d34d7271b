use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{AuthUser, NewTask, Profile, ProfileUpdate, Session, SignUpOutcome, Task};
use crate::supabase::{AuthProvider, ProfileStore, TaskStore};

/// In-process stand-in for the hosted backend, used by `--offline` and tests.
///
/// Accounts sign in immediately after sign-up.
pub struct MemoryBackend {
    inner: Mutex<Inner>,
    session: watch::Sender<Option<Session>>,
}

#[derive(Default)]
struct Inner {
    tasks: Vec<Task>,
    profiles: HashMap<String, Profile>,
    accounts: HashMap<String, Account>,
    last_created_at: Option<DateTime<Utc>>,
}

struct Account {
    user: AuthUser,
    password: String,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        let (session, _) = watch::channel(None);
        Self {
            inner: Mutex::new(Inner::default()),
            session,
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every stored row regardless of owner, in insertion order.
    pub fn all_tasks(&self) -> Vec<Task> {
        self.inner().tasks.clone()
    }

    fn open_session(&self, user: AuthUser) -> Session {
        let session = Session {
            access_token: format!("offline-{}", Uuid::new_v4()),
            refresh_token: None,
            user,
        };
        self.session.send_replace(Some(session.clone()));
        session
    }
}

impl Inner {
    /// Strictly increasing timestamps keep `created_at desc` ordering stable
    /// for inserts that land in the same clock tick.
    fn next_created_at(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let created_at = match self.last_created_at {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_created_at = Some(created_at);
        created_at
    }
}

#[async_trait]
impl TaskStore for MemoryBackend {
    async fn select_tasks(&self, owner_id: &str) -> Result<Vec<Task>, AppError> {
        let mut tasks: Vec<Task> = self
            .inner()
            .tasks
            .iter()
            .filter(|t| t.user_id == owner_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    async fn insert_task(&self, task: &NewTask) -> Result<Task, AppError> {
        let mut inner = self.inner();
        let row = Task {
            id: Uuid::new_v4().to_string(),
            user_id: task.user_id.clone(),
            title: task.title.clone(),
            is_completed: task.is_completed,
            created_at: inner.next_created_at(),
        };
        inner.tasks.push(row.clone());
        Ok(row)
    }

    async fn update_completed(&self, id: &str, is_completed: bool) -> Result<(), AppError> {
        if let Some(task) = self.inner().tasks.iter_mut().find(|t| t.id == id) {
            task.is_completed = is_completed;
        }
        Ok(())
    }

    async fn delete_task(&self, id: &str) -> Result<(), AppError> {
        self.inner().tasks.retain(|t| t.id != id);
        Ok(())
    }

    async fn delete_completed(&self, owner_id: &str) -> Result<(), AppError> {
        self.inner()
            .tasks
            .retain(|t| !(t.user_id == owner_id && t.is_completed));
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MemoryBackend {
    async fn fetch_profile(&self, user_id: &str) -> Result<Option<Profile>, AppError> {
        Ok(self.inner().profiles.get(user_id).cloned())
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<(), AppError> {
        let mut inner = self.inner();
        if inner.profiles.contains_key(&profile.id) {
            return Err(AppError::remote(
                "profile",
                "duplicate key value violates unique constraint \"profiles_pkey\"",
            ));
        }
        inner.profiles.insert(profile.id.clone(), profile.clone());
        Ok(())
    }

    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<(), AppError> {
        if let Some(profile) = self.inner().profiles.get_mut(user_id) {
            profile.apply(update);
        }
        Ok(())
    }
}

#[async_trait]
impl AuthProvider for MemoryBackend {
    async fn health(&self) -> Result<(), AppError> {
        Ok(())
    }

    fn current_session(&self) -> Option<Session> {
        self.session.borrow().clone()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let user = {
            let inner = self.inner();
            match inner.accounts.get(email) {
                Some(account) if account.password == password => account.user.clone(),
                _ => return Err(AppError::remote("sign_in", "Invalid login credentials")),
            }
        };
        Ok(self.open_session(user))
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AppError> {
        if password.chars().count() < 6 {
            return Err(AppError::remote(
                "sign_up",
                "Password should be at least 6 characters.",
            ));
        }

        let user = {
            let mut inner = self.inner();
            if inner.accounts.contains_key(email) {
                return Err(AppError::remote("sign_up", "User already registered"));
            }
            let user = AuthUser {
                id: Uuid::new_v4().to_string(),
                email: Some(email.to_string()),
            };
            inner.accounts.insert(
                email.to_string(),
                Account {
                    user: user.clone(),
                    password: password.to_string(),
                },
            );
            user
        };

        Ok(SignUpOutcome::SignedIn(self.open_session(user)))
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        self.session.send_replace(None);
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_select_orders_newest_first_and_filters_owner() {
        let backend = MemoryBackend::new();
        let first = backend
            .insert_task(&NewTask::new("u-1", "first".to_string()))
            .await
            .unwrap();
        backend
            .insert_task(&NewTask::new("u-2", "other owner".to_string()))
            .await
            .unwrap();
        let second = backend
            .insert_task(&NewTask::new("u-1", "second".to_string()))
            .await
            .unwrap();

        let tasks = backend.select_tasks("u-1").await.unwrap();
        let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);
        assert!(second.created_at > first.created_at);
    }

    #[tokio::test]
    async fn test_delete_completed_is_scoped_to_owner() {
        let backend = MemoryBackend::new();
        let mine = backend
            .insert_task(&NewTask::new("u-1", "mine".to_string()))
            .await
            .unwrap();
        let theirs = backend
            .insert_task(&NewTask::new("u-2", "theirs".to_string()))
            .await
            .unwrap();
        backend.update_completed(&mine.id, true).await.unwrap();
        backend.update_completed(&theirs.id, true).await.unwrap();

        backend.delete_completed("u-1").await.unwrap();

        let remaining = backend.all_tasks();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, theirs.id);
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in_publishes_sessions() {
        let backend = MemoryBackend::new();
        let mut rx = backend.subscribe();

        let outcome = backend.sign_up("ada@example.com", "hunter22").await.unwrap();
        assert!(matches!(outcome, SignUpOutcome::SignedIn(_)));
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        backend.sign_out().await.unwrap();
        assert!(backend.current_session().is_none());

        let err = backend.sign_in("ada@example.com", "wrong").await.unwrap_err();
        assert_eq!(err.notification().message, "Invalid login credentials");

        let session = backend.sign_in("ada@example.com", "hunter22").await.unwrap();
        assert_eq!(session.user.id, outcome.user().id);
    }
}
