use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::AppError;
use crate::models::{AuthUser, Profile, ProfileUpdate, Session, SignUpOutcome};
use crate::services::board::{BoardEvent, TaskBoard};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Loader,
    Auth,
    Profile,
    Dashboard,
}

/// Owns everything tied to the signed-in user: the profile and the task
/// board. Signing out drops both.
pub struct SessionController {
    state: AppState,
    events: mpsc::UnboundedSender<BoardEvent>,
    user: Option<AuthUser>,
    profile: Option<Profile>,
    board: Option<TaskBoard>,
    screen: Screen,
}

impl SessionController {
    pub fn new(state: AppState, events: mpsc::UnboundedSender<BoardEvent>) -> Self {
        Self {
            state,
            events,
            user: None,
            profile: None,
            board: None,
            screen: Screen::Loader,
        }
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn user(&self) -> Option<&AuthUser> {
        self.user.as_ref()
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn board(&self) -> Option<&TaskBoard> {
        self.board.as_ref()
    }

    /// Checks that the backend answers, then restores any current session.
    pub async fn start(&mut self) -> Result<Screen, AppError> {
        self.state.auth.health().await?;
        let session = self.state.auth.current_session();
        self.handle_session(session).await
    }

    /// Moves to the screen that matches `session`.
    pub async fn handle_session(&mut self, session: Option<Session>) -> Result<Screen, AppError> {
        let Some(session) = session else {
            self.reset();
            return Ok(self.screen);
        };

        self.user = Some(session.user.clone());
        match self.state.profiles.fetch_profile(&session.user.id).await {
            Ok(Some(profile)) => {
                self.profile = Some(profile);
                self.enter_dashboard().await
            }
            Ok(None) => {
                info!("No profile for {}, asking for one", session.user.id);
                self.profile = None;
                self.screen = Screen::Profile;
                Ok(self.screen)
            }
            Err(e) => {
                warn!("Error loading profile: {}", e);
                self.profile = None;
                self.screen = Screen::Profile;
                Ok(self.screen)
            }
        }
    }

    async fn enter_dashboard(&mut self) -> Result<Screen, AppError> {
        let user = self.user.as_ref().ok_or(AppError::Unauthenticated)?;

        let board = match &self.board {
            Some(board) if board.owner_id() == user.id => board.clone(),
            _ => TaskBoard::new(user.id.clone(), self.state.tasks.clone(), self.events.clone()),
        };
        self.board = Some(board.clone());
        self.screen = Screen::Dashboard;

        board.load().await?;
        Ok(self.screen)
    }

    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<Session, AppError> {
        let session = self.state.auth.sign_in(email, password).await?;
        info!("Welcome back, {}", email);
        Ok(session)
    }

    /// Creates the account and its profile row. A failed profile insert is
    /// only logged; the profile screen will ask for the details later.
    pub async fn sign_up(&mut self, email: &str, password: &str) -> Result<SignUpOutcome, AppError> {
        let outcome = self.state.auth.sign_up(email, password).await?;

        let profile = Profile::for_new_account(&outcome.user().id, email);
        if let Err(e) = self.state.profiles.insert_profile(&profile).await {
            warn!("Profile creation error: {}", e);
        }

        Ok(outcome)
    }

    pub async fn sign_out(&mut self) -> Result<(), AppError> {
        self.state.auth.sign_out().await?;
        self.reset();
        Ok(())
    }

    pub async fn update_profile(&mut self, update: ProfileUpdate) -> Result<Screen, AppError> {
        let user_id = self
            .user
            .as_ref()
            .map(|u| u.id.clone())
            .ok_or(AppError::Unauthenticated)?;
        if update.first_name.trim().is_empty() {
            return Err(AppError::Validation("First name is required".to_string()));
        }

        let profile = match self.profile.clone() {
            Some(mut profile) => {
                self.state.profiles.update_profile(&user_id, &update).await?;
                profile.apply(&update);
                profile
            }
            None => {
                // the row may be missing if the sign-up insert failed
                let mut profile = Profile::for_new_account(&user_id, "");
                profile.apply(&update);
                if let Err(e) = self.state.profiles.insert_profile(&profile).await {
                    warn!("Profile insert failed, updating instead: {}", e);
                    self.state.profiles.update_profile(&user_id, &update).await?;
                }
                profile
            }
        };
        self.profile = Some(profile);

        self.enter_dashboard().await
    }

    fn reset(&mut self) {
        if let Some(board) = self.board.take() {
            board.clear();
        }
        self.user = None;
        self.profile = None;
        self.screen = Screen::Auth;
    }
}
