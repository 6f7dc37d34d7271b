pub mod dto;
pub mod memory;

use std::env;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use tokio::sync::watch;

use crate::error::AppError;
use crate::models::{NewTask, Profile, ProfileUpdate, Session, SignUpOutcome, Task};

pub use memory::MemoryBackend;

const PROFILE_COLUMNS: &str = "first_name,last_name,dob,gender,location";

#[derive(Clone, Debug)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
}

impl SupabaseConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        let url = env::var("SUPABASE_URL")
            .map_err(|_| AppError::RemoteUnavailable("SUPABASE_URL is not set".to_string()))?;
        let anon_key = env::var("SUPABASE_KEY")
            .map_err(|_| AppError::RemoteUnavailable("SUPABASE_KEY is not set".to_string()))?;

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            anon_key,
        })
    }
}

/// Row access for the `tasks` table.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// All rows owned by `owner_id`, newest first.
    async fn select_tasks(&self, owner_id: &str) -> Result<Vec<Task>, AppError>;
    async fn insert_task(&self, task: &NewTask) -> Result<Task, AppError>;
    async fn update_completed(&self, id: &str, is_completed: bool) -> Result<(), AppError>;
    async fn delete_task(&self, id: &str) -> Result<(), AppError>;
    /// Deletes every completed row owned by `owner_id`.
    async fn delete_completed(&self, owner_id: &str) -> Result<(), AppError>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn fetch_profile(&self, user_id: &str) -> Result<Option<Profile>, AppError>;
    async fn insert_profile(&self, profile: &Profile) -> Result<(), AppError>;
    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<(), AppError>;
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn health(&self) -> Result<(), AppError>;
    fn current_session(&self) -> Option<Session>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AppError>;
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AppError>;
    async fn sign_out(&self) -> Result<(), AppError>;
    /// Receives every session change, including sign-out (`None`).
    fn subscribe(&self) -> watch::Receiver<Option<Session>>;
}

pub struct SupabaseHttpClient {
    client: Client,
    config: SupabaseConfig,
    session: watch::Sender<Option<Session>>,
}

impl SupabaseHttpClient {
    pub fn new(config: SupabaseConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::RemoteUnavailable(format!("Failed to build http client: {}", e)))?;
        let (session, _) = watch::channel(None);
        Ok(Self {
            client,
            config,
            session,
        })
    }

    fn bearer(&self) -> String {
        self.session
            .borrow()
            .as_ref()
            .map(|s| s.access_token.clone())
            .unwrap_or_else(|| self.config.anon_key.clone())
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.config.anon_key)
            .header("Authorization", format!("Bearer {}", self.bearer()))
    }

    fn tasks_url(&self, params: &[(&str, String)]) -> Result<Url, AppError> {
        table_url(&self.config.url, "tasks", params)
    }

    fn auth_url(&self, path: &str) -> Result<Url, AppError> {
        Url::parse(&format!("{}/auth/v1/{}", self.config.url, path))
            .map_err(|e| AppError::Config(format!("Invalid SUPABASE_URL: {}", e)))
    }

    async fn send(
        &self,
        builder: RequestBuilder,
        operation: &'static str,
    ) -> Result<Response, AppError> {
        let response = builder
            .send()
            .await
            .map_err(|e| AppError::remote(operation, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<dto::ApiError>(&body)
                .ok()
                .and_then(dto::ApiError::into_message)
                .unwrap_or_else(|| format!("{} {}", status, body));
            return Err(AppError::remote(operation, message));
        }

        Ok(response)
    }
}

/// PostgREST endpoint for `table` with the given filter/order parameters.
pub fn table_url(base: &str, table: &str, params: &[(&str, String)]) -> Result<Url, AppError> {
    let endpoint = format!("{}/rest/v1/{}", base.trim_end_matches('/'), table);
    let parsed = if params.is_empty() {
        Url::parse(&endpoint)
    } else {
        Url::parse_with_params(&endpoint, params)
    };
    parsed.map_err(|e| AppError::Config(format!("Invalid SUPABASE_URL: {}", e)))
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{}", value)
}

#[async_trait]
impl TaskStore for SupabaseHttpClient {
    async fn select_tasks(&self, owner_id: &str) -> Result<Vec<Task>, AppError> {
        let url = self.tasks_url(&[
            ("select", "*".to_string()),
            ("user_id", eq(owner_id)),
            ("order", "created_at.desc".to_string()),
        ])?;

        let response = self.send(self.request(Method::GET, url), "select").await?;
        let tasks = response.json::<Vec<Task>>().await?;
        tracing::debug!("Loaded {} tasks for {}", tasks.len(), owner_id);
        Ok(tasks)
    }

    async fn insert_task(&self, task: &NewTask) -> Result<Task, AppError> {
        let url = self.tasks_url(&[])?;
        let builder = self
            .request(Method::POST, url)
            .header("Prefer", "return=representation")
            .json(task);

        let response = self.send(builder, "insert").await?;
        response
            .json::<Vec<Task>>()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::remote("insert", "no row returned"))
    }

    async fn update_completed(&self, id: &str, is_completed: bool) -> Result<(), AppError> {
        let url = self.tasks_url(&[("id", eq(id))])?;
        let builder = self
            .request(Method::PATCH, url)
            .json(&dto::CompletionPatch { is_completed });

        self.send(builder, "update").await?;
        Ok(())
    }

    async fn delete_task(&self, id: &str) -> Result<(), AppError> {
        let url = self.tasks_url(&[("id", eq(id))])?;
        self.send(self.request(Method::DELETE, url), "delete").await?;
        Ok(())
    }

    async fn delete_completed(&self, owner_id: &str) -> Result<(), AppError> {
        let url = self.tasks_url(&[("user_id", eq(owner_id)), ("is_completed", eq(true))])?;
        self.send(self.request(Method::DELETE, url), "purge").await?;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for SupabaseHttpClient {
    async fn fetch_profile(&self, user_id: &str) -> Result<Option<Profile>, AppError> {
        let url = table_url(
            &self.config.url,
            "profiles",
            &[("select", PROFILE_COLUMNS.to_string()), ("id", eq(user_id))],
        )?;

        let response = self.send(self.request(Method::GET, url), "select").await?;
        let profile = response.json::<Vec<Profile>>().await?.into_iter().next();

        Ok(profile.map(|mut p| {
            p.id = user_id.to_string();
            p
        }))
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<(), AppError> {
        let url = table_url(&self.config.url, "profiles", &[])?;
        self.send(self.request(Method::POST, url).json(profile), "profile")
            .await?;
        Ok(())
    }

    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<(), AppError> {
        let url = table_url(&self.config.url, "profiles", &[("id", eq(user_id))])?;
        self.send(self.request(Method::PATCH, url).json(update), "profile")
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AuthProvider for SupabaseHttpClient {
    async fn health(&self) -> Result<(), AppError> {
        let url = self.auth_url("health")?;
        let response = self
            .request(Method::GET, url)
            .send()
            .await
            .map_err(|e| AppError::RemoteUnavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AppError::RemoteUnavailable(format!(
                "auth health check returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    fn current_session(&self) -> Option<Session> {
        self.session.borrow().clone()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let url = self.auth_url("token?grant_type=password")?;
        let builder = self
            .client
            .post(url)
            .header("apikey", &self.config.anon_key)
            .json(&dto::Credentials { email, password });

        let token = self
            .send(builder, "sign_in")
            .await?
            .json::<dto::TokenResponse>()
            .await?;

        let session = Session::from(token);
        tracing::info!("Signed in as {}", session.user.id);
        self.session.send_replace(Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AppError> {
        let url = self.auth_url("signup")?;
        let builder = self
            .client
            .post(url)
            .header("apikey", &self.config.anon_key)
            .json(&dto::Credentials { email, password });

        let response = self
            .send(builder, "sign_up")
            .await?
            .json::<dto::SignUpResponse>()
            .await?;

        match response {
            dto::SignUpResponse::Session(token) => {
                let session = Session::from(token);
                self.session.send_replace(Some(session.clone()));
                Ok(SignUpOutcome::SignedIn(session))
            }
            dto::SignUpResponse::User(user) => Ok(SignUpOutcome::ConfirmationRequired(user)),
        }
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        if self.session.borrow().is_some() {
            let url = self.auth_url("logout")?;
            self.send(self.request(Method::POST, url), "sign_out").await?;
        }
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

    #[test]
    fn test_table_url_encodes_filters() {
        let url = table_url(
            "https://abc.supabase.co/",
            "tasks",
            &[
                ("select", "*".to_string()),
                ("user_id", eq("7d0b2a4e-1111-2222-3333-444455556666")),
                ("order", "created_at.desc".to_string()),
            ],
        )
        .unwrap();

        assert_eq!(url.path(), "/rest/v1/tasks");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("select".to_string(), "*".to_string()),
                (
                    "user_id".to_string(),
                    "eq.7d0b2a4e-1111-2222-3333-444455556666".to_string()
                ),
                ("order".to_string(), "created_at.desc".to_string()),
            ]
        );
    }

    #[test]
    fn test_bearer_falls_back_to_anon_key() {
        let client = SupabaseHttpClient::new(SupabaseConfig {
            url: "https://abc.supabase.co".to_string(),
            anon_key: "anon".to_string(),
        })
        .unwrap();
        assert_eq!(client.bearer(), "anon");
        assert!(client.current_session().is_none());
    }

    fn unreachable_client() -> SupabaseHttpClient {
        SupabaseHttpClient::new(SupabaseConfig {
            url: "http://127.0.0.1:1".to_string(),
            anon_key: "anon".to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_transport_failure_mid_session_is_not_fatal() {
        let client = unreachable_client();

        let err = client.update_completed("x", true).await.unwrap_err();

        assert!(matches!(err, AppError::RemoteOperationFailed { operation: "update", .. }));
        assert!(!err.is_fatal());
        assert_eq!(err.notification().message, "Failed to update task");

        let err = client.select_tasks("u-1").await.unwrap_err();
        assert!(matches!(err, AppError::RemoteOperationFailed { operation: "select", .. }));
    }

    #[tokio::test]
    async fn test_health_against_unreachable_backend_is_fatal() {
        let err = unreachable_client().health().await.unwrap_err();

        assert!(matches!(err, AppError::RemoteUnavailable(_)));
        assert!(err.is_fatal());
    }
}
