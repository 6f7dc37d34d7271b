use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub dob: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl Profile {
    /// Row written right after sign-up; the first name is the email's local part.
    pub fn for_new_account(user_id: &str, email: &str) -> Self {
        let first_name = email.split('@').next().unwrap_or_default().to_string();
        Self {
            id: user_id.to_string(),
            first_name: Some(first_name),
            last_name: Some(String::new()),
            dob: None,
            gender: None,
            location: None,
        }
    }

    pub fn display_first_name(&self) -> &str {
        self.first_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or("User")
    }

    pub fn full_name(&self) -> String {
        format!(
            "{} {}",
            self.display_first_name(),
            self.last_name.as_deref().unwrap_or_default()
        )
        .trim()
        .to_string()
    }

    pub fn display_location(&self) -> &str {
        self.location
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or("Unknown Location")
    }

    pub fn avatar_initial(&self) -> char {
        self.display_first_name()
            .chars()
            .next()
            .and_then(|c| c.to_uppercase().next())
            .unwrap_or('?')
    }

    pub fn apply(&mut self, update: &ProfileUpdate) {
        self.first_name = Some(update.first_name.clone());
        self.last_name = Some(update.last_name.clone());
        self.dob = update.dob;
        self.gender = update.gender.clone();
        self.location = Some(update.location.clone());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    pub dob: Option<NaiveDate>,
    pub gender: Option<String>,
    pub location: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_account_profile_uses_email_local_part() {
        let profile = Profile::for_new_account("u-1", "ada@example.com");
        assert_eq!(profile.first_name.as_deref(), Some("ada"));
        assert_eq!(profile.last_name.as_deref(), Some(""));
        assert_eq!(profile.full_name(), "ada");
        assert_eq!(profile.avatar_initial(), 'A');
    }

    #[test]
    fn test_display_defaults() {
        let profile = Profile {
            id: "u-1".into(),
            first_name: None,
            last_name: None,
            dob: None,
            gender: None,
            location: Some(String::new()),
        };
        assert_eq!(profile.display_first_name(), "User");
        assert_eq!(profile.display_location(), "Unknown Location");
        assert_eq!(profile.avatar_initial(), 'U');
    }

    #[test]
    fn test_deserialize_partial_select() {
        // the dashboard only selects a subset of columns
        let row = r#"{"first_name":"Grace","last_name":"Hopper","dob":"1906-12-09","gender":null,"location":"Arlington"}"#;
        let profile: Profile = serde_json::from_str(row).unwrap();
        assert_eq!(profile.id, "");
        assert_eq!(profile.full_name(), "Grace Hopper");
        assert_eq!(profile.dob, NaiveDate::from_ymd_opt(1906, 12, 9));
    }
}
