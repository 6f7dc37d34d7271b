use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Separator between a task title and its encoded "HH:MM" time.
///
/// The `tasks` table has no `due_time` column, so the time rides along in the
/// title. Keep reading and writing it this way for compatibility with rows
/// written by other clients.
// TODO: switch to a real `due_time` column once the remote schema has one.
pub const TIME_DELIMITER: &str = "|||";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Title without the encoded time suffix.
    pub fn display_title(&self) -> &str {
        split_title(&self.title).0
    }

    /// Raw time suffix, if one was encoded.
    pub fn time(&self) -> Option<&str> {
        split_title(&self.title).1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub user_id: String,
    pub title: String,
    pub is_completed: bool,
}

impl NewTask {
    pub fn new(user_id: impl Into<String>, title: String) -> Self {
        Self {
            user_id: user_id.into(),
            title,
            is_completed: false,
        }
    }
}

/// Builds the stored title. Empty times are treated as absent.
pub fn encode_title(title: &str, time: Option<&str>) -> String {
    match time.map(str::trim).filter(|t| !t.is_empty()) {
        Some(time) => format!("{}{}{}", title, TIME_DELIMITER, time),
        None => title.to_string(),
    }
}

/// Splits a stored title on the first delimiter.
pub fn split_title(stored: &str) -> (&str, Option<&str>) {
    match stored.split_once(TIME_DELIMITER) {
        Some((title, time)) => (title, Some(time)),
        None => (stored, None),
    }
}

/// Converts "HH:MM" (or "HH:MM:SS") to a 12-hour clock string such as
/// "2:30 p.m.". Seconds are dropped.
///
/// Input that is not an hour/minute pair is returned unchanged.
pub fn format_time_12h(time: &str) -> String {
    let Some((hours, rest)) = time.split_once(':') else {
        return time.to_string();
    };
    let (minutes, seconds) = match rest.split_once(':') {
        Some((minutes, seconds)) => (minutes, Some(seconds)),
        None => (rest, None),
    };
    let Ok(h) = hours.trim().parse::<u32>() else {
        return time.to_string();
    };
    if h > 23 || !is_two_digits(minutes) || !seconds.is_none_or(is_two_digits) {
        return time.to_string();
    }

    let suffix = if h >= 12 { "p.m." } else { "a.m." };
    let h = match h % 12 {
        0 => 12,
        h => h,
    };
    format!("{}:{} {}", h, minutes, suffix)
}

fn is_two_digits(s: &str) -> bool {
    s.len() == 2 && s.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_title_with_time() {
        assert_eq!(encode_title("Buy milk", Some("14:30")), "Buy milk|||14:30");
        assert_eq!(encode_title("Buy milk", None), "Buy milk");
        assert_eq!(encode_title("Buy milk", Some("")), "Buy milk");
    }

    #[test]
    fn test_split_title_uses_first_delimiter() {
        assert_eq!(split_title("Buy milk|||14:30"), ("Buy milk", Some("14:30")));
        assert_eq!(split_title("a|||b|||c"), ("a", Some("b|||c")));
        assert_eq!(split_title("plain"), ("plain", None));
    }

    #[test]
    fn test_format_time_12h() {
        assert_eq!(format_time_12h("14:30"), "2:30 p.m.");
        assert_eq!(format_time_12h("00:05"), "12:05 a.m.");
        assert_eq!(format_time_12h("12:00"), "12:00 p.m.");
        assert_eq!(format_time_12h("09:15"), "9:15 a.m.");
    }

    #[test]
    fn test_format_time_12h_drops_seconds() {
        assert_eq!(format_time_12h("14:30:00"), "2:30 p.m.");
        assert_eq!(format_time_12h("23:59:59"), "11:59 p.m.");
        assert_eq!(format_time_12h("14:30:0"), "14:30:0");
    }

    #[test]
    fn test_format_time_12h_passes_through_garbage() {
        assert_eq!(format_time_12h("soon"), "soon");
        assert_eq!(format_time_12h("25:00"), "25:00");
        assert_eq!(format_time_12h("7:5"), "7:5");
    }

    #[test]
    fn test_task_deserializes_from_row() {
        let row = r#"{
            "id": "8f1c",
            "user_id": "u-1",
            "title": "Call mom|||18:00",
            "is_completed": false,
            "created_at": "2026-10-18T09:30:00.123456+00:00"
        }"#;
        let task: Task = serde_json::from_str(row).unwrap();
        assert_eq!(task.display_title(), "Call mom");
        assert_eq!(task.time(), Some("18:00"));
        assert!(!task.is_completed);
    }
}
