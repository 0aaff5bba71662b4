//! Calendar names for event dates.
//!
//! The locale is plain configuration handed to whoever renders a date; nothing
//! here is process-wide.

use chrono::{DateTime, Datelike, SecondsFormat, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Month and weekday names used by calendar-style renderings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarLocale {
    /// January first
    #[serde(default = "default_month_names")]
    pub month_names: Vec<String>,

    /// Three or four letter month abbreviations, January first
    #[serde(default = "default_month_names_short")]
    pub month_names_short: Vec<String>,

    /// Sunday first, matching `Weekday::num_days_from_sunday`
    #[serde(default = "default_day_names")]
    pub day_names: Vec<String>,

    #[serde(default = "default_day_names_short")]
    pub day_names_short: Vec<String>,

    #[serde(default = "default_today_label")]
    pub today_label: String,
}

impl Default for CalendarLocale {
    fn default() -> Self {
        Self {
            month_names: default_month_names(),
            month_names_short: default_month_names_short(),
            day_names: default_day_names(),
            day_names_short: default_day_names_short(),
            today_label: default_today_label(),
        }
    }
}

impl CalendarLocale {
    pub fn month_name(&self, month0: u32) -> &str {
        name_at(&self.month_names, month0 as usize)
    }

    pub fn month_name_short(&self, month0: u32) -> &str {
        name_at(&self.month_names_short, month0 as usize)
    }

    pub fn day_name(&self, weekday_from_sunday: u32) -> &str {
        name_at(&self.day_names, weekday_from_sunday as usize)
    }

    pub fn day_name_short(&self, weekday_from_sunday: u32) -> &str {
        name_at(&self.day_names_short, weekday_from_sunday as usize)
    }

    /// Long human form, e.g. `mercredi 1 mai 2024, 10:00`.
    pub fn format_long(&self, date: &DateTime<Utc>) -> String {
        format!(
            "{} {} {} {}, {:02}:{:02}",
            self.day_name(date.weekday().num_days_from_sunday()),
            date.day(),
            self.month_name(date.month0()),
            date.year(),
            date.hour(),
            date.minute()
        )
    }

    /// Short form used in lists, e.g. `mer. 1 mai`, or the today label.
    pub fn format_short(&self, date: &DateTime<Utc>, today: &DateTime<Utc>) -> String {
        if date.date_naive() == today.date_naive() {
            return self.today_label.clone();
        }
        format!(
            "{} {} {}",
            self.day_name_short(date.weekday().num_days_from_sunday()),
            date.day(),
            self.month_name_short(date.month0())
        )
    }
}

/// Wire format for the event `date` field.
pub fn to_iso8601(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn name_at(names: &[String], idx: usize) -> &str {
    names.get(idx).map(String::as_str).unwrap_or("")
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn default_month_names() -> Vec<String> {
    owned(&[
        "janvier",
        "février",
        "mars",
        "avril",
        "mai",
        "juin",
        "juillet",
        "août",
        "septembre",
        "octobre",
        "novembre",
        "décembre",
    ])
}

fn default_month_names_short() -> Vec<String> {
    owned(&[
        "janv.", "févr.", "mars", "avr.", "mai", "juin", "juil.", "août", "sept.", "oct.",
        "nov.", "déc.",
    ])
}

fn default_day_names() -> Vec<String> {
    owned(&[
        "dimanche", "lundi", "mardi", "mercredi", "jeudi", "vendredi", "samedi",
    ])
}

fn default_day_names_short() -> Vec<String> {
    owned(&["dim.", "lun.", "mar.", "mer.", "jeu.", "ven.", "sam."])
}

fn default_today_label() -> String {
    "Aujourd'hui".to_string()
}
