use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Doctor profile record. Owned 1:1 by the linked identity-store user;
/// created at onboarding and mutated by the doctor themself or an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub department: String,
    pub license_number: String,
    /// Recurring weekly availability. Multiple slots per day are allowed and
    /// are stored as-is, without deduplication or merging.
    #[serde(default)]
    pub availability: Vec<AvailabilitySlot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One recurring weekly availability window. `start_time > end_time` denotes a
/// window spanning midnight (e.g. 22:00 to 02:00).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    #[serde(with = "weekday_name_format")]
    pub day: Weekday,
    #[serde(with = "hhmm_format")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm_format")]
    pub end_time: NaiveTime,
}

impl AvailabilitySlot {
    pub fn start_minutes(&self) -> u32 {
        minute_of_day(self.start_time)
    }

    pub fn end_minutes(&self) -> u32 {
        minute_of_day(self.end_time)
    }

    pub fn spans_midnight(&self) -> bool {
        self.start_minutes() > self.end_minutes()
    }
}

pub(crate) fn minute_of_day(time: NaiveTime) -> u32 {
    use chrono::Timelike;
    time.hour() * 60 + time.minute()
}

/// Full English weekday name, matching the wire format of availability slots.
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

mod weekday_name_format {
    use chrono::Weekday;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(day: &Weekday, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(super::weekday_name(*day))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Weekday, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse()
            .map_err(|_| serde::de::Error::custom(format!("unknown weekday: {}", raw)))
    }
}

mod hhmm_format {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, FORMAT)
            .map_err(|_| serde::de::Error::custom(format!("invalid HH:MM time: {}", raw)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDoctorRequest {
    pub user_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub department: String,
    pub license_number: String,
    #[serde(default)]
    pub availability: Vec<AvailabilitySlot>,
}

/// Partial update; omitted fields keep their previous values. The availability
/// list is fully replaceable, never merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDoctorRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub license_number: Option<String>,
    pub availability: Option<Vec<AvailabilitySlot>>,
}
