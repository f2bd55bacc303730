use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use shared_models::error::AppError;

// ==============================================================================
// DOCTOR
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub image: Option<String>,
    pub speciality: String,
    #[serde(default)]
    pub degree: Option<String>,
    #[serde(default)]
    pub experience: Option<String>,
    #[serde(default)]
    pub about: Option<String>,
    pub available: bool,
    #[serde(default)]
    pub fees: Option<i64>,
    #[serde(default)]
    pub address: Option<DoctorAddress>,
    #[serde(default, deserialize_with = "lenient_slots_booked")]
    pub slots_booked: SlotsBooked,
    /// Bumped on every write to `slots_booked`.
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DoctorAddress {
    #[serde(default)]
    pub line1: String,
    #[serde(default)]
    pub line2: String,
}

/// What patients get to see of a doctor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub speciality: String,
    pub degree: Option<String>,
    pub experience: Option<String>,
    pub about: Option<String>,
    pub available: bool,
    pub fees: Option<i64>,
    pub address: Option<DoctorAddress>,
}

impl From<&Doctor> for DoctorProfile {
    fn from(doctor: &Doctor) -> Self {
        Self {
            id: doctor.id,
            name: doctor.name.clone(),
            image: doctor.image.clone(),
            speciality: doctor.speciality.clone(),
            degree: doctor.degree.clone(),
            experience: doctor.experience.clone(),
            about: doctor.about.clone(),
            available: doctor.available,
            fees: doctor.fees,
            address: doctor.address.clone(),
        }
    }
}

// ==============================================================================
// LEGACY BOOKING INDEX
// ==============================================================================

/// One booked `(date, time)` pair as stored on the doctor document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookedEntry {
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM`, 24-hour
    pub time: String,
}

impl BookedEntry {
    /// The entry for `instant` as seen in `tz`.
    pub fn from_instant<Tz: chrono::TimeZone>(instant: &DateTime<Tz>, tz: &FixedOffset) -> Self {
        let local = instant.with_timezone(tz);
        Self {
            date: local.format("%Y-%m-%d").to_string(),
            time: local.format("%H:%M").to_string(),
        }
    }
}

/// `slots_booked[dateKey] = [{date, time}, ...]`, keyed by [`booking_key`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotsBooked(BTreeMap<String, Vec<BookedEntry>>);

impl SlotsBooked {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str, entry: &BookedEntry) -> bool {
        self.0
            .get(key)
            .map(|entries| entries.iter().any(|e| e == entry))
            .unwrap_or(false)
    }

    pub fn insert(&mut self, key: &str, entry: BookedEntry) {
        self.0.entry(key.to_string()).or_default().push(entry);
    }

    /// Removes exactly one matching entry. Empty days are dropped.
    pub fn remove(&mut self, key: &str, entry: &BookedEntry) -> bool {
        let Some(entries) = self.0.get_mut(key) else {
            return false;
        };
        let Some(position) = entries.iter().position(|e| e == entry) else {
            return false;
        };
        entries.remove(position);
        if entries.is_empty() {
            self.0.remove(key);
        }
        true
    }

    pub fn entries_for(&self, key: &str) -> &[BookedEntry] {
        self.0.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Older documents stored `slots_booked` as `null`, an array, or with malformed
/// entries. Anything that is not an object of entry lists becomes empty.
fn lenient_slots_booked<'de, D>(deserializer: D) -> Result<SlotsBooked, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let Some(Value::Object(days)) = value else {
        return Ok(SlotsBooked::new());
    };

    let mut booked = BTreeMap::new();
    for (key, entries) in days {
        match serde_json::from_value::<Vec<BookedEntry>>(entries) {
            Ok(entries) if !entries.is_empty() => {
                booked.insert(key, entries);
            }
            Ok(_) => {}
            Err(e) => warn!("Dropping unreadable slots_booked[{}]: {}", key, e),
        }
    }
    Ok(SlotsBooked(booked))
}

/// Legacy day key: day, month and year without zero padding (`6_1_2025`).
pub fn booking_key(date: NaiveDate) -> String {
    format!("{}_{}_{}", date.day(), date.month(), date.year())
}

pub fn parse_booking_key(key: &str) -> Option<NaiveDate> {
    let mut parts = key.split('_');
    let day = parts.next()?.parse().ok()?;
    let month = parts.next()?.parse().ok()?;
    let year = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

// ==============================================================================
// SLOTS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: DateTime<FixedOffset>,
    pub end_time: DateTime<FixedOffset>,
    pub is_booked: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Slot {
    /// Re-express the instants in `tz`. Stores may hand them back in UTC.
    pub fn normalized(mut self, tz: &FixedOffset) -> Self {
        self.start_time = self.start_time.with_timezone(tz);
        self.end_time = self.end_time.with_timezone(tz);
        self
    }
}

/// A slot about to be persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSlot {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: DateTime<FixedOffset>,
    pub end_time: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_booked: Option<bool>,
}

impl SlotPatch {
    pub fn is_empty(&self) -> bool {
        self.date.is_none() && self.start_time.is_none() && self.end_time.is_none() && self.is_booked.is_none()
    }

    pub fn apply(&self, slot: &mut Slot) {
        if let Some(date) = self.date {
            slot.date = date;
        }
        if let Some(start) = self.start_time {
            slot.start_time = start;
        }
        if let Some(end) = self.end_time {
            slot.end_time = end;
        }
        if let Some(is_booked) = self.is_booked {
            slot.is_booked = is_booked;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsertOutcome {
    pub inserted: Vec<Slot>,
    pub skipped: usize,
}

// ==============================================================================
// RECURRENCE
// ==============================================================================

/// Raw recurring-availability request, as posted by the doctor dashboard.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateRecurringSlotsRequest {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub days_of_week: Option<Vec<String>>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

/// A validated weekly recurrence rule.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurrenceSpec {
    pub doctor_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days_of_week: HashSet<Weekday>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Two-letter weekday tokens (`MO` .. `SU`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeekdaySymbol {
    MO,
    TU,
    WE,
    TH,
    FR,
    SA,
    SU,
}

impl WeekdaySymbol {
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "MO" => Some(Self::MO),
            "TU" => Some(Self::TU),
            "WE" => Some(Self::WE),
            "TH" => Some(Self::TH),
            "FR" => Some(Self::FR),
            "SA" => Some(Self::SA),
            "SU" => Some(Self::SU),
            _ => None,
        }
    }
}

impl From<WeekdaySymbol> for Weekday {
    fn from(symbol: WeekdaySymbol) -> Self {
        match symbol {
            WeekdaySymbol::MO => Weekday::Mon,
            WeekdaySymbol::TU => Weekday::Tue,
            WeekdaySymbol::WE => Weekday::Wed,
            WeekdaySymbol::TH => Weekday::Thu,
            WeekdaySymbol::FR => Weekday::Fri,
            WeekdaySymbol::SA => Weekday::Sat,
            WeekdaySymbol::SU => Weekday::Sun,
        }
    }
}

/// One concrete occurrence of a recurrence rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotCandidate {
    pub date: NaiveDate,
    pub start_time: DateTime<FixedOffset>,
    pub end_time: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratedSlots {
    pub slots: Vec<SlotCandidate>,
    /// Occurrences dropped because they already lay in the past.
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringSlotsResult {
    pub created: usize,
    pub skipped_count: usize,
    pub slots: Vec<Slot>,
}

// ==============================================================================
// REQUEST DTOs
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSlotRequest {
    pub start_time: Option<DateTime<FixedOffset>>,
    pub end_time: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAvailabilityRequest {
    pub available: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DoctorLookupQuery {
    pub email: String,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SlotError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Start time {0} has already passed today")]
    PastTimeRejected(String),

    #[error("No slots created: {skipped} of {attempted} candidate slots were skipped")]
    AllSlotsSkipped { attempted: usize, skipped: usize },

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Slot not found")]
    SlotNotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SlotError {
    pub fn database(e: impl fmt::Display) -> Self {
        SlotError::Database(e.to_string())
    }
}

impl From<SlotError> for AppError {
    fn from(e: SlotError) -> Self {
        match e {
            SlotError::Validation(msg) => AppError::ValidationError(msg),
            SlotError::PastTimeRejected(_) => AppError::BadRequest(e.to_string()),
            SlotError::AllSlotsSkipped { .. } => AppError::Conflict(e.to_string()),
            SlotError::Conflict(msg) => AppError::Conflict(msg),
            SlotError::DoctorNotFound | SlotError::SlotNotFound => AppError::NotFound(e.to_string()),
            SlotError::Database(msg) => AppError::Database(msg),
            SlotError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doctor_json(slots_booked: Value) -> Value {
        json!({
            "id": Uuid::new_v4(),
            "name": "Dr. Meera Rao",
            "email": "meera@clinic.test",
            "speciality": "General physician",
            "available": true,
            "fees": 500,
            "slots_booked": slots_booked
        })
    }

    #[test]
    fn legacy_slots_booked_shapes_become_empty() {
        for legacy in [Value::Null, json!([]), json!("booked"), json!(42)] {
            let doctor: Doctor = serde_json::from_value(doctor_json(legacy)).unwrap();
            assert!(doctor.slots_booked.is_empty());
        }

        let mut missing = doctor_json(Value::Null);
        missing.as_object_mut().unwrap().remove("slots_booked");
        let doctor: Doctor = serde_json::from_value(missing).unwrap();
        assert!(doctor.slots_booked.is_empty());
    }

    #[test]
    fn keeps_well_formed_days_and_drops_broken_ones() {
        let doctor: Doctor = serde_json::from_value(doctor_json(json!({
            "6_1_2025": [{ "date": "2025-01-06", "time": "09:00" }],
            "7_1_2025": ["10:00 AM"]
        })))
        .unwrap();

        let entry = BookedEntry { date: "2025-01-06".into(), time: "09:00".into() };
        assert!(doctor.slots_booked.contains("6_1_2025", &entry));
        assert!(doctor.slots_booked.entries_for("7_1_2025").is_empty());
    }

    #[test]
    fn remove_takes_exactly_one_entry() {
        let entry = BookedEntry { date: "2025-01-06".into(), time: "09:00".into() };
        let mut booked = SlotsBooked::new();
        booked.insert("6_1_2025", entry.clone());
        booked.insert("6_1_2025", entry.clone());

        assert!(booked.remove("6_1_2025", &entry));
        assert_eq!(booked.len(), 1);
        assert!(booked.remove("6_1_2025", &entry));
        assert!(!booked.remove("6_1_2025", &entry));
        assert_eq!(serde_json::to_value(&booked).unwrap(), json!({}));
    }

    #[test]
    fn booking_keys_are_unpadded() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        assert_eq!(booking_key(date), "6_1_2025");
        assert_eq!(parse_booking_key("6_1_2025"), Some(date));
        assert_eq!(parse_booking_key("06_01_2025"), Some(date));
        assert_eq!(parse_booking_key("2025-01-06"), None);
        assert_eq!(parse_booking_key("31_2_2025"), None);
    }

    #[test]
    fn booked_entry_uses_the_given_timezone() {
        let ist = FixedOffset::east_opt(330 * 60).unwrap();
        let instant = DateTime::parse_from_rfc3339("2025-01-06T20:00:00Z").unwrap();

        let entry = BookedEntry::from_instant(&instant, &ist);
        assert_eq!(entry, BookedEntry { date: "2025-01-07".into(), time: "01:30".into() });
    }

    #[test]
    fn weekday_tokens() {
        assert_eq!(WeekdaySymbol::parse("mo"), Some(WeekdaySymbol::MO));
        assert_eq!(Weekday::from(WeekdaySymbol::SU), Weekday::Sun);
        assert_eq!(WeekdaySymbol::parse("Monday"), None);
    }
}
