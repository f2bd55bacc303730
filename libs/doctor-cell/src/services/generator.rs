use std::collections::HashSet;
use std::sync::OnceLock;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use regex::Regex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{
    CreateRecurringSlotsRequest, GeneratedSlots, RecurrenceSpec, SlotCandidate, SlotError, WeekdaySymbol,
};

/// Longest window a single recurrence request may cover.
const MAX_RECURRENCE_DAYS: i64 = 366;

fn hh_mm() -> &'static Regex {
    static HH_MM: OnceLock<Regex> = OnceLock::new();
    HH_MM.get_or_init(|| Regex::new(r"^([01]\d|2[0-3]):([0-5]\d)$").expect("static regex"))
}

fn parse_time(field: &str, raw: &str) -> Result<NaiveTime, SlotError> {
    let raw = raw.trim();
    if !hh_mm().is_match(raw) {
        return Err(SlotError::Validation(format!("{} must be HH:MM (24-hour), got {:?}", field, raw)));
    }
    NaiveTime::parse_from_str(raw, "%H:%M")
        .map_err(|_| SlotError::Validation(format!("{} is not a valid time: {:?}", field, raw)))
}

fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, SlotError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| SlotError::Validation(format!("{} must be YYYY-MM-DD, got {:?}", field, raw)))
}

impl RecurrenceSpec {
    /// Validate a raw request into a rule. Per-occurrence checks (past times,
    /// start before end) happen in [`SlotGenerator::generate`].
    pub fn parse(doctor_id: Uuid, request: &CreateRecurringSlotsRequest) -> Result<Self, SlotError> {
        let mut missing = Vec::new();
        if request.start_date.as_deref().map_or(true, str::is_empty) {
            missing.push("start_date");
        }
        if request.end_date.as_deref().map_or(true, str::is_empty) {
            missing.push("end_date");
        }
        if request.days_of_week.as_ref().map_or(true, Vec::is_empty) {
            missing.push("days_of_week");
        }
        if request.start_time.as_deref().map_or(true, str::is_empty) {
            missing.push("start_time");
        }
        if request.end_time.as_deref().map_or(true, str::is_empty) {
            missing.push("end_time");
        }
        if !missing.is_empty() {
            return Err(SlotError::Validation(format!("Missing required fields: {}", missing.join(", "))));
        }

        let start_date = parse_date("start_date", request.start_date.as_deref().unwrap_or_default())?;
        let end_date = parse_date("end_date", request.end_date.as_deref().unwrap_or_default())?;
        if end_date < start_date {
            return Err(SlotError::Validation("end_date must not be before start_date".to_string()));
        }
        if (end_date - start_date).num_days() >= MAX_RECURRENCE_DAYS {
            return Err(SlotError::Validation(format!(
                "Recurrence window may span at most {} days",
                MAX_RECURRENCE_DAYS
            )));
        }

        let mut days_of_week = HashSet::new();
        for token in request.days_of_week.iter().flatten() {
            let symbol = WeekdaySymbol::parse(token)
                .ok_or_else(|| SlotError::Validation(format!("Invalid weekday: {:?}", token)))?;
            days_of_week.insert(Weekday::from(symbol));
        }

        Ok(Self {
            doctor_id,
            start_date,
            end_date,
            days_of_week,
            start_time: parse_time("start_time", request.start_time.as_deref().unwrap_or_default())?,
            end_time: parse_time("end_time", request.end_time.as_deref().unwrap_or_default())?,
        })
    }

    /// Every date of the window that falls on one of the rule's weekdays.
    pub fn occurrences(&self) -> Recurrence<'_> {
        Recurrence {
            days: &self.days_of_week,
            next: Some(self.start_date),
            end: self.end_date,
        }
    }
}

/// Lazy weekly expansion of a [`RecurrenceSpec`].
pub struct Recurrence<'a> {
    days: &'a HashSet<Weekday>,
    next: Option<NaiveDate>,
    end: NaiveDate,
}

impl Iterator for Recurrence<'_> {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        loop {
            let current = self.next.filter(|date| *date <= self.end)?;
            self.next = current.succ_opt();
            if self.days.contains(&current.weekday()) {
                return Some(current);
            }
        }
    }
}

/// Turns recurrence rules into concrete slot instants in one canonical timezone.
pub struct SlotGenerator {
    timezone: FixedOffset,
}

impl SlotGenerator {
    pub fn new(timezone: FixedOffset) -> Self {
        Self { timezone }
    }

    fn instant(&self, date: NaiveDate, time: NaiveTime) -> Result<DateTime<FixedOffset>, SlotError> {
        self.timezone
            .from_local_datetime(&date.and_time(time))
            .single()
            .ok_or_else(|| SlotError::Internal(format!("{} {} has no single instant", date, time)))
    }

    /// Expand `spec` relative to `now`.
    ///
    /// An occurrence that already started today fails the whole request; one on an
    /// earlier day is skipped and counted. Producing nothing at all is an error.
    pub fn generate(&self, spec: &RecurrenceSpec, now: DateTime<Utc>) -> Result<GeneratedSlots, SlotError> {
        let today = now.with_timezone(&self.timezone).date_naive();
        let mut generated = GeneratedSlots::default();

        for date in spec.occurrences() {
            let start = self.instant(date, spec.start_time)?;
            let end = self.instant(date, spec.end_time)?;

            if start >= end {
                return Err(SlotError::Validation(format!(
                    "start_time {} must be before end_time {}",
                    spec.start_time.format("%H:%M"),
                    spec.end_time.format("%H:%M")
                )));
            }

            let produced = start.with_timezone(&self.timezone).weekday();
            if !spec.days_of_week.contains(&produced) {
                return Err(SlotError::Internal(format!(
                    "Recurrence produced {} on {}, which is not a requested weekday",
                    produced, date
                )));
            }

            if start < now {
                if date == today {
                    warn!("Rejecting recurrence for doctor {}: {} already passed", spec.doctor_id, start);
                    return Err(SlotError::PastTimeRejected(start.to_rfc3339()));
                }
                generated.skipped += 1;
                continue;
            }

            generated.slots.push(SlotCandidate {
                date,
                start_time: start,
                end_time: end,
            });
        }

        debug!(
            "Recurrence for doctor {} produced {} slots, skipped {}",
            spec.doctor_id,
            generated.slots.len(),
            generated.skipped
        );

        if generated.slots.is_empty() {
            return Err(SlotError::AllSlotsSkipped {
                attempted: generated.skipped,
                skipped: generated.skipped,
            });
        }

        Ok(generated)
    }
}
