//! Medication reminders — schedule, stock depletion and adherence counters
//! for one prescribed medicine of a registered patient.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;
use crate::medical::patient::PatientKey;

/// Whether today's dose has been confirmed yet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TodayStatus {
    Taken,
    Pending,
}

/// Derived per-day state of a reminder.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReminderPhase {
    Pending,
    Due,
    TakenToday,
    OutOfStock,
}

/// Stock advisory thresholds: zero blocks further intake, one or two is a
/// non-blocking warning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StockAdvisory {
    Ok,
    Low(u32),
    OutOfStock,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicationReminder {
    pub id: i64,
    pub patient: PatientKey,
    /// Linked prescription, if the reminder was created from one.
    pub rx_id: Option<i64>,
    pub medicine_name: String,
    pub reminder_time: Option<NaiveTime>,
    pub total_stock: u32,
    pub remaining_stock: u32,
    pub taken_count: u32,
    pub missed_count: u32,
    pub today_status: TodayStatus,
    pub is_active: bool,
}

impl MedicationReminder {
    /// Derives the reminder's phase. Empty stock dominates every path.
    pub fn phase(&self, due_fired_today: bool) -> ReminderPhase {
        if self.remaining_stock == 0 {
            ReminderPhase::OutOfStock
        } else if self.today_status == TodayStatus::Taken {
            ReminderPhase::TakenToday
        } else if due_fired_today {
            ReminderPhase::Due
        } else {
            ReminderPhase::Pending
        }
    }

    pub fn stock_advisory(&self, low_threshold: u32) -> StockAdvisory {
        if self.remaining_stock == 0 {
            StockAdvisory::OutOfStock
        } else if self.remaining_stock <= low_threshold {
            StockAdvisory::Low(self.remaining_stock)
        } else {
            StockAdvisory::Ok
        }
    }

    /// Ratio of confirmed doses to elapsed doses, rounded to whole percent.
    /// Undefined (`None`), not zero, before any dose has elapsed.
    pub fn adherence_pct(&self) -> Option<u32> {
        let elapsed = self.taken_count + self.missed_count;
        if elapsed == 0 {
            return None;
        }
        Some(((self.taken_count as f64 / elapsed as f64) * 100.0).round() as u32)
    }

    pub fn check_stock_invariant(&self) -> Result<(), ValidationError> {
        if self.remaining_stock > self.total_stock {
            return Err(ValidationError::InconsistentStock {
                remaining: self.remaining_stock,
                total: self.total_stock,
            });
        }
        Ok(())
    }
}

/// Parses the wire `"HH:MM"` reminder time.
pub fn parse_reminder_time(raw: &str) -> Result<NaiveTime, ValidationError> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .map_err(|_| ValidationError::MalformedReminderTime(raw.to_string()))
}

/// Formats a reminder time back to the wire `"HH:MM"` shape.
pub fn format_reminder_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Payload for creating a reminder (linked to an RX or standalone).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReminderDraft {
    pub patient: PatientKey,
    pub rx_id: Option<i64>,
    pub medicine_name: String,
    pub reminder_time: Option<NaiveTime>,
    pub total_stock: u32,
}

#[cfg(test)]
mod tests {
    use super::{
        format_reminder_time, parse_reminder_time, MedicationReminder, ReminderPhase,
        StockAdvisory, TodayStatus,
    };
    use crate::errors::ValidationError;
    use crate::medical::patient::{PatientKey, RecordSource};

    fn reminder(remaining: u32, taken: u32, missed: u32) -> MedicationReminder {
        MedicationReminder {
            id: 1,
            patient: PatientKey { id: 4, source: RecordSource::Registered },
            rx_id: None,
            medicine_name: "Metformin".to_string(),
            reminder_time: parse_reminder_time("09:00").ok(),
            total_stock: 30,
            remaining_stock: remaining,
            taken_count: taken,
            missed_count: missed,
            today_status: TodayStatus::Pending,
            is_active: true,
        }
    }

    #[test]
    fn should_parse_and_format_wire_times() {
        let t = parse_reminder_time("09:05").unwrap();
        assert_eq!(format_reminder_time(t), "09:05");
        assert!(matches!(
            parse_reminder_time("9 am"),
            Err(ValidationError::MalformedReminderTime(_))
        ));
    }

    #[test]
    fn should_leave_adherence_undefined_with_no_elapsed_doses() {
        assert_eq!(reminder(10, 0, 0).adherence_pct(), None);
    }

    #[test]
    fn should_round_adherence_percentage() {
        assert_eq!(reminder(10, 2, 1).adherence_pct(), Some(67));
        assert_eq!(reminder(10, 1, 2).adherence_pct(), Some(33));
        assert_eq!(reminder(10, 3, 0).adherence_pct(), Some(100));
        assert_eq!(reminder(10, 0, 3).adherence_pct(), Some(0));
    }

    #[test]
    fn should_let_empty_stock_dominate_phase() {
        let mut r = reminder(0, 5, 0);
        r.today_status = TodayStatus::Taken;
        assert_eq!(r.phase(true), ReminderPhase::OutOfStock);
    }

    #[test]
    fn should_grade_stock_advisories() {
        assert_eq!(reminder(0, 0, 0).stock_advisory(2), StockAdvisory::OutOfStock);
        assert_eq!(reminder(1, 0, 0).stock_advisory(2), StockAdvisory::Low(1));
        assert_eq!(reminder(2, 0, 0).stock_advisory(2), StockAdvisory::Low(2));
        assert_eq!(reminder(3, 0, 0).stock_advisory(2), StockAdvisory::Ok);
    }

    #[test]
    fn should_reject_inconsistent_stock_counts() {
        let mut r = reminder(31, 0, 0);
        assert!(r.check_stock_invariant().is_err());
        r.remaining_stock = 30;
        assert!(r.check_stock_invariant().is_ok());
    }
}
