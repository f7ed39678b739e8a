//! Medication adherence — per-patient reminder cache, minute-resolution
//! due detection with per-day dedupe, stock depletion and the daily
//! rollover that converts unconfirmed doses into misses.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, NaiveTime};
use log::{debug, info, warn};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use models::{
    MedicationReminder, PatientKey, PortalError, PortalResult, ReminderDraft, Session,
    StockAdvisory, TodayStatus,
};
use portal_api::{PortalBackend, PortalConfig};

/// Aggregate adherence for the dashboard card.
#[derive(Debug, Clone, PartialEq)]
pub struct AdherenceSummary {
    pub taken: u32,
    pub missed: u32,
    /// Whole-percent ratio; `None` until a first dose has elapsed.
    pub adherence_pct: Option<u32>,
    pub low_stock: Vec<(i64, u32)>,
    pub out_of_stock: Vec<i64>,
}

struct TrackerState {
    reminders: HashMap<i64, MedicationReminder>,
    /// `(reminder_id, date)` pairs whose due alert already fired.
    fired: HashSet<(i64, NaiveDate)>,
    current_day: NaiveDate,
}

/// One tracker per signed-in patient. All mutation goes through the
/// backend first and the local cache second, so the cache never claims a
/// dose the server has not logged.
pub struct AdherenceTracker {
    backend: Arc<dyn PortalBackend>,
    session: Session,
    patient: PatientKey,
    low_stock_threshold: u32,
    state: RwLock<TrackerState>,
    /// Held across a tick; an overlapping tick skips instead of queueing.
    tick_gate: Mutex<()>,
}

impl AdherenceTracker {
    pub fn new(
        backend: Arc<dyn PortalBackend>,
        session: Session,
        patient: PatientKey,
        config: &PortalConfig,
    ) -> Self {
        Self {
            backend,
            session,
            patient,
            low_stock_threshold: config.low_stock_threshold,
            state: RwLock::new(TrackerState {
                reminders: HashMap::new(),
                fired: HashSet::new(),
                current_day: Local::now().date_naive(),
            }),
            tick_gate: Mutex::new(()),
        }
    }

    /// Replaces the cache with the backend's active reminders.
    pub async fn load(&self) -> PortalResult<usize> {
        let rows = self.backend.fetch_reminders(&self.session, &self.patient).await?;
        let mut state = self.state.write().await;
        state.reminders = rows.into_iter().map(|r| (r.id, r)).collect();
        info!("[MEDS] loaded {} reminder(s) for {}", state.reminders.len(), self.patient);
        Ok(state.reminders.len())
    }

    pub async fn create_reminder(&self, draft: ReminderDraft) -> PortalResult<MedicationReminder> {
        let created = self.backend.create_reminder(&self.session, draft).await?;
        let mut state = self.state.write().await;
        state.reminders.insert(created.id, created.clone());
        Ok(created)
    }

    pub async fn reminders(&self) -> Vec<MedicationReminder> {
        let state = self.state.read().await;
        let mut rows: Vec<MedicationReminder> = state.reminders.values().cloned().collect();
        rows.sort_by_key(|r| (r.reminder_time.is_none(), r.reminder_time, r.id));
        rows
    }

    /// Reminders whose scheduled minute has arrived today, not yet taken,
    /// with stock left, and not already alerted today. Marks them fired.
    ///
    /// Any check at or after the scheduled time fires, deliberately: a
    /// first check hours late (app opened mid-afternoon) still alerts,
    /// and the per-day dedupe keeps it to one alert either way.
    pub async fn due_reminders(&self, now: DateTime<Local>) -> Vec<MedicationReminder> {
        let today = now.date_naive();
        let minute = now.time();
        let mut state = self.state.write().await;
        let mut due = Vec::new();
        for reminder in state.reminders.values() {
            let Some(at) = reminder.reminder_time else { continue };
            if minute < at
                || reminder.today_status == TodayStatus::Taken
                || reminder.remaining_stock == 0
                || state.fired.contains(&(reminder.id, today))
            {
                continue;
            }
            due.push(reminder.clone());
        }
        for reminder in &due {
            state.fired.insert((reminder.id, today));
            debug!("[MEDS] reminder {} due at {}", reminder.id, minute.format("%H:%M"));
        }
        due.sort_by_key(|r| (r.reminder_time, r.id));
        due
    }

    /// One poller beat: roll the day over if the date changed, then report
    /// newly due reminders. A beat arriving while the previous one still
    /// runs is skipped, not queued.
    pub async fn tick(&self, now: DateTime<Local>) -> Vec<MedicationReminder> {
        let Ok(_gate) = self.tick_gate.try_lock() else {
            debug!("[MEDS] tick overlapped, skipping");
            return Vec::new();
        };
        let rolled = {
            let state = self.state.read().await;
            state.current_day != now.date_naive()
        };
        if rolled {
            if let Err(err) = self.roll_over(now.date_naive()).await {
                warn!("[MEDS] rollover incomplete: {}", err);
            }
        }
        self.due_reminders(now).await
    }

    /// Confirms today's dose: backend first, cache second. Returns the
    /// stock advisory so the caller can warn or block refills.
    pub async fn mark_taken(&self, reminder_id: i64) -> PortalResult<StockAdvisory> {
        {
            let state = self.state.read().await;
            let reminder = state
                .reminders
                .get(&reminder_id)
                .ok_or_else(|| PortalError::NotFound(format!("reminder {}", reminder_id)))?;
            if reminder.remaining_stock == 0 {
                return Err(PortalError::Conflict(format!(
                    "{} is out of stock, refill before confirming a dose",
                    reminder.medicine_name
                )));
            }
        }

        let remaining = self.backend.mark_taken(&self.session, reminder_id).await?;

        let mut state = self.state.write().await;
        let advisory = match state.reminders.get_mut(&reminder_id) {
            Some(reminder) => {
                reminder.remaining_stock = remaining;
                reminder.taken_count += 1;
                reminder.today_status = TodayStatus::Taken;
                reminder.stock_advisory(self.low_stock_threshold)
            }
            // Deleted between check and confirm; the server logged the
            // dose, a reload will reconcile.
            None => StockAdvisory::Ok,
        };
        if let StockAdvisory::Low(left) = advisory {
            info!("[MEDS] reminder {} down to {} dose(s)", reminder_id, left);
        }
        Ok(advisory)
    }

    /// Reschedules a reminder, clearing today's fired flag so the new time
    /// can still alert today.
    pub async fn set_reminder_time(&self, reminder_id: i64, time: NaiveTime) -> PortalResult<()> {
        self.backend
            .update_reminder_time(&self.session, reminder_id, time)
            .await?;
        let mut state = self.state.write().await;
        let today = state.current_day;
        if let Some(reminder) = state.reminders.get_mut(&reminder_id) {
            reminder.reminder_time = Some(time);
        }
        state.fired.remove(&(reminder_id, today));
        Ok(())
    }

    /// Midnight transition: every reminder still pending counts as missed
    /// for the old day, today-status resets, stale fired flags drop.
    async fn roll_over(&self, new_day: NaiveDate) -> PortalResult<()> {
        let pending: Vec<i64> = {
            let state = self.state.read().await;
            state
                .reminders
                .values()
                .filter(|r| r.today_status == TodayStatus::Pending && r.reminder_time.is_some())
                .map(|r| r.id)
                .collect()
        };

        // Best effort: a reminder that cannot be logged as missed still
        // rolls over locally and reconciles on the next load.
        let mut first_err = None;
        for id in &pending {
            if let Err(err) = self.backend.mark_missed(&self.session, *id).await {
                warn!("[MEDS] could not log miss for reminder {}: {}", id, err);
                first_err.get_or_insert(err);
            }
        }

        let mut state = self.state.write().await;
        for id in &pending {
            if let Some(reminder) = state.reminders.get_mut(id) {
                reminder.missed_count += 1;
            }
        }
        for reminder in state.reminders.values_mut() {
            reminder.today_status = TodayStatus::Pending;
        }
        state.fired.retain(|(_, date)| *date >= new_day);
        state.current_day = new_day;
        info!("[MEDS] rolled over to {} ({} missed)", new_day, pending.len());

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub async fn adherence_summary(&self) -> AdherenceSummary {
        let state = self.state.read().await;
        let mut taken = 0;
        let mut missed = 0;
        let mut low_stock = Vec::new();
        let mut out_of_stock = Vec::new();
        for reminder in state.reminders.values() {
            taken += reminder.taken_count;
            missed += reminder.missed_count;
            match reminder.stock_advisory(self.low_stock_threshold) {
                StockAdvisory::Low(left) => low_stock.push((reminder.id, left)),
                StockAdvisory::OutOfStock => out_of_stock.push(reminder.id),
                StockAdvisory::Ok => {}
            }
        }
        low_stock.sort_unstable();
        out_of_stock.sort_unstable();
        let elapsed = taken + missed;
        let adherence_pct = if elapsed == 0 {
            None
        } else {
            Some(((taken as f64 / elapsed as f64) * 100.0).round() as u32)
        };
        AdherenceSummary { taken, missed, adherence_pct, low_stock, out_of_stock }
    }

    /// Spawns the background due-check loop. The handle cancels the loop
    /// when dropped; nothing keeps polling after logout.
    pub fn spawn_poller(
        self: Arc<Self>,
        config: &PortalConfig,
        on_due: impl Fn(Vec<MedicationReminder>) + Send + Sync + 'static,
    ) -> PollerHandle {
        let tracker = self;
        let period = config.effective_poll_interval();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let due = tracker.tick(Local::now()).await;
                if !due.is_empty() {
                    on_due(due);
                }
            }
        });
        PollerHandle { handle, period }
    }
}

/// Owns the poller task; dropping it stops the polling.
pub struct PollerHandle {
    handle: JoinHandle<()>,
    period: Duration,
}

impl PollerHandle {
    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn stop(self) {
        // Drop does the abort
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
