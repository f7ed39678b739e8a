//! Record aggregation — merges the per-producer record feeds into one
//! newest-first timeline, degrading per producer instead of failing the
//! whole view.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::Arc;

use log::{info, warn};
use serde_json::json;

use models::{
    PatientKey, PortalResult, RecordProducer, RecordSource, Session, TimelineEntry,
};
use portal_api::{PortalBackend, PortalConfig};

/// The merged timeline plus the producers that could not contribute.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineView {
    /// Newest first. Producer-order tie-break keeps reruns stable.
    pub entries: Vec<TimelineEntry>,
    /// Producers whose fetch failed this round; their entries are simply
    /// absent, nothing else about the view changes.
    pub incomplete: Vec<RecordProducer>,
}

impl TimelineView {
    pub fn is_complete(&self) -> bool {
        self.incomplete.is_empty()
    }

    /// Dashboard payload shape, `degraded` spelled out for the banner.
    pub fn summary_json(&self) -> serde_json::Value {
        json!({
            "entries": self.entries.len(),
            "degraded": !self.is_complete(),
            "missing_producers": self.incomplete.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
        })
    }
}

/// Fixed fan-out order. Also the merge tie-break for equal timestamps, so
/// a rerun over the same rows yields the same sequence.
const PRODUCER_ORDER: [RecordProducer; 4] = [
    RecordProducer::UnifiedRecord,
    RecordProducer::DiagnosisReport,
    RecordProducer::Suggestion,
    RecordProducer::Prescription,
];

fn producer_rank(producer: RecordProducer) -> usize {
    PRODUCER_ORDER.iter().position(|p| *p == producer).unwrap_or(PRODUCER_ORDER.len())
}

/// Pure merge: dedupe by `(producer, id)`, then order newest first with
/// producer rank breaking timestamp ties. Stable under re-merging.
pub fn merge_entries(batches: Vec<Vec<TimelineEntry>>) -> Vec<TimelineEntry> {
    let mut seen: HashSet<(RecordProducer, i64)> = HashSet::new();
    let mut merged: Vec<TimelineEntry> = Vec::new();
    for batch in batches {
        for entry in batch {
            if seen.insert(entry.dedupe_key()) {
                merged.push(entry);
            }
        }
    }
    merged.sort_by_key(|e| (Reverse(e.created_at), producer_rank(e.producer), Reverse(e.id)));
    merged
}

pub struct RecordAggregationService {
    backend: Arc<dyn PortalBackend>,
    trend_window: usize,
}

impl RecordAggregationService {
    pub fn new(backend: Arc<dyn PortalBackend>, config: &PortalConfig) -> Self {
        Self { backend, trend_window: config.trend_window }
    }

    /// Fetches every producer feed for one patient and merges them.
    ///
    /// A failing producer is logged, recorded in `incomplete` and skipped;
    /// the other producers still contribute. Auth failures are the one
    /// exception: a 401 anywhere aborts the whole aggregation so the
    /// session can be torn down.
    pub async fn aggregate(
        &self,
        session: &Session,
        patient: &PatientKey,
    ) -> PortalResult<TimelineView> {
        // Suggestions and prescriptions exist only in the master schema;
        // for registered patients those endpoints are never contacted and
        // the producers contribute empty batches.
        let is_master = patient.source == RecordSource::Master;
        let (unified, diagnosis, suggestions, prescriptions) = tokio::join!(
            self.backend.fetch_unified_records(session, patient),
            self.backend.fetch_diagnosis_reports(session, patient),
            async {
                if is_master {
                    self.backend.fetch_suggestions(session, patient).await
                } else {
                    Ok(Vec::new())
                }
            },
            async {
                if is_master {
                    self.backend.fetch_prescriptions(session, patient).await
                } else {
                    Ok(Vec::new())
                }
            },
        );

        let mut batches: Vec<Vec<TimelineEntry>> = Vec::with_capacity(4);
        let mut incomplete: Vec<RecordProducer> = Vec::new();

        absorb(RecordProducer::UnifiedRecord, unified, &mut batches, &mut incomplete)?;
        absorb(RecordProducer::DiagnosisReport, diagnosis, &mut batches, &mut incomplete)?;
        absorb(RecordProducer::Suggestion, suggestions, &mut batches, &mut incomplete)?;
        let rx_entries =
            prescriptions.map(|rows| rows.iter().map(|rx| rx.to_timeline_entry()).collect());
        absorb(RecordProducer::Prescription, rx_entries, &mut batches, &mut incomplete)?;

        let entries = merge_entries(batches);
        info!(
            "[AGGREGATE] patient {} merged {} entries ({} producer(s) down)",
            patient,
            entries.len(),
            incomplete.len()
        );
        Ok(TimelineView { entries, incomplete })
    }

    /// Trailing window of numeric sugar readings, oldest first so it plots
    /// left to right. Unparseable readings stay in the timeline but are not
    /// part of the trend.
    pub fn sugar_trend(&self, view: &TimelineView) -> Vec<f64> {
        let mut newest_first: Vec<f64> = view
            .entries
            .iter()
            .filter_map(TimelineEntry::sugar_numeric)
            .take(self.trend_window)
            .collect();
        newest_first.reverse();
        newest_first
    }
}

/// Folds one producer result into the merge input. Auth errors propagate,
/// everything else degrades the view.
fn absorb(
    producer: RecordProducer,
    result: PortalResult<Vec<TimelineEntry>>,
    batches: &mut Vec<Vec<TimelineEntry>>,
    incomplete: &mut Vec<RecordProducer>,
) -> PortalResult<()> {
    match result {
        Ok(rows) => batches.push(rows),
        Err(err) if err.is_auth() => return Err(err),
        Err(err) => {
            warn!("[AGGREGATE] producer {} failed: {}", producer.as_str(), err);
            incomplete.push(producer);
        }
    }
    Ok(())
}
