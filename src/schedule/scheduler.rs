// src/schedule/scheduler.rs

//! Interval table and due-ness computation.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::model::ScheduleEntry;
use crate::engine::WorkerType;

/// Why a worker type is due on this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DueReason {
    /// No recorded last run (first start, or never dispatched).
    NeverRun,
    /// The recorded last run could not be parsed.
    UnreadableLastRun,
    /// `interval_minutes` elapsed since the last run.
    IntervalElapsed { minutes_since: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueWorker {
    pub worker_type: WorkerType,
    pub reason: DueReason,
}

/// Per-worker-type schedule in a stable iteration order.
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    entries: Vec<(WorkerType, ScheduleEntry)>,
}

impl Schedule {
    pub fn from_entries(entries: &BTreeMap<WorkerType, ScheduleEntry>) -> Self {
        Self {
            entries: entries
                .iter()
                .map(|(name, entry)| (name.clone(), entry.clone()))
                .collect(),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &ScheduleEntry)> {
        self.entries.iter().map(|(name, e)| (name.as_str(), e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Enabled worker types due at `now`, in table order.
    ///
    /// `last_runs` is the `state.scheduler.last_runs` object: worker type to
    /// RFC 3339 timestamp.
    pub fn due(&self, now: DateTime<Utc>, last_runs: &Map<String, Value>) -> Vec<DueWorker> {
        let mut due = Vec::new();

        for (worker_type, entry) in &self.entries {
            if !entry.enabled {
                continue;
            }

            let reason = match last_runs.get(worker_type) {
                None | Some(Value::Null) => Some(DueReason::NeverRun),
                Some(raw) => match parse_last_run(raw) {
                    Some(last) => {
                        let elapsed = now.signed_duration_since(last);
                        match interval(entry.interval_minutes) {
                            Some(interval) if elapsed >= interval => {
                                Some(DueReason::IntervalElapsed {
                                    minutes_since: elapsed.num_minutes(),
                                })
                            }
                            Some(_) => None,
                            None => {
                                warn!(
                                    worker_type = %worker_type,
                                    interval_minutes = entry.interval_minutes,
                                    "interval out of range; never due again"
                                );
                                None
                            }
                        }
                    }
                    None => {
                        warn!(worker_type = %worker_type, value = %raw, "unparseable last run; treating as due");
                        Some(DueReason::UnreadableLastRun)
                    }
                },
            };

            if let Some(reason) = reason {
                debug!(worker_type = %worker_type, ?reason, "worker due");
                due.push(DueWorker {
                    worker_type: worker_type.clone(),
                    reason,
                });
            }
        }

        due
    }
}

/// `None` when the interval does not fit a [`Duration`].
fn interval(minutes: u64) -> Option<Duration> {
    Duration::try_minutes(i64::try_from(minutes).ok()?)
}

fn parse_last_run(raw: &Value) -> Option<DateTime<Utc>> {
    let text = raw.as_str()?;
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
