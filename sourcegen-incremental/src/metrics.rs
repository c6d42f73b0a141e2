//! Step tracking and metrics
//!
//! With step tracking enabled, every evaluated node that has a tracking name
//! (and every internal step of a named selector) is recorded as a
//! [`StepRun`]. A [`MetricsSnapshot`] summarizes one of them.

use crate::node::NodeId;
use crate::table::EntryState;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// One evaluation of a named step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRun {
    /// Tracking name; internal selector steps are `<name>.<part>`
    pub name: Arc<str>,

    pub node: NodeId,

    /// State of every output entry, in table order
    pub states: Vec<EntryState>,

    /// Units of user work performed (transforms invoked, files walked)
    pub executions: usize,

    pub elapsed: Duration,
}

impl StepRun {
    pub fn count(&self, state: EntryState) -> usize {
        self.states.iter().filter(|s| **s == state).count()
    }

    /// Every output entry was reused
    pub fn is_cached(&self) -> bool {
        self.states.iter().all(|s| *s == EntryState::Cached)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        let recomputed = self.count(EntryState::Added) + self.count(EntryState::Modified);
        MetricsSnapshot {
            step_name: Arc::clone(&self.name),
            cached: self.count(EntryState::Cached) as u64,
            recomputed: recomputed as u64,
            removed: self.count(EntryState::Removed) as u64,
            early_cutoffs: u64::from(self.executions > 0 && recomputed == 0),
            executions: self.executions as u64,
            total_time_ns: self.elapsed.as_nanos() as u64,
        }
    }
}

/// Summary of one step run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub step_name: Arc<str>,
    pub cached: u64,
    pub recomputed: u64,
    pub removed: u64,
    /// 1 when the step did work but every entry came out unchanged
    pub early_cutoffs: u64,
    pub executions: u64,
    pub total_time_ns: u64,
}

impl MetricsSnapshot {
    /// Share of live entries reused (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.cached + self.recomputed;
        if total == 0 {
            0.0
        } else {
            self.cached as f64 / total as f64
        }
    }

    pub fn total_time(&self) -> Duration {
        Duration::from_nanos(self.total_time_ns)
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Step: {}", self.step_name)?;
        writeln!(
            f,
            "  Cached: {} | Recomputed: {} | Removed: {} | Hit Rate: {:.1}%",
            self.cached,
            self.recomputed,
            self.removed,
            self.hit_rate() * 100.0
        )?;
        writeln!(
            f,
            "  Executions: {} | Early Cutoffs: {} | Time: {:.2}ms",
            self.executions,
            self.early_cutoffs,
            self.total_time().as_secs_f64() * 1000.0
        )?;
        Ok(())
    }
}
