//! Collection statistics.

use std::time::Duration;

/// Counters a heap keeps about its collections.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GcStats {
    /// Number of new-space (or single-space) scavenges.
    pub scavenges: usize,
    /// Number of old-space mark-sweep collections.
    pub mark_sweeps: usize,
    /// Bytes copied into old space by scavenges.
    pub bytes_promoted: usize,
    /// Bytes reclaimed by the most recent collection.
    pub last_freed: usize,
    /// Duration of the most recent collection.
    pub last_pause: Duration,
    /// Total time spent collecting.
    pub total_pause: Duration,
}

impl GcStats {
    /// Total collections of either kind.
    pub fn collections(&self) -> usize {
        self.scavenges + self.mark_sweeps
    }

    pub(crate) fn record_scavenge(&mut self, pause: Duration, freed: usize, promoted: usize) {
        self.scavenges += 1;
        self.bytes_promoted += promoted;
        self.record_pause(pause, freed);
    }

    pub(crate) fn record_mark_sweep(&mut self, pause: Duration, freed: usize) {
        self.mark_sweeps += 1;
        self.record_pause(pause, freed);
    }

    fn record_pause(&mut self, pause: Duration, freed: usize) {
        self.last_pause = pause;
        self.last_freed = freed;
        self.total_pause += pause;
    }
}
