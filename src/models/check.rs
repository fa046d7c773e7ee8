use serde::Serialize;

/// Counters produced by one batch. Created by a worker, folded into the page
/// total by the orchestrator, then dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub checked: u64,
    pub valid: u64,
    pub invalid: u64,
    pub failed: u64,
}

impl BatchOutcome {
    /// Outcome for a batch whose API call or persistence could not complete.
    pub fn failed(size: usize) -> Self {
        Self {
            failed: size as u64,
            ..Self::default()
        }
    }

    pub fn merge(&mut self, other: &BatchOutcome) {
        self.checked += other.checked;
        self.valid += other.valid;
        self.invalid += other.invalid;
        self.failed += other.failed;
    }
}

/// Summary of one reconciliation run. Never persisted.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CheckResult {
    pub success: bool,
    pub total_count: u64,
    pub checked_count: u64,
    pub valid_count: u64,
    pub invalid_count: u64,
    pub failed_count: u64,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Default for CheckResult {
    fn default() -> Self {
        Self {
            success: true,
            total_count: 0,
            checked_count: 0,
            valid_count: 0,
            invalid_count: 0,
            failed_count: 0,
            duration_ms: 0,
            error_message: None,
        }
    }
}

impl CheckResult {
    /// Fold a page's (or batch's) counters into the running totals.
    pub fn merge(&mut self, outcome: &BatchOutcome) {
        self.checked_count += outcome.checked;
        self.valid_count += outcome.valid;
        self.invalid_count += outcome.invalid;
        self.failed_count += outcome.failed;
    }

    /// Whether the alert dispatcher should run after this result.
    pub fn has_new_invalids(&self) -> bool {
        self.success && self.invalid_count > 0
    }
}
