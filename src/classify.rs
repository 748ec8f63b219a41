use crate::config::MigratorConfig;
use crate::types::Outcome;

/// Strategy for mapping one invocation's log text to a verdict.
///
/// Kept behind a trait so the matching rule can be swapped without touching
/// the scheduler; the scheduler never sees marker strings.
pub trait OutcomeClassifier: Send + Sync {
    fn classify(&self, log_text: &str) -> Outcome;
}

/// Fail-closed marker matching.
///
/// A log is Success only when it contains the explicit success marker and
/// does not contain the no-op marker. Everything else (missing marker,
/// no-op marker present, empty log, garbage) is Failure: a false Success
/// would feed an unmigrated repository into every downstream stage, while a
/// false Failure costs one manual retry.
#[derive(Debug, Clone)]
pub struct MarkerClassifier {
    success_marker: String,
    noop_marker: String,
}

impl MarkerClassifier {
    pub fn new(success_marker: &str, noop_marker: &str) -> Self {
        Self {
            success_marker: success_marker.to_string(),
            noop_marker: noop_marker.to_string(),
        }
    }

    pub fn from_config(config: &MigratorConfig) -> Self {
        Self::new(&config.success_marker, &config.noop_marker)
    }
}

impl OutcomeClassifier for MarkerClassifier {
    fn classify(&self, log_text: &str) -> Outcome {
        if log_text.contains(&self.success_marker) && !log_text.contains(&self.noop_marker) {
            Outcome::Success
        } else {
            Outcome::Failure
        }
    }
}
