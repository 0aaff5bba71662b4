//! Submission progress
//!
//! One value in `[0, 1]` per attempt, split into named phases. It only ever
//! moves forward until the next attempt resets it.

use serde::Serialize;
use tokio::sync::watch;

/// Progress reached once the payload is assembled.
pub const PREPARING_TARGET: f64 = 0.2;
/// Progress reached once the server answered.
pub const UPLOADING_TARGET: f64 = 0.7;
pub const DONE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionPhase {
    Idle,
    Preparing,
    Uploading,
    Finalizing,
    Succeeded,
    Failed,
}

impl SubmissionPhase {
    pub fn label(&self) -> &'static str {
        match self {
            SubmissionPhase::Idle => "En attente",
            SubmissionPhase::Preparing => "Préparation",
            SubmissionPhase::Uploading => "Envoi",
            SubmissionPhase::Finalizing => "Finalisation",
            SubmissionPhase::Succeeded => "Envoyé",
            SubmissionPhase::Failed => "Échec",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SubmissionPhase::Succeeded | SubmissionPhase::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SubmissionProgress {
    pub phase: SubmissionPhase,
    pub value: f64,
}

impl Default for SubmissionProgress {
    fn default() -> Self {
        Self {
            phase: SubmissionPhase::Idle,
            value: 0.0,
        }
    }
}

/// Writer side of the progress channel.
pub(crate) struct ProgressCell {
    tx: watch::Sender<SubmissionProgress>,
}

impl ProgressCell {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(SubmissionProgress::default());
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<SubmissionProgress> {
        self.tx.subscribe()
    }

    pub(crate) fn current(&self) -> SubmissionProgress {
        *self.tx.borrow()
    }

    pub(crate) fn reset(&self) {
        self.tx.send_replace(SubmissionProgress::default());
    }

    /// Switch phase without moving the value.
    pub(crate) fn enter(&self, phase: SubmissionPhase) {
        self.tx.send_if_modified(|p| {
            if p.phase == phase {
                return false;
            }
            p.phase = phase;
            true
        });
    }

    /// Move to `value` in `phase`; lower values are ignored.
    pub(crate) fn reach(&self, phase: SubmissionPhase, value: f64) {
        let value = value.clamp(0.0, DONE);
        self.tx.send_if_modified(|p| {
            if value <= p.value && p.phase == phase {
                return false;
            }
            p.phase = phase;
            p.value = p.value.max(value);
            true
        });
    }

    /// Mark the attempt failed, keeping the last value reached.
    pub(crate) fn fail(&self) {
        self.enter(SubmissionPhase::Failed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_never_decreases() {
        let cell = ProgressCell::new();
        cell.reach(SubmissionPhase::Preparing, PREPARING_TARGET);
        cell.reach(SubmissionPhase::Uploading, UPLOADING_TARGET);
        cell.reach(SubmissionPhase::Uploading, 0.1);
        assert_eq!(cell.current().value, UPLOADING_TARGET);

        cell.reach(SubmissionPhase::Succeeded, 4.0);
        assert_eq!(cell.current().value, DONE);
    }

    #[test]
    fn fail_keeps_last_value_and_reset_starts_over() {
        let cell = ProgressCell::new();
        let rx = cell.subscribe();
        cell.reach(SubmissionPhase::Preparing, PREPARING_TARGET);
        cell.enter(SubmissionPhase::Uploading);
        cell.fail();

        assert_eq!(
            *rx.borrow(),
            SubmissionProgress {
                phase: SubmissionPhase::Failed,
                value: PREPARING_TARGET
            }
        );
        assert!(rx.borrow().phase.is_terminal());

        cell.reset();
        assert_eq!(cell.current(), SubmissionProgress::default());
    }
}
