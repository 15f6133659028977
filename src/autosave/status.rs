use serde::Serialize;
use strum::{AsRefStr, Display};
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SaveState {
    Idle,
    Saving,
    Saved,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaveFailure {
    #[error("user must be authenticated to save notes")]
    Unauthenticated,
    #[error("new notes can only be created on YouTube videos")]
    GateRejected,
    #[error("failed to save note: {0}")]
    Store(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusView {
    pub state: SaveState,
    pub failure: Option<SaveFailure>,
    pub last_saved_at: Option<OffsetDateTime>,
}

/// Ordinal of one save attempt. Later attempts compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Attempt(u64);

/// Idle → Saving → Saved/Error → Idle, sequenced by attempt ordinal.
///
/// Only the most recent attempt may resolve the visible state, so an older
/// save finishing late never overwrites a newer `Saving`. `Saved` and `Error`
/// are display states: [`StatusMachine::expire`] returns them to `Idle`
/// without touching `last_saved_at`.
#[derive(Debug)]
pub struct StatusMachine {
    state: SaveState,
    failure: Option<SaveFailure>,
    last_saved_at: Option<OffsetDateTime>,
    latest: u64,
    epoch: u64,
}

impl StatusMachine {
    pub fn new(last_saved_at: Option<OffsetDateTime>) -> Self {
        Self {
            state: SaveState::Idle,
            failure: None,
            last_saved_at,
            latest: 0,
            epoch: 0,
        }
    }

    pub fn state(&self) -> SaveState {
        self.state
    }

    pub fn view(&self) -> StatusView {
        StatusView {
            state: self.state,
            failure: self.failure.clone(),
            last_saved_at: self.last_saved_at,
        }
    }

    /// Bumped on every visible transition; pairs with [`StatusMachine::expire`].
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn begin(&mut self) -> Attempt {
        self.latest += 1;
        self.transition(SaveState::Saving, None);
        Attempt(self.latest)
    }

    /// Records a failure that never reached `Saving` (no owner, gate refused).
    pub fn reject(&mut self, failure: SaveFailure) -> Attempt {
        self.latest += 1;
        self.transition(SaveState::Error, Some(failure));
        Attempt(self.latest)
    }

    pub fn is_current(&self, attempt: Attempt) -> bool {
        attempt.0 == self.latest
    }

    /// Returns `false` and changes nothing when a newer attempt has started.
    pub fn succeed(&mut self, attempt: Attempt, saved_at: OffsetDateTime) -> bool {
        if !self.is_current(attempt) {
            return false;
        }
        self.last_saved_at = Some(saved_at);
        self.transition(SaveState::Saved, None);
        true
    }

    pub fn fail(&mut self, attempt: Attempt, failure: SaveFailure) -> bool {
        if !self.is_current(attempt) {
            return false;
        }
        self.transition(SaveState::Error, Some(failure));
        true
    }

    /// Adopts a server-reported save time when it is newer than the one shown.
    pub fn observe_saved_at(&mut self, saved_at: OffsetDateTime) -> bool {
        match self.last_saved_at {
            Some(current) if current >= saved_at => false,
            _ => {
                self.last_saved_at = Some(saved_at);
                true
            }
        }
    }

    /// Reverts `Saved` / `Error` to `Idle` if nothing happened since `epoch`.
    pub fn expire(&mut self, epoch: u64) -> bool {
        if epoch != self.epoch || !matches!(self.state, SaveState::Saved | SaveState::Error) {
            return false;
        }
        self.transition(SaveState::Idle, None);
        true
    }

    fn transition(&mut self, state: SaveState, failure: Option<SaveFailure>) {
        self.state = state;
        self.failure = failure;
        self.epoch += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn happy_path_and_expiry() {
        let mut machine = StatusMachine::new(None);
        assert_eq!(machine.state(), SaveState::Idle);

        let attempt = machine.begin();
        assert_eq!(machine.state(), SaveState::Saving);

        let at = datetime!(2024-05-01 10:00:00 UTC);
        assert!(machine.succeed(attempt, at));
        assert_eq!(machine.state(), SaveState::Saved);

        assert!(machine.expire(machine.epoch()));
        let view = machine.view();
        assert_eq!(view.state, SaveState::Idle);
        assert_eq!(view.last_saved_at, Some(at));
    }

    #[test]
    fn failure_path_carries_reason_until_expiry() {
        let mut machine = StatusMachine::new(None);
        let attempt = machine.begin();
        assert!(machine.fail(attempt, SaveFailure::Store("offline".into())));
        assert_eq!(
            machine.view().failure,
            Some(SaveFailure::Store("offline".into()))
        );

        machine.expire(machine.epoch());
        assert_eq!(machine.view().failure, None);
        assert_eq!(machine.state(), SaveState::Idle);
    }

    #[test]
    fn stale_resolution_does_not_override_newer_saving() {
        let mut machine = StatusMachine::new(None);
        let older = machine.begin();
        let newer = machine.begin();

        assert!(!machine.succeed(older, datetime!(2024-05-01 10:00:00 UTC)));
        assert_eq!(machine.state(), SaveState::Saving);
        assert_eq!(machine.view().last_saved_at, None);

        assert!(!machine.fail(older, SaveFailure::Store("late".into())));
        assert_eq!(machine.state(), SaveState::Saving);

        assert!(machine.succeed(newer, datetime!(2024-05-01 10:00:01 UTC)));
        assert_eq!(machine.state(), SaveState::Saved);
    }

    #[test]
    fn expiry_is_ignored_after_a_newer_transition() {
        let mut machine = StatusMachine::new(None);
        let attempt = machine.begin();
        machine.succeed(attempt, datetime!(2024-05-01 10:00:00 UTC));
        let epoch = machine.epoch();

        machine.begin();
        assert!(!machine.expire(epoch));
        assert_eq!(machine.state(), SaveState::Saving);
    }

    #[test]
    fn saving_is_never_expired() {
        let mut machine = StatusMachine::new(None);
        machine.begin();
        assert!(!machine.expire(machine.epoch()));
        assert_eq!(machine.state(), SaveState::Saving);
    }

    #[test]
    fn reject_goes_straight_to_error_and_supersedes_in_flight_attempts() {
        let mut machine = StatusMachine::new(None);
        let in_flight = machine.begin();
        machine.reject(SaveFailure::GateRejected);
        assert_eq!(machine.state(), SaveState::Error);
        assert!(!machine.succeed(in_flight, datetime!(2024-05-01 10:00:00 UTC)));
        assert_eq!(machine.view().failure, Some(SaveFailure::GateRejected));
    }

    #[test]
    fn observed_times_only_move_forward() {
        let first = datetime!(2024-05-01 10:00:00 UTC);
        let mut machine = StatusMachine::new(Some(first));
        assert!(!machine.observe_saved_at(datetime!(2024-05-01 09:00:00 UTC)));
        assert!(machine.observe_saved_at(datetime!(2024-05-01 11:00:00 UTC)));
        assert_eq!(
            machine.view().last_saved_at,
            Some(datetime!(2024-05-01 11:00:00 UTC))
        );
    }

    #[test]
    fn states_render_lowercase() {
        assert_eq!(SaveState::Saving.to_string(), "saving");
        assert_eq!(SaveState::Error.as_ref(), "error");
    }
}
