//! Result of one reconcile step

use std::time::Duration;

use kube::runtime::controller::Action;

/// What the scheduler should do after a successful step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing left to do until the resource changes
    Done,
    /// Re-run after the delay; an external event is pending or a fresh read is needed
    RetryAfter(Duration),
}

impl Outcome {
    /// True for [`Outcome::Done`]
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl From<Outcome> for Action {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Done => Action::await_change(),
            Outcome::RetryAfter(delay) => Action::requeue(delay),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_map_to_controller_actions() {
        assert_eq!(Action::from(Outcome::Done), Action::await_change());
        assert_eq!(
            Action::from(Outcome::RetryAfter(Duration::from_secs(1))),
            Action::requeue(Duration::from_secs(1))
        );
        assert!(Outcome::Done.is_done());
        assert!(!Outcome::RetryAfter(Duration::ZERO).is_done());
    }
}
