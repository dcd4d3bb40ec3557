//! Fixed-interval polling until a resource reaches a terminal status.

use std::thread;
use std::time::Duration;

use crate::engine::EngineError;
use crate::plane::{PlaneError, ResourceDescriptor};

/// Fixed pause before each status fetch.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Policy for polling an asynchronous resource.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Upper bound on fetches. `None` polls until the resource settles.
    pub max_polls: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: POLL_INTERVAL,
            max_polls: None,
        }
    }
}

impl PollPolicy {
    pub fn new(interval: Duration, max_polls: Option<u32>) -> Self {
        Self {
            interval,
            max_polls,
        }
    }
}

/// Partition of observed status strings.
///
/// Anything outside `in_progress` and `success` is a terminal failure: an
/// unrecognized status means the resource is in a state this tool was never
/// taught to wait through.
#[derive(Debug, Clone)]
pub struct StatusClassifier {
    in_progress: &'static [&'static str],
    success: &'static [&'static str],
    until_absent: bool,
}

enum StatusClass {
    InProgress,
    Success,
    Failure,
}

impl StatusClassifier {
    /// Wait for one of `success` while the plane reports `in_progress`.
    pub fn settling(
        in_progress: &'static [&'static str],
        success: &'static [&'static str],
    ) -> Self {
        Self {
            in_progress,
            success,
            until_absent: false,
        }
    }

    /// Deletion confirmation: `NotFound` is the success terminal, and any
    /// status the plane still reports counts as progress toward removal.
    pub fn until_absent() -> Self {
        Self {
            in_progress: &[],
            success: &[],
            until_absent: true,
        }
    }

    fn classify(&self, status: &str) -> StatusClass {
        if self.until_absent || self.in_progress.contains(&status) {
            StatusClass::InProgress
        } else if self.success.contains(&status) {
            StatusClass::Success
        } else {
            StatusClass::Failure
        }
    }
}

/// Terminal outcome of a poll.
#[derive(Debug)]
pub enum Settled {
    /// The resource reached a success status.
    Ready(ResourceDescriptor),
    /// The resource is gone, and the classifier counts absence as success.
    Absent,
}

impl Settled {
    /// Body of the settled resource; `Null` when the terminal condition was
    /// absence.
    pub fn into_body(self) -> serde_json::Value {
        match self {
            Settled::Ready(descriptor) => descriptor.body,
            Settled::Absent => serde_json::Value::Null,
        }
    }
}

/// Poll `fetch` at a fixed interval until the observed status is terminal.
///
/// Every cycle sleeps before fetching, so even an already settled resource
/// costs one interval to observe.
pub fn wait_until_settled(
    policy: &PollPolicy,
    classifier: &StatusClassifier,
    mut fetch: impl FnMut() -> Result<ResourceDescriptor, PlaneError>,
) -> Result<Settled, EngineError> {
    let mut polls: u32 = 0;
    loop {
        if let Some(max) = policy.max_polls {
            if polls >= max {
                return Err(EngineError::PollBudgetExhausted { polls });
            }
        }
        thread::sleep(policy.interval);
        polls += 1;
        let descriptor = match fetch() {
            Ok(descriptor) => descriptor,
            Err(PlaneError::NotFound(_)) if classifier.until_absent => {
                return Ok(Settled::Absent);
            }
            Err(err) => return Err(err.into()),
        };
        match classifier.classify(&descriptor.status) {
            StatusClass::InProgress => {
                tracing::debug!(
                    kind = %descriptor.kind,
                    id = %descriptor.id,
                    status = %descriptor.status,
                    polls,
                    "still in progress"
                );
            }
            StatusClass::Success => return Ok(Settled::Ready(descriptor)),
            StatusClass::Failure => {
                return Err(EngineError::FailureStatus {
                    kind: descriptor.kind,
                    id: descriptor.id,
                    status: descriptor.status,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn instant() -> PollPolicy {
        PollPolicy::new(Duration::ZERO, None)
    }

    fn descriptor(status: &str) -> ResourceDescriptor {
        ResourceDescriptor {
            kind: "widgets".into(),
            id: "w-1".into(),
            name: "widget".into(),
            status: status.into(),
            body: json!({"id": "w-1", "status": status}),
        }
    }

    #[test]
    fn polls_until_terminal_success() {
        let statuses = ["CREATION_IN_PROGRESS", "CREATION_IN_PROGRESS", "CREATION_SUCCESSFUL"];
        let mut fetches = 0;
        let classifier =
            StatusClassifier::settling(&["CREATION_IN_PROGRESS"], &["CREATION_SUCCESSFUL"]);
        let settled = wait_until_settled(&instant(), &classifier, || {
            let status = statuses[fetches];
            fetches += 1;
            Ok(descriptor(status))
        })
        .unwrap();
        // Two in-progress observations then success: exactly three fetches,
        // and the returned descriptor is the third one.
        assert_eq!(fetches, 3);
        match settled {
            Settled::Ready(descriptor) => assert_eq!(descriptor.status, "CREATION_SUCCESSFUL"),
            Settled::Absent => panic!("expected a settled descriptor"),
        }
    }

    #[test]
    fn failure_status_stops_polling_immediately() {
        let statuses = ["CREATION_IN_PROGRESS", "CREATION_FAILED"];
        let mut fetches = 0;
        let classifier =
            StatusClassifier::settling(&["CREATION_IN_PROGRESS"], &["CREATION_SUCCESSFUL"]);
        let result = wait_until_settled(&instant(), &classifier, || {
            let status = statuses[fetches];
            fetches += 1;
            Ok(descriptor(status))
        });
        assert_eq!(fetches, 2);
        match result {
            Err(EngineError::FailureStatus { status, .. }) => {
                assert_eq!(status, "CREATION_FAILED");
            }
            other => panic!("expected failure status, got {other:?}"),
        }
    }

    #[test]
    fn unrecognized_status_is_a_failure() {
        let classifier = StatusClassifier::settling(&["BUILDING"], &["READY"]);
        let result = wait_until_settled(&instant(), &classifier, || Ok(descriptor("ARCHIVED")));
        assert!(matches!(result, Err(EngineError::FailureStatus { .. })));
    }

    #[test]
    fn absence_is_success_only_for_delete_confirmation() {
        let fetch =
            || Err::<ResourceDescriptor, _>(PlaneError::NotFound("widgets/w-1".into()));

        let confirmed =
            wait_until_settled(&instant(), &StatusClassifier::until_absent(), fetch).unwrap();
        assert!(matches!(confirmed, Settled::Absent));

        let classifier = StatusClassifier::settling(&["BUILDING"], &["READY"]);
        let result = wait_until_settled(&instant(), &classifier, fetch);
        assert!(matches!(
            result,
            Err(EngineError::Plane(PlaneError::NotFound(_)))
        ));
    }

    #[test]
    fn until_absent_keeps_waiting_while_resource_is_visible() {
        let mut fetches = 0;
        let settled = wait_until_settled(&instant(), &StatusClassifier::until_absent(), || {
            fetches += 1;
            if fetches < 3 {
                Ok(descriptor("DELETION_IN_PROGRESS"))
            } else {
                Err(PlaneError::NotFound("widgets/w-1".into()))
            }
        })
        .unwrap();
        assert_eq!(fetches, 3);
        assert!(matches!(settled, Settled::Absent));
    }

    #[test]
    fn bounded_policy_gives_up_after_max_polls() {
        let policy = PollPolicy::new(Duration::ZERO, Some(5));
        let classifier = StatusClassifier::settling(&["BUILDING"], &["READY"]);
        let mut fetches = 0;
        let result = wait_until_settled(&policy, &classifier, || {
            fetches += 1;
            Ok(descriptor("BUILDING"))
        });
        assert_eq!(fetches, 5);
        match result {
            Err(EngineError::PollBudgetExhausted { polls }) => assert_eq!(polls, 5),
            other => panic!("expected exhausted poll budget, got {other:?}"),
        }
    }
}
