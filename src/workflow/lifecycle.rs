//! Status state machine for requests.
//!
//! Transitions are computed here as pure functions of the current status,
//! the amount and the action; callers persist the result with a conditional
//! update (`WHERE status = <expected>`) so a raced second writer observes a
//! state conflict instead of silently overwriting.

use bigdecimal::BigDecimal;
use thiserror::Error;

use crate::db::models::requests::{RequestStatus, RequestType};
use crate::workflow::policy;

/// Which approval tier acted. Determines which `*_approved_*` fields the
/// caller writes back onto the request row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalTier {
    Manager,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The request already reached a terminal status. Stale email links and
    /// double-clicks land here; callers render an informational response,
    /// not an error.
    #[error("request has already been processed (status `{0}`)")]
    AlreadyProcessed(RequestStatus),

    #[error("cannot {action} a request in status `{from}`")]
    InvalidTransition {
        from: RequestStatus,
        action: &'static str,
    },

    #[error("a decline reason is required")]
    EmptyDeclineReason,
}

/// Outcome of a successful transition computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: RequestStatus,
    pub tier: Option<ApprovalTier>,
}

/// Status a freshly created request starts in. Toner orders enter the
/// fulfilment track; everything else awaits manager approval.
pub fn initial_status(request_type: RequestType) -> RequestStatus {
    match request_type {
        RequestType::Toner => RequestStatus::Open,
        _ => RequestStatus::Submitted,
    }
}

/// Compute the approve transition.
///
/// From a first-tier status the amount decides whether the request settles
/// (`approved`) or escalates (`pending_admin_approval`); from
/// `pending_admin_approval` an admin approval is always terminal.
pub fn approve(
    current: RequestStatus,
    amount: Option<&BigDecimal>,
    threshold: &BigDecimal,
) -> Result<Transition, TransitionError> {
    if current.is_terminal() {
        return Err(TransitionError::AlreadyProcessed(current));
    }

    match current {
        RequestStatus::Submitted | RequestStatus::PendingManagerApproval | RequestStatus::Open => {
            if policy::requires_admin_approval(amount, threshold) {
                Ok(Transition {
                    next: RequestStatus::PendingAdminApproval,
                    tier: Some(ApprovalTier::Manager),
                })
            } else {
                Ok(Transition {
                    next: RequestStatus::Approved,
                    tier: Some(ApprovalTier::Manager),
                })
            }
        }
        RequestStatus::PendingAdminApproval => Ok(Transition {
            next: RequestStatus::Approved,
            tier: Some(ApprovalTier::Admin),
        }),
        from => Err(TransitionError::InvalidTransition {
            from,
            action: "approve",
        }),
    }
}

/// Compute the decline transition. Valid from any non-terminal status, but
/// only with a non-empty reason; a blank reason mutates nothing.
pub fn decline(current: RequestStatus, reason: &str) -> Result<Transition, TransitionError> {
    if current.is_terminal() {
        return Err(TransitionError::AlreadyProcessed(current));
    }
    if reason.trim().is_empty() {
        return Err(TransitionError::EmptyDeclineReason);
    }

    Ok(Transition {
        next: RequestStatus::Declined,
        tier: None,
    })
}

/// Submitter-initiated cancellation, valid from any non-terminal status.
pub fn cancel(current: RequestStatus) -> Result<Transition, TransitionError> {
    if current.is_terminal() {
        return Err(TransitionError::AlreadyProcessed(current));
    }

    Ok(Transition {
        next: RequestStatus::Cancelled,
        tier: None,
    })
}

/// Advance the toner fulfilment track one step: `open` → `in_progress` →
/// `ordered`. Every other combination is rejected.
pub fn advance_fulfilment(
    current: RequestStatus,
    target: RequestStatus,
) -> Result<Transition, TransitionError> {
    match (current, target) {
        (RequestStatus::Open, RequestStatus::InProgress)
        | (RequestStatus::InProgress, RequestStatus::Ordered) => Ok(Transition {
            next: target,
            tier: None,
        }),
        (current, _) if current.is_terminal() => Err(TransitionError::AlreadyProcessed(current)),
        (from, _) => Err(TransitionError::InvalidTransition {
            from,
            action: "advance",
        }),
    }
}

/// Mark fulfilment done. Only approved requests (or ordered toner) can
/// complete.
pub fn complete(current: RequestStatus) -> Result<Transition, TransitionError> {
    match current {
        RequestStatus::Approved | RequestStatus::Ordered => Ok(Transition {
            next: RequestStatus::Completed,
            tier: None,
        }),
        current if current.is_terminal() => Err(TransitionError::AlreadyProcessed(current)),
        from => Err(TransitionError::InvalidTransition {
            from,
            action: "complete",
        }),
    }
}

#[cfg(test)]
mod tests {
    use bigdecimal::BigDecimal;

    use super::{
        advance_fulfilment, approve, cancel, complete, decline, initial_status, ApprovalTier,
        TransitionError,
    };
    use crate::db::models::requests::{RequestStatus, RequestType};

    fn threshold() -> BigDecimal {
        BigDecimal::from(5000)
    }

    #[test]
    fn small_amount_is_approved_in_one_step() {
        let amount = BigDecimal::from(1000);
        let transition =
            approve(RequestStatus::Submitted, Some(&amount), &threshold()).expect("approvable");

        assert_eq!(transition.next, RequestStatus::Approved);
        assert_eq!(transition.tier, Some(ApprovalTier::Manager));
    }

    #[test]
    fn missing_amount_is_approved_in_one_step() {
        let transition = approve(RequestStatus::Submitted, None, &threshold()).expect("approvable");
        assert_eq!(transition.next, RequestStatus::Approved);
    }

    #[test]
    fn large_amount_escalates_to_admin_tier() {
        let amount = BigDecimal::from(6000);
        let transition =
            approve(RequestStatus::Submitted, Some(&amount), &threshold()).expect("approvable");

        assert_eq!(transition.next, RequestStatus::PendingAdminApproval);
        assert_eq!(transition.tier, Some(ApprovalTier::Manager));
    }

    #[test]
    fn admin_approval_finalizes_escalated_request() {
        let amount = BigDecimal::from(6000);
        let transition = approve(
            RequestStatus::PendingAdminApproval,
            Some(&amount),
            &threshold(),
        )
        .expect("approvable");

        assert_eq!(transition.next, RequestStatus::Approved);
        assert_eq!(transition.tier, Some(ApprovalTier::Admin));
    }

    #[test]
    fn terminal_statuses_reject_approval() {
        for status in [
            RequestStatus::Approved,
            RequestStatus::Declined,
            RequestStatus::Cancelled,
            RequestStatus::Completed,
        ] {
            let result = approve(status, None, &threshold());
            assert_eq!(result, Err(TransitionError::AlreadyProcessed(status)));
        }
    }

    #[test]
    fn ordered_toner_cannot_be_approved_again() {
        let result = approve(RequestStatus::Ordered, None, &threshold());
        assert_eq!(
            result,
            Err(TransitionError::InvalidTransition {
                from: RequestStatus::Ordered,
                action: "approve",
            })
        );
    }

    #[test]
    fn decline_requires_a_reason() {
        for reason in ["", "   ", "\t\n"] {
            let result = decline(RequestStatus::Submitted, reason);
            assert_eq!(result, Err(TransitionError::EmptyDeclineReason));
        }
    }

    #[test]
    fn decline_with_reason_succeeds_from_any_pending_status() {
        for status in [
            RequestStatus::Submitted,
            RequestStatus::Open,
            RequestStatus::PendingManagerApproval,
            RequestStatus::PendingAdminApproval,
        ] {
            let transition = decline(status, "duplicate").expect("declinable");
            assert_eq!(transition.next, RequestStatus::Declined);
        }
    }

    #[test]
    fn declined_request_rejects_second_decline() {
        let result = decline(RequestStatus::Declined, "still a duplicate");
        assert_eq!(
            result,
            Err(TransitionError::AlreadyProcessed(RequestStatus::Declined))
        );
    }

    #[test]
    fn cancel_only_from_non_terminal_statuses() {
        assert!(cancel(RequestStatus::Submitted).is_ok());
        assert_eq!(
            cancel(RequestStatus::Completed),
            Err(TransitionError::AlreadyProcessed(RequestStatus::Completed))
        );
    }

    #[test]
    fn complete_only_from_approved_or_ordered() {
        assert_eq!(
            complete(RequestStatus::Approved).expect("completable").next,
            RequestStatus::Completed
        );
        assert_eq!(
            complete(RequestStatus::Ordered).expect("completable").next,
            RequestStatus::Completed
        );
        assert!(matches!(
            complete(RequestStatus::Submitted),
            Err(TransitionError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn fulfilment_advances_one_step_at_a_time() {
        assert_eq!(
            advance_fulfilment(RequestStatus::Open, RequestStatus::InProgress)
                .expect("advanceable")
                .next,
            RequestStatus::InProgress
        );
        assert_eq!(
            advance_fulfilment(RequestStatus::InProgress, RequestStatus::Ordered)
                .expect("advanceable")
                .next,
            RequestStatus::Ordered
        );
        assert!(matches!(
            advance_fulfilment(RequestStatus::Open, RequestStatus::Ordered),
            Err(TransitionError::InvalidTransition { .. })
        ));
        assert_eq!(
            advance_fulfilment(RequestStatus::Completed, RequestStatus::InProgress),
            Err(TransitionError::AlreadyProcessed(RequestStatus::Completed))
        );
    }

    #[test]
    fn toner_requests_start_open() {
        assert_eq!(initial_status(RequestType::Toner), RequestStatus::Open);
        assert_eq!(
            initial_status(RequestType::Hardware),
            RequestStatus::Submitted
        );
    }
}
