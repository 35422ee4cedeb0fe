//! Decision-loop trigger matrices and outcome types.
//!
//! The scheduler owns *when* to await a response (it needs the command
//! queue and the in-flight layer state); this module owns *whether* a
//! gate should fire at all, kept pure so the trigger matrices are
//! independently testable.

use crate::config::{AilDecisionPoint, HilApprovalRequired};

pub fn ail_should_trigger(point: AilDecisionPoint, layer_had_error: bool) -> bool {
    match point {
        AilDecisionPoint::PerLayer => true,
        AilDecisionPoint::OnError => layer_had_error,
        AilDecisionPoint::Manual => false,
    }
}

pub fn hil_should_trigger(required: HilApprovalRequired, layer_has_side_effects: bool) -> bool {
    match required {
        HilApprovalRequired::Always => true,
        HilApprovalRequired::CriticalOnly => layer_has_side_effects,
        HilApprovalRequired::Never => false,
    }
}

#[derive(Debug)]
pub enum AilOutcome {
    Continue,
    Abort { reason: String },
    Replanned { noop: bool },
}

#[derive(Debug)]
pub enum HilOutcome {
    Approved { feedback: Option<String> },
    Rejected { feedback: Option<String> },
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct EscalationOutcome {
    pub task_id: String,
    pub approved: bool,
    pub elevated_permissions: Vec<String>,
}
