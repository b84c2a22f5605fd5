//! Location-path utility helpers.

use crate::types::{PathStep, StepKind};

/// Convert parsed steps back to path text.
pub fn path_to_string(steps: &[PathStep]) -> String {
    let mut out = String::new();
    for (i, step) in steps.iter().enumerate() {
        match step.kind {
            StepKind::FromRoot => {
                out.push('/');
                continue;
            }
            _ => {
                if i > 0 && !out.ends_with('/') {
                    out.push('/');
                }
            }
        }
        out.push_str(&step_to_string(step));
    }
    out
}

/// Text of one step, including its predicates and trailing value.
pub fn step_to_string(step: &PathStep) -> String {
    let mut out = match step.kind {
        StepKind::AllDescendants => "...".to_string(),
        _ => step.name.clone(),
    };
    for predicate in &step.predicates {
        out.push('[');
        out.push_str(predicate);
        out.push(']');
    }
    if let Some(value) = &step.value {
        out.push('=');
        out.push_str(value);
    }
    out
}
