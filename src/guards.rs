//! Fail-fast assertion used by guards and inline validation.

use crate::error::PipelineError;
use std::fmt::Display;

/// Raise `GuardViolation` with `message` when `condition` is false.
///
/// Signals caller error (bad arguments, unmet protocol precondition), not a
/// branch of normal control flow.
pub fn ensure(condition: bool, message: impl Into<String>) -> Result<(), PipelineError> {
    if condition {
        Ok(())
    } else {
        Err(PipelineError::guard(message, None))
    }
}

/// Like [`ensure`], attaching the offending value (an address, a quantity).
pub fn ensure_with<C: Display>(
    condition: bool,
    message: impl Into<String>,
    context: C,
) -> Result<(), PipelineError> {
    if condition {
        Ok(())
    } else {
        Err(PipelineError::guard(message, Some(context.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Address;

    #[test]
    fn test_ensure_passes() {
        assert!(ensure(true, "unused").is_ok());
    }

    #[test]
    fn test_ensure_fails_with_message() {
        match ensure(false, "No frozen ether to thaw") {
            Err(PipelineError::GuardViolation { message, context }) => {
                assert_eq!(message, "No frozen ether to thaw");
                assert!(context.is_none());
            }
            other => panic!("Expected GuardViolation, got {:?}", other),
        }
    }

    #[test]
    fn test_ensure_with_context() {
        let spender = Address::ZERO;
        match ensure_with(!spender.is_zero(), "Spender is not an address", spender) {
            Err(PipelineError::GuardViolation { context, .. }) => {
                assert_eq!(context.as_deref(), Some(spender.to_string().as_str()));
            }
            other => panic!("Expected GuardViolation, got {:?}", other),
        }
    }
}
