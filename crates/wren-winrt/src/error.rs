//! Capture-aware status interpretation.
//!
//! Internal calls interpret statuses with [`wren_com::check`] (no side
//! channel lookup); user-facing wrapped calls go through
//! [`throw_if_failed`], which captures the matching rich error record.

use wren_abi::HResult;
use wren_com::Result;

/// Interpret a user-facing call's status, capturing rich error info on
/// failure.
pub fn throw_if_failed(hresult: HResult) -> Result<()> {
    wren_com::check_captured(hresult)
}

/// Publish a rich error record for a failing status, to be picked up by
/// the next captured interpretation on this thread. Returns whether a
/// record was stored.
pub fn originate(hresult: HResult, message: &str) -> bool {
    wren_com::error_info::originate(hresult, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throw_if_failed_picks_up_originated_record() {
        assert!(originate(HResult::E_ILLEGAL_METHOD_CALL, "stream already closed"));
        let err = throw_if_failed(HResult::E_ILLEGAL_METHOD_CALL).unwrap_err();
        assert_eq!(err.to_string(), "stream already closed");
    }

    #[test]
    fn test_success_ignores_the_channel() {
        originate(HResult::E_FAIL, "stale");
        assert!(throw_if_failed(HResult::S_OK).is_ok());
        // Drain the stale record.
        let _ = wren_com::error_info::take_error_info();
    }
}
