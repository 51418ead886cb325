//! 32-bit status codes.
//!
//! Every call across the boundary returns an [`HResult`]; real return
//! values travel through a trailing out-parameter. Non-negative values
//! denote success, negative values denote failure.

use std::fmt;

/// Signed 32-bit status code returned by every foreign call.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HResult(pub i32);

static_assertions::const_assert_eq!(std::mem::size_of::<HResult>(), 4);

impl HResult {
    /// Success
    pub const S_OK: HResult = HResult(0);
    /// Success carrying a boolean "false"
    pub const S_FALSE: HResult = HResult(1);
    /// Not implemented
    pub const E_NOTIMPL: HResult = HResult(0x8000_4001_u32 as i32);
    /// The object does not implement the requested interface
    pub const E_NOINTERFACE: HResult = HResult(0x8000_4002_u32 as i32);
    /// Invalid pointer argument
    pub const E_POINTER: HResult = HResult(0x8000_4003_u32 as i32);
    /// Operation aborted
    pub const E_ABORT: HResult = HResult(0x8000_4004_u32 as i32);
    /// Unspecified failure
    pub const E_FAIL: HResult = HResult(0x8000_4005_u32 as i32);
    /// Catastrophic/internal failure
    pub const E_UNEXPECTED: HResult = HResult(0x8000_FFFF_u32 as i32);
    /// Out of memory
    pub const E_OUTOFMEMORY: HResult = HResult(0x8007_000E_u32 as i32);
    /// Invalid argument value
    pub const E_INVALIDARG: HResult = HResult(0x8007_0057_u32 as i32);
    /// Index outside valid range
    pub const E_BOUNDS: HResult = HResult(0x8000_000B_u32 as i32);
    /// Method called in an illegal state
    pub const E_ILLEGAL_METHOD_CALL: HResult = HResult(0x8000_000E_u32 as i32);
    /// State changed during a call that forbids it
    pub const E_CHANGED_STATE: HResult = HResult(0x8000_000C_u32 as i32);
    /// Object has been closed
    pub const RO_E_CLOSED: HResult = HResult(0x8000_0013_u32 as i32);
    /// Activatable class name is not registered
    pub const REGDB_E_CLASSNOTREG: HResult = HResult(0x8004_0154_u32 as i32);

    /// Zero or positive denotes success
    #[inline]
    pub const fn is_success(self) -> bool {
        self.0 >= 0
    }

    /// Negative denotes failure
    #[inline]
    pub const fn is_failure(self) -> bool {
        self.0 < 0
    }
}

impl From<i32> for HResult {
    fn from(value: i32) -> Self {
        HResult(value)
    }
}

impl From<HResult> for i32 {
    fn from(value: HResult) -> Self {
        value.0
    }
}

impl fmt::Display for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010X}", self.0 as u32)
    }
}

impl fmt::Debug for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HResult({:#010X})", self.0 as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_convention() {
        assert!(HResult::S_OK.is_success());
        assert!(HResult::S_FALSE.is_success());
        assert!(HResult(i32::MAX).is_success());
        assert!(HResult::E_FAIL.is_failure());
        assert!(HResult(i32::MIN).is_failure());
        assert!(!HResult::E_NOINTERFACE.is_success());
    }

    #[test]
    fn test_display_is_hex() {
        assert_eq!(HResult::E_FAIL.to_string(), "0x80004005");
        assert_eq!(HResult::S_OK.to_string(), "0x00000000");
        assert_eq!(HResult::E_NOINTERFACE.to_string(), "0x80004002");
    }

    #[test]
    fn test_well_known_values() {
        assert_eq!(HResult::E_POINTER.0 as u32, 0x8000_4003);
        assert_eq!(HResult::E_UNEXPECTED.0 as u32, 0x8000_FFFF);
        assert_eq!(HResult::REGDB_E_CLASSNOTREG.0 as u32, 0x8004_0154);
    }
}
