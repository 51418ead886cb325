//! Boundary failure taxonomy and status interpretation.
//!
//! Every foreign call returns a status code; this module decides
//! success/failure and, on failure, which error to surface:
//!
//! - `NoSuchInterface` - a query for an unimplemented interface. Always
//!   recoverable; probing code paths treat it as "capability absent".
//! - `Fail` - any other non-success status, optionally carrying the rich
//!   error record captured from the side channel.
//!
//! Capture is explicit: [`check`] interprets the status alone (internal
//! calls), [`check_captured`] additionally consults the thread-local rich
//! error record (user-facing wrapped calls).

use std::fmt;

use wren_abi::{Guid, HResult};

use crate::error_info::ErrorInfo;

/// Result alias for all boundary operations
pub type Result<T, E = ComError> = std::result::Result<T, E>;

/// A failure surfaced at the foreign boundary.
///
/// Display is computed, not static: rendering prefers the captured record's
/// restricted description over its description over the stringified status,
/// so the impls are written out instead of derived.
#[derive(Debug)]
pub enum ComError {
    /// The object does not implement the requested interface.
    ///
    /// Expected in interface-probing code; callers usually treat it as
    /// "capability absent" rather than a hard error.
    NoSuchInterface { iid: Guid },

    /// A foreign call returned a non-success status.
    ///
    /// Carries the rich error record when capture was requested and a
    /// matching record was found on the side channel.
    Fail {
        hresult: HResult,
        info: Option<ErrorInfo>,
    },
}

impl fmt::Display for ComError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComError::NoSuchInterface { iid } => write!(f, "no such interface: {iid}"),
            // The most specific rendering available: the record's
            // restricted description, then its description, then the code.
            ComError::Fail {
                hresult,
                info: Some(info),
            } => write!(f, "{}", info.message(*hresult)),
            ComError::Fail {
                hresult,
                info: None,
            } => write!(f, "{hresult}"),
        }
    }
}

impl std::error::Error for ComError {}

impl ComError {
    /// Wrap a failing status without consulting the side channel.
    pub fn from_hresult(hresult: HResult) -> ComError {
        debug_assert!(hresult.is_failure(), "wrapping a success status");
        ComError::Fail {
            hresult,
            info: None,
        }
    }

    /// Wrap a failing status, capturing the matching rich error record from
    /// the side channel if one is present.
    pub fn with_capture(hresult: HResult) -> ComError {
        debug_assert!(hresult.is_failure(), "wrapping a success status");
        ComError::Fail {
            hresult,
            info: crate::error_info::take_matching(hresult),
        }
    }

    /// The status code this failure crosses the boundary as.
    pub fn hresult(&self) -> HResult {
        match self {
            ComError::NoSuchInterface { .. } => HResult::E_NOINTERFACE,
            ComError::Fail { hresult, .. } => *hresult,
        }
    }

    /// Whether this is the recoverable interface-probing miss.
    pub fn is_no_such_interface(&self) -> bool {
        matches!(self, ComError::NoSuchInterface { .. })
    }

    /// The captured rich error record, if any.
    pub fn info(&self) -> Option<&ErrorInfo> {
        match self {
            ComError::Fail { info, .. } => info.as_ref(),
            ComError::NoSuchInterface { .. } => None,
        }
    }
}

/// Interpret a status code without rich error capture.
pub fn check(hresult: HResult) -> Result<()> {
    if hresult.is_success() {
        Ok(())
    } else {
        Err(ComError::from_hresult(hresult))
    }
}

/// Interpret a status code, capturing rich error info on failure.
pub fn check_captured(hresult: HResult) -> Result<()> {
    if hresult.is_success() {
        Ok(())
    } else {
        Err(ComError::with_capture(hresult))
    }
}
