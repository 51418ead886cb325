//! Rich error side channel.
//!
//! A failing call may leave a restricted-error-info object in a
//! thread-local slot; callers that requested capture pick it up with
//! [`take_matching`], which only yields the record when its recorded status
//! matches the failing call's (stale records are discarded).
//!
//! The record object is itself exported through the export layer and
//! implements two interfaces: the restricted-error-info interface
//! (description, restricted description, capability SID, status, reference
//! string) and the language-exception interface, which hands back the
//! identity pointer of a [`LanguageException`] export wrapping the original
//! host error object. A host error that crossed an export thunk and was
//! recaptured therefore round-trips as the *original* error value, not a
//! re-synthesized approximation.

use std::cell::Cell;
use std::error::Error;
use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

use log::debug;
use wren_abi::{hstr, Guid, HResult, HStr, IUnknown, IUnknownVtbl};

use crate::error::{ComError, Result};
use crate::export::{self, ComClass, ComExport, InterfaceEntry, VtblPtr};
use crate::interface::ComInterface;
use crate::reference::ComRef;

/// Restricted-error-info interface identifier
pub const IID_IRESTRICTED_ERROR_INFO: Guid =
    Guid::new(0x82BA7092, 0x4C88, 0x427D, 0xA7BC, 0x16DD93FEB67E);

/// Language-exception interface identifier
pub const IID_ILANGUAGE_EXCEPTION_ERROR_INFO: Guid =
    Guid::new(0x04A2DBF3, 0xDF83, 0x116C, 0x0946, 0x0812ABF6E07D);

#[repr(C)]
pub struct IRestrictedErrorInfoVtbl {
    pub unknown: IUnknownVtbl,
    pub get_error_details: unsafe extern "system" fn(
        this: *mut c_void,
        description: *mut HStr,
        error: *mut HResult,
        restricted_description: *mut HStr,
        capability_sid: *mut HStr,
    ) -> HResult,
    pub get_reference: unsafe extern "system" fn(this: *mut c_void, reference: *mut HStr) -> HResult,
}

#[repr(C)]
pub struct IRestrictedErrorInfo {
    pub vtbl: *const IRestrictedErrorInfoVtbl,
}

unsafe impl ComInterface for IRestrictedErrorInfo {
    type Vtbl = IRestrictedErrorInfoVtbl;
    const IID: Guid = IID_IRESTRICTED_ERROR_INFO;
}

#[repr(C)]
pub struct ILanguageExceptionErrorInfoVtbl {
    pub unknown: IUnknownVtbl,
    pub get_language_exception:
        unsafe extern "system" fn(this: *mut c_void, exception: *mut *mut c_void) -> HResult,
}

#[repr(C)]
pub struct ILanguageExceptionErrorInfo {
    pub vtbl: *const ILanguageExceptionErrorInfoVtbl,
}

unsafe impl ComInterface for ILanguageExceptionErrorInfo {
    type Vtbl = ILanguageExceptionErrorInfoVtbl;
    const IID: Guid = IID_ILANGUAGE_EXCEPTION_ERROR_INFO;
}

/// Details read from a restricted-error-info object
#[derive(Debug, Clone, Default)]
pub struct ErrorDetails {
    pub description: Option<String>,
    pub hresult: HResult,
    pub restricted_description: Option<String>,
    pub capability_sid: Option<String>,
}

/// A captured rich error record.
pub struct ErrorInfo {
    inner: ComRef<IRestrictedErrorInfo>,
}

impl fmt::Debug for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ErrorInfo({:p})", self.inner.as_ptr())
    }
}

/// Take and drop whatever was written to an out-string, success or failure.
unsafe fn take_hstr(slot: &mut HStr) -> Option<String> {
    if slot.is_null() {
        return None;
    }
    let text = String::from_utf16_lossy(hstr::hstr_units(*slot));
    hstr::hstr_release(*slot);
    *slot = std::ptr::null();
    Some(text)
}

impl ErrorInfo {
    pub fn from_reference(inner: ComRef<IRestrictedErrorInfo>) -> ErrorInfo {
        ErrorInfo { inner }
    }

    /// Share the underlying record.
    pub fn clone_ref(&self) -> ErrorInfo {
        ErrorInfo {
            inner: self.inner.clone_ref(),
        }
    }

    pub(crate) fn into_reference(self) -> ComRef<IRestrictedErrorInfo> {
        self.inner
    }

    /// The record's interface pointer, for identity comparisons.
    pub fn as_raw(&self) -> *const c_void {
        self.inner.as_ptr() as *const c_void
    }

    /// Query the record's details.
    pub fn details(&self) -> Result<ErrorDetails> {
        let vtbl = self.inner.vtbl();
        let mut description: HStr = std::ptr::null();
        let mut hresult = HResult::S_OK;
        let mut restricted_description: HStr = std::ptr::null();
        let mut capability_sid: HStr = std::ptr::null();
        let hr = unsafe {
            (vtbl.get_error_details)(
                self.inner.as_ptr() as *mut c_void,
                &mut description,
                &mut hresult,
                &mut restricted_description,
                &mut capability_sid,
            )
        };
        // Own whatever was produced before interpreting the status, so a
        // failing call cannot leak partially-written strings.
        let details = ErrorDetails {
            description: unsafe { take_hstr(&mut description) },
            hresult,
            restricted_description: unsafe { take_hstr(&mut restricted_description) },
            capability_sid: unsafe { take_hstr(&mut capability_sid) },
        };
        crate::error::check(hr)?;
        Ok(details)
    }

    /// The record's reference string, if any.
    pub fn reference_string(&self) -> Result<Option<String>> {
        let vtbl = self.inner.vtbl();
        let mut reference: HStr = std::ptr::null();
        let hr =
            unsafe { (vtbl.get_reference)(self.inner.as_ptr() as *mut c_void, &mut reference) };
        let text = unsafe { take_hstr(&mut reference) };
        crate::error::check(hr)?;
        Ok(text)
    }

    /// Render the most specific description available: restricted
    /// description over description over the stringified status.
    pub fn message(&self, fallback: HResult) -> String {
        match self.details() {
            Ok(details) => details
                .restricted_description
                .or(details.description)
                .unwrap_or_else(|| fallback.to_string()),
            Err(_) => fallback.to_string(),
        }
    }

    /// Recover the original host error object, when this record wraps one
    /// exported by this runtime.
    pub fn language_error(&self) -> Option<Arc<dyn Error + Send + Sync>> {
        let language = self.inner.cast::<ILanguageExceptionErrorInfo>().ok()?;
        let mut out: *mut c_void = std::ptr::null_mut();
        let hr = unsafe {
            (language.vtbl().get_language_exception)(language.as_ptr() as *mut c_void, &mut out)
        };
        if hr.is_failure() {
            return None;
        }
        let ptr = NonNull::new(out as *mut IUnknown)?;
        // The callee handed us an acquired reference.
        let unknown = unsafe { ComRef::<IUnknown>::from_raw(ptr) };
        let exception: &LanguageException = export::downcast_ref(&unknown)?;
        Some(exception.error.clone())
    }
}

// === The exported record ===

/// Wraps a host error object so it can travel with a restricted-error-info
/// record and be recovered on recapture.
pub(crate) struct LanguageException {
    pub(crate) error: Arc<dyn Error + Send + Sync>,
}

impl ComClass for LanguageException {
    fn queriable() -> &'static [InterfaceEntry] {
        &[]
    }

    fn runtime_class_name() -> &'static str {
        "Wren.LanguageException"
    }
}

struct RestrictedErrorRecord {
    hresult: HResult,
    description: Option<String>,
    restricted_description: Option<String>,
    capability_sid: Option<String>,
    reference: Option<String>,
    exception: Option<ComExport<LanguageException>>,
}

static RECORD_RESTRICTED_VTBL: IRestrictedErrorInfoVtbl = IRestrictedErrorInfoVtbl {
    unknown: export::exported_unknown_vtbl(),
    get_error_details: record_get_error_details,
    get_reference: record_get_reference,
};

static RECORD_LANGUAGE_VTBL: ILanguageExceptionErrorInfoVtbl = ILanguageExceptionErrorInfoVtbl {
    unknown: export::exported_unknown_vtbl(),
    get_language_exception: record_get_language_exception,
};

static RECORD_ENTRIES: [InterfaceEntry; 2] = [
    InterfaceEntry::new(
        IID_IRESTRICTED_ERROR_INFO,
        VtblPtr::new(&RECORD_RESTRICTED_VTBL),
    ),
    InterfaceEntry::new(
        IID_ILANGUAGE_EXCEPTION_ERROR_INFO,
        VtblPtr::new(&RECORD_LANGUAGE_VTBL),
    ),
];

impl ComClass for RestrictedErrorRecord {
    fn queriable() -> &'static [InterfaceEntry] {
        &RECORD_ENTRIES
    }

    fn runtime_class_name() -> &'static str {
        "Wren.RestrictedErrorInfo"
    }
}

fn opt_hstr(text: &Option<String>) -> HStr {
    match text {
        Some(text) => hstr::hstr_from_str(text),
        None => std::ptr::null(),
    }
}

unsafe extern "system" fn record_get_error_details(
    this: *mut c_void,
    description: *mut HStr,
    error: *mut HResult,
    restricted_description: *mut HStr,
    capability_sid: *mut HStr,
) -> HResult {
    export::with_this::<RestrictedErrorRecord, _>(this, |record| {
        if description.is_null()
            || error.is_null()
            || restricted_description.is_null()
            || capability_sid.is_null()
        {
            return Err(ComError::from_hresult(HResult::E_POINTER));
        }
        unsafe {
            *description = opt_hstr(&record.description);
            *error = record.hresult;
            *restricted_description = opt_hstr(&record.restricted_description);
            *capability_sid = opt_hstr(&record.capability_sid);
        }
        Ok(())
    })
}

unsafe extern "system" fn record_get_reference(this: *mut c_void, reference: *mut HStr) -> HResult {
    export::with_this::<RestrictedErrorRecord, _>(this, |record| {
        if reference.is_null() {
            return Err(ComError::from_hresult(HResult::E_POINTER));
        }
        unsafe {
            *reference = opt_hstr(&record.reference);
        }
        Ok(())
    })
}

unsafe extern "system" fn record_get_language_exception(
    this: *mut c_void,
    exception: *mut *mut c_void,
) -> HResult {
    export::with_this::<RestrictedErrorRecord, _>(this, |record| {
        if exception.is_null() {
            return Err(ComError::from_hresult(HResult::E_POINTER));
        }
        unsafe {
            *exception = match &record.exception {
                Some(export) => export.to_com().detach().as_ptr() as *mut c_void,
                None => std::ptr::null_mut(),
            };
        }
        Ok(())
    })
}

fn export_record(record: RestrictedErrorRecord) -> Option<ErrorInfo> {
    let export = ComExport::new(record);
    match export.cast::<IRestrictedErrorInfo>() {
        Ok(reference) => Some(ErrorInfo::from_reference(reference)),
        Err(_) => {
            debug_assert!(false, "error record export lost its own interface");
            None
        }
    }
}

// === The thread-local channel ===

thread_local! {
    static CURRENT: Cell<Option<ComRef<IRestrictedErrorInfo>>> = const { Cell::new(None) };
}

/// Replace the slot's record.
pub fn set_error_info(info: Option<ErrorInfo>) {
    CURRENT.with(|cell| cell.set(info.map(ErrorInfo::into_reference)));
}

/// Take the slot's record regardless of its status.
pub fn take_error_info() -> Option<ErrorInfo> {
    CURRENT
        .with(Cell::take)
        .map(ErrorInfo::from_reference)
}

/// Take the slot's record only if it was recorded for `expected`; a stale
/// record is discarded.
pub fn take_matching(expected: HResult) -> Option<ErrorInfo> {
    let info = take_error_info()?;
    match info.details() {
        Ok(details) if details.hresult == expected => Some(info),
        _ => {
            debug!("discarding error info not matching {expected}");
            None
        }
    }
}

/// Publish a fresh record for a failing status. Returns whether a record
/// was stored (success statuses store nothing).
pub fn originate(hresult: HResult, message: &str) -> bool {
    if hresult.is_success() {
        return false;
    }
    let info = export_record(RestrictedErrorRecord {
        hresult,
        description: Some(message.to_string()),
        restricted_description: Some(message.to_string()),
        capability_sid: None,
        reference: None,
        exception: None,
    });
    let stored = info.is_some();
    set_error_info(info);
    stored
}

/// Expose a host error's record on the side channel as it crosses an
/// export thunk: a foreign-originated record is re-exposed as-is, anything
/// else gets a fresh record carrying the error's rendering.
pub(crate) fn publish(err: ComError) {
    let message = err.to_string();
    match err {
        ComError::Fail {
            info: Some(info), ..
        } => set_error_info(Some(info)),
        other => {
            originate(other.hresult(), &message);
        }
    }
}

impl ComError {
    /// Wrap an arbitrary host error so it survives a round-trip across the
    /// boundary: the produced failure carries a record whose
    /// language-exception channel yields back this exact error value.
    pub fn from_error<E>(hresult: HResult, source: E) -> ComError
    where
        E: Error + Send + Sync + 'static,
    {
        debug_assert!(hresult.is_failure(), "wrapping a success status");
        let message = source.to_string();
        let info = export_record(RestrictedErrorRecord {
            hresult,
            description: Some(message.clone()),
            restricted_description: Some(message),
            capability_sid: None,
            reference: None,
            exception: Some(ComExport::new(LanguageException {
                error: Arc::new(source),
            })),
        });
        ComError::Fail { hresult, info }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_originate_and_take_matching() {
        assert!(originate(HResult::E_FAIL, "it broke"));
        let info = take_matching(HResult::E_FAIL).expect("record should match");
        let details = info.details().unwrap();
        assert_eq!(details.hresult, HResult::E_FAIL);
        assert_eq!(details.restricted_description.as_deref(), Some("it broke"));
        // The slot is drained.
        assert!(take_error_info().is_none());
    }

    #[test]
    fn test_take_matching_discards_stale_record() {
        assert!(originate(HResult::E_FAIL, "old failure"));
        assert!(take_matching(HResult::E_BOUNDS).is_none());
        assert!(take_error_info().is_none());
    }

    #[test]
    fn test_originate_ignores_success() {
        assert!(!originate(HResult::S_OK, "not an error"));
        assert!(take_error_info().is_none());
    }

    #[test]
    fn test_message_prefers_restricted_description() {
        let info = export_record(RestrictedErrorRecord {
            hresult: HResult::E_FAIL,
            description: Some("generic".into()),
            restricted_description: Some("specific".into()),
            capability_sid: None,
            reference: None,
            exception: None,
        })
        .unwrap();
        assert_eq!(info.message(HResult::E_FAIL), "specific");

        let info = export_record(RestrictedErrorRecord {
            hresult: HResult::E_FAIL,
            description: Some("generic".into()),
            restricted_description: None,
            capability_sid: None,
            reference: None,
            exception: None,
        })
        .unwrap();
        assert_eq!(info.message(HResult::E_FAIL), "generic");

        let info = export_record(RestrictedErrorRecord {
            hresult: HResult::E_FAIL,
            description: None,
            restricted_description: None,
            capability_sid: None,
            reference: None,
            exception: None,
        })
        .unwrap();
        assert_eq!(info.message(HResult::E_FAIL), "0x80004005");
    }

    #[test]
    fn test_reference_string_round_trip() {
        let info = export_record(RestrictedErrorRecord {
            hresult: HResult::E_FAIL,
            description: None,
            restricted_description: None,
            capability_sid: None,
            reference: Some("stowed frame".into()),
            exception: None,
        })
        .unwrap();
        assert_eq!(
            info.reference_string().unwrap().as_deref(),
            Some("stowed frame")
        );
    }
}
