//! Marshaling across a real dispatch: array parameters and
//! cleanup-on-failure for owned conversions.

mod common;

use std::ffi::c_void;
use std::sync::atomic::{AtomicU32, Ordering};

use common::{ITestSink, MockSink};
use wren_abi::HResult;
use wren_com::{check, AbiArray, ComRef, InGuard, Projection, ProjectionKind};

#[test]
fn test_array_in_parameter_is_length_then_pointer() {
    let sink = MockSink::new();
    let reference = unsafe { ComRef::<ITestSink>::from_borrowed(sink.as_sink()) };

    let array = AbiArray::<wren_com::marshal::Int32Projection>::from_hosts(&[1, 2, 3]);
    let mut sum = 0i32;
    let hr = unsafe {
        (reference.vtbl().sum_array)(
            reference.as_ptr() as *mut c_void,
            array.len(),
            array.as_ptr(),
            &mut sum,
        )
    };
    check(hr).unwrap();

    // The dispatched call received length 3 and the 3 values in order.
    assert_eq!(sink.received(), vec![1, 2, 3]);
    assert_eq!(sum, 6);

    drop(reference);
    assert!(sink.balanced());
}

// Owned projection with an instrumented release counter; the release must
// run exactly once regardless of call outcome.
static GUARD_RELEASES: AtomicU32 = AtomicU32::new(0);

enum CountedProjection {}

impl Projection for CountedProjection {
    type Host = u32;
    type Abi = u32;
    const KIND: ProjectionKind = ProjectionKind::Owned;

    fn abi_default() -> u32 {
        0
    }

    fn to_abi(host: &u32) -> u32 {
        *host
    }

    fn from_abi(abi: u32) -> u32 {
        abi
    }

    fn release_abi(abi: &mut u32) {
        if *abi != 0 {
            GUARD_RELEASES.fetch_add(1, Ordering::SeqCst);
            *abi = 0;
        }
    }
}

#[test]
fn test_owned_in_parameter_released_exactly_once_on_failure() {
    let sink = MockSink::new();
    let reference = unsafe { ComRef::<ITestSink>::from_borrowed(sink.as_sink()) };

    GUARD_RELEASES.store(0, Ordering::SeqCst);
    let outcome = {
        let guard = InGuard::<CountedProjection>::new(&41);
        let hr = unsafe {
            (reference.vtbl().fail_with)(reference.as_ptr() as *mut c_void, HResult::E_FAIL)
        };
        assert_eq!(guard.abi(), 41);
        check(hr)
        // guard drops here, after the failed call
    };
    assert!(outcome.is_err());
    assert_eq!(GUARD_RELEASES.load(Ordering::SeqCst), 1);
}

#[test]
fn test_owned_in_parameter_released_exactly_once_on_success() {
    let sink = MockSink::new();
    let reference = unsafe { ComRef::<ITestSink>::from_borrowed(sink.as_sink()) };

    GUARD_RELEASES.store(0, Ordering::SeqCst);
    {
        let guard = InGuard::<CountedProjection>::new(&41);
        let hr = unsafe {
            (reference.vtbl().fail_with)(reference.as_ptr() as *mut c_void, HResult::S_OK)
        };
        assert_eq!(guard.abi(), 41);
        check(hr).unwrap();
    }
    assert_eq!(GUARD_RELEASES.load(Ordering::SeqCst), 1);
}

#[test]
fn test_interface_projection_balances_references() {
    let sink = MockSink::new();
    let reference = unsafe { ComRef::<ITestSink>::from_borrowed(sink.as_sink()) };
    let host = Some(reference);

    {
        // Passing an interface as an owned "in" parameter acquires a
        // reference for the callee and releases it after the call.
        let guard = InGuard::<wren_com::marshal::InterfaceProjection<ITestSink>>::new(&host);
        assert!(!guard.abi().is_null());
    }

    drop(host);
    assert!(sink.balanced());
}
