//! Shared fixtures for the interop runtime tests.
//!
//! Foreign objects are simulated with hand-built `#[repr(C)]` vtable
//! fixtures whose reference-count slots are instrumented counters; a mock
//! framework cannot produce ABI-compatible function tables, so these are
//! assembled by hand the way foreign code would lay them out.

#![allow(dead_code)]

use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use wren_abi::{Guid, HResult, IUnknown, IUnknownVtbl};
use wren_com::{ComInterface, IID_IUNKNOWN};

// === Instrumented foreign object ===

/// A "foreign" object implementing only the identity interface, counting
/// every acquire and release issued against it. It is owned by the test
/// (releases never free), so counter state survives the object's last
/// foreign reference.
#[repr(C)]
pub struct MockForeign {
    vtbl: *const IUnknownVtbl,
    acquires: AtomicU32,
    releases: AtomicU32,
}

static MOCK_FOREIGN_VTBL: IUnknownVtbl = IUnknownVtbl {
    query_interface: mock_query_interface,
    add_ref: mock_add_ref,
    release: mock_release,
};

unsafe extern "system" fn mock_query_interface(
    this: *mut c_void,
    iid: *const Guid,
    out: *mut *mut c_void,
) -> HResult {
    if *iid == IID_IUNKNOWN {
        mock_add_ref(this);
        *out = this;
        HResult::S_OK
    } else {
        *out = std::ptr::null_mut();
        HResult::E_NOINTERFACE
    }
}

unsafe extern "system" fn mock_add_ref(this: *mut c_void) -> u32 {
    let mock = &*(this as *const MockForeign);
    mock.acquires.fetch_add(1, Ordering::SeqCst) + 2
}

unsafe extern "system" fn mock_release(this: *mut c_void) -> u32 {
    let mock = &*(this as *const MockForeign);
    mock.releases.fetch_add(1, Ordering::SeqCst);
    1
}

impl MockForeign {
    pub fn new() -> Box<MockForeign> {
        Box::new(MockForeign {
            vtbl: &MOCK_FOREIGN_VTBL,
            acquires: AtomicU32::new(0),
            releases: AtomicU32::new(0),
        })
    }

    pub fn as_unknown(&self) -> NonNull<IUnknown> {
        NonNull::from(self).cast()
    }

    pub fn acquires(&self) -> u32 {
        self.acquires.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> u32 {
        self.releases.load(Ordering::SeqCst)
    }

    /// Every acquire issued by host code was balanced by a release.
    pub fn balanced(&self) -> bool {
        self.acquires() == self.releases()
    }
}

// === Test sink interface ===

pub const IID_ITEST_SINK: Guid = Guid::new(0x0D96A1B4, 0x6E3F, 0x47C2, 0x8D5A, 0x2B91C40F77E1);

/// Vtable of a foreign interface taking an array parameter and a
/// deliberately failing method.
#[repr(C)]
pub struct ITestSinkVtbl {
    pub unknown: IUnknownVtbl,
    pub sum_array: unsafe extern "system" fn(
        this: *mut c_void,
        len: u32,
        data: *const i32,
        sum: *mut i32,
    ) -> HResult,
    pub fail_with: unsafe extern "system" fn(this: *mut c_void, code: HResult) -> HResult,
}

#[repr(C)]
pub struct ITestSink {
    pub vtbl: *const ITestSinkVtbl,
}

unsafe impl ComInterface for ITestSink {
    type Vtbl = ITestSinkVtbl;
    const IID: Guid = IID_ITEST_SINK;
}

/// Foreign implementation of [`ITestSink`] recording what it receives.
#[repr(C)]
pub struct MockSink {
    vtbl: *const ITestSinkVtbl,
    acquires: AtomicU32,
    releases: AtomicU32,
    received: Mutex<Vec<i32>>,
}

static MOCK_SINK_VTBL: ITestSinkVtbl = ITestSinkVtbl {
    unknown: IUnknownVtbl {
        query_interface: sink_query_interface,
        add_ref: sink_add_ref,
        release: sink_release,
    },
    sum_array: sink_sum_array,
    fail_with: sink_fail_with,
};

unsafe extern "system" fn sink_query_interface(
    this: *mut c_void,
    iid: *const Guid,
    out: *mut *mut c_void,
) -> HResult {
    if *iid == IID_IUNKNOWN || *iid == IID_ITEST_SINK {
        sink_add_ref(this);
        *out = this;
        HResult::S_OK
    } else {
        *out = std::ptr::null_mut();
        HResult::E_NOINTERFACE
    }
}

unsafe extern "system" fn sink_add_ref(this: *mut c_void) -> u32 {
    let sink = &*(this as *const MockSink);
    sink.acquires.fetch_add(1, Ordering::SeqCst) + 2
}

unsafe extern "system" fn sink_release(this: *mut c_void) -> u32 {
    let sink = &*(this as *const MockSink);
    sink.releases.fetch_add(1, Ordering::SeqCst);
    1
}

unsafe extern "system" fn sink_sum_array(
    this: *mut c_void,
    len: u32,
    data: *const i32,
    sum: *mut i32,
) -> HResult {
    let sink = &*(this as *const MockSink);
    let elements = if data.is_null() {
        &[]
    } else {
        std::slice::from_raw_parts(data, len as usize)
    };
    *sink.received.lock().unwrap() = elements.to_vec();
    *sum = elements.iter().sum();
    HResult::S_OK
}

unsafe extern "system" fn sink_fail_with(_this: *mut c_void, code: HResult) -> HResult {
    code
}

impl MockSink {
    pub fn new() -> Box<MockSink> {
        Box::new(MockSink {
            vtbl: &MOCK_SINK_VTBL,
            acquires: AtomicU32::new(0),
            releases: AtomicU32::new(0),
            received: Mutex::new(Vec::new()),
        })
    }

    pub fn as_sink(&self) -> NonNull<ITestSink> {
        NonNull::from(self).cast()
    }

    pub fn received(&self) -> Vec<i32> {
        self.received.lock().unwrap().clone()
    }

    pub fn balanced(&self) -> bool {
        self.acquires.load(Ordering::SeqCst) == self.releases.load(Ordering::SeqCst)
    }
}
