//! Two-way export behavior: identity rule, query transitivity, derived
//! interface chains, overrides, and reference-count effects of probing.

use std::ffi::c_void;
use std::sync::atomic::{AtomicU32, Ordering};

use wren_abi::{Guid, HResult, IUnknownVtbl};
use wren_com::export::{exported_unknown_vtbl, with_this};
use wren_com::{ComClass, ComExport, ComInterface, InterfaceEntry, VtblPtr};

// === Test interfaces ===

const IID_ICOM_TEST: Guid = Guid::new(0x21A77C43, 0x0B19, 0x4E7F, 0x9DD0, 0x3A4E8C115B02);
const IID_ICOM_TEST2: Guid = Guid::new(0x5F0ECD2A, 0x91B6, 0x4A0D, 0xB63C, 0x7E88F2D4A913);
const IID_IBASE: Guid = Guid::new(0x7C41E960, 0x2D55, 0x4B8A, 0x8E1F, 0x60A3B7C9D024);
const IID_IDERIVED: Guid = Guid::new(0x93D25F81, 0x6A0C, 0x4F3B, 0xA75E, 0x14B8D6E0F135);

#[repr(C)]
struct IComTestVtbl {
    unknown: IUnknownVtbl,
    com_test: unsafe extern "system" fn(this: *mut c_void) -> HResult,
}

#[repr(C)]
struct IComTest {
    vtbl: *const IComTestVtbl,
}

unsafe impl ComInterface for IComTest {
    type Vtbl = IComTestVtbl;
    const IID: Guid = IID_ICOM_TEST;
}

#[repr(C)]
struct IComTest2 {
    vtbl: *const IComTestVtbl,
}

unsafe impl ComInterface for IComTest2 {
    type Vtbl = IComTestVtbl;
    const IID: Guid = IID_ICOM_TEST2;
}

// Derived extends Base with one extra method; its vtable carries the base
// slots first.
#[repr(C)]
struct IBaseVtbl {
    unknown: IUnknownVtbl,
    base_method: unsafe extern "system" fn(this: *mut c_void) -> HResult,
}

#[repr(C)]
struct IBase {
    vtbl: *const IBaseVtbl,
}

unsafe impl ComInterface for IBase {
    type Vtbl = IBaseVtbl;
    const IID: Guid = IID_IBASE;
}

#[repr(C)]
struct IDerivedVtbl {
    base: IBaseVtbl,
    derived_method: unsafe extern "system" fn(this: *mut c_void) -> HResult,
}

#[repr(C)]
struct IDerived {
    vtbl: *const IDerivedVtbl,
}

unsafe impl ComInterface for IDerived {
    type Vtbl = IDerivedVtbl;
    const IID: Guid = IID_IDERIVED;
}

// === Exported host object ===

struct TestObject {
    calls: AtomicU32,
}

impl TestObject {
    fn new() -> TestObject {
        TestObject {
            calls: AtomicU32::new(0),
        }
    }
}

unsafe extern "system" fn test_com_test(this: *mut c_void) -> HResult {
    with_this::<TestObject, _>(this, |object| {
        object.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
}

static COM_TEST_VTBL: IComTestVtbl = IComTestVtbl {
    unknown: exported_unknown_vtbl(),
    com_test: test_com_test,
};

static TEST_OBJECT_ENTRIES: [InterfaceEntry; 2] = [
    InterfaceEntry::new(IID_ICOM_TEST, VtblPtr::new(&COM_TEST_VTBL)),
    InterfaceEntry::new(IID_ICOM_TEST2, VtblPtr::new(&COM_TEST_VTBL)),
];

impl ComClass for TestObject {
    fn queriable() -> &'static [InterfaceEntry] {
        &TEST_OBJECT_ENTRIES
    }

    fn runtime_class_name() -> &'static str {
        "Wren.Test.TestObject"
    }
}

// === Tests ===

#[test]
fn test_identity_rule() {
    let export = ComExport::new(TestObject::new());
    let com_test = export.cast::<IComTest>().unwrap();
    let com_test2 = export.cast::<IComTest2>().unwrap();

    let unknown1 = com_test
        .as_interop()
        .query_interface(&wren_com::IID_IUNKNOWN)
        .unwrap();
    let unknown2 = com_test2
        .as_interop()
        .query_interface(&wren_com::IID_IUNKNOWN)
        .unwrap();
    assert_eq!(unknown1.as_ptr(), unknown2.as_ptr());
}

#[test]
fn test_query_interface_transitivity() {
    let export = ComExport::new(TestObject::new());
    let unknown = export.query(&wren_com::IID_IUNKNOWN).unwrap();
    let com_test = export.query(&IID_ICOM_TEST).unwrap();
    let com_test2 = export.query(&IID_ICOM_TEST2).unwrap();

    // Queries succeed from and to every pair of implemented interfaces,
    // and re-querying the origin yields an identity-equal pointer.
    for reference in [&unknown, &com_test, &com_test2] {
        for iid in [&wren_com::IID_IUNKNOWN, &IID_ICOM_TEST, &IID_ICOM_TEST2] {
            let queried = reference.as_interop().query_interface(iid).unwrap();
            let round_trip = queried
                .as_interop()
                .query_interface(&wren_com::IID_IUNKNOWN)
                .unwrap();
            let direct = export.query(&wren_com::IID_IUNKNOWN).unwrap();
            assert_eq!(round_trip.as_ptr(), direct.as_ptr());
        }
    }
}

#[test]
fn test_missing_interface_is_recoverable_and_count_neutral() {
    let export = ComExport::new(TestObject::new());
    let before = export.ref_count();

    let missing = Guid::new(0xDEADBEEF, 0x0000, 0x0000, 0x0000, 0x000000000001);
    let err = export.query(&missing).unwrap_err();
    assert!(err.is_no_such_interface());
    assert_eq!(err.hresult(), HResult::E_NOINTERFACE);
    assert_eq!(export.ref_count(), before);
}

#[test]
fn test_derived_then_base_query_matches_direct_base_query() {
    // Host object exporting {Base, Derived} where Derived extends Base.
    struct Shape;

    unsafe extern "system" fn shape_noop(_this: *mut c_void) -> HResult {
        HResult::S_OK
    }

    static BASE_VTBL: IBaseVtbl = IBaseVtbl {
        unknown: exported_unknown_vtbl(),
        base_method: shape_noop,
    };

    static DERIVED_VTBL: IDerivedVtbl = IDerivedVtbl {
        base: IBaseVtbl {
            unknown: exported_unknown_vtbl(),
            base_method: shape_noop,
        },
        derived_method: shape_noop,
    };

    static SHAPE_ENTRIES: [InterfaceEntry; 2] = [
        InterfaceEntry::new(IID_IDERIVED, VtblPtr::new(&DERIVED_VTBL)),
        InterfaceEntry::new(IID_IBASE, VtblPtr::new(&BASE_VTBL)),
    ];

    impl ComClass for Shape {
        fn queriable() -> &'static [InterfaceEntry] {
            &SHAPE_ENTRIES
        }
    }

    let export = ComExport::new(Shape);
    let derived = export.cast::<IDerived>().unwrap();
    let base_via_derived = derived.as_interop().query_interface(&IID_IBASE).unwrap();
    let base_direct = export.query(&IID_IBASE).unwrap();
    assert_eq!(base_via_derived.as_ptr(), base_direct.as_ptr());

    // And the identity rule holds across the chain.
    let identity_via_base = base_via_derived
        .as_interop()
        .query_interface(&wren_com::IID_IUNKNOWN)
        .unwrap();
    let identity_direct = export.query(&wren_com::IID_IUNKNOWN).unwrap();
    assert_eq!(identity_via_base.as_ptr(), identity_direct.as_ptr());
}

#[test]
fn test_secondary_interface_dispatch_reaches_the_host_object() {
    let export = ComExport::new(TestObject::new());
    let com_test = export.cast::<IComTest>().unwrap();
    assert_eq!(export.as_object().calls.load(Ordering::SeqCst), 0);

    let hr = unsafe { (com_test.vtbl().com_test)(com_test.as_ptr() as *mut c_void) };
    assert!(hr.is_success());
    assert_eq!(export.as_object().calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_override_is_consulted_before_the_declared_set() {
    struct Overriding {
        calls: AtomicU32,
    }

    unsafe extern "system" fn overriding_com_test(this: *mut c_void) -> HResult {
        with_this::<Overriding, _>(this, |object| {
            object.calls.fetch_add(100, Ordering::SeqCst);
            Ok(())
        })
    }

    unsafe extern "system" fn default_com_test(this: *mut c_void) -> HResult {
        with_this::<Overriding, _>(this, |object| {
            object.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    static OVERRIDE_VTBL: IComTestVtbl = IComTestVtbl {
        unknown: exported_unknown_vtbl(),
        com_test: overriding_com_test,
    };

    static DEFAULT_VTBL: IComTestVtbl = IComTestVtbl {
        unknown: exported_unknown_vtbl(),
        com_test: default_com_test,
    };

    static OVERRIDE_ENTRIES: [InterfaceEntry; 1] =
        [InterfaceEntry::new(IID_ICOM_TEST, VtblPtr::new(&OVERRIDE_VTBL))];
    static DEFAULT_ENTRIES: [InterfaceEntry; 1] =
        [InterfaceEntry::new(IID_ICOM_TEST, VtblPtr::new(&DEFAULT_VTBL))];

    impl ComClass for Overriding {
        fn queriable() -> &'static [InterfaceEntry] {
            &DEFAULT_ENTRIES
        }

        fn overrides(&self) -> &'static [InterfaceEntry] {
            &OVERRIDE_ENTRIES
        }
    }

    let export = ComExport::new(Overriding {
        calls: AtomicU32::new(0),
    });
    let com_test = export.cast::<IComTest>().unwrap();
    let hr = unsafe { (com_test.vtbl().com_test)(com_test.as_ptr() as *mut c_void) };
    assert!(hr.is_success());
    // The most-derived override answered the query.
    assert_eq!(export.as_object().calls.load(Ordering::SeqCst), 100);
}

#[test]
fn test_reference_count_lifecycle() {
    let export = ComExport::new(TestObject::new());
    assert_eq!(export.ref_count(), 1);

    let com = export.to_com();
    assert_eq!(export.ref_count(), 2);
    let queried = export.query(&IID_ICOM_TEST).unwrap();
    assert_eq!(export.ref_count(), 3);

    drop(com);
    drop(queried);
    assert_eq!(export.ref_count(), 1);
}

#[test]
fn test_downcast_recovers_the_host_object() {
    let export = ComExport::new(TestObject::new());
    let unknown = export.query(&wren_com::IID_IUNKNOWN).unwrap();

    let recovered: &TestObject = wren_com::export::downcast_ref(&unknown).unwrap();
    recovered.calls.fetch_add(7, Ordering::SeqCst);
    assert_eq!(export.as_object().calls.load(Ordering::SeqCst), 7);

    // A different wrapped type does not answer.
    struct Other;
    impl ComClass for Other {
        fn queriable() -> &'static [InterfaceEntry] {
            &[]
        }
    }
    assert!(wren_com::export::downcast_ref::<Other, _>(&unknown).is_none());
}

#[test]
fn test_null_this_in_a_thunk_is_answered_with_pointer_error() {
    // Defensive path: release builds answer the status instead of faulting.
    if cfg!(debug_assertions) {
        return;
    }
    let hr = with_this::<TestObject, _>(std::ptr::null_mut(), |_| Ok(()));
    assert_eq!(hr, HResult::E_POINTER);
}
