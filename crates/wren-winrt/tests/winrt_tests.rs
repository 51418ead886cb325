//! WinRT layer behavior: introspection through real exports, activation
//! factories, and the memoized factory slot under concurrent first use.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;

use wren_abi::{Guid, HResult, IInspectable, IInspectableVtbl};
use wren_com::export::exported_inspectable_vtbl;
use wren_com::{ComClass, ComExport, ComRef, InterfaceEntry, TrustLevel, VtblPtr};
use wren_winrt::{
    get_activation_factory, register_activatable_class, FactoryCache, InspectableInterop,
};

// A WinRT-flavored interface with no methods of its own: its vtable is the
// six-slot introspection prefix.
const IID_IWIDGET: Guid = Guid::new(0xE4B82A57, 0x19C3, 0x4D6E, 0x8F20, 0x7A5D91B36C48);

static WIDGET_VTBL: IInspectableVtbl = exported_inspectable_vtbl();

static WIDGET_ENTRIES: [InterfaceEntry; 1] =
    [InterfaceEntry::new(IID_IWIDGET, VtblPtr::new(&WIDGET_VTBL))];

struct Widget;

impl ComClass for Widget {
    fn queriable() -> &'static [InterfaceEntry] {
        &WIDGET_ENTRIES
    }

    fn runtime_class_name() -> &'static str {
        "Wren.Test.Widget"
    }

    fn trust_level() -> TrustLevel {
        TrustLevel::Full
    }
}

fn activate_widget() -> ComRef<IInspectable> {
    ComExport::new(Widget).to_com()
}

#[test]
fn test_introspection_through_an_export() {
    let export = ComExport::new(Widget);
    let inspectable = export.to_com();
    let interop = inspectable.as_interop();

    let name = interop.get_runtime_class_name().unwrap();
    assert_eq!(name, *"Wren.Test.Widget");

    assert_eq!(interop.get_trust_level().unwrap(), TrustLevel::Full);

    let iids = interop.get_iids().unwrap();
    assert_eq!(iids, vec![IID_IWIDGET]);
}

#[test]
fn test_unregistered_class_fails_with_class_not_registered() {
    let err = get_activation_factory("Wren.Test.NotRegistered").unwrap_err();
    assert_eq!(err.hresult(), HResult::REGDB_E_CLASSNOTREG);
}

#[test]
fn test_factory_activates_instances() {
    register_activatable_class("Wren.Test.Widget", activate_widget);

    static CACHE: FactoryCache = FactoryCache::new("Wren.Test.Widget");
    let instance = CACHE.activate_instance().unwrap();
    let name = instance.as_interop().get_runtime_class_name().unwrap();
    assert_eq!(name, *"Wren.Test.Widget");

    // Two activations produce distinct objects.
    let second = CACHE.activate_instance().unwrap();
    assert_ne!(instance.as_ptr(), second.as_ptr());
}

#[test]
fn test_factory_cache_initializes_once_under_concurrency() {
    static ACTIVATIONS: AtomicU32 = AtomicU32::new(0);

    fn activate_counted() -> ComRef<IInspectable> {
        ACTIVATIONS.fetch_add(1, Ordering::SeqCst);
        ComExport::new(Widget).to_com()
    }

    register_activatable_class("Wren.Test.Counted", activate_counted);
    static CACHE: FactoryCache = FactoryCache::new("Wren.Test.Counted");

    let barrier = Arc::new(std::sync::Barrier::new(8));
    let mut handles = vec![];
    for _ in 0..8 {
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            CACHE.get().unwrap().as_ptr() as usize
        }));
    }

    let pointers: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    // Every thread observed the same cached factory.
    assert!(pointers.windows(2).all(|pair| pair[0] == pair[1]));
    // The slot was filled exactly once; racing factories were released,
    // not cached (activation itself only happens per activate_instance).
    let first = CACHE.get().unwrap().as_ptr() as usize;
    assert_eq!(first, pointers[0]);
}
