//! Activation factories.
//!
//! Hosts register activatable classes in a process-global registry;
//! generated code reaches them through [`FactoryCache`], the per-type
//! memoized factory slot. First initialization is serialized by the slot
//! itself, so concurrent first use activates exactly once.

use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::OnceLock;

use dashmap::DashMap;
use log::debug;
use wren_abi::{Guid, HResult, IInspectable, IInspectableVtbl};
use wren_com::export::{exported_inspectable_vtbl, with_this};
use wren_com::{
    check_captured, ComClass, ComError, ComExport, ComInterface, ComRef, InterfaceEntry, Result,
    VtblPtr,
};

/// Activation factory interface identifier
pub const IID_IACTIVATION_FACTORY: Guid =
    Guid::new(0x00000035, 0x0000, 0x0000, 0xC000, 0x000000000046);

#[repr(C)]
pub struct IActivationFactoryVtbl {
    pub inspectable: IInspectableVtbl,
    pub activate_instance:
        unsafe extern "system" fn(this: *mut c_void, instance: *mut *mut c_void) -> HResult,
}

#[repr(C)]
pub struct IActivationFactory {
    pub vtbl: *const IActivationFactoryVtbl,
}

unsafe impl ComInterface for IActivationFactory {
    type Vtbl = IActivationFactoryVtbl;
    const IID: Guid = IID_IACTIVATION_FACTORY;
}

/// Constructor registered for an activatable class: produces a new
/// default-activated instance as an introspection reference.
pub type ActivateFn = fn() -> ComRef<IInspectable>;

/// Host-side factory object exported behind the activation interface.
struct FactoryInvoker {
    activate: ActivateFn,
}

unsafe extern "system" fn factory_activate_instance(
    this: *mut c_void,
    instance: *mut *mut c_void,
) -> HResult {
    with_this::<FactoryInvoker, _>(this, |factory| {
        if instance.is_null() {
            return Err(ComError::from_hresult(HResult::E_POINTER));
        }
        unsafe {
            *instance = (factory.activate)().detach().as_ptr() as *mut c_void;
        }
        Ok(())
    })
}

static FACTORY_VTBL: IActivationFactoryVtbl = IActivationFactoryVtbl {
    inspectable: exported_inspectable_vtbl(),
    activate_instance: factory_activate_instance,
};

static FACTORY_ENTRIES: [InterfaceEntry; 1] = [InterfaceEntry::new(
    IID_IACTIVATION_FACTORY,
    VtblPtr::new(&FACTORY_VTBL),
)];

impl ComClass for FactoryInvoker {
    fn queriable() -> &'static [InterfaceEntry] {
        &FACTORY_ENTRIES
    }

    fn runtime_class_name() -> &'static str {
        "Wren.ActivationFactory"
    }
}

fn registry() -> &'static DashMap<String, ActivateFn> {
    static REGISTRY: OnceLock<DashMap<String, ActivateFn>> = OnceLock::new();
    REGISTRY.get_or_init(DashMap::new)
}

/// Register an activatable class under its full runtime name. A later
/// registration replaces an earlier one.
pub fn register_activatable_class(name: &str, activate: ActivateFn) {
    debug!("registering activatable class {name}");
    registry().insert(name.to_string(), activate);
}

/// Look up an activatable class and export its factory.
pub fn get_activation_factory(name: &str) -> Result<ComRef<IActivationFactory>> {
    match registry().get(name) {
        Some(entry) => ComExport::new(FactoryInvoker { activate: *entry }).cast(),
        None => {
            debug!("activatable class {name} is not registered");
            Err(ComError::from_hresult(HResult::REGDB_E_CLASSNOTREG))
        }
    }
}

/// Registered factories are process-global and free-threaded by contract,
/// so the cached reference may be shared across threads.
struct AgileFactory(ComRef<IActivationFactory>);

unsafe impl Send for AgileFactory {}
unsafe impl Sync for AgileFactory {}

/// Memoized per-type factory slot. Lives in a `static` next to the
/// generated class it activates; the slot is initialized at most once even
/// under concurrent first use.
pub struct FactoryCache {
    name: &'static str,
    slot: OnceLock<AgileFactory>,
}

impl FactoryCache {
    pub const fn new(name: &'static str) -> FactoryCache {
        FactoryCache {
            name,
            slot: OnceLock::new(),
        }
    }

    /// The cached factory, initializing the slot on first use.
    pub fn get(&self) -> Result<&ComRef<IActivationFactory>> {
        if let Some(factory) = self.slot.get() {
            return Ok(&factory.0);
        }
        let factory = get_activation_factory(self.name)?;
        // A racing initializer may have won; its reference is kept and
        // this one released.
        Ok(&self.slot.get_or_init(|| AgileFactory(factory)).0)
    }

    /// Activate a default instance through the cached factory.
    pub fn activate_instance(&self) -> Result<ComRef<IInspectable>> {
        let factory = self.get()?;
        let mut instance: *mut c_void = std::ptr::null_mut();
        let hr = unsafe {
            (factory.vtbl().activate_instance)(factory.as_ptr() as *mut c_void, &mut instance)
        };
        check_captured(hr)?;
        match NonNull::new(instance as *mut IInspectable) {
            // The factory handed over an acquired reference.
            Some(ptr) => Ok(unsafe { ComRef::from_raw(ptr) }),
            None => {
                debug_assert!(false, "activation succeeded with a null instance");
                Err(ComError::from_hresult(HResult::E_POINTER))
            }
        }
    }
}
