//! Two-way export: host objects behind synthesized vtables.
//!
//! Export box layout (one allocation per exported object):
//! ┌─────────────────────────────────────────┐
//! │ identity ComEmbedding                   │ <- the identity interface
//! │   vtbl: introspection export vtable     │    pointer foreign code holds
//! │   header: ─────────────┐                │
//! ├────────────────────────▼────────────────┤
//! │ ExportHeader                            │
//! │   refs (AtomicU32), entry table,        │
//! │   class name, trust level,              │
//! │   object ptr, TypeId, drop hook         │
//! ├─────────────────────────────────────────┤
//! │ host object (T)                         │
//! ├─────────────────────────────────────────┤
//! │ secondary embeddings (one per entry)    │ <- heap slices, stable
//! │ entry table (IID -> embedding)          │    addresses
//! └─────────────────────────────────────────┘
//!
//! Every embedding starts with a vtable pointer, so its address is a valid
//! interface pointer; the back-pointer in the second word recovers the
//! shared header from any embedding. All embeddings share one atomic
//! reference count, and identity queries always answer with the identity
//! embedding, which makes the pointer-equality identity rule hold by
//! construction.
//!
//! Query resolution order: identity interface, introspection interface,
//! instance overrides (most-derived first), then the declared queriable
//! set. A miss returns the no-interface status and leaves the count
//! untouched.

use std::any::TypeId;
use std::ffi::c_void;
use std::mem::offset_of;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, Ordering};

use log::{debug, error};
use wren_abi::mem::abi_alloc_array;
use wren_abi::{hstr, Guid, HResult, HStr, IInspectable, IInspectableVtbl, IUnknown, IUnknownVtbl, TrustLevel};

use crate::error::{ComError, Result};
use crate::error_info;
use crate::interface::{ComInterface, IID_IINSPECTABLE, IID_IUNKNOWN};
use crate::reference::ComRef;

/// Private identifier answered only by this runtime's exports; lets the
/// host recover the wrapped object from a foreign pointer.
pub(crate) const EXPORT_MARKER_IID: Guid =
    Guid::new(0x8C2F3A41, 0x5D0B, 0x4E6A, 0xB1C7, 0x00D34F9A2E15);

/// Type-erased pointer to a `'static` vtable instance.
#[derive(Clone, Copy)]
pub struct VtblPtr(pub *const c_void);

// Vtables are immutable function tables; sharing the pointer is safe.
unsafe impl Send for VtblPtr {}
unsafe impl Sync for VtblPtr {}

impl VtblPtr {
    pub const fn new<T>(vtbl: &'static T) -> VtblPtr {
        VtblPtr(vtbl as *const T as *const c_void)
    }
}

/// One queriable interface of an exported type: identifier plus the vtable
/// backing it.
#[derive(Clone, Copy)]
pub struct InterfaceEntry {
    pub iid: Guid,
    pub vtable: VtblPtr,
}

impl InterfaceEntry {
    pub const fn new(iid: Guid, vtable: VtblPtr) -> InterfaceEntry {
        InterfaceEntry { iid, vtable }
    }
}

/// A host type consumable as a foreign object.
///
/// The queriable set is closed and declared up front: the export layer
/// builds its interface table at construction time. Thunks may run on any
/// thread, so implementors are `Send + Sync` and mutate through interior
/// mutability.
pub trait ComClass: Send + Sync + Sized + 'static {
    /// Interfaces foreign code may query on exports of this type.
    fn queriable() -> &'static [InterfaceEntry];

    /// Most-derived override vtables for base-declared overridable
    /// interfaces; consulted before the defaults in `queriable`.
    fn overrides(&self) -> &'static [InterfaceEntry] {
        &[]
    }

    /// Name reported by the introspection interface.
    fn runtime_class_name() -> &'static str {
        ""
    }

    /// Trust level reported by the introspection interface.
    fn trust_level() -> TrustLevel {
        TrustLevel::Base
    }
}

/// Embeddable header whose address is a foreign interface pointer.
#[repr(C)]
pub struct ComEmbedding {
    vtbl: *const c_void,
    header: *const ExportHeader,
}

// The vtable pointer must sit at offset zero for the embedding's address to
// be dispatchable as an interface pointer.
static_assertions::const_assert_eq!(std::mem::offset_of!(ComEmbedding, vtbl), 0);

#[repr(C)]
struct EmbeddingEntry {
    iid: Guid,
    embedding: *const ComEmbedding,
}

/// Type-erased shared state of one exported object.
#[repr(C)]
struct ExportHeader {
    refs: AtomicU32,
    identity: *const ComEmbedding,
    entries: *const EmbeddingEntry,
    entry_count: usize,
    class_name: *const u8,
    class_name_len: usize,
    trust_level: i32,
    object: *const c_void,
    type_id: TypeId,
    drop_fn: unsafe fn(*const ExportHeader),
}

#[repr(C)]
struct ExportBox<T: ComClass> {
    identity: ComEmbedding,
    header: ExportHeader,
    object: T,
    secondaries: Box<[ComEmbedding]>,
    entries: Box<[EmbeddingEntry]>,
}

unsafe fn drop_export_box<T: ComClass>(header: *const ExportHeader) {
    let raw = (header as *mut u8).sub(offset_of!(ExportBox<T>, header)) as *mut ExportBox<T>;
    drop(Box::from_raw(raw));
}

unsafe fn header_of(this: *mut c_void) -> *const ExportHeader {
    (*(this as *const ComEmbedding)).header
}

unsafe fn header_query(header: &ExportHeader, iid: &Guid) -> Option<*const ComEmbedding> {
    if *iid == IID_IUNKNOWN || *iid == IID_IINSPECTABLE || *iid == EXPORT_MARKER_IID {
        return Some(header.identity);
    }
    let entries = std::slice::from_raw_parts(header.entries, header.entry_count);
    entries
        .iter()
        .find(|entry| entry.iid == *iid)
        .map(|entry| entry.embedding)
}

unsafe fn header_release(header: *const ExportHeader) -> u32 {
    let previous = (*header).refs.fetch_sub(1, Ordering::AcqRel);
    debug_assert!(previous != 0, "exported object reference count underflow");
    if previous == 1 {
        ((*header).drop_fn)(header);
    }
    previous.wrapping_sub(1)
}

// === Exported identity/introspection slots ===
//
// These are the slot implementations generated vtables install for their
// leading identity (and, for WinRT-flavored interfaces, introspection)
// entries. They are type-erased: everything they need is reachable through
// the embedding header.

/// Exported `QueryInterface` slot.
///
/// # Safety
/// Installed in export vtables only; `this` must be an embedding produced
/// by [`ComExport`].
pub unsafe extern "system" fn export_query_interface(
    this: *mut c_void,
    iid: *const Guid,
    out: *mut *mut c_void,
) -> HResult {
    if this.is_null() || iid.is_null() || out.is_null() {
        debug_assert!(false, "null argument in exported QueryInterface");
        return HResult::E_POINTER;
    }
    *out = std::ptr::null_mut();
    let header = &*header_of(this);
    match header_query(header, &*iid) {
        Some(embedding) => {
            header.refs.fetch_add(1, Ordering::AcqRel);
            *out = embedding as *mut c_void;
            HResult::S_OK
        }
        None => {
            debug!("exported object {this:?} has no interface {}", *iid);
            HResult::E_NOINTERFACE
        }
    }
}

/// Exported `AddRef` slot.
///
/// # Safety
/// Installed in export vtables only.
pub unsafe extern "system" fn export_add_ref(this: *mut c_void) -> u32 {
    if this.is_null() {
        debug_assert!(false, "null this pointer in exported AddRef");
        return 0;
    }
    (*header_of(this)).refs.fetch_add(1, Ordering::AcqRel) + 1
}

/// Exported `Release` slot. At zero the wrapper is torn down and the host
/// object dropped.
///
/// # Safety
/// Installed in export vtables only; must balance an acquired reference.
pub unsafe extern "system" fn export_release(this: *mut c_void) -> u32 {
    if this.is_null() {
        debug_assert!(false, "null this pointer in exported Release");
        return 0;
    }
    header_release(header_of(this))
}

/// Exported `GetIids` slot: the declared queriable identifiers, deduplicated,
/// in an ABI-allocated array the caller frees.
///
/// # Safety
/// Installed in export vtables only.
pub unsafe extern "system" fn export_get_iids(
    this: *mut c_void,
    count: *mut u32,
    iids: *mut *mut Guid,
) -> HResult {
    if this.is_null() || count.is_null() || iids.is_null() {
        debug_assert!(false, "null argument in exported GetIids");
        return HResult::E_POINTER;
    }
    let header = &*header_of(this);
    let entries = std::slice::from_raw_parts(header.entries, header.entry_count);
    let mut unique: Vec<Guid> = Vec::with_capacity(entries.len());
    for entry in entries {
        if !unique.contains(&entry.iid) {
            unique.push(entry.iid);
        }
    }
    let array = abi_alloc_array::<Guid>(unique.len());
    if !array.is_null() {
        std::ptr::copy_nonoverlapping(unique.as_ptr(), array, unique.len());
    }
    *count = unique.len() as u32;
    *iids = array;
    HResult::S_OK
}

/// Exported `GetRuntimeClassName` slot.
///
/// # Safety
/// Installed in export vtables only.
pub unsafe extern "system" fn export_get_runtime_class_name(
    this: *mut c_void,
    name: *mut HStr,
) -> HResult {
    if this.is_null() || name.is_null() {
        debug_assert!(false, "null argument in exported GetRuntimeClassName");
        return HResult::E_POINTER;
    }
    let header = &*header_of(this);
    let class_name = std::str::from_utf8_unchecked(std::slice::from_raw_parts(
        header.class_name,
        header.class_name_len,
    ));
    *name = hstr::hstr_from_str(class_name);
    HResult::S_OK
}

/// Exported `GetTrustLevel` slot.
///
/// # Safety
/// Installed in export vtables only.
pub unsafe extern "system" fn export_get_trust_level(
    this: *mut c_void,
    level: *mut i32,
) -> HResult {
    if this.is_null() || level.is_null() {
        debug_assert!(false, "null argument in exported GetTrustLevel");
        return HResult::E_POINTER;
    }
    *level = (*header_of(this)).trust_level;
    HResult::S_OK
}

/// Identity slots for generated COM-flavored export vtables.
pub const fn exported_unknown_vtbl() -> IUnknownVtbl {
    IUnknownVtbl {
        query_interface: export_query_interface,
        add_ref: export_add_ref,
        release: export_release,
    }
}

/// Identity plus introspection slots for generated WinRT-flavored export
/// vtables.
pub const fn exported_inspectable_vtbl() -> IInspectableVtbl {
    IInspectableVtbl {
        unknown: exported_unknown_vtbl(),
        get_iids: export_get_iids,
        get_runtime_class_name: export_get_runtime_class_name,
        get_trust_level: export_get_trust_level,
    }
}

/// The vtable behind every identity embedding.
pub static EXPORTED_INSPECTABLE_VTBL: IInspectableVtbl = exported_inspectable_vtbl();

/// Recover the host object a dispatch thunk was invoked on.
///
/// Returns `None` when the embedding does not wrap a `T` (an
/// internal-consistency violation on the thunk's part).
///
/// # Safety
/// `this` must be a non-null embedding produced by [`ComExport`].
pub unsafe fn object_from_this<'a, T: ComClass>(this: *mut c_void) -> Option<&'a T> {
    let header = &*header_of(this);
    if header.type_id != TypeId::of::<T>() {
        return None;
    }
    Some(&*(header.object as *const T))
}

/// Dispatch-thunk wrapper: recovers the host object, runs the body, and
/// converts the outcome to a status code. A host error never escapes as an
/// unhandled fault - errors map to their status after their record is
/// exposed on the side channel, and panics map to the unexpected-failure
/// status. A null `this` is an internal-consistency violation: asserted in
/// debug builds, answered with the pointer-error status.
pub fn with_this<T, F>(this: *mut c_void, body: F) -> HResult
where
    T: ComClass,
    F: FnOnce(&T) -> Result<()>,
{
    if this.is_null() {
        debug_assert!(false, "COM this pointer was null");
        return HResult::E_POINTER;
    }
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let Some(object) = (unsafe { object_from_this::<T>(this) }) else {
            debug_assert!(false, "embedding does not wrap the expected host type");
            return HResult::E_UNEXPECTED;
        };
        match body(object) {
            Ok(()) => HResult::S_OK,
            Err(err) => {
                let hresult = err.hresult();
                error!("host error crossing export boundary as {hresult}: {err}");
                error_info::publish(err);
                hresult
            }
        }
    }));
    outcome.unwrap_or_else(|_| {
        error!("host panic crossing export boundary");
        HResult::E_UNEXPECTED
    })
}

/// A host object exported behind synthesized vtables.
///
/// The handle itself owns one host-side reference; foreign code acquires
/// and releases its own through the identity slots. When the count reaches
/// zero the wrapper is torn down and the host object dropped - outstanding
/// foreign references past that point are excluded by contract.
pub struct ComExport<T: ComClass> {
    ptr: NonNull<ExportBox<T>>,
}

// The box is only reachable through &self accessors and atomic counts, and
// ComClass requires Send + Sync of the wrapped object.
unsafe impl<T: ComClass> Send for ComExport<T> {}
unsafe impl<T: ComClass> Sync for ComExport<T> {}

impl<T: ComClass> ComExport<T> {
    /// Wrap `object` for consumption by foreign code.
    pub fn new(object: T) -> ComExport<T> {
        let specs: Vec<InterfaceEntry> = object
            .overrides()
            .iter()
            .copied()
            .chain(T::queriable().iter().copied())
            .collect();
        let class_name = T::runtime_class_name();

        let mut boxed = Box::new(ExportBox {
            identity: ComEmbedding {
                vtbl: &EXPORTED_INSPECTABLE_VTBL as *const IInspectableVtbl as *const c_void,
                header: std::ptr::null(),
            },
            header: ExportHeader {
                refs: AtomicU32::new(1),
                identity: std::ptr::null(),
                entries: std::ptr::null(),
                entry_count: 0,
                class_name: class_name.as_ptr(),
                class_name_len: class_name.len(),
                trust_level: T::trust_level() as i32,
                object: std::ptr::null(),
                type_id: TypeId::of::<T>(),
                drop_fn: drop_export_box::<T>,
            },
            object,
            secondaries: specs
                .iter()
                .map(|spec| ComEmbedding {
                    vtbl: spec.vtable.0,
                    header: std::ptr::null(),
                })
                .collect(),
            entries: Vec::new().into_boxed_slice(),
        });

        // Tie the embeddings back to the shared header now that the box
        // gave everything a stable address.
        let header_ptr: *const ExportHeader = &boxed.header;
        boxed.identity.header = header_ptr;
        for embedding in boxed.secondaries.iter_mut() {
            embedding.header = header_ptr;
        }
        let entries: Box<[EmbeddingEntry]> = specs
            .iter()
            .zip(boxed.secondaries.iter())
            .map(|(spec, embedding)| EmbeddingEntry {
                iid: spec.iid,
                embedding: embedding as *const ComEmbedding,
            })
            .collect();
        boxed.entries = entries;
        boxed.header.identity = &boxed.identity;
        boxed.header.entries = boxed.entries.as_ptr();
        boxed.header.entry_count = boxed.entries.len();
        boxed.header.object = &boxed.object as *const T as *const c_void;

        ComExport {
            ptr: NonNull::from(Box::leak(boxed)),
        }
    }

    fn header(&self) -> &ExportHeader {
        unsafe { &self.ptr.as_ref().header }
    }

    /// The wrapped host object.
    pub fn as_object(&self) -> &T {
        unsafe { &self.ptr.as_ref().object }
    }

    /// Current host-side reference count, for diagnostics and tests.
    pub fn ref_count(&self) -> u32 {
        self.header().refs.load(Ordering::Acquire)
    }

    /// A new reference to the identity interface pointer.
    pub fn to_com(&self) -> ComRef<IInspectable> {
        let header = self.header();
        header.refs.fetch_add(1, Ordering::AcqRel);
        unsafe { ComRef::from_raw(NonNull::new_unchecked(header.identity as *mut IInspectable)) }
    }

    /// Query an interface the same way foreign code would.
    pub fn query(&self, iid: &Guid) -> Result<ComRef<IUnknown>> {
        let header = self.header();
        match unsafe { header_query(header, iid) } {
            Some(embedding) => {
                header.refs.fetch_add(1, Ordering::AcqRel);
                Ok(unsafe { ComRef::from_raw(NonNull::new_unchecked(embedding as *mut IUnknown)) })
            }
            None => Err(ComError::NoSuchInterface { iid: *iid }),
        }
    }

    /// Typed interface query.
    pub fn cast<J: ComInterface>(&self) -> Result<ComRef<J>> {
        // The query established the interface is implemented.
        Ok(unsafe { self.query(&J::IID)?.reinterpret() })
    }
}

impl<T: ComClass> Drop for ComExport<T> {
    fn drop(&mut self) {
        unsafe {
            header_release(&self.ptr.as_ref().header);
        }
    }
}

/// Recover the host object wrapped by an export of this runtime, if
/// `reference` points at one wrapping a `T`. Foreign objects and exports of
/// other types yield `None`.
pub fn downcast_ref<'a, T: ComClass, I: ComInterface>(reference: &'a ComRef<I>) -> Option<&'a T> {
    let identity = reference.as_interop().query_interface(&EXPORT_MARKER_IID).ok()?;
    let embedding = identity.as_ptr() as *const ComEmbedding;
    // Only this runtime's exports answer the marker query, so the embedding
    // shape is known; `reference` keeps the box alive for 'a.
    unsafe {
        let header = &*(*embedding).header;
        if header.type_id != TypeId::of::<T>() {
            return None;
        }
        Some(&*(header.object as *const T))
    }
}
