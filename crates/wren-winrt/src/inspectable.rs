//! Introspection calls on WinRT objects.

use std::ffi::c_void;

use wren_abi::mem::abi_free;
use wren_abi::{Guid, HStr, IInspectable, TrustLevel};
use wren_com::{check, ComInterop, Result};

use crate::hstring::HString;

/// The three introspection calls every WinRT object answers.
pub trait InspectableInterop {
    /// Identifiers of the implemented interfaces.
    fn get_iids(&self) -> Result<Vec<Guid>>;

    /// The object's runtime class name.
    fn get_runtime_class_name(&self) -> Result<HString>;

    /// The object's trust level.
    fn get_trust_level(&self) -> Result<TrustLevel>;
}

impl InspectableInterop for ComInterop<IInspectable> {
    fn get_iids(&self) -> Result<Vec<Guid>> {
        let mut count: u32 = 0;
        let mut iids: *mut Guid = std::ptr::null_mut();
        let hr =
            unsafe { (self.vtbl().get_iids)(self.as_ptr() as *mut c_void, &mut count, &mut iids) };
        check(hr)?;
        if iids.is_null() {
            return Ok(Vec::new());
        }
        // The callee allocated with the ABI allocator; we own the buffer.
        let result = unsafe {
            let values = std::slice::from_raw_parts(iids, count as usize).to_vec();
            abi_free(iids as *mut c_void);
            values
        };
        Ok(result)
    }

    fn get_runtime_class_name(&self) -> Result<HString> {
        let mut name: HStr = std::ptr::null();
        let hr = unsafe {
            (self.vtbl().get_runtime_class_name)(self.as_ptr() as *mut c_void, &mut name)
        };
        // Own whatever was produced before interpreting the status.
        let name = unsafe { HString::from_raw(name) };
        check(hr)?;
        Ok(name)
    }

    fn get_trust_level(&self) -> Result<TrustLevel> {
        let mut level: i32 = 0;
        let hr =
            unsafe { (self.vtbl().get_trust_level)(self.as_ptr() as *mut c_void, &mut level) };
        check(hr)?;
        Ok(TrustLevel::from_raw(level))
    }
}
