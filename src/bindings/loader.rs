// Extension function loader
//
// Optional entry points are not exported by the loader library, they have to
// be looked up by name once the instance exists. Every extension table in this
// crate is declared through `instance_fn_table!` so the lookup is the same
// everywhere: ask a resolver for each native name, store the pointer.

use ash::vk;
use std::ffi::CStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("entry point `{0}` could not be resolved")]
    MissingEntryPoint(String),
}

impl LoadError {
    pub fn missing(name: &CStr) -> Self {
        Self::MissingEntryPoint(name.to_string_lossy().into_owned())
    }
}

/// Resolver backed by `vkGetInstanceProcAddr` for the given instance.
pub fn instance_resolver(
    entry: &ash::Entry,
    instance: vk::Instance,
) -> impl FnMut(&CStr) -> vk::PFN_vkVoidFunction + '_ {
    move |name| unsafe { entry.get_instance_proc_addr(instance, name.as_ptr()) }
}

/// Resolver backed by `vkGetDeviceProcAddr` for the given device.
pub fn device_resolver(
    instance: &ash::Instance,
    device: vk::Device,
) -> impl FnMut(&CStr) -> vk::PFN_vkVoidFunction + '_ {
    let get_device_proc_addr = instance.fp_v1_0().get_device_proc_addr;
    move |name| unsafe { get_device_proc_addr(device, name.as_ptr()) }
}

/// Declares a table of extension function pointers and its `load_with`.
///
/// Each slot is written as `pub name: PfnType => c"vkNativeName",`. Loading
/// stops at the first name the resolver cannot find.
macro_rules! instance_fn_table {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                pub $field:ident: $pfn:ty => $symbol:expr,
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy)]
        pub struct $name {
            $(
                $(#[$field_meta])*
                pub $field: $pfn,
            )*
        }

        impl $name {
            pub fn load_with<F>(
                mut resolver: F,
            ) -> ::std::result::Result<Self, $crate::bindings::loader::LoadError>
            where
                F: FnMut(&::std::ffi::CStr) -> ::ash::vk::PFN_vkVoidFunction,
            {
                Ok(Self {
                    $(
                        $field: {
                            let symbol: &::std::ffi::CStr = $symbol;
                            let raw = resolver(symbol).ok_or_else(|| {
                                $crate::bindings::loader::LoadError::missing(symbol)
                            })?;
                            // SAFETY: the loader returned the entry point registered
                            // under `symbol`, whose native signature is `$pfn`.
                            unsafe {
                                ::std::mem::transmute::<unsafe extern "system" fn(), $pfn>(raw)
                            }
                        },
                    )*
                })
            }
        }
    };
}

pub(crate) use instance_fn_table;

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    type PfnTestOne = unsafe extern "system" fn(vk::Instance) -> vk::Result;
    type PfnTestTwo = unsafe extern "system" fn(vk::PhysicalDevice, u32) -> vk::Bool32;

    instance_fn_table! {
        pub struct TestFn {
            pub one: PfnTestOne => c"vkTestOne",
            pub two: PfnTestTwo => c"vkTestTwo",
        }
    }

    unsafe extern "system" fn placeholder() {}

    #[test]
    fn resolves_every_slot_by_native_name() {
        let requested = RefCell::new(Vec::new());
        let table = TestFn::load_with(|name| {
            requested.borrow_mut().push(name.to_str().unwrap().to_owned());
            Some(placeholder as unsafe extern "system" fn())
        });

        assert!(table.is_ok());
        assert_eq!(*requested.borrow(), vec!["vkTestOne", "vkTestTwo"]);
    }

    #[test]
    fn missing_entry_point_names_the_symbol() {
        let result = TestFn::load_with(|name| {
            if name == c"vkTestTwo" {
                None
            } else {
                Some(placeholder as unsafe extern "system" fn())
            }
        });

        let err = result.err().expect("load should fail");
        assert_eq!(err, LoadError::MissingEntryPoint("vkTestTwo".to_owned()));
        assert_eq!(err.to_string(), "entry point `vkTestTwo` could not be resolved");
    }

    #[test]
    fn loading_stops_at_first_missing_symbol() {
        let calls = RefCell::new(0);
        let result = TestFn::load_with(|_| {
            *calls.borrow_mut() += 1;
            None
        });

        assert!(result.is_err());
        assert_eq!(*calls.borrow(), 1);
    }
}
