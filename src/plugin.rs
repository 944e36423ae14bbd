// Copyright 2024 Developers of the SmokeRand project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The dynamic plugin loader: resolves
//! `gen_getinfo` out of a shared object via `libloading` and wraps the raw
//! [`RawGeneratorInfo`] it returns into a safe [`GeneratorDescriptor`].
//!
//! A loaded library must outlive every [`GenState`] instantiated from its
//! descriptor — the `create`/`next`/`destroy` function pointers point into
//! the library's mapped code, so each instantiated state keeps its own
//! `Arc<Library>` clone, not just the descriptor.

use std::ffi::CStr;
use std::mem::MaybeUninit;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::Arc;

use libloading::{Library, Symbol};
use log::debug;
use smokerand_core::ffi::{CallerApi, GenGetInfoFn, RawGeneratorInfo};
use smokerand_core::{GenState, GeneratorDescriptor, SmokeError, SmokeResult, Word};

const ENTRY_SYMBOL: &[u8] = b"gen_getinfo\0";

/// A generator plugin resolved from a shared object. Keep this alive for
/// as long as any [`GenState`] built from `descriptor` is in use.
pub struct LoadedPlugin {
    pub descriptor: GeneratorDescriptor,
    _lib: Arc<Library>,
}

unsafe fn cstr_to_string(ptr: *const c_char, field: &str) -> SmokeResult<String> {
    if ptr.is_null() {
        return Err(SmokeError::Plugin(format!("plugin returned a null `{field}`")));
    }
    Ok(CStr::from_ptr(ptr).to_string_lossy().into_owned())
}

/// State backing one instantiated plugin generator. `_lib` is never read,
/// only held, to keep the shared object mapped for as long as `next` or
/// `destroy` might still be called.
struct RawGenState {
    _lib: Arc<Library>,
    state: *mut std::ffi::c_void,
    nbits: u32,
    next_fn: unsafe extern "C" fn(*mut std::ffi::c_void) -> u64,
    destroy_fn: unsafe extern "C" fn(*mut std::ffi::c_void),
    bulk_sum_fn: Option<unsafe extern "C" fn(*mut std::ffi::c_void, u64) -> u64>,
}

// SAFETY: a plugin's generator state is used from exactly one worker
// thread for its whole lifetime, matching `GenState`'s own contract; the
// raw pointer itself carries no thread affinity.
unsafe impl Send for RawGenState {}

impl GenState for RawGenState {
    fn nbits(&self) -> u32 {
        self.nbits
    }

    fn next(&mut self) -> Word {
        let raw = unsafe { (self.next_fn)(self.state) };
        if self.nbits == 32 {
            Word::U32(raw as u32)
        } else {
            Word::U64(raw)
        }
    }

    fn bulk_sum(&mut self, n: u64) -> Option<u64> {
        self.bulk_sum_fn.map(|f| unsafe { f(self.state, n) })
    }
}

impl Drop for RawGenState {
    fn drop(&mut self) {
        unsafe { (self.destroy_fn)(self.state) };
    }
}

/// Load `path` as a generator plugin and resolve its `gen_getinfo` export,
/// calling it once with `probe_host` to obtain the generator's metadata
/// (name, description, width, and the `create`/`next`/`destroy`/optional
/// `self_test`/`bulk_sum` function pointers).
///
/// Returns an error (`SmokeError::Plugin`) if the file cannot be
/// loaded, the symbol is missing, `gen_getinfo` reports failure, or the
/// populated record claims an `nbits` other than 32 or 64.
pub fn load_generator_plugin(path: &Path, probe_host: &CallerApi) -> SmokeResult<LoadedPlugin> {
    let lib = unsafe {
        Library::new(path)
            .map_err(|e| SmokeError::Plugin(format!("failed to load `{}`: {e}", path.display())))?
    };
    let lib = Arc::new(lib);

    let raw: RawGeneratorInfo = unsafe {
        let entry: Symbol<GenGetInfoFn> = lib.get(ENTRY_SYMBOL).map_err(|e| {
            SmokeError::Plugin(format!("`{}` has no `gen_getinfo` export: {e}", path.display()))
        })?;

        let mut out = MaybeUninit::<RawGeneratorInfo>::uninit();
        let ok = entry(out.as_mut_ptr(), probe_host as *const CallerApi);
        if !ok {
            return Err(SmokeError::Plugin(format!(
                "`{}`'s gen_getinfo reported failure",
                path.display()
            )));
        }
        out.assume_init()
    };

    if raw.nbits != 32 && raw.nbits != 64 {
        return Err(SmokeError::Plugin(format!(
            "`{}` declared nbits={}, expected 32 or 64",
            path.display(),
            raw.nbits
        )));
    }

    let name = unsafe { cstr_to_string(raw.name, "name")? };
    let description = unsafe { cstr_to_string(raw.description, "description")? };
    debug!("resolved plugin `{}` ({} bits) from {}", name, raw.nbits, path.display());

    let nbits = raw.nbits;
    let create_fn = raw.create;
    let next_fn = raw.next;
    let destroy_fn = raw.destroy;
    let bulk_sum_fn = raw.bulk_sum;
    let self_test_fn = raw.self_test;
    let lib_for_create = lib.clone();

    let mut descriptor = GeneratorDescriptor::new(name, description, nbits, move |host| {
        let state = unsafe { create_fn(host as *const CallerApi) };
        Box::new(RawGenState {
            _lib: lib_for_create.clone(),
            state,
            nbits,
            next_fn,
            destroy_fn,
            bulk_sum_fn,
        }) as Box<dyn GenState>
    });
    if let Some(self_test_fn) = self_test_fn {
        descriptor = descriptor.with_self_test(move || unsafe { self_test_fn() });
    }

    Ok(LoadedPlugin { descriptor, _lib: lib })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_a_plugin_error() {
        let host = crate::hostapi::test_caller_api();
        let err = load_generator_plugin(Path::new("/nonexistent/path.so"), &host).unwrap_err();
        assert!(matches!(err, SmokeError::Plugin(_)));
    }
}
