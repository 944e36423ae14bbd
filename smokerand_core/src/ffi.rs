// Copyright 2024 Developers of the SmokeRand project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The raw, `#[repr(C)]` plugin ABI.
//!
//! This is the one part of the crate that stays a plain bundle of function
//! pointers rather than Rust trait objects: it is the actual shape a
//! dynamically-loaded, independently-compiled plugin links against. The
//! rest of the engine never touches these types directly — [`crate::plugin`]-style
//! loader code (in the `smokerand` crate) is the only place that resolves a
//! symbol of this shape and wraps it into a safe
//! [`crate::GeneratorDescriptor`].

use core::ffi::{c_char, c_void};

/// Sentinel written into a [`RawRamInfo`] field when the host cannot
/// determine the quantity.
pub const RAM_UNKNOWN: u64 = u64::MAX;

/// C-layout counterpart of [`crate::RamInfo`], as passed across the ABI.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct RawRamInfo {
    pub total_bytes: u64,
    pub available_bytes: u64,
}

impl From<crate::RamInfo> for RawRamInfo {
    fn from(r: crate::RamInfo) -> Self {
        RawRamInfo {
            total_bytes: r.total_bytes.unwrap_or(RAM_UNKNOWN),
            available_bytes: r.available_bytes.unwrap_or(RAM_UNKNOWN),
        }
    }
}

impl From<RawRamInfo> for crate::RamInfo {
    fn from(r: RawRamInfo) -> Self {
        crate::RamInfo {
            total_bytes: (r.total_bytes != RAM_UNKNOWN).then_some(r.total_bytes),
            available_bytes: (r.available_bytes != RAM_UNKNOWN).then_some(r.available_bytes),
        }
    }
}

/// The host services a plugin may call back into.
///
/// `ctx` is an opaque host-owned pointer threaded through every call; a
/// plugin must never interpret it, only pass it back unchanged. This stays
/// a record of raw function pointers rather than a trait object because it
/// is consumed by code compiled in a separate translation unit, potentially
/// by a different compiler version — the one genuine ABI boundary in the
/// whole engine.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct CallerApi {
    pub ctx: *mut c_void,
    /// Serialised, line-preserving text sink. `msg` is a NUL-terminated
    /// UTF-8 string owned by the caller for the duration of the call.
    pub printf: unsafe extern "C" fn(ctx: *mut c_void, msg: *const c_char),
    pub malloc: unsafe extern "C" fn(n: usize) -> *mut c_void,
    pub free: unsafe extern "C" fn(p: *mut c_void),
    pub strcmp: unsafe extern "C" fn(a: *const c_char, b: *const c_char) -> i32,
    /// Draw a 32-bit seed from the entropy service, respecting the calling
    /// worker's thread ordinal.
    pub get_seed32: unsafe extern "C" fn(ctx: *mut c_void) -> u32,
    /// Draw a 64-bit seed; see [`CallerApi::get_seed32`].
    pub get_seed64: unsafe extern "C" fn(ctx: *mut c_void) -> u64,
    /// The `--param=` value, or a null pointer if none was given.
    pub get_param: unsafe extern "C" fn(ctx: *mut c_void) -> *const c_char,
    pub get_ram_info: unsafe extern "C" fn(ctx: *mut c_void, out: *mut RawRamInfo),
}

// SAFETY: `CallerApi` is a value type carrying only function pointers and
// an opaque, host-synchronised context pointer; the host guarantees `ctx`
// is safe to hand to any worker thread.
unsafe impl Send for CallerApi {}
unsafe impl Sync for CallerApi {}

/// C-layout generator descriptor, the plugin ABI's "generator descriptor"
/// `create`/`next`/`destroy` are mandatory; `self_test`
/// and `bulk_sum` are optional and null when absent.
#[repr(C)]
pub struct RawGeneratorInfo {
    pub name: *const c_char,
    pub description: *const c_char,
    /// 32 or 64; any other value is a fatal configuration error for the
    /// loader to reject.
    pub nbits: u32,
    pub create: unsafe extern "C" fn(host: *const CallerApi) -> *mut c_void,
    pub destroy: unsafe extern "C" fn(state: *mut c_void),
    /// Always returns a full 64-bit lane; 32-bit generators populate only
    /// the low 32 bits and the loader truncates accordingly.
    pub next: unsafe extern "C" fn(state: *mut c_void) -> u64,
    pub self_test: Option<unsafe extern "C" fn() -> bool>,
    pub bulk_sum: Option<unsafe extern "C" fn(state: *mut c_void, n: u64) -> u64>,
    /// Non-null only for filter descriptors.
    pub parent: *const RawGeneratorInfo,
}

/// Signature every plugin must export under the symbol name `gen_getinfo`.
pub type GenGetInfoFn =
    unsafe extern "C" fn(out: *mut RawGeneratorInfo, host: *const CallerApi) -> bool;

/// Signature a *battery* plugin exports under `battery_func`
/// (used by both the plugin ABI and the shared-object battery form).
#[repr(C)]
pub struct RawBatteryOptions {
    pub batparam: *const c_char,
    pub testid: i32,
    pub testname: *const c_char,
    pub nthreads: u32,
    pub report_brief: bool,
}

pub type BatteryFuncFn = unsafe extern "C" fn(
    gen: *const RawGeneratorInfo,
    host: *const CallerApi,
    options: *const RawBatteryOptions,
) -> i32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ram_info_round_trips_through_sentinel() {
        let known = crate::RamInfo {
            total_bytes: Some(16 * 1024 * 1024 * 1024),
            available_bytes: Some(4 * 1024 * 1024 * 1024),
        };
        let raw: RawRamInfo = known.into();
        let back: crate::RamInfo = raw.into();
        assert_eq!(known, back);

        let unknown = crate::RamInfo { total_bytes: None, available_bytes: Some(1) };
        let raw: RawRamInfo = unknown.into();
        assert_eq!(raw.total_bytes, RAM_UNKNOWN);
        let back: crate::RamInfo = raw.into();
        assert_eq!(unknown, back);
    }
}
