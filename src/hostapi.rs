// Copyright 2024 Developers of the SmokeRand project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The host side of the plugin ABI: builds one
//! [`CallerApi`] per worker, backed by a private [`HostState`] reachable
//! only through the opaque `ctx` pointer every callback receives.
//!
//! One [`Host`] exists per worker thread (never shared): its `thread_ord`
//! is baked in at construction, so `get_seed32`/`get_seed64` need no
//! thread argument of their own — the ABI only has room for `ctx`.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_void};
use std::sync::Arc;

use log::warn;
use smokerand_core::ffi::{CallerApi, RawRamInfo};
use smokerand_core::RamInfo;

use crate::entropy::Entropy;
use crate::io::host_print;

struct HostState {
    entropy: Arc<Entropy>,
    thread_ord: u32,
    param: Option<CString>,
    ram: RamInfo,
}

/// Owns the private state backing one worker's [`CallerApi`]. Must outlive
/// every call made through the API it hands out.
pub struct Host {
    state: Box<HostState>,
}

impl Host {
    pub fn new(entropy: Arc<Entropy>, thread_ord: u32, param: Option<String>, ram: RamInfo) -> Self {
        let param = param.and_then(|p| CString::new(p).ok());
        Host { state: Box::new(HostState { entropy, thread_ord, param, ram }) }
    }

    /// Build the `#[repr(C)]` record a plugin (or the built-in test
    /// library) calls through. Valid only as long as `self` is alive.
    pub fn caller_api(&self) -> CallerApi {
        CallerApi {
            ctx: self.state.as_ref() as *const HostState as *mut c_void,
            printf: host_printf,
            malloc: host_malloc,
            free: host_free,
            strcmp: host_strcmp,
            get_seed32: host_get_seed32,
            get_seed64: host_get_seed64,
            get_param: host_get_param,
            get_ram_info: host_get_ram_info,
        }
    }
}

unsafe extern "C" fn host_printf(ctx: *mut c_void, msg: *const c_char) {
    if msg.is_null() {
        return;
    }
    let text = CStr::from_ptr(msg).to_string_lossy();
    let _ = ctx;
    host_print(&text);
}

/// A size-prefixed allocation: `malloc`/`free` cross the ABI with no size
/// argument to `free`, so the size is stashed just before the returned
/// pointer, mirroring the classic C allocator header trick.
unsafe extern "C" fn host_malloc(n: usize) -> *mut c_void {
    let header = std::mem::size_of::<usize>();
    let Ok(layout) = std::alloc::Layout::from_size_align(n + header, header) else {
        return std::ptr::null_mut();
    };
    let base = std::alloc::alloc(layout);
    if base.is_null() {
        return std::ptr::null_mut();
    }
    (base as *mut usize).write(n);
    base.add(header) as *mut c_void
}

unsafe extern "C" fn host_free(p: *mut c_void) {
    if p.is_null() {
        return;
    }
    let header = std::mem::size_of::<usize>();
    let base = (p as *mut u8).sub(header);
    let n = (base as *const usize).read();
    if let Ok(layout) = std::alloc::Layout::from_size_align(n + header, header) {
        std::alloc::dealloc(base, layout);
    }
}

unsafe extern "C" fn host_strcmp(a: *const c_char, b: *const c_char) -> c_int {
    if a.is_null() || b.is_null() {
        return if a == b { 0 } else if a.is_null() { -1 } else { 1 };
    }
    let (sa, sb) = (CStr::from_ptr(a).to_bytes(), CStr::from_ptr(b).to_bytes());
    match sa.cmp(sb) {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    }
}

unsafe extern "C" fn host_get_seed32(ctx: *mut c_void) -> u32 {
    let state = &*(ctx as *const HostState);
    match state.entropy.seed32(state.thread_ord) {
        Ok(s) => s,
        Err(e) => {
            warn!("seed32 request failed, returning 0: {e}");
            0
        }
    }
}

unsafe extern "C" fn host_get_seed64(ctx: *mut c_void) -> u64 {
    let state = &*(ctx as *const HostState);
    match state.entropy.seed64(state.thread_ord) {
        Ok(s) => s,
        Err(e) => {
            warn!("seed64 request failed, returning 0: {e}");
            0
        }
    }
}

unsafe extern "C" fn host_get_param(ctx: *mut c_void) -> *const c_char {
    let state = &*(ctx as *const HostState);
    match &state.param {
        Some(p) => p.as_ptr(),
        None => std::ptr::null(),
    }
}

unsafe extern "C" fn host_get_ram_info(ctx: *mut c_void, out: *mut RawRamInfo) {
    let state = &*(ctx as *const HostState);
    if !out.is_null() {
        out.write(state.ram.into());
    }
}

/// Query the host's view of physical RAM (used by
/// `fastsort64`'s dispatch). Falls back to `RamInfo::default()` (both
/// fields `None`) on platforms where this crate has no reliable probe.
pub fn probe_ram_info() -> RamInfo {
    #[cfg(target_os = "linux")]
    {
        if let Ok(text) = std::fs::read_to_string("/proc/meminfo") {
            let mut total = None;
            let mut available = None;
            for line in text.lines() {
                if let Some(kb) = line.strip_prefix("MemTotal:") {
                    total = parse_meminfo_kb(kb);
                } else if let Some(kb) = line.strip_prefix("MemAvailable:") {
                    available = parse_meminfo_kb(kb);
                }
            }
            return RamInfo { total_bytes: total, available_bytes: available };
        }
    }
    RamInfo::default()
}

#[cfg(target_os = "linux")]
fn parse_meminfo_kb(field: &str) -> Option<u64> {
    field.trim().strip_suffix("kB").and_then(|n| n.trim().parse::<u64>().ok()).map(|kb| kb * 1024)
}

#[cfg(test)]
pub fn test_caller_api() -> CallerApi {
    let host = Box::leak(Box::new(Host::new(
        Arc::new(Entropy::new()),
        0,
        None,
        RamInfo::default(),
    )));
    host.caller_api()
}
