// Copyright 2024 Developers of the SmokeRand project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The thread dispatcher: worker creation/join,
//! current-handle query, and named-mutex lifecycle, behind one small
//! interface so the battery engine never touches `std::thread` directly.
//!
//! Scheduling model: preemptive OS threads, one per worker; workers never
//! suspend voluntarily. The only synchronisation points are named-mutex
//! acquisitions inside shared services (entropy, the serialised `printf`
//! sink) — no lock is ever held across a generator `next` call.

use std::cell::Cell;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{self, JoinHandle};

thread_local! {
    static CURRENT_ORDINAL: Cell<Option<u32>> = const { Cell::new(None) };
}

/// The calling thread's worker ordinal, if it was spawned via
/// [`spawn_worker`] (or is running a single-threaded fallback that set it
/// explicitly); `None` on the original/main thread.
pub fn current_ordinal() -> Option<u32> {
    CURRENT_ORDINAL.with(|c| c.get())
}

/// A handle to one spawned worker ("Create a worker
/// ... Join a handle").
pub struct WorkerHandle {
    join: JoinHandle<()>,
}

/// Spawn a worker running `f(ordinal)` on its own OS thread, with
/// [`current_ordinal`] returning `Some(ordinal)` for the duration of `f`.
pub fn spawn_worker<F>(ordinal: u32, f: F) -> WorkerHandle
where
    F: FnOnce(u32) + Send + 'static,
{
    let join = thread::Builder::new()
        .name(format!("smokerand-worker-{ordinal}"))
        .spawn(move || {
            CURRENT_ORDINAL.with(|c| c.set(Some(ordinal)));
            f(ordinal);
        })
        .expect("failed to spawn worker thread");
    WorkerHandle { join }
}

impl WorkerHandle {
    /// Wait for this worker to finish. Panics propagated from the worker
    /// are swallowed here (matching the battery engine's "tests never
    /// abort the battery" contract) but logged.
    pub fn join(self) {
        if self.join.join().is_err() {
            log::error!("a worker thread panicked; its results are incomplete");
        }
    }
}

/// Run `f(0)` in-line on the calling thread, for platforms without threads
/// or for the single-test/single-worker degenerate case (the
/// "Single-threaded fallback").
pub fn run_inline<F: FnOnce(u32)>(f: F) {
    CURRENT_ORDINAL.with(|c| c.set(Some(0)));
    f(0);
    CURRENT_ORDINAL.with(|c| c.set(None));
}

/// Named mutex registry ("Named mutex lifecycle:
/// declare / initialise (at most once, idempotent) / lock / unlock /
/// destroy"). Backed by one process-wide table so any two callers naming
/// the same string contend on the same lock regardless of how they
/// obtained the name.
static REGISTRY: OnceLock<Mutex<HashMap<String, Arc<Mutex<()>>>>> = OnceLock::new();

fn registry() -> &'static Mutex<HashMap<String, Arc<Mutex<()>>>> {
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Declare/initialise the named mutex `name`. Idempotent: a second
/// declaration of an already-declared name is a no-op.
pub fn declare_mutex(name: &str) {
    let mut reg = registry().lock().unwrap();
    reg.entry(name.to_string()).or_insert_with(|| Arc::new(Mutex::new(())));
}

/// Run `f` with the named mutex `name` held, declaring it first if
/// necessary. This is the only way callers acquire a named mutex — there
/// is no bare `lock`/`unlock` pair exposed, so a held lock can never
/// outlive the scope that requested it.
pub fn with_named_mutex<R>(name: &str, f: impl FnOnce() -> R) -> R {
    declare_mutex(name);
    let handle = {
        let reg = registry().lock().unwrap();
        Arc::clone(reg.get(name).expect("just declared"))
    };
    let _guard = handle.lock().unwrap();
    f()
}

/// Remove the named mutex `name` from the registry. A later
/// [`with_named_mutex`] call for the same name re-declares a fresh,
/// unrelated lock.
pub fn destroy_mutex(name: &str) {
    registry().lock().unwrap().remove(name);
}
