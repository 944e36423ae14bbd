// Copyright 2024 Developers of the SmokeRand project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Plugin ABI vocabulary for SmokeRand.
//!
//! This crate is of interest mainly to authors of generator plugins and to
//! the engine itself; other users should depend on the top-level `smokerand`
//! crate. It defines:
//!
//! - [`ffi::RawGeneratorInfo`] and [`ffi::CallerApi`], the `#[repr(C)]`
//!   records a dynamically-loaded plugin is compiled against (the "plugin
//!   ABI"). These stay plain bundles of function
//!   pointers because they cross a dynamic-loading boundary between
//!   independently compiled modules; no amount of internal trait-object
//!   plumbing can replace that.
//! - [`GenState`] and [`GeneratorDescriptor`], the safe, owning
//!   abstractions the engine actually programs against once a plugin has
//!   been resolved (or, for one built in, without ever touching `ffi` at
//!   all).
//! - [`Word`], the uniform 32-or-64-bit value every generator call yields.
//! - [`SmokeError`], the error vocabulary shared by every fallible surface
//!   in the workspace.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_debug_implementations)]

extern crate alloc;

pub mod ffi;

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use core::fmt;

/// A single draw from a generator: either a native 32-bit or 64-bit word.
///
/// Every [`GenState`] commits, at construction time, to one width; `Word`
/// just carries that choice through a single return type so filters and
/// tests don't need two parallel call paths.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Word {
    U32(u32),
    U64(u64),
}

impl Word {
    /// Width in bits: always 32 or 64.
    #[inline]
    pub fn bits(self) -> u32 {
        match self {
            Word::U32(_) => 32,
            Word::U64(_) => 64,
        }
    }

    /// Widen to `u64`, zero-extending a 32-bit word.
    #[inline]
    pub fn as_u64(self) -> u64 {
        match self {
            Word::U32(v) => v as u64,
            Word::U64(v) => v,
        }
    }

    /// Truncate to the low 32 bits.
    #[inline]
    pub fn as_u32(self) -> u32 {
        match self {
            Word::U32(v) => v,
            Word::U64(v) => v as u32,
        }
    }
}

/// Capability handle for one instantiated generator.
///
/// The engine treats this purely as an opaque capability offering `next`,
/// and optionally a self-test and a bulk-sum shortcut: it never assumes a
/// common field layout, matching the requirement that a
/// generator's state be a private, tagged-variant or trait-object value.
/// Implementations must guarantee `next` is only ever called by the single
/// worker thread that owns this instance.
pub trait GenState: Send {
    /// Width of every [`Word`] this instance yields. Fixed for the
    /// lifetime of the instance.
    fn nbits(&self) -> u32;

    /// Draw the next output word, advancing internal state.
    fn next(&mut self) -> Word;

    /// Optional bulk-sum shortcut: sum `n` consecutive outputs without
    /// materializing them individually. `None` if the generator has no
    /// faster-than-looping implementation.
    fn bulk_sum(&mut self, _n: u64) -> Option<u64> {
        None
    }
}

type CreateFn = dyn Fn(&ffi::CallerApi) -> Box<dyn GenState> + Send + Sync;
type SelfTestFn = dyn Fn() -> bool + Send + Sync;

/// A generator descriptor: the externally-visible record of a generator's
/// operations and attributes.
///
/// `Clone` is cheap (an `Arc` bump) so the same descriptor can be handed to
/// every worker thread, each of which calls [`GeneratorDescriptor::create`]
/// to obtain its own, unshared [`GenState`].
#[derive(Clone)]
pub struct GeneratorDescriptor {
    pub name: String,
    pub description: String,
    nbits: u32,
    create: Arc<CreateFn>,
    self_test: Option<Arc<SelfTestFn>>,
    /// The wrapped (unfiltered) source, if this descriptor is a filter.
    pub parent: Option<Box<GeneratorDescriptor>>,
}

impl fmt::Debug for GeneratorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorDescriptor")
            .field("name", &self.name)
            .field("nbits", &self.nbits)
            .field("has_parent", &self.parent.is_some())
            .finish_non_exhaustive()
    }
}

impl GeneratorDescriptor {
    /// Build a new leaf (non-filter) descriptor.
    ///
    /// # Panics
    /// Panics if `nbits` is not 32 or 64 — the invariant
    /// `nbits ∈ {32, 64}` is checked once, at construction, so every other
    /// piece of code can rely on it unconditionally.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        nbits: u32,
        create: impl Fn(&ffi::CallerApi) -> Box<dyn GenState> + Send + Sync + 'static,
    ) -> Self {
        assert!(nbits == 32 || nbits == 64, "generator nbits must be 32 or 64");
        GeneratorDescriptor {
            name: name.into(),
            description: description.into(),
            nbits,
            create: Arc::new(create),
            self_test: None,
            parent: None,
        }
    }

    /// Build a filter descriptor wrapping `parent`. `nbits` is the
    /// *filter's* own output width (which may differ from the parent's,
    /// e.g. the interleaved-32 filter over a 64-bit parent still emits
    /// 32-bit words).
    pub fn new_filter(
        name: impl Into<String>,
        description: impl Into<String>,
        nbits: u32,
        parent: GeneratorDescriptor,
        create: impl Fn(&ffi::CallerApi) -> Box<dyn GenState> + Send + Sync + 'static,
    ) -> Self {
        assert!(nbits == 32 || nbits == 64, "generator nbits must be 32 or 64");
        GeneratorDescriptor {
            name: name.into(),
            description: description.into(),
            nbits,
            create: Arc::new(create),
            self_test: None,
            parent: Some(Box::new(parent)),
        }
    }

    pub fn with_self_test(mut self, self_test: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.self_test = Some(Arc::new(self_test));
        self
    }

    /// Native output width: 32 or 64.
    #[inline]
    pub fn nbits(&self) -> u32 {
        self.nbits
    }

    /// Instantiate one, unshared generator state. The caller owns the
    /// returned state exclusively for its whole lifetime.
    pub fn instantiate(&self, host: &ffi::CallerApi) -> Box<dyn GenState> {
        (self.create)(host)
    }

    /// Run the descriptor's self-test, if it declares one. Returns `true`
    /// (vacuously) if there is none.
    pub fn self_test(&self) -> bool {
        match &self.self_test {
            Some(f) => f(),
            None => true,
        }
    }
}

/// Total and available physical RAM, as reported by the host
/// (`get_ram_info`). `None` means "unknown", the
/// sentinel this API calls for rather than a guessed value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RamInfo {
    pub total_bytes: Option<u64>,
    pub available_bytes: Option<u64>,
}

/// The four configuration/infrastructure error kinds,
/// plus `Io` for the file-I/O helpers, which this list does
/// not otherwise classify.
#[derive(thiserror::Error, Debug)]
pub enum SmokeError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("plugin error: {0}")]
    Plugin(String),

    #[error("self-test failed: {0}")]
    SelfTest(String),

    #[error("resource shortage: {0}")]
    ResourceShortage(String),

    #[cfg(feature = "std")]
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SmokeResult<T> = Result<T, SmokeError>;
