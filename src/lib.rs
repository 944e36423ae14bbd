// Copyright 2024 Developers of the SmokeRand project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! An empirical test suite for deciding whether a PRNG's output behaves
//! like a stream of independent uniform bits.
//!
//! This crate is the engine: configuration, the entropy service, the
//! generator/filter abstraction, the dynamic plugin loader, the
//! statistical test library, the battery scheduler and thread dispatcher,
//! and the reporter. It has no `main` of its own — a front end (out of
//! scope here) parses `argv`, builds a [`config::SmokeRandSettings`],
//! resolves a generator (built-in, plugin, or `stdin`), resolves a battery
//! (fixed, custom, or shared-object), and calls [`run`].
//!
//! ```no_run
//! use smokerand::config::SmokeRandSettings;
//!
//! let mut settings = SmokeRandSettings::new();
//! settings.apply_arg("--nthreads=4").unwrap();
//!
//! let generator = smokerand_refgen::descriptor();
//! let battery = smokerand::battery::default_battery();
//!
//! let report = smokerand::run(&generator, &battery, &settings).unwrap();
//! print!("{report}");
//! ```

pub mod battery;
pub mod bitops;
pub mod config;
pub mod custom_battery;
pub mod dispatcher;
pub mod entropy;
pub mod generator;
pub mod hostapi;
pub mod io;
pub mod model;
pub mod plugin;
pub mod reporter;
pub mod sort;
pub mod specfn;
pub mod statistics;

use std::sync::Arc;

use smokerand_core::{GeneratorDescriptor, SmokeError, SmokeResult};

use crate::battery::BatteryRun;
use crate::config::SmokeRandSettings;
use crate::entropy::Entropy;
use crate::model::Battery;

/// Run one battery against one generator end to end: seed the entropy
/// service from `settings.seed` (or OS entropy if none was given), self-test
/// the entropy core, dispatch the battery across the configured thread
/// count, and render the report.
///
/// This is the single call a front end needs for the common case; building
/// a [`BatteryRun`] directly (via [`battery::run_battery`]) and rendering it
/// separately (via [`reporter::render_report`]) is equivalent and lets a
/// caller inspect results before printing them.
pub fn run(
    generator: &GeneratorDescriptor,
    battery: &Battery,
    settings: &SmokeRandSettings,
) -> SmokeResult<String> {
    let entropy = Arc::new(Entropy::new());
    match &settings.seed {
        Some(s) => entropy.set_base64_seed(s).or_else(|_| {
            entropy.set_textseed(s);
            Ok::<(), SmokeError>(())
        })?,
        None => entropy.set_textseed(&format!("{}/{}", generator.name, battery.name)),
    }

    if !entropy.self_test() {
        return Err(SmokeError::SelfTest("entropy core self-test failed".into()));
    }
    if !generator.self_test() {
        return Err(SmokeError::SelfTest(format!("generator `{}` self-test failed", generator.name)));
    }

    let generator = match &settings.filter {
        Some(kind) => generator::apply_filter(*kind, generator.clone())?,
        None => generator.clone(),
    };

    let ram = hostapi::probe_ram_info();
    let run: BatteryRun = battery::run_battery(battery, &generator, settings, &entropy, ram);
    Ok(reporter::render_report(&run, &entropy, settings.report_verbosity))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_end_to_end_produces_a_readable_report() {
        let generator = smokerand_refgen::descriptor();
        let battery = battery::dummy_battery();
        let mut settings = SmokeRandSettings::new();
        settings.nthreads = 1;
        settings.seed = Some("lib-integration-test".into());

        let report = run(&generator, &battery, &settings).unwrap();
        assert!(report.contains("battery verdict"));
        assert!(report.contains("seed log"));
    }

    #[test]
    fn run_rejects_incompatible_filter() {
        let generator = generator::high32_filter(smokerand_refgen::descriptor()).unwrap();
        let battery = battery::dummy_battery();
        let mut settings = SmokeRandSettings::new();
        settings.filter = Some(config::FilterKind::Interleaved32);
        assert!(run(&generator, &battery, &settings).is_err());
    }
}
