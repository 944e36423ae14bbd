// Copyright 2024 Developers of the SmokeRand project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The battery engine: the fixed built-in
//! batteries, the name -> [`TestDescription`] registry the custom-battery
//! parser resolves against, the serpentine scheduler, and
//! [`run_battery`], which drives a battery to completion across the
//! thread pool and returns the results the reporter consumes.

use std::sync::{Arc, Mutex};

use log::debug;
use smokerand_core::ffi::CallerApi;
use smokerand_core::{GeneratorDescriptor, RamInfo};

use crate::config::{SmokeRandSettings, TestSelector};
use crate::dispatcher;
use crate::entropy::Entropy;
use crate::hostapi::Host;
use crate::model::{Battery, TestDescription, TestResult};
use crate::statistics;

// --- the test registry --------------------------------------------------

/// Every test instance the built-in batteries draw from, named exactly as
/// `--testname=` expects to find it.
///
/// Sample sizes here are deliberately modest next to the multi-gigabyte
/// volumes a thorough run would use; a front end building a production battery would scale these up
/// (e.g. via a `--batparam=` multiplier) without changing which tests
/// exist or how they are named.
pub fn all_test_descriptions() -> Vec<TestDescription> {
    use statistics::HammingSubmode::*;
    use statistics::IsingAlgorithm::*;

    vec![
        TestDescription::new("monobit_freq", 4.0, 1.0, |g| statistics::monobit_freq(g, 200_000)),
        TestDescription::new("byte_freq", 4.0, 2.0, |g| statistics::byte_freq(g, 2_000_000)),
        TestDescription::new("word16_freq", 4.0, 4.0, |g| statistics::word16_freq(g, 4_000_000)),
        TestDescription::new("gap8", 4.0, 2.0, |g| statistics::gap(g, 8, 20_000)),
        TestDescription::new("gap16", 4.0, 3.0, |g| statistics::gap(g, 16, 5_000)),
        TestDescription::new("bspace_2d_24b", 3.0, 3.0, |g| statistics::bspace_nd(g, 2, 24, 20_000)),
        TestDescription::new("bspace_3d_16b", 3.0, 3.0, |g| statistics::bspace_nd(g, 3, 16, 20_000)),
        TestDescription::new("bspace8_8d_decimated", 1.0, 4.0, |g| {
            statistics::bspace8_8d_decimated(g, 10_000, 2)
        }),
        TestDescription::new("collisionover_k16", 3.0, 3.0, |g| {
            statistics::collisionover(g, 16, 200_000)
        }),
        TestDescription::new("collisionover_k20", 3.0, 4.0, |g| {
            statistics::collisionover(g, 20, 200_000)
        }),
        TestDescription::new("birthday", 2.0, 3.0, |g| statistics::birthday(g, 35, 20_000)),
        TestDescription::new("hamming_dc6_bytes", 2.0, 2.0, |g| {
            statistics::hamming_dc6(g, Bytes, 100_000)
        }),
        TestDescription::new("hamming_dc6_even_bits", 2.0, 2.0, |g| {
            statistics::hamming_dc6(g, EvenBits, 100_000)
        }),
        TestDescription::new("hamming_dc6_odd_bits", 2.0, 2.0, |g| {
            statistics::hamming_dc6(g, OddBits, 100_000)
        }),
        TestDescription::new("hamming_dc6_nibbles", 2.0, 2.0, |g| {
            statistics::hamming_dc6(g, Nibbles, 100_000)
        }),
        TestDescription::new("matrixrank_low", 0.25, 3.0, |g| {
            statistics::matrixrank(g, 32, 32, 4_000, false)
        }),
        TestDescription::new("matrixrank_high", 0.25, 3.0, |g| {
            statistics::matrixrank(g, 32, 32, 4_000, true)
        }),
        TestDescription::new("linearcomp", 0.25, 5.0, |g| statistics::linearcomp(g, 1000, 500)),
        TestDescription::new("ising2d_metropolis", 4.0, 6.0, |g| {
            statistics::ising2d(g, Metropolis, 16, 400)
        }),
        TestDescription::new("ising2d_wolff", 4.0, 5.0, |g| statistics::ising2d(g, Wolff, 16, 400)),
        TestDescription::new("unitsphere_3d", 2.0, 2.0, |g| statistics::unitsphere(g, 3, 50_000)),
        TestDescription::new("unitsphere_8d", 2.0, 3.0, |g| statistics::unitsphere(g, 8, 50_000)),
    ]
}

/// Look up one test by name in the registry ("The
/// parser resolves `test` names against a registry mapping name -> test
/// descriptor").
pub fn find_test(name: &str) -> Option<TestDescription> {
    all_test_descriptions().into_iter().find(|t| t.name == name)
}

fn by_names(names: &[&str]) -> Vec<TestDescription> {
    names
        .iter()
        .map(|n| find_test(n).unwrap_or_else(|| panic!("built-in battery referenced unknown test `{n}`")))
        .collect()
}

/// `express`: the smallest general-purpose battery (
/// approximately 64 MiB of generator output in a production sizing).
pub fn express_battery() -> Battery {
    Battery::new("express", by_names(&["monobit_freq", "byte_freq", "gap8", "birthday"]))
}

/// `brief`: a step up from `express`, still fast.
pub fn brief_battery() -> Battery {
    Battery::new(
        "brief",
        by_names(&[
            "monobit_freq",
            "byte_freq",
            "word16_freq",
            "gap8",
            "bspace_2d_24b",
            "birthday",
            "matrixrank_low",
        ]),
    )
}

/// `default`: the general-purpose battery (approximately
/// 128 GiB of generator output in a production sizing).
pub fn default_battery() -> Battery {
    Battery::new(
        "default",
        by_names(&[
            "monobit_freq",
            "byte_freq",
            "word16_freq",
            "gap8",
            "gap16",
            "bspace_2d_24b",
            "bspace_3d_16b",
            "collisionover_k16",
            "birthday",
            "hamming_dc6_bytes",
            "hamming_dc6_even_bits",
            "hamming_dc6_odd_bits",
            "matrixrank_low",
            "matrixrank_high",
            "ising2d_metropolis",
            "unitsphere_3d",
        ]),
    )
}

/// `full`: the union of `default` plus linear-complexity, a
/// higher-resolution collision variant, and a deeper birthday-spacings
/// variant (approximately 2 TiB of generator output in a
/// production sizing).
pub fn full_battery() -> Battery {
    let mut tests = default_battery().tests;
    tests.extend(by_names(&[
        "linearcomp",
        "collisionover_k20",
        "bspace8_8d_decimated",
        "hamming_dc6_nibbles",
        "ising2d_wolff",
        "unitsphere_8d",
    ]));
    Battery::new("full", tests)
}

/// `freq`: the single-family frequency battery.
pub fn freq_battery() -> Battery {
    Battery::new("freq", by_names(&["monobit_freq", "byte_freq", "word16_freq"]))
}

/// `birthday`: the single-family birthday-paradox battery.
pub fn birthday_battery() -> Battery {
    Battery::new("birthday", by_names(&["birthday"]))
}

/// `ising`: the single-family Ising-model battery.
pub fn ising_battery() -> Battery {
    Battery::new("ising", by_names(&["ising2d_metropolis", "ising2d_wolff"]))
}

/// `unitsphere`: the single-family unit-ball-volume battery.
pub fn unitsphere_battery() -> Battery {
    Battery::new("unitsphere", by_names(&["unitsphere_3d", "unitsphere_8d"]))
}

/// `dummy`: a trivial, always-passing single test used to smoke-test the
/// engine and thread pool wiring without exercising any real statistics.
pub fn dummy_battery() -> Battery {
    Battery::new(
        "dummy",
        vec![TestDescription::new("dummy_pass", 0.0, 1.0, |g| {
            let _ = g.next();
            (0.0, 0.5)
        })],
    )
}

/// Resolve one of the fixed battery names from the CLI
/// surface (`express`, `brief`, `default`, `full`, `birthday`, `ising`,
/// `freq`, `unitsphere`, `dummy`). Other battery forms (`f=`, `s=`, `help`,
/// `selftest`, `speed`, `stdout`) are the front end's concern and
/// are not resolved here.
pub fn resolve_fixed_battery(name: &str) -> Option<Battery> {
    match name {
        "express" => Some(express_battery()),
        "brief" => Some(brief_battery()),
        "default" => Some(default_battery()),
        "full" => Some(full_battery()),
        "freq" => Some(freq_battery()),
        "birthday" => Some(birthday_battery()),
        "ising" => Some(ising_battery()),
        "unitsphere" => Some(unitsphere_battery()),
        "dummy" => Some(dummy_battery()),
        _ => None,
    }
}

// --- scheduling ----------------------------------------------------------

/// Serpentine scheduling: sort test indices by
/// descending `estimated_cost`, then assign the `k`-th heaviest to worker
/// `k mod w` when `floor(k/w)` is even, else `w-1-(k mod w)`. Returns, per
/// worker, the list of battery indices (0-based) assigned to it, each
/// worker's own list already in heaviest-first order.
pub fn schedule(battery: &Battery, nworkers: usize) -> Vec<Vec<usize>> {
    let w = nworkers.max(1);
    let mut order: Vec<usize> = (0..battery.tests.len()).collect();
    order.sort_by(|&a, &b| {
        battery.tests[b]
            .estimated_cost
            .partial_cmp(&battery.tests[a].estimated_cost)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut assignment = vec![Vec::new(); w];
    for (k, &idx) in order.iter().enumerate() {
        let cycle = k / w;
        let pos = k % w;
        let worker = if cycle % 2 == 0 { pos } else { w - 1 - pos };
        assignment[worker].push(idx);
    }
    assignment
}

// --- running a battery -----------------------------------------------------

/// Everything the reporter needs once a battery run is complete.
pub struct BatteryRun {
    pub battery_name: String,
    pub generator_name: String,
    pub results: Vec<TestResult>,
    pub elapsed: std::time::Duration,
}

/// Select which tests actually run, per the "When a
/// specific `testid` or `testname` is selected, scheduling degenerates to
/// single-threaded execution".
fn select_tests(battery: &Battery, selector: &TestSelector) -> Battery {
    match selector {
        TestSelector::All => battery.clone(),
        TestSelector::Id(id) => {
            let idx = *id as usize;
            let tests = battery.tests.get(idx.wrapping_sub(1)).cloned().into_iter().collect();
            Battery::new(&battery.name, tests)
        }
        TestSelector::Name(name) => {
            let tests = battery.tests.iter().find(|t| &t.name == name).cloned().into_iter().collect();
            Battery::new(&battery.name, tests)
        }
    }
}

/// Run `battery` against `descriptor`, partitioning its tests across
/// `settings.nthreads` workers (or running single-threaded when a specific
/// test was selected), each worker instantiating its own generator state
/// seeded from `entropy`.
pub fn run_battery(
    battery: &Battery,
    descriptor: &GeneratorDescriptor,
    settings: &SmokeRandSettings,
    entropy: &Arc<Entropy>,
    ram: RamInfo,
) -> BatteryRun {
    let selected = select_tests(battery, &settings.test_selector);
    let single_threaded = !matches!(settings.test_selector, TestSelector::All);
    let nworkers = if single_threaded { 1 } else { settings.nthreads.max(1) };

    let start = std::time::Instant::now();
    let assignment = schedule(&selected, nworkers);
    debug!(
        "battery `{}`: {} test(s) across {} worker(s)",
        selected.name,
        selected.tests.len(),
        nworkers
    );

    let results: Arc<Mutex<Vec<TestResult>>> = Arc::new(Mutex::new(Vec::new()));
    let selected = Arc::new(selected);
    let param = settings.param.clone();

    if nworkers == 1 {
        let descriptor = descriptor.clone();
        dispatcher::run_inline(|ord| {
            run_worker_queue(&selected, &descriptor, &assignment[0], ord, entropy, ram, param.clone(), &results);
        });
    } else {
        let handles: Vec<_> = assignment
            .into_iter()
            .enumerate()
            .map(|(ord, queue)| {
                let selected = Arc::clone(&selected);
                let descriptor = descriptor.clone();
                let entropy = Arc::clone(entropy);
                let results = Arc::clone(&results);
                let param = param.clone();
                dispatcher::spawn_worker(ord as u32, move |ord| {
                    run_worker_queue(&selected, &descriptor, &queue, ord, &entropy, ram, param, &results);
                })
            })
            .collect();
        for h in handles {
            h.join();
        }
    }

    let mut results = Arc::try_unwrap(results).map(|m| m.into_inner().unwrap()).unwrap_or_default();
    // The reporter sorts by test id on emission; do it
    // here too so every consumer of `BatteryRun::results` sees battery
    // order regardless of completion order.
    results.sort_by_key(|r| r.id);

    BatteryRun {
        battery_name: battery.name.clone(),
        generator_name: descriptor.name.clone(),
        results,
        elapsed: start.elapsed(),
    }
}

fn run_worker_queue(
    battery: &Battery,
    descriptor: &GeneratorDescriptor,
    queue: &[usize],
    ord: u32,
    entropy: &Arc<Entropy>,
    ram: RamInfo,
    param: Option<String>,
    results: &Arc<Mutex<Vec<TestResult>>>,
) {
    let host = Host::new(Arc::clone(entropy), ord, param, ram);
    let api: CallerApi = host.caller_api();
    // One generator state serves every test this worker runs, in
    // scheduled order: tests never reset the stream between each other.
    let mut gen = descriptor.instantiate(&api);

    for &idx in queue {
        let test = &battery.tests[idx];
        let result = test.run(gen.as_mut(), idx as u32 + 1, ord);
        results.lock().unwrap().push(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_balances_serpentine_order() {
        let battery = dummy_battery();
        let mut tests = battery.tests.clone();
        for (i, t) in tests.iter_mut().enumerate() {
            t.estimated_cost = (i + 1) as f64;
        }
        let wide = Battery::new("synthetic", {
            let mut v = Vec::new();
            for i in 0..7 {
                v.push(TestDescription::new(format!("t{i}"), 0.0, (7 - i) as f64, |g| {
                    let _ = g.next();
                    (0.0, 0.5)
                }));
            }
            v
        });
        let assignment = schedule(&wide, 3);
        let total: usize = assignment.iter().map(|v| v.len()).sum();
        assert_eq!(total, 7);
        assert_eq!(assignment.len(), 3);
    }

    #[test]
    fn schedule_single_worker_gets_everything_in_cost_order() {
        let battery = Battery::new("synthetic", {
            vec![
                TestDescription::new("light", 0.0, 1.0, |g| {
                    let _ = g.next();
                    (0.0, 0.5)
                }),
                TestDescription::new("heavy", 0.0, 5.0, |g| {
                    let _ = g.next();
                    (0.0, 0.5)
                }),
            ]
        });
        let assignment = schedule(&battery, 1);
        assert_eq!(assignment, vec![vec![1, 0]]);
    }

    #[test]
    fn fixed_battery_names_all_resolve() {
        for name in [
            "express", "brief", "default", "full", "freq", "birthday", "ising", "unitsphere",
            "dummy",
        ] {
            let b = resolve_fixed_battery(name).unwrap();
            assert!(!b.is_empty(), "{name} battery unexpectedly empty");
        }
        assert!(resolve_fixed_battery("not-a-battery").is_none());
    }

    #[test]
    fn full_battery_is_superset_of_default() {
        let default_names: Vec<_> = default_battery().tests.iter().map(|t| t.name.clone()).collect();
        let full_names: Vec<_> = full_battery().tests.iter().map(|t| t.name.clone()).collect();
        for name in default_names {
            assert!(full_names.contains(&name));
        }
        assert!(full_names.len() > full_names.len().min(default_battery().tests.len()));
    }

    #[test]
    fn run_battery_single_threaded_covers_every_test() {
        use smokerand_refgen::descriptor as refgen_descriptor;

        let battery = dummy_battery();
        let descriptor = refgen_descriptor();
        let mut settings = SmokeRandSettings::new();
        settings.nthreads = 1;
        let entropy = Arc::new(Entropy::new());
        entropy.set_textseed("battery-engine-test");

        let run = run_battery(&battery, &descriptor, &settings, &entropy, RamInfo::default());
        assert_eq!(run.results.len(), 1);
        assert_eq!(run.results[0].id, 1);
    }

    #[test]
    fn run_battery_multi_threaded_covers_every_test_exactly_once() {
        use smokerand_refgen::descriptor as refgen_descriptor;

        let battery = default_battery();
        let descriptor = refgen_descriptor();
        let mut settings = SmokeRandSettings::new();
        settings.nthreads = 4;
        let entropy = Arc::new(Entropy::new());
        entropy.set_textseed("battery-engine-multithread-test");

        let run = run_battery(&battery, &descriptor, &settings, &entropy, RamInfo::default());
        let mut ids: Vec<u32> = run.results.iter().map(|r| r.id).collect();
        ids.sort_unstable();
        let expected: Vec<u32> = (1..=battery.tests.len() as u32).collect();
        assert_eq!(ids, expected);
        for r in &run.results {
            assert!((0.0..=1.0).contains(&r.p) || r.p.is_nan());
        }
    }

    #[test]
    fn testname_selection_runs_exactly_that_test() {
        use smokerand_refgen::descriptor as refgen_descriptor;

        let battery = default_battery();
        let descriptor = refgen_descriptor();
        let mut settings = SmokeRandSettings::new();
        settings.test_selector = TestSelector::Name("birthday".into());
        let entropy = Arc::new(Entropy::new());
        entropy.set_textseed("battery-engine-testname-test");

        let run = run_battery(&battery, &descriptor, &settings, &entropy, RamInfo::default());
        assert_eq!(run.results.len(), 1);
        assert_eq!(run.results[0].name, "birthday");
    }
}
