// Copyright 2024 Developers of the SmokeRand project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The reporter: p-value classification, the
//! full/brief report renderers, and the battery-level verdict.

use std::fmt::Write as _;

use crate::battery::BatteryRun;
use crate::config::ReportVerbosity;
use crate::entropy::{Entropy, SeedLogEntry};
use crate::model::TestResult;

/// One test row's classification.
///
/// Bands: `PASSED` for `p` in `(1e-3, 1 - 1e-3)`; `WARNING` for `p` in
/// `(1e-10, 1e-3] ∪ [1 - 1e-3, 1 - 1e-10)`; `FAILED` otherwise, including
/// `NaN`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    Warning,
    Failed,
}

impl Verdict {
    pub fn classify(p: f64) -> Self {
        if p.is_nan() {
            return Verdict::Failed;
        }
        if p > 1e-3 && p < 1.0 - 1e-3 {
            Verdict::Passed
        } else if (p > 1e-10 && p <= 1e-3) || (p >= 1.0 - 1e-3 && p < 1.0 - 1e-10) {
            Verdict::Warning
        } else {
            Verdict::Failed
        }
    }

    fn label(self) -> &'static str {
        match self {
            Verdict::Passed => "PASSED",
            Verdict::Warning => "WARNING",
            Verdict::Failed => "FAILED",
        }
    }
}

/// The overall outcome of one battery run, rolled up from its rows'
/// verdicts and penalties (a battery fails once the
/// accumulated penalty of its non-`PASSED` rows reaches a threshold).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatteryVerdict {
    Passed,
    Failed,
    /// No test ran at all (an empty or entirely-selected-out battery).
    Error,
}

impl BatteryVerdict {
    fn label(self) -> &'static str {
        match self {
            BatteryVerdict::Passed => "PASSED",
            BatteryVerdict::Failed => "FAILED",
            BatteryVerdict::Error => "ERROR",
        }
    }
}

/// The suggested penalty threshold a battery's accumulated non-`PASSED`
/// penalty must reach before the whole run is declared `FAILED`.
pub const DEFAULT_PENALTY_THRESHOLD: f64 = 10.0;

/// Sum the penalties of every non-`PASSED` row, and classify the battery
/// against `threshold`: `FAILED` if any row is itself `FAILED` or the
/// accumulated penalty reaches `threshold`, `PASSED` otherwise.
pub fn battery_verdict(results: &[TestResult], threshold: f64) -> BatteryVerdict {
    if results.is_empty() {
        return BatteryVerdict::Error;
    }
    let mut any_failed = false;
    let mut accumulated = 0.0;
    for r in results {
        match Verdict::classify(r.p) {
            Verdict::Failed => {
                any_failed = true;
                accumulated += r.penalty;
            }
            Verdict::Warning => accumulated += r.penalty,
            Verdict::Passed => {}
        }
    }
    if any_failed || accumulated >= threshold {
        BatteryVerdict::Failed
    } else {
        BatteryVerdict::Passed
    }
}

fn format_p(p: f64) -> String {
    if p.is_nan() {
        "NAN".to_string()
    } else {
        format!("{p:.6}")
    }
}

/// Render one [`BatteryRun`] as a human-readable report: generator name,
/// category counts, elapsed time, the seed log, and
/// one row per test — every row in [`ReportVerbosity::Full`], only
/// `WARNING`/`FAILED` rows in [`ReportVerbosity::Brief`].
pub fn render_report(run: &BatteryRun, entropy: &Entropy, verbosity: ReportVerbosity) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "generator: {}", run.generator_name);
    let _ = writeln!(out, "battery:   {}", run.battery_name);
    let _ = writeln!(out, "elapsed:   {:.3}s", run.elapsed.as_secs_f64());

    let mut passed = 0u32;
    let mut warning = 0u32;
    let mut failed = 0u32;
    for r in &run.results {
        match Verdict::classify(r.p) {
            Verdict::Passed => passed += 1,
            Verdict::Warning => warning += 1,
            Verdict::Failed => failed += 1,
        }
    }
    let _ = writeln!(
        out,
        "summary:   {passed} passed, {warning} warning, {failed} failed (of {})",
        run.results.len()
    );
    out.push('\n');

    for r in &run.results {
        let verdict = Verdict::classify(r.p);
        if verbosity == ReportVerbosity::Brief && verdict == Verdict::Passed {
            continue;
        }
        let _ = writeln!(
            out,
            "[{:>3}] {:<24} x={:>14.6} p={:<12} {:<7} (thread {})",
            r.id,
            r.name,
            r.x,
            format_p(r.p),
            verdict.label(),
            r.thread_ord,
        );
    }

    out.push('\n');
    let verdict = battery_verdict(&run.results, DEFAULT_PENALTY_THRESHOLD);
    let _ = writeln!(out, "battery verdict: {}", verdict.label());

    out.push('\n');
    out.push_str(&render_seed_log(entropy));
    out
}

fn render_seed_log(entropy: &Entropy) -> String {
    let log = entropy.seed_log();
    let mut out = String::new();
    let _ = writeln!(out, "seed log ({} entries):", log.len());
    for SeedLogEntry { thread_ord, call_count, seed } in log {
        let _ = writeln!(out, "  thread={thread_ord} call={call_count} seed={seed:#018x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_bands_match_boundaries() {
        assert_eq!(Verdict::classify(0.5), Verdict::Passed);
        assert_eq!(Verdict::classify(1e-3), Verdict::Warning);
        assert_eq!(Verdict::classify(1e-3 + 1e-9), Verdict::Passed);
        assert_eq!(Verdict::classify(1e-10 + 1e-12), Verdict::Warning);
        assert_eq!(Verdict::classify(1e-11), Verdict::Failed);
        assert_eq!(Verdict::classify(1.0 - 1e-3), Verdict::Warning);
        assert_eq!(Verdict::classify(f64::NAN), Verdict::Failed);
    }

    #[test]
    fn battery_verdict_accumulates_penalties() {
        let results = vec![
            TestResult::new("a", 1, 0.0, 1e-5, 4.0, 0),
            TestResult::new("b", 2, 0.0, 1e-5, 4.0, 0),
            TestResult::new("c", 3, 0.0, 1e-5, 4.0, 0),
        ];
        assert_eq!(battery_verdict(&results, DEFAULT_PENALTY_THRESHOLD), BatteryVerdict::Failed);

        let results = vec![TestResult::new("a", 1, 0.0, 0.5, 4.0, 0)];
        assert_eq!(battery_verdict(&results, DEFAULT_PENALTY_THRESHOLD), BatteryVerdict::Passed);
    }

    #[test]
    fn any_failed_row_fails_the_battery_regardless_of_penalty() {
        // A constant-zero generator's monobit row (p well below 1e-10,
        // penalty 4.0) alongside an otherwise clean run.
        let results = vec![
            TestResult::new("monobit_freq", 1, 0.0, 1e-300, 4.0, 0),
            TestResult::new("byte_freq", 2, 0.0, 0.5, 4.0, 0),
        ];
        assert_eq!(battery_verdict(&results, DEFAULT_PENALTY_THRESHOLD), BatteryVerdict::Failed);

        // A FAILED `matrixrank` row with a low penalty (0.25) must still
        // fail the battery even though its own weight is far under threshold.
        let results = vec![
            TestResult::new("matrixrank_low", 1, 0.0, 0.0, 0.25, 0),
            TestResult::new("byte_freq", 2, 0.0, 0.5, 4.0, 0),
        ];
        assert_eq!(battery_verdict(&results, DEFAULT_PENALTY_THRESHOLD), BatteryVerdict::Failed);
    }

    #[test]
    fn empty_results_are_an_error_verdict() {
        assert_eq!(battery_verdict(&[], DEFAULT_PENALTY_THRESHOLD), BatteryVerdict::Error);
    }

    #[test]
    fn nan_p_value_renders_as_nan_literal() {
        assert_eq!(format_p(f64::NAN), "NAN");
        assert_ne!(format_p(0.5), "NAN");
    }

    #[test]
    fn brief_report_omits_passed_rows() {
        use crate::battery::BatteryRun;

        let run = BatteryRun {
            battery_name: "synthetic".into(),
            generator_name: "synthetic-gen".into(),
            results: vec![
                TestResult::new("ok", 1, 0.0, 0.5, 1.0, 0),
                TestResult::new("bad", 2, 0.0, 1e-6, 1.0, 0),
            ],
            elapsed: std::time::Duration::from_millis(1),
        };
        let entropy = Entropy::new();
        entropy.set_textseed("reporter-test");

        let brief = render_report(&run, &entropy, ReportVerbosity::Brief);
        assert!(!brief.contains("] ok "));
        assert!(brief.contains("] bad "));

        let full = render_report(&run, &entropy, ReportVerbosity::Full);
        assert!(full.contains("] ok "));
        assert!(full.contains("] bad "));
    }
}
