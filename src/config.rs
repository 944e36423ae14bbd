// Copyright 2024 Developers of the SmokeRand project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! `SmokeRandSettings` ("Configuration") and its
//! `--key=value` token parser.
//!
//! Argument *parsing* in the sense of tokenizing `argv` is the front end's
//! job; this module is what the front end hands its
//! tokens to, one at a time, via [`SmokeRandSettings::apply_arg`].

use smokerand_core::{SmokeError, SmokeResult};

/// One of the four output filters a generator's stream may be wrapped in
/// Filters applied to a generator's raw output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterKind {
    ReverseBits,
    Interleaved32,
    High32,
    Low32,
}

impl FilterKind {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "reverse-bits" => Some(FilterKind::ReverseBits),
            "interleaved32" => Some(FilterKind::Interleaved32),
            "high32" => Some(FilterKind::High32),
            "low32" => Some(FilterKind::Low32),
            _ => None,
        }
    }
}

/// Mutually exclusive test selector: by 1-based id, or by name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TestSelector {
    All,
    Id(u32),
    Name(String),
}

/// Report verbosity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ReportVerbosity {
    #[default]
    Full,
    Brief,
}

/// The engine's full configuration surface.
#[derive(Clone, Debug)]
pub struct SmokeRandSettings {
    pub nthreads: usize,
    pub test_selector: TestSelector,
    pub param: Option<String>,
    pub batparam: Option<String>,
    pub seed: Option<String>,
    pub filter: Option<FilterKind>,
    pub maxlen_log2: Option<u32>,
    pub report_verbosity: ReportVerbosity,
}

impl Default for SmokeRandSettings {
    fn default() -> Self {
        SmokeRandSettings {
            nthreads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            test_selector: TestSelector::All,
            param: None,
            batparam: None,
            seed: None,
            filter: None,
            maxlen_log2: None,
            report_verbosity: ReportVerbosity::Full,
        }
    }
}

impl SmokeRandSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one `--key=value` (or bare `--flag`) token. Unknown keys are a
    /// fatal `SmokeError::Configuration`.
    pub fn apply_arg(&mut self, arg: &str) -> SmokeResult<()> {
        let err = |msg: String| SmokeError::Configuration(msg);

        if arg == "--threads" {
            self.nthreads = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1);
            return Ok(());
        }
        if arg == "--report-brief" {
            self.report_verbosity = ReportVerbosity::Brief;
            return Ok(());
        }

        let Some((key, value)) = arg.split_once('=') else {
            return Err(err(format!("unrecognised option `{arg}`")));
        };

        match key {
            "--nthreads" => {
                let n: usize = value
                    .parse()
                    .map_err(|_| err(format!("--nthreads expects an integer, got `{value}`")))?;
                if n == 0 {
                    return Err(err("--nthreads must be at least 1".into()));
                }
                self.nthreads = n;
            }
            "--testid" => {
                let id: u32 = value
                    .parse()
                    .map_err(|_| err(format!("--testid expects an integer, got `{value}`")))?;
                self.test_selector = TestSelector::Id(id);
            }
            "--testname" => {
                self.test_selector = TestSelector::Name(value.to_string());
            }
            "--param" => {
                // The plugin's own `--param=` value (e.g. `aesni`, `c99`,
                // `vector`) is forwarded verbatim through `get_param()`; the
                // engine does not interpret it.
                self.param = Some(value.to_string());
            }
            "--batparam" => {
                self.batparam = Some(value.to_string());
            }
            "--filter" => {
                self.filter = Some(
                    FilterKind::parse(value)
                        .ok_or_else(|| err(format!("unknown filter `{value}`")))?,
                );
            }
            "--seed" => {
                self.seed = Some(value.to_string());
            }
            "--maxlen_log2" => {
                let n: u32 = value.parse().map_err(|_| {
                    err(format!("--maxlen_log2 expects an integer, got `{value}`"))
                })?;
                self.maxlen_log2 = Some(n);
            }
            _ => return Err(err(format!("unrecognised option `{key}`"))),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_key() {
        let mut s = SmokeRandSettings::new();
        assert!(s.apply_arg("--bogus=1").is_err());
    }

    #[test]
    fn testid_and_testname_both_settable_last_wins() {
        let mut s = SmokeRandSettings::new();
        s.apply_arg("--testid=3").unwrap();
        assert_eq!(s.test_selector, TestSelector::Id(3));
        s.apply_arg("--testname=monobit_freq").unwrap();
        assert_eq!(s.test_selector, TestSelector::Name("monobit_freq".into()));
    }

    #[test]
    fn filter_rejects_invalid_name() {
        let mut s = SmokeRandSettings::new();
        assert!(s.apply_arg("--filter=bogus").is_err());
        s.apply_arg("--filter=high32").unwrap();
        assert_eq!(s.filter, Some(FilterKind::High32));
    }

    #[test]
    fn nthreads_rejects_zero() {
        let mut s = SmokeRandSettings::new();
        assert!(s.apply_arg("--nthreads=0").is_err());
    }

    #[test]
    fn param_and_batparam_are_independent() {
        let mut s = SmokeRandSettings::new();
        s.apply_arg("--param=aesni").unwrap();
        s.apply_arg("--batparam=n=1000").unwrap();
        assert_eq!(s.param.as_deref(), Some("aesni"));
        assert_eq!(s.batparam.as_deref(), Some("n=1000"));
    }
}
