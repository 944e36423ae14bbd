// Copyright 2024 Developers of the SmokeRand project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The custom-battery parser: a small
//! record-oriented text format naming existing tests, plus the
//! shared-object form that hands the whole battery off to a plugin's
//! `battery_func` export.

use std::ffi::CString;
use std::path::Path;

use libloading::{Library, Symbol};
use log::debug;
use smokerand_core::ffi::{BatteryFuncFn, CallerApi, RawBatteryOptions};
use smokerand_core::{SmokeError, SmokeResult};

use crate::battery::find_test;
use crate::config::{SmokeRandSettings, TestSelector};
use crate::model::{Battery, TestDescription};

/// One parsed `test = ...` record (`test`, `options`,
/// and an optional `penalty` key; any other key is a fatal parse error).
#[derive(Clone, Debug, PartialEq)]
pub struct CustomTestRecord {
    pub test: String,
    pub options: Option<String>,
    pub penalty: Option<f64>,
}

/// Split `text` into blank-line-separated records, each a sequence of
/// `key = value` lines, and validate every key against the known set
/// (`test`, `options`, `penalty`).
pub fn parse_records(text: &str) -> SmokeResult<Vec<CustomTestRecord>> {
    let mut records = Vec::new();
    for block in text.split("\n\n") {
        let block = block.trim();
        if block.is_empty() {
            continue;
        }
        let mut test = None;
        let mut options = None;
        let mut penalty = None;
        for line in block.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(SmokeError::Configuration(format!(
                    "custom battery: malformed line `{line}`, expected `key = value`"
                )));
            };
            let (key, value) = (key.trim(), value.trim());
            match key {
                "test" => test = Some(value.to_string()),
                "options" => options = Some(value.to_string()),
                "penalty" => {
                    penalty = Some(value.parse::<f64>().map_err(|_| {
                        SmokeError::Configuration(format!(
                            "custom battery: `penalty` expects a number, got `{value}`"
                        ))
                    })?);
                }
                other => {
                    return Err(SmokeError::Configuration(format!(
                        "custom battery: unknown key `{other}`"
                    )))
                }
            }
        }
        let test = test.ok_or_else(|| {
            SmokeError::Configuration("custom battery: record missing required `test` key".into())
        })?;
        records.push(CustomTestRecord { test, options, penalty });
    }
    Ok(records)
}

/// Resolve parsed records against the built-in test registry
/// ("The parser resolves `test` names against a
/// registry mapping name -> test descriptor"), applying each record's
/// `penalty` override if present.
///
/// The `options` key is meaningful only to shared-object batteries (it
/// becomes the plugin's `batparam`); built-in tests have no runtime
/// parameter slot of their own; see [`DESIGN.md`] for the rationale.
pub fn resolve(records: &[CustomTestRecord]) -> SmokeResult<Battery> {
    let mut tests = Vec::with_capacity(records.len());
    for record in records {
        let mut desc = find_test(&record.test).ok_or_else(|| {
            SmokeError::Configuration(format!("custom battery: unknown test `{}`", record.test))
        })?;
        if let Some(penalty) = record.penalty {
            desc.penalty = penalty;
        }
        tests.push(desc);
    }
    Ok(Battery::new("custom", tests))
}

/// Parse and resolve a custom-battery text file in one step.
pub fn load_custom_battery(text: &str) -> SmokeResult<Battery> {
    resolve(&parse_records(text)?)
}

// --- shared-object form ---------------------------------------------------

const BATTERY_FUNC_SYMBOL: &[u8] = b"battery_func\0";

/// Run a shared-object custom battery (`s=file` form):
/// resolve its `battery_func` export exactly as a generator plugin resolves
/// `gen_getinfo`, then hand it the generator descriptor's raw info,
/// the caller API, and the translated [`RawBatteryOptions`].
///
/// Returns the plugin's own exit code (0 conventionally meaning success);
/// the plugin is responsible for printing its own report through the host
/// `printf` callback, so there is nothing further for this engine to
/// render.
pub fn run_shared_object_battery(
    path: &Path,
    raw_generator: *const smokerand_core::ffi::RawGeneratorInfo,
    host: &CallerApi,
    settings: &SmokeRandSettings,
) -> SmokeResult<i32> {
    let lib = unsafe {
        Library::new(path)
            .map_err(|e| SmokeError::Plugin(format!("failed to load `{}`: {e}", path.display())))?
    };

    let batparam = settings.batparam.clone().unwrap_or_default();
    let batparam_c = CString::new(batparam)
        .map_err(|_| SmokeError::Configuration("batparam contains an embedded NUL".into()))?;

    let (testid, testname_c): (i32, Option<CString>) = match &settings.test_selector {
        TestSelector::All => (-1, None),
        TestSelector::Id(id) => (*id as i32, None),
        TestSelector::Name(name) => {
            (-1, Some(CString::new(name.as_str()).map_err(|_| {
                SmokeError::Configuration("testname contains an embedded NUL".into())
            })?))
        }
    };

    let options = RawBatteryOptions {
        batparam: batparam_c.as_ptr(),
        testid,
        testname: testname_c.as_ref().map(|c| c.as_ptr()).unwrap_or(std::ptr::null()),
        nthreads: settings.nthreads as u32,
        report_brief: settings.report_verbosity == crate::config::ReportVerbosity::Brief,
    };

    debug!("dispatching custom battery `{}` to shared object", path.display());
    let code = unsafe {
        let entry: Symbol<BatteryFuncFn> = lib.get(BATTERY_FUNC_SYMBOL).map_err(|e| {
            SmokeError::Plugin(format!("`{}` has no `battery_func` export: {e}", path.display()))
        })?;
        entry(raw_generator, host as *const CallerApi, &options as *const RawBatteryOptions)
    };
    Ok(code)
}

/// Whether `text` names a shared-object battery (`s = path/to.so`, the
/// entire file content) rather than a record-oriented one.
pub fn as_shared_object_path(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    let (key, value) = trimmed.split_once('=')?;
    if key.trim() != "s" {
        return None;
    }
    // Only a single-line `s = ...` file is the shared-object form; a
    // multi-record file that merely happens to start with `s =` is not.
    if trimmed.lines().count() != 1 {
        return None;
    }
    Some(value.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_record() {
        let text = "test = monobit_freq\noptions = n=1000\npenalty = 2.5\n";
        let records = parse_records(text).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].test, "monobit_freq");
        assert_eq!(records[0].options.as_deref(), Some("n=1000"));
        assert_eq!(records[0].penalty, Some(2.5));
    }

    #[test]
    fn parses_multiple_blank_line_separated_records() {
        let text = "test = monobit_freq\n\ntest = byte_freq\npenalty = 1.0\n";
        let records = parse_records(text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].test, "byte_freq");
        assert_eq!(records[1].penalty, Some(1.0));
    }

    #[test]
    fn rejects_unknown_key() {
        let text = "test = monobit_freq\nbogus = 1\n";
        assert!(parse_records(text).is_err());
    }

    #[test]
    fn rejects_missing_test_key() {
        let text = "options = foo\n";
        assert!(parse_records(text).is_err());
    }

    #[test]
    fn resolve_rejects_unknown_test_name() {
        let records = vec![CustomTestRecord { test: "not_a_real_test".into(), options: None, penalty: None }];
        assert!(resolve(&records).is_err());
    }

    #[test]
    fn resolve_applies_penalty_override() {
        let records =
            vec![CustomTestRecord { test: "monobit_freq".into(), options: None, penalty: Some(9.5) }];
        let battery = resolve(&records).unwrap();
        assert_eq!(battery.tests[0].penalty, 9.5);
    }

    #[test]
    fn load_custom_battery_end_to_end() {
        let text = "test = monobit_freq\n\ntest = gap8\n";
        let battery = load_custom_battery(text).unwrap();
        assert_eq!(battery.tests.len(), 2);
    }

    #[test]
    fn shared_object_form_detected_only_for_single_line_s_equals() {
        assert_eq!(as_shared_object_path("s = /path/to/plugin.so"), Some("/path/to/plugin.so"));
        assert_eq!(as_shared_object_path("test = monobit_freq"), None);
        assert_eq!(as_shared_object_path("s = a.so\ntest = x"), None);
    }
}
