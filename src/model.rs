// Copyright 2024 Developers of the SmokeRand project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Test results, test descriptions, and batteries: the data each
//! statistical test produces and the ordered lists they're run from.

use std::sync::Arc;

use smokerand_core::GenState;

/// One test's outcome.
///
/// `p` may be `NaN` (always `p ∈ [0,1] ∪ {NaN}`); the
/// reporter is what turns that into a `NAN`-labelled `FAILED` row.
#[derive(Clone, Debug)]
pub struct TestResult {
    pub name: String,
    pub id: u32,
    pub x: f64,
    pub p: f64,
    pub alpha: f64,
    pub penalty: f64,
    pub thread_ord: u32,
}

impl TestResult {
    pub fn new(name: impl Into<String>, id: u32, x: f64, p: f64, penalty: f64, thread_ord: u32) -> Self {
        TestResult { name: name.into(), id, x, p, alpha: 1.0 - p, penalty, thread_ord }
    }
}

type TestFn = Arc<dyn Fn(&mut dyn GenState) -> (f64, f64) + Send + Sync>;

/// A test description: a name, a callable producing a
/// statistic/p-value pair from a generator instance, a fixed failure
/// penalty, and a scheduling-cost estimate the
/// battery engine sorts on.
#[derive(Clone)]
pub struct TestDescription {
    pub name: String,
    pub penalty: f64,
    /// A per-test scheduling-cost constant, in arbitrary units comparable
    /// only to other tests in the same battery.
    pub estimated_cost: f64,
    run: TestFn,
}

impl TestDescription {
    pub fn new(
        name: impl Into<String>,
        penalty: f64,
        estimated_cost: f64,
        run: impl Fn(&mut dyn GenState) -> (f64, f64) + Send + Sync + 'static,
    ) -> Self {
        TestDescription { name: name.into(), penalty, estimated_cost, run: Arc::new(run) }
    }

    /// Execute this test against `gen`, producing a [`TestResult`] tagged
    /// with its 1-based `id` (position in the battery) and the `thread_ord`
    /// of the worker that ran it.
    pub fn run(&self, gen: &mut dyn GenState, id: u32, thread_ord: u32) -> TestResult {
        let (x, p) = (self.run)(gen);
        TestResult::new(&self.name, id, x, p, self.penalty, thread_ord)
    }
}

impl std::fmt::Debug for TestDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestDescription")
            .field("name", &self.name)
            .field("penalty", &self.penalty)
            .field("estimated_cost", &self.estimated_cost)
            .finish_non_exhaustive()
    }
}

/// A named, finite, ordered sequence of test descriptions.
///
/// The sentinel a C array would need is just `Vec` length — there is no
/// in-band terminator once the battery lives behind a typed `Vec` rather
/// than a C array.
#[derive(Clone, Debug)]
pub struct Battery {
    pub name: String,
    pub tests: Vec<TestDescription>,
}

impl Battery {
    pub fn new(name: impl Into<String>, tests: Vec<TestDescription>) -> Self {
        Battery { name: name.into(), tests }
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}
