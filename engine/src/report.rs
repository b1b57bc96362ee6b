//! Structured reporting of preprocessing statistics.
//!
//! Values are collected into a JSON tree owned by a thread local `Reporter`.
//! Nesting follows RAII guards: `push_context` opens an object under a key,
//! `push_collection_context` opens an array whose items are objects.
//! Reporting is only active on a thread after `enable_reporting` was called there,
//! everywhere else the macros are no-ops.
//! When the `ReportingGuard` is dropped, the whole tree is printed to stdout as a single JSON object.
//!
//! The contractor only reports from the thread which drives it, never from inside rayon jobs.

use crate::built_info;
use serde_json::{Map, Value};
use std::{cell::RefCell, mem::swap};

pub use serde_json::json;

#[derive(Debug)]
enum ContextStackItem {
    Key(String),
    Collection(Vec<Value>),
    Object(Map<String, Value>),
}

#[derive(Debug)]
enum CurrentReportingContext {
    Collection(Vec<Value>),
    Object(Map<String, Value>),
}

#[derive(Debug)]
pub struct Reporter {
    current: CurrentReportingContext,
    context_stack: Vec<ContextStackItem>,
}

impl Default for Reporter {
    fn default() -> Self {
        Reporter {
            current: CurrentReportingContext::Object(Map::new()),
            context_stack: Vec::new(),
        }
    }
}

impl Reporter {
    fn open_under_key(&mut self, key: String, next: CurrentReportingContext) {
        match &mut self.current {
            CurrentReportingContext::Object(object) => {
                let mut tmp = Map::new();
                swap(&mut tmp, object);
                self.context_stack.push(ContextStackItem::Object(tmp));
                self.context_stack.push(ContextStackItem::Key(key));
                self.current = next;
            }
            CurrentReportingContext::Collection(_) => {
                panic!("Cannot open context at key {} in collection", key);
            }
        }
    }

    fn create_collection_item(&mut self) {
        match &mut self.current {
            CurrentReportingContext::Object(_) => {
                panic!("Cannot create collection item in object");
            }
            CurrentReportingContext::Collection(collection) => {
                let mut tmp = Vec::new();
                swap(&mut tmp, collection);
                self.context_stack.push(ContextStackItem::Collection(tmp));
                self.current = CurrentReportingContext::Object(Map::new());
            }
        }
    }

    fn report(&mut self, key: String, val: Value) {
        match &mut self.current {
            CurrentReportingContext::Object(object) => {
                let prev = object.insert(key, val);
                if !cfg!(feature = "report-allow-override") {
                    assert!(prev.is_none());
                }
            }
            CurrentReportingContext::Collection(_) => {
                panic!("Cannot report value on collection");
            }
        }
    }

    fn pop_context(&mut self) {
        let parent = self.context_stack.pop().expect("tried to pop from empty context");

        let mut finished = CurrentReportingContext::Object(Map::new());
        swap(&mut self.current, &mut finished);
        let finished = match finished {
            CurrentReportingContext::Object(object) => Value::Object(object),
            CurrentReportingContext::Collection(collection) => Value::Array(collection),
        };

        match parent {
            ContextStackItem::Key(key) => {
                if let Some(ContextStackItem::Object(mut object)) = self.context_stack.pop() {
                    let prev = object.insert(key, finished);
                    assert_eq!(prev, None);
                    self.current = CurrentReportingContext::Object(object);
                } else {
                    panic!("Inconsistent context stack");
                }
            }
            ContextStackItem::Collection(mut collection) => {
                assert!(finished.is_object(), "Cannot insert collection into collection");
                collection.push(finished);
                self.current = CurrentReportingContext::Collection(collection);
            }
            ContextStackItem::Object(_) => panic!("Inconsistent context stack"),
        }
    }

    fn into_root(mut self) -> Map<String, Value> {
        assert!(self.context_stack.is_empty(), "reporting contexts still open");
        match std::mem::replace(&mut self.current, CurrentReportingContext::Collection(Vec::new())) {
            CurrentReportingContext::Object(object) => object,
            CurrentReportingContext::Collection(_) => panic!("broken root object for reporting"),
        }
    }
}

thread_local! {
    static REPORTER: RefCell<Option<Reporter>> = RefCell::new(None);
}

fn with_reporter(f: impl FnOnce(&mut Reporter)) {
    REPORTER.with(|reporter| {
        if let Some(r) = reporter.borrow_mut().as_mut() {
            f(r)
        }
    });
}

#[must_use]
pub struct ContextGuard(());

impl Drop for ContextGuard {
    fn drop(&mut self) {
        with_reporter(Reporter::pop_context);
    }
}

/// Open a nested object under `key`. Closed when the guard is dropped.
pub fn push_context(key: String) -> ContextGuard {
    with_reporter(|r| r.open_under_key(key, CurrentReportingContext::Object(Map::new())));
    ContextGuard(())
}

#[must_use]
pub struct CollectionContextGuard(());

impl Drop for CollectionContextGuard {
    fn drop(&mut self) {
        with_reporter(Reporter::pop_context);
    }
}

/// Open an array under `key`. Items are added through `push_collection_item`.
pub fn push_collection_context(key: String) -> CollectionContextGuard {
    with_reporter(|r| r.open_under_key(key, CurrentReportingContext::Collection(Vec::new())));
    CollectionContextGuard(())
}

impl CollectionContextGuard {
    pub fn push_collection_item(&mut self) -> CollectionItemContextGuard {
        with_reporter(Reporter::create_collection_item);
        CollectionItemContextGuard(self)
    }
}

#[must_use]
pub struct CollectionItemContextGuard<'a>(&'a CollectionContextGuard);

impl<'a> Drop for CollectionItemContextGuard<'a> {
    fn drop(&mut self) {
        with_reporter(Reporter::pop_context);
    }
}

pub fn report(key: String, val: Value) {
    if cfg!(feature = "report-to-stderr") {
        eprintln!("{}: {}", key, val);
    }
    report_silent(key, val)
}

pub fn report_silent(key: String, val: Value) {
    with_reporter(|r| r.report(key, val));
}

#[must_use]
pub struct ReportingGuard(());

impl ReportingGuard {
    /// Stop reporting and hand out everything collected so far instead of printing it.
    pub fn into_value(self) -> Value {
        let root = REPORTER.with(|reporter| reporter.borrow_mut().take()).map(Reporter::into_root).unwrap_or_default();
        std::mem::forget(self);
        Value::Object(root)
    }
}

impl Drop for ReportingGuard {
    fn drop(&mut self) {
        if let Some(r) = REPORTER.with(|reporter| reporter.borrow_mut().take()) {
            println!("{}", Value::Object(r.into_root()));
        }
    }
}

#[macro_export]
macro_rules! report {
    ($k:expr, $($json:tt)+) => { $crate::report::report($k.to_string(), $crate::report::json!($($json)+)) };
}

#[macro_export]
macro_rules! report_silent {
    ($k:expr, $($json:tt)+) => { $crate::report::report_silent($k.to_string(), $crate::report::json!($($json)+)) };
}

/// Start collecting reported values on the current thread, together with some build and environment metadata.
pub fn enable_reporting(program: &str) -> ReportingGuard {
    REPORTER.with(|reporter| reporter.replace(Some(Reporter::default())));

    report!("program", program);
    report!("crate_version", built_info::PKG_VERSION);
    report!("build_target", built_info::TARGET);
    report!("build_profile", built_info::PROFILE);
    report!("feature_flags", built_info::FEATURES_STR);
    report!("build_time", built_info::BUILT_TIME_UTC);
    report!("build_with_rustc", built_info::RUSTC_VERSION);

    if let Ok(hostname) = std::process::Command::new("hostname").output() {
        report!("hostname", String::from_utf8_lossy(&hostname.stdout).trim());
    }

    let start_time = time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc2822)
        .unwrap_or_default();
    report!("start_time", start_time);
    report!("args", std::env::args().collect::<Vec<String>>());
    report!("num_threads", rayon::current_num_threads());

    ReportingGuard(())
}

pub mod benchmark;
pub use benchmark::*;
