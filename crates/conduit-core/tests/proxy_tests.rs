use conduit_core::{
    contract, create_proxy, CallEvent, CallRecorder, Contract, OperationSig, Proxy, ProxyBuilder, Returned,
    ReturnType, SharedObserver, TypeDesc,
};
use serde::{Serialize, Serializer};
use serde_json::json;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

#[contract]
pub trait Calculator: Send + Sync {
    fn add(&self, a: i32, b: i32) -> i32;
    fn log(&self, message: String);
    fn divide(&self, a: i32, b: i32) -> Result<i32, String>;
}

#[derive(Default)]
struct RealCalculator {
    logged: Mutex<Vec<String>>,
}

impl Calculator for RealCalculator {
    fn add(&self, a: i32, b: i32) -> i32 {
        a + b
    }

    fn log(&self, message: String) {
        self.logged.lock().unwrap().push(message);
    }

    fn divide(&self, a: i32, b: i32) -> Result<i32, String> {
        if b == 0 {
            Err("division by zero".to_string())
        } else {
            Ok(a / b)
        }
    }
}

fn observed_calculator() -> (Proxy<dyn Calculator>, CallRecorder) {
    let recorder = CallRecorder::new();
    let calc = create_proxy::<dyn Calculator>(
        Box::new(RealCalculator::default()),
        Some(Arc::new(recorder.clone())),
    )
    .unwrap();
    (calc, recorder)
}

#[test]
fn test_add_is_observed() {
    let (calc, recorder) = observed_calculator();

    assert_eq!(calc.add(2, 3), 5);
    assert_eq!(
        recorder.events(),
        vec![
            CallEvent::before("add", vec![json!(2), json!(3)]),
            CallEvent::after("add", json!(5)),
        ]
    );
}

#[test]
fn test_void_operation_reports_no_value() {
    let (calc, recorder) = observed_calculator();

    calc.log("hi".to_string());
    assert_eq!(
        recorder.events(),
        vec![
            CallEvent::before("log", vec![json!("hi")]),
            CallEvent::after("log", Returned::NoValue),
        ]
    );
}

#[test]
fn test_failure_reaches_caller_without_after_hook() {
    let (calc, recorder) = observed_calculator();

    assert_eq!(calc.divide(10, 0), Err("division by zero".to_string()));
    assert_eq!(
        recorder.events(),
        vec![CallEvent::before("divide", vec![json!(10), json!(0)])]
    );
}

#[test]
fn test_unobserved_proxy_only_forwards() {
    let calc = create_proxy::<dyn Calculator>(Box::new(RealCalculator::default()), None).unwrap();

    assert!(!calc.is_observed());
    assert_eq!(calc.add(2, 3), 5);
    calc.log("quiet".to_string());
    assert_eq!(calc.divide(9, 3), Ok(3));
}

#[test]
fn test_descriptor_matches_trait() {
    let descriptor = <dyn Calculator as Contract>::descriptor();

    assert_eq!(descriptor.name, "Calculator");
    assert_eq!(
        descriptor.operations,
        vec![
            OperationSig::new("add")
                .param("a", TypeDesc::of::<i32>())
                .param("b", TypeDesc::of::<i32>())
                .returns(ReturnType::of::<i32>()),
            OperationSig::new("log").param("message", TypeDesc::of::<String>()),
            OperationSig::new("divide")
                .param("a", TypeDesc::of::<i32>())
                .param("b", TypeDesc::of::<i32>())
                .returns(ReturnType::fallible::<Result<i32, String>>()),
        ]
    );
}

#[contract]
pub trait Heartbeat: Send + Sync {}

struct Pulse;

impl Heartbeat for Pulse {}

#[test]
fn test_contract_without_operations() {
    let recorder = CallRecorder::new();
    let proxy = create_proxy::<dyn Heartbeat>(Box::new(Pulse), Some(Arc::new(recorder.clone()))).unwrap();

    assert!(proxy.operations().is_empty());
    assert!(proxy.is_observed());
    assert!(recorder.is_empty());
}

#[contract]
pub trait Wide: Send + Sync {
    fn now(&self) -> u64;
    fn echo(&self, value: Option<String>) -> Option<String>;
    #[allow(clippy::too_many_arguments)]
    fn sum(&self, a: u8, b: u16, c: u32, d: u64, e: i8, f: i16, g: i32, h: i64) -> i64;
}

struct WideImpl;

impl Wide for WideImpl {
    fn now(&self) -> u64 {
        42
    }

    fn echo(&self, value: Option<String>) -> Option<String> {
        value
    }

    fn sum(&self, a: u8, b: u16, c: u32, d: u64, e: i8, f: i16, g: i32, h: i64) -> i64 {
        a as i64 + b as i64 + c as i64 + d as i64 + e as i64 + f as i64 + g as i64 + h
    }
}

#[test]
fn test_zero_one_and_many_parameters() {
    let recorder = CallRecorder::new();
    let wide = create_proxy::<dyn Wide>(Box::new(WideImpl), Some(Arc::new(recorder.clone()))).unwrap();

    assert_eq!(wide.now(), 42);
    assert_eq!(wide.echo(None), None);
    assert_eq!(wide.sum(1, 2, 3, 4, -5, 6, 7, 8), 26);

    let events = recorder.events();
    assert_eq!(events[0], CallEvent::before("now", vec![]));
    assert_eq!(events[1], CallEvent::after("now", json!(42)));
    // None boxes to null, which is not the no-value marker.
    assert_eq!(events[3], CallEvent::after("echo", json!(null)));
    assert_eq!(
        events[4],
        CallEvent::before(
            "sum",
            vec![json!(1), json!(2), json!(3), json!(4), json!(-5), json!(6), json!(7), json!(8)]
        )
    );
}

/// Counts how often it is serialized.
#[derive(Clone)]
pub struct Counted(pub Arc<AtomicUsize>);

impl Serialize for Counted {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.fetch_add(1, Ordering::SeqCst);
        serializer.serialize_str("counted")
    }
}

#[contract]
pub trait Sink: Send + Sync {
    fn accept(&self, item: Counted) -> usize;
}

struct CountingSink;

impl Sink for CountingSink {
    fn accept(&self, item: Counted) -> usize {
        item.0.load(Ordering::SeqCst)
    }
}

#[test]
fn test_arguments_are_boxed_only_when_observed() {
    let boxed = Arc::new(AtomicUsize::new(0));

    let plain = create_proxy::<dyn Sink>(Box::new(CountingSink), None).unwrap();
    assert_eq!(plain.accept(Counted(boxed.clone())), 0);
    assert_eq!(boxed.load(Ordering::SeqCst), 0);

    let observed =
        create_proxy::<dyn Sink>(Box::new(CountingSink), Some(Arc::new(CallRecorder::new()))).unwrap();
    assert_eq!(observed.accept(Counted(boxed.clone())), 1);
    assert_eq!(boxed.load(Ordering::SeqCst), 1);
}

#[contract]
pub trait Fragile: Send + Sync {
    fn explode(&self, reason: String) -> u32;
}

struct Bomb;

impl Fragile for Bomb {
    fn explode(&self, reason: String) -> u32 {
        panic!("{}", reason)
    }
}

#[test]
fn test_panic_propagates_without_after_hook() {
    let recorder = CallRecorder::new();
    let fragile = create_proxy::<dyn Fragile>(Box::new(Bomb), Some(Arc::new(recorder.clone()))).unwrap();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| fragile.explode("boom".to_string())));
    let payload = outcome.unwrap_err();

    assert_eq!(payload.downcast_ref::<String>().map(String::as_str), Some("boom"));
    assert_eq!(
        recorder.events(),
        vec![CallEvent::before("explode", vec![json!("boom")])]
    );
}

#[test]
fn test_one_observer_for_many_proxies() {
    let recorder = CallRecorder::new();
    let shared: SharedObserver = Arc::new(recorder.clone());

    let first =
        create_proxy::<dyn Calculator>(Box::new(RealCalculator::default()), Some(shared.clone())).unwrap();
    let second =
        create_proxy::<dyn Calculator>(Box::new(RealCalculator::default()), Some(shared)).unwrap();

    first.add(1, 1);
    second.add(2, 2);

    let operations: Vec<_> = recorder.events().iter().map(|e| e.operation().to_string()).collect();
    assert_eq!(operations, vec!["add", "add", "add", "add"]);
    assert_eq!(recorder.events()[3], CallEvent::after("add", json!(4)));
}

#[test]
fn test_concurrent_calls() {
    let (calc, recorder) = observed_calculator();
    let calc = Arc::new(calc);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let calc = Arc::clone(&calc);
            thread::spawn(move || calc.add(i, i))
        })
        .collect();

    let mut results: Vec<i32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    results.sort();

    assert_eq!(results, vec![0, 2, 4, 6, 8, 10, 12, 14]);
    assert_eq!(recorder.len(), 16);
}

#[contract]
pub trait Named: Send + Sync {
    fn name(&self) -> &str;
    fn greet(&self, _: (String, String)) -> String;
}

struct Person {
    name: String,
}

impl Named for Person {
    fn name(&self) -> &str {
        &self.name
    }

    fn greet(&self, (first, last): (String, String)) -> String {
        format!("{} greets {} {}", self.name, first, last)
    }
}

#[test]
fn test_borrowed_results_and_unnamed_parameters() {
    let recorder = CallRecorder::new();
    let person = create_proxy::<dyn Named>(
        Box::new(Person {
            name: "Ada".to_string(),
        }),
        Some(Arc::new(recorder.clone())),
    )
    .unwrap();

    assert_eq!(person.name(), "Ada");
    assert_eq!(
        person.greet(("Grace".to_string(), "Hopper".to_string())),
        "Ada greets Grace Hopper"
    );

    let descriptor = <dyn Named as Contract>::descriptor();
    assert_eq!(descriptor.operations[1].params[0].name, "__arg0");
    assert_eq!(recorder.events()[1], CallEvent::after("name", json!("Ada")));
    assert_eq!(
        recorder.events()[2],
        CallEvent::before("greet", vec![json!(["Grace", "Hopper"])])
    );
}

#[test]
fn test_builder_reuses_types() {
    let builder = ProxyBuilder::new();
    let first = builder
        .create_proxy::<dyn Calculator>(Box::new(RealCalculator::default()), None)
        .unwrap();
    let second = builder
        .create_proxy::<dyn Calculator>(Box::new(RealCalculator::default()), None)
        .unwrap();

    assert!(Arc::ptr_eq(first.proxy_type(), second.proxy_type()));
    assert_eq!(first.proxy_type().name(), "__Proxy_Calculator");
}

#[contract]
pub trait Shelf {
    fn pick<'a>(&'a self, index: usize) -> &'a str;
    fn restock(&self, into: &mut Vec<String>) {
        into.clear();
    }
    fn flush(&self) -> std::io::Result<()>;
}

struct Books(Vec<String>);

impl Shelf for Books {
    fn pick<'a>(&'a self, index: usize) -> &'a str {
        &self.0[index]
    }

    fn restock(&self, into: &mut Vec<String>) {
        into.extend(self.0.iter().cloned());
    }

    fn flush(&self) -> std::io::Result<()> {
        Err(std::io::Error::new(std::io::ErrorKind::Other, "read-only"))
    }
}

#[test]
fn test_borrowing_and_non_send_contract() {
    let recorder = CallRecorder::new();
    let shelf = create_proxy::<dyn Shelf>(
        Box::new(Books(vec!["Dune".to_string(), "Emma".to_string()])),
        Some(Arc::new(recorder.clone())),
    )
    .unwrap();

    assert_eq!(shelf.pick(1), "Emma");

    let mut out = vec!["stale".to_string()];
    shelf.restock(&mut out);
    assert_eq!(out, vec!["stale", "Dune", "Emma"]);

    let err = shelf.flush().unwrap_err();
    assert_eq!(err.to_string(), "read-only");

    assert_eq!(
        recorder.events(),
        vec![
            CallEvent::before("pick", vec![json!(1)]),
            CallEvent::after("pick", json!("Emma")),
            CallEvent::before("restock", vec![json!(["stale"])]),
            CallEvent::after("restock", Returned::NoValue),
            CallEvent::before("flush", vec![]),
        ]
    );
}
