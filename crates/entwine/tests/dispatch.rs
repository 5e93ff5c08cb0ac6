use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use entwine::{
    Collection, Declarations, Document, Engine, EngineConfig, Error, Outcome, WarnLevel, Warning,
    dom::{Dom, Node},
    method,
};
use serde_json::{Value, json};

/// A document with three distinguishable nodes.
fn fixture() -> (Rc<Dom>, Engine<Node>) {
    let dom = Rc::new(Dom::new());
    dom.add("div", Some("x"), &["a", "b"]);
    dom.add("span", Some("y"), &["a"]);
    dom.add("p", Some("z"), &[]);
    let config = EngineConfig {
        warning_level: WarnLevel::BestPractice,
    };
    let engine = Engine::with_config(&config, Rc::clone(&dom) as Rc<dyn Document<Node>>);
    (dom, engine)
}

/// Implementation prefixing `word` to whatever the next rule returns.
fn chained(word: &'static str) -> impl Fn(&Collection<Node>, &[Value]) -> Outcome + 'static {
    move |this, args| {
        let rest = this.super_call(args)?;
        Ok(Some(json!(match rest {
            Some(Value::String(s)) => format!("{word} {s}"),
            _ => word.to_string(),
        })))
    }
}

/// Register `chained(word)` for `op` on `selector` in the base namespace.
fn define(engine: &Engine<Node>, selector: &str, op: &str, word: &'static str) {
    engine
        .select(selector)
        .unwrap()
        .entwine(
            None,
            vec![Declarations::<Node>::new().method(op, chained(word)).into()],
        )
        .unwrap();
}

/// Call `speak` on `selector`.
fn speak(engine: &Engine<Node>, selector: &str) -> Option<Value> {
    engine.select(selector).unwrap().call("speak", &[]).unwrap()
}

/// Collect every warning the engine emits.
fn capture(engine: &Engine<Node>) -> Rc<RefCell<Vec<Warning>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink_seen = Rc::clone(&seen);
    engine.warnings().set_sink(Box::new(move |w: &Warning| {
        sink_seen.borrow_mut().push(w.clone());
    }));
    seen
}

#[test]
fn most_specific_rule_runs_and_super_walks_down() {
    let (_dom, engine) = fixture();
    // Most specific first, so ordering cannot come from insertion order.
    define(&engine, "*.b.a", "speak", "ba");
    define(&engine, "*.a", "speak", "a");
    define(&engine, "*", "speak", "base");

    assert_eq!(speak(&engine, "#x"), Some(json!("ba a base")));
    assert_eq!(speak(&engine, "#y"), Some(json!("a base")));
    assert_eq!(speak(&engine, "#z"), Some(json!("base")));
}

#[test]
fn equal_specificity_prefers_later_rules() {
    let (_dom, engine) = fixture();
    define(&engine, "*.a", "speak", "first");
    define(&engine, "*.b", "speak", "second");
    assert_eq!(speak(&engine, "#x"), Some(json!("second first")));
}

#[test]
fn importance_beats_specificity() {
    let (_dom, engine) = fixture();
    define(&engine, "#x", "speak", "id");
    engine
        .select("*")
        .unwrap()
        .entwine(
            None,
            vec![Declarations::<Node>::new().important("speak", 1, chained("loud")).into()],
        )
        .unwrap();
    assert_eq!(speak(&engine, "#x"), Some(json!("loud id")));
}

#[test]
fn unmatched_and_unknown_operations_are_noops() {
    let (_dom, engine) = fixture();
    define(&engine, "p", "speak", "p");
    assert_eq!(speak(&engine, "#x"), None);
    assert_eq!(engine.select("#x").unwrap().call("missing", &[]).unwrap(), None);
    assert_eq!(engine.select("#nope").unwrap().call("speak", &[]).unwrap(), None);
}

#[test]
fn plain_method_becomes_fallback() {
    let (_dom, engine) = fixture();
    engine.define_method("speak", method(|_, _| Ok(Some(json!("fallback")))));
    define(&engine, "span", "speak", "span");

    assert_eq!(speak(&engine, "#z"), Some(json!("fallback")));
    assert_eq!(speak(&engine, "#y"), Some(json!("span fallback")));
}

#[test]
fn arguments_reach_implementations() {
    let (_dom, engine) = fixture();
    engine
        .select("*")
        .unwrap()
        .entwine(
            None,
            vec![
                Declarations::<Node>::new()
                    .method("add", |_, args| {
                        let sum: i64 = args.iter().filter_map(Value::as_i64).sum();
                        Ok(Some(json!(sum)))
                    })
                    .into(),
            ],
        )
        .unwrap();
    let c = engine.select("#x").unwrap();
    assert_eq!(c.call("add", &[json!(2), json!(3)]).unwrap(), Some(json!(5)));
}

#[test]
fn multi_element_calls_run_in_reverse_and_return_first() {
    let (_dom, engine) = fixture();
    let order = Rc::new(RefCell::new(Vec::new()));
    let seen = Rc::clone(&order);
    engine
        .select("*")
        .unwrap()
        .entwine(
            None,
            vec![
                Declarations::<Node>::new()
                    .method("tag", move |this, _| {
                        let tag = this.get(0).map(|n| n.to_string()).unwrap_or_default();
                        seen.borrow_mut().push(tag.clone());
                        Ok(Some(json!(tag)))
                    })
                    .into(),
            ],
        )
        .unwrap();

    let all = engine.select("*").unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all.call("tag", &[]).unwrap(), Some(json!("div#x.a.b")));
    assert_eq!(*order.borrow(), vec!["p#z", "span#y.a", "div#x.a.b"]);
}

#[test]
fn nested_dispatch_on_other_elements_keeps_cursors_apart() {
    let (_dom, engine) = fixture();
    define(&engine, "*", "speak", "base");
    define(&engine, "*.a", "speak", "a");
    engine
        .select("#x")
        .unwrap()
        .entwine(
            None,
            vec![
                Declarations::<Node>::new()
                    .method("speak", |this, args| {
                        let other = this.scope().select("#y")?.call("speak", args)?;
                        let mine = this.super_call(args)?;
                        Ok(Some(json!([mine, other])))
                    })
                    .into(),
            ],
        )
        .unwrap();

    assert_eq!(speak(&engine, "#x"), Some(json!(["a base", "a base"])));
    // Every cursor is gone once the call returns.
    let x = engine.select("#x").unwrap();
    assert!(matches!(
        x.super_call(&[]),
        Err(Error::SuperOutsideDispatch { .. })
    ));
}

#[test]
fn nested_dispatch_on_same_element_restores_cursor() {
    let (_dom, engine) = fixture();
    define(&engine, "*", "speak", "s-base");
    define(&engine, "*", "echo", "e-base");
    define(&engine, "*.a", "speak", "s-a");
    engine
        .select("*.a")
        .unwrap()
        .entwine(
            None,
            vec![
                Declarations::<Node>::new()
                    .method("echo", |this, args| {
                        let spoken = this.call("speak", args)?;
                        let rest = this.super_call(args)?;
                        Ok(Some(json!([spoken, rest])))
                    })
                    .into(),
            ],
        )
        .unwrap();

    let echoed = engine.select("#x").unwrap().call("echo", &[]).unwrap();
    assert_eq!(echoed, Some(json!(["s-a s-base", "e-base"])));
    assert_eq!(
        engine.select("#z").unwrap().call("echo", &[]).unwrap(),
        Some(json!("e-base"))
    );
}

#[test]
fn every_element_of_a_multi_element_call_walks_its_own_chain() {
    let (_dom, engine) = fixture();
    define(&engine, "*", "speak", "base");
    define(&engine, "*.a", "speak", "a");
    define(&engine, "*.b.a", "speak", "ba");
    let log = Rc::new(RefCell::new(Vec::new()));
    let seen = Rc::clone(&log);
    engine
        .select("*")
        .unwrap()
        .entwine(
            None,
            vec![
                Declarations::<Node>::new()
                    .important("speak", 1, move |this, args| {
                        let tag = this.get(0).map(|n| n.to_string()).unwrap_or_default();
                        let rest = this.super_call(args)?;
                        seen.borrow_mut().push((tag, rest.clone()));
                        Ok(rest)
                    })
                    .into(),
            ],
        )
        .unwrap();

    assert_eq!(speak(&engine, "*"), Some(json!("ba a base")));
    assert_eq!(
        *log.borrow(),
        vec![
            ("p#z".to_string(), Some(json!("base"))),
            ("span#y.a".to_string(), Some(json!("a base"))),
            ("div#x.a.b".to_string(), Some(json!("ba a base"))),
        ]
    );
}

#[test]
fn super_on_many_elements_runs_once_for_the_first() {
    let (_dom, engine) = fixture();
    let runs = Rc::new(Cell::new(0));
    let counter = Rc::clone(&runs);
    engine
        .select("*")
        .unwrap()
        .entwine(
            None,
            vec![
                Declarations::<Node>::new()
                    .method("speak", move |_, _| {
                        counter.set(counter.get() + 1);
                        Ok(Some(json!("base")))
                    })
                    .into(),
            ],
        )
        .unwrap();
    engine
        .select("#x")
        .unwrap()
        .entwine(
            None,
            vec![
                Declarations::<Node>::new()
                    .method("speak", |this, args| {
                        let both = this.scope().select("*.a")?;
                        assert_eq!(both.len(), 2);
                        both.super_call(args)
                    })
                    .into(),
            ],
        )
        .unwrap();

    assert_eq!(speak(&engine, "#x"), Some(json!("base")));
    assert_eq!(runs.get(), 1);
}

#[test]
fn failures_propagate_and_restore_cursors() {
    let (_dom, engine) = fixture();
    define(&engine, "*", "speak", "base");
    engine
        .select("#x")
        .unwrap()
        .entwine(
            None,
            vec![
                Declarations::<Node>::new()
                    .method("speak", |_, _| Err(Error::method("speak", "boom")))
                    .into(),
            ],
        )
        .unwrap();

    let all = engine.select("*").unwrap();
    let err = all.call("speak", &[]).unwrap_err();
    assert_eq!(err, Error::method("speak", "boom"));
    assert!(matches!(
        engine.select("#x").unwrap().super_call(&[]),
        Err(Error::SuperOutsideDispatch { .. })
    ));
    assert_eq!(speak(&engine, "#y"), Some(json!("base")));
}

#[test]
fn super_needs_an_element() {
    let (_dom, engine) = fixture();
    let empty = engine.select("#nope").unwrap();
    assert_eq!(empty.super_call(&[]), Err(Error::SuperOnEmpty));
}

#[test]
fn reserved_operations_warn_and_refuse_direct_calls() {
    let (_dom, engine) = fixture();
    let seen = capture(&engine);
    engine
        .select("*")
        .unwrap()
        .entwine(
            None,
            vec![
                Declarations::<Node>::new()
                    .method("filter", |_, _| Ok(Some(json!("mine"))))
                    .into(),
            ],
        )
        .unwrap();

    let warnings = seen.borrow();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].level, WarnLevel::Important);
    assert!(warnings[0].message.contains("filter"));

    let c = engine.select("#x").unwrap();
    assert!(matches!(
        c.call("filter", &[]),
        Err(Error::ReservedOperation { .. })
    ));
    assert_eq!(
        c.namespace().dispatch(&c, "filter", &[]).unwrap(),
        Some(json!("mine"))
    );
}

#[test]
fn has_requires_every_element_covered() {
    let (_dom, engine) = fixture();
    define(&engine, "*.a", "speak", "a");

    assert!(engine.select("*.a").unwrap().has("speak"));
    assert!(!engine.select("*").unwrap().has("speak"));
    assert!(!engine.select("*.a").unwrap().has("missing"));

    define(&engine, "p", "speak", "p");
    assert!(engine.select("*").unwrap().has("speak"));
}

#[test]
fn rules_can_be_added_mid_dispatch() {
    let (_dom, engine) = fixture();
    let registrar = engine.clone();
    engine
        .select("*")
        .unwrap()
        .entwine(
            None,
            vec![
                Declarations::<Node>::new()
                    .method("grow", move |_, _| {
                        define(&registrar, "#z", "speak", "late");
                        Ok(None)
                    })
                    .into(),
            ],
        )
        .unwrap();

    engine.select("#x").unwrap().call("grow", &[]).unwrap();
    assert_eq!(speak(&engine, "#z"), Some(json!("late")));
}

#[test]
fn derived_collections_keep_namespace_and_provenance() {
    let (_dom, engine) = fixture();
    define(&engine, "*", "speak", "base");
    let forms = engine.namespace("forms").scope().select("*").unwrap();

    let a = forms.filter("*.a").unwrap();
    assert_eq!(a.len(), 2);
    assert_eq!(a.selector(), Some("*.filter(*.a)"));
    assert_eq!(a.namespace().name(), "forms");

    let first = a.first();
    assert_eq!(first.len(), 1);
    assert_eq!(first.selector(), Some("*.filter(*.a).eq(0)"));
    assert_eq!(first.end().len(), 2);
    assert_eq!(forms.slice(1, 10).len(), 2);
    assert!(forms.eq(7).is_empty());

    let not_a = forms.not(engine.document().parse("*.a").unwrap().as_ref());
    assert_eq!(not_a.len(), 1);
    assert_eq!(not_a.call("speak", &[]).unwrap(), Some(json!("base")));
}
