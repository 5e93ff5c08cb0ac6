//! Scripted scenarios: a document, rules written as step lists, and calls to run.

use std::{collections::BTreeMap, fs, path::Path, rc::Rc};

use entwine::{
    Collection, Declarations, Document, Engine, EngineConfig, Error, Outcome,
    dom::{Dom, Node},
};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::Result;

/// One step of a scripted implementation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Append a word.
    Say(String),
    /// Append the next less specific implementation's result.
    Super,
    /// Append the result of calling another operation on the same element.
    Call(String),
    /// Fail the operation with a message.
    Fail(String),
}

/// A node to add to the document.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSpec {
    /// Tag name.
    pub tag: String,
    /// Optional id.
    #[serde(default)]
    pub id: Option<String>,
    /// Class names.
    #[serde(default)]
    pub classes: Vec<String>,
}

/// Scripted implementations bound to one selector.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    /// Target namespace; `None` for the base namespace.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Selector the implementations apply to.
    pub selector: String,
    /// Importance applied to every implementation in this rule.
    #[serde(default)]
    pub importance: i32,
    /// Operation name to steps.
    pub methods: BTreeMap<String, Vec<Step>>,
}

/// An operation call to run and report.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CallSpec {
    /// Namespace the selected collection is bound to.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Elements to call on.
    pub selector: String,
    /// Operation to call.
    pub operation: String,
}

/// A complete scenario file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Engine configuration.
    #[serde(default)]
    pub config: EngineConfig,
    /// Document nodes, in order.
    pub nodes: Vec<NodeSpec>,
    /// Rules, registered in order.
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
    /// Calls, run in order after every rule is registered.
    #[serde(default)]
    pub calls: Vec<CallSpec>,
}

/// Render a returned value as output text.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        v => v.to_string(),
    }
}

/// Run `steps` against `this`, joining the words produced.
fn perform(operation: &str, steps: &[Step], this: &Collection<Node>, args: &[Value]) -> Outcome {
    let mut words = Vec::new();
    for step in steps {
        let produced = match step {
            Step::Say(text) => Some(Value::String(text.clone())),
            Step::Super => this.super_call(args)?,
            Step::Call(op) => this.call(op, args)?,
            Step::Fail(message) => return Err(Error::method(operation, message.as_str())),
        };
        if let Some(v) = produced {
            words.push(render(&v));
        }
    }
    Ok(Some(Value::String(words.join(" "))))
}

impl Scenario {
    /// Parse a scenario from RON text.
    pub fn from_ron(text: &str) -> Result<Self> {
        Ok(ron::from_str(text)?)
    }

    /// Read and parse a scenario file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_ron(&text)
    }

    /// Build the document and engine and register every rule.
    fn build(&self) -> Result<Engine<Node>> {
        let dom = Rc::new(Dom::new());
        for node in &self.nodes {
            let classes: Vec<&str> = node.classes.iter().map(String::as_str).collect();
            dom.add(&node.tag, node.id.as_deref(), &classes);
        }
        let engine = Engine::with_config(&self.config, dom as Rc<dyn Document<Node>>);

        for rule in &self.rules {
            let mut declarations = Declarations::new();
            for (operation, steps) in &rule.methods {
                let op = operation.clone();
                let steps: Rc<[Step]> = steps.clone().into();
                let f = move |this: &Collection<Node>, args: &[Value]| {
                    perform(&op, &steps, this, args)
                };
                declarations = if rule.importance == 0 {
                    declarations.method(operation.as_str(), f)
                } else {
                    declarations.important(operation.as_str(), rule.importance, f)
                };
            }
            debug!(selector = %rule.selector, operations = rule.methods.len(), "scripted rule");
            engine
                .select(&rule.selector)?
                .entwine(rule.namespace.as_deref(), vec![declarations.into()])?;
        }
        Ok(engine)
    }

    /// Register the rules, run every call and return one output line per call.
    ///
    /// A failing call is reported through the engine's warning channel and the run continues.
    pub fn run(&self) -> Result<Vec<String>> {
        let engine = self.build()?;
        let mut lines = Vec::with_capacity(self.calls.len());
        for call in &self.calls {
            let scope = engine
                .namespace(call.namespace.as_deref().unwrap_or_default())
                .scope();
            let target = scope.select(&call.selector)?;
            let result = match target.call(&call.operation, &[]) {
                Ok(Some(v)) => render(&v),
                Ok(None) => "none".to_string(),
                Err(e) => {
                    engine
                        .warnings()
                        .warn_exception(&call.operation, Some(&target.elements()), &e);
                    format!("failed: {e}")
                }
            };
            lines.push(format!("{} {} => {result}", call.selector, call.operation));
        }
        Ok(lines)
    }

    /// Register the rules and describe every namespace's rules, highest priority first.
    pub fn rule_table(&self) -> Result<Vec<String>> {
        let engine = self.build()?;
        let mut lines = Vec::new();
        for name in engine.namespace_names() {
            let Some(ns) = engine.get_namespace(&name) else {
                continue;
            };
            for operation in ns.operations() {
                for rule in ns.rules(&operation) {
                    lines.push(format!(
                        "{name} {operation} {} specificity={} importance={} sequence={}",
                        rule.selector().source(),
                        rule.specificity(),
                        rule.importance(),
                        rule.sequence()
                    ));
                }
            }
        }
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use entwine::WarnLevel;

    use super::*;

    const DEMO: &str = r##"(
        config: (warning_level: important),
        nodes: [
            (tag: "div", id: Some("x"), classes: ["a", "b"]),
            (tag: "span", id: Some("y"), classes: ["a"]),
            (tag: "p", id: Some("z")),
        ],
        rules: [
            (selector: "*.b.a", methods: {"speak": [say("ba"), super]}),
            (selector: "*.a", methods: {"speak": [say("a"), super]}),
            (selector: "*", methods: {"speak": [say("base")], "echo": [call("speak")]}),
            (selector: "p", methods: {"boom": [fail("nope")]}),
            (namespace: Some("forms"), selector: "*", methods: {"speak": [say("forms")]}),
            (selector: "#y", importance: 1, methods: {"shout": [say("loud")]}),
        ],
        calls: [
            (selector: "#x", operation: "speak"),
            (selector: "#y", operation: "speak"),
            (selector: "#z", operation: "echo"),
            (selector: "#z", operation: "boom"),
            (namespace: Some("forms"), selector: "#x", operation: "speak"),
            (selector: "#x", operation: "missing"),
        ],
    )"##;

    #[test]
    fn scenario_parses() {
        let s = Scenario::from_ron(DEMO).unwrap();
        assert_eq!(s.config.warning_level, WarnLevel::Important);
        assert_eq!(s.nodes.len(), 3);
        assert!(s.nodes[2].classes.is_empty());
        assert_eq!(
            s.rules[0].methods["speak"],
            vec![Step::Say("ba".into()), Step::Super]
        );
        assert_eq!(s.rules[5].importance, 1);
    }

    #[test]
    fn scenario_runs_every_call() {
        let lines = Scenario::from_ron(DEMO).unwrap().run().unwrap();
        assert_eq!(
            lines,
            vec![
                "#x speak => ba a base",
                "#y speak => a base",
                "#z echo => base",
                "#z boom => failed: Operation 'boom' failed: nope",
                "#x speak => forms",
                "#x missing => none",
            ]
        );
    }

    #[test]
    fn rule_table_lists_highest_first() {
        let lines = Scenario::from_ron(DEMO).unwrap().rule_table().unwrap();
        let speak: Vec<&str> = lines
            .iter()
            .filter(|l| l.starts_with("__base speak"))
            .map(String::as_str)
            .collect();
        assert_eq!(speak.len(), 3);
        assert!(speak[0].contains("*.b.a specificity=(0,2,0)"));
        assert!(speak[2].starts_with("__base speak * "));
        assert!(lines.iter().any(|l| l.starts_with("forms speak *")));
    }

    #[test]
    fn malformed_scenarios_are_errors() {
        assert!(Scenario::from_ron("(nodes: [], bogus: 1)").is_err());
    }
}
