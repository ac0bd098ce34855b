//! Scripted sessions through the full read loop

use std::sync::Arc;

use parking_lot::Mutex;
use tsrepl::repl::engine::Promise;
use tsrepl::repl::preview::check_complete;
use tsrepl::repl::{
    from_fn, EvalError, HelperError, HelperOptions, HistoryError, PreviewHost, Repl, ReplError,
    ReplOptions, ScriptedEditor, Value,
};
use tsrepl::util::{Capture, Console};

const NOTICE: &str = "Type \".ls\" to a view list of available context methods/properties";

fn options(editor: impl FnOnce(Console) -> ScriptedEditor) -> (ReplOptions, Capture) {
    let (console, capture) = Console::capture();
    let editor = editor(console.clone());
    let options = ReplOptions::default()
        .with_console(console)
        .with_colors(false)
        .with_editor(Box::new(editor));
    (options, capture)
}

fn scripted(lines: &[&str]) -> (ReplOptions, Capture) {
    let lines: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
    options(move |console| ScriptedEditor::new(lines, console))
}

#[test]
fn test_block_across_two_lines_is_evaluated_once() {
    let (options, capture) = scripted(&["{", "}"]);
    let mut repl = Repl::new(PreviewHost::new(), options).unwrap();
    repl.start().unwrap().run().unwrap();

    assert_eq!(
        capture.stdout(),
        format!("\n{NOTICE}\n> (js) {{\n... }}\n'{{\\n}}'\n> (js) \n")
    );
    assert!(!capture.stdout().contains("Uncaught"));
}

#[test]
fn test_each_buffered_attempt_reaches_the_host() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    let host = from_fn(move |unit, _| {
        log.lock().push(unit.code.clone());
        check_complete(&unit.code)?;
        Ok(Value::Number(1.0))
    });

    let (options, capture) = scripted(&["if (ready) {", "  go()", "}", "2"]);
    let mut repl = Repl::new(host, options).unwrap();
    repl.start().unwrap().run().unwrap();

    assert_eq!(
        seen.lock().as_slice(),
        [
            "if (ready) {",
            "if (ready) {\n  go()",
            "if (ready) {\n  go()\n}",
            "2",
        ]
    );
    assert_eq!(capture.stdout().matches("\n1\n").count(), 2);
}

#[test]
fn test_statement_errors_are_reported_and_the_loop_continues() {
    let host = from_fn(|unit, _| {
        if unit.code == "boom()" {
            Err(tsrepl::repl::HostError::new("ReferenceError", "boom is not defined"))
        } else {
            Ok(Value::from("fine"))
        }
    });
    let (options, capture) = scripted(&["boom()", "'ok'"]);
    let mut repl = Repl::new(host, options).unwrap();
    repl.start().unwrap().run().unwrap();

    let out = capture.stdout();
    assert!(out.contains("Uncaught ReferenceError: boom is not defined\n"));
    assert!(out.contains("'fine'\n"));
}

#[test]
fn test_top_level_await_settles_before_printing() {
    let host = from_fn(|unit, scope| {
        if !unit.suspends {
            return Ok(Value::Undefined);
        }
        let (promise, resolver) = Promise::pending();
        scope.spawn(async move {
            tokio::task::yield_now().await;
            resolver.resolve(Value::Number(42.0));
        });
        Ok(Value::Promise(promise))
    });
    let (options, capture) = scripted(&["const answer = await compute()"]);
    let mut repl = Repl::new(host, options).unwrap();
    repl.start().unwrap().run().unwrap();

    assert!(capture.stdout().contains("\n42\n"));
}

#[test]
fn test_rejected_suspension_is_a_statement_error() {
    let host = from_fn(|_, _| {
        Ok(Value::Promise(Promise::rejected(Value::error(
            "Error",
            "connection refused",
        ))))
    });
    let (console, _capture) = Console::capture();
    let mut repl = Repl::new(host, ReplOptions::default().with_console(console)).unwrap();

    match repl.eval("await connect()") {
        Err(EvalError::Statement(err)) => {
            assert_eq!(err.name, "Error");
            assert_eq!(err.message, "connection refused");
        }
        other => panic!("expected a statement error, got {other:?}"),
    }
}

#[test]
fn test_declaration_without_a_name_is_a_statement_error() {
    let host = from_fn(|unit, _| {
        assert!(unit.suspends);
        Err(tsrepl::repl::HostError::syntax("Missing variable name"))
    });
    let (console, _capture) = Console::capture();
    let mut repl = Repl::new(host, ReplOptions::default().with_console(console)).unwrap();

    assert!(matches!(repl.eval("var = await load()"), Err(EvalError::Statement(_))));
    assert!(matches!(repl.eval("const = await x"), Err(EvalError::Statement(_))));
}

#[test]
fn test_await_inside_template_settles() {
    let host = from_fn(|unit, _| {
        assert!(unit.suspends);
        Ok(Value::Promise(Promise::resolved(Value::from("hello ada"))))
    });
    let (console, _capture) = Console::capture();
    let mut repl = Repl::new(host, ReplOptions::default().with_console(console)).unwrap();

    assert_eq!(
        repl.eval("`hello ${await getName()}`").unwrap(),
        Value::from("hello ada")
    );
}

#[test]
fn test_helpers_receive_the_session_scope() {
    let host = from_fn(|unit, scope| {
        let name = unit.code.trim_end_matches("()");
        scope.call_by_name(name, Vec::new())
    });
    let (options, capture) = scripted(&["remember()", "recall()"]);
    let mut repl = Repl::new(host, options).unwrap();
    repl.add_method(
        "remember",
        |scope, _| {
            scope.set("memo", Value::from("kept"));
            Ok(Value::Undefined)
        },
        HelperOptions::new().description("Store a memo"),
    )
    .add_method(
        "recall",
        |scope, _| {
            scope
                .get("memo")
                .cloned()
                .ok_or_else(|| HelperError::Failed("nothing to recall".to_string()))
        },
        HelperOptions::new(),
    );
    repl.start().unwrap().run().unwrap();

    assert_eq!(repl.namespace()["memo"], Value::from("kept"));
    assert!(capture.stdout().contains("'kept'\n"));
}

#[test]
fn test_clear_removes_a_property() {
    let host = from_fn(|unit, scope| match unit.code.as_str() {
        "user = 'ada'" => {
            scope.set("user", Value::from("ada"));
            Ok(Value::from("ada"))
        }
        _ => scope.call_by_name("clear", vec![Value::from("user")]),
    });
    let (options, _capture) = scripted(&["user = 'ada'", "clear('user')"]);
    let mut repl = Repl::new(host, options).unwrap();
    repl.start().unwrap().run().unwrap();

    assert!(!repl.namespace().contains_key("user"));
    assert!(repl.namespace().contains_key("clear"));
}

#[test]
fn test_ls_aligns_helpers_and_hides_host_globals() {
    let host = from_fn(|_, scope| {
        scope.set("setTimeout", Value::Undefined);
        scope.set("users", Value::Array(vec![Value::from("ada")]));
        Ok(Value::Undefined)
    });
    let (options, capture) = scripted(&["seed()", ".ls"]);
    let mut repl = Repl::new(host, options).unwrap();
    repl.add_method(
        "loadFixtures",
        |_, _| Ok(Value::Undefined),
        HelperOptions::new().description("Load the fixtures"),
    );
    repl.start().unwrap().run().unwrap();

    let out = capture.stdout();
    let listing = out
        .split("GLOBAL METHODS:\n")
        .nth(1)
        .and_then(|rest| rest.split("\n\nCONTEXT PROPERTIES/METHODS:\n").next())
        .unwrap();
    assert_eq!(
        listing,
        [
            format!("loadFixtures{}Load the fixtures", " ".repeat(10)),
            format!(
                "clear (propertyName){}Clear a property from the REPL context",
                " ".repeat(2)
            ),
            format!(
                "p (function){}Promisify a function. Similar to Node.js \"util.promisify\"",
                " ".repeat(10)
            ),
        ]
        .join("\n")
    );
    assert!(out.contains("CONTEXT PROPERTIES/METHODS:\n{ users: [ 'ada' ] }\n"));
    assert!(!out.contains("setTimeout"));
}

#[test]
fn test_ready_callbacks_run_once_in_order() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let (options, capture) = scripted(&[]);
    let mut repl = Repl::new(PreviewHost::new(), options).unwrap();

    for id in 1..=3 {
        let order = order.clone();
        repl.ready(move |repl| {
            assert!(repl.server().is_some());
            order.lock().push(id);
        });
    }
    let first = order.clone();
    repl.ready(move |repl| {
        repl.notify("connected");
        first.lock().push(4);
    });

    repl.start().unwrap().run().unwrap();
    assert_eq!(order.lock().as_slice(), [1, 2, 3, 4]);
    assert!(capture.stdout().contains("connected\n"));
}

#[test]
fn test_session_state_errors() {
    let (options, _capture) = scripted(&[]);
    let mut repl = Repl::new(PreviewHost::new(), options).unwrap();
    assert!(matches!(repl.run(), Err(ReplError::NotStarted)));
    repl.start().unwrap();
    assert!(matches!(repl.start(), Err(ReplError::AlreadyStarted)));
}

#[test]
fn test_unusable_history_file_fails_start() {
    let dir = tempfile::tempdir().unwrap();
    let (options, capture) = scripted(&["1"]);
    let options = options.with_history_file(Some(dir.path().join("missing").join("history")));
    let mut repl = Repl::new(PreviewHost::new(), options).unwrap();

    let ready = Arc::new(Mutex::new(false));
    let flag = ready.clone();
    repl.ready(move |_| *flag.lock() = true);

    let err = repl.start().err().unwrap();
    assert!(matches!(err, ReplError::History(HistoryError::Open { .. })));
    assert!(capture
        .stdout()
        .contains("Unable to write to the history file. Exiting"));
    assert!(!*ready.lock());
}

#[test]
fn test_history_is_saved_on_exit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history");
    std::fs::write(&path, "old\n").unwrap();

    let (options, _capture) = scripted(&["1 + 1", ".exit"]);
    let options = options.with_history_file(Some(path.clone()));
    let mut repl = Repl::new(PreviewHost::new(), options).unwrap();
    repl.start().unwrap().run().unwrap();

    let saved = std::fs::read_to_string(&path).unwrap();
    assert_eq!(saved, "old\n1 + 1\n.exit\n");
}
