use loop_core::LoopError;
use loop_host::script::{CompiledScript, Value};
use loop_host::{CapabilityAllowList, SandboxCaps};

fn run(source: &str, text: &str) -> Result<String, LoopError> {
    let script = CompiledScript::compile(source)?;
    script.run(&CapabilityAllowList::default(), SandboxCaps::default(), text)
}

fn eval(body: &str) -> String {
    let source = format!("use re\nuse json\nuse math\nuse string\nuse collections\nfn classify(text) {{\n{body}\n}}\n");
    run(&source, "").unwrap_or_else(|err| panic!("program failed: {err}"))
}

#[test]
fn arithmetic_and_stringification() {
    assert_eq!(eval("return 7 % 3 + 2 * 4"), "9");
    assert_eq!(eval("return -7 % 3"), "2");
    assert_eq!(eval("return 1 / 4"), "0.25");
    assert_eq!(eval("return 3 > 2 and 2 >= 2"), "true");
    assert_eq!(eval("return [1, \"a\", null]"), r#"[1,"a",null]"#);
    assert_eq!(eval("return {\"b\": 2, \"a\": 1}"), r#"{"a":1,"b":2}"#);
    assert_eq!(eval("return null"), "null");
    assert_eq!(eval("return \"ab\" * 3"), "ababab");
    assert_eq!(eval("return [1, 2] * 3"), "[1,2,1,2,1,2]");
    assert_eq!(eval("return len([[0]] * 4)"), "4");
    assert_eq!(eval("return [] * 9223372036854775807"), "[]");
}

#[test]
fn integer_overflow_is_a_runtime_error() {
    let err = run(
        "fn classify(text) { return 9223372036854775807 + 1 }",
        "",
    )
    .unwrap_err();
    assert!(matches!(err, LoopError::Runtime(_)));
    assert_eq!(err.info().context.get("line").map(String::as_str), Some("1"));
}

#[test]
fn control_flow() {
    let body = r#"
    let total = 0
    for i in range(10) {
        if i % 2 == 0 { continue }
        if i > 7 { break }
        total = total + i
    }
    let n = 0
    while n < 3 { n = n + 1 }
    return total + n
    "#;
    assert_eq!(eval(body), "19");
}

#[test]
fn collections_and_index_assignment() {
    let body = r#"
    let counts = {}
    for word in split("a b a c a b") {
        counts[word] = get(counts, word, 0) + 1
    }
    let grid = [[0, 0], [0, 0]]
    grid[1][0] = 5
    let xs = []
    xs.append(3)
    xs.append(1)
    return [counts["a"], grid[1][0], sorted(xs), len(keys(counts)), xs[-1]]
    "#;
    assert_eq!(eval(body), "[3,5,[1,3],3,1]");
}

#[test]
fn string_builtins_and_method_sugar() {
    assert_eq!(eval("return \"  Hi There \".strip().lower()"), "hi there");
    assert_eq!(eval("return \", \".join([\"a\", \"b\"])"), "a, b");
    assert_eq!(eval("return \"hello\".replace(\"l\", \"L\")"), "heLLo");
    assert_eq!(eval("return find(\"héllo\", \"llo\")"), "2");
    assert_eq!(eval("return \"x\" not in \"abc\""), "true");
    assert_eq!(eval("return \"hello\"[1]"), "e");
    assert_eq!(eval("return isinstance(1.5, \"float\")"), "true");
    assert_eq!(eval("return round(2.5)"), "2");
}

#[test]
fn modules() {
    assert_eq!(eval("return re.is_match(\"\\\\d+\", \"abc123\")"), "true");
    assert_eq!(eval("return re.find_all(\"(\\\\w)\\\\d\", \"a1 b2 c\")"), r#"["a","b"]"#);
    assert_eq!(eval("return re.replace(\"\\\\s+\", \"a  b   c\", \"-\")"), "a-b-c");
    assert_eq!(eval("return json.parse(\"{\\\"k\\\": [1, 2]}\")[\"k\"][1]"), "2");
    assert_eq!(eval("return json.dumps({\"a\": true})"), r#"{"a":true}"#);
    assert_eq!(eval("return math.floor(2.7) + math.ceil(0.2)"), "3");
    assert_eq!(eval("return math.pi > 3.14"), "true");
    assert_eq!(eval("return len(string.digits)"), "10");
    assert_eq!(
        eval("return collections.most_common(split(\"b a b c b a\"), 2)"),
        r#"[["b",3],["a",2]]"#
    );
}

#[test]
fn module_use_requires_import() {
    let err = run("fn classify(text) { return re.is_match(\"a\", text) }", "a").unwrap_err();
    assert!(matches!(err, LoopError::Capability(_)));
}

#[test]
fn globals_are_fresh_per_call() {
    let source = "let calls = 0\nfn classify(text) {\n  calls = calls + 1\n  return calls\n}\n";
    let script = CompiledScript::compile(source).expect("compile");
    let allow = CapabilityAllowList::default();
    for _ in 0..3 {
        assert_eq!(script.run(&allow, SandboxCaps::default(), "").unwrap(), "1");
    }
}

#[test]
fn helper_functions_and_recursion_depth() {
    let source = "fn fact(n) {\n  if n <= 1 { return 1 }\n  return n * fact(n - 1)\n}\nfn classify(text) { return fact(int(text)) }\n";
    assert_eq!(run(source, "10").unwrap(), "3628800");
    let err = run(source, "1000").unwrap_err();
    assert_eq!(err.info().code, "loop_host.sandbox_limit");
}

#[test]
fn collection_caps_are_enforced() {
    let script = CompiledScript::compile("fn classify(text) { return len(range(1000)) }")
        .expect("compile");
    let caps = SandboxCaps {
        max_collection_len: 100,
        ..SandboxCaps::default()
    };
    let err = script
        .run(&CapabilityAllowList::default(), caps, "")
        .unwrap_err();
    assert!(matches!(err, LoopError::Runtime(_)));

    let script = CompiledScript::compile("fn classify(text) { return text * 1000 }")
        .expect("compile");
    let caps = SandboxCaps {
        max_string_len: 500,
        ..SandboxCaps::default()
    };
    assert!(script
        .run(&CapabilityAllowList::default(), caps, "ab")
        .is_err());
}

#[test]
fn raw_values_are_exposed() {
    let script = CompiledScript::compile("fn classify(text) { return [text, 1] }").expect("compile");
    let value = script
        .call(&CapabilityAllowList::default(), SandboxCaps::default(), "x")
        .expect("call");
    assert_eq!(value, Value::List(vec![Value::Str("x".into()), Value::Int(1)]));
    assert!(script.has_entry_point());
    assert_eq!(script.function_names(), vec!["classify"]);
}

#[test]
fn oversized_strings_are_rejected_before_they_are_built() {
    let caps = SandboxCaps::default();
    let programs = [
        "fn classify(text) {\n  let s = \"a\" * 20000\n  return s.replace(\"a\", s)\n}",
        "use re\nfn classify(text) {\n  let s = \"a\" * 20000\n  return re.replace(\"a\", s, s)\n}",
        "fn classify(text) {\n  let s = \"a\" * 20000\n  return s.join([s] * 100)\n}",
    ];
    for source in programs {
        let script = CompiledScript::compile(source).expect("compile");
        let started = std::time::Instant::now();
        let err = script
            .run(&CapabilityAllowList::default(), caps, "")
            .unwrap_err();
        assert!(matches!(err, LoopError::Runtime(_)), "{source}: {err}");
        assert_eq!(
            err.info().context.get("resource").map(String::as_str),
            Some("string_len"),
            "{source}"
        );
        assert!(started.elapsed() < std::time::Duration::from_millis(300));
    }
}

#[test]
fn self_nesting_lists_hit_the_depth_cap() {
    let source = "fn classify(text) {\n  let x = []\n  let i = 0\n  while i < 300000 {\n    x = [x]\n    i = i + 1\n  }\n  return len(x)\n}";
    let script = CompiledScript::compile(source).expect("compile");
    let caps = SandboxCaps {
        max_steps: u64::MAX,
        wall_ms: 10_000,
        ..SandboxCaps::default()
    };
    let err = script
        .run(&CapabilityAllowList::default(), caps, "")
        .unwrap_err();
    assert_eq!(
        err.info().context.get("resource").map(String::as_str),
        Some("value_depth")
    );

    let source = "fn classify(text) {\n  let x = [[0]]\n  let i = 0\n  while i < 300000 {\n    x[0] = x\n    i = i + 1\n  }\n  return 0\n}";
    let script = CompiledScript::compile(source).expect("compile");
    let err = script
        .run(&CapabilityAllowList::default(), caps, "")
        .unwrap_err();
    assert_eq!(
        err.info().context.get("resource").map(String::as_str),
        Some("value_depth")
    );
}
