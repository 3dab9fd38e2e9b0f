use loop_core::{ProgramArtifact, TaskId};
use loop_host::{ProgramExecutor, SandboxCaps};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::{json, Map, Value};

const SPAM_FILTER: &str = r#"
use re
let keywords = ["buy", "free", "winner", "prize"]

fn classify(text) {
    let lowered = text.lower()
    for word in keywords {
        if word in lowered { return "spam" }
    }
    if re.is_match("\\$\\d+", text) { return "spam" }
    return "ham"
}
"#;

fn input(text: &str) -> Map<String, Value> {
    match json!({ "text": text }) {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn executor_bench(c: &mut Criterion) {
    let executor = ProgramExecutor::new(SandboxCaps::default());
    let task_id = TaskId::new();
    let artifact = ProgramArtifact::new(task_id, 1, SPAM_FILTER);
    let ham = input("Meeting moved to 2pm, see agenda attached");
    let spam = input("You are a WINNER, claim $500 now");
    c.bench_function("execute_spam_filter", |b| {
        b.iter(|| {
            black_box(executor.execute(&artifact, &ham, task_id));
            black_box(executor.execute(&artifact, &spam, task_id));
        });
    });
}

criterion_group!(benches, executor_bench);
criterion_main!(benches);
