use loop_core::LoopError;
use loop_host::{SandboxCaps, SandboxDecision, SandboxEvent, SandboxGuard};

#[test]
fn detects_step_violation() {
    let caps = SandboxCaps {
        max_steps: 10,
        ..SandboxCaps::default()
    };
    let mut guard = SandboxGuard::new(caps);
    let decision = guard.observe(SandboxEvent::Steps(11));
    match decision {
        SandboxDecision::Exceeded { resource, .. } => assert_eq!(resource, "steps"),
        other => panic!("unexpected decision: {other:?}"),
    }
    assert!(matches!(guard.ensure_within(), Err(LoopError::Runtime(_))));
}

#[test]
fn wall_overrun_is_a_timeout() {
    let mut guard = SandboxGuard::new(SandboxCaps::with_wall_ms(5));
    let err = guard.check(SandboxEvent::WallMs(6)).unwrap_err();
    assert!(matches!(err, LoopError::Timeout(_)));
    assert_eq!(err.info().context.get("timeout_ms").map(String::as_str), Some("5"));
}

#[test]
fn stays_within_limits() {
    let mut guard = SandboxGuard::new(SandboxCaps::default());
    assert!(matches!(
        guard.observe(SandboxEvent::CollectionLen(10)),
        SandboxDecision::Continue
    ));
    for _ in 0..1_000 {
        guard.tick().expect("tick");
    }
    assert_eq!(guard.steps(), 1_000);
    assert!(guard.ensure_within().is_ok());
}

#[test]
fn value_depth_is_capped() {
    let mut guard = SandboxGuard::new(SandboxCaps::default());
    assert!(guard.check(SandboxEvent::ValueDepth(64)).is_ok());
    let err = guard.check(SandboxEvent::ValueDepth(65)).unwrap_err();
    assert!(matches!(err, LoopError::Runtime(_)));
    assert_eq!(
        err.info().context.get("resource").map(String::as_str),
        Some("value_depth")
    );
    assert_eq!(SandboxCaps::relaxed().max_value_depth, 256);
}
