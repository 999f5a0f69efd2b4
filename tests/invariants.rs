//! Cross-cutting invariants, round-trip laws, and boundary behaviors that
//! must hold regardless of which scenario produced the data.

mod support;

use std::time::Duration;

use lessonforge::domain::flow_step_run::FlowStepRunStatus;
use lessonforge::domain::{UnitFlowType, UnitStatus};
use lessonforge::jobs::SubmitOutcome;

/// `sum(step.tokens_used) == flow.total_tokens` and the cost analogue, for
/// every completed flow a real unit creation produces (unit plan + each
/// lesson), not just the parent.
#[tokio::test]
async fn token_and_cost_sums_hold_for_every_flow_run_produced() {
    let h = support::harness(1, Duration::from_secs(30));

    support::script_unit_plan(&h.provider, "Intro to Linear Algebra", &["Vectors", "Matrices"], &["lo_1", "lo_2"]);
    support::script_unit_summary(&h.provider, "Vectors and matrices, from scratch.");
    support::script_standard_lesson(&h.provider, "Vectors", "lo_1");
    support::script_standard_lesson(&h.provider, "Matrices", "lo_2");
    support::script_unit_art(&h.provider);
    support::script_podcast(&h.provider, "Welcome to linear algebra.");

    let request = support::request("linear algebra", 2, Some("Linear algebra studies vectors and linear maps."), UnitFlowType::Standard);
    let outcome = h.manager.submit(request, false).await.unwrap();
    let unit = match outcome {
        SubmitOutcome::Completed(unit) => *unit,
        SubmitOutcome::Accepted { .. } => panic!("sync submission must not return Accepted"),
    };

    let mut flow_run_ids = vec![unit.originating_flow_run_id.unwrap()];
    let lessons = h.store.list_lessons_for_unit(unit.id).await.unwrap();
    flow_run_ids.extend(lessons.iter().filter_map(|l| l.flow_run_id));

    for flow_run_id in flow_run_ids {
        let run = h.store.get_flow_run(flow_run_id).await.unwrap();
        let steps = h.store.list_flow_step_runs(flow_run_id).await.unwrap();
        let summed_tokens: i64 = steps.iter().map(|s| s.tokens_used).sum();
        let summed_cost: f64 = steps.iter().map(|s| s.cost_estimate).sum();
        assert_eq!(summed_tokens, run.total_tokens, "flow {flow_run_id} token sum mismatch");
        assert!((summed_cost - run.total_cost).abs() < 1e-9, "flow {flow_run_id} cost sum mismatch");

        // step_progress is monotonically non-decreasing and bounded by total_steps.
        assert!(run.step_progress <= run.total_steps);
        for step in &steps {
            if step.status == FlowStepRunStatus::Completed {
                assert!(step.outputs.is_some(), "a completed step must have persisted outputs");
            }
        }
    }
}

/// The persisted lesson package satisfies the LO-id coverage and
/// dangling-answer-key invariants end to end through the real orchestrator,
/// not just at the `LessonPackage::check_invariants` unit-test level.
#[tokio::test]
async fn persisted_lesson_packages_satisfy_domain_invariants() {
    let h = support::harness(1, Duration::from_secs(30));

    support::script_unit_plan(&h.provider, "Intro to Statistics", &["Mean and Variance"], &["lo_1"]);
    support::script_unit_summary(&h.provider, "A primer on summary statistics.");
    support::script_standard_lesson(&h.provider, "Mean and Variance", "lo_1");
    support::script_unit_art(&h.provider);
    support::script_podcast(&h.provider, "Welcome to statistics.");

    let request = support::request("statistics", 1, Some("Statistics summarizes data with numbers."), UnitFlowType::Standard);
    let outcome = h.manager.submit(request, false).await.unwrap();
    let unit = match outcome {
        SubmitOutcome::Completed(unit) => *unit,
        SubmitOutcome::Accepted { .. } => panic!("sync submission must not return Accepted"),
    };

    assert!(unit.satisfies_completion_invariant());

    let lessons = h.store.list_lessons_for_unit(unit.id).await.unwrap();
    for lesson in &lessons {
        let package = lesson.package.as_ref().expect("completed lesson has a package");
        package.check_invariants().expect("persisted package must satisfy its own invariants");
        assert!(!package.mini_lesson.trim().is_empty());
        assert!(!package.exercises.is_empty());
    }
}

/// Submitting the same request twice produces two independent `Unit`s and
/// two independent originating `FlowRun`s — no deduplication.
#[tokio::test]
async fn identical_submissions_are_not_deduplicated() {
    let h = support::harness(1, Duration::from_secs(30));

    for _ in 0..2 {
        support::script_unit_plan(&h.provider, "Intro to Sets", &["Set Operations"], &["lo_1"]);
        support::script_unit_summary(&h.provider, "Union, intersection, and complement.");
        support::script_standard_lesson(&h.provider, "Set Operations", "lo_1");
        support::script_unit_art(&h.provider);
        support::script_podcast(&h.provider, "Welcome to sets.");
    }

    let make_request = || support::request("set theory", 1, Some("A set is a collection of distinct objects."), UnitFlowType::Standard);

    let first = match h.manager.submit(make_request(), false).await.unwrap() {
        SubmitOutcome::Completed(unit) => *unit,
        SubmitOutcome::Accepted { .. } => panic!("sync submission must not return Accepted"),
    };
    let second = match h.manager.submit(make_request(), false).await.unwrap() {
        SubmitOutcome::Completed(unit) => *unit,
        SubmitOutcome::Accepted { .. } => panic!("sync submission must not return Accepted"),
    };

    assert_ne!(first.id, second.id);
    assert_ne!(first.originating_flow_run_id, second.originating_flow_run_id);
}

/// `target_lesson_count = 1` is the minimum valid request and produces
/// exactly one lesson.
#[tokio::test]
async fn single_lesson_target_produces_exactly_one_lesson() {
    let h = support::harness(1, Duration::from_secs(30));

    support::script_unit_plan(&h.provider, "Intro to Recursion", &["Base Cases"], &["lo_1"]);
    support::script_unit_summary(&h.provider, "Thinking recursively.");
    support::script_standard_lesson(&h.provider, "Base Cases", "lo_1");
    support::script_unit_art(&h.provider);
    support::script_podcast(&h.provider, "Welcome to recursion.");

    let request = support::request("recursion", 1, Some("Recursion solves a problem via smaller instances of itself."), UnitFlowType::Standard);
    let outcome = h.manager.submit(request, false).await.unwrap();
    let unit = match outcome {
        SubmitOutcome::Completed(unit) => *unit,
        SubmitOutcome::Accepted { .. } => panic!("sync submission must not return Accepted"),
    };

    assert_eq!(unit.status, UnitStatus::Completed);
    assert_eq!(unit.lesson_order.len(), 1);
}

/// When every lesson in the fan-out fails, the unit terminates `failed`
/// with no lessons persisted, even though the unit plan itself succeeded.
#[tokio::test]
async fn all_lessons_failing_fails_the_unit() {
    let h = support::harness(1, Duration::from_secs(30));

    support::script_unit_plan(&h.provider, "Intro to Topology", &["Open Sets", "Continuity"], &["lo_1", "lo_2"]);
    support::script_unit_summary(&h.provider, "An introduction to topological spaces.");
    h.provider.push_failure(lessonforge::llm::LlmError::Validation("malformed lesson metadata".into()));
    h.provider.push_failure(lessonforge::llm::LlmError::Validation("malformed lesson metadata".into()));

    let request = support::request("topology", 2, Some("Topology studies properties preserved under continuous deformation."), UnitFlowType::Standard);
    let outcome = h.manager.submit(request, false).await.unwrap();
    let unit = match outcome {
        SubmitOutcome::Completed(unit) => *unit,
        SubmitOutcome::Accepted { .. } => panic!("sync submission must not return Accepted"),
    };

    assert_eq!(unit.status, UnitStatus::Failed);
    assert!(unit.lesson_order.is_empty());
    assert!(h.store.list_lessons_for_unit(unit.id).await.unwrap().is_empty());

    // Both lessons failed the same way (a validation error), so error_message
    // names that as the most common child error kind rather than a generic
    // "zero lessons" message.
    let message = unit.error_message.expect("failed unit carries an error_message");
    assert!(message.contains("validation_error"), "error_message should name the most common child error kind: {message}");
}
