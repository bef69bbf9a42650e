use std::collections::BTreeSet;

use proptest::prelude::*;
use serde_json::json;

use queenbee::honeycomb::HoneycombStore;
use queenbee::tasks::{Task, TaskQueue, TaskStatus};

#[derive(Debug, Clone)]
enum Op {
    Enqueue,
    Claim(usize),
    Complete(usize),
    Fail(usize),
    DeadLetter(usize),
}

fn pick(ids: &[String], i: usize) -> Option<String> {
    ids.get(i % ids.len().max(1)).cloned()
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Enqueue),
        (0..8usize).prop_map(Op::Claim),
        (0..8usize).prop_map(Op::Complete),
        (0..8usize).prop_map(Op::Fail),
        (0..8usize).prop_map(Op::DeadLetter),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn every_task_lives_in_exactly_one_bucket(ops in proptest::collection::vec(op(), 1..30)) {
        let dir = tempfile::tempdir().unwrap();
        let store = HoneycombStore::open(dir.path()).unwrap();
        let queue = TaskQueue::new(store, "queen");
        let mut ids: Vec<String> = Vec::new();

        for op in ops {
            match op {
                Op::Enqueue => {
                    let id = queue
                        .enqueue(Task::new("social", json!({})).with_max_attempts(2))
                        .unwrap();
                    ids.push(id);
                }
                Op::Claim(i) => if let Some(id) = pick(&ids, i) { queue.claim(&id).unwrap(); },
                Op::Complete(i) => if let Some(id) = pick(&ids, i) { queue.complete(&id, json!(null)).unwrap(); },
                Op::Fail(i) => if let Some(id) = pick(&ids, i) { queue.fail(&id, "boom").unwrap(); },
                Op::DeadLetter(i) => if let Some(id) = pick(&ids, i) { queue.dead_letter(&id, "gone").unwrap(); },
            }
        }

        let buckets = queue.load().unwrap();
        let mut seen = BTreeSet::new();
        for status in [
            TaskStatus::Pending,
            TaskStatus::InProgress,
            TaskStatus::Completed,
            TaskStatus::Failed,
        ] {
            for task in buckets.tasks(status) {
                prop_assert!(seen.insert(task.id.clone()), "task {} in two buckets", task.id);
                prop_assert_eq!(task.status, status);
                prop_assert!(task.attempts <= task.max_attempts);
            }
        }
        prop_assert_eq!(seen.len(), ids.len());
    }
}
