//! CLI tests for `broker message` and `broker timer` commands.
//!
//! Spawns the broker binary in an initialized temp root and verifies exit
//! codes and printed records.

use std::path::Path;
use std::process::{Command, Output};

use broker::core::types::Repetitions;
use broker::exit_codes;
use broker::io::scenario::{Scenario, load_scenario, write_scenario};
use broker::test_support::{
    activated_instance, boundary_timer_workflow, initialized_root, owned, timer_instance,
};

fn broker(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_broker"))
        .current_dir(root)
        .args(args)
        .output()
        .expect("run broker")
}

fn stdout_lines(output: &Output) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect()
}

#[test]
fn message_put_then_find_prints_json() {
    let (temp, _paths) = initialized_root().expect("init");
    let put = broker(
        temp.path(),
        &[
            "message",
            "put",
            "--name",
            "order",
            "--correlation-key",
            "o-1",
            "--ttl",
            "500",
            "--id",
            "m-1",
            "--payload",
            "hello",
        ],
    );
    assert_eq!(put.status.code(), Some(exit_codes::OK));

    let find = broker(
        temp.path(),
        &["message", "find", "--name", "order", "--correlation-key", "o-1"],
    );
    assert_eq!(find.status.code(), Some(exit_codes::OK));
    let lines = stdout_lines(&find);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["payload"], "hello");
    assert_eq!(lines[0]["time_to_live"], 500);

    let exists = broker(
        temp.path(),
        &[
            "message",
            "exists",
            "--name",
            "order",
            "--correlation-key",
            "o-1",
            "--id",
            "m-1",
        ],
    );
    assert_eq!(exists.status.code(), Some(exit_codes::OK));
}

#[test]
fn message_find_missing_exits_with_not_found_code() {
    let (temp, _paths) = initialized_root().expect("init");
    let find = broker(
        temp.path(),
        &["message", "find", "--name", "order", "--correlation-key", "none"],
    );
    assert_eq!(find.status.code(), Some(exit_codes::NOT_FOUND));
}

/// Expired messages print in deadline order; removed ones are gone.
#[test]
fn message_expired_lists_in_deadline_order() {
    let (temp, _paths) = initialized_root().expect("init");
    for (name, ttl) in [("late", "30"), ("early", "-10"), ("middle", "20")] {
        let put = broker(
            temp.path(),
            &[
                "message",
                "put",
                "--name",
                name,
                "--correlation-key",
                "k",
                "--ttl",
                ttl,
            ],
        );
        assert_eq!(put.status.code(), Some(exit_codes::OK));
    }
    let remove = broker(
        temp.path(),
        &["message", "remove", "--name", "middle", "--correlation-key", "k"],
    );
    assert_eq!(remove.status.code(), Some(exit_codes::OK));

    let expired = broker(temp.path(), &["message", "expired", "--before", "25"]);
    assert_eq!(expired.status.code(), Some(exit_codes::OK));
    let names: Vec<String> = stdout_lines(&expired)
        .iter()
        .map(|line| line["name"].as_str().expect("name").to_string())
        .collect();
    assert_eq!(names, vec!["early".to_string()]);
}

#[test]
fn timer_trigger_consumes_timer_and_prints_records() {
    let (temp, paths) = initialized_root().expect("init");
    let scenario = Scenario {
        now_ms: Some(1_000),
        timers: vec![timer_instance(
            1,
            owned(4),
            Repetitions::Finite(2),
        )],
        element_instances: vec![activated_instance(4, 7)],
        workflows: vec![boundary_timer_workflow(7)],
    };
    write_scenario(&paths.timers_path, &scenario).expect("write scenario");

    let output = broker(temp.path(), &["timer", "trigger", "--key", "1"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let lines = stdout_lines(&output);
    let record_types: Vec<&str> = lines
        .iter()
        .map(|line| line["record_type"].as_str().expect("record type"))
        .collect();
    assert_eq!(record_types, vec!["EVENT", "EVENT", "COMMAND"]);
    assert_eq!(lines[1]["intent"]["intent"], "TRIGGERED");
    assert_eq!(lines[2]["value"]["value"]["repetitions"], 1);
    assert_eq!(lines[2]["value"]["value"]["due_date"], 6_000);

    let remaining = load_scenario(&paths.timers_path).expect("load scenario");
    assert!(remaining.timers.is_empty());
}

#[test]
fn timer_trigger_unknown_key_exits_with_rejected_code() {
    let (temp, _paths) = initialized_root().expect("init");
    let output = broker(temp.path(), &["timer", "trigger", "--key", "42"]);
    assert_eq!(output.status.code(), Some(exit_codes::REJECTED));
    let lines = stdout_lines(&output);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["rejection_type"], "NOT_FOUND");
}
