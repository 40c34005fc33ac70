/// Verification of small logs written in the load-generator text format.
mod common;

use common::verify_logs;
use kvoracle_core::types::{Key, Version};
use kvoracle_core::Verdict;

#[test]
fn write_then_read_passes() {
    let verified = verify_logs(&["\
t1, th1, Version, 5
t1, th1, Write, m1:k1=v1
t1, th1, Read, m1:k1=v1
t1, main, Liveness, Success
"]);
    assert!(verified.inconsistencies.is_empty());
    assert!(verified.skipped.is_empty());
    let client = &verified.report.client_reports[&0];
    assert_eq!((client.operations.writes, client.operations.reads), (1, 1));
    assert_eq!(verified.report.status(), Verdict::Pass);
}

#[test]
fn wrong_read_is_reported() {
    let verified = verify_logs(&["\
t1, th1, Version, 5
t1, th1, Write, m1:k1=RIGHT
t1, th1, Read, m1:k1=WRONG
"]);
    assert_eq!(verified.inconsistencies.len(), 1);
    assert!(!verified.report.correctness_success());
    let text = verified.inconsistencies[0].to_string();
    assert!(text.contains("expected value: GHT, read_value: ONG"), "{text}");
}

#[test]
fn transaction_commit_is_visible_at_commit_version() {
    let verified = verify_logs(&["\
t1, th1, Version, 1
t1, th1, Write, m1:k1=v1
t2, tx-1, TxSnap, start
t3, tx-1, TxWrite, m1:k1=v2,1
t4, tx-1, TxRead, m1:k1=v2,1
t5, tx-1, TxSnap, end, 3
"]);
    assert!(verified.inconsistencies.is_empty());
    let history = verified.state.key_state(&Key::new("m1", "k1")).unwrap();
    assert_eq!(history.get_at_version(Version(3)), Some("v2"));
    assert_eq!(history.get_at_version(Version(2)), Some("v1"));
}

#[test]
fn aborted_transaction_is_invisible() {
    let verified = verify_logs(&["\
t1, tx-1, TxOpt, start
t2, tx-1, TxWrite, m1:k1=v2,1
t3, tx-1, TxOpt, aborted
t4, th1, Version, 2
t5, th1, Read, m1:k1=null
"]);
    assert!(verified.inconsistencies.is_empty());
    assert!(verified.state.key_state(&Key::new("m1", "k1")).is_none());
}

#[test]
fn bad_lines_are_skipped_and_the_run_continues() {
    let verified = verify_logs(&["\
t1, th1, Version, 5
garbage
t1, th1, Frobnicate, m1:k1=v
t1, tx-9, TxRead, m1:k1=v,5
t1, th1, Write, m1:k1=v1
t1, th1, Read, m1:k1=v1
"]);
    assert_eq!(verified.skipped, vec![1, 2, 3]);
    assert!(verified.inconsistencies.is_empty());
    assert_eq!(verified.report.read_count(), 1);
}

#[test]
fn clients_are_verified_together() {
    let verified = verify_logs(&[
        "\
t1, th1, Version, 4
t1, th1, Read, m1:k1=from-c1
t1, main, Liveness, Success
",
        "\
t1, th1, Version, 3
t1, th1, Write, m1:k1=from-c1
t1, main, Liveness, Fail
",
    ]);
    assert!(verified.inconsistencies.is_empty());
    assert!(verified.report.correctness_success());
    assert!(!verified.report.liveness_success());
    assert_eq!(verified.report.status(), Verdict::Fail);
}
