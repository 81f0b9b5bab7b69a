use ironchannel::testing::*;
use ironchannel::{MarkerItem, WriteStatus, WriterHandler};

#[test]
fn line_records_use_requested_ending() {
    assert_eq!(line_records(2, LineEnding::Lf), b"record-0000\nrecord-0001\n");
    assert_eq!(line_records(1, LineEnding::Cr), b"record-0000\r");
    assert!(line_records(0, LineEnding::CrLf).is_empty());
}

#[test]
fn record_starts_follow_delimiter_rules() {
    assert_eq!(record_starts(b"ab\ncd\n"), vec![0, 3]);
    assert_eq!(record_starts(b"ab\rcd\r"), vec![0, 3]);
    assert_eq!(record_starts(b"ab\r\ncd"), vec![0, 4]);
    assert_eq!(record_starts(b"\n\nx"), vec![0, 1, 2]);
}

#[test]
fn partition_assertion_accepts_record_aligned_parts() {
    let file = b"aa\nbbb\ncc\n";
    assert_splits_partition(file, &[b"aa\nbbb\n".to_vec(), Vec::new(), b"cc\n".to_vec()]);
}

#[test]
#[should_panic(expected = "inside a record")]
fn partition_assertion_rejects_split_records() {
    let file = b"aa\nbbb\n";
    assert_splits_partition(file, &[b"aa\nb".to_vec(), b"bb\n".to_vec()]);
}

#[test]
fn recorder_keeps_arrival_order_per_label() {
    let recorder = CompletionRecorder::new();
    let a = recorder.handler("a");
    let b = recorder.handler("b");
    a.process_write_completed(WriteStatus::InProgress);
    b.process_write_completed(WriteStatus::Completed(MarkerItem::EndOfStream));
    a.process_write_completed(WriteStatus::Completed(MarkerItem::EndOfStream));

    assert_eq!(recorder.len(), 3);
    assert_eq!(
        recorder.for_label("a"),
        vec![
            WriteStatus::InProgress,
            WriteStatus::Completed(MarkerItem::EndOfStream)
        ]
    );
    assert_eq!(recorder.statuses()[1].0, "b");
}
