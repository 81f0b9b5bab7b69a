use anyhow::Result;
use ironchannel::bridge::{FakeBridge, FakeFaults};
use ironchannel::testing::ChannelCollector;
use ironchannel::{
    ChannelBuffer, ChannelConfig, ErrorCode, FlowControlledReader, MarkerItem, ReaderState,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const FILE: &str = "hdfs://nn/input.txt";
const WAIT: Duration = Duration::from_millis(200);

fn reader(bridge: &FakeBridge, uri: &str, config: ChannelConfig) -> FlowControlledReader {
    FlowControlledReader::new(uri, Arc::new(bridge.clone()), config)
}

fn small_blocks(block: usize) -> ChannelConfig {
    ChannelConfig {
        read_block_size: block,
        ..ChannelConfig::default()
    }
}

fn data_buffers(buffers: &[ChannelBuffer]) -> usize {
    buffers.iter().filter(|b| !b.is_marker()).count()
}

#[test]
fn reads_whole_partition_and_ends_cleanly() -> Result<()> {
    let bridge = FakeBridge::new();
    bridge.put_file(FILE, b"one\ntwo\nthree\n");

    let r = reader(&bridge, "hdfspt://nn/input.txt?offset=0&length=14", ChannelConfig::default());
    assert_eq!(r.state(), ReaderState::Created);
    let collector = ChannelCollector::new(r.buffer_return());
    r.start(collector.handler());

    let (bytes, terminal) = collector.collect_to_end();
    assert_eq!(bytes, b"one\ntwo\nthree\n");
    assert_eq!(terminal, MarkerItem::EndOfStream);

    r.drain();
    assert_eq!(r.state(), ReaderState::Drained);
    let status = r.fill_in_status();
    assert_eq!(status.total_length, 14);
    assert_eq!(status.processed_length, 14);
    assert_eq!(r.total_length(), 14);
    r.close();
    assert_eq!(r.state(), ReaderState::Closed);
    Ok(())
}

#[test]
fn delivers_contiguous_blocks_in_offset_order() -> Result<()> {
    let bridge = FakeBridge::new();
    let data: Vec<u8> = b"0123456789\n".repeat(5);
    bridge.put_file(FILE, &data);

    let uri = format!("hdfspt://nn/input.txt?offset=0&length={}", data.len());
    let r = reader(&bridge, &uri, small_blocks(7));
    let collector = ChannelCollector::new(r.buffer_return());
    r.start(collector.handler());

    let mut next = 0;
    loop {
        let buffer = collector.recv_timeout(Duration::from_secs(5)).expect("reader stalled");
        if let Some(block) = buffer.as_data() {
            assert_eq!(block.offset(), next);
            assert!(block.len() <= 7);
            next = block.end_offset();
            collector.return_buffer(buffer);
        } else {
            assert_eq!(buffer.as_marker(), Some(&MarkerItem::EndOfStream));
            collector.return_buffer(buffer);
            break;
        }
    }
    assert_eq!(next, data.len() as u64);
    r.drain();
    r.close();
    Ok(())
}

#[test]
fn never_more_than_max_buffers_outstanding() -> Result<()> {
    let bridge = FakeBridge::new();
    bridge.put_file(FILE, &b"x".repeat(99).into_iter().chain([b'\n']).collect::<Vec<_>>());

    let r = reader(&bridge, "hdfspt://nn/input.txt?offset=0&length=100", small_blocks(1));
    let collector = ChannelCollector::new(r.buffer_return());
    r.start(collector.handler());

    // The handler never returns anything; the session must stall at the limit.
    thread::sleep(WAIT);
    let held = collector.pending();
    assert_eq!(held.len(), 4);
    assert_eq!(data_buffers(&held), 4);

    thread::sleep(WAIT);
    assert!(collector.pending().is_empty());

    // Interrupt must not deadlock while the session waits for a permit.
    r.interrupt();
    assert_eq!(r.state(), ReaderState::Interrupted);
    for buffer in held {
        r.return_buffer(buffer);
    }
    r.drain();
    r.close();
    Ok(())
}

#[test]
fn end_marker_also_waits_for_a_permit() -> Result<()> {
    let bridge = FakeBridge::new();
    bridge.put_file(FILE, b"abc\n");

    let config = ChannelConfig {
        read_block_size: 1,
        max_buffers_out: 4,
        ..ChannelConfig::default()
    };
    let r = reader(&bridge, "hdfspt://nn/input.txt?offset=0&length=4", config);
    let collector = ChannelCollector::new(r.buffer_return());
    r.start(collector.handler());

    thread::sleep(WAIT);
    let held = collector.pending();
    assert_eq!(data_buffers(&held), 4);
    assert!(held.iter().all(|b| !b.is_marker()));

    // Freeing one permit lets the marker through.
    let mut held = held.into_iter();
    if let Some(first) = held.next() {
        collector.return_buffer(first);
    }
    let marker = collector.recv_timeout(Duration::from_secs(5)).expect("no marker");
    assert_eq!(marker.as_marker(), Some(&MarkerItem::EndOfStream));
    collector.return_buffer(marker);
    for buffer in held {
        collector.return_buffer(buffer);
    }
    r.drain();
    r.close();
    Ok(())
}

#[test]
fn no_deliveries_after_interrupt_returns() -> Result<()> {
    let bridge = FakeBridge::new();
    bridge.put_file(FILE, &b"line\n".repeat(200));
    bridge.set_faults(FakeFaults {
        read_delay: Some(Duration::from_millis(5)),
        ..FakeFaults::default()
    });

    let r = reader(&bridge, "hdfspt://nn/input.txt?offset=0&length=1000", small_blocks(10));
    let returns = r.buffer_return();
    let (tx, rx) = crossbeam_channel::unbounded::<ChannelBuffer>();
    r.start(Arc::new(move |buffer: ChannelBuffer| {
        let _ = tx.send(buffer.clone());
        returns.return_buffer(buffer);
    }));

    thread::sleep(Duration::from_millis(50));
    r.interrupt();
    let seen_at_interrupt = rx.try_iter().count();
    assert!(seen_at_interrupt > 0);

    thread::sleep(WAIT);
    assert_eq!(rx.try_iter().count(), 0);

    r.drain();
    r.close();
    Ok(())
}

#[test]
fn interrupt_is_idempotent_and_safe_before_start() -> Result<()> {
    let bridge = FakeBridge::new();
    bridge.put_file(FILE, b"a\n");

    let r = reader(&bridge, "hdfspt://nn/input.txt?offset=0&length=2", ChannelConfig::default());
    r.interrupt();
    r.interrupt();
    assert_eq!(r.state(), ReaderState::Created);
    r.drain();
    r.close();
    Ok(())
}

#[test]
fn concurrent_interrupts_all_return() -> Result<()> {
    let bridge = FakeBridge::new();
    bridge.put_file(FILE, &b"z".repeat(64));

    let r = Arc::new(reader(
        &bridge,
        "hdfspt://nn/input.txt?offset=0&length=64",
        small_blocks(1),
    ));
    let collector = ChannelCollector::new(r.buffer_return());
    r.start(collector.handler());
    thread::sleep(Duration::from_millis(50));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let r = Arc::clone(&r);
            thread::spawn(move || r.interrupt())
        })
        .collect();
    for h in handles {
        h.join().expect("interrupt thread panicked");
    }

    for buffer in collector.pending() {
        collector.return_buffer(buffer);
    }
    r.drain();
    r.close();
    Ok(())
}

#[test]
fn range_without_record_start_yields_only_end_of_stream() -> Result<()> {
    let bridge = FakeBridge::new();
    bridge.put_file(FILE, b"aaaaaaaaaaaaaaaa\n");

    let r = reader(&bridge, "hdfspt://nn/input.txt?offset=2&length=3", ChannelConfig::default());
    let collector = ChannelCollector::new(r.buffer_return());
    r.start(collector.handler());

    let first = collector.recv_timeout(Duration::from_secs(5)).expect("no buffer");
    assert_eq!(first.as_marker(), Some(&MarkerItem::EndOfStream));
    collector.return_buffer(first);
    r.drain();
    assert_eq!(r.fill_in_status().processed_length, 0);
    r.close();
    Ok(())
}

#[test]
fn zero_length_partition_ends_immediately() -> Result<()> {
    let bridge = FakeBridge::new();
    bridge.put_file(FILE, b"abc\n");

    let r = reader(&bridge, "hdfspt://nn/input.txt?offset=2&length=0", ChannelConfig::default());
    let collector = ChannelCollector::new(r.buffer_return());
    r.start(collector.handler());

    let (bytes, terminal) = collector.collect_to_end();
    assert!(bytes.is_empty());
    assert_eq!(terminal, MarkerItem::EndOfStream);
    r.drain();
    r.close();
    Ok(())
}

fn terminal_for(bridge: &FakeBridge, uri: &str, config: ChannelConfig) -> (Vec<u8>, MarkerItem) {
    let r = reader(bridge, uri, config);
    let collector = ChannelCollector::new(r.buffer_return());
    r.start(collector.handler());
    let out = collector.collect_to_end();
    r.drain();
    r.close();
    out
}

#[test]
fn read_error_aborts_after_earlier_blocks() -> Result<()> {
    let bridge = FakeBridge::new();
    bridge.put_file(FILE, &b"0123456789".repeat(3));
    bridge.set_faults(FakeFaults {
        read_error_at: Some(15),
        ..FakeFaults::default()
    });

    let (bytes, terminal) = terminal_for(
        &bridge,
        "hdfspt://nn/input.txt?offset=0&length=30",
        small_blocks(10),
    );
    assert_eq!(bytes, b"0123456789");
    assert_eq!(terminal.error_code(), Some(ErrorCode::ChannelReadError));
    let description = terminal.description().unwrap_or_default();
    assert!(description.contains("at offset 10:10"), "{description}");
    assert!(description.contains("checksum error"), "{description}");
    Ok(())
}

#[test]
fn short_read_aborts() -> Result<()> {
    let bridge = FakeBridge::new();
    bridge.put_file(FILE, b"0123456789\n");
    bridge.set_faults(FakeFaults {
        short_read: true,
        ..FakeFaults::default()
    });

    let (bytes, terminal) = terminal_for(
        &bridge,
        "hdfspt://nn/input.txt?offset=0&length=11",
        ChannelConfig::default(),
    );
    assert!(bytes.is_empty());
    assert_eq!(terminal.error_code(), Some(ErrorCode::ChannelReadError));
    assert!(
        terminal
            .description()
            .unwrap_or_default()
            .contains("too few bytes")
    );
    Ok(())
}

#[test]
fn range_past_end_of_file_aborts_on_eof() -> Result<()> {
    let bridge = FakeBridge::new();
    bridge.put_file(FILE, b"abc\n");

    let (bytes, terminal) = terminal_for(
        &bridge,
        "hdfspt://nn/input.txt?offset=0&length=8",
        small_blocks(4),
    );
    assert_eq!(bytes, b"abc\n");
    assert_eq!(terminal.error_code(), Some(ErrorCode::ChannelReadError));
    assert!(terminal.description().unwrap_or_default().contains("got EOF"));
    Ok(())
}

#[test]
fn open_failures_become_open_errors() -> Result<()> {
    let bridge = FakeBridge::new();

    let (_, missing) = terminal_for(
        &bridge,
        "hdfspt://nn/missing.txt?offset=0&length=4",
        ChannelConfig::default(),
    );
    assert_eq!(missing.error_code(), Some(ErrorCode::ChannelOpenError));
    let description = missing.description().unwrap_or_default();
    assert!(description.contains("Can't open HDFS file"), "{description}");
    assert!(description.contains("FileNotFoundException"), "{description}");

    bridge.put_file(FILE, b"abc\n");
    bridge.set_faults(FakeFaults {
        fail_open_instance: true,
        ..FakeFaults::default()
    });
    let (_, refused) = terminal_for(
        &bridge,
        "hdfspt://nn/input.txt?offset=0&length=4",
        ChannelConfig::default(),
    );
    assert_eq!(refused.error_code(), Some(ErrorCode::ChannelOpenError));
    assert!(
        refused
            .description()
            .unwrap_or_default()
            .contains("Can't open HDFS Bridge 'hdfs://nn'")
    );

    bridge.set_faults(FakeFaults {
        fail_initialize: true,
        ..FakeFaults::default()
    });
    let (_, uninit) = terminal_for(
        &bridge,
        "hdfspt://nn/input.txt?offset=0&length=4",
        ChannelConfig::default(),
    );
    assert_eq!(uninit.error_code(), Some(ErrorCode::ChannelOpenError));
    Ok(())
}

#[test]
fn bad_uri_becomes_invalid_uri_marker() -> Result<()> {
    let bridge = FakeBridge::new();
    let (bytes, terminal) = terminal_for(&bridge, "hdfspt://nn/input.txt", ChannelConfig::default());
    assert!(bytes.is_empty());
    assert_eq!(terminal.error_code(), Some(ErrorCode::InvalidChannelUri));
    Ok(())
}

#[test]
fn constructor_preconnects_to_the_bridge() {
    let bridge = FakeBridge::new();
    let _r = reader(&bridge, "hdfspt://nn/input.txt?offset=0&length=1", ChannelConfig::default());
    assert_eq!(bridge.instances_opened(), 1);
}

#[test]
#[should_panic(expected = "started twice")]
fn starting_twice_panics() {
    let bridge = FakeBridge::new();
    bridge.put_file(FILE, b"a\n");
    let r = reader(&bridge, "hdfspt://nn/input.txt?offset=0&length=2", ChannelConfig::default());
    r.start(Arc::new(|_: ChannelBuffer| {}));
    r.start(Arc::new(|_: ChannelBuffer| {}));
}

#[test]
#[should_panic(expected = "closed before drain")]
fn closing_without_drain_panics() {
    let bridge = FakeBridge::new();
    bridge.put_file(FILE, b"a\n");
    let r = reader(&bridge, "hdfspt://nn/input.txt?offset=0&length=2", ChannelConfig::default());
    r.start(Arc::new(|_: ChannelBuffer| {}));
    r.close();
}
