use ironchannel::ChannelConfig;
use std::fs;

#[test]
fn defaults_match_channel_constants() {
    let config = ChannelConfig::default();
    assert_eq!(config.read_block_size, 2 * 1024 * 1024);
    assert_eq!(config.max_buffers_out, 4);
    assert_eq!(config.scan_chunk_size, 4096);
    assert_eq!(config.write_buffer_size, 256 * 1024);
    assert_eq!(config.write_queue_threshold, 4);
    assert_eq!(config.file_mode, 0o644);
    assert!(config.replication.is_none());
    assert!(config.validate().is_ok());
}

#[test]
fn load_fills_missing_fields_with_defaults() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("channel.json");
    fs::write(&path, r#"{ "max_buffers_out": 8, "owner": "etl" }"#)?;

    let config = ChannelConfig::load(&path)?;
    assert_eq!(config.max_buffers_out, 8);
    assert_eq!(config.owner.as_deref(), Some("etl"));
    assert_eq!(config.resolved_owner().as_deref(), Some("etl"));
    assert_eq!(config.read_block_size, ChannelConfig::default().read_block_size);
    Ok(())
}

#[test]
fn load_rejects_zero_sizes_and_bad_json() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;

    let zero = tmp.path().join("zero.json");
    fs::write(&zero, r#"{ "read_block_size": 0 }"#)?;
    let err = ChannelConfig::load(&zero).unwrap_err();
    assert!(format!("{err:#}").contains("read_block_size must be positive"));

    let garbage = tmp.path().join("garbage.json");
    fs::write(&garbage, "not json")?;
    assert!(ChannelConfig::load(&garbage).is_err());

    assert!(ChannelConfig::load(tmp.path().join("missing.json")).is_err());
    Ok(())
}

#[test]
fn serializes_round_trip() -> anyhow::Result<()> {
    let config = ChannelConfig {
        replication: Some(3),
        ..ChannelConfig::default()
    };
    let text = serde_json::to_string(&config)?;
    let back: ChannelConfig = serde_json::from_str(&text)?;
    assert_eq!(back, config);
    Ok(())
}
