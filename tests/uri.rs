use ironchannel::{ChannelError, ErrorCode, MarkerItem, ReadUri, Scheme, WriteUri};
use ironchannel::{parse_read_uri, parse_write_uri};

#[test]
fn parses_hdfs_partition_uri() -> anyhow::Result<()> {
    let uri = parse_read_uri("hdfspt://host/path?offset=100&length=50")?;
    assert_eq!(uri.scheme, Scheme::Hdfs);
    assert_eq!(uri.authority, "host");
    assert_eq!(uri.path, "path");
    assert_eq!(uri.offset, 100);
    assert_eq!(uri.length, 50);
    assert_eq!(uri.end_offset(), 150);
    assert_eq!(uri.scheme_and_authority(), "hdfs://host");
    assert_eq!(uri.file_path(), "hdfs://host/path");
    Ok(())
}

#[test]
fn parses_wasb_partition_uri_with_port_and_nested_path() -> anyhow::Result<()> {
    let uri = parse_read_uri("wasbpt://acct.blob:443/a/b/c.txt?offset=0&length=2147483647")?;
    assert_eq!(uri.scheme, Scheme::Wasb);
    assert_eq!(uri.authority, "acct.blob:443");
    assert_eq!(uri.path, "a/b/c.txt");
    assert_eq!(uri.length, i32::MAX);
    assert_eq!(uri.file_path(), "wasb://acct.blob:443/a/b/c.txt");
    Ok(())
}

#[test]
fn rejects_malformed_partition_uris() {
    let bad = [
        "hdfs://host/path?offset=1&length=2",
        "ftp://host/path?offset=1&length=2",
        "hdfspt://host",
        "hdfspt:///path?offset=1&length=2",
        "hdfspt://host/?offset=1&length=2",
        "hdfspt://host/path&length=2",
        "hdfspt://host/path?offset=1",
        "hdfspt://host/path?offset=x&length=2",
        "hdfspt://host/path?offset=1&length=",
        "hdfspt://host/path?offset=1&length=4294967296",
        "hdfspt://host/path?offset=-1&length=2",
        "hdfspt://host/path?offset=1&length=-2",
    ];
    for uri in bad {
        let err = parse_read_uri(uri).expect_err(uri);
        assert!(
            matches!(err, ChannelError::UriParse { .. }),
            "{uri}: unexpected {err:?}"
        );
        assert_eq!(err.code(), ErrorCode::InvalidChannelUri);
    }
}

#[test]
fn parses_write_uri() -> anyhow::Result<()> {
    let uri = parse_write_uri("wasb://container/out/part-0000")?;
    assert_eq!(uri.scheme, Scheme::Wasb);
    assert_eq!(uri.authority, "container");
    assert_eq!(uri.path, "out/part-0000");
    assert_eq!(uri.scheme_and_authority(), "wasb://container");

    assert!(parse_write_uri("hdfspt://host/path").is_err());
    assert!(parse_write_uri("hdfs://host").is_err());
    assert!(parse_write_uri("hdfs://host/").is_err());
    Ok(())
}

#[test]
fn display_round_trips_through_from_str() -> anyhow::Result<()> {
    let text = "hdfspt://nn:9000/logs/day.txt?offset=4096&length=1024";
    let uri: ReadUri = text.parse()?;
    assert_eq!(uri.to_string(), text);

    let text = "hdfs://nn:9000/logs/out.txt";
    let uri: WriteUri = text.parse()?;
    assert_eq!(uri.to_string(), text);
    Ok(())
}

#[test]
fn parse_error_becomes_abort_marker() {
    let err = parse_read_uri("nope").unwrap_err();
    let marker = MarkerItem::from(err);
    assert!(marker.is_abort());
    assert_eq!(marker.error_code(), Some(ErrorCode::InvalidChannelUri));
    assert!(marker.description().unwrap_or_default().contains("nope"));
}
