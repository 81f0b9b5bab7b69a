//! Pre-built line-delimited files.

/// Line terminator used by [`line_records`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    Cr,
    CrLf,
}

impl LineEnding {
    #[must_use]
    pub const fn as_bytes(self) -> &'static [u8] {
        match self {
            Self::Lf => b"\n",
            Self::Cr => b"\r",
            Self::CrLf => b"\r\n",
        }
    }
}

/// `count` records `record-0000`, `record-0001`, ... each followed by `ending`.
///
/// # Example
///
/// ```
/// use ironchannel::testing::{LineEnding, line_records};
///
/// assert_eq!(line_records(2, LineEnding::CrLf), b"record-0000\r\nrecord-0001\r\n");
/// ```
#[must_use]
pub fn line_records(count: usize, ending: LineEnding) -> Vec<u8> {
    let mut out = Vec::new();
    for i in 0..count {
        out.extend_from_slice(format!("record-{i:04}").as_bytes());
        out.extend_from_slice(ending.as_bytes());
    }
    out
}

/// Records of uneven length, so split points land mid-record.
#[must_use]
pub fn ragged_records(count: usize, ending: LineEnding) -> Vec<u8> {
    let mut out = Vec::new();
    for i in 0..count {
        out.extend(std::iter::repeat_n(b'a' + (i % 26) as u8, 1 + (i * 7) % 13));
        out.extend_from_slice(ending.as_bytes());
    }
    out
}

/// Byte offsets at which each record of `data` starts, using the channel
/// delimiter rules.
#[must_use]
pub fn record_starts(data: &[u8]) -> Vec<usize> {
    let mut starts = vec![0];
    let mut i = 0;
    while i < data.len() {
        let next = match data[i] {
            b'\n' => Some(i + 1),
            b'\r' if data.get(i + 1) == Some(&b'\n') => Some(i + 2),
            b'\r' => Some(i + 1),
            _ => None,
        };
        match next {
            Some(n) => {
                if n < data.len() {
                    starts.push(n);
                }
                i = n;
            }
            None => i += 1,
        }
    }
    starts
}
