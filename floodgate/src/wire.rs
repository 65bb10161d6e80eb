//! Minimal line-based request/response framing.
//!
//! Request: `METHOD SP target SP version CRLF` followed by `name: value`
//! header lines and a blank line; no body. Response: status line,
//! headers (`Content-Length` declares the body size), blank line, body.
//! Just enough framing for the harness to drive a server and judge what
//! comes back; this is not an HTTP implementation.

/// Upper bound on a request or response head, in bytes.
///
/// Heads larger than this are rejected to prevent unbounded buffering on
/// a stream that never produces the terminating blank line.
pub const MAX_HEAD_BYTES: usize = 8 * 1024;

const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Framing error types.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WireError {
    /// The request or status line does not have the expected shape.
    #[error("malformed start line: {line:?}")]
    MalformedStartLine {
        /// The offending line.
        line: String,
    },

    /// A header line has no `name: value` separator.
    #[error("malformed header line: {line:?}")]
    MalformedHeader {
        /// The offending line.
        line: String,
    },

    /// The `Content-Length` value is not an unsigned integer.
    #[error("invalid content length: {value:?}")]
    InvalidContentLength {
        /// The offending header value.
        value: String,
    },

    /// No head terminator within [`MAX_HEAD_BYTES`].
    #[error("head exceeds {MAX_HEAD_BYTES} bytes without terminating")]
    HeadTooLarge,
}

/// A parsed request head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    /// Request method, e.g. `GET`.
    pub method: String,
    /// Request target, e.g. `/resource.bin`.
    pub target: String,
    /// Header name/value pairs in arrival order.
    pub headers: Vec<(String, String)>,
}

impl RequestHead {
    /// Try to parse a head from the front of `buf`.
    ///
    /// Returns `Ok(None)` until the terminating blank line has arrived
    /// (not an error condition); on success also returns the number of
    /// bytes consumed.
    pub fn parse(buf: &[u8]) -> Result<Option<(Self, usize)>, WireError> {
        let Some((lines, consumed)) = split_head(buf)? else {
            return Ok(None);
        };
        let mut lines = lines.into_iter();
        let start = lines.next().unwrap_or_default();

        let mut parts = start.split_whitespace();
        let (method, target) = match (parts.next(), parts.next(), parts.next()) {
            (Some(method), Some(target), Some(_version)) => {
                (method.to_string(), target.to_string())
            }
            _ => {
                return Err(WireError::MalformedStartLine {
                    line: start.to_string(),
                });
            }
        };

        let headers = parse_headers(lines)?;
        Ok(Some((
            Self {
                method,
                target,
                headers,
            },
            consumed,
        )))
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        lookup_header(&self.headers, name)
    }
}

/// A parsed response head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    /// Numeric status code.
    pub status: u16,
    /// Reason phrase (possibly empty).
    pub reason: String,
    /// Header name/value pairs in arrival order.
    pub headers: Vec<(String, String)>,
}

impl ResponseHead {
    /// Try to parse a head from the front of `buf`.
    ///
    /// Same incremental contract as [`RequestHead::parse`].
    pub fn parse(buf: &[u8]) -> Result<Option<(Self, usize)>, WireError> {
        let Some((lines, consumed)) = split_head(buf)? else {
            return Ok(None);
        };
        let mut lines = lines.into_iter();
        let start = lines.next().unwrap_or_default();

        let mut parts = start.splitn(3, ' ');
        let (_version, status) = match (parts.next(), parts.next()) {
            (Some(version), Some(status)) if !version.is_empty() => (version, status),
            _ => {
                return Err(WireError::MalformedStartLine {
                    line: start.to_string(),
                });
            }
        };
        let status: u16 = status.parse().map_err(|_| WireError::MalformedStartLine {
            line: start.to_string(),
        })?;
        let reason = parts.next().unwrap_or("").to_string();

        let headers = parse_headers(lines)?;
        Ok(Some((
            Self {
                status,
                reason,
                headers,
            },
            consumed,
        )))
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        lookup_header(&self.headers, name)
    }

    /// The declared body size, if any.
    pub fn content_length(&self) -> Result<Option<u64>, WireError> {
        match self.header("Content-Length") {
            None => Ok(None),
            Some(value) => value
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| WireError::InvalidContentLength {
                    value: value.to_string(),
                }),
        }
    }
}

/// Format the minimal client request the harness sends.
pub fn format_request(target: &str, host: &str, extra_headers: &[(&str, &str)]) -> Vec<u8> {
    let mut out = format!("GET {target} HTTP/1.1\r\nHost: {host}\r\n");
    for (name, value) in extra_headers {
        out.push_str(name);
        out.push_str(": ");
        out.push_str(value);
        out.push_str("\r\n");
    }
    out.push_str("\r\n");
    out.into_bytes()
}

/// Format a response head declaring an exact body size.
pub fn format_response_head(status: u16, reason: &str, content_length: u64) -> Vec<u8> {
    format!("HTTP/1.1 {status} {reason}\r\nContent-Length: {content_length}\r\n\r\n").into_bytes()
}

fn split_head(buf: &[u8]) -> Result<Option<(Vec<String>, usize)>, WireError> {
    let Some(end) = find_terminator(buf) else {
        if buf.len() > MAX_HEAD_BYTES {
            return Err(WireError::HeadTooLarge);
        }
        return Ok(None);
    };
    if end > MAX_HEAD_BYTES {
        return Err(WireError::HeadTooLarge);
    }

    let head = String::from_utf8_lossy(&buf[..end]);
    let lines = head.split("\r\n").map(str::to_string).collect();
    Ok(Some((lines, end + HEAD_TERMINATOR.len())))
}

fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(HEAD_TERMINATOR.len())
        .position(|window| window == HEAD_TERMINATOR)
}

fn parse_headers(lines: impl Iterator<Item = String>) -> Result<Vec<(String, String)>, WireError> {
    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            return Err(WireError::MalformedHeader { line });
        };
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }
    Ok(headers)
}

fn lookup_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}
