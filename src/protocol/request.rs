// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Textual request parsing.
//!
//! [`parse_request`] re-scans the connection's accumulated buffer from
//! the start on every call rather than keeping incremental read state
//! across partial reads: command lines are short and bulk bodies are
//! bounded by `val_max`, so the cost of re-finding the newline is
//! negligible next to a socket read. The function is stateless; the
//! connection keeps the only state (the accumulation buffer itself).

/// Parsed verb, carrying only the fields that verb actually uses.
/// `Request::keys` holds one key for every verb except `Get`/`Gets`,
/// which accept one or more.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Gets,
    Delete,
    Set,
    Add,
    Replace,
    Cas,
    Incr,
    Decr,
    Stats,
    Quit,
}

#[derive(Debug, Clone)]
pub struct Request {
    pub verb: Verb,
    pub keys: Vec<Vec<u8>>,
    pub value: Option<Vec<u8>>,
    pub flags: u32,
    /// Raw wire expiry, seconds from now (0 = never). Converted to an
    /// absolute clock value by the command processor at dispatch time.
    pub expiry: u64,
    pub delta: Option<u64>,
    pub cas: Option<u64>,
    pub noreply: bool,
}

impl Request {
    fn bare(verb: Verb) -> Self {
        Self {
            verb,
            keys: Vec::new(),
            value: None,
            flags: 0,
            expiry: 0,
            delta: None,
            cas: None,
            noreply: false,
        }
    }
}

#[derive(Debug)]
pub enum ParseOutcome {
    /// Not enough bytes buffered yet to decode a full request.
    Incomplete,
    /// A request was decoded; the `usize` is how many bytes of the
    /// input buffer it consumed.
    Complete(Request, usize),
}

#[derive(Debug)]
pub struct ParseError {
    pub message: String,
    /// How many bytes to discard from the buffer so the connection can
    /// resynchronize and keep processing subsequent requests.
    pub consumed: usize,
}

/// Attempt to decode one request from the front of `buf`.
pub fn parse_request(buf: &[u8]) -> Result<ParseOutcome, ParseError> {
    let Some(line_end) = find_crlf(buf) else {
        return Ok(ParseOutcome::Incomplete);
    };
    let line = &buf[..line_end];
    let after_line = line_end + 2;

    let mut parts = line.split(|&b| b == b' ').filter(|s| !s.is_empty());
    let verb_tok = parts.next().ok_or_else(|| ParseError {
        message: "empty command".into(),
        consumed: after_line,
    })?;

    match verb_tok {
        b"get" | b"gets" => {
            let keys: Vec<Vec<u8>> = parts.map(<[u8]>::to_vec).collect();
            if keys.is_empty() {
                return Err(ParseError {
                    message: "get requires at least one key".into(),
                    consumed: after_line,
                });
            }
            let verb = if verb_tok == b"get" { Verb::Get } else { Verb::Gets };
            let mut req = Request::bare(verb);
            req.keys = keys;
            Ok(ParseOutcome::Complete(req, after_line))
        }

        b"delete" => {
            let key = next_token(&mut parts, after_line, "delete requires a key")?;
            let noreply = consume_noreply(&mut parts);
            let mut req = Request::bare(Verb::Delete);
            req.keys.push(key.to_vec());
            req.noreply = noreply;
            Ok(ParseOutcome::Complete(req, after_line))
        }

        b"set" | b"add" | b"replace" | b"cas" => {
            let verb = match verb_tok {
                b"set" => Verb::Set,
                b"add" => Verb::Add,
                b"replace" => Verb::Replace,
                _ => Verb::Cas,
            };
            let key = next_token(&mut parts, after_line, "missing key")?.to_vec();
            let flags = parse_u32(&mut parts, after_line, "missing/invalid flags")?;
            let expiry = parse_u64(&mut parts, after_line, "missing/invalid expiry")?;
            let bytes = parse_u64(&mut parts, after_line, "missing/invalid byte count")? as usize;
            let cas = if verb == Verb::Cas {
                Some(parse_u64(&mut parts, after_line, "missing/invalid cas")?)
            } else {
                None
            };
            let noreply = consume_noreply(&mut parts);

            let body_start = after_line;
            let body_end = body_start + bytes;
            let frame_end = body_end + 2;
            if buf.len() < frame_end {
                return Ok(ParseOutcome::Incomplete);
            }
            if &buf[body_end..frame_end] != b"\r\n" {
                return Err(ParseError {
                    message: "bad data chunk".into(),
                    consumed: frame_end,
                });
            }
            let value = buf[body_start..body_end].to_vec();

            let mut req = Request::bare(verb);
            req.keys.push(key);
            req.value = Some(value);
            req.flags = flags;
            req.expiry = expiry;
            req.cas = cas;
            req.noreply = noreply;
            Ok(ParseOutcome::Complete(req, frame_end))
        }

        b"incr" | b"decr" => {
            let verb = if verb_tok == b"incr" { Verb::Incr } else { Verb::Decr };
            let key = next_token(&mut parts, after_line, "missing key")?.to_vec();
            let delta = parse_u64(&mut parts, after_line, "missing/invalid delta")?;
            let noreply = consume_noreply(&mut parts);
            let mut req = Request::bare(verb);
            req.keys.push(key);
            req.delta = Some(delta);
            req.noreply = noreply;
            Ok(ParseOutcome::Complete(req, after_line))
        }

        b"stats" => Ok(ParseOutcome::Complete(Request::bare(Verb::Stats), after_line)),
        b"quit" => Ok(ParseOutcome::Complete(Request::bare(Verb::Quit), after_line)),

        other => Err(ParseError {
            message: format!("unknown command {:?}", String::from_utf8_lossy(other)),
            consumed: after_line,
        }),
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

fn next_token<'a, 'b>(
    parts: &mut impl Iterator<Item = &'a [u8]>,
    consumed: usize,
    msg: &'b str,
) -> Result<&'a [u8], ParseError> {
    parts.next().ok_or_else(|| ParseError {
        message: msg.to_string(),
        consumed,
    })
}

fn parse_u32<'a>(
    parts: &mut impl Iterator<Item = &'a [u8]>,
    consumed: usize,
    msg: &str,
) -> Result<u32, ParseError> {
    let tok = next_token(parts, consumed, msg)?;
    std::str::from_utf8(tok)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ParseError {
            message: msg.to_string(),
            consumed,
        })
}

fn parse_u64<'a>(
    parts: &mut impl Iterator<Item = &'a [u8]>,
    consumed: usize,
    msg: &str,
) -> Result<u64, ParseError> {
    let tok = next_token(parts, consumed, msg)?;
    std::str::from_utf8(tok)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ParseError {
            message: msg.to_string(),
            consumed,
        })
}

fn consume_noreply<'a>(parts: &mut impl Iterator<Item = &'a [u8]>) -> bool {
    matches!(parts.next(), Some(b"noreply"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Request {
        match parse_request(s.as_bytes()).unwrap() {
            ParseOutcome::Complete(req, consumed) => {
                assert_eq!(consumed, s.len(), "should consume the whole input");
                req
            }
            ParseOutcome::Incomplete => panic!("expected a complete request"),
        }
    }

    #[test]
    fn parses_get_single_key() {
        let req = parse("get foo\r\n");
        assert_eq!(req.verb, Verb::Get);
        assert_eq!(req.keys, vec![b"foo".to_vec()]);
    }

    #[test]
    fn parses_multi_get() {
        let req = parse("get a b c\r\n");
        assert_eq!(req.keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn parses_gets() {
        let req = parse("gets k\r\n");
        assert_eq!(req.verb, Verb::Gets);
    }

    #[test]
    fn parses_set_with_body() {
        let req = parse("set foo 0 0 3\r\nbar\r\n");
        assert_eq!(req.verb, Verb::Set);
        assert_eq!(req.keys[0], b"foo");
        assert_eq!(req.value, Some(b"bar".to_vec()));
        assert!(!req.noreply);
    }

    #[test]
    fn parses_set_with_noreply() {
        let req = parse("set k 0 0 1 noreply\r\nZ\r\n");
        assert!(req.noreply);
        assert_eq!(req.value, Some(b"Z".to_vec()));
    }

    #[test]
    fn incomplete_body_waits_for_more_bytes() {
        let buf = b"set foo 0 0 10\r\nshort";
        match parse_request(buf).unwrap() {
            ParseOutcome::Incomplete => {}
            other => panic!("expected Incomplete, got {other:?}"),
        }
    }

    #[test]
    fn incomplete_line_waits_for_more_bytes() {
        let buf = b"get fo";
        match parse_request(buf).unwrap() {
            ParseOutcome::Incomplete => {}
            other => panic!("expected Incomplete, got {other:?}"),
        }
    }

    #[test]
    fn parses_cas_with_token() {
        let req = parse("cas k 0 0 1 42\r\nX\r\n");
        assert_eq!(req.cas, Some(42));
    }

    #[test]
    fn parses_incr_decr() {
        let req = parse("incr n 5\r\n");
        assert_eq!(req.verb, Verb::Incr);
        assert_eq!(req.delta, Some(5));
        let req = parse("decr n 5 noreply\r\n");
        assert_eq!(req.verb, Verb::Decr);
        assert!(req.noreply);
    }

    #[test]
    fn parses_delete_stats_quit() {
        assert_eq!(parse("delete k\r\n").verb, Verb::Delete);
        assert_eq!(parse("stats\r\n").verb, Verb::Stats);
        assert_eq!(parse("quit\r\n").verb, Verb::Quit);
    }

    #[test]
    fn unknown_command_is_an_error() {
        let err = parse_request(b"frobnicate\r\n").unwrap_err();
        assert_eq!(err.consumed, b"frobnicate\r\n".len());
    }

    #[test]
    fn malformed_data_chunk_is_an_error() {
        // declared 3 bytes but terminator isn't \r\n
        let err = parse_request(b"set k 0 0 3\r\nbarXX").unwrap_err();
        assert!(err.message.contains("data chunk"));
    }
}
