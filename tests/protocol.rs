// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Integration tests driving the command processor end to end through
//! [`kvcache::protocol::parse_request`], without a real socket.

use kvcache::config::CacheConfig;
use kvcache::protocol::{parse_request, ParseOutcome, ResponseWriter};
use kvcache::{DispatchResult, Processor};

fn processor() -> Processor {
    let cfg = CacheConfig {
        slot_count: 64,
        ways: 4,
        max_hops: 16,
        ..Default::default()
    };
    let mut p = Processor::new(&cfg);
    p.clock.tick();
    p
}

/// Feed `input` to the processor one pipelined buffer at a time,
/// returning the concatenated response bytes.
fn drive(p: &mut Processor, input: &[u8]) -> Vec<u8> {
    let mut buf = input.to_vec();
    let mut out = Vec::new();
    loop {
        match parse_request(&buf).expect("well-formed request") {
            ParseOutcome::Incomplete => break,
            ParseOutcome::Complete(req, consumed) => {
                let mut writer = ResponseWriter::new(&mut out);
                p.dispatch(&req, &mut writer);
                buf.drain(..consumed);
            }
        }
    }
    out
}

#[test]
fn set_then_get() {
    let mut p = processor();
    let out = drive(&mut p, b"set foo 0 0 3\r\nbar\r\nget foo\r\n");
    assert_eq!(out, b"STORED\r\nVALUE foo 0 3\r\nbar\r\nEND\r\n");
}

#[test]
fn add_twice() {
    let mut p = processor();
    let out = drive(
        &mut p,
        b"add x 0 0 1\r\n1\r\nadd x 0 0 1\r\n2\r\nget x\r\n",
    );
    assert_eq!(
        out,
        b"STORED\r\nNOT_STORED\r\nVALUE x 0 1\r\n1\r\nEND\r\n"
    );
}

#[test]
fn incr_wraps_decrementing_from_zero() {
    let mut p = processor();
    let out = drive(&mut p, b"set n 0 0 1\r\n0\r\ndecr n 1\r\n");
    assert_eq!(out, b"STORED\r\n18446744073709551615\r\n");
}

#[test]
fn cas_conflict_then_get_sees_intervening_write() {
    let mut p = processor();
    let _ = drive(&mut p, b"set k 0 0 1\r\nA\r\n");

    let mut cas0_buf = Vec::new();
    {
        let req = match parse_request(b"gets k\r\n").unwrap() {
            ParseOutcome::Complete(req, _) => req,
            ParseOutcome::Incomplete => panic!("expected complete request"),
        };
        let mut writer = ResponseWriter::new(&mut cas0_buf);
        p.dispatch(&req, &mut writer);
    }
    let text = String::from_utf8(cas0_buf).unwrap();
    let cas0: u64 = text.lines().next().unwrap().rsplit(' ').next().unwrap().parse().unwrap();

    let _ = drive(&mut p, b"set k 0 0 1\r\nB\r\n");

    let cas_line = format!("cas k 0 0 1 {cas0}\r\nC\r\n");
    let out = drive(&mut p, cas_line.as_bytes());
    assert_eq!(out, b"EXISTS\r\n");

    let out = drive(&mut p, b"get k\r\n");
    assert_eq!(out, b"VALUE k 0 1\r\nB\r\nEND\r\n");
}

#[test]
fn multi_get_mixed_hit_and_miss() {
    let mut p = processor();
    let out = drive(
        &mut p,
        b"set a 0 0 1\r\n1\r\nset c 0 0 1\r\n3\r\nget a b c\r\n",
    );
    assert_eq!(
        out,
        b"STORED\r\nSTORED\r\nVALUE a 0 1\r\n1\r\nVALUE c 0 1\r\n3\r\nEND\r\n"
    );
}

#[test]
fn noreply_suppresses_response_but_still_mutates() {
    let mut p = processor();
    let out = drive(&mut p, b"set k 0 0 1 noreply\r\nZ\r\nget k\r\n");
    assert_eq!(out, b"VALUE k 0 1\r\nZ\r\nEND\r\n");
}

#[test]
fn set_delete_get_is_a_miss() {
    let mut p = processor();
    let out = drive(&mut p, b"set k 0 0 1\r\nv\r\ndelete k\r\nget k\r\n");
    assert_eq!(out, b"STORED\r\nDELETED\r\nEND\r\n");
}

#[test]
fn replace_on_absent_key_leaves_table_unchanged() {
    let mut p = processor();
    let out = drive(&mut p, b"replace ghost 0 0 1\r\nv\r\nget ghost\r\n");
    assert_eq!(out, b"NOT_STORED\r\nEND\r\n");
}

#[test]
fn quit_is_a_sentinel_with_no_response_frame() {
    let mut p = processor();
    let req = match parse_request(b"quit\r\n").unwrap() {
        ParseOutcome::Complete(req, _) => req,
        ParseOutcome::Incomplete => panic!("expected complete request"),
    };
    let mut out = Vec::new();
    let mut writer = ResponseWriter::new(&mut out);
    let result = p.dispatch(&req, &mut writer);
    assert_eq!(result, DispatchResult::Quit);
    assert!(out.is_empty());
}

#[test]
fn stats_reports_invocation_counters() {
    let mut p = processor();
    let _ = drive(&mut p, b"set k 0 0 1\r\nv\r\nget k\r\n");
    let out = drive(&mut p, b"stats\r\n");
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("STAT cmd_set 1\r\n"));
    assert!(text.contains("STAT cmd_get 1\r\n"));
    assert!(text.ends_with("END\r\n"));
}
