// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

#[test]
fn revision_arithmetic() {
    let r = Revision::new(5);
    assert_eq!(r.next(), Revision::new(6));
    assert_eq!(r.advance(3), Revision::new(8));
    assert_eq!(Revision::new(8).since(r), Some(3));
    assert_eq!(r.since(Revision::new(8)), None);
    assert_eq!(Revision::ZERO.get(), 0);
}

#[parameterized(
    zero = { "0", 0 },
    plain = { "42", 42 },
    padded = { " 7 ", 7 },
)]
fn revision_parse(input: &str, expected: u64) {
    assert_eq!(input.parse::<Revision>().unwrap(), Revision::new(expected));
}

#[parameterized(
    negative = { "-1" },
    empty = { "" },
    word = { "five" },
)]
fn revision_parse_rejects(input: &str) {
    let err = input.parse::<Revision>().unwrap_err();
    assert!(matches!(err, Error::InvalidRevision(_)));
}

#[test]
fn revision_serializes_as_number() {
    let json = serde_json::to_string(&Revision::new(12)).unwrap();
    assert_eq!(json, "12");
    let back: Revision = serde_json::from_str(&json).unwrap();
    assert_eq!(back, Revision::new(12));
}

#[test]
fn session_id_rejects_empty() {
    assert!(matches!(
        SessionId::new(""),
        Err(Error::InvalidSessionId(_))
    ));
    assert!("".parse::<SessionId>().is_err());
}

#[test]
fn session_id_display_and_parse() {
    let id: SessionId = "alice@1".parse().unwrap();
    assert_eq!(id.as_str(), "alice@1");
    assert_eq!(id.to_string(), "alice@1");
}

#[test]
fn session_id_deserialize_validates() {
    let ok: SessionId = serde_json::from_str("\"s1\"").unwrap();
    assert_eq!(ok.as_str(), "s1");
    assert!(serde_json::from_str::<SessionId>("\"\"").is_err());
}
