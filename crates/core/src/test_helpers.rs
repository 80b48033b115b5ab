// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for oc-core tests.

use crate::transform::{TransformError, Transformed, Transformer};

/// Insert-only test operation: put `tag` at `pos`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ins {
    pub pos: u32,
    pub tag: &'static str,
}

/// Create an insert operation.
pub fn ins(pos: u32, tag: &'static str) -> Ins {
    Ins { pos, tag }
}

/// Transformer for [`Ins`]: the later position shifts right, ties go to
/// the smaller tag.
pub struct InsertTransformer;

impl Transformer<Ins> for InsertTransformer {
    fn transform(
        &self,
        mut client_ops: Vec<Ins>,
        server_ops: Vec<Ins>,
    ) -> Result<Transformed<Ins>, TransformError> {
        let mut transformed_server = Vec::with_capacity(server_ops.len());
        for mut s in server_ops {
            for c in client_ops.iter_mut() {
                if c.pos < s.pos || (c.pos == s.pos && c.tag < s.tag) {
                    s.pos += 1;
                } else {
                    c.pos += 1;
                }
            }
            transformed_server.push(s);
        }
        Ok(Transformed {
            client_ops,
            server_ops: transformed_server,
        })
    }
}

/// Transformer that rejects everything.
pub struct RejectingTransformer;

impl Transformer<Ins> for RejectingTransformer {
    fn transform(
        &self,
        _client_ops: Vec<Ins>,
        _server_ops: Vec<Ins>,
    ) -> Result<Transformed<Ins>, TransformError> {
        Err(TransformError::new("incompatible histories"))
    }
}

/// Apply a sequence of inserts to a string of tags.
pub fn apply(doc: &mut Vec<&'static str>, ops: &[Ins]) {
    for op in ops {
        let pos = (op.pos as usize).min(doc.len());
        doc.insert(pos, op.tag);
    }
}
