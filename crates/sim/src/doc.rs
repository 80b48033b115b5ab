// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! A plain-text document and a character-level operational transform.
//!
//! Every operation touches one character position. Concurrent inserts at
//! the same position are ordered by site id; concurrent deletes of the
//! same character both turn into no-ops.

use serde::{Deserialize, Serialize};
use std::fmt;

use oc_core::{TransformError, Transformed, Transformer};

/// Error applying an edit to a document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocError {
    #[error("insert at {pos} is past the end of a {len}-character document")]
    InsertOutOfBounds { pos: usize, len: usize },

    #[error("delete at {pos} is past the end of a {len}-character document")]
    DeleteOutOfBounds { pos: usize, len: usize },
}

/// A single-character change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Edit {
    Insert { pos: usize, ch: char },
    Delete { pos: usize },
    Noop,
}

/// An edit tagged with its author and per-author sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimOp {
    /// Sequence number within `site`, starting at zero.
    pub id: u64,
    /// Authoring client; breaks ties between concurrent inserts.
    pub site: u32,
    pub edit: Edit,
}

impl SimOp {
    pub fn new(id: u64, site: u32, edit: Edit) -> Self {
        SimOp { id, site, edit }
    }
}

/// A document as a sequence of characters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextDoc {
    chars: Vec<char>,
}

impl TextDoc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Applies `edit` in place.
    pub fn apply(&mut self, edit: &Edit) -> Result<(), DocError> {
        let len = self.chars.len();
        match *edit {
            Edit::Insert { pos, ch } => {
                if pos > len {
                    return Err(DocError::InsertOutOfBounds { pos, len });
                }
                self.chars.insert(pos, ch);
            }
            Edit::Delete { pos } => {
                if pos >= len {
                    return Err(DocError::DeleteOutOfBounds { pos, len });
                }
                self.chars.remove(pos);
            }
            Edit::Noop => {}
        }
        Ok(())
    }
}

impl From<&str> for TextDoc {
    fn from(s: &str) -> Self {
        TextDoc {
            chars: s.chars().collect(),
        }
    }
}

impl fmt::Display for TextDoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.chars.iter().try_for_each(|c| write!(f, "{c}"))
    }
}

/// Inclusion transformation for [`SimOp`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CharTransformer;

impl CharTransformer {
    /// Transforms client edit `a` and server edit `b`, both against the same
    /// document, so each applies after the other.
    pub fn transform_pair(a: &SimOp, b: &SimOp) -> (Edit, Edit) {
        use Edit::*;
        match (a.edit, b.edit) {
            (Noop, _) | (_, Noop) => (a.edit, b.edit),
            (Insert { pos: p, ch: x }, Insert { pos: q, ch: y }) => {
                if p < q || (p == q && a.site < b.site) {
                    (a.edit, Insert { pos: q + 1, ch: y })
                } else {
                    (Insert { pos: p + 1, ch: x }, b.edit)
                }
            }
            (Insert { pos: p, ch }, Delete { pos: q }) => {
                if p <= q {
                    (a.edit, Delete { pos: q + 1 })
                } else {
                    (Insert { pos: p - 1, ch }, b.edit)
                }
            }
            (Delete { pos: p }, Insert { pos: q, ch }) => {
                if q <= p {
                    (Delete { pos: p + 1 }, b.edit)
                } else {
                    (a.edit, Insert { pos: q - 1, ch })
                }
            }
            (Delete { pos: p }, Delete { pos: q }) => {
                if p < q {
                    (a.edit, Delete { pos: q - 1 })
                } else if p > q {
                    (Delete { pos: p - 1 }, b.edit)
                } else {
                    (Noop, Noop)
                }
            }
        }
    }
}

impl Transformer<SimOp> for CharTransformer {
    fn transform(
        &self,
        mut client_ops: Vec<SimOp>,
        server_ops: Vec<SimOp>,
    ) -> Result<Transformed<SimOp>, TransformError> {
        let mut transformed = Vec::with_capacity(server_ops.len());
        for mut server in server_ops {
            for client in client_ops.iter_mut() {
                if client.site == server.site {
                    return Err(TransformError::new(format!(
                        "operations {} and {} from site {} are not concurrent",
                        client.id, server.id, client.site
                    )));
                }
                let (a, b) = Self::transform_pair(client, &server);
                client.edit = a;
                server.edit = b;
            }
            transformed.push(server);
        }
        Ok(Transformed {
            client_ops,
            server_ops: transformed,
        })
    }
}

#[cfg(test)]
#[path = "doc_tests.rs"]
mod tests;
