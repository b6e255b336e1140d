//! Shared types used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;

/// Model operations, used for logging and configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Find,
    Insert,
    Update,
    Remove,
    Upsert,
}

impl Operation {
    /// Whether the operation needs a write transaction
    pub fn is_write(&self) -> bool {
        !matches!(self, Operation::Find)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Find => "find",
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Remove => "remove",
            Operation::Upsert => "upsert",
        };
        f.write_str(name)
    }
}
