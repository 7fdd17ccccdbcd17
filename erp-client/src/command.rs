//! Relational-field command vocabulary
//!
//! One-to-many and many-to-many fields are mutated with `[opcode, id,
//! value]` triples. The opcodes are the wire contract with the ERP's RPC
//! methods and must not change.

use serde::{Serialize, Serializer};
use serde_json::{Value, json};

use crate::client::Fields;

/// A single relational-field mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Create a new related record from the given values
    Create(Fields),
    /// Update the related record `id` in place
    Update(i64, Fields),
    /// Delete the related record `id`
    Delete(i64),
    /// Detach (and for some relations delete) the related record `id`
    Unlink(i64),
    /// Attach the existing record `id`
    Link(i64),
    /// Detach all related records
    Clear,
    /// Replace the relation with exactly these ids
    Set(Vec<i64>),
}

impl Command {
    /// Wire triple.
    pub fn to_value(&self) -> Value {
        match self {
            Command::Create(values) => json!([0, 0, values]),
            Command::Update(id, values) => json!([1, id, values]),
            Command::Delete(id) => json!([2, id, 0]),
            Command::Unlink(id) => json!([3, id, 0]),
            Command::Link(id) => json!([4, id, 0]),
            Command::Clear => json!([5, 0, 0]),
            Command::Set(ids) => json!([6, 0, ids]),
        }
    }
}

impl Serialize for Command {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Wire shape for a command list.
pub fn commands_to_value(commands: &[Command]) -> Value {
    Value::Array(commands.iter().map(Command::to_value).collect())
}
