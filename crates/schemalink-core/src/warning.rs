use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Category of a non-fatal problem reported alongside a successful result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WarningCode {
    /// A declared foreign key row could not be parsed (missing column names).
    MalformedForeignKey,
    /// A declared foreign key points at a table or column that does not exist.
    DroppedForeignKey,
    /// A declared foreign key was listed more than once.
    DuplicateForeignKey,
    /// The catalog source cannot sample column values.
    SamplingUnsupported,
    /// Sampling a column failed.
    SamplingFailed,
    /// Sampling a column did not finish within the timeout.
    SamplingTimedOut,
}

/// Non-fatal issue accumulated while building or enriching a graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub struct Warning {
    pub code: WarningCode,
    /// Object the warning is about, e.g. `public.orders.customer_id`.
    pub subject: String,
    pub message: String,
}

impl Warning {
    pub fn new(code: WarningCode, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            subject: subject.into(),
            message: message.into(),
        }
    }
}
