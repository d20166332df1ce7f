//! Commands broadcast by the controller to registered endpoints.

use serde::{Deserialize, Serialize};

use crate::filter::CategoryFilter;

/// One command, delivered fire-and-forget to every endpoint when a session
/// phase begins.
///
/// Each command carries the generation of the phase that issued it; the
/// endpoint echoes the generation in its reply so the controller can drop
/// acknowledgments addressed to an abandoned phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceCommand {
    /// Start recording events that pass `filter`.
    BeginTracing {
        generation: u64,
        filter: CategoryFilter,
    },
    /// Stop recording and acknowledge with the categories exercised.
    EndTracing { generation: u64 },
    /// Report every category label this worker knows about.
    GetKnownCategories { generation: u64 },
    /// Report how full the worker's trace buffer is, in percent.
    GetBufferPercentFull { generation: u64 },
}

impl TraceCommand {
    /// Generation of the phase that issued this command.
    pub fn generation(&self) -> u64 {
        match self {
            Self::BeginTracing { generation, .. }
            | Self::EndTracing { generation }
            | Self::GetKnownCategories { generation }
            | Self::GetBufferPercentFull { generation } => *generation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_tracing_wire_shape() {
        let command = TraceCommand::BeginTracing {
            generation: 7,
            filter: CategoryFilter::include(["net"]),
        };
        let value = serde_json::to_value(&command).unwrap();
        assert_eq!(value["type"], "begin_tracing");
        assert_eq!(value["generation"], 7);
        assert_eq!(value["filter"]["included"][0], "net");
        assert!(value["filter"].get("excluded").is_none());
    }

    #[test]
    fn command_round_trip() {
        let command = TraceCommand::GetBufferPercentFull { generation: 3 };
        let encoded = serde_json::to_string(&command).unwrap();
        let decoded: TraceCommand = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, command);
        assert_eq!(decoded.generation(), 3);
    }
}
