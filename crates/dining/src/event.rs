use serde::{Deserialize, Serialize};
use uuid::Uuid;

use comanda_core::{CommandId, TableId};
use comanda_events::Event;

/// Something about a command's orders, discount or status changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEvent {
    pub command_id: CommandId,
}

/// The set of commands on a table may have changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStatusEvent {
    pub table_id: TableId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiningEvent {
    Command(CommandEvent),
    TableStatus(TableStatusEvent),
}

impl DiningEvent {
    pub const COMMAND: &'static str = "dining.command";
    pub const TABLE_STATUS: &'static str = "dining.table_status";

    pub fn command(command_id: CommandId) -> Self {
        DiningEvent::Command(CommandEvent { command_id })
    }

    pub fn table_status(table_id: TableId) -> Self {
        DiningEvent::TableStatus(TableStatusEvent { table_id })
    }
}

impl Event for DiningEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DiningEvent::Command(_) => Self::COMMAND,
            DiningEvent::TableStatus(_) => Self::TABLE_STATUS,
        }
    }

    fn aggregate_id(&self) -> Uuid {
        match self {
            DiningEvent::Command(e) => *e.command_id.as_uuid(),
            DiningEvent::TableStatus(e) => *e.table_id.as_uuid(),
        }
    }
}
