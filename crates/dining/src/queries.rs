//! Collaborator interfaces beyond `AggregateRepository`: the read side the
//! reactors need, and the one multi-aggregate write.

use comanda_core::{CommandId, ExpectedVersion, RepositoryError, TableId};

use crate::{Command, Order};

pub trait OrderQueries: Send + Sync {
    /// Every order of `command_id`, soft-deleted ones included.
    fn orders_for_command(&self, command_id: CommandId) -> Result<Vec<Order>, RepositoryError>;
}

pub trait CommandQueries: Send + Sync {
    /// Every command currently attached to `table_id`.
    fn commands_for_table(&self, table_id: TableId) -> Result<Vec<Command>, RepositoryError>;
}

/// Writes a command together with orders of that command as one unit.
///
/// Every version is checked before anything is stored; on error nothing is
/// written.
pub trait CommandBatchWriter: Send + Sync {
    fn save_with_orders(
        &self,
        command: Command,
        expected: ExpectedVersion,
        orders: Vec<(Order, ExpectedVersion)>,
    ) -> Result<CommandId, RepositoryError>;
}
