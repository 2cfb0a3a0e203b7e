//! Consistency reactors: recompute derived aggregate state after commit.
//!
//! Both reactors read-modify-write through the aggregate's repository with an
//! exact expected version. A stale read surfaces as `Conflict`; the whole
//! read-recompute-write is then retried up to `conflict_retries` times. A
//! recomputation that matches the stored value writes nothing, so repeated
//! delivery of the same event is harmless.

use std::sync::Arc;

use tracing::{debug, info};

use comanda_core::{
    AggregateRepository, AggregateRoot, Clock, CommandId, ExpectedVersion, RepositoryError, TableId,
};
use comanda_events::{EventEnvelope, Reactor, ReactorError, UnitOfWork};
use comanda_status::{Stateful, transition};

use crate::{Command, CommandQueries, DiningEvent, OrderQueries, Table, command_total, derived_table_status};

/// Run `attempt` until it returns something other than a retryable conflict.
fn with_conflict_retry<T>(
    reactor: &'static str,
    retries: u32,
    mut attempt: impl FnMut() -> Result<T, ReactorError>,
) -> Result<T, ReactorError> {
    let mut tries = 0;
    loop {
        match attempt() {
            Err(ReactorError::Repository(RepositoryError::Conflict(reason))) if tries < retries => {
                tries += 1;
                debug!(reactor, attempt = tries, reason = %reason, "stale read; retrying");
            }
            other => return other,
        }
    }
}

/// Keeps `Command::total_amount` equal to the sum of its billable orders.
pub struct CommandTotalReactor {
    commands: Arc<dyn AggregateRepository<Command>>,
    orders: Arc<dyn OrderQueries>,
    clock: Arc<dyn Clock>,
    conflict_retries: u32,
}

impl CommandTotalReactor {
    pub fn new(
        commands: Arc<dyn AggregateRepository<Command>>,
        orders: Arc<dyn OrderQueries>,
        clock: Arc<dyn Clock>,
        conflict_retries: u32,
    ) -> Self {
        Self {
            commands,
            orders,
            clock,
            conflict_retries,
        }
    }

    /// Recompute and store the total of `command_id`.
    ///
    /// Returns the updated command when the total changed, `None` when it was
    /// already correct.
    pub fn recompute(&self, command_id: CommandId) -> Result<Option<Command>, ReactorError> {
        with_conflict_retry(self.name(), self.conflict_retries, || {
            let command = self.commands.get_by_id(&command_id)?;
            let orders = self.orders.orders_for_command(command_id)?;
            let total = command_total(&orders, command.discount_amount());
            if total == command.total_amount() {
                debug!(command_id = %command_id, total = %total, "command total unchanged");
                return Ok(None);
            }

            let updated = command.with_total(total, self.clock.now());
            self.commands
                .save(updated.clone(), ExpectedVersion::Exact(command.version()))?;
            info!(
                command_id = %command_id,
                previous = %command.total_amount(),
                total = %total,
                "command total recomputed"
            );
            Ok(Some(updated))
        })
    }
}

impl Reactor<DiningEvent> for CommandTotalReactor {
    fn name(&self) -> &'static str {
        "command_total"
    }

    fn subscribes_to(&self) -> &'static str {
        DiningEvent::COMMAND
    }

    fn react(
        &self,
        envelope: &EventEnvelope<DiningEvent>,
        uow: &mut UnitOfWork<DiningEvent>,
    ) -> Result<(), ReactorError> {
        let DiningEvent::Command(event) = envelope.payload() else {
            return Ok(());
        };
        if let Some(updated) = self.recompute(event.command_id)? {
            uow.record(DiningEvent::table_status(updated.table_id()));
        }
        Ok(())
    }
}

/// Keeps a table OCCUPIED while it has an active command, AVAILABLE otherwise.
pub struct TableOccupancyReactor {
    tables: Arc<dyn AggregateRepository<Table>>,
    commands: Arc<dyn CommandQueries>,
    conflict_retries: u32,
}

impl TableOccupancyReactor {
    pub fn new(
        tables: Arc<dyn AggregateRepository<Table>>,
        commands: Arc<dyn CommandQueries>,
        conflict_retries: u32,
    ) -> Self {
        Self {
            tables,
            commands,
            conflict_retries,
        }
    }

    /// Derive and store the status of `table_id`. `None` when unchanged.
    pub fn recompute(&self, table_id: TableId) -> Result<Option<Table>, ReactorError> {
        with_conflict_retry(self.name(), self.conflict_retries, || {
            let table = self.tables.get_by_id(&table_id)?;
            let commands = self.commands.commands_for_table(table_id)?;
            let target = derived_table_status(&commands);
            if table.status() == target {
                debug!(table_id = %table_id, status = %target, "table status unchanged");
                return Ok(None);
            }

            let updated = transition(&table, target).map_err(ReactorError::failed)?;
            self.tables
                .save(updated.clone(), ExpectedVersion::Exact(table.version()))?;
            info!(
                table_id = %table_id,
                from = %table.status(),
                to = %target,
                "table occupancy updated"
            );
            Ok(Some(updated))
        })
    }
}

impl Reactor<DiningEvent> for TableOccupancyReactor {
    fn name(&self) -> &'static str {
        "table_occupancy"
    }

    fn subscribes_to(&self) -> &'static str {
        DiningEvent::TABLE_STATUS
    }

    fn react(
        &self,
        envelope: &EventEnvelope<DiningEvent>,
        _uow: &mut UnitOfWork<DiningEvent>,
    ) -> Result<(), ReactorError> {
        let DiningEvent::TableStatus(event) = envelope.payload() else {
            return Ok(());
        };
        self.recompute(event.table_id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use chrono::Utc;
    use comanda_core::{AggregateRoot, CompanyId, FixedClock, Money, OrderId};
    use comanda_status::{CommandStatus, OrderStatus, TableStatus};

    use crate::Order;

    /// Minimal store: commands, orders and tables keyed by id, with version
    /// checks and an optional number of forced save conflicts.
    #[derive(Default)]
    struct Store {
        commands: Mutex<HashMap<CommandId, Command>>,
        orders: Mutex<Vec<Order>>,
        tables: Mutex<HashMap<TableId, Table>>,
        forced_conflicts: AtomicU32,
        command_saves: AtomicU32,
    }

    impl AggregateRepository<Command> for Store {
        fn get_by_id(&self, id: &CommandId) -> Result<Command, RepositoryError> {
            self.commands
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .ok_or_else(|| RepositoryError::not_found("command", id))
        }

        fn save(&self, entity: Command, expected: ExpectedVersion) -> Result<CommandId, RepositoryError> {
            if self
                .forced_conflicts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(RepositoryError::Conflict("forced".into()));
            }
            let mut commands = self.commands.lock().unwrap();
            let current = commands.get(entity.id()).map_or(0, |c| c.version());
            if !expected.matches(current) {
                return Err(RepositoryError::Conflict("stale".into()));
            }
            self.command_saves.fetch_add(1, Ordering::SeqCst);
            let id = *entity.id();
            commands.insert(id, entity);
            Ok(id)
        }
    }

    impl AggregateRepository<Table> for Store {
        fn get_by_id(&self, id: &TableId) -> Result<Table, RepositoryError> {
            self.tables
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .ok_or_else(|| RepositoryError::not_found("table", id))
        }

        fn save(&self, entity: Table, expected: ExpectedVersion) -> Result<TableId, RepositoryError> {
            let mut tables = self.tables.lock().unwrap();
            let current = tables.get(entity.id()).map_or(0, |t| t.version());
            if !expected.matches(current) {
                return Err(RepositoryError::Conflict("stale".into()));
            }
            let id = *entity.id();
            tables.insert(id, entity);
            Ok(id)
        }
    }

    impl OrderQueries for Store {
        fn orders_for_command(&self, command_id: CommandId) -> Result<Vec<Order>, RepositoryError> {
            Ok(self
                .orders
                .lock()
                .unwrap()
                .iter()
                .filter(|o| o.command_id() == command_id)
                .cloned()
                .collect())
        }
    }

    impl CommandQueries for Store {
        fn commands_for_table(&self, table_id: TableId) -> Result<Vec<Command>, RepositoryError> {
            Ok(self
                .commands
                .lock()
                .unwrap()
                .values()
                .filter(|c| c.table_id() == table_id)
                .cloned()
                .collect())
        }
    }

    fn seeded() -> (Arc<Store>, Command, Table) {
        let store = Arc::new(Store::default());
        let company = CompanyId::new();
        let now = Utc::now();
        let table = Table::new(TableId::new(), company, "T1", Some(4), now).unwrap();
        let command = Command::open(CommandId::new(), company, *table.id(), "Tab", None, now).unwrap();
        store.tables.lock().unwrap().insert(*table.id(), table.clone());
        store.commands.lock().unwrap().insert(*command.id(), command.clone());
        (store, command, table)
    }

    fn add_order(store: &Store, command: &Command, cents: i64) -> Order {
        let order = Order::place(
            OrderId::new(),
            command.company_id(),
            *command.id(),
            "item",
            Money::from_cents(cents),
            Money::ZERO,
            None,
            Utc::now(),
        )
        .unwrap();
        store.orders.lock().unwrap().push(order.clone());
        order
    }

    fn total_reactor(store: &Arc<Store>, retries: u32) -> CommandTotalReactor {
        CommandTotalReactor::new(store.clone(), store.clone(), Arc::new(FixedClock::new(Utc::now())), retries)
    }

    #[test]
    fn recompute_is_idempotent() {
        let (store, command, _) = seeded();
        add_order(&store, &command, 1000);
        add_order(&store, &command, 1550);
        let reactor = total_reactor(&store, 0);

        let first = reactor.recompute(*command.id()).unwrap().unwrap();
        assert_eq!(first.total_amount(), Money::from_cents(2550));
        assert!(reactor.recompute(*command.id()).unwrap().is_none());

        let stored = AggregateRepository::<Command>::get_by_id(&*store, command.id()).unwrap();
        assert_eq!(stored.total_amount(), Money::from_cents(2550));
        assert_eq!(stored.version(), command.version() + 1);
        assert_eq!(store.command_saves.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn canceled_orders_drop_out_of_the_total() {
        let (store, command, _) = seeded();
        add_order(&store, &command, 1000);
        let doomed = add_order(&store, &command, 400);
        let reactor = total_reactor(&store, 0);
        reactor.recompute(*command.id()).unwrap();

        let canceled = transition(&doomed, OrderStatus::ItemCanceled).unwrap();
        store.orders.lock().unwrap().retain(|o| o.id() != doomed.id());
        store.orders.lock().unwrap().push(canceled);

        let updated = reactor.recompute(*command.id()).unwrap().unwrap();
        assert_eq!(updated.total_amount(), Money::from_cents(1000));
    }

    #[test]
    fn conflicts_are_retried_then_surface() {
        let (store, command, _) = seeded();
        add_order(&store, &command, 700);

        store.forced_conflicts.store(2, Ordering::SeqCst);
        let patient = total_reactor(&store, 2);
        assert!(patient.recompute(*command.id()).unwrap().is_some());

        add_order(&store, &command, 300);
        store.forced_conflicts.store(2, Ordering::SeqCst);
        let impatient = total_reactor(&store, 1);
        let err = impatient.recompute(*command.id()).unwrap_err();
        assert!(matches!(err, ReactorError::Repository(RepositoryError::Conflict(_))));
    }

    #[test]
    fn occupancy_tracks_active_commands() {
        let (store, command, table) = seeded();
        let reactor = TableOccupancyReactor::new(store.clone(), store.clone(), 0);

        let occupied = reactor.recompute(*table.id()).unwrap().unwrap();
        assert_eq!(occupied.status(), TableStatus::Occupied);
        assert!(reactor.recompute(*table.id()).unwrap().is_none());

        let canceled = transition(&command, CommandStatus::Canceled).unwrap();
        store.commands.lock().unwrap().insert(*command.id(), canceled);
        let freed = reactor.recompute(*table.id()).unwrap().unwrap();
        assert_eq!(freed.status(), TableStatus::Available);
        assert_eq!(freed.version(), table.version() + 2);
    }

    #[test]
    fn total_change_raises_table_status_follow_up() {
        let (store, command, table) = seeded();
        add_order(&store, &command, 990);
        let reactor = total_reactor(&store, 0);
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(Utc::now()));

        let mut source = UnitOfWork::new(command.company_id(), clock.clone());
        source.record(DiningEvent::command(*command.id()));
        let envelope = source.pending()[0].clone();
        let mut uow = UnitOfWork::new(command.company_id(), clock.clone());

        reactor.react(&envelope, &mut uow).unwrap();
        assert_eq!(uow.pending().len(), 1);
        assert_eq!(*uow.pending()[0].payload(), DiningEvent::table_status(*table.id()));

        let mut again = UnitOfWork::new(command.company_id(), clock);
        reactor.react(&envelope, &mut again).unwrap();
        assert!(again.is_empty());
    }
}
