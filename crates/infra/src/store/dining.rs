use chrono::{DateTime, Utc};

use comanda_cashier::SessionMovements;
use comanda_core::{
    AggregateRepository, AggregateRoot, CommandId, CompanyId, ExpectedVersion, Money, OrderId, RepositoryError,
    TableId,
};
use comanda_dining::{Command, CommandBatchWriter, CommandQueries, Order, OrderQueries, Table};
use comanda_status::{CommandStatus, Stateful};

use super::InMemoryRepository;

/// Commands, orders and tables, plus the read-side queries the reactors and
/// the cash ledger need.
#[derive(Debug)]
pub struct InMemoryDiningStore {
    commands: InMemoryRepository<Command>,
    orders: InMemoryRepository<Order>,
    tables: InMemoryRepository<Table>,
}

impl Default for InMemoryDiningStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDiningStore {
    pub fn new() -> Self {
        Self {
            commands: InMemoryRepository::new("command"),
            orders: InMemoryRepository::new("order"),
            tables: InMemoryRepository::new("table"),
        }
    }

    pub fn commands(&self) -> &InMemoryRepository<Command> {
        &self.commands
    }

    pub fn orders(&self) -> &InMemoryRepository<Order> {
        &self.orders
    }

    pub fn tables(&self) -> &InMemoryRepository<Table> {
        &self.tables
    }
}

impl AggregateRepository<Command> for InMemoryDiningStore {
    fn get_by_id(&self, id: &CommandId) -> Result<Command, RepositoryError> {
        self.commands.get_by_id(id)
    }

    fn save(&self, entity: Command, expected: ExpectedVersion) -> Result<CommandId, RepositoryError> {
        self.commands.save(entity, expected)
    }
}

impl AggregateRepository<Order> for InMemoryDiningStore {
    fn get_by_id(&self, id: &OrderId) -> Result<Order, RepositoryError> {
        self.orders.get_by_id(id)
    }

    fn save(&self, entity: Order, expected: ExpectedVersion) -> Result<OrderId, RepositoryError> {
        self.orders.save(entity, expected)
    }
}

impl AggregateRepository<Table> for InMemoryDiningStore {
    fn get_by_id(&self, id: &TableId) -> Result<Table, RepositoryError> {
        self.tables.get_by_id(id)
    }

    fn save(&self, entity: Table, expected: ExpectedVersion) -> Result<TableId, RepositoryError> {
        self.tables.save(entity, expected)
    }
}

impl OrderQueries for InMemoryDiningStore {
    fn orders_for_command(&self, command_id: CommandId) -> Result<Vec<Order>, RepositoryError> {
        let mut orders = self.orders.filter(|o| o.command_id() == command_id)?;
        orders.sort_by_key(|o| o.stamps().created_at);
        Ok(orders)
    }
}

impl CommandQueries for InMemoryDiningStore {
    fn commands_for_table(&self, table_id: TableId) -> Result<Vec<Command>, RepositoryError> {
        let mut commands = self.commands.filter(|c| c.table_id() == table_id)?;
        commands.sort_by_key(|c| c.stamps().created_at);
        Ok(commands)
    }
}

impl CommandBatchWriter for InMemoryDiningStore {
    fn save_with_orders(
        &self,
        command: Command,
        expected: ExpectedVersion,
        orders: Vec<(Order, ExpectedVersion)>,
    ) -> Result<CommandId, RepositoryError> {
        // Lock order: commands, then orders.
        let mut command_rows = self.commands.write_rows()?;
        let mut order_rows = self.orders.write_rows()?;

        self.commands.check_write(&command_rows, &command, expected)?;
        for (order, order_expected) in &orders {
            if order.command_id() != *command.id() {
                return Err(RepositoryError::Conflict(format!(
                    "order {} belongs to command {}, not {}",
                    order.id(),
                    order.command_id(),
                    command.id()
                )));
            }
            self.orders.check_write(&order_rows, order, *order_expected)?;
        }

        let id = *command.id();
        command_rows.insert(id, command);
        for (order, _) in orders {
            order_rows.insert(*order.id(), order);
        }
        Ok(id)
    }
}

impl SessionMovements for InMemoryDiningStore {
    fn closed_commands_total(
        &self,
        company_id: CompanyId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Money, RepositoryError> {
        let closed = self.commands.filter(|c| {
            c.company_id() == company_id
                && c.status() == CommandStatus::Closed
                && !c.stamps().is_deleted()
                && c.closed_at().is_some_and(|at| at >= from && at <= to)
        })?;
        Money::checked_sum(closed.iter().map(Command::total_amount)).ok_or_else(|| {
            RepositoryError::Unavailable(format!(
                "closed command totals of company {company_id} exceed the money range"
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use comanda_status::{OrderStatus, transition};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    fn closed_command(store: &InMemoryDiningStore, company: CompanyId, cents: i64, hour: u32) {
        let open = Command::open(CommandId::new(), company, TableId::new(), "tab", None, at(hour))
            .unwrap()
            .with_total(Money::from_cents(cents), at(hour));
        let paying = transition(&open, CommandStatus::Paying).unwrap();
        let mut closed = transition(&paying, CommandStatus::Closed).unwrap();
        closed.mark_closed(at(hour));
        store.save(closed, ExpectedVersion::Exact(0)).unwrap();
    }

    fn placed(company: CompanyId, command_id: CommandId, cents: i64) -> Order {
        Order::place(
            OrderId::new(),
            company,
            command_id,
            "sku",
            Money::from_cents(cents),
            Money::ZERO,
            None,
            at(10),
        )
        .unwrap()
    }

    #[test]
    fn closed_totals_are_windowed_per_company() {
        let store = InMemoryDiningStore::new();
        let company = CompanyId::new();
        closed_command(&store, company, 2_000, 10);
        closed_command(&store, company, 2_000, 13);
        closed_command(&store, CompanyId::new(), 9_900, 11);

        let open = Command::open(CommandId::new(), company, TableId::new(), "open", None, at(11)).unwrap();
        store.save(open.with_total(Money::from_cents(500), at(11)), ExpectedVersion::Exact(0)).unwrap();

        let total = store
            .closed_commands_total(company, at(9), at(12) - Duration::minutes(1))
            .unwrap();
        assert_eq!(total, Money::from_cents(2_000));
    }

    #[test]
    fn closed_totals_follow_the_close_stamp_not_later_edits() {
        let store = InMemoryDiningStore::new();
        let company = CompanyId::new();
        closed_command(&store, company, 1_500, 10);

        let stored = store.commands().filter(|c| c.company_id() == company).unwrap().remove(0);
        let version = stored.version();
        store
            .save(stored.with_total(Money::from_cents(1_000), at(15)), ExpectedVersion::Exact(version))
            .unwrap();

        assert_eq!(
            store.closed_commands_total(company, at(9), at(11)).unwrap(),
            Money::from_cents(1_000)
        );
        assert_eq!(store.closed_commands_total(company, at(14), at(16)).unwrap(), Money::ZERO);
    }

    #[test]
    fn batch_write_stores_command_and_orders_together() {
        let store = InMemoryDiningStore::new();
        let company = CompanyId::new();
        let command = Command::open(CommandId::new(), company, TableId::new(), "tab", None, at(10)).unwrap();
        let command_id = *command.id();
        store.save(command.clone(), ExpectedVersion::Exact(0)).unwrap();
        let order = placed(company, command_id, 700);
        store.save(order.clone(), ExpectedVersion::Exact(0)).unwrap();

        let served = transition(&order, OrderStatus::InPreparation).unwrap();
        let paying = transition(&command, CommandStatus::Paying).unwrap();
        store
            .save_with_orders(paying, ExpectedVersion::Exact(1), vec![(served, ExpectedVersion::Exact(1))])
            .unwrap();

        assert_eq!(AggregateRepository::<Command>::get_by_id(&store, &command_id).unwrap().version(), 2);
        assert_eq!(
            AggregateRepository::<Order>::get_by_id(&store, order.id()).unwrap().status(),
            OrderStatus::InPreparation
        );
    }

    #[test]
    fn stale_command_in_a_batch_writes_no_orders() {
        let store = InMemoryDiningStore::new();
        let company = CompanyId::new();
        let command = Command::open(CommandId::new(), company, TableId::new(), "tab", None, at(10)).unwrap();
        let command_id = *command.id();
        store.save(command.clone(), ExpectedVersion::Exact(0)).unwrap();
        let order = placed(company, command_id, 700);
        store.save(order.clone(), ExpectedVersion::Exact(0)).unwrap();
        store
            .save(command.with_total(Money::from_cents(700), at(11)), ExpectedVersion::Exact(1))
            .unwrap();

        let served = transition(&order, OrderStatus::InPreparation).unwrap();
        let paying = transition(&command, CommandStatus::Paying).unwrap();
        let err = store
            .save_with_orders(paying, ExpectedVersion::Exact(1), vec![(served, ExpectedVersion::Exact(1))])
            .unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(
            AggregateRepository::<Order>::get_by_id(&store, order.id()).unwrap().status(),
            OrderStatus::PendingConfirmation
        );
    }

    #[test]
    fn queries_filter_by_parent() {
        let store = InMemoryDiningStore::new();
        let company = CompanyId::new();
        let table = TableId::new();
        let command = Command::open(CommandId::new(), company, table, "tab", None, at(10)).unwrap();
        let command_id = *command.id();
        store.save(command, ExpectedVersion::Exact(0)).unwrap();
        for cents in [100, 200] {
            let order = Order::place(
                OrderId::new(),
                company,
                command_id,
                "sku",
                Money::from_cents(cents),
                Money::ZERO,
                None,
                at(10),
            )
            .unwrap();
            store.save(order, ExpectedVersion::Exact(0)).unwrap();
        }

        assert_eq!(store.orders_for_command(command_id).unwrap().len(), 2);
        assert!(store.orders_for_command(CommandId::new()).unwrap().is_empty());
        assert_eq!(store.commands_for_table(table).unwrap().len(), 1);
    }
}
