use std::sync::Arc;

use tracing::info;

use comanda_auth::{AuthorizationGuard, Caller, Requirement, features};
use comanda_core::{
    AggregateRepository, AggregateRoot, Clock, CommandId, ExpectedVersion, Money, OrderId, TableId,
};
use comanda_dining::{
    Command, CommandBatchWriter, CommandQueries, DiningEvent, Order, OrderQueries, Table,
};
use comanda_status::{
    CommandStatus, Lifecycle, OrderStatus, Stateful, TableStatus, transition,
};

use super::ensure_company;
use crate::{ServiceError, TransactionBoundary};

/// Storage collaborators of the dining use cases.
#[derive(Clone)]
pub struct DiningRepositories {
    pub commands: Arc<dyn AggregateRepository<Command>>,
    pub command_batches: Arc<dyn CommandBatchWriter>,
    pub orders: Arc<dyn AggregateRepository<Order>>,
    pub tables: Arc<dyn AggregateRepository<Table>>,
    pub order_queries: Arc<dyn OrderQueries>,
    pub command_queries: Arc<dyn CommandQueries>,
}

impl DiningRepositories {
    /// Every view backed by one store.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: AggregateRepository<Command>
            + CommandBatchWriter
            + AggregateRepository<Order>
            + AggregateRepository<Table>
            + OrderQueries
            + CommandQueries
            + 'static,
    {
        Self {
            commands: store.clone(),
            command_batches: store.clone(),
            orders: store.clone(),
            tables: store.clone(),
            order_queries: store.clone(),
            command_queries: store,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AddOrderInput {
    pub command_id: CommandId,
    pub product_ref: String,
    pub base_price: Money,
    pub modifiers_price: Money,
    pub notes: Option<String>,
}

/// Commands, orders and tables as seen by staff.
#[derive(Clone)]
pub struct DiningService {
    repos: DiningRepositories,
    guard: AuthorizationGuard,
    tx: TransactionBoundary<DiningEvent>,
    clock: Arc<dyn Clock>,
}

impl DiningService {
    pub fn new(
        repos: DiningRepositories,
        guard: AuthorizationGuard,
        tx: TransactionBoundary<DiningEvent>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repos,
            guard,
            tx,
            clock,
        }
    }

    pub fn create_table(
        &self,
        caller: &Caller,
        name: &str,
        seats: Option<u32>,
    ) -> Result<TableId, ServiceError> {
        let requirement = Requirement::all([features::TABLE_MANAGE]);
        self.guard.guard(caller, &requirement, "create_table", || {
            let table = Table::new(TableId::new(), caller.company_id, name, seats, self.clock.now())?;
            let id = self.repos.tables.save(table, ExpectedVersion::Exact(0))?;
            info!(table_id = %id, company_id = %caller.company_id, "table created");
            Ok(id)
        })
    }

    /// Open a command on `table_id`.
    pub fn open_command(
        &self,
        caller: &Caller,
        table_id: TableId,
        name: &str,
        people: Option<u32>,
    ) -> Result<CommandId, ServiceError> {
        let requirement = Requirement::all([features::COMMAND_MANAGE]);
        self.guard.guard(caller, &requirement, "open_command", || {
            self.tx.run(caller.company_id, "open_command", |uow| {
                let table = self.load_table(caller, table_id)?;
                let mut command = Command::open(
                    CommandId::new(),
                    caller.company_id,
                    *table.id(),
                    name,
                    people,
                    self.clock.now(),
                )?;
                if let Some(employee_id) = caller.employee_id {
                    command = command.with_employee(employee_id);
                }
                let id = self.repos.commands.save(command, ExpectedVersion::Exact(0))?;
                self.tx.publish(uow, DiningEvent::table_status(table_id));
                info!(command_id = %id, table_id = %table_id, "command opened");
                Ok(id)
            })
        })
    }

    /// Move a command through its lifecycle.
    ///
    /// Closing requires every live order to be finished; with `close_all` the
    /// unfinished ones are first walked to `DeliveredServed`. Canceling needs
    /// `command.cancel` (or company admin) and records `reason`.
    pub fn change_command_status(
        &self,
        caller: &Caller,
        command_id: CommandId,
        target: CommandStatus,
        close_all: bool,
        reason: Option<String>,
    ) -> Result<(), ServiceError> {
        let requirement = if target == CommandStatus::Canceled {
            Requirement::all([features::COMMAND_MANAGE])
                .or_any([features::COMMAND_CANCEL, features::COMPANY_ADMIN])
        } else {
            Requirement::all([features::COMMAND_MANAGE])
        };
        self.guard.guard(caller, &requirement, "change_command_status", || {
            self.tx.run(caller.company_id, "change_command_status", |uow| {
                let command = self.load_command(caller, command_id)?;
                let mut next = transition(&command, target)?;
                let now = self.clock.now();

                let served = if target == CommandStatus::Closed {
                    self.finish_orders(caller, command_id, close_all)?
                } else {
                    Vec::new()
                };
                match target {
                    CommandStatus::Canceled => next.record_cancellation(reason, caller.user_id, now),
                    CommandStatus::Closed => next.mark_closed(now),
                    _ => next.touch(now),
                }

                self.repos.command_batches.save_with_orders(
                    next,
                    ExpectedVersion::Exact(command.version()),
                    served,
                )?;
                self.tx.publish(uow, DiningEvent::table_status(command.table_id()));
                self.tx.publish(uow, DiningEvent::command(command_id));
                info!(
                    command_id = %command_id,
                    from = %command.status(),
                    to = %target,
                    "command status changed"
                );
                Ok(())
            })
        })
    }

    pub fn move_command_table(
        &self,
        caller: &Caller,
        command_id: CommandId,
        new_table_id: TableId,
    ) -> Result<(), ServiceError> {
        let requirement = Requirement::all([features::COMMAND_MANAGE]);
        self.guard.guard(caller, &requirement, "move_command_table", || {
            self.tx.run(caller.company_id, "move_command_table", |uow| {
                let command = self.load_command(caller, command_id)?;
                let table = self.load_table(caller, new_table_id)?;
                if table.company_id() != command.company_id() {
                    return Err(ServiceError::business("table belongs to another company"));
                }
                let moved = command.moved_to(new_table_id, self.clock.now())?;
                self.repos
                    .commands
                    .save(moved, ExpectedVersion::Exact(command.version()))?;
                self.tx.publish(uow, DiningEvent::table_status(command.table_id()));
                self.tx.publish(uow, DiningEvent::table_status(new_table_id));
                info!(
                    command_id = %command_id,
                    from = %command.table_id(),
                    to = %new_table_id,
                    "command moved"
                );
                Ok(())
            })
        })
    }

    pub fn add_order(&self, caller: &Caller, input: AddOrderInput) -> Result<OrderId, ServiceError> {
        let requirement = Requirement::all([features::ORDER_MANAGE]);
        self.guard.guard(caller, &requirement, "add_order", || {
            self.tx.run(caller.company_id, "add_order", |uow| {
                let command = self.load_command(caller, input.command_id)?;
                if command.status() != CommandStatus::Open {
                    return Err(ServiceError::business(format!(
                        "orders can only be added to open commands (command is {})",
                        command.status()
                    )));
                }
                let order = Order::place(
                    OrderId::new(),
                    caller.company_id,
                    input.command_id,
                    input.product_ref,
                    input.base_price,
                    input.modifiers_price,
                    input.notes,
                    self.clock.now(),
                )?;
                let line_total = order.line_total();
                let id = self.repos.orders.save(order, ExpectedVersion::Exact(0))?;
                self.tx.publish(uow, DiningEvent::command(input.command_id));
                info!(order_id = %id, command_id = %input.command_id, line_total = %line_total, "order added");
                Ok(id)
            })
        })
    }

    pub fn change_order_status(
        &self,
        caller: &Caller,
        order_id: OrderId,
        target: OrderStatus,
        reason: Option<String>,
    ) -> Result<(), ServiceError> {
        let requirement = if target == OrderStatus::ItemCanceled {
            Requirement::all([features::ORDER_MANAGE])
                .or_any([features::ORDER_CANCEL, features::COMPANY_ADMIN])
        } else {
            Requirement::all([features::ORDER_MANAGE])
        };
        self.guard.guard(caller, &requirement, "change_order_status", || {
            self.tx.run(caller.company_id, "change_order_status", |uow| {
                let order = self.load_order(caller, order_id)?;
                self.ensure_command_accepts_orders(caller, order.command_id())?;
                let mut next = transition(&order, target)?;
                let now = self.clock.now();
                if target == OrderStatus::ItemCanceled {
                    next.record_cancellation(reason, caller.user_id, now);
                } else {
                    next.touch(now);
                }
                self.repos
                    .orders
                    .save(next, ExpectedVersion::Exact(order.version()))?;
                self.tx.publish(uow, DiningEvent::command(order.command_id()));
                info!(order_id = %order_id, from = %order.status(), to = %target, "order status changed");
                Ok(())
            })
        })
    }

    pub fn remove_order(&self, caller: &Caller, order_id: OrderId) -> Result<(), ServiceError> {
        let requirement = Requirement::any([features::ORDER_CANCEL, features::COMPANY_ADMIN]);
        self.guard.guard(caller, &requirement, "remove_order", || {
            self.tx.run(caller.company_id, "remove_order", |uow| {
                let order = self.load_order(caller, order_id)?;
                self.ensure_command_accepts_orders(caller, order.command_id())?;
                let removed = order.removed(self.clock.now())?;
                self.repos
                    .orders
                    .save(removed, ExpectedVersion::Exact(order.version()))?;
                self.tx.publish(uow, DiningEvent::command(order.command_id()));
                info!(order_id = %order_id, command_id = %order.command_id(), "order removed");
                Ok(())
            })
        })
    }

    pub fn apply_command_discount(
        &self,
        caller: &Caller,
        command_id: CommandId,
        amount: Money,
        description: Option<String>,
    ) -> Result<(), ServiceError> {
        let requirement = Requirement::any([features::COMMAND_DISCOUNT, features::COMPANY_ADMIN])
            .with_message("discounts need manager approval");
        self.guard.guard(caller, &requirement, "apply_command_discount", || {
            self.tx.run(caller.company_id, "apply_command_discount", |uow| {
                let command = self.load_command(caller, command_id)?;
                let discounted = command.with_discount(amount, description, self.clock.now())?;
                self.repos
                    .commands
                    .save(discounted, ExpectedVersion::Exact(command.version()))?;
                self.tx.publish(uow, DiningEvent::command(command_id));
                info!(command_id = %command_id, amount = %amount, "command discount applied");
                Ok(())
            })
        })
    }

    /// Operator override for non-derived table states.
    pub fn set_table_status(
        &self,
        caller: &Caller,
        table_id: TableId,
        status: TableStatus,
    ) -> Result<(), ServiceError> {
        let requirement = Requirement::all([features::TABLE_MANAGE]);
        self.guard.guard(caller, &requirement, "set_table_status", || {
            if status.is_derived() {
                return Err(ServiceError::business(format!(
                    "table status {status} is derived from its commands"
                )));
            }
            let table = self.load_table(caller, table_id)?;
            if table.status() == status {
                return Ok(());
            }
            let next = transition(&table, status)?;
            self.repos
                .tables
                .save(next, ExpectedVersion::Exact(table.version()))?;
            info!(table_id = %table_id, from = %table.status(), to = %status, "table status set");
            Ok(())
        })
    }

    /// Check the command's live orders before a close. With `close_all` the
    /// unfinished ones come back walked to `DeliveredServed`, each paired with
    /// the version it was read at, for the caller to write with the command.
    fn finish_orders(
        &self,
        caller: &Caller,
        command_id: CommandId,
        close_all: bool,
    ) -> Result<Vec<(Order, ExpectedVersion)>, ServiceError> {
        let open: Vec<Order> = self
            .repos
            .order_queries
            .orders_for_command(command_id)?
            .into_iter()
            .filter(|o| !o.is_deleted() && !o.status().is_terminal())
            .collect();
        if open.is_empty() {
            return Ok(Vec::new());
        }
        if !close_all {
            return Err(ServiceError::business(format!(
                "command has open orders ({})",
                open.len()
            )));
        }

        let now = self.clock.now();
        let mut advanced = Vec::with_capacity(open.len());
        for order in open {
            let path = OrderStatus::table()
                .path(order.status(), OrderStatus::DeliveredServed)
                .ok_or_else(|| {
                    ServiceError::business(format!("order {} cannot be served", order.id()))
                })?;
            let mut current = order.clone();
            for step in path {
                current = transition(&current, step)?;
            }
            current.touch(now);
            advanced.push((current, ExpectedVersion::Exact(order.version())));
        }
        info!(
            command_id = %command_id,
            company_id = %caller.company_id,
            orders = advanced.len(),
            "serving open orders with the close"
        );
        Ok(advanced)
    }

    /// Orders of settled (closed or canceled) commands are frozen.
    fn ensure_command_accepts_orders(
        &self,
        caller: &Caller,
        command_id: CommandId,
    ) -> Result<(), ServiceError> {
        let command = self.load_command(caller, command_id)?;
        if !command.is_active() {
            return Err(ServiceError::business(format!(
                "orders of a {} command cannot change",
                command.status()
            )));
        }
        Ok(())
    }

    fn load_command(&self, caller: &Caller, id: CommandId) -> Result<Command, ServiceError> {
        let command = self.repos.commands.get_by_id(&id)?;
        ensure_company(caller, command.company_id(), "command", id)?;
        Ok(command)
    }

    fn load_order(&self, caller: &Caller, id: OrderId) -> Result<Order, ServiceError> {
        let order = self.repos.orders.get_by_id(&id)?;
        ensure_company(caller, order.company_id(), "order", id)?;
        Ok(order)
    }

    fn load_table(&self, caller: &Caller, id: TableId) -> Result<Table, ServiceError> {
        let table = self.repos.tables.get_by_id(&id)?;
        ensure_company(caller, table.company_id(), "table", id)?;
        Ok(table)
    }
}
