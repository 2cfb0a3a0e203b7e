//! Wiring of stores, reactors, bus and services.

use std::sync::Arc;

use tracing::info;

use comanda_auth::AuthorizationGuard;
use comanda_cashier::CashSessionLedger;
use comanda_core::Clock;
use comanda_dining::{CommandTotalReactor, DiningEvent, TableOccupancyReactor};
use comanda_events::{DomainEventBus, InMemoryOutbox};

use crate::config::EngineConfig;
use crate::services::{CashierService, DiningRepositories, DiningService};
use crate::store::{InMemoryDiningStore, InMemoryGrantStore, InMemorySessionStore};
use crate::TransactionBoundary;

/// A fully wired in-memory restaurant core.
///
/// Dropping the last handle stops the reactor workers.
pub struct Engine {
    pub config: EngineConfig,
    pub clock: Arc<dyn Clock>,
    pub dining_store: Arc<InMemoryDiningStore>,
    pub session_store: Arc<InMemorySessionStore>,
    pub grants: Arc<InMemoryGrantStore>,
    pub outbox: Option<Arc<InMemoryOutbox<DiningEvent>>>,
    pub bus: DomainEventBus<DiningEvent>,
    pub guard: AuthorizationGuard,
    pub dining: DiningService,
    pub cashier: CashierService,
}

impl Engine {
    pub fn start(config: EngineConfig, clock: Arc<dyn Clock>) -> std::io::Result<Self> {
        let dining_store = Arc::new(InMemoryDiningStore::new());
        let session_store = Arc::new(InMemorySessionStore::new());
        let grants = Arc::new(InMemoryGrantStore::new(clock.clone()));

        let total_reactor = CommandTotalReactor::new(
            dining_store.clone(),
            dining_store.clone(),
            clock.clone(),
            config.reactor_conflict_retries,
        );
        let occupancy_reactor = TableOccupancyReactor::new(
            dining_store.clone(),
            dining_store.clone(),
            config.reactor_conflict_retries,
        );

        let mut builder = DomainEventBus::<DiningEvent>::builder()
            .settings(config.bus_settings())
            .clock(clock.clone())
            .reactor(Arc::new(total_reactor))
            .reactor(Arc::new(occupancy_reactor));
        let outbox = config.outbox_enabled.then(|| Arc::new(InMemoryOutbox::<DiningEvent>::new()));
        if let Some(outbox) = &outbox {
            builder = builder.outbox(outbox.clone());
        }
        let bus = builder.start()?;

        let guard = AuthorizationGuard::new(grants.clone()).with_default_message(config.denial_message.clone());
        let dining = DiningService::new(
            DiningRepositories::from_store(dining_store.clone()),
            guard.clone(),
            TransactionBoundary::new(bus.clone()),
            clock.clone(),
        );
        let ledger = CashSessionLedger::new(session_store.clone(), dining_store.clone(), clock.clone());
        let cashier = CashierService::new(ledger, guard.clone());

        info!(
            config = %serde_json::to_string(&config).unwrap_or_default(),
            "engine started"
        );

        Ok(Self {
            config,
            clock,
            dining_store,
            session_store,
            grants,
            outbox,
            bus,
            guard,
            dining,
            cashier,
        })
    }

    pub fn from_env(clock: Arc<dyn Clock>) -> std::io::Result<Self> {
        Self::start(EngineConfig::from_env(), clock)
    }
}
