use crate::config::ConnectorConfig;
use crate::error::ConnectorError;
use crate::events::{EventBus, OperatorAlert, SettlementEvent};
use crate::forwarder::Forwarder;
use crate::peer::{PeerConnection, PeerDescriptor};
use crate::registry::{Deregistered, PeerRegistry};
use ilp_errors::{LedgerError, TrustlineError};
use ilp_ledger::{Account, AccountId, Accountant, LedgerStore, TrustlineOperation};
use ilp_packet::{Address, IlpResult, Prepare};
use ilp_router::{PeerId, Route, RoutingTable};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// # Connector
///
/// Wires the routing table, peer registry, ledger accountant and packet
/// forwarder together around one injected [`LedgerStore`].
///
/// Peers hand every Prepare they receive to [`handle_incoming`](Connector::handle_incoming)
/// and get back the Fulfill or Reject to relay upstream.
#[derive(Clone)]
pub struct Connector<S> {
    ilp_address: Address,
    routes: Arc<RoutingTable>,
    accountant: Accountant<S>,
    peers: Arc<PeerRegistry>,
    events: EventBus,
    forwarder: Forwarder<S>,
    config: Option<Arc<ConnectorConfig>>,
}

impl<S> Connector<S>
where
    S: LedgerStore,
{
    /// A connector with no accounts, routes or peers
    pub fn new(ilp_address: Address, store: S) -> Self {
        Self::build(ilp_address, store, EventBus::new(1024), true, None)
    }

    /// Configure the accounts and install the static routes from `config`.
    /// Accounts are configured in order, so parents must come before their
    /// sub-accounts.
    pub async fn from_config(config: ConnectorConfig, store: S) -> Result<Self, ConnectorError> {
        let routes = config
            .routes
            .iter()
            .map(|route| route.to_route())
            .collect::<Result<Vec<Route>, _>>()?;
        let config = Arc::new(config);
        let connector = Self::build(
            config.ilp_address.clone(),
            store,
            EventBus::new(config.event_buffer),
            config.peer_retry,
            Some(config.clone()),
        );
        for account in &config.accounts {
            connector
                .accountant
                .configure_account(account.to_settings())
                .await?;
        }
        for route in routes {
            connector.add_route(route);
        }
        info!(
            "Configured connector {} with {} account(s) and {} static route(s)",
            config.ilp_address,
            config.accounts.len(),
            config.routes.len()
        );
        Ok(connector)
    }

    fn build(
        ilp_address: Address,
        store: S,
        events: EventBus,
        peer_retry: bool,
        config: Option<Arc<ConnectorConfig>>,
    ) -> Self {
        let routes = Arc::new(RoutingTable::new(PeerId::new(ilp_address.to_string())));
        let accountant = Accountant::new(store);
        let peers = Arc::new(PeerRegistry::new(
            routes.clone(),
            Arc::new(accountant.clone()),
        ));
        let forwarder = Forwarder::new(
            ilp_address.clone(),
            accountant.clone(),
            routes.clone(),
            peers.clone(),
            events.clone(),
        )
        .peer_retry(peer_retry);
        Connector {
            ilp_address,
            routes,
            accountant,
            peers,
            events,
            forwarder,
            config,
        }
    }

    pub fn ilp_address(&self) -> &Address {
        &self.ilp_address
    }

    pub fn routing_table(&self) -> &Arc<RoutingTable> {
        &self.routes
    }

    pub fn accountant(&self) -> &Accountant<S> {
        &self.accountant
    }

    pub fn peers(&self) -> &Arc<PeerRegistry> {
        &self.peers
    }

    pub fn forwarder(&self) -> &Forwarder<S> {
        &self.forwarder
    }

    pub fn add_route(&self, route: Route) -> Option<Route> {
        debug!("Adding route {} via {}", route.prefix, route.next_hop);
        self.routes.insert(route)
    }

    pub fn remove_route(&self, prefix: &Address) -> Option<Route> {
        self.routes.remove(prefix)
    }

    /// Register a peer. Its account must already exist.
    pub async fn connect_peer(&self, descriptor: PeerDescriptor) -> Result<(), ConnectorError> {
        self.accountant.get_account(descriptor.account_id).await?;
        self.peers.register(descriptor)?;
        Ok(())
    }

    /// Register a peer listed in the configuration with its live connection
    pub async fn connect_configured_peer(
        &self,
        id: &str,
        connection: Arc<dyn PeerConnection>,
    ) -> Result<(), ConnectorError> {
        let peer = self
            .config
            .as_ref()
            .and_then(|config| config.peer(id))
            .ok_or_else(|| ConnectorError::UnknownPeer(id.to_string()))?;
        let descriptor = PeerDescriptor {
            id: PeerId::new(peer.id.clone()),
            relation: peer.relation,
            is_route_broadcaster: peer.is_route_broadcaster,
            is_route_receiver: peer.is_route_receiver,
            account_id: peer.account_id,
            connection,
        };
        self.connect_peer(descriptor).await
    }

    /// Deregister the peer, withdraw its routes and roll back every open
    /// transfer on its account. Packets waiting on those transfers are
    /// answered with T01.
    pub async fn disconnect_peer(&self, id: &PeerId) -> Result<Option<Deregistered>, LedgerError> {
        let deregistered = self.peers.deregister(id).await?;
        if let Some(deregistered) = deregistered.as_ref() {
            self.forwarder.abort_released(&deregistered.released);
        }
        Ok(deregistered)
    }

    /// Forward a Prepare received from the peer `from`
    pub async fn handle_incoming(&self, from: &PeerId, prepare: Prepare) -> IlpResult {
        self.forwarder.handle_prepare(from, prepare).await
    }

    pub async fn get_account(&self, account_id: AccountId) -> Result<Account, LedgerError> {
        self.accountant.get_account(account_id).await
    }

    pub async fn get_balance(&self, account_id: AccountId) -> Result<i64, LedgerError> {
        self.accountant.get_balance(account_id).await
    }

    pub async fn get_available(&self, account_id: AccountId) -> Result<i128, LedgerError> {
        self.accountant.get_available(account_id).await
    }

    pub async fn adjust_trustline(&self, operation: TrustlineOperation) -> Result<(), TrustlineError> {
        self.accountant.adjust_trustline(operation).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SettlementEvent> {
        self.events.subscribe()
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<OperatorAlert> {
        self.events.subscribe_alerts()
    }

    /// Start the expiry sweep on the configured interval (1s by default)
    pub fn spawn_expiry_sweep(&self) -> JoinHandle<()> {
        let interval = self
            .config
            .as_ref()
            .map_or(1000, |config| config.expiry_sweep_interval);
        self.forwarder
            .spawn_expiry_sweep(Duration::from_millis(interval))
    }
}
