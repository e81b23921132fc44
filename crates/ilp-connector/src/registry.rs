use crate::peer::PeerDescriptor;
use async_trait::async_trait;
use dashmap::DashMap;
use ilp_errors::{LedgerError, PeerError};
use ilp_ledger::{AccountId, Accountant, LedgerStore};
use ilp_packet::{Address, IlpResult, Prepare};
use ilp_router::{PeerId, RoutingTable};
use std::sync::Arc;
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// Releases the open reservations booked on an account when its peer goes
/// away.
#[async_trait]
pub trait ReleaseReservations: Send + Sync {
    /// Returns the ids of the transfers and reservations rolled back
    async fn release_account(&self, account_id: AccountId) -> Result<Vec<Uuid>, LedgerError>;
}

#[async_trait]
impl<S> ReleaseReservations for Accountant<S>
where
    S: LedgerStore,
{
    async fn release_account(&self, account_id: AccountId) -> Result<Vec<Uuid>, LedgerError> {
        Accountant::release_account(self, account_id).await
    }
}

/// What deregistering a peer undid
#[derive(Debug)]
pub struct Deregistered {
    pub descriptor: PeerDescriptor,
    pub withdrawn_routes: Vec<Address>,
    /// Transfers and reservations on the peer's account that were rolled back
    pub released: Vec<Uuid>,
}

/// # Peer Registry
///
/// Owns the descriptor and connection of every connected peer. Peers are
/// sharded by id, so registering one peer does not block lookups of another.
pub struct PeerRegistry {
    peers: DashMap<PeerId, PeerDescriptor>,
    routes: Arc<RoutingTable>,
    ledger: Arc<dyn ReleaseReservations>,
}

impl PeerRegistry {
    pub fn new(routes: Arc<RoutingTable>, ledger: Arc<dyn ReleaseReservations>) -> Self {
        PeerRegistry {
            peers: DashMap::new(),
            routes,
            ledger,
        }
    }

    pub fn register(&self, descriptor: PeerDescriptor) -> Result<(), PeerError> {
        let id = descriptor.id.clone();
        match self.peers.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(entry) => {
                Err(PeerError::AlreadyRegistered(entry.key().to_string()))
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                debug!(
                    "Registered {} peer {} on account {}",
                    descriptor.relation, descriptor.id, descriptor.account_id
                );
                entry.insert(descriptor);
                Ok(())
            }
        }
    }

    pub fn get(&self, id: &PeerId) -> Option<PeerDescriptor> {
        self.peers.get(id).map(|peer| peer.value().clone())
    }

    pub fn contains(&self, id: &PeerId) -> bool {
        self.peers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Peers we should send route updates to
    pub fn route_broadcast_targets(&self) -> Vec<PeerDescriptor> {
        self.peers
            .iter()
            .filter(|peer| peer.is_route_broadcaster)
            .map(|peer| peer.value().clone())
            .collect()
    }

    /// Remove the peer, withdraw every route through it and roll back the
    /// open reservations on its account. Returns `None` if it was not
    /// registered.
    pub async fn deregister(&self, id: &PeerId) -> Result<Option<Deregistered>, LedgerError> {
        let descriptor = match self.peers.remove(id) {
            Some((_, descriptor)) => descriptor,
            None => return Ok(None),
        };
        let withdrawn_routes = self.routes.withdraw_peer(id);
        let released = self.ledger.release_account(descriptor.account_id).await?;
        debug!(
            "Deregistered peer {}: withdrew {} route(s), released {} open transfer(s)",
            id,
            withdrawn_routes.len(),
            released.len()
        );
        Ok(Some(Deregistered {
            descriptor,
            withdrawn_routes,
            released,
        }))
    }

    /// Send a Prepare to the peer. Unknown and closed peers are unreachable.
    pub async fn send(&self, id: &PeerId, prepare: Prepare) -> Result<IlpResult, PeerError> {
        // Clone the handle out so the shard is not held while awaiting
        let connection = match self.peers.get(id) {
            Some(peer) => peer.connection.clone(),
            None => {
                trace!("Peer {} is not registered", id);
                return Err(PeerError::PeerUnreachable(id.to_string()));
            }
        };
        if connection.is_closed() {
            warn!("Connection to peer {} is closed", id);
            return Err(PeerError::PeerUnreachable(id.to_string()));
        }
        connection.send_request(prepare).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::connection_fn;
    use ilp_ledger::{AccountSettings, CreditLine, Direction, InMemoryLedgerStore};
    use ilp_packet::{ErrorCode, FulfillBuilder, PrepareBuilder, RejectBuilder};
    use ilp_router::{Route, RoutingRelation};
    use std::time::{Duration, SystemTime};

    fn prepare() -> Prepare {
        PrepareBuilder {
            destination: Address::new("example.bob"),
            amount: 10,
            expires_at: SystemTime::now() + Duration::from_secs(30),
            execution_condition: &[0; 32],
            data: &[],
        }
        .build()
    }

    fn descriptor(id: &str, account_id: AccountId) -> PeerDescriptor {
        PeerDescriptor {
            id: PeerId::from(id),
            relation: RoutingRelation::Peer,
            is_route_broadcaster: true,
            is_route_receiver: false,
            account_id,
            connection: Arc::new(connection_fn(|_| async {
                Ok(FulfillBuilder {
                    fulfillment: &[0; 32],
                    data: b"hi",
                }
                .build())
            })),
        }
    }

    async fn registry() -> (PeerRegistry, Accountant<InMemoryLedgerStore>, AccountId) {
        let accountant = Accountant::new(InMemoryLedgerStore::new());
        let account = accountant
            .create_account(AccountSettings {
                id: Uuid::new_v4(),
                asset_code: "XRP".to_string(),
                asset_scale: 9,
                credit_line: CreditLine::Unlimited,
                parent_account_id: None,
                rollup: false,
            })
            .await
            .unwrap();
        let routes = Arc::new(RoutingTable::new(PeerId::from("example.connector")));
        (
            PeerRegistry::new(routes, Arc::new(accountant.clone())),
            accountant,
            account.id,
        )
    }

    #[tokio::test]
    async fn registers_each_peer_once() {
        let (registry, _, account) = registry().await;
        registry.register(descriptor("alice", account)).unwrap();
        assert_eq!(
            registry.register(descriptor("alice", account)),
            Err(PeerError::AlreadyRegistered("alice".to_string()))
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.route_broadcast_targets().len(), 1);
        assert_eq!(
            registry.get(&PeerId::from("alice")).unwrap().account_id,
            account
        );
    }

    #[tokio::test]
    async fn send_to_unknown_or_closed_peer_is_unreachable() {
        let (registry, _, account) = registry().await;
        assert_eq!(
            registry.send(&PeerId::from("nobody"), prepare()).await,
            Err(PeerError::PeerUnreachable("nobody".to_string()))
        );

        let connection = connection_fn(|_| async {
            Err(RejectBuilder {
                code: ErrorCode::F99_APPLICATION_ERROR,
                message: &[],
                triggered_by: None,
                data: &[],
            }
            .build())
        });
        let mut peer = descriptor("closing", account);
        peer.connection = Arc::new(connection.clone());
        registry.register(peer).unwrap();
        let reject = registry
            .send(&PeerId::from("closing"), prepare())
            .await
            .unwrap()
            .unwrap_err();
        assert_eq!(reject.code(), ErrorCode::F99_APPLICATION_ERROR);

        connection.close();
        assert!(registry
            .send(&PeerId::from("closing"), prepare())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn deregister_withdraws_routes_and_releases_reservations() {
        let (registry, accountant, account) = registry().await;
        registry.register(descriptor("alice", account)).unwrap();
        registry.routes.insert(Route::new(
            Address::new("example.alice"),
            PeerId::from("alice"),
        ));
        let reservation = accountant
            .reserve(account, 100, Direction::Debit)
            .await
            .unwrap();

        let deregistered = registry
            .deregister(&PeerId::from("alice"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            deregistered.withdrawn_routes,
            vec![Address::new("example.alice")]
        );
        assert_eq!(deregistered.released, vec![reservation.id]);
        assert_eq!(accountant.get_available(account).await.unwrap(), 0);
        assert!(registry.routes.is_empty());
        assert!(registry.get(&PeerId::from("alice")).is_none());
        assert!(registry
            .deregister(&PeerId::from("alice"))
            .await
            .unwrap()
            .is_none());
    }
}
