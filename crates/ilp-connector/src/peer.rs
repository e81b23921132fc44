use async_trait::async_trait;
use ilp_errors::PeerError;
use ilp_ledger::AccountId;
use ilp_packet::{IlpResult, Prepare};
use ilp_router::{PeerId, RoutingRelation};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The send half of a peer transport.
///
/// The wire encoding and the transport itself live outside the connector
/// core. A connection either answers a Prepare with a Fulfill or Reject, or
/// fails with `PeerUnreachable`.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn send_request(&self, prepare: Prepare) -> Result<IlpResult, PeerError>;

    /// Closed connections are treated as unreachable without being tried
    fn is_closed(&self) -> bool {
        false
    }
}

/// A connection backed by a function, mostly useful for tests and for
/// wiring in-process peers.
#[derive(Clone)]
pub struct ConnectionFn<F> {
    handler: F,
    closed: Arc<AtomicBool>,
}

/// Create a [`PeerConnection`] from a function that answers each Prepare.
pub fn connection_fn<F, Fut>(handler: F) -> ConnectionFn<F>
where
    F: Fn(Prepare) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = IlpResult> + Send + 'static,
{
    ConnectionFn {
        handler,
        closed: Arc::new(AtomicBool::new(false)),
    }
}

impl<F> ConnectionFn<F> {
    /// Mark the connection closed. Clones share the flag.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl<F, Fut> PeerConnection for ConnectionFn<F>
where
    F: Fn(Prepare) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = IlpResult> + Send + 'static,
{
    async fn send_request(&self, prepare: Prepare) -> Result<IlpResult, PeerError> {
        Ok((self.handler)(prepare).await)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Everything the connector knows about a connected peer.
#[derive(Clone)]
pub struct PeerDescriptor {
    pub id: PeerId,
    pub relation: RoutingRelation,
    /// We should send it route updates
    pub is_route_broadcaster: bool,
    /// We accept route updates from it
    pub is_route_receiver: bool,
    /// The ledger account value to and from this peer is booked on
    pub account_id: AccountId,
    pub connection: Arc<dyn PeerConnection>,
}

impl fmt::Debug for PeerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PeerDescriptor")
            .field("id", &self.id)
            .field("relation", &self.relation)
            .field("is_route_broadcaster", &self.is_route_broadcaster)
            .field("is_route_receiver", &self.is_route_receiver)
            .field("account_id", &self.account_id)
            .field("closed", &self.connection.is_closed())
            .finish()
    }
}
