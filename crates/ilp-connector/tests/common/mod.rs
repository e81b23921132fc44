#![allow(dead_code)]

use ilp_connector::{connection_fn, Connector, PeerDescriptor, PeerId, RoutingRelation};
use ilp_ledger::{AccountId, AccountSettings, CreditLine, InMemoryLedgerStore};
use ilp_packet::{
    condition, Address, ErrorCode, FulfillBuilder, IlpResult, Prepare, PrepareBuilder,
    RejectBuilder,
};
use ilp_router::Route;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

pub static CONNECTOR_ADDRESS: Lazy<Address> = Lazy::new(|| Address::new("example.connector"));
pub static PREIMAGE: [u8; 32] = [7; 32];
pub static CONDITION: Lazy<[u8; 32]> = Lazy::new(|| condition::derive_condition(&PREIMAGE));

// Alice sends in USD cents; Bob and Charlie are paid out in XRP drops at scale 9
pub static ALICE: Lazy<AccountSettings> = Lazy::new(|| AccountSettings {
    id: Uuid::parse_str("00000000-0000-0000-0000-00000000a11c").unwrap(),
    asset_code: "USD".to_string(),
    asset_scale: 2,
    credit_line: CreditLine::Limited(10_000),
    parent_account_id: None,
    rollup: false,
});
pub static BOB: Lazy<AccountSettings> = Lazy::new(|| AccountSettings {
    id: Uuid::parse_str("00000000-0000-0000-0000-000000000b0b").unwrap(),
    asset_code: "XRP".to_string(),
    asset_scale: 9,
    credit_line: CreditLine::Unlimited,
    parent_account_id: None,
    rollup: false,
});
pub static CHARLIE: Lazy<AccountSettings> = Lazy::new(|| AccountSettings {
    id: Uuid::parse_str("00000000-0000-0000-0000-00000000c4a1").unwrap(),
    asset_code: "XRP".to_string(),
    asset_scale: 9,
    credit_line: CreditLine::Unlimited,
    parent_account_id: None,
    rollup: false,
});

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn alice() -> PeerId {
    PeerId::from("alice")
}
pub fn bob() -> PeerId {
    PeerId::from("bob")
}
pub fn charlie() -> PeerId {
    PeerId::from("charlie")
}

/// A connector with the three accounts configured and Alice connected as a
/// child. Nothing is routed yet.
pub async fn test_connector() -> Connector<InMemoryLedgerStore> {
    init_logging();
    let connector = Connector::new(CONNECTOR_ADDRESS.clone(), InMemoryLedgerStore::new());
    for settings in [&*ALICE, &*BOB, &*CHARLIE].iter() {
        connector
            .accountant()
            .create_account((*settings).clone())
            .await
            .unwrap();
    }
    connector
        .connect_peer(descriptor(
            alice(),
            RoutingRelation::Child,
            ALICE.id,
            connection_fn(|_| async { Err(reject(ErrorCode::F99_APPLICATION_ERROR, None)) }),
        ))
        .await
        .unwrap();
    connector
}

/// Connect `id` as a peer on `account_id` and route `prefix` to it
pub async fn connect_outgoing<C>(
    connector: &Connector<InMemoryLedgerStore>,
    id: PeerId,
    account_id: AccountId,
    prefix: &'static str,
    connection: C,
) where
    C: ilp_connector::PeerConnection + 'static,
{
    connector
        .connect_peer(descriptor(
            id.clone(),
            RoutingRelation::Peer,
            account_id,
            connection,
        ))
        .await
        .unwrap();
    connector.add_route(Route::new(Address::new(prefix), id));
}

pub fn descriptor<C>(
    id: PeerId,
    relation: RoutingRelation,
    account_id: AccountId,
    connection: C,
) -> PeerDescriptor
where
    C: ilp_connector::PeerConnection + 'static,
{
    PeerDescriptor {
        id,
        relation,
        is_route_broadcaster: false,
        is_route_receiver: true,
        account_id,
        connection: Arc::new(connection),
    }
}

pub fn prepare(destination: &'static str, amount: u64, expires_in: Duration) -> Prepare {
    PrepareBuilder {
        destination: Address::new(destination),
        amount,
        expires_at: SystemTime::now() + expires_in,
        execution_condition: &CONDITION,
        data: b"hello",
    }
    .build()
}

pub fn expired_prepare(destination: &'static str, amount: u64) -> Prepare {
    PrepareBuilder {
        destination: Address::new(destination),
        amount,
        expires_at: SystemTime::now() - Duration::from_secs(1),
        execution_condition: &CONDITION,
        data: &[],
    }
    .build()
}

pub fn fulfill() -> IlpResult {
    Ok(FulfillBuilder {
        fulfillment: &PREIMAGE,
        data: b"thanks",
    }
    .build())
}

pub fn reject(code: ErrorCode, triggered_by: Option<&Address>) -> ilp_packet::Reject {
    RejectBuilder {
        code,
        message: b"no thanks",
        triggered_by,
        data: &[],
    }
    .build()
}

/// Counts the packets a mock peer received
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// A peer that fulfills every packet with `PREIMAGE`
pub fn fulfilling_peer(counter: Counter) -> impl ilp_connector::PeerConnection + Clone {
    connection_fn(move |_| {
        counter.hit();
        async { fulfill() }
    })
}

/// A peer that never answers
pub fn silent_peer() -> impl ilp_connector::PeerConnection + Clone {
    connection_fn(|_| std::future::pending::<IlpResult>())
}

/// Poll until `check` holds, for at most a second
pub async fn eventually<F>(check: F)
where
    F: Fn() -> bool,
{
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition did not hold within a second");
}
