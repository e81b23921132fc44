use crate::events::{AlertKind, EventBus, Outcome, SettlementEvent};
use crate::registry::PeerRegistry;
use crate::trace;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use ilp_errors::{LedgerError, PeerError, RoutingError};
use ilp_ledger::{Account, AccountId, Accountant, LedgerStore, Transfer};
use ilp_packet::{condition, Address, ErrorCode, IlpResult, Prepare, Reject, RejectBuilder};
use ilp_router::{PeerId, Route, RoutingTable};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn, Instrument};
use uuid::Uuid;

/// Errors that abort a packet and need an operator. Every other failure is
/// answered with a Reject.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("packet {packet_id} aborted by a ledger failure: {source}")]
    Ledger {
        packet_id: Uuid,
        source: LedgerError,
    },
}

impl ForwardError {
    pub fn packet_id(&self) -> Uuid {
        match self {
            ForwardError::Ledger { packet_id, .. } => *packet_id,
        }
    }

    fn alert_kind(&self) -> AlertKind {
        match self {
            ForwardError::Ledger {
                source: LedgerError::PartialSettlement { .. },
                ..
            } => AlertKind::PartialSettlement,
            ForwardError::Ledger { .. } => AlertKind::StorageFailure,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PacketState {
    Prepared,
    Fulfilled,
    Rejected,
    Expired,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Interrupt {
    Expired,
    PeerDisconnected,
}

/// What the events for a packet report
#[derive(Clone, Debug)]
struct PacketInfo {
    id: Uuid,
    source_account_id: Option<AccountId>,
    source_amount: u64,
    destination_account_id: Option<AccountId>,
    destination_amount: u64,
}

/// A packet in the `Prepared` state. Whoever moves `state` out of
/// `Prepared` first owns the ledger bookkeeping for the terminal transition.
struct InFlight {
    info: PacketInfo,
    expires_at: SystemTime,
    state: Mutex<PacketState>,
    transfer: Option<Transfer>,
    interrupt: Mutex<Option<oneshot::Sender<Interrupt>>>,
}

impl InFlight {
    /// Move out of `Prepared`, or return the state some other party already
    /// moved the packet to.
    fn try_finish(&self, state: PacketState) -> Result<(), PacketState> {
        let mut current = self.state.lock();
        if *current == PacketState::Prepared {
            *current = state;
            Ok(())
        } else {
            Err(*current)
        }
    }

    /// Wake the task waiting on the downstream reply. Returns false if that
    /// task is gone.
    fn interrupt(&self, interrupt: Interrupt) -> bool {
        match self.interrupt.lock().take() {
            Some(sender) => sender.send(interrupt).is_ok(),
            None => false,
        }
    }
}

enum Reply {
    Peer(Result<IlpResult, PeerError>),
    TimedOut,
    Interrupted(Interrupt),
}

enum Attempt {
    Done(IlpResult),
    Unreachable(PeerError),
}

/// # Packet Forwarder
///
/// Moves each packet from `Prepared` to exactly one of `Fulfilled`,
/// `Rejected` or `Expired`:
/// 1. Reject expired packets and packets without a route
/// 1. Reserve the transfer between the incoming and outgoing accounts
/// 1. Send the packet to the next hop and wait at most until it expires
/// 1. Commit on a valid fulfillment, roll back on anything else
///
/// Packets that are still waiting when they expire are also rolled back by
/// `sweep_expired`, even if the task waiting on them was dropped.
#[derive(Clone)]
pub struct Forwarder<S> {
    ilp_address: Address,
    accountant: Accountant<S>,
    routes: Arc<RoutingTable>,
    peers: Arc<PeerRegistry>,
    events: EventBus,
    in_flight: Arc<DashMap<Uuid, Arc<InFlight>>>,
    peer_retry: bool,
}

impl<S> Forwarder<S>
where
    S: LedgerStore,
{
    pub fn new(
        ilp_address: Address,
        accountant: Accountant<S>,
        routes: Arc<RoutingTable>,
        peers: Arc<PeerRegistry>,
        events: EventBus,
    ) -> Self {
        Forwarder {
            ilp_address,
            accountant,
            routes,
            peers,
            events,
            in_flight: Arc::new(DashMap::new()),
            peer_retry: true,
        }
    }

    /// Retry once on an alternate route if the next hop is unreachable
    pub fn peer_retry(mut self, peer_retry: bool) -> Self {
        self.peer_retry = peer_retry;
        self
    }

    /// Number of packets waiting on a downstream reply
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn packet_state(&self, packet_id: Uuid) -> Option<PacketState> {
        self.in_flight
            .get(&packet_id)
            .map(|entry| *entry.value().state.lock())
    }

    /// Forward a Prepare received from `from`. Always answers with a Fulfill
    /// or Reject; fatal ledger failures are also published as alerts.
    pub async fn handle_prepare(&self, from: &PeerId, prepare: Prepare) -> IlpResult {
        let packet_id = Uuid::new_v4();
        let span = trace::incoming(packet_id, &prepare, from);
        async move {
            match self.forward(packet_id, from, prepare).await {
                Ok(result) => trace::response(result),
                Err(err) => {
                    self.events.alert(err.alert_kind(), packet_id, err.to_string());
                    Err(self.reject(ErrorCode::T00_INTERNAL_ERROR, "Internal error"))
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Forward a Prepare, returning fatal ledger failures as errors.
    pub async fn forward(
        &self,
        packet_id: Uuid,
        from: &PeerId,
        prepare: Prepare,
    ) -> Result<IlpResult, ForwardError> {
        let source = self.peers.get(from);
        let mut info = PacketInfo {
            id: packet_id,
            source_account_id: source.as_ref().map(|peer| peer.account_id),
            source_amount: prepare.amount(),
            destination_account_id: None,
            destination_amount: 0,
        };

        let now = SystemTime::now();
        if prepare.is_expired_at(now) {
            let expired_ms = DateTime::<Utc>::from(now)
                .signed_duration_since(DateTime::<Utc>::from(prepare.expires_at()))
                .num_milliseconds();
            debug!("Incoming packet expired {}ms ago", expired_ms);
            return Ok(self.finish_early(
                &info,
                Outcome::Expired,
                ErrorCode::R00_TRANSFER_TIMED_OUT,
                "Packet expired before it could be forwarded",
            ));
        }

        let source = match source {
            Some(source) => source,
            None => {
                warn!("Received packet from unknown peer {}", from);
                return Ok(self.finish_early(
                    &info,
                    Outcome::Rejected,
                    ErrorCode::F00_BAD_REQUEST,
                    "Unknown source peer",
                ));
            }
        };
        let source_account = match self.accountant.get_account(source.account_id).await {
            Ok(account) => account,
            Err(err) => return self.ledger_reject(&info, err),
        };

        let mut excluded: Vec<PeerId> = Vec::new();
        loop {
            let route = match self.routes.resolve_excluding(prepare.destination(), &excluded) {
                Some(route) => route,
                None => {
                    let (code, message) = match excluded.last() {
                        None => (
                            ErrorCode::F02_UNREACHABLE,
                            RoutingError::NoRoute(prepare.destination().to_string()).to_string(),
                        ),
                        Some(peer) => (
                            ErrorCode::T01_PEER_UNREACHABLE,
                            PeerError::PeerUnreachable(peer.to_string()).to_string(),
                        ),
                    };
                    debug!("{}", message);
                    return Ok(self.finish_early(&info, Outcome::Rejected, code, &message));
                }
            };
            debug!("Resolved {} via route {}", prepare.destination(), route.prefix);

            let attempt = self
                .attempt(&mut info, &source_account, &route, &prepare)
                .instrument(trace::incoming_details(&source_account))
                .await?;
            match attempt {
                Attempt::Done(result) => return Ok(result),
                Attempt::Unreachable(err) if self.peer_retry && excluded.is_empty() => {
                    debug!("{}, looking for an alternate route", err);
                    excluded.push(route.next_hop);
                }
                Attempt::Unreachable(err) => {
                    return Ok(self.finish_early(
                        &info,
                        Outcome::Rejected,
                        ErrorCode::T01_PEER_UNREACHABLE,
                        &err.to_string(),
                    ));
                }
            }
        }
    }

    /// Reserve, send to the route's next hop and settle the reply.
    async fn attempt(
        &self,
        info: &mut PacketInfo,
        source_account: &Account,
        route: &Route,
        prepare: &Prepare,
    ) -> Result<Attempt, ForwardError> {
        let next_hop = match self.peers.get(&route.next_hop) {
            Some(peer) => peer,
            None => {
                return Ok(Attempt::Unreachable(PeerError::PeerUnreachable(
                    route.next_hop.to_string(),
                )))
            }
        };
        let destination_account = match self.accountant.get_account(next_hop.account_id).await {
            Ok(account) => account,
            Err(err) => return self.ledger_reject(info, err).map(Attempt::Done),
        };
        info.destination_account_id = Some(destination_account.id);

        // Zero-amount packets don't touch the ledger
        let transfer = if prepare.amount() == 0 {
            None
        } else {
            match self
                .accountant
                .transfer_normalized(
                    info.id,
                    source_account.id,
                    destination_account.id,
                    prepare.amount(),
                )
                .await
            {
                Ok(transfer) => Some(transfer),
                Err(err) => return self.ledger_reject(info, err).map(Attempt::Done),
            }
        };
        info.destination_amount = transfer
            .as_ref()
            .map_or(0, |transfer| transfer.credit.amount);

        let span = trace::forwarding(&next_hop.id, info.destination_amount);
        let details = trace::forwarding_details(&destination_account);
        self.send_and_settle(info, &next_hop.id, transfer, prepare)
            .instrument(details)
            .instrument(span)
            .await
    }

    async fn send_and_settle(
        &self,
        info: &PacketInfo,
        next_hop: &PeerId,
        transfer: Option<Transfer>,
        prepare: &Prepare,
    ) -> Result<Attempt, ForwardError> {
        let mut outgoing = prepare.clone();
        outgoing.set_amount(info.destination_amount);

        let (interrupt, interrupted) = oneshot::channel();
        let entry = Arc::new(InFlight {
            info: info.clone(),
            expires_at: prepare.expires_at(),
            state: Mutex::new(PacketState::Prepared),
            transfer: transfer.clone(),
            interrupt: Mutex::new(Some(interrupt)),
        });
        self.in_flight.insert(info.id, entry.clone());

        let time_left = prepare
            .expires_at()
            .duration_since(SystemTime::now())
            .unwrap_or_default();
        let reply = tokio::select! {
            result = self.peers.send(next_hop, outgoing) => Reply::Peer(result),
            _ = tokio::time::sleep(time_left) => Reply::TimedOut,
            interrupt = interrupted => Reply::Interrupted(interrupt.unwrap_or(Interrupt::Expired)),
        };

        let result = self
            .settle(&entry, transfer.as_ref(), prepare, reply)
            .await;
        self.in_flight.remove(&info.id);
        if let Some(transfer) = transfer.as_ref() {
            if let Err(err) = self.accountant.finalize_transfer(transfer).await {
                warn!("Could not clean up transfer {}: {}", transfer.id, err);
            }
        }
        result
    }

    async fn settle(
        &self,
        entry: &InFlight,
        transfer: Option<&Transfer>,
        prepare: &Prepare,
        reply: Reply,
    ) -> Result<Attempt, ForwardError> {
        let info = &entry.info;
        let fulfill = match reply {
            Reply::Peer(Err(err)) => {
                if let Err(winner) = entry.try_finish(PacketState::Rejected) {
                    return Ok(Attempt::Done(Err(self.finished_reject(winner))));
                }
                warn!("Could not send packet: {}", err);
                self.release(info.id, transfer).await?;
                return Ok(Attempt::Unreachable(err));
            }
            Reply::Peer(Ok(Err(reject))) => {
                if let Err(winner) = entry.try_finish(PacketState::Rejected) {
                    debug!("Discarding reject for packet already {:?}", winner);
                    return Ok(Attempt::Done(Err(self.finished_reject(winner))));
                }
                self.release(info.id, transfer).await?;
                self.publish(info, Outcome::Rejected, Some(reject.code()));
                return Ok(Attempt::Done(Err(reject)));
            }
            Reply::TimedOut => {
                if let Err(winner) = entry.try_finish(PacketState::Expired) {
                    return Ok(Attempt::Done(Err(self.finished_reject(winner))));
                }
                error!(
                    "Outgoing request timed out (expiry was: {})",
                    DateTime::<Utc>::from(prepare.expires_at()).to_rfc3339()
                );
                self.release(info.id, transfer).await?;
                self.publish(
                    info,
                    Outcome::Expired,
                    Some(ErrorCode::R00_TRANSFER_TIMED_OUT),
                );
                return Ok(Attempt::Done(Err(self.expired_reject())));
            }
            // The interrupting side already did the bookkeeping
            Reply::Interrupted(Interrupt::Expired) => {
                return Ok(Attempt::Done(Err(self.expired_reject())))
            }
            Reply::Interrupted(Interrupt::PeerDisconnected) => {
                return Ok(Attempt::Done(Err(self.disconnected_reject())))
            }
            Reply::Peer(Ok(Ok(fulfill))) => fulfill,
        };

        if prepare.is_expired_at(SystemTime::now()) {
            debug!("Discarding fulfill that arrived after the packet expired");
            if let Err(winner) = entry.try_finish(PacketState::Expired) {
                return Ok(Attempt::Done(Err(self.finished_reject(winner))));
            }
            self.release(info.id, transfer).await?;
            self.publish(
                info,
                Outcome::Expired,
                Some(ErrorCode::R00_TRANSFER_TIMED_OUT),
            );
            return Ok(Attempt::Done(Err(self.expired_reject())));
        }

        if !condition::verify(prepare.execution_condition(), fulfill.fulfillment()) {
            warn!(target: "ilp_connector::tamper",
                packet_id = %info.id,
                "Fulfillment did not match condition. Fulfillment: {}, hash: {}, actual condition: {}",
                hex::encode(fulfill.fulfillment()),
                hex::encode(condition::derive_condition(fulfill.fulfillment())),
                hex::encode(prepare.execution_condition()),
            );
            if let Err(winner) = entry.try_finish(PacketState::Rejected) {
                return Ok(Attempt::Done(Err(self.finished_reject(winner))));
            }
            self.release(info.id, transfer).await?;
            self.publish(
                info,
                Outcome::Rejected,
                Some(ErrorCode::F09_INVALID_PEER_RESPONSE),
            );
            return Ok(Attempt::Done(Err(self.reject(
                ErrorCode::F09_INVALID_PEER_RESPONSE,
                "Fulfillment did not match condition",
            ))));
        }

        if let Err(winner) = entry.try_finish(PacketState::Fulfilled) {
            return Ok(Attempt::Done(Err(self.finished_reject(winner))));
        }
        if let Some(transfer) = transfer {
            match self.accountant.commit_transfer(transfer).await {
                Ok(()) => {}
                Err(LedgerError::AlreadyTerminal(_)) | Err(LedgerError::UnknownReservation(_)) => {
                    warn!(
                        "Transfer {} was released before its fulfillment arrived",
                        transfer.id
                    );
                    self.publish(info, Outcome::Rejected, Some(ErrorCode::T01_PEER_UNREACHABLE));
                    return Ok(Attempt::Done(Err(self.disconnected_reject())));
                }
                Err(err) => {
                    // Only a partial settlement has posted anything
                    if !matches!(err, LedgerError::PartialSettlement { .. }) {
                        if let Err(release_err) = self.release(info.id, Some(transfer)).await {
                            warn!(
                                "Could not release transfer {} after a failed commit: {}",
                                transfer.id, release_err
                            );
                        }
                    }
                    self.publish(info, Outcome::Rejected, Some(ErrorCode::T00_INTERNAL_ERROR));
                    return Err(ForwardError::Ledger {
                        packet_id: info.id,
                        source: err,
                    });
                }
            }
        }
        self.publish(info, Outcome::Fulfilled, None);
        Ok(Attempt::Done(Ok(fulfill)))
    }

    /// Roll back a transfer, tolerating one that was already released
    async fn release(&self, packet_id: Uuid, transfer: Option<&Transfer>) -> Result<(), ForwardError> {
        let transfer = match transfer {
            Some(transfer) => transfer,
            None => return Ok(()),
        };
        match self.accountant.rollback_transfer(transfer).await {
            Ok(()) => Ok(()),
            Err(LedgerError::AlreadyTerminal(_)) | Err(LedgerError::UnknownReservation(_)) => Ok(()),
            Err(err) if err.is_fatal() => Err(ForwardError::Ledger {
                packet_id,
                source: err,
            }),
            Err(err) => {
                warn!("Could not roll back transfer {}: {}", transfer.id, err);
                Ok(())
            }
        }
    }

    /// Expire every packet whose deadline has passed and that is still
    /// waiting on a reply. Returns how many were expired.
    pub async fn sweep_expired(&self) -> usize {
        let now = SystemTime::now();
        let expired: Vec<Arc<InFlight>> = self
            .in_flight
            .iter()
            .filter(|entry| entry.expires_at <= now)
            .map(|entry| entry.value().clone())
            .collect();

        let mut count = 0;
        for entry in expired {
            if entry.try_finish(PacketState::Expired).is_err() {
                continue;
            }
            count += 1;
            let info = &entry.info;
            if let Err(err) = self.release(info.id, entry.transfer.as_ref()).await {
                self.events
                    .alert(err.alert_kind(), info.id, err.to_string());
            }
            self.publish(info, Outcome::Expired, Some(ErrorCode::R00_TRANSFER_TIMED_OUT));

            if !entry.interrupt(Interrupt::Expired) {
                // Nobody is waiting on this packet any more
                self.in_flight.remove(&info.id);
                if let Some(transfer) = entry.transfer.as_ref() {
                    if let Err(err) = self.accountant.finalize_transfer(transfer).await {
                        warn!("Could not clean up transfer {}: {}", transfer.id, err);
                    }
                }
            }
        }
        if count > 0 {
            debug!("Expired {} packet(s) still waiting on a reply", count);
        }
        count
    }

    /// Reject in-flight packets whose transfers were rolled back because a
    /// peer disconnected.
    pub fn abort_released(&self, released: &[Uuid]) {
        for packet_id in released {
            let entry = match self.in_flight.get(packet_id) {
                Some(entry) => entry.value().clone(),
                None => continue,
            };
            if entry.try_finish(PacketState::Rejected).is_err() {
                continue;
            }
            self.publish(
                &entry.info,
                Outcome::Rejected,
                Some(ErrorCode::T01_PEER_UNREACHABLE),
            );
            if !entry.interrupt(Interrupt::PeerDisconnected) {
                self.in_flight.remove(packet_id);
            }
        }
    }

    /// Run `sweep_expired` every `interval` until the handle is aborted
    pub fn spawn_expiry_sweep(&self, interval: Duration) -> JoinHandle<()> {
        let forwarder = self.clone();
        let interval = interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                forwarder.sweep_expired().await;
            }
        })
    }

    fn reject(&self, code: ErrorCode, message: &str) -> Reject {
        RejectBuilder {
            code,
            message: message.as_bytes(),
            triggered_by: Some(&self.ilp_address),
            data: &[],
        }
        .build()
    }

    fn expired_reject(&self) -> Reject {
        self.reject(ErrorCode::R00_TRANSFER_TIMED_OUT, "Packet expired")
    }

    fn disconnected_reject(&self) -> Reject {
        self.reject(ErrorCode::T01_PEER_UNREACHABLE, "Peer disconnected")
    }

    /// The answer for a reply that lost the race to finish its packet, in
    /// agreement with the event the winner published
    fn finished_reject(&self, winner: PacketState) -> Reject {
        match winner {
            // Only a peer disconnect rejects a packet out from under its task
            PacketState::Rejected => self.disconnected_reject(),
            _ => self.expired_reject(),
        }
    }

    fn publish(&self, info: &PacketInfo, outcome: Outcome, code: Option<ErrorCode>) {
        self.events.publish(SettlementEvent {
            packet_id: info.id,
            source_account_id: info.source_account_id,
            destination_account_id: info.destination_account_id,
            outcome,
            source_amount: info.source_amount,
            destination_amount: info.destination_amount,
            code,
            timestamp: Utc::now(),
        });
    }

    /// Answer a packet that never entered the `Prepared` state
    fn finish_early(
        &self,
        info: &PacketInfo,
        outcome: Outcome,
        code: ErrorCode,
        message: &str,
    ) -> IlpResult {
        self.publish(info, outcome, Some(code));
        Err(self.reject(code, message))
    }

    /// Map a failed lookup or reservation to a Reject, passing fatal errors
    /// through
    fn ledger_reject(&self, info: &PacketInfo, err: LedgerError) -> Result<IlpResult, ForwardError> {
        if err.is_fatal() {
            self.publish(info, Outcome::Rejected, Some(ErrorCode::T00_INTERNAL_ERROR));
            return Err(ForwardError::Ledger {
                packet_id: info.id,
                source: err,
            });
        }
        let code = match err {
            LedgerError::InsufficientTrustline { .. } => ErrorCode::T04_INSUFFICIENT_LIQUIDITY,
            LedgerError::AmountOverflow(_) => ErrorCode::F08_AMOUNT_TOO_LARGE,
            LedgerError::SameAccounts => ErrorCode::F02_UNREACHABLE,
            _ => ErrorCode::T00_INTERNAL_ERROR,
        };
        debug!("Rejecting packet: {}", err);
        Ok(self.finish_early(info, Outcome::Rejected, code, &err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ilp_errors::{Leg, LedgerStoreError};

    fn in_flight() -> (InFlight, oneshot::Receiver<Interrupt>) {
        let (sender, receiver) = oneshot::channel();
        let entry = InFlight {
            info: PacketInfo {
                id: Uuid::new_v4(),
                source_account_id: None,
                source_amount: 10,
                destination_account_id: None,
                destination_amount: 10,
            },
            expires_at: SystemTime::now(),
            state: Mutex::new(PacketState::Prepared),
            transfer: None,
            interrupt: Mutex::new(Some(sender)),
        };
        (entry, receiver)
    }

    #[test]
    fn only_one_terminal_transition_wins() {
        let (entry, _receiver) = in_flight();
        assert_eq!(entry.try_finish(PacketState::Expired), Ok(()));
        assert_eq!(
            entry.try_finish(PacketState::Fulfilled),
            Err(PacketState::Expired)
        );
        assert_eq!(
            entry.try_finish(PacketState::Rejected),
            Err(PacketState::Expired)
        );
        assert_eq!(*entry.state.lock(), PacketState::Expired);
    }

    #[test]
    fn late_reply_reports_the_winning_transition() {
        let connector = crate::Connector::new(
            Address::new("example.connector"),
            ilp_ledger::InMemoryLedgerStore::new(),
        );
        let forwarder = connector.forwarder();

        let (entry, _receiver) = in_flight();
        assert_eq!(entry.try_finish(PacketState::Rejected), Ok(()));
        let winner = entry.try_finish(PacketState::Fulfilled).unwrap_err();
        let reject = forwarder.finished_reject(winner);
        assert_eq!(reject.code(), ErrorCode::T01_PEER_UNREACHABLE);
        assert_eq!(reject.triggered_by(), Some(&Address::new("example.connector")));

        let (entry, _receiver) = in_flight();
        assert_eq!(entry.try_finish(PacketState::Expired), Ok(()));
        let winner = entry.try_finish(PacketState::Rejected).unwrap_err();
        assert_eq!(
            forwarder.finished_reject(winner).code(),
            ErrorCode::R00_TRANSFER_TIMED_OUT
        );
    }

    #[tokio::test]
    async fn interrupt_reaches_the_waiting_task_once() {
        let (entry, receiver) = in_flight();
        assert!(entry.interrupt(Interrupt::PeerDisconnected));
        assert!(!entry.interrupt(Interrupt::Expired));
        assert_eq!(receiver.await.unwrap(), Interrupt::PeerDisconnected);

        let (entry, receiver) = in_flight();
        drop(receiver);
        assert!(!entry.interrupt(Interrupt::Expired));
    }

    #[test]
    fn alerts_distinguish_partial_settlement() {
        let partial = ForwardError::Ledger {
            packet_id: Uuid::nil(),
            source: LedgerError::PartialSettlement {
                transfer_id: Uuid::nil(),
                committed: Leg::Debit,
                failed: Leg::Credit,
                reason: "disk full".to_string(),
            },
        };
        assert_eq!(partial.alert_kind(), AlertKind::PartialSettlement);
        let storage = ForwardError::Ledger {
            packet_id: Uuid::nil(),
            source: LedgerError::Store(LedgerStoreError::MissingRecord("x".to_string())),
        };
        assert_eq!(storage.alert_kind(), AlertKind::StorageFailure);
        assert_eq!(storage.packet_id(), Uuid::nil());
    }
}
