use ilp_ledger::Account;
use ilp_packet::{IlpResult, Prepare};
use ilp_router::PeerId;
use tracing::{debug_span, error_span, info, Span};
use uuid::Uuid;

/// Minimal context for the ERROR level
pub(crate) fn incoming(packet_id: Uuid, prepare: &Prepare, from: &PeerId) -> Span {
    error_span!(target: "ilp-connector",
        "incoming",
        request.id = %packet_id,
        prepare.destination = %prepare.destination(),
        prepare.amount = prepare.amount(),
        from.id = %from,
    )
}

/// Account details can be looked up by id, so only print them when debugging
pub(crate) fn incoming_details(account: &Account) -> Span {
    debug_span!(target: "ilp-connector",
        "",
        from.account_id = %account.id,
        from.asset_code = %account.asset_code,
        from.asset_scale = account.asset_scale,
    )
}

/// Nested inside the incoming span, so only the outgoing side is included
pub(crate) fn forwarding(to: &PeerId, amount: u64) -> Span {
    error_span!(target: "ilp-connector",
        "forwarding",
        to.id = %to,
        prepare.amount = amount,
    )
}

pub(crate) fn forwarding_details(account: &Account) -> Span {
    debug_span!(target: "ilp-connector",
        "",
        to.account_id = %account.id,
        to.asset_code = %account.asset_code,
        to.asset_scale = account.asset_scale,
    )
}

/// Log whether the response was a Fulfill or Reject
pub(crate) fn response(result: IlpResult) -> IlpResult {
    match result {
        Ok(ref fulfill) => {
            debug_span!(target: "ilp-connector", "", fulfillment = %hex::encode(fulfill.fulfillment()))
                .in_scope(|| {
                    info!(target: "ilp-connector", result = "fulfill");
                })
        }
        Err(ref reject) => info!(target: "ilp-connector",
            result = "reject",
            reject.code = %reject.code(),
            reject.message = %String::from_utf8_lossy(reject.message()),
            reject.triggered_by = %reject
                .triggered_by()
                .map(|address| address.to_string())
                .unwrap_or_default(),
        ),
    };
    result
}
