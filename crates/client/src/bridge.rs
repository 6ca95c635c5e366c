// Bridge client: one call, at most two hops.
//
//   DISPATCHED(direct) -> FAILED_TRANSPORT | GOT_RESULT
//   GOT_RESULT         -> FINAL | RELAY_REQUESTED
//   RELAY_REQUESTED    -> DISPATCHED(relay) -> FAILED_TRANSPORT | FINAL
//
// Every path ends in a `BridgeResult`; expected failures are never `Err`.

use std::time::Instant;

use serde_json::Value;
use sheetbridge_common::protocol::bridge::{
    BridgeResult, ErrorInfo, ExecutionMode, RelayHint, NO_RESULT, RELAY_FAILED,
};
use sheetbridge_common::protocol::jsonrpc::{Request, Response};
use sheetbridge_common::protocol::rpc_methods::OperationKind;
use sheetbridge_common::types::{Operation, RangeValues, SessionLocator};
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::transport::{
    build_http_client, DirectTransport, HttpDirectTransport, HttpRelayTransport, RelayTransport,
    TransportError,
};

/// Stateless, reentrant client for spreadsheet operations.
///
/// Holds only its two transports, so concurrent calls share nothing but the
/// underlying HTTP connection pool.
#[derive(Debug, Clone)]
pub struct BridgeClient<D = HttpDirectTransport, R = HttpRelayTransport> {
    direct: D,
    relay: R,
}

impl BridgeClient {
    /// Build HTTP transports for both channels from configuration.
    pub fn from_config(config: &BridgeConfig) -> Result<Self, TransportError> {
        let http = build_http_client(config.http_timeout)?;
        Ok(Self::new(
            HttpDirectTransport::new(http.clone(), config.rpc_url.clone()),
            HttpRelayTransport::new(http, config.app_origin.clone()),
        ))
    }
}

impl<D, R> BridgeClient<D, R>
where
    D: DirectTransport,
    R: RelayTransport,
{
    pub fn new(direct: D, relay: R) -> Self {
        Self { direct, relay }
    }

    pub fn direct(&self) -> &D {
        &self.direct
    }

    pub fn relay(&self) -> &R {
        &self.relay
    }

    pub async fn get_range(&self, address: impl Into<String>, locator: &SessionLocator) -> BridgeResult {
        self.execute(&Operation::get_range(address), locator).await
    }

    pub async fn set_range(
        &self,
        address: impl Into<String>,
        values: impl Into<RangeValues>,
        locator: &SessionLocator,
    ) -> BridgeResult {
        self.execute(&Operation::set_range(address, values.into()), locator).await
    }

    pub async fn append_row(
        &self,
        table_name: impl Into<String>,
        values: Vec<Value>,
        locator: &SessionLocator,
    ) -> BridgeResult {
        self.execute(&Operation::append_row(table_name, values), locator).await
    }

    /// Run one operation against the session named by `locator`.
    ///
    /// The returned `ms` covers the whole call, relay hop included.
    pub async fn execute(&self, operation: &Operation, locator: &SessionLocator) -> BridgeResult {
        let started_at = Instant::now();
        let kind = operation.kind();
        let request = Request::with_fresh_id(kind.rpc_method(), operation.params(locator));

        debug!(
            id = %request.id,
            method = %request.method,
            workbook_id = locator.workbook_id.as_deref(),
            session_id = locator.session_id.as_deref(),
            "dispatching bridge call"
        );

        let response = match self.direct.call(&request).await {
            Ok(response) => response,
            Err(error) => {
                warn!(id = %request.id, method = %request.method, error = %error_text(&error), "direct transport failed");
                return BridgeResult::no_result().with_elapsed(started_at.elapsed());
            }
        };

        let result = match decode_result(&request, response) {
            Ok(result) => result,
            Err(failure) => return failure.with_elapsed(started_at.elapsed()),
        };

        let Some(hint) = result.relay_hint() else {
            let result = result.with_elapsed(started_at.elapsed());
            info!(
                id = %request.id,
                method = %request.method,
                mode = %result.mode,
                ok = result.ok,
                elapsed_ms = result.ms,
                "bridge call completed"
            );
            return result;
        };

        debug!(id = %request.id, hint = hint.as_str(), mode = %result.mode, "relay requested");
        let outcome = self.relay_once(&request, kind, hint, result.mode).await;
        let outcome = outcome.with_elapsed(started_at.elapsed());
        info!(
            id = %request.id,
            method = %request.method,
            mode = %outcome.mode,
            ok = outcome.ok,
            relayed = true,
            elapsed_ms = outcome.ms,
            "bridge call completed"
        );
        outcome
    }

    // Single hop: the relay body is data, never re-inspected for a hint.
    async fn relay_once(
        &self,
        request: &Request,
        kind: OperationKind,
        hint: RelayHint,
        mode: ExecutionMode,
    ) -> BridgeResult {
        match hint {
            RelayHint::OfficeJsClient => match self.relay.relay(kind, &request.params).await {
                Ok(data) => BridgeResult::success(mode, data),
                Err(error) => {
                    warn!(id = %request.id, operation = %kind, error = %error_text(&error), "relay transport failed");
                    BridgeResult::failure(mode, ErrorInfo::new(RELAY_FAILED).with_details(error.details()))
                }
            },
        }
    }
}

fn decode_result(request: &Request, response: Response) -> Result<BridgeResult, BridgeResult> {
    let Some(raw) = response.result else {
        let mut failure = BridgeResult::no_result();
        if let Some(rpc_error) = response.error {
            warn!(id = %request.id, code = rpc_error.code, message = %rpc_error.message, "direct call returned json-rpc error");
            let details = serde_json::to_value(&rpc_error).unwrap_or(Value::Null);
            failure.error = Some(ErrorInfo::new(NO_RESULT).with_details(details));
        } else {
            warn!(id = %request.id, "direct call response missing `result` field");
        }
        return Err(failure);
    };

    serde_json::from_value::<BridgeResult>(raw).map_err(|error| {
        warn!(id = %request.id, %error, "direct call returned a malformed result");
        BridgeResult::no_result()
    })
}

fn error_text(error: &TransportError) -> String {
    let details = error.details();
    details
        .get("reason")
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| format!("{error}: {details}"))
}
