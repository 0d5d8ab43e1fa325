//! The seam to the value-transfer network.
//!
//! The engine talks to the network through [`TransferNetwork`] only: read
//! the escrow balance, obtain a fresh transfer handle, submit a payout, and
//! poll its confirmation. [`MemoryNetwork`] is a scriptable in-process
//! double used by the engine tests; a production adapter lives behind the
//! same trait.

use std::collections::VecDeque;
use std::sync::Mutex;

use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use stakematch_types::{MatchId, PlayerId, Result, StakematchError, TransferId};

/// Opaque freshness token required to submit a transfer (a recent-block
/// reference on chain-backed networks). Handles go stale, so the engine
/// acquires one right before submitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferHandle(pub String);

/// One payout to execute against escrow.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub match_id: MatchId,
    pub recipient: PlayerId,
    pub amount: Decimal,
    pub handle: TransferHandle,
}

/// Terminal and non-terminal confirmation states of a submitted transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmStatus {
    /// Irrevocably applied.
    Confirmed,
    /// Not yet visible; poll again.
    Pending,
    /// Definitively not applied.
    Rejected(String),
}

/// Abstraction over the value-transfer network.
pub trait TransferNetwork: Send + Sync {
    /// Current spendable balance of the escrow account.
    fn escrow_balance(&self) -> Result<Decimal>;

    /// A fresh transfer handle. Transient failures here are retried by the
    /// engine with backoff.
    fn latest_handle(&self) -> Result<TransferHandle>;

    /// Submit the payout. Returns the network's signature for it.
    fn submit(&self, request: &TransferRequest) -> Result<TransferId>;

    /// Poll the confirmation state of a submitted transfer.
    fn confirm(&self, transfer_id: &TransferId) -> Result<ConfirmStatus>;
}

#[derive(Debug, Default)]
struct NetworkState {
    balance: Decimal,
    handle_counter: u64,
    /// Next N `latest_handle` calls fail.
    handle_failures: u32,
    /// Next N `submit` calls fail.
    submit_failures: u32,
    /// Next N `confirm` calls fail at the transport level.
    confirm_failures: u32,
    /// Scripted results consumed per `confirm` call; empty means Confirmed.
    confirm_script: VecDeque<ConfirmStatus>,
    submitted: Vec<TransferRequest>,
}

/// In-process [`TransferNetwork`] with scriptable failures.
///
/// Signatures are deterministic (a hash of the request), so resubmitting an
/// identical request yields the same signature, like a replayed transaction
/// would.
#[derive(Debug, Default)]
pub struct MemoryNetwork {
    state: Mutex<NetworkState>,
}

impl MemoryNetwork {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_balance(balance: Decimal) -> Self {
        let net = Self::new();
        net.set_balance(balance);
        net
    }

    pub fn set_balance(&self, balance: Decimal) {
        self.state().balance = balance;
    }

    /// Script the next `n` handle acquisitions to fail.
    pub fn fail_handles(&self, n: u32) {
        self.state().handle_failures = n;
    }

    /// Script the next `n` submits to fail.
    pub fn fail_submits(&self, n: u32) {
        self.state().submit_failures = n;
    }

    /// Script the next `n` confirmation polls to fail at the transport
    /// level (as opposed to returning a scripted status).
    pub fn fail_confirms(&self, n: u32) {
        self.state().confirm_failures = n;
    }

    /// Script upcoming `confirm` results, consumed one per call. Once the
    /// script runs out, confirmations succeed.
    pub fn script_confirmations(&self, script: impl IntoIterator<Item = ConfirmStatus>) {
        self.state().confirm_script = script.into_iter().collect();
    }

    /// Requests accepted by `submit`, in order.
    #[must_use]
    pub fn submitted(&self) -> Vec<TransferRequest> {
        self.state().submitted.clone()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, NetworkState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn signature_for(request: &TransferRequest) -> TransferId {
        let mut hasher = Sha256::new();
        hasher.update(request.match_id.to_string().as_bytes());
        hasher.update(request.recipient.as_str().as_bytes());
        hasher.update(request.amount.to_string().as_bytes());
        hasher.update(request.handle.0.as_bytes());
        TransferId::new(hex::encode(hasher.finalize()))
    }
}

impl TransferNetwork for MemoryNetwork {
    fn escrow_balance(&self) -> Result<Decimal> {
        Ok(self.state().balance)
    }

    fn latest_handle(&self) -> Result<TransferHandle> {
        let mut state = self.state();
        if state.handle_failures > 0 {
            state.handle_failures -= 1;
            return Err(StakematchError::NetworkUnavailable {
                attempts: 1,
                reason: "handle endpoint unreachable".to_string(),
            });
        }
        state.handle_counter += 1;
        Ok(TransferHandle(format!("handle-{}", state.handle_counter)))
    }

    fn submit(&self, request: &TransferRequest) -> Result<TransferId> {
        let mut state = self.state();
        if state.submit_failures > 0 {
            state.submit_failures -= 1;
            return Err(StakematchError::NetworkUnavailable {
                attempts: 1,
                reason: "submit endpoint unreachable".to_string(),
            });
        }
        if state.balance < request.amount {
            return Err(StakematchError::InsufficientEscrow {
                needed: request.amount,
                available: state.balance,
            });
        }
        state.balance -= request.amount;
        state.submitted.push(request.clone());
        Ok(Self::signature_for(request))
    }

    fn confirm(&self, _transfer_id: &TransferId) -> Result<ConfirmStatus> {
        let mut state = self.state();
        if state.confirm_failures > 0 {
            state.confirm_failures -= 1;
            return Err(StakematchError::NetworkUnavailable {
                attempts: 1,
                reason: "confirm endpoint unreachable".to_string(),
            });
        }
        Ok(state
            .confirm_script
            .pop_front()
            .unwrap_or(ConfirmStatus::Confirmed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(net: &MemoryNetwork) -> TransferRequest {
        TransferRequest {
            match_id: MatchId::new(),
            recipient: PlayerId::new("winner"),
            amount: Decimal::ONE,
            handle: net.latest_handle().unwrap(),
        }
    }

    #[test]
    fn submit_debits_escrow_and_records() {
        let net = MemoryNetwork::with_balance(Decimal::TEN);
        let req = request(&net);
        let sig = net.submit(&req).unwrap();
        assert_eq!(sig.as_str().len(), 64);
        assert_eq!(net.escrow_balance().unwrap(), Decimal::new(9, 0));
        assert_eq!(net.submitted(), vec![req]);
    }

    #[test]
    fn identical_request_yields_identical_signature() {
        let net = MemoryNetwork::with_balance(Decimal::TEN);
        let req = request(&net);
        let a = net.submit(&req).unwrap();
        let b = net.submit(&req).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn scripted_handle_failures_then_recovery() {
        let net = MemoryNetwork::with_balance(Decimal::TEN);
        net.fail_handles(2);
        assert!(net.latest_handle().is_err());
        assert!(net.latest_handle().is_err());
        assert!(net.latest_handle().is_ok());
    }

    #[test]
    fn underfunded_submit_reports_balances() {
        let net = MemoryNetwork::with_balance(Decimal::ONE);
        let mut req = request(&net);
        req.amount = Decimal::TEN;
        let err = net.submit(&req).unwrap_err();
        let StakematchError::InsufficientEscrow { needed, available } = err else {
            panic!("expected InsufficientEscrow, got {err}");
        };
        assert_eq!(needed, Decimal::TEN);
        assert_eq!(available, Decimal::ONE);
    }

    #[test]
    fn scripted_confirm_failures_then_recovery() {
        let net = MemoryNetwork::new();
        net.fail_confirms(1);
        let id = TransferId::new("sig");
        assert!(net.confirm(&id).is_err());
        assert_eq!(net.confirm(&id).unwrap(), ConfirmStatus::Confirmed);
    }

    #[test]
    fn confirm_script_consumed_in_order() {
        let net = MemoryNetwork::new();
        net.script_confirmations([
            ConfirmStatus::Pending,
            ConfirmStatus::Rejected("simulated".to_string()),
        ]);
        let id = TransferId::new("sig");
        assert_eq!(net.confirm(&id).unwrap(), ConfirmStatus::Pending);
        assert!(matches!(
            net.confirm(&id).unwrap(),
            ConfirmStatus::Rejected(_)
        ));
        // Script exhausted; confirmations succeed from here on.
        assert_eq!(net.confirm(&id).unwrap(), ConfirmStatus::Confirmed);
    }
}
