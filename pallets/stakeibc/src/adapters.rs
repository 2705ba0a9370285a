//! Adapter traits for the collaborators the coordinator drives
//!
//! The local bank, the transfer and interchain-account transports, the query
//! relayer, the rate limiter and the price oracle are all runtime-specific.
//! The pallet only talks to them through these traits.

use crate::types::{AckStatus, EpochInfo, PacketId, Query, RemoteMsg};
use alloc::vec::Vec;
use frame::prelude::*;
use polkadot_sdk::sp_runtime::FixedU128;

/// Multi-denom balances on the local ledger.
///
/// Covers the wrapped host denom, the minted stTokens and bridged LSM shares.
pub trait TokenOps<AccountId> {
  fn balance(who: &AccountId, denom: &[u8]) -> u128;

  fn total_issuance(denom: &[u8]) -> u128;

  fn transfer(from: &AccountId, to: &AccountId, denom: &[u8], amount: u128) -> DispatchResult;

  fn mint(to: &AccountId, denom: &[u8], amount: u128) -> DispatchResult;

  fn burn(from: &AccountId, denom: &[u8], amount: u128) -> DispatchResult;
}

/// Resolved trace of a bridged denom.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DenomTrace {
  /// e.g. `transfer/channel-0`
  pub path: Vec<u8>,
  pub base_denom: Vec<u8>,
}

/// Token transfers from local accounts to remote ledgers.
pub trait TransferOps<AccountId> {
  /// Sends `amount` of `denom` over `source_channel`; returns the outbound packet.
  fn transfer(
    sender: &AccountId,
    source_channel: &[u8],
    denom: &[u8],
    amount: u128,
    receiver: &[u8],
    timeout_timestamp: u64,
  ) -> Result<PacketId, DispatchError>;

  fn denom_trace(ibc_denom: &[u8]) -> Option<DenomTrace>;
}

/// Controller side of the interchain-account transport.
pub trait IcaController {
  /// Opens a channel for `owner`. The address arrives later through
  /// [`IcaLifecycleHooks::on_channel_open_ack`].
  fn register_account(connection_id: &[u8], owner: &[u8]) -> DispatchResult;

  /// Schedules one remote transaction carrying `msgs`.
  fn send_tx(
    connection_id: &[u8],
    owner: &[u8],
    msgs: Vec<RemoteMsg>,
    timeout_timestamp: u64,
  ) -> Result<PacketId, DispatchError>;

  /// Chain id of the counterparty light client behind `connection_id`.
  fn counterparty_chain_id(connection_id: &[u8]) -> Option<Vec<u8>>;

  fn next_sequence_send(port_id: &[u8], channel_id: &[u8]) -> Option<u64>;
}

/// Relayer side of the interchain query transport.
pub trait IcqTransport {
  fn submit(query: &Query) -> DispatchResult;

  /// Checks `response` against a proof rooted at `proof_height` of the
  /// query's chain.
  fn verify_proof(query: &Query, response: &[u8], proof: &[u8], proof_height: u64) -> bool;
}

pub trait RateLimiter {
  fn add_denom_to_blacklist(denom: &[u8]);

  fn remove_denom_from_blacklist(denom: &[u8]);

  fn add_whitelisted_address_pair(sender: &[u8], receiver: &[u8]);
}

pub trait RedemptionRateOracle {
  fn post_redemption_rate(st_denom: &[u8], redemption_rate: FixedU128);
}

/// Entry points the transports call once an account or a packet settles.
pub trait IcaLifecycleHooks {
  fn on_channel_open_ack(connection_id: &[u8], owner: &[u8], address: &[u8]) -> DispatchResult;

  fn on_packet_outcome(packet: PacketId, status: AckStatus);
}

/// Entry point of the epoch source.
pub trait EpochHooks {
  fn on_epoch_start(epoch: EpochInfo) -> Weight;
}

impl<AccountId> TokenOps<AccountId> for () {
  fn balance(_: &AccountId, _: &[u8]) -> u128 {
    0
  }

  fn total_issuance(_: &[u8]) -> u128 {
    0
  }

  fn transfer(_: &AccountId, _: &AccountId, _: &[u8], _: u128) -> DispatchResult {
    Ok(())
  }

  fn mint(_: &AccountId, _: &[u8], _: u128) -> DispatchResult {
    Ok(())
  }

  fn burn(_: &AccountId, _: &[u8], _: u128) -> DispatchResult {
    Ok(())
  }
}

impl<AccountId> TransferOps<AccountId> for () {
  fn transfer(
    _: &AccountId,
    _: &[u8],
    _: &[u8],
    _: u128,
    _: &[u8],
    _: u64,
  ) -> Result<PacketId, DispatchError> {
    Ok(PacketId::default())
  }

  fn denom_trace(_: &[u8]) -> Option<DenomTrace> {
    None
  }
}

impl IcaController for () {
  fn register_account(_: &[u8], _: &[u8]) -> DispatchResult {
    Ok(())
  }

  fn send_tx(_: &[u8], _: &[u8], _: Vec<RemoteMsg>, _: u64) -> Result<PacketId, DispatchError> {
    Ok(PacketId::default())
  }

  fn counterparty_chain_id(_: &[u8]) -> Option<Vec<u8>> {
    None
  }

  fn next_sequence_send(_: &[u8], _: &[u8]) -> Option<u64> {
    None
  }
}

impl IcqTransport for () {
  fn submit(_: &Query) -> DispatchResult {
    Ok(())
  }

  fn verify_proof(_: &Query, _: &[u8], _: &[u8], _: u64) -> bool {
    false
  }
}

impl RateLimiter for () {
  fn add_denom_to_blacklist(_: &[u8]) {}

  fn remove_denom_from_blacklist(_: &[u8]) {}

  fn add_whitelisted_address_pair(_: &[u8], _: &[u8]) {}
}

impl RedemptionRateOracle for () {
  fn post_redemption_rate(_: &[u8], _: FixedU128) {}
}
