//! Remote transaction dispatcher: submits interchain account transactions,
//! persists their callback envelopes and routes terminal packet states back
//! to the typed handlers.

use crate::{
  CallbackData, Config, DepositRecords, EpochUnbondingRecords, Error, Event, HostZones,
  LOG_TARGET, LsmTokenDeposits, ModuleParams, Pallet, TradeRoutes,
  adapters::{IcaController, IcaLifecycleHooks},
  types::*,
};
use alloc::vec::Vec;
use frame::prelude::*;
use polkadot_sdk::frame_support::storage::with_storage_layer;
use primitives::{EpochIdentifier, IcaAccountType, IcaOwner, host_zone_owner, parse_owner};

impl<T: Config> Pallet<T> {
  /// Absolute deadline for an outbound ICA transaction: the next stride epoch
  /// boundary, but never closer than `ica_timeout_nanos` from now.
  pub(crate) fn ica_timeout() -> Result<u64, DispatchError> {
    Self::ica_timeout_at(EpochIdentifier::StrideEpoch)
  }

  /// Same as [`Self::ica_timeout`] against the boundary of `identifier`.
  pub(crate) fn ica_timeout_at(identifier: EpochIdentifier) -> Result<u64, DispatchError> {
    let tracker = Self::get_epoch_tracker(identifier)?;
    let floor = Self::now_nanos().saturating_add(ModuleParams::<T>::get().ica_timeout_nanos);
    Ok(tracker.next_epoch_start_time.max(floor))
  }

  /// Address of one of the zone's interchain accounts.
  pub(crate) fn host_ica_address(
    host_zone: &HostZone<T::AccountId>,
    role: IcaAccountType,
  ) -> Result<Text, DispatchError> {
    host_zone
      .ica_address(role)
      .cloned()
      .ok_or_else(|| Error::<T>::IcaAccountNotFound.into())
  }

  /// Schedules one transaction for `owner`. The envelope is persisted only
  /// when a callback is requested.
  pub(crate) fn submit_ica_tx(
    chain_id: &Text,
    connection_id: &[u8],
    owner: &[u8],
    msgs: Vec<RemoteMsg>,
    timeout_timestamp: u64,
    callback: Option<(IcaCallbackId, Vec<u8>)>,
  ) -> Result<PacketId, DispatchError> {
    ensure!(!msgs.is_empty(), Error::<T>::IcaTxFailed);
    let message_count = msgs.len() as u32;
    let packet = T::IcaController::send_tx(connection_id, owner, msgs, timeout_timestamp)
      .map_err(|e| {
        log::error!(target: LOG_TARGET, "ica tx for {:?} rejected: {:?}", owner, e);
        Error::<T>::IcaTxFailed
      })?;

    let callback_id = match callback {
      Some((callback_id, args)) => {
        Self::store_callback(&packet, callback_id, args)?;
        Some(callback_id)
      }
      None => None,
    };

    Self::deposit_event(Event::TxSubmitted {
      chain_id: chain_id.clone(),
      packet: packet.clone(),
      callback_id,
      message_count,
    });
    Ok(packet)
  }

  /// Submits on behalf of one of the zone's own accounts.
  pub(crate) fn submit_host_tx(
    host_zone: &HostZone<T::AccountId>,
    role: IcaAccountType,
    msgs: Vec<RemoteMsg>,
    timeout_timestamp: u64,
    callback: Option<(IcaCallbackId, Vec<u8>)>,
  ) -> Result<PacketId, DispatchError> {
    Self::host_ica_address(host_zone, role)?;
    Self::submit_ica_tx(
      &host_zone.chain_id,
      &host_zone.connection_id,
      &host_zone_owner(&host_zone.chain_id, role),
      msgs,
      timeout_timestamp,
      callback,
    )
  }

  pub(crate) fn store_callback(
    packet: &PacketId,
    callback_id: IcaCallbackId,
    args: Vec<u8>,
  ) -> DispatchResult {
    let args = CallbackArgs::try_from(args).map_err(|_| Error::<T>::MarshalFailure)?;
    CallbackData::<T>::insert(
      (packet.port_id.clone(), packet.channel_id.clone()),
      packet.sequence,
      CallbackEnvelope { callback_id, args },
    );
    Ok(())
  }

  pub(crate) fn decode_args<P: Decode>(raw: &[u8]) -> Result<P, DispatchError> {
    P::decode(&mut &raw[..]).map_err(|_| Error::<T>::UnmarshalFailure.into())
  }

  fn dispatch_ica_callback(
    packet: &PacketId,
    envelope: &CallbackEnvelope,
    status: AckStatus,
  ) -> DispatchResult {
    let args = envelope.args.as_slice();
    match envelope.callback_id {
      IcaCallbackId::Transfer => Self::transfer_callback(Self::decode_args(args)?, status),
      IcaCallbackId::Delegate => Self::delegate_callback(Self::decode_args(args)?, status),
      IcaCallbackId::Reinvest => Self::reinvest_callback(Self::decode_args(args)?, status),
      IcaCallbackId::Undelegate => Self::undelegate_callback(Self::decode_args(args)?, status),
      IcaCallbackId::Redemption => Self::redemption_callback(Self::decode_args(args)?, status),
      IcaCallbackId::Claim => Self::claim_callback(Self::decode_args(args)?, status),
      IcaCallbackId::Rebalance => Self::rebalance_callback(Self::decode_args(args)?, status),
      IcaCallbackId::LsmTransfer => Self::lsm_transfer_callback(Self::decode_args(args)?, status),
      IcaCallbackId::Detokenize => Self::detokenize_callback(Self::decode_args(args)?, status),
      IcaCallbackId::TradeReward => {
        Self::trade_reward_callback(Self::decode_args(args)?, packet, status)
      }
      IcaCallbackId::TradeConverted => {
        Self::trade_converted_callback(Self::decode_args(args)?, packet, status)
      }
    }
  }

  pub(crate) fn do_restore_interchain_account(
    chain_id: &[u8],
    connection_id: &[u8],
    account_owner: &[u8],
  ) -> DispatchResult {
    let mut host_zone = Self::get_host_zone(chain_id)?;
    ensure!(
      host_zone.connection_id.as_slice() == connection_id,
      Error::<T>::InvalidInterchainAccountAddress
    );
    let role = match parse_owner(account_owner) {
      Some(IcaOwner::HostZone {
        chain_id: owner_chain,
        role,
      }) if owner_chain == chain_id => role,
      _ => return Err(Error::<T>::InvalidInterchainAccountAddress.into()),
    };
    ensure!(
      host_zone.ica_address(role).is_some(),
      Error::<T>::InvalidInterchainAccountAddress
    );
    T::IcaController::register_account(connection_id, account_owner)
      .map_err(|_| Error::<T>::IcaAccountNotFound)?;

    if role == IcaAccountType::Delegation {
      Self::revert_in_flight_delegation_work(&mut host_zone)?;
    }

    Self::deposit_event(Event::InterchainAccountRestored {
      chain_id: host_zone.chain_id,
      owner: Self::text(account_owner)?,
    });
    Ok(())
  }

  /// Puts every step that was waiting on the delegation account back in its queue.
  fn revert_in_flight_delegation_work(host_zone: &mut HostZone<T::AccountId>) -> DispatchResult {
    let chain_id = host_zone.chain_id.clone();
    for validator in host_zone.validators.iter_mut() {
      validator.delegation_changes_in_progress = 0;
    }
    HostZones::<T>::insert(&chain_id, &*host_zone);

    for record in Self::deposit_records_for_zone(&chain_id) {
      if record.status == DepositRecordStatus::DelegationInProgress {
        DepositRecords::<T>::mutate(record.id, |maybe| {
          if let Some(record) = maybe {
            record.status = DepositRecordStatus::DelegationQueue;
            record.delegation_txs_in_progress = 0;
          }
        });
      }
    }

    for (epoch, unbonding) in Self::host_zone_unbondings_for_zone(&chain_id) {
      let reverted = match unbonding.status {
        HostZoneUnbondingStatus::UnbondingInProgress => HostZoneUnbondingStatus::UnbondingQueue,
        HostZoneUnbondingStatus::ExitTransferInProgress => {
          HostZoneUnbondingStatus::ExitTransferQueue
        }
        _ => continue,
      };
      EpochUnbondingRecords::<T>::mutate(epoch, &chain_id, |maybe| {
        if let Some(unbonding) = maybe {
          unbonding.status = reverted;
          unbonding.undelegation_txs_in_progress = 0;
        }
      });
    }

    for deposit in
      Self::lsm_deposits_with_status(&chain_id, LsmDepositStatus::DetokenizationInProgress)
    {
      LsmTokenDeposits::<T>::mutate(&chain_id, &deposit.denom, |maybe| {
        if let Some(deposit) = maybe {
          deposit.status = LsmDepositStatus::DetokenizationQueue;
        }
      });
    }

    log::info!(
      target: LOG_TARGET,
      "reverted in-flight delegation work on {:?}",
      core::str::from_utf8(&chain_id).unwrap_or_default(),
    );
    Ok(())
  }

  fn set_trade_route_ica_address(
    chain_id: &[u8],
    connection_id: &[u8],
    route_id: &[u8],
    role: IcaAccountType,
    address: &Text,
  ) -> bool {
    let mut matched = false;
    for (reward_denom, host_denom, mut route) in TradeRoutes::<T>::iter() {
      if route.route_id() != route_id {
        continue;
      }
      let account = match role {
        IcaAccountType::ConverterUnwind => &mut route.reward_account,
        IcaAccountType::ConverterTrade => &mut route.trade_account,
        _ => continue,
      };
      if account.chain_id.as_slice() != chain_id || account.connection_id.as_slice() != connection_id
      {
        continue;
      }
      account.address = Some(address.clone());
      TradeRoutes::<T>::insert(reward_denom, host_denom, route);
      matched = true;
    }
    matched
  }

  fn set_routes_host_account(chain_id: &[u8], address: &Text) {
    for (reward_denom, host_denom, mut route) in TradeRoutes::<T>::iter() {
      if route.host_account.chain_id.as_slice() == chain_id {
        route.host_account.address = Some(address.clone());
        TradeRoutes::<T>::insert(reward_denom, host_denom, route);
      }
    }
  }
}

impl<T: Config> IcaLifecycleHooks for Pallet<T> {
  fn on_channel_open_ack(connection_id: &[u8], owner: &[u8], address: &[u8]) -> DispatchResult {
    let address = Self::text(address)?;
    ensure!(!address.is_empty(), Error::<T>::InvalidInterchainAccountAddress);
    match parse_owner(owner).ok_or(Error::<T>::InvalidInterchainAccountAddress)? {
      IcaOwner::HostZone { chain_id, role } => {
        let mut host_zone = Self::get_host_zone(&chain_id)?;
        ensure!(
          host_zone.connection_id.as_slice() == connection_id,
          Error::<T>::InvalidInterchainAccountAddress
        );
        Self::set_host_zone_ica_address(&mut host_zone, role, address.clone());
        HostZones::<T>::insert(&host_zone.chain_id, &host_zone);
        if role == IcaAccountType::Withdrawal {
          Self::set_routes_host_account(&chain_id, &address);
        }
      }
      IcaOwner::TradeRoute {
        chain_id,
        route_id,
        role,
      } => {
        ensure!(
          Self::set_trade_route_ica_address(&chain_id, connection_id, &route_id, role, &address),
          Error::<T>::TradeRouteNotFound
        );
      }
    }
    Self::deposit_event(Event::IcaAccountRegistered {
      owner: Self::text(owner)?,
      address,
    });
    Ok(())
  }

  fn on_packet_outcome(packet: PacketId, status: AckStatus) {
    let key = (packet.port_id.clone(), packet.channel_id.clone());
    let Some(envelope) = CallbackData::<T>::take(&key, packet.sequence) else {
      return;
    };
    let result = with_storage_layer(|| Self::dispatch_ica_callback(&packet, &envelope, status));
    if let Err(e) = result {
      log::error!(
        target: LOG_TARGET,
        "{:?} callback for packet {} on {:?} failed: {:?}",
        envelope.callback_id,
        packet.sequence,
        core::str::from_utf8(&packet.channel_id).unwrap_or_default(),
        e,
      );
    }
  }
}
