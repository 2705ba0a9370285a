//! Unbonding pipeline: redemptions are batched per day epoch, undelegated on
//! the zone's unbonding cadence, swept to the redemption account once mature
//! and finally claimed by their receivers.

use crate::{
  Config, EpochUnbondingRecords, Error, Event, HostZones, LOG_TARGET, Pallet,
  UserRedemptionRecords, adapters::TokenOps, types::*,
};
use alloc::{vec, vec::Vec};
use frame::prelude::*;
use polkadot_sdk::sp_runtime::{FixedPointNumber, FixedU128};
use primitives::{EpochIdentifier, IcaAccountType, params};

/// Room a validator has to undelegate before it drops below its
/// post-unbonding target.
struct UnbondCapacity {
  address: Text,
  capacity: u128,
  current: u128,
  balanced: u128,
}

impl UnbondCapacity {
  fn balance_ratio(&self) -> FixedU128 {
    FixedU128::saturating_from_rational(self.balanced, self.current)
  }
}

impl<T: Config> Pallet<T> {
  pub(crate) fn do_redeem_stake(
    redeemer: T::AccountId,
    chain_id: &[u8],
    st_amount: u128,
    receiver: &[u8],
  ) -> DispatchResult {
    ensure!(st_amount > 0, Error::<T>::InvalidAmount);
    let host_zone = Self::get_host_zone(chain_id)?;
    ensure!(!host_zone.halted, Error::<T>::HaltedHostZone);
    ensure!(host_zone.redemptions_enabled, Error::<T>::RedemptionsDisabled);
    ensure!(
      Self::is_host_address(&host_zone, receiver),
      Error::<T>::InvalidReceiverAddress
    );

    let native_amount =
      st_to_native(st_amount, host_zone.redemption_rate).ok_or(Error::<T>::ArithmeticOverflow)?;
    ensure!(native_amount > 0, Error::<T>::InvalidAmount);
    ensure!(
      native_amount <= host_zone.total_delegations,
      Error::<T>::InvalidAmount
    );
    let st_denom = host_zone.st_denom();
    ensure!(
      T::Tokens::balance(&redeemer, &st_denom) >= st_amount,
      Error::<T>::InsufficientFunds
    );

    let epoch_number = Self::get_epoch_tracker(EpochIdentifier::Day)?.epoch_number;
    let mut unbonding = Self::get_host_zone_unbonding(epoch_number, &host_zone.chain_id)?;
    ensure!(
      unbonding.status == HostZoneUnbondingStatus::UnbondingQueue,
      Error::<T>::InvalidRecordStatus
    );

    let receiver = Self::text(receiver)?;
    let record_id = Self::user_redemption_record_id(&host_zone.chain_id, epoch_number, &receiver)?;
    let record = match UserRedemptionRecords::<T>::get(&record_id) {
      Some(mut record) => {
        record.native_token_amount = record
          .native_token_amount
          .checked_add(native_amount)
          .ok_or(Error::<T>::ArithmeticOverflow)?;
        record.st_token_amount = record
          .st_token_amount
          .checked_add(st_amount)
          .ok_or(Error::<T>::ArithmeticOverflow)?;
        record
      }
      None => UserRedemptionRecord {
        id: record_id.clone(),
        receiver: receiver.clone(),
        native_token_amount: native_amount,
        st_token_amount: st_amount,
        denom: host_zone.host_denom.clone(),
        host_zone_id: host_zone.chain_id.clone(),
        epoch_number,
        claim_is_pending: false,
      },
    };

    unbonding.native_token_amount = unbonding
      .native_token_amount
      .checked_add(native_amount)
      .ok_or(Error::<T>::ArithmeticOverflow)?;
    unbonding.native_tokens_to_unbond = unbonding
      .native_tokens_to_unbond
      .checked_add(native_amount)
      .ok_or(Error::<T>::ArithmeticOverflow)?;
    unbonding.st_token_amount = unbonding
      .st_token_amount
      .checked_add(st_amount)
      .ok_or(Error::<T>::ArithmeticOverflow)?;
    if !unbonding.user_redemption_records.contains(&record_id) {
      unbonding
        .user_redemption_records
        .try_push(record_id.clone())
        .map_err(|_| Error::<T>::TooManyRedemptions)?;
    }

    T::Tokens::transfer(&redeemer, &host_zone.deposit_address, &st_denom, st_amount)?;
    UserRedemptionRecords::<T>::insert(&record_id, &record);
    EpochUnbondingRecords::<T>::insert(epoch_number, &host_zone.chain_id, &unbonding);

    Self::deposit_event(Event::RedeemStake {
      redeemer,
      chain_id: host_zone.chain_id,
      receiver,
      native_amount,
      st_amount,
    });
    Ok(())
  }

  /// `{bech32_prefix}1...`
  fn is_host_address(host_zone: &HostZone<T::AccountId>, address: &[u8]) -> bool {
    let prefix = host_zone.bech32_prefix.as_slice();
    address.len() > prefix.len() + 1
      && address.starts_with(prefix)
      && address[prefix.len()] == b'1'
  }

  pub(crate) fn create_epoch_unbonding_records(epoch_number: u64) {
    for host_zone in Self::active_host_zones() {
      Self::add_host_zone_to_epoch_unbonding_record(
        epoch_number,
        HostZoneUnbonding::new(host_zone.chain_id.clone(), host_zone.host_denom.clone()),
      );
    }
  }

  /// Undelegates the queued redemptions of every zone whose cadence lands
  /// on `day_number`.
  pub(crate) fn initiate_all_host_zone_unbondings(day_number: u64) {
    for host_zone in Self::active_host_zones() {
      if day_number % host_zone.unbonding_frequency() != 0 {
        continue;
      }
      if let Err(e) = Self::unbond_from_host_zone(host_zone) {
        log::error!(target: LOG_TARGET, "unbonding not initiated: {:?}", e);
      }
    }
  }

  /// Per-validator capacities above the post-unbonding targets, lowest
  /// balance ratio first, then largest capacity, then address.
  fn unbond_capacities(
    host_zone: &HostZone<T::AccountId>,
    total_after_unbonding: u128,
  ) -> Result<Vec<UnbondCapacity>, DispatchError> {
    let targets = Self::target_delegations(&host_zone.validators, total_after_unbonding)?;
    let mut capacities: Vec<UnbondCapacity> = host_zone
      .validators
      .iter()
      .zip(targets)
      .filter(|(validator, target)| validator.delegation > *target)
      .map(|(validator, target)| UnbondCapacity {
        address: validator.address.clone(),
        capacity: validator.delegation - target,
        current: validator.delegation,
        balanced: target,
      })
      .collect();
    capacities.sort_by(|a, b| {
      a.balance_ratio()
        .cmp(&b.balance_ratio())
        .then_with(|| b.capacity.cmp(&a.capacity))
        .then_with(|| a.address.cmp(&b.address))
    });
    Ok(capacities)
  }

  fn unbond_from_host_zone(mut host_zone: HostZone<T::AccountId>) -> DispatchResult {
    let delegation = Self::host_ica_address(&host_zone, IcaAccountType::Delegation)?;
    let queued: Vec<(u64, HostZoneUnbonding)> = Self::host_zone_unbondings_for_zone(&host_zone.chain_id)
      .into_iter()
      .filter(|(_, unbonding)| {
        unbonding.status == HostZoneUnbondingStatus::UnbondingQueue
          && unbonding.native_tokens_to_unbond > 0
      })
      .collect();
    let total_unbond = queued
      .iter()
      .try_fold(0u128, |acc, (_, unbonding)| acc.checked_add(unbonding.native_tokens_to_unbond))
      .ok_or(Error::<T>::ArithmeticOverflow)?;
    if total_unbond == 0 {
      return Ok(());
    }
    let epochs: Vec<u64> = queued.iter().map(|(epoch, _)| *epoch).collect();

    let total_after = host_zone
      .total_delegations
      .checked_sub(total_unbond)
      .ok_or(Error::<T>::InvalidAmount)?;
    let capacities = Self::unbond_capacities(&host_zone, total_after)?;

    let mut remaining = total_unbond;
    let mut splits = Vec::new();
    for capacity in &capacities {
      if remaining == 0 {
        break;
      }
      let amount = capacity.capacity.min(remaining);
      remaining -= amount;
      splits.push(SplitDelegation {
        validator: capacity.address.clone(),
        amount,
      });
    }
    ensure!(remaining == 0 && !splits.is_empty(), Error::<T>::InvalidAmount);

    for capacity in &capacities {
      if let Some(index) = host_zone.validator_index(&capacity.address) {
        host_zone.validators[index].balanced_delegation = capacity.balanced;
      }
    }

    let timeout = Self::ica_timeout_at(EpochIdentifier::Day)?;
    let batch_size = host_zone.max_messages_per_ica_tx.max(1) as usize;
    let mut batches = 0u32;
    for batch in splits.chunks(batch_size) {
      let msgs = batch
        .iter()
        .map(|split| RemoteMsg::Undelegate {
          delegator: delegation.clone(),
          validator: split.validator.clone(),
          amount: split.amount,
          denom: host_zone.host_denom.clone(),
        })
        .collect();
      let callback = UndelegateCallback {
        host_zone_id: host_zone.chain_id.clone(),
        split_undelegations: batch.to_vec(),
        epoch_unbonding_record_ids: epochs.clone(),
      };
      if let Err(e) = Self::submit_host_tx(
        &host_zone,
        IcaAccountType::Delegation,
        msgs,
        timeout,
        Some((IcaCallbackId::Undelegate, callback.encode())),
      ) {
        if batches == 0 {
          return Err(e);
        }
        log::error!(
          target: LOG_TARGET,
          "undelegation on {:?} stopped after {} batches: {:?}",
          core::str::from_utf8(&host_zone.chain_id).unwrap_or_default(),
          batches,
          e,
        );
        return Ok(());
      }
      for split in batch {
        Self::increment_delegation_changes(&mut host_zone, &split.validator)?;
      }
      batches = batches.saturating_add(1);
      HostZones::<T>::insert(&host_zone.chain_id, &host_zone);
      Self::mark_unbondings_in_progress(&host_zone.chain_id, &epochs, batches)?;
    }

    log::info!(
      target: LOG_TARGET,
      "undelegating {} on {:?} across {} validators for epochs {:?}",
      total_unbond,
      core::str::from_utf8(&host_zone.chain_id).unwrap_or_default(),
      splits.len(),
      epochs,
    );
    Ok(())
  }

  fn mark_unbondings_in_progress(chain_id: &Text, epochs: &[u64], batches: u32) -> DispatchResult {
    for epoch in epochs {
      EpochUnbondingRecords::<T>::try_mutate(epoch, chain_id, |maybe| -> DispatchResult {
        let unbonding = maybe.as_mut().ok_or(Error::<T>::RecordNotFound)?;
        unbonding.status = HostZoneUnbondingStatus::UnbondingInProgress;
        unbonding.undelegation_txs_in_progress = batches;
        Ok(())
      })?;
    }
    Ok(())
  }

  /// Applies one undelegation batch. A record leaves `UnbondingInProgress`
  /// once its last batch settled: fully unbonded records start maturing,
  /// the rest go back to the queue.
  pub(crate) fn undelegate_callback(args: UndelegateCallback, status: AckStatus) -> DispatchResult {
    let mut host_zone = Self::get_host_zone(&args.host_zone_id)?;
    for split in &args.split_undelegations {
      Self::decrement_delegation_changes(&mut host_zone, &split.validator)?;
    }

    let mut undelegated = 0u128;
    if status == AckStatus::Success {
      for split in &args.split_undelegations {
        Self::remove_delegation_from_validator(&mut host_zone, &split.validator, split.amount)?;
        undelegated = undelegated.saturating_add(split.amount);
      }
    } else {
      log::error!(
        target: LOG_TARGET,
        "undelegation on {:?} failed ({:?})",
        core::str::from_utf8(&host_zone.chain_id).unwrap_or_default(),
        status,
      );
    }
    HostZones::<T>::insert(&host_zone.chain_id, &host_zone);

    let unbonding_time = Self::now_nanos()
      .saturating_add(host_zone.unbonding_period.saturating_mul(params::NANOS_PER_DAY));
    let mut epochs = args.epoch_unbonding_record_ids.clone();
    epochs.sort_unstable();
    for epoch in epochs {
      let mut unbonding = Self::get_host_zone_unbonding(epoch, &host_zone.chain_id)?;
      let applied = unbonding.native_tokens_to_unbond.min(undelegated);
      unbonding.native_tokens_to_unbond -= applied;
      undelegated -= applied;
      unbonding.undelegation_txs_in_progress = unbonding
        .undelegation_txs_in_progress
        .checked_sub(1)
        .ok_or(Error::<T>::InvalidDelegationsInProgress)?;

      if unbonding.undelegation_txs_in_progress == 0 {
        if unbonding.native_tokens_to_unbond == 0 {
          unbonding.status = HostZoneUnbondingStatus::ExitTransferQueue;
          unbonding.unbonding_time = unbonding.unbonding_time.max(unbonding_time);
          T::Tokens::burn(
            &host_zone.deposit_address,
            &host_zone.st_denom(),
            unbonding.st_token_amount,
          )?;
        } else {
          unbonding.status = HostZoneUnbondingStatus::UnbondingQueue;
        }
      }
      EpochUnbondingRecords::<T>::insert(epoch, &host_zone.chain_id, &unbonding);
    }
    Ok(())
  }

  /// Moves matured unbondings from the delegation account to the redemption
  /// account.
  pub(crate) fn sweep_all_unbonded_tokens() {
    for host_zone in Self::active_host_zones() {
      if let Err(e) = Self::sweep_unbonded_tokens(&host_zone) {
        log::error!(target: LOG_TARGET, "sweep not submitted: {:?}", e);
      }
    }
  }

  fn sweep_unbonded_tokens(host_zone: &HostZone<T::AccountId>) -> DispatchResult {
    let now = Self::now_nanos();
    let matured: Vec<(u64, HostZoneUnbonding)> = Self::host_zone_unbondings_for_zone(&host_zone.chain_id)
      .into_iter()
      .filter(|(_, unbonding)| {
        unbonding.status == HostZoneUnbondingStatus::ExitTransferQueue
          && unbonding.unbonding_time < now
      })
      .collect();
    let total = matured
      .iter()
      .try_fold(0u128, |acc, (_, unbonding)| acc.checked_add(unbonding.native_token_amount))
      .ok_or(Error::<T>::ArithmeticOverflow)?;
    if total == 0 {
      return Ok(());
    }
    let delegation = Self::host_ica_address(host_zone, IcaAccountType::Delegation)?;
    let redemption = Self::host_ica_address(host_zone, IcaAccountType::Redemption)?;
    let epochs: Vec<u64> = matured.iter().map(|(epoch, _)| *epoch).collect();

    let msg = RemoteMsg::BankSend {
      from: delegation,
      to: redemption,
      amount: total,
      denom: host_zone.host_denom.clone(),
    };
    let callback = RedemptionCallback {
      host_zone_id: host_zone.chain_id.clone(),
      epoch_unbonding_record_ids: epochs.clone(),
    };
    Self::submit_host_tx(
      host_zone,
      IcaAccountType::Delegation,
      vec![msg],
      Self::ica_timeout_at(EpochIdentifier::Day)?,
      Some((IcaCallbackId::Redemption, callback.encode())),
    )?;
    Self::set_host_zone_unbonding_status(
      &host_zone.chain_id,
      &epochs,
      HostZoneUnbondingStatus::ExitTransferInProgress,
    )?;
    log::info!(
      target: LOG_TARGET,
      "sweeping {} matured tokens on {:?}",
      total,
      core::str::from_utf8(&host_zone.chain_id).unwrap_or_default(),
    );
    Ok(())
  }

  pub(crate) fn redemption_callback(args: RedemptionCallback, status: AckStatus) -> DispatchResult {
    if status != AckStatus::Success {
      log::error!(
        target: LOG_TARGET,
        "sweep on {:?} failed ({:?})",
        core::str::from_utf8(&args.host_zone_id).unwrap_or_default(),
        status,
      );
      return Self::set_host_zone_unbonding_status(
        &args.host_zone_id,
        &args.epoch_unbonding_record_ids,
        HostZoneUnbondingStatus::ExitTransferQueue,
      );
    }
    for epoch in &args.epoch_unbonding_record_ids {
      EpochUnbondingRecords::<T>::try_mutate(epoch, &args.host_zone_id, |maybe| -> DispatchResult {
        let unbonding = maybe.as_mut().ok_or(Error::<T>::RecordNotFound)?;
        unbonding.status = HostZoneUnbondingStatus::Claimable;
        unbonding.claimable_native_tokens = unbonding.native_token_amount;
        Ok(())
      })?;
    }
    Ok(())
  }

  pub(crate) fn do_claim_undelegated_tokens(
    chain_id: &[u8],
    epoch_number: u64,
    receiver: &[u8],
  ) -> DispatchResult {
    let host_zone = Self::get_host_zone(chain_id)?;
    let record_id = Self::user_redemption_record_id(&host_zone.chain_id, epoch_number, receiver)?;
    let mut record = Self::get_user_redemption_record(&record_id)?;
    ensure!(!record.claim_is_pending, Error::<T>::InvalidRecordStatus);
    let unbonding = Self::get_host_zone_unbonding(epoch_number, &host_zone.chain_id)?;
    ensure!(
      unbonding.status == HostZoneUnbondingStatus::Claimable,
      Error::<T>::InvalidRecordStatus
    );
    ensure!(
      unbonding.claimable_native_tokens >= record.native_token_amount,
      Error::<T>::InsufficientFunds
    );

    let redemption = Self::host_ica_address(&host_zone, IcaAccountType::Redemption)?;
    let msg = RemoteMsg::BankSend {
      from: redemption,
      to: record.receiver.clone(),
      amount: record.native_token_amount,
      denom: host_zone.host_denom.clone(),
    };
    let callback = ClaimCallback {
      user_redemption_record_id: record_id.clone(),
      chain_id: host_zone.chain_id.clone(),
      epoch_number,
    };
    Self::submit_host_tx(
      &host_zone,
      IcaAccountType::Redemption,
      vec![msg],
      Self::ica_timeout()?,
      Some((IcaCallbackId::Claim, callback.encode())),
    )?;
    record.claim_is_pending = true;
    UserRedemptionRecords::<T>::insert(&record_id, &record);

    Self::deposit_event(Event::ClaimInitiated {
      chain_id: host_zone.chain_id,
      receiver: record.receiver,
      epoch_number,
      amount: record.native_token_amount,
    });
    Ok(())
  }

  pub(crate) fn claim_callback(args: ClaimCallback, status: AckStatus) -> DispatchResult {
    let mut record = Self::get_user_redemption_record(&args.user_redemption_record_id)?;
    if status != AckStatus::Success {
      log::error!(
        target: LOG_TARGET,
        "claim {:?} failed ({:?})",
        core::str::from_utf8(&args.user_redemption_record_id).unwrap_or_default(),
        status,
      );
      record.claim_is_pending = false;
      UserRedemptionRecords::<T>::insert(&args.user_redemption_record_id, &record);
      return Ok(());
    }
    EpochUnbondingRecords::<T>::try_mutate(
      args.epoch_number,
      &args.chain_id,
      |maybe| -> DispatchResult {
        let unbonding = maybe.as_mut().ok_or(Error::<T>::RecordNotFound)?;
        unbonding.claimable_native_tokens = unbonding
          .claimable_native_tokens
          .checked_sub(record.native_token_amount)
          .ok_or(Error::<T>::InvalidAmount)?;
        Ok(())
      },
    )?;
    UserRedemptionRecords::<T>::remove(&args.user_redemption_record_id);
    Ok(())
  }

  /// Settles empty queued unbondings of past epochs and drops every epoch
  /// whose unbondings are all claimable and fully claimed.
  pub(crate) fn cleanup_epoch_unbonding_records(current_epoch: u64) {
    let empty: Vec<(u64, Text)> = EpochUnbondingRecords::<T>::iter()
      .filter(|(epoch, _, unbonding)| {
        *epoch < current_epoch
          && unbonding.status == HostZoneUnbondingStatus::UnbondingQueue
          && unbonding.native_token_amount == 0
      })
      .map(|(epoch, chain_id, _)| (epoch, chain_id))
      .collect();
    for (epoch, chain_id) in empty {
      EpochUnbondingRecords::<T>::mutate(epoch, &chain_id, |maybe| {
        if let Some(unbonding) = maybe {
          unbonding.status = HostZoneUnbondingStatus::Claimable;
        }
      });
    }

    for record in Self::list_epoch_unbonding_records() {
      let finished = record.host_zone_unbondings.iter().all(|unbonding| {
        unbonding.status == HostZoneUnbondingStatus::Claimable
          && unbonding.claimable_native_tokens == 0
      });
      if finished {
        Self::remove_epoch_unbonding_record(record.epoch_number);
        log::info!(target: LOG_TARGET, "removed epoch unbonding record {}", record.epoch_number);
      }
    }
  }
}
