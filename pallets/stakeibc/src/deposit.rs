//! Deposit pipeline: liquid stake admission, transfer to the host, delegation
//! and the reinvestment of withdrawn rewards.

use crate::{
  Config, DepositRecords, Error, Event, HostZones, LOG_TARGET, ModuleParams, Pallet,
  adapters::{TokenOps, TransferOps},
  types::*,
};
use alloc::{vec, vec::Vec};
use frame::prelude::*;
use polkadot_sdk::sp_runtime::traits::Convert;
use primitives::{EpochIdentifier, IcaAccountType};

impl<T: Config> Pallet<T> {
  /// Mints stTokens for `amount` of the bridged host denom. Returns the
  /// stToken amount.
  pub(crate) fn do_liquid_stake(
    staker: T::AccountId,
    amount: u128,
    host_denom: &[u8],
  ) -> Result<u128, DispatchError> {
    ensure!(amount > 0, Error::<T>::InvalidAmount);
    let host_zone = HostZones::<T>::iter_values()
      .find(|zone| zone.host_denom.as_slice() == host_denom)
      .ok_or(Error::<T>::InvalidToken)?;
    ensure!(!host_zone.halted, Error::<T>::HaltedHostZone);
    ensure!(
      host_zone.is_redemption_rate_within_bounds(host_zone.redemption_rate),
      Error::<T>::RedemptionRateOutsideSafetyBounds
    );

    let stride_epoch = Self::get_epoch_tracker(EpochIdentifier::StrideEpoch)?;
    let mut record = Self::get_transfer_deposit_record_by_epoch_and_chain(
      stride_epoch.epoch_number,
      &host_zone.chain_id,
    )
    .ok_or(Error::<T>::RecordNotFound)?;

    let st_amount =
      native_to_st(amount, host_zone.redemption_rate).ok_or(Error::<T>::ArithmeticOverflow)?;
    ensure!(st_amount > 0, Error::<T>::InsufficientLiquidStake);
    ensure!(
      T::Tokens::balance(&staker, &host_zone.ibc_denom) >= amount,
      Error::<T>::InsufficientFunds
    );

    T::Tokens::transfer(&staker, &host_zone.deposit_address, &host_zone.ibc_denom, amount)?;
    T::Tokens::mint(&staker, &host_zone.st_denom(), st_amount)?;
    record.amount = record
      .amount
      .checked_add(amount)
      .ok_or(Error::<T>::ArithmeticOverflow)?;
    DepositRecords::<T>::insert(record.id, &record);

    Self::deposit_event(Event::LiquidStake {
      staker,
      chain_id: host_zone.chain_id,
      native_amount: amount,
      st_amount,
    });
    Ok(st_amount)
  }

  pub(crate) fn create_deposit_records_for_epoch(epoch_number: u64) {
    for host_zone in Self::active_host_zones() {
      if let Err(e) = Self::create_deposit_record(&host_zone, epoch_number) {
        log::error!(target: LOG_TARGET, "deposit record not created: {:?}", e);
      }
    }
  }

  /// Sends every queued deposit of an earlier epoch to the delegation account.
  /// Empty records of earlier epochs are dropped.
  pub(crate) fn transfer_existing_deposits_to_host_zones(epoch_number: u64) {
    let queued: Vec<DepositRecord> = DepositRecords::<T>::iter_values()
      .filter(|record| {
        record.status == DepositRecordStatus::TransferQueue
          && record.deposit_epoch_number < epoch_number
      })
      .collect();
    for record in queued {
      if record.amount == 0 {
        DepositRecords::<T>::remove(record.id);
        continue;
      }
      if let Err(e) = Self::transfer_deposit_record(record) {
        log::error!(target: LOG_TARGET, "deposit transfer not submitted: {:?}", e);
      }
    }
  }

  fn transfer_deposit_record(mut record: DepositRecord) -> DispatchResult {
    let host_zone = Self::get_host_zone(&record.host_zone_id)?;
    if host_zone.halted {
      return Ok(());
    }
    let delegation_address = Self::host_ica_address(&host_zone, IcaAccountType::Delegation)?;
    let timeout = Self::now_nanos().saturating_add(ModuleParams::<T>::get().ibc_transfer_timeout_nanos);
    let packet = T::Transfer::transfer(
      &host_zone.deposit_address,
      &host_zone.transfer_channel_id,
      &host_zone.ibc_denom,
      record.amount,
      &delegation_address,
      timeout,
    )?;
    Self::store_callback(
      &packet,
      IcaCallbackId::Transfer,
      TransferCallback {
        deposit_record_id: record.id,
      }
      .encode(),
    )?;
    record.status = DepositRecordStatus::TransferInProgress;
    DepositRecords::<T>::insert(record.id, &record);
    log::info!(
      target: LOG_TARGET,
      "transferring deposit record {} ({}) to {:?}",
      record.id,
      record.amount,
      core::str::from_utf8(&host_zone.chain_id).unwrap_or_default(),
    );
    Ok(())
  }

  pub(crate) fn transfer_callback(args: TransferCallback, status: AckStatus) -> DispatchResult {
    let mut record = Self::get_deposit_record(args.deposit_record_id)?;
    record.status = match status {
      AckStatus::Success => DepositRecordStatus::DelegationQueue,
      AckStatus::Failure | AckStatus::Timeout => DepositRecordStatus::TransferQueue,
    };
    DepositRecords::<T>::insert(record.id, &record);
    Ok(())
  }

  pub(crate) fn stake_existing_deposits_on_host_zones() {
    let queued: Vec<DepositRecord> = DepositRecords::<T>::iter_values()
      .filter(|record| {
        record.status == DepositRecordStatus::DelegationQueue
          && record.delegation_txs_in_progress == 0
      })
      .collect();
    for record in queued {
      let id = record.id;
      if let Err(e) = Self::delegate_on_host(record) {
        log::error!(target: LOG_TARGET, "delegation of record {} not submitted: {:?}", id, e);
      }
    }
  }

  /// Positive deltas between post-deposit targets and current delegations,
  /// scaled down to exactly `amount`.
  pub(crate) fn delegation_allocations(
    host_zone: &HostZone<T::AccountId>,
    amount: u128,
  ) -> Result<Vec<SplitDelegation>, DispatchError> {
    let total = host_zone
      .total_delegations
      .checked_add(amount)
      .ok_or(Error::<T>::ArithmeticOverflow)?;
    let targets = Self::target_delegations(&host_zone.validators, total)?;
    let deltas: Vec<(usize, u128)> = targets
      .iter()
      .enumerate()
      .filter_map(|(i, target)| {
        target
          .checked_sub(&host_zone.validators[i].delegation)
          .filter(|delta| *delta > 0)
          .map(|delta| (i, delta))
      })
      .collect();
    let delta_sum = deltas.iter().fold(0u128, |acc, (_, d)| acc.saturating_add(*d));
    ensure!(delta_sum > 0, Error::<T>::NoValidatorWeights);

    let mut allocations: Vec<(usize, u128)> = deltas
      .iter()
      .map(|(i, delta)| {
        mul_div_floor(*delta, amount, delta_sum)
          .map(|allocation| (*i, allocation))
          .ok_or(Error::<T>::ArithmeticOverflow)
      })
      .collect::<Result<_, _>>()?;
    let allocated = allocations.iter().fold(0u128, |acc, (_, a)| acc.saturating_add(*a));
    let remainder = amount.saturating_sub(allocated);
    if remainder > 0 {
      let largest = deltas
        .iter()
        .enumerate()
        .max_by(|(_, (ia, da)), (_, (ib, db))| {
          da.cmp(db).then_with(|| {
            host_zone.validators[*ib]
              .address
              .cmp(&host_zone.validators[*ia].address)
          })
        })
        .map(|(pos, _)| pos)
        .ok_or(Error::<T>::NoValidatorWeights)?;
      allocations[largest].1 = allocations[largest].1.saturating_add(remainder);
    }

    Ok(
      allocations
        .into_iter()
        .filter(|(_, amount)| *amount > 0)
        .map(|(i, amount)| SplitDelegation {
          validator: host_zone.validators[i].address.clone(),
          amount,
        })
        .collect(),
    )
  }

  fn delegate_on_host(mut record: DepositRecord) -> DispatchResult {
    let mut host_zone = Self::get_host_zone(&record.host_zone_id)?;
    if host_zone.halted {
      return Ok(());
    }
    let delegation_address = Self::host_ica_address(&host_zone, IcaAccountType::Delegation)?;
    let splits = Self::delegation_allocations(&host_zone, record.amount)?;
    let timeout = Self::ica_timeout()?;

    // Counters and status are stored after every sent batch.
    let batch_size = host_zone.max_messages_per_ica_tx.max(1) as usize;
    for batch in splits.chunks(batch_size) {
      let msgs = batch
        .iter()
        .map(|split| RemoteMsg::Delegate {
          delegator: delegation_address.clone(),
          validator: split.validator.clone(),
          amount: split.amount,
          denom: host_zone.host_denom.clone(),
        })
        .collect();
      let callback = DelegateCallback {
        host_zone_id: host_zone.chain_id.clone(),
        deposit_record_id: record.id,
        split_delegations: batch.to_vec(),
      };
      if let Err(e) = Self::submit_host_tx(
        &host_zone,
        IcaAccountType::Delegation,
        msgs,
        timeout,
        Some((IcaCallbackId::Delegate, callback.encode())),
      ) {
        if record.delegation_txs_in_progress == 0 {
          return Err(e);
        }
        log::error!(
          target: LOG_TARGET,
          "record {} partially delegated, {} batches in flight: {:?}",
          record.id,
          record.delegation_txs_in_progress,
          e,
        );
        return Ok(());
      }
      for split in batch {
        Self::increment_delegation_changes(&mut host_zone, &split.validator)?;
      }
      record.delegation_txs_in_progress = record.delegation_txs_in_progress.saturating_add(1);
      record.status = DepositRecordStatus::DelegationInProgress;
      DepositRecords::<T>::insert(record.id, &record);
      HostZones::<T>::insert(&host_zone.chain_id, &host_zone);
    }

    log::info!(
      target: LOG_TARGET,
      "delegating record {} ({}) across {} validators on {:?}",
      record.id,
      record.amount,
      splits.len(),
      core::str::from_utf8(&host_zone.chain_id).unwrap_or_default(),
    );
    Ok(())
  }

  pub(crate) fn delegate_callback(args: DelegateCallback, status: AckStatus) -> DispatchResult {
    let mut host_zone = Self::get_host_zone(&args.host_zone_id)?;
    let mut record = Self::get_deposit_record(args.deposit_record_id)?;
    for split in &args.split_delegations {
      Self::decrement_delegation_changes(&mut host_zone, &split.validator)?;
    }
    record.delegation_txs_in_progress = record
      .delegation_txs_in_progress
      .checked_sub(1)
      .ok_or(Error::<T>::InvalidDelegationsInProgress)?;

    if status != AckStatus::Success {
      log::error!(
        target: LOG_TARGET,
        "delegation of record {} failed ({:?})",
        record.id,
        status,
      );
      record.status = DepositRecordStatus::DelegationQueue;
      HostZones::<T>::insert(&host_zone.chain_id, &host_zone);
      DepositRecords::<T>::insert(record.id, &record);
      return Ok(());
    }

    let mut applied = 0u128;
    for split in &args.split_delegations {
      Self::add_delegation_to_validator(&mut host_zone, &split.validator, split.amount)?;
      applied = applied.saturating_add(split.amount);
    }
    HostZones::<T>::insert(&host_zone.chain_id, &host_zone);

    record.amount = record
      .amount
      .checked_sub(applied)
      .ok_or(Error::<T>::InvalidAmount)?;
    if record.delegation_txs_in_progress == 0 {
      if record.amount == 0 {
        DepositRecords::<T>::remove(record.id);
        return Ok(());
      }
      // A sibling batch failed; the undelegated rest goes back in the queue
      record.status = DepositRecordStatus::DelegationQueue;
    }
    DepositRecords::<T>::insert(record.id, &record);
    Ok(())
  }

  /// Points the delegation account's staking rewards at the withdrawal account.
  pub(crate) fn set_withdrawal_addresses() {
    for host_zone in Self::active_host_zones() {
      let (Some(delegation), Some(withdrawal)) = (
        host_zone.delegation_ica_address.clone(),
        host_zone.withdrawal_ica_address.clone(),
      ) else {
        continue;
      };
      let msg = RemoteMsg::SetWithdrawAddress {
        delegator: delegation,
        withdraw_address: withdrawal,
      };
      let result = Self::ica_timeout().and_then(|timeout| {
        Self::submit_host_tx(&host_zone, IcaAccountType::Delegation, vec![msg], timeout, None)
      });
      if let Err(e) = result {
        log::error!(target: LOG_TARGET, "withdrawal address not set: {:?}", e);
      }
    }
  }

  /// Queries the withdrawal account balance of every active zone.
  pub(crate) fn reinvest_rewards() {
    for host_zone in Self::active_host_zones() {
      if let Err(e) = Self::submit_withdrawal_balance_query(&host_zone) {
        log::warn!(target: LOG_TARGET, "withdrawal balance query skipped: {:?}", e);
      }
    }
  }

  fn submit_withdrawal_balance_query(host_zone: &HostZone<T::AccountId>) -> DispatchResult {
    let withdrawal = Self::host_ica_address(host_zone, IcaAccountType::Withdrawal)?;
    let tracker = Self::get_epoch_tracker(EpochIdentifier::StrideEpoch)?;
    let timeout_duration = tracker.next_epoch_start_time.saturating_sub(Self::now_nanos());
    Self::submit_icq(
      &host_zone.chain_id,
      &host_zone.connection_id,
      QueryRequest::Balance {
        address: withdrawal,
        denom: host_zone.host_denom.clone(),
      },
      IcqCallbackId::WithdrawalBalance,
      Vec::new(),
      timeout_duration,
      TimeoutPolicy::Reject,
    )
    .map(|_| ())
  }

  /// Splits the withdrawal balance into the commission for the fee account and
  /// the reinvestment for the delegation account.
  pub(crate) fn withdrawal_balance_callback(query: &Query, response: &[u8]) -> DispatchResult {
    let host_zone = Self::get_host_zone(&query.chain_id)?;
    let balance = Self::decode_balance(response)?;
    if balance == 0 {
      return Ok(());
    }
    let withdrawal = Self::host_ica_address(&host_zone, IcaAccountType::Withdrawal)?;
    let delegation = Self::host_ica_address(&host_zone, IcaAccountType::Delegation)?;
    let fee = Self::host_ica_address(&host_zone, IcaAccountType::Fee)?;

    let commission = ModuleParams::<T>::get().stride_commission;
    ensure!(commission <= 100, Error::<T>::InvalidParams);
    let fee_amount =
      mul_div_floor(balance, commission as u128, 100).ok_or(Error::<T>::ArithmeticOverflow)?;
    let reinvest_amount = balance.saturating_sub(fee_amount);

    let mut msgs = Vec::with_capacity(2);
    if fee_amount > 0 {
      msgs.push(RemoteMsg::BankSend {
        from: withdrawal.clone(),
        to: fee,
        amount: fee_amount,
        denom: host_zone.host_denom.clone(),
      });
    }
    if reinvest_amount > 0 {
      msgs.push(RemoteMsg::BankSend {
        from: withdrawal,
        to: delegation,
        amount: reinvest_amount,
        denom: host_zone.host_denom.clone(),
      });
    }
    let callback = ReinvestCallback {
      host_zone_id: host_zone.chain_id.clone(),
      reinvest_amount,
      denom: host_zone.host_denom.clone(),
    };
    Self::submit_host_tx(
      &host_zone,
      IcaAccountType::Withdrawal,
      msgs,
      Self::ica_timeout()?,
      Some((IcaCallbackId::Reinvest, callback.encode())),
    )?;
    Ok(())
  }

  pub(crate) fn reinvest_callback(args: ReinvestCallback, status: AckStatus) -> DispatchResult {
    if status != AckStatus::Success {
      log::error!(
        target: LOG_TARGET,
        "reinvestment on {:?} failed ({:?})",
        core::str::from_utf8(&args.host_zone_id).unwrap_or_default(),
        status,
      );
      return Ok(());
    }
    if args.reinvest_amount == 0 {
      return Ok(());
    }
    let epoch = Self::get_epoch_tracker(EpochIdentifier::StrideEpoch)?;
    Self::append_deposit_record(
      args.host_zone_id,
      args.denom,
      args.reinvest_amount,
      DepositRecordStatus::DelegationQueue,
      DepositRecordSource::WithdrawalIca,
      epoch.epoch_number,
    )?;
    Ok(())
  }

  /// Returns host denom held by the fee account to the local fee account.
  pub(crate) fn do_clear_balance(chain_id: &[u8], amount: u128, channel_id: &[u8]) -> DispatchResult {
    ensure!(amount > 0, Error::<T>::InvalidAmount);
    let host_zone = Self::get_host_zone(chain_id)?;
    let fee = Self::host_ica_address(&host_zone, IcaAccountType::Fee)?;
    let receiver = T::LocalAddress::convert(Self::fee_account());
    let timeout = Self::now_nanos().saturating_add(ModuleParams::<T>::get().ibc_transfer_timeout_nanos);
    let msg = RemoteMsg::Transfer {
      source_channel: Self::text(channel_id)?,
      sender: fee,
      receiver,
      amount,
      denom: host_zone.host_denom.clone(),
      timeout_timestamp: timeout,
      memo: Vec::new(),
    };
    Self::submit_host_tx(&host_zone, IcaAccountType::Fee, vec![msg], timeout, None)?;
    Self::deposit_event(Event::BalanceCleared {
      chain_id: host_zone.chain_id,
      amount,
    });
    Ok(())
  }
}
