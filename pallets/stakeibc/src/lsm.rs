//! Liquid staking of tokenized delegations (LSM shares).
//!
//! An LSM share bridged over a zone's transfer channel carries the base denom
//! `{validator}/{record_id}`. Staking it escrows the share in the deposit
//! account and mints stTokens at the validator's shares-to-tokens rate. When
//! the stake pushes the validator's progress tracker across a checkpoint the
//! mint waits for a fresh validator rate.
//!
//! Escrowed shares are later sent to the delegation account and redeemed
//! there into a native delegation:
//!
//! ```text
//! DepositPending -> TransferQueue -> TransferInProgress
//!   -> DetokenizationQueue -> DetokenizationInProgress -> (removed)
//! ```

use crate::{
  Config, Error, Event, HostZones, LOG_TARGET, LsmTokenDeposits, ModuleParams, Pallet,
  adapters::{TokenOps, TransferOps},
  types::*,
};
use alloc::vec;
use frame::prelude::*;
use polkadot_sdk::{
  frame_support::storage::with_storage_layer,
  sp_runtime::{FixedPointNumber, traits::Zero},
};
use primitives::IcaAccountType;

impl<T: Config> Pallet<T> {
  /// Returns `true` when the stake completed inline and `false` when it
  /// waits on a validator query.
  pub(crate) fn do_lsm_liquid_stake(
    staker: T::AccountId,
    amount: u128,
    lsm_token_ibc_denom: &[u8],
  ) -> Result<bool, DispatchError> {
    ensure!(amount > 0, Error::<T>::InvalidAmount);
    let trace = T::Transfer::denom_trace(lsm_token_ibc_denom).ok_or(Error::<T>::InvalidLsmToken)?;
    let channel_id = trace
      .path
      .strip_prefix(b"transfer/".as_slice())
      .filter(|channel| !channel.is_empty() && !channel.contains(&b'/'))
      .ok_or(Error::<T>::InvalidLsmToken)?;
    let mut host_zone = HostZones::<T>::iter_values()
      .find(|zone| zone.transfer_channel_id.as_slice() == channel_id)
      .ok_or(Error::<T>::HostZoneNotFound)?;
    ensure!(!host_zone.halted, Error::<T>::HaltedHostZone);
    ensure!(host_zone.lsm_liquid_stake_enabled, Error::<T>::LsmLiquidStakeDisabled);
    ensure!(
      host_zone.is_redemption_rate_within_bounds(host_zone.redemption_rate),
      Error::<T>::RedemptionRateOutsideSafetyBounds
    );

    let separator = trace
      .base_denom
      .iter()
      .rposition(|b| *b == b'/')
      .filter(|pos| *pos > 0 && *pos + 1 < trace.base_denom.len())
      .ok_or(Error::<T>::InvalidLsmToken)?;
    let validator_address = &trace.base_denom[..separator];
    let index = host_zone
      .validator_index(validator_address)
      .ok_or(Error::<T>::InvalidLsmToken)?;
    let validator = &host_zone.validators[index];
    ensure!(!validator.slash_query_in_progress, Error::<T>::SlashQueryInProgress);
    ensure!(
      !validator.shares_to_tokens_rate.is_zero(),
      Error::<T>::ValidatorSharesToTokensRateNotKnown
    );

    let native_amount = validator.shares_to_tokens_rate.saturating_mul_int(amount);
    let st_amount = native_to_st(native_amount, host_zone.redemption_rate)
      .ok_or(Error::<T>::ArithmeticOverflow)?;
    ensure!(st_amount > 0, Error::<T>::InsufficientLiquidStake);
    ensure!(
      T::Tokens::balance(&staker, lsm_token_ibc_denom) >= amount,
      Error::<T>::InsufficientFunds
    );

    let denom = Self::text(&trace.base_denom)?;
    ensure!(
      !LsmTokenDeposits::<T>::contains_key(&host_zone.chain_id, &denom),
      Error::<T>::InvalidLsmToken
    );
    T::Tokens::transfer(&staker, &host_zone.deposit_address, lsm_token_ibc_denom, amount)?;

    let deposit = LsmTokenDeposit {
      deposit_id: Self::next_lsm_deposit_id()?,
      chain_id: host_zone.chain_id.clone(),
      denom,
      ibc_denom: Self::text(lsm_token_ibc_denom)?,
      staker,
      validator_address: validator.address.clone(),
      amount,
      st_token_amount: st_amount,
      status: LsmDepositStatus::DepositPending,
    };

    let checkpoint = validator.slash_query_checkpoint;
    let tracker = validator.slash_query_progress_tracker;
    let crosses_checkpoint = checkpoint > 0
      && tracker / checkpoint < tracker.saturating_add(native_amount) / checkpoint;
    if !crosses_checkpoint {
      Self::finish_lsm_liquid_stake(deposit)?;
      return Ok(true);
    }

    LsmTokenDeposits::<T>::insert(&deposit.chain_id, &deposit.denom, &deposit);
    Self::submit_icq(
      &host_zone.chain_id,
      &host_zone.connection_id,
      QueryRequest::Validator {
        address: deposit.validator_address.clone(),
      },
      IcqCallbackId::Slash,
      LsmDepositKey {
        chain_id: deposit.chain_id.clone(),
        denom: deposit.denom.clone(),
      }
      .encode(),
      ModuleParams::<T>::get().lsm_slash_query_timeout_nanos,
      TimeoutPolicy::Reject,
    )?;
    host_zone.validators[index].slash_query_in_progress = true;
    HostZones::<T>::insert(&host_zone.chain_id, &host_zone);

    log::info!(
      target: LOG_TARGET,
      "LSM stake of {} {:?} waits on a validator query",
      amount,
      core::str::from_utf8(&deposit.denom).unwrap_or_default(),
    );
    Self::deposit_event(Event::PendingLsmLiquidStake {
      staker: deposit.staker,
      chain_id: deposit.chain_id,
      validator: deposit.validator_address,
      denom: deposit.denom,
      amount,
    });
    Ok(false)
  }

  /// Mints the stTokens of an escrowed deposit and queues its transfer.
  fn finish_lsm_liquid_stake(mut deposit: LsmTokenDeposit<T::AccountId>) -> DispatchResult {
    let mut host_zone = Self::get_host_zone(&deposit.chain_id)?;
    let index = host_zone
      .validator_index(&deposit.validator_address)
      .ok_or(Error::<T>::ValidatorNotFound)?;
    let validator = &mut host_zone.validators[index];
    let native_amount = validator.shares_to_tokens_rate.saturating_mul_int(deposit.amount);
    validator.slash_query_progress_tracker = validator
      .slash_query_progress_tracker
      .saturating_add(native_amount);
    validator.slash_query_in_progress = false;

    T::Tokens::mint(&deposit.staker, &host_zone.st_denom(), deposit.st_token_amount)?;
    deposit.status = LsmDepositStatus::TransferQueue;
    LsmTokenDeposits::<T>::insert(&deposit.chain_id, &deposit.denom, &deposit);
    HostZones::<T>::insert(&host_zone.chain_id, &host_zone);

    Self::deposit_event(Event::LsmLiquidStake {
      staker: deposit.staker,
      chain_id: deposit.chain_id,
      validator: deposit.validator_address,
      denom: deposit.denom,
      native_amount,
      st_amount: deposit.st_token_amount,
    });
    Ok(())
  }

  /// Returns the escrowed shares to the staker and drops the deposit.
  fn fail_lsm_liquid_stake(deposit: LsmTokenDeposit<T::AccountId>) -> DispatchResult {
    let host_zone = Self::get_host_zone(&deposit.chain_id)?;
    T::Tokens::transfer(
      &host_zone.deposit_address,
      &deposit.staker,
      &deposit.ibc_denom,
      deposit.amount,
    )?;
    LsmTokenDeposits::<T>::remove(&deposit.chain_id, &deposit.denom);
    log::error!(
      target: LOG_TARGET,
      "LSM stake of {:?} on {:?} failed, shares returned",
      core::str::from_utf8(&deposit.denom).unwrap_or_default(),
      core::str::from_utf8(&deposit.chain_id).unwrap_or_default(),
    );
    Self::deposit_event(Event::LsmLiquidStakeFailed {
      chain_id: deposit.chain_id,
      denom: deposit.denom,
    });
    Ok(())
  }

  fn pending_lsm_deposit(query: &Query) -> Result<Option<LsmTokenDeposit<T::AccountId>>, DispatchError> {
    let key: LsmDepositKey = Self::decode_args(&query.callback_data)?;
    let deposit = Self::get_lsm_deposit(&key.chain_id, &key.denom)?;
    Ok((deposit.status == LsmDepositStatus::DepositPending).then_some(deposit))
  }

  /// Completes a pending LSM stake unless the validator rate moved, in which
  /// case the stake fails and the validator's delegation is checked.
  pub(crate) fn lsm_slash_query_callback(query: &Query, response: &[u8]) -> DispatchResult {
    let Some(deposit) = Self::pending_lsm_deposit(query)? else {
      return Ok(());
    };
    let (address, previous, current) =
      Self::store_shares_to_tokens_rate(&query.chain_id, response)?;
    Self::release_slash_query(&query.chain_id, &address)?;

    if previous == current {
      let finished = with_storage_layer(|| Self::finish_lsm_liquid_stake(deposit.clone()));
      if let Err(e) = finished {
        log::error!(target: LOG_TARGET, "pending LSM stake not finished: {:?}", e);
        Self::fail_lsm_liquid_stake(deposit)?;
      }
      return Ok(());
    }

    log::error!(
      target: LOG_TARGET,
      "validator {:?} rate moved from {:?} to {:?} during an LSM stake",
      core::str::from_utf8(&address).unwrap_or_default(),
      previous,
      current,
    );
    Self::fail_lsm_liquid_stake(deposit)?;
    Self::submit_delegator_shares_query(
      &query.chain_id,
      &address,
      ModuleParams::<T>::get().lsm_slash_query_timeout_nanos,
    )
  }

  pub(crate) fn lsm_slash_query_timeout(query: &Query) -> DispatchResult {
    let Some(deposit) = Self::pending_lsm_deposit(query)? else {
      return Ok(());
    };
    Self::release_slash_query(&query.chain_id, &deposit.validator_address)?;
    Self::fail_lsm_liquid_stake(deposit)
  }

  fn release_slash_query(chain_id: &[u8], validator_address: &[u8]) -> DispatchResult {
    let mut host_zone = Self::get_host_zone(chain_id)?;
    if let Some(index) = host_zone.validator_index(validator_address) {
      host_zone.validators[index].slash_query_in_progress = false;
      HostZones::<T>::insert(&host_zone.chain_id, &host_zone);
    }
    Ok(())
  }

  /// Sends queued LSM shares from the deposit account to the delegation account.
  pub(crate) fn transfer_lsm_deposits() {
    for host_zone in Self::active_host_zones() {
      let Some(delegation) = host_zone.delegation_ica_address.clone() else {
        continue;
      };
      for deposit in Self::lsm_deposits_with_status(&host_zone.chain_id, LsmDepositStatus::TransferQueue)
      {
        if let Err(e) = Self::transfer_lsm_deposit(&host_zone, &delegation, deposit) {
          log::error!(target: LOG_TARGET, "LSM transfer not submitted: {:?}", e);
        }
      }
    }
  }

  fn transfer_lsm_deposit(
    host_zone: &HostZone<T::AccountId>,
    delegation: &Text,
    mut deposit: LsmTokenDeposit<T::AccountId>,
  ) -> DispatchResult {
    let timeout = Self::now_nanos().saturating_add(ModuleParams::<T>::get().ibc_transfer_timeout_nanos);
    let packet = T::Transfer::transfer(
      &host_zone.deposit_address,
      &host_zone.transfer_channel_id,
      &deposit.ibc_denom,
      deposit.amount,
      delegation,
      timeout,
    )?;
    let key = LsmDepositKey {
      chain_id: deposit.chain_id.clone(),
      denom: deposit.denom.clone(),
    };
    Self::store_callback(&packet, IcaCallbackId::LsmTransfer, key.encode())?;
    deposit.status = LsmDepositStatus::TransferInProgress;
    LsmTokenDeposits::<T>::insert(&deposit.chain_id, &deposit.denom, &deposit);
    Ok(())
  }

  pub(crate) fn lsm_transfer_callback(key: LsmDepositKey, status: AckStatus) -> DispatchResult {
    let mut deposit = Self::get_lsm_deposit(&key.chain_id, &key.denom)?;
    deposit.status = match status {
      AckStatus::Success => LsmDepositStatus::DetokenizationQueue,
      AckStatus::Failure | AckStatus::Timeout => LsmDepositStatus::TransferQueue,
    };
    LsmTokenDeposits::<T>::insert(&key.chain_id, &key.denom, &deposit);
    Ok(())
  }

  /// Redeems every queued share held by the delegation account, one
  /// transaction per deposit.
  pub(crate) fn detokenize_lsm_deposits() {
    for host_zone in Self::active_host_zones() {
      if host_zone.delegation_ica_address.is_none() {
        continue;
      }
      for deposit in
        Self::lsm_deposits_with_status(&host_zone.chain_id, LsmDepositStatus::DetokenizationQueue)
      {
        if let Err(e) = Self::detokenize_lsm_deposit(deposit) {
          log::error!(target: LOG_TARGET, "detokenization not submitted: {:?}", e);
        }
      }
    }
  }

  fn detokenize_lsm_deposit(mut deposit: LsmTokenDeposit<T::AccountId>) -> DispatchResult {
    let mut host_zone = Self::get_host_zone(&deposit.chain_id)?;
    let delegation = Self::host_ica_address(&host_zone, IcaAccountType::Delegation)?;
    let msg = RemoteMsg::RedeemTokensForShares {
      delegator: delegation,
      amount: deposit.amount,
      denom: deposit.denom.clone(),
    };
    let key = LsmDepositKey {
      chain_id: deposit.chain_id.clone(),
      denom: deposit.denom.clone(),
    };
    let timeout = Self::now_nanos().saturating_add(ModuleParams::<T>::get().detokenization_timeout_nanos);
    Self::submit_host_tx(
      &host_zone,
      IcaAccountType::Delegation,
      vec![msg],
      timeout,
      Some((IcaCallbackId::Detokenize, key.encode())),
    )?;
    Self::increment_delegation_changes(&mut host_zone, &deposit.validator_address)?;
    HostZones::<T>::insert(&host_zone.chain_id, &host_zone);
    deposit.status = LsmDepositStatus::DetokenizationInProgress;
    LsmTokenDeposits::<T>::insert(&deposit.chain_id, &deposit.denom, &deposit);
    Ok(())
  }

  /// Turns a redeemed share into a native delegation on its validator.
  pub(crate) fn detokenize_callback(key: LsmDepositKey, status: AckStatus) -> DispatchResult {
    let mut host_zone = Self::get_host_zone(&key.chain_id)?;
    let mut deposit = Self::get_lsm_deposit(&key.chain_id, &key.denom)?;
    Self::decrement_delegation_changes(&mut host_zone, &deposit.validator_address)?;

    if status != AckStatus::Success {
      log::error!(
        target: LOG_TARGET,
        "detokenization of {:?} failed ({:?})",
        core::str::from_utf8(&deposit.denom).unwrap_or_default(),
        status,
      );
      deposit.status = LsmDepositStatus::DetokenizationQueue;
      LsmTokenDeposits::<T>::insert(&key.chain_id, &key.denom, &deposit);
      HostZones::<T>::insert(&host_zone.chain_id, &host_zone);
      return Ok(());
    }

    let index = host_zone
      .validator_index(&deposit.validator_address)
      .ok_or(Error::<T>::ValidatorNotFound)?;
    let native_amount = host_zone.validators[index]
      .shares_to_tokens_rate
      .saturating_mul_int(deposit.amount);
    Self::add_delegation_to_validator(&mut host_zone, &deposit.validator_address, native_amount)?;
    HostZones::<T>::insert(&host_zone.chain_id, &host_zone);
    LsmTokenDeposits::<T>::remove(&key.chain_id, &key.denom);
    log::info!(
      target: LOG_TARGET,
      "detokenized {:?} into {} delegated tokens",
      core::str::from_utf8(&deposit.denom).unwrap_or_default(),
      native_amount,
    );
    Ok(())
  }
}
