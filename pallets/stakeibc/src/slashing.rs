//! Validator exchange rates, slash detection and delegation calibration.
//!
//! A validator's shares-to-tokens rate only moves when it is slashed, so a
//! drop between two validator queries triggers a delegator-shares query on
//! the delegation account. The observed tokens are then reconciled with the
//! recorded delegation, bounded by `max_slash_percent`.

use crate::{Config, Error, Event, HostZones, LOG_TARGET, ModuleParams, Pallet, types::*};
use alloc::vec::Vec;
use frame::prelude::*;
use polkadot_sdk::sp_runtime::{
  FixedPointNumber, FixedU128,
  traits::{CheckedDiv, Zero},
};
use primitives::{EpochIdentifier, IcaAccountType, params};

impl<T: Config> Pallet<T> {
  pub(crate) fn submit_validator_shares_to_tokens_rate_query(
    chain_id: &[u8],
    validator_address: &[u8],
  ) -> DispatchResult {
    let host_zone = Self::get_host_zone(chain_id)?;
    host_zone
      .validator_index(validator_address)
      .ok_or(Error::<T>::ValidatorNotFound)?;
    Self::submit_icq(
      &host_zone.chain_id,
      &host_zone.connection_id,
      QueryRequest::Validator {
        address: Self::text(validator_address)?,
      },
      IcqCallbackId::ValidatorSharesToTokens,
      Vec::new(),
      params::VALIDATOR_QUERY_TIMEOUT_NANOS,
      TimeoutPolicy::Reject,
    )
    .map(|_| ())
  }

  /// Stores the rate carried by a validator query response. Returns the
  /// validator address with its previous and current rate.
  pub(crate) fn store_shares_to_tokens_rate(
    chain_id: &[u8],
    response: &[u8],
  ) -> Result<(Text, FixedU128, FixedU128), DispatchError> {
    let mut host_zone = Self::get_host_zone(chain_id)?;
    let remote: RemoteValidator = Self::decode_args(response)?;
    let index = host_zone
      .validator_index(&remote.operator_address)
      .ok_or(Error::<T>::ValidatorNotFound)?;
    ensure!(!remote.delegator_shares.is_zero(), Error::<T>::InvalidAmount);
    let current = FixedU128::checked_from_integer(remote.tokens)
      .and_then(|tokens| tokens.checked_div(&remote.delegator_shares))
      .ok_or(Error::<T>::ArithmeticOverflow)?;
    let epoch_number = Self::get_epoch_tracker(EpochIdentifier::StrideEpoch)
      .map(|tracker| tracker.epoch_number)
      .unwrap_or_default();

    let validator = &mut host_zone.validators[index];
    let previous = validator.shares_to_tokens_rate;
    validator.shares_to_tokens_rate = current;
    validator.shares_to_tokens_rate_epoch = epoch_number;
    let address = validator.address.clone();
    HostZones::<T>::insert(&host_zone.chain_id, &host_zone);

    log::info!(
      target: LOG_TARGET,
      "{:?} validator {:?} shares-to-tokens rate {:?} (was {:?})",
      core::str::from_utf8(&host_zone.chain_id).unwrap_or_default(),
      core::str::from_utf8(&address).unwrap_or_default(),
      current,
      previous,
    );
    Self::deposit_event(Event::ValidatorSharesToTokensRateUpdated {
      chain_id: host_zone.chain_id,
      validator: address.clone(),
      rate: current,
    });
    Ok((address, previous, current))
  }

  pub(crate) fn validator_shares_to_tokens_callback(
    query: &Query,
    response: &[u8],
  ) -> DispatchResult {
    let (address, previous, current) =
      Self::store_shares_to_tokens_rate(&query.chain_id, response)?;
    if previous.is_zero() || current >= previous {
      return Ok(());
    }
    Self::submit_delegator_shares_query(&query.chain_id, &address, params::NANOS_PER_HOUR)
  }

  /// Queries the delegation account's shares on a validator suspected of a
  /// slash. At most one such query is outstanding per validator.
  pub(crate) fn submit_delegator_shares_query(
    chain_id: &[u8],
    validator_address: &[u8],
    timeout_duration: u64,
  ) -> DispatchResult {
    let mut host_zone = Self::get_host_zone(chain_id)?;
    let delegator = Self::host_ica_address(&host_zone, IcaAccountType::Delegation)?;
    let index = host_zone
      .validator_index(validator_address)
      .ok_or(Error::<T>::ValidatorNotFound)?;
    let validator = &mut host_zone.validators[index];
    if validator.slash_query_in_progress {
      log::warn!(
        target: LOG_TARGET,
        "slash query already in flight for {:?}",
        core::str::from_utf8(validator_address).unwrap_or_default(),
      );
      return Ok(());
    }
    validator.slash_query_in_progress = true;
    let request = QueryRequest::Delegation {
      delegator,
      validator: validator.address.clone(),
    };
    let initial_delegation = validator.delegation;
    HostZones::<T>::insert(&host_zone.chain_id, &host_zone);

    Self::submit_icq(
      &host_zone.chain_id,
      &host_zone.connection_id,
      request,
      IcqCallbackId::DelegatorShares,
      initial_delegation.encode(),
      timeout_duration,
      TimeoutPolicy::Retry,
    )
    .map(|_| ())
  }

  /// Re-issues a delegation query whose response raced a delegation change.
  fn requery_delegation(query: &Query, current_delegation: u128) -> DispatchResult {
    Self::submit_icq(
      &query.chain_id,
      &query.connection_id,
      query.request.clone(),
      query.callback_id,
      current_delegation.encode(),
      query.timeout_duration,
      query.timeout_policy,
    )
    .map(|_| ())
  }

  /// Decodes a delegation response. Returns the zone, the validator index,
  /// the observed tokens, or `None` when the response raced an in-flight
  /// delegation change and was re-issued.
  fn observed_delegation(
    query: &Query,
    response: &[u8],
  ) -> Result<Option<(HostZone<T::AccountId>, usize, u128)>, DispatchError> {
    let host_zone = Self::get_host_zone(&query.chain_id)?;
    let remote: RemoteDelegation = Self::decode_args(response)?;
    let initial_delegation: u128 = Self::decode_args(&query.callback_data)?;
    let index = host_zone
      .validator_index(&remote.validator_address)
      .ok_or(Error::<T>::ValidatorNotFound)?;
    let validator = &host_zone.validators[index];

    if validator.delegation != initial_delegation || validator.delegation_changes_in_progress > 0 {
      log::info!(
        target: LOG_TARGET,
        "delegation on {:?} changed during the query, resubmitting",
        core::str::from_utf8(&validator.address).unwrap_or_default(),
      );
      Self::requery_delegation(query, validator.delegation)?;
      return Ok(None);
    }
    ensure!(
      !validator.shares_to_tokens_rate.is_zero(),
      Error::<T>::ValidatorSharesToTokensRateNotKnown
    );
    let observed = shares_to_tokens(remote.shares, validator.shares_to_tokens_rate)
      .ok_or(Error::<T>::ArithmeticOverflow)?;
    Ok(Some((host_zone, index, observed)))
  }

  /// Applies a slash observed through a delegator-shares query.
  pub(crate) fn delegator_shares_callback(query: &Query, response: &[u8]) -> DispatchResult {
    let Some((mut host_zone, index, observed)) = Self::observed_delegation(query, response)? else {
      return Ok(());
    };
    host_zone.validators[index].slash_query_in_progress = false;
    let validator = host_zone.validators[index].clone();
    let recorded = validator.delegation;

    if observed == recorded {
      HostZones::<T>::insert(&host_zone.chain_id, &host_zone);
      log::info!(
        target: LOG_TARGET,
        "validator {:?} was not slashed",
        core::str::from_utf8(&validator.address).unwrap_or_default(),
      );
      return Ok(());
    }
    if observed > recorded {
      HostZones::<T>::insert(&host_zone.chain_id, &host_zone);
      log::error!(
        target: LOG_TARGET,
        "validator {:?} reports {} tokens, more than the recorded {}",
        core::str::from_utf8(&validator.address).unwrap_or_default(),
        observed,
        recorded,
      );
      return Ok(());
    }

    let slash_amount = recorded - observed;
    let max_slash_percent = ModuleParams::<T>::get().max_slash_percent as u128;
    if slash_amount.saturating_mul(100) > max_slash_percent.saturating_mul(recorded) {
      HostZones::<T>::insert(&host_zone.chain_id, &host_zone);
      log::error!(
        target: LOG_TARGET,
        "refusing slash of {} on {:?}: recorded {}, observed {}",
        slash_amount,
        core::str::from_utf8(&validator.address).unwrap_or_default(),
        recorded,
        observed,
      );
      Self::deposit_event(Event::SlashRefused {
        chain_id: host_zone.chain_id,
        validator: validator.address,
        recorded,
        observed,
      });
      return Ok(());
    }

    let new_weight = mul_div_floor(validator.weight as u128, observed, recorded)
      .and_then(|weight| u64::try_from(weight).ok())
      .ok_or(Error::<T>::ArithmeticOverflow)?;
    host_zone.validators[index].weight = new_weight;
    Self::remove_delegation_from_validator(&mut host_zone, &validator.address, slash_amount)?;
    HostZones::<T>::insert(&host_zone.chain_id, &host_zone);

    log::info!(
      target: LOG_TARGET,
      "validator {:?} slashed by {}, weight {} -> {}",
      core::str::from_utf8(&validator.address).unwrap_or_default(),
      slash_amount,
      validator.weight,
      new_weight,
    );
    Self::deposit_event(Event::ValidatorSlashed {
      chain_id: host_zone.chain_id,
      validator: validator.address,
      slash_amount,
      new_weight,
    });
    Ok(())
  }

  /// Frees the validator for the next slash query.
  pub(crate) fn delegator_shares_timeout(query: &Query) -> DispatchResult {
    let QueryRequest::Delegation { validator, .. } = &query.request else {
      return Ok(());
    };
    let mut host_zone = Self::get_host_zone(&query.chain_id)?;
    if let Some(index) = host_zone.validator_index(validator) {
      host_zone.validators[index].slash_query_in_progress = false;
      HostZones::<T>::insert(&host_zone.chain_id, &host_zone);
    }
    Ok(())
  }

  pub(crate) fn submit_calibration_query(chain_id: &[u8], validator_address: &[u8]) -> DispatchResult {
    let host_zone = Self::get_host_zone(chain_id)?;
    let delegator = Self::host_ica_address(&host_zone, IcaAccountType::Delegation)?;
    let index = host_zone
      .validator_index(validator_address)
      .ok_or(Error::<T>::ValidatorNotFound)?;
    let validator = &host_zone.validators[index];
    Self::submit_icq(
      &host_zone.chain_id,
      &host_zone.connection_id,
      QueryRequest::Delegation {
        delegator,
        validator: validator.address.clone(),
      },
      IcqCallbackId::Calibration,
      validator.delegation.encode(),
      params::NANOS_PER_HOUR,
      TimeoutPolicy::Retry,
    )
    .map(|_| ())
  }

  /// Overwrites the recorded delegation with the observed tokens.
  pub(crate) fn calibration_callback(query: &Query, response: &[u8]) -> DispatchResult {
    let Some((mut host_zone, index, observed)) = Self::observed_delegation(query, response)? else {
      return Ok(());
    };
    let address = host_zone.validators[index].address.clone();
    let recorded = host_zone.validators[index].delegation;
    if observed == recorded {
      return Ok(());
    }
    if observed > recorded {
      Self::add_delegation_to_validator(&mut host_zone, &address, observed - recorded)?;
    } else {
      Self::remove_delegation_from_validator(&mut host_zone, &address, recorded - observed)?;
    }
    HostZones::<T>::insert(&host_zone.chain_id, &host_zone);
    log::info!(
      target: LOG_TARGET,
      "calibrated {:?}: {} -> {}",
      core::str::from_utf8(&address).unwrap_or_default(),
      recorded,
      observed,
    );
    Self::deposit_event(Event::DelegationCalibrated {
      chain_id: host_zone.chain_id,
      validator: address,
      delegation: observed,
    });
    Ok(())
  }
}
