//! Host zone registry: registration, validator set management and the
//! governance switches on a zone.

use crate::{
  Config, Error, Event, HostZones, LOG_TARGET, ModuleParams, Pallet,
  adapters::{IcaController, RateLimiter},
  types::*,
};
use alloc::vec::Vec;
use frame::prelude::*;
use polkadot_sdk::sp_runtime::{
  FixedPointNumber, FixedU128,
  traits::{Convert, One, Zero},
};
use primitives::{EpochIdentifier, IcaAccountType, host_zone_owner, params};

impl<T: Config> Pallet<T> {
  pub(crate) fn do_register_host_zone(
    connection_id: Vec<u8>,
    bech32_prefix: Vec<u8>,
    host_denom: Vec<u8>,
    ibc_denom: Vec<u8>,
    transfer_channel_id: Vec<u8>,
    unbonding_period: u64,
    min_redemption_rate: FixedU128,
    max_redemption_rate: FixedU128,
    lsm_liquid_stake_enabled: bool,
    community_pool_treasury_address: Option<Vec<u8>>,
    max_messages_per_ica_tx: Option<u32>,
  ) -> DispatchResult {
    ensure!(
      !connection_id.is_empty()
        && !bech32_prefix.is_empty()
        && !host_denom.is_empty()
        && !ibc_denom.is_empty()
        && !transfer_channel_id.is_empty(),
      Error::<T>::InvalidHostZone
    );
    ensure!(unbonding_period > 0, Error::<T>::InvalidHostZone);

    let chain_id = T::IcaController::counterparty_chain_id(&connection_id)
      .ok_or(Error::<T>::InvalidHostZone)?;
    let chain_id = Self::text(&chain_id)?;
    ensure!(
      !HostZones::<T>::contains_key(&chain_id),
      Error::<T>::HostZoneAlreadyExists
    );

    let connection_id = Self::text(&connection_id)?;
    let bech32_prefix = Self::text(&bech32_prefix)?;
    let host_denom = Self::text(&host_denom)?;
    let ibc_denom = Self::text(&ibc_denom)?;
    let transfer_channel_id = Self::text(&transfer_channel_id)?;
    for zone in HostZones::<T>::iter_values() {
      ensure!(
        zone.connection_id != connection_id
          && zone.bech32_prefix != bech32_prefix
          && zone.host_denom != host_denom
          && zone.ibc_denom != ibc_denom
          && zone.transfer_channel_id != transfer_channel_id,
        Error::<T>::InvalidHostZone
      );
    }

    let module_params = ModuleParams::<T>::get();
    let min_redemption_rate = if min_redemption_rate.is_zero() {
      FixedU128::saturating_from_rational(module_params.default_min_redemption_rate_threshold, 100)
    } else {
      min_redemption_rate
    };
    let max_redemption_rate = if max_redemption_rate.is_zero() {
      FixedU128::saturating_from_rational(module_params.default_max_redemption_rate_threshold, 100)
    } else {
      max_redemption_rate
    };
    // The zone starts at a rate of one, which must already be safe
    ensure!(
      min_redemption_rate <= FixedU128::one() && FixedU128::one() <= max_redemption_rate,
      Error::<T>::InvalidBounds
    );

    let max_messages_per_ica_tx =
      max_messages_per_ica_tx.unwrap_or(params::DEFAULT_MAX_MESSAGES_PER_ICA_TX);
    ensure!(max_messages_per_ica_tx > 0, Error::<T>::InvalidHostZone);
    let community_pool_treasury_address = community_pool_treasury_address
      .map(|address| Self::text(&address))
      .transpose()?;

    let host_zone = HostZone {
      chain_id: chain_id.clone(),
      connection_id: connection_id.clone(),
      transfer_channel_id,
      bech32_prefix,
      host_denom: host_denom.clone(),
      ibc_denom,
      deposit_address: Self::zone_account(&chain_id, b"deposit"),
      community_pool_stake_holding_address: Self::zone_account(&chain_id, b"community-pool-stake"),
      community_pool_redeem_holding_address: Self::zone_account(
        &chain_id,
        b"community-pool-redeem",
      ),
      community_pool_treasury_address,
      delegation_ica_address: None,
      withdrawal_ica_address: None,
      fee_ica_address: None,
      redemption_ica_address: None,
      community_pool_deposit_ica_address: None,
      community_pool_return_ica_address: None,
      validators: BoundedVec::new(),
      redemption_rate: FixedU128::one(),
      last_redemption_rate: FixedU128::one(),
      min_redemption_rate,
      max_redemption_rate,
      min_inner_redemption_rate: min_redemption_rate,
      max_inner_redemption_rate: max_redemption_rate,
      unbonding_period,
      total_delegations: 0,
      max_messages_per_ica_tx,
      halted: false,
      redemptions_enabled: true,
      lsm_liquid_stake_enabled,
    };
    HostZones::<T>::insert(&chain_id, &host_zone);

    for role in IcaAccountType::HOST_ROLES {
      T::IcaController::register_account(&connection_id, &host_zone_owner(&chain_id, role))?;
    }

    let stride_epoch = Self::get_epoch_tracker(EpochIdentifier::StrideEpoch)?;
    Self::create_deposit_record(&host_zone, stride_epoch.epoch_number)?;
    let day_epoch = Self::get_epoch_tracker(EpochIdentifier::Day)?;
    Self::add_host_zone_to_epoch_unbonding_record(
      day_epoch.epoch_number,
      HostZoneUnbonding::new(chain_id.clone(), host_denom),
    );

    log::info!(
      target: LOG_TARGET,
      "registered host zone {:?} on {:?}",
      core::str::from_utf8(&chain_id).unwrap_or_default(),
      core::str::from_utf8(&connection_id).unwrap_or_default(),
    );
    Self::deposit_event(Event::HostZoneRegistered {
      chain_id,
      connection_id,
    });
    Ok(())
  }

  pub(crate) fn do_add_validators(
    chain_id: &[u8],
    validators: Vec<ValidatorParams>,
  ) -> DispatchResult {
    let mut host_zone = Self::get_host_zone(chain_id)?;
    let threshold = ModuleParams::<T>::get().validator_slash_query_threshold;
    let mut added = Vec::with_capacity(validators.len());
    for params in validators {
      ensure!(
        params.address.starts_with(&host_zone.bech32_prefix),
        Error::<T>::InvalidValidatorAddress
      );
      let exists = host_zone
        .validators
        .iter()
        .any(|v| v.address.as_slice() == params.address || v.name.as_slice() == params.name);
      ensure!(!exists, Error::<T>::ValidatorAlreadyExists);
      let mut validator = Validator::new(
        Self::text(&params.name)?,
        Self::text(&params.address)?,
        params.weight,
      );
      validator.slash_query_checkpoint =
        Self::slash_query_checkpoint(host_zone.total_delegations, threshold);
      added.push(validator.address.clone());
      host_zone
        .validators
        .try_push(validator)
        .map_err(|_| Error::<T>::TooManyValidators)?;
    }
    Self::ensure_validator_weights_below_cap(&host_zone.validators)?;
    HostZones::<T>::insert(&host_zone.chain_id, &host_zone);

    // Needed before the validator can accept LSM stakes; a failure only delays that
    for address in &added {
      if let Err(e) =
        Self::submit_validator_shares_to_tokens_rate_query(&host_zone.chain_id, address)
      {
        log::warn!(target: LOG_TARGET, "validator rate query not submitted: {:?}", e);
      }
    }

    Self::deposit_event(Event::ValidatorsAdded {
      chain_id: host_zone.chain_id,
      count: added.len() as u32,
    });
    Ok(())
  }

  pub(crate) fn do_delete_validator(chain_id: &[u8], validator_address: &[u8]) -> DispatchResult {
    let mut host_zone = Self::get_host_zone(chain_id)?;
    let index = host_zone
      .validator_index(validator_address)
      .ok_or(Error::<T>::ValidatorNotFound)?;
    let validator = &host_zone.validators[index];
    ensure!(
      validator.delegation == 0 && validator.weight == 0,
      Error::<T>::ValidatorNotRemovable
    );
    let removed = host_zone.validators.remove(index);
    HostZones::<T>::insert(&host_zone.chain_id, &host_zone);
    Self::deposit_event(Event::ValidatorDeleted {
      chain_id: host_zone.chain_id,
      validator: removed.address,
    });
    Ok(())
  }

  pub(crate) fn do_change_validator_weights(
    chain_id: &[u8],
    weights: Vec<ValidatorWeight>,
  ) -> DispatchResult {
    let mut host_zone = Self::get_host_zone(chain_id)?;
    for update in weights {
      let index = host_zone
        .validator_index(&update.address)
        .ok_or(Error::<T>::ValidatorNotFound)?;
      host_zone.validators[index].weight = update.weight;
    }
    ensure!(
      host_zone.total_validator_weight() > 0,
      Error::<T>::NoValidatorWeights
    );
    Self::ensure_validator_weights_below_cap(&host_zone.validators)?;
    HostZones::<T>::insert(&host_zone.chain_id, &host_zone);
    Self::deposit_event(Event::ValidatorWeightsChanged {
      chain_id: host_zone.chain_id,
    });
    Ok(())
  }

  /// Every `v.weight * 100 <= cap * total_weight`.
  pub(crate) fn ensure_validator_weights_below_cap(validators: &[Validator]) -> DispatchResult {
    let cap = ModuleParams::<T>::get().validator_weight_cap as u128;
    let total: u128 = validators.iter().map(|v| v.weight as u128).sum();
    if total == 0 {
      return Ok(());
    }
    for validator in validators {
      ensure!(
        (validator.weight as u128).saturating_mul(100) <= cap.saturating_mul(total),
        Error::<T>::ValidatorWeightCapExceeded
      );
    }
    Ok(())
  }

  pub(crate) fn slash_query_checkpoint(total_delegations: u128, threshold_percent: u64) -> u128 {
    total_delegations.saturating_mul(threshold_percent as u128) / 100
  }

  pub fn active_host_zones() -> Vec<HostZone<T::AccountId>> {
    HostZones::<T>::iter_values().filter(|zone| !zone.halted).collect()
  }

  pub(crate) fn do_update_inner_redemption_rate_bounds(
    chain_id: &[u8],
    min_inner_redemption_rate: FixedU128,
    max_inner_redemption_rate: FixedU128,
  ) -> DispatchResult {
    let mut host_zone = Self::get_host_zone(chain_id)?;
    ensure!(
      min_inner_redemption_rate >= host_zone.min_redemption_rate
        && max_inner_redemption_rate <= host_zone.max_redemption_rate
        && min_inner_redemption_rate <= max_inner_redemption_rate,
      Error::<T>::InvalidBounds
    );
    host_zone.min_inner_redemption_rate = min_inner_redemption_rate;
    host_zone.max_inner_redemption_rate = max_inner_redemption_rate;
    HostZones::<T>::insert(&host_zone.chain_id, &host_zone);
    Self::deposit_event(Event::InnerRedemptionRateBoundsUpdated {
      chain_id: host_zone.chain_id,
      min_inner_redemption_rate,
      max_inner_redemption_rate,
    });
    Ok(())
  }

  pub(crate) fn do_resume_host_zone(chain_id: &[u8]) -> DispatchResult {
    let mut host_zone = Self::get_host_zone(chain_id)?;
    ensure!(host_zone.halted, Error::<T>::HostZoneNotHalted);
    host_zone.halted = false;
    T::RateLimiter::remove_denom_from_blacklist(&host_zone.st_denom());
    HostZones::<T>::insert(&host_zone.chain_id, &host_zone);
    log::info!(
      target: LOG_TARGET,
      "resumed host zone {:?}",
      core::str::from_utf8(&host_zone.chain_id).unwrap_or_default(),
    );
    Self::deposit_event(Event::HostZoneResumed {
      chain_id: host_zone.chain_id,
    });
    Ok(())
  }

  /// Stores the address of an interchain account once its channel is open.
  /// The first write of a role whitelists the transfers that role receives.
  pub(crate) fn set_host_zone_ica_address(
    host_zone: &mut HostZone<T::AccountId>,
    role: IcaAccountType,
    address: Text,
  ) {
    let first_write = host_zone.ica_address(role).is_none();
    if !host_zone.set_ica_address(role, address.clone()) || !first_write {
      return;
    }
    match role {
      IcaAccountType::Delegation => T::RateLimiter::add_whitelisted_address_pair(
        &T::LocalAddress::convert(host_zone.deposit_address.clone()),
        &address,
      ),
      IcaAccountType::Fee => T::RateLimiter::add_whitelisted_address_pair(
        &address,
        &T::LocalAddress::convert(Self::fee_account()),
      ),
      IcaAccountType::CommunityPoolDeposit => T::RateLimiter::add_whitelisted_address_pair(
        &address,
        &T::LocalAddress::convert(host_zone.community_pool_stake_holding_address.clone()),
      ),
      IcaAccountType::CommunityPoolReturn => T::RateLimiter::add_whitelisted_address_pair(
        &T::LocalAddress::convert(host_zone.community_pool_redeem_holding_address.clone()),
        &address,
      ),
      _ => {}
    }
  }

  fn validator_mut<'a>(
    host_zone: &'a mut HostZone<T::AccountId>,
    address: &[u8],
  ) -> Result<&'a mut Validator, DispatchError> {
    let index = host_zone
      .validator_index(address)
      .ok_or(Error::<T>::ValidatorNotFound)?;
    Ok(&mut host_zone.validators[index])
  }

  pub(crate) fn increment_delegation_changes(
    host_zone: &mut HostZone<T::AccountId>,
    address: &[u8],
  ) -> DispatchResult {
    let validator = Self::validator_mut(host_zone, address)?;
    validator.delegation_changes_in_progress =
      validator.delegation_changes_in_progress.saturating_add(1);
    Ok(())
  }

  pub(crate) fn decrement_delegation_changes(
    host_zone: &mut HostZone<T::AccountId>,
    address: &[u8],
  ) -> DispatchResult {
    let validator = Self::validator_mut(host_zone, address)?;
    validator.delegation_changes_in_progress = validator
      .delegation_changes_in_progress
      .checked_sub(1)
      .ok_or(Error::<T>::InvalidDelegationsInProgress)?;
    Ok(())
  }

  /// Adds `amount` to a validator and to the zone total.
  pub(crate) fn add_delegation_to_validator(
    host_zone: &mut HostZone<T::AccountId>,
    address: &[u8],
    amount: u128,
  ) -> DispatchResult {
    let validator = Self::validator_mut(host_zone, address)?;
    validator.delegation = validator
      .delegation
      .checked_add(amount)
      .ok_or(Error::<T>::ArithmeticOverflow)?;
    host_zone.total_delegations = host_zone
      .total_delegations
      .checked_add(amount)
      .ok_or(Error::<T>::ArithmeticOverflow)?;
    Ok(())
  }

  /// Removes `amount` from a validator and from the zone total.
  pub(crate) fn remove_delegation_from_validator(
    host_zone: &mut HostZone<T::AccountId>,
    address: &[u8],
    amount: u128,
  ) -> DispatchResult {
    let validator = Self::validator_mut(host_zone, address)?;
    validator.delegation = validator
      .delegation
      .checked_sub(amount)
      .ok_or(Error::<T>::InvalidAmount)?;
    host_zone.total_delegations = host_zone
      .total_delegations
      .checked_sub(amount)
      .ok_or(Error::<T>::InvalidAmount)?;
    Ok(())
  }
}
