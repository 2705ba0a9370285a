//! Redemption rate engine and circuit breaker.
//!
//! The rate of a zone is the native tokens it controls divided by the supply
//! of its stToken:
//!
//! ```text
//! R = (deposit_balance + undelegated_balance + tokenized_delegation + native_delegation)
//!     / st_supply
//! ```
//!
//! `deposit_balance` sums deposit records still on the local ledger,
//! `undelegated_balance` those waiting to be delegated on the host, and
//! `tokenized_delegation` the LSM shares already escrowed, valued at their
//! validator's shares-to-tokens rate.

use crate::{
  Config, Error, Event, HostZones, LOG_TARGET, LsmTokenDeposits, ModuleParams, Pallet,
  adapters::{RateLimiter, RedemptionRateOracle, TokenOps},
  types::*,
};
use frame::prelude::*;
use polkadot_sdk::sp_runtime::{FixedPointNumber, FixedU128};

impl<T: Config> Pallet<T> {
  pub(crate) fn update_redemption_rates() {
    for host_zone in Self::active_host_zones() {
      if let Err(e) = Self::update_redemption_rate_for_host_zone(host_zone) {
        log::error!(target: LOG_TARGET, "redemption rate update failed: {:?}", e);
      }
    }
  }

  pub(crate) fn update_redemption_rate_for_host_zone(
    mut host_zone: HostZone<T::AccountId>,
  ) -> DispatchResult {
    let st_supply = T::Tokens::total_issuance(&host_zone.st_denom());
    if st_supply == 0 {
      log::info!(
        target: LOG_TARGET,
        "no st{:?} in circulation, redemption rate unchanged",
        core::str::from_utf8(&host_zone.host_denom).unwrap_or_default(),
      );
      return Ok(());
    }

    let (deposit_balance, undelegated_balance) = Self::deposit_record_balances(&host_zone.chain_id);
    let tokenized_delegation = Self::total_tokenized_delegations(&host_zone);
    let native_tokens_locked = deposit_balance
      .checked_add(undelegated_balance)
      .and_then(|sum| sum.checked_add(tokenized_delegation))
      .and_then(|sum| sum.checked_add(host_zone.total_delegations))
      .ok_or(Error::<T>::ArithmeticOverflow)?;
    let redemption_rate = FixedU128::checked_from_rational(native_tokens_locked, st_supply)
      .ok_or(Error::<T>::ArithmeticOverflow)?;

    log::info!(
      target: LOG_TARGET,
      "{:?} rate components: deposits {}, undelegated {}, tokenized {}, delegated {}, supply {} => {:?} (was {:?})",
      core::str::from_utf8(&host_zone.chain_id).unwrap_or_default(),
      deposit_balance,
      undelegated_balance,
      tokenized_delegation,
      host_zone.total_delegations,
      st_supply,
      redemption_rate,
      host_zone.redemption_rate,
    );

    host_zone.last_redemption_rate = host_zone.redemption_rate;
    host_zone.redemption_rate = redemption_rate;

    let threshold = ModuleParams::<T>::get().validator_slash_query_threshold;
    let checkpoint = Self::slash_query_checkpoint(host_zone.total_delegations, threshold);
    for validator in host_zone.validators.iter_mut() {
      validator.slash_query_checkpoint = checkpoint;
    }
    HostZones::<T>::insert(&host_zone.chain_id, &host_zone);

    Self::deposit_event(Event::RedemptionRateUpdated {
      chain_id: host_zone.chain_id.clone(),
      redemption_rate,
    });

    // Unsafe rates are left for the circuit breaker and never published
    if host_zone.is_redemption_rate_within_bounds(redemption_rate) {
      T::Oracle::post_redemption_rate(&host_zone.st_denom(), redemption_rate);
    }
    Ok(())
  }

  /// `(transfer stage, delegation stage)` deposit record sums of a zone.
  fn deposit_record_balances(chain_id: &[u8]) -> (u128, u128) {
    Self::deposit_records_for_zone(chain_id).into_iter().fold(
      (0u128, 0u128),
      |(deposits, undelegated), record| match record.status {
        DepositRecordStatus::TransferQueue | DepositRecordStatus::TransferInProgress => {
          (deposits.saturating_add(record.amount), undelegated)
        }
        DepositRecordStatus::DelegationQueue | DepositRecordStatus::DelegationInProgress => {
          (deposits, undelegated.saturating_add(record.amount))
        }
      },
    )
  }

  /// Native value of the LSM shares that already left their stakers.
  pub(crate) fn total_tokenized_delegations(host_zone: &HostZone<T::AccountId>) -> u128 {
    LsmTokenDeposits::<T>::iter_prefix_values(&host_zone.chain_id)
      .filter(|deposit| deposit.status != LsmDepositStatus::DepositPending)
      .filter_map(|deposit| {
        let Some(index) = host_zone.validator_index(&deposit.validator_address) else {
          log::error!(
            target: LOG_TARGET,
            "LSM deposit references unknown validator {:?}",
            core::str::from_utf8(&deposit.validator_address).unwrap_or_default(),
          );
          return None;
        };
        Some(
          host_zone.validators[index]
            .shares_to_tokens_rate
            .saturating_mul_int(deposit.amount),
        )
      })
      .fold(0u128, |acc, tokens| acc.saturating_add(tokens))
  }

  /// Halts every active zone whose rate left its safety band. Returns the
  /// number of zones inspected.
  pub(crate) fn check_all_redemption_rates() -> u32 {
    let mut checked = 0u32;
    for host_zone in HostZones::<T>::iter_values() {
      if host_zone.halted {
        continue;
      }
      checked = checked.saturating_add(1);
      if !host_zone.is_redemption_rate_within_bounds(host_zone.redemption_rate) {
        Self::halt_host_zone(host_zone);
      }
    }
    checked
  }

  pub(crate) fn halt_host_zone(mut host_zone: HostZone<T::AccountId>) {
    host_zone.halted = true;
    T::RateLimiter::add_denom_to_blacklist(&host_zone.st_denom());
    HostZones::<T>::insert(&host_zone.chain_id, &host_zone);
    log::error!(
      target: LOG_TARGET,
      "halting {:?}: redemption rate {:?} outside [{:?}, {:?}]",
      core::str::from_utf8(&host_zone.chain_id).unwrap_or_default(),
      host_zone.redemption_rate,
      host_zone.min_inner_redemption_rate,
      host_zone.max_inner_redemption_rate,
    );
    Self::deposit_event(Event::HostZoneHalted {
      chain_id: host_zone.chain_id,
      redemption_rate: host_zone.redemption_rate,
    });
  }
}
