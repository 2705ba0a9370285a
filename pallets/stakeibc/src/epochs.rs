//! Epoch tick handler.

use crate::{
  Config, EpochTrackers, Event, LOG_TARGET, ModuleParams, Pallet, adapters::EpochHooks, types::*,
  weights::WeightInfo,
};
use frame::prelude::*;
use primitives::EpochIdentifier;

impl<T: Config> Pallet<T> {
  pub(crate) fn update_epoch_tracker(epoch: &EpochInfo) -> EpochTracker {
    let tracker = EpochTracker {
      epoch_identifier: epoch.identifier,
      epoch_number: epoch.epoch_number,
      next_epoch_start_time: epoch.start_time.saturating_add(epoch.duration),
      duration: epoch.duration,
    };
    EpochTrackers::<T>::insert(epoch.identifier, &tracker);
    tracker
  }

  /// Stride epoch schedule. Interval-gated stages run when the epoch number
  /// is a multiple of their interval.
  fn on_stride_epoch(epoch_number: u64) {
    let params = ModuleParams::<T>::get();
    let due = |interval: u64| interval > 0 && epoch_number % interval == 0;

    Self::create_deposit_records_for_epoch(epoch_number);
    Self::set_withdrawal_addresses();
    if due(params.redemption_rate_interval) {
      Self::update_redemption_rates();
    }
    if due(params.deposit_interval) {
      Self::transfer_existing_deposits_to_host_zones(epoch_number);
    }
    if due(params.delegate_interval) {
      Self::stake_existing_deposits_on_host_zones();
    }
    if due(params.reinvest_interval) {
      Self::reinvest_rewards();
    }
    if due(params.rebalance_interval) {
      Self::rebalance_all_host_zones();
    }
    Self::transfer_lsm_deposits();
    Self::detokenize_lsm_deposits();
  }

  fn on_day_epoch(epoch_number: u64) {
    Self::create_epoch_unbonding_records(epoch_number);
    Self::initiate_all_host_zone_unbondings(epoch_number);
    Self::sweep_all_unbonded_tokens();
    Self::cleanup_epoch_unbonding_records(epoch_number);
  }
}

impl<T: Config> EpochHooks for Pallet<T> {
  fn on_epoch_start(epoch: EpochInfo) -> Weight {
    let tracker = Self::update_epoch_tracker(&epoch);
    log::info!(
      target: LOG_TARGET,
      "{} epoch {} started, next at {}",
      epoch.identifier.as_str(),
      tracker.epoch_number,
      tracker.next_epoch_start_time,
    );
    Self::deposit_event(Event::EpochStarted {
      identifier: epoch.identifier,
      epoch_number: epoch.epoch_number,
    });

    match epoch.identifier {
      EpochIdentifier::StrideEpoch => Self::on_stride_epoch(epoch.epoch_number),
      EpochIdentifier::Day => Self::on_day_epoch(epoch.epoch_number),
      EpochIdentifier::Hour => Self::run_trade_routes(),
      EpochIdentifier::Mint => return T::DbWeight::get().writes(1),
    }
    let zones = Self::active_host_zones().len() as u32;
    T::WeightInfo::on_epoch_start(zones)
  }
}
