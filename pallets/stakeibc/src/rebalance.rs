//! Weight targets and the redelegation rebalancer.

use crate::{Config, Error, HostZones, LOG_TARGET, Pallet, types::*};
use alloc::vec::Vec;
use frame::prelude::*;
use primitives::IcaAccountType;

/// Greedy matching of over-delegated sources against under-delegated
/// destinations. Both sides are visited largest first, ties by address.
pub fn pair_rebalancings(
  mut sources: Vec<(Text, u128)>,
  mut destinations: Vec<(Text, u128)>,
) -> Vec<Rebalancing> {
  let order = |a: &(Text, u128), b: &(Text, u128)| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0));
  sources.sort_by(order);
  destinations.sort_by(order);

  let mut rebalancings = Vec::new();
  let mut dst = 0usize;
  for (src_validator, mut remaining) in sources {
    while remaining > 0 && dst < destinations.len() {
      let (dst_validator, needed) = &mut destinations[dst];
      let amount = remaining.min(*needed);
      rebalancings.push(Rebalancing {
        src_validator: src_validator.clone(),
        dst_validator: dst_validator.clone(),
        amount,
      });
      remaining -= amount;
      *needed -= amount;
      if *needed == 0 {
        dst += 1;
      }
    }
    if dst == destinations.len() {
      break;
    }
  }
  rebalancings
}

impl<T: Config> Pallet<T> {
  /// `floor(total * weight / total_weight)` per validator, in list order. The
  /// rounding remainder goes to the heaviest validator, ties by address.
  pub(crate) fn target_delegations(
    validators: &[Validator],
    total: u128,
  ) -> Result<Vec<u128>, DispatchError> {
    let total_weight = validators
      .iter()
      .fold(0u128, |acc, v| acc.saturating_add(v.weight as u128));
    ensure!(total_weight > 0, Error::<T>::NoValidatorWeights);

    let mut targets = validators
      .iter()
      .map(|v| {
        mul_div_floor(total, v.weight as u128, total_weight).ok_or(Error::<T>::ArithmeticOverflow)
      })
      .collect::<Result<Vec<_>, _>>()?;
    let assigned = targets.iter().fold(0u128, |acc, t| acc.saturating_add(*t));
    let remainder = total.saturating_sub(assigned);
    if remainder > 0 {
      let heaviest = validators
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.weight.cmp(&b.weight).then_with(|| b.address.cmp(&a.address)))
        .map(|(i, _)| i)
        .ok_or(Error::<T>::NoValidatorWeights)?;
      targets[heaviest] = targets[heaviest].saturating_add(remainder);
    }
    Ok(targets)
  }

  /// Redelegations that bring every validator to its weight target.
  pub(crate) fn compute_rebalancings(
    host_zone: &HostZone<T::AccountId>,
  ) -> Result<Vec<Rebalancing>, DispatchError> {
    let targets = Self::target_delegations(&host_zone.validators, host_zone.total_delegations)?;
    let mut sources = Vec::new();
    let mut destinations = Vec::new();
    for (validator, target) in host_zone.validators.iter().zip(targets) {
      if validator.delegation > target {
        sources.push((validator.address.clone(), validator.delegation - target));
      } else if target > validator.delegation {
        destinations.push((validator.address.clone(), target - validator.delegation));
      }
    }
    Ok(pair_rebalancings(sources, destinations))
  }

  /// Submits the redelegations of one zone. Returns the number of messages.
  pub(crate) fn rebalance_delegations(
    host_zone: &HostZone<T::AccountId>,
  ) -> Result<u32, DispatchError> {
    ensure!(!host_zone.halted, Error::<T>::HaltedHostZone);
    ensure!(
      host_zone
        .validators
        .iter()
        .all(|v| v.delegation_changes_in_progress == 0),
      Error::<T>::DelegationChangesInProgress
    );
    let delegation_address = Self::host_ica_address(host_zone, IcaAccountType::Delegation)?;
    let rebalancings = Self::compute_rebalancings(host_zone)?;
    if rebalancings.is_empty() {
      return Ok(0);
    }

    let mut host_zone = host_zone.clone();
    let timeout = Self::ica_timeout()?;
    let batch_size = host_zone.max_messages_per_ica_tx.max(1) as usize;
    let mut submitted = 0u32;
    for batch in rebalancings.chunks(batch_size) {
      let msgs = batch
        .iter()
        .map(|r| RemoteMsg::Redelegate {
          delegator: delegation_address.clone(),
          src_validator: r.src_validator.clone(),
          dst_validator: r.dst_validator.clone(),
          amount: r.amount,
          denom: host_zone.host_denom.clone(),
        })
        .collect();
      let callback = RebalanceCallback {
        host_zone_id: host_zone.chain_id.clone(),
        rebalancings: batch.to_vec(),
      };
      if let Err(e) = Self::submit_host_tx(
        &host_zone,
        IcaAccountType::Delegation,
        msgs,
        timeout,
        Some((IcaCallbackId::Rebalance, callback.encode())),
      ) {
        if submitted == 0 {
          return Err(e);
        }
        log::error!(
          target: LOG_TARGET,
          "rebalance of {:?} stopped after {} redelegations: {:?}",
          core::str::from_utf8(&host_zone.chain_id).unwrap_or_default(),
          submitted,
          e,
        );
        return Ok(submitted);
      }
      for r in batch {
        Self::increment_delegation_changes(&mut host_zone, &r.src_validator)?;
        Self::increment_delegation_changes(&mut host_zone, &r.dst_validator)?;
      }
      submitted = submitted.saturating_add(batch.len() as u32);
      HostZones::<T>::insert(&host_zone.chain_id, &host_zone);
    }
    log::info!(
      target: LOG_TARGET,
      "submitted {} redelegations on {:?}",
      submitted,
      core::str::from_utf8(&host_zone.chain_id).unwrap_or_default(),
    );
    Ok(submitted)
  }

  pub(crate) fn rebalance_all_host_zones() {
    for host_zone in Self::active_host_zones() {
      if host_zone.delegation_ica_address.is_none() || host_zone.validators.is_empty() {
        continue;
      }
      if let Err(e) = Self::rebalance_delegations(&host_zone) {
        log::warn!(
          target: LOG_TARGET,
          "rebalance of {:?} skipped: {:?}",
          core::str::from_utf8(&host_zone.chain_id).unwrap_or_default(),
          e,
        );
      }
    }
  }

  pub(crate) fn rebalance_callback(args: RebalanceCallback, status: AckStatus) -> DispatchResult {
    let mut host_zone = Self::get_host_zone(&args.host_zone_id)?;
    for r in &args.rebalancings {
      Self::decrement_delegation_changes(&mut host_zone, &r.src_validator)?;
      Self::decrement_delegation_changes(&mut host_zone, &r.dst_validator)?;
    }
    if status == AckStatus::Success {
      for r in &args.rebalancings {
        Self::remove_delegation_from_validator(&mut host_zone, &r.src_validator, r.amount)?;
        Self::add_delegation_to_validator(&mut host_zone, &r.dst_validator, r.amount)?;
      }
    } else {
      log::error!(
        target: LOG_TARGET,
        "rebalance on {:?} failed ({:?})",
        core::str::from_utf8(&args.host_zone_id).unwrap_or_default(),
        status,
      );
    }
    HostZones::<T>::insert(&host_zone.chain_id, &host_zone);
    Ok(())
  }
}
