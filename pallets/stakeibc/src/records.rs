//! Deposit, epoch unbonding, user redemption and LSM deposit records.

use crate::{
  Config, DepositRecords, EpochUnbondingRecords, Error, LsmTokenDeposits, NextDepositRecordId,
  NextLsmDepositId, Pallet, UserRedemptionRecords, types::*,
};
use alloc::vec::Vec;
use frame::prelude::*;

impl<T: Config> Pallet<T> {
  /// Opens an empty `TransferQueue` record for `host_zone` in a stride epoch.
  pub(crate) fn create_deposit_record(
    host_zone: &HostZone<T::AccountId>,
    epoch_number: u64,
  ) -> Result<u64, DispatchError> {
    Self::append_deposit_record(
      host_zone.chain_id.clone(),
      host_zone.host_denom.clone(),
      0,
      DepositRecordStatus::TransferQueue,
      DepositRecordSource::Stride,
      epoch_number,
    )
  }

  pub(crate) fn append_deposit_record(
    host_zone_id: Text,
    denom: Text,
    amount: u128,
    status: DepositRecordStatus,
    source: DepositRecordSource,
    deposit_epoch_number: u64,
  ) -> Result<u64, DispatchError> {
    let id = NextDepositRecordId::<T>::get();
    NextDepositRecordId::<T>::put(id.checked_add(1).ok_or(Error::<T>::ArithmeticOverflow)?);
    DepositRecords::<T>::insert(
      id,
      DepositRecord {
        id,
        amount,
        denom,
        host_zone_id,
        status,
        deposit_epoch_number,
        source,
        delegation_txs_in_progress: 0,
      },
    );
    Ok(id)
  }

  pub(crate) fn get_deposit_record(id: u64) -> Result<DepositRecord, DispatchError> {
    DepositRecords::<T>::get(id).ok_or_else(|| Error::<T>::RecordNotFound.into())
  }

  /// The stride-sourced `TransferQueue` record a liquid stake accrues to.
  pub(crate) fn get_transfer_deposit_record_by_epoch_and_chain(
    epoch_number: u64,
    chain_id: &[u8],
  ) -> Option<DepositRecord> {
    DepositRecords::<T>::iter_values().find(|record| {
      record.deposit_epoch_number == epoch_number
        && record.host_zone_id.as_slice() == chain_id
        && record.status == DepositRecordStatus::TransferQueue
        && record.source == DepositRecordSource::Stride
    })
  }

  pub(crate) fn deposit_records_for_zone(chain_id: &[u8]) -> Vec<DepositRecord> {
    let mut records: Vec<_> = DepositRecords::<T>::iter_values()
      .filter(|record| record.host_zone_id.as_slice() == chain_id)
      .collect();
    records.sort_by_key(|record| record.id);
    records
  }

  /// Inserts `unbonding` unless the epoch already has one for the zone.
  pub(crate) fn add_host_zone_to_epoch_unbonding_record(
    epoch_number: u64,
    unbonding: HostZoneUnbonding,
  ) {
    if !EpochUnbondingRecords::<T>::contains_key(epoch_number, &unbonding.host_zone_id) {
      EpochUnbondingRecords::<T>::insert(epoch_number, unbonding.host_zone_id.clone(), unbonding);
    }
  }

  pub(crate) fn get_host_zone_unbonding(
    epoch_number: u64,
    chain_id: &Text,
  ) -> Result<HostZoneUnbonding, DispatchError> {
    EpochUnbondingRecords::<T>::get(epoch_number, chain_id)
      .ok_or_else(|| Error::<T>::RecordNotFound.into())
  }

  /// Assembles the record of one day epoch.
  pub fn get_epoch_unbonding_record(epoch_number: u64) -> Option<EpochUnbondingRecord> {
    let mut host_zone_unbondings: Vec<_> =
      EpochUnbondingRecords::<T>::iter_prefix_values(epoch_number).collect();
    if host_zone_unbondings.is_empty() {
      return None;
    }
    host_zone_unbondings.sort_by(|a, b| a.host_zone_id.cmp(&b.host_zone_id));
    Some(EpochUnbondingRecord {
      epoch_number,
      host_zone_unbondings,
    })
  }

  /// All epoch unbonding records, oldest epoch first.
  pub fn list_epoch_unbonding_records() -> Vec<EpochUnbondingRecord> {
    let mut epochs: Vec<u64> = EpochUnbondingRecords::<T>::iter_keys()
      .map(|(epoch, _)| epoch)
      .collect();
    epochs.sort_unstable();
    epochs.dedup();
    epochs
      .into_iter()
      .filter_map(Self::get_epoch_unbonding_record)
      .collect()
  }

  /// `(epoch, unbonding)` pairs of one zone, oldest epoch first.
  pub(crate) fn host_zone_unbondings_for_zone(chain_id: &[u8]) -> Vec<(u64, HostZoneUnbonding)> {
    let mut unbondings: Vec<_> = EpochUnbondingRecords::<T>::iter()
      .filter(|(_, zone, _)| zone.as_slice() == chain_id)
      .map(|(epoch, _, unbonding)| (epoch, unbonding))
      .collect();
    unbondings.sort_by_key(|(epoch, _)| *epoch);
    unbondings
  }

  pub(crate) fn set_host_zone_unbonding_status(
    chain_id: &Text,
    epochs: &[u64],
    status: HostZoneUnbondingStatus,
  ) -> DispatchResult {
    for epoch in epochs {
      EpochUnbondingRecords::<T>::try_mutate(epoch, chain_id, |maybe| -> DispatchResult {
        let unbonding = maybe.as_mut().ok_or(Error::<T>::RecordNotFound)?;
        unbonding.status = status;
        Ok(())
      })?;
    }
    Ok(())
  }

  pub(crate) fn remove_epoch_unbonding_record(epoch_number: u64) {
    let _ = EpochUnbondingRecords::<T>::clear_prefix(epoch_number, u32::MAX, None);
  }

  /// `{chain_id}.{epoch}.{receiver}`
  pub(crate) fn user_redemption_record_id(
    chain_id: &[u8],
    epoch_number: u64,
    receiver: &[u8],
  ) -> Result<RecordId, DispatchError> {
    let mut id = Vec::with_capacity(chain_id.len() + receiver.len() + 22);
    id.extend_from_slice(chain_id);
    id.push(b'.');
    id.extend_from_slice(alloc::format!("{epoch_number}").as_bytes());
    id.push(b'.');
    id.extend_from_slice(receiver);
    RecordId::try_from(id).map_err(|_| Error::<T>::StringTooLong.into())
  }

  pub(crate) fn next_lsm_deposit_id() -> Result<u64, DispatchError> {
    let id = NextLsmDepositId::<T>::get();
    NextLsmDepositId::<T>::put(id.checked_add(1).ok_or(Error::<T>::ArithmeticOverflow)?);
    Ok(id)
  }

  pub(crate) fn get_lsm_deposit(
    chain_id: &Text,
    denom: &Text,
  ) -> Result<LsmTokenDeposit<T::AccountId>, DispatchError> {
    LsmTokenDeposits::<T>::get(chain_id, denom).ok_or_else(|| Error::<T>::RecordNotFound.into())
  }

  pub(crate) fn lsm_deposits_with_status(
    chain_id: &Text,
    status: LsmDepositStatus,
  ) -> Vec<LsmTokenDeposit<T::AccountId>> {
    let mut deposits: Vec<_> = LsmTokenDeposits::<T>::iter_prefix_values(chain_id)
      .filter(|deposit| deposit.status == status)
      .collect();
    deposits.sort_by_key(|deposit| deposit.deposit_id);
    deposits
  }

  pub(crate) fn get_user_redemption_record(
    id: &RecordId,
  ) -> Result<UserRedemptionRecord, DispatchError> {
    UserRedemptionRecords::<T>::get(id).ok_or_else(|| Error::<T>::RecordNotFound.into())
  }
}
