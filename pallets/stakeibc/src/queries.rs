//! Read-only views for RPC and runtime API consumers.

use crate::{
  Config, EpochTrackers, HostZones, LsmTokenDeposits, Pallet, TradeRoutes, UserRedemptionRecords,
  adapters::IcaController, types::*,
};
use alloc::{format, string::String, vec::Vec};
use primitives::{EpochIdentifier, IcaOwner, params, parse_owner};

/// Renders unix nanoseconds as `YYYY-MM-DD hh:mm:ss[.fraction] +0000 UTC`.
pub fn format_utc(nanos: u64) -> String {
  let secs = nanos / params::NANOS_PER_SECOND;
  let fraction = nanos % params::NANOS_PER_SECOND;
  let days = (secs / 86_400) as i64;
  let rem = secs % 86_400;
  let (year, month, day) = civil_from_days(days);
  let mut out = format!(
    "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
    year,
    month,
    day,
    rem / 3_600,
    (rem % 3_600) / 60,
    rem % 60,
  );
  if fraction > 0 {
    let digits = format!("{:09}", fraction);
    out.push('.');
    out.push_str(digits.trim_end_matches('0'));
  }
  out.push_str(" +0000 UTC");
  out
}

/// Proleptic Gregorian date of a day count since 1970-01-01.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
  let z = days + 719_468;
  let era = z.div_euclid(146_097);
  let doe = z.rem_euclid(146_097);
  let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
  let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
  let mp = (5 * doy + 2) / 153;
  let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
  let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
  let year = yoe + era * 400 + i64::from(month <= 2);
  (year, month, day)
}

impl<T: Config> Pallet<T> {
  pub fn host_zones() -> Vec<HostZone<T::AccountId>> {
    let mut zones: Vec<_> = HostZones::<T>::iter_values().collect();
    zones.sort_by(|a, b| a.chain_id.cmp(&b.chain_id));
    zones
  }

  pub fn validators(chain_id: &[u8]) -> Option<Vec<Validator>> {
    Self::get_host_zone(chain_id)
      .ok()
      .map(|zone| zone.validators.into_inner())
  }

  pub fn epoch_trackers() -> Vec<EpochTracker> {
    let mut trackers: Vec<_> = EpochTrackers::<T>::iter_values().collect();
    trackers.sort_by_key(|tracker| tracker.epoch_identifier);
    trackers
  }

  pub fn trade_routes() -> Vec<TradeRoute> {
    TradeRoutes::<T>::iter_values().collect()
  }

  pub fn next_packet_sequence(port_id: &[u8], channel_id: &[u8]) -> Option<u64> {
    T::IcaController::next_sequence_send(port_id, channel_id)
  }

  pub fn lsm_deposits(chain_id: &[u8]) -> Vec<LsmTokenDeposit<T::AccountId>> {
    let Ok(chain_id) = Self::text(chain_id) else {
      return Vec::new();
    };
    let mut deposits: Vec<_> = LsmTokenDeposits::<T>::iter_prefix_values(&chain_id).collect();
    deposits.sort_by_key(|deposit| deposit.deposit_id);
    deposits
  }

  /// Redemptions whose claim transaction is still in flight.
  pub fn pending_claims() -> Vec<UserRedemptionRecord> {
    UserRedemptionRecords::<T>::iter_values()
      .filter(|record| record.claim_is_pending)
      .collect()
  }

  /// Address registered for an owner string (`{chain_id}.{ROLE}` or a trade
  /// route owner).
  pub fn interchain_account_from_owner(owner: &[u8]) -> Option<Text> {
    match parse_owner(owner)? {
      IcaOwner::HostZone { chain_id, role } => {
        Self::get_host_zone(&chain_id).ok()?.ica_address(role).cloned()
      }
      IcaOwner::TradeRoute {
        chain_id,
        route_id,
        role,
      } => TradeRoutes::<T>::iter_values()
        .filter(|route| route.route_id() == route_id)
        .flat_map(|route| [route.host_account, route.reward_account, route.trade_account])
        .find(|account| account.account_type == role && account.chain_id.as_slice() == chain_id)
        .and_then(|account| account.address),
    }
  }

  /// Outstanding redemptions of a comma-separated list of receivers with an
  /// estimated completion time. Records already undelegated report their
  /// real unbonding time; queued ones assume the next undelegation round and
  /// `(unbonding_frequency - 1) * 7` days of unbonding.
  pub fn address_unbondings(addresses: &[u8]) -> Vec<AddressUnbonding> {
    let targets: Vec<&[u8]> = addresses
      .split(|b| *b == b',')
      .map(|address| address.trim_ascii())
      .filter(|address| !address.is_empty())
      .collect();
    let Ok(day) = Self::get_epoch_tracker(EpochIdentifier::Day) else {
      return Vec::new();
    };

    let mut unbondings = Vec::new();
    for record in Self::list_epoch_unbonding_records() {
      for unbonding in &record.host_zone_unbondings {
        for id in unbonding.user_redemption_records.iter() {
          let Some(redemption) = UserRedemptionRecords::<T>::get(id) else {
            continue;
          };
          if !targets.contains(&redemption.receiver.as_slice()) {
            continue;
          }
          let mut unbonding_time = unbonding.unbonding_time;
          if unbonding_time == 0 {
            let Ok(host_zone) = Self::get_host_zone(&unbonding.host_zone_id) else {
              continue;
            };
            let frequency = host_zone.unbonding_frequency();
            let days_until = frequency - day.epoch_number % frequency;
            let start = day
              .next_epoch_start_time
              .saturating_add((days_until - 1).saturating_mul(params::NANOS_PER_DAY));
            unbonding_time = start.saturating_add(
              frequency
                .saturating_sub(1)
                .saturating_mul(params::WEEK_DAYS)
                .saturating_mul(params::NANOS_PER_DAY),
            );
          }
          unbonding_time = unbonding_time.saturating_add(params::NANOS_PER_DAY);
          unbondings.push(AddressUnbonding {
            address: redemption.receiver.to_vec(),
            receiver: redemption.receiver.to_vec(),
            unbonding_estimated_time: format_utc(unbonding_time).into_bytes(),
            amount: redemption.native_token_amount,
            denom: redemption.denom.to_vec(),
            claim_is_pending: redemption.claim_is_pending,
            epoch_number: redemption.epoch_number,
          });
        }
      }
    }
    unbondings
  }
}
