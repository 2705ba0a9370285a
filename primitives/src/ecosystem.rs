//! Constants shared by the staking pallet and any runtime embedding it.

/// Pallet identifiers for deriving pallet-owned accounts.
///
/// Used with `PalletId::into_sub_account_truncating()` to derive the deposit,
/// fee and community pool module accounts of every host zone.
pub mod pallet_ids {
  /// Stakeibc pallet ID
  pub const STAKEIBC_PALLET_ID: &[u8; 8] = b"py/stkib";
}

/// Protocol parameters and defaults.
pub mod params {
  pub const NANOS_PER_SECOND: u64 = 1_000_000_000;

  pub const NANOS_PER_MINUTE: u64 = 60 * NANOS_PER_SECOND;

  pub const NANOS_PER_HOUR: u64 = 60 * NANOS_PER_MINUTE;

  /// One day in nanoseconds (86_400_000_000_000).
  pub const NANOS_PER_DAY: u64 = 24 * NANOS_PER_HOUR;

  /// Stride epochs per day; the rebalance cadence defaults to once a day.
  pub const STRIDE_EPOCHS_PER_DAY: u64 = 4;

  /// Default cap on messages bundled into one interchain transaction.
  pub const DEFAULT_MAX_MESSAGES_PER_ICA_TX: u32 = 32;

  /// Default outer redemption rate bounds, in percent of 1.0.
  pub const DEFAULT_MIN_REDEMPTION_RATE_THRESHOLD: u64 = 90;
  pub const DEFAULT_MAX_REDEMPTION_RATE_THRESHOLD: u64 = 150;

  /// Share of reinvested rewards sent to the fee account.
  pub const DEFAULT_STRIDE_COMMISSION: u64 = 10;

  /// Largest slash the coordinator applies without operator review.
  pub const MAX_SLASH_PERCENT: u64 = 10;

  /// Default slash query checkpoint, percent of total delegations.
  pub const DEFAULT_VALIDATOR_SLASH_QUERY_THRESHOLD: u64 = 1;

  /// Default validator weight cap, percent of the zone's total weight. At
  /// 100 the cap never binds, so a zone may start with a single validator;
  /// governance lowers it through `update_params`.
  pub const DEFAULT_VALIDATOR_WEIGHT_CAP: u64 = 100;

  /// Relative timeout for local to host transfers.
  pub const DEFAULT_IBC_TRANSFER_TIMEOUT_NANOS: u64 = 30 * NANOS_PER_MINUTE;

  /// Minimum lifetime of an outbound ICA transaction.
  pub const DEFAULT_ICA_TIMEOUT_NANOS: u64 = 5 * NANOS_PER_MINUTE;

  /// Timeout of the validator rate query issued before an LSM stake completes.
  pub const LSM_SLASH_QUERY_TIMEOUT_NANOS: u64 = 5 * NANOS_PER_MINUTE;

  /// Timeout for LSM detokenization transactions.
  pub const DETOKENIZATION_TIMEOUT_NANOS: u64 = 24 * NANOS_PER_HOUR;

  /// Timeout for operator-triggered validator queries.
  pub const VALIDATOR_QUERY_TIMEOUT_NANOS: u64 = 24 * NANOS_PER_HOUR;

  /// Unbonding cadence is derived as `unbonding_period / WEEK_DAYS + 1`.
  pub const WEEK_DAYS: u64 = 7;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn pallet_ids_are_correct_length() {
    assert_eq!(pallet_ids::STAKEIBC_PALLET_ID.len(), 8);
  }

  #[test]
  fn day_is_standard() {
    assert_eq!(params::NANOS_PER_DAY, 86_400_000_000_000);
  }

  #[test]
  fn default_bounds_are_ordered() {
    assert!(
      params::DEFAULT_MIN_REDEMPTION_RATE_THRESHOLD < params::DEFAULT_MAX_REDEMPTION_RATE_THRESHOLD
    );
  }
}
