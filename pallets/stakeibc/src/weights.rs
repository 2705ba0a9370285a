#![cfg_attr(rustfmt, rustfmt_skip)]
#![allow(unused_parens)]
#![allow(unused_imports)]
#![allow(missing_docs)]

use core::marker::PhantomData;
use polkadot_sdk::frame_support::{
  traits::Get,
  weights::{constants::RocksDbWeight, Weight},
};

pub trait WeightInfo {
  fn register_host_zone() -> Weight;
  fn add_validators(n: u32) -> Weight;
  fn delete_validator() -> Weight;
  fn change_validator_weights(n: u32) -> Weight;
  fn liquid_stake() -> Weight;
  fn lsm_liquid_stake() -> Weight;
  fn redeem_stake() -> Weight;
  fn claim_undelegated_tokens() -> Weight;
  fn update_inner_redemption_rate_bounds() -> Weight;
  fn resume_host_zone() -> Weight;
  fn create_trade_route() -> Weight;
  fn update_trade_route() -> Weight;
  fn delete_trade_route() -> Weight;
  fn restore_interchain_account() -> Weight;
  fn update_validator_shares_exch_rate() -> Weight;
  fn calibrate_delegation() -> Weight;
  fn clear_balance() -> Weight;
  fn update_params() -> Weight;
  fn rebalance_validators() -> Weight;
  fn submit_query_response() -> Weight;
  fn check_redemption_rates(zones: u32) -> Weight;
  fn sweep_expired_query() -> Weight;
  fn on_epoch_start(zones: u32) -> Weight;
}

pub struct SubstrateWeight<T>(PhantomData<T>);
impl<T: polkadot_sdk::frame_system::Config + crate::Config> WeightInfo for SubstrateWeight<T> {
  fn register_host_zone() -> Weight {
    Weight::from_parts(60_000_000, 4000)
      .saturating_add(T::DbWeight::get().reads(6))
      .saturating_add(T::DbWeight::get().writes(5))
  }

  fn add_validators(n: u32) -> Weight {
    Weight::from_parts(20_000_000u64.saturating_add(u64::from(n).saturating_mul(1_500_000)), 6000)
      .saturating_add(T::DbWeight::get().reads(2))
      .saturating_add(T::DbWeight::get().writes(1))
  }

  fn delete_validator() -> Weight {
    Weight::from_parts(18_000_000, 6000)
      .saturating_add(T::DbWeight::get().reads_writes(1, 1))
  }

  fn change_validator_weights(n: u32) -> Weight {
    Weight::from_parts(18_000_000u64.saturating_add(u64::from(n).saturating_mul(1_000_000)), 6000)
      .saturating_add(T::DbWeight::get().reads(2))
      .saturating_add(T::DbWeight::get().writes(1))
  }

  fn liquid_stake() -> Weight {
    Weight::from_parts(45_000_000, 3500)
      .saturating_add(T::DbWeight::get().reads(5))
      .saturating_add(T::DbWeight::get().writes(4))
  }

  fn lsm_liquid_stake() -> Weight {
    Weight::from_parts(70_000_000, 6500)
      .saturating_add(T::DbWeight::get().reads(7))
      .saturating_add(T::DbWeight::get().writes(7))
  }

  fn redeem_stake() -> Weight {
    Weight::from_parts(50_000_000, 5000)
      .saturating_add(T::DbWeight::get().reads(5))
      .saturating_add(T::DbWeight::get().writes(4))
  }

  fn claim_undelegated_tokens() -> Weight {
    Weight::from_parts(40_000_000, 4000)
      .saturating_add(T::DbWeight::get().reads(4))
      .saturating_add(T::DbWeight::get().writes(2))
  }

  fn update_inner_redemption_rate_bounds() -> Weight {
    Weight::from_parts(15_000_000, 6000)
      .saturating_add(T::DbWeight::get().reads_writes(1, 1))
  }

  fn resume_host_zone() -> Weight {
    Weight::from_parts(15_000_000, 6000)
      .saturating_add(T::DbWeight::get().reads_writes(1, 1))
  }

  fn create_trade_route() -> Weight {
    Weight::from_parts(40_000_000, 3000)
      .saturating_add(T::DbWeight::get().reads(3))
      .saturating_add(T::DbWeight::get().writes(1))
  }

  fn update_trade_route() -> Weight {
    Weight::from_parts(15_000_000, 2000)
      .saturating_add(T::DbWeight::get().reads_writes(1, 1))
  }

  fn delete_trade_route() -> Weight {
    Weight::from_parts(12_000_000, 2000)
      .saturating_add(T::DbWeight::get().reads_writes(1, 1))
  }

  fn restore_interchain_account() -> Weight {
    Weight::from_parts(80_000_000, 8000)
      .saturating_add(T::DbWeight::get().reads(20))
      .saturating_add(T::DbWeight::get().writes(20))
  }

  fn update_validator_shares_exch_rate() -> Weight {
    Weight::from_parts(25_000_000, 6000)
      .saturating_add(T::DbWeight::get().reads(3))
      .saturating_add(T::DbWeight::get().writes(2))
  }

  fn calibrate_delegation() -> Weight {
    Weight::from_parts(25_000_000, 6000)
      .saturating_add(T::DbWeight::get().reads(3))
      .saturating_add(T::DbWeight::get().writes(2))
  }

  fn clear_balance() -> Weight {
    Weight::from_parts(30_000_000, 6000)
      .saturating_add(T::DbWeight::get().reads(2))
      .saturating_add(T::DbWeight::get().writes(1))
  }

  fn update_params() -> Weight {
    Weight::from_parts(8_000_000, 600)
      .saturating_add(T::DbWeight::get().writes(1))
  }

  fn rebalance_validators() -> Weight {
    Weight::from_parts(90_000_000, 8000)
      .saturating_add(T::DbWeight::get().reads(3))
      .saturating_add(T::DbWeight::get().writes(3))
  }

  fn submit_query_response() -> Weight {
    Weight::from_parts(90_000_000, 8000)
      .saturating_add(T::DbWeight::get().reads(6))
      .saturating_add(T::DbWeight::get().writes(6))
  }

  fn check_redemption_rates(zones: u32) -> Weight {
    Weight::from_parts(2_000_000u64.saturating_add(u64::from(zones).saturating_mul(4_000_000)), 0)
      .saturating_add(T::DbWeight::get().reads(u64::from(zones)))
  }

  fn sweep_expired_query() -> Weight {
    Weight::from_parts(30_000_000, 2000)
      .saturating_add(T::DbWeight::get().reads_writes(3, 3))
  }

  fn on_epoch_start(zones: u32) -> Weight {
    Weight::from_parts(10_000_000u64.saturating_add(u64::from(zones).saturating_mul(120_000_000)), 8000)
      .saturating_add(T::DbWeight::get().reads_writes(u64::from(zones).saturating_mul(12), u64::from(zones).saturating_mul(10)))
  }
}

impl WeightInfo for () {
  fn register_host_zone() -> Weight { Weight::from_parts(60_000_000, 4000) }
  fn add_validators(n: u32) -> Weight { Weight::from_parts(20_000_000u64.saturating_add(u64::from(n).saturating_mul(1_500_000)), 6000) }
  fn delete_validator() -> Weight { Weight::from_parts(18_000_000, 6000) }
  fn change_validator_weights(n: u32) -> Weight { Weight::from_parts(18_000_000u64.saturating_add(u64::from(n).saturating_mul(1_000_000)), 6000) }
  fn liquid_stake() -> Weight { Weight::from_parts(45_000_000, 3500) }
  fn lsm_liquid_stake() -> Weight { Weight::from_parts(70_000_000, 6500) }
  fn redeem_stake() -> Weight { Weight::from_parts(50_000_000, 5000) }
  fn claim_undelegated_tokens() -> Weight { Weight::from_parts(40_000_000, 4000) }
  fn update_inner_redemption_rate_bounds() -> Weight { Weight::from_parts(15_000_000, 6000) }
  fn resume_host_zone() -> Weight { Weight::from_parts(15_000_000, 6000) }
  fn create_trade_route() -> Weight { Weight::from_parts(40_000_000, 3000) }
  fn update_trade_route() -> Weight { Weight::from_parts(15_000_000, 2000) }
  fn delete_trade_route() -> Weight { Weight::from_parts(12_000_000, 2000) }
  fn restore_interchain_account() -> Weight { Weight::from_parts(80_000_000, 8000) }
  fn update_validator_shares_exch_rate() -> Weight { Weight::from_parts(25_000_000, 6000) }
  fn calibrate_delegation() -> Weight { Weight::from_parts(25_000_000, 6000) }
  fn clear_balance() -> Weight { Weight::from_parts(30_000_000, 6000) }
  fn update_params() -> Weight { Weight::from_parts(8_000_000, 600) }
  fn rebalance_validators() -> Weight { Weight::from_parts(90_000_000, 8000) }
  fn submit_query_response() -> Weight { Weight::from_parts(90_000_000, 8000) }
  fn check_redemption_rates(zones: u32) -> Weight { Weight::from_parts(2_000_000u64.saturating_add(u64::from(zones).saturating_mul(4_000_000)), 0) }
  fn sweep_expired_query() -> Weight { Weight::from_parts(30_000_000, 2000) }
  fn on_epoch_start(zones: u32) -> Weight { Weight::from_parts(10_000_000u64.saturating_add(u64::from(zones).saturating_mul(120_000_000)), 8000) }
}
