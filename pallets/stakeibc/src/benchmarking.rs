#![cfg(feature = "runtime-benchmarks")]

extern crate alloc;

use crate::*;
use alloc::{format, vec, vec::Vec};
use frame::prelude::*;
use polkadot_sdk::frame_benchmarking::{account, v2::*};
use polkadot_sdk::frame_support::traits::{EnsureOrigin, Hooks};
use polkadot_sdk::frame_system::RawOrigin;
use polkadot_sdk::sp_runtime::{FixedPointNumber, FixedU128, Permill};
use primitives::{EpochIdentifier, IcaAccountType, host_zone_owner, params};

const CHAIN_ID: &[u8] = b"cosmoshub-4";
const CONNECTION: &[u8] = b"connection-0";
const HOST_DENOM: &[u8] = b"uatom";
const IBC_DENOM: &[u8] = b"ibc/27394FB092D2ECCD56123C74F36E4C1F926001CEADA9CA97EA622B25F41E5EB2";
const ST_DENOM: &[u8] = b"stuatom";
const REWARD_CONNECTION: &[u8] = b"connection-1";
const TRADE_CONNECTION: &[u8] = b"connection-2";

#[benchmarks]
mod benches {
  use super::*;

  fn admin<T: Config>() -> Result<T::RuntimeOrigin, BenchmarkError> {
    T::AdminOrigin::try_successful_origin().map_err(|_| BenchmarkError::Weightless)
  }

  fn governance<T: Config>() -> Result<T::RuntimeOrigin, BenchmarkError> {
    T::GovernanceOrigin::try_successful_origin().map_err(|_| BenchmarkError::Weightless)
  }

  fn seed_epoch_trackers<T: Config>() {
    let now = Pallet::<T>::now_nanos();
    let durations = [
      (EpochIdentifier::StrideEpoch, 6 * params::NANOS_PER_HOUR),
      (EpochIdentifier::Day, params::NANOS_PER_DAY),
      (EpochIdentifier::Hour, params::NANOS_PER_HOUR),
      (EpochIdentifier::Mint, params::NANOS_PER_HOUR),
    ];
    for (identifier, duration) in durations {
      if !EpochTrackers::<T>::contains_key(identifier) {
        EpochTrackers::<T>::insert(
          identifier,
          EpochTracker {
            epoch_identifier: identifier,
            epoch_number: 1,
            next_epoch_start_time: now.saturating_add(duration),
            duration,
          },
        );
      }
    }
  }

  fn remote_address(role: IcaAccountType) -> Vec<u8> {
    format!("cosmos1{}", role.as_str().to_ascii_lowercase()).into_bytes()
  }

  fn validator(index: u32) -> Vec<u8> {
    format!("cosmosvaloper1bench{index}").into_bytes()
  }

  /// Registers the benchmark zone, opening every account unless `open` is false.
  fn setup_host_zone<T: Config>(open: bool) -> Result<(), BenchmarkError> {
    seed_epoch_trackers::<T>();
    T::BenchmarkHelper::setup_connection(CONNECTION, CHAIN_ID);
    Pallet::<T>::register_host_zone(
      admin::<T>()?,
      CONNECTION.to_vec(),
      b"cosmos".to_vec(),
      HOST_DENOM.to_vec(),
      IBC_DENOM.to_vec(),
      b"channel-0".to_vec(),
      21,
      FixedU128::from_u32(0),
      FixedU128::from_u32(0),
      true,
      None,
      None,
    )?;
    if open {
      for role in IcaAccountType::HOST_ROLES {
        <Pallet<T> as IcaLifecycleHooks>::on_channel_open_ack(
          CONNECTION,
          &host_zone_owner(CHAIN_ID, role),
          &remote_address(role),
        )?;
      }
    }
    Ok(())
  }

  fn validator_params(n: u32) -> Vec<ValidatorParams> {
    (0..n)
      .map(|i| ValidatorParams {
        name: format!("bench{i}").into_bytes(),
        address: validator(i),
        weight: 1,
      })
      .collect()
  }

  fn setup_validators<T: Config>(n: u32) -> Result<(), BenchmarkError> {
    Pallet::<T>::add_validators(admin::<T>()?, CHAIN_ID.to_vec(), validator_params(n))?;
    Ok(())
  }

  /// Piles the whole zone delegation onto the first validator and mints the
  /// matching stToken supply so the redemption rate stays at one.
  fn skew_delegations<T: Config>(total: u128) -> Result<(), BenchmarkError> {
    let holder: T::AccountId = account("holder", 0, 0);
    T::BenchmarkHelper::fund(&holder, ST_DENOM, total);
    let key = Pallet::<T>::text(CHAIN_ID)?;
    HostZones::<T>::try_mutate(&key, |maybe| -> Result<(), BenchmarkError> {
      let zone = maybe.as_mut().ok_or(BenchmarkError::Weightless)?;
      for (i, v) in zone.validators.iter_mut().enumerate() {
        v.delegation = if i == 0 { total } else { 0 };
      }
      zone.total_delegations = total;
      zone.redemption_rate = FixedU128::from_u32(1);
      Ok(())
    })
  }

  fn route_params() -> TradeRouteParams {
    TradeRouteParams {
      host_chain_id: CHAIN_ID.to_vec(),
      stride_to_reward_connection_id: REWARD_CONNECTION.to_vec(),
      stride_to_trade_connection_id: TRADE_CONNECTION.to_vec(),
      host_to_reward_transfer_channel_id: b"channel-1".to_vec(),
      reward_to_trade_transfer_channel_id: b"channel-2".to_vec(),
      trade_to_host_transfer_channel_id: b"channel-3".to_vec(),
      reward_denom_on_host: b"ibc/USDC".to_vec(),
      reward_denom_on_reward: b"uusdc".to_vec(),
      reward_denom_on_trade: b"ibc/USDC-OSMO".to_vec(),
      host_denom_on_trade: b"ibc/ATOM-OSMO".to_vec(),
      host_denom_on_host: HOST_DENOM.to_vec(),
      pool_id: 1,
      max_allowed_swap_loss_rate: Permill::from_percent(5),
      min_swap_amount: 10,
      max_swap_amount: 10_000,
      min_transfer_amount: 100,
    }
  }

  fn setup_trade_route<T: Config>() -> Result<(), BenchmarkError> {
    setup_host_zone::<T>(true)?;
    T::BenchmarkHelper::setup_connection(REWARD_CONNECTION, b"noble-1");
    T::BenchmarkHelper::setup_connection(TRADE_CONNECTION, b"osmosis-1");
    Pallet::<T>::create_trade_route(governance::<T>()?, route_params())?;
    Ok(())
  }

  #[benchmark]
  fn register_host_zone() -> Result<(), BenchmarkError> {
    seed_epoch_trackers::<T>();
    T::BenchmarkHelper::setup_connection(CONNECTION, CHAIN_ID);
    let origin = admin::<T>()?;

    #[extrinsic_call]
    _(
      origin as T::RuntimeOrigin,
      CONNECTION.to_vec(),
      b"cosmos".to_vec(),
      HOST_DENOM.to_vec(),
      IBC_DENOM.to_vec(),
      b"channel-0".to_vec(),
      21,
      FixedU128::from_u32(0),
      FixedU128::from_u32(0),
      true,
      Some(b"cosmos1communitypool".to_vec()),
      None,
    );

    assert!(Pallet::<T>::host_zones().len() == 1);
    Ok(())
  }

  #[benchmark]
  fn add_validators(n: Linear<1, { MAX_VALIDATORS }>) -> Result<(), BenchmarkError> {
    setup_host_zone::<T>(true)?;
    let origin = admin::<T>()?;

    #[extrinsic_call]
    _(origin as T::RuntimeOrigin, CHAIN_ID.to_vec(), validator_params(n));

    assert_eq!(
      Pallet::<T>::validators(CHAIN_ID).map(|v| v.len() as u32),
      Some(n)
    );
    Ok(())
  }

  #[benchmark]
  fn delete_validator() -> Result<(), BenchmarkError> {
    setup_host_zone::<T>(true)?;
    setup_validators::<T>(MAX_VALIDATORS)?;
    let key = Pallet::<T>::text(CHAIN_ID)?;
    HostZones::<T>::mutate(&key, |maybe| {
      if let Some(zone) = maybe.as_mut() {
        if let Some(last) = zone.validators.last_mut() {
          last.weight = 0;
        }
      }
    });
    let origin = admin::<T>()?;

    #[extrinsic_call]
    _(origin as T::RuntimeOrigin, CHAIN_ID.to_vec(), validator(MAX_VALIDATORS - 1));

    assert_eq!(
      Pallet::<T>::validators(CHAIN_ID).map(|v| v.len() as u32),
      Some(MAX_VALIDATORS - 1)
    );
    Ok(())
  }

  #[benchmark]
  fn change_validator_weights(n: Linear<1, { MAX_VALIDATORS }>) -> Result<(), BenchmarkError> {
    setup_host_zone::<T>(true)?;
    setup_validators::<T>(MAX_VALIDATORS)?;
    let weights = (0..n)
      .map(|i| ValidatorWeight {
        address: validator(i),
        weight: 2,
      })
      .collect::<Vec<_>>();
    let origin = admin::<T>()?;

    #[extrinsic_call]
    _(origin as T::RuntimeOrigin, CHAIN_ID.to_vec(), weights);

    Ok(())
  }

  #[benchmark]
  fn liquid_stake() -> Result<(), BenchmarkError> {
    setup_host_zone::<T>(true)?;
    let staker: T::AccountId = whitelisted_caller();
    T::BenchmarkHelper::fund(&staker, IBC_DENOM, 1_000_000);

    #[extrinsic_call]
    _(RawOrigin::Signed(staker.clone()), 1_000, HOST_DENOM.to_vec());

    assert_eq!(T::Tokens::balance(&staker, ST_DENOM), 1_000);
    Ok(())
  }

  #[benchmark]
  fn redeem_stake() -> Result<(), BenchmarkError> {
    setup_host_zone::<T>(true)?;
    setup_validators::<T>(2)?;
    skew_delegations::<T>(1_000_000)?;
    let redeemer: T::AccountId = whitelisted_caller();
    T::BenchmarkHelper::fund(&redeemer, ST_DENOM, 1_000);

    #[extrinsic_call]
    _(
      RawOrigin::Signed(redeemer.clone()),
      CHAIN_ID.to_vec(),
      1_000,
      b"cosmos1receiver".to_vec(),
    );

    assert_eq!(T::Tokens::balance(&redeemer, ST_DENOM), 0);
    Ok(())
  }

  #[benchmark]
  fn update_inner_redemption_rate_bounds() -> Result<(), BenchmarkError> {
    setup_host_zone::<T>(true)?;
    let origin = governance::<T>()?;
    let min = FixedU128::saturating_from_rational(95, 100);
    let max = FixedU128::saturating_from_rational(110, 100);

    #[extrinsic_call]
    _(origin as T::RuntimeOrigin, CHAIN_ID.to_vec(), min, max);

    Ok(())
  }

  #[benchmark]
  fn resume_host_zone() -> Result<(), BenchmarkError> {
    setup_host_zone::<T>(true)?;
    let zone = Pallet::<T>::get_host_zone(CHAIN_ID)?;
    Pallet::<T>::halt_host_zone(zone);
    let origin = governance::<T>()?;

    #[extrinsic_call]
    _(origin as T::RuntimeOrigin, CHAIN_ID.to_vec());

    assert!(!Pallet::<T>::get_host_zone(CHAIN_ID)?.halted);
    Ok(())
  }

  #[benchmark]
  fn create_trade_route() -> Result<(), BenchmarkError> {
    setup_host_zone::<T>(true)?;
    T::BenchmarkHelper::setup_connection(REWARD_CONNECTION, b"noble-1");
    T::BenchmarkHelper::setup_connection(TRADE_CONNECTION, b"osmosis-1");
    let origin = governance::<T>()?;

    #[extrinsic_call]
    _(origin as T::RuntimeOrigin, route_params());

    assert_eq!(Pallet::<T>::trade_routes().len(), 1);
    Ok(())
  }

  #[benchmark]
  fn update_trade_route() -> Result<(), BenchmarkError> {
    setup_trade_route::<T>()?;
    let origin = governance::<T>()?;

    #[extrinsic_call]
    _(
      origin as T::RuntimeOrigin,
      b"uusdc".to_vec(),
      HOST_DENOM.to_vec(),
      2,
      Permill::from_percent(3),
      1,
      5_000,
    );

    Ok(())
  }

  #[benchmark]
  fn delete_trade_route() -> Result<(), BenchmarkError> {
    setup_trade_route::<T>()?;
    let origin = governance::<T>()?;

    #[extrinsic_call]
    _(origin as T::RuntimeOrigin, b"uusdc".to_vec(), HOST_DENOM.to_vec());

    assert!(Pallet::<T>::trade_routes().is_empty());
    Ok(())
  }

  #[benchmark]
  fn restore_interchain_account() -> Result<(), BenchmarkError> {
    setup_host_zone::<T>(true)?;
    setup_validators::<T>(MAX_VALIDATORS)?;
    let caller: T::AccountId = account("caller", 0, 0);
    let owner = host_zone_owner(CHAIN_ID, IcaAccountType::Delegation);

    #[extrinsic_call]
    _(RawOrigin::Signed(caller), CHAIN_ID.to_vec(), CONNECTION.to_vec(), owner);

    Ok(())
  }

  #[benchmark]
  fn update_validator_shares_exch_rate() -> Result<(), BenchmarkError> {
    setup_host_zone::<T>(true)?;
    setup_validators::<T>(1)?;
    let origin = admin::<T>()?;
    let query_id = NextQueryId::<T>::get();

    #[extrinsic_call]
    _(origin as T::RuntimeOrigin, CHAIN_ID.to_vec(), validator(0));

    assert!(Pallet::<T>::pending_query(query_id).is_some());
    Ok(())
  }

  #[benchmark]
  fn calibrate_delegation() -> Result<(), BenchmarkError> {
    setup_host_zone::<T>(true)?;
    setup_validators::<T>(1)?;
    let origin = admin::<T>()?;
    let query_id = NextQueryId::<T>::get();

    #[extrinsic_call]
    _(origin as T::RuntimeOrigin, CHAIN_ID.to_vec(), validator(0));

    assert!(Pallet::<T>::pending_query(query_id).is_some());
    Ok(())
  }

  #[benchmark]
  fn clear_balance() -> Result<(), BenchmarkError> {
    setup_host_zone::<T>(true)?;
    let origin = admin::<T>()?;

    #[extrinsic_call]
    _(origin as T::RuntimeOrigin, CHAIN_ID.to_vec(), 1_000, b"channel-3".to_vec());

    Ok(())
  }

  #[benchmark]
  fn update_params() -> Result<(), BenchmarkError> {
    let origin = governance::<T>()?;
    let mut params = Params::default();
    params.rebalance_interval = 8;

    #[extrinsic_call]
    _(origin as T::RuntimeOrigin, params.clone());

    assert_eq!(Pallet::<T>::params(), params);
    Ok(())
  }

  #[benchmark]
  fn rebalance_validators() -> Result<(), BenchmarkError> {
    setup_host_zone::<T>(true)?;
    setup_validators::<T>(MAX_VALIDATORS)?;
    skew_delegations::<T>(u128::from(MAX_VALIDATORS) * 1_000)?;
    let origin = admin::<T>()?;

    #[extrinsic_call]
    _(origin as T::RuntimeOrigin, CHAIN_ID.to_vec());

    let zone = Pallet::<T>::get_host_zone(CHAIN_ID)?;
    assert!(zone.validators.iter().all(|v| v.delegation_changes_in_progress > 0));
    Ok(())
  }

  #[benchmark]
  fn submit_query_response() -> Result<(), BenchmarkError> {
    setup_host_zone::<T>(true)?;
    setup_validators::<T>(1)?;
    let query_id = NextQueryId::<T>::get();
    Pallet::<T>::update_validator_shares_exch_rate(admin::<T>()?, CHAIN_ID.to_vec(), validator(0))?;
    let response = RemoteValidator {
      operator_address: Pallet::<T>::text(&validator(0))?,
      tokens: 1_000,
      delegator_shares: FixedU128::saturating_from_integer(1_000u128),
    }
    .encode();
    let caller: T::AccountId = whitelisted_caller();

    #[extrinsic_call]
    _(RawOrigin::Signed(caller), query_id, response, vec![1], 10);

    assert!(Pallet::<T>::pending_query(query_id).is_none());
    Ok(())
  }

  #[benchmark]
  fn check_redemption_rates() -> Result<(), BenchmarkError> {
    setup_host_zone::<T>(true)?;
    setup_validators::<T>(1)?;
    skew_delegations::<T>(1_000)?;

    #[block]
    {
      let _ = Pallet::<T>::on_initialize(1u32.into());
    }

    Ok(())
  }

  #[benchmark]
  fn sweep_expired_query() -> Result<(), BenchmarkError> {
    setup_host_zone::<T>(true)?;
    setup_validators::<T>(1)?;
    let query_id = NextQueryId::<T>::get();
    Pallet::<T>::update_validator_shares_exch_rate(admin::<T>()?, CHAIN_ID.to_vec(), validator(0))?;
    PendingQueries::<T>::mutate(query_id, |maybe| {
      if let Some(query) = maybe.as_mut() {
        query.timeout_timestamp = 0;
      }
    });

    #[block]
    {
      let _ = Pallet::<T>::on_idle(1u32.into(), Weight::MAX);
    }

    assert!(Pallet::<T>::pending_query(query_id).is_none());
    Ok(())
  }

  #[benchmark]
  fn on_epoch_start() -> Result<(), BenchmarkError> {
    setup_host_zone::<T>(true)?;
    setup_validators::<T>(MAX_VALIDATORS)?;
    skew_delegations::<T>(u128::from(MAX_VALIDATORS) * 1_000)?;
    let staker: T::AccountId = whitelisted_caller();
    T::BenchmarkHelper::fund(&staker, IBC_DENOM, 1_000_000);
    Pallet::<T>::liquid_stake(RawOrigin::Signed(staker).into(), 10_000, HOST_DENOM.to_vec())?;
    let epoch = EpochInfo {
      identifier: EpochIdentifier::StrideEpoch,
      epoch_number: 4,
      start_time: Pallet::<T>::now_nanos(),
      duration: 6 * params::NANOS_PER_HOUR,
    };

    #[block]
    {
      let _ = <Pallet<T> as EpochHooks>::on_epoch_start(epoch);
    }

    assert_eq!(
      Pallet::<T>::epoch_tracker(EpochIdentifier::StrideEpoch).map(|t| t.epoch_number),
      Some(4)
    );
    Ok(())
  }

  #[cfg(test)]
  use crate::mock::{Test, new_test_ext};
  #[cfg(test)]
  impl_benchmark_test_suite!(Pallet, new_test_ext(), Test);
}
