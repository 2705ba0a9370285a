//! Reward trade routes.
//!
//! Foreign reward tokens collected in a zone's withdrawal account are
//! unwound through the reward zone to a trade account, swapped for the host
//! denom on the trade zone's pool and sent back to the withdrawal account,
//! where the regular reinvestment picks them up. Every leg is driven by a
//! balance query issued on the hour epoch.

use crate::{
  Config, Error, Event, LOG_TARGET, Pallet, TradeRoutes, adapters::IcaController, types::*,
};
use alloc::{format, string::String, vec, vec::Vec};
use frame::prelude::*;
use polkadot_sdk::sp_runtime::{
  FixedPointNumber, FixedU128,
  traits::{CheckedDiv, CheckedMul, One, Zero},
};
use primitives::{EpochIdentifier, IcaAccountType, host_zone_owner, params, trade_route_owner};
use serde::Serialize;

/// Packet-forward memo of the first transfer leg.
#[derive(Serialize)]
struct ForwardMemo<'a> {
  forward: ForwardMetadata<'a>,
}

#[derive(Serialize)]
struct ForwardMetadata<'a> {
  receiver: &'a str,
  port: &'a str,
  channel: &'a str,
  timeout: String,
  retries: u8,
}

impl<T: Config> Pallet<T> {
  pub(crate) fn do_create_trade_route(p: TradeRouteParams) -> DispatchResult {
    let host_zone = Self::get_host_zone(&p.host_chain_id)?;
    let reward_denom = Self::text(&p.reward_denom_on_reward)?;
    let host_denom = Self::text(&p.host_denom_on_host)?;
    ensure!(
      !TradeRoutes::<T>::contains_key(&reward_denom, &host_denom),
      Error::<T>::TradeRouteAlreadyExists
    );
    ensure!(
      p.max_swap_amount == 0 || p.min_swap_amount <= p.max_swap_amount,
      Error::<T>::InvalidAmount
    );

    let reward_chain = T::IcaController::counterparty_chain_id(&p.stride_to_reward_connection_id)
      .ok_or(Error::<T>::InvalidConnection)?;
    let trade_chain = T::IcaController::counterparty_chain_id(&p.stride_to_trade_connection_id)
      .ok_or(Error::<T>::InvalidConnection)?;

    let route = TradeRoute {
      reward_denom_on_host_zone: Self::text(&p.reward_denom_on_host)?,
      reward_denom_on_reward_zone: reward_denom.clone(),
      reward_denom_on_trade_zone: Self::text(&p.reward_denom_on_trade)?,
      host_denom_on_trade_zone: Self::text(&p.host_denom_on_trade)?,
      host_denom_on_host_zone: host_denom.clone(),
      host_account: IcaAccount {
        chain_id: host_zone.chain_id.clone(),
        connection_id: host_zone.connection_id.clone(),
        address: host_zone.withdrawal_ica_address.clone(),
        account_type: IcaAccountType::Withdrawal,
      },
      reward_account: IcaAccount {
        chain_id: Self::text(&reward_chain)?,
        connection_id: Self::text(&p.stride_to_reward_connection_id)?,
        address: None,
        account_type: IcaAccountType::ConverterUnwind,
      },
      trade_account: IcaAccount {
        chain_id: Self::text(&trade_chain)?,
        connection_id: Self::text(&p.stride_to_trade_connection_id)?,
        address: None,
        account_type: IcaAccountType::ConverterTrade,
      },
      host_to_reward_channel_id: Self::text(&p.host_to_reward_transfer_channel_id)?,
      reward_to_trade_channel_id: Self::text(&p.reward_to_trade_transfer_channel_id)?,
      trade_to_host_channel_id: Self::text(&p.trade_to_host_transfer_channel_id)?,
      trade_config: TradeConfig {
        pool_id: p.pool_id,
        swap_price: FixedU128::zero(),
        price_update_timestamp: 0,
        max_allowed_swap_loss_rate: p.max_allowed_swap_loss_rate,
        min_swap_amount: p.min_swap_amount,
        max_swap_amount: p.max_swap_amount,
      },
      min_transfer_amount: p.min_transfer_amount,
    };

    let route_id = route.route_id();
    T::IcaController::register_account(
      &p.stride_to_reward_connection_id,
      &trade_route_owner(&reward_chain, &route_id, IcaAccountType::ConverterUnwind),
    )?;
    T::IcaController::register_account(
      &p.stride_to_trade_connection_id,
      &trade_route_owner(&trade_chain, &route_id, IcaAccountType::ConverterTrade),
    )?;
    TradeRoutes::<T>::insert(&reward_denom, &host_denom, route);

    Self::deposit_event(Event::TradeRouteCreated {
      reward_denom,
      host_denom,
    });
    Ok(())
  }

  /// Changing the pool invalidates the stored price.
  pub(crate) fn do_update_trade_route(
    reward_denom: &[u8],
    host_denom: &[u8],
    pool_id: u64,
    max_allowed_swap_loss_rate: Permill,
    min_swap_amount: u128,
    max_swap_amount: u128,
  ) -> DispatchResult {
    ensure!(
      max_swap_amount == 0 || min_swap_amount <= max_swap_amount,
      Error::<T>::InvalidAmount
    );
    let reward_denom = Self::text(reward_denom)?;
    let host_denom = Self::text(host_denom)?;
    TradeRoutes::<T>::try_mutate(&reward_denom, &host_denom, |maybe| -> DispatchResult {
      let route = maybe.as_mut().ok_or(Error::<T>::TradeRouteNotFound)?;
      let config = &mut route.trade_config;
      if config.pool_id != pool_id {
        config.swap_price = FixedU128::zero();
        config.price_update_timestamp = 0;
      }
      config.pool_id = pool_id;
      config.max_allowed_swap_loss_rate = max_allowed_swap_loss_rate;
      config.min_swap_amount = min_swap_amount;
      config.max_swap_amount = max_swap_amount;
      Ok(())
    })?;
    Self::deposit_event(Event::TradeRouteUpdated {
      reward_denom,
      host_denom,
    });
    Ok(())
  }

  pub(crate) fn do_delete_trade_route(reward_denom: &[u8], host_denom: &[u8]) -> DispatchResult {
    let reward_denom = Self::text(reward_denom)?;
    let host_denom = Self::text(host_denom)?;
    TradeRoutes::<T>::take(&reward_denom, &host_denom).ok_or(Error::<T>::TradeRouteNotFound)?;
    Self::deposit_event(Event::TradeRouteDeleted {
      reward_denom,
      host_denom,
    });
    Ok(())
  }

  fn route_key(route: &TradeRoute) -> TradeRouteKey {
    TradeRouteKey {
      reward_denom: route.reward_denom_on_reward_zone.clone(),
      host_denom: route.host_denom_on_host_zone.clone(),
    }
  }

  fn get_trade_route(key: &TradeRouteKey) -> Result<TradeRoute, DispatchError> {
    TradeRoutes::<T>::get(&key.reward_denom, &key.host_denom)
      .ok_or_else(|| Error::<T>::TradeRouteNotFound.into())
  }

  fn route_from_query(query: &Query) -> Result<TradeRoute, DispatchError> {
    let key: TradeRouteKey = Self::decode_args(&query.callback_data)?;
    Self::get_trade_route(&key)
  }

  fn account_address(account: &IcaAccount) -> Result<Text, DispatchError> {
    account
      .address
      .clone()
      .ok_or_else(|| Error::<T>::IcaAccountNotFound.into())
  }

  fn as_str(raw: &[u8]) -> Result<&str, DispatchError> {
    core::str::from_utf8(raw).map_err(|_| Error::<T>::MarshalFailure.into())
  }

  /// Time left in the current hour epoch.
  fn hour_epoch_remaining() -> Result<u64, DispatchError> {
    let tracker = Self::get_epoch_tracker(EpochIdentifier::Hour)?;
    Ok(tracker.next_epoch_start_time.saturating_sub(Self::now_nanos()))
  }

  /// Stored price, unless it is zero or older than two hour epochs.
  pub(crate) fn current_swap_price(route: &TradeRoute) -> Option<FixedU128> {
    let config = &route.trade_config;
    if config.swap_price.is_zero() {
      return None;
    }
    let max_age = Self::get_epoch_tracker(EpochIdentifier::Hour)
      .map(|tracker| tracker.duration.saturating_mul(2))
      .unwrap_or(2 * params::NANOS_PER_HOUR);
    if config.price_update_timestamp.saturating_add(max_age) < Self::now_nanos() {
      return None;
    }
    Some(config.swap_price)
  }

  /// Issues the price query and the three balance probes of every route
  /// whose host zone is active.
  pub(crate) fn run_trade_routes() {
    for route in TradeRoutes::<T>::iter_values() {
      let halted = Self::get_host_zone(&route.host_account.chain_id)
        .map(|zone| zone.halted)
        .unwrap_or(true);
      if halted {
        continue;
      }
      let probes: [(&str, fn(&TradeRoute) -> DispatchResult); 4] = [
        ("pool price", Self::submit_pool_price_query),
        ("withdrawal reward balance", Self::submit_withdrawal_reward_balance_query),
        ("trade reward balance", Self::submit_trade_reward_balance_query),
        ("trade converted balance", Self::submit_trade_converted_balance_query),
      ];
      for (name, probe) in probes {
        if let Err(e) = probe(&route) {
          log::warn!(
            target: LOG_TARGET,
            "{} query for route {:?} skipped: {:?}",
            name,
            core::str::from_utf8(&route.route_id()).unwrap_or_default(),
            e,
          );
        }
      }
    }
  }

  fn submit_balance_query(
    account: &IcaAccount,
    denom: &Text,
    route: &TradeRoute,
    callback_id: IcqCallbackId,
    timeout_duration: u64,
  ) -> DispatchResult {
    Self::submit_icq(
      &account.chain_id,
      &account.connection_id,
      QueryRequest::Balance {
        address: Self::account_address(account)?,
        denom: denom.clone(),
      },
      callback_id,
      Self::route_key(route).encode(),
      timeout_duration,
      TimeoutPolicy::Reject,
    )
    .map(|_| ())
  }

  /// Times out halfway through the stride epoch, when the first transfer leg does.
  fn submit_withdrawal_reward_balance_query(route: &TradeRoute) -> DispatchResult {
    let tracker = Self::get_epoch_tracker(EpochIdentifier::StrideEpoch)?;
    Self::submit_balance_query(
      &route.host_account,
      &route.reward_denom_on_host_zone,
      route,
      IcqCallbackId::WithdrawalRewardBalance,
      tracker.duration / 2,
    )
  }

  fn submit_trade_reward_balance_query(route: &TradeRoute) -> DispatchResult {
    Self::submit_balance_query(
      &route.trade_account,
      &route.reward_denom_on_trade_zone,
      route,
      IcqCallbackId::TradeRewardBalance,
      Self::hour_epoch_remaining()?,
    )
  }

  fn submit_trade_converted_balance_query(route: &TradeRoute) -> DispatchResult {
    Self::submit_balance_query(
      &route.trade_account,
      &route.host_denom_on_trade_zone,
      route,
      IcqCallbackId::TradeConvertedBalance,
      Self::hour_epoch_remaining()?,
    )
  }

  fn submit_pool_price_query(route: &TradeRoute) -> DispatchResult {
    Self::submit_icq(
      &route.trade_account.chain_id,
      &route.trade_account.connection_id,
      QueryRequest::Twap {
        pool_id: route.trade_config.pool_id,
        base_denom: route.reward_denom_on_trade_zone.clone(),
        quote_denom: route.host_denom_on_trade_zone.clone(),
      },
      IcqCallbackId::PoolPrice,
      Self::route_key(route).encode(),
      Self::hour_epoch_remaining()?,
      TimeoutPolicy::Reject,
    )
    .map(|_| ())
  }

  pub(crate) fn withdrawal_reward_balance_callback(query: &Query, response: &[u8]) -> DispatchResult {
    let route = Self::route_from_query(query)?;
    let balance = Self::decode_balance(response)?;
    if balance <= route.min_transfer_amount {
      return Ok(());
    }
    Self::transfer_reward_tokens_host_to_trade(&route, balance)
  }

  /// Two hops without a callback: host to reward zone, forwarded by memo to
  /// the trade account.
  fn transfer_reward_tokens_host_to_trade(route: &TradeRoute, amount: u128) -> DispatchResult {
    if route.trade_config.min_swap_amount > amount || Self::current_swap_price(route).is_none() {
      return Ok(());
    }
    let withdrawal = Self::account_address(&route.host_account)?;
    let unwind = Self::account_address(&route.reward_account)?;
    let trade = Self::account_address(&route.trade_account)?;

    let tracker = Self::get_epoch_tracker(EpochIdentifier::StrideEpoch)?;
    let half_epoch = tracker.duration / 2;
    let first_leg_timeout = tracker.next_epoch_start_time.saturating_sub(half_epoch);
    let memo = ForwardMemo {
      forward: ForwardMetadata {
        receiver: Self::as_str(&trade)?,
        port: "transfer",
        channel: Self::as_str(&route.reward_to_trade_channel_id)?,
        timeout: format!("{}s", half_epoch / params::NANOS_PER_SECOND),
        retries: 0,
      },
    };
    let memo = serde_json::to_vec(&memo).map_err(|_| Error::<T>::MarshalFailure)?;

    let msg = RemoteMsg::Transfer {
      source_channel: route.host_to_reward_channel_id.clone(),
      sender: withdrawal,
      receiver: unwind.to_vec(),
      amount,
      denom: route.reward_denom_on_host_zone.clone(),
      timeout_timestamp: first_leg_timeout,
      memo,
    };
    let host_account = &route.host_account;
    Self::submit_ica_tx(
      &host_account.chain_id,
      &host_account.connection_id,
      &host_zone_owner(&host_account.chain_id, IcaAccountType::Withdrawal),
      vec![msg],
      first_leg_timeout,
      None,
    )?;
    log::info!(
      target: LOG_TARGET,
      "forwarding {} {:?} from {:?} to the trade account",
      amount,
      core::str::from_utf8(&route.reward_denom_on_host_zone).unwrap_or_default(),
      core::str::from_utf8(&host_account.chain_id).unwrap_or_default(),
    );
    Ok(())
  }

  pub(crate) fn trade_reward_balance_callback(query: &Query, response: &[u8]) -> DispatchResult {
    let route = Self::route_from_query(query)?;
    let balance = Self::decode_balance(response)?;
    if balance == 0 || route.trade_config.min_swap_amount > balance {
      return Ok(());
    }
    Self::swap_reward_tokens(&route, balance)
  }

  /// `floor(amount * price * (1 - max_allowed_swap_loss_rate))`
  pub(crate) fn min_swap_output(
    amount: u128,
    price: FixedU128,
    max_allowed_swap_loss_rate: Permill,
  ) -> Option<u128> {
    let kept = Permill::ACCURACY.saturating_sub(max_allowed_swap_loss_rate.deconstruct());
    let kept = FixedU128::checked_from_rational(kept, Permill::ACCURACY)?;
    price.checked_mul(&kept)?.checked_mul_int(amount)
  }

  fn swap_reward_tokens(route: &TradeRoute, balance: u128) -> DispatchResult {
    let config = &route.trade_config;
    let amount = if config.max_swap_amount > 0 {
      balance.min(config.max_swap_amount)
    } else {
      balance
    };
    let price = Self::current_swap_price(route).ok_or(Error::<T>::SwapPriceNotFound)?;
    let token_out_min_amount =
      Self::min_swap_output(amount, price, config.max_allowed_swap_loss_rate)
        .ok_or(Error::<T>::ArithmeticOverflow)?;
    let trade = Self::account_address(&route.trade_account)?;

    let msg = RemoteMsg::SwapExactAmountIn {
      sender: trade,
      pool_id: config.pool_id,
      token_in_denom: route.reward_denom_on_trade_zone.clone(),
      token_in_amount: amount,
      token_out_denom: route.host_denom_on_trade_zone.clone(),
      token_out_min_amount,
    };
    let callback = TradeCallback {
      route: Self::route_key(route),
      amount,
    };
    let trade_account = &route.trade_account;
    Self::submit_ica_tx(
      &trade_account.chain_id,
      &trade_account.connection_id,
      &trade_route_owner(
        &trade_account.chain_id,
        &route.route_id(),
        IcaAccountType::ConverterTrade,
      ),
      vec![msg],
      Self::ica_timeout_at(EpochIdentifier::Hour)?,
      Some((IcaCallbackId::TradeReward, callback.encode())),
    )?;
    Ok(())
  }

  pub(crate) fn trade_reward_callback(
    args: TradeCallback,
    packet: &PacketId,
    status: AckStatus,
  ) -> DispatchResult {
    Self::get_trade_route(&args.route)?;
    if status == AckStatus::Success {
      log::info!(
        target: LOG_TARGET,
        "swapped {} {:?} (packet {})",
        args.amount,
        core::str::from_utf8(&args.route.reward_denom).unwrap_or_default(),
        packet.sequence,
      );
    } else {
      log::error!(
        target: LOG_TARGET,
        "swap of {} {:?} failed ({:?}), retried next hour",
        args.amount,
        core::str::from_utf8(&args.route.reward_denom).unwrap_or_default(),
        status,
      );
    }
    Ok(())
  }

  pub(crate) fn trade_converted_balance_callback(query: &Query, response: &[u8]) -> DispatchResult {
    let route = Self::route_from_query(query)?;
    let balance = Self::decode_balance(response)?;
    if balance == 0 {
      return Ok(());
    }
    Self::transfer_converted_tokens_trade_to_host(&route, balance)
  }

  fn transfer_converted_tokens_trade_to_host(route: &TradeRoute, amount: u128) -> DispatchResult {
    let trade = Self::account_address(&route.trade_account)?;
    let withdrawal = Self::account_address(&route.host_account)?;
    let timeout = Self::get_epoch_tracker(EpochIdentifier::StrideEpoch)?.next_epoch_start_time;
    let msg = RemoteMsg::Transfer {
      source_channel: route.trade_to_host_channel_id.clone(),
      sender: trade,
      receiver: withdrawal.to_vec(),
      amount,
      denom: route.host_denom_on_trade_zone.clone(),
      timeout_timestamp: timeout,
      memo: Vec::new(),
    };
    let callback = TradeCallback {
      route: Self::route_key(route),
      amount,
    };
    let trade_account = &route.trade_account;
    Self::submit_ica_tx(
      &trade_account.chain_id,
      &trade_account.connection_id,
      &trade_route_owner(
        &trade_account.chain_id,
        &route.route_id(),
        IcaAccountType::ConverterTrade,
      ),
      vec![msg],
      timeout,
      Some((IcaCallbackId::TradeConverted, callback.encode())),
    )?;
    Ok(())
  }

  pub(crate) fn trade_converted_callback(
    args: TradeCallback,
    packet: &PacketId,
    status: AckStatus,
  ) -> DispatchResult {
    Self::get_trade_route(&args.route)?;
    if status == AckStatus::Success {
      log::info!(
        target: LOG_TARGET,
        "returned {} {:?} to the withdrawal account (packet {})",
        args.amount,
        core::str::from_utf8(&args.route.host_denom).unwrap_or_default(),
        packet.sequence,
      );
    } else {
      log::error!(
        target: LOG_TARGET,
        "return transfer of {} {:?} failed ({:?})",
        args.amount,
        core::str::from_utf8(&args.route.host_denom).unwrap_or_default(),
        status,
      );
    }
    Ok(())
  }

  /// Stores the host denom price of one reward token from a pool TWAP record.
  pub(crate) fn pool_price_callback(query: &Query, response: &[u8]) -> DispatchResult {
    let key: TradeRouteKey = Self::decode_args(&query.callback_data)?;
    let mut route = Self::get_trade_route(&key)?;
    let twap: TwapRecord = Self::decode_args(response)?;

    let host = &route.host_denom_on_trade_zone;
    let reward = &route.reward_denom_on_trade_zone;
    let host_first = twap.asset0_denom == *host && twap.asset1_denom == *reward;
    let reward_first = twap.asset0_denom == *reward && twap.asset1_denom == *host;
    ensure!(
      twap.pool_id == route.trade_config.pool_id && (host_first || reward_first),
      Error::<T>::InvalidTwapRecord
    );

    let ratio = if host_first {
      twap.p0_last_spot_price
    } else {
      twap.p1_last_spot_price
    };
    ensure!(!ratio.is_zero(), Error::<T>::InvalidTwapRecord);
    let price = FixedU128::one()
      .checked_div(&ratio)
      .ok_or(Error::<T>::ArithmeticOverflow)?;

    route.trade_config.swap_price = price;
    route.trade_config.price_update_timestamp = Self::now_nanos();
    TradeRoutes::<T>::insert(&key.reward_denom, &key.host_denom, route);

    Self::deposit_event(Event::SwapPriceUpdated {
      reward_denom: key.reward_denom,
      host_denom: key.host_denom,
      price,
    });
    Ok(())
  }
}
