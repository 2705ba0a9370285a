//! Remote query dispatcher.
//!
//! Queries are persisted in [`PendingQueries`] until a relayer delivers a
//! proven response or the deadline passes. Stale queries follow their
//! [`TimeoutPolicy`]: `Reject` drops the query and runs the handler's timeout
//! path, `Retry` resubmits with a fresh deadline and `ExecuteQueryCallback`
//! queries are never swept, so a late response still reaches the handler.

use crate::{
  Config, Error, Event, LOG_TARGET, NextQueryId, Pallet, PendingQueries, QuerySweepCursor,
  adapters::IcqTransport, types::*, weights::WeightInfo,
};
use alloc::vec::Vec;
use frame::prelude::*;
use polkadot_sdk::frame_support::storage::with_storage_layer;

impl<T: Config> Pallet<T> {
  pub(crate) fn submit_icq(
    chain_id: &Text,
    connection_id: &Text,
    request: QueryRequest,
    callback_id: IcqCallbackId,
    callback_data: Vec<u8>,
    timeout_duration: u64,
    timeout_policy: TimeoutPolicy,
  ) -> Result<u64, DispatchError> {
    let id = NextQueryId::<T>::get();
    NextQueryId::<T>::put(id.checked_add(1).ok_or(Error::<T>::ArithmeticOverflow)?);
    let query = Query {
      id,
      chain_id: chain_id.clone(),
      connection_id: connection_id.clone(),
      request,
      callback_id,
      callback_data: QueryPayload::try_from(callback_data)
        .map_err(|_| Error::<T>::MarshalFailure)?,
      timeout_duration,
      timeout_timestamp: Self::now_nanos().saturating_add(timeout_duration),
      timeout_policy,
    };
    T::IcqTransport::submit(&query).map_err(|e| {
      log::error!(target: LOG_TARGET, "{:?} query not submitted: {:?}", callback_id, e);
      Error::<T>::IcqFailed
    })?;
    PendingQueries::<T>::insert(id, &query);
    Self::deposit_event(Event::QuerySubmitted {
      query_id: id,
      chain_id: chain_id.clone(),
      callback_id,
    });
    Ok(id)
  }

  pub(crate) fn do_submit_query_response(
    query_id: u64,
    response: Vec<u8>,
    proof: Vec<u8>,
    proof_height: u64,
  ) -> DispatchResult {
    let query = PendingQueries::<T>::get(query_id).ok_or(Error::<T>::QueryNotFound)?;
    ensure!(
      T::IcqTransport::verify_proof(&query, &response, &proof, proof_height),
      Error::<T>::InvalidProof
    );
    PendingQueries::<T>::remove(query_id);

    if Self::now_nanos() > query.timeout_timestamp {
      Self::deposit_event(Event::QueryTimedOut {
        query_id,
        callback_id: query.callback_id,
        policy: query.timeout_policy,
      });
      return match query.timeout_policy {
        TimeoutPolicy::Reject => {
          Self::run_query_handler(&query, None);
          Ok(())
        }
        TimeoutPolicy::Retry => Self::resubmit_query(query),
        TimeoutPolicy::ExecuteQueryCallback => {
          Self::run_query_handler(&query, Some(&response));
          Ok(())
        }
      };
    }

    Self::run_query_handler(&query, Some(&response));
    Ok(())
  }

  /// Drops or retries queries whose deadline has passed, within
  /// `remaining_weight`. The scan resumes after the last query visited by the
  /// previous call. `ExecuteQueryCallback` queries stay pending for a late
  /// response.
  pub(crate) fn sweep_expired_queries(remaining_weight: Weight) -> Weight {
    let per_query = T::WeightInfo::sweep_expired_query();
    let per_scan = T::DbWeight::get().reads(1);
    let mut consumed = T::DbWeight::get().reads_writes(1, 1);
    if consumed.any_gt(remaining_weight) {
      return Weight::zero();
    }
    let now = Self::now_nanos();
    let mut iter = match QuerySweepCursor::<T>::get() {
      Some(last) => PendingQueries::<T>::iter_from(PendingQueries::<T>::hashed_key_for(last)),
      None => PendingQueries::<T>::iter(),
    };
    let mut expired = Vec::new();
    let mut last_seen = None;
    let mut exhausted = true;
    loop {
      // Room to process the entry is reserved before reading it.
      if consumed.saturating_add(per_scan).saturating_add(per_query).any_gt(remaining_weight) {
        exhausted = false;
        break;
      }
      let Some((id, query)) = iter.next() else { break };
      consumed = consumed.saturating_add(per_scan);
      last_seen = Some(id);
      if now > query.timeout_timestamp
        && query.timeout_policy != TimeoutPolicy::ExecuteQueryCallback
      {
        consumed = consumed.saturating_add(per_query);
        expired.push(query);
      }
    }
    match (exhausted, last_seen) {
      (true, _) => QuerySweepCursor::<T>::kill(),
      (false, Some(id)) => QuerySweepCursor::<T>::put(id),
      (false, None) => {}
    }

    for query in expired {
      PendingQueries::<T>::remove(query.id);
      Self::deposit_event(Event::QueryTimedOut {
        query_id: query.id,
        callback_id: query.callback_id,
        policy: query.timeout_policy,
      });
      match query.timeout_policy {
        TimeoutPolicy::Retry => {
          if let Err(e) = Self::resubmit_query(query) {
            log::error!(target: LOG_TARGET, "query retry failed: {:?}", e);
          }
        }
        _ => Self::run_query_handler(&query, None),
      }
    }
    consumed
  }

  fn resubmit_query(query: Query) -> DispatchResult {
    Self::submit_icq(
      &query.chain_id,
      &query.connection_id,
      query.request,
      query.callback_id,
      query.callback_data.into_inner(),
      query.timeout_duration,
      query.timeout_policy,
    )
    .map(|_| ())
  }

  /// Runs the typed handler in its own storage layer; `None` selects the
  /// timeout path. Handler errors are logged and swallowed.
  fn run_query_handler(query: &Query, response: Option<&[u8]>) {
    let result = with_storage_layer(|| match response {
      Some(response) => Self::dispatch_icq_callback(query, response),
      None => Self::dispatch_icq_timeout(query),
    });
    if let Err(e) = result {
      log::error!(
        target: LOG_TARGET,
        "{:?} query {} callback failed: {:?}",
        query.callback_id,
        query.id,
        e,
      );
    }
  }

  fn dispatch_icq_callback(query: &Query, response: &[u8]) -> DispatchResult {
    match query.callback_id {
      IcqCallbackId::WithdrawalBalance => Self::withdrawal_balance_callback(query, response),
      IcqCallbackId::WithdrawalRewardBalance => {
        Self::withdrawal_reward_balance_callback(query, response)
      }
      IcqCallbackId::TradeRewardBalance => Self::trade_reward_balance_callback(query, response),
      IcqCallbackId::TradeConvertedBalance => {
        Self::trade_converted_balance_callback(query, response)
      }
      IcqCallbackId::PoolPrice => Self::pool_price_callback(query, response),
      IcqCallbackId::DelegatorShares => Self::delegator_shares_callback(query, response),
      IcqCallbackId::ValidatorSharesToTokens => {
        Self::validator_shares_to_tokens_callback(query, response)
      }
      IcqCallbackId::Calibration => Self::calibration_callback(query, response),
      IcqCallbackId::Slash => Self::lsm_slash_query_callback(query, response),
    }
  }

  fn dispatch_icq_timeout(query: &Query) -> DispatchResult {
    match query.callback_id {
      IcqCallbackId::DelegatorShares => Self::delegator_shares_timeout(query),
      IcqCallbackId::Slash => Self::lsm_slash_query_timeout(query),
      _ => Ok(()),
    }
  }

  /// Balance carried by a balance query response.
  pub(crate) fn decode_balance(response: &[u8]) -> Result<u128, DispatchError> {
    if response.is_empty() {
      return Ok(0);
    }
    Self::decode_args(response)
  }
}
