//! Records, remote messages and callback payloads of the stakeibc pallet.

use alloc::vec::Vec;
use frame::prelude::*;
use polkadot_sdk::sp_runtime::{
  FixedPointNumber, FixedU128,
  traits::Zero,
};
use primitives::{EpochIdentifier, IcaAccountType, params};
use sp_arithmetic::{Rounding, helpers_128bit::multiply_by_rational_with_rounding};

pub const MAX_TEXT_LEN: u32 = 128;
pub const MAX_RECORD_ID_LEN: u32 = 256;
pub const MAX_VALIDATORS: u32 = 64;
pub const MAX_REDEMPTIONS_PER_UNBONDING: u32 = 1_024;
pub const MAX_CALLBACK_ARGS_LEN: u32 = 16_384;
pub const MAX_QUERY_PAYLOAD_LEN: u32 = 1_024;

/// Bounded identifier, denom or remote address.
pub type Text = BoundedVec<u8, ConstU32<MAX_TEXT_LEN>>;
/// `{chain_id}.{epoch}.{receiver}`
pub type RecordId = BoundedVec<u8, ConstU32<MAX_RECORD_ID_LEN>>;
pub type ValidatorList = BoundedVec<Validator, ConstU32<MAX_VALIDATORS>>;
pub type RedemptionIds = BoundedVec<RecordId, ConstU32<MAX_REDEMPTIONS_PER_UNBONDING>>;
pub type CallbackArgs = BoundedVec<u8, ConstU32<MAX_CALLBACK_ARGS_LEN>>;
pub type QueryPayload = BoundedVec<u8, ConstU32<MAX_QUERY_PAYLOAD_LEN>>;

#[derive(
  Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub struct Validator {
  pub name: Text,
  pub address: Text,
  pub weight: u64,
  pub delegation: u128,
  /// Post-unbonding target recorded by the last undelegation round.
  pub balanced_delegation: u128,
  /// Zero until the first validator query lands.
  pub shares_to_tokens_rate: FixedU128,
  pub shares_to_tokens_rate_epoch: u64,
  pub slash_query_progress_tracker: u128,
  pub slash_query_checkpoint: u128,
  pub slash_query_in_progress: bool,
  pub delegation_changes_in_progress: u32,
}

impl Validator {
  pub fn new(name: Text, address: Text, weight: u64) -> Self {
    Self {
      name,
      address,
      weight,
      delegation: 0,
      balanced_delegation: 0,
      shares_to_tokens_rate: FixedU128::zero(),
      shares_to_tokens_rate_epoch: 0,
      slash_query_progress_tracker: 0,
      slash_query_checkpoint: 0,
      slash_query_in_progress: false,
      delegation_changes_in_progress: 0,
    }
  }
}

#[derive(
  Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub struct HostZone<AccountId> {
  pub chain_id: Text,
  pub connection_id: Text,
  pub transfer_channel_id: Text,
  pub bech32_prefix: Text,
  pub host_denom: Text,
  pub ibc_denom: Text,
  pub deposit_address: AccountId,
  pub community_pool_stake_holding_address: AccountId,
  pub community_pool_redeem_holding_address: AccountId,
  pub community_pool_treasury_address: Option<Text>,
  pub delegation_ica_address: Option<Text>,
  pub withdrawal_ica_address: Option<Text>,
  pub fee_ica_address: Option<Text>,
  pub redemption_ica_address: Option<Text>,
  pub community_pool_deposit_ica_address: Option<Text>,
  pub community_pool_return_ica_address: Option<Text>,
  pub validators: ValidatorList,
  pub redemption_rate: FixedU128,
  pub last_redemption_rate: FixedU128,
  pub min_redemption_rate: FixedU128,
  pub max_redemption_rate: FixedU128,
  pub min_inner_redemption_rate: FixedU128,
  pub max_inner_redemption_rate: FixedU128,
  /// Unbonding period of the host chain, in days.
  pub unbonding_period: u64,
  pub total_delegations: u128,
  pub max_messages_per_ica_tx: u32,
  pub halted: bool,
  pub redemptions_enabled: bool,
  pub lsm_liquid_stake_enabled: bool,
}

impl<AccountId> HostZone<AccountId> {
  /// Day epochs between two undelegation rounds.
  pub fn unbonding_frequency(&self) -> u64 {
    self.unbonding_period / params::WEEK_DAYS + 1
  }

  pub fn st_denom(&self) -> Vec<u8> {
    st_denom(&self.host_denom)
  }

  pub fn ica_address(&self, role: IcaAccountType) -> Option<&Text> {
    match role {
      IcaAccountType::Delegation => self.delegation_ica_address.as_ref(),
      IcaAccountType::Withdrawal => self.withdrawal_ica_address.as_ref(),
      IcaAccountType::Redemption => self.redemption_ica_address.as_ref(),
      IcaAccountType::Fee => self.fee_ica_address.as_ref(),
      IcaAccountType::CommunityPoolDeposit => self.community_pool_deposit_ica_address.as_ref(),
      IcaAccountType::CommunityPoolReturn => self.community_pool_return_ica_address.as_ref(),
      IcaAccountType::ConverterUnwind | IcaAccountType::ConverterTrade => None,
    }
  }

  /// Returns false for roles that do not belong to a host zone.
  pub fn set_ica_address(&mut self, role: IcaAccountType, address: Text) -> bool {
    let slot = match role {
      IcaAccountType::Delegation => &mut self.delegation_ica_address,
      IcaAccountType::Withdrawal => &mut self.withdrawal_ica_address,
      IcaAccountType::Redemption => &mut self.redemption_ica_address,
      IcaAccountType::Fee => &mut self.fee_ica_address,
      IcaAccountType::CommunityPoolDeposit => &mut self.community_pool_deposit_ica_address,
      IcaAccountType::CommunityPoolReturn => &mut self.community_pool_return_ica_address,
      IcaAccountType::ConverterUnwind | IcaAccountType::ConverterTrade => return false,
    };
    *slot = Some(address);
    true
  }

  pub fn validator_index(&self, address: &[u8]) -> Option<usize> {
    self
      .validators
      .iter()
      .position(|v| v.address.as_slice() == address)
  }

  pub fn total_validator_weight(&self) -> u64 {
    self
      .validators
      .iter()
      .fold(0u64, |acc, v| acc.saturating_add(v.weight))
  }

  /// Inclusive check against the tighter of the outer and inner bands.
  pub fn is_redemption_rate_within_bounds(&self, rate: FixedU128) -> bool {
    let lower = self.min_redemption_rate.max(self.min_inner_redemption_rate);
    let upper = if self.max_inner_redemption_rate.is_zero() {
      self.max_redemption_rate
    } else {
      self.max_redemption_rate.min(self.max_inner_redemption_rate)
    };
    rate >= lower && rate <= upper
  }
}

pub fn st_denom(host_denom: &[u8]) -> Vec<u8> {
  let mut denom = Vec::with_capacity(host_denom.len() + 2);
  denom.extend_from_slice(b"st");
  denom.extend_from_slice(host_denom);
  denom
}

#[derive(
  Clone, Copy, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub enum DepositRecordStatus {
  TransferQueue,
  TransferInProgress,
  DelegationQueue,
  DelegationInProgress,
}

#[derive(
  Clone, Copy, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub enum DepositRecordSource {
  Stride,
  WithdrawalIca,
}

#[derive(
  Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub struct DepositRecord {
  pub id: u64,
  pub amount: u128,
  pub denom: Text,
  pub host_zone_id: Text,
  pub status: DepositRecordStatus,
  pub deposit_epoch_number: u64,
  pub source: DepositRecordSource,
  pub delegation_txs_in_progress: u32,
}

#[derive(
  Clone, Copy, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub enum HostZoneUnbondingStatus {
  UnbondingQueue,
  UnbondingInProgress,
  ExitTransferQueue,
  ExitTransferInProgress,
  Claimable,
}

#[derive(
  Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub struct HostZoneUnbonding {
  pub host_zone_id: Text,
  pub denom: Text,
  pub st_token_amount: u128,
  pub native_token_amount: u128,
  /// Portion of `native_token_amount` not yet acknowledged as undelegated.
  pub native_tokens_to_unbond: u128,
  pub claimable_native_tokens: u128,
  /// Unix nanoseconds at which the undelegated funds mature.
  pub unbonding_time: u64,
  pub status: HostZoneUnbondingStatus,
  pub user_redemption_records: RedemptionIds,
  pub undelegation_txs_in_progress: u32,
}

impl HostZoneUnbonding {
  pub fn new(host_zone_id: Text, denom: Text) -> Self {
    Self {
      host_zone_id,
      denom,
      st_token_amount: 0,
      native_token_amount: 0,
      native_tokens_to_unbond: 0,
      claimable_native_tokens: 0,
      unbonding_time: 0,
      status: HostZoneUnbondingStatus::UnbondingQueue,
      user_redemption_records: BoundedVec::new(),
      undelegation_txs_in_progress: 0,
    }
  }
}

/// All host zone unbondings of one day epoch.
#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq, TypeInfo)]
pub struct EpochUnbondingRecord {
  pub epoch_number: u64,
  pub host_zone_unbondings: Vec<HostZoneUnbonding>,
}

#[derive(
  Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub struct UserRedemptionRecord {
  pub id: RecordId,
  pub receiver: Text,
  pub native_token_amount: u128,
  pub st_token_amount: u128,
  pub denom: Text,
  pub host_zone_id: Text,
  pub epoch_number: u64,
  pub claim_is_pending: bool,
}

#[derive(
  Clone, Copy, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub enum LsmDepositStatus {
  DepositPending,
  TransferQueue,
  TransferInProgress,
  DetokenizationQueue,
  DetokenizationInProgress,
}

#[derive(
  Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub struct LsmTokenDeposit<AccountId> {
  pub deposit_id: u64,
  pub chain_id: Text,
  /// `{validator}/{tokenize_record_id}` on the host.
  pub denom: Text,
  pub ibc_denom: Text,
  pub staker: AccountId,
  pub validator_address: Text,
  pub amount: u128,
  pub st_token_amount: u128,
  pub status: LsmDepositStatus,
}

#[derive(
  Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub struct IcaAccount {
  pub chain_id: Text,
  pub connection_id: Text,
  pub address: Option<Text>,
  pub account_type: IcaAccountType,
}

#[derive(
  Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub struct TradeConfig {
  pub pool_id: u64,
  /// Host denom received per reward denom; zero until a pool price lands.
  pub swap_price: FixedU128,
  pub price_update_timestamp: u64,
  pub max_allowed_swap_loss_rate: Permill,
  pub min_swap_amount: u128,
  pub max_swap_amount: u128,
}

#[derive(
  Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub struct TradeRoute {
  pub reward_denom_on_host_zone: Text,
  pub reward_denom_on_reward_zone: Text,
  pub reward_denom_on_trade_zone: Text,
  pub host_denom_on_trade_zone: Text,
  pub host_denom_on_host_zone: Text,
  /// Withdrawal account of the host zone.
  pub host_account: IcaAccount,
  pub reward_account: IcaAccount,
  pub trade_account: IcaAccount,
  pub host_to_reward_channel_id: Text,
  pub reward_to_trade_channel_id: Text,
  pub trade_to_host_channel_id: Text,
  pub trade_config: TradeConfig,
  pub min_transfer_amount: u128,
}

impl TradeRoute {
  pub fn route_id(&self) -> Vec<u8> {
    route_id(&self.reward_denom_on_reward_zone, &self.host_denom_on_host_zone)
  }
}

pub fn route_id(reward_denom: &[u8], host_denom: &[u8]) -> Vec<u8> {
  let mut id = Vec::with_capacity(reward_denom.len() + host_denom.len() + 1);
  id.extend_from_slice(reward_denom);
  id.push(b'-');
  id.extend_from_slice(host_denom);
  id
}

/// Arguments of `create_trade_route`.
#[derive(Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo)]
pub struct TradeRouteParams {
  pub host_chain_id: Vec<u8>,
  pub stride_to_reward_connection_id: Vec<u8>,
  pub stride_to_trade_connection_id: Vec<u8>,
  pub host_to_reward_transfer_channel_id: Vec<u8>,
  pub reward_to_trade_transfer_channel_id: Vec<u8>,
  pub trade_to_host_transfer_channel_id: Vec<u8>,
  pub reward_denom_on_host: Vec<u8>,
  pub reward_denom_on_reward: Vec<u8>,
  pub reward_denom_on_trade: Vec<u8>,
  pub host_denom_on_trade: Vec<u8>,
  pub host_denom_on_host: Vec<u8>,
  pub pool_id: u64,
  pub max_allowed_swap_loss_rate: Permill,
  pub min_swap_amount: u128,
  pub max_swap_amount: u128,
  pub min_transfer_amount: u128,
}

#[derive(
  Clone,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
  serde::Serialize,
  serde::Deserialize,
)]
pub struct EpochTracker {
  pub epoch_identifier: EpochIdentifier,
  pub epoch_number: u64,
  pub next_epoch_start_time: u64,
  pub duration: u64,
}

/// Epoch boundary reported by the epoch source.
#[derive(Clone, Copy, Debug, Decode, Encode, Eq, PartialEq, TypeInfo)]
pub struct EpochInfo {
  pub identifier: EpochIdentifier,
  pub epoch_number: u64,
  pub start_time: u64,
  pub duration: u64,
}

/// Runtime parameters, tunable through governance.
#[derive(
  Clone,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
  serde::Serialize,
  serde::Deserialize,
)]
pub struct Params {
  pub deposit_interval: u64,
  pub delegate_interval: u64,
  pub reinvest_interval: u64,
  pub redemption_rate_interval: u64,
  pub rebalance_interval: u64,
  pub stride_commission: u64,
  pub ica_timeout_nanos: u64,
  pub ibc_transfer_timeout_nanos: u64,
  pub default_min_redemption_rate_threshold: u64,
  pub default_max_redemption_rate_threshold: u64,
  pub validator_slash_query_threshold: u64,
  pub validator_weight_cap: u64,
  /// Percent of a validator's delegation above which a slash is refused.
  pub max_slash_percent: u64,
  pub lsm_slash_query_timeout_nanos: u64,
  pub detokenization_timeout_nanos: u64,
}

impl Default for Params {
  fn default() -> Self {
    Self {
      deposit_interval: 1,
      delegate_interval: 1,
      reinvest_interval: 1,
      redemption_rate_interval: 1,
      rebalance_interval: params::STRIDE_EPOCHS_PER_DAY,
      stride_commission: params::DEFAULT_STRIDE_COMMISSION,
      ica_timeout_nanos: params::DEFAULT_ICA_TIMEOUT_NANOS,
      ibc_transfer_timeout_nanos: params::DEFAULT_IBC_TRANSFER_TIMEOUT_NANOS,
      default_min_redemption_rate_threshold: params::DEFAULT_MIN_REDEMPTION_RATE_THRESHOLD,
      default_max_redemption_rate_threshold: params::DEFAULT_MAX_REDEMPTION_RATE_THRESHOLD,
      validator_slash_query_threshold: params::DEFAULT_VALIDATOR_SLASH_QUERY_THRESHOLD,
      validator_weight_cap: params::DEFAULT_VALIDATOR_WEIGHT_CAP,
      max_slash_percent: params::MAX_SLASH_PERCENT,
      lsm_slash_query_timeout_nanos: params::LSM_SLASH_QUERY_TIMEOUT_NANOS,
      detokenization_timeout_nanos: params::DETOKENIZATION_TIMEOUT_NANOS,
    }
  }
}

impl Params {
  pub fn is_valid(&self) -> bool {
    self.deposit_interval > 0
      && self.delegate_interval > 0
      && self.reinvest_interval > 0
      && self.redemption_rate_interval > 0
      && self.rebalance_interval > 0
      && self.stride_commission <= 100
      && self.validator_weight_cap > 0
      && self.validator_weight_cap <= 100
      && self.validator_slash_query_threshold <= 100
      && self.max_slash_percent <= 100
      && self.default_min_redemption_rate_threshold < self.default_max_redemption_rate_threshold
  }
}

/// Argument of `add_validators`.
#[derive(Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo)]
pub struct ValidatorParams {
  pub name: Vec<u8>,
  pub address: Vec<u8>,
  pub weight: u64,
}

/// Argument of `change_validator_weights`.
#[derive(Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo)]
pub struct ValidatorWeight {
  pub address: Vec<u8>,
  pub weight: u64,
}

/// Message executed by an interchain account on a remote ledger.
#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq, TypeInfo)]
pub enum RemoteMsg {
  Delegate {
    delegator: Text,
    validator: Text,
    amount: u128,
    denom: Text,
  },
  Undelegate {
    delegator: Text,
    validator: Text,
    amount: u128,
    denom: Text,
  },
  Redelegate {
    delegator: Text,
    src_validator: Text,
    dst_validator: Text,
    amount: u128,
    denom: Text,
  },
  BankSend {
    from: Text,
    to: Text,
    amount: u128,
    denom: Text,
  },
  SetWithdrawAddress {
    delegator: Text,
    withdraw_address: Text,
  },
  RedeemTokensForShares {
    delegator: Text,
    amount: u128,
    denom: Text,
  },
  Transfer {
    source_channel: Text,
    sender: Text,
    receiver: Vec<u8>,
    amount: u128,
    denom: Text,
    timeout_timestamp: u64,
    memo: Vec<u8>,
  },
  SwapExactAmountIn {
    sender: Text,
    pool_id: u64,
    token_in_denom: Text,
    token_in_amount: u128,
    token_out_denom: Text,
    token_out_min_amount: u128,
  },
}

#[derive(
  Clone,
  Debug,
  Default,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
)]
pub struct PacketId {
  pub port_id: Text,
  pub channel_id: Text,
  pub sequence: u64,
}

/// Terminal state of an outbound packet.
#[derive(Clone, Copy, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo)]
pub enum AckStatus {
  Success,
  Failure,
  Timeout,
}

#[derive(
  Clone, Copy, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub enum IcaCallbackId {
  Delegate,
  Claim,
  Undelegate,
  Reinvest,
  Redemption,
  Rebalance,
  Detokenize,
  TradeReward,
  TradeConverted,
  Transfer,
  LsmTransfer,
}

/// Persisted until the packet it was stored for reaches a terminal state.
#[derive(
  Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub struct CallbackEnvelope {
  pub callback_id: IcaCallbackId,
  pub args: CallbackArgs,
}

#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq, TypeInfo)]
pub struct SplitDelegation {
  pub validator: Text,
  pub amount: u128,
}

#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq, TypeInfo)]
pub struct DelegateCallback {
  pub host_zone_id: Text,
  pub deposit_record_id: u64,
  pub split_delegations: Vec<SplitDelegation>,
}

#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq, TypeInfo)]
pub struct UndelegateCallback {
  pub host_zone_id: Text,
  pub split_undelegations: Vec<SplitDelegation>,
  pub epoch_unbonding_record_ids: Vec<u64>,
}

#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq, TypeInfo)]
pub struct RedemptionCallback {
  pub host_zone_id: Text,
  pub epoch_unbonding_record_ids: Vec<u64>,
}

#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq, TypeInfo)]
pub struct ClaimCallback {
  pub user_redemption_record_id: RecordId,
  pub chain_id: Text,
  pub epoch_number: u64,
}

#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq, TypeInfo)]
pub struct ReinvestCallback {
  pub host_zone_id: Text,
  pub reinvest_amount: u128,
  pub denom: Text,
}

#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq, TypeInfo)]
pub struct Rebalancing {
  pub src_validator: Text,
  pub dst_validator: Text,
  pub amount: u128,
}

#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq, TypeInfo)]
pub struct RebalanceCallback {
  pub host_zone_id: Text,
  pub rebalancings: Vec<Rebalancing>,
}

/// Identifies an LSM deposit for the detokenize, transfer and slash query paths.
#[derive(
  Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub struct LsmDepositKey {
  pub chain_id: Text,
  pub denom: Text,
}

#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq, TypeInfo)]
pub struct TransferCallback {
  pub deposit_record_id: u64,
}

/// Payload of the swap and return-transfer callbacks.
#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq, TypeInfo)]
pub struct TradeCallback {
  pub route: TradeRouteKey,
  pub amount: u128,
}

#[derive(
  Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub struct TradeRouteKey {
  pub reward_denom: Text,
  pub host_denom: Text,
}

#[derive(
  Clone, Copy, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub enum IcqCallbackId {
  WithdrawalBalance,
  WithdrawalRewardBalance,
  TradeRewardBalance,
  TradeConvertedBalance,
  PoolPrice,
  DelegatorShares,
  ValidatorSharesToTokens,
  Calibration,
  Slash,
}

#[derive(
  Clone, Copy, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub enum TimeoutPolicy {
  Reject,
  Retry,
  ExecuteQueryCallback,
}

/// What a query asks the remote ledger for.
#[derive(
  Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub enum QueryRequest {
  Balance { address: Text, denom: Text },
  Validator { address: Text },
  Delegation { delegator: Text, validator: Text },
  Twap {
    pool_id: u64,
    base_denom: Text,
    quote_denom: Text,
  },
}

#[derive(
  Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub struct Query {
  pub id: u64,
  pub chain_id: Text,
  pub connection_id: Text,
  pub request: QueryRequest,
  pub callback_id: IcqCallbackId,
  pub callback_data: QueryPayload,
  pub timeout_duration: u64,
  pub timeout_timestamp: u64,
  pub timeout_policy: TimeoutPolicy,
}

/// Validator view returned by a validator query.
#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq, TypeInfo)]
pub struct RemoteValidator {
  pub operator_address: Text,
  pub tokens: u128,
  pub delegator_shares: FixedU128,
}

/// Delegation view returned by a delegation query.
#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq, TypeInfo)]
pub struct RemoteDelegation {
  pub delegator_address: Text,
  pub validator_address: Text,
  pub shares: FixedU128,
}

/// Pool TWAP record returned by the trade zone.
#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq, TypeInfo)]
pub struct TwapRecord {
  pub pool_id: u64,
  pub asset0_denom: Text,
  pub asset1_denom: Text,
  pub p0_last_spot_price: FixedU128,
  pub p1_last_spot_price: FixedU128,
}

/// Row of the `address_unbondings` query.
#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq, TypeInfo)]
pub struct AddressUnbonding {
  pub address: Vec<u8>,
  pub receiver: Vec<u8>,
  pub unbonding_estimated_time: Vec<u8>,
  pub amount: u128,
  pub denom: Vec<u8>,
  pub claim_is_pending: bool,
  pub epoch_number: u64,
}

/// `floor(a * b / c)`; `None` on a zero divisor or overflow.
pub fn mul_div_floor(a: u128, b: u128, c: u128) -> Option<u128> {
  multiply_by_rational_with_rounding(a, b, c, Rounding::Down)
}

/// stTokens issued for `native` tokens at `rate`, rounded down.
pub fn native_to_st(native: u128, rate: FixedU128) -> Option<u128> {
  multiply_by_rational_with_rounding(native, FixedU128::DIV, rate.into_inner(), Rounding::Down)
}

/// Native tokens owed for `st` stTokens at `rate`, rounded to nearest.
pub fn st_to_native(st: u128, rate: FixedU128) -> Option<u128> {
  multiply_by_rational_with_rounding(
    st,
    rate.into_inner(),
    FixedU128::DIV,
    Rounding::NearestPrefUp,
  )
}

/// Tokens behind `shares` at a shares-to-tokens `rate`, rounded down.
pub fn shares_to_tokens(shares: FixedU128, rate: FixedU128) -> Option<u128> {
  multiply_by_rational_with_rounding(
    shares.into_inner(),
    rate.into_inner(),
    FixedU128::DIV.checked_mul(FixedU128::DIV)?,
    Rounding::Down,
  )
}
