//! Stakeibc Pallet
//!
//! Cross-ledger liquid staking coordinator. Users deposit the bridged native
//! token of a host zone and receive stTokens at the zone's redemption rate; the
//! pallet moves the deposits to the host, delegates them through interchain
//! accounts, reinvests rewards and unwinds redemptions in batched day epochs.
//!
//! Remote work is never awaited. Every outbound transaction persists a
//! [`CallbackEnvelope`] and every query a [`Query`]; the transports re-enter
//! the pallet through [`IcaLifecycleHooks`] and `submit_query_response`.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub use pallet::*;

pub mod adapters;
pub use adapters::{
  DenomTrace, EpochHooks, IcaController, IcaLifecycleHooks, IcqTransport, RateLimiter,
  RedemptionRateOracle, TokenOps, TransferOps,
};

pub mod types;
pub use types::*;

mod deposit;
mod epochs;
mod ica;
mod icq;
mod lsm;
pub mod queries;
mod rebalance;
mod records;
mod redemption_rate;
mod registry;
mod slashing;
mod trade_route;
mod unbonding;

pub mod weights;
pub use weights::WeightInfo;

#[cfg(test)]
mod mock;

#[cfg(feature = "runtime-benchmarks")]
mod benchmarking;

pub(crate) const LOG_TARGET: &str = "runtime::stakeibc";

#[cfg(feature = "runtime-benchmarks")]
pub trait BenchmarkHelper<AccountId> {
  /// Makes `connection_id` resolve to `chain_id` on the ICA controller.
  fn setup_connection(connection_id: &[u8], chain_id: &[u8]);

  fn fund(who: &AccountId, denom: &[u8], amount: u128);
}

#[frame::pallet]
pub mod pallet {
  use super::*;
  use alloc::vec::Vec;
  use frame::prelude::*;
  use polkadot_sdk::{
    frame_support::{
      PalletId,
      traits::{EnsureOrigin, UnixTime},
    },
    sp_runtime::{
      FixedU128,
      traits::{AccountIdConversion, Convert},
    },
  };
  use primitives::EpochIdentifier;

  #[pallet::config]
  pub trait Config: frame_system::Config<RuntimeEvent: From<Event<Self>>> {
    /// Seed of the module accounts (deposit, fee, community pool holdings)
    #[pallet::constant]
    type PalletId: Get<PalletId>;

    /// Origin allowed to register zones, manage validators and run operator actions
    type AdminOrigin: EnsureOrigin<Self::RuntimeOrigin>;

    /// Origin allowed to resume zones, tune bounds and manage trade routes
    type GovernanceOrigin: EnsureOrigin<Self::RuntimeOrigin>;

    /// Local multi-denom bank
    type Tokens: TokenOps<Self::AccountId>;

    /// Local to remote token transfers
    type Transfer: TransferOps<Self::AccountId>;

    /// Interchain account controller
    type IcaController: IcaController;

    /// Interchain query relayer and proof verifier
    type IcqTransport: IcqTransport;

    /// Denom blacklist and address whitelist
    type RateLimiter: RateLimiter;

    /// Outer price oracle fed with safe redemption rates
    type Oracle: RedemptionRateOracle;

    /// Textual form of a local account, used as a remote transfer receiver
    type LocalAddress: Convert<Self::AccountId, Vec<u8>>;

    /// Block time source
    type UnixTime: UnixTime;

    /// Weight information for extrinsics
    type WeightInfo: WeightInfo;

    #[cfg(feature = "runtime-benchmarks")]
    type BenchmarkHelper: crate::BenchmarkHelper<Self::AccountId>;
  }

  #[pallet::pallet]
  pub struct Pallet<T>(PhantomData<T>);

  #[pallet::storage]
  #[pallet::getter(fn params)]
  pub type ModuleParams<T: Config> = StorageValue<_, Params, ValueQuery>;

  /// Registered host zones by chain id
  #[pallet::storage]
  #[pallet::getter(fn host_zone)]
  pub type HostZones<T: Config> =
    StorageMap<_, Blake2_128Concat, Text, HostZone<T::AccountId>, OptionQuery>;

  #[pallet::storage]
  #[pallet::getter(fn epoch_tracker)]
  pub type EpochTrackers<T: Config> =
    StorageMap<_, Blake2_128Concat, EpochIdentifier, EpochTracker, OptionQuery>;

  /// Trade routes keyed by (reward denom on reward zone, host denom on host zone)
  #[pallet::storage]
  #[pallet::getter(fn trade_route)]
  pub type TradeRoutes<T: Config> =
    StorageDoubleMap<_, Blake2_128Concat, Text, Blake2_128Concat, Text, TradeRoute, OptionQuery>;

  #[pallet::storage]
  pub type NextDepositRecordId<T: Config> = StorageValue<_, u64, ValueQuery>;

  #[pallet::storage]
  #[pallet::getter(fn deposit_record)]
  pub type DepositRecords<T: Config> =
    StorageMap<_, Blake2_128Concat, u64, DepositRecord, OptionQuery>;

  /// Host zone unbondings by (day epoch, chain id)
  #[pallet::storage]
  pub type EpochUnbondingRecords<T: Config> = StorageDoubleMap<
    _,
    Blake2_128Concat,
    u64,
    Blake2_128Concat,
    Text,
    HostZoneUnbonding,
    OptionQuery,
  >;

  #[pallet::storage]
  #[pallet::getter(fn user_redemption_record)]
  pub type UserRedemptionRecords<T: Config> =
    StorageMap<_, Blake2_128Concat, RecordId, UserRedemptionRecord, OptionQuery>;

  #[pallet::storage]
  pub type NextLsmDepositId<T: Config> = StorageValue<_, u64, ValueQuery>;

  /// LSM deposits by (chain id, LSM base denom)
  #[pallet::storage]
  #[pallet::getter(fn lsm_deposit)]
  pub type LsmTokenDeposits<T: Config> = StorageDoubleMap<
    _,
    Blake2_128Concat,
    Text,
    Blake2_128Concat,
    Text,
    LsmTokenDeposit<T::AccountId>,
    OptionQuery,
  >;

  /// Callback envelopes by ((port, channel), sequence)
  #[pallet::storage]
  #[pallet::getter(fn callback_data)]
  pub type CallbackData<T: Config> = StorageDoubleMap<
    _,
    Blake2_128Concat,
    (Text, Text),
    Blake2_128Concat,
    u64,
    CallbackEnvelope,
    OptionQuery,
  >;

  #[pallet::storage]
  pub type NextQueryId<T: Config> = StorageValue<_, u64, ValueQuery>;

  /// Queries awaiting a proven response
  #[pallet::storage]
  #[pallet::getter(fn pending_query)]
  pub type PendingQueries<T: Config> = StorageMap<_, Blake2_128Concat, u64, Query, OptionQuery>;

  /// Last query visited by an unfinished expiry sweep
  #[pallet::storage]
  pub type QuerySweepCursor<T: Config> = StorageValue<_, u64, OptionQuery>;

  #[pallet::event]
  #[pallet::generate_deposit(pub(super) fn deposit_event)]
  pub enum Event<T: Config> {
    HostZoneRegistered {
      chain_id: Text,
      connection_id: Text,
    },
    ValidatorsAdded {
      chain_id: Text,
      count: u32,
    },
    ValidatorDeleted {
      chain_id: Text,
      validator: Text,
    },
    ValidatorWeightsChanged {
      chain_id: Text,
    },
    LiquidStake {
      staker: T::AccountId,
      chain_id: Text,
      native_amount: u128,
      st_amount: u128,
    },
    LsmLiquidStake {
      staker: T::AccountId,
      chain_id: Text,
      validator: Text,
      denom: Text,
      native_amount: u128,
      st_amount: u128,
    },
    /// The stake completes once the validator query lands.
    PendingLsmLiquidStake {
      staker: T::AccountId,
      chain_id: Text,
      validator: Text,
      denom: Text,
      amount: u128,
    },
    LsmLiquidStakeFailed {
      chain_id: Text,
      denom: Text,
    },
    RedeemStake {
      redeemer: T::AccountId,
      chain_id: Text,
      receiver: Text,
      native_amount: u128,
      st_amount: u128,
    },
    ClaimInitiated {
      chain_id: Text,
      receiver: Text,
      epoch_number: u64,
      amount: u128,
    },
    HostZoneHalted {
      chain_id: Text,
      redemption_rate: FixedU128,
    },
    HostZoneResumed {
      chain_id: Text,
    },
    RedemptionRateUpdated {
      chain_id: Text,
      redemption_rate: FixedU128,
    },
    InnerRedemptionRateBoundsUpdated {
      chain_id: Text,
      min_inner_redemption_rate: FixedU128,
      max_inner_redemption_rate: FixedU128,
    },
    IcaAccountRegistered {
      owner: Text,
      address: Text,
    },
    InterchainAccountRestored {
      chain_id: Text,
      owner: Text,
    },
    TxSubmitted {
      chain_id: Text,
      packet: PacketId,
      callback_id: Option<IcaCallbackId>,
      message_count: u32,
    },
    QuerySubmitted {
      query_id: u64,
      chain_id: Text,
      callback_id: IcqCallbackId,
    },
    QueryTimedOut {
      query_id: u64,
      callback_id: IcqCallbackId,
      policy: TimeoutPolicy,
    },
    ValidatorSharesToTokensRateUpdated {
      chain_id: Text,
      validator: Text,
      rate: FixedU128,
    },
    ValidatorSlashed {
      chain_id: Text,
      validator: Text,
      slash_amount: u128,
      new_weight: u64,
    },
    /// A slash above the safety threshold was observed and not applied.
    SlashRefused {
      chain_id: Text,
      validator: Text,
      recorded: u128,
      observed: u128,
    },
    DelegationCalibrated {
      chain_id: Text,
      validator: Text,
      delegation: u128,
    },
    TradeRouteCreated {
      reward_denom: Text,
      host_denom: Text,
    },
    TradeRouteUpdated {
      reward_denom: Text,
      host_denom: Text,
    },
    TradeRouteDeleted {
      reward_denom: Text,
      host_denom: Text,
    },
    SwapPriceUpdated {
      reward_denom: Text,
      host_denom: Text,
      price: FixedU128,
    },
    ParamsUpdated,
    BalanceCleared {
      chain_id: Text,
      amount: u128,
    },
    EpochStarted {
      identifier: EpochIdentifier,
      epoch_number: u64,
    },
  }

  #[pallet::error]
  pub enum Error<T> {
    InvalidHostZone,
    HostZoneNotFound,
    HostZoneAlreadyExists,
    HaltedHostZone,
    HostZoneNotHalted,
    RedemptionsDisabled,
    InvalidToken,
    InsufficientLiquidStake,
    InsufficientFunds,
    InvalidAmount,
    RedemptionRateOutsideSafetyBounds,
    InvalidBounds,
    ValidatorNotFound,
    ValidatorAlreadyExists,
    ValidatorWeightCapExceeded,
    /// Validator still has a delegation or a weight
    ValidatorNotRemovable,
    TooManyValidators,
    InvalidValidatorAddress,
    NoValidatorWeights,
    ValidatorSharesToTokensRateNotKnown,
    SlashQueryInProgress,
    DelegationChangesInProgress,
    IcaAccountNotFound,
    IcaTxFailed,
    IcqFailed,
    InvalidInterchainAccountAddress,
    EpochNotFound,
    RecordNotFound,
    InvalidRecordStatus,
    TooManyRedemptions,
    InvalidReceiverAddress,
    LsmLiquidStakeDisabled,
    InvalidLsmToken,
    TradeRouteNotFound,
    TradeRouteAlreadyExists,
    /// No light client behind the connection
    InvalidConnection,
    /// The route has no fresh pool price
    SwapPriceNotFound,
    /// TWAP assets do not match the route
    InvalidTwapRecord,
    MarshalFailure,
    UnmarshalFailure,
    /// Counter underflow on an in-progress tracker
    InvalidDelegationsInProgress,
    QueryNotFound,
    InvalidProof,
    StringTooLong,
    InvalidParams,
    ArithmeticOverflow,
  }

  #[pallet::genesis_config]
  #[derive(frame::prelude::DefaultNoBound)]
  pub struct GenesisConfig<T: Config> {
    pub params: Params,
    pub epoch_trackers: Vec<EpochTracker>,
    #[serde(skip)]
    pub _marker: core::marker::PhantomData<T>,
  }

  #[pallet::genesis_build]
  impl<T: Config> BuildGenesisConfig for GenesisConfig<T> {
    fn build(&self) {
      ModuleParams::<T>::put(self.params.clone());
      for tracker in &self.epoch_trackers {
        EpochTrackers::<T>::insert(tracker.epoch_identifier, tracker.clone());
      }
    }
  }

  #[pallet::hooks]
  impl<T: Config> Hooks<BlockNumberFor<T>> for Pallet<T> {
    fn on_initialize(_n: BlockNumberFor<T>) -> Weight {
      let checked = Self::check_all_redemption_rates();
      T::WeightInfo::check_redemption_rates(checked)
    }

    fn on_idle(_n: BlockNumberFor<T>, remaining_weight: Weight) -> Weight {
      Self::sweep_expired_queries(remaining_weight)
    }
  }

  #[pallet::call]
  impl<T: Config> Pallet<T> {
    /// Registers a host zone and opens its six interchain accounts.
    ///
    /// Zero bounds fall back to the default thresholds in [`Params`].
    #[pallet::call_index(0)]
    #[pallet::weight(T::WeightInfo::register_host_zone())]
    pub fn register_host_zone(
      origin: OriginFor<T>,
      connection_id: Vec<u8>,
      bech32_prefix: Vec<u8>,
      host_denom: Vec<u8>,
      ibc_denom: Vec<u8>,
      transfer_channel_id: Vec<u8>,
      unbonding_period: u64,
      min_redemption_rate: FixedU128,
      max_redemption_rate: FixedU128,
      lsm_liquid_stake_enabled: bool,
      community_pool_treasury_address: Option<Vec<u8>>,
      max_messages_per_ica_tx: Option<u32>,
    ) -> DispatchResult {
      T::AdminOrigin::ensure_origin(origin)?;
      Self::do_register_host_zone(
        connection_id,
        bech32_prefix,
        host_denom,
        ibc_denom,
        transfer_channel_id,
        unbonding_period,
        min_redemption_rate,
        max_redemption_rate,
        lsm_liquid_stake_enabled,
        community_pool_treasury_address,
        max_messages_per_ica_tx,
      )
    }

    #[pallet::call_index(1)]
    #[pallet::weight(T::WeightInfo::add_validators(validators.len() as u32))]
    pub fn add_validators(
      origin: OriginFor<T>,
      chain_id: Vec<u8>,
      validators: Vec<ValidatorParams>,
    ) -> DispatchResult {
      T::AdminOrigin::ensure_origin(origin)?;
      Self::do_add_validators(&chain_id, validators)
    }

    #[pallet::call_index(2)]
    #[pallet::weight(T::WeightInfo::delete_validator())]
    pub fn delete_validator(
      origin: OriginFor<T>,
      chain_id: Vec<u8>,
      validator_address: Vec<u8>,
    ) -> DispatchResult {
      T::AdminOrigin::ensure_origin(origin)?;
      Self::do_delete_validator(&chain_id, &validator_address)
    }

    #[pallet::call_index(3)]
    #[pallet::weight(T::WeightInfo::change_validator_weights(weights.len() as u32))]
    pub fn change_validator_weights(
      origin: OriginFor<T>,
      chain_id: Vec<u8>,
      weights: Vec<ValidatorWeight>,
    ) -> DispatchResult {
      T::AdminOrigin::ensure_origin(origin)?;
      Self::do_change_validator_weights(&chain_id, weights)
    }

    #[pallet::call_index(4)]
    #[pallet::weight(T::WeightInfo::liquid_stake())]
    pub fn liquid_stake(origin: OriginFor<T>, amount: u128, host_denom: Vec<u8>) -> DispatchResult {
      let staker = ensure_signed(origin)?;
      Self::do_liquid_stake(staker, amount, &host_denom).map(|_| ())
    }

    /// Stakes a bridged LSM share. Emits `LsmLiquidStake` when the stake
    /// completes inline, `PendingLsmLiquidStake` when a validator query must
    /// land first.
    #[pallet::call_index(5)]
    #[pallet::weight(T::WeightInfo::lsm_liquid_stake())]
    pub fn lsm_liquid_stake(
      origin: OriginFor<T>,
      amount: u128,
      lsm_token_ibc_denom: Vec<u8>,
    ) -> DispatchResult {
      let staker = ensure_signed(origin)?;
      Self::do_lsm_liquid_stake(staker, amount, &lsm_token_ibc_denom).map(|_| ())
    }

    #[pallet::call_index(6)]
    #[pallet::weight(T::WeightInfo::redeem_stake())]
    pub fn redeem_stake(
      origin: OriginFor<T>,
      chain_id: Vec<u8>,
      amount: u128,
      receiver: Vec<u8>,
    ) -> DispatchResult {
      let redeemer = ensure_signed(origin)?;
      Self::do_redeem_stake(redeemer, &chain_id, amount, &receiver)
    }

    #[pallet::call_index(7)]
    #[pallet::weight(T::WeightInfo::claim_undelegated_tokens())]
    pub fn claim_undelegated_tokens(
      origin: OriginFor<T>,
      chain_id: Vec<u8>,
      epoch: u64,
      receiver: Vec<u8>,
    ) -> DispatchResult {
      ensure_signed(origin)?;
      Self::do_claim_undelegated_tokens(&chain_id, epoch, &receiver)
    }

    #[pallet::call_index(8)]
    #[pallet::weight(T::WeightInfo::update_inner_redemption_rate_bounds())]
    pub fn update_inner_redemption_rate_bounds(
      origin: OriginFor<T>,
      chain_id: Vec<u8>,
      min_inner_redemption_rate: FixedU128,
      max_inner_redemption_rate: FixedU128,
    ) -> DispatchResult {
      T::GovernanceOrigin::ensure_origin(origin)?;
      Self::do_update_inner_redemption_rate_bounds(
        &chain_id,
        min_inner_redemption_rate,
        max_inner_redemption_rate,
      )
    }

    #[pallet::call_index(9)]
    #[pallet::weight(T::WeightInfo::resume_host_zone())]
    pub fn resume_host_zone(origin: OriginFor<T>, chain_id: Vec<u8>) -> DispatchResult {
      T::GovernanceOrigin::ensure_origin(origin)?;
      Self::do_resume_host_zone(&chain_id)
    }

    #[pallet::call_index(10)]
    #[pallet::weight(T::WeightInfo::create_trade_route())]
    pub fn create_trade_route(origin: OriginFor<T>, route: TradeRouteParams) -> DispatchResult {
      T::GovernanceOrigin::ensure_origin(origin)?;
      Self::do_create_trade_route(route)
    }

    #[pallet::call_index(11)]
    #[pallet::weight(T::WeightInfo::update_trade_route())]
    pub fn update_trade_route(
      origin: OriginFor<T>,
      reward_denom: Vec<u8>,
      host_denom: Vec<u8>,
      pool_id: u64,
      max_allowed_swap_loss_rate: Permill,
      min_swap_amount: u128,
      max_swap_amount: u128,
    ) -> DispatchResult {
      T::GovernanceOrigin::ensure_origin(origin)?;
      Self::do_update_trade_route(
        &reward_denom,
        &host_denom,
        pool_id,
        max_allowed_swap_loss_rate,
        min_swap_amount,
        max_swap_amount,
      )
    }

    #[pallet::call_index(12)]
    #[pallet::weight(T::WeightInfo::delete_trade_route())]
    pub fn delete_trade_route(
      origin: OriginFor<T>,
      reward_denom: Vec<u8>,
      host_denom: Vec<u8>,
    ) -> DispatchResult {
      T::GovernanceOrigin::ensure_origin(origin)?;
      Self::do_delete_trade_route(&reward_denom, &host_denom)
    }

    /// Re-opens an interchain account after its channel closed and re-queues
    /// everything that was in flight on it.
    #[pallet::call_index(13)]
    #[pallet::weight(T::WeightInfo::restore_interchain_account())]
    pub fn restore_interchain_account(
      origin: OriginFor<T>,
      chain_id: Vec<u8>,
      connection_id: Vec<u8>,
      account_owner: Vec<u8>,
    ) -> DispatchResult {
      ensure_signed(origin)?;
      Self::do_restore_interchain_account(&chain_id, &connection_id, &account_owner)
    }

    #[pallet::call_index(14)]
    #[pallet::weight(T::WeightInfo::update_validator_shares_exch_rate())]
    pub fn update_validator_shares_exch_rate(
      origin: OriginFor<T>,
      chain_id: Vec<u8>,
      validator_address: Vec<u8>,
    ) -> DispatchResult {
      T::AdminOrigin::ensure_origin(origin)?;
      Self::submit_validator_shares_to_tokens_rate_query(&chain_id, &validator_address)
    }

    #[pallet::call_index(15)]
    #[pallet::weight(T::WeightInfo::calibrate_delegation())]
    pub fn calibrate_delegation(
      origin: OriginFor<T>,
      chain_id: Vec<u8>,
      validator_address: Vec<u8>,
    ) -> DispatchResult {
      T::AdminOrigin::ensure_origin(origin)?;
      Self::submit_calibration_query(&chain_id, &validator_address)
    }

    /// Sends `amount` of the host denom held by the fee account back to the
    /// local fee module account over `channel_id`.
    #[pallet::call_index(16)]
    #[pallet::weight(T::WeightInfo::clear_balance())]
    pub fn clear_balance(
      origin: OriginFor<T>,
      chain_id: Vec<u8>,
      amount: u128,
      channel_id: Vec<u8>,
    ) -> DispatchResult {
      T::AdminOrigin::ensure_origin(origin)?;
      Self::do_clear_balance(&chain_id, amount, &channel_id)
    }

    #[pallet::call_index(17)]
    #[pallet::weight(T::WeightInfo::update_params())]
    pub fn update_params(origin: OriginFor<T>, params: Params) -> DispatchResult {
      T::GovernanceOrigin::ensure_origin(origin)?;
      ensure!(params.is_valid(), Error::<T>::InvalidParams);
      ModuleParams::<T>::put(params);
      Self::deposit_event(Event::ParamsUpdated);
      Ok(())
    }

    #[pallet::call_index(18)]
    #[pallet::weight(T::WeightInfo::rebalance_validators())]
    pub fn rebalance_validators(origin: OriginFor<T>, chain_id: Vec<u8>) -> DispatchResult {
      T::AdminOrigin::ensure_origin(origin)?;
      let host_zone = Self::get_host_zone(&chain_id)?;
      Self::rebalance_delegations(&host_zone).map(|_| ())
    }

    /// Delivers a proven query response. Stale responses follow the query's
    /// timeout policy.
    #[pallet::call_index(19)]
    #[pallet::weight(T::WeightInfo::submit_query_response())]
    pub fn submit_query_response(
      origin: OriginFor<T>,
      query_id: u64,
      response: Vec<u8>,
      proof: Vec<u8>,
      proof_height: u64,
    ) -> DispatchResult {
      ensure_signed(origin)?;
      Self::do_submit_query_response(query_id, response, proof, proof_height)
    }
  }

  impl<T: Config> Pallet<T> {
    /// Local fee and reward collector account.
    pub fn fee_account() -> T::AccountId {
      T::PalletId::get().into_sub_account_truncating(b"fee")
    }

    /// Module account owned by one host zone.
    pub fn zone_account(chain_id: &[u8], key: &[u8]) -> T::AccountId {
      let mut seed_input = chain_id.to_vec();
      seed_input.push(b'.');
      seed_input.extend_from_slice(key);
      let seed = frame::hashing::blake2_256(&seed_input);
      // Fold the seed into the PalletId so narrow AccountId types still get distinct accounts
      let mut id_bytes = T::PalletId::get().0;
      for (i, b) in seed.iter().enumerate() {
        id_bytes[i % 8] ^= b;
      }
      PalletId(id_bytes).into_sub_account_truncating(seed)
    }

    pub(crate) fn text(raw: &[u8]) -> Result<Text, DispatchError> {
      Text::try_from(raw.to_vec()).map_err(|_| Error::<T>::StringTooLong.into())
    }

    pub(crate) fn now_nanos() -> u64 {
      u64::try_from(T::UnixTime::now().as_nanos()).unwrap_or(u64::MAX)
    }

    pub(crate) fn get_host_zone(chain_id: &[u8]) -> Result<HostZone<T::AccountId>, DispatchError> {
      let key = Self::text(chain_id).map_err(|_| Error::<T>::HostZoneNotFound)?;
      HostZones::<T>::get(&key).ok_or_else(|| Error::<T>::HostZoneNotFound.into())
    }

    pub(crate) fn get_epoch_tracker(
      identifier: EpochIdentifier,
    ) -> Result<EpochTracker, DispatchError> {
      EpochTrackers::<T>::get(identifier).ok_or_else(|| Error::<T>::EpochNotFound.into())
    }
  }
}
