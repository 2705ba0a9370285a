use crate as pallet_stakeibc;
use crate::{
  AckStatus, DenomTrace, EpochHooks, EpochInfo, EpochTracker, IcaController, IcaLifecycleHooks,
  IcqTransport, Params, PacketId, Query, RateLimiter, RedemptionRateOracle, RemoteMsg, Text,
  TokenOps, TransferOps, ValidatorParams,
};
use frame::prelude::*;
use polkadot_sdk::{
  frame_support::{
    PalletId, assert_ok, construct_runtime,
    traits::{ConstU32, ConstU64, Get},
  },
  frame_system::EnsureRoot,
  sp_runtime::{
    BuildStorage, FixedU128,
    traits::{BlakeTwo256, Convert, IdentityLookup, Zero},
  },
};
use primitives::{EpochIdentifier, IcaAccountType, host_zone_owner, params};

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec;
use alloc::vec::Vec;
use core::cell::RefCell;

type Block = polkadot_sdk::frame_system::mocking::MockBlock<Test>;
pub type AccountId = u64;

pub const ALICE: AccountId = 1;
pub const BOB: AccountId = 2;
pub const CHARLIE: AccountId = 3;

pub const CHAIN_ID: &[u8] = b"cosmoshub-4";
pub const CONNECTION: &[u8] = b"connection-0";
pub const TRANSFER_CHANNEL: &[u8] = b"channel-0";
pub const HOST_DENOM: &[u8] = b"uatom";
pub const IBC_DENOM: &[u8] = b"ibc/27394FB092D2ECCD56123C74F36E4C1F926001CEADA9CA97EA622B25F41E5EB2";
pub const ST_DENOM: &[u8] = b"stuatom";
pub const BECH32_PREFIX: &[u8] = b"cosmos";
pub const UNBONDING_PERIOD_DAYS: u64 = 21;

/// 2023-11-14 22:13:20 UTC
pub const GENESIS_TIME_MS: u64 = 1_700_000_000_000;
pub const GENESIS_TIME_NANOS: u64 = GENESIS_TIME_MS * 1_000_000;
pub const STRIDE_EPOCH_NANOS: u64 = 6 * params::NANOS_PER_HOUR;

construct_runtime!(
  pub enum Test {
    System: polkadot_sdk::frame_system,
    Timestamp: polkadot_sdk::pallet_timestamp,
    Stakeibc: pallet_stakeibc,
  }
);

impl polkadot_sdk::frame_system::Config for Test {
  type BaseCallFilter = polkadot_sdk::frame_support::traits::Everything;
  type BlockWeights = ();
  type BlockLength = ();
  type DbWeight = ();
  type RuntimeOrigin = RuntimeOrigin;
  type RuntimeCall = RuntimeCall;
  type Nonce = u64;
  type Hash = polkadot_sdk::sp_core::H256;
  type Hashing = BlakeTwo256;
  type AccountId = AccountId;
  type Lookup = IdentityLookup<Self::AccountId>;
  type Block = Block;
  type RuntimeEvent = RuntimeEvent;
  type BlockHashCount = ConstU64<250>;
  type Version = ();
  type PalletInfo = PalletInfo;
  type AccountData = ();
  type OnNewAccount = ();
  type OnKilledAccount = ();
  type SystemWeightInfo = ();
  type SS58Prefix = ();
  type OnSetCode = ();
  type MaxConsumers = ConstU32<16>;
  type RuntimeTask = ();
  type ExtensionsWeightInfo = ();
  type SingleBlockMigrations = ();
  type MultiBlockMigrator = ();
  type PreInherents = ();
  type PostInherents = ();
  type PostTransactions = ();
}

impl polkadot_sdk::pallet_timestamp::Config for Test {
  type Moment = u64;
  type OnTimestampSet = ();
  type MinimumPeriod = ConstU64<1>;
  type WeightInfo = ();
}

pub struct StakeibcPalletId;
impl Get<PalletId> for StakeibcPalletId {
  fn get() -> PalletId {
    PalletId(*primitives::pallet_ids::STAKEIBC_PALLET_ID)
  }
}

/// Outbound transfer captured by [`MockTransfer`].
#[derive(Clone, Debug, PartialEq)]
pub struct SentTransfer {
  pub sender: AccountId,
  pub channel: Vec<u8>,
  pub denom: Vec<u8>,
  pub amount: u128,
  pub receiver: Vec<u8>,
  pub timeout: u64,
  pub packet: PacketId,
}

/// Interchain transaction captured by [`MockIcaController`].
#[derive(Clone, Debug, PartialEq)]
pub struct SentTx {
  pub connection: Vec<u8>,
  pub owner: Vec<u8>,
  pub msgs: Vec<RemoteMsg>,
  pub timeout: u64,
  pub packet: PacketId,
}

thread_local! {
  static BALANCES: RefCell<BTreeMap<(AccountId, Vec<u8>), u128>> = RefCell::new(BTreeMap::new());

  static ISSUANCE: RefCell<BTreeMap<Vec<u8>, u128>> = RefCell::new(BTreeMap::new());

  static DENOM_TRACES: RefCell<BTreeMap<Vec<u8>, DenomTrace>> = RefCell::new(BTreeMap::new());

  static TRANSFERS: RefCell<Vec<SentTransfer>> = RefCell::new(Vec::new());

  static CONNECTIONS: RefCell<BTreeMap<Vec<u8>, Vec<u8>>> = RefCell::new(BTreeMap::new());

  static REGISTERED_ACCOUNTS: RefCell<Vec<(Vec<u8>, Vec<u8>)>> = RefCell::new(Vec::new());

  static SENT_TXS: RefCell<Vec<SentTx>> = RefCell::new(Vec::new());

  static SENDS_LEFT: RefCell<Option<usize>> = RefCell::new(None);

  static NEXT_SEQUENCE: RefCell<u64> = RefCell::new(1);

  static QUERIES: RefCell<Vec<Query>> = RefCell::new(Vec::new());

  static PROOFS_VALID: RefCell<bool> = RefCell::new(true);

  static BLACKLIST: RefCell<BTreeSet<Vec<u8>>> = RefCell::new(BTreeSet::new());

  static WHITELIST: RefCell<Vec<(Vec<u8>, Vec<u8>)>> = RefCell::new(Vec::new());

  static POSTED_RATES: RefCell<BTreeMap<Vec<u8>, FixedU128>> = RefCell::new(BTreeMap::new());
}

pub fn reset_mock_adapters() {
  BALANCES.with(|b| b.borrow_mut().clear());
  ISSUANCE.with(|i| i.borrow_mut().clear());
  DENOM_TRACES.with(|d| d.borrow_mut().clear());
  TRANSFERS.with(|t| t.borrow_mut().clear());
  CONNECTIONS.with(|c| c.borrow_mut().clear());
  REGISTERED_ACCOUNTS.with(|r| r.borrow_mut().clear());
  SENT_TXS.with(|s| s.borrow_mut().clear());
  SENDS_LEFT.with(|l| *l.borrow_mut() = None);
  NEXT_SEQUENCE.with(|n| *n.borrow_mut() = 1);
  QUERIES.with(|q| q.borrow_mut().clear());
  PROOFS_VALID.with(|p| *p.borrow_mut() = true);
  BLACKLIST.with(|b| b.borrow_mut().clear());
  WHITELIST.with(|w| w.borrow_mut().clear());
  POSTED_RATES.with(|p| p.borrow_mut().clear());
}

pub fn balance_of(who: AccountId, denom: &[u8]) -> u128 {
  BALANCES.with(|b| b.borrow().get(&(who, denom.to_vec())).copied().unwrap_or(0))
}

pub fn issuance_of(denom: &[u8]) -> u128 {
  ISSUANCE.with(|i| i.borrow().get(denom).copied().unwrap_or(0))
}

/// Credits `amount` and counts it into the issuance of `denom`.
pub fn fund(who: AccountId, denom: &[u8], amount: u128) {
  BALANCES.with(|b| {
    *b.borrow_mut().entry((who, denom.to_vec())).or_default() += amount;
  });
  ISSUANCE.with(|i| {
    *i.borrow_mut().entry(denom.to_vec()).or_default() += amount;
  });
}

pub fn set_denom_trace(ibc_denom: &[u8], path: &[u8], base_denom: &[u8]) {
  DENOM_TRACES.with(|d| {
    d.borrow_mut().insert(
      ibc_denom.to_vec(),
      DenomTrace {
        path: path.to_vec(),
        base_denom: base_denom.to_vec(),
      },
    );
  });
}

pub fn set_connection(connection_id: &[u8], chain_id: &[u8]) {
  CONNECTIONS.with(|c| {
    c.borrow_mut().insert(connection_id.to_vec(), chain_id.to_vec());
  });
}

pub fn sent_transfers() -> Vec<SentTransfer> {
  TRANSFERS.with(|t| t.borrow().clone())
}

pub fn registered_accounts() -> Vec<(Vec<u8>, Vec<u8>)> {
  REGISTERED_ACCOUNTS.with(|r| r.borrow().clone())
}

pub fn sent_txs() -> Vec<SentTx> {
  SENT_TXS.with(|s| s.borrow().clone())
}

pub fn clear_sent() {
  SENT_TXS.with(|s| s.borrow_mut().clear());
  TRANSFERS.with(|t| t.borrow_mut().clear());
  QUERIES.with(|q| q.borrow_mut().clear());
}

pub fn submitted_queries() -> Vec<Query> {
  QUERIES.with(|q| q.borrow().clone())
}

/// Lets `n` more interchain transactions through, then rejects every send.
pub fn fail_sends_after(n: usize) {
  SENDS_LEFT.with(|l| *l.borrow_mut() = Some(n));
}

pub fn set_proofs_valid(valid: bool) {
  PROOFS_VALID.with(|p| *p.borrow_mut() = valid);
}

pub fn is_blacklisted(denom: &[u8]) -> bool {
  BLACKLIST.with(|b| b.borrow().contains(denom))
}

pub fn whitelisted_pairs() -> Vec<(Vec<u8>, Vec<u8>)> {
  WHITELIST.with(|w| w.borrow().clone())
}

pub fn posted_rate(st_denom: &[u8]) -> Option<FixedU128> {
  POSTED_RATES.with(|p| p.borrow().get(st_denom).copied())
}

fn text(raw: &[u8]) -> Text {
  Text::try_from(raw.to_vec()).unwrap()
}

fn next_packet(port: &[u8], channel: &[u8]) -> PacketId {
  let sequence = NEXT_SEQUENCE.with(|n| {
    let mut n = n.borrow_mut();
    let sequence = *n;
    *n += 1;
    sequence
  });
  PacketId {
    port_id: text(port),
    channel_id: text(channel),
    sequence,
  }
}

pub struct MockTokens;

impl TokenOps<AccountId> for MockTokens {
  fn balance(who: &AccountId, denom: &[u8]) -> u128 {
    balance_of(*who, denom)
  }

  fn total_issuance(denom: &[u8]) -> u128 {
    issuance_of(denom)
  }

  fn transfer(from: &AccountId, to: &AccountId, denom: &[u8], amount: u128) -> DispatchResult {
    BALANCES.with(|b| {
      let mut map = b.borrow_mut();
      let src = map.get(&(*from, denom.to_vec())).copied().unwrap_or(0);
      if src < amount {
        return Err(DispatchError::Token(
          polkadot_sdk::sp_runtime::TokenError::FundsUnavailable,
        ));
      }
      map.insert((*from, denom.to_vec()), src - amount);
      *map.entry((*to, denom.to_vec())).or_default() += amount;
      Ok(())
    })
  }

  fn mint(to: &AccountId, denom: &[u8], amount: u128) -> DispatchResult {
    fund(*to, denom, amount);
    Ok(())
  }

  fn burn(from: &AccountId, denom: &[u8], amount: u128) -> DispatchResult {
    BALANCES.with(|b| {
      let mut map = b.borrow_mut();
      let bal = map.get(&(*from, denom.to_vec())).copied().unwrap_or(0);
      if bal < amount {
        return Err(DispatchError::Token(
          polkadot_sdk::sp_runtime::TokenError::FundsUnavailable,
        ));
      }
      map.insert((*from, denom.to_vec()), bal - amount);
      Ok(())
    })?;
    ISSUANCE.with(|i| {
      let mut map = i.borrow_mut();
      let supply = map.entry(denom.to_vec()).or_default();
      *supply = supply.saturating_sub(amount);
    });
    Ok(())
  }
}

/// Escrows the sent amount the way a transfer module does.
pub struct MockTransfer;

impl TransferOps<AccountId> for MockTransfer {
  fn transfer(
    sender: &AccountId,
    source_channel: &[u8],
    denom: &[u8],
    amount: u128,
    receiver: &[u8],
    timeout_timestamp: u64,
  ) -> Result<PacketId, DispatchError> {
    MockTokens::burn(sender, denom, amount)?;
    let packet = next_packet(b"transfer", source_channel);
    TRANSFERS.with(|t| {
      t.borrow_mut().push(SentTransfer {
        sender: *sender,
        channel: source_channel.to_vec(),
        denom: denom.to_vec(),
        amount,
        receiver: receiver.to_vec(),
        timeout: timeout_timestamp,
        packet: packet.clone(),
      })
    });
    Ok(packet)
  }

  fn denom_trace(ibc_denom: &[u8]) -> Option<DenomTrace> {
    DENOM_TRACES.with(|d| d.borrow().get(ibc_denom).cloned())
  }
}

pub struct MockIcaController;

impl IcaController for MockIcaController {
  fn register_account(connection_id: &[u8], owner: &[u8]) -> DispatchResult {
    REGISTERED_ACCOUNTS.with(|r| r.borrow_mut().push((connection_id.to_vec(), owner.to_vec())));
    Ok(())
  }

  fn send_tx(
    connection_id: &[u8],
    owner: &[u8],
    msgs: Vec<RemoteMsg>,
    timeout_timestamp: u64,
  ) -> Result<PacketId, DispatchError> {
    SENDS_LEFT.with(|l| {
      let mut left = l.borrow_mut();
      match *left {
        Some(0) => Err(DispatchError::Other("ica channel closed")),
        Some(n) => {
          *left = Some(n - 1);
          Ok(())
        }
        None => Ok(()),
      }
    })?;
    let mut port = b"icacontroller-".to_vec();
    port.extend_from_slice(owner);
    let packet = next_packet(&port, b"channel-ica");
    SENT_TXS.with(|s| {
      s.borrow_mut().push(SentTx {
        connection: connection_id.to_vec(),
        owner: owner.to_vec(),
        msgs,
        timeout: timeout_timestamp,
        packet: packet.clone(),
      })
    });
    Ok(packet)
  }

  fn counterparty_chain_id(connection_id: &[u8]) -> Option<Vec<u8>> {
    CONNECTIONS.with(|c| c.borrow().get(connection_id).cloned())
  }

  fn next_sequence_send(_port_id: &[u8], _channel_id: &[u8]) -> Option<u64> {
    Some(NEXT_SEQUENCE.with(|n| *n.borrow()))
  }
}

pub struct MockIcq;

impl IcqTransport for MockIcq {
  fn submit(query: &Query) -> DispatchResult {
    QUERIES.with(|q| q.borrow_mut().push(query.clone()));
    Ok(())
  }

  fn verify_proof(_query: &Query, _response: &[u8], _proof: &[u8], _proof_height: u64) -> bool {
    PROOFS_VALID.with(|p| *p.borrow())
  }
}

pub struct MockRateLimiter;

impl RateLimiter for MockRateLimiter {
  fn add_denom_to_blacklist(denom: &[u8]) {
    BLACKLIST.with(|b| b.borrow_mut().insert(denom.to_vec()));
  }

  fn remove_denom_from_blacklist(denom: &[u8]) {
    BLACKLIST.with(|b| b.borrow_mut().remove(denom));
  }

  fn add_whitelisted_address_pair(sender: &[u8], receiver: &[u8]) {
    WHITELIST.with(|w| w.borrow_mut().push((sender.to_vec(), receiver.to_vec())));
  }
}

pub struct MockOracle;

impl RedemptionRateOracle for MockOracle {
  fn post_redemption_rate(st_denom: &[u8], redemption_rate: FixedU128) {
    POSTED_RATES.with(|p| p.borrow_mut().insert(st_denom.to_vec(), redemption_rate));
  }
}

pub struct MockLocalAddress;

impl Convert<AccountId, Vec<u8>> for MockLocalAddress {
  fn convert(who: AccountId) -> Vec<u8> {
    alloc::format!("stride1acct{who}").into_bytes()
  }
}

#[cfg(feature = "runtime-benchmarks")]
pub struct MockBenchmarkHelper;

#[cfg(feature = "runtime-benchmarks")]
impl crate::BenchmarkHelper<AccountId> for MockBenchmarkHelper {
  fn setup_connection(connection_id: &[u8], chain_id: &[u8]) {
    set_connection(connection_id, chain_id);
  }

  fn fund(who: &AccountId, denom: &[u8], amount: u128) {
    fund(*who, denom, amount);
  }
}

impl pallet_stakeibc::Config for Test {
  type PalletId = StakeibcPalletId;
  type AdminOrigin = EnsureRoot<AccountId>;
  type GovernanceOrigin = EnsureRoot<AccountId>;
  type Tokens = MockTokens;
  type Transfer = MockTransfer;
  type IcaController = MockIcaController;
  type IcqTransport = MockIcq;
  type RateLimiter = MockRateLimiter;
  type Oracle = MockOracle;
  type LocalAddress = MockLocalAddress;
  type UnixTime = Timestamp;
  type WeightInfo = ();
  #[cfg(feature = "runtime-benchmarks")]
  type BenchmarkHelper = MockBenchmarkHelper;
}

fn tracker(identifier: EpochIdentifier, duration: u64) -> EpochTracker {
  EpochTracker {
    epoch_identifier: identifier,
    epoch_number: 1,
    next_epoch_start_time: GENESIS_TIME_NANOS + duration,
    duration,
  }
}

pub fn new_test_ext() -> polkadot_sdk::sp_io::TestExternalities {
  let mut t = polkadot_sdk::frame_system::GenesisConfig::<Test>::default()
    .build_storage()
    .unwrap();

  pallet_stakeibc::GenesisConfig::<Test> {
    params: Params::default(),
    epoch_trackers: vec![
      tracker(EpochIdentifier::StrideEpoch, STRIDE_EPOCH_NANOS),
      tracker(EpochIdentifier::Day, params::NANOS_PER_DAY),
      tracker(EpochIdentifier::Hour, params::NANOS_PER_HOUR),
      tracker(EpochIdentifier::Mint, params::NANOS_PER_HOUR),
    ],
    _marker: Default::default(),
  }
  .assimilate_storage(&mut t)
  .unwrap();

  let mut ext = polkadot_sdk::sp_io::TestExternalities::new(t);
  ext.execute_with(|| {
    reset_mock_adapters();
    System::set_block_number(1);
    Timestamp::set_timestamp(GENESIS_TIME_MS);
  });
  ext
}

pub fn now_nanos() -> u64 {
  Timestamp::get() * 1_000_000
}

pub fn advance_time(nanos: u64) {
  Timestamp::set_timestamp(Timestamp::get() + nanos / 1_000_000);
}

/// Address the mock host assigns to one of the zone's accounts.
pub fn ica_address(role: IcaAccountType) -> Vec<u8> {
  let mut address = b"cosmos1".to_vec();
  address.extend_from_slice(role.as_str().to_ascii_lowercase().as_bytes());
  address
}

pub fn validator_address(name: &str) -> Vec<u8> {
  alloc::format!("cosmosvaloper1{name}").into_bytes()
}

/// Registers the test zone without opening any of its accounts.
pub fn register_host_zone_without_icas() {
  set_connection(CONNECTION, CHAIN_ID);
  assert_ok!(Stakeibc::register_host_zone(
    RuntimeOrigin::root(),
    CONNECTION.to_vec(),
    BECH32_PREFIX.to_vec(),
    HOST_DENOM.to_vec(),
    IBC_DENOM.to_vec(),
    TRANSFER_CHANNEL.to_vec(),
    UNBONDING_PERIOD_DAYS,
    FixedU128::zero(),
    FixedU128::zero(),
    true,
    None,
    None,
  ));
}

/// Registers the test zone and acknowledges its six accounts.
pub fn register_host_zone() {
  register_host_zone_without_icas();
  for role in IcaAccountType::HOST_ROLES {
    open_ica(role);
  }
}

pub fn open_ica(role: IcaAccountType) {
  assert_ok!(<Stakeibc as IcaLifecycleHooks>::on_channel_open_ack(
    CONNECTION,
    &host_zone_owner(CHAIN_ID, role),
    &ica_address(role),
  ));
}

pub fn add_validators(validators: &[(&str, u64)]) {
  let params = validators
    .iter()
    .map(|(name, weight)| ValidatorParams {
      name: name.as_bytes().to_vec(),
      address: validator_address(name),
      weight: *weight,
    })
    .collect();
  assert_ok!(Stakeibc::add_validators(
    RuntimeOrigin::root(),
    CHAIN_ID.to_vec(),
    params
  ));
}

/// Overwrites validator delegations and the zone total.
pub fn set_delegations(delegations: &[(&str, u128)]) {
  pallet_stakeibc::HostZones::<Test>::mutate(text(CHAIN_ID), |maybe| {
    let zone = maybe.as_mut().unwrap();
    for (name, amount) in delegations {
      let index = zone.validator_index(&validator_address(name)).unwrap();
      zone.validators[index].delegation = *amount;
    }
    zone.total_delegations = zone.validators.iter().map(|v| v.delegation).sum();
  });
}

pub fn set_redemption_rate(rate: FixedU128) {
  pallet_stakeibc::HostZones::<Test>::mutate(text(CHAIN_ID), |maybe| {
    maybe.as_mut().unwrap().redemption_rate = rate;
  });
}

pub fn host_zone() -> crate::HostZone<AccountId> {
  pallet_stakeibc::HostZones::<Test>::get(text(CHAIN_ID)).unwrap()
}

pub fn ack(packet: &PacketId, status: AckStatus) {
  <Stakeibc as IcaLifecycleHooks>::on_packet_outcome(packet.clone(), status);
}

pub fn last_tx() -> SentTx {
  sent_txs().last().cloned().unwrap()
}

pub fn last_transfer() -> SentTransfer {
  sent_transfers().last().cloned().unwrap()
}

/// Delivers a proven response to a pending query.
pub fn respond(query_id: u64, response: Vec<u8>) -> DispatchResult {
  Stakeibc::submit_query_response(RuntimeOrigin::signed(CHARLIE), query_id, response, vec![1], 10)
}

pub fn start_epoch(identifier: EpochIdentifier, epoch_number: u64) -> Weight {
  let duration = pallet_stakeibc::EpochTrackers::<Test>::get(identifier)
    .map(|tracker| tracker.duration)
    .unwrap_or(params::NANOS_PER_HOUR);
  <Stakeibc as EpochHooks>::on_epoch_start(EpochInfo {
    identifier,
    epoch_number,
    start_time: now_nanos(),
    duration,
  })
}

pub fn chain_text() -> Text {
  text(CHAIN_ID)
}
