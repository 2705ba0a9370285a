use codec::{Decode, DecodeWithMemTracking, Encode, MaxEncodedLen};
use scale_info::TypeInfo;
use serde::{Deserialize, Serialize};

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
#[cfg(feature = "std")]
use std::vec::Vec;

/// Roles of the interchain accounts controlled by the coordinator.
///
/// The first six live on a host zone; the converter roles are registered
/// per trade route on the reward and trade zones.
#[derive(
  Clone,
  Copy,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  MaxEncodedLen,
  Ord,
  PartialEq,
  PartialOrd,
  TypeInfo,
  Serialize,
  Deserialize,
)]
pub enum IcaAccountType {
  Delegation,
  Withdrawal,
  Redemption,
  Fee,
  CommunityPoolDeposit,
  CommunityPoolReturn,
  ConverterUnwind,
  ConverterTrade,
}

impl IcaAccountType {
  /// Roles registered for every host zone.
  pub const HOST_ROLES: [IcaAccountType; 6] = [
    IcaAccountType::Delegation,
    IcaAccountType::Withdrawal,
    IcaAccountType::Redemption,
    IcaAccountType::Fee,
    IcaAccountType::CommunityPoolDeposit,
    IcaAccountType::CommunityPoolReturn,
  ];

  pub const fn as_str(&self) -> &'static str {
    match self {
      IcaAccountType::Delegation => "DELEGATION",
      IcaAccountType::Withdrawal => "WITHDRAWAL",
      IcaAccountType::Redemption => "REDEMPTION",
      IcaAccountType::Fee => "FEE",
      IcaAccountType::CommunityPoolDeposit => "COMMUNITY_POOL_DEPOSIT",
      IcaAccountType::CommunityPoolReturn => "COMMUNITY_POOL_RETURN",
      IcaAccountType::ConverterUnwind => "CONVERTER_UNWIND",
      IcaAccountType::ConverterTrade => "CONVERTER_TRADE",
    }
  }

  pub fn from_bytes(raw: &[u8]) -> Option<Self> {
    [
      IcaAccountType::Delegation,
      IcaAccountType::Withdrawal,
      IcaAccountType::Redemption,
      IcaAccountType::Fee,
      IcaAccountType::CommunityPoolDeposit,
      IcaAccountType::CommunityPoolReturn,
      IcaAccountType::ConverterUnwind,
      IcaAccountType::ConverterTrade,
    ]
    .into_iter()
    .find(|role| role.as_str().as_bytes() == raw)
  }
}

/// Parsed interchain account owner string.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum IcaOwner {
  /// `{chain_id}.{ROLE}`
  HostZone {
    chain_id: Vec<u8>,
    role: IcaAccountType,
  },
  /// `{chain_id}.{reward_denom}-{host_denom}.{ROLE}`
  TradeRoute {
    chain_id: Vec<u8>,
    route_id: Vec<u8>,
    role: IcaAccountType,
  },
}

/// Owner string for a host zone account.
pub fn host_zone_owner(chain_id: &[u8], role: IcaAccountType) -> Vec<u8> {
  let mut owner = Vec::with_capacity(chain_id.len() + 24);
  owner.extend_from_slice(chain_id);
  owner.push(b'.');
  owner.extend_from_slice(role.as_str().as_bytes());
  owner
}

/// Owner string for a trade route account.
pub fn trade_route_owner(chain_id: &[u8], route_id: &[u8], role: IcaAccountType) -> Vec<u8> {
  let mut owner = Vec::with_capacity(chain_id.len() + route_id.len() + 24);
  owner.extend_from_slice(chain_id);
  owner.push(b'.');
  owner.extend_from_slice(route_id);
  owner.push(b'.');
  owner.extend_from_slice(role.as_str().as_bytes());
  owner
}

/// Parses an owner string. The role is always the last dot-separated segment
/// and the chain id the first; anything in between is a trade route id.
pub fn parse_owner(owner: &[u8]) -> Option<IcaOwner> {
  let first = owner.iter().position(|b| *b == b'.')?;
  let last = owner.iter().rposition(|b| *b == b'.')?;
  let chain_id = owner[..first].to_vec();
  let role = IcaAccountType::from_bytes(&owner[last + 1..])?;
  if chain_id.is_empty() {
    return None;
  }
  if first == last {
    Some(IcaOwner::HostZone { chain_id, role })
  } else {
    let route_id = owner[first + 1..last].to_vec();
    if route_id.is_empty() {
      return None;
    }
    Some(IcaOwner::TradeRoute {
      chain_id,
      route_id,
      role,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn host_owner_round_trips() {
    let owner = host_zone_owner(b"cosmoshub-4", IcaAccountType::Delegation);
    assert_eq!(owner, b"cosmoshub-4.DELEGATION".to_vec());
    assert_eq!(
      parse_owner(&owner),
      Some(IcaOwner::HostZone {
        chain_id: b"cosmoshub-4".to_vec(),
        role: IcaAccountType::Delegation
      })
    );
  }

  #[test]
  fn trade_owner_keeps_route_segment() {
    let owner = trade_route_owner(b"osmosis-1", b"uusdc-uatom", IcaAccountType::ConverterTrade);
    assert_eq!(owner, b"osmosis-1.uusdc-uatom.CONVERTER_TRADE".to_vec());
    assert_eq!(
      parse_owner(&owner),
      Some(IcaOwner::TradeRoute {
        chain_id: b"osmosis-1".to_vec(),
        route_id: b"uusdc-uatom".to_vec(),
        role: IcaAccountType::ConverterTrade
      })
    );
  }

  #[test]
  fn unknown_role_is_rejected() {
    assert_eq!(parse_owner(b"cosmoshub-4.STAKER"), None);
    assert_eq!(parse_owner(b".FEE"), None);
  }
}
