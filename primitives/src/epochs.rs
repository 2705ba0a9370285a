use codec::{Decode, DecodeWithMemTracking, Encode, MaxEncodedLen};
use scale_info::TypeInfo;
use serde::{Deserialize, Serialize};

/// Epoch kinds emitted by the epoch source.
///
/// - `Day`: drives the unbonding pipeline.
/// - `StrideEpoch`: drives deposits, delegation, reinvest and the redemption rate.
/// - `Hour`: drives the reward trade route.
/// - `Mint`: tracked but not acted upon by the coordinator.
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
pub enum EpochIdentifier {
  Day,
  Hour,
  StrideEpoch,
  Mint,
}

impl EpochIdentifier {
  pub const fn as_str(&self) -> &'static str {
    match self {
      EpochIdentifier::Day => "day",
      EpochIdentifier::Hour => "hour",
      EpochIdentifier::StrideEpoch => "stride_epoch",
      EpochIdentifier::Mint => "mint",
    }
  }

  pub fn from_bytes(raw: &[u8]) -> Option<Self> {
    match raw {
      b"day" => Some(EpochIdentifier::Day),
      b"hour" => Some(EpochIdentifier::Hour),
      b"stride_epoch" => Some(EpochIdentifier::StrideEpoch),
      b"mint" => Some(EpochIdentifier::Mint),
      _ => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn identifiers_parse_back() {
    for id in [
      EpochIdentifier::Day,
      EpochIdentifier::Hour,
      EpochIdentifier::StrideEpoch,
      EpochIdentifier::Mint,
    ] {
      assert_eq!(EpochIdentifier::from_bytes(id.as_str().as_bytes()), Some(id));
    }
    assert_eq!(EpochIdentifier::from_bytes(b"week"), None);
  }
}
