#![cfg_attr(not(feature = "std"), no_std)]

pub mod accounts;
pub mod ecosystem;
pub mod epochs;

pub use accounts::*;
pub use ecosystem::*;
pub use epochs::*;
