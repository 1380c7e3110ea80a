#![cfg_attr(all(test, feature = "unstable"), feature(test))]
#![allow(missing_docs)]

pub use burn;

pub mod dataset;
pub mod model;
pub mod trainer;
pub const IS_DEBUG: bool = false;
