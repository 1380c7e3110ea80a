#![cfg_attr(all(test, feature = "unstable"), feature(test))]
#![allow(missing_docs)]

pub mod mean_shift;
pub mod scanner;
pub mod stomata_detector;
pub mod utils;
pub mod visualize;
pub const IS_DEBUG: bool = false;
