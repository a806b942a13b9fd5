//! Common data types

pub mod pose;
pub mod scan;

pub use pose::*;
pub use scan::*;
