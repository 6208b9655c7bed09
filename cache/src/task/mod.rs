//! Background work owned by the cache lifecycle manager.

pub(crate) mod sweeper;
