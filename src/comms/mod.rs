//! The shared bounded buffer and the values it transports.
//!
//! `buffer` holds `BoundedBuffer`, a lock-protected FIFO with not-full / not-empty signals
//! so that callers can either poll it or block on it. `item` holds the opaque `Item`
//! identifiers that producer workers synthesize.
pub mod buffer;
pub mod item;
