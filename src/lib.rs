//! Live comment relay
//!
//! Stores comments and replies on videos and pushes every new one, in near
//! real time, to clients streaming that video's events. Each event is also
//! appended to a durable log for downstream consumers.

pub mod commentrelay;
pub mod error;
