//! Data models for the Courier bridge.
//!
//! This module contains type definitions for email delivery requests and
//! results, ServiceNow Table API envelopes, and the JSON-RPC request and
//! response shapes handled by the protocol dispatcher.

mod email;
mod record;
mod rpc;

pub use email::*;
pub use record::*;
pub use rpc::*;
