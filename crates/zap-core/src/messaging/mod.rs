//! Session-client port and the inbound event plumbing around it.

pub mod bus;
pub mod outbound;
pub mod port;
pub mod types;
