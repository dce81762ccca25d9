//! # Integration Flows

#[cfg(test)]
pub(crate) mod fixtures;

pub mod backends;
pub mod dispatch_flows;
pub mod retention;
