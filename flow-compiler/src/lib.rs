//! Compiles network intents into per-switch match/action rules
//!
//! The [`engine`] module holds the policy engines (L2 reachability, firewall and traffic
//! engineering). They rely on the [`topology`] model, the [`path`] selection and compilation
//! functions and the [`rule`] data model, and push their output into a
//! [`registry::FlowTableSink`].

pub mod engine;
pub mod error;
pub mod objective;
pub mod path;
pub mod policy;
pub mod registry;
pub mod rule;
pub mod topology;

#[cfg(test)]
mod test_util;
