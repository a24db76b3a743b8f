//! Transition functions of [`crate::state::ProtocolState`], grouped by caller.

mod account;
mod control;
mod party_a;
mod party_b;
