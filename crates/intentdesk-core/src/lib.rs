//! Options intent desk: collateral accounts, withdrawals, PartyB bindings and
//! the open-intent lifecycle.
//!
//! All state changes go through [`Command`]s applied to a [`ProtocolState`];
//! the [`Engine`] serialises them, journals them and replays the journal on startup.

#![deny(unsafe_code)]

pub mod access;
pub mod account;
pub mod binding;
pub mod clock;
pub mod collateral;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod instant;
pub mod intent;
pub mod journal;
mod ops;
pub mod registry;
pub mod state;
pub mod storage;
pub mod types;
pub mod withdraw;

pub use access::{AccessControl, Role};
pub use account::{AccountLedger, Balance};
pub use binding::{BindingRegistry, BindingState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use collateral::TokenLedger;
pub use command::{ClosedIntent, Command, Outcome};
pub use config::{EngineConfig, ProtocolConfig};
pub use engine::{replay, BindingView, Engine, InstantActionView};
pub use error::{ErrorKind, PauseScope, ProtocolError};
pub use instant::{InstantActionMode, InstantActionRegistry};
pub use intent::{ExerciseFee, IntentBook, IntentStatus, OpenIntent, OpenIntentRequest, Trade};
pub use journal::{CommandJournal, Genesis, JournalEntry};
pub use registry::{NewSymbol, OptionType, Oracle, PartyBConfig, Registry, Symbol};
pub use state::{Guard, ProtocolState};
pub use storage::{JournalStorageConfig, PersistentJournal};
pub use types::{Address, Amount, Timestamp, ONE};
pub use withdraw::{WithdrawRegistry, WithdrawRequest, WithdrawStatus};
