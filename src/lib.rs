//! An EVM bytecode interpreter: a 256-bit stack machine with byte-addressable
//! memory, per-account storage and recursive message calls over a journaled
//! world state. Gas is not metered in this revision.

pub mod block;
pub mod calls;
pub mod common;
pub mod jumpdest;
pub mod memory;
pub mod operations;
pub mod stack;
pub mod transaction;
pub mod vm;
pub mod word;
pub mod world_state;

pub use block::BlockEnv;
pub use transaction::Transaction;
pub use vm::{run, Context, EvmError, ExecutionResult, LogEntry, Machine};
pub use world_state::{AccountState, WorldState};
