use bytes::Bytes;
use ethereum_types::{Address, U256};

/// The message that starts the outermost frame: who sent it, which account's
/// code runs, and the value and input bytes it carries.
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    /// Account whose code executes (ADDRESS in the outer frame).
    pub to: Address,
    /// Direct caller (CALLER in the outer frame).
    pub from: Address,
    /// Transaction originator (ORIGIN in every frame).
    pub origin: Address,
    pub gas_price: U256,
    pub value: U256,
    pub data: Bytes,
}
