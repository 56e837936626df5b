use ethereum_types::{Address, U256};

/// Block-level context read by the environment opcodes. Immutable for the
/// duration of a transaction.
#[derive(Debug, Clone)]
pub struct BlockEnv {
    pub coinbase: Address,
    pub timestamp: U256,
    pub number: U256,
    /// Post-merge this slot carries PREVRANDAO; the opcode name is kept.
    pub difficulty: U256,
    pub gas_limit: U256,
    pub chain_id: U256,
    pub base_fee: U256,
}

impl Default for BlockEnv {
    fn default() -> Self {
        Self {
            coinbase: Address::zero(),
            timestamp: U256::zero(),
            number: U256::zero(),
            difficulty: U256::zero(),
            gas_limit: U256::zero(),
            chain_id: U256::one(),
            base_fee: U256::zero(),
        }
    }
}
