//! Deserialization of the JSON fixture format and builders for the
//! pre-state, block and transaction a case describes.

use std::collections::HashMap;

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use serde::Deserialize;

use evm_core::common::serde_helper::{
    de_bytes, de_opt_addr, de_opt_bytes, de_opt_u256, de_opt_u64, de_opt_vec_u256, de_vec_h256,
    parse_address, parse_u256,
};
use evm_core::{AccountState, BlockEnv, Transaction, WorldState};

#[derive(Debug, Deserialize)]
pub struct TestCase {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(default, rename = "Hint")]
    pub hint: String,
    #[serde(rename = "Code")]
    pub code: CodeBlob,
    #[serde(rename = "Expect")]
    pub expect: Expectation,
    #[serde(default, rename = "Tx")]
    pub tx: Option<RawTx>,
    #[serde(default, rename = "Block")]
    pub block: Option<RawBlock>,
    #[serde(default, rename = "State")]
    pub state: HashMap<String, RawAccount>,
}

#[derive(Debug, Deserialize)]
pub struct CodeBlob {
    #[serde(rename = "Bin", deserialize_with = "de_bytes")]
    pub bin: Bytes,
    #[serde(default, rename = "Asm")]
    pub asm: String,
}

#[derive(Debug, Deserialize)]
pub struct Expectation {
    #[serde(default, rename = "Stack", deserialize_with = "de_opt_vec_u256")]
    pub stack: Option<Vec<U256>>,
    #[serde(default, rename = "Success")]
    pub success: bool,
    #[serde(default, rename = "Return", deserialize_with = "de_opt_bytes")]
    pub ret: Option<Bytes>,
    #[serde(default, rename = "Logs")]
    pub logs: Option<Vec<RawLog>>,
}

#[derive(Debug, Deserialize)]
pub struct RawLog {
    #[serde(deserialize_with = "de_opt_addr", default)]
    pub address: Option<Address>,
    #[serde(default, deserialize_with = "de_opt_bytes")]
    pub data: Option<Bytes>,
    #[serde(default, deserialize_with = "de_vec_h256")]
    pub topics: Vec<H256>,
}

#[derive(Debug, Deserialize)]
pub struct RawTx {
    #[serde(default, deserialize_with = "de_opt_addr")]
    pub to: Option<Address>,
    #[serde(default, deserialize_with = "de_opt_addr")]
    pub from: Option<Address>,
    #[serde(default, deserialize_with = "de_opt_addr")]
    pub origin: Option<Address>,
    #[serde(default, deserialize_with = "de_opt_u256")]
    pub gasprice: Option<U256>,
    #[serde(default, deserialize_with = "de_opt_u256")]
    pub value: Option<U256>,
    #[serde(default, deserialize_with = "de_opt_bytes")]
    pub data: Option<Bytes>,
}

#[derive(Debug, Deserialize)]
pub struct RawBlock {
    #[serde(default, deserialize_with = "de_opt_addr")]
    pub coinbase: Option<Address>,
    #[serde(default, deserialize_with = "de_opt_u256")]
    pub timestamp: Option<U256>,
    #[serde(default, deserialize_with = "de_opt_u256")]
    pub number: Option<U256>,
    #[serde(default, deserialize_with = "de_opt_u256")]
    pub difficulty: Option<U256>,
    #[serde(default, deserialize_with = "de_opt_u256")]
    pub gaslimit: Option<U256>,
    #[serde(default, deserialize_with = "de_opt_u256")]
    pub chainid: Option<U256>,
    #[serde(default, deserialize_with = "de_opt_u256")]
    pub basefee: Option<U256>,
}

#[derive(Debug, Deserialize)]
pub struct RawAccount {
    #[serde(default, deserialize_with = "de_opt_u256")]
    pub balance: Option<U256>,
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub nonce: Option<u64>,
    #[serde(default)]
    pub code: Option<RawCode>,
    #[serde(default)]
    pub storage: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct RawCode {
    #[serde(default, deserialize_with = "de_opt_bytes")]
    pub bin: Option<Bytes>,
}

pub fn build_world_state(pre: &HashMap<String, RawAccount>) -> anyhow::Result<WorldState> {
    let mut state = WorldState::new();
    for (addr_str, raw) in pre {
        let address = parse_address(addr_str).map_err(anyhow::Error::msg)?;
        let mut account = AccountState::default();
        if let Some(balance) = raw.balance {
            account.balance = balance;
        }
        if let Some(nonce) = raw.nonce {
            account.nonce = nonce;
        }
        if let Some(bin) = raw.code.as_ref().and_then(|c| c.bin.clone()) {
            account.code = bin;
        }
        for (key, value) in &raw.storage {
            let key = parse_u256(key).map_err(anyhow::Error::msg)?;
            let value = parse_u256(value).map_err(anyhow::Error::msg)?;
            account.storage.insert(key, value);
        }
        state.insert(&address, account);
    }
    Ok(state)
}

pub fn build_block(raw: &Option<RawBlock>) -> BlockEnv {
    let mut block = BlockEnv::default();
    if let Some(raw) = raw {
        if let Some(coinbase) = raw.coinbase {
            block.coinbase = coinbase;
        }
        if let Some(timestamp) = raw.timestamp {
            block.timestamp = timestamp;
        }
        if let Some(number) = raw.number {
            block.number = number;
        }
        if let Some(difficulty) = raw.difficulty {
            block.difficulty = difficulty;
        }
        if let Some(gas_limit) = raw.gaslimit {
            block.gas_limit = gas_limit;
        }
        if let Some(chain_id) = raw.chainid {
            block.chain_id = chain_id;
        }
        if let Some(base_fee) = raw.basefee {
            block.base_fee = base_fee;
        }
    }
    block
}

pub fn build_transaction(raw: &Option<RawTx>) -> Transaction {
    let mut tx = Transaction::default();
    if let Some(raw) = raw {
        if let Some(to) = raw.to {
            tx.to = to;
        }
        if let Some(from) = raw.from {
            tx.from = from;
        }
        if let Some(origin) = raw.origin {
            tx.origin = origin;
        }
        if let Some(gas_price) = raw.gasprice {
            tx.gas_price = gas_price;
        }
        if let Some(value) = raw.value {
            tx.value = value;
        }
        if let Some(data) = &raw.data {
            tx.data = data.clone();
        }
    }
    tx
}
