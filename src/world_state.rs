use std::collections::HashMap;

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use tracing::debug;

use crate::common::crypto::keccak256;
use crate::vm::EvmError;
use crate::word;

/// One account: balance, code, per-slot storage and the creation nonce.
/// Missing accounts read as all zeros.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountState {
    pub nonce: u64,
    pub balance: U256,
    pub code: Bytes,
    pub storage: HashMap<U256, U256>,
}

impl AccountState {
    pub fn new(code: Bytes) -> Self {
        AccountState {
            code,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
enum JournalEntry {
    BalanceChange { address: Address, old_value: U256 },
    NonceChange { address: Address, old_value: u64 },
    StorageChange {
        address: Address,
        key: U256,
        old_value: Option<U256>,
    },
    CodeChange { address: Address, old_code: Bytes },
    AccountCreated { address: Address },
    AccountDeleted {
        address: Address,
        old_account: AccountState,
    },
}

/// The mutable accounts map. Every mutation made after a `checkpoint` is
/// recorded as a reversible journal entry; `rollback` undoes to the matching
/// marker, `commit` folds the scope into its parent. Checkpoints nest, one
/// per call frame.
#[derive(Debug, Default)]
pub struct WorldState {
    accounts: HashMap<Address, AccountState>,
    journal: Vec<JournalEntry>,
    markers: Vec<usize>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn checkpoint(&mut self) {
        self.markers.push(self.journal.len());
    }

    /// Undo every mutation recorded since the innermost checkpoint.
    pub fn rollback(&mut self) {
        let marker = self.markers.pop().unwrap_or(0);
        debug!(entries = self.journal.len() - marker, "state rollback");
        while self.journal.len() > marker {
            let Some(entry) = self.journal.pop() else {
                break;
            };
            self.revert_entry(entry);
        }
    }

    /// Keep the mutations of the innermost scope, handing its journal to the
    /// enclosing checkpoint (entries are dropped once no scope remains).
    pub fn commit(&mut self) {
        self.markers.pop();
        if self.markers.is_empty() {
            self.journal.clear();
        }
    }

    fn record(&mut self, entry: JournalEntry) {
        if !self.markers.is_empty() {
            self.journal.push(entry);
        }
    }

    fn revert_entry(&mut self, entry: JournalEntry) {
        match entry {
            JournalEntry::BalanceChange { address, old_value } => {
                if let Some(account) = self.accounts.get_mut(&address) {
                    account.balance = old_value;
                }
            }
            JournalEntry::NonceChange { address, old_value } => {
                if let Some(account) = self.accounts.get_mut(&address) {
                    account.nonce = old_value;
                }
            }
            JournalEntry::StorageChange {
                address,
                key,
                old_value,
            } => {
                if let Some(account) = self.accounts.get_mut(&address) {
                    match old_value {
                        Some(value) => account.storage.insert(key, value),
                        None => account.storage.remove(&key),
                    };
                }
            }
            JournalEntry::CodeChange { address, old_code } => {
                if let Some(account) = self.accounts.get_mut(&address) {
                    account.code = old_code;
                }
            }
            JournalEntry::AccountCreated { address } => {
                self.accounts.remove(&address);
            }
            JournalEntry::AccountDeleted {
                address,
                old_account,
            } => {
                self.accounts.insert(address, old_account);
            }
        }
    }

    /// The account at `address`, created empty (and journaled) if missing.
    fn account_mut(&mut self, address: &Address) -> &mut AccountState {
        if !self.accounts.contains_key(address) {
            self.record(JournalEntry::AccountCreated { address: *address });
        }
        self.accounts.entry(*address).or_default()
    }

    /// Install a whole account, replacing any existing one.
    pub fn insert(&mut self, address: &Address, account: AccountState) {
        match self.accounts.insert(*address, account) {
            None => self.record(JournalEntry::AccountCreated { address: *address }),
            Some(old_account) => self.record(JournalEntry::AccountDeleted {
                address: *address,
                old_account,
            }),
        }
    }

    /// Ensure an (empty) account exists at `address`.
    pub fn create_account(&mut self, address: &Address) {
        self.account_mut(address);
    }

    pub fn delete(&mut self, address: &Address) {
        if let Some(old_account) = self.accounts.remove(address) {
            self.record(JournalEntry::AccountDeleted {
                address: *address,
                old_account,
            });
        }
    }

    pub fn set_balance(&mut self, address: &Address, balance: U256) {
        let old_value = self.get_balance(address);
        let account = self.account_mut(address);
        if account.balance == balance {
            return;
        }
        account.balance = balance;
        self.record(JournalEntry::BalanceChange {
            address: *address,
            old_value,
        });
    }

    pub fn set_nonce(&mut self, address: &Address, nonce: u64) {
        let old_value = self.get_nonce(address);
        let account = self.account_mut(address);
        if account.nonce == nonce {
            return;
        }
        account.nonce = nonce;
        self.record(JournalEntry::NonceChange {
            address: *address,
            old_value,
        });
    }

    pub fn set_storage(&mut self, address: &Address, key: U256, value: U256) {
        let account = self.account_mut(address);
        let old_value = account.storage.get(&key).copied();
        if old_value == Some(value) {
            return;
        }
        account.storage.insert(key, value);
        self.record(JournalEntry::StorageChange {
            address: *address,
            key,
            old_value,
        });
    }

    pub fn set_code(&mut self, address: &Address, code: Bytes) {
        let account = self.account_mut(address);
        if account.code == code {
            return;
        }
        let old_code = std::mem::replace(&mut account.code, code);
        self.record(JournalEntry::CodeChange {
            address: *address,
            old_code,
        });
    }

    /// Move `value` between accounts; fails without touching anything when
    /// the sender cannot cover it.
    pub fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        value: U256,
    ) -> Result<(), EvmError> {
        let from_balance = self.get_balance(from);
        if from_balance < value {
            return Err(EvmError::InsufficientBalance);
        }
        if value.is_zero() || from == to {
            return Ok(());
        }
        self.set_balance(from, from_balance - value);
        let to_balance = self.get_balance(to);
        self.set_balance(to, word::add(to_balance, value));
        Ok(())
    }

    pub fn get_account(&self, address: &Address) -> Option<&AccountState> {
        self.accounts.get(address)
    }

    pub fn account_exists(&self, address: &Address) -> bool {
        self.accounts.contains_key(address)
    }

    pub fn get_balance(&self, address: &Address) -> U256 {
        self.accounts
            .get(address)
            .map(|a| a.balance)
            .unwrap_or_default()
    }

    pub fn get_nonce(&self, address: &Address) -> u64 {
        self.accounts.get(address).map(|a| a.nonce).unwrap_or(0)
    }

    pub fn get_code(&self, address: &Address) -> Bytes {
        self.accounts
            .get(address)
            .map(|a| a.code.clone())
            .unwrap_or_default()
    }

    pub fn get_storage(&self, address: &Address, key: U256) -> U256 {
        self.accounts
            .get(address)
            .and_then(|a| a.storage.get(&key))
            .copied()
            .unwrap_or_default()
    }

    /// Hash of the account's code; zero for a missing account or empty code.
    pub fn code_hash(&self, address: &Address) -> H256 {
        match self.accounts.get(address) {
            Some(account) if !account.code.is_empty() => keccak256(&account.code),
            _ => H256::zero(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &AccountState)> {
        self.accounts.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn addr(tag: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = tag;
        Address::from(bytes)
    }

    #[test]
    fn missing_accounts_read_as_zero() {
        let state = WorldState::new();
        let a = addr(1);
        assert_eq!(state.get_balance(&a), U256::zero());
        assert_eq!(state.get_nonce(&a), 0);
        assert!(state.get_code(&a).is_empty());
        assert_eq!(state.get_storage(&a, U256::one()), U256::zero());
        assert_eq!(state.code_hash(&a), H256::zero());
    }

    #[test]
    fn code_hash_of_empty_code_is_zero() {
        let mut state = WorldState::new();
        let a = addr(1);
        state.create_account(&a);
        assert_eq!(state.code_hash(&a), H256::zero());
        state.set_code(&a, Bytes::from_static(&[0xff, 0xff, 0xff, 0xff]));
        assert_eq!(
            state.code_hash(&a),
            H256(hex!(
                "29045a592007d0c246ef02c2223570da9522d0cf0f73282c79a1bc8f0bb2c238"
            ))
        );
    }

    #[test]
    fn rollback_restores_every_mutation_kind() {
        let mut state = WorldState::new();
        let a = addr(1);
        let b = addr(2);
        state.set_balance(&a, U256::from(100));
        state.set_code(&a, Bytes::from_static(&[0x60, 0x01]));
        state.set_storage(&a, U256::one(), U256::from(7));

        state.checkpoint();
        state.set_balance(&a, U256::from(5));
        state.set_nonce(&a, 3);
        state.set_storage(&a, U256::one(), U256::from(8));
        state.set_storage(&a, U256::from(2), U256::from(9));
        state.set_code(&a, Bytes::new());
        state.set_balance(&b, U256::from(50));
        state.delete(&a);
        state.rollback();

        assert_eq!(state.get_balance(&a), U256::from(100));
        assert_eq!(state.get_nonce(&a), 0);
        assert_eq!(state.get_storage(&a, U256::one()), U256::from(7));
        assert_eq!(state.get_storage(&a, U256::from(2)), U256::zero());
        assert_eq!(state.get_code(&a), Bytes::from_static(&[0x60, 0x01]));
        assert!(!state.account_exists(&b));
    }

    #[test]
    fn nested_checkpoints_are_independent() {
        let mut state = WorldState::new();
        let a = addr(1);
        state.checkpoint();
        state.set_balance(&a, U256::from(1));

        state.checkpoint();
        state.set_balance(&a, U256::from(2));
        state.rollback();
        assert_eq!(state.get_balance(&a), U256::from(1));

        state.checkpoint();
        state.set_balance(&a, U256::from(3));
        state.commit();
        assert_eq!(state.get_balance(&a), U256::from(3));

        // Outer rollback undoes committed inner work too.
        state.rollback();
        assert!(!state.account_exists(&a));
    }

    #[test]
    fn transfer_checks_balance_first() {
        let mut state = WorldState::new();
        let a = addr(1);
        let b = addr(2);
        state.set_balance(&a, U256::from(10));
        assert!(matches!(
            state.transfer(&a, &b, U256::from(11)),
            Err(EvmError::InsufficientBalance)
        ));
        state.transfer(&a, &b, U256::from(4)).unwrap();
        assert_eq!(state.get_balance(&a), U256::from(6));
        assert_eq!(state.get_balance(&b), U256::from(4));
    }

    #[test]
    fn deleted_account_is_restored_on_rollback() {
        let mut state = WorldState::new();
        let a = addr(1);
        state.set_balance(&a, U256::from(7));
        state.set_code(&a, Bytes::from_static(&[0x00]));
        state.checkpoint();
        state.delete(&a);
        assert!(!state.account_exists(&a));
        state.rollback();
        assert_eq!(state.get_balance(&a), U256::from(7));
        assert_eq!(state.get_code(&a), Bytes::from_static(&[0x00]));
    }
}
