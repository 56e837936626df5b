use std::fmt;

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use tracing::{debug, trace};

use crate::block::BlockEnv;
use crate::jumpdest::JumpDestTable;
use crate::memory::Memory;
use crate::operations::{self, opcodes};
use crate::stack::Stack;
use crate::transaction::Transaction;
use crate::word;
use crate::world_state::WorldState;

/// Frame-local faults. Any of these halts the current frame with
/// `success = false`; only `Revert` carries return data out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvmError {
    StackUnderflow,
    StackOverflow,
    InvalidOpcode(u8),
    InvalidJumpDestination,
    StaticCallStateChange,
    MemoryOffsetTooLarge,
    DepthLimitExceeded,
    InsufficientBalance,
    Revert,
}

impl fmt::Display for EvmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvmError::StackUnderflow => write!(f, "stack underflow"),
            EvmError::StackOverflow => write!(f, "stack overflow"),
            EvmError::InvalidOpcode(op) => write!(f, "invalid opcode {op:#04x}"),
            EvmError::InvalidJumpDestination => write!(f, "invalid jump destination"),
            EvmError::StaticCallStateChange => {
                write!(f, "state change inside a static call")
            }
            EvmError::MemoryOffsetTooLarge => write!(f, "memory offset too large"),
            EvmError::DepthLimitExceeded => write!(f, "call depth limit exceeded"),
            EvmError::InsufficientBalance => {
                write!(f, "insufficient balance for transfer")
            }
            EvmError::Revert => write!(f, "execution reverted"),
        }
    }
}

impl std::error::Error for EvmError {}

/// What an instruction tells the dispatch loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    /// Successful halt (STOP or RETURN); the frame output is in
    /// `Machine::output`.
    Halt,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Bytes,
}

/// The immutable environment of one frame. `address` is the execution
/// context (storage owner, LOG address); `code_address` is the account whose
/// code runs. The two differ under DELEGATECALL and CALLCODE.
#[derive(Debug, Clone)]
pub struct Context<'a> {
    pub address: Address,
    pub code_address: Address,
    pub caller: Address,
    pub origin: Address,
    pub gas_price: U256,
    pub value: U256,
    pub calldata: Bytes,
    pub code: Bytes,
    pub block: &'a BlockEnv,
    pub depth: u64,
    pub is_static: bool,
}

/// The mutable state of one frame: operand stack, memory, program counter,
/// the return-data buffer of the most recent sub-call, the frame's output
/// and the logs it (and its committed sub-frames) emitted.
#[derive(Debug, Default)]
pub struct Machine {
    pub stack: Stack,
    pub memory: Memory,
    pub pc: usize,
    pub return_data: Bytes,
    pub output: Bytes,
    pub logs: Vec<LogEntry>,
    jumpdests: JumpDestTable,
}

impl Machine {
    pub fn new(code: &[u8]) -> Self {
        Machine {
            jumpdests: JumpDestTable::analyze(code),
            ..Default::default()
        }
    }

    /// Fetch-decode-dispatch until the frame halts. `Ok` is a successful
    /// halt (STOP, RETURN, or running off the end of the code); any fault,
    /// including REVERT, is `Err`.
    pub fn run(&mut self, ctx: &Context, world: &mut WorldState) -> Result<(), EvmError> {
        loop {
            if self.pc >= ctx.code.len() {
                return Ok(()); // implicit STOP
            }
            let op = ctx.code[self.pc];
            trace!(depth = ctx.depth, pc = self.pc, opcode = op, "step");
            self.pc += 1;
            match self.step(op, ctx, world)? {
                Control::Continue => {}
                Control::Halt => return Ok(()),
            }
        }
    }

    fn step(
        &mut self,
        op: u8,
        ctx: &Context,
        world: &mut WorldState,
    ) -> Result<Control, EvmError> {
        if (opcodes::PUSH1..=opcodes::PUSH32).contains(&op) {
            let n = (op - opcodes::PUSH1) as usize + 1;
            let end = self.pc + n;
            if end > ctx.code.len() {
                return Err(EvmError::InvalidOpcode(op)); // immediate runs past the code
            }
            let value = U256::from_big_endian(&ctx.code[self.pc..end]);
            self.pc = end;
            self.stack.push(value)?;
            return Ok(Control::Continue);
        }
        if (opcodes::DUP1..=opcodes::DUP16).contains(&op) {
            self.stack.dup((op - opcodes::DUP1) as usize + 1)?;
            return Ok(Control::Continue);
        }
        if (opcodes::SWAP1..=opcodes::SWAP16).contains(&op) {
            self.stack.swap((op - opcodes::SWAP1) as usize + 1)?;
            return Ok(Control::Continue);
        }
        if (opcodes::LOG0..=opcodes::LOG4).contains(&op) {
            return self.emit_log(op, ctx);
        }

        let operation = operations::INSTRUCTION_TABLE
            .get(&op)
            .ok_or(EvmError::InvalidOpcode(op))?;
        if self.stack.len() < operation.min_stack {
            return Err(EvmError::StackUnderflow);
        }
        (operation.execute)(self, ctx, world)
    }

    fn emit_log(&mut self, op: u8, ctx: &Context) -> Result<Control, EvmError> {
        if ctx.is_static {
            return Err(EvmError::StaticCallStateChange);
        }
        let offset = self.stack.pop()?;
        let length = self.stack.pop()?;
        let mut topics = Vec::with_capacity((op - opcodes::LOG0) as usize);
        for _ in 0..(op - opcodes::LOG0) {
            topics.push(word::to_h256(self.stack.pop()?));
        }
        let data = if length.is_zero() {
            Bytes::new()
        } else {
            self.memory
                .read(word::to_usize(offset)?, word::to_usize(length)?)?
        };
        self.logs.push(LogEntry {
            address: ctx.address,
            topics,
            data,
        });
        Ok(Control::Continue)
    }

    /// Move the program counter to `dest`, which must be a known JUMPDEST.
    pub(crate) fn jump(&mut self, dest: U256) -> Result<(), EvmError> {
        let dest = word::to_usize(dest).map_err(|_| EvmError::InvalidJumpDestination)?;
        if !self.jumpdests.is_valid(dest) {
            return Err(EvmError::InvalidJumpDestination);
        }
        self.pc = dest;
        Ok(())
    }
}

/// Outcome of one transaction-level execution.
#[derive(Debug)]
pub struct ExecutionResult {
    pub success: bool,
    /// Residual operand stack, top first.
    pub stack: Vec<U256>,
    pub return_data: Bytes,
    pub logs: Vec<LogEntry>,
}

/// Execute `code` in the context of `tx` against `state`. State mutations
/// are kept only when the outermost frame succeeds.
pub fn run(
    code: Bytes,
    block: &BlockEnv,
    tx: &Transaction,
    state: &mut WorldState,
) -> ExecutionResult {
    let ctx = Context {
        address: tx.to,
        code_address: tx.to,
        caller: tx.from,
        origin: tx.origin,
        gas_price: tx.gas_price,
        value: tx.value,
        calldata: tx.data.clone(),
        code,
        block,
        depth: 0,
        is_static: false,
    };
    let mut machine = Machine::new(&ctx.code);

    state.checkpoint();
    let outcome = machine.run(&ctx, state);
    match outcome {
        Ok(()) => state.commit(),
        Err(err) => {
            debug!(error = %err, "transaction frame failed");
            state.rollback();
        }
    }

    let return_data = match outcome {
        Ok(()) | Err(EvmError::Revert) => machine.output.clone(),
        Err(_) => Bytes::new(),
    };
    ExecutionResult {
        success: outcome.is_ok(),
        stack: machine.stack.into_words_top_first(),
        return_data,
        logs: if outcome.is_ok() { machine.logs } else { Vec::new() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn execute(code: &[u8]) -> ExecutionResult {
        let block = BlockEnv::default();
        let tx = Transaction::default();
        let mut state = WorldState::new();
        run(Bytes::copy_from_slice(code), &block, &tx, &mut state)
    }

    #[test]
    fn running_off_the_end_is_an_implicit_stop() {
        let result = execute(&hex!("60016002"));
        assert!(result.success);
        assert_eq!(result.stack, vec![U256::from(2), U256::from(1)]);
    }

    #[test]
    fn truncated_push_faults() {
        let result = execute(&hex!("6101"));
        assert!(!result.success);
        assert!(result.stack.is_empty());
    }

    #[test]
    fn revert_keeps_output_but_not_logs() {
        // PUSH1 0xF1, PUSH1 0, MSTORE, LOG0(31,1), PUSH1 1, PUSH1 31, REVERT
        let result = execute(&hex!("60f16000526001601fa06001601ffd"));
        assert!(!result.success);
        assert_eq!(result.return_data, Bytes::from_static(&[0xf1]));
        assert!(result.logs.is_empty());
    }

    #[test]
    fn execution_is_deterministic() {
        let code = hex!("7f0102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f20600052600051600a2056fe5b");
        let first = execute(&code);
        let second = execute(&code);
        assert_eq!(first.success, second.success);
        assert_eq!(first.stack, second.stack);
        assert_eq!(first.return_data, second.return_data);
    }
}
