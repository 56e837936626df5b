//! The instruction set: one function per opcode plus the dispatch table the
//! machine consults for everything outside the PUSH/DUP/SWAP/LOG ranges.

use std::collections::HashMap;

use bytes::Bytes;
use ethereum_types::U256;
use once_cell::sync::Lazy;

use crate::calls::{self, CallKind};
use crate::common::crypto;
use crate::vm::{Context, Control, EvmError, Machine};
use crate::word;
use crate::world_state::WorldState;

pub mod opcodes {
    pub const STOP: u8 = 0x00;
    pub const ADD: u8 = 0x01;
    pub const MUL: u8 = 0x02;
    pub const SUB: u8 = 0x03;
    pub const DIV: u8 = 0x04;
    pub const SDIV: u8 = 0x05;
    pub const MOD: u8 = 0x06;
    pub const SMOD: u8 = 0x07;
    pub const ADDMOD: u8 = 0x08;
    pub const MULMOD: u8 = 0x09;
    pub const EXP: u8 = 0x0a;
    pub const SIGNEXTEND: u8 = 0x0b;

    pub const LT: u8 = 0x10;
    pub const GT: u8 = 0x11;
    pub const SLT: u8 = 0x12;
    pub const SGT: u8 = 0x13;
    pub const EQ: u8 = 0x14;
    pub const ISZERO: u8 = 0x15;
    pub const AND: u8 = 0x16;
    pub const OR: u8 = 0x17;
    pub const XOR: u8 = 0x18;
    pub const NOT: u8 = 0x19;
    pub const BYTE: u8 = 0x1a;
    pub const SHL: u8 = 0x1b;
    pub const SHR: u8 = 0x1c;
    pub const SAR: u8 = 0x1d;

    pub const KECCAK256: u8 = 0x20;

    pub const ADDRESS: u8 = 0x30;
    pub const BALANCE: u8 = 0x31;
    pub const ORIGIN: u8 = 0x32;
    pub const CALLER: u8 = 0x33;
    pub const CALLVALUE: u8 = 0x34;
    pub const CALLDATALOAD: u8 = 0x35;
    pub const CALLDATASIZE: u8 = 0x36;
    pub const CALLDATACOPY: u8 = 0x37;
    pub const CODESIZE: u8 = 0x38;
    pub const CODECOPY: u8 = 0x39;
    pub const GASPRICE: u8 = 0x3a;
    pub const EXTCODESIZE: u8 = 0x3b;
    pub const EXTCODECOPY: u8 = 0x3c;
    pub const RETURNDATASIZE: u8 = 0x3d;
    pub const RETURNDATACOPY: u8 = 0x3e;
    pub const EXTCODEHASH: u8 = 0x3f;

    pub const BLOCKHASH: u8 = 0x40;
    pub const COINBASE: u8 = 0x41;
    pub const TIMESTAMP: u8 = 0x42;
    pub const NUMBER: u8 = 0x43;
    pub const DIFFICULTY: u8 = 0x44;
    pub const GASLIMIT: u8 = 0x45;
    pub const CHAINID: u8 = 0x46;
    pub const SELFBALANCE: u8 = 0x47;
    pub const BASEFEE: u8 = 0x48;

    pub const POP: u8 = 0x50;
    pub const MLOAD: u8 = 0x51;
    pub const MSTORE: u8 = 0x52;
    pub const MSTORE8: u8 = 0x53;
    pub const SLOAD: u8 = 0x54;
    pub const SSTORE: u8 = 0x55;
    pub const JUMP: u8 = 0x56;
    pub const JUMPI: u8 = 0x57;
    pub const PC: u8 = 0x58;
    pub const MSIZE: u8 = 0x59;
    pub const GAS: u8 = 0x5a;
    pub const JUMPDEST: u8 = 0x5b;

    pub const PUSH1: u8 = 0x60;
    pub const PUSH32: u8 = 0x7f;
    pub const DUP1: u8 = 0x80;
    pub const DUP16: u8 = 0x8f;
    pub const SWAP1: u8 = 0x90;
    pub const SWAP16: u8 = 0x9f;
    pub const LOG0: u8 = 0xa0;
    pub const LOG4: u8 = 0xa4;

    pub const CREATE: u8 = 0xf0;
    pub const CALL: u8 = 0xf1;
    pub const CALLCODE: u8 = 0xf2;
    pub const RETURN: u8 = 0xf3;
    pub const DELEGATECALL: u8 = 0xf4;
    pub const CREATE2: u8 = 0xf5;
    pub const STATICCALL: u8 = 0xfa;
    pub const REVERT: u8 = 0xfd;
    pub const INVALID: u8 = 0xfe;
    pub const SELFDESTRUCT: u8 = 0xff;
}

pub type ExecutionFunc =
    fn(&mut Machine, &Context, &mut WorldState) -> Result<Control, EvmError>;

pub struct Operation {
    pub opcode: u8,
    pub name: &'static str,
    /// Stack items the instruction consumes; checked before dispatch.
    pub min_stack: usize,
    pub execute: ExecutionFunc,
}

impl Operation {
    fn new(opcode: u8, name: &'static str, min_stack: usize, execute: ExecutionFunc) -> Self {
        Operation {
            opcode,
            name,
            min_stack,
            execute,
        }
    }
}

/// Copy a frame memory slice out, without expanding on zero length.
fn mem_slice(machine: &mut Machine, offset: U256, length: U256) -> Result<Bytes, EvmError> {
    if length.is_zero() {
        return Ok(Bytes::new());
    }
    machine
        .memory
        .read(word::to_usize(offset)?, word::to_usize(length)?)
}

/// Shared body of the *COPY opcodes: destination offsets must materialize,
/// while a source offset past the machine word simply reads zeros.
fn copy_to_memory(
    machine: &mut Machine,
    src: &[u8],
    src_offset: U256,
    dst_offset: U256,
    length: U256,
) -> Result<(), EvmError> {
    if length.is_zero() {
        return Ok(());
    }
    let dst = word::to_usize(dst_offset)?;
    let len = word::to_usize(length)?;
    let src_offset = if src_offset > U256::from(usize::MAX as u64) {
        usize::MAX
    } else {
        src_offset.low_u64() as usize
    };
    machine.memory.copy_from(src, src_offset, dst, len)
}

fn op_stop(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    m.output = Bytes::new();
    Ok(Control::Halt)
}

fn op_add(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    let a = m.stack.pop()?;
    let b = m.stack.pop()?;
    m.stack.push(word::add(a, b))?;
    Ok(Control::Continue)
}

fn op_mul(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    let a = m.stack.pop()?;
    let b = m.stack.pop()?;
    m.stack.push(word::mul(a, b))?;
    Ok(Control::Continue)
}

fn op_sub(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    let a = m.stack.pop()?;
    let b = m.stack.pop()?;
    m.stack.push(word::sub(a, b))?;
    Ok(Control::Continue)
}

fn op_div(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    let a = m.stack.pop()?;
    let b = m.stack.pop()?;
    m.stack.push(word::div(a, b))?;
    Ok(Control::Continue)
}

fn op_sdiv(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    let a = m.stack.pop()?;
    let b = m.stack.pop()?;
    m.stack.push(word::sdiv(a, b))?;
    Ok(Control::Continue)
}

fn op_mod(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    let a = m.stack.pop()?;
    let b = m.stack.pop()?;
    m.stack.push(word::rem(a, b))?;
    Ok(Control::Continue)
}

fn op_smod(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    let a = m.stack.pop()?;
    let b = m.stack.pop()?;
    m.stack.push(word::smod(a, b))?;
    Ok(Control::Continue)
}

fn op_addmod(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    let a = m.stack.pop()?;
    let b = m.stack.pop()?;
    let n = m.stack.pop()?;
    m.stack.push(word::addmod(a, b, n))?;
    Ok(Control::Continue)
}

fn op_mulmod(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    let a = m.stack.pop()?;
    let b = m.stack.pop()?;
    let n = m.stack.pop()?;
    m.stack.push(word::mulmod(a, b, n))?;
    Ok(Control::Continue)
}

fn op_exp(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    let base = m.stack.pop()?;
    let power = m.stack.pop()?;
    m.stack.push(word::exp(base, power))?;
    Ok(Control::Continue)
}

fn op_signextend(
    m: &mut Machine,
    _ctx: &Context,
    _w: &mut WorldState,
) -> Result<Control, EvmError> {
    let b = m.stack.pop()?;
    let x = m.stack.pop()?;
    m.stack.push(word::signextend(b, x))?;
    Ok(Control::Continue)
}

fn op_lt(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    let a = m.stack.pop()?;
    let b = m.stack.pop()?;
    m.stack.push(word::from_bool(a < b))?;
    Ok(Control::Continue)
}

fn op_gt(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    let a = m.stack.pop()?;
    let b = m.stack.pop()?;
    m.stack.push(word::from_bool(a > b))?;
    Ok(Control::Continue)
}

fn op_slt(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    let a = m.stack.pop()?;
    let b = m.stack.pop()?;
    m.stack.push(word::from_bool(word::slt(a, b)))?;
    Ok(Control::Continue)
}

fn op_sgt(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    let a = m.stack.pop()?;
    let b = m.stack.pop()?;
    m.stack.push(word::from_bool(word::sgt(a, b)))?;
    Ok(Control::Continue)
}

fn op_eq(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    let a = m.stack.pop()?;
    let b = m.stack.pop()?;
    m.stack.push(word::from_bool(a == b))?;
    Ok(Control::Continue)
}

fn op_iszero(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    let a = m.stack.pop()?;
    m.stack.push(word::from_bool(a.is_zero()))?;
    Ok(Control::Continue)
}

fn op_and(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    let a = m.stack.pop()?;
    let b = m.stack.pop()?;
    m.stack.push(a & b)?;
    Ok(Control::Continue)
}

fn op_or(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    let a = m.stack.pop()?;
    let b = m.stack.pop()?;
    m.stack.push(a | b)?;
    Ok(Control::Continue)
}

fn op_xor(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    let a = m.stack.pop()?;
    let b = m.stack.pop()?;
    m.stack.push(a ^ b)?;
    Ok(Control::Continue)
}

fn op_not(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    let a = m.stack.pop()?;
    m.stack.push(!a)?;
    Ok(Control::Continue)
}

fn op_byte(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    let i = m.stack.pop()?;
    let x = m.stack.pop()?;
    m.stack.push(word::byte(i, x))?;
    Ok(Control::Continue)
}

fn op_shl(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    let shift = m.stack.pop()?;
    let value = m.stack.pop()?;
    m.stack.push(word::shl(shift, value))?;
    Ok(Control::Continue)
}

fn op_shr(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    let shift = m.stack.pop()?;
    let value = m.stack.pop()?;
    m.stack.push(word::shr(shift, value))?;
    Ok(Control::Continue)
}

fn op_sar(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    let shift = m.stack.pop()?;
    let value = m.stack.pop()?;
    m.stack.push(word::sar(shift, value))?;
    Ok(Control::Continue)
}

fn op_keccak256(
    m: &mut Machine,
    _ctx: &Context,
    _w: &mut WorldState,
) -> Result<Control, EvmError> {
    let offset = m.stack.pop()?;
    let length = m.stack.pop()?;
    let data = mem_slice(m, offset, length)?;
    m.stack.push(word::from_h256(&crypto::keccak256(&data)))?;
    Ok(Control::Continue)
}

fn op_address(m: &mut Machine, ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    m.stack.push(word::from_address(&ctx.address))?;
    Ok(Control::Continue)
}

fn op_balance(m: &mut Machine, _ctx: &Context, w: &mut WorldState) -> Result<Control, EvmError> {
    let address = word::to_address(m.stack.pop()?);
    m.stack.push(w.get_balance(&address))?;
    Ok(Control::Continue)
}

fn op_origin(m: &mut Machine, ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    m.stack.push(word::from_address(&ctx.origin))?;
    Ok(Control::Continue)
}

fn op_caller(m: &mut Machine, ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    m.stack.push(word::from_address(&ctx.caller))?;
    Ok(Control::Continue)
}

fn op_callvalue(m: &mut Machine, ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    m.stack.push(ctx.value)?;
    Ok(Control::Continue)
}

fn op_calldataload(
    m: &mut Machine,
    ctx: &Context,
    _w: &mut WorldState,
) -> Result<Control, EvmError> {
    let index = m.stack.pop()?;
    let mut buf = [0u8; 32];
    if index <= U256::from(usize::MAX as u64) {
        let base = index.low_u64() as usize;
        for (i, slot) in buf.iter_mut().enumerate() {
            if let Some(byte) = base.checked_add(i).and_then(|j| ctx.calldata.get(j)) {
                *slot = *byte;
            }
        }
    }
    m.stack.push(U256::from_big_endian(&buf))?;
    Ok(Control::Continue)
}

fn op_calldatasize(
    m: &mut Machine,
    ctx: &Context,
    _w: &mut WorldState,
) -> Result<Control, EvmError> {
    m.stack.push(U256::from(ctx.calldata.len()))?;
    Ok(Control::Continue)
}

fn op_calldatacopy(
    m: &mut Machine,
    ctx: &Context,
    _w: &mut WorldState,
) -> Result<Control, EvmError> {
    let dst = m.stack.pop()?;
    let src = m.stack.pop()?;
    let len = m.stack.pop()?;
    copy_to_memory(m, &ctx.calldata, src, dst, len)?;
    Ok(Control::Continue)
}

fn op_codesize(m: &mut Machine, ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    m.stack.push(U256::from(ctx.code.len()))?;
    Ok(Control::Continue)
}

fn op_codecopy(m: &mut Machine, ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    let dst = m.stack.pop()?;
    let src = m.stack.pop()?;
    let len = m.stack.pop()?;
    copy_to_memory(m, &ctx.code, src, dst, len)?;
    Ok(Control::Continue)
}

fn op_gasprice(m: &mut Machine, ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    m.stack.push(ctx.gas_price)?;
    Ok(Control::Continue)
}

fn op_extcodesize(
    m: &mut Machine,
    _ctx: &Context,
    w: &mut WorldState,
) -> Result<Control, EvmError> {
    let address = word::to_address(m.stack.pop()?);
    m.stack.push(U256::from(w.get_code(&address).len()))?;
    Ok(Control::Continue)
}

fn op_extcodecopy(
    m: &mut Machine,
    _ctx: &Context,
    w: &mut WorldState,
) -> Result<Control, EvmError> {
    let address = word::to_address(m.stack.pop()?);
    let dst = m.stack.pop()?;
    let src = m.stack.pop()?;
    let len = m.stack.pop()?;
    let code = w.get_code(&address);
    copy_to_memory(m, &code, src, dst, len)?;
    Ok(Control::Continue)
}

fn op_returndatasize(
    m: &mut Machine,
    _ctx: &Context,
    _w: &mut WorldState,
) -> Result<Control, EvmError> {
    m.stack.push(U256::from(m.return_data.len()))?;
    Ok(Control::Continue)
}

fn op_returndatacopy(
    m: &mut Machine,
    _ctx: &Context,
    _w: &mut WorldState,
) -> Result<Control, EvmError> {
    let dst = m.stack.pop()?;
    let src = m.stack.pop()?;
    let len = m.stack.pop()?;
    let data = m.return_data.clone();
    copy_to_memory(m, &data, src, dst, len)?;
    Ok(Control::Continue)
}

fn op_extcodehash(
    m: &mut Machine,
    _ctx: &Context,
    w: &mut WorldState,
) -> Result<Control, EvmError> {
    let address = word::to_address(m.stack.pop()?);
    m.stack.push(word::from_h256(&w.code_hash(&address)))?;
    Ok(Control::Continue)
}

fn op_blockhash(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    // No chain history in this revision.
    let _number = m.stack.pop()?;
    m.stack.push(U256::zero())?;
    Ok(Control::Continue)
}

fn op_coinbase(m: &mut Machine, ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    m.stack.push(word::from_address(&ctx.block.coinbase))?;
    Ok(Control::Continue)
}

fn op_timestamp(m: &mut Machine, ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    m.stack.push(ctx.block.timestamp)?;
    Ok(Control::Continue)
}

fn op_number(m: &mut Machine, ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    m.stack.push(ctx.block.number)?;
    Ok(Control::Continue)
}

fn op_difficulty(m: &mut Machine, ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    m.stack.push(ctx.block.difficulty)?;
    Ok(Control::Continue)
}

fn op_gaslimit(m: &mut Machine, ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    m.stack.push(ctx.block.gas_limit)?;
    Ok(Control::Continue)
}

fn op_chainid(m: &mut Machine, ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    m.stack.push(ctx.block.chain_id)?;
    Ok(Control::Continue)
}

fn op_selfbalance(m: &mut Machine, ctx: &Context, w: &mut WorldState) -> Result<Control, EvmError> {
    m.stack.push(w.get_balance(&ctx.address))?;
    Ok(Control::Continue)
}

fn op_basefee(m: &mut Machine, ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    m.stack.push(ctx.block.base_fee)?;
    Ok(Control::Continue)
}

fn op_pop(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    m.stack.pop()?;
    Ok(Control::Continue)
}

fn op_mload(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    let offset = word::to_usize(m.stack.pop()?)?;
    let value = m.memory.load_word(offset)?;
    m.stack.push(value)?;
    Ok(Control::Continue)
}

fn op_mstore(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    let offset = word::to_usize(m.stack.pop()?)?;
    let value = m.stack.pop()?;
    m.memory.store_word(offset, value)?;
    Ok(Control::Continue)
}

fn op_mstore8(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    let offset = word::to_usize(m.stack.pop()?)?;
    let value = m.stack.pop()?;
    m.memory.store_byte(offset, value.byte(0))?;
    Ok(Control::Continue)
}

fn op_sload(m: &mut Machine, ctx: &Context, w: &mut WorldState) -> Result<Control, EvmError> {
    let key = m.stack.pop()?;
    m.stack.push(w.get_storage(&ctx.address, key))?;
    Ok(Control::Continue)
}

fn op_sstore(m: &mut Machine, ctx: &Context, w: &mut WorldState) -> Result<Control, EvmError> {
    if ctx.is_static {
        return Err(EvmError::StaticCallStateChange);
    }
    let key = m.stack.pop()?;
    let value = m.stack.pop()?;
    w.set_storage(&ctx.address, key, value);
    Ok(Control::Continue)
}

fn op_jump(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    let dest = m.stack.pop()?;
    m.jump(dest)?;
    Ok(Control::Continue)
}

fn op_jumpi(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    let dest = m.stack.pop()?;
    let condition = m.stack.pop()?;
    if !condition.is_zero() {
        m.jump(dest)?;
    }
    Ok(Control::Continue)
}

fn op_pc(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    // pc already advanced past the opcode byte
    m.stack.push(U256::from(m.pc - 1))?;
    Ok(Control::Continue)
}

fn op_msize(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    m.stack.push(U256::from(m.memory.len()))?;
    Ok(Control::Continue)
}

fn op_gas(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    // Gas is not metered in this revision.
    m.stack.push(U256::MAX)?;
    Ok(Control::Continue)
}

fn op_jumpdest(_m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    Ok(Control::Continue)
}

fn op_create(m: &mut Machine, ctx: &Context, w: &mut WorldState) -> Result<Control, EvmError> {
    create_family(m, ctx, w, false)
}

fn op_create2(m: &mut Machine, ctx: &Context, w: &mut WorldState) -> Result<Control, EvmError> {
    create_family(m, ctx, w, true)
}

fn create_family(
    m: &mut Machine,
    ctx: &Context,
    w: &mut WorldState,
    with_salt: bool,
) -> Result<Control, EvmError> {
    if ctx.is_static {
        return Err(EvmError::StaticCallStateChange);
    }
    let value = m.stack.pop()?;
    let offset = m.stack.pop()?;
    let length = m.stack.pop()?;
    let salt = if with_salt { Some(m.stack.pop()?) } else { None };
    let init_code = mem_slice(m, offset, length)?;
    let (address, revert_data) = calls::run_create(m, ctx, w, value, init_code, salt);
    m.return_data = revert_data;
    match address {
        Some(addr) => m.stack.push(word::from_address(&addr))?,
        None => m.stack.push(U256::zero())?,
    }
    Ok(Control::Continue)
}

fn op_call(m: &mut Machine, ctx: &Context, w: &mut WorldState) -> Result<Control, EvmError> {
    call_family(m, ctx, w, CallKind::Call)
}

fn op_callcode(m: &mut Machine, ctx: &Context, w: &mut WorldState) -> Result<Control, EvmError> {
    call_family(m, ctx, w, CallKind::CallCode)
}

fn op_delegatecall(
    m: &mut Machine,
    ctx: &Context,
    w: &mut WorldState,
) -> Result<Control, EvmError> {
    call_family(m, ctx, w, CallKind::DelegateCall)
}

fn op_staticcall(m: &mut Machine, ctx: &Context, w: &mut WorldState) -> Result<Control, EvmError> {
    call_family(m, ctx, w, CallKind::StaticCall)
}

fn call_family(
    m: &mut Machine,
    ctx: &Context,
    w: &mut WorldState,
    kind: CallKind,
) -> Result<Control, EvmError> {
    let _gas = m.stack.pop()?;
    let target = word::to_address(m.stack.pop()?);
    let value = match kind {
        CallKind::Call | CallKind::CallCode => m.stack.pop()?,
        CallKind::DelegateCall | CallKind::StaticCall => U256::zero(),
    };
    let args_offset = m.stack.pop()?;
    let args_length = m.stack.pop()?;
    let ret_offset = m.stack.pop()?;
    let ret_length = m.stack.pop()?;

    if kind == CallKind::Call && ctx.is_static && !value.is_zero() {
        return Err(EvmError::StaticCallStateChange);
    }

    let input = mem_slice(m, args_offset, args_length)?;
    let result = calls::run_call(m, ctx, w, kind, target, value, input);

    if !ret_length.is_zero() && !result.output.is_empty() {
        let n = result.output.len().min(word::to_usize(ret_length)?);
        let dst = word::to_usize(ret_offset)?;
        m.memory.write(dst, &result.output[..n])?;
    }
    m.return_data = result.output;
    m.stack.push(word::from_bool(result.success))?;
    Ok(Control::Continue)
}

fn op_return(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    let offset = m.stack.pop()?;
    let length = m.stack.pop()?;
    m.output = mem_slice(m, offset, length)?;
    Ok(Control::Halt)
}

fn op_revert(m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    let offset = m.stack.pop()?;
    let length = m.stack.pop()?;
    m.output = mem_slice(m, offset, length)?;
    Err(EvmError::Revert)
}

fn op_invalid(_m: &mut Machine, _ctx: &Context, _w: &mut WorldState) -> Result<Control, EvmError> {
    Err(EvmError::InvalidOpcode(opcodes::INVALID))
}

fn op_selfdestruct(
    m: &mut Machine,
    ctx: &Context,
    w: &mut WorldState,
) -> Result<Control, EvmError> {
    if ctx.is_static {
        return Err(EvmError::StaticCallStateChange);
    }
    let beneficiary = word::to_address(m.stack.pop()?);
    let balance = w.get_balance(&ctx.address);
    w.transfer(&ctx.address, &beneficiary, balance)?;
    // Deleted immediately rather than at end of transaction.
    w.delete(&ctx.address);
    m.output = Bytes::new();
    Ok(Control::Halt)
}

pub static INSTRUCTION_TABLE: Lazy<HashMap<u8, Operation>> = Lazy::new(|| {
    use opcodes::*;

    let mut t = HashMap::new();
    let mut add_op = |opcode: u8, name: &'static str, min_stack: usize, execute: ExecutionFunc| {
        t.insert(opcode, Operation::new(opcode, name, min_stack, execute));
    };

    add_op(STOP, "STOP", 0, op_stop);
    add_op(ADD, "ADD", 2, op_add);
    add_op(MUL, "MUL", 2, op_mul);
    add_op(SUB, "SUB", 2, op_sub);
    add_op(DIV, "DIV", 2, op_div);
    add_op(SDIV, "SDIV", 2, op_sdiv);
    add_op(MOD, "MOD", 2, op_mod);
    add_op(SMOD, "SMOD", 2, op_smod);
    add_op(ADDMOD, "ADDMOD", 3, op_addmod);
    add_op(MULMOD, "MULMOD", 3, op_mulmod);
    add_op(EXP, "EXP", 2, op_exp);
    add_op(SIGNEXTEND, "SIGNEXTEND", 2, op_signextend);

    add_op(LT, "LT", 2, op_lt);
    add_op(GT, "GT", 2, op_gt);
    add_op(SLT, "SLT", 2, op_slt);
    add_op(SGT, "SGT", 2, op_sgt);
    add_op(EQ, "EQ", 2, op_eq);
    add_op(ISZERO, "ISZERO", 1, op_iszero);
    add_op(AND, "AND", 2, op_and);
    add_op(OR, "OR", 2, op_or);
    add_op(XOR, "XOR", 2, op_xor);
    add_op(NOT, "NOT", 1, op_not);
    add_op(BYTE, "BYTE", 2, op_byte);
    add_op(SHL, "SHL", 2, op_shl);
    add_op(SHR, "SHR", 2, op_shr);
    add_op(SAR, "SAR", 2, op_sar);

    add_op(KECCAK256, "KECCAK256", 2, op_keccak256);

    add_op(ADDRESS, "ADDRESS", 0, op_address);
    add_op(BALANCE, "BALANCE", 1, op_balance);
    add_op(ORIGIN, "ORIGIN", 0, op_origin);
    add_op(CALLER, "CALLER", 0, op_caller);
    add_op(CALLVALUE, "CALLVALUE", 0, op_callvalue);
    add_op(CALLDATALOAD, "CALLDATALOAD", 1, op_calldataload);
    add_op(CALLDATASIZE, "CALLDATASIZE", 0, op_calldatasize);
    add_op(CALLDATACOPY, "CALLDATACOPY", 3, op_calldatacopy);
    add_op(CODESIZE, "CODESIZE", 0, op_codesize);
    add_op(CODECOPY, "CODECOPY", 3, op_codecopy);
    add_op(GASPRICE, "GASPRICE", 0, op_gasprice);
    add_op(EXTCODESIZE, "EXTCODESIZE", 1, op_extcodesize);
    add_op(EXTCODECOPY, "EXTCODECOPY", 4, op_extcodecopy);
    add_op(RETURNDATASIZE, "RETURNDATASIZE", 0, op_returndatasize);
    add_op(RETURNDATACOPY, "RETURNDATACOPY", 3, op_returndatacopy);
    add_op(EXTCODEHASH, "EXTCODEHASH", 1, op_extcodehash);

    add_op(BLOCKHASH, "BLOCKHASH", 1, op_blockhash);
    add_op(COINBASE, "COINBASE", 0, op_coinbase);
    add_op(TIMESTAMP, "TIMESTAMP", 0, op_timestamp);
    add_op(NUMBER, "NUMBER", 0, op_number);
    add_op(DIFFICULTY, "DIFFICULTY", 0, op_difficulty);
    add_op(GASLIMIT, "GASLIMIT", 0, op_gaslimit);
    add_op(CHAINID, "CHAINID", 0, op_chainid);
    add_op(SELFBALANCE, "SELFBALANCE", 0, op_selfbalance);
    add_op(BASEFEE, "BASEFEE", 0, op_basefee);

    add_op(POP, "POP", 1, op_pop);
    add_op(MLOAD, "MLOAD", 1, op_mload);
    add_op(MSTORE, "MSTORE", 2, op_mstore);
    add_op(MSTORE8, "MSTORE8", 2, op_mstore8);
    add_op(SLOAD, "SLOAD", 1, op_sload);
    add_op(SSTORE, "SSTORE", 2, op_sstore);
    add_op(JUMP, "JUMP", 1, op_jump);
    add_op(JUMPI, "JUMPI", 2, op_jumpi);
    add_op(PC, "PC", 0, op_pc);
    add_op(MSIZE, "MSIZE", 0, op_msize);
    add_op(GAS, "GAS", 0, op_gas);
    add_op(JUMPDEST, "JUMPDEST", 0, op_jumpdest);

    add_op(CREATE, "CREATE", 3, op_create);
    add_op(CALL, "CALL", 7, op_call);
    add_op(CALLCODE, "CALLCODE", 7, op_callcode);
    add_op(RETURN, "RETURN", 2, op_return);
    add_op(DELEGATECALL, "DELEGATECALL", 6, op_delegatecall);
    add_op(CREATE2, "CREATE2", 4, op_create2);
    add_op(STATICCALL, "STATICCALL", 6, op_staticcall);
    add_op(REVERT, "REVERT", 2, op_revert);
    add_op(INVALID, "INVALID", 0, op_invalid);
    add_op(SELFDESTRUCT, "SELFDESTRUCT", 1, op_selfdestruct);

    t
});
