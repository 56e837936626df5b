//! Nested-frame orchestration for the CALL family and CREATE/CREATE2:
//! context derivation, value transfer, the depth limit, and the
//! checkpoint/commit/rollback discipline that keeps a failed sub-frame from
//! touching the caller's view of the world.

use bytes::Bytes;
use ethereum_types::{Address, U256};
use tracing::debug;

use crate::common::constants::CALL_DEPTH_LIMIT;
use crate::common::crypto;
use crate::vm::{Context, EvmError, Machine};
use crate::world_state::WorldState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Call,
    CallCode,
    DelegateCall,
    StaticCall,
}

#[derive(Debug, Clone)]
pub struct CallResult {
    pub success: bool,
    pub output: Bytes,
}

impl CallResult {
    fn failure() -> Self {
        CallResult {
            success: false,
            output: Bytes::new(),
        }
    }
}

/// Execute a message call in a child frame. Depth or balance failures report
/// `success = false` without running any code; a fault inside the child frame
/// rolls its state back but still never faults the caller. Child logs reach
/// the parent only when the child commits.
pub fn run_call(
    parent: &mut Machine,
    ctx: &Context,
    world: &mut WorldState,
    kind: CallKind,
    target: Address,
    value: U256,
    input: Bytes,
) -> CallResult {
    if ctx.depth >= CALL_DEPTH_LIMIT {
        return CallResult::failure();
    }

    // Which account's storage we run against, and who the callee sees as
    // its caller, depend on the call kind; the code always comes from
    // `target`.
    let (address, caller, frame_value, is_static) = match kind {
        CallKind::Call => (target, ctx.address, value, ctx.is_static),
        CallKind::CallCode => (ctx.address, ctx.address, value, ctx.is_static),
        CallKind::DelegateCall => (ctx.address, ctx.caller, ctx.value, ctx.is_static),
        CallKind::StaticCall => (target, ctx.address, U256::zero(), true),
    };

    world.checkpoint();
    let funded = match kind {
        CallKind::Call => world.transfer(&ctx.address, &target, value).is_ok(),
        // CALLCODE spends against the caller's balance but the funds stay put.
        CallKind::CallCode => world.get_balance(&ctx.address) >= value,
        CallKind::DelegateCall | CallKind::StaticCall => true,
    };
    if !funded {
        world.rollback();
        return CallResult::failure();
    }

    let sub_ctx = Context {
        address,
        code_address: target,
        caller,
        origin: ctx.origin,
        gas_price: ctx.gas_price,
        value: frame_value,
        calldata: input,
        code: world.get_code(&target),
        block: ctx.block,
        depth: ctx.depth + 1,
        is_static,
    };
    debug!(?kind, ?target, depth = sub_ctx.depth, "enter call frame");

    let mut child = Machine::new(&sub_ctx.code);
    match child.run(&sub_ctx, world) {
        Ok(()) => {
            world.commit();
            parent.logs.append(&mut child.logs);
            CallResult {
                success: true,
                output: child.output,
            }
        }
        Err(err) => {
            debug!(error = %err, depth = sub_ctx.depth, "call frame failed");
            world.rollback();
            let output = if err == EvmError::Revert {
                child.output
            } else {
                Bytes::new()
            };
            CallResult {
                success: false,
                output,
            }
        }
    }
}

/// Deploy a contract: derive the address, bump the sender nonce, run the
/// init code in a frame owned by the new account, and install its return
/// value as the account code. Returns the new address (or `None` on any
/// failure) together with the revert data, if any.
pub fn run_create(
    parent: &mut Machine,
    ctx: &Context,
    world: &mut WorldState,
    value: U256,
    init_code: Bytes,
    salt: Option<U256>,
) -> (Option<Address>, Bytes) {
    if ctx.depth >= CALL_DEPTH_LIMIT {
        return (None, Bytes::new());
    }
    let sender = ctx.address;
    if world.get_balance(&sender) < value {
        return (None, Bytes::new());
    }

    let nonce = world.get_nonce(&sender);
    let new_address = match salt {
        None => crypto::contract_address(&sender, nonce),
        Some(salt) => crypto::create2_address(&sender, salt, &init_code),
    };
    // The nonce advances even when the init code reverts.
    world.set_nonce(&sender, nonce + 1);

    world.checkpoint();
    world.create_account(&new_address);
    if world.transfer(&sender, &new_address, value).is_err() {
        world.rollback();
        return (None, Bytes::new());
    }

    let sub_ctx = Context {
        address: new_address,
        code_address: new_address,
        caller: sender,
        origin: ctx.origin,
        gas_price: ctx.gas_price,
        value,
        calldata: Bytes::new(),
        code: init_code,
        block: ctx.block,
        depth: ctx.depth + 1,
        is_static: false,
    };
    debug!(address = ?new_address, depth = sub_ctx.depth, "enter create frame");

    let mut child = Machine::new(&sub_ctx.code);
    match child.run(&sub_ctx, world) {
        Ok(()) => {
            world.set_code(&new_address, child.output);
            world.commit();
            parent.logs.append(&mut child.logs);
            (Some(new_address), Bytes::new())
        }
        Err(err) => {
            debug!(error = %err, depth = sub_ctx.depth, "create frame failed");
            world.rollback();
            let output = if err == EvmError::Revert {
                child.output
            } else {
                Bytes::new()
            };
            (None, output)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockEnv;
    use hex_literal::hex;

    fn addr(tag: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = tag;
        Address::from(bytes)
    }

    fn frame<'a>(block: &'a BlockEnv, address: Address, depth: u64) -> Context<'a> {
        Context {
            address,
            code_address: address,
            caller: addr(0xee),
            origin: addr(0xee),
            gas_price: U256::zero(),
            value: U256::zero(),
            calldata: Bytes::new(),
            code: Bytes::new(),
            block,
            depth,
            is_static: false,
        }
    }

    #[test]
    fn depth_limit_fails_without_running() {
        let block = BlockEnv::default();
        let ctx = frame(&block, addr(1), CALL_DEPTH_LIMIT);
        let mut world = WorldState::new();
        let mut parent = Machine::new(&[]);
        let result = run_call(
            &mut parent,
            &ctx,
            &mut world,
            CallKind::Call,
            addr(2),
            U256::zero(),
            Bytes::new(),
        );
        assert!(!result.success);
        assert!(result.output.is_empty());

        let (created, _) = run_create(
            &mut parent,
            &ctx,
            &mut world,
            U256::zero(),
            Bytes::new(),
            None,
        );
        assert!(created.is_none());
        assert_eq!(world.get_nonce(&addr(1)), 0);
    }

    #[test]
    fn value_call_requires_funding() {
        let block = BlockEnv::default();
        let ctx = frame(&block, addr(1), 0);
        let mut world = WorldState::new();
        let mut parent = Machine::new(&[]);
        let result = run_call(
            &mut parent,
            &ctx,
            &mut world,
            CallKind::Call,
            addr(2),
            U256::from(5),
            Bytes::new(),
        );
        assert!(!result.success);
        assert_eq!(world.get_balance(&addr(2)), U256::zero());
    }

    #[test]
    fn value_call_moves_balance() {
        let block = BlockEnv::default();
        let ctx = frame(&block, addr(1), 0);
        let mut world = WorldState::new();
        world.set_balance(&addr(1), U256::from(10));
        let mut parent = Machine::new(&[]);
        let result = run_call(
            &mut parent,
            &ctx,
            &mut world,
            CallKind::Call,
            addr(2),
            U256::from(4),
            Bytes::new(),
        );
        assert!(result.success);
        assert_eq!(world.get_balance(&addr(1)), U256::from(6));
        assert_eq!(world.get_balance(&addr(2)), U256::from(4));
    }

    #[test]
    fn reverting_child_rolls_state_back_but_returns_data() {
        let block = BlockEnv::default();
        let ctx = frame(&block, addr(1), 0);
        let mut world = WorldState::new();
        // PUSH1 1, PUSH1 0, SSTORE; PUSH1 0xaa, PUSH1 0, MSTORE8; REVERT(0, 1)
        world.set_code(
            &addr(2),
            Bytes::copy_from_slice(&hex!("600160005560aa60005360016000fd")),
        );
        let mut parent = Machine::new(&[]);
        let result = run_call(
            &mut parent,
            &ctx,
            &mut world,
            CallKind::Call,
            addr(2),
            U256::zero(),
            Bytes::new(),
        );
        assert!(!result.success);
        assert_eq!(result.output, Bytes::from_static(&[0xaa]));
        assert_eq!(world.get_storage(&addr(2), U256::zero()), U256::zero());
    }

    #[test]
    fn create_installs_returned_code_and_bumps_nonce() {
        let block = BlockEnv::default();
        let ctx = frame(&block, addr(1), 0);
        let mut world = WorldState::new();
        let mut parent = Machine::new(&[]);
        // PUSH1 0xaa, PUSH1 0, MSTORE8; RETURN(0, 1)
        let init = Bytes::copy_from_slice(&hex!("60aa60005360016000f3"));
        let (created, revert_data) =
            run_create(&mut parent, &ctx, &mut world, U256::zero(), init, None);
        let expected = crypto::contract_address(&addr(1), 0);
        assert_eq!(created, Some(expected));
        assert!(revert_data.is_empty());
        assert_eq!(world.get_code(&expected), Bytes::from_static(&[0xaa]));
        assert_eq!(world.get_nonce(&addr(1)), 1);
    }

    #[test]
    fn reverting_init_code_leaves_no_account() {
        let block = BlockEnv::default();
        let ctx = frame(&block, addr(1), 0);
        let mut world = WorldState::new();
        let mut parent = Machine::new(&[]);
        // PUSH1 0xaa, PUSH1 0, MSTORE8; REVERT(0, 1)
        let init = Bytes::copy_from_slice(&hex!("60aa60005360016000fd"));
        let (created, revert_data) =
            run_create(&mut parent, &ctx, &mut world, U256::zero(), init, None);
        assert!(created.is_none());
        assert_eq!(revert_data, Bytes::from_static(&[0xaa]));
        assert!(!world.account_exists(&crypto::contract_address(&addr(1), 0)));
        // The sender's nonce still advanced.
        assert_eq!(world.get_nonce(&addr(1)), 1);
    }

    #[test]
    fn static_frame_propagates_into_children() {
        let block = BlockEnv::default();
        let mut ctx = frame(&block, addr(1), 0);
        ctx.is_static = true;
        let mut world = WorldState::new();
        // PUSH1 1, PUSH1 0, SSTORE
        world.set_code(&addr(2), Bytes::copy_from_slice(&hex!("6001600055")));
        let mut parent = Machine::new(&[]);
        let result = run_call(
            &mut parent,
            &ctx,
            &mut world,
            CallKind::Call,
            addr(2),
            U256::zero(),
            Bytes::new(),
        );
        assert!(!result.success);
        assert_eq!(world.get_storage(&addr(2), U256::zero()), U256::zero());
    }
}
