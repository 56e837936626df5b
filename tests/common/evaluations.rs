//! Comparison of an execution result against a case's expectations.

use anyhow::{bail, Result};

use evm_core::ExecutionResult;

use super::parsers::TestCase;

pub fn compare_result(case: &TestCase, result: &ExecutionResult) -> Result<()> {
    if result.success != case.expect.success {
        bail!(
            "success mismatch: expected {}, got {}",
            case.expect.success,
            result.success
        );
    }

    let expected_stack = case.expect.stack.clone().unwrap_or_default();
    if result.stack != expected_stack {
        bail!(
            "stack mismatch:\n expected: {:?}\n actual:   {:?}",
            expected_stack,
            result.stack
        );
    }

    let expected_return = case.expect.ret.clone().unwrap_or_default();
    if result.return_data != expected_return {
        bail!(
            "return data mismatch:\n expected: 0x{}\n actual:   0x{}",
            hex::encode(&expected_return),
            hex::encode(&result.return_data)
        );
    }

    if let Some(expected_logs) = &case.expect.logs {
        if result.logs.len() != expected_logs.len() {
            bail!(
                "log count mismatch: expected {}, got {}",
                expected_logs.len(),
                result.logs.len()
            );
        }
        for (i, (expected, actual)) in expected_logs.iter().zip(&result.logs).enumerate() {
            if let Some(address) = expected.address {
                if actual.address != address {
                    bail!("log {i} address mismatch: {:?}", actual.address);
                }
            }
            let expected_data = expected.data.clone().unwrap_or_default();
            if actual.data != expected_data {
                bail!(
                    "log {i} data mismatch: expected 0x{}, got 0x{}",
                    hex::encode(&expected_data),
                    hex::encode(&actual.data)
                );
            }
            if actual.topics != expected.topics {
                bail!(
                    "log {i} topics mismatch: expected {:?}, got {:?}",
                    expected.topics,
                    actual.topics
                );
            }
        }
    }

    Ok(())
}
