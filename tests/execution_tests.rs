//! Stack machine, arithmetic, memory and control-flow cases.

mod common;

use anyhow::Result;

#[test]
fn execution_fixture_cases() -> Result<()> {
    common::harness::run_fixture_file("tests/data/execution.json")
}
