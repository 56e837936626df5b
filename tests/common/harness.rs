//! Driver that loads a JSON fixture file and runs every case in it.

use anyhow::{Context, Result};

use super::evaluations::compare_result;
use super::parsers::{build_block, build_transaction, build_world_state, TestCase};

pub fn run_fixture_file(path: &str) -> Result<()> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let cases: Vec<TestCase> = serde_json::from_str(&raw).with_context(|| format!("parsing {path}"))?;
    for case in &cases {
        run_case(case).with_context(|| {
            format!(
                "case \"{}\"\ninstructions:\n{}\nhint: {}",
                case.name, case.code.asm, case.hint
            )
        })?;
    }
    Ok(())
}

fn run_case(case: &TestCase) -> Result<()> {
    let mut state = build_world_state(&case.state)?;
    let block = build_block(&case.block);
    let tx = build_transaction(&case.tx);
    let result = evm_core::run(case.code.bin.clone(), &block, &tx, &mut state);
    compare_result(case, &result)
}
