use std::collections::HashSet;

use crate::operations::opcodes;

/// The set of byte offsets in a code blob that are legal JUMP/JUMPI targets:
/// a `JUMPDEST` byte that is not part of any PUSH immediate.
#[derive(Debug, Clone, Default)]
pub struct JumpDestTable {
    dests: HashSet<usize>,
}

impl JumpDestTable {
    /// One left-to-right pass: PUSH opcodes skip their immediate bytes, so a
    /// 0x5B inside push data is never marked.
    pub fn analyze(code: &[u8]) -> Self {
        let mut dests = HashSet::new();
        let mut pc = 0;
        while pc < code.len() {
            let op = code[pc];
            if (opcodes::PUSH1..=opcodes::PUSH32).contains(&op) {
                pc += (op - opcodes::PUSH1) as usize + 1;
            } else if op == opcodes::JUMPDEST {
                dests.insert(pc);
            }
            pc += 1;
        }
        JumpDestTable { dests }
    }

    pub fn is_valid(&self, dest: usize) -> bool {
        self.dests.contains(&dest)
    }
}
