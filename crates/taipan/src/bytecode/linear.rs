//! CFG linearization: basic blocks to a flat instruction sequence with
//! resolved absolute jump targets.

use ahash::AHashMap;

use crate::{
    bytecode::{
        cfg::{BlockId, Cfg, JumpKind},
        code::Code,
        op::{Instr, Opcode},
    },
    exception::{RunError, RunResult},
};

/// Lays out `cfg` and fills in `code.instructions`.
///
/// A depth-first traversal visits `next`, then the jump target, then the
/// exception/loop targets carried by block-argument instructions, which
/// establishes the emission order. Fallthrough edges to the textually
/// following block cost nothing; any other `next` edge becomes an explicit
/// `JUMP_ABSOLUTE`. Block-id arguments (`FOR_ITER`, `SETUP_FINALLY`,
/// `SETUP_WITH`) are patched to instruction offsets once every block has an
/// offset.
pub fn linearize(mut cfg: Cfg, mut code: Code) -> RunResult<Code> {
    let order = placement_order(&mut cfg);

    // First pass: assign offsets.
    let mut offsets: AHashMap<usize, u32> = AHashMap::new();
    let mut cursor = 0u32;
    for (position, &BlockId(id)) in order.iter().enumerate() {
        offsets.insert(id, cursor);
        let block = &cfg.blocks[id];
        cursor += block.instrs.len() as u32;
        if block.jump.is_some() {
            cursor += 1;
        }
        if let Some(BlockId(next)) = block.next {
            let follows = order.get(position + 1).is_some_and(|BlockId(b)| *b == next);
            if !follows {
                cursor += 1;
            }
        }
    }

    // Second pass: emit with resolved targets.
    let mut out: Vec<Instr> = Vec::with_capacity(cursor as usize);
    for (position, &BlockId(id)) in order.iter().enumerate() {
        let block = &cfg.blocks[id];
        for instr in &block.instrs {
            if instr.op.takes_block_arg() {
                let target = resolve(&offsets, instr.arg as usize, &code)?;
                out.push(Instr::with_arg(instr.op, target));
            } else {
                out.push(*instr);
            }
        }
        if let Some((BlockId(target), kind)) = block.jump {
            let target = resolve(&offsets, target, &code)?;
            let op = match kind {
                JumpKind::Always => Opcode::JumpAbsolute,
                JumpKind::PopIfTrue => Opcode::PopJumpIfTrue,
                JumpKind::PopIfFalse => Opcode::PopJumpIfFalse,
                JumpKind::OrPopIfTrue => Opcode::JumpIfTrueOrPop,
                JumpKind::OrPopIfFalse => Opcode::JumpIfFalseOrPop,
                JumpKind::IfNotExcMatch => Opcode::JumpIfNotExcMatch,
            };
            out.push(Instr::with_arg(op, target));
        }
        if let Some(BlockId(next)) = block.next {
            let follows = order.get(position + 1).is_some_and(|BlockId(b)| *b == next);
            if !follows {
                let target = resolve(&offsets, next, &code)?;
                out.push(Instr::with_arg(Opcode::JumpAbsolute, target));
            }
        }
    }

    code.instructions = out;
    Ok(code)
}

/// Depth-first placement order from the entry block, marking reachability.
fn placement_order(cfg: &mut Cfg) -> Vec<BlockId> {
    let mut order = Vec::with_capacity(cfg.blocks.len());
    let mut stack = vec![BlockId(0)];
    while let Some(BlockId(id)) = stack.pop() {
        if cfg.blocks[id].reachable {
            continue;
        }
        cfg.blocks[id].reachable = true;
        order.push(BlockId(id));
        // Successors push in reverse priority so `next` pops first.
        let block = &cfg.blocks[id];
        let mut successors: Vec<BlockId> = Vec::new();
        if let Some(next) = block.next {
            successors.push(next);
        }
        if let Some((target, _)) = block.jump {
            successors.push(target);
        }
        for instr in &block.instrs {
            if instr.op.takes_block_arg() {
                successors.push(BlockId(instr.arg as usize));
            }
        }
        for successor in successors.into_iter().rev() {
            if !cfg.blocks[successor.0].reachable {
                stack.push(successor);
            }
        }
    }
    order
}

fn resolve(offsets: &AHashMap<usize, u32>, block: usize, code: &Code) -> RunResult<u32> {
    offsets
        .get(&block)
        .copied()
        .ok_or_else(|| RunError::internal(format!("jump to unplaced block {block} in {}", code.name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::cfg::Cfg;

    fn empty_code() -> Code {
        Code {
            name: "<test>".into(),
            instructions: Vec::new(),
            constants: Vec::new(),
            names: Vec::new(),
            varnames: Vec::new(),
            argcount: 0,
            params: Vec::new(),
            globals: ahash::AHashSet::new(),
            nonlocals: ahash::AHashSet::new(),
            is_generator: false,
        }
    }

    #[test]
    fn test_fallthrough_needs_no_jump() {
        let mut cfg = Cfg::new();
        let b1 = cfg.new_block();
        cfg.block_mut(BlockId(0)).instrs.push(Instr::new(Opcode::PopTop));
        cfg.block_mut(BlockId(0)).next = Some(b1);
        cfg.block_mut(b1).instrs.push(Instr::new(Opcode::ReturnValue));

        let code = linearize(cfg, empty_code()).unwrap();
        assert_eq!(code.instructions.len(), 2);
        assert_eq!(code.instructions[0].op, Opcode::PopTop);
        assert_eq!(code.instructions[1].op, Opcode::ReturnValue);
    }

    #[test]
    fn test_conditional_jump_resolved() {
        let mut cfg = Cfg::new();
        let then_block = cfg.new_block();
        let target = cfg.new_block();
        cfg.block_mut(BlockId(0)).jump = Some((target, JumpKind::PopIfFalse));
        cfg.block_mut(BlockId(0)).next = Some(then_block);
        cfg.block_mut(then_block).instrs.push(Instr::new(Opcode::PopTop));
        cfg.block_mut(then_block).next = Some(target);
        cfg.block_mut(target).instrs.push(Instr::new(Opcode::ReturnValue));

        let code = linearize(cfg, empty_code()).unwrap();
        // Layout: [PopJumpIfFalse t] [PopTop] [ReturnValue], t = 2
        assert_eq!(code.instructions[0], Instr::with_arg(Opcode::PopJumpIfFalse, 2));
        assert_eq!(code.instructions[2].op, Opcode::ReturnValue);
    }

    #[test]
    fn test_back_edge_emits_jump_absolute() {
        let mut cfg = Cfg::new();
        let body = cfg.new_block();
        let exit = cfg.new_block();
        // Entry doubles as the loop header.
        cfg.block_mut(BlockId(0)).jump = Some((exit, JumpKind::PopIfFalse));
        cfg.block_mut(BlockId(0)).next = Some(body);
        cfg.block_mut(body).instrs.push(Instr::new(Opcode::PopTop));
        cfg.block_mut(body).jump = Some((BlockId(0), JumpKind::Always));
        cfg.block_mut(exit).instrs.push(Instr::new(Opcode::ReturnValue));

        let code = linearize(cfg, empty_code()).unwrap();
        let jump_back = code
            .instructions
            .iter()
            .find(|i| i.op == Opcode::JumpAbsolute)
            .expect("back edge becomes JumpAbsolute");
        assert_eq!(jump_back.arg, 0);
    }

    #[test]
    fn test_unreachable_block_not_placed() {
        let mut cfg = Cfg::new();
        let dead = cfg.new_block();
        cfg.block_mut(dead).instrs.push(Instr::new(Opcode::PopTop));
        cfg.block_mut(BlockId(0)).instrs.push(Instr::new(Opcode::ReturnValue));

        let code = linearize(cfg, empty_code()).unwrap();
        assert_eq!(code.instructions.len(), 1);
    }

    #[test]
    fn test_block_arg_instr_patched() {
        let mut cfg = Cfg::new();
        let body = cfg.new_block();
        let done = cfg.new_block();
        cfg.block_mut(BlockId(0))
            .instrs
            .push(Instr::with_arg(Opcode::ForIter, done.0 as u32));
        cfg.block_mut(BlockId(0)).next = Some(body);
        cfg.block_mut(body).instrs.push(Instr::new(Opcode::PopTop));
        cfg.block_mut(body).jump = Some((BlockId(0), JumpKind::Always));
        cfg.block_mut(done).instrs.push(Instr::new(Opcode::ReturnValue));

        let code = linearize(cfg, empty_code()).unwrap();
        let for_iter = code.instructions.iter().find(|i| i.op == Opcode::ForIter).unwrap();
        // done holds ReturnValue; its offset is the ForIter argument.
        assert_eq!(code.instructions[for_iter.arg as usize].op, Opcode::ReturnValue);
    }
}
