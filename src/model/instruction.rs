use serde::{Deserialize, Serialize};

/// Opcodes the shrinker looks at; everything else is opaque
pub mod opcode {
    pub const NOP: u8 = 0x00;
    pub const ACONST_NULL: u8 = 0x01;
    pub const ALOAD: u8 = 0x19;
    pub const ASTORE: u8 = 0x3a;
    pub const ILOAD: u8 = 0x15;
    pub const IINC: u8 = 0x84;
    pub const LDC: u8 = 0x12;
    pub const LDC_W: u8 = 0x13;
    pub const LDC2_W: u8 = 0x14;
    pub const GOTO: u8 = 0xa7;
    pub const GOTO_W: u8 = 0xc8;
    pub const JSR_W: u8 = 0xc9;
    pub const TABLESWITCH: u8 = 0xaa;
    pub const LOOKUPSWITCH: u8 = 0xab;
    pub const RETURN: u8 = 0xb1;
    pub const ARETURN: u8 = 0xb0;
    pub const GETSTATIC: u8 = 0xb2;
    pub const PUTSTATIC: u8 = 0xb3;
    pub const GETFIELD: u8 = 0xb4;
    pub const PUTFIELD: u8 = 0xb5;
    pub const INVOKEVIRTUAL: u8 = 0xb6;
    pub const INVOKESPECIAL: u8 = 0xb7;
    pub const INVOKESTATIC: u8 = 0xb8;
    pub const INVOKEINTERFACE: u8 = 0xb9;
    pub const INVOKEDYNAMIC: u8 = 0xba;
    pub const NEW: u8 = 0xbb;
    pub const ANEWARRAY: u8 = 0xbd;
    pub const CHECKCAST: u8 = 0xc0;
    pub const INSTANCEOF: u8 = 0xc1;
    pub const MULTIANEWARRAY: u8 = 0xc5;
    pub const DUP: u8 = 0x59;
    pub const POP: u8 = 0x57;
}

/// One decoded bytecode instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Instruction {
    Simple {
        opcode: u8,
    },
    /// Instruction with a constant-pool operand (ldc, invoke*, new, getfield...)
    Constant {
        opcode: u8,
        index: u16,
        /// Extra immediate: dimensions for multianewarray, count for invokeinterface
        #[serde(default)]
        constant: i32,
    },
    Variable {
        opcode: u8,
        slot: u16,
        #[serde(default)]
        constant: i32,
    },
    Branch {
        opcode: u8,
        offset: i32,
    },
    Switch {
        opcode: u8,
        default_offset: i32,
        cases: Vec<(i32, i32)>,
    },
}

impl Instruction {
    pub fn opcode(&self) -> u8 {
        match self {
            Instruction::Simple { opcode }
            | Instruction::Constant { opcode, .. }
            | Instruction::Variable { opcode, .. }
            | Instruction::Branch { opcode, .. }
            | Instruction::Switch { opcode, .. } => *opcode,
        }
    }

    pub fn constant_index(&self) -> Option<u16> {
        match self {
            Instruction::Constant { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Encoded length, assuming switch padding of zero
    pub fn length(&self) -> u32 {
        match self {
            Instruction::Simple { .. } => 1,
            Instruction::Constant { opcode, .. } => match *opcode {
                opcode::LDC => 2,
                opcode::INVOKEINTERFACE | opcode::INVOKEDYNAMIC => 5,
                opcode::MULTIANEWARRAY => 4,
                _ => 3,
            },
            Instruction::Variable { opcode, slot, .. } => {
                let wide = *slot > u8::MAX as u16;
                match (*opcode, wide) {
                    (opcode::IINC, false) => 3,
                    (opcode::IINC, true) => 6,
                    (_, false) => 2,
                    (_, true) => 4,
                }
            }
            Instruction::Branch { opcode, .. } => match *opcode {
                opcode::GOTO_W | opcode::JSR_W => 5,
                _ => 3,
            },
            Instruction::Switch { opcode, cases, .. } => {
                let per_case = if *opcode == opcode::TABLESWITCH { 4 } else { 8 };
                let header = if *opcode == opcode::TABLESWITCH { 13 } else { 9 };
                header + per_case * cases.len() as u32
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lengths() {
        assert_eq!(Instruction::Simple { opcode: opcode::RETURN }.length(), 1);
        assert_eq!(
            Instruction::Constant {
                opcode: opcode::LDC,
                index: 4,
                constant: 0
            }
            .length(),
            2
        );
        assert_eq!(
            Instruction::Constant {
                opcode: opcode::INVOKEVIRTUAL,
                index: 4,
                constant: 0
            }
            .length(),
            3
        );
    }
}
