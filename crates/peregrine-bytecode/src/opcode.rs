//! Opcode enumeration for the register machine
//!
//! Opcode numbering is inherited from the stack bytecode the register form is
//! translated from, so a translated buffer keeps the opcode bytes of its
//! source instructions. Bytes that name no instruction at all are "unmapped"
//! and the evaluator treats them as corruption; bytes that name a known
//! instruction outside the supported subset decode but fail at dispatch with
//! an unsupported-feature error.

/// Register operand sentinel meaning "operand absent".
///
/// Used by instructions that share a fixed slot layout but take optional
/// operands, e.g. printing without an explicit file register or a slice
/// without one of its endpoints.
pub const BAD_REGISTER: u8 = 0xFF;

/// Instruction wire formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrFormat {
    /// `[opcode:8][arg:16][reg1:8][reg2:8][reg3:8][reg4:8]` — fixed 8 bytes
    Reg,
    /// `[opcode:8][arg:16][num_registers:8][regs:8 × n]` — 4 + n bytes
    VarReg,
    /// `[opcode:8][reg1:8][reg2:8][pad:8][label:32]` — fixed 8 bytes
    Branch,
}

/// Semantic opcodes of the register machine
///
/// Every opcode of the source stack machine is representable so the
/// evaluator can name unsupported instructions in errors; only the subset
/// with register-machine handlers actually executes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    StopCode = 0,
    PopTop = 1,
    RotTwo = 2,
    RotThree = 3,
    DupTop = 4,
    RotFour = 5,
    Nop = 9,

    UnaryPositive = 10,
    UnaryNegative = 11,
    UnaryNot = 12,
    UnaryConvert = 13,
    UnaryInvert = 15,

    BinaryPower = 19,
    BinaryMultiply = 20,
    BinaryDivide = 21,
    BinaryModulo = 22,
    BinaryAdd = 23,
    BinarySubtract = 24,
    BinarySubscr = 25,
    BinaryFloorDivide = 26,
    BinaryTrueDivide = 27,
    InplaceFloorDivide = 28,
    InplaceTrueDivide = 29,

    /// Covers the four slice-form bytes of the source machine (30–33); the
    /// missing-endpoint cases are expressed with [`BAD_REGISTER`] operands.
    Slice = 30,
    StoreSlice = 40,
    DeleteSlice = 50,

    StoreMap = 54,
    InplaceAdd = 55,
    InplaceSubtract = 56,
    InplaceMultiply = 57,
    InplaceDivide = 58,
    InplaceModulo = 59,
    StoreSubscr = 60,
    DeleteSubscr = 61,
    BinaryLshift = 62,
    BinaryRshift = 63,
    BinaryAnd = 64,
    BinaryXor = 65,
    BinaryOr = 66,
    InplacePower = 67,
    GetIter = 68,

    PrintExpr = 70,
    PrintItem = 71,
    PrintNewline = 72,
    PrintItemTo = 73,
    PrintNewlineTo = 74,
    InplaceLshift = 75,
    InplaceRshift = 76,
    InplaceAnd = 77,
    InplaceXor = 78,
    InplaceOr = 79,
    BreakLoop = 80,
    WithCleanup = 81,
    LoadLocals = 82,
    ReturnValue = 83,
    ImportStar = 84,
    ExecStmt = 85,
    YieldValue = 86,
    PopBlock = 87,
    EndFinally = 88,
    BuildClass = 89,

    StoreName = 90,
    DeleteName = 91,
    UnpackSequence = 92,
    ForIter = 93,
    ListAppend = 94,
    StoreAttr = 95,
    DeleteAttr = 96,
    StoreGlobal = 97,
    DeleteGlobal = 98,
    DupTopx = 99,
    LoadConst = 100,
    LoadName = 101,
    BuildTuple = 102,
    BuildList = 103,
    BuildSet = 104,
    BuildMap = 105,
    LoadAttr = 106,
    CompareOp = 107,
    ImportName = 108,
    ImportFrom = 109,
    JumpForward = 110,
    JumpIfFalseOrPop = 111,
    JumpIfTrueOrPop = 112,
    JumpAbsolute = 113,
    PopJumpIfFalse = 114,
    PopJumpIfTrue = 115,
    LoadGlobal = 116,
    ContinueLoop = 119,
    SetupLoop = 120,
    SetupExcept = 121,
    SetupFinally = 122,
    LoadFast = 124,
    StoreFast = 125,
    DeleteFast = 126,
    RaiseVarargs = 130,
    CallFunction = 131,
    MakeFunction = 132,
    BuildSlice = 133,
    MakeClosure = 134,
    LoadClosure = 135,
    LoadDeref = 136,
    StoreDeref = 137,
    CallFunctionVar = 140,
    CallFunctionKw = 141,
    CallFunctionVarKw = 142,
    SetupWith = 143,
    ExtendedArg = 145,
    SetAdd = 146,
    MapAdd = 147,

    // Register-machine additions past the stack machine's range
    /// Explicit reference-count increment of a register slot
    Incref = 148,
    /// Explicit reference-count decrement of a register slot
    Decref = 149,
    /// Specialised `obj[arg]` with the index in the instruction's arg field
    ConstIndex = 150,
}

impl Opcode {
    /// Decode an opcode byte; `None` for unmapped bytes.
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::StopCode),
            1 => Some(Self::PopTop),
            2 => Some(Self::RotTwo),
            3 => Some(Self::RotThree),
            4 => Some(Self::DupTop),
            5 => Some(Self::RotFour),
            9 => Some(Self::Nop),

            10 => Some(Self::UnaryPositive),
            11 => Some(Self::UnaryNegative),
            12 => Some(Self::UnaryNot),
            13 => Some(Self::UnaryConvert),
            15 => Some(Self::UnaryInvert),

            19 => Some(Self::BinaryPower),
            20 => Some(Self::BinaryMultiply),
            21 => Some(Self::BinaryDivide),
            22 => Some(Self::BinaryModulo),
            23 => Some(Self::BinaryAdd),
            24 => Some(Self::BinarySubtract),
            25 => Some(Self::BinarySubscr),
            26 => Some(Self::BinaryFloorDivide),
            27 => Some(Self::BinaryTrueDivide),
            28 => Some(Self::InplaceFloorDivide),
            29 => Some(Self::InplaceTrueDivide),

            // The source machine encodes slice forms as four consecutive
            // bytes; all of them decode to the one register-form instruction.
            30..=33 => Some(Self::Slice),
            40..=43 => Some(Self::StoreSlice),
            50..=53 => Some(Self::DeleteSlice),

            54 => Some(Self::StoreMap),
            55 => Some(Self::InplaceAdd),
            56 => Some(Self::InplaceSubtract),
            57 => Some(Self::InplaceMultiply),
            58 => Some(Self::InplaceDivide),
            59 => Some(Self::InplaceModulo),
            60 => Some(Self::StoreSubscr),
            61 => Some(Self::DeleteSubscr),
            62 => Some(Self::BinaryLshift),
            63 => Some(Self::BinaryRshift),
            64 => Some(Self::BinaryAnd),
            65 => Some(Self::BinaryXor),
            66 => Some(Self::BinaryOr),
            67 => Some(Self::InplacePower),
            68 => Some(Self::GetIter),

            70 => Some(Self::PrintExpr),
            71 => Some(Self::PrintItem),
            72 => Some(Self::PrintNewline),
            73 => Some(Self::PrintItemTo),
            74 => Some(Self::PrintNewlineTo),
            75 => Some(Self::InplaceLshift),
            76 => Some(Self::InplaceRshift),
            77 => Some(Self::InplaceAnd),
            78 => Some(Self::InplaceXor),
            79 => Some(Self::InplaceOr),
            80 => Some(Self::BreakLoop),
            81 => Some(Self::WithCleanup),
            82 => Some(Self::LoadLocals),
            83 => Some(Self::ReturnValue),
            84 => Some(Self::ImportStar),
            85 => Some(Self::ExecStmt),
            86 => Some(Self::YieldValue),
            87 => Some(Self::PopBlock),
            88 => Some(Self::EndFinally),
            89 => Some(Self::BuildClass),

            90 => Some(Self::StoreName),
            91 => Some(Self::DeleteName),
            92 => Some(Self::UnpackSequence),
            93 => Some(Self::ForIter),
            94 => Some(Self::ListAppend),
            95 => Some(Self::StoreAttr),
            96 => Some(Self::DeleteAttr),
            97 => Some(Self::StoreGlobal),
            98 => Some(Self::DeleteGlobal),
            99 => Some(Self::DupTopx),
            100 => Some(Self::LoadConst),
            101 => Some(Self::LoadName),
            102 => Some(Self::BuildTuple),
            103 => Some(Self::BuildList),
            104 => Some(Self::BuildSet),
            105 => Some(Self::BuildMap),
            106 => Some(Self::LoadAttr),
            107 => Some(Self::CompareOp),
            108 => Some(Self::ImportName),
            109 => Some(Self::ImportFrom),
            110 => Some(Self::JumpForward),
            111 => Some(Self::JumpIfFalseOrPop),
            112 => Some(Self::JumpIfTrueOrPop),
            113 => Some(Self::JumpAbsolute),
            114 => Some(Self::PopJumpIfFalse),
            115 => Some(Self::PopJumpIfTrue),
            116 => Some(Self::LoadGlobal),
            119 => Some(Self::ContinueLoop),
            120 => Some(Self::SetupLoop),
            121 => Some(Self::SetupExcept),
            122 => Some(Self::SetupFinally),
            124 => Some(Self::LoadFast),
            125 => Some(Self::StoreFast),
            126 => Some(Self::DeleteFast),
            130 => Some(Self::RaiseVarargs),
            131 => Some(Self::CallFunction),
            132 => Some(Self::MakeFunction),
            133 => Some(Self::BuildSlice),
            134 => Some(Self::MakeClosure),
            135 => Some(Self::LoadClosure),
            136 => Some(Self::LoadDeref),
            137 => Some(Self::StoreDeref),
            140 => Some(Self::CallFunctionVar),
            141 => Some(Self::CallFunctionKw),
            142 => Some(Self::CallFunctionVarKw),
            143 => Some(Self::SetupWith),
            145 => Some(Self::ExtendedArg),
            146 => Some(Self::SetAdd),
            147 => Some(Self::MapAdd),

            148 => Some(Self::Incref),
            149 => Some(Self::Decref),
            150 => Some(Self::ConstIndex),

            _ => None,
        }
    }

    /// Convert opcode to its byte value
    #[inline]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Wire format of this opcode
    pub fn format(self) -> InstrFormat {
        match self {
            Self::ForIter
            | Self::JumpForward
            | Self::JumpIfFalseOrPop
            | Self::JumpIfTrueOrPop
            | Self::JumpAbsolute
            | Self::PopJumpIfFalse
            | Self::PopJumpIfTrue => InstrFormat::Branch,

            Self::BuildTuple
            | Self::BuildList
            | Self::BuildSet
            | Self::BuildMap
            | Self::CallFunction
            | Self::CallFunctionVar
            | Self::CallFunctionKw
            | Self::CallFunctionVarKw => InstrFormat::VarReg,

            _ => InstrFormat::Reg,
        }
    }

    /// True if the opcode has a register-machine handler.
    ///
    /// Everything else decodes but fails at dispatch with an
    /// unsupported-feature error naming the opcode.
    pub fn is_supported(self) -> bool {
        matches!(
            self,
            Self::UnaryPositive
                | Self::UnaryNegative
                | Self::UnaryNot
                | Self::UnaryConvert
                | Self::UnaryInvert
                | Self::BinaryPower
                | Self::BinaryMultiply
                | Self::BinaryDivide
                | Self::BinaryModulo
                | Self::BinaryAdd
                | Self::BinarySubtract
                | Self::BinarySubscr
                | Self::BinaryFloorDivide
                | Self::BinaryTrueDivide
                | Self::InplaceFloorDivide
                | Self::InplaceTrueDivide
                | Self::Slice
                | Self::InplaceAdd
                | Self::InplaceSubtract
                | Self::InplaceMultiply
                | Self::InplaceDivide
                | Self::InplaceModulo
                | Self::StoreSubscr
                | Self::BinaryLshift
                | Self::BinaryRshift
                | Self::BinaryAnd
                | Self::BinaryXor
                | Self::BinaryOr
                | Self::InplacePower
                | Self::GetIter
                | Self::PrintItem
                | Self::PrintNewline
                | Self::PrintItemTo
                | Self::PrintNewlineTo
                | Self::InplaceLshift
                | Self::InplaceRshift
                | Self::InplaceAnd
                | Self::InplaceXor
                | Self::InplaceOr
                | Self::LoadLocals
                | Self::ReturnValue
                | Self::StoreName
                | Self::ForIter
                | Self::ListAppend
                | Self::StoreAttr
                | Self::LoadName
                | Self::BuildTuple
                | Self::BuildList
                | Self::LoadAttr
                | Self::CompareOp
                | Self::JumpIfFalseOrPop
                | Self::JumpIfTrueOrPop
                | Self::JumpAbsolute
                | Self::PopJumpIfFalse
                | Self::PopJumpIfTrue
                | Self::LoadGlobal
                | Self::LoadFast
                | Self::StoreFast
                | Self::CallFunction
                | Self::Incref
                | Self::Decref
                | Self::ConstIndex
        )
    }

    /// True for opcodes using the branch format
    #[inline]
    pub fn is_branch(self) -> bool {
        self.format() == InstrFormat::Branch
    }

    /// Human-readable opcode name
    pub fn name(self) -> &'static str {
        match self {
            Self::StopCode => "STOP_CODE",
            Self::PopTop => "POP_TOP",
            Self::RotTwo => "ROT_TWO",
            Self::RotThree => "ROT_THREE",
            Self::DupTop => "DUP_TOP",
            Self::RotFour => "ROT_FOUR",
            Self::Nop => "NOP",
            Self::UnaryPositive => "UNARY_POSITIVE",
            Self::UnaryNegative => "UNARY_NEGATIVE",
            Self::UnaryNot => "UNARY_NOT",
            Self::UnaryConvert => "UNARY_CONVERT",
            Self::UnaryInvert => "UNARY_INVERT",
            Self::BinaryPower => "BINARY_POWER",
            Self::BinaryMultiply => "BINARY_MULTIPLY",
            Self::BinaryDivide => "BINARY_DIVIDE",
            Self::BinaryModulo => "BINARY_MODULO",
            Self::BinaryAdd => "BINARY_ADD",
            Self::BinarySubtract => "BINARY_SUBTRACT",
            Self::BinarySubscr => "BINARY_SUBSCR",
            Self::BinaryFloorDivide => "BINARY_FLOOR_DIVIDE",
            Self::BinaryTrueDivide => "BINARY_TRUE_DIVIDE",
            Self::InplaceFloorDivide => "INPLACE_FLOOR_DIVIDE",
            Self::InplaceTrueDivide => "INPLACE_TRUE_DIVIDE",
            Self::Slice => "SLICE",
            Self::StoreSlice => "STORE_SLICE",
            Self::DeleteSlice => "DELETE_SLICE",
            Self::StoreMap => "STORE_MAP",
            Self::InplaceAdd => "INPLACE_ADD",
            Self::InplaceSubtract => "INPLACE_SUBTRACT",
            Self::InplaceMultiply => "INPLACE_MULTIPLY",
            Self::InplaceDivide => "INPLACE_DIVIDE",
            Self::InplaceModulo => "INPLACE_MODULO",
            Self::StoreSubscr => "STORE_SUBSCR",
            Self::DeleteSubscr => "DELETE_SUBSCR",
            Self::BinaryLshift => "BINARY_LSHIFT",
            Self::BinaryRshift => "BINARY_RSHIFT",
            Self::BinaryAnd => "BINARY_AND",
            Self::BinaryXor => "BINARY_XOR",
            Self::BinaryOr => "BINARY_OR",
            Self::InplacePower => "INPLACE_POWER",
            Self::GetIter => "GET_ITER",
            Self::PrintExpr => "PRINT_EXPR",
            Self::PrintItem => "PRINT_ITEM",
            Self::PrintNewline => "PRINT_NEWLINE",
            Self::PrintItemTo => "PRINT_ITEM_TO",
            Self::PrintNewlineTo => "PRINT_NEWLINE_TO",
            Self::InplaceLshift => "INPLACE_LSHIFT",
            Self::InplaceRshift => "INPLACE_RSHIFT",
            Self::InplaceAnd => "INPLACE_AND",
            Self::InplaceXor => "INPLACE_XOR",
            Self::InplaceOr => "INPLACE_OR",
            Self::BreakLoop => "BREAK_LOOP",
            Self::WithCleanup => "WITH_CLEANUP",
            Self::LoadLocals => "LOAD_LOCALS",
            Self::ReturnValue => "RETURN_VALUE",
            Self::ImportStar => "IMPORT_STAR",
            Self::ExecStmt => "EXEC_STMT",
            Self::YieldValue => "YIELD_VALUE",
            Self::PopBlock => "POP_BLOCK",
            Self::EndFinally => "END_FINALLY",
            Self::BuildClass => "BUILD_CLASS",
            Self::StoreName => "STORE_NAME",
            Self::DeleteName => "DELETE_NAME",
            Self::UnpackSequence => "UNPACK_SEQUENCE",
            Self::ForIter => "FOR_ITER",
            Self::ListAppend => "LIST_APPEND",
            Self::StoreAttr => "STORE_ATTR",
            Self::DeleteAttr => "DELETE_ATTR",
            Self::StoreGlobal => "STORE_GLOBAL",
            Self::DeleteGlobal => "DELETE_GLOBAL",
            Self::DupTopx => "DUP_TOPX",
            Self::LoadConst => "LOAD_CONST",
            Self::LoadName => "LOAD_NAME",
            Self::BuildTuple => "BUILD_TUPLE",
            Self::BuildList => "BUILD_LIST",
            Self::BuildSet => "BUILD_SET",
            Self::BuildMap => "BUILD_MAP",
            Self::LoadAttr => "LOAD_ATTR",
            Self::CompareOp => "COMPARE_OP",
            Self::ImportName => "IMPORT_NAME",
            Self::ImportFrom => "IMPORT_FROM",
            Self::JumpForward => "JUMP_FORWARD",
            Self::JumpIfFalseOrPop => "JUMP_IF_FALSE_OR_POP",
            Self::JumpIfTrueOrPop => "JUMP_IF_TRUE_OR_POP",
            Self::JumpAbsolute => "JUMP_ABSOLUTE",
            Self::PopJumpIfFalse => "POP_JUMP_IF_FALSE",
            Self::PopJumpIfTrue => "POP_JUMP_IF_TRUE",
            Self::LoadGlobal => "LOAD_GLOBAL",
            Self::ContinueLoop => "CONTINUE_LOOP",
            Self::SetupLoop => "SETUP_LOOP",
            Self::SetupExcept => "SETUP_EXCEPT",
            Self::SetupFinally => "SETUP_FINALLY",
            Self::LoadFast => "LOAD_FAST",
            Self::StoreFast => "STORE_FAST",
            Self::DeleteFast => "DELETE_FAST",
            Self::RaiseVarargs => "RAISE_VARARGS",
            Self::CallFunction => "CALL_FUNCTION",
            Self::MakeFunction => "MAKE_FUNCTION",
            Self::BuildSlice => "BUILD_SLICE",
            Self::MakeClosure => "MAKE_CLOSURE",
            Self::LoadClosure => "LOAD_CLOSURE",
            Self::LoadDeref => "LOAD_DEREF",
            Self::StoreDeref => "STORE_DEREF",
            Self::CallFunctionVar => "CALL_FUNCTION_VAR",
            Self::CallFunctionKw => "CALL_FUNCTION_KW",
            Self::CallFunctionVarKw => "CALL_FUNCTION_VAR_KW",
            Self::SetupWith => "SETUP_WITH",
            Self::ExtendedArg => "EXTENDED_ARG",
            Self::SetAdd => "SET_ADD",
            Self::MapAdd => "MAP_ADD",
            Self::Incref => "INCREF",
            Self::Decref => "DECREF",
            Self::ConstIndex => "CONST_INDEX",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_supported() {
        for byte in 0..=255u8 {
            if let Some(op) = Opcode::from_u8(byte) {
                // Slice-form aliases collapse onto one discriminant
                let canonical = op.to_u8();
                assert_eq!(Opcode::from_u8(canonical), Some(op));
            }
        }
    }

    #[test]
    fn test_slice_aliases() {
        for byte in 30..=33 {
            assert_eq!(Opcode::from_u8(byte), Some(Opcode::Slice));
        }
        for byte in 40..=43 {
            assert_eq!(Opcode::from_u8(byte), Some(Opcode::StoreSlice));
        }
    }

    #[test]
    fn test_unmapped_bytes() {
        assert_eq!(Opcode::from_u8(6), None);
        assert_eq!(Opcode::from_u8(160), None);
        assert_eq!(Opcode::from_u8(255), None);
    }

    #[test]
    fn test_formats() {
        assert_eq!(Opcode::BinaryAdd.format(), InstrFormat::Reg);
        assert_eq!(Opcode::CallFunction.format(), InstrFormat::VarReg);
        assert_eq!(Opcode::BuildTuple.format(), InstrFormat::VarReg);
        assert_eq!(Opcode::JumpAbsolute.format(), InstrFormat::Branch);
        assert_eq!(Opcode::ForIter.format(), InstrFormat::Branch);
        assert!(Opcode::ForIter.is_branch());
        assert!(!Opcode::ReturnValue.is_branch());
    }

    #[test]
    fn test_supported_subset() {
        assert!(Opcode::BinaryAdd.is_supported());
        assert!(Opcode::CallFunction.is_supported());
        assert!(Opcode::Incref.is_supported());
        assert!(!Opcode::YieldValue.is_supported());
        assert!(!Opcode::MakeClosure.is_supported());
        assert!(!Opcode::LoadConst.is_supported());
        assert!(!Opcode::CallFunctionVar.is_supported());
    }
}
