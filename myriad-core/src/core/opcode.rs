//! 操作码定义
//!
//! 每条指令占一个字节，取值是二进制兼容面，不可改动。
//! 0x3C..=0x42 以及 0x4B 之后的值保留；解码失败的字节由解释器
//! 转入 `Invalid` 状态处理。

/// 虚拟机指令操作码
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Nop = 0x00,

    // ===== 流程控制 =====
    Jmp = 0x01,
    CJmp = 0x02,

    // ===== 比较 =====
    Eq = 0x03,
    Neq = 0x04,
    /// 无符号比较
    ULt = 0x05,
    UGt = 0x06,
    ULeq = 0x07,
    UGeq = 0x08,
    /// 有符号比较
    Lt = 0x09,
    Gt = 0x0A,
    Leq = 0x0B,
    Geq = 0x0C,

    // ===== 算术（栈上） =====
    /// 无符号算术
    UAdd = 0x0D,
    USub = 0x0E,
    UMul = 0x0F,
    UDiv = 0x10,
    UMod = 0x11,
    UInc = 0x12,
    UDec = 0x13,
    /// 有符号算术
    Add = 0x14,
    Sub = 0x15,
    Mul = 0x16,
    Div = 0x17,
    Mod = 0x18,
    Inc = 0x19,
    Dec = 0x1A,
    /// Q16.16 定点算术
    KMul = 0x1B,
    KDiv = 0x1C,
    KMod = 0x1D,

    // ===== 算术（内存上） =====
    UAddM = 0x1E,
    USubM = 0x1F,
    UMulM = 0x20,
    UDivM = 0x21,
    UModM = 0x22,
    UIncM = 0x23,
    UDecM = 0x24,
    AddM = 0x25,
    SubM = 0x26,
    MulM = 0x27,
    DivM = 0x28,
    ModM = 0x29,
    IncM = 0x2A,
    DecM = 0x2B,
    KMulM = 0x2C,
    KDivM = 0x2D,
    KModM = 0x2E,

    // ===== 脚本控制 =====
    Terminate = 0x2F,
    Delay = 0x30,
    CallSpecial = 0x31,
    CallScript = 0x32,
    CallNamedScript = 0x33,
    SWait = 0x34,

    // ===== 栈控制 =====
    Push = 0x35,
    PushLit = 0x36,
    Pop = 0x37,
    Peek = 0x38,

    // ===== 内存操作 =====
    GStr = 0x39,
    SetMem = 0x3A,
    Mov = 0x3B,

    // ===== 位运算 =====
    BShiftLeft = 0x43,
    BShiftRight = 0x44,
    BShiftLeftSign = 0x45,
    BShiftRightSign = 0x46,
    BitXor = 0x47,
    BitOr = 0x48,
    BitAnd = 0x49,
    BitNot = 0x4A,
}

impl Opcode {
    /// 解码一个指令字节；保留值与未定义值返回 None
    pub fn from_byte(byte: u8) -> Option<Opcode> {
        use Opcode::*;
        let op = match byte {
            0x00 => Nop,
            0x01 => Jmp,
            0x02 => CJmp,
            0x03 => Eq,
            0x04 => Neq,
            0x05 => ULt,
            0x06 => UGt,
            0x07 => ULeq,
            0x08 => UGeq,
            0x09 => Lt,
            0x0A => Gt,
            0x0B => Leq,
            0x0C => Geq,
            0x0D => UAdd,
            0x0E => USub,
            0x0F => UMul,
            0x10 => UDiv,
            0x11 => UMod,
            0x12 => UInc,
            0x13 => UDec,
            0x14 => Add,
            0x15 => Sub,
            0x16 => Mul,
            0x17 => Div,
            0x18 => Mod,
            0x19 => Inc,
            0x1A => Dec,
            0x1B => KMul,
            0x1C => KDiv,
            0x1D => KMod,
            0x1E => UAddM,
            0x1F => USubM,
            0x20 => UMulM,
            0x21 => UDivM,
            0x22 => UModM,
            0x23 => UIncM,
            0x24 => UDecM,
            0x25 => AddM,
            0x26 => SubM,
            0x27 => MulM,
            0x28 => DivM,
            0x29 => ModM,
            0x2A => IncM,
            0x2B => DecM,
            0x2C => KMulM,
            0x2D => KDivM,
            0x2E => KModM,
            0x2F => Terminate,
            0x30 => Delay,
            0x31 => CallSpecial,
            0x32 => CallScript,
            0x33 => CallNamedScript,
            0x34 => SWait,
            0x35 => Push,
            0x36 => PushLit,
            0x37 => Pop,
            0x38 => Peek,
            0x39 => GStr,
            0x3A => SetMem,
            0x3B => Mov,
            0x43 => BShiftLeft,
            0x44 => BShiftRight,
            0x45 => BShiftLeftSign,
            0x46 => BShiftRightSign,
            0x47 => BitXor,
            0x48 => BitOr,
            0x49 => BitAnd,
            0x4A => BitNot,
            _ => return None,
        };
        Some(op)
    }

    /// 指令助记符（用于执行追踪与反汇编输出）
    pub fn name(&self) -> &'static str {
        use Opcode::*;
        match self {
            Nop => "Nop",
            Jmp => "Jmp",
            CJmp => "CJmp",
            Eq => "Eq",
            Neq => "Neq",
            ULt => "ULt",
            UGt => "UGt",
            ULeq => "ULeq",
            UGeq => "UGeq",
            Lt => "Lt",
            Gt => "Gt",
            Leq => "Leq",
            Geq => "Geq",
            UAdd => "UAdd",
            USub => "USub",
            UMul => "UMul",
            UDiv => "UDiv",
            UMod => "UMod",
            UInc => "UInc",
            UDec => "UDec",
            Add => "Add",
            Sub => "Sub",
            Mul => "Mul",
            Div => "Div",
            Mod => "Mod",
            Inc => "Inc",
            Dec => "Dec",
            KMul => "KMul",
            KDiv => "KDiv",
            KMod => "KMod",
            UAddM => "UAddM",
            USubM => "USubM",
            UMulM => "UMulM",
            UDivM => "UDivM",
            UModM => "UModM",
            UIncM => "UIncM",
            UDecM => "UDecM",
            AddM => "AddM",
            SubM => "SubM",
            MulM => "MulM",
            DivM => "DivM",
            ModM => "ModM",
            IncM => "IncM",
            DecM => "DecM",
            KMulM => "KMulM",
            KDivM => "KDivM",
            KModM => "KModM",
            Terminate => "Terminate",
            Delay => "Delay",
            CallSpecial => "CallSpecial",
            CallScript => "CallScript",
            CallNamedScript => "CallNamedScript",
            SWait => "SWait",
            Push => "Push",
            PushLit => "PushLit",
            Pop => "Pop",
            Peek => "Peek",
            GStr => "GStr",
            SetMem => "SetMem",
            Mov => "Mov",
            BShiftLeft => "BShiftLeft",
            BShiftRight => "BShiftRight",
            BShiftLeftSign => "BShiftLeftSign",
            BShiftRightSign => "BShiftRightSign",
            BitXor => "BitXor",
            BitOr => "BitOr",
            BitAnd => "BitAnd",
            BitNot => "BitNot",
        }
    }
}
