//! 解释器主执行循环
//!
//! 对单个脚本实例的取指、译码、执行。类型定义在 runtime/instance.rs。
//! 指令语义中的故障一律收敛为实例的终止态，从不向调度器抛错。

use tracing::debug;

use crate::core::error::MemoryError;
use crate::core::opcode::Opcode;
use crate::core::script::ScriptState;
use crate::kit::stack::StackError;
use crate::runtime::fixed;
use crate::runtime::host::SpecialTable;
use crate::runtime::instance::ScriptInstance;
use crate::runtime::library::Library;

/// 单次 `run()` 调用内的指令数上限，超出即判定为失控脚本
pub const RUNAWAY_LIMIT: u32 = 2_000_000;

/// 比较结果的真值编码：0x00 为真，0xFF 为假
pub const FLAG_TRUE: u8 = 0x00;
pub const FLAG_FALSE: u8 = 0xFF;

/// 执行上下文：实例所属的 Library（实例本身已摘出）与宿主原生函数表
pub(crate) struct ExecContext<'a> {
    pub library: &'a mut Library,
    pub specials: &'a mut SpecialTable,
}

/// 指令级故障，统一映射为终止态
enum Fault {
    Invalid,
    DivisionByZero,
    ModulusByZero,
}

impl Fault {
    fn state(&self) -> ScriptState {
        match self {
            Fault::Invalid => ScriptState::Invalid,
            Fault::DivisionByZero => ScriptState::DivisionByZero,
            Fault::ModulusByZero => ScriptState::ModulusByZero,
        }
    }
}

impl From<StackError> for Fault {
    fn from(_: StackError) -> Self {
        Fault::Invalid
    }
}

impl From<MemoryError> for Fault {
    fn from(_: MemoryError) -> Self {
        Fault::Invalid
    }
}

/// 状态迁移：赋新状态并同步唤醒等待者
///
/// 每次状态赋值都会排空该实例的等待者列表（SWait 的唤醒语义）。
pub(crate) fn transition(script: &mut ScriptInstance, library: &mut Library, state: ScriptState) {
    debug!(
        target: "myriad::vm",
        pid = script.pid(),
        from = ?script.state(),
        to = ?state,
        "state change"
    );
    script.set_state(state);
    library.wake_waiters(script.pid());
}

/// 执行一个调度片
///
/// 处理 Initialized/Delayed 的入场迁移，随后在 Running 状态下
/// 循环取指执行，直到阻塞、终止、故障或触发失控上限。
/// `single_step` 模式下无论结果状态如何，只执行一条指令。
pub(crate) fn run(script: &mut ScriptInstance, ctx: &mut ExecContext<'_>, single_step: bool) {
    match script.state() {
        ScriptState::Initialized => transition(script, ctx.library, ScriptState::Running),
        ScriptState::Delayed if script.blocked_on().is_none() => {
            // 时间延时每个 tick 递减一次；事件等待不走计数
            let left = script.state_data().saturating_sub(1);
            script.set_state_data(left);
            if left == 0 {
                transition(script, ctx.library, ScriptState::Running);
            }
        }
        _ => {}
    }

    let mut retired: u32 = 0;
    while script.state() == ScriptState::Running {
        if retired == RUNAWAY_LIMIT {
            transition(script, ctx.library, ScriptState::Runaway);
            break;
        }

        let byte = match script.fetch_byte() {
            Some(byte) => byte,
            None => {
                // 代码指针越过内存末尾
                transition(script, ctx.library, ScriptState::Invalid);
                break;
            }
        };
        retired += 1;

        match Opcode::from_byte(byte) {
            Some(op) => {
                #[cfg(feature = "trace_execution")]
                tracing::trace!(
                    target: "myriad::vm",
                    pid = script.pid(),
                    op = op.name(),
                    cp = script.code_pointer(),
                    "execute"
                );
                if let Err(fault) = exec(script, ctx, op) {
                    transition(script, ctx.library, fault.state());
                }
            }
            None => transition(script, ctx.library, ScriptState::Invalid),
        }

        if single_step {
            break;
        }
    }
}

/// 执行单条指令；操作数按文档顺序从栈顶弹出
fn exec(script: &mut ScriptInstance, ctx: &mut ExecContext<'_>, op: Opcode) -> Result<(), Fault> {
    match op {
        Opcode::Nop => {}

        // ===== 流程控制 =====
        Opcode::Jmp => {
            let pointer = pop_unsigned_word(script)?;
            jump(script, pointer)?;
        }
        Opcode::CJmp => {
            let condition = script.stack_mut().pop()?;
            let pointer = pop_unsigned_word(script)?;
            if condition > 0 {
                jump(script, pointer)?;
            }
        }

        // ===== 比较 =====
        Opcode::Eq => cmp_unsigned(script, |lhs, rhs| lhs == rhs)?,
        Opcode::Neq => cmp_unsigned(script, |lhs, rhs| lhs != rhs)?,
        Opcode::ULt => cmp_unsigned(script, |lhs, rhs| lhs < rhs)?,
        Opcode::UGt => cmp_unsigned(script, |lhs, rhs| lhs > rhs)?,
        Opcode::ULeq => cmp_unsigned(script, |lhs, rhs| lhs <= rhs)?,
        Opcode::UGeq => cmp_unsigned(script, |lhs, rhs| lhs >= rhs)?,
        Opcode::Lt => cmp_signed(script, |lhs, rhs| lhs < rhs)?,
        Opcode::Gt => cmp_signed(script, |lhs, rhs| lhs > rhs)?,
        Opcode::Leq => cmp_signed(script, |lhs, rhs| lhs <= rhs)?,
        Opcode::Geq => cmp_signed(script, |lhs, rhs| lhs >= rhs)?,

        // ===== 算术（栈上），溢出一律回绕 =====
        Opcode::UAdd => bin_unsigned(script, u32::wrapping_add)?,
        Opcode::USub => bin_unsigned(script, u32::wrapping_sub)?,
        Opcode::UMul => bin_unsigned(script, u32::wrapping_mul)?,
        Opcode::UDiv => {
            let (lhs, rhs) = operands_unsigned(script)?;
            if rhs == 0 {
                return Err(Fault::DivisionByZero);
            }
            push_unsigned_word(script, lhs / rhs)?;
        }
        Opcode::UMod => {
            let (lhs, rhs) = operands_unsigned(script)?;
            if rhs == 0 {
                return Err(Fault::ModulusByZero);
            }
            push_unsigned_word(script, lhs % rhs)?;
        }
        Opcode::UInc => un_unsigned(script, |value| value.wrapping_add(1))?,
        Opcode::UDec => un_unsigned(script, |value| value.wrapping_sub(1))?,
        Opcode::Add => bin_signed(script, i32::wrapping_add)?,
        Opcode::Sub => bin_signed(script, i32::wrapping_sub)?,
        Opcode::Mul => bin_signed(script, i32::wrapping_mul)?,
        Opcode::Div => {
            let (lhs, rhs) = operands_signed(script)?;
            if rhs == 0 {
                return Err(Fault::DivisionByZero);
            }
            push_signed_word(script, lhs.wrapping_div(rhs))?;
        }
        Opcode::Mod => {
            let (lhs, rhs) = operands_signed(script)?;
            if rhs == 0 {
                return Err(Fault::ModulusByZero);
            }
            push_signed_word(script, lhs.wrapping_rem(rhs))?;
        }
        Opcode::Inc => un_signed(script, |value| value.wrapping_add(1))?,
        Opcode::Dec => un_signed(script, |value| value.wrapping_sub(1))?,
        Opcode::KMul => bin_signed(script, fixed::mul)?,
        Opcode::KDiv => {
            let (lhs, rhs) = operands_signed(script)?;
            if rhs == 0 {
                return Err(Fault::DivisionByZero);
            }
            push_signed_word(script, fixed::div(lhs, rhs))?;
        }
        Opcode::KMod => {
            let (lhs, rhs) = operands_signed(script)?;
            if rhs == 0 {
                return Err(Fault::ModulusByZero);
            }
            push_signed_word(script, lhs.wrapping_rem(rhs))?;
        }

        // ===== 算术（内存上）=====
        // 左操作数从弹出的地址读取，结果写回同一地址
        Opcode::UAddM => bin_mem_unsigned(script, u32::wrapping_add)?,
        Opcode::USubM => bin_mem_unsigned(script, u32::wrapping_sub)?,
        Opcode::UMulM => bin_mem_unsigned(script, u32::wrapping_mul)?,
        Opcode::UDivM => {
            let (lhs_ptr, lhs, rhs) = operands_mem_unsigned(script)?;
            if rhs == 0 {
                return Err(Fault::DivisionByZero);
            }
            script.write_word(lhs_ptr, lhs / rhs)?;
        }
        Opcode::UModM => {
            let (lhs_ptr, lhs, rhs) = operands_mem_unsigned(script)?;
            if rhs == 0 {
                return Err(Fault::ModulusByZero);
            }
            script.write_word(lhs_ptr, lhs % rhs)?;
        }
        Opcode::UIncM => un_mem_unsigned(script, |value| value.wrapping_add(1))?,
        Opcode::UDecM => un_mem_unsigned(script, |value| value.wrapping_sub(1))?,
        Opcode::AddM => bin_mem_signed(script, i32::wrapping_add)?,
        Opcode::SubM => bin_mem_signed(script, i32::wrapping_sub)?,
        Opcode::MulM => bin_mem_signed(script, i32::wrapping_mul)?,
        Opcode::DivM => {
            let (lhs_ptr, lhs, rhs) = operands_mem_signed(script)?;
            if rhs == 0 {
                return Err(Fault::DivisionByZero);
            }
            script.write_word_signed(lhs_ptr, lhs.wrapping_div(rhs))?;
        }
        Opcode::ModM => {
            let (lhs_ptr, lhs, rhs) = operands_mem_signed(script)?;
            if rhs == 0 {
                return Err(Fault::ModulusByZero);
            }
            script.write_word_signed(lhs_ptr, lhs.wrapping_rem(rhs))?;
        }
        Opcode::IncM => un_mem_signed(script, |value| value.wrapping_add(1))?,
        Opcode::DecM => un_mem_signed(script, |value| value.wrapping_sub(1))?,
        Opcode::KMulM => bin_mem_signed(script, fixed::mul)?,
        Opcode::KDivM => {
            let (lhs_ptr, lhs, rhs) = operands_mem_signed(script)?;
            if rhs == 0 {
                return Err(Fault::DivisionByZero);
            }
            script.write_word_signed(lhs_ptr, fixed::div(lhs, rhs))?;
        }
        Opcode::KModM => {
            let (lhs_ptr, lhs, rhs) = operands_mem_signed(script)?;
            if rhs == 0 {
                return Err(Fault::ModulusByZero);
            }
            script.write_word_signed(lhs_ptr, lhs.wrapping_rem(rhs))?;
        }

        // ===== 脚本控制 =====
        Opcode::Terminate => {
            transition(script, ctx.library, ScriptState::Terminated);
        }
        Opcode::Delay => {
            let ticks = pop_unsigned_word(script)?;
            script.set_state_data(ticks);
            transition(script, ctx.library, ScriptState::Delayed);
        }
        Opcode::CallSpecial => {
            let id = pop_unsigned_word(script)?;
            let amount = pop_unsigned_word(script)?;
            let args = script.stack_mut().pop_reverse(amount as usize)?;
            match ctx.specials.get_mut(id) {
                Some(special) => special(script, &args),
                None => return Err(Fault::Invalid),
            }
        }
        Opcode::CallScript => {
            let id = pop_unsigned_word(script)?;
            let amount = pop_unsigned_word(script)?;
            let args = script.stack_mut().pop_reverse(amount as usize)?;
            if ctx.library.start_script(id, &args).is_err() {
                return Err(Fault::Invalid);
            }
        }
        Opcode::CallNamedScript => {
            let string_id = pop_unsigned_word(script)?;
            let amount = pop_unsigned_word(script)?;
            let args = script.stack_mut().pop_reverse(amount as usize)?;
            let name = match ctx.library.string(string_id) {
                Some(name) => name.to_owned(),
                None => return Err(Fault::Invalid),
            };
            if ctx.library.start_named_script(&name, &args).is_err() {
                return Err(Fault::Invalid);
            }
        }
        Opcode::SWait => {
            let target = pop_unsigned_word(script)?;
            // 目标必须是存活实例；等待已终止的实例会永远醒不来
            if target != script.pid() && ctx.library.is_live(target) {
                transition(script, ctx.library, ScriptState::Delayed);
                script.set_blocked_on(Some(target));
                ctx.library.add_waiter(target, script.pid());
            }
        }

        // ===== 栈控制 =====
        Opcode::Push => {
            let pointer = pop_unsigned_word(script)?;
            let amount = pop_unsigned_word(script)?;
            let bytes = script.read_memory(pointer, amount)?.to_vec();
            script.stack_mut().push_slice(&bytes)?;
        }
        Opcode::PushLit => {
            // 字面量内嵌在代码流中：4 字节长度 + 数据
            let cp = script.code_pointer();
            let amount = script.read_word(cp)?;
            let data_ptr = cp.checked_add(4).ok_or(Fault::Invalid)?;
            let bytes = script.read_memory(data_ptr, amount)?.to_vec();
            script.stack_mut().push_slice(&bytes)?;
            script.set_code_pointer(data_ptr + amount);
        }
        Opcode::Pop | Opcode::Peek => {
            let pointer = pop_unsigned_word(script)?;
            let amount = pop_unsigned_word(script)?;
            let bytes = script.stack_mut().pop_reverse(amount as usize)?;
            script.write_memory(pointer, &bytes)?;
        }

        // ===== 内存操作 =====
        Opcode::GStr => {
            let pointer = pop_unsigned_word(script)?;
            let string_id = pop_unsigned_word(script)?;
            let text = match ctx.library.string(string_id) {
                Some(text) => text.to_owned(),
                None => return Err(Fault::Invalid),
            };
            script.write_memory(pointer, text.as_bytes())?;
        }
        Opcode::SetMem => {
            // 模式字节取自代码流；仅模式 0 已定义，其余保留
            let mode = script.fetch_byte().ok_or(Fault::Invalid)?;
            if mode != 0 {
                return Err(Fault::Invalid);
            }
            let amount = pop_unsigned_word(script)?;
            let pointer = pop_unsigned_word(script)?;
            let cp = script.code_pointer();
            script.copy_within(cp, pointer, amount)?;
            script.set_code_pointer(cp + amount);
        }
        Opcode::Mov => {
            // 模式字节：高 4 位源模式，低 4 位目的模式；仅 (0,0) 已定义
            let mode = script.fetch_byte().ok_or(Fault::Invalid)?;
            if mode != 0 {
                return Err(Fault::Invalid);
            }
            let amount = pop_unsigned_word(script)?;
            let dst = pop_unsigned_word(script)?;
            let src = pop_unsigned_word(script)?;
            script.copy_within(src, dst, amount)?;
        }

        // ===== 位运算 =====
        Opcode::BShiftLeft => {
            let rhs = pop_signed_word(script)?;
            let lhs = pop_unsigned_word(script)?;
            push_unsigned_word(script, lhs.wrapping_shl(rhs as u32))?;
        }
        Opcode::BShiftRight => {
            let rhs = pop_signed_word(script)?;
            let lhs = pop_unsigned_word(script)?;
            push_unsigned_word(script, lhs.wrapping_shr(rhs as u32))?;
        }
        Opcode::BShiftLeftSign => {
            let rhs = pop_signed_word(script)?;
            let lhs = pop_signed_word(script)?;
            push_signed_word(script, lhs.wrapping_shl(rhs as u32))?;
        }
        Opcode::BShiftRightSign => {
            let rhs = pop_signed_word(script)?;
            let lhs = pop_signed_word(script)?;
            push_signed_word(script, lhs.wrapping_shr(rhs as u32))?;
        }
        Opcode::BitXor => bin_unsigned(script, |lhs, rhs| lhs ^ rhs)?,
        Opcode::BitOr => bin_unsigned(script, |lhs, rhs| lhs | rhs)?,
        Opcode::BitAnd => bin_unsigned(script, |lhs, rhs| lhs & rhs)?,
        Opcode::BitNot => un_unsigned(script, |value| !value)?,
    }

    Ok(())
}

// ===== 操作数存取 =====
// 栈上的多字节整数按低位在前压入，读回时恢复压栈顺序即得小端缓冲。

fn pop_word_bytes(script: &mut ScriptInstance) -> Result<[u8; 4], Fault> {
    let bytes = script.stack_mut().pop_reverse(4)?;
    Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn pop_unsigned_word(script: &mut ScriptInstance) -> Result<u32, Fault> {
    Ok(u32::from_le_bytes(pop_word_bytes(script)?))
}

fn pop_signed_word(script: &mut ScriptInstance) -> Result<i32, Fault> {
    Ok(i32::from_le_bytes(pop_word_bytes(script)?))
}

fn push_unsigned_word(script: &mut ScriptInstance, value: u32) -> Result<(), Fault> {
    script.stack_mut().push_slice(&value.to_le_bytes())?;
    Ok(())
}

fn push_signed_word(script: &mut ScriptInstance, value: i32) -> Result<(), Fault> {
    push_unsigned_word(script, value as u32)
}

fn push_flag(script: &mut ScriptInstance, truth: bool) -> Result<(), Fault> {
    let byte = if truth { FLAG_TRUE } else { FLAG_FALSE };
    if script.stack_mut().push(byte) {
        Ok(())
    } else {
        Err(Fault::Invalid)
    }
}

/// 弹出 (rhs, lhs)，按 (lhs, rhs) 返回
fn operands_unsigned(script: &mut ScriptInstance) -> Result<(u32, u32), Fault> {
    let rhs = pop_unsigned_word(script)?;
    let lhs = pop_unsigned_word(script)?;
    Ok((lhs, rhs))
}

fn operands_signed(script: &mut ScriptInstance) -> Result<(i32, i32), Fault> {
    let rhs = pop_signed_word(script)?;
    let lhs = pop_signed_word(script)?;
    Ok((lhs, rhs))
}

// ===== 指令模板 =====

fn jump(script: &mut ScriptInstance, pointer: u32) -> Result<(), Fault> {
    if pointer >= script.memory_size() {
        return Err(Fault::Invalid);
    }
    script.set_code_pointer(pointer);
    Ok(())
}

fn cmp_unsigned(
    script: &mut ScriptInstance,
    op: impl Fn(u32, u32) -> bool,
) -> Result<(), Fault> {
    let (lhs, rhs) = operands_unsigned(script)?;
    push_flag(script, op(lhs, rhs))
}

fn cmp_signed(script: &mut ScriptInstance, op: impl Fn(i32, i32) -> bool) -> Result<(), Fault> {
    let (lhs, rhs) = operands_signed(script)?;
    push_flag(script, op(lhs, rhs))
}

fn bin_unsigned(script: &mut ScriptInstance, op: impl Fn(u32, u32) -> u32) -> Result<(), Fault> {
    let (lhs, rhs) = operands_unsigned(script)?;
    push_unsigned_word(script, op(lhs, rhs))
}

fn bin_signed(script: &mut ScriptInstance, op: impl Fn(i32, i32) -> i32) -> Result<(), Fault> {
    let (lhs, rhs) = operands_signed(script)?;
    push_signed_word(script, op(lhs, rhs))
}

fn un_unsigned(script: &mut ScriptInstance, op: impl Fn(u32) -> u32) -> Result<(), Fault> {
    let value = pop_unsigned_word(script)?;
    push_unsigned_word(script, op(value))
}

fn un_signed(script: &mut ScriptInstance, op: impl Fn(i32) -> i32) -> Result<(), Fault> {
    let value = pop_signed_word(script)?;
    push_signed_word(script, op(value))
}

/// 弹出右操作数地址、左操作数地址，读出两个字；返回 (lhs_ptr, lhs, rhs)
fn operands_mem_unsigned(script: &mut ScriptInstance) -> Result<(u32, u32, u32), Fault> {
    let rhs_ptr = pop_unsigned_word(script)?;
    let rhs = script.read_word(rhs_ptr)?;
    let lhs_ptr = pop_unsigned_word(script)?;
    let lhs = script.read_word(lhs_ptr)?;
    Ok((lhs_ptr, lhs, rhs))
}

fn operands_mem_signed(script: &mut ScriptInstance) -> Result<(u32, i32, i32), Fault> {
    let rhs_ptr = pop_unsigned_word(script)?;
    let rhs = script.read_word_signed(rhs_ptr)?;
    let lhs_ptr = pop_unsigned_word(script)?;
    let lhs = script.read_word_signed(lhs_ptr)?;
    Ok((lhs_ptr, lhs, rhs))
}

fn bin_mem_unsigned(
    script: &mut ScriptInstance,
    op: impl Fn(u32, u32) -> u32,
) -> Result<(), Fault> {
    let (lhs_ptr, lhs, rhs) = operands_mem_unsigned(script)?;
    script.write_word(lhs_ptr, op(lhs, rhs))?;
    Ok(())
}

fn bin_mem_signed(script: &mut ScriptInstance, op: impl Fn(i32, i32) -> i32) -> Result<(), Fault> {
    let (lhs_ptr, lhs, rhs) = operands_mem_signed(script)?;
    script.write_word_signed(lhs_ptr, op(lhs, rhs))?;
    Ok(())
}

fn un_mem_unsigned(script: &mut ScriptInstance, op: impl Fn(u32) -> u32) -> Result<(), Fault> {
    let ptr = pop_unsigned_word(script)?;
    let value = script.read_word(ptr)?;
    script.write_word(ptr, op(value))?;
    Ok(())
}

fn un_mem_signed(script: &mut ScriptInstance, op: impl Fn(i32) -> i32) -> Result<(), Fault> {
    let ptr = pop_unsigned_word(script)?;
    let value = script.read_word_signed(ptr)?;
    script.write_word_signed(ptr, op(value))?;
    Ok(())
}
