//! 脚本实例 (类型定义)
//!
//! 一个运行中的脚本：私有内存、操作数栈、代码指针与状态机。
//! 指令执行逻辑在 runtime/execution.rs 中。

use std::sync::Arc;

use crate::core::error::{LibraryError, MemoryError};
use crate::core::script::{ScriptDefinition, ScriptState};
use crate::kit::stack::ByteStack;
use crate::runtime::library::Pid;

/// 一个正在运行的脚本实例
///
/// 实例独占自己的内存与栈：除实例本身与显式拿到该实例的
/// 原生函数外，任何代码不得写入。
pub struct ScriptInstance {
    definition: Arc<ScriptDefinition>,
    memory: Box<[u8]>,
    stack: ByteStack,
    code_pointer: u32,
    state: ScriptState,
    state_data: u32,
    blocked_on: Option<Pid>,
    pid: Pid,
}

impl ScriptInstance {
    /// 从模板孵化实例：清零内存、装载代码、指向入口
    ///
    /// 几何校验在此完成；失败作为使用方错误返回，不产生实例。
    pub(crate) fn new(definition: Arc<ScriptDefinition>) -> Result<Self, LibraryError> {
        let memory_size = definition.memory_size();
        let code_offset = definition.code_offset() as usize;
        let code_len = definition.code().len();

        if code_offset + code_len > memory_size as usize {
            return Err(LibraryError::CodeOutOfRange {
                code_offset: definition.code_offset(),
                code_len,
                memory_size,
            });
        }
        if definition.entry_point() >= memory_size {
            return Err(LibraryError::EntryPointOutOfRange {
                entry_point: definition.entry_point(),
                memory_size,
            });
        }

        let mut memory = vec![0u8; memory_size as usize].into_boxed_slice();
        memory[code_offset..code_offset + code_len].copy_from_slice(definition.code());

        let stack = ByteStack::new(definition.stack_size());
        let code_pointer = definition.entry_point();

        Ok(Self {
            definition,
            memory,
            stack,
            code_pointer,
            state: ScriptState::Initialized,
            state_data: 0,
            blocked_on: None,
            pid: 0,
        })
    }

    /// 当前状态
    pub fn state(&self) -> ScriptState {
        self.state
    }

    /// 进程 id（Library 内唯一）
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// 延时计数（Delayed 状态下的剩余 tick 数）
    pub fn state_data(&self) -> u32 {
        self.state_data
    }

    /// 实例内存大小（字节）
    pub fn memory_size(&self) -> u32 {
        self.memory.len() as u32
    }

    /// 代码指针
    pub fn code_pointer(&self) -> u32 {
        self.code_pointer
    }

    /// 孵化该实例的模板
    pub fn definition(&self) -> &ScriptDefinition {
        &self.definition
    }

    /// 操作数栈（只读；调试与检视用）
    pub fn stack(&self) -> &ByteStack {
        &self.stack
    }

    /// 读取内存区间
    pub fn read_memory(&self, pointer: u32, count: u32) -> Result<&[u8], MemoryError> {
        let end = self.check_range(pointer, count)?;
        Ok(&self.memory[pointer as usize..end])
    }

    /// 写入内存区间
    pub fn write_memory(&mut self, pointer: u32, data: &[u8]) -> Result<(), MemoryError> {
        let end = self.check_range(pointer, data.len() as u32)?;
        self.memory[pointer as usize..end].copy_from_slice(data);
        Ok(())
    }

    /// 读取小端 32 位无符号字
    pub fn read_word(&self, pointer: u32) -> Result<u32, MemoryError> {
        let bytes = self.read_memory(pointer, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// 读取小端 32 位有符号字
    pub fn read_word_signed(&self, pointer: u32) -> Result<i32, MemoryError> {
        Ok(self.read_word(pointer)? as i32)
    }

    /// 写入小端 32 位无符号字
    pub fn write_word(&mut self, pointer: u32, value: u32) -> Result<(), MemoryError> {
        self.write_memory(pointer, &value.to_le_bytes())
    }

    /// 写入小端 32 位有符号字
    pub fn write_word_signed(&mut self, pointer: u32, value: i32) -> Result<(), MemoryError> {
        self.write_word(pointer, value as u32)
    }

    /// 重置为初始状态：清零内存、重新装载代码、清空栈、回到入口
    pub fn reset(&mut self) {
        self.memory.fill(0);
        let code_offset = self.definition.code_offset() as usize;
        let code_len = self.definition.code().len();
        self.memory[code_offset..code_offset + code_len].copy_from_slice(self.definition.code());
        self.stack.clear();
        self.code_pointer = self.definition.entry_point();
        self.state = ScriptState::Initialized;
        self.state_data = 0;
        self.blocked_on = None;
    }

    fn check_range(&self, pointer: u32, count: u32) -> Result<usize, MemoryError> {
        let size = self.memory.len() as u32;
        match pointer.checked_add(count) {
            Some(end) if end <= size => Ok(end as usize),
            _ => Err(MemoryError::OutOfRange {
                pointer,
                count,
                size,
            }),
        }
    }

    // ===== 以下为解释器与调度器内部使用 =====

    pub(crate) fn stack_mut(&mut self) -> &mut ByteStack {
        &mut self.stack
    }

    pub(crate) fn set_pid(&mut self, pid: Pid) {
        self.pid = pid;
    }

    pub(crate) fn set_state(&mut self, state: ScriptState) {
        self.state = state;
    }

    pub(crate) fn set_state_data(&mut self, state_data: u32) {
        self.state_data = state_data;
    }

    pub(crate) fn blocked_on(&self) -> Option<Pid> {
        self.blocked_on
    }

    pub(crate) fn set_blocked_on(&mut self, target: Option<Pid>) {
        self.blocked_on = target;
    }

    pub(crate) fn set_code_pointer(&mut self, pointer: u32) {
        self.code_pointer = pointer;
    }

    /// 取指令字节并前移代码指针；指针越界返回 None
    pub(crate) fn fetch_byte(&mut self) -> Option<u8> {
        let byte = *self.memory.get(self.code_pointer as usize)?;
        self.code_pointer += 1;
        Some(byte)
    }

    /// 实例内存内部拷贝（SetMem / Mov 模式 0），允许区间重叠
    pub(crate) fn copy_within(&mut self, src: u32, dst: u32, count: u32) -> Result<(), MemoryError> {
        let src_end = self.check_range(src, count)?;
        self.check_range(dst, count)?;
        self.memory.copy_within(src as usize..src_end, dst as usize);
        Ok(())
    }

    /// 启动参数按压栈顺序放入全新的操作数栈
    pub(crate) fn push_args(&mut self, args: &[u8]) -> Result<(), LibraryError> {
        self.stack
            .push_slice(args)
            .map_err(|_| LibraryError::ArgumentOverflow(args.len()))
    }
}
