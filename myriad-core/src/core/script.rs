//! 脚本状态机与脚本模板定义
//!
//! `ScriptDefinition` 是不可变模板，注册进 Library 后由所有实例共享；
//! `ScriptState` 描述单个运行实例的生命周期。

use myriad_config::ScriptDefaults;

/// 脚本实例的生命周期状态
///
/// 后五种为终止态：一旦进入，该实例不再执行任何指令。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptState {
    /// 刚创建，尚未开始执行
    Initialized,
    /// 正在执行
    Running,
    /// 挂起：等待延时计数归零，或等待另一实例的状态变化
    Delayed,
    /// 正常执行完毕
    Terminated,
    /// 非法字节码、越界指针、未知字符串 id 或未实现的指令模式
    Invalid,
    /// 单次调度内超出指令数上限
    Runaway,
    /// 除数为零
    DivisionByZero,
    /// 取模数为零
    ModulusByZero,
}

impl ScriptState {
    /// 终止态判定；终止态的实例等待调度器回收
    pub fn is_halted(&self) -> bool {
        matches!(
            self,
            ScriptState::Terminated
                | ScriptState::Invalid
                | ScriptState::Runaway
                | ScriptState::DivisionByZero
                | ScriptState::ModulusByZero
        )
    }
}

/// 脚本模板：字节码与实例几何参数
///
/// 注册后不可变，所有由它孵化的实例共享同一份模板。
#[derive(Debug, Clone)]
pub struct ScriptDefinition {
    code: Vec<u8>,
    code_offset: u32,
    entry_point: u32,
    memory_size: u32,
    stack_size: usize,
}

impl ScriptDefinition {
    /// 以默认几何参数创建模板（内存 64 KiB、栈 2500 字节、
    /// 代码装载在偏移 0、入口 0）
    pub fn new(code: impl Into<Vec<u8>>) -> Self {
        let defaults = ScriptDefaults::default();
        Self {
            code: code.into(),
            code_offset: 0,
            entry_point: 0,
            memory_size: defaults.memory_size,
            stack_size: defaults.stack_size,
        }
    }

    /// 代码在实例内存中的装载偏移
    pub fn with_code_offset(mut self, code_offset: u32) -> Self {
        self.code_offset = code_offset;
        self
    }

    /// 执行入口（实例内存中的绝对地址）
    pub fn with_entry_point(mut self, entry_point: u32) -> Self {
        self.entry_point = entry_point;
        self
    }

    pub fn with_memory_size(mut self, memory_size: u32) -> Self {
        self.memory_size = memory_size;
        self
    }

    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn code_offset(&self) -> u32 {
        self.code_offset
    }

    pub fn entry_point(&self) -> u32 {
        self.entry_point
    }

    pub fn memory_size(&self) -> u32 {
        self.memory_size
    }

    pub fn stack_size(&self) -> usize {
        self.stack_size
    }
}
