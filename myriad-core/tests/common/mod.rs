//! 测试辅助工具
//!
//! 手工汇编字节码并驱动调度器的辅助函数。

#![allow(dead_code)]

use myriad_core::{Library, Opcode, Pid, ScriptDefinition, ScriptInstance, ScriptState, SpecialTable};

/// 逐条拼装字节码的小工具
pub struct CodeBuilder {
    code: Vec<u8>,
}

impl CodeBuilder {
    pub fn new() -> Self {
        Self { code: Vec::new() }
    }

    /// 追加一个操作码
    pub fn op(mut self, op: Opcode) -> Self {
        self.code.push(op as u8);
        self
    }

    /// 追加原始字节（操作码内嵌数据、非法指令等）
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.code.extend_from_slice(bytes);
        self
    }

    /// PushLit 指令：4 字节长度 + 字面量
    pub fn push_lit(mut self, bytes: &[u8]) -> Self {
        self.code.push(Opcode::PushLit as u8);
        self.code.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        self.code.extend_from_slice(bytes);
        self
    }

    /// 压入一个小端 32 位无符号字
    pub fn push_word(self, value: u32) -> Self {
        self.push_lit(&value.to_le_bytes())
    }

    /// 压入一个小端 32 位有符号字
    pub fn push_word_signed(self, value: i32) -> Self {
        self.push_lit(&value.to_le_bytes())
    }

    /// 当前写入位置（用于计算跳转目标）
    pub fn here(&self) -> u32 {
        self.code.len() as u32
    }

    pub fn build(self) -> Vec<u8> {
        self.code
    }
}

/// 注册单个脚本（id 1）并启动一个实例
pub fn start_one(code: Vec<u8>) -> (Library, SpecialTable, Pid) {
    let mut library = Library::new();
    assert!(library.add_script(1, ScriptDefinition::new(code)));
    let pid = library.start_script(1, &[]).expect("script starts");
    (library, SpecialTable::new(), pid)
}

/// 同上，但使用自定义模板
pub fn start_one_with(definition: ScriptDefinition) -> (Library, SpecialTable, Pid) {
    let mut library = Library::new();
    assert!(library.add_script(1, definition));
    let pid = library.start_script(1, &[]).expect("script starts");
    (library, SpecialTable::new(), pid)
}

/// 执行一个 tick
pub fn tick(library: &mut Library, specials: &mut SpecialTable) {
    library.run(specials, false);
}

/// 读实例状态；实例必须仍在运行集中（终止后、回收前也算）
pub fn state_of(library: &Library, pid: Pid) -> ScriptState {
    library
        .running_script(pid)
        .expect("instance still registered")
        .state()
}

/// 栈顶字节（不消耗）
pub fn top_byte(script: &ScriptInstance) -> u8 {
    script.stack().peek().expect("stack not empty")
}

/// 栈顶的小端 32 位无符号字（不消耗）
pub fn top_word(script: &ScriptInstance) -> u32 {
    let bytes = script.stack().peek_n(4).expect("word on stack");
    // peek_n 按弹出顺序返回（栈顶在前），即小端字节的逆序
    u32::from_le_bytes([bytes[3], bytes[2], bytes[1], bytes[0]])
}

/// 栈顶的小端 32 位有符号字（不消耗）
pub fn top_word_signed(script: &ScriptInstance) -> i32 {
    top_word(script) as i32
}
