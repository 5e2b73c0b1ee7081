//! 宿主：Library 集合与共享原生函数表
//!
//! 宿主应用通过原生函数表向脚本注入行为（实体移动、声音、世界查询……），
//! 解释器对其实现一无所知。

use std::collections::HashMap;

use tracing::debug;

use crate::runtime::instance::ScriptInstance;
use crate::runtime::library::Library;

/// 原生函数：接收发起调用的实例（可读写其内存）与压栈顺序的参数字节。
/// 不向操作数栈返回任何值。
pub type SpecialFn = Box<dyn FnMut(&mut ScriptInstance, &[u8])>;

/// 原生函数表，按数字 id 索引，整个 Host 下所有 Library 共享
#[derive(Default)]
pub struct SpecialTable {
    entries: HashMap<u32, SpecialFn>,
}

impl SpecialTable {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// 注册原生函数；id 已占用时不改动并返回 false
    pub fn register(
        &mut self,
        id: u32,
        special: impl FnMut(&mut ScriptInstance, &[u8]) + 'static,
    ) -> bool {
        if self.entries.contains_key(&id) {
            return false;
        }
        self.entries.insert(id, Box::new(special));
        true
    }

    /// 注销原生函数；不存在时返回 false
    pub fn remove(&mut self, id: u32) -> bool {
        self.entries.remove(&id).is_some()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn get_mut(&mut self, id: u32) -> Option<&mut SpecialFn> {
        self.entries.get_mut(&id)
    }
}

/// 脚本宿主：持有 Library 集合并驱动全局 tick
#[derive(Default)]
pub struct Host {
    libraries: Vec<Library>,
    specials: SpecialTable,
}

impl Host {
    pub fn new() -> Self {
        Self {
            libraries: Vec::new(),
            specials: SpecialTable::new(),
        }
    }

    /// 挂载一个 Library，返回其索引（注册顺序即 tick 顺序）
    pub fn add_library(&mut self, library: Library) -> usize {
        self.libraries.push(library);
        self.libraries.len() - 1
    }

    pub fn library(&self, index: usize) -> Option<&Library> {
        self.libraries.get(index)
    }

    pub fn library_mut(&mut self, index: usize) -> Option<&mut Library> {
        self.libraries.get_mut(index)
    }

    pub fn libraries(&self) -> &[Library] {
        &self.libraries
    }

    /// 注册原生函数；id 已占用时不改动并返回 false
    pub fn register_special(
        &mut self,
        id: u32,
        special: impl FnMut(&mut ScriptInstance, &[u8]) + 'static,
    ) -> bool {
        self.specials.register(id, special)
    }

    pub fn remove_special(&mut self, id: u32) -> bool {
        self.specials.remove(id)
    }

    pub fn specials(&self) -> &SpecialTable {
        &self.specials
    }

    pub fn specials_mut(&mut self) -> &mut SpecialTable {
        &mut self.specials
    }

    /// 全局 tick：按注册顺序调度每个 Library
    pub fn run(&mut self, single_step: bool) {
        debug!(target: "myriad::host", libraries = self.libraries.len(), "tick");
        for library in &mut self.libraries {
            library.run(&mut self.specials, single_step);
        }
    }

    /// 停止所有 Library 中的全部脚本
    pub fn reset(&mut self) {
        for library in &mut self.libraries {
            library.stop_all();
        }
    }
}
