//! 脚本库：注册表与调度器
//!
//! 单写者纪律：Library 的映射只由 Library 自己的操作改动；
//! 脚本实例只能经由这里暴露的操作（启动、查询、字符串表）间接访问。

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use tracing::{debug, info};

use crate::core::error::LibraryError;
use crate::core::script::{ScriptDefinition, ScriptState};
use crate::runtime::execution::{self, ExecContext};
use crate::runtime::host::SpecialTable;
use crate::runtime::instance::ScriptInstance;

/// 进程 id：运行中实例在所属 Library 内的唯一句柄
///
/// 由单调递增计数器在孵化时分配，从 1 开始；0 永远不是有效 pid。
pub type Pid = u32;

/// 脚本定义注册表、字符串表与运行集调度器
pub struct Library {
    scripts: HashMap<u32, Arc<ScriptDefinition>>,
    named_scripts: HashMap<String, Arc<ScriptDefinition>>,
    strings: HashMap<u32, String>,
    /// BTreeMap 保证每个 tick 按 pid 升序、稳定地遍历运行集
    running: BTreeMap<Pid, ScriptInstance>,
    /// 目标 pid -> 等待其状态变化的 pid 列表
    waiters: HashMap<Pid, Vec<Pid>>,
    next_pid: Pid,
}

impl Default for Library {
    fn default() -> Self {
        Self::new()
    }
}

impl Library {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            named_scripts: HashMap::new(),
            strings: HashMap::new(),
            running: BTreeMap::new(),
            waiters: HashMap::new(),
            next_pid: 1,
        }
    }

    // ===== 注册表 =====

    /// 按数字 id 注册脚本定义；id 已占用时不改动并返回 false
    pub fn add_script(&mut self, id: u32, definition: ScriptDefinition) -> bool {
        if self.scripts.contains_key(&id) {
            return false;
        }
        self.scripts.insert(id, Arc::new(definition));
        true
    }

    /// 按名字注册脚本定义；名字已占用时不改动并返回 false
    pub fn add_named_script(&mut self, name: impl Into<String>, definition: ScriptDefinition) -> bool {
        let name = name.into();
        if self.named_scripts.contains_key(&name) {
            return false;
        }
        self.named_scripts.insert(name, Arc::new(definition));
        true
    }

    /// 注销脚本定义；不存在时返回 false。已运行的实例不受影响
    pub fn remove_script(&mut self, id: u32) -> bool {
        self.scripts.remove(&id).is_some()
    }

    pub fn remove_named_script(&mut self, name: &str) -> bool {
        self.named_scripts.remove(name).is_some()
    }

    /// 向静态字符串表加入一条；id 已占用时不改动并返回 false
    pub fn add_string(&mut self, id: u32, text: impl Into<String>) -> bool {
        if self.strings.contains_key(&id) {
            return false;
        }
        self.strings.insert(id, text.into());
        true
    }

    /// 查字符串表
    pub fn string(&self, id: u32) -> Option<&str> {
        self.strings.get(&id).map(String::as_str)
    }

    // ===== 启动与查询 =====

    /// 按 id 启动脚本，返回新实例的 pid
    pub fn start_script(&mut self, id: u32, args: &[u8]) -> Result<Pid, LibraryError> {
        let definition = self
            .scripts
            .get(&id)
            .cloned()
            .ok_or(LibraryError::UnknownScriptId(id))?;
        self.spawn(definition, args)
    }

    /// 按名字启动脚本，返回新实例的 pid
    pub fn start_named_script(&mut self, name: &str, args: &[u8]) -> Result<Pid, LibraryError> {
        let definition = self
            .named_scripts
            .get(name)
            .cloned()
            .ok_or_else(|| LibraryError::UnknownScriptName(name.to_owned()))?;
        self.spawn(definition, args)
    }

    fn spawn(&mut self, definition: Arc<ScriptDefinition>, args: &[u8]) -> Result<Pid, LibraryError> {
        let mut script = ScriptInstance::new(definition)?;
        script.push_args(args)?;

        let pid = self.next_pid;
        self.next_pid += 1;
        script.set_pid(pid);
        self.running.insert(pid, script);
        info!(target: "myriad::library", pid, "script started");
        Ok(pid)
    }

    /// 查询运行中的实例；不存在（或已被回收）返回 None
    pub fn running_script(&self, pid: Pid) -> Option<&ScriptInstance> {
        self.running.get(&pid)
    }

    pub fn running_script_mut(&mut self, pid: Pid) -> Option<&mut ScriptInstance> {
        self.running.get_mut(&pid)
    }

    /// 运行集中的 pid，升序
    pub fn running_pids(&self) -> Vec<Pid> {
        self.running.keys().copied().collect()
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    /// 无条件终止全部实例并清空运行集
    ///
    /// 只做状态赋值，不触发等待者唤醒；等待者连同运行集一起清除。
    pub fn stop_all(&mut self) {
        for script in self.running.values_mut() {
            script.set_state(ScriptState::Terminated);
        }
        self.running.clear();
        self.waiters.clear();
        info!(target: "myriad::library", "all scripts stopped");
    }

    // ===== 调度 =====

    /// 执行一个 tick：回收上个 tick 终止的实例，再依 pid 序逐个调度
    ///
    /// tick 中途孵化的实例从下个 tick 开始被调度。
    pub fn run(&mut self, specials: &mut SpecialTable, single_step: bool) {
        self.sweep();
        let pids: Vec<Pid> = self.running.keys().copied().collect();
        for pid in pids {
            self.step(pid, specials, single_step);
        }
    }

    /// 单独调度一个实例（调试用；不做回收）
    ///
    /// pid 未知或实例已终止时返回 false。
    pub fn run_script(&mut self, pid: Pid, specials: &mut SpecialTable, single_step: bool) -> bool {
        self.step(pid, specials, single_step)
    }

    fn step(&mut self, pid: Pid, specials: &mut SpecialTable, single_step: bool) -> bool {
        let Some(mut script) = self.running.remove(&pid) else {
            return false;
        };
        if script.state().is_halted() {
            // 终止态的实例永不再执行
            self.running.insert(pid, script);
            return false;
        }

        let mut ctx = ExecContext {
            library: self,
            specials,
        };
        execution::run(&mut script, &mut ctx, single_step);

        self.running.insert(pid, script);
        true
    }

    fn sweep(&mut self) {
        let dead: Vec<Pid> = self
            .running
            .iter()
            .filter(|(_, script)| script.state().is_halted())
            .map(|(pid, _)| *pid)
            .collect();
        for pid in dead {
            self.running.remove(&pid);
            self.waiters.remove(&pid);
            debug!(target: "myriad::library", pid, "halted instance swept");
        }
    }

    // ===== 同步等待（SWait） =====

    /// 目标可作为 SWait 对象：在运行集中且未终止
    pub(crate) fn is_live(&self, pid: Pid) -> bool {
        self.running
            .get(&pid)
            .map(|script| !script.state().is_halted())
            .unwrap_or(false)
    }

    /// 登记等待者：target 下次状态变化时唤醒 waiter
    pub(crate) fn add_waiter(&mut self, target: Pid, waiter: Pid) {
        self.waiters.entry(target).or_default().push(waiter);
    }

    /// 排空 `pid` 的等待者列表并唤醒
    ///
    /// 唤醒本身也是状态赋值，级联排空被唤醒者自己的等待者。
    pub(crate) fn wake_waiters(&mut self, pid: Pid) {
        let Some(first) = self.waiters.remove(&pid) else {
            return;
        };
        let mut queue: VecDeque<Pid> = first.into();
        while let Some(waiter) = queue.pop_front() {
            let Some(script) = self.running.get_mut(&waiter) else {
                continue;
            };
            if script.state() != ScriptState::Delayed || script.blocked_on().is_none() {
                continue;
            }
            script.set_blocked_on(None);
            script.set_state(ScriptState::Running);
            debug!(target: "myriad::library", pid = waiter, woken_by = pid, "waiter woken");
            if let Some(more) = self.waiters.remove(&waiter) {
                queue.extend(more);
            }
        }
    }
}
