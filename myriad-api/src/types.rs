//! API 类型定义
//!
//! 面向嵌入方的运行状态快照。

use myriad_core::{Library, Pid, ScriptState};

/// 单个实例的状态快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceReport {
    pub pid: Pid,
    pub state: ScriptState,
    /// Delayed 状态下的剩余延时计数
    pub state_data: u32,
}

/// 按 pid 升序给出运行集中每个实例的快照
///
/// 上个 tick 终止、尚未回收的实例也包含在内。
pub fn snapshot(library: &Library) -> Vec<InstanceReport> {
    library
        .running_pids()
        .into_iter()
        .filter_map(|pid| {
            library.running_script(pid).map(|script| InstanceReport {
                pid,
                state: script.state(),
                state_data: script.state_data(),
            })
        })
        .collect()
}
