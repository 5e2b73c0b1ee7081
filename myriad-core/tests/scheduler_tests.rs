//! 调度器与注册表测试
//!
//! 多实例并发、延时、跨脚本等待、回收与宿主 tick。

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{start_one, state_of, tick, top_byte, CodeBuilder};
use myriad_core::{
    Host, Library, LibraryError, Opcode, ScriptDefinition, ScriptState, SpecialTable,
};

// ===== 注册表使用方错误 =====

#[test]
fn test_start_unknown_script_id_is_usage_error() {
    let mut library = Library::new();
    let err = library.start_script(9, &[]).unwrap_err();
    assert_eq!(err, LibraryError::UnknownScriptId(9));
    assert_eq!(library.running_count(), 0);
}

#[test]
fn test_start_unknown_script_name_is_usage_error() {
    let mut library = Library::new();
    let err = library.start_named_script("ghost", &[]).unwrap_err();
    assert_eq!(err, LibraryError::UnknownScriptName("ghost".into()));
    assert_eq!(library.running_count(), 0);
}

#[test]
fn test_duplicate_registration_keeps_original() {
    let mut library = Library::new();
    let first = CodeBuilder::new().push_lit(&[0xAA]).op(Opcode::Terminate).build();
    let second = CodeBuilder::new().push_lit(&[0xBB]).op(Opcode::Terminate).build();
    assert!(library.add_script(1, ScriptDefinition::new(first)));
    assert!(!library.add_script(1, ScriptDefinition::new(second)));

    let mut specials = SpecialTable::new();
    let pid = library.start_script(1, &[]).unwrap();
    tick(&mut library, &mut specials);
    assert_eq!(top_byte(library.running_script(pid).unwrap()), 0xAA);
}

#[test]
fn test_duplicate_string_and_removal() {
    let mut library = Library::new();
    assert!(library.add_string(1, "alpha"));
    assert!(!library.add_string(1, "beta"));
    assert_eq!(library.string(1), Some("alpha"));

    assert!(library.add_named_script("a", ScriptDefinition::new(vec![Opcode::Terminate as u8])));
    assert!(library.remove_named_script("a"));
    assert!(!library.remove_named_script("a"));
    assert!(!library.remove_script(5));
}

#[test]
fn test_geometry_validation_at_start() {
    let mut library = Library::new();
    assert!(library.add_script(
        1,
        ScriptDefinition::new(vec![0u8; 32]).with_memory_size(16),
    ));
    assert!(matches!(
        library.start_script(1, &[]).unwrap_err(),
        LibraryError::CodeOutOfRange { .. }
    ));

    assert!(library.add_script(
        2,
        ScriptDefinition::new(vec![Opcode::Terminate as u8])
            .with_memory_size(64)
            .with_entry_point(100),
    ));
    assert!(matches!(
        library.start_script(2, &[]).unwrap_err(),
        LibraryError::EntryPointOutOfRange { .. }
    ));

    assert!(library.add_script(
        3,
        ScriptDefinition::new(vec![Opcode::Terminate as u8]).with_stack_size(2),
    ));
    assert_eq!(
        library.start_script(3, &[1, 2, 3, 4]).unwrap_err(),
        LibraryError::ArgumentOverflow(4)
    );

    // 失败的启动不留痕迹
    assert_eq!(library.running_count(), 0);
}

// ===== pid 分配与启动参数 =====

#[test]
fn test_pids_are_sequential_from_one() {
    let mut library = Library::new();
    assert!(library.add_script(1, ScriptDefinition::new(vec![Opcode::Terminate as u8])));
    assert_eq!(library.start_script(1, &[]).unwrap(), 1);
    assert_eq!(library.start_script(1, &[]).unwrap(), 2);
    assert_eq!(library.start_script(1, &[]).unwrap(), 3);
    assert_eq!(library.running_pids(), vec![1, 2, 3]);
}

#[test]
fn test_spawn_args_are_readable_via_pop() {
    // 参数按压栈顺序进入新实例的栈；Pop 写回内存应复原参数缓冲
    let code = CodeBuilder::new()
        .push_word(2) // amount
        .push_word(10) // pointer
        .op(Opcode::Pop)
        .op(Opcode::Terminate)
        .build();
    let mut library = Library::new();
    let mut specials = SpecialTable::new();
    assert!(library.add_script(1, ScriptDefinition::new(code)));
    let pid = library.start_script(1, &[0xAB, 0xCD]).unwrap();
    tick(&mut library, &mut specials);
    let script = library.running_script(pid).unwrap();
    assert_eq!(script.state(), ScriptState::Terminated);
    assert_eq!(script.read_memory(10, 2).unwrap(), &[0xAB, 0xCD]);
}

// ===== 延时 =====

#[test]
fn test_delay_three_ticks_wakes_on_third() {
    let code = CodeBuilder::new()
        .push_word(3)
        .op(Opcode::Delay)
        .push_lit(&[0x77]) // 醒来后的标记
        .op(Opcode::Terminate)
        .build();
    let (mut library, mut specials, pid) = start_one(code);

    tick(&mut library, &mut specials); // 执行 Delay
    assert_eq!(state_of(&library, pid), ScriptState::Delayed);
    assert_eq!(library.running_script(pid).unwrap().state_data(), 3);

    tick(&mut library, &mut specials); // 3 -> 2
    assert_eq!(state_of(&library, pid), ScriptState::Delayed);

    tick(&mut library, &mut specials); // 2 -> 1
    assert_eq!(state_of(&library, pid), ScriptState::Delayed);

    // 第三个后续 tick：计数归零，同一 tick 内继续执行直到终止
    tick(&mut library, &mut specials);
    let script = library.running_script(pid).unwrap();
    assert_eq!(script.state(), ScriptState::Terminated);
    assert_eq!(top_byte(script), 0x77);
}

#[test]
fn test_delay_zero_wakes_next_tick() {
    let code = CodeBuilder::new()
        .push_word(0)
        .op(Opcode::Delay)
        .op(Opcode::Terminate)
        .build();
    let (mut library, mut specials, pid) = start_one(code);
    tick(&mut library, &mut specials);
    assert_eq!(state_of(&library, pid), ScriptState::Delayed);
    tick(&mut library, &mut specials);
    assert_eq!(state_of(&library, pid), ScriptState::Terminated);
}

// ===== 跨脚本等待 =====

#[test]
fn test_swait_wakes_when_target_terminates() {
    // 目标（pid 1）延时两 tick 后终止；等待者（pid 2）SWait 目标
    let target_code = CodeBuilder::new()
        .push_word(2)
        .op(Opcode::Delay)
        .op(Opcode::Terminate)
        .build();
    // 等待者从启动参数里拿目标 pid
    let waiter_code = CodeBuilder::new()
        .op(Opcode::SWait)
        .push_lit(&[0x55])
        .op(Opcode::Terminate)
        .build();

    let mut library = Library::new();
    let mut specials = SpecialTable::new();
    assert!(library.add_script(1, ScriptDefinition::new(target_code)));
    assert!(library.add_script(2, ScriptDefinition::new(waiter_code)));
    let target = library.start_script(1, &[]).unwrap();
    let waiter = library.start_script(2, &target.to_le_bytes()).unwrap();

    tick(&mut library, &mut specials);
    assert_eq!(state_of(&library, target), ScriptState::Delayed);
    assert_eq!(state_of(&library, waiter), ScriptState::Delayed);

    // 目标还在延时：等待者不许被计数器唤醒
    tick(&mut library, &mut specials);
    assert_eq!(state_of(&library, waiter), ScriptState::Delayed);

    // 目标醒来并终止；唤醒发生在等待者槽位之前（同一 tick），等待者跑完
    tick(&mut library, &mut specials);
    assert_eq!(state_of(&library, target), ScriptState::Terminated);
    let script = library.running_script(waiter).unwrap();
    assert_eq!(script.state(), ScriptState::Terminated);
    assert_eq!(top_byte(script), 0x55);
}

#[test]
fn test_swait_waiter_woken_after_its_own_slot() {
    // 等待者 pid 1（槽位在前），目标 pid 2：唤醒发生在等待者槽位之后，
    // 等待者下个 tick 才继续执行
    let waiter_code = CodeBuilder::new()
        .op(Opcode::SWait)
        .push_lit(&[0x66])
        .op(Opcode::Terminate)
        .build();
    let target_code = CodeBuilder::new()
        .push_word(1)
        .op(Opcode::Delay)
        .op(Opcode::Terminate)
        .build();

    let mut library = Library::new();
    let mut specials = SpecialTable::new();
    assert!(library.add_script(1, ScriptDefinition::new(waiter_code)));
    assert!(library.add_script(2, ScriptDefinition::new(target_code)));
    // 目标将获得 pid 2，先启动等待者并把 2 作为参数
    let waiter = library.start_script(1, &2u32.to_le_bytes()).unwrap();
    let target = library.start_script(2, &[]).unwrap();
    assert_eq!(target, 2);

    tick(&mut library, &mut specials);
    assert_eq!(state_of(&library, waiter), ScriptState::Delayed);
    assert_eq!(state_of(&library, target), ScriptState::Delayed);

    // 目标在等待者槽位之后醒来并终止 → 等待者转回 Running，但本 tick 不再执行
    tick(&mut library, &mut specials);
    assert_eq!(state_of(&library, target), ScriptState::Terminated);
    assert_eq!(state_of(&library, waiter), ScriptState::Running);
    assert_eq!(library.running_script(waiter).unwrap().stack().len(), 0);

    tick(&mut library, &mut specials);
    let script = library.running_script(waiter).unwrap();
    assert_eq!(script.state(), ScriptState::Terminated);
    assert_eq!(top_byte(script), 0x66);
}

#[test]
fn test_swait_unknown_target_is_noop() {
    let code = CodeBuilder::new()
        .push_word(42) // 没有这个 pid
        .op(Opcode::SWait)
        .push_lit(&[0x11])
        .op(Opcode::Terminate)
        .build();
    let (mut library, mut specials, pid) = start_one(code);
    tick(&mut library, &mut specials);
    let script = library.running_script(pid).unwrap();
    assert_eq!(script.state(), ScriptState::Terminated);
    assert_eq!(top_byte(script), 0x11);
}

#[test]
fn test_swait_on_halted_unswept_target_is_noop() {
    // 目标同一 tick 内先终止；等待者随后 SWait 它必须不等待
    let target_code = CodeBuilder::new().op(Opcode::Terminate).build();
    let waiter_code = CodeBuilder::new()
        .op(Opcode::SWait)
        .op(Opcode::Terminate)
        .build();

    let mut library = Library::new();
    let mut specials = SpecialTable::new();
    assert!(library.add_script(1, ScriptDefinition::new(target_code)));
    assert!(library.add_script(2, ScriptDefinition::new(waiter_code)));
    let target = library.start_script(1, &[]).unwrap();
    let waiter = library.start_script(2, &target.to_le_bytes()).unwrap();

    tick(&mut library, &mut specials);
    assert_eq!(state_of(&library, target), ScriptState::Terminated);
    assert_eq!(state_of(&library, waiter), ScriptState::Terminated);
}

// ===== 回收与停止 =====

#[test]
fn test_halted_instance_swept_on_next_tick() {
    let code = CodeBuilder::new().op(Opcode::Terminate).build();
    let (mut library, mut specials, pid) = start_one(code);

    tick(&mut library, &mut specials);
    // 终止的 tick 内仍可查询
    assert_eq!(state_of(&library, pid), ScriptState::Terminated);

    tick(&mut library, &mut specials);
    assert!(library.running_script(pid).is_none());
    assert_eq!(library.running_count(), 0);
}

#[test]
fn test_stop_all_clears_running_set_keeps_registry() {
    let code = CodeBuilder::new()
        .push_word(100)
        .op(Opcode::Delay)
        .op(Opcode::Terminate)
        .build();
    let (mut library, mut specials, _pid) = start_one(code);
    library.start_script(1, &[]).unwrap();
    tick(&mut library, &mut specials);
    assert_eq!(library.running_count(), 2);

    library.stop_all();
    assert_eq!(library.running_count(), 0);

    // 注册表原封不动，pid 序列继续
    let pid = library.start_script(1, &[]).unwrap();
    assert_eq!(pid, 3);
}

// ===== 子脚本孵化 =====

#[test]
fn test_call_script_spawns_next_tick() {
    let child = CodeBuilder::new().push_lit(&[0x01]).op(Opcode::Terminate).build();
    let parent = CodeBuilder::new()
        .push_word(0) // amount
        .push_word(2) // 子脚本 id（栈顶，先弹）
        .op(Opcode::CallScript)
        .op(Opcode::Terminate)
        .build();

    let mut library = Library::new();
    let mut specials = SpecialTable::new();
    assert!(library.add_script(1, ScriptDefinition::new(parent)));
    assert!(library.add_script(2, ScriptDefinition::new(child)));
    let parent_pid = library.start_script(1, &[]).unwrap();

    tick(&mut library, &mut specials);
    assert_eq!(state_of(&library, parent_pid), ScriptState::Terminated);
    // 子实例已注册但本 tick 未被调度
    let child_pid = 2;
    assert_eq!(state_of(&library, child_pid), ScriptState::Initialized);

    tick(&mut library, &mut specials);
    assert_eq!(state_of(&library, child_pid), ScriptState::Terminated);
}

#[test]
fn test_call_script_unknown_id_is_invalid() {
    let code = CodeBuilder::new()
        .push_word(0)
        .push_word(9)
        .op(Opcode::CallScript)
        .op(Opcode::Terminate)
        .build();
    let (mut library, mut specials, pid) = start_one(code);
    tick(&mut library, &mut specials);
    assert_eq!(state_of(&library, pid), ScriptState::Invalid);
}

#[test]
fn test_call_named_script_via_string_table() {
    let child = CodeBuilder::new().op(Opcode::Terminate).build();
    let parent = CodeBuilder::new()
        .push_word(0) // amount
        .push_word(3) // 字符串 id（栈顶，先弹）
        .op(Opcode::CallNamedScript)
        .op(Opcode::Terminate)
        .build();

    let mut library = Library::new();
    let mut specials = SpecialTable::new();
    assert!(library.add_script(1, ScriptDefinition::new(parent)));
    assert!(library.add_named_script("child", ScriptDefinition::new(child)));
    assert!(library.add_string(3, "child"));
    let parent_pid = library.start_script(1, &[]).unwrap();

    tick(&mut library, &mut specials);
    assert_eq!(state_of(&library, parent_pid), ScriptState::Terminated);
    assert_eq!(library.running_count(), 2);
}

#[test]
fn test_call_named_script_unknown_string_is_invalid() {
    let code = CodeBuilder::new()
        .push_word(0)
        .push_word(3) // 字符串表为空
        .op(Opcode::CallNamedScript)
        .op(Opcode::Terminate)
        .build();
    let (mut library, mut specials, pid) = start_one(code);
    tick(&mut library, &mut specials);
    assert_eq!(state_of(&library, pid), ScriptState::Invalid);
}

// ===== 原生函数 =====

#[test]
fn test_call_special_receives_args_and_instance() {
    let recorded: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = recorded.clone();

    let code = CodeBuilder::new()
        .push_lit(&[1, 2, 3]) // 参数
        .push_word(3) // amount
        .push_word(7) // 原生函数 id（栈顶，先弹）
        .op(Opcode::CallSpecial)
        .op(Opcode::Terminate)
        .build();
    let (mut library, mut specials, pid) = start_one(code);
    assert!(specials.register(7, move |script, args| {
        sink.borrow_mut().extend_from_slice(args);
        script.write_word(20, 99).unwrap();
    }));

    tick(&mut library, &mut specials);
    let script = library.running_script(pid).unwrap();
    assert_eq!(script.state(), ScriptState::Terminated);
    // 参数按压栈顺序交付
    assert_eq!(*recorded.borrow(), vec![1, 2, 3]);
    // 原生函数可以写调用者内存
    assert_eq!(script.read_word(20).unwrap(), 99);
}

#[test]
fn test_call_special_unknown_id_is_invalid() {
    let code = CodeBuilder::new()
        .push_word(0)
        .push_word(7)
        .op(Opcode::CallSpecial)
        .op(Opcode::Terminate)
        .build();
    let (mut library, mut specials, pid) = start_one(code);
    tick(&mut library, &mut specials);
    assert_eq!(state_of(&library, pid), ScriptState::Invalid);
}

#[test]
fn test_special_table_duplicate_registration() {
    let mut specials = SpecialTable::new();
    assert!(specials.register(1, |_, _| {}));
    assert!(!specials.register(1, |_, _| {}));
    assert!(specials.contains(1));
    assert!(specials.remove(1));
    assert!(!specials.remove(1));
    assert!(specials.is_empty());
}

// ===== 宿主 =====

#[test]
fn test_host_ticks_all_libraries_in_order() {
    let mut host = Host::new();
    assert!(host.register_special(1, |script, _| {
        script.write_word(0x40, 0xBEEF).unwrap();
    }));

    let code = CodeBuilder::new()
        .push_word(0) // amount
        .push_word(1) // special id
        .op(Opcode::CallSpecial)
        .op(Opcode::Terminate)
        .build();

    let mut pids = Vec::new();
    for _ in 0..2 {
        let mut library = Library::new();
        assert!(library.add_script(1, ScriptDefinition::new(code.clone())));
        let pid = library.start_script(1, &[]).unwrap();
        pids.push(pid);
        host.add_library(library);
    }

    host.run(false);

    for (index, pid) in pids.iter().enumerate() {
        let script = host.library(index).unwrap().running_script(*pid).unwrap();
        assert_eq!(script.state(), ScriptState::Terminated);
        assert_eq!(script.read_word(0x40).unwrap(), 0xBEEF);
    }
}

#[test]
fn test_host_reset_stops_everything() {
    let mut host = Host::new();
    let code = CodeBuilder::new()
        .push_word(1000)
        .op(Opcode::Delay)
        .op(Opcode::Terminate)
        .build();
    let mut library = Library::new();
    assert!(library.add_script(1, ScriptDefinition::new(code)));
    library.start_script(1, &[]).unwrap();
    let index = host.add_library(library);

    host.run(false);
    assert_eq!(host.library(index).unwrap().running_count(), 1);

    host.reset();
    assert_eq!(host.library(index).unwrap().running_count(), 0);
}

// ===== 单步调度 =====

#[test]
fn test_single_step_executes_one_opcode_per_tick() {
    let code = CodeBuilder::new()
        .push_lit(&[0x01])
        .push_lit(&[0x02])
        .op(Opcode::Terminate)
        .build();
    let (mut library, mut specials, pid) = start_one(code);

    library.run(&mut specials, true);
    assert_eq!(library.running_script(pid).unwrap().stack().len(), 1);

    library.run(&mut specials, true);
    assert_eq!(library.running_script(pid).unwrap().stack().len(), 2);

    library.run(&mut specials, true);
    assert_eq!(state_of(&library, pid), ScriptState::Terminated);
}
