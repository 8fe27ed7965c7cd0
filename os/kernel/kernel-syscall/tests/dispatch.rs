//! System calls driven against simulated RAM and scripted keyboard input.

#![allow(unsafe_code)]

use std::collections::VecDeque;

use kernel_info::boot::BootModule;
use kernel_info::memory::MMAP_BASE;
use kernel_loader::test_image::{ImageBuilder, PF_R, PF_X};
use kernel_syscall::user::{self, UserAccess};
use kernel_syscall::{
    Fatal, LoadError, LoadedImage, SyscallArgs, SyscallDispatcher, SyscallEnv, SyscallError, Sysno,
    TrapOutcome,
};
use kernel_vmem::testing::{RecordingTlb, SimRam, VecFrameAlloc};
use kernel_vmem::{
    AddressSpace, FrameAlloc, PAGE_SIZE, PageAccess, PageTable, PhysMapper, PhysicalAddress, VirtualAddress,
    VmemError,
};
use stdlib::syscall_abi::{MAP_ANONYMOUS, MAP_PRIVATE, PROT_EXEC, PROT_READ, PROT_WRITE};

const BUF: u64 = 0x40_0000;

struct FakeEnv {
    ram: SimRam,
    alloc: VecFrameAlloc,
    root: PhysicalAddress,
    tlb: RecordingTlb,
    input: VecDeque<u8>,
    console: Vec<u8>,
    programs: Vec<&'static str>,
    execs: Vec<String>,
    exec_exhausts: bool,
    /// When set, `exec` runs the real loader over this `init` image.
    init_image: Option<Vec<u8>>,
}

impl FakeEnv {
    fn new() -> Self {
        let ram = SimRam::with_frames(256);
        let mut alloc = VecFrameAlloc::covering(&ram);
        let root = alloc.alloc_4k().expect("root");
        unsafe { ram.phys_to_mut::<PageTable>(root) }.zero();
        let mut env = Self {
            ram,
            alloc,
            root,
            tlb: RecordingTlb::default(),
            input: VecDeque::new(),
            console: Vec::new(),
            programs: vec!["init", "program"],
            execs: Vec::new(),
            exec_exhausts: false,
            init_image: None,
        };
        env.map_user_page(VirtualAddress::new(BUF), PageAccess::USER_RW)
            .expect("user buffer");
        env
    }

    fn aspace(&self) -> AddressSpace<'_, SimRam, &RecordingTlb> {
        AddressSpace::new(&self.ram, self.root, &self.tlb)
    }

    fn type_keys(&mut self, keys: &[u8]) {
        self.input.extend(keys);
    }

    fn poke(&mut self, va: u64, bytes: &[u8]) {
        self.aspace()
            .write_bytes(VirtualAddress::new(va), bytes)
            .expect("poke");
    }

    fn peek(&self, va: u64, len: usize) -> Vec<u8> {
        let mut buf = vec![0; len];
        self.aspace()
            .read_bytes(VirtualAddress::new(va), &mut buf)
            .expect("peek");
        buf
    }
}

impl SyscallEnv for FakeEnv {
    fn console_write(&mut self, bytes: &[u8]) {
        self.console.extend_from_slice(bytes);
    }

    fn getc(&mut self) -> u8 {
        self.input.pop_front().expect("read would block forever")
    }

    fn check_user(&self, va: VirtualAddress, len: usize, access: UserAccess) -> Result<(), SyscallError> {
        user::check_range(&self.aspace(), va, len, access)
    }

    fn copy_from_user(&self, va: VirtualAddress, buf: &mut [u8]) -> Result<(), SyscallError> {
        user::copy_from_user(&self.aspace(), va, buf)
    }

    fn copy_to_user(&mut self, va: VirtualAddress, bytes: &[u8]) -> Result<(), SyscallError> {
        user::copy_to_user(&self.aspace(), va, bytes)
    }

    fn map_user_page(&mut self, va: VirtualAddress, access: PageAccess) -> Result<(), VmemError> {
        let aspace = AddressSpace::new(&self.ram, self.root, &self.tlb);
        aspace.map(&mut self.alloc, va, access).map(|_| ())
    }

    fn exec(&mut self, name: &str) -> Result<LoadedImage, LoadError> {
        self.execs.push(name.to_owned());
        if let Some(image) = &self.init_image {
            let aspace = AddressSpace::new(&self.ram, self.root, &self.tlb);
            let modules = [BootModule { name: "init", image }];
            return kernel_loader::load(&aspace, &mut self.alloc, modules, name);
        }
        if !self.programs.contains(&name) {
            return Err(LoadError::ModuleNotFound);
        }
        if self.exec_exhausts {
            return Err(LoadError::AllocationFailed(VmemError::AllocationExhausted));
        }
        Ok(LoadedImage {
            entry: VirtualAddress::new(0x40_1000),
            stack_top: VirtualAddress::new(0x0700_0000_7ff8),
        })
    }
}

fn call(nr: Sysno, args: [u64; 6]) -> SyscallArgs {
    SyscallArgs::new(nr as u64, args)
}

fn resume(outcome: TrapOutcome) -> i64 {
    match outcome {
        TrapOutcome::Resume(v) => v,
        other => panic!("expected Resume, got {other:?}"),
    }
}

#[test]
fn read_collects_exactly_count_characters() {
    let mut env = FakeEnv::new();
    let mut sys = SyscallDispatcher::new();
    env.type_keys(b"abcdef");

    let n = resume(sys.dispatch(&mut env, call(Sysno::Read, [0, BUF, 4, 0, 0, 0])));
    assert_eq!(n, 4);
    assert_eq!(env.peek(BUF, 4), b"abcd");
    assert_eq!(env.input, [b'e', b'f']);
    assert_eq!(env.console, b"abcd");
}

#[test]
fn read_honours_backspace() {
    let mut env = FakeEnv::new();
    let mut sys = SyscallDispatcher::new();
    env.type_keys(b"\x08\x08ab\x08cd");

    let n = resume(sys.dispatch(&mut env, call(Sysno::Read, [0, BUF, 3, 0, 0, 0])));
    assert_eq!(n, 3);
    assert_eq!(env.peek(BUF, 3), b"acd");
    assert_eq!(env.console, b"ab\x08 \x08cd");
}

#[test]
fn read_from_other_descriptor_fails_without_consuming_input() {
    let mut env = FakeEnv::new();
    let mut sys = SyscallDispatcher::new();
    env.type_keys(b"xyz");

    assert_eq!(resume(sys.dispatch(&mut env, call(Sysno::Read, [5, BUF, 3, 0, 0, 0]))), -1);
    assert_eq!(env.input.len(), 3);
    assert!(env.console.is_empty());
}

#[test]
fn read_into_unmapped_buffer_fails_without_consuming_input() {
    let mut env = FakeEnv::new();
    let mut sys = SyscallDispatcher::new();
    env.type_keys(b"xyz");

    let past = BUF + PAGE_SIZE - 1;
    assert_eq!(resume(sys.dispatch(&mut env, call(Sysno::Read, [0, past, 2, 0, 0, 0]))), -1);
    let kernel = 0xffff_ffff_8000_0000;
    assert_eq!(resume(sys.dispatch(&mut env, call(Sysno::Read, [0, kernel, 1, 0, 0, 0]))), -1);
    assert_eq!(env.input.len(), 3);
}

#[test]
fn write_goes_to_console_for_stdout_and_stderr() {
    let mut env = FakeEnv::new();
    let mut sys = SyscallDispatcher::new();
    env.poke(BUF, b"hello\n");

    assert_eq!(resume(sys.dispatch(&mut env, call(Sysno::Write, [1, BUF, 6, 0, 0, 0]))), 6);
    assert_eq!(resume(sys.dispatch(&mut env, call(Sysno::Write, [2, BUF, 5, 0, 0, 0]))), 5);
    assert_eq!(env.console, b"hello\nhello");
}

#[test]
fn write_rejects_bad_descriptor_and_buffer() {
    let mut env = FakeEnv::new();
    let mut sys = SyscallDispatcher::new();

    assert_eq!(resume(sys.dispatch(&mut env, call(Sysno::Write, [0, BUF, 1, 0, 0, 0]))), -1);
    assert_eq!(resume(sys.dispatch(&mut env, call(Sysno::Write, [3, BUF, 1, 0, 0, 0]))), -1);
    assert_eq!(
        resume(sys.dispatch(&mut env, call(Sysno::Write, [1, 0x7000_0000, 1, 0, 0, 0]))),
        -1
    );
    assert!(env.console.is_empty());
}

#[test]
fn write_larger_than_one_chunk() {
    let mut env = FakeEnv::new();
    let mut sys = SyscallDispatcher::new();
    let data: Vec<u8> = (0..1000u32).map(|i| b'a' + (i % 26) as u8).collect();
    env.poke(BUF, &data);

    assert_eq!(resume(sys.dispatch(&mut env, call(Sysno::Write, [1, BUF, 1000, 0, 0, 0]))), 1000);
    assert_eq!(env.console, data);
}

#[test]
fn anonymous_mmaps_never_overlap() {
    let mut env = FakeEnv::new();
    let mut sys = SyscallDispatcher::new();
    let args = [0, 0x7001, PROT_READ | PROT_WRITE, MAP_ANONYMOUS | MAP_PRIVATE, u64::MAX, 0];

    let a = resume(sys.dispatch(&mut env, call(Sysno::Mmap, args)));
    let b = resume(sys.dispatch(&mut env, call(Sysno::Mmap, args)));
    assert_eq!(a, MMAP_BASE as i64);
    assert!(b - a >= 0x8000);

    let aspace = env.aspace();
    for page in 0..8 {
        let leaf = aspace
            .translate(VirtualAddress::new(a as u64 + page * PAGE_SIZE))
            .leaf()
            .expect("mapped");
        assert!(leaf.user && leaf.writable && leaf.no_execute);
    }
}

#[test]
fn mmap_honours_prot_bits() {
    let mut env = FakeEnv::new();
    let mut sys = SyscallDispatcher::new();

    let a = resume(sys.dispatch(
        &mut env,
        call(Sysno::Mmap, [0, 1, PROT_READ | PROT_EXEC, MAP_ANONYMOUS, 0, 0]),
    ));
    let leaf = env
        .aspace()
        .translate(VirtualAddress::new(a as u64))
        .leaf()
        .expect("mapped");
    assert!(leaf.user && !leaf.writable && !leaf.no_execute);
}

#[test]
fn mmap_zero_length_is_invalid() {
    let mut env = FakeEnv::new();
    let mut sys = SyscallDispatcher::new();

    assert_eq!(resume(sys.dispatch(&mut env, call(Sysno::Mmap, [0, 0, PROT_READ, 0, 0, 0]))), -1);
    assert_eq!(sys.mmap_watermark(), VirtualAddress::new(MMAP_BASE));
}

#[test]
fn mmap_at_fixed_address() {
    let mut env = FakeEnv::new();
    let mut sys = SyscallDispatcher::new();
    let at = 0x60_0000;

    assert_eq!(
        resume(sys.dispatch(&mut env, call(Sysno::Mmap, [at, 0x2000, PROT_WRITE, 0, 0, 0]))),
        at as i64
    );
    assert!(env.aspace().translate(VirtualAddress::new(at + 0x1000)).is_mapped());
    assert_eq!(sys.mmap_watermark(), VirtualAddress::new(MMAP_BASE));

    // Already mapped, unaligned, or reaching into the kernel half.
    assert_eq!(resume(sys.dispatch(&mut env, call(Sysno::Mmap, [at, 1, PROT_WRITE, 0, 0, 0]))), -1);
    assert_eq!(resume(sys.dispatch(&mut env, call(Sysno::Mmap, [at + 1, 1, 0, 0, 0, 0]))), -1);
    assert_eq!(
        resume(sys.dispatch(&mut env, call(Sysno::Mmap, [0x7fff_ffff_f000, 0x2000, 0, 0, 0, 0]))),
        -1
    );
}

#[test]
fn mmap_near_the_top_of_the_address_space_fails() {
    let mut env = FakeEnv::new();
    let mut sys = SyscallDispatcher::new();

    let args = [0xffff_ffff_ffff_f000, 0x2000, PROT_READ | PROT_WRITE, 0, 0, 0];
    assert_eq!(resume(sys.dispatch(&mut env, call(Sysno::Mmap, args))), -1);
    assert_eq!(sys.mmap_watermark(), VirtualAddress::new(MMAP_BASE));
}

#[test]
fn huge_anonymous_mmaps_fail_without_moving_the_watermark() {
    let mut env = FakeEnv::new();
    let mut sys = SyscallDispatcher::new();

    let args = [0, 1 << 47, PROT_READ | PROT_WRITE, MAP_ANONYMOUS, 0, 0];
    for _ in 0..300 {
        assert_eq!(resume(sys.dispatch(&mut env, call(Sysno::Mmap, args))), -1);
    }
    assert_eq!(sys.mmap_watermark(), VirtualAddress::new(MMAP_BASE));

    let small = [0, 0x1000, PROT_READ | PROT_WRITE, MAP_ANONYMOUS, 0, 0];
    assert_eq!(resume(sys.dispatch(&mut env, call(Sysno::Mmap, small))), MMAP_BASE as i64);
}

#[test]
fn failed_anonymous_mmap_still_advances_watermark() {
    let mut env = FakeEnv::new();
    let mut sys = SyscallDispatcher::new();
    env.map_user_page(VirtualAddress::new(MMAP_BASE + 0x1000), PageAccess::USER_RW)
        .expect("squatter");

    let args = [0, 0x2000, PROT_READ | PROT_WRITE, MAP_ANONYMOUS, 0, 0];
    assert_eq!(resume(sys.dispatch(&mut env, call(Sysno::Mmap, args))), -1);
    assert_eq!(sys.mmap_watermark(), VirtualAddress::new(MMAP_BASE + 0x2000));

    let next = resume(sys.dispatch(&mut env, call(Sysno::Mmap, args)));
    assert_eq!(next, (MMAP_BASE + 0x2000) as i64);
}

#[test]
fn exec_reads_name_from_user_memory() {
    let mut env = FakeEnv::new();
    let mut sys = SyscallDispatcher::new();
    env.poke(BUF, b"program\0junk");

    match sys.dispatch(&mut env, call(Sysno::Exec, [BUF, 0, 0, 0, 0, 0])) {
        TrapOutcome::EnterUser(image) => assert_eq!(image.entry, VirtualAddress::new(0x40_1000)),
        other => panic!("expected EnterUser, got {other:?}"),
    }
    assert_eq!(env.execs, ["program"]);
}

#[test]
fn exec_of_missing_module_returns_minus_one() {
    let mut env = FakeEnv::new();
    let mut sys = SyscallDispatcher::new();
    env.poke(BUF, b"nosuch\0");

    assert_eq!(resume(sys.dispatch(&mut env, call(Sysno::Exec, [BUF, 0, 0, 0, 0, 0]))), -1);
    assert_eq!(env.execs, ["nosuch"]);
}

#[test]
fn exec_name_must_terminate() {
    let mut env = FakeEnv::new();
    let mut sys = SyscallDispatcher::new();
    env.poke(BUF, &[b'a'; 200]);

    assert_eq!(resume(sys.dispatch(&mut env, call(Sysno::Exec, [BUF, 0, 0, 0, 0, 0]))), -1);
    assert_eq!(resume(sys.dispatch(&mut env, call(Sysno::Exec, [0, 0, 0, 0, 0, 0]))), -1);
    assert!(env.execs.is_empty());
}

#[test]
fn exit_is_exec_init() {
    let mut env = FakeEnv::new();
    let mut sys = SyscallDispatcher::new();
    env.poke(BUF, b"init\0");

    let via_exit = sys.dispatch(&mut env, call(Sysno::Exit, [42, 0, 0, 0, 0, 0]));
    let via_exec = sys.dispatch(&mut env, call(Sysno::Exec, [BUF, 0, 0, 0, 0, 0]));
    assert!(matches!(via_exit, TrapOutcome::EnterUser(_)));
    assert_eq!(via_exit, via_exec);
    assert_eq!(env.execs, ["init", "init"]);
}

#[test]
fn exit_and_exec_init_load_the_same_program() {
    let code: Vec<u8> = (1..=16).collect();
    let mut env = FakeEnv::new();
    let mut sys = SyscallDispatcher::new();
    env.init_image = Some(
        ImageBuilder::new(0x40_1000)
            .segment(0x40_1000, &code, 0x1000, PF_R | PF_X)
            .build(),
    );
    env.poke(BUF, b"init\0");

    let via_exec = sys.dispatch(&mut env, call(Sysno::Exec, [BUF, 0, 0, 0, 0, 0]));
    let TrapOutcome::EnterUser(first) = via_exec else {
        panic!("expected EnterUser, got {via_exec:?}");
    };
    assert_eq!(first.entry, VirtualAddress::new(0x40_1000));
    assert_eq!(env.peek(0x40_1000, 16), code);

    let via_exit = sys.dispatch(&mut env, call(Sysno::Exit, [7, 0, 0, 0, 0, 0]));
    assert_eq!(via_exit, TrapOutcome::EnterUser(first));
    assert_eq!(env.peek(0x40_1000, 16), code);
    assert_eq!(env.execs, ["init", "init"]);
}

#[test]
fn exit_without_init_returns_minus_one() {
    let mut env = FakeEnv::new();
    let mut sys = SyscallDispatcher::new();
    env.programs.clear();

    assert_eq!(resume(sys.dispatch(&mut env, call(Sysno::Exit, [0, 0, 0, 0, 0, 0]))), -1);
}

#[test]
fn exec_that_loses_the_address_space_halts() {
    let mut env = FakeEnv::new();
    let mut sys = SyscallDispatcher::new();
    env.exec_exhausts = true;

    assert_eq!(
        sys.dispatch(&mut env, call(Sysno::Exit, [0, 0, 0, 0, 0, 0])),
        TrapOutcome::Halt(Fatal::ExecAborted(LoadError::AllocationFailed(
            VmemError::AllocationExhausted
        )))
    );
}

#[test]
fn unknown_call_numbers_return_minus_one() {
    let mut env = FakeEnv::new();
    let mut sys = SyscallDispatcher::new();

    for nr in [5, 60, 0x80, u64::MAX] {
        assert_eq!(resume(sys.dispatch(&mut env, SyscallArgs::new(nr, [0; 6]))), -1);
    }
}

#[test]
fn faults_always_halt() {
    let fault = kernel_syscall::Fault {
        vector: 13,
        error_code: Some(0),
        rip: 0x40_1000,
        cr2: None,
    };
    assert_eq!(SyscallDispatcher::fault(fault), TrapOutcome::Halt(Fatal::Fault(fault)));
}
