//! Minimal per-CPU control block: GS-based fast access to CPU id and
//! preemption/interrupt bookkeeping.
//!
//! The full SlopOS PCR also embeds the GDT/TSS used by `SYSCALL` entry and
//! context switch; that machinery belongs to the boot/scheduler subsystems
//! and is not needed here. This module keeps only the fields that
//! [`crate::preempt`], [`crate::cpu_local`], and [`crate::percpu`] read on
//! every CPU: `self_ref` (for the GS fast path), `cpu_id`, and
//! `preempt_count`/`in_interrupt`.

use core::ptr;
use core::sync::atomic::{AtomicBool, AtomicPtr, AtomicU32, Ordering};

use super::percpu::MAX_CPUS as PCR_MAX_CPUS;

/// Per-CPU control block, accessed via `GS_BASE`.
#[repr(C, align(64))]
pub struct ProcessorControlRegion {
    /// Self-reference pointer for GS-based PCR access.
    /// Assembly: `mov rax, gs:[0]` to get PCR pointer.
    pub self_ref: *mut ProcessorControlRegion, // offset 0

    /// CPU index (0..n-1), NOT the hardware APIC ID.
    /// Assembly: `mov eax, gs:[8]` for fast current_cpu_id().
    pub cpu_id: u32, // offset 8

    /// Hardware Local APIC ID.
    pub apic_id: u32, // offset 12

    /// Preemption disable nesting counter. >0 means preemption is disabled.
    pub preempt_count: AtomicU32, // offset 16

    /// Currently executing in interrupt/exception context.
    pub in_interrupt: AtomicBool, // offset 20

    _pad: [u8; 3],

    /// Pointer to currently running task (opaque; unused by this crate).
    pub current_task: AtomicPtr<()>,

    /// CPU is online and accepting scheduled work.
    pub online: AtomicBool,

    _pad2: [u8; 7],

    /// Set by a timer/IPI handler while preemption was disabled; consumed by
    /// [`PreemptGuard`](crate::preempt::PreemptGuard)'s drop once the nesting
    /// count reaches zero.
    pub reschedule_pending: AtomicU32,
}

const _: () = {
    assert!(core::mem::offset_of!(ProcessorControlRegion, self_ref) == 0);
    assert!(core::mem::offset_of!(ProcessorControlRegion, cpu_id) == 8);
};

impl ProcessorControlRegion {
    pub const fn new() -> Self {
        Self {
            self_ref: ptr::null_mut(),
            cpu_id: 0,
            apic_id: 0,
            preempt_count: AtomicU32::new(0),
            in_interrupt: AtomicBool::new(false),
            _pad: [0; 3],
            current_task: AtomicPtr::new(ptr::null_mut()),
            online: AtomicBool::new(false),
            _pad2: [0; 7],
            reschedule_pending: AtomicU32::new(0),
        }
    }
}

// SAFETY: PCR uses atomics for all mutable fields and is only
// accessed by the owning CPU (except during initialization).
unsafe impl Send for ProcessorControlRegion {}
unsafe impl Sync for ProcessorControlRegion {}

use crate::InitFlag;

/// BSP's PCR (statically allocated).
static mut BSP_PCR: ProcessorControlRegion = ProcessorControlRegion::new();

/// Array of pointers to all PCRs (BSP + APs). Index 0 = BSP, Index 1+ = APs.
static mut ALL_PCRS: [*mut ProcessorControlRegion; PCR_MAX_CPUS] = [ptr::null_mut(); PCR_MAX_CPUS];

static PCR_COUNT: AtomicU32 = AtomicU32::new(0);

static PCR_INIT: InitFlag = InitFlag::new();
static GS_BASE_SET: InitFlag = InitFlag::new();

/// IA32_GS_BASE MSR address (not exposed by any workspace crate we keep).
const IA32_GS_BASE: u32 = 0xC000_0101;

/// Initialize the BSP's PCR (data structures only, GS_BASE not yet set).
///
/// # Safety
/// Must be called exactly once during early BSP boot. Must call
/// [`install_gs_base`] before using [`current_cpu_id`].
pub unsafe fn init_bsp_pcr(apic_id: u32) {
    if !PCR_INIT.init_once() {
        return;
    }

    let pcr = &raw mut BSP_PCR;
    unsafe {
        (*pcr).self_ref = pcr;
        (*pcr).cpu_id = 0;
        (*pcr).apic_id = apic_id;
    }
    unsafe {
        ALL_PCRS[0] = pcr;
    }
    PCR_COUNT.store(1, Ordering::Release);
}

/// # Safety
/// `pcr` must point at a PCR that outlives the current CPU's lifetime and
/// must not already be installed elsewhere.
pub unsafe fn install_gs_base(pcr: *mut ProcessorControlRegion) {
    let addr = pcr as u64;
    let low = addr as u32;
    let high = (addr >> 32) as u32;
    unsafe {
        core::arch::asm!(
            "wrmsr",
            in("ecx") IA32_GS_BASE,
            in("eax") low,
            in("edx") high,
            options(nostack, preserves_flags)
        );
    }
    GS_BASE_SET.init_once();
}

/// Allocate and initialize a PCR for an AP.
///
/// # Safety
/// Must be called exactly once per AP during AP boot.
pub unsafe fn init_ap_pcr(cpu_id: usize, apic_id: u32) -> *mut ProcessorControlRegion {
    if cpu_id == 0 || cpu_id >= PCR_MAX_CPUS {
        panic!("init_ap_pcr: invalid cpu_id {}", cpu_id);
    }

    const MAX_APS: usize = 16;
    static mut AP_PCRS: [ProcessorControlRegion; MAX_APS] = {
        const INIT: ProcessorControlRegion = ProcessorControlRegion::new();
        [INIT; MAX_APS]
    };

    if cpu_id > MAX_APS {
        panic!("init_ap_pcr: too many APs (max {})", MAX_APS);
    }

    let pcr = unsafe { &raw mut AP_PCRS[cpu_id - 1] };
    unsafe {
        (*pcr).self_ref = pcr;
        (*pcr).cpu_id = cpu_id as u32;
        (*pcr).apic_id = apic_id;
        ALL_PCRS[cpu_id] = pcr;
    }

    let current_count = PCR_COUNT.load(Ordering::Acquire);
    if cpu_id as u32 >= current_count {
        PCR_COUNT.store(cpu_id as u32 + 1, Ordering::Release);
    }

    pcr
}

/// Get the current CPU's PCR via GS segment (FAST PATH).
///
/// # Safety
/// GS_BASE must be set to point to a valid PCR (done during CPU init).
#[inline(always)]
pub unsafe fn current_pcr() -> &'static ProcessorControlRegion {
    let ptr: *mut ProcessorControlRegion;
    unsafe {
        core::arch::asm!(
            "mov {}, gs:[0]",
            out(reg) ptr,
            options(nostack, preserves_flags, readonly)
        );
        &*ptr
    }
}

#[inline(always)]
pub fn current_cpu_id() -> usize {
    if !GS_BASE_SET.is_set() {
        return 0;
    }
    unsafe {
        let id: u32;
        core::arch::asm!(
            "mov {:e}, gs:[8]",
            out(reg) id,
            options(nostack, preserves_flags, readonly)
        );
        id as usize
    }
}

pub fn get_pcr(cpu_id: usize) -> Option<&'static ProcessorControlRegion> {
    if cpu_id >= PCR_MAX_CPUS {
        return None;
    }
    unsafe {
        let ptr = ALL_PCRS[cpu_id];
        if ptr.is_null() { None } else { Some(&*ptr) }
    }
}

#[inline]
pub fn get_pcr_count() -> usize {
    PCR_COUNT.load(Ordering::Acquire) as usize
}

#[inline]
pub fn is_pcr_initialized() -> bool {
    PCR_INIT.is_set()
}
