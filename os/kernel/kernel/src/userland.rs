use crate::gdt::{USER_CS, USER_DS};
use kernel_registers::Rflags;
use kernel_syscall::LoadedImage;
use log::debug;

/// Drop to ring 3 at `image.entry` with `rsp = image.stack_top`.
///
/// Builds the five-word interrupt frame `iretq` expects. The kernel stack
/// the caller was on is abandoned; the next trap starts again at `rsp0`.
///
/// # Safety
/// The entry point and the stack must be mapped user-accessible in the
/// active address space, and no kernel lock may be held.
pub unsafe fn enter_user_mode(image: LoadedImage) -> ! {
    let rip = image.entry.as_u64();
    let rsp = image.stack_top.as_u64();
    let cs = u64::from(USER_CS);
    let ss = u64::from(USER_DS);
    let rflags = Rflags::user_entry().into_bits();

    debug!("entering user mode at {} with rsp {}", image.entry, image.stack_top);

    unsafe {
        core::arch::asm!(
            "mov ds, {ds:x}",
            "mov es, {ds:x}",
            "push {ss}",
            "push {rsp}",
            "push {rflags}",
            "push {cs}",
            "push {rip}",
            "iretq",
            ds = in(reg) USER_DS,
            ss = in(reg) ss,
            rsp = in(reg) rsp,
            rflags = in(reg) rflags,
            cs = in(reg) cs,
            rip = in(reg) rip,
            options(noreturn)
        )
    }
}
