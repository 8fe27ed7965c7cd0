use kernel_info::memory;
use std::{env, path::PathBuf};

fn main() {
    // Point to the linker script
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let ld = manifest_dir.join("kernel.ld");

    // Sanity checks (fail fast during build)
    let kernel_base = memory::KERNEL_BASE;
    assert_eq!(
        kernel_base & ((1u64 << 21) - 1),
        0,
        "KERNEL_BASE must be 2 MiB aligned (got {kernel_base:#x})"
    );

    // Rebuild when inputs change
    println!("cargo:rerun-if-changed={}", ld.display());

    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("none") {
        return;
    }

    // Linker script
    println!("cargo:rustc-link-arg-bins=-T{}", ld.display());
    println!("cargo:rustc-link-arg-bins=--no-pie");

    // Provide symbols to the linker script
    println!("cargo:rustc-link-arg-bins=--defsym=KERNEL_BASE={kernel_base:#x}");
}
