use std::{env, path::PathBuf};

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let ld = manifest_dir.join("linker.ld");
    println!("cargo:rerun-if-changed={}", ld.display());

    // Host builds (clippy, docs) have no use for the user-space layout.
    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("none") {
        return;
    }
    println!("cargo:rustc-link-arg-bins=-T{}", ld.display());
    // The loader only accepts ET_EXEC images.
    println!("cargo:rustc-link-arg-bins=--no-pie");
}
