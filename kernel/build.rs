use std::{env, path::PathBuf};

fn main() {
    let target = env::var("TARGET").expect("TARGET not set");
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set");
    let kernel_dir = PathBuf::from(manifest_dir);

    // The bare-metal image is linked with a custom script that places the
    // multiboot header first and loads the kernel at physical 4 MiB. Host
    // builds (unit tests) and non-kernel targets skip it.
    if target.starts_with("i686") || target == "i386-trios" {
        let linker_script = kernel_dir.join("src/arch/x86/link.ld");
        println!("cargo:rustc-link-arg=-T{}", linker_script.display());
        println!("cargo:rerun-if-changed={}", linker_script.display());
    }
}
