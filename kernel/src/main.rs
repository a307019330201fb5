//! TriOS kernel binary: multiboot entry and boot sequence.

#![cfg_attr(target_arch = "x86", no_std)]
#![cfg_attr(target_arch = "x86", no_main)]

#[cfg(target_arch = "x86")]
mod boot {
    use core::panic::PanicInfo;

    use trios_kernel::arch::x86::{gdt, idt, multiboot, pic, pit, rtc};
    use trios_kernel::{arch, fs, log_service, mm, println, serial, terminal};

    /// Entry from the multiboot `_start` stub, still on the boot stack and
    /// with interrupts disabled.
    #[no_mangle]
    pub extern "C" fn kernel_main(magic: u32, info_addr: u32) -> ! {
        serial::init();
        log_service::init(log::LevelFilter::Info);
        log::info!("TriOS v{} booting", env!("CARGO_PKG_VERSION"));

        if magic != multiboot::BOOTLOADER_MAGIC {
            panic!("invalid multiboot magic {:#010x}", magic);
        }

        gdt::init();
        idt::init();
        pic::init();

        terminal::init();

        // The file-system image rides along as the first boot module. The
        // boot-info structures live in low memory that is unmapped once
        // paging is on, so the module must be located first; the image
        // itself has to sit inside the kernel's 4 MiB page (the loader
        // places it right behind the kernel), which stays mapped.
        // SAFETY: info_addr comes straight from the multiboot loader and
        // paging is still off, so low memory is readable.
        let image = unsafe { multiboot::module_slice(info_addr, 0) };
        let Some(image) = image else {
            panic!("boot loader provided no file-system module");
        };
        let image_start = image.as_ptr() as u32;
        if image_start < 4 * 1024 * 1024 || image_start + image.len() as u32 > 8 * 1024 * 1024 {
            log::warn!(
                "fs image at {:#010x}+{:#x} lies outside the kernel page",
                image_start,
                image.len()
            );
        }

        mm::paging::init();

        if let Err(err) = fs::init(image) {
            panic!("file system rejected: {}", err);
        }

        println!("TriOS v{}", env!("CARGO_PKG_VERSION"));

        // Interrupt sources last: the first PIT tick bootstraps terminal 0's
        // shell. The keyboard stays masked until all three shells exist.
        rtc::init();
        pit::init();
        log::info!("boot complete; handing control to the scheduler");

        loop {
            arch::irq_enable();
            arch::halt();
        }
    }

    #[panic_handler]
    fn panic(info: &PanicInfo) -> ! {
        println!("[KERNEL PANIC] {}", info);
        log::error!("KERNEL PANIC: {}", info);
        loop {
            trios_kernel::arch::halt();
        }
    }
}

#[cfg(not(target_arch = "x86"))]
fn main() {}
