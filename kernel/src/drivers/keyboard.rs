//! PS/2 keyboard driver.
//!
//! IRQ1 reads one scancode from port 0x60 and decodes it via the
//! `pc_keyboard` crate (scancode set 1, US 104-key layout), which owns the
//! shift/caps state and the shifted-row mapping. This module tracks Alt and
//! Ctrl itself for the hotkeys — Alt+F1/F2/F3 switch the visible terminal,
//! Ctrl+L clears it — and feeds everything else to the visible terminal's
//! line discipline.
//!
//! The IRQ line stays masked until all three base shells have booted; the
//! scheduler calls [`init`] on the third bootstrap tick.

use core::sync::atomic::{AtomicBool, Ordering};

use pc_keyboard::{layouts, DecodedKey, HandleControl, KeyCode, KeyState, Keyboard, ScancodeSet1};
use x86::io::inb;

use crate::arch::x86::idt::InterruptStackFrame;
use crate::arch::x86::pic;
use crate::sync::IrqLock;
use crate::terminal;

const KEYBOARD_PORT: u16 = 0x60;

static DECODER: IrqLock<Option<Keyboard<layouts::Us104Key, ScancodeSet1>>> = IrqLock::new(None);

static ALT_HELD: AtomicBool = AtomicBool::new(false);
static CTRL_HELD: AtomicBool = AtomicBool::new(false);

/// Create the decoder and unmask IRQ1.
///
/// Deliberately deferred until every terminal has its base shell, which
/// removes the boot-time race between terminal switching and bootstrap.
pub fn init() {
    let kb = Keyboard::new(
        ScancodeSet1::new(),
        layouts::Us104Key,
        HandleControl::Ignore,
    );
    *DECODER.lock() = Some(kb);
    pic::enable_irq(pic::KEYBOARD_IRQ);
    log::info!("keyboard: decoder armed, IRQ1 unmasked");
}

pub extern "x86-interrupt" fn keyboard_interrupt(_frame: InterruptStackFrame) {
    // SAFETY: Reading the PS/2 output buffer; required to acknowledge the
    // scancode to the controller.
    let scancode = unsafe { inb(KEYBOARD_PORT) };
    handle_scancode(scancode);
    pic::send_eoi(pic::KEYBOARD_IRQ);
}

fn handle_scancode(scancode: u8) {
    let mut guard = DECODER.lock();
    let Some(decoder) = guard.as_mut() else {
        return;
    };
    let Ok(Some(event)) = decoder.add_byte(scancode) else {
        return;
    };

    // Track hotkey modifiers from the raw event before the decoder
    // consumes it.
    let code = event.code;
    let down = event.state == KeyState::Down;
    match code {
        KeyCode::LAlt | KeyCode::RAltGr => ALT_HELD.store(down, Ordering::Relaxed),
        KeyCode::LControl | KeyCode::RControl => CTRL_HELD.store(down, Ordering::Relaxed),
        _ => {}
    }

    if down && ALT_HELD.load(Ordering::Relaxed) {
        let target = match code {
            KeyCode::F1 => Some(0),
            KeyCode::F2 => Some(1),
            KeyCode::F3 => Some(2),
            _ => None,
        };
        if let Some(id) = target {
            drop(guard);
            terminal::switch_visible(id);
            return;
        }
    }

    let Some(key) = decoder.process_keyevent(event) else {
        return;
    };
    drop(guard);

    match key {
        DecodedKey::Unicode(ch) => {
            if CTRL_HELD.load(Ordering::Relaxed) && (ch == 'l' || ch == 'L') {
                terminal::clear_visible();
                return;
            }
            if ch.is_ascii() {
                terminal::line_input(ch as u8);
            }
        }
        // Arrow keys, function keys and the like have no line-discipline
        // meaning.
        DecodedKey::RawKey(_) => {}
    }
}
