//! Registers own their text: overwriting one releases exactly one buffer.
//!
//! A counting global allocator tracks live allocations per thread, so the
//! test harness running other tests in parallel does not disturb the counts.

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::io;

use svm_core::{Machine, RegisterFile};

struct Counting;

thread_local! {
    static LIVE: Cell<isize> = const { Cell::new(0) };
}

unsafe impl GlobalAlloc for Counting {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            let _ = LIVE.try_with(|live| live.set(live.get() + 1));
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) };
        let _ = LIVE.try_with(|live| live.set(live.get() - 1));
    }
}

#[global_allocator]
static GLOBAL: Counting = Counting;

fn live() -> isize {
    LIVE.with(Cell::get)
}

#[test]
fn integer_over_text_releases_the_buffer() {
    let mut regs = RegisterFile::new();
    let before = live();

    regs.write_text(3, String::from("hello")).unwrap();
    assert_eq!(live(), before + 1);

    regs.write_integer(3, 7).unwrap();
    assert_eq!(live(), before);
}

#[test]
fn text_over_text_swaps_one_buffer_for_another() {
    let mut regs = RegisterFile::new();
    regs.write_text(0, String::from("first")).unwrap();
    let before = live();

    regs.write_text(0, String::from("second")).unwrap();
    assert_eq!(live(), before);
    assert_eq!(regs.read_text(0).unwrap(), b"second");
}

#[test]
fn failed_write_keeps_ownership_balanced() {
    let mut regs = RegisterFile::new();
    let before = live();

    // The rejected buffer is dropped with the error path, not leaked.
    assert!(regs.write_text(42, String::from("nowhere")).is_err());
    assert_eq!(live(), before);
}

#[test]
fn machine_releases_text_as_instructions_overwrite_it() {
    // The machine's default output is stdout, whose global buffer is
    // allocated lazily on first use and never freed.
    let _ = io::stdout();
    let base = live();
    {
        let mut vm = Machine::new(&[
            0x30, 0x01, 0x03, 0x00, b'a', b'b', b'c', // STRING_STORE r1, "abc"
            0x51, 0x02, 0x01, // STORE_REG r2 = r1 (deep copy)
            0x30, 0x01, 0x04, 0x00, b'd', b'e', b'f', b'g', // STRING_STORE r1, "defg"
            0x01, 0x01, 0x05, 0x00, // INT_STORE r1, 5
            0x00,
        ])
        .unwrap();
        vm.set_output(io::sink());
        vm.set_error_hook(|_| {});

        let before_run = live();
        vm.run().unwrap();
        // Only r2's copy of "abc" survives the run.
        assert_eq!(live(), before_run + 1);
        assert_eq!(vm.registers.read_text(2).unwrap(), b"abc");
    }
    assert_eq!(live(), base);
}
