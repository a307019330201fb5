//! Global process table.
//!
//! Six fixed slots; a slot's PID is its index. PCBs are owned here — the
//! terminal records hold only the active PID, which breaks the
//! terminal/PCB reference cycle. Parent links are PIDs too: the halt
//! protocol guarantees a parent outlives its child, so a PID is all the
//! linkage needed.

use crate::config::MAX_PROCESSES;
use crate::error::{KernelError, KernelResult};
use crate::sync::IrqLock;

use super::pcb::Pcb;

pub struct ProcessTable {
    slots: [Option<Pcb>; MAX_PROCESSES],
}

impl ProcessTable {
    pub const fn new() -> Self {
        Self {
            slots: [const { None }; MAX_PROCESSES],
        }
    }

    /// Lowest free PID, if any.
    pub fn first_free_pid(&self) -> Option<usize> {
        self.slots.iter().position(|slot| slot.is_none())
    }

    pub fn insert(&mut self, pcb: Pcb) -> KernelResult<usize> {
        let pid = pcb.pid;
        if pid >= MAX_PROCESSES {
            return Err(KernelError::InvalidArgument { name: "pid" });
        }
        if self.slots[pid].is_some() {
            return Err(KernelError::ResourceExhausted {
                resource: "process slots",
            });
        }
        self.slots[pid] = Some(pcb);
        Ok(pid)
    }

    /// Free the slot, handing the PCB back to the caller.
    pub fn remove(&mut self, pid: usize) -> Option<Pcb> {
        self.slots.get_mut(pid)?.take()
    }

    pub fn get(&self, pid: usize) -> Option<&Pcb> {
        self.slots.get(pid)?.as_ref()
    }

    pub fn get_mut(&mut self, pid: usize) -> Option<&mut Pcb> {
        self.slots.get_mut(pid)?.as_mut()
    }

    pub fn in_use(&self, pid: usize) -> bool {
        matches!(self.slots.get(pid), Some(Some(_)))
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

static PROCESS_TABLE: IrqLock<ProcessTable> = IrqLock::new(ProcessTable::new());

/// Run `f` with the table locked (interrupts masked for the duration).
pub fn with_table<R>(f: impl FnOnce(&mut ProcessTable) -> R) -> R {
    f(&mut PROCESS_TABLE.lock())
}

/// Record the scheduler resume point for `pid`.
pub fn set_kernel_esp(pid: usize, esp: u32) {
    with_table(|t| {
        if let Some(pcb) = t.get_mut(pid) {
            pcb.kernel_esp = esp;
        }
    });
}

/// Scheduler resume point for `pid`.
pub fn kernel_esp(pid: usize) -> Option<u32> {
    with_table(|t| t.get(pid).map(|pcb| pcb.kernel_esp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::pcb::ArgBuffer;

    #[test]
    fn six_pids_then_exhaustion() {
        let mut table = ProcessTable::new();
        for pid in 0..MAX_PROCESSES {
            assert_eq!(table.first_free_pid(), Some(pid));
            table
                .insert(Pcb::new(pid, pid.min(2), ArgBuffer::empty()))
                .unwrap();
        }
        assert_eq!(table.first_free_pid(), None);
        assert_eq!(table.live_count(), MAX_PROCESSES);
    }

    #[test]
    fn freed_slot_is_reused_lowest_first() {
        let mut table = ProcessTable::new();
        for pid in 0..4 {
            table.insert(Pcb::new(pid, 0, ArgBuffer::empty())).unwrap();
        }
        let removed = table.remove(1).unwrap();
        assert_eq!(removed.pid, 1);
        assert_eq!(table.first_free_pid(), Some(1));
        assert!(!table.in_use(1));
    }

    #[test]
    fn double_insert_rejected() {
        let mut table = ProcessTable::new();
        table.insert(Pcb::new(0, 0, ArgBuffer::empty())).unwrap();
        assert!(table.insert(Pcb::new(0, 0, ArgBuffer::empty())).is_err());
    }

    #[test]
    fn out_of_range_pids() {
        let mut table = ProcessTable::new();
        assert!(table
            .insert(Pcb::new(MAX_PROCESSES, 0, ArgBuffer::empty()))
            .is_err());
        assert!(table.remove(99).is_none());
        assert!(table.get(99).is_none());
    }
}
