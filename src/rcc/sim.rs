//! Simulated RCC block for host tests.
//!
//! Registers start at their documented reset values. Setting HSEON or PLLON
//! in CR, or selecting a new source in CFGR.SW, arms a countdown; the
//! matching ready/status bits appear once the register has been read that
//! many more times. A countdown of `None` means the hardware never answers.
//! Every mutation and every ready transition is recorded in order.

use std::cell::{Cell, RefCell};

use super::clocks::{CFGR_SW, CFGR_SWS, CR_HSEON, CR_HSERDY, CR_PLLON, CR_PLLRDY};
use super::{RegisterAccess, CFGR, CR, RCC_BASE};

const REGISTER_COUNT: usize = 10;
/// Read-only status bits of CR: HSIRDY, HSERDY and PLLRDY.
const CR_STATUS: u32 = 1 << 1 | CR_HSERDY | CR_PLLRDY;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Op {
    Write(u32, u32),
    SetBits(u32, u32),
    ClearBits(u32, u32),
    /// The simulated hardware raised status bits in a register.
    Ready(u32, u32),
}

pub(crate) struct SimRcc {
    regs: RefCell<[u32; REGISTER_COUNT]>,
    log: RefCell<Vec<Op>>,
    history: RefCell<Vec<(u32, u32)>>,
    reads: Cell<usize>,
    hse_delay: Option<u32>,
    pll_delay: Option<u32>,
    switch_delay: Option<u32>,
    hse_countdown: Cell<Option<u32>>,
    pll_countdown: Cell<Option<u32>>,
    switch_countdown: Cell<Option<u32>>,
}

impl SimRcc {
    pub fn new() -> Self {
        Self::with_delays(Some(3), Some(5), Some(2))
    }

    pub fn with_delays(hse: Option<u32>, pll: Option<u32>, switch: Option<u32>) -> Self {
        let mut regs = [0; REGISTER_COUNT];
        // HSION | HSIRDY | HSITRIM default
        regs[index(RCC_BASE + CR.0)] = 0x0000_0083;
        // SRAM and FLITF clocks
        regs[index(RCC_BASE + super::AHBENR.0)] = 0x0000_0014;
        SimRcc {
            regs: RefCell::new(regs),
            log: RefCell::new(Vec::new()),
            history: RefCell::new(Vec::new()),
            reads: Cell::new(0),
            hse_delay: hse,
            pll_delay: pll,
            switch_delay: switch,
            hse_countdown: Cell::new(None),
            pll_countdown: Cell::new(None),
            switch_countdown: Cell::new(None),
        }
    }

    /// Overwrites a register without logging or side effects.
    pub fn poke(&mut self, address: u32, value: u32) {
        self.regs.borrow_mut()[index(address)] = value;
    }

    pub fn peek(&self, address: u32) -> u32 {
        self.regs.borrow()[index(address)]
    }

    pub fn log(&self) -> Vec<Op> {
        self.log.borrow().clone()
    }

    pub fn clear_log(&mut self) {
        self.log.borrow_mut().clear();
        self.history.borrow_mut().clear();
    }

    pub fn reads(&self) -> usize {
        self.reads.get()
    }

    /// Register values after each mutation of `address`, in order.
    pub fn history(&self, address: u32) -> Vec<u32> {
        self.history
            .borrow()
            .iter()
            .filter(|(a, _)| *a == address)
            .map(|(_, v)| *v)
            .collect()
    }

    fn record(&self, op: Op) {
        self.log.borrow_mut().push(op);
    }

    fn store(&self, address: u32, value: u32) {
        let old = self.peek(address);
        // Writes never reach the status bits.
        let value = if address == RCC_BASE + CR.0 {
            (value & !CR_STATUS) | (old & CR_STATUS)
        } else if address == RCC_BASE + CFGR.0 {
            (value & !CFGR_SWS) | (old & CFGR_SWS)
        } else {
            value
        };
        self.regs.borrow_mut()[index(address)] = value;
        if address == RCC_BASE + CR.0 {
            if value & CR_HSEON != 0 && old & CR_HSEON == 0 {
                self.hse_countdown.set(self.hse_delay);
            }
            if value & CR_HSEON == 0 {
                self.hse_countdown.set(None);
                self.regs.borrow_mut()[index(address)] &= !CR_HSERDY;
            }
            if value & CR_PLLON != 0 && old & CR_PLLON == 0 {
                self.pll_countdown.set(self.pll_delay);
            }
            if value & CR_PLLON == 0 {
                self.pll_countdown.set(None);
                self.regs.borrow_mut()[index(address)] &= !CR_PLLRDY;
            }
        } else if address == RCC_BASE + CFGR.0 && (value & CFGR_SW) != (old & CFGR_SW) {
            self.switch_countdown.set(self.switch_delay);
        }
        self.snapshot(address);
    }

    fn snapshot(&self, address: u32) {
        let value = self.peek(address);
        self.history.borrow_mut().push((address, value));
    }

    /// Advances a countdown; returns `true` once it expires.
    fn tick(countdown: &Cell<Option<u32>>) -> bool {
        match countdown.get() {
            Some(0) => {
                countdown.set(None);
                true
            }
            Some(n) => {
                countdown.set(Some(n - 1));
                false
            }
            None => false,
        }
    }

    fn raise(&self, address: u32, mask: u32) {
        self.regs.borrow_mut()[index(address)] |= mask;
        self.record(Op::Ready(address, mask));
        self.snapshot(address);
    }

    fn on_read(&self, address: u32) {
        if address == RCC_BASE + CR.0 {
            if Self::tick(&self.hse_countdown) {
                self.raise(address, CR_HSERDY);
            }
            if Self::tick(&self.pll_countdown) {
                self.raise(address, CR_PLLRDY);
            }
        } else if address == RCC_BASE + CFGR.0 && Self::tick(&self.switch_countdown) {
            let cfgr = self.peek(address);
            let sws = (cfgr & CFGR_SW) << 2;
            self.regs.borrow_mut()[index(address)] = (cfgr & !CFGR_SWS) | sws;
            self.record(Op::Ready(address, sws));
            self.snapshot(address);
        }
    }
}

fn index(address: u32) -> usize {
    let offset = address - RCC_BASE;
    assert!(offset % 4 == 0, "unaligned register access {:#x}", address);
    (offset / 4) as usize
}

impl RegisterAccess for SimRcc {
    fn read(&self, address: u32) -> u32 {
        self.reads.set(self.reads.get() + 1);
        self.on_read(address);
        self.peek(address)
    }

    fn write(&mut self, address: u32, value: u32) {
        self.record(Op::Write(address, value));
        self.store(address, value);
    }

    fn set_bits(&mut self, address: u32, mask: u32) {
        self.record(Op::SetBits(address, mask));
        let value = self.peek(address) | mask;
        self.store(address, value);
    }

    fn clear_bits(&mut self, address: u32, mask: u32) {
        self.record(Op::ClearBits(address, mask));
        let value = self.peek(address) & !mask;
        self.store(address, value);
    }
}
