//! # Reset and Clock Control (RCC)
//! Handles the clock tree, peripheral clock gating and peripheral resets.
//!
//! All register traffic goes through an [`Rcc`] handle. The handle owns a
//! [`RegisterAccess`] backend, which is the memory-mapped RCC block on real
//! hardware ([`Mmio`]). Every mutating operation takes `&mut self`: callers
//! must serialize access to the handle (for example by only touching it
//! during bring-up, or with interrupts disabled), since the RCC registers
//! are shared by every peripheral on the chip.
//!
//! ```no_run
//! use stm32f1_rcc::pac;
//! use stm32f1_rcc::rcc::{clocks::*, PeripheralId, Rcc};
//!
//! let p = unsafe { pac::Peripherals::steal() };
//! let mut rcc = Rcc::new(p.RCC);
//! let clocks = rcc.clock_tree_init(SystemClockSource::Pll, PllSource::Hse, PllMultiplier::Mul9);
//! rcc.set_apb1_prescaler(ApbDivider::Div2);
//! rcc.peripheral_enable(PeripheralId::Gpioa);
//! ```

pub mod clocks;
pub mod registry;
#[cfg(test)]
pub(crate) mod sim;

pub use registry::{BusDomain, PeripheralDescriptor, PeripheralId, ResetDomain};

/// Physical base address of the RCC register block.
pub const RCC_BASE: u32 = 0x4002_1000;

/// Offset of an RCC register from the base of the block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Register(pub u32);

/// Clock control register.
pub const CR: Register = Register(0x00);
/// Clock configuration register.
pub const CFGR: Register = Register(0x04);
/// APB2 peripheral reset register.
pub const APB2RSTR: Register = Register(0x0C);
/// APB1 peripheral reset register.
pub const APB1RSTR: Register = Register(0x10);
/// AHB peripheral clock enable register.
pub const AHBENR: Register = Register(0x14);
/// APB2 peripheral clock enable register.
pub const APB2ENR: Register = Register(0x18);
/// APB1 peripheral clock enable register.
pub const APB1ENR: Register = Register(0x1C);
/// Size of the register block: CR through CSR.
pub const RCC_BLOCK_SIZE: u32 = 0x28;

/// 32-bit register primitives used by the driver.
///
/// `set_bits` and `clear_bits` must behave as a single indivisible
/// read-modify-write from the point of view of the caller. `read` and
/// `write` are plain accesses.
pub trait RegisterAccess {
    fn read(&self, address: u32) -> u32;
    fn write(&mut self, address: u32, value: u32);
    fn set_bits(&mut self, address: u32, mask: u32);
    fn clear_bits(&mut self, address: u32, mask: u32);
}

/// Volatile access to the memory-mapped RCC block.
///
/// Owns the PAC singleton so that only one backend can exist. Every access
/// is checked against the bounds of the RCC block, so a backend released
/// with [`Rcc::free`] and rebound to another base cannot reach other memory.
pub struct Mmio {
    _rcc: crate::pac::RCC,
}

impl Mmio {
    /// Pointer to the RCC register at `address`.
    ///
    /// # Panics
    /// If `address` is not a word-aligned register of the RCC block.
    #[inline(always)]
    fn register(address: u32) -> *mut u32 {
        let base = crate::pac::RCC::ptr() as u32;
        assert!(
            address >= base && address - base < RCC_BLOCK_SIZE && address % 4 == 0,
            "address {:#x} is outside the RCC block",
            address
        );
        address as usize as *mut u32
    }
}

impl RegisterAccess for Mmio {
    #[inline(always)]
    fn read(&self, address: u32) -> u32 {
        let register = Self::register(address);
        // Safety: `register` is an aligned register inside the RCC block,
        // which this backend owns.
        unsafe { core::ptr::read_volatile(register) }
    }

    #[inline(always)]
    fn write(&mut self, address: u32, value: u32) {
        let register = Self::register(address);
        // Safety: see `read`.
        unsafe { core::ptr::write_volatile(register, value) }
    }

    #[inline(always)]
    fn set_bits(&mut self, address: u32, mask: u32) {
        let register = Self::register(address);
        cortex_m::interrupt::free(|_| {
            // Safety: see `read`.
            unsafe {
                let value = core::ptr::read_volatile(register);
                core::ptr::write_volatile(register, value | mask);
            }
        });
    }

    #[inline(always)]
    fn clear_bits(&mut self, address: u32, mask: u32) {
        let register = Self::register(address);
        cortex_m::interrupt::free(|_| {
            // Safety: see `read`.
            unsafe {
                let value = core::ptr::read_volatile(register);
                core::ptr::write_volatile(register, value & !mask);
            }
        });
    }
}

/// Reset and Clock Control peripheral handle.
pub struct Rcc<R: RegisterAccess = Mmio> {
    base: u32,
    regs: R,
}

impl Rcc<Mmio> {
    /// Takes ownership of the RCC block.
    pub fn new(rcc: crate::pac::RCC) -> Self {
        Rcc {
            base: crate::pac::RCC::ptr() as u32,
            regs: Mmio { _rcc: rcc },
        }
    }
}

impl<R: RegisterAccess> Rcc<R> {
    /// Builds a handle over an arbitrary register backend whose RCC block
    /// starts at `base`.
    pub fn with_registers(base: u32, regs: R) -> Self {
        Rcc { base, regs }
    }

    /// Releases the register backend.
    pub fn free(self) -> R {
        self.regs
    }

    #[inline(always)]
    pub(crate) fn address(&self, reg: Register) -> u32 {
        self.base + reg.0
    }

    #[inline(always)]
    pub(crate) fn read(&self, reg: Register) -> u32 {
        self.regs.read(self.address(reg))
    }

    #[inline(always)]
    pub(crate) fn write(&mut self, reg: Register, value: u32) {
        let address = self.address(reg);
        self.regs.write(address, value);
    }

    #[inline(always)]
    fn set_bits(&mut self, reg: Register, mask: u32) {
        let address = self.address(reg);
        self.regs.set_bits(address, mask);
    }

    #[inline(always)]
    fn clear_bits(&mut self, reg: Register, mask: u32) {
        let address = self.address(reg);
        self.regs.clear_bits(address, mask);
    }

    /// Turns on the clock line of a peripheral. Enabling an already enabled
    /// peripheral has no effect.
    pub fn peripheral_enable(&mut self, id: PeripheralId) {
        let desc = id.descriptor();
        trace!("rcc: enable {:?} ({:?} line {})", id, desc.domain, desc.line);
        self.set_bits(desc.domain.enable_register(), desc.mask());
    }

    /// Turns off the clock line of a peripheral.
    pub fn peripheral_disable(&mut self, id: PeripheralId) {
        let desc = id.descriptor();
        trace!("rcc: disable {:?} ({:?} line {})", id, desc.domain, desc.line);
        self.clear_bits(desc.domain.enable_register(), desc.mask());
    }

    /// Whether the clock line of a peripheral is currently on.
    pub fn is_enabled(&self, id: PeripheralId) -> bool {
        let desc = id.descriptor();
        self.read(desc.domain.enable_register()) & desc.mask() != 0
    }

    /// Pulses the reset line of a peripheral, returning it to its power-on
    /// state. Clock gating is left untouched.
    ///
    /// # Panics
    /// If the peripheral sits on a bus without a reset register (AHB).
    /// Use [`ResetForPeripheral`] to have this checked at compile time.
    pub fn peripheral_reset(&mut self, id: PeripheralId) {
        let desc = id.descriptor();
        let Some(domain) = desc.domain.reset_domain() else {
            panic!("{:?} has no reset register", id);
        };
        trace!("rcc: reset {:?} ({:?} line {})", id, domain, desc.line);
        self.pulse_reset(domain, desc.mask());
    }

    fn pulse_reset(&mut self, domain: ResetDomain, mask: u32) {
        let reg = domain.reset_register();
        self.set_bits(reg, mask);
        self.clear_bits(reg, mask);
    }
}

/// Extension trait for enabling and disabling peripheral clocks.
pub trait ClockForPeripheral: crate::Sealed {
    const ID: PeripheralId;

    /// Enables the peripheral clock.
    fn enable_clock<R: RegisterAccess>(&self, rcc: &mut Rcc<R>) {
        rcc.peripheral_enable(Self::ID);
    }

    /// Disables the peripheral clock.
    ///
    /// The peripheral must not be in use, its registers become inaccessible.
    fn disable_clock<R: RegisterAccess>(&self, rcc: &mut Rcc<R>) {
        rcc.peripheral_disable(Self::ID);
    }
}

/// Extension trait for peripheral resets. Only implemented for peripherals
/// whose bus exposes a reset register.
pub trait ResetForPeripheral: ClockForPeripheral {
    const DOMAIN: ResetDomain = match Self::ID.domain().reset_domain() {
        Some(domain) => domain,
        None => panic!("peripheral has no reset register"),
    };

    /// Resets the peripheral.
    ///
    /// User should ensure that the peripheral is not in use when
    /// initiating a reset.
    fn reset<R: RegisterAccess>(&self, rcc: &mut Rcc<R>) {
        trace!("rcc: reset {:?}", Self::ID);
        rcc.pulse_reset(Self::DOMAIN, Self::ID.descriptor().mask());
    }
}

macro_rules! generate_clock {
    ($MODULE:ident, $ID:ident) => {
        impl crate::Sealed for $crate::pac::$MODULE {}
        impl ClockForPeripheral for $crate::pac::$MODULE {
            const ID: PeripheralId = PeripheralId::$ID;
        }
    };
}

macro_rules! generate_reset {
    ($MODULE:ident) => {
        impl ResetForPeripheral for $crate::pac::$MODULE {}
    };
}

generate_clock!(AFIO, Afio);
generate_clock!(GPIOA, Gpioa);
generate_clock!(GPIOB, Gpiob);
generate_clock!(GPIOC, Gpioc);
generate_clock!(GPIOD, Gpiod);
generate_clock!(GPIOE, Gpioe);
generate_clock!(ADC1, Adc1);
generate_clock!(ADC2, Adc2);
generate_clock!(TIM1, Timer1);
generate_clock!(SPI1, Spi1);
generate_clock!(USART1, Usart1);
generate_clock!(TIM2, Timer2);
generate_clock!(TIM3, Timer3);
generate_clock!(TIM4, Timer4);
generate_clock!(SPI2, Spi2);
generate_clock!(USART2, Usart2);
generate_clock!(USART3, Usart3);
generate_clock!(I2C1, I2c1);
generate_clock!(I2C2, I2c2);
generate_clock!(USB, Usb);
generate_clock!(BKP, Bkp);
generate_clock!(PWR, Pwr);
generate_clock!(DMA1, Dma1);
generate_clock!(CRC, Crc);

// DMA1 and CRC sit on the AHB, which has no reset register.
generate_reset!(AFIO);
generate_reset!(GPIOA);
generate_reset!(GPIOB);
generate_reset!(GPIOC);
generate_reset!(GPIOD);
generate_reset!(GPIOE);
generate_reset!(ADC1);
generate_reset!(ADC2);
generate_reset!(TIM1);
generate_reset!(SPI1);
generate_reset!(USART1);
generate_reset!(TIM2);
generate_reset!(TIM3);
generate_reset!(TIM4);
generate_reset!(SPI2);
generate_reset!(USART2);
generate_reset!(USART3);
generate_reset!(I2C1);
generate_reset!(I2C2);
generate_reset!(USB);
generate_reset!(BKP);
generate_reset!(PWR);
