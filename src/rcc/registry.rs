//! # Device Registry
//!
//! Maps every clock-gateable peripheral to the bus domain that feeds it and
//! the line (bit position) that gates it within that domain's enable and
//! reset registers.

use super::{Register, APB1ENR, APB1RSTR, APB2ENR, APB2RSTR, AHBENR};

/// Bus domain that owns a peripheral's clock enable (and reset) line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusDomain {
    /// Low-speed peripheral bus (36 MHz max).
    Apb1,
    /// High-speed peripheral bus (72 MHz max).
    Apb2,
    /// Advanced high-performance bus. Exposes no reset register.
    Ahb,
}

/// The bus domains which expose a peripheral reset register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResetDomain {
    Apb1,
    Apb2,
}

impl BusDomain {
    /// Register holding the clock enable lines of this domain.
    pub const fn enable_register(self) -> Register {
        match self {
            BusDomain::Apb1 => APB1ENR,
            BusDomain::Apb2 => APB2ENR,
            BusDomain::Ahb => AHBENR,
        }
    }

    /// The reset-capable view of this domain, or `None` if the domain has
    /// no reset register.
    pub const fn reset_domain(self) -> Option<ResetDomain> {
        match self {
            BusDomain::Apb1 => Some(ResetDomain::Apb1),
            BusDomain::Apb2 => Some(ResetDomain::Apb2),
            BusDomain::Ahb => None,
        }
    }
}

impl ResetDomain {
    /// Register holding the reset lines of this domain.
    pub const fn reset_register(self) -> Register {
        match self {
            ResetDomain::Apb1 => APB1RSTR,
            ResetDomain::Apb2 => APB2RSTR,
        }
    }
}

/// Where a peripheral's clock gate lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeripheralDescriptor {
    pub domain: BusDomain,
    /// Bit position within the domain's enable/reset registers (0..=31).
    pub line: u8,
}

impl PeripheralDescriptor {
    const fn new(domain: BusDomain, line: u8) -> Self {
        Self { domain, line }
    }

    /// Single-bit mask selecting this peripheral's line.
    #[inline(always)]
    pub const fn mask(&self) -> u32 {
        1 << self.line
    }
}

/// Logical identifier of a clock-gateable peripheral.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeripheralId {
    Afio,
    Gpioa,
    Gpiob,
    Gpioc,
    Gpiod,
    Gpioe,
    Adc1,
    Adc2,
    Timer1,
    Spi1,
    Usart1,
    Timer2,
    Timer3,
    Timer4,
    Spi2,
    Usart2,
    Usart3,
    I2c1,
    I2c2,
    Usb,
    Bkp,
    Pwr,
    Dma1,
    Crc,
}

impl PeripheralId {
    /// Every peripheral known to the registry.
    pub const ALL: [PeripheralId; 24] = [
        PeripheralId::Afio,
        PeripheralId::Gpioa,
        PeripheralId::Gpiob,
        PeripheralId::Gpioc,
        PeripheralId::Gpiod,
        PeripheralId::Gpioe,
        PeripheralId::Adc1,
        PeripheralId::Adc2,
        PeripheralId::Timer1,
        PeripheralId::Spi1,
        PeripheralId::Usart1,
        PeripheralId::Timer2,
        PeripheralId::Timer3,
        PeripheralId::Timer4,
        PeripheralId::Spi2,
        PeripheralId::Usart2,
        PeripheralId::Usart3,
        PeripheralId::I2c1,
        PeripheralId::I2c2,
        PeripheralId::Usb,
        PeripheralId::Bkp,
        PeripheralId::Pwr,
        PeripheralId::Dma1,
        PeripheralId::Crc,
    ];

    /// Looks up the bus domain and line of this peripheral.
    pub const fn descriptor(self) -> PeripheralDescriptor {
        use BusDomain::*;
        match self {
            PeripheralId::Afio => PeripheralDescriptor::new(Apb2, 0),
            PeripheralId::Gpioa => PeripheralDescriptor::new(Apb2, 2),
            PeripheralId::Gpiob => PeripheralDescriptor::new(Apb2, 3),
            PeripheralId::Gpioc => PeripheralDescriptor::new(Apb2, 4),
            PeripheralId::Gpiod => PeripheralDescriptor::new(Apb2, 5),
            PeripheralId::Gpioe => PeripheralDescriptor::new(Apb2, 6),
            PeripheralId::Adc1 => PeripheralDescriptor::new(Apb2, 9),
            PeripheralId::Adc2 => PeripheralDescriptor::new(Apb2, 10),
            PeripheralId::Timer1 => PeripheralDescriptor::new(Apb2, 11),
            PeripheralId::Spi1 => PeripheralDescriptor::new(Apb2, 12),
            PeripheralId::Usart1 => PeripheralDescriptor::new(Apb2, 14),
            PeripheralId::Timer2 => PeripheralDescriptor::new(Apb1, 0),
            PeripheralId::Timer3 => PeripheralDescriptor::new(Apb1, 1),
            PeripheralId::Timer4 => PeripheralDescriptor::new(Apb1, 2),
            PeripheralId::Spi2 => PeripheralDescriptor::new(Apb1, 14),
            PeripheralId::Usart2 => PeripheralDescriptor::new(Apb1, 17),
            PeripheralId::Usart3 => PeripheralDescriptor::new(Apb1, 18),
            PeripheralId::I2c1 => PeripheralDescriptor::new(Apb1, 21),
            PeripheralId::I2c2 => PeripheralDescriptor::new(Apb1, 22),
            PeripheralId::Usb => PeripheralDescriptor::new(Apb1, 23),
            PeripheralId::Bkp => PeripheralDescriptor::new(Apb1, 27),
            PeripheralId::Pwr => PeripheralDescriptor::new(Apb1, 28),
            PeripheralId::Dma1 => PeripheralDescriptor::new(Ahb, 0),
            PeripheralId::Crc => PeripheralDescriptor::new(Ahb, 6),
        }
    }

    #[inline(always)]
    pub const fn domain(self) -> BusDomain {
        self.descriptor().domain
    }

    #[inline(always)]
    pub const fn line(self) -> u8 {
        self.descriptor().line
    }
}
