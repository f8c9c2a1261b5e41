//! # Reset and Clock Control for STM32F1 Microcontrollers
//!
//! Brings up the system clock tree and gates, ungates and resets the
//! on-chip peripherals. Every other peripheral driver needs its clock
//! enabled through [`rcc::Rcc`] before its registers can be touched.
#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

/// Re-export of the Peripheral Access Crate (PAC) for the STM32F103.
pub use stm32f1::stm32f103 as pac;
/// Entry point for the runtime application.
#[cfg(feature = "rt")]
pub use cortex_m_rt::entry;

mod private {
    pub trait Sealed {}
}
use private::Sealed;

pub mod rcc;
