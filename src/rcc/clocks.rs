//! # Clock Tree Configuration
//!
//! Brings the system clock up from the internal RC oscillator (HSI) to the
//! PLL driven by the external oscillator (HSE), configures the bus
//! prescalers, and derives the resulting bus frequencies from CFGR.
//!
//! The initialization sequence waits on hardware status bits between every
//! step. [`Rcc::clock_tree_init`] waits forever: a crystal that never starts
//! is a board fault that has to be caught by a watchdog.
//! [`Rcc::try_clock_tree_init`] performs the same sequence with a bounded
//! number of polls per step.

use core::fmt;

use fugit::HertzU32;
use paste::paste;

use super::{Rcc, Register, RegisterAccess, CFGR, CR};

/// HSE oscillator enable.
pub const CR_HSEON: u32 = 1 << 16;
/// HSE oscillator ready.
pub const CR_HSERDY: u32 = 1 << 17;
/// PLL enable.
pub const CR_PLLON: u32 = 1 << 24;
/// PLL ready.
pub const CR_PLLRDY: u32 = 1 << 25;

/// System clock switch.
pub const CFGR_SW: u32 = 0x3;
pub const CFGR_SW_PLL: u32 = 0x2;
/// System clock switch status.
pub const CFGR_SWS: u32 = 0x3 << 2;
pub const CFGR_SWS_PLL: u32 = 0x2 << 2;
pub const CFGR_HPRE: u32 = 0xF << 4;
pub const CFGR_PPRE1: u32 = 0x7 << 8;
pub const CFGR_PPRE2: u32 = 0x7 << 11;
pub const CFGR_ADCPRE: u32 = 0x3 << 14;
/// PLL entry clock source.
pub const CFGR_PLLSRC: u32 = 0x1 << 16;
/// HSE divider for the PLL entry.
pub const CFGR_PLLXTPRE: u32 = 0x1 << 17;
pub const CFGR_PLLMUL: u32 = 0xF << 18;
pub const CFGR_USBPRE: u32 = 0x1 << 22;

/// Internal RC oscillator (8 MHz)
pub const HSI_FREQUENCY: HertzU32 = HertzU32::from_raw(8_000_000);
/// External crystal fitted on the board (8 MHz)
pub const HSE_FREQUENCY: HertzU32 = HertzU32::from_raw(8_000_000);

/// Clock driving SYSCLK.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SystemClockSource {
    Hsi,
    Hse,
    Pll,
}

impl SystemClockSource {
    /// Encoding of the source in CFGR.SW.
    pub const fn bits(self) -> u32 {
        match self {
            SystemClockSource::Hsi => 0x0,
            SystemClockSource::Hse => 0x1,
            SystemClockSource::Pll => CFGR_SW_PLL,
        }
    }

    /// Decodes the CFGR.SWS status field.
    pub const fn from_status(cfgr: u32) -> Self {
        match (cfgr & CFGR_SWS) >> 2 {
            0x0 => SystemClockSource::Hsi,
            0x1 => SystemClockSource::Hse,
            // 0b11 is reserved
            _ => SystemClockSource::Pll,
        }
    }
}

/// Clock entering the PLL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PllSource {
    /// HSI divided by two
    HsiDiv2,
    Hse,
}

impl PllSource {
    pub const fn bits(self) -> u32 {
        match self {
            PllSource::HsiDiv2 => 0,
            PllSource::Hse => CFGR_PLLSRC,
        }
    }
}

/// PLL multiplication factor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PllMultiplier {
    Mul2 = 2,
    Mul3,
    Mul4,
    Mul5,
    Mul6,
    Mul7,
    Mul8,
    Mul9,
    Mul10,
    Mul11,
    Mul12,
    Mul13,
    Mul14,
    Mul15,
    Mul16,
}

impl PllMultiplier {
    pub const fn factor(self) -> u32 {
        self as u32
    }

    /// Encoding of the factor in CFGR.PLLMUL.
    pub const fn bits(self) -> u32 {
        (self.factor() - 2) << 18
    }

    /// Multiplication factor selected by CFGR.PLLMUL. Both `0b1110` and
    /// `0b1111` select x16.
    pub const fn factor_from_cfgr(cfgr: u32) -> u32 {
        let field = (cfgr & CFGR_PLLMUL) >> 18;
        if field >= 14 {
            16
        } else {
            field + 2
        }
    }
}

/// Prescaler fields of CFGR.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Prescaler {
    Ahb,
    Apb1,
    Apb2,
    Usb,
    Adc,
}

impl Prescaler {
    /// Bits of CFGR owned by this prescaler.
    pub const fn mask(self) -> u32 {
        match self {
            Prescaler::Ahb => CFGR_HPRE,
            Prescaler::Apb1 => CFGR_PPRE1,
            Prescaler::Apb2 => CFGR_PPRE2,
            Prescaler::Usb => CFGR_USBPRE,
            Prescaler::Adc => CFGR_ADCPRE,
        }
    }

    pub const fn shift(self) -> u32 {
        self.mask().trailing_zeros()
    }
}

/// AHB prescaler (HCLK = SYSCLK / n).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AhbDivider {
    Div1,
    Div2,
    Div4,
    Div8,
    Div16,
    Div64,
    Div128,
    Div256,
    Div512,
}

impl AhbDivider {
    /// Unshifted HPRE field value.
    pub const fn field(self) -> u32 {
        match self {
            AhbDivider::Div1 => 0x0,
            AhbDivider::Div2 => 0x8,
            AhbDivider::Div4 => 0x9,
            AhbDivider::Div8 => 0xA,
            AhbDivider::Div16 => 0xB,
            AhbDivider::Div64 => 0xC,
            AhbDivider::Div128 => 0xD,
            AhbDivider::Div256 => 0xE,
            AhbDivider::Div512 => 0xF,
        }
    }

    const fn divisor(field: u32) -> u32 {
        match field {
            0x8 => 2,
            0x9 => 4,
            0xA => 8,
            0xB => 16,
            0xC => 64,
            0xD => 128,
            0xE => 256,
            0xF => 512,
            _ => 1,
        }
    }
}

/// APB1/APB2 prescaler (PCLK = HCLK / n).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ApbDivider {
    Div1,
    Div2,
    Div4,
    Div8,
    Div16,
}

impl ApbDivider {
    /// Unshifted PPREx field value.
    pub const fn field(self) -> u32 {
        match self {
            ApbDivider::Div1 => 0x0,
            ApbDivider::Div2 => 0x4,
            ApbDivider::Div4 => 0x5,
            ApbDivider::Div8 => 0x6,
            ApbDivider::Div16 => 0x7,
        }
    }

    const fn divisor(field: u32) -> u32 {
        if field & 0x4 == 0 {
            1
        } else {
            2 << (field & 0x3)
        }
    }
}

/// ADC prescaler (ADCCLK = PCLK2 / n).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdcDivider {
    Div2,
    Div4,
    Div6,
    Div8,
}

impl AdcDivider {
    pub const fn field(self) -> u32 {
        match self {
            AdcDivider::Div2 => 0x0,
            AdcDivider::Div4 => 0x1,
            AdcDivider::Div6 => 0x2,
            AdcDivider::Div8 => 0x3,
        }
    }
}

/// USB prescaler applied to the PLL output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UsbDivider {
    Div1_5,
    Div1,
}

impl UsbDivider {
    pub const fn field(self) -> u32 {
        match self {
            UsbDivider::Div1_5 => 0x0,
            UsbDivider::Div1 => 0x1,
        }
    }
}

/// Progress of the clock tree initialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitStage {
    /// Running from HSI, nothing touched yet.
    InternalClock,
    /// HSEON set, waiting for HSERDY.
    OscEnabling,
    OscReady,
    /// PLLON set, waiting for PLLRDY.
    PllEnabling,
    PllReady,
    /// SW set to PLL, waiting for SWS to follow.
    Switching,
    PllActive,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The hardware did not confirm the step within the allowed polls.
    Timeout(InitStage),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Timeout(stage) => write!(f, "clock tree stalled while {:?}", stage),
        }
    }
}

/// Bus and kernel clock frequencies derived from CFGR.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Clocks {
    pub sysclk: HertzU32,
    pub hclk: HertzU32,
    pub pclk1: HertzU32,
    pub pclk2: HertzU32,
    pub adcclk: HertzU32,
    /// PLL output through the USB prescaler, only meaningful with the PLL on.
    pub usbclk: HertzU32,
}

impl Clocks {
    /// Decodes a CFGR value.
    pub const fn from_cfgr(cfgr: u32) -> Self {
        let pll_in = if cfgr & CFGR_PLLSRC == 0 {
            HSI_FREQUENCY.raw() / 2
        } else if cfgr & CFGR_PLLXTPRE != 0 {
            HSE_FREQUENCY.raw() / 2
        } else {
            HSE_FREQUENCY.raw()
        };
        let pll = pll_in * PllMultiplier::factor_from_cfgr(cfgr);

        let sysclk = match SystemClockSource::from_status(cfgr) {
            SystemClockSource::Hsi => HSI_FREQUENCY.raw(),
            SystemClockSource::Hse => HSE_FREQUENCY.raw(),
            SystemClockSource::Pll => pll,
        };
        let hclk = sysclk / AhbDivider::divisor((cfgr & CFGR_HPRE) >> 4);
        let pclk1 = hclk / ApbDivider::divisor((cfgr & CFGR_PPRE1) >> 8);
        let pclk2 = hclk / ApbDivider::divisor((cfgr & CFGR_PPRE2) >> 11);
        let adcclk = pclk2 / (2 * (((cfgr & CFGR_ADCPRE) >> 14) + 1));
        let usbclk = if cfgr & CFGR_USBPRE == 0 { pll * 2 / 3 } else { pll };

        Clocks {
            sysclk: HertzU32::from_raw(sysclk),
            hclk: HertzU32::from_raw(hclk),
            pclk1: HertzU32::from_raw(pclk1),
            pclk2: HertzU32::from_raw(pclk2),
            adcclk: HertzU32::from_raw(adcclk),
            usbclk: HertzU32::from_raw(usbclk),
        }
    }
}

/// Generates a typed setter for one prescaler field.
macro_rules! prescaler_setter {
    ($PRESCALER:ident, $DIVIDER:ty) => {
        paste! {
            #[doc = "Sets the "]
            #[doc = stringify!([<$PRESCALER:upper>])]
            #[doc = " prescaler."]
            pub fn [<set_ $PRESCALER:lower _prescaler>](&mut self, divider: $DIVIDER) {
                let prescaler = Prescaler::$PRESCALER;
                self.prescaler_set(prescaler, divider.field() << prescaler.shift());
            }
        }
    };
}

impl<R: RegisterAccess> Rcc<R> {
    /// Switches SYSCLK to the PLL fed by the HSE and returns the resulting
    /// clock frequencies. Prescalers are left at their reset values.
    ///
    /// Blocks until the oscillator, the PLL and the switch are each confirmed
    /// by hardware; there is no timeout. Flash wait states must already be
    /// configured for the target frequency.
    ///
    /// # Panics
    /// Unless `sysclk` is [`SystemClockSource::Pll`] and `pll_src` is
    /// [`PllSource::Hse`]. No register is touched in that case.
    pub fn clock_tree_init(
        &mut self,
        sysclk: SystemClockSource,
        pll_src: PllSource,
        pll_mul: PllMultiplier,
    ) -> Clocks {
        match self.run_clock_tree_init(sysclk, pll_src, pll_mul, None) {
            Ok(clocks) => clocks,
            Err(error) => unreachable!("unbounded wait returned {:?}", error),
        }
    }

    /// Same sequence as [`Rcc::clock_tree_init`], but gives up once a
    /// status bit has been polled `max_polls` times without answering.
    ///
    /// On timeout the clock tree is left where it stalled: SYSCLK is still
    /// HSI, and the oscillator or PLL enable bit remains set.
    pub fn try_clock_tree_init(
        &mut self,
        sysclk: SystemClockSource,
        pll_src: PllSource,
        pll_mul: PllMultiplier,
        max_polls: u32,
    ) -> Result<Clocks, Error> {
        self.run_clock_tree_init(sysclk, pll_src, pll_mul, Some(max_polls))
    }

    fn run_clock_tree_init(
        &mut self,
        sysclk: SystemClockSource,
        pll_src: PllSource,
        pll_mul: PllMultiplier,
        max_polls: Option<u32>,
    ) -> Result<Clocks, Error> {
        assert!(
            sysclk == SystemClockSource::Pll && pll_src == PllSource::Hse,
            "only the HSE-driven PLL is supported as system clock"
        );
        debug!("rcc: {:?}", InitStage::InternalClock);

        let mut cr = self.read(CR);
        let mut cfgr = pll_src.bits() | pll_mul.bits();
        self.write(CFGR, cfgr);

        cr |= CR_HSEON;
        self.write(CR, cr);
        self.wait_for(CR, CR_HSERDY, CR_HSERDY, InitStage::OscEnabling, max_polls)?;
        debug!("rcc: {:?}", InitStage::OscReady);

        cr |= CR_PLLON;
        self.write(CR, cr);
        self.wait_for(CR, CR_PLLRDY, CR_PLLRDY, InitStage::PllEnabling, max_polls)?;
        debug!("rcc: {:?}", InitStage::PllReady);

        cfgr &= !CFGR_SW;
        cfgr |= SystemClockSource::Pll.bits();
        self.write(CFGR, cfgr);
        self.wait_for(CFGR, CFGR_SWS, CFGR_SWS_PLL, InitStage::Switching, max_polls)?;

        let clocks = self.clocks();
        debug!("rcc: {:?}, sysclk {} Hz", InitStage::PllActive, clocks.sysclk.raw());
        Ok(clocks)
    }

    /// Spins until `reg & mask == expected`.
    fn wait_for(
        &self,
        reg: Register,
        mask: u32,
        expected: u32,
        stage: InitStage,
        max_polls: Option<u32>,
    ) -> Result<(), Error> {
        debug!("rcc: {:?}", stage);
        match max_polls {
            None => {
                while self.read(reg) & mask != expected {}
                Ok(())
            }
            Some(max_polls) => {
                for _ in 0..max_polls {
                    if self.read(reg) & mask == expected {
                        return Ok(());
                    }
                }
                warn!("rcc: timed out while {:?}", stage);
                Err(Error::Timeout(stage))
            }
        }
    }

    /// Replaces one prescaler field of CFGR with `divider`, which must be
    /// given already shifted into the field's position.
    ///
    /// This is a plain read-modify-write of CFGR and must not race with
    /// other writers of that register.
    pub fn prescaler_set(&mut self, prescaler: Prescaler, divider: u32) {
        let mask = prescaler.mask();
        debug_assert!(
            divider & !mask == 0,
            "divider {:#x} outside the {:?} field",
            divider,
            prescaler
        );
        trace!("rcc: {:?} prescaler = {:#x}", prescaler, divider);
        let mut cfgr = self.read(CFGR);
        cfgr &= !mask;
        cfgr |= divider & mask;
        self.write(CFGR, cfgr);
    }

    prescaler_setter!(Ahb, AhbDivider);
    prescaler_setter!(Apb1, ApbDivider);
    prescaler_setter!(Apb2, ApbDivider);
    prescaler_setter!(Adc, AdcDivider);
    prescaler_setter!(Usb, UsbDivider);

    /// Current clock frequencies, read back from CFGR.
    pub fn clocks(&self) -> Clocks {
        Clocks::from_cfgr(self.read(CFGR))
    }
}
