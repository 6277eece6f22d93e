use board_config::device::{self, Bus};
use board_config::{Instance, PeripheralConfig};

/// Bus clocks the firmware sets up. AHB runs at SYSCLK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockTree {
    pub sysclk_hz: u32,
    pub apb1_hz: u32,
    pub apb2_hz: u32,
}

/// 25 MHz HSE through the PLL: 84 MHz SYSCLK, APB1 at half that, APB2 at
/// full speed, 48 MHz on PLLQ for USB.
pub const CLOCKS: ClockTree = ClockTree {
    sysclk_hz: 84_000_000,
    apb1_hz: 42_000_000,
    apb2_hz: 84_000_000,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("{instance} is described at {declared} Hz but runs at {actual} Hz")]
pub struct ClockMismatch {
    pub instance: Instance,
    pub declared: u32,
    pub actual: u32,
}

impl ClockTree {
    pub const fn bus_hz(&self, bus: Bus) -> u32 {
        match bus {
            Bus::Ahb1 | Bus::Ahb2 => self.sysclk_hz,
            Bus::Apb1 => self.apb1_hz,
            Bus::Apb2 => self.apb2_hz,
        }
    }

    pub fn kernel_clock_hz(&self, instance: Instance) -> Option<u32> {
        let bus = device::bus(instance)?;
        let hz = self.bus_hz(bus);
        Some(match instance {
            // timer clocks double whenever the APB prescaler isn't 1
            Instance::Tim(_) if hz < self.sysclk_hz => hz * 2,
            _ => hz,
        })
    }

    /// Compares a peripheral's declared clock with what it actually gets.
    /// Peripherals without a declared clock always pass.
    pub fn check(&self, peripheral: &PeripheralConfig<'_>) -> Result<(), ClockMismatch> {
        let (Some(declared), Some(actual)) =
            (peripheral.clock_hz, self.kernel_clock_hz(peripheral.instance))
        else {
            return Ok(());
        };

        if declared == actual {
            Ok(())
        } else {
            Err(ClockMismatch {
                instance: peripheral.instance,
                declared,
                actual,
            })
        }
    }
}
