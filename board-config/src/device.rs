//! STM32F4 device profiles.

use crate::peripheral::Instance;
use crate::pin::{PinId, Port, Signal};

/// Clock domain a peripheral's kernel clock comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bus {
    Ahb1,
    Ahb2,
    Apb1,
    Apb2,
}

/// What a particular part number bonds out and how fast it may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Device {
    pub name: &'static str,
    /// Bonded pins per port, indexed by [`Port::index`], bit n for pin n.
    pub pins: [u16; Port::ALL.len()],
    pub sysclk_max_hz: u32,
    pub apb1_max_hz: u32,
    pub apb2_max_hz: u32,
}

const ALL_PINS: u16 = 0xffff;

/// 48-pin UFQFPN: no PB11, PC13-15 only, PH0/PH1 for the crystal.
const QFN48_PINS: [u16; 11] = [
    ALL_PINS,
    ALL_PINS & !(1 << 11),
    0b1110_0000_0000_0000,
    0,
    0,
    0,
    0,
    0b11,
    0,
    0,
    0,
];

/// 100-pin LQFP: ports A-E complete plus PH0/PH1.
const LQFP100_PINS: [u16; 11] = [ALL_PINS, ALL_PINS, ALL_PINS, ALL_PINS, ALL_PINS, 0, 0, 0b11, 0, 0, 0];

pub const STM32F401CC: Device = Device {
    name: "STM32F401CC",
    pins: QFN48_PINS,
    sysclk_max_hz: 84_000_000,
    apb1_max_hz: 42_000_000,
    apb2_max_hz: 84_000_000,
};

pub const STM32F411CE: Device = Device {
    name: "STM32F411CE",
    pins: QFN48_PINS,
    sysclk_max_hz: 100_000_000,
    apb1_max_hz: 50_000_000,
    apb2_max_hz: 100_000_000,
};

pub const STM32F407VG: Device = Device {
    name: "STM32F407VG",
    pins: LQFP100_PINS,
    sysclk_max_hz: 168_000_000,
    apb1_max_hz: 42_000_000,
    apb2_max_hz: 84_000_000,
};

pub const DEVICES: [&Device; 3] = [&STM32F401CC, &STM32F411CE, &STM32F407VG];

impl Device {
    pub fn by_name(name: &str) -> Option<&'static Device> {
        DEVICES
            .into_iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
    }

    pub const fn has_pin(&self, pin: PinId) -> bool {
        self.pins[pin.port.index()] & pin.mask() != 0
    }

    pub const fn bus_max_hz(&self, bus: Bus) -> u32 {
        match bus {
            Bus::Ahb1 | Bus::Ahb2 => self.sysclk_max_hz,
            Bus::Apb1 => self.apb1_max_hz,
            Bus::Apb2 => self.apb2_max_hz,
        }
    }

    /// Highest kernel clock `instance` can see. Timers run at twice their
    /// APB clock when the APB prescaler isn't 1.
    pub fn clock_ceiling_hz(&self, instance: Instance) -> Option<u32> {
        let bus = bus(instance)?;
        let max = self.bus_max_hz(bus);
        Some(match instance {
            Instance::Tim(_) => (max * 2).min(self.sysclk_max_hz),
            _ => max,
        })
    }
}

/// Bus an instance hangs off. `None` for the USB middleware, which has no
/// clock of its own, and for I2S, which is clocked from the I2S PLL.
pub const fn bus(instance: Instance) -> Option<Bus> {
    let bus = match instance {
        Instance::Tim(1 | 8..=11)
        | Instance::Usart(1 | 6)
        | Instance::Adc(_)
        | Instance::Sdio
        | Instance::Spi(1 | 4..=6) => Bus::Apb2,
        Instance::Tim(_)
        | Instance::Usart(_)
        | Instance::Uart(_)
        | Instance::I2c(_)
        | Instance::Spi(_)
        | Instance::Can(_)
        | Instance::Dac => Bus::Apb1,
        Instance::UsbOtgFs => Bus::Ahb2,
        Instance::UsbOtgHs => Bus::Ahb1,
        Instance::I2s(_) | Instance::UsbDevice | Instance::UsbHost => return None,
    };
    Some(bus)
}

/// A known signal-to-pin routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub instance: Instance,
    pub signal: Signal,
    pub pin: PinId,
    pub af: u8,
}

const fn route(instance: Instance, signal: Signal, port: Port, number: u8, af: u8) -> Route {
    Route {
        instance,
        signal,
        pin: PinId::new(port, number),
        af,
    }
}

use Instance::{I2c, Spi, Usart, UsbOtgFs};
use Port::{A, B, C};
use Signal::{Dm, Dp, Id, Miso, Mosi, Nss, Rx, Scl, Sck, Sda, Smba, Sof, Tx};

/// Alternate function routings shared by the STM32F4 parts above. Not
/// exhaustive; a signal missing here isn't checked at all.
pub const ROUTES: &[Route] = &[
    route(I2c(1), Scl, B, 6, 4),
    route(I2c(1), Scl, B, 8, 4),
    route(I2c(1), Sda, B, 7, 4),
    route(I2c(1), Sda, B, 9, 4),
    route(I2c(1), Smba, B, 5, 4),
    route(I2c(2), Scl, B, 10, 4),
    route(I2c(2), Sda, B, 11, 4),
    route(I2c(2), Sda, B, 3, 9),
    route(I2c(3), Scl, A, 8, 4),
    route(I2c(3), Sda, C, 9, 4),
    route(I2c(3), Sda, B, 4, 9),
    route(Spi(1), Sck, A, 5, 5),
    route(Spi(1), Sck, B, 3, 5),
    route(Spi(1), Miso, A, 6, 5),
    route(Spi(1), Miso, B, 4, 5),
    route(Spi(1), Mosi, A, 7, 5),
    route(Spi(1), Mosi, B, 5, 5),
    route(Spi(1), Nss, A, 4, 5),
    route(Spi(1), Nss, A, 15, 5),
    route(Spi(2), Sck, B, 10, 5),
    route(Spi(2), Sck, B, 13, 5),
    route(Spi(2), Miso, B, 14, 5),
    route(Spi(2), Miso, C, 2, 5),
    route(Spi(2), Mosi, B, 15, 5),
    route(Spi(2), Mosi, C, 3, 5),
    route(Spi(2), Nss, B, 9, 5),
    route(Spi(2), Nss, B, 12, 5),
    route(Spi(3), Sck, B, 3, 6),
    route(Spi(3), Sck, C, 10, 6),
    route(Spi(3), Miso, B, 4, 6),
    route(Spi(3), Miso, C, 11, 6),
    route(Spi(3), Mosi, B, 5, 6),
    route(Spi(3), Mosi, C, 12, 6),
    route(Spi(3), Nss, A, 4, 6),
    route(Spi(3), Nss, A, 15, 6),
    route(Usart(1), Tx, A, 9, 7),
    route(Usart(1), Tx, B, 6, 7),
    route(Usart(1), Rx, A, 10, 7),
    route(Usart(1), Rx, B, 7, 7),
    route(Usart(2), Tx, A, 2, 7),
    route(Usart(2), Rx, A, 3, 7),
    route(Usart(6), Tx, C, 6, 8),
    route(Usart(6), Tx, A, 11, 8),
    route(Usart(6), Rx, C, 7, 8),
    route(Usart(6), Rx, A, 12, 8),
    route(UsbOtgFs, Sof, A, 8, 10),
    route(UsbOtgFs, Id, A, 10, 10),
    route(UsbOtgFs, Dm, A, 11, 10),
    route(UsbOtgFs, Dp, A, 12, 10),
];

pub fn routes(instance: Instance, signal: Signal) -> impl Iterator<Item = &'static Route> {
    ROUTES
        .iter()
        .filter(move |r| r.instance == instance && r.signal == signal)
}
