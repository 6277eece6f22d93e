//! Peripheral instances and the board as a whole.

use core::fmt;

use crate::pin::{PinConfig, PinId};

/// A peripheral instance as CubeMX names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Instance {
    Adc(u8),
    Can(u8),
    Dac,
    I2c(u8),
    I2s(u8),
    Sdio,
    Spi(u8),
    Tim(u8),
    Usart(u8),
    Uart(u8),
    /// USB device middleware, sitting on top of an OTG core.
    UsbDevice,
    /// USB host middleware, sitting on top of an OTG core.
    UsbHost,
    UsbOtgFs,
    UsbOtgHs,
}

const NUMBERED: [(&str, fn(u8) -> Instance); 8] = [
    ("ADC", Instance::Adc),
    ("CAN", Instance::Can),
    ("I2C", Instance::I2c),
    ("I2S", Instance::I2s),
    ("SPI", Instance::Spi),
    ("TIM", Instance::Tim),
    ("USART", Instance::Usart),
    ("UART", Instance::Uart),
];

impl Instance {
    /// Parses an instance name. The HAL spells the OTG cores `OTG_FS` and
    /// `OTG_HS` in alternate function names, so both forms are accepted.
    pub fn parse(s: &str) -> Option<Self> {
        let instance = match s {
            "DAC" => Instance::Dac,
            "SDIO" => Instance::Sdio,
            "USB_DEVICE" => Instance::UsbDevice,
            "USB_HOST" => Instance::UsbHost,
            "USB_OTG_FS" | "OTG_FS" => Instance::UsbOtgFs,
            "USB_OTG_HS" | "OTG_HS" => Instance::UsbOtgHs,
            _ => {
                return NUMBERED.iter().find_map(|(prefix, make)| {
                    let n = s.strip_prefix(*prefix)?;
                    if n.is_empty() || n.len() > 2 || !n.bytes().all(|b| b.is_ascii_digit()) {
                        return None;
                    }
                    match n.parse::<u8>() {
                        Ok(0) | Err(_) => None,
                        Ok(n) => Some(make(n)),
                    }
                });
            }
        };
        Some(instance)
    }

    pub const fn is_usb_middleware(self) -> bool {
        matches!(self, Instance::UsbDevice | Instance::UsbHost)
    }

    pub const fn is_otg_core(self) -> bool {
        matches!(self, Instance::UsbOtgFs | Instance::UsbOtgHs)
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instance::Adc(n) => write!(f, "ADC{n}"),
            Instance::Can(n) => write!(f, "CAN{n}"),
            Instance::Dac => f.write_str("DAC"),
            Instance::I2c(n) => write!(f, "I2C{n}"),
            Instance::I2s(n) => write!(f, "I2S{n}"),
            Instance::Sdio => f.write_str("SDIO"),
            Instance::Spi(n) => write!(f, "SPI{n}"),
            Instance::Tim(n) => write!(f, "TIM{n}"),
            Instance::Usart(n) => write!(f, "USART{n}"),
            Instance::Uart(n) => write!(f, "UART{n}"),
            Instance::UsbDevice => f.write_str("USB_DEVICE"),
            Instance::UsbHost => f.write_str("USB_HOST"),
            Instance::UsbOtgFs => f.write_str("USB_OTG_FS"),
            Instance::UsbOtgHs => f.write_str("USB_OTG_HS"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UsbSpeed {
    Full,
    High,
}

/// USB device class implemented by the middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UsbClass {
    Audio,
    Cdc,
    CustomHid,
    Dfu,
    Hid,
    Msc,
}

/// Role of an OTG core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OtgMode {
    DeviceOnly,
    HostOnly,
    DualRole,
}

impl OtgMode {
    pub const fn can_be_device(self) -> bool {
        !matches!(self, OtgMode::HostOnly)
    }
}

/// How a U(S)ART is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SerialMode {
    Async,
    Sync,
    HalfDuplex,
    Multiprocessor,
    Lin,
    Irda,
    Smartcard,
}

impl SerialMode {
    /// Modes a plain UART (no clock line) can run.
    pub const fn fits_uart(self) -> bool {
        !matches!(self, SerialMode::Sync | SerialMode::Smartcard)
    }
}

/// CubeMX "virtual mode": which middleware or role a peripheral runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VirtualMode {
    UsbDevice { class: UsbClass, speed: UsbSpeed },
    Otg(OtgMode),
    Serial(SerialMode),
}

impl VirtualMode {
    /// Parses the `_VM` token, `Cdc_FS`, `Device_Only` or `VM_ASYNC`.
    pub fn parse(s: &str) -> Option<Self> {
        let mode = match s {
            "VM_ASYNC" => VirtualMode::Serial(SerialMode::Async),
            "VM_SYNC" => VirtualMode::Serial(SerialMode::Sync),
            "VM_HALF_DUPLEX" => VirtualMode::Serial(SerialMode::HalfDuplex),
            "VM_MULTIPROCESSOR" => VirtualMode::Serial(SerialMode::Multiprocessor),
            "VM_LIN" => VirtualMode::Serial(SerialMode::Lin),
            "VM_IRDA" => VirtualMode::Serial(SerialMode::Irda),
            "VM_SMARTCARD" => VirtualMode::Serial(SerialMode::Smartcard),
            "Device_Only" => VirtualMode::Otg(OtgMode::DeviceOnly),
            "Host_Only" => VirtualMode::Otg(OtgMode::HostOnly),
            "Dual_Role_Device" | "OTG_FS" | "OTG_HS" => VirtualMode::Otg(OtgMode::DualRole),
            _ => {
                let (class, speed) = s.rsplit_once('_')?;
                let speed = match speed {
                    "FS" => UsbSpeed::Full,
                    "HS" => UsbSpeed::High,
                    _ => return None,
                };
                let class = match class {
                    "Audio" => UsbClass::Audio,
                    "Cdc" => UsbClass::Cdc,
                    "CustomHid" => UsbClass::CustomHid,
                    "Dfu" => UsbClass::Dfu,
                    "Hid" => UsbClass::Hid,
                    "Msc" => UsbClass::Msc,
                    _ => return None,
                };
                VirtualMode::UsbDevice { class, speed }
            }
        };
        Some(mode)
    }
}

/// One peripheral instance and the pins it claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeripheralConfig<'a> {
    pub instance: Instance,
    /// Kernel clock feeding the peripheral, in Hz.
    pub clock_hz: Option<u32>,
    pub mode: Option<VirtualMode>,
    pub pins: &'a [PinConfig],
}

impl<'a> PeripheralConfig<'a> {
    pub fn pin(&self, signal: crate::pin::Signal) -> Option<&'a PinConfig> {
        self.pins.iter().find(|p| p.signal == signal)
    }
}

/// A complete board description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Board<'a> {
    /// `MX_DEVICE_VERSION` of the description it came from.
    pub version: u32,
    pub peripherals: &'a [PeripheralConfig<'a>],
}

impl<'a> Board<'a> {
    pub const fn new(version: u32, peripherals: &'a [PeripheralConfig<'a>]) -> Self {
        Self {
            version,
            peripherals,
        }
    }

    pub fn peripheral(&self, instance: Instance) -> Option<&'a PeripheralConfig<'a>> {
        let peripherals = self.peripherals;
        peripherals.iter().find(|p| p.instance == instance)
    }

    /// Every pin on the board along with the peripheral that owns it.
    pub fn pins(&self) -> impl Iterator<Item = (&'a PeripheralConfig<'a>, &'a PinConfig)> + 'a {
        let peripherals = self.peripherals;
        peripherals
            .iter()
            .flat_map(|p| p.pins.iter().map(move |pin| (p, pin)))
    }

    /// First claim on `pin`, if any.
    pub fn owner_of(&self, pin: PinId) -> Option<(&'a PeripheralConfig<'a>, &'a PinConfig)> {
        self.pins().find(|(_, p)| p.pin == pin)
    }
}
