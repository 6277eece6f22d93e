//! Pin level types: where a signal lives and how its pad is driven.

use core::fmt;

/// GPIO port letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Port {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
}

impl Port {
    pub const ALL: [Port; 11] = [
        Port::A,
        Port::B,
        Port::C,
        Port::D,
        Port::E,
        Port::F,
        Port::G,
        Port::H,
        Port::I,
        Port::J,
        Port::K,
    ];

    /// Position of the port's register block, GPIOA being 0.
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn letter(self) -> char {
        (b'A' + self as u8) as char
    }

    pub fn from_letter(c: char) -> Option<Self> {
        let c = c.to_ascii_uppercase();
        Self::ALL.into_iter().find(|p| p.letter() == c)
    }

    /// Parses the HAL port token, `GPIOB`.
    pub fn parse_hal(s: &str) -> Option<Self> {
        let rest = s.strip_prefix("GPIO")?;
        let mut chars = rest.chars();
        let port = Self::from_letter(chars.next()?)?;
        chars.next().is_none().then_some(port)
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GPIO{}", self.letter())
    }
}

/// Highest pin number on any port.
pub const MAX_PIN_NUMBER: u8 = 15;

/// A single pad, `PB6`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PinId {
    pub port: Port,
    pub number: u8,
}

impl PinId {
    pub const fn new(port: Port, number: u8) -> Self {
        Self { port, number }
    }

    /// Parses a pin name. CubeMX sometimes appends a label (`PC14-OSC32_IN`),
    /// which is dropped.
    pub fn parse(s: &str) -> Option<Self> {
        let name = s.split('-').next()?.trim();
        let rest = name.strip_prefix('P')?;
        let mut chars = rest.chars();
        let port = Port::from_letter(chars.next()?)?;
        let number = parse_pin_number(chars.as_str())?;
        Some(Self { port, number })
    }

    pub const fn mask(self) -> u16 {
        1 << self.number
    }
}

/// Parses the HAL pin token, `GPIO_PIN_6`.
pub fn parse_hal_pin_number(s: &str) -> Option<u8> {
    parse_pin_number(s.strip_prefix("GPIO_PIN_")?)
}

fn parse_pin_number(s: &str) -> Option<u8> {
    if s.is_empty() || s.len() > 2 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n: u8 = s.parse().ok()?;
    (n <= MAX_PIN_NUMBER).then_some(n)
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}{}", self.port.letter(), self.number)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for PinId {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "P{=char}{=u8}", self.port.letter(), self.number)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputType {
    PushPull,
    OpenDrain,
}

impl OutputType {
    /// OTYPER bit.
    pub const fn bits(self) -> u32 {
        match self {
            OutputType::PushPull => 0,
            OutputType::OpenDrain => 1,
        }
    }
}

/// Trigger edge for EXTI modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    Rising,
    Falling,
    Both,
}

/// Electrical mode of a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Input,
    Output(OutputType),
    Alternate(OutputType),
    Analog,
    /// Input routed to an EXTI interrupt line.
    Interrupt(Edge),
    /// Input routed to an EXTI event line.
    Event(Edge),
}

impl Mode {
    pub fn parse(s: &str) -> Option<Self> {
        let rest = s.strip_prefix("GPIO_MODE_")?;
        let mode = match rest {
            "INPUT" => Mode::Input,
            "OUTPUT_PP" => Mode::Output(OutputType::PushPull),
            "OUTPUT_OD" => Mode::Output(OutputType::OpenDrain),
            "AF_PP" => Mode::Alternate(OutputType::PushPull),
            "AF_OD" => Mode::Alternate(OutputType::OpenDrain),
            "ANALOG" => Mode::Analog,
            _ => {
                let (exti, edge) = rest.split_once('_')?;
                let edge = match edge {
                    "RISING" => Edge::Rising,
                    "FALLING" => Edge::Falling,
                    "RISING_FALLING" => Edge::Both,
                    _ => return None,
                };
                match exti {
                    "IT" => Mode::Interrupt(edge),
                    "EVT" => Mode::Event(edge),
                    _ => return None,
                }
            }
        };
        Some(mode)
    }

    /// MODER field value.
    pub const fn moder_bits(self) -> u32 {
        match self {
            Mode::Input | Mode::Interrupt(_) | Mode::Event(_) => 0b00,
            Mode::Output(_) => 0b01,
            Mode::Alternate(_) => 0b10,
            Mode::Analog => 0b11,
        }
    }

    /// Output stage for modes that drive the pad.
    pub const fn output_type(self) -> Option<OutputType> {
        match self {
            Mode::Output(t) | Mode::Alternate(t) => Some(t),
            _ => None,
        }
    }

    pub const fn is_alternate(self) -> bool {
        matches!(self, Mode::Alternate(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pull {
    None,
    Up,
    Down,
}

impl Pull {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "GPIO_NOPULL" => Some(Pull::None),
            "GPIO_PULLUP" => Some(Pull::Up),
            "GPIO_PULLDOWN" => Some(Pull::Down),
            _ => None,
        }
    }

    /// PUPDR field value.
    pub const fn bits(self) -> u32 {
        match self {
            Pull::None => 0b00,
            Pull::Up => 0b01,
            Pull::Down => 0b10,
        }
    }
}

/// Output slew rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Speed {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl Speed {
    /// Accepts both `GPIO_SPEED_FREQ_LOW` and the older `GPIO_SPEED_LOW`.
    pub fn parse(s: &str) -> Option<Self> {
        let rest = s.strip_prefix("GPIO_SPEED_")?;
        let rest = rest.strip_prefix("FREQ_").unwrap_or(rest);
        match rest {
            "LOW" => Some(Speed::Low),
            "MEDIUM" => Some(Speed::Medium),
            "HIGH" => Some(Speed::High),
            "VERY_HIGH" => Some(Speed::VeryHigh),
            _ => None,
        }
    }

    /// OSPEEDR field value.
    pub const fn bits(self) -> u32 {
        self as u32
    }
}

/// Alternate function selector, `GPIO_AF4_I2C1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AltFunction {
    pub index: u8,
    /// `None` when the suffix doesn't name an instance we model (`MCO`,
    /// `RTC_50Hz`, `I2S3ext`).
    pub peripheral: Option<crate::peripheral::Instance>,
}

impl AltFunction {
    pub const MAX_INDEX: u8 = 15;

    pub fn parse(s: &str) -> Option<Self> {
        let rest = s.strip_prefix("GPIO_AF")?;
        let (index, peripheral) = rest.split_once('_')?;
        if index.is_empty() || index.len() > 2 || !index.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let index: u8 = index.parse().ok()?;
        if index > Self::MAX_INDEX {
            return None;
        }
        Some(Self {
            index,
            peripheral: crate::peripheral::Instance::parse(peripheral),
        })
    }
}

/// Role of a pin within its peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Signal {
    Scl,
    Sda,
    Smba,
    Sck,
    Miso,
    Mosi,
    Nss,
    Tx,
    Rx,
    Cts,
    Rts,
    Ck,
    Dm,
    Dp,
    Id,
    Vbus,
    Sof,
    Ws,
    Sd,
    Mck,
    Channel(u8),
    ComplementaryChannel(u8),
    Input(u8),
    Output(u8),
}

impl Signal {
    pub fn parse(s: &str) -> Option<Self> {
        let signal = match s {
            "SCL" => Signal::Scl,
            "SDA" => Signal::Sda,
            "SMBA" => Signal::Smba,
            "SCK" => Signal::Sck,
            "MISO" => Signal::Miso,
            "MOSI" => Signal::Mosi,
            "NSS" => Signal::Nss,
            "TX" => Signal::Tx,
            "RX" => Signal::Rx,
            "CTS" => Signal::Cts,
            "RTS" => Signal::Rts,
            "CK" => Signal::Ck,
            "DM" => Signal::Dm,
            "DP" => Signal::Dp,
            "ID" => Signal::Id,
            "VBUS" => Signal::Vbus,
            "SOF" => Signal::Sof,
            "WS" => Signal::Ws,
            "SD" => Signal::Sd,
            "MCK" => Signal::Mck,
            _ => {
                if let Some(ch) = s.strip_prefix("CH") {
                    match ch.strip_suffix('N') {
                        Some(n) => Signal::ComplementaryChannel(parse_small(n)?),
                        None => Signal::Channel(parse_small(ch)?),
                    }
                } else if let Some(n) = s.strip_prefix("IN") {
                    Signal::Input(parse_small(n)?)
                } else if let Some(n) = s.strip_prefix("OUT") {
                    Signal::Output(parse_small(n)?)
                } else {
                    return None;
                }
            }
        };
        Some(signal)
    }
}

fn parse_small(s: &str) -> Option<u8> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Signal::Scl => "SCL",
            Signal::Sda => "SDA",
            Signal::Smba => "SMBA",
            Signal::Sck => "SCK",
            Signal::Miso => "MISO",
            Signal::Mosi => "MOSI",
            Signal::Nss => "NSS",
            Signal::Tx => "TX",
            Signal::Rx => "RX",
            Signal::Cts => "CTS",
            Signal::Rts => "RTS",
            Signal::Ck => "CK",
            Signal::Dm => "DM",
            Signal::Dp => "DP",
            Signal::Id => "ID",
            Signal::Vbus => "VBUS",
            Signal::Sof => "SOF",
            Signal::Ws => "WS",
            Signal::Sd => "SD",
            Signal::Mck => "MCK",
            Signal::Channel(n) => return write!(f, "CH{n}"),
            Signal::ComplementaryChannel(n) => return write!(f, "CH{n}N"),
            Signal::Input(n) => return write!(f, "IN{n}"),
            Signal::Output(n) => return write!(f, "OUT{n}"),
        };
        f.write_str(name)
    }
}

/// Everything CubeMX records about one pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinConfig {
    pub signal: Signal,
    pub pin: PinId,
    pub mode: Mode,
    pub pull: Pull,
    pub speed: Speed,
    pub af: Option<AltFunction>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peripheral::Instance;

    #[test]
    fn pin_names() {
        assert_eq!(PinId::parse("PB6"), Some(PinId::new(Port::B, 6)));
        assert_eq!(PinId::parse("PA15"), Some(PinId::new(Port::A, 15)));
        assert_eq!(
            PinId::parse("PC14-OSC32_IN"),
            Some(PinId::new(Port::C, 14))
        );
        assert_eq!(PinId::parse("PA16"), None);
        assert_eq!(PinId::parse("PL1"), None);
        assert_eq!(PinId::parse("B6"), None);
        assert_eq!(PinId::parse("PB"), None);
        assert_eq!(PinId::parse("PB+1"), None);
    }

    #[test]
    fn hal_tokens() {
        assert_eq!(parse_hal_pin_number("GPIO_PIN_9"), Some(9));
        assert_eq!(parse_hal_pin_number("GPIO_PIN_All"), None);
        assert_eq!(Port::parse_hal("GPIOH"), Some(Port::H));
        assert_eq!(Port::parse_hal("GPIOHH"), None);
        assert_eq!(Port::parse_hal("GPIO"), None);
    }

    #[test]
    fn modes() {
        assert_eq!(
            Mode::parse("GPIO_MODE_AF_OD"),
            Some(Mode::Alternate(OutputType::OpenDrain))
        );
        assert_eq!(
            Mode::parse("GPIO_MODE_IT_RISING_FALLING"),
            Some(Mode::Interrupt(Edge::Both))
        );
        assert_eq!(
            Mode::parse("GPIO_MODE_EVT_FALLING"),
            Some(Mode::Event(Edge::Falling))
        );
        assert_eq!(Mode::parse("GPIO_MODE_IT_SIDEWAYS"), None);
        assert_eq!(Mode::parse("GPIO_MODE_AF"), None);
        assert_eq!(Mode::Interrupt(Edge::Rising).moder_bits(), 0b00);
        assert_eq!(Mode::Analog.moder_bits(), 0b11);
    }

    #[test]
    fn speeds_and_pulls() {
        assert_eq!(Speed::parse("GPIO_SPEED_FREQ_VERY_HIGH"), Some(Speed::VeryHigh));
        assert_eq!(Speed::parse("GPIO_SPEED_MEDIUM"), Some(Speed::Medium));
        assert_eq!(Speed::parse("GPIO_SPEED_FREQ_LUDICROUS"), None);
        assert_eq!(Speed::VeryHigh.bits(), 0b11);
        assert_eq!(Pull::parse("GPIO_PULLDOWN"), Some(Pull::Down));
        assert_eq!(Pull::parse("GPIO_PULL_UP"), None);
    }

    #[test]
    fn alternate_functions() {
        assert_eq!(
            AltFunction::parse("GPIO_AF4_I2C1"),
            Some(AltFunction {
                index: 4,
                peripheral: Some(Instance::I2c(1)),
            })
        );
        assert_eq!(
            AltFunction::parse("GPIO_AF10_OTG_FS"),
            Some(AltFunction {
                index: 10,
                peripheral: Some(Instance::UsbOtgFs),
            })
        );
        assert_eq!(
            AltFunction::parse("GPIO_AF0_MCO"),
            Some(AltFunction {
                index: 0,
                peripheral: None,
            })
        );
        assert_eq!(AltFunction::parse("GPIO_AF16_SPI1"), None);
        assert_eq!(AltFunction::parse("GPIO_AF_SPI1"), None);
    }

    #[test]
    fn signals_display_as_parsed() {
        for name in ["SCL", "MOSI", "DM", "CH3", "CH1N", "IN10", "OUT2"] {
            let signal = Signal::parse(name).unwrap();
            assert_eq!(std::format!("{signal}"), name);
        }
        assert_eq!(Signal::parse("CH"), None);
        assert_eq!(Signal::parse("WHAT"), None);
    }

    #[test]
    fn pin_display() {
        assert_eq!(std::format!("{}", PinId::new(Port::H, 1)), "PH1");
        assert_eq!(std::format!("{}", Port::B), "GPIOB");
    }
}
