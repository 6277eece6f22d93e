//! Loader for CubeMX `MX_Device.h` board descriptions.
//!
//! The header is a flat list of `#define`s grouped by peripheral:
//!
//! ```text
//! #define MX_I2C1                                 1
//! #define MX_I2C1_SCL_Pin                         PB6
//! #define MX_I2C1_SCL_GPIO_Mode                   GPIO_MODE_AF_OD
//! ```
//!
//! [`Directives`] turns the text into defines, [`BoardDescription::parse`]
//! folds those into typed peripheral records.

use core::fmt;
use core::iter::Enumerate;
use core::str::Lines;

use heapless::Vec;

use crate::peripheral::{Instance, PeripheralConfig, VirtualMode};
use crate::pin::{self, AltFunction, Mode, PinConfig, PinId, Port, Pull, Signal, Speed};

pub const MAX_PERIPHERALS: usize = 16;
pub const MAX_PINS: usize = 16;

/// Major version of the description format we understand.
pub const SUPPORTED_MAJOR_VERSION: u32 = 1;

/// Which part of a description a parse error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Attribute {
    Version,
    Declaration,
    ClockFrequency,
    VirtualMode,
    VirtualModeFlag,
    Pin,
    PinNumber,
    Port,
    Mode,
    Pull,
    Speed,
    AlternateFunction,
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Attribute::Version => "MX_DEVICE_VERSION",
            Attribute::Declaration => "peripheral declaration",
            Attribute::ClockFrequency => "PERIPH_CLOCK_FREQ",
            Attribute::VirtualMode => "VM",
            Attribute::VirtualModeFlag => "virtual mode flag",
            Attribute::Pin => "_Pin",
            Attribute::PinNumber => "_GPIO_Pin",
            Attribute::Port => "_GPIOx",
            Attribute::Mode => "_GPIO_Mode",
            Attribute::Pull => "_GPIO_PuPd",
            Attribute::Speed => "_GPIO_Speed",
            Attribute::AlternateFunction => "_GPIO_AF",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Capacity {
    Peripherals,
    Pins,
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capacity::Peripherals => write!(f, "peripherals (max {MAX_PERIPHERALS})"),
            Capacity::Pins => write!(f, "pins on one peripheral (max {MAX_PINS})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    #[error("line {line}: expected a preprocessor directive")]
    Malformed { line: usize },
    #[error("line {line}: comment is never closed")]
    UnterminatedComment { line: usize },
    #[error("line {line}: bad value for {attribute}")]
    InvalidValue { line: usize, attribute: Attribute },
    #[error("line {line}: {attribute} given twice")]
    Duplicate { line: usize, attribute: Attribute },
    #[error("line {line}: unknown peripheral")]
    UnknownPeripheral { line: usize },
    #[error("line {line}: unknown signal")]
    UnknownSignal { line: usize },
    #[error("line {line}: {pin} disagrees with {attribute}")]
    InconsistentPin {
        line: usize,
        pin: PinId,
        attribute: Attribute,
    },
    #[error("line {line}: {instance} {signal} has no {attribute}")]
    MissingAttribute {
        line: usize,
        instance: Instance,
        signal: Signal,
        attribute: Attribute,
    },
    #[error("line {line}: {instance} declared twice")]
    DuplicatePeripheral { line: usize, instance: Instance },
    #[error("line {line}: too many {what}")]
    CapacityExceeded { line: usize, what: Capacity },
    #[error("description has no MX_DEVICE_VERSION")]
    MissingVersion,
    #[error("line {line}: unsupported description version {version:#010x}")]
    UnsupportedVersion { line: usize, version: u32 },
    #[error("line {line}: {instance} virtual mode flag doesn't match its VM")]
    VirtualModeMismatch { line: usize, instance: Instance },
    #[error("line {line}: {instance} VM is never confirmed by its flag")]
    UnconfirmedVirtualMode { line: usize, instance: Instance },
}

/// A single `#define NAME [VALUE]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Define<'a> {
    /// 1-based.
    pub line: usize,
    pub name: &'a str,
    pub value: Option<&'a str>,
}

/// Iterator over the defines in a header. Stops after the first error.
pub struct Directives<'a> {
    lines: Enumerate<Lines<'a>>,
    /// Line a still-open block comment started on.
    open_comment: Option<usize>,
    done: bool,
}

impl<'a> Directives<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            lines: src.lines().enumerate(),
            open_comment: None,
            done: false,
        }
    }

    /// Returns the code left on a line once comments are gone.
    fn strip_comments(&mut self, line: usize, raw: &'a str) -> Result<Option<&'a str>, Error> {
        let mut rest = raw;
        let mut code = None;

        loop {
            if self.open_comment.is_some() {
                match rest.find("*/") {
                    Some(end) => {
                        self.open_comment = None;
                        rest = &rest[end + 2..];
                        continue;
                    }
                    None => return Ok(code),
                }
            }

            let (segment, block) = match (rest.find("/*"), rest.find("//")) {
                (Some(b), Some(l)) if l < b => (&rest[..l], None),
                (Some(b), _) => (&rest[..b], Some(b)),
                (None, Some(l)) => (&rest[..l], None),
                (None, None) => (rest, None),
            };

            let segment = segment.trim();
            if !segment.is_empty() {
                // one directive per line, nothing after an inline comment
                if code.is_some() {
                    return Err(Error::Malformed { line });
                }
                code = Some(segment);
            }

            match block {
                Some(b) => {
                    self.open_comment = Some(line);
                    rest = &rest[b + 2..];
                }
                None => return Ok(code),
            }
        }
    }
}

fn split_word(s: &str) -> (&str, &str) {
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], &s[i..]),
        None => (s, ""),
    }
}

fn directive(line: usize, code: &str) -> Result<Option<Define<'_>>, Error> {
    let body = code
        .strip_prefix('#')
        .ok_or(Error::Malformed { line })?
        .trim_start();

    let (keyword, rest) = split_word(body);
    if keyword != "define" {
        trace!("line {}: skipping directive", line);
        return Ok(None);
    }

    let (name, value) = split_word(rest.trim_start());
    if name.is_empty()
        || !name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
    {
        return Err(Error::Malformed { line });
    }

    let value = value.trim();
    Ok(Some(Define {
        line,
        name,
        value: (!value.is_empty()).then_some(value),
    }))
}

impl<'a> Iterator for Directives<'a> {
    type Item = Result<Define<'a>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        while let Some((i, raw)) = self.lines.next() {
            let line = i + 1;
            let result = self
                .strip_comments(line, raw)
                .and_then(|code| match code {
                    Some(code) => directive(line, code),
                    None => Ok(None),
                });

            match result {
                Ok(Some(define)) => return Some(Ok(define)),
                Ok(None) => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }

        self.done = true;
        self.open_comment
            .take()
            .map(|line| Err(Error::UnterminatedComment { line }))
    }
}

/// Parses a C integer literal: decimal or hex, with optional `U`/`L` suffixes.
pub fn parse_int(s: &str) -> Option<u32> {
    let s = s.trim_end_matches(['u', 'U', 'l', 'L']);
    let (digits, radix) = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (s, 10),
    };
    if digits.is_empty() {
        return None;
    }
    u32::from_str_radix(digits, radix).ok()
}

fn set_once<T>(slot: &mut Option<T>, value: T, line: usize, attribute: Attribute) -> Result<(), Error> {
    if slot.is_some() {
        return Err(Error::Duplicate { line, attribute });
    }
    *slot = Some(value);
    Ok(())
}

#[derive(Clone, Copy)]
enum PinAttribute {
    Pin,
    Number,
    Port,
    Mode,
    Pull,
    Speed,
    Af,
}

// `_GPIO_Pin` has to be tried before `_Pin`.
const PIN_ATTRIBUTES: [(&str, PinAttribute); 7] = [
    ("_GPIO_Pin", PinAttribute::Number),
    ("_GPIOx", PinAttribute::Port),
    ("_GPIO_Mode", PinAttribute::Mode),
    ("_GPIO_PuPd", PinAttribute::Pull),
    ("_GPIO_Speed", PinAttribute::Speed),
    ("_GPIO_AF", PinAttribute::Af),
    ("_Pin", PinAttribute::Pin),
];

/// A pin whose attributes are still arriving.
struct PartialPin {
    signal: Signal,
    /// First line mentioning the pin.
    line: usize,
    pin: Option<PinId>,
    number: Option<u8>,
    port: Option<Port>,
    mode: Option<Mode>,
    pull: Option<Pull>,
    speed: Option<Speed>,
    af: Option<AltFunction>,
}

impl PartialPin {
    fn new(signal: Signal, line: usize) -> Self {
        Self {
            signal,
            line,
            pin: None,
            number: None,
            port: None,
            mode: None,
            pull: None,
            speed: None,
            af: None,
        }
    }

    fn set(&mut self, attribute: PinAttribute, value: &str, line: usize) -> Result<(), Error> {
        let invalid = |attribute| Error::InvalidValue { line, attribute };
        match attribute {
            PinAttribute::Pin => {
                let pin = PinId::parse(value).ok_or(invalid(Attribute::Pin))?;
                set_once(&mut self.pin, pin, line, Attribute::Pin)
            }
            PinAttribute::Number => {
                let n = pin::parse_hal_pin_number(value).ok_or(invalid(Attribute::PinNumber))?;
                set_once(&mut self.number, n, line, Attribute::PinNumber)
            }
            PinAttribute::Port => {
                let port = Port::parse_hal(value).ok_or(invalid(Attribute::Port))?;
                set_once(&mut self.port, port, line, Attribute::Port)
            }
            PinAttribute::Mode => {
                let mode = Mode::parse(value).ok_or(invalid(Attribute::Mode))?;
                set_once(&mut self.mode, mode, line, Attribute::Mode)
            }
            PinAttribute::Pull => {
                let pull = Pull::parse(value).ok_or(invalid(Attribute::Pull))?;
                set_once(&mut self.pull, pull, line, Attribute::Pull)
            }
            PinAttribute::Speed => {
                let speed = Speed::parse(value).ok_or(invalid(Attribute::Speed))?;
                set_once(&mut self.speed, speed, line, Attribute::Speed)
            }
            PinAttribute::Af => {
                let af = AltFunction::parse(value).ok_or(invalid(Attribute::AlternateFunction))?;
                set_once(&mut self.af, af, line, Attribute::AlternateFunction)
            }
        }
    }

    fn finish(self, instance: Instance) -> Result<PinConfig, Error> {
        let line = self.line;
        let missing = |attribute| Error::MissingAttribute {
            line,
            instance,
            signal: self.signal,
            attribute,
        };

        let pin = match (self.pin, self.port, self.number) {
            (Some(pin), port, number) => {
                if port.is_some_and(|port| port != pin.port) {
                    return Err(Error::InconsistentPin {
                        line,
                        pin,
                        attribute: Attribute::Port,
                    });
                }
                if number.is_some_and(|number| number != pin.number) {
                    return Err(Error::InconsistentPin {
                        line,
                        pin,
                        attribute: Attribute::PinNumber,
                    });
                }
                pin
            }
            (None, Some(port), Some(number)) => PinId::new(port, number),
            _ => return Err(missing(Attribute::Pin)),
        };

        Ok(PinConfig {
            signal: self.signal,
            pin,
            mode: self.mode.ok_or(missing(Attribute::Mode))?,
            pull: self.pull.unwrap_or(Pull::None),
            speed: self.speed.unwrap_or(Speed::Low),
            af: self.af,
        })
    }
}

struct PendingPeripheral<'a> {
    /// Name as declared, used to split attribute names.
    name: &'a str,
    instance: Instance,
    clock_hz: Option<u32>,
    mode: Option<VirtualMode>,
    /// The `_VM` token and its line.
    mode_token: Option<(usize, &'a str)>,
    /// A `_<token> 1` flag and its line.
    mode_flag: Option<(usize, &'a str)>,
    pins: Vec<PartialPin, MAX_PINS>,
}

impl PendingPeripheral<'_> {
    fn check_mode_flag(&self) -> Result<(), Error> {
        let instance = self.instance;
        match (self.mode_token, self.mode_flag) {
            (None, None) => Ok(()),
            (Some((_, token)), Some((_, flag))) if token == flag => Ok(()),
            (Some((line, _)), None) => Err(Error::UnconfirmedVirtualMode { line, instance }),
            (_, Some((line, _))) => Err(Error::VirtualModeMismatch { line, instance }),
        }
    }
}

#[derive(Default)]
struct Loader<'a> {
    version: Option<u32>,
    peripherals: Vec<PendingPeripheral<'a>, MAX_PERIPHERALS>,
}

impl<'a> Loader<'a> {
    fn define(&mut self, define: Define<'a>) -> Result<(), Error> {
        let line = define.line;
        let Some(name) = define.name.strip_prefix("MX_") else {
            trace!("line {}: not a CubeMX parameter", line);
            return Ok(());
        };
        let Some(value) = define.value else {
            // include guard
            return Ok(());
        };

        if name == "DEVICE_VERSION" {
            let version = parse_int(value).ok_or(Error::InvalidValue {
                line,
                attribute: Attribute::Version,
            })?;
            if version >> 24 != SUPPORTED_MAJOR_VERSION {
                return Err(Error::UnsupportedVersion { line, version });
            }
            return set_once(&mut self.version, version, line, Attribute::Version);
        }

        match self.owner(name) {
            Some((index, attribute)) => self.attribute(index, attribute, value, line),
            None => self.declare(name, value, line),
        }
    }

    /// Finds the declared peripheral with the longest name that prefixes
    /// `name`, returning its index and the rest of the name.
    fn owner(&self, name: &'a str) -> Option<(usize, &'a str)> {
        self.peripherals
            .iter()
            .enumerate()
            .filter_map(|(i, p)| {
                let rest = name.strip_prefix(p.name)?.strip_prefix('_')?;
                Some((i, p.name.len(), rest))
            })
            .max_by_key(|(_, len, _)| *len)
            .map(|(i, _, rest)| (i, rest))
    }

    fn declare(&mut self, name: &'a str, value: &str, line: usize) -> Result<(), Error> {
        let instance = Instance::parse(name).ok_or(Error::UnknownPeripheral { line })?;
        if parse_int(value) != Some(1) {
            return Err(Error::InvalidValue {
                line,
                attribute: Attribute::Declaration,
            });
        }
        if self.peripherals.iter().any(|p| p.instance == instance) {
            return Err(Error::DuplicatePeripheral { line, instance });
        }

        debug!("line {}: found {}", line, instance);
        self.peripherals
            .push(PendingPeripheral {
                name,
                instance,
                clock_hz: None,
                mode: None,
                mode_token: None,
                mode_flag: None,
                pins: Vec::new(),
            })
            .map_err(|_| Error::CapacityExceeded {
                line,
                what: Capacity::Peripherals,
            })
    }

    fn attribute(
        &mut self,
        index: usize,
        attribute: &'a str,
        value: &'a str,
        line: usize,
    ) -> Result<(), Error> {
        let peripheral = &mut self.peripherals[index];

        match attribute {
            "PERIPH_CLOCK_FREQ" => {
                let hz = parse_int(value).ok_or(Error::InvalidValue {
                    line,
                    attribute: Attribute::ClockFrequency,
                })?;
                set_once(&mut peripheral.clock_hz, hz, line, Attribute::ClockFrequency)
            }
            "VM" => {
                let mode = VirtualMode::parse(value).ok_or(Error::InvalidValue {
                    line,
                    attribute: Attribute::VirtualMode,
                })?;
                set_once(&mut peripheral.mode, mode, line, Attribute::VirtualMode)?;
                peripheral.mode_token = Some((line, value));
                Ok(())
            }
            // `MX_USB_DEVICE_Cdc_FS 1` repeats the VM token as a flag
            _ if VirtualMode::parse(attribute).is_some() => {
                if parse_int(value) != Some(1) {
                    return Err(Error::InvalidValue {
                        line,
                        attribute: Attribute::VirtualModeFlag,
                    });
                }
                set_once(
                    &mut peripheral.mode_flag,
                    (line, attribute),
                    line,
                    Attribute::VirtualModeFlag,
                )
            }
            _ => {
                let Some((signal, kind)) = PIN_ATTRIBUTES
                    .iter()
                    .find_map(|(suffix, kind)| Some((attribute.strip_suffix(*suffix)?, *kind)))
                else {
                    debug!("line {}: ignoring {} attribute", line, peripheral.instance);
                    return Ok(());
                };

                let signal = Signal::parse(signal).ok_or(Error::UnknownSignal { line })?;
                let pin = match peripheral.pins.iter().position(|p| p.signal == signal) {
                    Some(i) => &mut peripheral.pins[i],
                    None => {
                        peripheral
                            .pins
                            .push(PartialPin::new(signal, line))
                            .map_err(|_| Error::CapacityExceeded {
                                line,
                                what: Capacity::Pins,
                            })?;
                        let last = peripheral.pins.len() - 1;
                        &mut peripheral.pins[last]
                    }
                };
                pin.set(kind, value, line)
            }
        }
    }

    fn finish(self) -> Result<BoardDescription, Error> {
        let version = self.version.ok_or(Error::MissingVersion)?;

        let mut peripherals = Vec::new();
        for pending in self.peripherals {
            pending.check_mode_flag()?;
            let mut pins = Vec::new();
            for pin in pending.pins {
                // same capacity on both sides, can't overflow
                let _ = pins.push(pin.finish(pending.instance)?);
            }
            let _ = peripherals.push(Peripheral {
                instance: pending.instance,
                clock_hz: pending.clock_hz,
                mode: pending.mode,
                pins,
            });
        }

        Ok(BoardDescription {
            version,
            peripherals,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Peripheral {
    instance: Instance,
    clock_hz: Option<u32>,
    mode: Option<VirtualMode>,
    pins: Vec<PinConfig, MAX_PINS>,
}

impl Peripheral {
    fn as_config(&self) -> PeripheralConfig<'_> {
        PeripheralConfig {
            instance: self.instance,
            clock_hz: self.clock_hz,
            mode: self.mode,
            pins: &self.pins,
        }
    }
}

/// A loaded board description, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardDescription {
    version: u32,
    peripherals: Vec<Peripheral, MAX_PERIPHERALS>,
}

impl BoardDescription {
    pub fn parse(src: &str) -> Result<Self, Error> {
        let mut loader = Loader::default();
        for define in Directives::new(src) {
            loader.define(define?)?;
        }
        loader.finish()
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn peripheral(&self, instance: Instance) -> Option<PeripheralConfig<'_>> {
        self.peripherals
            .iter()
            .find(|p| p.instance == instance)
            .map(Peripheral::as_config)
    }

    /// Borrowed views of every peripheral, ready to hang off a
    /// [`Board`](crate::peripheral::Board).
    pub fn configs(&self) -> Vec<PeripheralConfig<'_>, MAX_PERIPHERALS> {
        self.peripherals.iter().map(Peripheral::as_config).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peripheral::{OtgMode, SerialMode, UsbClass, UsbSpeed};
    use crate::pin::OutputType;

    const HEADER: &str = r#"/******************************************
 * File Name   : MX_Device.h
 * Note        : generated (DO NOT EDIT!)
 ******************************************/

#ifndef MX_DEVICE_H__
#define MX_DEVICE_H__

/* MX_Device.h version */
#define MX_DEVICE_VERSION                       0x01000000

/*------------------------------ I2C1           -----------------------------*/
#define MX_I2C1                                 1

/* I2C1_SCL */
#define MX_I2C1_SCL_Pin                         PB6
#define MX_I2C1_SCL_GPIO_Pin                    GPIO_PIN_6
#define MX_I2C1_SCL_GPIOx                       GPIOB
#define MX_I2C1_SCL_GPIO_Mode                   GPIO_MODE_AF_OD
#define MX_I2C1_SCL_GPIO_PuPd                   GPIO_PULLUP
#define MX_I2C1_SCL_GPIO_Speed                  GPIO_SPEED_FREQ_LOW
#define MX_I2C1_SCL_GPIO_AF                     GPIO_AF4_I2C1

/*------------------------------ SPI1           -----------------------------*/
#define MX_SPI1                                 1
#define MX_SPI1_PERIPH_CLOCK_FREQ               84000000

/* SPI1_SCK */
#define MX_SPI1_SCK_Pin                         PA5
#define MX_SPI1_SCK_GPIO_Pin                    GPIO_PIN_5
#define MX_SPI1_SCK_GPIOx                       GPIOA
#define MX_SPI1_SCK_GPIO_Mode                   GPIO_MODE_AF_PP
#define MX_SPI1_SCK_GPIO_PuPd                   GPIO_NOPULL
#define MX_SPI1_SCK_GPIO_Speed                  GPIO_SPEED_FREQ_VERY_HIGH
#define MX_SPI1_SCK_GPIO_AF                     GPIO_AF5_SPI1

#define MX_USB_DEVICE                           1
#define MX_USB_DEVICE_VM                        Cdc_FS
#define MX_USB_DEVICE_Cdc_FS                    1

#define MX_USB_OTG_FS                           1
#define MX_USB_OTG_FS_VM                        Device_Only
#define MX_USB_OTG_FS_Device_Only               1

#endif  /* MX_DEVICE_H__ */
"#;

    fn parse_err(src: &str) -> Error {
        BoardDescription::parse(src).unwrap_err()
    }

    #[test]
    fn loads_header() {
        let desc = BoardDescription::parse(HEADER).unwrap();
        assert_eq!(desc.version(), 0x0100_0000);
        assert_eq!(desc.configs().len(), 4);

        let i2c = desc.peripheral(Instance::I2c(1)).unwrap();
        assert_eq!(i2c.clock_hz, None);
        assert_eq!(
            i2c.pins,
            &[PinConfig {
                signal: Signal::Scl,
                pin: PinId::new(Port::B, 6),
                mode: Mode::Alternate(OutputType::OpenDrain),
                pull: Pull::Up,
                speed: Speed::Low,
                af: Some(AltFunction {
                    index: 4,
                    peripheral: Some(Instance::I2c(1)),
                }),
            }]
        );

        let spi = desc.peripheral(Instance::Spi(1)).unwrap();
        assert_eq!(spi.clock_hz, Some(84_000_000));
        assert_eq!(spi.pin(Signal::Sck).unwrap().speed, Speed::VeryHigh);

        let usb = desc.peripheral(Instance::UsbDevice).unwrap();
        assert_eq!(
            usb.mode,
            Some(VirtualMode::UsbDevice {
                class: UsbClass::Cdc,
                speed: UsbSpeed::Full,
            })
        );
        assert!(usb.pins.is_empty());

        let otg = desc.peripheral(Instance::UsbOtgFs).unwrap();
        assert_eq!(otg.mode, Some(VirtualMode::Otg(OtgMode::DeviceOnly)));
    }

    #[test]
    fn directives_track_lines_and_comments() {
        let src = "/* a\n b */ #define MX_A 1\n// #define MX_B 2\n#define MX_C /* x */\n  #  define MX_D 0x10U // y\n#ifndef X\n";
        let defines: std::vec::Vec<_> = Directives::new(src).map(Result::unwrap).collect();
        assert_eq!(
            defines,
            [
                Define {
                    line: 2,
                    name: "MX_A",
                    value: Some("1"),
                },
                Define {
                    line: 4,
                    name: "MX_C",
                    value: None,
                },
                Define {
                    line: 5,
                    name: "MX_D",
                    value: Some("0x10U"),
                },
            ]
        );
    }

    #[test]
    fn unterminated_comment_reports_opening_line() {
        let mut directives = Directives::new("#define MX_A 1\n/* open\nstill open\n");
        assert!(matches!(directives.next(), Some(Ok(_))));
        assert_eq!(
            directives.next(),
            Some(Err(Error::UnterminatedComment { line: 2 }))
        );
        assert_eq!(directives.next(), None);
    }

    #[test]
    fn rejects_stray_code() {
        assert_eq!(
            parse_err("#define MX_DEVICE_VERSION 0x01000000\nint x;\n"),
            Error::Malformed { line: 2 }
        );
        assert_eq!(
            parse_err("#define MX_A 1 /* c */ 2\n"),
            Error::Malformed { line: 1 }
        );
        assert_eq!(parse_err("#define MX_F(x) x\n"), Error::Malformed { line: 1 });
    }

    #[test]
    fn integers() {
        assert_eq!(parse_int("84000000"), Some(84_000_000));
        assert_eq!(parse_int("0x01000000"), Some(0x0100_0000));
        assert_eq!(parse_int("48000000UL"), Some(48_000_000));
        assert_eq!(parse_int("0x"), None);
        assert_eq!(parse_int("PB6"), None);
    }

    #[test]
    fn version_is_required_and_checked() {
        assert_eq!(parse_err("#define MX_I2C1 1\n"), Error::MissingVersion);
        assert_eq!(
            parse_err("#define MX_DEVICE_VERSION 0x02000000\n"),
            Error::UnsupportedVersion {
                line: 1,
                version: 0x0200_0000,
            }
        );
    }

    #[test]
    fn unknown_and_duplicate_peripherals() {
        assert_eq!(
            parse_err("#define MX_DEVICE_VERSION 0x01000000\n#define MX_FROB1 1\n"),
            Error::UnknownPeripheral { line: 2 }
        );
        assert_eq!(
            parse_err("#define MX_DEVICE_VERSION 0x01000000\n#define MX_SPI1 1\n#define MX_SPI1 1\n"),
            Error::DuplicatePeripheral {
                line: 3,
                instance: Instance::Spi(1),
            }
        );
    }

    #[test]
    fn longest_declared_prefix_wins() {
        let src = "#define MX_DEVICE_VERSION 0x01000000
#define MX_SPI1 1
#define MX_SPI10 1
#define MX_SPI10_PERIPH_CLOCK_FREQ 42000000
#define MX_SPI1_PERIPH_CLOCK_FREQ 84000000
";
        let desc = BoardDescription::parse(src).unwrap();
        assert_eq!(desc.peripheral(Instance::Spi(1)).unwrap().clock_hz, Some(84_000_000));
        assert_eq!(desc.peripheral(Instance::Spi(10)).unwrap().clock_hz, Some(42_000_000));
    }

    #[test]
    fn pin_location_must_agree() {
        let src = "#define MX_DEVICE_VERSION 0x01000000
#define MX_I2C1 1
#define MX_I2C1_SDA_Pin PB9
#define MX_I2C1_SDA_GPIO_Pin GPIO_PIN_7
#define MX_I2C1_SDA_GPIO_Mode GPIO_MODE_AF_OD
";
        assert_eq!(
            parse_err(src),
            Error::InconsistentPin {
                line: 3,
                pin: PinId::new(Port::B, 9),
                attribute: Attribute::PinNumber,
            }
        );
    }

    #[test]
    fn location_from_port_and_number() {
        let src = "#define MX_DEVICE_VERSION 0x01000000
#define MX_USART2 1
#define MX_USART2_TX_GPIOx GPIOA
#define MX_USART2_TX_GPIO_Pin GPIO_PIN_2
#define MX_USART2_TX_GPIO_Mode GPIO_MODE_AF_PP
#define MX_USART2_TX_GPIO_FM6 __NULL
";
        let desc = BoardDescription::parse(src).unwrap();
        let tx = desc.peripheral(Instance::Usart(2)).unwrap().pins[0];
        assert_eq!(tx.pin, PinId::new(Port::A, 2));
        assert_eq!(tx.pull, Pull::None);
        assert_eq!(tx.speed, Speed::Low);
        assert_eq!(tx.af, None);
    }

    #[test]
    fn missing_mode() {
        let src = "#define MX_DEVICE_VERSION 0x01000000
#define MX_SPI1 1
#define MX_SPI1_MISO_Pin PA6
";
        assert_eq!(
            parse_err(src),
            Error::MissingAttribute {
                line: 3,
                instance: Instance::Spi(1),
                signal: Signal::Miso,
                attribute: Attribute::Mode,
            }
        );
    }

    #[test]
    fn bad_and_repeated_values() {
        let src = "#define MX_DEVICE_VERSION 0x01000000
#define MX_SPI1 1
#define MX_SPI1_MISO_GPIO_PuPd GPIO_PULLSIDEWAYS
";
        assert_eq!(
            parse_err(src),
            Error::InvalidValue {
                line: 3,
                attribute: Attribute::Pull,
            }
        );

        let src = "#define MX_DEVICE_VERSION 0x01000000
#define MX_SPI1 1
#define MX_SPI1_MISO_Pin PA6
#define MX_SPI1_MISO_Pin PB4
";
        assert_eq!(
            parse_err(src),
            Error::Duplicate {
                line: 4,
                attribute: Attribute::Pin,
            }
        );
    }

    #[test]
    fn unknown_signal() {
        let src = "#define MX_DEVICE_VERSION 0x01000000
#define MX_SPI1 1
#define MX_SPI1_FOO_Pin PA6
";
        assert_eq!(parse_err(src), Error::UnknownSignal { line: 3 });
    }

    #[test]
    fn virtual_mode_flag_must_be_set() {
        let src = "#define MX_DEVICE_VERSION 0x01000000
#define MX_USB_DEVICE 1
#define MX_USB_DEVICE_VM Cdc_FS
#define MX_USB_DEVICE_Cdc_FS 0
";
        assert_eq!(
            parse_err(src),
            Error::InvalidValue {
                line: 4,
                attribute: Attribute::VirtualModeFlag,
            }
        );
    }

    #[test]
    fn serial_virtual_mode() {
        let src = "#define MX_DEVICE_VERSION 0x01000000
#define MX_USART2 1
#define MX_USART2_VM VM_ASYNC
#define MX_USART2_VM_ASYNC 1
#define MX_USART2_TX_Pin PA2
#define MX_USART2_TX_GPIO_Mode GPIO_MODE_AF_PP
#define MX_USART2_TX_GPIO_AF GPIO_AF7_USART2
";
        let desc = BoardDescription::parse(src).unwrap();
        let usart = desc.peripheral(Instance::Usart(2)).unwrap();
        assert_eq!(usart.mode, Some(VirtualMode::Serial(SerialMode::Async)));
        assert_eq!(usart.pins.len(), 1);
    }

    #[test]
    fn virtual_mode_flag_must_match() {
        let src = "#define MX_DEVICE_VERSION 0x01000000
#define MX_USB_DEVICE 1
#define MX_USB_DEVICE_VM Cdc_FS
#define MX_USB_DEVICE_Hid_FS 1
";
        assert_eq!(
            parse_err(src),
            Error::VirtualModeMismatch {
                line: 4,
                instance: Instance::UsbDevice,
            }
        );

        // flag without any VM
        let src = "#define MX_DEVICE_VERSION 0x01000000
#define MX_USB_OTG_FS 1
#define MX_USB_OTG_FS_Device_Only 1
";
        assert_eq!(
            parse_err(src),
            Error::VirtualModeMismatch {
                line: 3,
                instance: Instance::UsbOtgFs,
            }
        );
    }

    #[test]
    fn virtual_mode_needs_flag() {
        let src = "#define MX_DEVICE_VERSION 0x01000000
#define MX_USB_DEVICE 1
#define MX_USB_DEVICE_VM Cdc_FS
";
        assert_eq!(
            parse_err(src),
            Error::UnconfirmedVirtualMode {
                line: 3,
                instance: Instance::UsbDevice,
            }
        );
    }

    #[test]
    fn port_must_agree_with_pin() {
        let src = "#define MX_DEVICE_VERSION 0x01000000
#define MX_I2C1 1
#define MX_I2C1_SDA_Pin PB9
#define MX_I2C1_SDA_GPIOx GPIOA
#define MX_I2C1_SDA_GPIO_Mode GPIO_MODE_AF_OD
";
        assert_eq!(
            parse_err(src),
            Error::InconsistentPin {
                line: 3,
                pin: PinId::new(Port::B, 9),
                attribute: Attribute::Port,
            }
        );
    }

    #[test]
    fn declaration_must_be_one() {
        let src = "#define MX_DEVICE_VERSION 0x01000000
#define MX_SPI1 2
";
        assert_eq!(
            parse_err(src),
            Error::InvalidValue {
                line: 2,
                attribute: Attribute::Declaration,
            }
        );
    }

    #[test]
    fn peripheral_capacity_is_an_error() {
        use core::fmt::Write;

        let mut src = std::string::String::from("#define MX_DEVICE_VERSION 0x01000000\n");
        for n in 1..=(MAX_PERIPHERALS + 1) {
            writeln!(src, "#define MX_SPI{n} 1").unwrap();
        }
        assert_eq!(
            parse_err(&src),
            Error::CapacityExceeded {
                line: 2 + MAX_PERIPHERALS,
                what: Capacity::Peripherals,
            }
        );
    }

    #[test]
    fn pin_capacity_is_an_error() {
        use core::fmt::Write;

        let mut src = std::string::String::from("#define MX_DEVICE_VERSION 0x01000000\n#define MX_TIM1 1\n");
        for ch in 1..=(MAX_PINS as u8 + 1) {
            writeln!(src, "#define MX_TIM1_CH{ch}_Pin PA{}", ch % 16).unwrap();
        }
        assert_eq!(
            parse_err(&src),
            Error::CapacityExceeded {
                line: 3 + MAX_PINS,
                what: Capacity::Pins,
            }
        );
    }

    #[test]
    fn errors_render() {
        let e = Error::MissingAttribute {
            line: 12,
            instance: Instance::Spi(1),
            signal: Signal::Mosi,
            attribute: Attribute::Mode,
        };
        assert_eq!(std::format!("{e}"), "line 12: SPI1 MOSI has no _GPIO_Mode");
    }
}
