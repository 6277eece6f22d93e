//! Checks a board against the device it's meant for.

use heapless::Vec;

use crate::device::{self, Device};
use crate::peripheral::{Board, Instance, PeripheralConfig, VirtualMode};
use crate::pin::{Mode, PinConfig, PinId, Signal};

pub const MAX_ISSUES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Issue {
    #[error("{instance} {signal}: {pin} is not bonded out on {device}")]
    PinNotOnDevice {
        instance: Instance,
        signal: Signal,
        pin: PinId,
        device: &'static str,
    },
    #[error("{pin} is claimed by both {first} {first_signal} and {second} {second_signal}")]
    PinConflict {
        pin: PinId,
        first: Instance,
        first_signal: Signal,
        second: Instance,
        second_signal: Signal,
    },
    #[error("{instance} {signal}: alternate mode without an alternate function")]
    MissingAlternateFunction { instance: Instance, signal: Signal },
    #[error("{instance} {signal}: AF{index} routes {owner}")]
    ForeignAlternateFunction {
        instance: Instance,
        signal: Signal,
        index: u8,
        owner: Instance,
    },
    #[error("{instance} {signal}: AF{index} given but the pin isn't in alternate mode")]
    UnusedAlternateFunction {
        instance: Instance,
        signal: Signal,
        index: u8,
    },
    #[error("{instance} {signal}: no known routing on {pin} AF{index}")]
    UnknownRouting {
        instance: Instance,
        signal: Signal,
        pin: PinId,
        index: u8,
    },
    #[error("{instance} {signal}: {pin} is set up as an input, its EXTI line is left alone")]
    ExtiNotConfigured {
        instance: Instance,
        signal: Signal,
        pin: PinId,
    },
    #[error("{instance}: clock is 0 Hz")]
    ZeroClock { instance: Instance },
    #[error("{instance}: {hz} Hz is above the {ceiling} Hz its bus allows")]
    ClockTooHigh {
        instance: Instance,
        hz: u32,
        ceiling: u32,
    },
    #[error("{instance}: virtual mode doesn't apply to this peripheral")]
    MisplacedVirtualMode { instance: Instance },
    #[error("USB device middleware without an OTG core that can act as a device")]
    NoUsbDeviceCore,
}

impl Issue {
    pub const fn severity(&self) -> Severity {
        match self {
            Issue::UnusedAlternateFunction { .. }
            | Issue::UnknownRouting { .. }
            | Issue::ExtiNotConfigured { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// Outcome of [`check`]. Issues past [`MAX_ISSUES`] are counted but dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    issues: Vec<Issue, MAX_ISSUES>,
    dropped: usize,
}

impl Report {
    fn push(&mut self, issue: Issue) {
        match issue.severity() {
            Severity::Error => warn!("board error: {}", issue),
            Severity::Warning => debug!("board warning: {}", issue),
        }
        if self.issues.push(issue).is_err() {
            self.dropped += 1;
        }
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues
            .iter()
            .filter(|i| i.severity() == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues
            .iter()
            .filter(|i| i.severity() == Severity::Warning)
    }

    /// True when there's at least one error, including dropped issues we
    /// can no longer classify.
    pub fn has_errors(&self) -> bool {
        self.dropped > 0 || self.errors().next().is_some()
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty() && self.dropped == 0
    }

    /// Issues that didn't fit.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

pub fn check(board: &Board<'_>, device: &Device) -> Report {
    let mut report = Report::default();

    for peripheral in board.peripherals {
        check_clock(&mut report, peripheral, device);
        check_mode(&mut report, peripheral);
        for pin in peripheral.pins {
            check_pin(&mut report, peripheral.instance, pin, device);
        }
    }

    check_conflicts(&mut report, board);
    check_usb(&mut report, board);

    report
}

fn check_clock(report: &mut Report, peripheral: &PeripheralConfig<'_>, device: &Device) {
    let instance = peripheral.instance;
    let Some(hz) = peripheral.clock_hz else {
        return;
    };
    if hz == 0 {
        report.push(Issue::ZeroClock { instance });
        return;
    }
    if let Some(ceiling) = device.clock_ceiling_hz(instance) {
        if hz > ceiling {
            report.push(Issue::ClockTooHigh {
                instance,
                hz,
                ceiling,
            });
        }
    }
}

fn check_mode(report: &mut Report, peripheral: &PeripheralConfig<'_>) {
    let instance = peripheral.instance;
    let fits = match (instance, peripheral.mode) {
        (_, None) => true,
        (Instance::UsbDevice, Some(VirtualMode::UsbDevice { .. })) => true,
        (Instance::UsbOtgFs | Instance::UsbOtgHs, Some(VirtualMode::Otg(_))) => true,
        (Instance::Usart(_), Some(VirtualMode::Serial(_))) => true,
        (Instance::Uart(_), Some(VirtualMode::Serial(mode))) => mode.fits_uart(),
        _ => false,
    };
    if !fits {
        report.push(Issue::MisplacedVirtualMode { instance });
    }
}

fn check_pin(report: &mut Report, instance: Instance, pin: &PinConfig, device: &Device) {
    let signal = pin.signal;

    if !device.has_pin(pin.pin) {
        report.push(Issue::PinNotOnDevice {
            instance,
            signal,
            pin: pin.pin,
            device: device.name,
        });
    }

    if let Mode::Interrupt(_) | Mode::Event(_) = pin.mode {
        report.push(Issue::ExtiNotConfigured {
            instance,
            signal,
            pin: pin.pin,
        });
    }

    match (pin.mode.is_alternate(), pin.af) {
        (true, None) => report.push(Issue::MissingAlternateFunction { instance, signal }),
        (false, Some(af)) => report.push(Issue::UnusedAlternateFunction {
            instance,
            signal,
            index: af.index,
        }),
        (true, Some(af)) => {
            if let Some(owner) = af.peripheral.filter(|owner| !same_block(*owner, instance)) {
                report.push(Issue::ForeignAlternateFunction {
                    instance,
                    signal,
                    index: af.index,
                    owner,
                });
                return;
            }

            let mut known = device::routes(instance, signal).peekable();
            if known.peek().is_some() && !known.any(|r| r.pin == pin.pin && r.af == af.index) {
                report.push(Issue::UnknownRouting {
                    instance,
                    signal,
                    pin: pin.pin,
                    index: af.index,
                });
            }
        }
        (false, None) => {}
    }
}

// I2S runs on the SPI block, and the HAL names its AFs after the SPI
// (`GPIO_AF5_SPI2` for I2S2).
fn same_block(a: Instance, b: Instance) -> bool {
    match (a, b) {
        (Instance::Spi(n), Instance::I2s(m)) | (Instance::I2s(n), Instance::Spi(m)) => n == m,
        _ => a == b,
    }
}

fn check_conflicts(report: &mut Report, board: &Board<'_>) {
    for (i, (first, first_pin)) in board.pins().enumerate() {
        // only report against the first claim so a pin used three times
        // doesn't produce three pairs
        if let Some((second, second_pin)) = board.pins().skip(i + 1).find(|(_, p)| p.pin == first_pin.pin) {
            if board
                .pins()
                .take(i)
                .any(|(_, p)| p.pin == first_pin.pin)
            {
                continue;
            }
            report.push(Issue::PinConflict {
                pin: first_pin.pin,
                first: first.instance,
                first_signal: first_pin.signal,
                second: second.instance,
                second_signal: second_pin.signal,
            });
        }
    }
}

fn check_usb(report: &mut Report, board: &Board<'_>) {
    if board.peripheral(Instance::UsbDevice).is_none() {
        return;
    }
    let has_core = board
        .peripherals
        .iter()
        .filter(|p| p.instance.is_otg_core())
        .any(|p| match p.mode {
            Some(VirtualMode::Otg(mode)) => mode.can_be_device(),
            _ => true,
        });
    if !has_core {
        report.push(Issue::NoUsbDeviceCore);
    }
}
