//! Turns pin records into GPIO register writes.

use heapless::Vec;

use crate::peripheral::Board;
use crate::pin::{Mode, PinConfig, Port};

/// GPIO configuration registers, AFR split into its low and high halves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    Moder,
    Otyper,
    Ospeedr,
    Pupdr,
    Afrl,
    Afrh,
}

impl Register {
    /// Order writes are issued in. MODER goes last so a pin only switches
    /// function once everything else about it is in place.
    pub const WRITE_ORDER: [Register; 6] = [
        Register::Otyper,
        Register::Ospeedr,
        Register::Pupdr,
        Register::Afrl,
        Register::Afrh,
        Register::Moder,
    ];
}

/// Masked update of one register.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Field {
    pub mask: u32,
    pub bits: u32,
}

impl Field {
    fn set(&mut self, shift: u32, width: u32, value: u32) {
        let mask = ((1 << width) - 1) << shift;
        self.mask |= mask;
        self.bits = (self.bits & !mask) | ((value << shift) & mask);
    }

    pub const fn is_empty(&self) -> bool {
        self.mask == 0
    }

    pub const fn apply(&self, current: u32) -> u32 {
        (current & !self.mask) | self.bits
    }
}

/// Everything to write to one port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PortPlan {
    pub port: Port,
    pub moder: Field,
    pub otyper: Field,
    pub ospeedr: Field,
    pub pupdr: Field,
    pub afrl: Field,
    pub afrh: Field,
}

impl PortPlan {
    pub const fn new(port: Port) -> Self {
        let empty = Field { mask: 0, bits: 0 };
        Self {
            port,
            moder: empty,
            otyper: empty,
            ospeedr: empty,
            pupdr: empty,
            afrl: empty,
            afrh: empty,
        }
    }

    pub const fn field(&self, register: Register) -> Field {
        match register {
            Register::Moder => self.moder,
            Register::Otyper => self.otyper,
            Register::Ospeedr => self.ospeedr,
            Register::Pupdr => self.pupdr,
            Register::Afrl => self.afrl,
            Register::Afrh => self.afrh,
        }
    }

    /// Non-empty writes, in [`Register::WRITE_ORDER`].
    pub fn writes(&self) -> impl Iterator<Item = (Register, Field)> + '_ {
        Register::WRITE_ORDER
            .into_iter()
            .map(|r| (r, self.field(r)))
            .filter(|(_, f)| !f.is_empty())
    }

    /// Adds one pin, following the vendor HAL: type and speed only for
    /// pins that drive the pad, no pull on analog pins, AFR only in
    /// alternate mode. EXTI modes are plain inputs here, the EXTI line itself
    /// is left to the application.
    pub fn add(&mut self, pin: &PinConfig) {
        let n = u32::from(pin.pin.number);

        if let Some(output) = pin.mode.output_type() {
            self.otyper.set(n, 1, output.bits());
            self.ospeedr.set(n * 2, 2, pin.speed.bits());
        }

        if pin.mode != Mode::Analog {
            self.pupdr.set(n * 2, 2, pin.pull.bits());
        }

        if let (Mode::Alternate(_), Some(af)) = (pin.mode, pin.af) {
            let afr = if n < 8 { &mut self.afrl } else { &mut self.afrh };
            afr.set((n % 8) * 4, 4, u32::from(af.index));
        }

        self.moder.set(n * 2, 2, pin.mode.moder_bits());
    }
}

/// Something that can update GPIO registers.
pub trait GpioBank {
    fn modify(&mut self, port: Port, register: Register, field: Field);
}

/// Register writes for a whole board, one [`PortPlan`] per touched port,
/// in port order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GpioPlan {
    ports: Vec<PortPlan, { Port::ALL.len() }>,
}

impl GpioPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_board(board: &Board<'_>) -> Self {
        let mut plan = Self::new();
        for (_, pin) in board.pins() {
            plan.add(pin);
        }
        plan
    }

    pub fn add(&mut self, pin: &PinConfig) {
        let port = pin.pin.port;
        let index = match self.ports.iter().position(|p| p.port >= port) {
            Some(i) if self.ports[i].port == port => i,
            Some(i) => {
                // at most one entry per port, so this always fits
                let _ = self.ports.insert(i, PortPlan::new(port));
                i
            }
            None => {
                let _ = self.ports.push(PortPlan::new(port));
                self.ports.len() - 1
            }
        };
        self.ports[index].add(pin);
    }

    pub fn port(&self, port: Port) -> Option<&PortPlan> {
        self.ports.iter().find(|p| p.port == port)
    }

    pub fn ports(&self) -> &[PortPlan] {
        &self.ports
    }

    pub fn apply<B: GpioBank>(&self, bank: &mut B) {
        for plan in &self.ports {
            trace!("configuring {}", plan.port);
            for (register, field) in plan.writes() {
                bank.modify(plan.port, register, field);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peripheral::{Instance, PeripheralConfig};
    use crate::pin::{AltFunction, Edge, OutputType, PinId, Pull, Signal, Speed};

    fn pin(port: Port, number: u8, mode: Mode, pull: Pull, speed: Speed, af: Option<u8>) -> PinConfig {
        PinConfig {
            signal: Signal::Channel(number),
            pin: PinId::new(port, number),
            mode,
            pull,
            speed,
            af: af.map(|index| AltFunction {
                index,
                peripheral: None,
            }),
        }
    }

    #[derive(Default)]
    struct FakeBank {
        regs: [[u32; 6]; 11],
        log: std::vec::Vec<(Port, Register)>,
    }

    impl GpioBank for FakeBank {
        fn modify(&mut self, port: Port, register: Register, field: Field) {
            let reg = &mut self.regs[port.index()][register as usize];
            *reg = field.apply(*reg);
            self.log.push((port, register));
        }
    }

    #[test]
    fn alternate_open_drain_high_pin() {
        let mut plan = PortPlan::new(Port::B);
        plan.add(&pin(
            Port::B,
            9,
            Mode::Alternate(OutputType::OpenDrain),
            Pull::Up,
            Speed::Low,
            Some(4),
        ));

        assert_eq!(plan.moder, Field { mask: 0b11 << 18, bits: 0b10 << 18 });
        assert_eq!(plan.otyper, Field { mask: 1 << 9, bits: 1 << 9 });
        assert_eq!(plan.ospeedr, Field { mask: 0b11 << 18, bits: 0 });
        assert_eq!(plan.pupdr, Field { mask: 0b11 << 18, bits: 0b01 << 18 });
        assert!(plan.afrl.is_empty());
        assert_eq!(plan.afrh, Field { mask: 0xf << 4, bits: 4 << 4 });
    }

    #[test]
    fn inputs_leave_output_stage_alone() {
        let mut plan = PortPlan::new(Port::A);
        plan.add(&pin(
            Port::A,
            0,
            Mode::Interrupt(Edge::Falling),
            Pull::Down,
            Speed::VeryHigh,
            None,
        ));
        plan.add(&pin(Port::A, 1, Mode::Analog, Pull::Up, Speed::Low, None));

        assert_eq!(plan.moder, Field { mask: 0b1111, bits: 0b1100 });
        assert!(plan.otyper.is_empty());
        assert!(plan.ospeedr.is_empty());
        assert_eq!(plan.pupdr, Field { mask: 0b11, bits: 0b10 });
    }

    #[test]
    fn ports_stay_sorted_and_writes_end_with_moder() {
        let pins = [
            pin(Port::C, 13, Mode::Output(OutputType::PushPull), Pull::None, Speed::Low, None),
            pin(Port::A, 5, Mode::Alternate(OutputType::PushPull), Pull::None, Speed::VeryHigh, Some(5)),
        ];
        let peripherals = [PeripheralConfig {
            instance: Instance::Tim(1),
            clock_hz: None,
            mode: None,
            pins: &pins,
        }];
        let plan = GpioPlan::for_board(&Board::new(0x0100_0000, &peripherals));

        let ports: std::vec::Vec<_> = plan.ports().iter().map(|p| p.port).collect();
        assert_eq!(ports, [Port::A, Port::C]);
        assert!(plan.port(Port::B).is_none());

        let mut bank = FakeBank::default();
        bank.regs[Port::A.index()][Register::Moder as usize] = 0xa800_0000;
        plan.apply(&mut bank);

        assert_eq!(
            bank.log,
            [
                (Port::A, Register::Otyper),
                (Port::A, Register::Ospeedr),
                (Port::A, Register::Pupdr),
                (Port::A, Register::Afrl),
                (Port::A, Register::Moder),
                (Port::C, Register::Otyper),
                (Port::C, Register::Ospeedr),
                (Port::C, Register::Pupdr),
                (Port::C, Register::Moder),
            ]
        );
        // existing bits outside the mask survive
        assert_eq!(bank.regs[Port::A.index()][Register::Moder as usize], 0xa800_0800);
        assert_eq!(bank.regs[Port::A.index()][Register::Afrl as usize], 0x0050_0000);
        assert_eq!(bank.regs[Port::C.index()][Register::Moder as usize], 0x0400_0000);
    }

    #[test]
    fn later_pin_overrides_earlier() {
        let mut plan = GpioPlan::new();
        plan.add(&pin(Port::B, 0, Mode::Input, Pull::Up, Speed::Low, None));
        plan.add(&pin(Port::B, 0, Mode::Input, Pull::Down, Speed::Low, None));
        assert_eq!(
            plan.port(Port::B).unwrap().pupdr,
            Field { mask: 0b11, bits: 0b10 }
        );
    }
}
