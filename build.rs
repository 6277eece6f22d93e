use std::env;
use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use board_config::device::{self, Device};
use board_config::peripheral::{Board, Instance, PeripheralConfig, VirtualMode};
use board_config::pin::{Mode, PinConfig, Signal};
use board_config::validate;
use board_config::BoardDescription;
use proc_macro2::{Ident, TokenStream};
use quote::{format_ident, quote};

const DEFAULT_DESCRIPTION: &str = "board/MX_Device.h";

fn selected_device() -> &'static Device {
    let selected = [
        (cfg!(feature = "stm32f401cc"), &device::STM32F401CC),
        (cfg!(feature = "stm32f411ce"), &device::STM32F411CE),
        (cfg!(feature = "stm32f407vg"), &device::STM32F407VG),
    ]
    .into_iter()
    .filter_map(|(on, device)| on.then_some(device))
    .collect::<Vec<_>>();

    match selected[..] {
        [device] => device,
        [] => panic!("No target device selected. Use --features stm32f401cc, stm32f411ce or stm32f407vg."),
        _ => panic!("More than one target device selected, pick one."),
    }
}

fn description_path() -> PathBuf {
    let manifest_dir = PathBuf::from(env::var_os("CARGO_MANIFEST_DIR").unwrap());
    match env::var_os("FEED_BOARD_DESCRIPTION") {
        Some(path) => manifest_dir.join(path),
        None => manifest_dir.join(DEFAULT_DESCRIPTION),
    }
}

// Fieldless enums print their variant name with Debug.
fn variant(value: impl Debug) -> Ident {
    format_ident!("{}", format!("{value:?}"))
}

fn instance_tokens(instance: Instance) -> TokenStream {
    let path = quote!(::board_config::peripheral::Instance);
    match instance {
        Instance::Adc(n) => quote!(#path::Adc(#n)),
        Instance::Can(n) => quote!(#path::Can(#n)),
        Instance::Dac => quote!(#path::Dac),
        Instance::I2c(n) => quote!(#path::I2c(#n)),
        Instance::I2s(n) => quote!(#path::I2s(#n)),
        Instance::Sdio => quote!(#path::Sdio),
        Instance::Spi(n) => quote!(#path::Spi(#n)),
        Instance::Tim(n) => quote!(#path::Tim(#n)),
        Instance::Usart(n) => quote!(#path::Usart(#n)),
        Instance::Uart(n) => quote!(#path::Uart(#n)),
        Instance::UsbDevice => quote!(#path::UsbDevice),
        Instance::UsbHost => quote!(#path::UsbHost),
        Instance::UsbOtgFs => quote!(#path::UsbOtgFs),
        Instance::UsbOtgHs => quote!(#path::UsbOtgHs),
    }
}

fn signal_tokens(signal: Signal) -> TokenStream {
    let path = quote!(::board_config::pin::Signal);
    match signal {
        Signal::Channel(n) => quote!(#path::Channel(#n)),
        Signal::ComplementaryChannel(n) => quote!(#path::ComplementaryChannel(#n)),
        Signal::Input(n) => quote!(#path::Input(#n)),
        Signal::Output(n) => quote!(#path::Output(#n)),
        other => {
            let v = variant(other);
            quote!(#path::#v)
        }
    }
}

fn mode_tokens(mode: Mode) -> TokenStream {
    let path = quote!(::board_config::pin::Mode);
    match mode {
        Mode::Input => quote!(#path::Input),
        Mode::Analog => quote!(#path::Analog),
        Mode::Output(t) | Mode::Alternate(t) => {
            let kind = if mode.is_alternate() {
                quote!(Alternate)
            } else {
                quote!(Output)
            };
            let t = variant(t);
            quote!(#path::#kind(::board_config::pin::OutputType::#t))
        }
        Mode::Interrupt(edge) => {
            let edge = variant(edge);
            quote!(#path::Interrupt(::board_config::pin::Edge::#edge))
        }
        Mode::Event(edge) => {
            let edge = variant(edge);
            quote!(#path::Event(::board_config::pin::Edge::#edge))
        }
    }
}

fn virtual_mode_tokens(mode: Option<VirtualMode>) -> TokenStream {
    let path = quote!(::board_config::peripheral);
    match mode {
        None => quote!(None),
        Some(VirtualMode::UsbDevice { class, speed }) => {
            let class = variant(class);
            let speed = variant(speed);
            quote!(Some(#path::VirtualMode::UsbDevice {
                class: #path::UsbClass::#class,
                speed: #path::UsbSpeed::#speed,
            }))
        }
        Some(VirtualMode::Otg(otg)) => {
            let otg = variant(otg);
            quote!(Some(#path::VirtualMode::Otg(#path::OtgMode::#otg)))
        }
        Some(VirtualMode::Serial(serial)) => {
            let serial = variant(serial);
            quote!(Some(#path::VirtualMode::Serial(#path::SerialMode::#serial)))
        }
    }
}

fn pin_ident(instance: Instance, pin: &PinConfig) -> Ident {
    format_ident!("{}_{}", instance.to_string(), pin.signal.to_string())
}

fn pin_tokens(instance: Instance, pin: &PinConfig) -> TokenStream {
    let ident = pin_ident(instance, pin);
    let doc = format!(" {} {} on {}.", instance, pin.signal, pin.pin);
    let signal = signal_tokens(pin.signal);
    let port = variant(pin.pin.port);
    let number = pin.pin.number;
    let mode = mode_tokens(pin.mode);
    let pull = variant(pin.pull);
    let speed = variant(pin.speed);
    let af = match pin.af {
        None => quote!(None),
        Some(af) => {
            let index = af.index;
            let peripheral = match af.peripheral {
                Some(p) => {
                    let p = instance_tokens(p);
                    quote!(Some(#p))
                }
                None => quote!(None),
            };
            quote!(Some(::board_config::pin::AltFunction {
                index: #index,
                peripheral: #peripheral,
            }))
        }
    };

    quote! {
        #[doc = #doc]
        pub const #ident: ::board_config::pin::PinConfig = ::board_config::pin::PinConfig {
            signal: #signal,
            pin: ::board_config::pin::PinId::new(::board_config::pin::Port::#port, #number),
            mode: #mode,
            pull: ::board_config::pin::Pull::#pull,
            speed: ::board_config::pin::Speed::#speed,
            af: #af,
        };
    }
}

fn peripheral_tokens(peripheral: &PeripheralConfig<'_>) -> TokenStream {
    let ident = format_ident!("{}", peripheral.instance.to_string());
    let instance = instance_tokens(peripheral.instance);
    let clock_hz = match peripheral.clock_hz {
        Some(hz) => quote!(Some(#hz)),
        None => quote!(None),
    };
    let mode = virtual_mode_tokens(peripheral.mode);
    let pins = peripheral
        .pins
        .iter()
        .map(|p| pin_ident(peripheral.instance, p));

    quote! {
        pub const #ident: ::board_config::peripheral::PeripheralConfig<'static> =
            ::board_config::peripheral::PeripheralConfig {
                instance: #instance,
                clock_hz: #clock_hz,
                mode: #mode,
                pins: &[#(#pins),*],
            };
    }
}

fn generate(board: &Board<'_>, device: &Device) -> TokenStream {
    let version = board.version;
    let pins = board.pins().map(|(p, pin)| pin_tokens(p.instance, pin));
    let peripherals = board.peripherals.iter().map(peripheral_tokens);
    let idents = board
        .peripherals
        .iter()
        .map(|p| format_ident!("{}", p.instance.to_string()));
    let device = format_ident!("{}", device.name);

    quote! {
        /// `MX_DEVICE_VERSION` of the description.
        pub const VERSION: u32 = #version;

        #(#pins)*

        #(#peripherals)*

        pub const BOARD: ::board_config::peripheral::Board<'static> =
            ::board_config::peripheral::Board {
                version: VERSION,
                peripherals: &[#(#idents),*],
            };

        /// Device the description was checked against.
        pub const DEVICE: &::board_config::device::Device = &::board_config::device::#device;
    }
}

fn load(path: &Path, device: &Device) -> TokenStream {
    let src = fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("can't read board description {}: {e}", path.display()));

    let description = BoardDescription::parse(&src)
        .unwrap_or_else(|e| panic!("{}: {e}", path.display()));
    let configs = description.configs();
    let board = Board::new(description.version(), &configs);

    let report = validate::check(&board, device);
    for warning in report.warnings() {
        println!("cargo:warning={}: {warning}", path.display());
    }
    if report.has_errors() {
        let mut message = format!("{} isn't valid for {}:", path.display(), device.name);
        for error in report.errors() {
            message.push_str(&format!("\n  {error}"));
        }
        if report.dropped() > 0 {
            message.push_str(&format!("\n  ...and {} more", report.dropped()));
        }
        panic!("{message}");
    }

    generate(&board, device)
}

fn main() {
    let device = selected_device();
    let path = description_path();

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed={}", path.display());
    println!("cargo:rerun-if-env-changed=FEED_BOARD_DESCRIPTION");

    let g = load(&path, device);

    let out_dir = env::var_os("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("board.rs");

    fs::write(&dest_path, g.to_string()).unwrap();

    if cfg!(feature = "firmware") {
        println!("cargo:rustc-link-arg-bins=--nmagic");
        println!("cargo:rustc-link-arg-bins=-Tlink.x");
        println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
    }
}
