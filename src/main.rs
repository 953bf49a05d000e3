use clap::Parser;
use dotmatrix::gb::Emulator;
use dotmatrix::gb::cartridge::Cartridge;
use dotmatrix::gb::serial::SerialTransfer;
use std::path::PathBuf;
use std::process::ExitCode;

/// Headless runner for the emulator core. Frames and audio are produced but
/// discarded, serial output can be echoed for test ROMs.
/// Set RUST_LOG=trace for instruction level tracing.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Path of the ROM to load
    rom: PathBuf,

    /// Number of frames to run before exiting
    #[arg(long, default_value_t = 60 * 60)]
    frames: u32,

    /// Echo serial port writes to stdout
    #[arg(long)]
    print_serial: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let cartridge = match Cartridge::try_from(args.rom.as_path()) {
        Ok(cartridge) => cartridge,
        Err(err) => {
            eprintln!("Unable to load cartridge: {err}");
            return ExitCode::FAILURE;
        }
    };
    println!("Loaded cartridge: {cartridge}");

    let mut emulator = Emulator::new(cartridge);
    emulator.bus.serial = SerialTransfer::new(args.print_serial);

    for _ in 0..args.frames {
        if let Err(err) = emulator.step_frame() {
            eprintln!("Emulation halted: {err}");
            return ExitCode::FAILURE;
        }
        // No audio device is attached, drop the collected samples
        emulator.drain_audio();
    }
    ExitCode::SUCCESS
}
