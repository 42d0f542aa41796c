use std::env;
use std::io;
use std::time::Duration;

use color_eyre::eyre::{eyre, Result};

use bytecomp::io::LineInput;
use bytecomp::memory::Memory;
use bytecomp::{Config, Processor};
use simple_logger::SimpleLogger;

/// Assembles and runs the `.asm` file given as the first argument. A second
/// argument sets the delay between instructions in milliseconds.
fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling
    SimpleLogger::new().init().unwrap(); // logging

    let mut args = env::args().skip(1);
    let path = args
        .next()
        .ok_or_else(|| eyre!("usage: assemble <file.asm> [delay-ms]"))?;

    let mut config = Config::default();
    if let Some(delay) = args.next() {
        config = config.with_delay(Duration::from_millis(delay.parse()?));
    }

    let mut cpu = Processor::with_io(config, LineInput::stdin(), io::stdout());
    cpu.memory = Memory::from_file(&path)?;
    let count = cpu.run()?;

    println!();
    println!("Executed {} instructions", count);
    if let Some(fault) = cpu.fault() {
        println!("Fault: {}", fault);
    }
    println!("{:?}", cpu.registers);
    println!("{:?}", cpu.flags);
    print!("{}", cpu.memory.dump());
    print!("{}", cpu.display().render_text());

    Ok(())
}
