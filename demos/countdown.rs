use std::io;

use color_eyre::eyre::Result;

use bytecomp::io::NoInput;
use bytecomp::{assemble, Config, Processor};
use log::LevelFilter;
use simple_logger::SimpleLogger;

const PROGRAM: &str = r#"
%macro NEWLINE
    LOAD 0x0A
    OUT
%endmacro

    LOAD 0x30       ; '0'
    STORE 2
    LOAD 1
    STORE 0         ; decrement
    LOAD 9
loop:
    STORE 1         ; counter
    ADD 2
    OUT
    LOAD 0          ; A = counter
    ADD 1
    SUB 0
    JNZ loop
    NEWLINE
    HALT
"#;

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .init()
        .unwrap(); // logging

    let program = assemble(PROGRAM)?;
    let mut cpu = Processor::with_io(Config::default(), NoInput, io::stdout());
    cpu.load_program(&program);
    cpu.run()?;

    Ok(())
}
