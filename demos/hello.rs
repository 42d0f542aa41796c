use color_eyre::eyre::Result;

use bytecomp::{assemble, Config, Processor};
use log::LevelFilter;
use simple_logger::SimpleLogger;

const PROGRAM: &str = r#"
%macro PUT c
    LOAD c
    DISP
%endmacro

    LOAD 0x12       ; row 1, column 2
    CURS
    PUT 0x48        ; H
    PUT 0x45        ; E
    PUT 0x4C        ; L
    PUT 0x4C        ; L
    PUT 0x4F        ; O
    HALT
"#;

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .init()
        .unwrap(); // logging

    let program = assemble(PROGRAM)?;
    let mut cpu = Processor::new(Config::default());
    cpu.load_program(&program);
    cpu.run()?;

    print!("{}", cpu.display().render_text());

    Ok(())
}
