use std::env;

use emu::elf;
use emu::emulator::Emulator;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("armlet v0.1.0");

    let args = env::args().skip(1).collect::<Vec<String>>();

    let image = match args.as_slice() {
        [image] => {
            println!("loading {image}");
            image
        }
        _ => {
            println!("usage: armlet <image>");
            std::process::exit(1)
        }
    };

    let mmu = match elf::load(image) {
        Ok(mmu) => mmu,
        Err(e) => {
            println!("{e}");
            std::process::exit(2);
        }
    };

    if let Err(fault) = Emulator::new(mmu, image.clone()).run() {
        println!("{fault}");
        std::process::exit(1);
    }
}
