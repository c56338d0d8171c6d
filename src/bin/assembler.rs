use std::env;

use asm15::assembler;
use asm15::logging::error;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <stem> [<stem>...]   (assembles <stem>.as)", args[0]);
        return;
    }

    let mut fatal_failures = 0;
    for stem in &args[1..] {
        match assembler::assemble_file(stem) {
            Ok(_) => {}
            Err(e) => {
                error(&e.to_string());
                fatal_failures += 1;
            }
        }
    }

    if fatal_failures == args.len() - 1 {
        std::process::exit(2);
    }
}
