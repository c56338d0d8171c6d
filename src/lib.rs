//! A two-pass assembler for a small educational machine with a 15-bit
//! word, 8 registers and a 4096-word memory loaded at address 100

pub mod assembler;
pub mod logging;
