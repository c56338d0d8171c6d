//! Translates assembly for a small 15-bit educational machine into its
//! loadable object format in a two-pass manner
//!
//! The machine has a 15-bit word, 8 registers (`r0`..`r7`) and a
//! 4096-word memory whose programs load at address 100. Assembly source
//! (`.as` files) is line-oriented; a line holds an optional label
//! followed by a directive or an instruction:
//!
//! ```ignore
//! ; compute and print
//! MAIN: mov  r3, LEN
//!       prn  #-5
//!       jsr  FUNC
//!       stop
//! LEN:  .data 6, -9, 15
//! MSG:  .string "hello"
//! .entry  MAIN
//! .extern FUNC
//! ```
//!
//! Sixteen mnemonics are recognized: `mov cmp add sub lea clr not inc
//! dec jmp bne red prn jsr rts stop`. Operands use four addressing
//! modes: immediate (`#-5`), direct (a label), indirect register
//! (`*r2`) and direct register (`r2`). Which modes each mnemonic
//! accepts is fixed by the instruction table in [instructions].
//!
//! Directives: `.data` appends integers to the data image, `.string`
//! appends a zero-terminated character sequence, `.extern` declares a
//! symbol defined elsewhere and `.entry` exports a symbol defined here.
//!
//! Before the two passes a pre-processor expands parameterless macros:
//!
//! ```ignore
//! macr TWICE
//!     add r1, r1
//! endmacr
//! TWICE       ; replaced by the body
//! ```
//!
//! The first pass lexes every line, assigns addresses, builds the
//! symbol table and emits the data image plus a partially-filled
//! instruction image; the second pass resolves symbolic operands,
//! applies `.entry` markers and collects external references. A
//! defective line is reported and skipped; any error suppresses output
//! for the whole file. Per input stem the assembler writes `<stem>.ob`
//! (always, on success), `<stem>.ent` (when a symbol is an entry) and
//! `<stem>.ext` (when an external symbol is referenced).

pub mod emitter;
pub mod first_pass;
pub mod images;
pub mod instructions;
pub mod preprocessor;
pub mod second_pass;
pub mod statement;
pub mod symbols;

#[cfg(test)]
mod test;

use std::{fmt, fs};

use colored::Colorize;
use statement::TokenSpan;

use crate::logging;

/// A machine word; only the low 15 bits are ever set
pub type Word = u16;

/// Mask selecting the 15 payload bits of a [Word]
pub const WORD_MASK: Word = 0x7FFF;

/// Total number of memory words
pub const MEMORY_SIZE: usize = 4096;

/// Address the first instruction word is loaded at
pub const LOAD_ADDRESS: usize = 100;

/// Longest accepted source line, terminator excluded
pub const MAX_LINE_LENGTH: usize = 80;

/// Longest accepted identifier
pub const MAX_LABEL_LENGTH: usize = 31;

/// The rendered output files of one successful assembly.
/// `entries` and `externals` are `None` when the corresponding file
/// has nothing to report and must not be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    pub object: String,
    pub entries: Option<String>,
    pub externals: Option<String>,
}

/// Assemble source text into the three output artifacts.
///
/// On failure returns every line error found, in source order. Output
/// is all-or-nothing: a single line error suppresses all three
/// artifacts.
pub fn assemble(source: &str) -> Result<Artifacts, Vec<Error>> {
    let (expanded, macros, mut errors) = preprocessor::preprocess(source);
    let mut pass_one = first_pass::run(&expanded, &macros);
    errors.append(&mut pass_one.errors);
    if !errors.is_empty() {
        return Err(errors);
    }

    let externals = second_pass::run(
        &mut pass_one.symbols,
        &mut pass_one.code,
        &pass_one.statements,
    )?;

    Ok(Artifacts {
        object: emitter::render_object(&pass_one.code, &pass_one.data),
        entries: emitter::render_entries(&pass_one.symbols),
        externals: emitter::render_externals(&externals),
    })
}

/// Assemble `<stem>.as` and write `<stem>.ob` / `<stem>.ent` /
/// `<stem>.ext` next to it.
///
/// Line errors are reported on stderr and yield `Ok(false)` with no
/// files written. The `Err` arm is reserved for fatal I/O failures.
pub fn assemble_file(stem: &str) -> Result<bool, Error> {
    let source_path = format!("{}.as", stem);
    let source = fs::read_to_string(&source_path).map_err(|_| Error::ReadError {
        path: source_path.clone(),
    })?;

    let artifacts = match assemble(&source) {
        Ok(artifacts) => artifacts,
        Err(errors) => {
            for error in &errors {
                logging::error(&error.to_string());
            }
            logging::error(&format!(
                "{}: {} error(s), no output written",
                source_path,
                errors.len()
            ));
            return Ok(false);
        }
    };

    write_artifact(&format!("{}.ob", stem), &artifacts.object)?;
    if let Some(entries) = &artifacts.entries {
        write_artifact(&format!("{}.ent", stem), entries)?;
    }
    if let Some(externals) = &artifacts.externals {
        write_artifact(&format!("{}.ext", stem), externals)?;
    }
    Ok(true)
}

fn write_artifact(path: &str, contents: &str) -> Result<(), Error> {
    fs::write(path, contents).map_err(|_| Error::WriteError {
        path: path.to_string(),
    })
}

/// An error that can occur during the assembly process.
///
/// Everything except [Error::ReadError] and [Error::WriteError] is a
/// line error: the offending line is skipped, the rest of the file is
/// still checked, and no output files are produced.
#[derive(Debug, Clone)]
pub enum Error {
    /// A source line exceeds [MAX_LINE_LENGTH] characters
    LineTooLong {
        length: usize,
        line_number: usize,
        line: String,
    },
    /// A `.string` argument has no closing quote
    UnterminatedString {
        span: TokenSpan,
        line_number: usize,
        line: String,
    },
    /// A lexeme in a numeric position is not a signed decimal integer
    BadNumber {
        lexeme: String,
        span: TokenSpan,
        line_number: usize,
        line: String,
    },
    /// A numeric literal does not fit the field it is destined for
    NumberOutOfRange {
        value: i64,
        min: i64,
        max: i64,
        span: TokenSpan,
        line_number: usize,
        line: String,
    },
    /// A register operand names no register in `r0`..`r7`
    BadRegister {
        lexeme: String,
        span: TokenSpan,
        line_number: usize,
        line: String,
    },
    /// A comma begins or ends the operand list, doubles up, or is
    /// missing between two operands
    BadComma {
        span: TokenSpan,
        line_number: usize,
        line: String,
    },
    /// The operation token is no known mnemonic or directive
    UnknownMnemonic {
        mnemonic: String,
        span: TokenSpan,
        line_number: usize,
        line: String,
    },
    /// An instruction has the wrong number of operands
    OperandCountMismatch {
        mnemonic: String,
        expected: usize,
        found: usize,
        extra_spans: Vec<TokenSpan>,
        line_number: usize,
        line: String,
    },
    /// An operand uses an addressing mode its mnemonic does not permit
    IllegalAddressingMode {
        mnemonic: String,
        operand: String,
        span: TokenSpan,
        line_number: usize,
        line: String,
    },
    /// An operand is neither immediate, register form nor identifier
    InvalidOperand {
        lexeme: String,
        span: TokenSpan,
        line_number: usize,
        line: String,
    },
    /// A symbol is defined a second time
    DuplicateLabel {
        label: String,
        span: TokenSpan,
        line_number: usize,
        line: String,
    },
    /// A symbol name collides with a mnemonic, directive, register,
    /// macro keyword or defined macro
    ReservedName {
        name: String,
        span: TokenSpan,
        line_number: usize,
        line: String,
    },
    /// A symbol name exceeds [MAX_LABEL_LENGTH] characters
    LabelTooLong {
        label: String,
        span: TokenSpan,
        line_number: usize,
        line: String,
    },
    /// A name is not of identifier shape (leading alphabetic,
    /// alphanumeric tail)
    MalformedName {
        name: String,
        span: TokenSpan,
        line_number: usize,
        line: String,
    },
    /// A direct operand names a symbol never defined or declared
    UnknownSymbol {
        name: String,
        span: TokenSpan,
        line_number: usize,
        line: String,
    },
    /// `.entry` names a symbol not defined in this file
    EntryUndefined {
        name: String,
        span: TokenSpan,
        line_number: usize,
        line: String,
    },
    /// `.entry` names a symbol declared `.extern`
    EntryExternal {
        name: String,
        span: TokenSpan,
        line_number: usize,
        line: String,
    },
    /// Tokens remain after a complete directive or operand list
    ExtraneousText {
        span: TokenSpan,
        line_number: usize,
        line: String,
    },
    /// A directive is missing its argument
    MissingOperand {
        expected: &'static str,
        line_number: usize,
        line: String,
    },
    /// A label with nothing after it
    MissingOperation {
        line_number: usize,
        line: String,
    },
    /// `macr` names an already defined macro
    MacroRedefinition {
        name: String,
        line_number: usize,
        line: String,
    },
    /// A macro invocation line carries tokens after the macro name
    MacroCallExtraTokens {
        name: String,
        line_number: usize,
        line: String,
    },
    /// `macr`, `endmacr` or a macro name used other than as the first
    /// token of a line
    MacroNameMisused {
        name: String,
        span: TokenSpan,
        line_number: usize,
        line: String,
    },
    /// `endmacr` with no definition open
    StrayEndmacr {
        line_number: usize,
        line: String,
    },
    /// `macr` inside a macro body
    NestedMacro {
        line_number: usize,
        line: String,
    },
    /// A macro definition runs into end of input
    UnterminatedMacro {
        name: String,
        line_number: usize,
    },
    /// Code and data together exceed the memory above the load origin
    MemoryOverflow {
        line_number: usize,
        line: String,
    },
    /// The source file could not be read
    ReadError { path: String },
    /// An output file could not be created or written
    WriteError { path: String },
}

impl std::error::Error for Error {}

fn underline_spans(line: &str, spans: Vec<&TokenSpan>) -> String {
    let mut underline = vec![' '; line.len()];
    for span in spans {
        for i in span.start()..span.end() {
            if i < underline.len() {
                underline[i] = '^';
            }
        }
    }
    underline.into_iter().collect()
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (message, line, line_number, underlined_spans): (
            String,
            Option<&String>,
            Option<&usize>,
            Vec<&TokenSpan>,
        ) = match self {
            Error::LineTooLong { length, line_number, line } => (
                format!(
                    "line {} is {} characters long, the maximum is {}",
                    line_number, length, MAX_LINE_LENGTH
                ),
                Some(line), Some(line_number), vec![],
            ),
            Error::UnterminatedString { span, line_number, line } => (
                format!("unterminated string literal at line {}", line_number),
                Some(line), Some(line_number), vec![span],
            ),
            Error::BadNumber { lexeme, span, line_number, line } => (
                format!("invalid numeric literal \"{}\" at line {}", lexeme, line_number),
                Some(line), Some(line_number), vec![span],
            ),
            Error::NumberOutOfRange { value, min, max, span, line_number, line } => (
                format!(
                    "number {} at line {} is outside the range {}..{}",
                    value, line_number, min, max
                ),
                Some(line), Some(line_number), vec![span],
            ),
            Error::BadRegister { lexeme, span, line_number, line } => (
                format!(
                    "invalid register \"{}\" at line {}, expected r0..r7",
                    lexeme, line_number
                ),
                Some(line), Some(line_number), vec![span],
            ),
            Error::BadComma { span, line_number, line } => (
                format!("misplaced or missing comma in operand list at line {}", line_number),
                Some(line), Some(line_number), vec![span],
            ),
            Error::UnknownMnemonic { mnemonic, span, line_number, line } => (
                format!(
                    "unknown mnemonic or directive \"{}\" at line {}",
                    mnemonic, line_number
                ),
                Some(line), Some(line_number), vec![span],
            ),
            Error::OperandCountMismatch { mnemonic, expected, found, extra_spans, line_number, line } => (
                format!(
                    "\"{}\" at line {} takes {} operand(s), found {}",
                    mnemonic, line_number, expected, found
                ),
                Some(line), Some(line_number), extra_spans.iter().collect(),
            ),
            Error::IllegalAddressingMode { mnemonic, operand, span, line_number, line } => (
                format!(
                    "operand \"{}\" at line {} uses an addressing mode \"{}\" does not permit",
                    operand, line_number, mnemonic
                ),
                Some(line), Some(line_number), vec![span],
            ),
            Error::InvalidOperand { lexeme, span, line_number, line } => (
                format!("invalid operand \"{}\" at line {}", lexeme, line_number),
                Some(line), Some(line_number), vec![span],
            ),
            Error::DuplicateLabel { label, span, line_number, line } => (
                format!("symbol \"{}\" at line {} is already defined", label, line_number),
                Some(line), Some(line_number), vec![span],
            ),
            Error::ReservedName { name, span, line_number, line } => (
                format!(
                    "\"{}\" at line {} is a reserved word or macro name and cannot name a symbol",
                    name, line_number
                ),
                Some(line), Some(line_number), vec![span],
            ),
            Error::LabelTooLong { label, span, line_number, line } => (
                format!(
                    "symbol \"{}\" at line {} is longer than {} characters",
                    label, line_number, MAX_LABEL_LENGTH
                ),
                Some(line), Some(line_number), vec![span],
            ),
            Error::MalformedName { name, span, line_number, line } => (
                format!("\"{}\" at line {} is not a valid identifier", name, line_number),
                Some(line), Some(line_number), vec![span],
            ),
            Error::UnknownSymbol { name, span, line_number, line } => (
                format!("undefined symbol \"{}\" at line {}", name, line_number),
                Some(line), Some(line_number), vec![span],
            ),
            Error::EntryUndefined { name, span, line_number, line } => (
                format!(
                    ".entry at line {} names \"{}\", which is not defined in this file",
                    line_number, name
                ),
                Some(line), Some(line_number), vec![span],
            ),
            Error::EntryExternal { name, span, line_number, line } => (
                format!(
                    ".entry at line {} names \"{}\", which is declared .extern",
                    line_number, name
                ),
                Some(line), Some(line_number), vec![span],
            ),
            Error::ExtraneousText { span, line_number, line } => (
                format!("extraneous text after the operands at line {}", line_number),
                Some(line), Some(line_number), vec![span],
            ),
            Error::MissingOperand { expected, line_number, line } => (
                format!("missing operand at line {}: expected {}", line_number, expected),
                Some(line), Some(line_number), vec![],
            ),
            Error::MissingOperation { line_number, line } => (
                format!(
                    "label without an instruction or directive at line {}",
                    line_number
                ),
                Some(line), Some(line_number), vec![],
            ),
            Error::MacroRedefinition { name, line_number, line } => (
                format!("macro \"{}\" at line {} is already defined", name, line_number),
                Some(line), Some(line_number), vec![],
            ),
            Error::MacroCallExtraTokens { name, line_number, line } => (
                format!(
                    "macro \"{}\" invoked at line {} with trailing tokens",
                    name, line_number
                ),
                Some(line), Some(line_number), vec![],
            ),
            Error::MacroNameMisused { name, span, line_number, line } => (
                format!(
                    "\"{}\" at line {} may only appear as the first token of a line",
                    name, line_number
                ),
                Some(line), Some(line_number), vec![span],
            ),
            Error::StrayEndmacr { line_number, line } => (
                format!("endmacr at line {} without a matching macr", line_number),
                Some(line), Some(line_number), vec![],
            ),
            Error::NestedMacro { line_number, line } => (
                format!("macr at line {} inside another macro definition", line_number),
                Some(line), Some(line_number), vec![],
            ),
            Error::UnterminatedMacro { name, line_number } => (
                format!(
                    "macro \"{}\" starting at line {} is never closed by endmacr",
                    name, line_number
                ),
                None, None, vec![],
            ),
            Error::MemoryOverflow { line_number, line } => (
                format!(
                    "program no longer fits in the {} memory words above address {} (line {})",
                    MEMORY_SIZE - LOAD_ADDRESS,
                    LOAD_ADDRESS,
                    line_number
                ),
                Some(line), Some(line_number), vec![],
            ),
            Error::ReadError { path } => (
                format!("failed to read {}", path),
                None, None, vec![],
            ),
            Error::WriteError { path } => (
                format!("failed to write {}", path),
                None, None, vec![],
            ),
        };
        writeln!(f, "{}", message)?;
        if let (Some(line), Some(line_number)) = (line, line_number) {
            write!(f, "{}\t{}", line_number, line)?;
            if !underlined_spans.is_empty() {
                writeln!(f)?;
                write!(f, "\t{}", underline_spans(line, underlined_spans).green())?;
            }
        }
        Ok(())
    }
}
