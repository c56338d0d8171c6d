//! First pass: lexes every line of the expanded stream, defines
//! symbols, and fills the data image and the instruction image
//!
//! Direct (mode 1) operands are always left as zero placeholders here,
//! even when their symbol is already known: data symbols keep their
//! pre-relocation values until the pass ends, so writing any of them
//! early would bake in a stale address. The second pass rewrites every
//! one of them from the relocated symbol table.

use super::images::{DataImage, InstructionImage};
use super::instructions::{self, Mnemonic, Operand};
use super::preprocessor::MacroTable;
use super::statement::{self, Statement, TokenSpan};
use super::symbols::{SymbolKind, SymbolTable};
use crate::assembler::{Error, LOAD_ADDRESS, MAX_LABEL_LENGTH, MEMORY_SIZE, Word};
use crate::logging;

/// Everything the first pass hands onward
pub struct FirstPass<'a> {
    pub symbols: SymbolTable,
    pub code: InstructionImage,
    pub data: DataImage,
    /// Successfully processed statements, retained for the second pass
    pub statements: Vec<Statement<'a>>,
    pub errors: Vec<Error>,
}

/// Run the first pass over the pre-processed source.
///
/// Defective lines are recorded and skipped; the pass always reaches
/// the end of the input. Data symbols are relocated past the final
/// code image before returning.
pub fn run<'a>(source: &'a str, macros: &MacroTable) -> FirstPass<'a> {
    let mut pass = FirstPass {
        symbols: SymbolTable::new(),
        code: InstructionImage::new(),
        data: DataImage::new(),
        statements: Vec::new(),
        errors: Vec::new(),
    };
    let mut overflow_reported = false;

    for (index, line) in source.lines().enumerate() {
        let line_number = index + 1;
        let statement = match Statement::parse(line, line_number) {
            Ok(Some(statement)) => statement,
            Ok(None) => continue,
            Err(error) => {
                pass.errors.push(error);
                continue;
            }
        };

        match process(&statement, macros, &mut pass) {
            Ok(()) => pass.statements.push(statement),
            Err(error) => pass.errors.push(error),
        }

        if !overflow_reported && pass.code.len() + pass.data.len() > MEMORY_SIZE - LOAD_ADDRESS {
            pass.errors.push(Error::MemoryOverflow {
                line_number,
                line: line.to_string(),
            });
            overflow_reported = true;
        }
    }

    let ic_final = pass.code.len();
    pass.symbols.relocate_data(ic_final);
    pass
}

fn process<'a>(
    statement: &Statement<'a>,
    macros: &MacroTable,
    pass: &mut FirstPass<'a>,
) -> Result<(), Error> {
    match statement.operation() {
        ".data" => {
            let dc = pass.data.len() as u16;
            define_label(statement, macros, &mut pass.symbols, SymbolKind::Data, dc)?;
            encode_data(statement, &mut pass.data)
        }
        ".string" => {
            let dc = pass.data.len() as u16;
            define_label(statement, macros, &mut pass.symbols, SymbolKind::Data, dc)?;
            encode_string(statement, &mut pass.data)
        }
        ".extern" => declare_extern(statement, macros, &mut pass.symbols),
        ".entry" => {
            // applied by the second pass
            if statement.label().is_some() {
                logging::warning("label before .entry is ignored", statement.line_number());
            }
            Ok(())
        }
        operation => match Mnemonic::parse(operation) {
            Some(mnemonic) => encode_instruction(statement, mnemonic, macros, pass),
            None => Err(Error::UnknownMnemonic {
                mnemonic: operation.to_string(),
                span: statement.operation_span(),
                line_number: statement.line_number(),
                line: statement.line(),
            }),
        },
    }
}

fn define_label(
    statement: &Statement,
    macros: &MacroTable,
    symbols: &mut SymbolTable,
    kind: SymbolKind,
    value: u16,
) -> Result<(), Error> {
    let Some((label, span)) = statement.label() else {
        return Ok(());
    };
    validate_symbol_name(label, span, statement, macros)?;
    if !symbols.insert(label, value, kind) {
        return Err(Error::DuplicateLabel {
            label: label.to_string(),
            span,
            line_number: statement.line_number(),
            line: statement.line(),
        });
    }
    Ok(())
}

fn validate_symbol_name(
    name: &str,
    span: TokenSpan,
    statement: &Statement,
    macros: &MacroTable,
) -> Result<(), Error> {
    if !statement::is_identifier(name) {
        return Err(Error::MalformedName {
            name: name.to_string(),
            span,
            line_number: statement.line_number(),
            line: statement.line(),
        });
    }
    if name.chars().count() > MAX_LABEL_LENGTH {
        return Err(Error::LabelTooLong {
            label: name.to_string(),
            span,
            line_number: statement.line_number(),
            line: statement.line(),
        });
    }
    if instructions::is_reserved_word(name) || macros.contains(name) {
        return Err(Error::ReservedName {
            name: name.to_string(),
            span,
            line_number: statement.line_number(),
            line: statement.line(),
        });
    }
    Ok(())
}

fn encode_data(statement: &Statement, data: &mut DataImage) -> Result<(), Error> {
    if statement.n_operands() == 0 {
        return Err(Error::MissingOperand {
            expected: "at least one integer after .data",
            line_number: statement.line_number(),
            line: statement.line(),
        });
    }

    // parse the whole list before touching the image, so a defective
    // line contributes no words at all
    let mut values = Vec::with_capacity(statement.n_operands());
    for index in 0..statement.n_operands() {
        let lexeme = statement.operand(index);
        let value: i64 = lexeme.parse().map_err(|_| Error::BadNumber {
            lexeme: lexeme.to_string(),
            span: statement.operand_span(index),
            line_number: statement.line_number(),
            line: statement.line(),
        })?;
        if !(instructions::DATA_MIN..=instructions::DATA_MAX).contains(&value) {
            return Err(Error::NumberOutOfRange {
                value,
                min: instructions::DATA_MIN,
                max: instructions::DATA_MAX,
                span: statement.operand_span(index),
                line_number: statement.line_number(),
                line: statement.line(),
            });
        }
        values.push(value);
    }

    for value in values {
        data.push_int(value);
    }
    Ok(())
}

fn encode_string(statement: &Statement, data: &mut DataImage) -> Result<(), Error> {
    if statement.n_operands() == 0 {
        return Err(Error::MissingOperand {
            expected: "a quoted string after .string",
            line_number: statement.line_number(),
            line: statement.line(),
        });
    }
    let lexeme = statement.operand(0);
    if !lexeme.starts_with('"') {
        return Err(statement.invalid_operand(0));
    }
    if lexeme.len() < 2 || !lexeme.ends_with('"') {
        return Err(Error::UnterminatedString {
            span: statement.operand_span(0),
            line_number: statement.line_number(),
            line: statement.line(),
        });
    }
    if statement.n_operands() > 1 {
        return Err(statement.extraneous_text(1));
    }
    data.push_string(&lexeme[1..lexeme.len() - 1]);
    Ok(())
}

fn declare_extern(
    statement: &Statement,
    macros: &MacroTable,
    symbols: &mut SymbolTable,
) -> Result<(), Error> {
    if statement.label().is_some() {
        logging::warning("label before .extern is ignored", statement.line_number());
    }
    if statement.n_operands() == 0 {
        return Err(Error::MissingOperand {
            expected: "a symbol name after .extern",
            line_number: statement.line_number(),
            line: statement.line(),
        });
    }
    if statement.n_operands() > 1 {
        return Err(statement.extraneous_text(1));
    }

    let name = statement.operand(0);
    let span = statement.operand_span(0);
    validate_symbol_name(name, span, statement, macros)?;
    if !symbols.insert(name, 0, SymbolKind::External) {
        return Err(Error::DuplicateLabel {
            label: name.to_string(),
            span,
            line_number: statement.line_number(),
            line: statement.line(),
        });
    }
    Ok(())
}

fn encode_instruction<'a>(
    statement: &Statement<'a>,
    mnemonic: Mnemonic,
    macros: &MacroTable,
    pass: &mut FirstPass<'a>,
) -> Result<(), Error> {
    define_label(
        statement,
        macros,
        &mut pass.symbols,
        SymbolKind::Code,
        (LOAD_ADDRESS + pass.code.len()) as u16,
    )?;

    let (source, target) = instructions::parse_operands(statement, mnemonic)?;

    pass.code.push(instructions::info_word(
        mnemonic,
        source.as_ref().map(Operand::mode),
        target.as_ref().map(Operand::mode),
    ));

    match (&source, &target) {
        (Some(source_op), Some(target_op))
            if source_op.mode().is_register() && target_op.mode().is_register() =>
        {
            pass.code.push(instructions::register_word(
                Some(register_number(source_op)),
                Some(register_number(target_op)),
            ));
        }
        _ => {
            if let Some(operand) = &source {
                pass.code.push(operand_word(operand, true));
            }
            if let Some(operand) = &target {
                pass.code.push(operand_word(operand, false));
            }
        }
    }
    Ok(())
}

// Operand word for a lone operand; direct references stay zero until
// the second pass fills them in
fn operand_word(operand: &Operand, is_source: bool) -> Word {
    match *operand {
        Operand::Immediate(value) => instructions::immediate_word(value),
        Operand::Direct(_) => 0,
        Operand::IndirectRegister(register) | Operand::DirectRegister(register) => {
            if is_source {
                instructions::register_word(Some(register), None)
            } else {
                instructions::register_word(None, Some(register))
            }
        }
    }
}

fn register_number(operand: &Operand) -> u8 {
    match *operand {
        Operand::IndirectRegister(register) | Operand::DirectRegister(register) => register,
        _ => unreachable!(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn run_clean(source: &str) -> FirstPass<'_> {
        let pass = run(source, &MacroTable::new());
        assert!(pass.errors.is_empty(), "unexpected errors: {:?}", pass.errors);
        pass
    }

    #[test]
    fn code_and_data_labels_get_their_addresses() {
        let pass = run_clean("MAIN: mov r3, LEN\nLEN: .data 6\n");
        assert_eq!(pass.symbols.get("MAIN").unwrap().value, 100);
        assert_eq!(pass.symbols.get("MAIN").unwrap().kind, SymbolKind::Code);
        // relocated past the three instruction words
        assert_eq!(pass.symbols.get("LEN").unwrap().value, 103);
        assert_eq!(pass.code.len(), 3);
        assert_eq!(pass.data.words(), [6]);
    }

    #[test]
    fn direct_operands_are_placeholders() {
        let pass = run_clean("jmp X\nX: stop\n");
        assert_eq!(pass.code.words(), [0o44024, 0, 0o74004]);
        assert_eq!(pass.symbols.get("X").unwrap().value, 102);
    }

    #[test]
    fn register_pair_shares_one_word() {
        let pass = run_clean("cmp r1, r2\nmov *r1, r2\n");
        assert_eq!(pass.code.len(), 4);
        assert_eq!(pass.code.words()[1], 0o124);
        assert_eq!(pass.code.words()[3], 0o124);
    }

    #[test]
    fn duplicate_label_is_reported() {
        let pass = run("X: stop\nX: stop\n", &MacroTable::new());
        assert_eq!(pass.errors.len(), 1);
        assert!(matches!(pass.errors[0], Error::DuplicateLabel { line_number: 2, .. }));
    }

    #[test]
    fn reserved_label_names_are_rejected() {
        let pass = run("mov: stop\n", &MacroTable::new());
        assert!(matches!(pass.errors[0], Error::ReservedName { .. }));

        let pass = run("r3: stop\n", &MacroTable::new());
        assert!(matches!(pass.errors[0], Error::ReservedName { .. }));
    }

    #[test]
    fn labelled_extern_defines_only_the_external() {
        let pass = run_clean("FOO: .extern BAR\n");
        assert!(pass.symbols.get("FOO").is_none());
        let bar = pass.symbols.get("BAR").unwrap();
        assert_eq!((bar.value, bar.kind), (0, SymbolKind::External));
    }

    #[test]
    fn bad_line_is_skipped_and_the_rest_continues() {
        let pass = run("mov r1\nstop\n", &MacroTable::new());
        assert_eq!(pass.errors.len(), 1);
        assert!(matches!(pass.errors[0], Error::OperandCountMismatch { .. }));
        // the defective line reserved no words
        assert_eq!(pass.code.words(), [0o74004]);
        assert_eq!(pass.statements.len(), 1);
    }

    #[test]
    fn memory_overflow_reported_once() {
        let mut source = String::new();
        for _ in 0..1000 {
            source.push_str(".data 1, 2, 3, 4\n");
        }
        let pass = run(&source, &MacroTable::new());
        let overflows = pass
            .errors
            .iter()
            .filter(|error| matches!(error, Error::MemoryOverflow { .. }))
            .count();
        assert_eq!(overflows, 1);
    }
}
