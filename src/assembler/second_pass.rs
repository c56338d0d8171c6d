//! Second pass: resolves symbolic operands, applies `.entry` markers
//! and collects the external references for the `.ext` file

use super::images::InstructionImage;
use super::instructions::{self, Mnemonic, Operand};
use super::statement::Statement;
use super::symbols::{EntryRejection, SymbolKind, SymbolTable};
use crate::assembler::{Error, LOAD_ADDRESS};

/// One mode-1 reference to an external symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalRef {
    pub name: String,
    pub address: u16,
}

/// Resolve every placeholder left by the first pass.
///
/// Walks the retained statements with a parallel instruction counter,
/// mirroring the first pass's word layout (including the shared word
/// of a register pair), and rewrites each direct operand word from the
/// relocated symbol table.
pub fn run(
    symbols: &mut SymbolTable,
    code: &mut InstructionImage,
    statements: &[Statement],
) -> Result<Vec<ExternalRef>, Vec<Error>> {
    let mut externals = Vec::new();
    let mut errors = Vec::new();
    let mut ic = 0usize;

    for statement in statements {
        match statement.operation() {
            ".data" | ".string" | ".extern" => {}
            ".entry" => {
                if let Err(error) = apply_entry(statement, symbols) {
                    errors.push(error);
                }
            }
            operation => {
                if let Some(mnemonic) = Mnemonic::parse(operation) {
                    resolve_instruction(
                        statement,
                        mnemonic,
                        symbols,
                        code,
                        &mut ic,
                        &mut externals,
                        &mut errors,
                    );
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(externals)
    } else {
        Err(errors)
    }
}

fn apply_entry(statement: &Statement, symbols: &mut SymbolTable) -> Result<(), Error> {
    if statement.n_operands() == 0 {
        return Err(Error::MissingOperand {
            expected: "a symbol name after .entry",
            line_number: statement.line_number(),
            line: statement.line(),
        });
    }
    if statement.n_operands() > 1 {
        return Err(statement.extraneous_text(1));
    }

    let name = statement.operand(0);
    match symbols.mark_entry(name) {
        Ok(()) => Ok(()),
        Err(EntryRejection::Undefined) => Err(Error::EntryUndefined {
            name: name.to_string(),
            span: statement.operand_span(0),
            line_number: statement.line_number(),
            line: statement.line(),
        }),
        Err(EntryRejection::External) => Err(Error::EntryExternal {
            name: name.to_string(),
            span: statement.operand_span(0),
            line_number: statement.line_number(),
            line: statement.line(),
        }),
    }
}

fn resolve_instruction(
    statement: &Statement,
    mnemonic: Mnemonic,
    symbols: &SymbolTable,
    code: &mut InstructionImage,
    ic: &mut usize,
    externals: &mut Vec<ExternalRef>,
    errors: &mut Vec<Error>,
) {
    // cannot fail: the first pass only retains validated statements
    let Ok((source, target)) = instructions::parse_operands(statement, mnemonic) else {
        return;
    };

    *ic += 1; // info word

    match (source, target) {
        (Some(source_op), Some(target_op))
            if source_op.mode().is_register() && target_op.mode().is_register() =>
        {
            *ic += 1; // shared register word
        }
        (source, target) => {
            let mut operand_index = 0;
            for operand in [source, target].into_iter().flatten() {
                let at = *ic;
                *ic += 1;

                if let Operand::Direct(name) = operand {
                    match symbols.get(name) {
                        None => errors.push(Error::UnknownSymbol {
                            name: name.to_string(),
                            span: statement.operand_span(operand_index),
                            line_number: statement.line_number(),
                            line: statement.line(),
                        }),
                        Some(symbol) if symbol.kind == SymbolKind::External => {
                            code.set(at, instructions::external_word());
                            externals.push(ExternalRef {
                                name: name.to_string(),
                                address: (LOAD_ADDRESS + at) as u16,
                            });
                        }
                        Some(symbol) => {
                            code.set(at, instructions::relocatable_word(symbol.value));
                        }
                    }
                }
                operand_index += 1;
            }
        }
    }
}
