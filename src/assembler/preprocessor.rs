//! Macro expansion ahead of the first pass
//!
//! ```ignore
//! macr NAME
//!     body lines, captured verbatim
//! endmacr
//! ```
//!
//! A later line whose only token is `NAME` is replaced by the stored
//! body. Bodies are not re-scanned for further macro calls. Every
//! other line passes through unchanged, so the expanded stream the
//! first pass reads is plain assembly.

use std::collections::HashMap;

use super::instructions;
use super::statement::{self, tokenize};
use crate::assembler::{self, MAX_LABEL_LENGTH};

/// Mapping from macro name to the verbatim body lines it expands to
#[derive(Debug, Default)]
pub struct MacroTable {
    macros: HashMap<String, Vec<String>>,
}

impl MacroTable {
    pub fn new() -> MacroTable {
        MacroTable::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    fn define(&mut self, name: String, body: Vec<String>) {
        self.macros.insert(name, body);
    }

    fn body(&self, name: &str) -> &[String] {
        self.macros.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

// An open `macr` definition. `name` is None when the header line was
// defective; the body is still consumed so the stream stays in sync
struct Definition {
    name: Option<String>,
    body: Vec<String>,
    start_line: usize,
}

/// Expand all macro definitions and calls in `source`.
///
/// Returns the expanded text, the macro table (the first pass needs it
/// to keep macro names out of the symbol namespace) and any line
/// errors found on the way.
pub fn preprocess(source: &str) -> (String, MacroTable, Vec<assembler::Error>) {
    let mut macros = MacroTable::new();
    let mut expanded = String::new();
    let mut errors = Vec::new();
    let mut current: Option<Definition> = None;

    for (index, line) in source.lines().enumerate() {
        let line_number = index + 1;

        if current.is_some() {
            let tokens = tokenize(line);
            match tokens.first().map(|&(lexeme, _)| lexeme) {
                Some("endmacr") => {
                    if tokens.len() > 1 {
                        errors.push(assembler::Error::ExtraneousText {
                            span: tokens[1].1,
                            line_number,
                            line: line.to_string(),
                        });
                    }
                    if let Some(Definition {
                        name: Some(name),
                        body,
                        ..
                    }) = current.take()
                    {
                        macros.define(name, body);
                    }
                }
                Some("macr") => {
                    errors.push(assembler::Error::NestedMacro {
                        line_number,
                        line: line.to_string(),
                    });
                }
                _ => {
                    if let Some(definition) = &mut current {
                        definition.body.push(line.to_string());
                    }
                }
            }
            continue;
        }

        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with(';') {
            expanded.push_str(line);
            expanded.push('\n');
            continue;
        }

        let tokens = tokenize(line);
        let (first, _) = tokens[0];
        match first {
            "macr" => {
                current = Some(open_definition(&tokens, line, line_number, &macros, &mut errors));
            }
            "endmacr" => {
                errors.push(assembler::Error::StrayEndmacr {
                    line_number,
                    line: line.to_string(),
                });
            }
            _ if macros.contains(first) => {
                if tokens.len() > 1 {
                    errors.push(assembler::Error::MacroCallExtraTokens {
                        name: first.to_string(),
                        line_number,
                        line: line.to_string(),
                    });
                } else {
                    for body_line in macros.body(first) {
                        expanded.push_str(body_line);
                        expanded.push('\n');
                    }
                }
            }
            _ => {
                let misused = tokens[1..].iter().find(|&&(lexeme, _)| {
                    lexeme == "macr" || lexeme == "endmacr" || macros.contains(lexeme)
                });
                match misused {
                    Some(&(name, span)) => errors.push(assembler::Error::MacroNameMisused {
                        name: name.to_string(),
                        span,
                        line_number,
                        line: line.to_string(),
                    }),
                    None => {
                        expanded.push_str(line);
                        expanded.push('\n');
                    }
                }
            }
        }
    }

    if let Some(definition) = current {
        errors.push(assembler::Error::UnterminatedMacro {
            name: definition.name.unwrap_or_else(|| "?".to_string()),
            line_number: definition.start_line,
        });
    }

    (expanded, macros, errors)
}

fn open_definition(
    tokens: &[(&str, statement::TokenSpan)],
    line: &str,
    line_number: usize,
    macros: &MacroTable,
    errors: &mut Vec<assembler::Error>,
) -> Definition {
    let mut name = None;

    if tokens.len() < 2 {
        errors.push(assembler::Error::MissingOperand {
            expected: "a macro name after macr",
            line_number,
            line: line.to_string(),
        });
    } else {
        let (candidate, span) = tokens[1];
        if tokens.len() > 2 {
            errors.push(assembler::Error::ExtraneousText {
                span: tokens[2].1,
                line_number,
                line: line.to_string(),
            });
        } else if !statement::is_identifier(candidate) {
            errors.push(assembler::Error::MalformedName {
                name: candidate.to_string(),
                span,
                line_number,
                line: line.to_string(),
            });
        } else if candidate.chars().count() > MAX_LABEL_LENGTH {
            errors.push(assembler::Error::LabelTooLong {
                label: candidate.to_string(),
                span,
                line_number,
                line: line.to_string(),
            });
        } else if instructions::is_reserved_word(candidate) {
            errors.push(assembler::Error::ReservedName {
                name: candidate.to_string(),
                span,
                line_number,
                line: line.to_string(),
            });
        } else if macros.contains(candidate) {
            errors.push(assembler::Error::MacroRedefinition {
                name: candidate.to_string(),
                line_number,
                line: line.to_string(),
            });
        } else {
            name = Some(candidate.to_string());
        }
    }

    Definition {
        name,
        body: Vec::new(),
        start_line: line_number,
    }
}
