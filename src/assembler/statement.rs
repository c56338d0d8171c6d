//! [Statement] struct and line lexing utilities

use lazy_static::lazy_static;
use regex::Regex;

use crate::assembler::{self, MAX_LINE_LENGTH};

lazy_static! {
    // One match per token: a quoted string, a comma, or a run of
    // characters that is neither whitespace nor a comma
    static ref TOKEN_RE: Regex = Regex::new(r#""[^"]*"|,|[^,\s]+"#).unwrap();
    static ref IDENTIFIER_RE: Regex = Regex::new(r"^[a-zA-Z][a-zA-Z0-9]*$").unwrap();
}

/// A span of text in the source code. Used to neatly underline errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSpan {
    start: usize,
    end: usize,
}

impl TokenSpan {
    /// Create a new token span
    pub fn new(start: usize, end: usize) -> TokenSpan {
        TokenSpan { start, end }
    }

    /// Get the start index of the token span
    pub fn start(&self) -> usize {
        self.start
    }

    /// Get the end index of the token span
    pub fn end(&self) -> usize {
        self.end
    }
}

/// Whether `name` has identifier shape: a leading ASCII letter
/// followed by letters and digits
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER_RE.is_match(name)
}

/// Split a raw line into lexemes with their spans. Quoted strings stay
/// one lexeme; commas are lexemes of their own
pub fn tokenize(line: &str) -> Vec<(&str, TokenSpan)> {
    TOKEN_RE
        .find_iter(line)
        .map(|mat| (mat.as_str(), TokenSpan::new(mat.start(), mat.end())))
        .collect()
}

/// One lexed source line: an optional label definition, the operation
/// (mnemonic or directive) and its operands
#[derive(Debug, Clone)]
pub struct Statement<'a> {
    label: Option<(&'a str, TokenSpan)>,
    operation: &'a str,
    operation_span: TokenSpan,
    operands: Vec<&'a str>,
    operand_spans: Vec<TokenSpan>,
    line_number: usize,
    line: &'a str,
}

impl<'a> Statement<'a> {
    /// Lex one logical line.
    ///
    /// Blank lines and comment lines (first non-space character `;`)
    /// yield `Ok(None)`. Over-long lines, a leading comma, and any
    /// breach of the comma discipline (commas must separate operands,
    /// never lead, trail or double up) are errors.
    pub fn parse(
        line: &'a str,
        line_number: usize,
    ) -> Result<Option<Statement<'a>>, assembler::Error> {
        let length = line.chars().count();
        if length > MAX_LINE_LENGTH {
            return Err(assembler::Error::LineTooLong {
                length,
                line_number,
                line: line.to_string(),
            });
        }

        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with(';') {
            return Ok(None);
        }

        let tokens = tokenize(line);
        let mut cursor = 0;

        let label = match tokens.first() {
            Some(&(lexeme, span)) if lexeme.len() > 1 && lexeme.ends_with(':') => {
                cursor += 1;
                Some((
                    &lexeme[..lexeme.len() - 1],
                    TokenSpan::new(span.start(), span.end() - 1),
                ))
            }
            _ => None,
        };

        let (operation, operation_span) = match tokens.get(cursor) {
            Some(&(",", span)) => {
                return Err(assembler::Error::BadComma {
                    span,
                    line_number,
                    line: line.to_string(),
                });
            }
            Some(&(lexeme, span)) => (lexeme, span),
            None => {
                return Err(assembler::Error::MissingOperation {
                    line_number,
                    line: line.to_string(),
                });
            }
        };
        cursor += 1;

        let mut operands = Vec::new();
        let mut operand_spans = Vec::new();
        let mut expect_comma = false;
        for &(lexeme, span) in &tokens[cursor..] {
            if lexeme == "," {
                if !expect_comma {
                    return Err(assembler::Error::BadComma {
                        span,
                        line_number,
                        line: line.to_string(),
                    });
                }
                expect_comma = false;
            } else {
                if expect_comma {
                    // two operands with nothing between them
                    return Err(assembler::Error::BadComma {
                        span,
                        line_number,
                        line: line.to_string(),
                    });
                }
                operands.push(lexeme);
                operand_spans.push(span);
                expect_comma = true;
            }
        }
        if !expect_comma && !operands.is_empty() {
            // the operand list ends on a comma
            let &(_, span) = tokens.last().unwrap();
            return Err(assembler::Error::BadComma {
                span,
                line_number,
                line: line.to_string(),
            });
        }

        Ok(Some(Statement {
            label,
            operation,
            operation_span,
            operands,
            operand_spans,
            line_number,
            line,
        }))
    }

    /// Get the label definition, colon stripped, if the line has one
    pub fn label(&self) -> Option<(&'a str, TokenSpan)> {
        self.label
    }

    /// Get the operation (mnemonic or directive) of the statement
    pub fn operation(&self) -> &'a str {
        self.operation
    }

    /// Get the span of the operation
    pub fn operation_span(&self) -> TokenSpan {
        self.operation_span
    }

    /// Get the number of operands of the statement
    pub fn n_operands(&self) -> usize {
        self.operands.len()
    }

    /// Get the operand at the given index
    pub fn operand(&self, index: usize) -> &'a str {
        self.operands[index]
    }

    /// Get the span of the operand at the given index
    pub fn operand_span(&self, index: usize) -> TokenSpan {
        self.operand_spans[index]
    }

    /// Get the line number of the statement
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Get this statement's source code line
    pub fn line(&self) -> String {
        self.line.to_string()
    }

    /// Generate an error for an operand that cannot be classified
    pub fn invalid_operand(&self, index: usize) -> assembler::Error {
        assembler::Error::InvalidOperand {
            lexeme: self.operands[index].to_string(),
            span: self.operand_spans[index],
            line_number: self.line_number,
            line: self.line(),
        }
    }

    /// Generate an error for a wrong number of operands
    pub fn operand_count_mismatch(&self, expected: usize) -> assembler::Error {
        let extra_spans = self
            .operand_spans
            .get(expected..)
            .unwrap_or(&[])
            .to_vec();

        assembler::Error::OperandCountMismatch {
            mnemonic: self.operation.to_string(),
            expected,
            found: self.operands.len(),
            extra_spans,
            line_number: self.line_number,
            line: self.line(),
        }
    }

    /// Generate an error for tokens left over after a complete directive
    pub fn extraneous_text(&self, from_index: usize) -> assembler::Error {
        assembler::Error::ExtraneousText {
            span: self.operand_spans[from_index],
            line_number: self.line_number,
            line: self.line(),
        }
    }
}
