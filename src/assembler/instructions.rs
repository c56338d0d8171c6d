//! The instruction set: mnemonics, addressing modes, operand
//! classification and the bit-level word encoding

use super::statement::{self, Statement};
use crate::assembler::{self, Word};

/// ARE linkage bits occupying bits 0..=2 of every emitted word.
/// Exactly one of them is set
pub const ARE_ABSOLUTE: Word = 0b100;
pub const ARE_RELOCATABLE: Word = 0b010;
pub const ARE_EXTERNAL: Word = 0b001;

/// Range of an immediate operand (12-bit payload field)
pub const IMMEDIATE_MIN: i64 = -4095;
pub const IMMEDIATE_MAX: i64 = 4095;

/// Range of a `.data` element (a full 15-bit word)
pub const DATA_MIN: i64 = -16384;
pub const DATA_MAX: i64 = 16383;

/// The four operand addressing modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    Immediate = 0,
    Direct = 1,
    IndirectRegister = 2,
    DirectRegister = 3,
}

impl AddressingMode {
    /// One-hot flag of this mode in an info word's source field
    /// (bits 7..=10)
    pub fn source_bit(self) -> Word {
        1 << (7 + self as u16)
    }

    /// One-hot flag of this mode in an info word's target field
    /// (bits 3..=6)
    pub fn target_bit(self) -> Word {
        1 << (3 + self as u16)
    }

    /// Both register modes share an operand word when paired
    pub fn is_register(self) -> bool {
        matches!(
            self,
            AddressingMode::IndirectRegister | AddressingMode::DirectRegister
        )
    }
}

/// The sixteen machine instructions, in opcode order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mnemonic {
    Mov = 0,
    Cmp,
    Add,
    Sub,
    Lea,
    Clr,
    Not,
    Inc,
    Dec,
    Jmp,
    Bne,
    Red,
    Prn,
    Jsr,
    Rts,
    Stop,
}

impl Mnemonic {
    pub fn parse(lexeme: &str) -> Option<Mnemonic> {
        match lexeme {
            "mov" => Some(Mnemonic::Mov),
            "cmp" => Some(Mnemonic::Cmp),
            "add" => Some(Mnemonic::Add),
            "sub" => Some(Mnemonic::Sub),
            "lea" => Some(Mnemonic::Lea),
            "clr" => Some(Mnemonic::Clr),
            "not" => Some(Mnemonic::Not),
            "inc" => Some(Mnemonic::Inc),
            "dec" => Some(Mnemonic::Dec),
            "jmp" => Some(Mnemonic::Jmp),
            "bne" => Some(Mnemonic::Bne),
            "red" => Some(Mnemonic::Red),
            "prn" => Some(Mnemonic::Prn),
            "jsr" => Some(Mnemonic::Jsr),
            "rts" => Some(Mnemonic::Rts),
            "stop" => Some(Mnemonic::Stop),
            _ => None,
        }
    }

    /// Opcode value, bits 11..=14 of the info word
    pub fn opcode(self) -> Word {
        self as Word
    }

    pub fn operand_count(self) -> usize {
        match self {
            Mnemonic::Mov | Mnemonic::Cmp | Mnemonic::Add | Mnemonic::Sub | Mnemonic::Lea => 2,
            Mnemonic::Rts | Mnemonic::Stop => 0,
            _ => 1,
        }
    }

    /// Addressing modes permitted for the source operand
    pub fn source_modes(self) -> &'static [AddressingMode] {
        use AddressingMode::*;
        match self {
            Mnemonic::Mov | Mnemonic::Cmp | Mnemonic::Add | Mnemonic::Sub => {
                &[Immediate, Direct, IndirectRegister, DirectRegister]
            }
            Mnemonic::Lea => &[Direct],
            _ => &[],
        }
    }

    /// Addressing modes permitted for the target operand
    pub fn target_modes(self) -> &'static [AddressingMode] {
        use AddressingMode::*;
        match self {
            Mnemonic::Cmp | Mnemonic::Prn => &[Immediate, Direct, IndirectRegister, DirectRegister],
            Mnemonic::Mov
            | Mnemonic::Add
            | Mnemonic::Sub
            | Mnemonic::Lea
            | Mnemonic::Clr
            | Mnemonic::Not
            | Mnemonic::Inc
            | Mnemonic::Dec
            | Mnemonic::Red => &[Direct, IndirectRegister, DirectRegister],
            Mnemonic::Jmp | Mnemonic::Bne | Mnemonic::Jsr => &[Direct, IndirectRegister],
            Mnemonic::Rts | Mnemonic::Stop => &[],
        }
    }
}

/// Whether `name` collides with a mnemonic, a register, a directive
/// word or a macro keyword
pub fn is_reserved_word(name: &str) -> bool {
    Mnemonic::parse(name).is_some()
        || parse_register(name).is_some()
        || matches!(name, "data" | "string" | "entry" | "extern" | "macr" | "endmacr")
}

fn parse_register(lexeme: &str) -> Option<u8> {
    let digit = lexeme.strip_prefix('r')?;
    match digit {
        "0" | "1" | "2" | "3" | "4" | "5" | "6" | "7" => digit.parse().ok(),
        _ => None,
    }
}

/// One classified instruction operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand<'a> {
    Immediate(i16),
    Direct(&'a str),
    IndirectRegister(u8),
    DirectRegister(u8),
}

impl<'a> Operand<'a> {
    /// Classify the operand at `index` of `statement`.
    ///
    /// `#n` is immediate, `*rN` indirect register, `rN` direct
    /// register, and anything of identifier shape a direct reference.
    /// A bare name like `r8` is an identifier, not a bad register;
    /// only the `*` prefix commits the operand to register form.
    pub fn parse(statement: &Statement<'a>, index: usize) -> Result<Operand<'a>, assembler::Error> {
        let lexeme = statement.operand(index);

        if let Some(literal) = lexeme.strip_prefix('#') {
            let value: i64 = literal.parse().map_err(|_| assembler::Error::BadNumber {
                lexeme: lexeme.to_string(),
                span: statement.operand_span(index),
                line_number: statement.line_number(),
                line: statement.line(),
            })?;
            if !(IMMEDIATE_MIN..=IMMEDIATE_MAX).contains(&value) {
                return Err(assembler::Error::NumberOutOfRange {
                    value,
                    min: IMMEDIATE_MIN,
                    max: IMMEDIATE_MAX,
                    span: statement.operand_span(index),
                    line_number: statement.line_number(),
                    line: statement.line(),
                });
            }
            return Ok(Operand::Immediate(value as i16));
        }

        if let Some(register) = lexeme.strip_prefix('*') {
            return match parse_register(register) {
                Some(number) => Ok(Operand::IndirectRegister(number)),
                None => Err(assembler::Error::BadRegister {
                    lexeme: lexeme.to_string(),
                    span: statement.operand_span(index),
                    line_number: statement.line_number(),
                    line: statement.line(),
                }),
            };
        }

        if let Some(number) = parse_register(lexeme) {
            return Ok(Operand::DirectRegister(number));
        }

        if statement::is_identifier(lexeme) {
            return Ok(Operand::Direct(lexeme));
        }

        Err(statement.invalid_operand(index))
    }

    pub fn mode(&self) -> AddressingMode {
        match self {
            Operand::Immediate(_) => AddressingMode::Immediate,
            Operand::Direct(_) => AddressingMode::Direct,
            Operand::IndirectRegister(_) => AddressingMode::IndirectRegister,
            Operand::DirectRegister(_) => AddressingMode::DirectRegister,
        }
    }
}

/// Classify and validate the operands of an instruction statement,
/// split into (source, target). Single-operand instructions take a
/// target only.
pub fn parse_operands<'a>(
    statement: &Statement<'a>,
    mnemonic: Mnemonic,
) -> Result<(Option<Operand<'a>>, Option<Operand<'a>>), assembler::Error> {
    let expected = mnemonic.operand_count();
    if statement.n_operands() != expected {
        return Err(statement.operand_count_mismatch(expected));
    }

    match expected {
        0 => Ok((None, None)),
        1 => {
            let target = Operand::parse(statement, 0)?;
            check_mode(statement, &target, 0, mnemonic.target_modes())?;
            Ok((None, Some(target)))
        }
        _ => {
            let source = Operand::parse(statement, 0)?;
            check_mode(statement, &source, 0, mnemonic.source_modes())?;
            let target = Operand::parse(statement, 1)?;
            check_mode(statement, &target, 1, mnemonic.target_modes())?;
            Ok((Some(source), Some(target)))
        }
    }
}

fn check_mode(
    statement: &Statement,
    operand: &Operand,
    index: usize,
    permitted: &[AddressingMode],
) -> Result<(), assembler::Error> {
    if permitted.contains(&operand.mode()) {
        Ok(())
    } else {
        Err(assembler::Error::IllegalAddressingMode {
            mnemonic: statement.operation().to_string(),
            operand: statement.operand(index).to_string(),
            span: statement.operand_span(index),
            line_number: statement.line_number(),
            line: statement.line(),
        })
    }
}

/// First word reserved for an instruction: opcode, addressing-mode
/// one-hots and A set in the ARE field
pub fn info_word(
    mnemonic: Mnemonic,
    source: Option<AddressingMode>,
    target: Option<AddressingMode>,
) -> Word {
    let mut word = (mnemonic.opcode() << 11) | ARE_ABSOLUTE;
    if let Some(mode) = source {
        word |= mode.source_bit();
    }
    if let Some(mode) = target {
        word |= mode.target_bit();
    }
    word
}

/// Operand word for an immediate value, bits 3..=14
pub fn immediate_word(value: i16) -> Word {
    (((value as u16) & 0x0FFF) << 3) | ARE_ABSOLUTE
}

/// Operand word carrying register numbers: source at bits 6..=8,
/// target at bits 3..=5. Both register operands of an instruction
/// share one such word; a lone register operand leaves the other
/// field zero
pub fn register_word(source: Option<u8>, target: Option<u8>) -> Word {
    let mut word = ARE_ABSOLUTE;
    if let Some(register) = source {
        word |= (register as Word) << 6;
    }
    if let Some(register) = target {
        word |= (register as Word) << 3;
    }
    word
}

/// Operand word for a direct reference resolved inside this file
pub fn relocatable_word(address: u16) -> Word {
    (address << 3) | ARE_RELOCATABLE
}

/// Operand word for a direct reference to an external symbol
pub fn external_word() -> Word {
    ARE_EXTERNAL
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::assembler::Error;

    fn operand(line: &'static str) -> Result<Operand<'static>, Error> {
        // lexed through a real statement so spans and lines exist
        let statement = Statement::parse(line, 1).unwrap().unwrap();
        Operand::parse(&statement, 0)
    }

    #[test]
    fn operand_classification() {
        assert_eq!(operand("prn #12").unwrap(), Operand::Immediate(12));
        assert_eq!(operand("prn #-4095").unwrap(), Operand::Immediate(-4095));
        assert_eq!(operand("prn *r6").unwrap(), Operand::IndirectRegister(6));
        assert_eq!(operand("prn r0").unwrap(), Operand::DirectRegister(0));
        assert_eq!(operand("prn LOOP").unwrap(), Operand::Direct("LOOP"));
    }

    #[test]
    fn bare_r8_is_an_identifier() {
        assert_eq!(operand("prn r8").unwrap(), Operand::Direct("r8"));
        assert_eq!(operand("prn r10").unwrap(), Operand::Direct("r10"));
    }

    #[test]
    fn starred_non_register_is_rejected() {
        assert!(matches!(operand("prn *r9"), Err(Error::BadRegister { .. })));
        assert!(matches!(operand("prn *x"), Err(Error::BadRegister { .. })));
    }

    #[test]
    fn immediate_literals_are_validated() {
        assert!(matches!(operand("prn #abc"), Err(Error::BadNumber { .. })));
        assert!(matches!(operand("prn #4096"), Err(Error::NumberOutOfRange { .. })));
        assert!(matches!(operand("prn #-4096"), Err(Error::NumberOutOfRange { .. })));
    }

    #[test]
    fn unclassifiable_operand() {
        assert!(matches!(operand("prn 9abc"), Err(Error::InvalidOperand { .. })));
    }

    #[test]
    fn info_word_layout() {
        // stop: opcode 15, no operands
        assert_eq!(info_word(Mnemonic::Stop, None, None), 0o74004);
        // mov r3, LEN: source mode 3, target mode 1
        assert_eq!(
            info_word(
                Mnemonic::Mov,
                Some(AddressingMode::DirectRegister),
                Some(AddressingMode::Direct),
            ),
            0o2024
        );
    }

    #[test]
    fn operand_word_layouts() {
        assert_eq!(register_word(Some(3), None), 0o304);
        assert_eq!(register_word(None, Some(1)), 0o14);
        assert_eq!(register_word(Some(1), Some(2)), 0o124);
        assert_eq!(relocatable_word(103), 0o1472);
        assert_eq!(external_word(), 0o1);
        assert_eq!(immediate_word(-1), 0o77774);
    }

    #[test]
    fn mode_tables() {
        use AddressingMode::*;
        assert_eq!(Mnemonic::Lea.source_modes(), &[Direct]);
        assert!(!Mnemonic::Jmp.target_modes().contains(&DirectRegister));
        assert!(Mnemonic::Cmp.target_modes().contains(&Immediate));
        assert_eq!(Mnemonic::Rts.operand_count(), 0);
        assert_eq!(Mnemonic::Bne.operand_count(), 1);
        assert_eq!(Mnemonic::Sub.operand_count(), 2);
    }

    #[test]
    fn reserved_words() {
        assert!(is_reserved_word("mov"));
        assert!(is_reserved_word("r7"));
        assert!(is_reserved_word("macr"));
        assert!(is_reserved_word("string"));
        assert!(!is_reserved_word("MOV"));
        assert!(!is_reserved_word("LOOP"));
    }
}
