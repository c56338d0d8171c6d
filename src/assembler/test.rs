use super::{Artifacts, Error, assemble};

fn assemble_ok(source: &str) -> Artifacts {
    match assemble(source) {
        Ok(artifacts) => artifacts,
        Err(errors) => panic!("assembly failed: {:?}", errors),
    }
}

fn assemble_err(source: &str) -> Vec<Error> {
    match assemble(source) {
        Ok(_) => panic!("assembly unexpectedly succeeded"),
        Err(errors) => errors,
    }
}

#[test]
fn lone_stop() {
    let artifacts = assemble_ok("stop\n");
    assert_eq!(artifacts.object, "1 0\n0100 74004\n");
    assert_eq!(artifacts.entries, None);
    assert_eq!(artifacts.externals, None);
}

#[test]
fn mov_into_data_label() {
    let artifacts = assemble_ok("MAIN: mov r3, LEN\nLEN:  .data 6\n");
    assert_eq!(
        artifacts.object,
        "3 1\n\
         0100 02024\n\
         0101 00304\n\
         0102 01472\n\
         0103 00006\n"
    );
}

#[test]
fn jump_to_an_external() {
    let artifacts = assemble_ok(".extern X\n      jmp  X\n");
    assert_eq!(artifacts.object, "2 0\n0100 44024\n0101 00001\n");
    assert_eq!(artifacts.externals, Some("X 0101\n".to_string()));
    assert_eq!(artifacts.entries, None);
}

#[test]
fn register_pair_compression() {
    let artifacts = assemble_ok("LOOP: cmp  r1, r2\n      bne  LOOP\n      stop\n");
    assert_eq!(
        artifacts.object,
        "5 0\n\
         0100 06104\n\
         0101 00124\n\
         0102 50024\n\
         0103 01442\n\
         0104 74004\n"
    );
}

#[test]
fn macro_call_matches_inlined_body() {
    let with_macro = "macr AB\ninc r1\ninc r2\nendmacr\nAB\nstop\n";
    let inlined = "inc r1\ninc r2\nstop\n";
    assert_eq!(assemble_ok(with_macro), assemble_ok(inlined));
}

#[test]
fn duplicate_label_fails_the_file() {
    let errors = assemble_err("X: stop\nX: stop\n");
    assert!(errors.iter().any(|error| matches!(error, Error::DuplicateLabel { .. })));
}

#[test]
fn immediate_extremes() {
    let artifacts = assemble_ok("prn #4095\nprn #-4095\n");
    assert_eq!(
        artifacts.object,
        "4 0\n\
         0100 60014\n\
         0101 77774\n\
         0102 60014\n\
         0103 00014\n"
    );

    let errors = assemble_err("prn #4096\n");
    assert!(matches!(errors[0], Error::NumberOutOfRange { .. }));
}

#[test]
fn data_extremes() {
    let artifacts = assemble_ok(".data 16383, -16384\n");
    assert_eq!(artifacts.object, "0 2\n0100 37777\n0101 40000\n");

    let errors = assemble_err(".data 16384\n");
    assert!(matches!(errors[0], Error::NumberOutOfRange { .. }));
    let errors = assemble_err(".data -16385\n");
    assert!(matches!(errors[0], Error::NumberOutOfRange { .. }));
}

#[test]
fn every_external_reference_gets_an_ext_line() {
    let artifacts = assemble_ok(".extern X\njsr X\njsr X\n");
    assert_eq!(
        artifacts.object,
        "4 0\n\
         0100 64024\n\
         0101 00001\n\
         0102 64024\n\
         0103 00001\n"
    );
    assert_eq!(artifacts.externals, Some("X 0101\nX 0103\n".to_string()));
}

#[test]
fn entry_symbol_is_listed_with_its_address() {
    let artifacts = assemble_ok("MAIN: inc r1\n.entry MAIN\n");
    assert_eq!(artifacts.object, "2 0\n0100 34104\n0101 00014\n");
    assert_eq!(artifacts.entries, Some("MAIN 100\n".to_string()));
}

#[test]
fn entry_may_precede_the_definition() {
    let artifacts = assemble_ok(".entry X\nX: stop\n");
    assert_eq!(artifacts.entries, Some("X 100\n".to_string()));
}

#[test]
fn entry_of_undefined_symbol_fails() {
    let errors = assemble_err(".entry MISSING\nstop\n");
    assert!(matches!(errors[0], Error::EntryUndefined { .. }));
}

#[test]
fn labels_before_entry_and_extern_are_ignored_without_error() {
    let artifacts = assemble_ok("FOO: .entry MAIN\nMAIN: stop\n");
    assert_eq!(artifacts.object, "1 0\n0100 74004\n");
    assert_eq!(artifacts.entries, Some("MAIN 100\n".to_string()));

    // the label defines nothing, so it cannot be referenced
    let errors = assemble_err("BAR: .extern X\njmp BAR\n");
    assert!(matches!(errors[0], Error::UnknownSymbol { .. }));
}

#[test]
fn string_words_follow_the_code_image() {
    let artifacts = assemble_ok("prn #1\nMSG: .string \"ab\"\n");
    assert_eq!(
        artifacts.object,
        "2 3\n\
         0100 60014\n\
         0101 00014\n\
         0102 00141\n\
         0103 00142\n\
         0104 00000\n"
    );
}

#[test]
fn unterminated_string_is_rejected() {
    let errors = assemble_err(".string \"abc\n");
    assert!(matches!(errors[0], Error::UnterminatedString { .. }));
}

#[test]
fn illegal_addressing_modes_are_rejected() {
    let errors = assemble_err("lea #5, r1\n");
    assert!(matches!(errors[0], Error::IllegalAddressingMode { .. }));

    let errors = assemble_err("jmp r1\n");
    assert!(matches!(errors[0], Error::IllegalAddressingMode { .. }));
}

#[test]
fn one_bad_line_reports_but_the_rest_is_still_checked() {
    let errors = assemble_err("mov r1\nfoo r2\nprn #99999\n");
    assert_eq!(errors.len(), 3);
    assert!(matches!(errors[0], Error::OperandCountMismatch { .. }));
    assert!(matches!(errors[1], Error::UnknownMnemonic { .. }));
    assert!(matches!(errors[2], Error::NumberOutOfRange { .. }));
}

#[test]
fn empty_source_renders_an_empty_object() {
    let artifacts = assemble_ok("; nothing to assemble\n\n");
    assert_eq!(artifacts.object, "0 0\n");
    assert_eq!(artifacts.entries, None);
    assert_eq!(artifacts.externals, None);
}

#[test]
fn reassembly_is_byte_identical() {
    let source = "macr M\nprn #7\nendmacr\n.entry MAIN\n.extern F\nMAIN: inc r1\nM\njsr F\nstop\n";
    assert_eq!(assemble_ok(source), assemble_ok(source));
}

#[test]
fn representative_program() {
    let source = "\
; sample program
.entry MAIN
.extern FUNC
MAIN: mov r3, LEN
      lea STR, r1
LOOP: jsr FUNC
      prn #-5
      bne LOOP
      sub r1, *r4
      dec K
      stop
STR:  .string \"abcd\"
LEN:  .data 6, -9, 15
K:    .data 22
";
    let artifacts = assemble_ok(source);

    // 17 instruction words, 9 data words, one header line
    assert!(artifacts.object.starts_with("17 9\n"));
    assert_eq!(artifacts.object.lines().count(), 27);

    // lea's operand points at STR = 100 + 17
    assert!(artifacts.object.contains("0104 01652\n"));
    // bne jumps back to LOOP = 106
    assert!(artifacts.object.contains("0111 01522\n"));
    // dec's operand points at K = 100 + 17 + 8
    assert!(artifacts.object.contains("0115 01752\n"));
    // the external reference word carries only the E bit
    assert!(artifacts.object.contains("0107 00001\n"));

    assert_eq!(artifacts.entries, Some("MAIN 100\n".to_string()));
    assert_eq!(artifacts.externals, Some("FUNC 0107\n".to_string()));
}
