//! Tests for command construction, serialisation, and parsing.

use rstest::rstest;

use super::*;
use crate::error::SyntaxError;

fn layer(channel: u32, layer: u32) -> Allocation {
    Allocation::layer(channel, layer).expect("valid allocation")
}

#[rstest]
#[case::bare(vec!["1-10", "AMB", "LOOP"])]
#[case::spaces(vec!["1-10", "my clip", "two  spaces"])]
#[case::quotes(vec!["1-20", "say \"hi\" there", "\"leading"])]
#[case::backslashes(vec!["1-20", "C:\\media\\clip one.mp4", "trailing\\ "])]
#[case::control(vec!["1-20", "tab\there", "line\nbreak", ""])]
fn serialise_then_parse_preserves_arguments(#[case] args: Vec<&str>) {
    let command = Elementary::new("PLAY", args.clone()).expect("valid command");

    let parsed = Elementary::parse(&command.to_wire()).expect("round trip parses");

    assert_eq!(parsed.verb(), "PLAY");
    assert_eq!(parsed.args(), args.as_slice());
}

#[test]
fn parses_windows_path_with_space() {
    let parsed = Elementary::parse("PLAY 1-10 \"C:\\some clip.mp4\"").expect("valid command");

    assert_eq!(parsed.verb(), "PLAY");
    assert_eq!(parsed.args(), ["1-10", "C:\\some clip.mp4"]);
}

#[rstest]
#[case("MIXER 1-10 \"abc", SyntaxError::UnterminatedQuote { command: "MIXER 1-10 \"abc".to_owned() })]
#[case("PLAY 1-10\r\nPLAY 1-11", SyntaxError::LineBreak)]
#[case("PLAY\n", SyntaxError::LineBreak)]
#[case("\"PLAY\" 1-10", SyntaxError::QuotedVerb)]
#[case("", SyntaxError::EmptyCommand)]
#[case("\r\n", SyntaxError::EmptyCommand)]
fn rejects_malformed_lines(#[case] text: &str, #[case] expected: SyntaxError) {
    assert_eq!(Elementary::parse(text), Err(expected));
}

#[test]
fn parse_accepts_single_trailing_terminator() {
    let parsed: Elementary = "INFO 1\r\n".parse().expect("valid command");
    assert_eq!(parsed.to_wire(), "INFO 1\r\n");
    assert_eq!(parsed.to_string(), "INFO 1");
}

#[rstest]
#[case("bad verb")]
#[case("\"quoted")]
#[case("")]
fn new_rejects_invalid_verbs(#[case] verb: &str) {
    assert!(Elementary::new(verb, Vec::<String>::new()).is_err());
}

#[test]
fn interpret_splits_buffer_into_elementaries() {
    let commands = interpret("PLAY 1-10\r\nPLAY 1-11\r\n").expect("valid buffer");

    assert_eq!(commands.len(), 2);
    assert_eq!(commands.first().map(Elementary::args), Some(&["1-10".to_owned()][..]));
    assert_eq!(commands.get(1).map(Elementary::args), Some(&["1-11".to_owned()][..]));
}

#[test]
fn interpret_skips_blank_lines() {
    let commands = interpret("\r\nINFO\r\n\r\nTLS\r\n").expect("valid buffer");
    let verbs: Vec<&str> = commands.iter().map(Elementary::verb).collect();
    assert_eq!(verbs, ["INFO", "TLS"]);
}

#[test]
fn unallocated_commands_are_no_ops() {
    let simple = Command::simple(verbs::CLEAR);
    let with_args = Command::simple_with_args(verbs::PLAY, ["AMB"]);

    assert_eq!(simple.to_wire(), None);
    assert_eq!(with_args.to_wire(), None);
    assert!(with_args.arguments().is_empty());
    assert_eq!(simple.elementaries(), Ok(Vec::new()));
}

#[test]
fn allocation_precedes_kind_arguments() {
    let command = Command::simple_with_args(verbs::PLAY, ["my clip", "LOOP"]).allocated(layer(1, 10));

    assert_eq!(command.arguments(), ["1-10", "my clip", "LOOP"]);
    assert_eq!(
        command.to_wire().as_deref(),
        Some("PLAY 1-10 \"my clip\" LOOP\r\n")
    );
}

#[test]
fn swap_requires_both_destinations() {
    let half = Command::Swap(Swap::new(Some(layer(1, 10)), None));
    let full = Command::swap(layer(1, 10), layer(2, 10));
    let plain = Command::from(Swap {
        transforms: false,
        ..Swap::new(Some(layer(1, 10)), Some(layer(2, 10)))
    });

    assert_eq!(half.to_wire(), None);
    assert_eq!(full.to_wire().as_deref(), Some("SWAP 1-10 2-10 TRANSFORMS\r\n"));
    assert_eq!(plain.to_wire().as_deref(), Some("SWAP 1-10 2-10\r\n"));
}

#[test]
fn swap_ignores_allocation() {
    let command = Command::swap(layer(1, 10), layer(2, 10)).allocated(layer(3, 10));
    assert_eq!(command.arguments(), ["1-10", "2-10", "TRANSFORMS"]);
}

#[test]
fn group_concatenates_members_and_propagates_allocation() {
    let group = Command::group([
        Command::simple_with_args(verbs::MIXER, ["FILL", "0", "0", "1", "1"]),
        Command::simple(verbs::CLEAR),
        Command::Group(Vec::new()),
    ])
    .allocated(layer(1, 12));

    assert_eq!(
        group.to_wire().as_deref(),
        Some("MIXER 1-12 FILL 0 0 1 1\r\nCLEAR 1-12\r\n")
    );
    let elementaries = group.elementaries().expect("group parses");
    assert_eq!(elementaries.len(), 2);
}

#[test]
fn empty_group_and_raw_text_are_no_ops() {
    assert_eq!(Command::group([]).to_wire(), None);
    assert_eq!(Command::Raw(String::new()).to_wire(), None);
    assert_eq!(
        Command::Raw("INFO\r\n".to_owned()).to_wire().as_deref(),
        Some("INFO\r\n")
    );
}

#[test]
fn raw_text_is_terminated_before_joining_a_group() {
    assert_eq!(
        Command::Raw("INFO".to_owned()).to_wire().as_deref(),
        Some("INFO\r\n")
    );

    let group = Command::group([
        Command::Raw("INFO".to_owned()),
        Command::simple_with_args(verbs::PLAY, ["AMB"]),
    ])
    .allocated(layer(1, 10));

    assert_eq!(
        group.to_wire().as_deref(),
        Some("INFO\r\nPLAY 1-10 AMB\r\n")
    );
    let verbs: Vec<_> = group
        .elementaries()
        .expect("group parses")
        .iter()
        .map(|elementary| elementary.verb().to_owned())
        .collect();
    assert_eq!(verbs, ["INFO", "PLAY"]);
}

#[test]
fn parsed_command_is_never_a_no_op() {
    let command = Command::parse("INFO").expect("valid command");
    assert_eq!(command.verb(), Some(verbs::INFO));
    assert_eq!(command.to_wire().as_deref(), Some("INFO\r\n"));
}
