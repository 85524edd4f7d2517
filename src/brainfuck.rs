use std::collections::VecDeque;
use std::io::{self, Read, Write};

use crate::error::{Error, Result};

/// A Brainfuck interpreter over a growable byte tape.
///
/// The source text is split at the first `!`: everything before it is code,
/// everything after it is input that `,` consumes before it ever touches the
/// interactive source.
///
/// - The memory pointer never goes below zero; `<` at cell 0 is a no-op.
/// - `>` past the last cell appends one zero cell.
/// - Cell arithmetic wraps modulo 256.
/// - Any byte that is not one of the eight instructions is a no-op.
#[derive(Debug, Clone)]
pub struct Brainfuck {
    code: Vec<u8>,
    /// `jumps[i]` is the index of the bracket matching the one at `i`.
    /// Meaningless for non-bracket positions.
    jumps: Vec<usize>,
    memory: Vec<u8>,
    memory_pointer: usize,
    user_input: VecDeque<u8>,
    output: Vec<u8>,
    step_limit: Option<usize>,
}

const LESS: u8 = b'<';
const GREATER: u8 = b'>';
const MINUS: u8 = b'-';
const PLUS: u8 = b'+';
const DOT: u8 = b'.';
const COMMA: u8 = b',';
const LBRACKET: u8 = b'[';
const RBRACKET: u8 = b']';

/// Separates the code from its embedded input.
pub const INPUT_SEPARATOR: u8 = b'!';

impl Brainfuck {
    /// Load `source` onto a fresh single-cell tape.
    pub fn new(source: &str) -> Result<Self> {
        Self::with_memory(source, &[0], 0)
    }

    /// Load `source` onto a caller-supplied tape with the pointer at
    /// `memory_pointer`.
    ///
    /// An empty tape is replaced by a single zero cell, and the tape is
    /// zero-extended if the pointer lies past its end.
    pub fn with_memory(source: &str, memory: &[u8], memory_pointer: usize) -> Result<Self> {
        let bytes = source.as_bytes();
        let (code, user_input) = match bytes.iter().position(|&b| b == INPUT_SEPARATOR) {
            Some(at) => (&bytes[..at], &bytes[at + 1..]),
            None => (bytes, &[][..]),
        };

        let jumps = build_bracket_table(code)?;

        let mut memory = memory.to_vec();
        if memory.len() <= memory_pointer {
            memory.resize(memory_pointer + 1, 0);
        }

        Ok(Self {
            code: code.to_vec(),
            jumps,
            memory,
            memory_pointer,
            user_input: user_input.iter().copied().collect(),
            output: Vec::new(),
            step_limit: None,
        })
    }

    /// Fail the run with [`Error::StepLimitExceeded`] once more than `limit`
    /// instructions have executed.
    pub fn step_limit(mut self, limit: usize) -> Self {
        self.step_limit = Some(limit);
        self
    }

    /// Run against stdin, echoing output to stdout.
    pub fn run(&mut self) -> Result<()> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        self.run_with(stdin.lock(), stdout.lock())
    }

    /// Run the program to completion.
    ///
    /// `input` is only read once the embedded input is used up, one byte per
    /// `,`. Every printed byte is written to `sink` and flushed immediately,
    /// as well as being recorded in [`output`](Self::output).
    ///
    /// On error the tape and output reflect everything executed so far.
    pub fn run_with<R: Read, W: Write>(&mut self, mut input: R, mut sink: W) -> Result<()> {
        tracing::debug!(
            code_len = self.code.len(),
            embedded_input = self.user_input.len(),
            "running program"
        );

        let len = self.code.len();
        let mut ip: usize = 0;
        let mut steps: usize = 0;

        while ip < len {
            if let Some(limit) = self.step_limit {
                if steps >= limit {
                    tracing::debug!(limit, ip, "step limit reached");
                    return Err(Error::StepLimitExceeded(limit));
                }
            }
            steps += 1;

            let ptr = self.memory_pointer;
            match self.code[ip] {
                GREATER => {
                    self.memory_pointer += 1;
                    if self.memory_pointer == self.memory.len() {
                        self.memory.push(0);
                    }
                }
                LESS => self.memory_pointer = ptr.saturating_sub(1),
                PLUS => self.memory[ptr] = self.memory[ptr].wrapping_add(1),
                MINUS => self.memory[ptr] = self.memory[ptr].wrapping_sub(1),
                DOT => {
                    let value = self.memory[ptr];
                    self.output.push(value);
                    sink.write_all(&[value])?;
                    sink.flush()?;
                }
                COMMA => self.memory[ptr] = self.read_byte(&mut input)?,
                LBRACKET => {
                    if self.memory[ptr] == 0 {
                        // Land on the matching `]`; the increment below steps past it.
                        ip = self.jumps[ip];
                    }
                }
                RBRACKET => {
                    if self.memory[ptr] != 0 {
                        ip = self.jumps[ip];
                    }
                }
                _ => {}
            }
            ip += 1;
        }

        tracing::debug!(steps, output_len = self.output.len(), "program finished");
        Ok(())
    }

    fn read_byte<R: Read>(&mut self, input: &mut R) -> Result<u8> {
        if let Some(byte) = self.user_input.pop_front() {
            return Ok(byte);
        }
        let mut buf = [0u8; 1];
        input.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    pub fn memory_pointer(&self) -> usize {
        self.memory_pointer
    }

    /// Every byte printed so far.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// The output with each byte taken as the char of the same code point.
    pub fn output_string(&self) -> String {
        self.output.iter().map(|&b| b as char).collect()
    }

    /// The executable part of the source, without the embedded input.
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Embedded input not yet consumed.
    pub fn input(&self) -> Vec<u8> {
        self.user_input.iter().copied().collect()
    }
}

/// Pair up brackets in a single pass.
///
/// Any `[` or `]` without a partner makes the whole program malformed; the
/// error carries the position of the first offender found.
fn build_bracket_table(code: &[u8]) -> Result<Vec<usize>> {
    let mut table = vec![usize::MAX; code.len()];
    let mut stack = Vec::new();

    for (i, &byte) in code.iter().enumerate() {
        match byte {
            LBRACKET => stack.push(i),
            RBRACKET => {
                let open = stack.pop().ok_or(Error::MalformedProgram { position: i })?;
                table[open] = i;
                table[i] = open;
            }
            _ => {}
        }
    }
    if let Some(&open) = stack.first() {
        return Err(Error::MalformedProgram { position: open });
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO: &str = ">+++++++++[<++++++++>-]<.>+++++++[<++++>-]<+.+++++++..+++.>>>++++++++[<++++>-]<.>>>++++++++++[<+++++++++>-]<---.<<<<.+++.------.--------.>>+.";

    fn run(source: &str, memory: &[u8], pointer: usize) -> Brainfuck {
        let mut bf = Brainfuck::with_memory(source, memory, pointer).unwrap();
        bf.run_with(io::empty(), io::sink()).unwrap();
        bf
    }

    #[test]
    fn test_zero_current_cell() {
        let bf = run("[-]", &[3, 2], 1);
        assert_eq!(bf.memory(), &[3, 0]);
        assert_eq!(bf.memory_pointer(), 1);
    }

    #[test]
    fn test_zero_nonzero_cells_to_left() {
        let bf = run("[[-]<]", &[3, 3, 0, 2, 2], 4);
        assert_eq!(bf.memory(), &[3, 3, 0, 0, 0]);
    }

    #[test]
    fn test_scan_left_to_zero() {
        let bf = run("[<]", &[3, 3, 0, 2, 2], 4);
        assert_eq!(bf.memory_pointer(), 2);
    }

    #[test]
    fn test_scan_right_to_zero() {
        let bf = run("[>]", &[3, 3, 0, 2, 2], 0);
        assert_eq!(bf.memory_pointer(), 2);
    }

    #[test]
    fn test_destructive_add() {
        let bf = run("[>+<-]", &[3, 3], 0);
        assert_eq!(bf.memory(), &[0, 6]);
    }

    #[test]
    fn test_copy_add() {
        let bf = run("[>+>+<<-]>>[<<+>>-]", &[3, 3], 0);
        assert_eq!(bf.memory(), &[3, 6, 0]);
    }

    #[test]
    fn test_destructive_subtract() {
        let bf = run("[>-<-]", &[3, 5], 0);
        assert_eq!(bf.memory(), &[0, 2]);
    }

    #[test]
    fn test_hello_world() {
        let bf = run(HELLO, &[0], 0);
        assert_eq!(bf.output_string(), "Hello World!");
    }

    #[test]
    fn test_output_is_mirrored_to_sink() {
        let mut bf = Brainfuck::new(HELLO).unwrap();
        let mut sink = Vec::new();
        bf.run_with(io::empty(), &mut sink).unwrap();
        assert_eq!(sink, b"Hello World!");
        assert_eq!(bf.output(), b"Hello World!");
    }

    #[test]
    fn test_default_tape() {
        let bf = Brainfuck::new("+").unwrap();
        assert_eq!(bf.memory(), &[0]);
        assert_eq!(bf.memory_pointer(), 0);
    }

    #[test]
    fn test_tape_grows_by_one_cell() {
        let bf = run(">>>", &[0], 0);
        assert_eq!(bf.memory(), &[0, 0, 0, 0]);
        assert_eq!(bf.memory_pointer(), 3);
    }

    #[test]
    fn test_left_at_zero_is_noop() {
        let bf = run("<<<+", &[7, 1], 0);
        assert_eq!(bf.memory(), &[8, 1]);
        assert_eq!(bf.memory_pointer(), 0);
    }

    #[test]
    fn test_wraparound() {
        let bf = run("+", &[255], 0);
        assert_eq!(bf.memory(), &[0]);
        let bf = run("-", &[0], 0);
        assert_eq!(bf.memory(), &[255]);
    }

    #[test]
    fn test_pointer_past_end_extends_tape() {
        let bf = Brainfuck::with_memory("", &[1], 3).unwrap();
        assert_eq!(bf.memory(), &[1, 0, 0, 0]);
        let bf = Brainfuck::with_memory("", &[], 0).unwrap();
        assert_eq!(bf.memory(), &[0]);
    }

    #[test]
    fn test_loop_skipped_on_zero() {
        let bf = run("[+++>+]+", &[0], 0);
        assert_eq!(bf.memory(), &[1]);
    }

    #[test]
    fn test_source_split_at_separator() {
        let bf = Brainfuck::new(",.,.!ab!c").unwrap();
        assert_eq!(bf.code(), b",.,.");
        assert_eq!(bf.input(), b"ab!c");

        let bf = Brainfuck::new(",.").unwrap();
        assert_eq!(bf.code(), b",.");
        assert!(bf.input().is_empty());
    }

    #[test]
    fn test_embedded_input_before_interactive() {
        let mut bf = Brainfuck::new(",.,.,.!ab").unwrap();
        bf.run_with(&b"Z"[..], io::sink()).unwrap();
        assert_eq!(bf.output(), b"abZ");
    }

    #[test]
    fn test_embedded_input_never_touches_interactive() {
        struct Exploding;
        impl Read for Exploding {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                panic!("interactive input read while embedded input remained");
            }
        }
        let mut bf = Brainfuck::new(",+.!A").unwrap();
        bf.run_with(Exploding, io::sink()).unwrap();
        assert_eq!(bf.output_string(), "B");
    }

    #[test]
    fn test_regression_fixture() {
        let mut bf = Brainfuck::new(",<<<<><><.!X").unwrap();
        bf.run_with(io::empty(), io::sink()).unwrap();
        assert_eq!(bf.memory(), &[b'X', 0]);
        assert_eq!(bf.memory_pointer(), 0);
        assert_eq!(bf.output(), b"X");
    }

    #[test]
    fn test_interactive_eof_is_fatal() {
        let mut bf = Brainfuck::new("+,+").unwrap();
        let err = bf.run_with(io::empty(), io::sink()).unwrap_err();
        match err {
            Error::Io(e) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("expected Io error, got {other:?}"),
        }
        // The instruction before the read still happened.
        assert_eq!(bf.memory(), &[1]);
    }

    #[test]
    fn test_output_is_raw_bytes() {
        let bf = run("-.", &[0], 0);
        assert_eq!(bf.output(), &[255]);
        assert_eq!(bf.output_string(), "\u{ff}");
    }

    #[test]
    fn test_unmatched_open_bracket_rejected() {
        let err = Brainfuck::new("+[[-]").unwrap_err();
        assert!(matches!(err, Error::MalformedProgram { position: 1 }));
    }

    #[test]
    fn test_unmatched_close_bracket_rejected() {
        let err = Brainfuck::new("+]").unwrap_err();
        assert!(matches!(err, Error::MalformedProgram { position: 1 }));
    }

    #[test]
    fn test_brackets_past_separator_ignored() {
        assert!(Brainfuck::new("+!]][[").is_ok());
    }

    #[test]
    fn test_nested_brackets_table() {
        let table = build_bracket_table(b"[[]]").unwrap();
        assert_eq!(table, vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_noop_bytes() {
        let bf = run("a+b+c d\n+", &[0], 0);
        assert_eq!(bf.memory(), &[3]);
    }

    #[test]
    fn test_step_limit() {
        let mut bf = Brainfuck::new("+[]").unwrap().step_limit(100);
        let err = bf.run_with(io::empty(), io::sink()).unwrap_err();
        assert!(matches!(err, Error::StepLimitExceeded(100)));
        assert_eq!(bf.memory(), &[1]);
    }

    #[test]
    fn test_step_limit_not_hit() {
        let mut bf = Brainfuck::new(HELLO).unwrap().step_limit(1 << 16);
        bf.run_with(io::empty(), io::sink()).unwrap();
        assert_eq!(bf.output_string(), "Hello World!");
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn run(source: &str, memory: &[u8], pointer: usize) -> Brainfuck {
        let mut bf = Brainfuck::with_memory(source, memory, pointer).unwrap();
        bf.run_with(io::empty(), io::sink()).unwrap();
        bf
    }

    proptest! {
        #[test]
        fn left_at_zero_is_noop(tape in prop::collection::vec(any::<u8>(), 1..32)) {
            let bf = run("<", &tape, 0);
            prop_assert_eq!(bf.memory_pointer(), 0);
            prop_assert_eq!(bf.memory(), &tape[..]);
        }

        #[test]
        fn inc_dec_restores(v in any::<u8>()) {
            let bf = run("+-", &[v], 0);
            prop_assert_eq!(bf.memory(), &[v]);
            let bf = run("-+", &[v], 0);
            prop_assert_eq!(bf.memory(), &[v]);
        }

        #[test]
        fn clear_loop_zeroes_only_current(
            tape in prop::collection::vec(any::<u8>(), 1..32),
            idx in any::<prop::sample::Index>(),
        ) {
            let pointer = idx.index(tape.len());
            let bf = run("[-]", &tape, pointer);
            let mut expected = tape.clone();
            expected[pointer] = 0;
            prop_assert_eq!(bf.memory(), &expected[..]);
            prop_assert_eq!(bf.memory_pointer(), pointer);
        }

        #[test]
        fn destructive_transfer(a in any::<u8>(), b in any::<u8>()) {
            let bf = run("[>+<-]", &[a, b], 0);
            prop_assert_eq!(bf.memory(), &[0, a.wrapping_add(b)]);
        }

        #[test]
        fn copy_add(a in any::<u8>(), b in any::<u8>()) {
            let bf = run("[>+>+<<-]>>[<<+>>-]", &[a, b], 0);
            prop_assert_eq!(bf.memory(), &[a, a.wrapping_add(b), 0]);
        }

        #[test]
        fn pointer_stays_in_bounds(code in "[<>+\\-.]{0,64}") {
            let bf = run(&code, &[0], 0);
            prop_assert!(bf.memory_pointer() < bf.memory().len());
        }
    }
}
