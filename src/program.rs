use std::io::{Read, Write};
use std::path::Path;

use crate::brainfuck::Brainfuck;
use crate::dialect::{Dialect, translate};
use crate::error::Result;
use crate::png::{self, Image};

/// A Brainfuck program recovered from an image, ready to run.
#[derive(Debug, Clone)]
pub struct Program {
    /// The translated Brainfuck source.
    pub data: String,
    /// An interpreter loaded with `data` on a fresh tape.
    pub program: Brainfuck,
}

impl Program {
    pub fn from_image<D: Dialect>(image: &Image) -> Result<Self> {
        let data = translate::<D>(image);
        let program = Brainfuck::new(&data)?;
        Ok(Self { data, program })
    }

    pub fn from_png<D: Dialect>(bytes: &[u8]) -> Result<Self> {
        Self::from_image::<D>(&png::decode(bytes)?)
    }

    pub fn from_file<D: Dialect>(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_image::<D>(&png::decode_file(path)?)
    }

    pub fn run(&mut self) -> Result<()> {
        self.program.run()
    }

    pub fn run_with<R: Read, W: Write>(&mut self, input: R, sink: W) -> Result<()> {
        self.program.run_with(input, sink)
    }

    pub fn code(&self) -> &str {
        &self.data
    }

    pub fn output(&self) -> &[u8] {
        self.program.output()
    }

    pub fn memory(&self) -> &[u8] {
        self.program.memory()
    }
}
