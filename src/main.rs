use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, bail};
use brainx::brainfuck::Brainfuck;
use brainx::dialect::{BrainCopter, BrainLoller, Dialect, render, translate};
use brainx::png::{self, Filter};
use brainx::Error;
use clap::Parser;
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "brainx",
    about = "Brainfuck interpreter with BrainLoller and BrainCopter image support"
)]
struct Cli {
    /// Program file: Brainfuck source text or a PNG image.
    file: PathBuf,

    /// How to read FILE (auto, brainfuck, brainloller, braincopter).
    /// `auto` treats PNGs as BrainLoller and anything else as text.
    #[arg(long, default_value = "auto")]
    dialect: String,

    /// Initial tape as hex bytes (e.g. 0302).
    #[arg(short, long)]
    memory: Option<String>,

    /// Initial memory pointer.
    #[arg(short = 'p', long, default_value_t = 0)]
    memory_pointer: usize,

    /// Abort after this many executed instructions.
    #[arg(long)]
    step_limit: Option<usize>,

    /// Print the Brainfuck code instead of running it.
    #[arg(long)]
    emit_code: bool,

    /// Render the Brainfuck source in FILE as a PNG at this path.
    #[arg(long)]
    render: Option<PathBuf>,

    /// Dialect used by --render (brainloller, braincopter).
    #[arg(long, default_value = "brainloller")]
    render_dialect: String,

    /// Image width used by --render.
    #[arg(long, default_value_t = 32)]
    width: usize,

    /// Log debug information to stderr.
    #[arg(short, long)]
    verbose: bool,
}

/// Parse a hex string such as "03ff00" into bytes.
fn parse_memory(s: &str) -> Result<Vec<u8>, String> {
    if s.len() % 2 != 0 {
        return Err(format!("Invalid memory '{s}': odd number of hex digits"));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            s.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| format!("Invalid memory '{s}': bad hex at offset {i}"))
        })
        .collect()
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    if let Some(out) = &cli.render {
        return match cli.render_dialect.as_str() {
            "brainloller" => render_to::<BrainLoller>(&cli, out),
            "braincopter" => render_to::<BrainCopter>(&cli, out),
            other => bail!("Unknown render dialect: {other}. Available: brainloller, braincopter"),
        };
    }

    let code = match cli.dialect.as_str() {
        "auto" => load_auto(&cli.file)?,
        "brainfuck" => fs::read_to_string(&cli.file)
            .with_context(|| format!("reading {}", cli.file.display()))?,
        "brainloller" => load_image::<BrainLoller>(&cli.file)?,
        "braincopter" => load_image::<BrainCopter>(&cli.file)?,
        other => bail!(
            "Unknown dialect: {other}. Available: auto, brainfuck, brainloller, braincopter"
        ),
    };

    if cli.emit_code {
        println!("{code}");
        return Ok(());
    }

    let memory = match &cli.memory {
        Some(hex) => parse_memory(hex).map_err(anyhow::Error::msg)?,
        None => vec![0],
    };
    let mut bf = Brainfuck::with_memory(&code, &memory, cli.memory_pointer)?;
    if let Some(limit) = cli.step_limit {
        bf = bf.step_limit(limit);
    }
    bf.run()?;
    Ok(())
}

fn load_image<D: Dialect>(path: &Path) -> anyhow::Result<String> {
    let image = png::decode_file(path).with_context(|| format!("decoding {}", path.display()))?;
    Ok(translate::<D>(&image))
}

/// Try PNG first; fall back to text only when the signature says it is not
/// a PNG at all.
fn load_auto(path: &Path) -> anyhow::Result<String> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    match png::decode(&bytes) {
        Ok(image) => Ok(translate::<BrainLoller>(&image)),
        Err(Error::Format) => String::from_utf8(bytes)
            .with_context(|| format!("{} is neither a PNG nor UTF-8 text", path.display())),
        Err(e) => Err(e).with_context(|| format!("decoding {}", path.display())),
    }
}

fn render_to<D: Dialect>(cli: &Cli, out: &Path) -> anyhow::Result<()> {
    let source = fs::read_to_string(&cli.file)
        .with_context(|| format!("reading {}", cli.file.display()))?;
    let image = render::<D>(&source, cli.width)?;
    fs::write(out, png::encode(&image, Filter::Paeth))
        .with_context(|| format!("writing {}", out.display()))?;
    eprintln!(
        "Rendered {} as {}x{} {} image",
        cli.file.display(),
        image.width(),
        image.height(),
        D::NAME
    );
    Ok(())
}
