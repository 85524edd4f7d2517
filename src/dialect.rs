use crate::error::{Error, Result};
use crate::png::{Image, Rgb};

/// What a single pixel means to a path-walking dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    MoveRight,
    MoveLeft,
    Increment,
    Decrement,
    Output,
    Input,
    LoopStart,
    LoopEnd,
    TurnRight,
    TurnLeft,
    Nop,
}

/// The eight Brainfuck instructions, in the order both dialects number them.
const INSTRUCTIONS: [u8; 8] = *b"><+-.,[]";

impl Action {
    pub const ALL: [Action; 11] = [
        Action::MoveRight,
        Action::MoveLeft,
        Action::Increment,
        Action::Decrement,
        Action::Output,
        Action::Input,
        Action::LoopStart,
        Action::LoopEnd,
        Action::TurnRight,
        Action::TurnLeft,
        Action::Nop,
    ];

    /// Position in [`Action::ALL`]; instructions come first, matching
    /// `><+-.,[]`.
    fn index(self) -> usize {
        self as usize
    }

    /// The Brainfuck byte this action emits, if any.
    pub fn instruction(self) -> Option<u8> {
        INSTRUCTIONS.get(self.index()).copied()
    }

    pub fn from_instruction(byte: u8) -> Option<Action> {
        INSTRUCTIONS
            .iter()
            .position(|&b| b == byte)
            .map(|i| Action::ALL[i])
    }
}

/// A mapping between pixel colors and [`Action`]s.
///
/// Both image dialects share one path walk ([`translate`]) and one layout
/// ([`render`]); they differ only in these two functions.
pub trait Dialect {
    const NAME: &'static str;

    fn action(pixel: Rgb) -> Action;

    /// A color that [`action`](Dialect::action) maps back to `action`.
    fn color(action: Action) -> Rgb;
}

/// BrainLoller: a fixed table of exact colors. Anything not in the table
/// is a no-op, so images can carry decorative backgrounds.
pub struct BrainLoller;

const LOLLER_COLORS: [(Rgb, Action); 10] = [
    ([255, 0, 0], Action::MoveRight),
    ([128, 0, 0], Action::MoveLeft),
    ([0, 255, 0], Action::Increment),
    ([0, 128, 0], Action::Decrement),
    ([0, 0, 255], Action::Output),
    ([0, 0, 128], Action::Input),
    ([255, 255, 0], Action::LoopStart),
    ([128, 128, 0], Action::LoopEnd),
    ([0, 255, 255], Action::TurnRight),
    ([0, 128, 128], Action::TurnLeft),
];

impl Dialect for BrainLoller {
    const NAME: &'static str = "brainloller";

    fn action(pixel: Rgb) -> Action {
        LOLLER_COLORS
            .iter()
            .find(|(color, _)| *color == pixel)
            .map_or(Action::Nop, |&(_, action)| action)
    }

    fn color(action: Action) -> Rgb {
        LOLLER_COLORS
            .iter()
            .find(|(_, a)| *a == action)
            .map_or([0, 0, 0], |&(color, _)| color)
    }
}

/// BrainCopter: every color is meaningful, via `(-2R + 3G + B) mod 11`.
/// 0-7 are `><+-.,[]`, 8 turns right, 9 turns left, 10 is a no-op.
pub struct BrainCopter;

impl Dialect for BrainCopter {
    const NAME: &'static str = "braincopter";

    fn action(pixel: Rgb) -> Action {
        let [r, g, b] = pixel.map(i32::from);
        let command = (-2 * r + 3 * g + b).rem_euclid(11);
        Action::ALL[command as usize]
    }

    fn color(action: Action) -> Rgb {
        [0, 0, action.index() as u8]
    }
}

/// Position and heading of the path walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cursor {
    row: isize,
    col: isize,
    dr: isize,
    dc: isize,
}

impl Cursor {
    /// Top left, heading east.
    fn new() -> Self {
        Self {
            row: 0,
            col: 0,
            dr: 0,
            dc: 1,
        }
    }

    /// Clockwise: east, south, west, north.
    fn turn_right(&mut self) {
        (self.dr, self.dc) = (self.dc, -self.dr);
    }

    fn turn_left(&mut self) {
        (self.dr, self.dc) = (-self.dc, self.dr);
    }

    fn advance(&mut self) {
        self.row += self.dr;
        self.col += self.dc;
    }

    fn pixel(&self, image: &Image) -> Option<Rgb> {
        let row = usize::try_from(self.row).ok()?;
        let col = usize::try_from(self.col).ok()?;
        image.get(row, col)
    }
}

/// Walk `image` from the top left heading east, collecting instructions
/// until the path leaves the image.
///
/// Brackets are not checked here.
///
/// The walk always ends. Each step maps a (pixel, heading) state to exactly
/// one successor, and turns can be undone, so no two states share a
/// successor. The start state has no predecessor inside the image, so the
/// path can never close into a loop and must run off an edge.
#[tracing::instrument(
    skip(image),
    fields(dialect = D::NAME, width = image.width(), height = image.height())
)]
pub fn translate<D: Dialect>(image: &Image) -> String {
    let mut cursor = Cursor::new();
    let mut code = String::new();
    let mut steps = 0usize;

    while let Some(pixel) = cursor.pixel(image) {
        steps += 1;

        match D::action(pixel) {
            Action::TurnRight => cursor.turn_right(),
            Action::TurnLeft => cursor.turn_left(),
            action => {
                if let Some(byte) = action.instruction() {
                    code.push(byte as char);
                }
            }
        }
        cursor.advance();
    }

    tracing::debug!(steps, code_len = code.len(), "translated image");
    code
}

/// Lay the instructions of `code` out as an image that [`translate`] reads
/// back. Bytes that are not instructions are dropped.
///
/// The path snakes: even rows run east, odd rows run west. Column 0 holds
/// left turns and the last column right turns, so the inner `width - 2`
/// columns of each row carry code. Leftover cells are no-ops.
pub fn render<D: Dialect>(code: &str, width: usize) -> Result<Image> {
    if width < 3 {
        return Err(Error::InvalidWidth(width));
    }
    let actions: Vec<Action> = code.bytes().filter_map(Action::from_instruction).collect();
    let per_row = width - 2;
    let height = actions.len().div_ceil(per_row).max(1);

    let mut image = Image::new(width, height);
    let nop = D::color(Action::Nop);
    for row in 0..height {
        let left = if row == 0 { nop } else { D::color(Action::TurnLeft) };
        image.set(row, 0, left);
        image.set(row, width - 1, D::color(Action::TurnRight));

        let start = row * per_row;
        for i in 0..per_row {
            let color = actions.get(start + i).map_or(nop, |&a| D::color(a));
            let col = if row % 2 == 0 { 1 + i } else { width - 2 - i };
            image.set(row, col, color);
        }
    }

    tracing::debug!(dialect = D::NAME, width, height, "rendered program");
    Ok(image)
}
