use crate::bus::{message, Interconnect, MessageKind, TerminalId};
use crate::devices::Device;
use crate::memory::{Word, DISPLAY_BACKGROUND, DISPLAY_COMMAND, DISPLAY_FOREGROUND, DISPLAY_START};

/// Visible columns.
pub const DISPLAY_COLUMNS: usize = 80;
/// Visible rows.
pub const DISPLAY_ROWS: usize = 25;

const DEFAULT_FOREGROUND: Word = 15;
const DEFAULT_BACKGROUND: Word = 0;

/// Value written to the command register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Refresh = 0,
    Clear = 1,
}

impl Command {
    const fn from_word(word: Word) -> Option<Self> {
        match word {
            0 => Some(Self::Refresh),
            1 => Some(Self::Clear),
            _ => None,
        }
    }
}

/// One character cell and the colours it was written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Cell {
    /// Character code.
    pub ch: Word,
    /// Foreground colour index.
    pub fg: Word,
    /// Background colour index.
    pub bg: Word,
}

/// Memory-mapped text display.
#[derive(Debug, Clone)]
pub struct Display {
    terminal: TerminalId,
    cells: Vec<Cell>,
    foreground: Word,
    background: Word,
    last_command: Word,
    frames: u64,
}

impl Display {
    /// Creates a blank display answering on `terminal`.
    #[must_use]
    pub fn new(terminal: TerminalId) -> Self {
        Self {
            terminal,
            cells: vec![Self::blank(DEFAULT_FOREGROUND, DEFAULT_BACKGROUND); DISPLAY_COLUMNS * DISPLAY_ROWS],
            foreground: DEFAULT_FOREGROUND,
            background: DEFAULT_BACKGROUND,
            last_command: 0,
            frames: 0,
        }
    }

    const fn blank(fg: Word, bg: Word) -> Cell {
        Cell { ch: 0, fg, bg }
    }

    /// Number of refreshes requested by software.
    #[must_use]
    pub const fn frames(&self) -> u64 {
        self.frames
    }

    /// Cell at `column`, `row`.
    #[must_use]
    pub fn cell(&self, column: usize, row: usize) -> Option<Cell> {
        if column >= DISPLAY_COLUMNS {
            return None;
        }
        self.cells.get(row * DISPLAY_COLUMNS + column).copied()
    }

    /// Renders every row, trimming trailing blanks. Non-printable codes render as spaces.
    #[must_use]
    pub fn text(&self) -> String {
        self.cells
            .chunks(DISPLAY_COLUMNS)
            .map(|row| {
                let line = row
                    .iter()
                    .map(|cell| {
                        u32::try_from(cell.ch)
                            .ok()
                            .and_then(char::from_u32)
                            .filter(|ch| !ch.is_control())
                            .unwrap_or(' ')
                    })
                    .collect::<String>();
                line.trim_end().to_owned()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn cell_index(address: Word) -> Option<usize> {
        usize::try_from(address.wrapping_sub(DISPLAY_START))
            .ok()
            .filter(|index| *index < DISPLAY_COLUMNS * DISPLAY_ROWS)
    }

    fn read(&self, address: Word) -> Word {
        match address {
            DISPLAY_COMMAND => self.last_command,
            DISPLAY_FOREGROUND => self.foreground,
            DISPLAY_BACKGROUND => self.background,
            _ => Self::cell_index(address).map_or(0, |index| self.cells[index].ch),
        }
    }

    fn write(&mut self, address: Word, value: Word) {
        match address {
            DISPLAY_COMMAND => {
                self.last_command = value;
                match Command::from_word(value) {
                    Some(Command::Clear) => {
                        let blank = Self::blank(self.foreground, self.background);
                        self.cells.fill(blank);
                        self.frames += 1;
                    }
                    Some(Command::Refresh) => self.frames += 1,
                    None => tracing::warn!(value, "unknown display command"),
                }
            }
            DISPLAY_FOREGROUND => self.foreground = value,
            DISPLAY_BACKGROUND => self.background = value,
            _ => {
                if let Some(index) = Self::cell_index(address) {
                    self.cells[index] = Cell {
                        ch: value,
                        fg: self.foreground,
                        bg: self.background,
                    };
                }
            }
        }
    }
}

impl Device for Display {
    fn name(&self) -> &'static str {
        "display"
    }

    fn base(&self) -> Word {
        DISPLAY_START
    }

    fn tick(&mut self, bus: &mut Interconnect) {
        let Some(request) = bus.message(self.terminal).map(<[Word]>::to_vec) else {
            return;
        };
        let address = message::address(&request).unwrap_or(0);
        match message::kind(&request) {
            Some(MessageKind::Write) => {
                bus.clear(self.terminal);
                self.write(address, message::payload(&request).first().copied().unwrap_or(0));
            }
            Some(MessageKind::Read) => {
                let response = message::response(address, &[self.read(address)]);
                if bus.send(self.terminal, &response) {
                    bus.clear(self.terminal);
                }
            }
            kind => {
                bus.clear(self.terminal);
                tracing::warn!(?kind, address, "display ignored message");
            }
        }
    }
}
