pub type Result<T> = std::result::Result<T, SimulatorError>;

#[derive(Debug, thiserror::Error)]
pub enum SimulatorError {
    #[error("{0} not found")]
    FileNotFound(String),

    #[error("compilation error: {message}")]
    Compilation {
        message: String,
        span: Option<Span>,
    },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("unknown chip '{0}'")]
    UnknownChip(String),

    #[error("unknown pin '{pin}' on chip '{chip}'")]
    UnknownPin { chip: String, pin: String },

    #[error("bus size mismatch: {lhs} vs {rhs}")]
    BusSizeMismatch { lhs: usize, rhs: usize },

    #[error("bus overflow: {value} does not fit in {width} bits")]
    BusOverflow { value: u32, width: usize },

    #[error("chip is not combinational, cannot serialize")]
    NotCombinational,

    #[error("invalid pin id in wire_pins({a}, {b})")]
    InvalidPinId { a: usize, b: usize },

    #[error("emulator halted after exhausting its cycle budget")]
    EmulatorHalt,

    #[error("hardware error: {0}")]
    Hardware(String),

    #[error("test error: {0}")]
    Test(String),

    #[error("VM error: {0}")]
    Vm(String),

    #[error("CPU error: {0}")]
    Cpu(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pin '{pin}' not found in chip '{chip}'")]
    PinNotFound { pin: String, chip: String },
}

/// A half-open `[start, end)` byte range into the source text a diagnostic
/// refers to. `source` optionally names the file the span came from, useful
/// once `need` starts pulling in chips defined across several `.hdl` files.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub source: Option<String>,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            source: None,
        }
    }

    pub fn with_source(start: usize, end: usize, source: String) -> Self {
        Self {
            start,
            end,
            source: Some(source),
        }
    }
}

/// One parser complaint, carrying enough position information to print a
/// `file:line:col: message` diagnostic without the caller re-scanning source.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

/// Parsers accumulate diagnostics across a whole source file before
/// giving up, rather than bailing out at the first syntax error.
#[derive(Debug, Default)]
pub struct Diagnostics(pub Vec<Diagnostic>);

impl Diagnostics {
    pub fn push(&mut self, line: usize, column: usize, message: impl Into<String>) {
        self.0.push(Diagnostic::new(line, column, message));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_error(self) -> SimulatorError {
        let message = self
            .0
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        SimulatorError::Parse(message)
    }
}
