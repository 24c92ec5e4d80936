//
// errors.rs: Error codes
//
// Error codes keep the API tidy and let the CLI print consistent
// messages. An ErrorCode is combined with the source line (where one is
// known) into an Error; `at_line` adapts code-level results as they
// bubble up the pipeline.
//

use std::fmt;

use thiserror::Error;

use crate::chips::Mode;

#[derive(Clone, Debug)]
pub struct Error {
    pub code: ErrorCode,
    pub line: u32,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line != 0 {
            write!(f, "Error in line {}: {}", self.line, self.code)
        } else {
            write!(f, "Error: {}", self.code)
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.code)
    }
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum ErrorCode {
    #[error("unexpected device type found: '{name}'")]
    BadDeviceType { name: String },
    #[error("bad character in input: '{c}'")]
    BadChar { c: char },
    #[error("ill-formed number: '{text}'")]
    BadNumber { text: String },
    #[error("mismatched brackets")]
    BadBrackets,
    #[error("unexpected token: '{text}'")]
    BadToken { text: String },
    #[error("unexpected end of statement")]
    BadEOL,
    #[error("'=' expected")]
    NoEquals,
    #[error("invalid pin declaration")]
    BadPin,
    #[error("pin list length {pins} does not match signal list length {sigs}")]
    BadPinList { pins: usize, sigs: usize },
    #[error("unknown suffix found: '{text}'")]
    BadSuffix { text: String },
    #[error("pin {pin} is out of range for {device}")]
    PinOutOfRange { pin: usize, device: &'static str },
    #[error("pinname {name} is defined twice")]
    RepeatedPinName { name: String },
    #[error("unknown symbol '{name}'")]
    UnknownSymbol { name: String },
    #[error("unknown field '{name}'")]
    UnknownField { name: String },
    #[error("field '{name}' has no bits")]
    EmptyField { name: String },
    #[error("output {name} is defined twice (use APPEND to OR into it)")]
    RepeatedOutput { name: String },
    #[error("output enable for {name} is defined twice")]
    RepeatedOutputEnable { name: String },
    #[error("{name} is defined twice")]
    RepeatedGlobal { name: &'static str },
    #[error("{name} is only available on the GAL22V10")]
    GlobalNotAvailable { name: &'static str },
    #[error("active-low '!' is only allowed on pins and global signals, not '{name}'")]
    ActiveLowNonPin { name: String },
    #[error("cyclic alias '{name}'")]
    CyclicAlias { name: String },
    #[error("unsupported expression under negation")]
    BadNegation,
    #[error("expression not supported in this position")]
    UnsupportedExpression,
    #[error("{name} is not an output pin")]
    NotAnOutput { name: String },
    #[error("use of VCC and GND is not allowed in product terms")]
    BadPowerUsage,
    #[error("VCC and GND cannot be negated")]
    InvertedPower,
    #[error("only one product term allowed (no OR)")]
    MoreThanOneProduct,
    #[error("too many product terms in sum for pin (max: {max})")]
    TooManyProducts { max: usize },
    #[error("registered output is not available in {mode} mode")]
    RegisteredNotAvailable { mode: Mode },
    #[error("tristate control for registered outputs is not allowed on this device")]
    TristateReg,
    #[error(".OE is not available in simple mode")]
    OutputEnableNotAvailable,
    #[error("pin {pin} can't be used as input in simple mode")]
    NotAnInputSimple { pin: usize },
    #[error("pin {pin} can't be used as input in complex mode")]
    NotAnInputComplex { pin: usize },
    #[error("pin {pin} is reserved for '{name}' in registered mode")]
    ReservedRegisteredInput { pin: usize, name: &'static str },
    #[error("use of VCC and GND is not allowed as input columns")]
    BadPower,
}

// Adapt an ErrorCode to an Error.
pub fn at_line<Val>(line: u32, res: Result<Val, ErrorCode>) -> Result<Val, Error> {
    res.map_err(|e| Error { code: e, line })
}
