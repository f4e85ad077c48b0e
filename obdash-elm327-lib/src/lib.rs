//! ELM327 response grammar for the OBD2 channels the bridge polls
//!
//! This library holds the PID registry (request commands, response tags,
//! conversion formulas) and the decoder that turns raw adapter
//! notifications into telemetry samples. It is deliberately free of
//! dependencies so it can be tested in isolation.

/// OBD2 channels polled by the bridge (Mode 01 PIDs)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pid {
    /// Engine RPM (PID 0C)
    EngineSpeed,
    /// Vehicle speed in km/h (PID 0D)
    VehicleSpeed,
    /// Engine coolant temperature in °C (PID 05)
    CoolantTemp,
    /// Fuel tank level in percent (PID 2F)
    FuelLevel,
}

impl Pid {
    /// Fixed polling order for the command cycle
    pub const CYCLE: [Pid; 4] = [
        Pid::EngineSpeed,
        Pid::VehicleSpeed,
        Pid::CoolantTemp,
        Pid::FuelLevel,
    ];

    /// Mode 01 request command, CR-terminated per ELM327 convention
    #[must_use]
    pub const fn request(self) -> &'static [u8] {
        match self {
            Self::EngineSpeed => b"010C\r",
            Self::VehicleSpeed => b"010D\r",
            Self::CoolantTemp => b"0105\r",
            Self::FuelLevel => b"012F\r",
        }
    }

    /// Response tag (request mode + 0x40, then the PID) in compact hex form
    #[must_use]
    pub const fn response_tag(self) -> &'static str {
        match self {
            Self::EngineSpeed => "410C",
            Self::VehicleSpeed => "410D",
            Self::CoolantTemp => "4105",
            Self::FuelLevel => "412F",
        }
    }

    /// Number of operand bytes following the tag
    #[must_use]
    pub const fn operand_count(self) -> usize {
        match self {
            Self::EngineSpeed => 2,
            Self::VehicleSpeed | Self::CoolantTemp | Self::FuelLevel => 1,
        }
    }

    /// Identify which channel a compact `41xx` tag belongs to
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::CYCLE
            .iter()
            .copied()
            .find(|pid| pid.response_tag() == tag)
    }

    /// Apply the per-PID conversion to the raw operand bytes.
    ///
    /// Engine speed is `((A * 256) + B) / 4`, vehicle speed is `A`,
    /// coolant temperature is `A - 40`. Fuel level is `(A * 100) / 255`
    /// with integer truncation, matching common adapter behavior.
    #[must_use]
    pub fn decode(self, a: u8, b: u8) -> i32 {
        let a = i32::from(a);
        let b = i32::from(b);
        match self {
            Self::EngineSpeed => ((a * 256) + b) / 4,
            Self::VehicleSpeed => a,
            Self::CoolantTemp => a - 40,
            Self::FuelLevel => (a * 100) / 255,
        }
    }
}

/// One decoded telemetry reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub pid: Pid,
    pub value: i32,
}

/// Why a notification buffer produced no sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload is not valid UTF-8 text
    NotText,
    /// No recognized `41 <PID>` tag anywhere in the payload
    NoTag,
    /// A tag was present but not followed by enough hex operands
    TruncatedOperands,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotText => write!(f, "payload is not text"),
            Self::NoTag => write!(f, "no recognized response tag"),
            Self::TruncatedOperands => write!(f, "response tag without enough operand bytes"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Decode one raw adapter notification into a telemetry sample.
///
/// The adapter sends ASCII hex either spaced (`41 0C 1A F8`) or compact
/// (`410C1AF8`), usually with CR/LF and a `>` prompt around it. The buffer
/// is reduced to its hex digits and scanned left to right; the first
/// position that yields a complete `41 <PID> <operands>` parse wins.
///
/// Malformed or unrecognized buffers return a typed error and nothing else;
/// this function never panics on adapter input.
pub fn decode_response(data: &[u8]) -> Result<Sample, DecodeError> {
    let text = std::str::from_utf8(data).map_err(|_| DecodeError::NotText)?;

    let hex: String = text
        .chars()
        .filter(char::is_ascii_hexdigit)
        .map(|c| c.to_ascii_uppercase())
        .collect();

    let mut truncated = false;
    let mut i = 0;
    while i + 4 <= hex.len() {
        if let Some(pid) = Pid::from_tag(&hex[i..i + 4]) {
            match parse_operands(pid, &hex[i + 4..]) {
                Some((a, b)) => {
                    return Ok(Sample {
                        pid,
                        value: pid.decode(a, b),
                    })
                }
                // Tag without operands; keep scanning in case a complete
                // response follows in the same buffer
                None => truncated = true,
            }
        }
        i += 1;
    }

    Err(if truncated {
        DecodeError::TruncatedOperands
    } else {
        DecodeError::NoTag
    })
}

/// Parse the one or two operand bytes immediately following a tag
fn parse_operands(pid: Pid, hex: &str) -> Option<(u8, u8)> {
    let a = u8::from_str_radix(hex.get(0..2)?, 16).ok()?;
    let b = if pid.operand_count() == 2 {
        u8::from_str_radix(hex.get(2..4)?, 16).ok()?
    } else {
        0
    };
    Some((a, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_engine_speed() {
        // A = 0x1A, B = 0xF8 -> (26 * 256 + 248) / 4 = 1726
        let sample = decode_response(b"41 0C 1A F8\r\r>").unwrap();
        assert_eq!(sample.pid, Pid::EngineSpeed);
        assert_eq!(sample.value, 1726);

        // Compact form (adapter with spaces off) decodes the same
        let sample = decode_response(b"410C1AF8\r\r>").unwrap();
        assert_eq!(sample.pid, Pid::EngineSpeed);
        assert_eq!(sample.value, 1726);
    }

    #[test]
    fn test_decode_vehicle_speed() {
        let sample = decode_response(b"41 0D 32").unwrap();
        assert_eq!(sample.pid, Pid::VehicleSpeed);
        assert_eq!(sample.value, 50);
    }

    #[test]
    fn test_decode_coolant_temp() {
        let sample = decode_response(b"41 05 7B").unwrap();
        assert_eq!(sample.pid, Pid::CoolantTemp);
        assert_eq!(sample.value, 83);

        // Offset encoding allows sub-zero readings
        let sample = decode_response(b"41 05 00").unwrap();
        assert_eq!(sample.value, -40);
    }

    #[test]
    fn test_decode_fuel_level() {
        let sample = decode_response(b"41 2F FF").unwrap();
        assert_eq!(sample.pid, Pid::FuelLevel);
        assert_eq!(sample.value, 100);

        let sample = decode_response(b"41 2F 00").unwrap();
        assert_eq!(sample.value, 0);

        // 0x04 * 100 / 255 = 1.57: truncation, not rounding
        let sample = decode_response(b"41 2F 04").unwrap();
        assert_eq!(sample.value, 1);
    }

    #[test]
    fn test_decode_tolerates_surrounding_noise() {
        let sample = decode_response(b"SEARCHING...\r\n41 0D 32\r\r>").unwrap();
        assert_eq!(sample.pid, Pid::VehicleSpeed);
        assert_eq!(sample.value, 50);
    }

    #[test]
    fn test_decode_first_valid_match_wins() {
        let sample = decode_response(b"41 0D 32 41 05 7B").unwrap();
        assert_eq!(sample.pid, Pid::VehicleSpeed);
        assert_eq!(sample.value, 50);
    }

    #[test]
    fn test_decode_malformed() {
        assert_eq!(decode_response(b"garbage"), Err(DecodeError::NoTag));
        assert_eq!(decode_response(b""), Err(DecodeError::NoTag));
        assert_eq!(decode_response(b"NO DATA\r\r>"), Err(DecodeError::NoTag));
        assert_eq!(decode_response(&[0xFF, 0xFE]), Err(DecodeError::NotText));

        // Tag present but operands missing or unparseable
        assert_eq!(
            decode_response(b"41 0C 1A"),
            Err(DecodeError::TruncatedOperands)
        );
        assert_eq!(
            decode_response(b"41 0C ZZ"),
            Err(DecodeError::TruncatedOperands)
        );
    }

    #[test]
    fn test_decode_is_idempotent() {
        let buffer = b"41 0C 1A F8\r\r>";
        assert_eq!(decode_response(buffer), decode_response(buffer));
    }

    #[test]
    fn test_registry_commands() {
        assert_eq!(Pid::EngineSpeed.request(), b"010C\r");
        assert_eq!(Pid::VehicleSpeed.request(), b"010D\r");
        assert_eq!(Pid::CoolantTemp.request(), b"0105\r");
        assert_eq!(Pid::FuelLevel.request(), b"012F\r");
        assert_eq!(Pid::CYCLE.len(), 4);
    }

    #[test]
    fn test_tag_lookup() {
        assert_eq!(Pid::from_tag("410C"), Some(Pid::EngineSpeed));
        assert_eq!(Pid::from_tag("412F"), Some(Pid::FuelLevel));
        assert_eq!(Pid::from_tag("4100"), None);
    }
}
