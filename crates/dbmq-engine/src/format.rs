//! Wire formatting for both directions.
//!
//! * [`format`] – resolved [`Value`] → broker payload string.
//! * [`to_bus_arg`] – raw broker payload → typed [`BusArg`] for the bus.

use dbmq_types::{ArgType, BridgeError, BusArg, TransformOptions, Value};

/// Render `value` in its canonical string form and apply `options`.
///
/// Total for every value the resolver can produce.
pub fn format(value: &Value, options: TransformOptions) -> String {
    let rendered = value.to_string();
    if options.strip_quotes {
        strip_quotes(&rendered)
    } else {
        rendered
    }
}

/// Turn a broker payload into the single argument of an outbound bus message.
///
/// The payload is decoded as UTF-8 (invalid sequences are replaced), quotes
/// are stripped when requested, and the text is parsed into `arg_type`.
/// Numeric and boolean parsing ignores surrounding whitespace; text arguments
/// are passed through untrimmed.
///
/// # Errors
///
/// [`BridgeError::InvalidArgument`] when the text does not parse as
/// `arg_type`.
pub fn to_bus_arg(
    payload: &[u8],
    options: TransformOptions,
    arg_type: ArgType,
) -> Result<BusArg, BridgeError> {
    let text = String::from_utf8_lossy(payload);
    let text = if options.strip_quotes {
        strip_quotes(&text)
    } else {
        text.into_owned()
    };

    match arg_type {
        ArgType::String => Ok(BusArg::Text(text)),
        ArgType::Int64 => text.trim().parse::<i64>().map(BusArg::Int64).map_err(|e| {
            BridgeError::InvalidArgument(format!("'{}' is not an int64: {e}", text.trim()))
        }),
        ArgType::Double => text.trim().parse::<f64>().map(BusArg::Double).map_err(|e| {
            BridgeError::InvalidArgument(format!("'{}' is not a double: {e}", text.trim()))
        }),
        ArgType::Boolean => parse_bool(text.trim()).map(BusArg::Boolean).ok_or_else(|| {
            BridgeError::InvalidArgument(format!("'{}' is not a boolean", text.trim()))
        }),
    }
}

fn strip_quotes(s: &str) -> String {
    s.replace('"', "")
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Some(true),
        "false" | "0" | "off" | "no" => Some(false),
        _ => None,
    }
}
