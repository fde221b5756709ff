use hex::FromHexError;

/// Parse hex digits into bytes. Whitespace anywhere is ignored, as is a
/// leading `0x`.
pub fn parse_hex(input: &str) -> Result<Vec<u8>, String> {
    let trimmed = input.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let digits: String = body.chars().filter(|c| !c.is_whitespace()).collect();

    hex::decode(&digits).map_err(|err| match err {
        FromHexError::OddLength => format!("odd number of hex digits ({})", digits.len()),
        FromHexError::InvalidHexCharacter { c, index } => {
            format!("invalid hex digit '{c}' at position {index}")
        }
        other => other.to_string(),
    })
}

/// Upper-case hex, one space between bytes.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| hex::encode_upper([*byte]))
        .collect::<Vec<_>>()
        .join(" ")
}
