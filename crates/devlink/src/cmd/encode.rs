use devlink_frame::{encode_frame_into, FRAME_OVERHEAD, MAX_PAYLOAD};

use crate::cmd::EncodeArgs;
use crate::exit::{frame_error, CliError, CliResult, SUCCESS, USAGE};
use crate::hexfmt::parse_hex;
use crate::output::{print_encoded, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = match &args.payload {
        Some(hex) => parse_hex(hex)
            .map_err(|err| CliError::new(USAGE, format!("--payload is not valid hex: {err}")))?,
        None => Vec::new(),
    };

    let mut wire = vec![0u8; FRAME_OVERHEAD + payload.len().min(MAX_PAYLOAD)];
    let len = encode_frame_into(args.cmd, args.seq, &payload, &mut wire)
        .map_err(|err| frame_error("encode failed", err))?;
    print_encoded(args.cmd, args.seq, &wire[..len], format);
    Ok(SUCCESS)
}
