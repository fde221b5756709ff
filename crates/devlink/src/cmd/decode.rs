use devlink_frame::decode_frame;

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, CliError, CliResult, SUCCESS, USAGE};
use crate::hexfmt::parse_hex;
use crate::output::{print_frame, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = parse_hex(&args.hex.join(" "))
        .map_err(|err| CliError::new(USAGE, format!("frame is not valid hex: {err}")))?;
    let frame = decode_frame(&bytes).map_err(|err| frame_error("decode failed", err))?;
    print_frame(&frame, format);
    Ok(SUCCESS)
}
