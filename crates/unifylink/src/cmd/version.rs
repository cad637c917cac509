use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("unify-link {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: unify-link");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("UNIFY_LINK_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "profile: {}",
        option_env!("UNIFY_LINK_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!(
        "features: components={}, async={}, cli=true",
        cfg!(feature = "components"),
        cfg!(feature = "async")
    );
    println!(
        "frame: header={} bytes, default max payload={} bytes",
        unifylink_frame::HEADER_SIZE,
        unifylink_frame::DEFAULT_MAX_PAYLOAD
    );

    Ok(SUCCESS)
}
