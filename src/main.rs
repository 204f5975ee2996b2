use std::process::ExitCode;

fn main() -> ExitCode {
    let mut args = std::env::args();
    let program = args.next().unwrap_or_else(|| "shadowmap-demo".into());

    let Some(base) = shadowmap_demo::base_path_from_args(args) else {
        eprintln!("Usage: {program} [basepath]");
        return ExitCode::from(2);
    };

    match shadowmap_demo::run(&base) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Application error: {err}");
            ExitCode::FAILURE
        }
    }
}
