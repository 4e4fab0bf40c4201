use std::process::ExitCode;

use vigil_cli::{init_tracing, parse_target_args, run_phase, Phase};

fn main() -> ExitCode {
    init_tracing();
    let args = parse_target_args(Phase::Execute);
    run_phase(Phase::Execute, &args.url)
}
