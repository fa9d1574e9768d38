use std::{env, process::ExitCode};

use taipan::{InterpOptions, Interpreter, StderrTracer};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let mut trace = false;
    let mut file_path: Option<&str> = None;
    for arg in &args[1..] {
        match arg.as_str() {
            "--trace" => trace = true,
            "--help" | "-h" => {
                println!("usage: taipan [--trace] file.py");
                return ExitCode::SUCCESS;
            }
            other => {
                if file_path.is_some() {
                    eprintln!("error: unexpected argument '{other}'");
                    return ExitCode::FAILURE;
                }
                file_path = Some(other);
            }
        }
    }
    let Some(file_path) = file_path else {
        eprintln!("usage: taipan [--trace] file.py");
        return ExitCode::FAILURE;
    };

    let mut options = InterpOptions::default();
    if trace {
        options.tracer = Box::new(StderrTracer::default());
    }
    let mut interp = Interpreter::with_options(options);
    match interp.run_file(file_path) {
        Ok(_) => ExitCode::SUCCESS,
        Err(exception) => {
            eprintln!("{exception}");
            ExitCode::FAILURE
        }
    }
}
