use miniskim::ast::Value;
use miniskim::config::{Bootstrap, Config};
use miniskim::evaluator::{Environment, Outcome};
use miniskim::{Error, Interpreter, ParseErrorKind};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::process;
use std::sync::Once;
use std::thread;

static TRACING_INIT: Once = Once::new();

/// Install a subscriber only when `RUST_LOG` is set, e.g.
/// `RUST_LOG=miniskim=debug`.
fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}

fn main() {
    init_tracing();

    let config = match Config::from_env_and_args(std::env::args().skip(1)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("usage: miniskim [--no-bootstrap] [--bootstrap PATH] [--echo] [FILE]");
            process::exit(2);
        }
    };
    let stack_size = match config.stack_size_bytes() {
        Ok(size) => size,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(2);
        }
    };

    // Deep recursion runs on a worker with a large stack so the evaluation
    // depth limit trips before the native stack does.
    let result = thread::Builder::new()
        .name("miniskim-worker".to_string())
        .stack_size(stack_size)
        .spawn(move || run(&config))
        .map_err(|e| format!("failed to start worker thread: {e}"))
        .and_then(|h| {
            h.join()
                .map_err(|panic_info| panic_message(panic_info.as_ref()))?
                .map_err(|e| e.to_string())
        });

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn panic_message(panic_info: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic_info.downcast_ref::<&str>() {
        format!("interpreter panicked: {msg}")
    } else if let Some(msg) = panic_info.downcast_ref::<String>() {
        format!("interpreter panicked: {msg}")
    } else {
        "interpreter panicked".to_string()
    }
}

fn run(config: &Config) -> Result<(), Error> {
    let interp = Interpreter::with_limits(config.limits()).with_precision(config.precision);

    let bootstrap = match &config.bootstrap {
        Bootstrap::Embedded => interp.load_prelude(),
        Bootstrap::File(path) => interp.load_file(path)?,
        Bootstrap::None => Vec::new(),
    };
    for outcome in bootstrap.iter().filter(|o| o.is_recovered()) {
        report(outcome, &interp);
    }

    match &config.program {
        Some(path) => {
            for outcome in interp.load_file(path)? {
                if outcome.is_recovered() || config.echo_results {
                    report(&outcome, &interp);
                }
            }
            Ok(())
        }
        None => run_repl(&interp),
    }
}

fn report(outcome: &Outcome, interp: &Interpreter) {
    match &outcome.error {
        Some(e) => println!("Error: {e}"),
        None => println!("{}", interp.render(&outcome.value)),
    }
}

/// True when `source` ends inside an unclosed list and more lines are needed
fn needs_more_input(source: &str) -> bool {
    miniskim::reader::Reader::new(source).any(|item| {
        matches!(item, Err(Error::ParseError(pe)) if pe.kind == ParseErrorKind::Incomplete)
    })
}

fn run_repl(interp: &Interpreter) -> Result<(), Error> {
    println!("miniskim - a minimal Scheme-like interpreter");
    println!("Type :help for commands, or Ctrl+D to exit.");
    println!();

    let mut rl = DefaultEditor::new().map_err(|e| Error::Io(e.to_string()))?;
    let mut pending = String::new();

    loop {
        let prompt = if pending.is_empty() { ">> " } else { ".. " };
        match rl.readline(prompt) {
            Ok(line) => {
                if pending.is_empty() {
                    match line.trim() {
                        "" => continue,
                        ":help" => {
                            print_help();
                            continue;
                        }
                        ":env" => {
                            print_environment(interp.env());
                            continue;
                        }
                        ":quit" | ":exit" => {
                            println!("Goodbye!");
                            break;
                        }
                        _ => {}
                    }
                }

                pending.push_str(&line);
                pending.push('\n');
                if needs_more_input(&pending) {
                    continue;
                }

                let _ = rl.add_history_entry(pending.trim_end());
                for outcome in interp.outcomes(&pending) {
                    report(&outcome, interp);
                }
                pending.clear();
            }
            Err(ReadlineError::Interrupted) if !pending.is_empty() => {
                // Ctrl+C abandons a partial expression
                pending.clear();
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => return Err(Error::Io(err.to_string())),
        }
    }
    Ok(())
}

fn print_help() {
    println!("Commands:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show current environment bindings");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+D     - Exit the interpreter");
    println!();
    println!("Special forms: define, set!, if, quote ('x), lambda");
    println!("Only () is false; every other value, including 0, is true.");
    println!();
    println!("Examples:");
    println!("  (define square (lambda (x) (* x x)))");
    println!("  (square 12)");
    println!("  (if (null? '()) 'empty 'full)");
    println!();
}

fn print_environment(env: &Environment) {
    let bindings = env.get_all_bindings();

    if bindings.is_empty() {
        println!("Environment is empty.");
        return;
    }

    println!("Environment bindings ({} total):", bindings.len());
    println!();

    let mut builtins = Vec::new();
    let mut user_defined = Vec::new();

    for (name, value) in bindings {
        match value {
            Value::BuiltinFunction { .. } => builtins.push(name),
            _ => user_defined.push((name, value)),
        }
    }

    if !builtins.is_empty() {
        println!("Built-in functions ({}):", builtins.len());
        let mut col = 0;
        for name in builtins {
            print!("  {name:<15}");
            col += 1;
            if col % 4 == 0 {
                println!();
            }
        }
        if col % 4 != 0 {
            println!();
        }
        println!();
    }

    if !user_defined.is_empty() {
        println!("User-defined values ({}):", user_defined.len());
        for (name, value) in user_defined {
            println!("  {name} = {value}");
        }
    }
}
