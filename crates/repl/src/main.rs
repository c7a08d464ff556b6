//! Skiff driver
//!
//! Initializes a heap of configurable size, builds the root environment
//! with the terminal and standard streams attached, then loops: prompt,
//! read one form from the terminal, evaluate it, print the result. End of
//! input ends the session with a zero exit status.
//!
//! With a script argument the forms come from the file instead, nothing
//! is prompted or echoed, and output happens only through explicit
//! `PRINT`/`PRIN1` calls in the script.
//!
//! An evaluation interrupted by a control transfer no form caught
//! (`GO`/`RETURN-FROM` with no matching `TAGBODY`/`BLOCK`) is fatal.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use tracing::debug;

use skiff_runtime::io::FileStreamBackend;
use skiff_runtime::machine::{Machine, MachineConfig};
use skiff_runtime::{Value, env, eval, printer, reader, stream};

#[derive(Parser)]
#[command(name = "skiff")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Skiff - a small Lisp interpreter", long_about = None)]
struct Cli {
    /// Script file to evaluate instead of an interactive session
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,

    /// Heap capacity in bytes
    #[arg(long, default_value_t = skiff_runtime::DEFAULT_HEAP_CAPACITY)]
    heap_size: usize,

    /// Suppress the startup banner
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut machine = Machine::new(MachineConfig::new().with_heap_capacity(cli.heap_size));
    let environment = env::create_root(&mut machine);

    match cli.script {
        Some(path) => run_script(&machine, environment, &path),
        None => run_repl(&machine, environment, cli.quiet),
    }

    debug!(
        heap_bytes = machine.heap().allocated_bytes(),
        heap_capacity = machine.heap().capacity(),
        "session over"
    );
}

fn run_repl(machine: &Machine, environment: Value, quiet: bool) {
    if !quiet {
        print_banner(machine, environment);
    }

    let terminal = machine.t();
    loop {
        // Prompt on its own line, flushed past the stream layer so it
        // shows before the read blocks.
        printer::print_plain(
            machine,
            environment,
            terminal,
            skiff_runtime::text::string_from_str(machine, "\n> "),
        );
        let _ = std::io::stdout().flush();

        let form = reader::read(machine, environment, terminal);
        let input = skiff_runtime::io::input_stream(machine, environment, terminal);
        if form == machine.nil() && machine.is_truthy(stream::at_eof(machine, input)) {
            break;
        }

        write_line(machine, environment);
        match eval::eval(machine, environment, form) {
            Ok(value) => {
                printer::print(machine, environment, terminal, value);
            }
            Err(transfer) => {
                eprintln!("skiff: fatal: {transfer}");
                process::exit(1);
            }
        }
    }

    write_line(machine, environment);
}

fn run_script(machine: &Machine, environment: Value, path: &Path) {
    let backend = match FileStreamBackend::open_read(path) {
        Ok(backend) => backend,
        Err(error) => {
            eprintln!("skiff: cannot open {}: {error}", path.display());
            process::exit(1);
        }
    };
    let input = stream::create(machine, Box::new(backend));
    stream::open(machine, input, machine.t(), machine.nil());

    loop {
        let form = reader::read(machine, environment, input);
        if machine.is_truthy(stream::at_eof(machine, input)) && form == machine.nil() {
            break;
        }
        if let Err(transfer) = eval::eval(machine, environment, form) {
            eprintln!("skiff: fatal: {transfer}");
            process::exit(1);
        }
    }
}

fn print_banner(machine: &Machine, environment: Value) {
    let banner = format!(
        "skiff {}\nA small Lisp. End input (ctrl-D) to leave.\n",
        env!("CARGO_PKG_VERSION")
    );
    printer::print_plain(
        machine,
        environment,
        machine.t(),
        skiff_runtime::text::string_from_str(machine, &banner),
    );
}

fn write_line(machine: &Machine, environment: Value) {
    printer::print_plain(
        machine,
        environment,
        machine.t(),
        skiff_runtime::text::string_from_str(machine, "\n"),
    );
}
