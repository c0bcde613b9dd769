use std::io::Write;

use clap::{Args, Parser, Subcommand};
use eva::{compiler, parser, InterpretError, Vm};

#[derive(Debug, Parser)]
#[command(about = "Run Eva programs on a small bytecode VM")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn command(&self) -> &Command {
        self.command.as_ref().unwrap_or(&Command::Repl)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Execute a source file and print the result
    Run(FileArgs),
    /// Execute source given on the command line
    Eval(EvalArgs),
    /// Print the bytecode compiled from a source file
    Disassemble(FileArgs),
    Repl,
}

#[derive(Debug, Args)]
struct FileArgs {
    file: String,
}

#[derive(Debug, Args)]
struct EvalArgs {
    source: String,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("Failed to read {file}: {source}")]
    Read {
        file: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    Interpret(#[from] InterpretError),
}

fn main() {
    env_logger::init();
    let args = Cli::parse();

    let result = match args.command() {
        Command::Repl => repl_command(),
        Command::Run(args) => run_command(args),
        Command::Eval(args) => eval_command(args),
        Command::Disassemble(args) => disassemble_command(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn repl_command() -> Result<(), CliError> {
    println!("Welcome to the Eva REPL!");
    println!("EOF to exit. (Ctrl+D on *nix, Ctrl+Z on Windows)");

    let mut vm = Vm::new();
    let mut input = String::new();
    loop {
        print!("> ");
        if let Err(e) = std::io::stdout().flush() {
            log::warn!("failed to flush stdout: {e}");
        }

        let read = match std::io::stdin().read_line(&mut input) {
            Ok(read) => read,
            Err(source) => {
                return Err(CliError::Read {
                    file: "<stdin>".to_string(),
                    source,
                })
            }
        };

        if read == 0 {
            break;
        }

        let source = input.trim();
        if !source.is_empty() {
            match vm.exec(source) {
                Ok(value) => println!("{value}"),
                Err(e) => println!("Error: {e}"),
            }
        }

        input.clear()
    }

    Ok(())
}

fn read_source(file: &str) -> Result<String, CliError> {
    std::fs::read_to_string(file).map_err(|source| CliError::Read {
        file: file.to_string(),
        source,
    })
}

fn run_command(args: &FileArgs) -> Result<(), CliError> {
    let source = read_source(&args.file)?;
    let value = Vm::new().exec(&source)?;
    println!("{value}");
    Ok(())
}

fn eval_command(args: &EvalArgs) -> Result<(), CliError> {
    let value = Vm::new().exec(&args.source)?;
    println!("{value}");
    Ok(())
}

fn disassemble_command(args: &FileArgs) -> Result<(), CliError> {
    let source = read_source(&args.file)?;
    let expression = parser::parse(&source).map_err(InterpretError::from)?;
    let chunk = compiler::compile(&expression).map_err(InterpretError::from)?;
    print!("{}", chunk.disassemble(&args.file));
    Ok(())
}
