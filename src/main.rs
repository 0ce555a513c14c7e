use std::io;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

use blockvm::bytecode::artifact;
use blockvm::bytecode::disasm::print_bc;
use blockvm::bytecode::{ProgramBc, generate, validate};
use blockvm::demos;
use blockvm::runtime::vm_bc::run_stdio;
use blockvm::runtime::{StdinInput, VmBcConfig};

#[derive(Parser, Debug)]
#[command(name = "blockvm")]
#[command(about = "Compile and run programs on the block-structured VM")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Abort after this many executed instructions
    #[arg(long, global = true)]
    max_steps: Option<usize>,

    /// Maximum block stack depth
    #[arg(long, global = true)]
    max_depth: Option<usize>,

    /// Maximum operand stack size
    #[arg(long, global = true)]
    max_stack: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate bytecode from a typed program (JSON)
    Compile {
        program: PathBuf,

        /// Output artifact; `.json` writes JSON, anything else postcard
        #[arg(short, long, default_value = "out.bc")]
        output: PathBuf,
    },

    /// Validate and execute a bytecode artifact
    Run { artifact: PathBuf },

    /// Print a bytecode artifact
    Disasm { artifact: PathBuf },

    /// List the built-in programs, or run one
    Demo {
        name: Option<String>,

        /// Print the bytecode before running
        #[arg(long)]
        disasm: bool,
    },
}

impl Cli {
    fn config(&self) -> VmBcConfig {
        let defaults = VmBcConfig::default();
        VmBcConfig {
            max_steps: self.max_steps,
            max_block_depth: self.max_depth.unwrap_or(defaults.max_block_depth),
            max_stack_size: self.max_stack.unwrap_or(defaults.max_stack_size),
            ..defaults
        }
    }
}

/// Logs go to stderr; stdout carries program output only.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn main() {
    init_logging();

    let cli = Cli::parse();
    let config = cli.config();

    let code = match &cli.command {
        Command::Compile { program, output } => compile(program, output),
        Command::Run { artifact } => run(artifact, config),
        Command::Disasm { artifact } => disasm(artifact),
        Command::Demo { name: None, .. } => list_demos(),
        Command::Demo {
            name: Some(name),
            disasm,
        } => run_demo(name, *disasm, config),
    };

    process::exit(code);
}

fn compile(program: &Path, output: &Path) -> i32 {
    let program = match artifact::load_program(program) {
        Ok(p) => p,
        Err(e) => {
            error!("{}", e);
            return 1;
        }
    };

    let bc = match generate(&program) {
        Ok(bc) => bc,
        Err(e) => {
            error!("{}", e);
            return 1;
        }
    };

    if let Err(e) = artifact::write_file(output, &bc) {
        error!("{}", e);
        return 1;
    }

    info!("wrote {}", output.display());
    0
}

fn load_validated(path: &Path) -> Option<ProgramBc> {
    let bc = match artifact::read_file(path) {
        Ok(bc) => bc,
        Err(e) => {
            error!("{}", e);
            return None;
        }
    };

    if let Err(e) = validate(&bc) {
        error!("{}", e);
        return None;
    }

    Some(bc)
}

fn run(path: &Path, config: VmBcConfig) -> i32 {
    let Some(bc) = load_validated(path) else {
        return 1;
    };

    execute(&bc, config)
}

fn disasm(path: &Path) -> i32 {
    match artifact::read_file(path) {
        Ok(bc) => {
            print_bc(&bc);
            0
        }
        Err(e) => {
            error!("{}", e);
            1
        }
    }
}

fn list_demos() -> i32 {
    println!("Built-in programs:");
    for demo in demos::all() {
        println!("  {:<8} {}", demo.name, demo.description);
    }
    0
}

fn run_demo(name: &str, show_bytecode: bool, config: VmBcConfig) -> i32 {
    let Some(demo) = demos::find(name) else {
        error!("unknown demo '{}'", name);
        return 1;
    };

    let bc = match generate(&(demo.build)()) {
        Ok(bc) => bc,
        Err(e) => {
            error!("{}", e);
            return 1;
        }
    };

    if show_bytecode {
        print_bc(&bc);
    }

    execute(&bc, config)
}

fn execute(bc: &ProgramBc, config: VmBcConfig) -> i32 {
    let result = run_stdio(bc, config, StdinInput::stdin());

    // program output has no trailing newline of its own
    println!();

    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{}", e);
            e.exit_code()
        }
    }
}
