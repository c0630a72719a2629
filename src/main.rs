//! Local register allocator CLI.
//!
//! Reads a block of ILOC code, allocates a fixed number of physical
//! registers to it, and prints the rewritten block.
//!
//! # Usage
//!
//! ```bash
//! # Rewrite block.i over the default 5 registers
//! iloc-alloc block.i
//!
//! # A tighter budget, written to a file
//! iloc-alloc block.i -k 3 -o out.i
//!
//! # Inspect the annotated IR or the token stream
//! iloc-alloc block.i --emit table
//! iloc-alloc block.i --emit tokens
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EmitType {
    /// Emit legal ILOC over physical registers (default)
    Iloc,
    /// Emit the annotated IR as a debugging table
    Table,
    /// Emit the scanned token stream
    Tokens,
}

#[derive(Parser, Debug)]
#[command(
    name = "iloc-alloc",
    version,
    about = "Local register allocator for a subset of ILOC",
    long_about = r#"
iloc-alloc

Takes a file containing one basic block of ILOC code, scans and parses it,
and allocates a fixed number of physical registers to the arbitrarily many
registers the source names. When the block needs more values live at once
than registers exist, one register is reserved for spill addresses and
values are spilled to memory starting at address 32768. The rewritten,
legal block is printed on stdout.

ACCEPTED LANGUAGE (one instruction per line, // comments):

  load   rA      => rB      rB = MEM[rA]
  loadI  C       => rB      rB = C
  store  rA      => rB      MEM[rB] = rA
  add    rA, rB  => rC      likewise sub, mult, lshift, rshift
  output C                  print MEM[C]
  nop

EMIT MODES:

  --emit iloc    the rewritten block (default)
  --emit table   the IR with source/virtual/physical registers and
                 next-use distances for every operand, for debugging
  --emit tokens  the token stream, one <CATEGORY, lexeme> per line
"#
)]
struct Args {
    /// Input file of ILOC code
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Number of physical registers to allocate (minimum 3)
    #[arg(short = 'k', long = "registers", default_value_t = 5, value_name = "NUM")]
    registers: usize,

    /// What to emit
    #[arg(long, value_enum, default_value = "iloc")]
    emit: EmitType,

    /// Write output here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Verbose output (statistics and debug logging)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    if args.registers < iloc_alloc::MIN_REGISTERS {
        bail!(
            "invalid number of registers: {} (minimum is {})",
            args.registers,
            iloc_alloc::MIN_REGISTERS
        );
    }

    let source = std::fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;

    let text = match args.emit {
        EmitType::Iloc => {
            let (output, stats) =
                iloc_alloc::allocate_source_with_stats(&source, args.registers)
                    .with_context(|| format!("failed to allocate {}", args.input.display()))?;
            if args.verbose {
                stats.display();
            }
            output
        }

        EmitType::Table => {
            let mut block = iloc_alloc::parser::parse(&source)
                .with_context(|| format!("failed to parse {}", args.input.display()))?;
            let allocation = iloc_alloc::regalloc::allocate(&mut block, args.registers)
                .with_context(|| format!("failed to allocate {}", args.input.display()))?;
            iloc_alloc::emit::format_table(&block, &allocation.ranges)
        }

        EmitType::Tokens => {
            let mut out = String::new();
            for item in iloc_alloc::parser::Lexer::new(&source) {
                let (_, token) = item.map_err(|e| anyhow::anyhow!("lexer error: {}", e))?;
                out.push_str(&token.to_string());
                out.push('\n');
            }
            out
        }
    };

    match args.output {
        Some(path) => std::fs::write(&path, &text)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => print!("{}", text),
    }

    Ok(())
}
