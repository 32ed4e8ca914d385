//! The interactive REPL surface: `compile`, `load`, `list`, `test`,
//! `serialize`, `gui`, `info`, `help`, `quit`. Exits 0 on a clean `quit`,
//! 1 if startup itself fails (e.g. a bad `N2T_HOME`).

use std::io::{self, Write};

use n2t_simulator::chip::board::Board;
use n2t_simulator::config::Config;
use n2t_simulator::cpu::Cpu;
use n2t_simulator::languages::assembly::Assembler;
use n2t_simulator::languages::recipe;
use n2t_simulator::test::TestHarness;
use n2t_simulator::Result;

const DEFAULT_RUN_CYCLES: u32 = 1_000_000;

fn main() {
    let config = Config::from_env();
    let mut board = Board::new();

    println!("nand2tetris simulator");
    println!("type `help` for commands, `quit` to exit");

    let stdin = io::stdin();
    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            std::process::exit(1);
        }

        let mut line = String::new();
        if stdin.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or("");
        let rest: Vec<&str> = words.collect();

        match command {
            "quit" | "exit" => break,
            "help" => print_help(),
            "info" => print_info(&board),
            "list" => {
                for name in board.get_names() {
                    println!("{name}");
                }
            }
            "compile" => run(|| compile_command(&mut board, &config, &rest)),
            "load" => run(|| load_command(&mut board, &config, &rest)),
            "serialize" => run(|| serialize_command(&mut board, &rest)),
            "test" => run(|| test_command(&mut board, &config, &rest)),
            "run" => run(|| run_command(&rest)),
            "gui" => println!("gui is not part of this build; use the REPL commands above"),
            other => println!("unknown command '{other}', type `help` for a list"),
        }
    }
}

fn run(f: impl FnOnce() -> Result<()>) {
    if let Err(err) = f() {
        println!("error: {err}");
    }
}

fn print_help() {
    println!("commands:");
    println!("  compile <name|all>   compile an .hdl chip (or every chip in the gates dir)");
    println!("  load <name>          load a cached .gate recipe");
    println!("  list                 list every registered chip");
    println!("  test <name|all>      run a .tst script");
    println!("  serialize <name>     precompute a combinational chip's truth table");
    println!("  run <file.asm>       assemble and run a program, then dump CPU state");
    println!("  info                 show the active configuration");
    println!("  gui                  acknowledge (no graphical front end in this build)");
    println!("  quit                 exit");
}

fn print_info(board: &Board) {
    println!("{} chips registered", board.get_names().len());
}

fn compile_command(board: &mut Board, config: &Config, args: &[&str]) -> Result<()> {
    let Some(&name) = args.first() else {
        println!("usage: compile <name|all>");
        return Ok(());
    };
    if name == "all" {
        for entry in std::fs::read_dir(config.scripts_dir())? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("hdl") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    recipe::ensure_loaded(board, config, stem)?;
                    println!("compiled {stem}");
                }
            }
        }
        return Ok(());
    }
    recipe::ensure_loaded(board, config, name)?;
    println!("compiled {name}");
    Ok(())
}

fn load_command(board: &mut Board, config: &Config, args: &[&str]) -> Result<()> {
    let Some(&name) = args.first() else {
        println!("usage: load <name>");
        return Ok(());
    };
    recipe::ensure_loaded(board, config, name)?;
    println!("loaded {name}");
    Ok(())
}

fn serialize_command(board: &mut Board, args: &[&str]) -> Result<()> {
    let Some(&name) = args.first() else {
        println!("usage: serialize <name>");
        return Ok(());
    };
    let mut gate = board
        .instantiate(name)
        .ok_or_else(|| n2t_simulator::SimulatorError::UnknownChip(name.to_string()))?;
    gate.serialize()?;
    board.save_sketch(gate);
    println!("serialized {name}");
    Ok(())
}

fn run_command(args: &[&str]) -> Result<()> {
    let Some(&path) = args.first() else {
        println!("usage: run <file.asm>");
        return Ok(());
    };
    let source = std::fs::read_to_string(path)?;
    let mut assembler = Assembler::new();
    let words = assembler.assemble(&source)?;

    let mut cpu = Cpu::new();
    cpu.load_instructions(&words)?;
    match cpu.process(DEFAULT_RUN_CYCLES) {
        Ok(()) | Err(n2t_simulator::SimulatorError::EmulatorHalt) => {}
        Err(err) => return Err(err),
    }

    println!("{}", cpu.print_state());
    Ok(())
}

fn test_command(board: &mut Board, config: &Config, args: &[&str]) -> Result<()> {
    let Some(&name) = args.first() else {
        println!("usage: test <name|all>");
        return Ok(());
    };
    if name == "all" {
        for entry in std::fs::read_dir(config.scripts_dir())? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("tst") {
                let report = TestHarness::run_file(board, config, &path)?;
                println!("{report}");
            }
        }
        return Ok(());
    }
    let report = TestHarness::run_named(board, config, name)?;
    println!("{report}");
    Ok(())
}
