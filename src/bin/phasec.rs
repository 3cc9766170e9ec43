//! phasec CLI - компиляция файла, фрагмента или REPL.
//!
//! Использование:
//!   phasec                   - запустить REPL
//!   phasec <file.c>          - скомпилировать и выполнить файл
//!   phasec -e "code"         - скомпилировать фрагмент
//!   phasec --json <file.c>   - вывести все фазы в JSON
//!   phasec --help            - справка

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::env;
use std::fs;
use std::process;

use phasec::codegen::AsmLine;
use phasec::ir::format_code;
use phasec::{compile_with, CompilationResult, CompilerConfig};

const VERSION: &str = env!("CARGO_PKG_VERSION");

const HELP: &str = r#"
phasec - a teaching C compiler that shows every phase

USAGE:
    phasec                   Start REPL (interactive mode)
    phasec <file.c>          Compile and run a file
    phasec -e "<code>"       Compile and run a snippet
    phasec --json <file.c>   Print every phase as JSON
    phasec --help, -h        Show this help
    phasec --version, -v     Show version

ENVIRONMENT:
    PHASEC_CONFIG            Path to a JSON compiler config
    PHASEC_MAX_STEPS         Override the simulator step limit
    RUST_LOG=phasec=debug    Log phase statistics

REPL COMMANDS:
    :help, :h                Show help
    :quit, :q, :exit         Exit REPL
    :tokens <code>           Show the token stream
    :ast <code>              Show the syntax tree
    :ir <code>               Show three-address code
    :opt <code>              Show optimized code and pass records
    :asm <code>              Show generated assembly
    :run <code>              Compile and run (same as plain input)
    :json <code>             Show every phase as JSON

A line without ':' is compiled as a whole program. Top-level statements
are allowed, so `printf("%d\n", 6 * 7);` runs as is.
"#;

fn main() {
    env_logger::init();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let args: Vec<String> = env::args().collect();

    match args.len() {
        1 => run_repl(&config),
        2 => match args[1].as_str() {
            "--help" | "-h" => {
                println!("{}", HELP);
            }
            "--version" | "-v" => {
                println!("phasec {}", VERSION);
            }
            file => run_file(file, &config, false),
        },
        3 => match args[1].as_str() {
            "-e" | "--eval" => {
                let result = compile_with(&args[2], &config);
                print_summary(&result);
                process::exit(exit_status(&result));
            }
            "--json" => run_file(&args[2], &config, true),
            other => {
                eprintln!("Unknown option: {}", other);
                eprintln!("Use --help for usage information.");
                process::exit(1);
            }
        },
        _ => {
            eprintln!("Too many arguments.");
            eprintln!("Use --help for usage information.");
            process::exit(1);
        }
    }
}

/// Настройки: файл из `PHASEC_CONFIG`, затем переопределения окружения.
fn load_config() -> phasec::PhasecResult<CompilerConfig> {
    let config = match env::var("PHASEC_CONFIG") {
        Ok(path) => CompilerConfig::from_json_file(path)?,
        Err(_) => CompilerConfig::default(),
    };
    config.with_env()
}

fn exit_status(result: &CompilationResult) -> i32 {
    if result.success() {
        0
    } else {
        1
    }
}

fn run_file(path: &str, config: &CompilerConfig, json: bool) {
    let source = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading '{}': {}", path, e);
            process::exit(1);
        }
    };

    let result = compile_with(&source, config);
    if json {
        print_json(&result);
    } else {
        print_summary(&result);
    }
    process::exit(exit_status(&result));
}

/// Запустить REPL.
fn run_repl(config: &CompilerConfig) {
    println!("phasec {} - teaching C compiler", VERSION);
    println!("Type :help for commands, :quit to exit.\n");

    let mut rl = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("Failed to initialize readline: {}", e);
            process::exit(1);
        }
    };

    let history_path = dirs_next::data_dir()
        .map(|p| p.join("phasec").join("history.txt"))
        .unwrap_or_else(|| std::path::PathBuf::from(".phasec_history"));

    let _ = rl.load_history(&history_path);

    loop {
        match rl.readline("phasec> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                if line.starts_with(':') {
                    match handle_command(line, config) {
                        CommandResult::Continue => continue,
                        CommandResult::Exit => break,
                    }
                }

                print_summary(&compile_with(line, config));
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    if let Some(parent) = history_path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let _ = rl.save_history(&history_path);
}

enum CommandResult {
    Continue,
    Exit,
}

fn handle_command(cmd: &str, config: &CompilerConfig) -> CommandResult {
    let parts: Vec<&str> = cmd.splitn(2, ' ').collect();
    let command = parts[0];
    let arg = parts.get(1).map(|s| s.trim()).filter(|s| !s.is_empty());

    match command {
        ":help" | ":h" => {
            println!("{}", HELP);
            return CommandResult::Continue;
        }
        ":quit" | ":q" | ":exit" => return CommandResult::Exit,
        _ => {}
    }

    let Some(code) = arg else {
        println!("Usage: {} <code>", command);
        return CommandResult::Continue;
    };
    let result = compile_with(code, config);

    match command {
        ":tokens" => show_tokens(&result),
        ":ast" => show_ast(&result),
        ":ir" => show_ir(&result),
        ":opt" => show_opt(&result),
        ":asm" => show_asm(&result),
        ":run" => print_summary(&result),
        ":json" => print_json(&result),
        _ => {
            println!("Unknown command: {}", command);
            println!("Type :help for available commands.");
        }
    }
    CommandResult::Continue
}

fn print_diagnostics(result: &CompilationResult) {
    for diagnostic in result.diagnostics() {
        eprintln!("{} ({})", diagnostic, diagnostic.phase);
    }
}

fn print_summary(result: &CompilationResult) {
    print_diagnostics(result);

    if let Some(lexical) = &result.lexical {
        println!("lexical:      {} tokens", lexical.tokens.len());
    }
    if let Some(syntax) = &result.syntax {
        let items = syntax.ast.as_ref().map(|p| p.items.len()).unwrap_or(0);
        println!("syntax:       {} top-level items", items);
    }
    if let Some(semantic) = &result.semantic {
        println!("semantic:     {} symbols", semantic.symbol_table.len());
    }
    if let Some(ir) = &result.intermediate {
        let blocks = ir.cfg.as_ref().map(|c| c.blocks.len()).unwrap_or(0);
        println!("intermediate: {} instructions, {} blocks", ir.ir_code.len(), blocks);
    }
    if let Some(opt) = &result.optimization {
        println!(
            "optimization: {} -> {} instructions, {} rewrites",
            opt.original_code.len(),
            opt.optimized_code.len(),
            opt.optimization_details.total()
        );
    }
    if let Some(codegen) = &result.codegen {
        println!(
            "codegen:      {} lines, {} registers, {} stack slots",
            codegen.assembly_code.len(),
            codegen.register_allocation.len(),
            codegen.stack_frame.len()
        );
    }
    if let Some(execution) = &result.execution {
        println!("execution:    {} steps", execution.steps);
        if !execution.output.is_empty() {
            println!("--- output ---");
            print!("{}", execution.output);
            if !execution.output.ends_with('\n') {
                println!();
            }
        }
        if let Some(code) = execution.exit_code {
            println!("--- main returned {} ---", code);
        }
    }
}

fn print_json(result: &CompilationResult) {
    match result.to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error: {}", e),
    }
}

fn show_tokens(result: &CompilationResult) {
    let Some(lexical) = &result.lexical else { return };
    for token in &lexical.tokens {
        println!("  {:>4}:{:<3} {:?} {:?}", token.span.line, token.span.column, token.kind, token.text);
    }
    print_diagnostics(result);
}

fn show_ast(result: &CompilationResult) {
    match result.syntax.as_ref().and_then(|s| s.ast.as_ref()) {
        Some(ast) => println!("{:#?}", ast),
        None => print_diagnostics(result),
    }
}

fn show_ir(result: &CompilationResult) {
    match &result.intermediate {
        Some(ir) => print!("{}", format_code(&ir.ir_code)),
        None => print_diagnostics(result),
    }
}

fn show_opt(result: &CompilationResult) {
    let Some(opt) = &result.optimization else {
        print_diagnostics(result);
        return;
    };
    print!("{}", format_code(&opt.optimized_code));
    for (pass, records) in opt.optimization_details.iter() {
        if records.is_empty() {
            continue;
        }
        println!("--- {} ({}) ---", pass, records.len());
        for record in records {
            println!("  {}  =>  {}", record.original, record.optimized);
        }
    }
}

fn show_asm(result: &CompilationResult) {
    let Some(codegen) = &result.codegen else {
        print_diagnostics(result);
        return;
    };
    let lines: Vec<String> = codegen.assembly_code.iter().map(AsmLine::to_string).collect();
    println!("{}", lines.join("\n"));
    print_diagnostics(result);
}
