//! CLI entry point for the `z80-labels` binary.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use env_logger::Env;
use glob as _;
use indexmap as _;
use labels::expression::parse_number;
use labels::{LabelsConfig, Session};
use log as _;
use memory_model::{split_long_address, MemoryModel};
use regex as _;
use serde as _;
use serde_json as _;
use thiserror as _;
#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
#[cfg(test)]
use tempfile as _;

const USAGE_TEXT: &str = "\
Usage: z80-labels <command> [arguments]

Commands:
  check <config.json>                Load all list files, print counts and warnings
  label <config.json> <name>         Print value and location of a label
  addr  <config.json> <address>      Print source line and labels of an address
  line  <config.json> <file> <line>  Print the address of a source line (1-based)
  banks <model>                      Print the slot/bank layout of a memory model

Options:
  -h, --help  Show this help message

Addresses may be decimal or hex (0x8000, $8000, 8000h). Long addresses
carry the bank + 1 above bit 16, e.g. 0x38000 is 0x8000 in bank 2.

Examples:
  z80-labels check launch.json
  z80-labels addr launch.json 0x8000
  z80-labels banks ZX128K
";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Check(PathBuf),
    Label { config: PathBuf, name: String },
    Addr { config: PathBuf, address: u32 },
    Line { config: PathBuf, file: String, line: usize },
    Banks(String),
}

#[derive(Debug)]
enum ParseResult {
    Command(Command),
    Help,
}

fn parse_args(args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let args: Vec<String> = args.map(|a| a.to_string_lossy().to_string()).collect();
    let Some((first, rest)) = args.split_first() else {
        return Err("missing command".to_string());
    };

    if first == "--help" || first == "-h" || rest.iter().any(|a| a == "--help" || a == "-h") {
        return Ok(ParseResult::Help);
    }
    if let Some(option) = rest.iter().find(|a| a.starts_with('-') && a.len() > 1) {
        return Err(format!("unknown option: {option}"));
    }

    let command = match (first.as_str(), rest) {
        ("check", [config]) => Command::Check(PathBuf::from(config)),
        ("label", [config, name]) => Command::Label {
            config: PathBuf::from(config),
            name: name.clone(),
        },
        ("addr", [config, address]) => Command::Addr {
            config: PathBuf::from(config),
            address: parse_address(address)?,
        },
        ("line", [config, file, line]) => Command::Line {
            config: PathBuf::from(config),
            file: file.clone(),
            line: parse_line(line)?,
        },
        ("banks", [model]) => Command::Banks(model.clone()),
        ("check" | "label" | "addr" | "line" | "banks", _) => {
            return Err(format!("wrong number of arguments for '{first}'"));
        }
        (other, _) => return Err(format!("unknown command: {other}")),
    };
    Ok(ParseResult::Command(command))
}

fn parse_address(text: &str) -> Result<u32, String> {
    parse_number(text)
        .and_then(|value| u32::try_from(value).ok())
        .ok_or_else(|| format!("invalid address: {text}"))
}

fn parse_line(text: &str) -> Result<usize, String> {
    match text.parse::<usize>() {
        Ok(line) if line > 0 => Ok(line),
        _ => Err(format!("invalid line number: {text}")),
    }
}

fn load(config: &Path) -> Result<Session, i32> {
    LabelsConfig::load(config)
        .and_then(|config| Session::from_config(&config))
        .map_err(|e| {
            eprintln!("error: {e}");
            1
        })
}

fn format_address(session: &Session, long_addr: u32) -> String {
    match split_long_address(long_addr) {
        (addr, Some(bank)) => {
            let short_name = session.model().bank_short_name(bank);
            if short_name.is_empty() {
                format!("0x{addr:04X}")
            } else {
                format!("0x{addr:04X}.{short_name}")
            }
        }
        (addr, None) => format!("0x{addr:04X}"),
    }
}

fn run_check(config: &Path) -> Result<(), i32> {
    let session = load(config)?;
    let labels = session.labels();
    println!("Memory model: {}", session.model().name());
    println!("Labels: {}", labels.label_count());
    println!("Addresses: {}", labels.address_count());
    println!(
        "WPMEM: {}, ASSERTION: {}, LOGPOINT: {}",
        labels.watch_point_lines().len(),
        labels.assertion_lines().len(),
        labels.log_point_lines().len()
    );
    let warnings = labels.warnings();
    if !warnings.is_empty() {
        println!("Warnings:\n{warnings}");
    }
    Ok(())
}

fn run_label(config: &Path, name: &str) -> Result<(), i32> {
    let session = load(config)?;
    let labels = session.labels();
    let Some(value) = labels.number_for_label(name) else {
        eprintln!("error: unknown label: {name}");
        return Err(1);
    };
    match u32::try_from(value) {
        Ok(long_addr) => println!("{name} = {} ({value})", format_address(&session, long_addr)),
        Err(_) => println!("{name} = {value}"),
    }
    if let Some(location) = labels.location_of_label(name) {
        println!("{}:{}", location.file, location.line_nr + 1);
    }
    Ok(())
}

fn run_addr(config: &Path, address: u32) -> Result<(), i32> {
    let session = load(config)?;
    let labels = session.labels();
    let long_addr = session.resolve_address(address);
    println!("{}", format_address(&session, long_addr));
    if let Some((file, line)) = labels.file_and_line_for_address(long_addr) {
        println!("{file}:{}", line + 1);
    }
    let names = labels.labels_for_long_address(long_addr);
    let names = if names.is_empty() {
        labels.labels_plus_index_for_number_64k(long_addr & 0xFFFF, None)
    } else {
        names.to_vec()
    };
    for name in names {
        println!("{name}");
    }
    Ok(())
}

fn run_line(config: &Path, file: &str, line: usize) -> Result<(), i32> {
    let session = load(config)?;
    let Some(long_addr) = session.labels().addr_for_file_and_line(file, line - 1) else {
        eprintln!("error: no address for {file}:{line}");
        return Err(1);
    };
    println!("{}", format_address(&session, long_addr));
    Ok(())
}

fn run_banks(name: &str) -> Result<(), i32> {
    let model = MemoryModel::from_name(name, None).map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;
    println!("{}", model.name());
    for (slot, bank) in model.memory_banks(model.initial_slots()).iter().enumerate() {
        let reachable = model
            .banks_reachable_from(bank.start)
            .iter()
            .map(|&b| match model.bank_short_name(b) {
                "" => b.to_string(),
                short => short.to_string(),
            })
            .collect::<Vec<_>>()
            .join(",");
        println!(
            "slot {slot}: 0x{:04X}-0x{:04X} {} [{reachable}]",
            bank.start, bank.end, bank.name
        );
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Command(command)) => {
            let result = match command {
                Command::Check(config) => run_check(&config),
                Command::Label { config, name } => run_label(&config, &name),
                Command::Addr { config, address } => run_addr(&config, address),
                Command::Line { config, file, line } => run_line(&config, &file, line),
                Command::Banks(model) => run_banks(&model),
            };
            match result {
                Ok(()) => 0,
                Err(code) => code,
            }
        }
        Err(error) => {
            eprintln!("error: {error}");
            eprintln!("{USAGE_TEXT}");
            1
        }
    };

    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::path::PathBuf;

    fn args<'a>(list: &'a [&'a str]) -> impl Iterator<Item = OsString> + 'a {
        list.iter().map(OsString::from)
    }

    fn command(list: &[&str]) -> Command {
        match parse_args(args(list)).expect("valid args should parse") {
            ParseResult::Command(command) => command,
            ParseResult::Help => panic!("unexpected help"),
        }
    }

    #[test]
    fn parses_addr_in_any_notation() {
        for text in ["0x8000", "$8000", "8000h", "32768"] {
            assert_eq!(
                command(&["addr", "launch.json", text]),
                Command::Addr {
                    config: PathBuf::from("launch.json"),
                    address: 0x8000,
                }
            );
        }
        assert_eq!(
            command(&["addr", "launch.json", "0x38000"]),
            Command::Addr {
                config: PathBuf::from("launch.json"),
                address: 0x3_8000,
            }
        );
    }

    #[test]
    fn parses_line_command() {
        assert_eq!(
            command(&["line", "launch.json", "main.asm", "12"]),
            Command::Line {
                config: PathBuf::from("launch.json"),
                file: "main.asm".to_string(),
                line: 12,
            }
        );
        let error = parse_args(args(&["line", "launch.json", "main.asm", "0"]))
            .expect_err("line 0 should fail");
        assert!(error.contains("invalid line number"));
    }

    #[test]
    fn parses_help_flag() {
        let result = parse_args(args(&["--help"])).expect("help should parse without error");
        assert!(matches!(result, ParseResult::Help));
        let result = parse_args(args(&["banks", "-h"])).expect("help should parse without error");
        assert!(matches!(result, ParseResult::Help));
    }

    #[test]
    fn rejects_bad_input() {
        let error = parse_args(args(&["unknown"])).expect_err("unknown command should fail");
        assert!(error.contains("unknown command"));
        let error = parse_args(args(&["check"])).expect_err("missing config should fail");
        assert!(error.contains("wrong number of arguments"));
        let error = parse_args(args(&["check", "-v", "a.json"])).expect_err("options should fail");
        assert!(error.contains("unknown option"));
        let error = parse_args(args(&["addr", "a.json", "xyz"])).expect_err("bad address");
        assert!(error.contains("invalid address"));
        assert!(parse_args(std::iter::empty()).is_err());
    }
}
