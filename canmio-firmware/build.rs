//! Build script for canmio-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates module.toml at compile time

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Number of I/O lines on the module
const NUM_IO: i64 = 16;

const LINE_TYPES: [&str; 5] = ["input", "output", "servo", "bounce", "multi"];
const TRAVEL_KEYS: [&str; 4] = ["start_pos", "end_pos", "on_speed", "off_speed"];
const MULTI_KEYS: [&str; 2] = ["positions", "speed"];
const MODULE_KEYS: [&str; 1] = ["sod_delay"];

fn main() {
    setup_linker();
    validate_config();
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    // Copy memory.x to the output directory
    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    // Tell rustc where to find memory.x
    println!("cargo:rustc-link-search={}", out_dir.display());

    // Re-run if memory.x changes
    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Validate module.toml configuration at compile time
fn validate_config() {
    println!("cargo:rerun-if-changed=module.toml");

    let config_path = Path::new("module.toml");

    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: module.toml not found!                                   ║\n\
            ║                                                                  ║\n\
            ║  The firmware embeds module.toml as its default line setup.      ║\n\
            ║  Please create one in the canmio-firmware directory.             ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read module.toml                               ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let config: toml::Value = match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => {
            let error_msg = e.to_string();
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in module.toml                       ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                ║                                                                  ║\n\
                {}\n\
                ║                                                                  ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&error_msg)
            );
        }
    };

    validate_sections(&config);
    validate_module(&config);
    validate_lines(&config);

    println!("cargo:warning=module.toml validated successfully");
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Panic with a boxed list of errors
fn report(title: &str, errors: &[String]) {
    if errors.is_empty() {
        return;
    }
    panic!(
        "\n\
        ╔══════════════════════════════════════════════════════════════════╗\n\
        ║  ERROR: {:<56} ║\n\
        ╠══════════════════════════════════════════════════════════════════╣\n\
        {}\n\
        ╚══════════════════════════════════════════════════════════════════╝\n",
        title,
        errors
            .iter()
            .map(|e| format!("║  • {:<62} ║", e))
            .collect::<Vec<_>>()
            .join("\n")
    );
}

/// Only `[module]` and `[io.N]` tables are allowed at the top level
fn validate_sections(config: &toml::Value) {
    let mut errors = Vec::new();

    if let Some(root) = config.as_table() {
        for (key, value) in root {
            match key.as_str() {
                "io" if !value.is_table() => {
                    errors.push("'io' must be a table of [io.N] sections".to_string());
                }
                "module" if !value.is_table() => {
                    errors.push("'module' must be a table".to_string());
                }
                "io" | "module" => {}
                _ => errors.push(format!("Unknown top-level key '{}'", key)),
            }
        }
    }

    report("Invalid layout in module.toml", &errors);
}

/// Validate the `[module]` section
fn validate_module(config: &toml::Value) {
    let module = match config.get("module") {
        Some(toml::Value::Table(t)) => t,
        _ => return,
    };

    let mut errors = Vec::new();

    for (key, value) in module {
        if !MODULE_KEYS.contains(&key.as_str()) {
            errors.push(format!("[module] unknown key '{}'", key));
        } else if !is_byte(value) {
            errors.push(format!("[module] {} must be 0-255", key));
        }
    }

    report("Invalid module settings", &errors);
}

/// Validate each `[io.N]` section
fn validate_lines(config: &toml::Value) {
    let lines = match config.get("io") {
        Some(toml::Value::Table(t)) => t,
        _ => return,
    };

    let mut errors = Vec::new();

    for (name, line) in lines {
        match name.parse::<i64>() {
            Ok(io) if (0..NUM_IO).contains(&io) => {}
            _ => {
                errors.push(format!("[io.{}] line must be 0-{}", name, NUM_IO - 1));
                continue;
            }
        }

        let line = match line {
            toml::Value::Table(t) => t,
            _ => {
                errors.push(format!("[io.{}] must be a table", name));
                continue;
            }
        };

        let line_type = match line.get("type") {
            Some(toml::Value::String(t)) if line_type_name(t).is_some() => {
                t.to_lowercase()
            }
            Some(_) => {
                errors.push(format!(
                    "[io.{}] type must be one of {}",
                    name,
                    LINE_TYPES.join(", ")
                ));
                continue;
            }
            None => {
                errors.push(format!("[io.{}] missing 'type'", name));
                continue;
            }
        };

        let allowed: &[&str] = match line_type.as_str() {
            "servo" | "bounce" => &TRAVEL_KEYS,
            "multi" => &MULTI_KEYS,
            _ => &[],
        };

        for (key, value) in line {
            if key == "type" {
                continue;
            }
            if !allowed.contains(&key.as_str()) {
                errors.push(format!(
                    "[io.{}] '{}' is not valid for a {} line",
                    name, key, line_type
                ));
                continue;
            }
            if key == "positions" {
                validate_positions(name, value, &mut errors);
            } else if !is_byte(value) {
                errors.push(format!("[io.{}] {} must be 0-255", name, key));
            }
        }

        if line_type == "multi" && line.get("positions").is_none() {
            errors.push(format!("[io.{}] multi line missing 'positions'", name));
        }
    }

    report("Invalid line configuration", &errors);
}

fn validate_positions(name: &str, value: &toml::Value, errors: &mut Vec<String>) {
    let positions = match value.as_array() {
        Some(p) => p,
        None => {
            errors.push(format!("[io.{}] positions must be an array", name));
            return;
        }
    };

    if !(2..=4).contains(&positions.len()) {
        errors.push(format!("[io.{}] positions needs 2 to 4 entries", name));
    }
    if !positions.iter().all(is_byte) {
        errors.push(format!("[io.{}] positions must be 0-255", name));
    }
}

/// Type names are accepted in all lower or all upper case
fn line_type_name(name: &str) -> Option<&'static str> {
    let lower = name.to_lowercase();
    if name != lower && name != name.to_uppercase() {
        return None;
    }
    LINE_TYPES.iter().copied().find(|t| *t == lower)
}

fn is_byte(value: &toml::Value) -> bool {
    matches!(value, toml::Value::Integer(v) if (0..=255).contains(v))
}
