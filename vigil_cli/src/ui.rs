// Terminal output helpers
use colored::Colorize;
use serde_json::Value;

pub fn print_header(text: &str) {
    println!("\n{}", text.bold().cyan());
    println!("{}", "=".repeat(text.chars().count()).cyan());
}

pub fn print_success(text: &str) {
    println!("{} {}", "✓".green().bold(), text.green());
}

pub fn print_error(text: &str) {
    println!("{} {}", "✗".red().bold(), text.red());
}

pub fn print_warning(text: &str) {
    println!("{} {}", "⚠".yellow().bold(), text.yellow());
}

pub fn print_info(text: &str) {
    println!("{} {}", "ℹ".blue().bold(), text);
}

/// Prints a monitor payload as indented `key: value` lines.
pub fn print_value(value: &Value, indent: usize) {
    let pad = "  ".repeat(indent);
    match value {
        Value::Object(map) => {
            for (key, value) in map {
                match value {
                    Value::Object(_) | Value::Array(_) => {
                        println!("{}{}:", pad, key.bold());
                        print_value(value, indent + 1);
                    }
                    _ => println!("{}{}: {}", pad, key.bold(), scalar(value)),
                }
            }
        }
        Value::Array(items) => {
            if items.is_empty() {
                println!("{}{}", pad, "(none)".dimmed());
            }
            for item in items {
                match item {
                    Value::Object(_) | Value::Array(_) => {
                        println!("{}-", pad);
                        print_value(item, indent + 1);
                    }
                    _ => println!("{}- {}", pad, scalar(item)),
                }
            }
        }
        _ => println!("{}{}", pad, scalar(value)),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}
