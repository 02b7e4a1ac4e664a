// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Terminal output helpers shared by the CLI commands

use colored::{ColoredString, Colorize};

/// Leading mark of a status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Ok,
    Failed,
    Warning,
}

impl Mark {
    fn symbol(self) -> ColoredString {
        match self {
            Self::Ok => "✓".green(),
            Self::Failed => "✗".red(),
            Self::Warning => "⚠".yellow(),
        }
    }
}

/// Print an indented status line
pub fn print_marked(mark: Mark, msg: &str) {
    println!("  {} {}", mark.symbol(), msg);
}

/// Print a blank line and a bold section title
pub fn print_section(title: &str) {
    println!();
    println!("{}:", title.bold());
}

pub fn print_success(msg: &str) {
    print_marked(Mark::Ok, msg);
}

pub fn print_error(msg: &str) {
    print_marked(Mark::Failed, msg);
}

pub fn print_warning(msg: &str) {
    print_marked(Mark::Warning, msg);
}
