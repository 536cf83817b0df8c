//! Command-line shell

mod shell;

pub use shell::{Flow, Mode, Shell, ShellError};
