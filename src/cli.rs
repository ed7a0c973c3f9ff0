//! CLI domain: parse, route, output, and presentation only.
//! Strategy work happens in the library; routes only start, query and stop strategies.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands, OutputFormat};
pub use presentation::{format_scan_json, format_scan_text, ScanEntry, ScanReport};
pub use route::RunContext;
