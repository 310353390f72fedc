mod exports;
mod progress;
mod styling;
mod summary;
mod tables;

pub use exports::{export_json, SeedReport, WikiReport};
pub use progress::PhaseProgress;
pub use styling::{dim, title};
pub use summary::print_summary;

/// Prints the `CISeed` banner to stderr.
///
/// Displays the tool name, version, and description at the start of execution.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        title("🌱 CISeed"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("CI Pipeline Seeding Tool")
    );
}
