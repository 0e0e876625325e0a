//! Rules command: list the registered extraction rules.

use std::io::Write;

use anyhow::Result;
use xp_core::Registry;

pub fn run<W: Write>(writer: &mut W, registry: &Registry) -> Result<()> {
    for rule in registry.iter() {
        writeln!(
            writer,
            "{:<10} {:<14} {}",
            rule.name,
            rule.file_name(),
            rule.columns.join(",")
        )?;
    }
    Ok(())
}
