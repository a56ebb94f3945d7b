//! Paths command handler.

use anyhow::Result;

use crate::bootstrap::CliContext;

/// Print the resolved data directory and settings file.
pub fn execute(ctx: &CliContext) -> Result<()> {
    println!("data_dir = {}", ctx.data_dir.display());
    println!(
        "settings_file = {} ({})",
        ctx.settings_path.display(),
        if ctx.settings_path.exists() {
            "present"
        } else {
            "not yet written"
        }
    );
    Ok(())
}
