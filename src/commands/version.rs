use anyhow::Result;

pub fn execute() -> Result<()> {
    println!("jmxmon version {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
