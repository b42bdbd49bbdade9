use anyhow::Result;

fn main() -> Result<()> {
    havenloader::cli::run()
}
