use anyhow::Result;

fn main() -> Result<()> {
    flowboard::cli::run()
}
