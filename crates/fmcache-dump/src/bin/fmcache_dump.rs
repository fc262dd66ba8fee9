use anyhow::Result;

fn main() -> Result<()> {
    fmcache_dump::cli::run()
}
