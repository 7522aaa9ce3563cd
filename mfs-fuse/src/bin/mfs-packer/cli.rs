use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
pub struct Cli {
    /// Image file to create (truncated if it exists)
    #[arg(long, short)]
    pub image: PathBuf,

    /// Volume name
    #[arg(long, short, default_value = "MOSQUITOS")]
    pub name: String,

    /// Image size in MiB
    #[arg(long, default_value_t = 16)]
    pub size_mib: u64,

    /// Host directory copied into the root of the volume
    #[arg(long, short)]
    pub source: Option<PathBuf>,
}
