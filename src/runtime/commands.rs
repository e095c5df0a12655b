use std::fmt;

use clap::Subcommand;

use crate::command;

///////////////////////////////
/// Possible subcommands to parse
#[derive(Subcommand)]
pub enum Commands {
    /// Split matrix, BAM, FASTQ and VDJ outputs by tag assignment
    SplitTag(command::SplitTagCMD),
    /// Concatenate two matrix directories along the feature axis
    ConcatMatrix(command::ConcatMatrixCMD),
    /// Build a matrix directory from a long-format count table
    CountMatrix(command::CountMatrixCMD),
}

impl Commands {
    pub fn try_execute(&mut self) -> anyhow::Result<()> {
        log::debug!("Running {:?}", self);
        match self {
            Commands::SplitTag(cmd) => cmd.try_execute(),
            Commands::ConcatMatrix(cmd) => cmd.try_execute(),
            Commands::CountMatrix(cmd) => cmd.try_execute(),
        }
    }
}

impl fmt::Debug for Commands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cmd = match self {
            Commands::SplitTag(_) => "SplitTag",
            Commands::ConcatMatrix(_) => "ConcatMatrix",
            Commands::CountMatrix(_) => "CountMatrix",
        };
        write!(f, "{}", cmd)
    }
}
