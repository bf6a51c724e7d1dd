use clap::Parser;

/// vpsdeploy - provision Node.js and pm2, then deploy the backend
///
/// Takes no arguments: what is deployed, and where, is fixed at build time.
#[derive(Parser, Debug)]
#[command(name = "vpsdeploy")]
#[command(about = "Provision Node.js and pm2, then clone or update and (re)start the backend")]
#[command(version)]
pub struct Cli {
    /// Log at debug level, including every external command line.
    ///
    /// RUST_LOG, when set, takes precedence.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }

    /// Default log filter directive for this invocation.
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}
