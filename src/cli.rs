use clap::{Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(name = "barrage")]
#[command(about = "Command-line client for the barrage load testing service", long_about = None)]
#[command(version)]
pub struct Args {
    /// API host (defaults to $BARRAGE_HOST, then the public service)
    #[arg(long = "host", global = true)]
    pub host: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Compile a curl-style command line into a load test and run it remotely
    #[command(disable_help_flag = true)]
    Curl {
        /// curl-style tokens, e.g. -p 1-250:60 http://example.com/
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, num_args = 0..)]
        tokens: Vec<String>,
    },

    /// Verify API credentials with the service and store them locally
    Init {
        /// User id from the account settings
        user: Option<String>,
        /// API key from the account settings
        api_key: Option<String>,
    },
}
