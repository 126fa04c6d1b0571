use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "edgeline")]
#[command(version = "0.1.0")]
#[command(about = "Cross-venue mispricing detector for sports prediction markets", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file or directory path
    #[arg(short, long, default_value = "config")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server the scheduler calls
    Serve {
        /// Port to listen on (default from config, usually 8080)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run a single detection pass and print the counters
    Pass,
}
