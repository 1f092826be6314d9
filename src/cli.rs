use clap::{Parser, Subcommand};

/// kasalink — IFTTT service shim for TP-Link Kasa smart plugs
#[derive(Parser)]
#[command(name = "kasalink", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the webhook server
    Serve {
        /// Port to bind (overrides KASALINK_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Log in to the vendor cloud and print the device inventory
    Devices,
}
