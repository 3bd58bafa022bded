use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "botdesk")]
#[command(author, version, about = "Admin backend for operating a Telegram bot", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the webhook + admin server and the broadcast dispatcher
    Serve {
        /// HTTP listen port (overrides HTTP_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Register a webhook URL with the provider and persist it
    SetWebhook {
        /// Public URL the provider should POST updates to
        url: String,
    },

    /// Remove the registered webhook
    DeleteWebhook,

    /// Show the configured bot's identity (getMe)
    Status,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
