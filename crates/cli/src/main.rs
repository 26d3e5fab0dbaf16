//! Shop Concierge CLI - catalog inspection and local conversations.
//!
//! # Usage
//!
//! ```bash
//! # List the demo catalog
//! sc-cli catalog
//!
//! # Run a tool directly, as the model would
//! sc-cli tool search_products '{"description": "藍色襯衫"}'
//! sc-cli tool get_order_history '{"time_range": "last_month"}' --user U123
//!
//! # Write a product picture to disk
//! sc-cli render P001 p001.jpg
//!
//! # Chat with the assistant from the terminal (needs an LLM API key)
//! sc-cli chat --user U123 --image-dir ./replies
//! ```
//!
//! # Commands
//!
//! - `catalog` - List catalog products
//! - `tool` - Execute one tool call
//! - `render` - Produce a product JPEG
//! - `chat` - Interactive conversation through the full tool-calling loop

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "sc-cli")]
#[command(author, version, about = "Shop Concierge CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List catalog products
    Catalog,
    /// Execute a tool call against the demo catalog and ledger
    Tool {
        /// Tool name (`search_products`, `get_order_history`, `get_product_details`)
        name: String,

        /// Tool arguments as a JSON object
        #[arg(default_value = "{}")]
        args: String,

        /// LINE user ID the call is made for
        #[arg(short, long, default_value = "cli-user")]
        user: String,

        /// Write the attached product picture here
        #[arg(short, long)]
        image_out: Option<PathBuf>,
    },
    /// Produce a product picture
    Render {
        /// Product ID, e.g. `P001`
        product_id: String,

        /// Output JPEG path
        out: PathBuf,
    },
    /// Chat with the assistant on stdin/stdout
    Chat {
        /// LINE user ID to chat as
        #[arg(short, long, default_value = "cli-user")]
        user: String,

        /// Directory for reply pictures
        #[arg(long, default_value = ".")]
        image_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Catalog => commands::catalog::list()?,
        Commands::Tool {
            name,
            args,
            user,
            image_out,
        } => commands::tool::run(&name, &args, &user, image_out.as_deref())?,
        Commands::Render { product_id, out } => commands::catalog::render(&product_id, &out)?,
        Commands::Chat { user, image_dir } => commands::chat::run(&user, &image_dir).await?,
    }
    Ok(())
}
