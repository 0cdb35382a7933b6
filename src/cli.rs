use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "docstream")]
#[command(version, about = "DocStream - chat with your documents from the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Backend API base URL (defaults to the configured one)
    #[arg(long, global = true, env = "DOCSTREAM_BASE_URL")]
    pub base_url: Option<String>,

    /// Bearer token to use instead of the stored one
    #[arg(long, global = true, env = "DOCSTREAM_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Print decoded results as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open the interactive chat view for a conversation
    Chat {
        conversation_id: i64,

        /// Model to request (defaults to the configured one)
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Generate the reading-flow card for a document
    Flow { document_id: i64 },

    /// Generate a quiz for one page of a document
    Quiz {
        document_id: i64,

        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },

    /// List conversations
    List,

    /// Create a conversation
    New {
        title: String,

        /// Documents to attach, may be repeated
        #[arg(short, long = "document")]
        documents: Vec<i64>,
    },

    /// Delete a conversation
    Delete { conversation_id: i64 },

    /// Store the bearer token used for requests
    SetToken { token: String },
}
