//! CLI argument parsing for odb.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "odb",
    about = "Query and edit an OrientDB graph over HTTP",
    version,
    after_help = "Logs are written to: ~/.local/share/odbgraph/logs/odbgraph.log"
)]
pub struct Cli {
    /// Path to a YAML connection config (default: ~/.config/odbgraph/config.yaml)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Server host
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Server HTTP port
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Database name
    #[arg(short = 'D', long, global = true)]
    pub database: Option<String>,

    /// User name
    #[arg(short, long, global = true)]
    pub user: Option<String>,

    /// Password
    #[arg(short, long, global = true)]
    pub password: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check that the server accepts the credentials
    Ping,

    /// Run a raw SQL command and print the records
    Sql {
        /// Command text
        text: String,
    },

    /// List vertexes of a class or RID
    Vertexes {
        /// Class name, RID or RID list
        target: String,

        /// Maximum number of records
        #[arg(short, long)]
        limit: Option<usize>,

        /// Condition appended to the query, e.g. "WHERE name = 'Sue'"
        #[arg(short = 'w', long = "where")]
        condition: Option<String>,
    },

    /// List edges of a class or RID
    Edges {
        /// Class name, RID or RID list
        target: String,

        /// Maximum number of records
        #[arg(short, long)]
        limit: Option<usize>,

        /// Condition appended to the query
        #[arg(short = 'w', long = "where")]
        condition: Option<String>,
    },

    /// Show the edges of a vertex
    Neighbors {
        /// Vertex RID
        rid: String,

        /// in, out or both
        #[arg(short, long, default_value = "both")]
        direction: String,

        /// Edge class
        #[arg(short = 'k', long)]
        class: Option<String>,
    },

    /// Create a vertex from name/value pairs
    CreateVertex {
        /// Vertex class
        class: String,

        /// Alternating property names and values (values parsed as JSON when possible)
        pairs: Vec<String>,
    },

    /// Update properties of a vertex
    Set {
        /// Vertex RID
        rid: String,

        /// Alternating property names and values
        #[arg(required = true)]
        pairs: Vec<String>,
    },

    /// Delete vertexes
    DeleteVertex {
        #[arg(required = true)]
        rids: Vec<String>,
    },

    /// Delete edges
    DeleteEdge {
        #[arg(required = true)]
        rids: Vec<String>,
    },
}
