//! CLI argument definitions for the registry.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Entity registry -- users of three legal-entity types in one SQLite file.
#[derive(Parser)]
#[command(
    name = "registry",
    version,
    about = "Entity registry over a SQLite file",
    long_about = "Creates the registry schema, adds users of type ИП, Юридическое лицо or \
                  Физическое лицо with per-type field validation, and inspects the database."
)]
pub struct Cli {
    /// Path to the database file (overrides config and environment).
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "registry.toml")]
    pub config: PathBuf,

    /// Enable debug logging.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the `types` and `users` tables and seed the entity types.
    Init,

    /// Add a user from a JSON object, e.g. '{"login": "anna", "type": 3, ...}'.
    AddUser {
        /// The user record as a JSON object.
        json: String,
    },

    /// Print a user's full name.
    Fullname {
        login: String,
    },

    /// Print a user's non-empty profile attributes as JSON.
    Attrs {
        login: String,
    },

    /// Print the name of a user's entity type.
    UserType {
        login: String,
    },

    /// Check a user's password.
    CheckPassword {
        login: String,
        password: String,
    },

    /// List the tables in the database.
    Tables,

    /// Show column metadata for a table.
    Describe {
        table: String,
    },

    /// List the column names of a table.
    Head {
        table: String,
    },

    /// Print every row of a table.
    Dump {
        table: String,

        /// Print rows as a JSON array of objects.
        #[arg(long)]
        json: bool,
    },

    /// Run a SQL statement and print the result rows.
    Query {
        /// The SQL text, with `?1`, `?2`, ... placeholders.
        sql: String,

        /// Positional parameters, bound as text.
        params: Vec<String>,
    },
}
