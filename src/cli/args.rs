//! Argument definitions for the `flowsmith` command line

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use flowsmith_artifacts::ArtifactQuery;
use flowsmith_utils::logging::LogFormat;

/// flowsmith - LLM-assisted workflow improvement and deployment
#[derive(Parser, Debug)]
#[command(name = "flowsmith")]
#[command(about = "Send prompts to LLM providers, improve generated workflows and deploy them")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log line format: compact or json
    #[arg(long, global = true, default_value = "compact")]
    pub log_format: LogFormat,

    /// Directory holding persisted records
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Root directory of generated workflows
    #[arg(long, global = true)]
    pub artifacts_root: Option<PathBuf>,

    /// Provider used when a command does not name one
    #[arg(long, global = true)]
    pub default_provider: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send a prompt to an LLM provider and persist the exchange
    ///
    /// EXAMPLES:
    ///   flowsmith ask "Summarize this error"
    ///   echo "hello" | flowsmith ask --provider anthropic
    ///   flowsmith ask "and now?" --conversation <id>
    Ask {
        /// Prompt text; read from stdin when omitted
        prompt: Option<String>,

        #[arg(long)]
        provider: Option<String>,

        #[arg(long)]
        model: Option<String>,

        /// System message prepended to the context
        #[arg(long)]
        system: Option<String>,

        /// Conversation to continue
        #[arg(long)]
        conversation: Option<String>,

        #[arg(long)]
        temperature: Option<f32>,

        #[arg(long)]
        max_tokens: Option<u32>,
    },

    /// Inspect and retry persisted LLM requests
    #[command(subcommand)]
    Request(RequestCommand),

    /// Manage conversations
    #[command(subcommand)]
    Conversation(ConversationCommand),

    /// List known models
    Models {
        /// Only this provider's models
        #[arg(long)]
        provider: Option<String>,
    },

    /// Find and inspect generated workflow files
    #[command(subcommand)]
    Artifacts(ArtifactsCommand),

    /// Rewrite a generated workflow with an LLM
    #[command(subcommand)]
    Improve(ImproveCommand),

    /// Deliver files to the execution host
    #[command(subcommand)]
    Deploy(DeployCommand),

    /// Manage the remote-shell connection
    #[command(subcommand)]
    Connection(ConnectionCommand),
}

#[derive(Subcommand, Debug)]
pub enum RequestCommand {
    /// Show one request
    Show { id: String },
    /// List requests, newest first
    List,
    /// Re-run a failed request
    Retry { id: String },
}

#[derive(Subcommand, Debug)]
pub enum ConversationCommand {
    /// Start a conversation
    New {
        title: String,
        #[arg(long)]
        provider: Option<String>,
        #[arg(long)]
        model: Option<String>,
    },
    /// Show a conversation and its messages
    Show { id: String },
    /// List conversations, most recently updated first
    List,
}

#[derive(Subcommand, Debug)]
pub enum ArtifactsCommand {
    /// List generated files, newest first
    List,
    /// Show the most recently generated file
    Latest,
    /// Resolve resolver keys to a file path
    Resolve(QueryArgs),
    /// Show a file's content and metadata
    Show(QueryArgs),
    /// Report upstream generation status for a workflow
    Status { workflow_id: String },
}

/// Resolver keys, tried in the order given here
#[derive(Args, Debug, Clone, Default)]
pub struct QueryArgs {
    #[arg(long)]
    pub workflow_id: Option<String>,
    #[arg(long)]
    pub file_name: Option<String>,
    #[arg(long)]
    pub file_path: Option<String>,
}

impl QueryArgs {
    #[must_use]
    pub fn to_query(&self) -> ArtifactQuery {
        ArtifactQuery {
            workflow_id: self.workflow_id.clone(),
            file_name: self.file_name.clone(),
            file_path: self.file_path.clone().map(Into::into),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum ImproveCommand {
    /// Run one improvement round
    Run {
        #[command(flatten)]
        query: QueryArgs,

        #[arg(long)]
        provider: Option<String>,

        #[arg(long)]
        model: Option<String>,

        /// Extra guidance appended to the prompt
        #[arg(long)]
        instructions: Option<String>,

        /// Replace the configured system prompt
        #[arg(long)]
        system_prompt: Option<String>,

        /// Rewrite the file but skip deployment
        #[arg(long)]
        no_deploy: bool,
    },
    /// Show one analysis
    Show { id: String },
    /// List analyses, newest first
    List,
    /// Re-run a failed analysis
    Retry {
        id: String,
        #[arg(long)]
        no_deploy: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum DeployCommand {
    /// Deploy a local file
    File {
        path: PathBuf,

        /// Workflow directory on the execution host
        #[arg(long)]
        workflow_id: Option<String>,

        /// Name on the execution host; defaults to the local file name
        #[arg(long)]
        name: Option<String>,
    },
    /// Show one deployment
    Show { id: String },
    /// List deployments, newest first
    List,
    /// Create a new attempt from a failed or pending deployment
    Retry { id: String },
}

#[derive(Subcommand, Debug)]
pub enum ConnectionCommand {
    /// Create the configured connection if it does not exist
    Setup,
    /// Connect and run an echo
    Test {
        /// Connection name; the configured one when omitted
        #[arg(long)]
        name: Option<String>,
    },
    /// Run a command on the execution host
    Exec {
        #[arg(long)]
        name: Option<String>,

        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("flowsmith").chain(args.iter().copied()))
            .expect("arguments should parse")
    }

    #[test]
    fn test_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = parse(&["models", "--store", "/tmp/s", "--json", "--log-format", "json"]);
        assert_eq!(cli.store, Some(PathBuf::from("/tmp/s")));
        assert!(cli.json);
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn test_improve_run_collects_resolver_keys() {
        let cli = parse(&["improve", "run", "--workflow-id", "42", "--no-deploy"]);
        let Command::Improve(ImproveCommand::Run {
            query, no_deploy, ..
        }) = cli.command
        else {
            panic!("expected improve run");
        };
        assert!(no_deploy);
        let query = query.to_query();
        assert_eq!(query.workflow_id.as_deref(), Some("42"));
        assert!(query.file_name.is_none());
        assert!(query.file_path.is_none());
    }

    #[test]
    fn test_connection_exec_keeps_hyphenated_arguments() {
        let cli = parse(&["connection", "exec", "ls", "-la", "/data"]);
        let Command::Connection(ConnectionCommand::Exec { name, command }) = cli.command else {
            panic!("expected connection exec");
        };
        assert!(name.is_none());
        assert_eq!(command, vec!["ls", "-la", "/data"]);
    }

    #[test]
    fn test_unknown_log_format_is_rejected() {
        let err = Cli::try_parse_from(["flowsmith", "--log-format", "xml", "models"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
