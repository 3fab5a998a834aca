//! Command-line definition.

use clap::{Args, Parser, Subcommand};

use common::config::DbOverrides;

/// Run SQL against MySQL or PostgreSQL.
#[derive(Debug, Parser)]
#[command(name = "db-utils", version, about)]
pub struct Cli {
    /// Log output format: plain (default) or json.
    #[arg(long, global = true, default_value = "plain", value_parser = ["plain", "json"])]
    pub log_format: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Execute a SQL query.
    Query(QueryArgs),
    /// List the tables of the database.
    ListTables(ConnectionArgs),
    /// Show the columns of a table.
    DescribeTable(DescribeArgs),
}

/// Connection flags; anything left out comes from the environment.
#[derive(Debug, Args, Default)]
pub struct ConnectionArgs {
    /// Database username
    #[arg(long)]
    pub username: Option<String>,

    /// Database password
    #[arg(long)]
    pub password: Option<String>,

    /// Database name
    #[arg(long)]
    pub dbname: Option<String>,

    /// Database driver: mysql or postgresql
    #[arg(long)]
    pub driver: Option<String>,

    /// Database host
    #[arg(long)]
    pub host: Option<String>,

    /// Database port
    #[arg(long)]
    pub port: Option<u16>,
}

impl From<ConnectionArgs> for DbOverrides {
    fn from(args: ConnectionArgs) -> Self {
        DbOverrides {
            username: args.username,
            password: args.password,
            dbname: args.dbname,
            driver: args.driver,
            host: args.host,
            port: args.port,
        }
    }
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    /// SQL query, with optional :name placeholders
    #[arg(long)]
    pub query: String,

    /// Bind parameters as a JSON object
    #[arg(long)]
    pub params: Option<String>,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Output format: csv, json or df
    #[arg(long, default_value = "csv")]
    pub output_format: String,
}

#[derive(Debug, Args)]
pub struct DescribeArgs {
    /// Table name, optionally schema-qualified
    #[arg(long)]
    pub table: String,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Output format: csv, json or df
    #[arg(long, default_value = "csv")]
    pub output_format: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_subcommand() {
        let cli = Cli::try_parse_from([
            "db-utils",
            "query",
            "--query",
            "SELECT 1",
            "--driver",
            "postgresql",
            "--port",
            "5432",
            "--output-format",
            "json",
        ])
        .unwrap();

        match cli.command {
            Some(Command::Query(args)) => {
                assert_eq!(args.query, "SELECT 1");
                assert_eq!(args.output_format, "json");
                assert_eq!(args.connection.driver.as_deref(), Some("postgresql"));
                assert_eq!(args.connection.port, Some(5432));
                assert!(args.connection.host.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_list_tables_and_describe_names() {
        let cli = Cli::try_parse_from(["db-utils", "list-tables", "--dbname", "shop"]).unwrap();
        assert!(matches!(cli.command, Some(Command::ListTables(ref a)) if a.dbname.as_deref() == Some("shop")));

        let cli = Cli::try_parse_from(["db-utils", "describe-table", "--table", "users"]).unwrap();
        match cli.command {
            Some(Command::DescribeTable(args)) => {
                assert_eq!(args.table, "users");
                assert_eq!(args.output_format, "csv");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_no_subcommand_is_accepted() {
        let cli = Cli::try_parse_from(["db-utils"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.log_format, "plain");
    }

    #[test]
    fn test_bad_port_is_rejected() {
        assert!(Cli::try_parse_from(["db-utils", "list-tables", "--port", "http"]).is_err());
    }
}
