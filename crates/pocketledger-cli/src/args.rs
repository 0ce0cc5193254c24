use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use pocketledger_core::models::EntryType;

#[derive(Parser, Debug)]
#[command(name = "pocketledger")]
#[command(version)]
#[command(about = "Track income, expenses and budgets from the terminal", long_about = None)]
pub struct Cli {
    /// Backend API base URL (overrides the config file)
    #[arg(long, global = true, env = "POCKETLEDGER_API_URL")]
    pub api_url: Option<String>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in with email and password
    Login {
        #[arg(short, long)]
        email: Option<String>,
    },
    /// Create an account and log in
    Register {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        username: String,
    },
    /// Log out and forget the stored session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Show or update profile fields
    Profile {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
    },
    /// Change the account password
    ChangePassword,
    /// This month's totals, expense breakdown and recent transactions
    Dashboard,
    /// Income and expense entries
    #[command(subcommand)]
    Transactions(TransactionCommand),
    /// Transaction categories
    #[command(subcommand)]
    Categories(CategoryCommand),
    /// Monthly spending limits
    #[command(subcommand)]
    Budgets(BudgetCommand),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Kind {
    Income,
    Expense,
}

impl From<Kind> for EntryType {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Income => EntryType::Income,
            Kind::Expense => EntryType::Expense,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum TransactionCommand {
    /// List transactions, newest first
    List(TransactionListArgs),
    /// Record a transaction
    Add(TransactionAddArgs),
    /// Delete a transaction by id
    Delete { id: i64 },
}

#[derive(Args, Debug)]
pub struct TransactionListArgs {
    #[arg(long, value_enum)]
    pub kind: Option<Kind>,
    /// Category id
    #[arg(long)]
    pub category: Option<i64>,
    /// First day to include (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<String>,
    /// Last day to include (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<String>,
    /// Search titles and descriptions
    #[arg(short, long)]
    pub search: Option<String>,
    #[arg(short = 'n', long)]
    pub limit: Option<u32>,
}

#[derive(Args, Debug)]
pub struct TransactionAddArgs {
    pub title: String,
    pub amount: String,
    #[arg(long, value_enum, default_value_t = Kind::Expense)]
    pub kind: Kind,
    /// Category id
    #[arg(short, long)]
    pub category: Option<i64>,
    /// Defaults to today (YYYY-MM-DD)
    #[arg(short, long)]
    pub date: Option<String>,
    #[arg(long, default_value = "")]
    pub description: String,
}

#[derive(Subcommand, Debug)]
pub enum CategoryCommand {
    /// List categories
    List {
        #[arg(long, value_enum)]
        kind: Option<Kind>,
    },
    /// Create a category
    Add(CategoryAddArgs),
    /// Create the starter income and expense categories
    Defaults,
    /// Delete a category by id
    Delete { id: i64 },
}

#[derive(Args, Debug)]
pub struct CategoryAddArgs {
    pub name: String,
    #[arg(long, value_enum)]
    pub kind: Option<Kind>,
    /// Hex color such as #3B82F6
    #[arg(long, default_value = pocketledger_core::models::category::DEFAULT_CATEGORY_COLOR)]
    pub color: String,
    #[arg(long, default_value = "")]
    pub icon: String,
    #[arg(long, default_value = "")]
    pub description: String,
}

#[derive(Subcommand, Debug)]
pub enum BudgetCommand {
    /// List budgets with spending so far
    List {
        /// Only active budgets
        #[arg(long)]
        active: bool,
    },
    /// Set a monthly budget for a category
    Add(BudgetAddArgs),
    /// Delete a budget by id
    Delete { id: i64 },
}

#[derive(Args, Debug)]
pub struct BudgetAddArgs {
    /// Category id
    #[arg(short, long)]
    pub category: Option<i64>,
    /// Whole amount; separators like 1,000,000 are fine
    pub amount: String,
    /// Month as YYYY-MM, defaults to the current month
    #[arg(short, long)]
    pub month: Option<String>,
    #[arg(long, default_value = "")]
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_transaction_add() {
        let cli = Cli::try_parse_from([
            "pocketledger",
            "transactions",
            "add",
            "Lunch",
            "12000",
            "--category",
            "3",
            "--kind",
            "expense",
        ])
        .unwrap();
        match cli.command {
            Commands::Transactions(TransactionCommand::Add(args)) => {
                assert_eq!(args.title, "Lunch");
                assert_eq!(args.amount, "12000");
                assert_eq!(args.category, Some(3));
                assert_eq!(args.kind, Kind::Expense);
                assert!(args.date.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_api_url_after_subcommand() {
        let cli = Cli::try_parse_from([
            "pocketledger",
            "whoami",
            "--api-url",
            "http://example.com/api",
        ])
        .unwrap();
        assert_eq!(cli.api_url.as_deref(), Some("http://example.com/api"));
    }
}
