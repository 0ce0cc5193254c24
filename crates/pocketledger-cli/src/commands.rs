use std::io::{self, BufRead, Write};

use anyhow::{bail, Context as _, Result};
use chrono::Local;
use pocketledger_core::dashboard::{load_dashboard, BudgetOverview};
use pocketledger_core::models::{
    AuthPayload, BudgetFilter, CategoryFilter, RegisterRequest, TransactionFilter,
};
use pocketledger_core::utils::{format_currency, format_percentage, format_short_date, truncate_string};
use pocketledger_core::validation::{
    parse_date, BudgetForm, CategoryForm, FormErrors, LoginForm, PasswordChangeForm,
    RegistrationForm, TransactionForm,
};
use pocketledger_core::{ApiError, Config, SessionStore};
use serde_json::{Map, Value};
use tracing::debug;

use crate::args::{
    BudgetAddArgs, BudgetCommand, CategoryAddArgs, CategoryCommand, Commands, TransactionAddArgs,
    TransactionCommand, TransactionListArgs,
};

/// Maximum title width in list output
const TITLE_WIDTH: usize = 28;

/// Form field names as the backend reports them, per command
const LOGIN_FIELDS: &[&str] = &["email", "password"];
const REGISTER_FIELDS: &[&str] = &["email", "username", "password", "password_confirm"];
const PASSWORD_FIELDS: &[&str] = &["current_password", "new_password"];
const TRANSACTION_FIELDS: &[&str] = &["title", "amount", "type", "category", "date", "description"];
const CATEGORY_FIELDS: &[&str] = &["name", "type", "color", "icon", "description"];
const BUDGET_FIELDS: &[&str] = &["name", "amount", "category", "start_date", "end_date"];

pub struct Context {
    pub store: SessionStore,
    pub config: Config,
}

impl Context {
    fn require_login(&self) -> Result<()> {
        if !self.store.is_authenticated() {
            bail!("Not logged in. Run `pocketledger login` first.");
        }
        Ok(())
    }

    /// The user's preferred currency, else the configured one
    fn currency(&self) -> String {
        self.store
            .current_user()
            .and_then(|u| u.currency().map(str::to_string))
            .unwrap_or_else(|| self.config.currency.clone())
    }

    fn money(&self, amount: f64) -> String {
        format_currency(amount, &self.currency())
    }
}

pub async fn run(ctx: &mut Context, command: Commands) -> Result<()> {
    match command {
        Commands::Login { email } => login(ctx, email).await,
        Commands::Register { email, username } => register(ctx, email, username).await,
        Commands::Logout => {
            ctx.store.logout().await;
            println!("Logged out.");
            Ok(())
        }
        Commands::Whoami => whoami(ctx),
        Commands::Profile {
            first_name,
            last_name,
        } => profile(ctx, first_name, last_name).await,
        Commands::ChangePassword => change_password(ctx).await,
        Commands::Dashboard => dashboard(ctx).await,
        Commands::Transactions(cmd) => transactions(ctx, cmd).await,
        Commands::Categories(cmd) => categories(ctx, cmd).await,
        Commands::Budgets(cmd) => budgets(ctx, cmd).await,
    }
}

// ===== Prompts and error output =====

fn prompt_line(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn prompt_password(label: &str) -> Result<String> {
    rpassword::prompt_password(label).context("Failed to read password")
}

fn print_form_errors(errors: &FormErrors) {
    if let Some(general) = errors.general() {
        eprintln!("{}", general);
    }
    for (field, message) in errors.fields() {
        eprintln!("  {}: {}", field, message);
    }
}

/// Report client-side validation failures and stop
fn invalid(errors: FormErrors) -> anyhow::Error {
    print_form_errors(&errors);
    anyhow::anyhow!("Please fix the errors above")
}

/// Show backend field errors against the form, or pass the error through
fn rejected(err: ApiError, fields: &[&str], fallback: &str) -> anyhow::Error {
    if let Some(errors) = err.field_errors() {
        return invalid(errors.for_form(fields, fallback));
    }
    err.into()
}

// ===== Account =====

async fn login(ctx: &mut Context, email: Option<String>) -> Result<()> {
    let email = match email.or_else(|| ctx.config.last_email.clone()) {
        Some(email) => email,
        None => prompt_line("Email: ")?,
    };
    let password = prompt_password("Password: ")?;

    let form = LoginForm { email, password };
    let payload = sign_in(&ctx.store, &form).await?;

    ctx.config.last_email = Some(form.email.trim().to_string());
    if let Err(err) = ctx.config.save() {
        debug!(error = %err, "Could not remember login email");
    }

    println!(
        "{}",
        payload
            .message
            .unwrap_or_else(|| format!("Welcome, {}!", payload.user.display_name()))
    );
    Ok(())
}

async fn register(ctx: &mut Context, email: String, username: String) -> Result<()> {
    let password = prompt_password("Password: ")?;
    let password_confirm = prompt_password("Confirm password: ")?;

    let form = RegistrationForm {
        email,
        username,
        password,
        password_confirm,
    };
    let request = form.validate().map_err(invalid)?;
    let payload = sign_up(&ctx.store, &request).await?;

    ctx.config.last_email = Some(request.email.clone());
    if let Err(err) = ctx.config.save() {
        debug!(error = %err, "Could not remember login email");
    }
    println!("Account created. Welcome, {}!", payload.user.display_name());
    Ok(())
}

/// Validate and log in. Any stored session is dropped first so a stale
/// bearer token never reaches the login endpoint.
async fn sign_in(store: &SessionStore, form: &LoginForm) -> Result<AuthPayload> {
    form.validate().map_err(invalid)?;
    store.teardown();
    store
        .login(form.email.trim(), &form.password)
        .await
        .map_err(|e| rejected(e, LOGIN_FIELDS, "Login failed. Check your email and password."))
}

async fn sign_up(store: &SessionStore, request: &RegisterRequest) -> Result<AuthPayload> {
    store.teardown();
    store
        .register(request)
        .await
        .map_err(|e| rejected(e, REGISTER_FIELDS, "Registration failed."))
}

fn whoami(ctx: &Context) -> Result<()> {
    let Some(user) = ctx.store.current_user() else {
        println!("Not logged in.");
        return Ok(());
    };
    println!("{}", user.display_name());
    if let Some(email) = user.email() {
        println!("  email:    {}", email);
    }
    if let Some(username) = user.username() {
        println!("  username: {}", username);
    }
    println!("  currency: {}", ctx.currency());
    println!("  server:   {}", ctx.store.api().base_url());
    Ok(())
}

async fn profile(
    ctx: &Context,
    first_name: Option<String>,
    last_name: Option<String>,
) -> Result<()> {
    ctx.require_login()?;

    let mut partial = Map::new();
    if let Some(first) = first_name {
        partial.insert("first_name".to_string(), Value::String(first.trim().to_string()));
    }
    if let Some(last) = last_name {
        partial.insert("last_name".to_string(), Value::String(last.trim().to_string()));
    }

    let user = if partial.is_empty() {
        ctx.store.fetch_profile().await?
    } else {
        let user = ctx
            .store
            .update_profile(&partial)
            .await
            .map_err(|e| rejected(e, &["first_name", "last_name"], "Profile update failed."))?;
        println!("Profile updated.");
        user
    };

    let pretty = serde_json::to_string_pretty(user.fields())?;
    println!("{}", pretty);
    Ok(())
}

async fn change_password(ctx: &Context) -> Result<()> {
    ctx.require_login()?;

    let form = PasswordChangeForm {
        current_password: prompt_password("Current password: ")?,
        new_password: prompt_password("New password: ")?,
        confirm_password: prompt_password("Confirm new password: ")?,
    };
    let change = form.validate().map_err(invalid)?;

    ctx.store
        .change_password(&change)
        .await
        .map_err(|e| rejected(e, PASSWORD_FIELDS, "Password change failed."))?;
    println!("Password changed.");
    Ok(())
}

// ===== Dashboard =====

async fn dashboard(ctx: &Context) -> Result<()> {
    ctx.require_login()?;
    let dashboard = load_dashboard(ctx.store.api()).await?;

    if dashboard.is_empty() {
        println!("Nothing recorded yet. Add a transaction to get started.");
        return Ok(());
    }

    if let Some(ref stats) = dashboard.stats {
        println!("This month");
        println!("  Income   {:>16}", ctx.money(stats.total_income));
        println!("  Expense  {:>16}", ctx.money(stats.total_expense));
        println!("  Balance  {:>16}", ctx.money(stats.balance));
        println!("  {} transactions", stats.transaction_count);
    }

    let breakdown = dashboard.expense_breakdown();
    if !breakdown.is_empty() {
        println!();
        println!("Expenses by category");
        for slice in breakdown {
            println!(
                "  {:<20} {:>16} {:>7}",
                truncate_string(&slice.name, 20),
                ctx.money(slice.value),
                format_percentage(slice.percentage)
            );
        }
    }

    if !dashboard.recent.is_empty() {
        println!();
        println!("Recent transactions");
        for tx in &dashboard.recent {
            println!(
                "  {}  {:<width$} {:>16}",
                format_short_date(tx.date),
                truncate_string(&tx.title, TITLE_WIDTH),
                ctx.money(tx.signed_amount()),
                width = TITLE_WIDTH
            );
        }
    }
    Ok(())
}

// ===== Transactions =====

async fn transactions(ctx: &Context, cmd: TransactionCommand) -> Result<()> {
    ctx.require_login()?;
    match cmd {
        TransactionCommand::List(args) => list_transactions(ctx, args).await,
        TransactionCommand::Add(args) => add_transaction(ctx, args).await,
        TransactionCommand::Delete { id } => {
            ctx.store.api().delete_transaction(id).await?;
            println!("Deleted transaction {}.", id);
            Ok(())
        }
    }
}

fn parse_date_arg(value: Option<&str>, flag: &str) -> Result<Option<chrono::NaiveDate>> {
    match value {
        None => Ok(None),
        Some(raw) => match parse_date(raw) {
            Some(date) => Ok(Some(date)),
            None => bail!("{} must look like YYYY-MM-DD", flag),
        },
    }
}

async fn list_transactions(ctx: &Context, args: TransactionListArgs) -> Result<()> {
    let filter = TransactionFilter {
        kind: args.kind.map(Into::into),
        category: args.category,
        start_date: parse_date_arg(args.from.as_deref(), "--from")?,
        end_date: parse_date_arg(args.to.as_deref(), "--to")?,
        search: args.search,
        page_size: args.limit,
    };
    let mut list = ctx.store.api().list_transactions(&filter).await?;
    if let Some(limit) = args.limit {
        list.truncate(limit as usize);
    }

    if list.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }
    for tx in &list {
        println!(
            "{:>6}  {}  {:<width$} {:>16}  {}",
            tx.id,
            tx.date.format("%Y-%m-%d"),
            truncate_string(&tx.title, TITLE_WIDTH),
            ctx.money(tx.signed_amount()),
            tx.category_name.as_deref().unwrap_or("-"),
            width = TITLE_WIDTH
        );
    }
    Ok(())
}

async fn add_transaction(ctx: &Context, args: TransactionAddArgs) -> Result<()> {
    let form = TransactionForm {
        title: args.title,
        amount: args.amount,
        kind: args.kind.into(),
        category: args.category,
        date: args
            .date
            .unwrap_or_else(|| Local::now().date_naive().format("%Y-%m-%d").to_string()),
        description: args.description,
    };
    let new_tx = form.validate().map_err(invalid)?;

    let tx = ctx
        .store
        .api()
        .create_transaction(&new_tx)
        .await
        .map_err(|e| rejected(e, TRANSACTION_FIELDS, "Could not save the transaction."))?;
    println!(
        "Saved transaction {}: {} {}",
        tx.id,
        tx.title,
        ctx.money(tx.signed_amount())
    );
    Ok(())
}

// ===== Categories =====

async fn categories(ctx: &Context, cmd: CategoryCommand) -> Result<()> {
    ctx.require_login()?;
    let api = ctx.store.api();
    match cmd {
        CategoryCommand::List { kind } => {
            let filter = CategoryFilter {
                kind: kind.map(Into::into),
            };
            let list = api.list_categories(&filter).await?;
            if list.is_empty() {
                println!("No categories yet. Try `pocketledger categories defaults`.");
            }
            for category in &list {
                println!(
                    "{:>6}  {:<8} {}  {:<24} {}",
                    category.id,
                    category.kind.as_str(),
                    category.color,
                    truncate_string(&category.name, 24),
                    category.transaction_count
                );
            }
            Ok(())
        }
        CategoryCommand::Add(args) => add_category(ctx, args).await,
        CategoryCommand::Defaults => {
            let created = api.create_default_categories().await?;
            if !created.message.is_empty() {
                println!("{}", created.message);
            }
            for category in &created.categories {
                println!("  {} ({})", category.name, category.kind);
            }
            Ok(())
        }
        CategoryCommand::Delete { id } => {
            api.delete_category(id).await?;
            println!("Deleted category {}.", id);
            Ok(())
        }
    }
}

async fn add_category(ctx: &Context, args: CategoryAddArgs) -> Result<()> {
    let form = CategoryForm {
        name: args.name,
        description: args.description,
        kind: args.kind.map(Into::into),
        color: args.color,
        icon: args.icon,
    };
    let new_category = form.validate().map_err(invalid)?;

    let category = ctx
        .store
        .api()
        .create_category(&new_category)
        .await
        .map_err(|e| rejected(e, CATEGORY_FIELDS, "Could not save the category."))?;
    println!("Created category {}: {}", category.id, category.name);
    Ok(())
}

// ===== Budgets =====

async fn budgets(ctx: &Context, cmd: BudgetCommand) -> Result<()> {
    ctx.require_login()?;
    match cmd {
        BudgetCommand::List { active } => {
            let filter = if active {
                BudgetFilter::active()
            } else {
                BudgetFilter::default()
            };
            let list = ctx.store.api().list_budgets(&filter).await?;
            if list.is_empty() {
                println!("No budgets set.");
                return Ok(());
            }
            for budget in &list {
                let marker = if budget.is_over_budget() { "!" } else { " " };
                println!(
                    "{:>6}{} {:<24} {:>16} / {:<16} {:>7}  {} to {}",
                    budget.id,
                    marker,
                    truncate_string(budget.category_name.as_deref().unwrap_or(&budget.name), 24),
                    ctx.money(budget.spent_amount),
                    ctx.money(budget.amount),
                    format_percentage(budget.usage_percentage),
                    budget.start_date,
                    budget.end_date
                );
            }

            let overview = BudgetOverview::from_budgets(&list);
            println!();
            println!(
                "Total {} of {} ({})",
                ctx.money(overview.total_spent),
                ctx.money(overview.total_budget),
                format_percentage(overview.usage_percentage())
            );
            if let Some(over) = overview.overspend() {
                println!("Over budget by {}", ctx.money(over));
            }
            if overview.over_budget_count > 0 {
                println!("{} budget(s) exceeded", overview.over_budget_count);
            }
            Ok(())
        }
        BudgetCommand::Add(args) => add_budget(ctx, args).await,
        BudgetCommand::Delete { id } => {
            ctx.store.api().delete_budget(id).await?;
            println!("Deleted budget {}.", id);
            Ok(())
        }
    }
}

async fn add_budget(ctx: &Context, args: BudgetAddArgs) -> Result<()> {
    let form = BudgetForm {
        name: args.name,
        category: args.category,
        amount: args.amount,
        month: args
            .month
            .unwrap_or_else(|| Local::now().date_naive().format("%Y-%m").to_string()),
    };
    let new_budget = form.validate().map_err(invalid)?;

    let budget = ctx
        .store
        .api()
        .create_budget(&new_budget)
        .await
        .map_err(|e| rejected(e, BUDGET_FIELDS, "Could not save the budget."))?;
    println!(
        "Created budget {}: {} for {} to {}",
        budget.id,
        ctx.money(budget.amount),
        budget.start_date,
        budget.end_date
    );
    Ok(())
}
