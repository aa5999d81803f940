//! Command line interface.

use chrono::NaiveDate;
use clap::{Args, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::process::ExitCode;

use crate::agency::AgencyClient;
use crate::api::types::*;
use crate::cache::{Notice, NoticeLevel, Notifier};
use crate::error::ApiResult;

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Sign in and store the session
  Login {
    #[arg(short, long)]
    email: String,
    #[arg(short, long, env = "SENTINEL_PASSWORD", hide_env_values = true)]
    password: String,
  },
  /// Forget the stored session
  Logout,
  /// Show the signed-in user
  Whoami,
  /// Today's counters
  Dashboard,
  /// Search accounts and prospects
  Search { term: String },
  #[command(subcommand)]
  Accounts(AccountsCommand),
  #[command(subcommand)]
  Policies(PoliciesCommand),
  #[command(subcommand)]
  Tasks(TasksCommand),
  #[command(subcommand)]
  ServiceBoard(ServiceCommand),
  #[command(subcommand)]
  Prospects(ProspectsCommand),
  #[command(subcommand)]
  Sales(SalesCommand),
  #[command(subcommand)]
  Notes(NotesCommand),
  #[command(subcommand)]
  Carriers(CarriersCommand),
}

#[derive(Subcommand, Debug)]
pub enum AccountsCommand {
  List {
    #[arg(short, long)]
    search: Option<String>,
    #[arg(long = "type")]
    account_type: Option<String>,
    #[arg(long)]
    status: Option<String>,
    #[arg(long, default_value_t = 1)]
    page: u32,
  },
  /// Account with its contacts and policies
  Show { id: String },
  Create {
    #[arg(long)]
    name: String,
    /// Personal or Commercial
    #[arg(long = "type", default_value = "Personal")]
    account_type: String,
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    state: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    email: Option<String>,
  },
}

#[derive(Subcommand, Debug)]
pub enum PoliciesCommand {
  List {
    #[arg(long)]
    account: Option<String>,
    #[arg(long)]
    status: Option<String>,
    #[arg(long)]
    lob: Option<String>,
    #[arg(long, default_value_t = 1)]
    page: u32,
  },
  /// Policy with its installments
  Show { id: String },
  Create(NewPolicyArgs),
}

#[derive(Args, Debug)]
pub struct NewPolicyArgs {
  #[arg(long)]
  account: String,
  #[arg(long)]
  lob: String,
  #[arg(long)]
  effective: NaiveDate,
  #[arg(long)]
  expiration: NaiveDate,
  #[arg(long)]
  premium: Option<Amount>,
  #[arg(long)]
  carrier: Option<String>,
  #[arg(long)]
  number: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum TasksCommand {
  /// Tasks assigned to me
  List {
    #[arg(long)]
    status: Option<String>,
    #[arg(long)]
    priority: Option<String>,
  },
  Complete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum ServiceCommand {
  List {
    #[arg(long)]
    status: Option<String>,
    #[arg(long = "type")]
    item_type: Option<String>,
    #[arg(long)]
    account: Option<String>,
  },
  Update {
    id: String,
    #[arg(long)]
    status: Option<String>,
    #[arg(long)]
    assigned_to: Option<String>,
    #[arg(long)]
    urgency: Option<String>,
  },
}

#[derive(Subcommand, Debug)]
pub enum ProspectsCommand {
  List {
    #[arg(long)]
    stage: Option<String>,
    #[arg(short, long)]
    search: Option<String>,
  },
  /// Move a prospect to another pipeline stage
  Stage { id: String, stage: String },
  /// Turn a prospect into an account
  Convert { id: String },
}

#[derive(Subcommand, Debug)]
pub enum SalesCommand {
  Summary,
  Create {
    #[arg(long)]
    lob: String,
    #[arg(long)]
    premium: Amount,
    #[arg(long, default_value = "New Business")]
    sale_type: String,
    #[arg(long)]
    account: Option<String>,
    #[arg(long)]
    source: Option<String>,
    #[arg(long)]
    date: Option<NaiveDate>,
  },
}

#[derive(Subcommand, Debug)]
pub enum NotesCommand {
  List { entity: EntityKind, id: String },
  Add {
    entity: EntityKind,
    id: String,
    content: String,
  },
}

#[derive(Subcommand, Debug)]
pub enum CarriersCommand {
  List,
}

/// Prints notices the way the web app shows toasts.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
  fn notify(&self, notice: Notice) {
    match notice.level {
      NoticeLevel::Success => eprintln!("{}", notice.message),
      NoticeLevel::Error => {
        eprintln!("error: {}", notice.message);
        if let Some(error) = &notice.error {
          for field in error.field_errors().iter().skip(1) {
            eprintln!("  {}: {}", field.field, field.message);
          }
        }
      }
    }
  }
}

/// Run `command`. Failed writes have already been reported by the notifier
/// and only turn into a failure exit code.
pub async fn run(command: Command, client: &AgencyClient) -> Result<ExitCode> {
  match command {
    Command::Login { email, password } => {
      let user = client.login(&email, &password).await?;
      println!("Signed in as {} ({})", user.name, user.role);
    }
    Command::Logout => {
      client.logout()?;
      println!("Signed out");
    }
    Command::Whoami => {
      if !client.session().is_authenticated() {
        return Err(eyre!("Not signed in. Run `sentinel login` first."));
      }
      let user = client.me().await?;
      println!("{} <{}> {}", user.name, user.email, user.role);
    }
    Command::Dashboard => {
      let d = client.dashboard().await.into_result()?;
      println!("Tasks due today        {}", d.tasks_due_today);
      println!("Tasks overdue          {}", d.tasks_overdue);
      println!("Service due this week  {}", d.service_items_due_this_week);
      println!("Service overdue        {}", d.service_items_overdue);
      println!("Installments this week {}", d.installments_due_this_week);
      println!("Installments past due  {}", d.installments_past_due);
      println!("Pipeline               {} (${})", d.pipeline_count, d.pipeline_value);
      println!("Sales this month       {} (${})", d.sales_this_month, d.sales_premium_this_month);
    }
    Command::Search { term } => {
      let results = client.quick_search(&term).await;
      if !results.accounts.is_success() && !results.prospects.is_success() {
        if let Some(error) = results.accounts.error.or(results.prospects.error) {
          return Err(error.into());
        }
        println!("Type at least 2 characters to search");
        return Ok(ExitCode::SUCCESS);
      }
      for account in results.accounts.data.map(|p| p.items).unwrap_or_default() {
        println!("account   {}  {}", account.id, account.name);
      }
      for prospect in results.prospects.data.map(|p| p.items).unwrap_or_default() {
        println!(
          "prospect  {}  {} {}  [{}]",
          prospect.id, prospect.first_name, prospect.last_name, prospect.pipeline_stage
        );
      }
    }
    Command::Accounts(command) => return accounts(command, client).await,
    Command::Policies(command) => return policies(command, client).await,
    Command::Tasks(command) => return tasks(command, client).await,
    Command::ServiceBoard(command) => return service_board(command, client).await,
    Command::Prospects(command) => return prospects(command, client).await,
    Command::Sales(command) => return sales(command, client).await,
    Command::Notes(command) => return notes(command, client).await,
    Command::Carriers(CarriersCommand::List) => {
      for carrier in client.carriers().await.into_result()? {
        println!("{}  {}  {}", carrier.id, carrier.name, carrier.carrier_type);
      }
    }
  }
  Ok(ExitCode::SUCCESS)
}

async fn accounts(command: AccountsCommand, client: &AgencyClient) -> Result<ExitCode> {
  match command {
    AccountsCommand::List {
      search,
      account_type,
      status,
      page,
    } => {
      let filter = AccountFilter {
        page: Some(page),
        search,
        account_type,
        status,
        ..AccountFilter::default()
      };
      let page = client.accounts(&filter).await.into_result()?;
      for account in &page.items {
        println!(
          "{}  {}  {}  {}",
          account.id, account.name, account.account_type, account.status
        );
      }
      println!("{} of {}", page.items.len(), page.total);
    }
    AccountsCommand::Show { id } => {
      let (account, contacts, policies) = tokio::join!(
        client.account(&id),
        client.account_contacts(&id),
        client.account_policies(&id)
      );
      let account = account.into_result()?;
      println!("{} ({}, {})", account.name, account.account_type, account.status);
      if let Some(city) = &account.city {
        println!("  {}{}", city, account.state.as_deref().map(|s| format!(", {}", s)).unwrap_or_default());
      }
      println!("Contacts:");
      for contact in contacts.into_result()? {
        let primary = if contact.is_primary { " *" } else { "" };
        println!("  {} {}{}", contact.first_name, contact.last_name, primary);
      }
      println!("Policies:");
      for policy in policies.into_result()?.items {
        print_policy(&policy);
      }
    }
    AccountsCommand::Create {
      name,
      account_type,
      city,
      state,
      phone,
      email,
    } => {
      let account = NewAccount {
        name,
        account_type,
        city,
        state,
        phone,
        email,
        ..NewAccount::default()
      };
      return Ok(written(client.create_account(&account).await, |a| {
        println!("{}", a.id)
      }));
    }
  }
  Ok(ExitCode::SUCCESS)
}

async fn policies(command: PoliciesCommand, client: &AgencyClient) -> Result<ExitCode> {
  match command {
    PoliciesCommand::List {
      account,
      status,
      lob,
      page,
    } => {
      let filter = PolicyFilter {
        page: Some(page),
        account_id: account,
        status,
        line_of_business: lob,
        ..PolicyFilter::default()
      };
      let page = client.policies(&filter).await.into_result()?;
      for policy in &page.items {
        print_policy(policy);
      }
      println!("{} of {}", page.items.len(), page.total);
    }
    PoliciesCommand::Show { id } => {
      let (policy, installments) =
        tokio::join!(client.policy(&id), client.policy_installments(&id));
      let policy = policy.into_result()?;
      print_policy(&policy);
      println!("Installments:");
      for installment in installments.into_result()? {
        println!(
          "  {}  ${}  {}",
          installment.due_date, installment.amount, installment.status
        );
      }
    }
    PoliciesCommand::Create(args) => {
      let policy = NewPolicy {
        account_id: args.account,
        carrier_id: args.carrier,
        line_of_business: args.lob,
        policy_number: args.number,
        effective_date: args.effective,
        expiration_date: args.expiration,
        premium: args.premium,
        payment_plan: None,
        status: None,
        servicing_owner_id: None,
        producing_agent_id: None,
      };
      return Ok(written(client.create_policy(&policy).await, |p| {
        println!("{}", p.id)
      }));
    }
  }
  Ok(ExitCode::SUCCESS)
}

async fn tasks(command: TasksCommand, client: &AgencyClient) -> Result<ExitCode> {
  match command {
    TasksCommand::List { status, priority } => {
      let filter = TaskFilter {
        status,
        priority,
        ..TaskFilter::default()
      };
      for task in client.all_tasks(&filter).await.into_result()?.items {
        let due = task.due_date.map(|d| d.to_string()).unwrap_or_else(|| "-".into());
        println!("{}  {}  {}  {}  {}", task.id, due, task.priority, task.status, task.title);
      }
    }
    TasksCommand::Complete { id } => {
      let update = TaskUpdate {
        status: Some("Completed".into()),
        ..TaskUpdate::default()
      };
      return Ok(written(client.update_task(&id, &update).await, |_| {}));
    }
  }
  Ok(ExitCode::SUCCESS)
}

async fn service_board(command: ServiceCommand, client: &AgencyClient) -> Result<ExitCode> {
  match command {
    ServiceCommand::List {
      status,
      item_type,
      account,
    } => {
      let filter = ServiceBoardFilter {
        status,
        item_type,
        account_id: account,
        ..ServiceBoardFilter::default()
      };
      let board = client.service_board(&filter).await.into_result()?;
      for (status, count) in &board.counts_by_status {
        println!("{:>4}  {}", count, status);
      }
      for item in &board.items {
        println!(
          "{}  {}  {}  {}  {}",
          item.id,
          item.item_type,
          item.urgency,
          item.status,
          item.account_name.as_deref().unwrap_or("")
        );
      }
    }
    ServiceCommand::Update {
      id,
      status,
      assigned_to,
      urgency,
    } => {
      let update = ServiceItemUpdate {
        status,
        assigned_to,
        urgency,
        ..ServiceItemUpdate::default()
      };
      return Ok(written(client.update_service_item(&id, &update).await, |_| {}));
    }
  }
  Ok(ExitCode::SUCCESS)
}

async fn prospects(command: ProspectsCommand, client: &AgencyClient) -> Result<ExitCode> {
  match command {
    ProspectsCommand::List { stage, search } => {
      let filter = ProspectFilter {
        pipeline_stage: stage,
        search,
        page_size: Some(200),
        ..ProspectFilter::default()
      };
      let (page, stats) = tokio::join!(client.prospects(&filter), client.pipeline_stats());
      for (stage, stats) in stats.into_result()? {
        println!("{:>4}  ${:>10.2}  {}", stats.count, stats.value, stage);
      }
      for prospect in page.into_result()?.items {
        println!(
          "{}  {} {}  {}",
          prospect.id, prospect.first_name, prospect.last_name, prospect.pipeline_stage
        );
      }
    }
    ProspectsCommand::Stage { id, stage } => {
      return Ok(written(
        client.update_prospect_stage(&id, &stage).await,
        |_| {},
      ));
    }
    ProspectsCommand::Convert { id } => {
      return Ok(written(client.convert_prospect(&id).await, |a| {
        println!("{}", a.id)
      }));
    }
  }
  Ok(ExitCode::SUCCESS)
}

async fn sales(command: SalesCommand, client: &AgencyClient) -> Result<ExitCode> {
  match command {
    SalesCommand::Summary => {
      let summary = client.sales_summary().await.into_result()?;
      for (label, stats) in [
        ("Today", &summary.today),
        ("This week", &summary.this_week),
        ("This month", &summary.this_month),
        ("Year to date", &summary.ytd),
      ] {
        println!("{:<12} {:>4}  ${:.2}", label, stats.count, stats.premium);
      }
      let quota = &summary.allstate_quota;
      println!(
        "Quota        {}/{} ({} remaining{})",
        quota.auto_items_this_month,
        quota.target,
        quota.remaining,
        if quota.on_track { ", on track" } else { "" }
      );
    }
    SalesCommand::Create {
      lob,
      premium,
      sale_type,
      account,
      source,
      date,
    } => {
      let sale = NewSale {
        sale_date: date,
        account_id: account,
        prospect_id: None,
        policy_id: None,
        line_of_business: lob,
        premium,
        carrier_id: None,
        source,
        source_detail: None,
        zip_code: None,
        county: None,
        sale_type,
        notes: None,
      };
      return Ok(written(client.create_sale(&sale).await, |s| {
        println!("{}", s.id)
      }));
    }
  }
  Ok(ExitCode::SUCCESS)
}

async fn notes(command: NotesCommand, client: &AgencyClient) -> Result<ExitCode> {
  match command {
    NotesCommand::List { entity, id } => {
      for note in client.notes(entity, &id).await.into_result()? {
        println!("{}  {}", note.created_at, note.content);
      }
    }
    NotesCommand::Add {
      entity,
      id,
      content,
    } => {
      let note = NewNote {
        content,
        linked_entity_type: entity,
        linked_entity_id: id,
      };
      return Ok(written(client.create_note(&note).await, |_| {}));
    }
  }
  Ok(ExitCode::SUCCESS)
}

fn print_policy(policy: &Policy) {
  println!(
    "  {}  {}  {}  {} to {}  {}",
    policy.id,
    policy.line_of_business,
    policy.policy_number.as_deref().unwrap_or("-"),
    policy.effective_date,
    policy.expiration_date,
    policy
      .premium
      .as_ref()
      .map(|p| format!("${}", p))
      .unwrap_or_default()
  );
}

/// Exit code for a write; the outcome itself was reported through the notifier.
fn written<T>(result: ApiResult<T>, show: impl FnOnce(T)) -> ExitCode {
  match result {
    Ok(value) => {
      show(value);
      ExitCode::SUCCESS
    }
    Err(_) => ExitCode::FAILURE,
  }
}
