//! Which cached reads each write makes stale.
//!
//! Every write the agency client performs is an [`Operation`]. Its
//! [`MutationDescriptor`] lists the key prefixes to invalidate once the server
//! acknowledges the write. Prefixes are chosen so that every view showing the
//! changed data is covered, including the dashboard counters.

use crate::api::types::EntityKind;
use crate::cache::MutationDescriptor;

use super::keys::{self, prefix};

/// A write against the agency API, with the ids its invalidations depend on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
  CreateAccount,
  UpdateAccount { account_id: String },
  DeleteAccount { account_id: String },
  CreateContact { account_id: String },
  UpdateContact { account_id: String },
  CreateCarrier,
  CreatePolicy { account_id: String },
  UpdatePolicy { policy_id: String },
  CreateInstallment { policy_id: String },
  UpdateInstallment { policy_id: String },
  CreateServiceItem {
    account_id: String,
    policy_id: Option<String>,
  },
  UpdateServiceItem,
  /// `account_id` is set when the task is linked to an account
  CreateTask { account_id: Option<String> },
  UpdateTask,
  CreateProspect,
  UpdateProspect { prospect_id: String },
  UpdateProspectStage { prospect_id: String },
  ConvertProspect { prospect_id: String },
  CreateSale,
  CreateNote { entity: EntityKind, entity_id: String },
  CreateCommLog { entity: EntityKind, entity_id: String },
}

impl Operation {
  pub fn name(&self) -> &'static str {
    match self {
      Operation::CreateAccount => "create_account",
      Operation::UpdateAccount { .. } => "update_account",
      Operation::DeleteAccount { .. } => "delete_account",
      Operation::CreateContact { .. } => "create_contact",
      Operation::UpdateContact { .. } => "update_contact",
      Operation::CreateCarrier => "create_carrier",
      Operation::CreatePolicy { .. } => "create_policy",
      Operation::UpdatePolicy { .. } => "update_policy",
      Operation::CreateInstallment { .. } => "create_installment",
      Operation::UpdateInstallment { .. } => "update_installment",
      Operation::CreateServiceItem { .. } => "create_service_item",
      Operation::UpdateServiceItem => "update_service_item",
      Operation::CreateTask { .. } => "create_task",
      Operation::UpdateTask => "update_task",
      Operation::CreateProspect => "create_prospect",
      Operation::UpdateProspect { .. } => "update_prospect",
      Operation::UpdateProspectStage { .. } => "update_prospect_stage",
      Operation::ConvertProspect { .. } => "convert_prospect",
      Operation::CreateSale => "create_sale",
      Operation::CreateNote { .. } => "create_note",
      Operation::CreateCommLog { .. } => "create_comm_log",
    }
  }
}

/// Account lists and both account search boxes.
fn account_lists(d: MutationDescriptor) -> MutationDescriptor {
  d.invalidates(prefix(keys::ACCOUNTS))
    .invalidates(prefix(keys::QUICK_SEARCH_ACCOUNTS))
    .invalidates(prefix(keys::ACCOUNT_SEARCH))
}

fn prospect_views(d: MutationDescriptor, prospect_id: &str) -> MutationDescriptor {
  d.invalidates(keys::prospect(prospect_id))
    .invalidates(prefix(keys::PROSPECTS))
    .invalidates(keys::pipeline_stats())
    .invalidates(prefix(keys::QUICK_SEARCH_PROSPECTS))
    .invalidates(keys::dashboard())
}

/// Build the descriptor for `op`.
pub fn invalidations(op: &Operation) -> MutationDescriptor {
  let d = MutationDescriptor::new(op.name());

  match op {
    Operation::CreateAccount => account_lists(d)
      .invalidates(keys::dashboard())
      .on_success("Account created"),

    Operation::UpdateAccount { account_id } => account_lists(d.invalidates(keys::account(account_id)))
      .on_success("Account updated"),

    Operation::DeleteAccount { account_id } => account_lists(d.invalidates(keys::account(account_id)))
      .invalidates(prefix(keys::POLICIES))
      .invalidates(keys::dashboard())
      .on_success("Account deleted"),

    Operation::CreateContact { account_id } => d
      .invalidates(keys::account_contacts(account_id))
      .on_success("Contact added"),

    // The primary contact shows on the account itself
    Operation::UpdateContact { account_id } => d
      .invalidates(keys::account_contacts(account_id))
      .invalidates(keys::account(account_id))
      .on_success("Contact updated"),

    Operation::CreateCarrier => d.invalidates(keys::carriers()).on_success("Carrier created"),

    Operation::CreatePolicy { account_id } => d
      .invalidates(keys::account_policies(account_id))
      .invalidates(prefix(keys::POLICIES))
      .on_success("Policy created"),

    // Account id is not known from the policy id alone
    Operation::UpdatePolicy { policy_id } => d
      .invalidates(keys::policy(policy_id))
      .invalidates(prefix(keys::ACCOUNT_POLICIES))
      .invalidates(prefix(keys::POLICIES))
      .on_success("Policy updated"),

    Operation::CreateInstallment { policy_id } => d
      .invalidates(keys::policy_installments(policy_id))
      .invalidates(keys::dashboard())
      .on_success("Installment added"),

    Operation::UpdateInstallment { policy_id } => d
      .invalidates(keys::policy_installments(policy_id))
      .invalidates(keys::dashboard())
      .on_success("Installment updated"),

    Operation::CreateServiceItem {
      account_id,
      policy_id,
    } => {
      let d = d
        .invalidates(keys::account_service_items(account_id))
        .invalidates(prefix(keys::SERVICE_BOARD))
        .invalidates(keys::dashboard());
      let d = match policy_id {
        Some(policy_id) => d.invalidates(keys::policy_service_items(policy_id)),
        None => d,
      };
      d.on_success("Service item created")
    }

    Operation::UpdateServiceItem => d
      .invalidates(prefix(keys::SERVICE_BOARD))
      .invalidates(keys::dashboard())
      .invalidates(prefix(keys::ACCOUNT_SERVICE_ITEMS))
      .invalidates(prefix(keys::POLICY_SERVICE_ITEMS))
      .on_success("Service item updated"),

    Operation::CreateTask { account_id } => {
      let d = match account_id {
        Some(account_id) => d.invalidates(keys::account_tasks(account_id)),
        None => d,
      };
      d.invalidates(prefix(keys::ALL_TASKS))
        .invalidates(keys::dashboard())
        .on_success("Task created")
    }

    Operation::UpdateTask => d
      .invalidates(prefix(keys::ALL_TASKS))
      .invalidates(prefix(keys::ACCOUNT_TASKS))
      .invalidates(keys::dashboard())
      .on_success("Task updated"),

    Operation::CreateProspect => d
      .invalidates(prefix(keys::PROSPECTS))
      .invalidates(keys::pipeline_stats())
      .invalidates(prefix(keys::QUICK_SEARCH_PROSPECTS))
      .invalidates(keys::dashboard())
      .on_success("Prospect created"),

    Operation::UpdateProspect { prospect_id } => {
      prospect_views(d, prospect_id).on_success("Prospect updated")
    }

    Operation::UpdateProspectStage { prospect_id } => {
      prospect_views(d, prospect_id).on_success("Stage updated")
    }

    Operation::ConvertProspect { prospect_id } => {
      account_lists(prospect_views(d, prospect_id)).on_success("Prospect converted to account")
    }

    Operation::CreateSale => d
      .invalidates(prefix(keys::SALES_LIST))
      .invalidates(keys::sales_summary())
      .invalidates(keys::sales_trends_lob())
      .invalidates(keys::sales_trends_source())
      .invalidates(keys::dashboard())
      .on_success("Sale logged"),

    Operation::CreateNote { entity, entity_id } => d
      .invalidates(keys::notes(*entity, entity_id))
      .on_success("Note added"),

    Operation::CreateCommLog { entity, entity_id } => d
      .invalidates(keys::comm_logs(*entity, entity_id))
      .on_success("Communication logged"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::{AccountFilter, PolicyFilter, ServiceBoardFilter, TaskFilter};
  use crate::cache::QueryKey;
  use crate::query_key;

  /// Every key root an operation may invalidate under.
  fn invalidated_roots() -> Vec<QueryKey> {
    let mut roots: Vec<QueryKey> = [
      keys::DASHBOARD,
      keys::ACCOUNTS,
      keys::ACCOUNT,
      keys::ACCOUNT_CONTACTS,
      keys::ACCOUNT_POLICIES,
      keys::ACCOUNT_SERVICE_ITEMS,
      keys::ACCOUNT_TASKS,
      keys::POLICIES,
      keys::POLICY,
      keys::POLICY_INSTALLMENTS,
      keys::POLICY_SERVICE_ITEMS,
      keys::PROSPECTS,
      keys::PROSPECT,
      keys::PIPELINE_STATS,
      keys::SERVICE_BOARD,
      keys::ALL_TASKS,
      keys::CARRIERS,
      keys::SALES_LIST,
      keys::SALES_SUMMARY,
      keys::SALES_TRENDS_LOB,
      keys::SALES_TRENDS_SOURCE,
      keys::QUICK_SEARCH_ACCOUNTS,
      keys::QUICK_SEARCH_PROSPECTS,
      keys::ACCOUNT_SEARCH,
    ]
    .into_iter()
    .map(prefix)
    .collect();

    for entity in [
      EntityKind::Account,
      EntityKind::Contact,
      EntityKind::Policy,
      EntityKind::Prospect,
      EntityKind::ServiceItem,
    ] {
      roots.push(query_key![&format!("{}Notes", entity.key_stem())]);
      roots.push(query_key![&format!("{}CommLogs", entity.key_stem())]);
    }
    roots
  }

  /// True when invalidating `op` would mark `key` stale.
  fn covers(op: &Operation, key: &QueryKey) -> bool {
    invalidations(op)
      .invalidates
      .iter()
      .any(|prefix| key.starts_with(prefix))
  }

  fn all_operations() -> Vec<Operation> {
    let id = || "X1".to_string();
    vec![
      Operation::CreateAccount,
      Operation::UpdateAccount { account_id: id() },
      Operation::DeleteAccount { account_id: id() },
      Operation::CreateContact { account_id: id() },
      Operation::UpdateContact { account_id: id() },
      Operation::CreateCarrier,
      Operation::CreatePolicy { account_id: id() },
      Operation::UpdatePolicy { policy_id: id() },
      Operation::CreateInstallment { policy_id: id() },
      Operation::UpdateInstallment { policy_id: id() },
      Operation::CreateServiceItem {
        account_id: id(),
        policy_id: Some(id()),
      },
      Operation::UpdateServiceItem,
      Operation::CreateTask { account_id: None },
      Operation::UpdateTask,
      Operation::CreateProspect,
      Operation::UpdateProspect { prospect_id: id() },
      Operation::UpdateProspectStage { prospect_id: id() },
      Operation::ConvertProspect { prospect_id: id() },
      Operation::CreateSale,
      Operation::CreateNote {
        entity: EntityKind::Policy,
        entity_id: id(),
      },
      Operation::CreateCommLog {
        entity: EntityKind::Account,
        entity_id: id(),
      },
    ]
  }

  #[test]
  fn test_create_policy_covers_account_and_global_lists() {
    let op = Operation::CreatePolicy {
      account_id: "A1".into(),
    };

    assert!(covers(&op, &keys::account_policies("A1")));
    assert!(covers(&op, &keys::policies(&PolicyFilter::default())));
    assert!(covers(
      &op,
      &keys::policies(&PolicyFilter {
        page: Some(3),
        status: Some("Active".into()),
        ..PolicyFilter::default()
      })
    ));
    // Other accounts keep their cached lists
    assert!(!covers(&op, &keys::account_policies("A2")));
  }

  #[test]
  fn test_service_item_scoped_to_its_policy() {
    let with_policy = Operation::CreateServiceItem {
      account_id: "A1".into(),
      policy_id: Some("P1".into()),
    };
    let without_policy = Operation::CreateServiceItem {
      account_id: "A1".into(),
      policy_id: None,
    };

    assert!(covers(&with_policy, &keys::policy_service_items("P1")));
    assert!(!covers(&without_policy, &keys::policy_service_items("P1")));
    assert!(covers(&without_policy, &keys::service_board(&ServiceBoardFilter::default())));
    assert!(covers(&without_policy, &keys::dashboard()));
  }

  #[test]
  fn test_linked_task_invalidates_its_account() {
    let linked = Operation::CreateTask {
      account_id: Some("A1".into()),
    };

    assert!(covers(&linked, &keys::account_tasks("A1")));
    assert!(!covers(&linked, &keys::account_tasks("A2")));
    assert!(covers(&linked, &keys::all_tasks(&TaskFilter::default())));
    assert!(!covers(&Operation::CreateTask { account_id: None }, &keys::account_tasks("A1")));
  }

  #[test]
  fn test_conversion_refreshes_account_lists() {
    let op = Operation::ConvertProspect {
      prospect_id: "X1".into(),
    };

    assert!(covers(&op, &keys::prospect("X1")));
    assert!(covers(&op, &keys::pipeline_stats()));
    assert!(covers(&op, &keys::accounts(&AccountFilter::default())));
    assert!(covers(&op, &keys::quick_search_accounts("ab")));
  }

  #[test]
  fn test_sale_refreshes_every_sales_view() {
    let op = Operation::CreateSale;

    assert!(covers(&op, &keys::sales_summary()));
    assert!(covers(&op, &keys::sales_trends_lob()));
    assert!(covers(&op, &keys::sales_trends_source()));
    assert!(covers(&op, &keys::dashboard()));
  }

  #[test]
  fn test_notes_scoped_to_entity() {
    let op = Operation::CreateNote {
      entity: EntityKind::Policy,
      entity_id: "P1".into(),
    };

    assert!(covers(&op, &keys::notes(EntityKind::Policy, "P1")));
    assert!(!covers(&op, &keys::notes(EntityKind::Account, "P1")));
    assert!(!covers(&op, &keys::comm_logs(EntityKind::Policy, "P1")));
  }

  #[test]
  fn test_every_operation_is_described() {
    let roots = invalidated_roots();

    for op in all_operations() {
      let descriptor = invalidations(&op);
      assert_eq!(descriptor.name, op.name());
      assert!(!descriptor.invalidates.is_empty(), "{} invalidates nothing", op.name());
      assert!(descriptor.success_message.is_some(), "{} has no message", op.name());
      for prefix in &descriptor.invalidates {
        assert!(
          roots.iter().any(|root| prefix.starts_with(root)),
          "{} invalidates unknown key {}",
          op.name(),
          prefix
        );
      }
    }
  }
}
