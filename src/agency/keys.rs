//! Query keys for every cached read.
//!
//! Keys are hierarchical: `["accountPolicies"]` is a prefix of every
//! account's policy list, `["accountPolicies", id]` of one account's only.
//! Filter structs become a single object segment, so a changed filter (or a
//! new search term) is a new key.

use crate::api::types::{
  AccountFilter, EntityKind, PolicyFilter, ProspectFilter, SalesFilter, ServiceBoardFilter,
  TaskFilter,
};
use crate::cache::QueryKey;
use crate::query_key;

pub const DASHBOARD: &str = "dashboard";
pub const ACCOUNTS: &str = "accounts";
pub const ACCOUNT: &str = "account";
pub const ACCOUNT_CONTACTS: &str = "accountContacts";
pub const ACCOUNT_POLICIES: &str = "accountPolicies";
pub const ACCOUNT_SERVICE_ITEMS: &str = "accountServiceItems";
pub const ACCOUNT_TASKS: &str = "accountTasks";
pub const POLICIES: &str = "policies";
pub const POLICY: &str = "policy";
pub const POLICY_INSTALLMENTS: &str = "policyInstallments";
pub const POLICY_SERVICE_ITEMS: &str = "policyServiceItems";
pub const PROSPECTS: &str = "prospects";
pub const PROSPECT: &str = "prospect";
pub const PIPELINE_STATS: &str = "pipelineStats";
pub const SERVICE_BOARD: &str = "serviceBoard";
pub const ALL_TASKS: &str = "allTasks";
pub const CARRIERS: &str = "carriers";
pub const SALES_LIST: &str = "salesList";
pub const SALES_SUMMARY: &str = "salesSummary";
pub const SALES_TRENDS_LOB: &str = "salesTrendsLob";
pub const SALES_TRENDS_SOURCE: &str = "salesTrendsSource";
pub const QUICK_SEARCH_ACCOUNTS: &str = "quickSearchAccounts";
pub const QUICK_SEARCH_PROSPECTS: &str = "quickSearchProspects";
pub const ACCOUNT_SEARCH: &str = "accountSearch";

/// Key with only a root segment, matching every key under it.
pub fn prefix(root: &str) -> QueryKey {
  QueryKey::new(root)
}

pub fn dashboard() -> QueryKey {
  query_key![DASHBOARD]
}

pub fn accounts(filter: &AccountFilter) -> QueryKey {
  query_key![ACCOUNTS, filter]
}

pub fn account(id: &str) -> QueryKey {
  query_key![ACCOUNT, id]
}

pub fn account_contacts(account_id: &str) -> QueryKey {
  query_key![ACCOUNT_CONTACTS, account_id]
}

pub fn account_policies(account_id: &str) -> QueryKey {
  query_key![ACCOUNT_POLICIES, account_id]
}

pub fn account_service_items(account_id: &str) -> QueryKey {
  query_key![ACCOUNT_SERVICE_ITEMS, account_id]
}

pub fn account_tasks(account_id: &str) -> QueryKey {
  query_key![ACCOUNT_TASKS, account_id]
}

/// Notes for one entity, e.g. `["policyNotes", id]`.
pub fn notes(entity: EntityKind, entity_id: &str) -> QueryKey {
  query_key![&format!("{}Notes", entity.key_stem()), entity_id]
}

/// Communication logs for one entity, e.g. `["accountCommLogs", id]`.
pub fn comm_logs(entity: EntityKind, entity_id: &str) -> QueryKey {
  query_key![&format!("{}CommLogs", entity.key_stem()), entity_id]
}

pub fn policies(filter: &PolicyFilter) -> QueryKey {
  query_key![POLICIES, filter]
}

pub fn policy(id: &str) -> QueryKey {
  query_key![POLICY, id]
}

pub fn policy_installments(policy_id: &str) -> QueryKey {
  query_key![POLICY_INSTALLMENTS, policy_id]
}

pub fn policy_service_items(policy_id: &str) -> QueryKey {
  query_key![POLICY_SERVICE_ITEMS, policy_id]
}

pub fn prospects(filter: &ProspectFilter) -> QueryKey {
  query_key![PROSPECTS, filter]
}

pub fn prospect(id: &str) -> QueryKey {
  query_key![PROSPECT, id]
}

pub fn pipeline_stats() -> QueryKey {
  query_key![PIPELINE_STATS]
}

pub fn service_board(filter: &ServiceBoardFilter) -> QueryKey {
  query_key![SERVICE_BOARD, filter]
}

pub fn all_tasks(filter: &TaskFilter) -> QueryKey {
  query_key![ALL_TASKS, filter]
}

pub fn carriers() -> QueryKey {
  query_key![CARRIERS]
}

pub fn sales_list(filter: &SalesFilter) -> QueryKey {
  query_key![SALES_LIST, filter]
}

pub fn sales_summary() -> QueryKey {
  query_key![SALES_SUMMARY]
}

pub fn sales_trends_lob() -> QueryKey {
  query_key![SALES_TRENDS_LOB]
}

pub fn sales_trends_source() -> QueryKey {
  query_key![SALES_TRENDS_SOURCE]
}

pub fn quick_search_accounts(term: &str) -> QueryKey {
  query_key![QUICK_SEARCH_ACCOUNTS, term]
}

pub fn quick_search_prospects(term: &str) -> QueryKey {
  query_key![QUICK_SEARCH_PROSPECTS, term]
}

/// Account picker used by the service item and sale forms.
pub fn account_search(term: &str) -> QueryKey {
  query_key![ACCOUNT_SEARCH, term]
}
