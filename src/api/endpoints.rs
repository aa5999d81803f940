//! Typed endpoint methods.

use serde::Serialize;

use super::client::ApiClient;
use super::types::*;
use crate::error::ApiResult;

#[derive(Serialize)]
struct LinkedEntity<'a> {
  linked_entity_type: EntityKind,
  linked_entity_id: &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  channel: Option<&'a str>,
}

#[derive(Serialize)]
struct StageQuery<'a> {
  stage: &'a str,
}

#[derive(Serialize)]
struct CarrierSearch<'a> {
  #[serde(skip_serializing_if = "Option::is_none")]
  search: Option<&'a str>,
}

impl ApiClient {
  // Auth

  /// Exchange credentials for a token. Does not touch the session.
  pub async fn login(&self, credentials: &Credentials) -> ApiResult<TokenResponse> {
    self.post("auth/login", credentials).await
  }

  /// Create the first administrator on an empty install.
  pub async fn setup(&self, request: &SetupRequest) -> ApiResult<TokenResponse> {
    self.post("auth/setup", request).await
  }

  pub async fn me(&self) -> ApiResult<User> {
    self.get("auth/me").await
  }

  // Dashboard

  pub async fn dashboard(&self) -> ApiResult<Dashboard> {
    self.get("dashboard").await
  }

  // Accounts

  pub async fn list_accounts(&self, filter: &AccountFilter) -> ApiResult<Page<Account>> {
    self.get_with("accounts", filter).await
  }

  pub async fn get_account(&self, id: &str) -> ApiResult<Account> {
    self.get(&format!("accounts/{}", id)).await
  }

  pub async fn create_account(&self, account: &NewAccount) -> ApiResult<Account> {
    self.post("accounts", account).await
  }

  pub async fn update_account(&self, id: &str, update: &AccountUpdate) -> ApiResult<Account> {
    self.put(&format!("accounts/{}", id), update).await
  }

  pub async fn delete_account(&self, id: &str) -> ApiResult<()> {
    self.delete(&format!("accounts/{}", id)).await
  }

  pub async fn account_contacts(&self, account_id: &str) -> ApiResult<Vec<Contact>> {
    self.get(&format!("accounts/{}/contacts", account_id)).await
  }

  // Contacts

  pub async fn create_contact(&self, contact: &NewContact) -> ApiResult<Contact> {
    self.post("contacts", contact).await
  }

  pub async fn get_contact(&self, id: &str) -> ApiResult<Contact> {
    self.get(&format!("contacts/{}", id)).await
  }

  pub async fn update_contact(&self, id: &str, update: &ContactUpdate) -> ApiResult<Contact> {
    self.put(&format!("contacts/{}", id), update).await
  }

  // Policies

  pub async fn list_policies(&self, filter: &PolicyFilter) -> ApiResult<Page<Policy>> {
    self.get_with("policies", filter).await
  }

  pub async fn get_policy(&self, id: &str) -> ApiResult<Policy> {
    self.get(&format!("policies/{}", id)).await
  }

  pub async fn create_policy(&self, policy: &NewPolicy) -> ApiResult<Policy> {
    self.post("policies", policy).await
  }

  pub async fn update_policy(&self, id: &str, update: &PolicyUpdate) -> ApiResult<Policy> {
    self.put(&format!("policies/{}", id), update).await
  }

  pub async fn policy_installments(&self, policy_id: &str) -> ApiResult<Vec<Installment>> {
    self.get(&format!("policies/{}/installments", policy_id)).await
  }

  pub async fn create_installment(
    &self,
    policy_id: &str,
    installment: &NewInstallment,
  ) -> ApiResult<Installment> {
    self
      .post(&format!("policies/{}/installments", policy_id), installment)
      .await
  }

  pub async fn update_installment(
    &self,
    id: &str,
    update: &InstallmentUpdate,
  ) -> ApiResult<Installment> {
    self.put(&format!("policies/installments/{}", id), update).await
  }

  // Service board

  pub async fn service_board(&self, filter: &ServiceBoardFilter) -> ApiResult<ServiceBoard> {
    self.get_with("service-board", filter).await
  }

  pub async fn get_service_item(&self, id: &str) -> ApiResult<ServiceItem> {
    self.get(&format!("service-board/{}", id)).await
  }

  pub async fn create_service_item(&self, item: &NewServiceItem) -> ApiResult<ServiceItem> {
    self.post("service-board", item).await
  }

  pub async fn update_service_item(
    &self,
    id: &str,
    update: &ServiceItemUpdate,
  ) -> ApiResult<ServiceItem> {
    self.put(&format!("service-board/{}", id), update).await
  }

  // Tasks

  pub async fn list_tasks(&self, filter: &TaskFilter) -> ApiResult<TaskList> {
    self.get_with("tasks", filter).await
  }

  /// Tasks assigned to or created by the current user.
  pub async fn my_tasks(&self, filter: &TaskFilter) -> ApiResult<TaskList> {
    self.get_with("tasks/my", filter).await
  }

  pub async fn create_task(&self, task: &NewTask) -> ApiResult<Task> {
    self.post("tasks", task).await
  }

  pub async fn update_task(&self, id: &str, update: &TaskUpdate) -> ApiResult<Task> {
    self.put(&format!("tasks/{}", id), update).await
  }

  // Prospects

  pub async fn list_prospects(&self, filter: &ProspectFilter) -> ApiResult<Page<Prospect>> {
    self.get_with("prospects", filter).await
  }

  pub async fn pipeline(&self) -> ApiResult<PipelineStats> {
    self.get("prospects/pipeline").await
  }

  pub async fn get_prospect(&self, id: &str) -> ApiResult<Prospect> {
    self.get(&format!("prospects/{}", id)).await
  }

  pub async fn create_prospect(&self, prospect: &NewProspect) -> ApiResult<Prospect> {
    self.post("prospects", prospect).await
  }

  pub async fn update_prospect(&self, id: &str, update: &ProspectUpdate) -> ApiResult<Prospect> {
    self.put(&format!("prospects/{}", id), update).await
  }

  pub async fn update_prospect_stage(&self, id: &str, stage: &str) -> ApiResult<StageChange> {
    self
      .put_query(&format!("prospects/{}/stage", id), &StageQuery { stage })
      .await
  }

  /// Convert a prospect into an account. Returns the new account.
  pub async fn convert_prospect(&self, id: &str) -> ApiResult<Account> {
    self.post_empty(&format!("prospects/{}/convert", id)).await
  }

  // Sales log

  pub async fn list_sales(&self, filter: &SalesFilter) -> ApiResult<Page<Sale>> {
    self.get_with("sales-log", filter).await
  }

  pub async fn create_sale(&self, sale: &NewSale) -> ApiResult<Sale> {
    self.post("sales-log", sale).await
  }

  pub async fn sales_summary(&self) -> ApiResult<SalesSummary> {
    self.get("sales-log/summary").await
  }

  pub async fn sales_trends(&self, query: &TrendQuery) -> ApiResult<SalesTrends> {
    self.get_with("sales-log/trends", query).await
  }

  // Carriers

  pub async fn list_carriers(&self, search: Option<&str>) -> ApiResult<Vec<Carrier>> {
    self.get_with("carriers", &CarrierSearch { search }).await
  }

  pub async fn get_carrier(&self, id: &str) -> ApiResult<Carrier> {
    self.get(&format!("carriers/{}", id)).await
  }

  pub async fn create_carrier(&self, carrier: &NewCarrier) -> ApiResult<Carrier> {
    self.post("carriers", carrier).await
  }

  // Notes and communication logs

  pub async fn list_notes(&self, entity: EntityKind, entity_id: &str) -> ApiResult<Vec<Note>> {
    let query = LinkedEntity {
      linked_entity_type: entity,
      linked_entity_id: entity_id,
      channel: None,
    };
    self.get_with("notes", &query).await
  }

  pub async fn create_note(&self, note: &NewNote) -> ApiResult<Note> {
    self.post("notes", note).await
  }

  pub async fn list_comm_logs(
    &self,
    entity: EntityKind,
    entity_id: &str,
    channel: Option<&str>,
  ) -> ApiResult<Vec<CommLog>> {
    let query = LinkedEntity {
      linked_entity_type: entity,
      linked_entity_id: entity_id,
      channel,
    };
    self.get_with("comm-logs", &query).await
  }

  pub async fn create_comm_log(&self, log: &NewCommLog) -> ApiResult<CommLog> {
    self.post("comm-logs", log).await
  }
}
