//! Agency API client with cached reads and invalidating writes.

use color_eyre::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::info;

use crate::api::types::*;
use crate::api::ApiClient;
use crate::cache::{Notifier, QueryClient, QueryKey, QueryObserver, QueryOptions, QueryResult};
use crate::config::Config;
use crate::error::ApiResult;
use crate::session::Session;

use super::keys;
use super::rules::{self, Operation};

/// Quick search only runs once the term is this long.
pub const QUICK_SEARCH_MIN_CHARS: usize = 2;
/// Results per entity type in quick search.
pub const QUICK_SEARCH_LIMIT: u32 = 5;
/// Page size for per-account and per-policy lists.
const DETAIL_LIST_SIZE: u32 = 100;

/// Results of a quick search across accounts and prospects.
#[derive(Debug, Clone)]
pub struct QuickSearch {
  pub accounts: QueryResult<Page<Account>>,
  pub prospects: QueryResult<Page<Prospect>>,
}

/// Agency client with transparent caching.
///
/// Reads go through the [`QueryClient`] under the keys in [`keys`]. Writes go
/// straight to the server and, once acknowledged, invalidate what
/// [`rules::invalidations`] lists for them. Payloads are borrowed so a
/// rejected write leaves the caller's input intact for correction.
#[derive(Clone)]
pub struct AgencyClient {
  api: ApiClient,
  queries: QueryClient,
}

impl AgencyClient {
  pub fn new(config: &Config, session: Session) -> Result<Self> {
    let api = ApiClient::new(&config.api, session)?;
    let queries =
      QueryClient::new(config.cache.query_options()).with_gc_time(config.cache.gc_time());
    Ok(Self { api, queries })
  }

  pub fn from_parts(api: ApiClient, queries: QueryClient) -> Self {
    Self { api, queries }
  }

  pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
    self.queries = self.queries.with_notifier(notifier);
    self
  }

  pub fn api(&self) -> &ApiClient {
    &self.api
  }

  pub fn queries(&self) -> &QueryClient {
    &self.queries
  }

  pub fn session(&self) -> &Session {
    self.api.session()
  }

  // Session

  /// Sign in and start from an empty cache.
  pub async fn login(&self, email: &str, password: &str) -> Result<User> {
    let credentials = Credentials {
      email: email.to_string(),
      password: password.to_string(),
    };
    let token = self.api.login(&credentials).await?;
    self.start_session(token)
  }

  /// Register the first administrator and sign in as them.
  pub async fn setup(&self, request: &SetupRequest) -> Result<User> {
    let token = self.api.setup(request).await?;
    self.start_session(token)
  }

  /// Forget the session and everything cached under it.
  pub fn logout(&self) -> Result<()> {
    self.session().clear()?;
    let dropped = self.queries.store().len();
    self.queries.clear();
    info!(dropped, "signed out");
    Ok(())
  }

  pub async fn me(&self) -> ApiResult<User> {
    let result = self.api.me().await;
    if matches!(&result, Err(e) if e.is_auth()) {
      self.queries.clear();
    }
    result
  }

  fn start_session(&self, token: TokenResponse) -> Result<User> {
    self
      .session()
      .store(token.access_token, token.user.clone())?;
    self.queries.clear();
    info!(user = %token.user.email, role = %token.user.role, "signed in");
    Ok(token.user)
  }

  // Reads

  pub async fn dashboard(&self) -> QueryResult<Dashboard> {
    self
      .read(keys::dashboard(), |api| async move { api.dashboard().await })
      .await
  }

  pub async fn accounts(&self, filter: &AccountFilter) -> QueryResult<Page<Account>> {
    let filter = filter.clone();
    self
      .read(keys::accounts(&filter), move |api| {
        let filter = filter.clone();
        async move { api.list_accounts(&filter).await }
      })
      .await
  }

  pub async fn account(&self, id: &str) -> QueryResult<Account> {
    let id = id.to_string();
    self
      .read(keys::account(&id), move |api| {
        let id = id.clone();
        async move { api.get_account(&id).await }
      })
      .await
  }

  pub async fn account_contacts(&self, account_id: &str) -> QueryResult<Vec<Contact>> {
    let account_id = account_id.to_string();
    self
      .read(keys::account_contacts(&account_id), move |api| {
        let account_id = account_id.clone();
        async move { api.account_contacts(&account_id).await }
      })
      .await
  }

  pub async fn account_policies(&self, account_id: &str) -> QueryResult<Page<Policy>> {
    let (key, fetch) = account_policies_query(account_id);
    self.read(key, fetch).await
  }

  pub async fn account_service_items(&self, account_id: &str) -> QueryResult<ServiceBoard> {
    let filter = ServiceBoardFilter {
      account_id: Some(account_id.to_string()),
      ..ServiceBoardFilter::default()
    };
    self
      .read(keys::account_service_items(account_id), move |api| {
        let filter = filter.clone();
        async move { api.service_board(&filter).await }
      })
      .await
  }

  pub async fn account_tasks(&self, account_id: &str) -> QueryResult<TaskList> {
    let filter = TaskFilter {
      linked_entity_type: Some(EntityKind::Account),
      linked_entity_id: Some(account_id.to_string()),
      ..TaskFilter::default()
    };
    self
      .read(keys::account_tasks(account_id), move |api| {
        let filter = filter.clone();
        async move { api.list_tasks(&filter).await }
      })
      .await
  }

  pub async fn notes(&self, entity: EntityKind, entity_id: &str) -> QueryResult<Vec<Note>> {
    let entity_id = entity_id.to_string();
    self
      .read(keys::notes(entity, &entity_id), move |api| {
        let entity_id = entity_id.clone();
        async move { api.list_notes(entity, &entity_id).await }
      })
      .await
  }

  pub async fn comm_logs(&self, entity: EntityKind, entity_id: &str) -> QueryResult<Vec<CommLog>> {
    let entity_id = entity_id.to_string();
    self
      .read(keys::comm_logs(entity, &entity_id), move |api| {
        let entity_id = entity_id.clone();
        async move { api.list_comm_logs(entity, &entity_id, None).await }
      })
      .await
  }

  pub async fn policies(&self, filter: &PolicyFilter) -> QueryResult<Page<Policy>> {
    let filter = filter.clone();
    self
      .read(keys::policies(&filter), move |api| {
        let filter = filter.clone();
        async move { api.list_policies(&filter).await }
      })
      .await
  }

  pub async fn policy(&self, id: &str) -> QueryResult<Policy> {
    let id = id.to_string();
    self
      .read(keys::policy(&id), move |api| {
        let id = id.clone();
        async move { api.get_policy(&id).await }
      })
      .await
  }

  pub async fn policy_installments(&self, policy_id: &str) -> QueryResult<Vec<Installment>> {
    let policy_id = policy_id.to_string();
    self
      .read(keys::policy_installments(&policy_id), move |api| {
        let policy_id = policy_id.clone();
        async move { api.policy_installments(&policy_id).await }
      })
      .await
  }

  pub async fn policy_service_items(&self, policy_id: &str) -> QueryResult<ServiceBoard> {
    let filter = ServiceBoardFilter {
      policy_id: Some(policy_id.to_string()),
      ..ServiceBoardFilter::default()
    };
    self
      .read(keys::policy_service_items(policy_id), move |api| {
        let filter = filter.clone();
        async move { api.service_board(&filter).await }
      })
      .await
  }

  pub async fn prospects(&self, filter: &ProspectFilter) -> QueryResult<Page<Prospect>> {
    let filter = filter.clone();
    self
      .read(keys::prospects(&filter), move |api| {
        let filter = filter.clone();
        async move { api.list_prospects(&filter).await }
      })
      .await
  }

  pub async fn prospect(&self, id: &str) -> QueryResult<Prospect> {
    let id = id.to_string();
    self
      .read(keys::prospect(&id), move |api| {
        let id = id.clone();
        async move { api.get_prospect(&id).await }
      })
      .await
  }

  pub async fn pipeline_stats(&self) -> QueryResult<PipelineStats> {
    self
      .read(keys::pipeline_stats(), |api| async move { api.pipeline().await })
      .await
  }

  pub async fn service_board(&self, filter: &ServiceBoardFilter) -> QueryResult<ServiceBoard> {
    let filter = filter.clone();
    self
      .read(keys::service_board(&filter), move |api| {
        let filter = filter.clone();
        async move { api.service_board(&filter).await }
      })
      .await
  }

  /// The signed-in user's tasks.
  pub async fn all_tasks(&self, filter: &TaskFilter) -> QueryResult<TaskList> {
    let filter = filter.clone();
    self
      .read(keys::all_tasks(&filter), move |api| {
        let filter = filter.clone();
        async move { api.my_tasks(&filter).await }
      })
      .await
  }

  pub async fn carriers(&self) -> QueryResult<Vec<Carrier>> {
    self
      .read(keys::carriers(), |api| async move { api.list_carriers(None).await })
      .await
  }

  pub async fn sales_list(&self, filter: &SalesFilter) -> QueryResult<Page<Sale>> {
    let filter = filter.clone();
    self
      .read(keys::sales_list(&filter), move |api| {
        let filter = filter.clone();
        async move { api.list_sales(&filter).await }
      })
      .await
  }

  pub async fn sales_summary(&self) -> QueryResult<SalesSummary> {
    self
      .read(keys::sales_summary(), |api| async move { api.sales_summary().await })
      .await
  }

  /// Monthly sales by line of business.
  pub async fn sales_trends_lob(&self) -> QueryResult<SalesTrends> {
    self
      .read(keys::sales_trends_lob(), |api| async move {
        api.sales_trends(&monthly_trend(TrendGrouping::Lob)).await
      })
      .await
  }

  /// Monthly sales by lead source.
  pub async fn sales_trends_source(&self) -> QueryResult<SalesTrends> {
    self
      .read(keys::sales_trends_source(), |api| async move {
        api.sales_trends(&monthly_trend(TrendGrouping::Source)).await
      })
      .await
  }

  /// Account picker for forms. Disabled below [`QUICK_SEARCH_MIN_CHARS`].
  pub async fn account_search(&self, term: &str) -> QueryResult<Page<Account>> {
    let options = self.search_options(term);
    let filter = search_filter(term);
    self
      .read_with(
        keys::account_search(term),
        move |api| {
          let filter = filter.clone();
          async move { api.list_accounts(&filter).await }
        },
        options,
      )
      .await
  }

  /// Search accounts and prospects at once.
  ///
  /// Terms shorter than [`QUICK_SEARCH_MIN_CHARS`] make no request and return
  /// idle results.
  pub async fn quick_search(&self, term: &str) -> QuickSearch {
    let options = self.search_options(term);
    let accounts_filter = search_filter(term);
    let prospects_filter = ProspectFilter {
      search: Some(term.to_string()),
      page_size: Some(QUICK_SEARCH_LIMIT),
      ..ProspectFilter::default()
    };

    let (accounts, prospects) = tokio::join!(
      self.read_with(
        keys::quick_search_accounts(term),
        move |api| {
          let filter = accounts_filter.clone();
          async move { api.list_accounts(&filter).await }
        },
        options.clone(),
      ),
      self.read_with(
        keys::quick_search_prospects(term),
        move |api| {
          let filter = prospects_filter.clone();
          async move { api.list_prospects(&filter).await }
        },
        options,
      ),
    );

    QuickSearch {
      accounts,
      prospects,
    }
  }

  // Observers

  /// Mount a consumer on `key`; it follows every change and refetches on invalidation.
  pub fn observe<T, F, Fut>(&self, key: QueryKey, fetch: F) -> QueryObserver<T>
  where
    T: Serialize + DeserializeOwned + Send + 'static,
    F: Fn(ApiClient) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ApiResult<T>> + Send + 'static,
  {
    let api = self.api.clone();
    self
      .queries
      .subscribe(key, move || fetch(api.clone()), self.queries.options())
  }

  pub fn observe_dashboard(&self) -> QueryObserver<Dashboard> {
    self.observe(keys::dashboard(), |api| async move { api.dashboard().await })
  }

  pub fn observe_account_policies(&self, account_id: &str) -> QueryObserver<Page<Policy>> {
    let (key, fetch) = account_policies_query(account_id);
    self.observe(key, fetch)
  }

  pub fn observe_service_board(&self, filter: &ServiceBoardFilter) -> QueryObserver<ServiceBoard> {
    let filter = filter.clone();
    self.observe(keys::service_board(&filter), move |api| {
      let filter = filter.clone();
      async move { api.service_board(&filter).await }
    })
  }

  // Writes

  pub async fn create_account(&self, account: &NewAccount) -> ApiResult<Account> {
    self
      .write(&Operation::CreateAccount, || self.api.create_account(account))
      .await
  }

  pub async fn update_account(&self, id: &str, update: &AccountUpdate) -> ApiResult<Account> {
    let op = Operation::UpdateAccount {
      account_id: id.to_string(),
    };
    self.write(&op, || self.api.update_account(id, update)).await
  }

  pub async fn delete_account(&self, id: &str) -> ApiResult<()> {
    let op = Operation::DeleteAccount {
      account_id: id.to_string(),
    };
    self.write(&op, || self.api.delete_account(id)).await
  }

  pub async fn create_contact(&self, contact: &NewContact) -> ApiResult<Contact> {
    let op = Operation::CreateContact {
      account_id: contact.account_id.clone(),
    };
    self.write(&op, || self.api.create_contact(contact)).await
  }

  pub async fn update_contact(
    &self,
    id: &str,
    account_id: &str,
    update: &ContactUpdate,
  ) -> ApiResult<Contact> {
    let op = Operation::UpdateContact {
      account_id: account_id.to_string(),
    };
    self.write(&op, || self.api.update_contact(id, update)).await
  }

  pub async fn create_carrier(&self, carrier: &NewCarrier) -> ApiResult<Carrier> {
    self
      .write(&Operation::CreateCarrier, || self.api.create_carrier(carrier))
      .await
  }

  pub async fn create_policy(&self, policy: &NewPolicy) -> ApiResult<Policy> {
    let op = Operation::CreatePolicy {
      account_id: policy.account_id.clone(),
    };
    self.write(&op, || self.api.create_policy(policy)).await
  }

  pub async fn update_policy(&self, id: &str, update: &PolicyUpdate) -> ApiResult<Policy> {
    let op = Operation::UpdatePolicy {
      policy_id: id.to_string(),
    };
    self.write(&op, || self.api.update_policy(id, update)).await
  }

  pub async fn create_installment(
    &self,
    policy_id: &str,
    installment: &NewInstallment,
  ) -> ApiResult<Installment> {
    let op = Operation::CreateInstallment {
      policy_id: policy_id.to_string(),
    };
    self
      .write(&op, || self.api.create_installment(policy_id, installment))
      .await
  }

  pub async fn update_installment(
    &self,
    id: &str,
    policy_id: &str,
    update: &InstallmentUpdate,
  ) -> ApiResult<Installment> {
    let op = Operation::UpdateInstallment {
      policy_id: policy_id.to_string(),
    };
    self.write(&op, || self.api.update_installment(id, update)).await
  }

  pub async fn create_service_item(&self, item: &NewServiceItem) -> ApiResult<ServiceItem> {
    let op = Operation::CreateServiceItem {
      account_id: item.account_id.clone(),
      policy_id: item.policy_id.clone().filter(|id| !id.trim().is_empty()),
    };
    self.write(&op, || self.api.create_service_item(item)).await
  }

  pub async fn update_service_item(
    &self,
    id: &str,
    update: &ServiceItemUpdate,
  ) -> ApiResult<ServiceItem> {
    self
      .write(&Operation::UpdateServiceItem, || {
        self.api.update_service_item(id, update)
      })
      .await
  }

  pub async fn create_task(&self, task: &NewTask) -> ApiResult<Task> {
    let account_id = match task.linked_entity_type {
      Some(EntityKind::Account) => task.linked_entity_id.clone(),
      _ => None,
    };
    let op = Operation::CreateTask { account_id };
    self.write(&op, || self.api.create_task(task)).await
  }

  pub async fn update_task(&self, id: &str, update: &TaskUpdate) -> ApiResult<Task> {
    self
      .write(&Operation::UpdateTask, || self.api.update_task(id, update))
      .await
  }

  pub async fn create_prospect(&self, prospect: &NewProspect) -> ApiResult<Prospect> {
    self
      .write(&Operation::CreateProspect, || {
        self.api.create_prospect(prospect)
      })
      .await
  }

  pub async fn update_prospect(&self, id: &str, update: &ProspectUpdate) -> ApiResult<Prospect> {
    let op = Operation::UpdateProspect {
      prospect_id: id.to_string(),
    };
    self.write(&op, || self.api.update_prospect(id, update)).await
  }

  /// Move a prospect along the pipeline.
  pub async fn update_prospect_stage(&self, id: &str, stage: &str) -> ApiResult<StageChange> {
    let op = Operation::UpdateProspectStage {
      prospect_id: id.to_string(),
    };
    self
      .write(&op, || self.api.update_prospect_stage(id, stage))
      .await
  }

  pub async fn convert_prospect(&self, id: &str) -> ApiResult<Account> {
    let op = Operation::ConvertProspect {
      prospect_id: id.to_string(),
    };
    self.write(&op, || self.api.convert_prospect(id)).await
  }

  pub async fn create_sale(&self, sale: &NewSale) -> ApiResult<Sale> {
    self
      .write(&Operation::CreateSale, || self.api.create_sale(sale))
      .await
  }

  pub async fn create_note(&self, note: &NewNote) -> ApiResult<Note> {
    let op = Operation::CreateNote {
      entity: note.linked_entity_type,
      entity_id: note.linked_entity_id.clone(),
    };
    self.write(&op, || self.api.create_note(note)).await
  }

  pub async fn create_comm_log(&self, log: &NewCommLog) -> ApiResult<CommLog> {
    let op = Operation::CreateCommLog {
      entity: log.linked_entity_type,
      entity_id: log.linked_entity_id.clone(),
    };
    self.write(&op, || self.api.create_comm_log(log)).await
  }

  // Plumbing

  async fn read<T, F, Fut>(&self, key: QueryKey, fetch: F) -> QueryResult<T>
  where
    T: Serialize + DeserializeOwned + Send + 'static,
    F: Fn(ApiClient) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ApiResult<T>> + Send + 'static,
  {
    self.read_with(key, fetch, self.queries.options()).await
  }

  async fn read_with<T, F, Fut>(&self, key: QueryKey, fetch: F, options: QueryOptions) -> QueryResult<T>
  where
    T: Serialize + DeserializeOwned + Send + 'static,
    F: Fn(ApiClient) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ApiResult<T>> + Send + 'static,
  {
    let api = self.api.clone();
    self
      .queries
      .query(&key, move || fetch(api.clone()), options)
      .await
  }

  async fn write<R, F, Fut>(&self, op: &Operation, write: F) -> ApiResult<R>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ApiResult<R>>,
  {
    self.queries.mutate(&rules::invalidations(op), write).await
  }

  fn search_options(&self, term: &str) -> QueryOptions {
    self
      .queries
      .options()
      .enabled(term.chars().count() >= QUICK_SEARCH_MIN_CHARS)
  }
}

impl std::fmt::Debug for AgencyClient {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AgencyClient")
      .field("api", &self.api)
      .field("cached", &self.queries.store().len())
      .finish()
  }
}

type PolicyPageFetch = Box<dyn Fn(ApiClient) -> futures::future::BoxFuture<'static, ApiResult<Page<Policy>>> + Send + Sync>;

/// Key and fetcher for one account's policies, shared by the read and the observer.
fn account_policies_query(account_id: &str) -> (QueryKey, PolicyPageFetch) {
  use futures::FutureExt;

  let filter = PolicyFilter {
    account_id: Some(account_id.to_string()),
    page_size: Some(DETAIL_LIST_SIZE),
    ..PolicyFilter::default()
  };
  let fetch: PolicyPageFetch = Box::new(move |api: ApiClient| {
    let filter = filter.clone();
    async move { api.list_policies(&filter).await }.boxed()
  });
  (keys::account_policies(account_id), fetch)
}

fn search_filter(term: &str) -> AccountFilter {
  AccountFilter {
    search: Some(term.to_string()),
    page_size: Some(QUICK_SEARCH_LIMIT),
    ..AccountFilter::default()
  }
}

fn monthly_trend(group_by: TrendGrouping) -> TrendQuery {
  TrendQuery {
    period: TrendPeriod::Monthly,
    group_by,
    date_from: None,
    date_to: None,
  }
}
