//! Wire types for the agency API.
//!
//! Response types are `Serialize` as well as `Deserialize` because cached
//! reads are stored as JSON. Input types omit unset fields, and blank strings
//! are never sent.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

fn is_blank(value: &Option<String>) -> bool {
  value.as_deref().map_or(true, |s| s.trim().is_empty())
}

/// Monetary amount. The server sends decimals as strings (sometimes numbers).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Amount(String);

impl Amount {
  pub fn as_str(&self) -> &str {
    &self.0
  }

  pub fn to_f64(&self) -> Option<f64> {
    self.0.parse().ok()
  }
}

impl fmt::Display for Amount {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl FromStr for Amount {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let trimmed = s.trim().trim_start_matches('$').replace(',', "");
    trimmed
      .parse::<f64>()
      .map_err(|_| format!("not an amount: {}", s))?;
    Ok(Self(trimmed))
  }
}

impl Serialize for Amount {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&self.0)
  }
}

impl<'de> Deserialize<'de> for Amount {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
      Text(String),
      Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
      Raw::Text(s) => Amount(s),
      Raw::Number(n) => Amount(n.to_string()),
    })
  }
}

/// Entity types that notes, comm logs and tasks can be linked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
  Account,
  Contact,
  Policy,
  Prospect,
  ServiceItem,
}

impl EntityKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      EntityKind::Account => "Account",
      EntityKind::Contact => "Contact",
      EntityKind::Policy => "Policy",
      EntityKind::Prospect => "Prospect",
      EntityKind::ServiceItem => "ServiceItem",
    }
  }

  /// Lowercased name used to build per-entity query keys (`accountNotes`).
  pub fn key_stem(&self) -> String {
    self.as_str().to_lowercase()
  }
}

impl fmt::Display for EntityKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for EntityKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "account" => Ok(EntityKind::Account),
      "contact" => Ok(EntityKind::Contact),
      "policy" => Ok(EntityKind::Policy),
      "prospect" => Ok(EntityKind::Prospect),
      "serviceitem" | "service-item" => Ok(EntityKind::ServiceItem),
      _ => Err(format!("unknown entity type: {}", s)),
    }
  }
}

/// Paginated list response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
  pub items: Vec<T>,
  pub total: u64,
  #[serde(default)]
  pub page: Option<u32>,
  #[serde(default)]
  pub page_size: Option<u32>,
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
  pub id: String,
  pub email: String,
  pub name: String,
  pub role: String,
  pub is_active: bool,
  pub last_login: Option<String>,
  pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
  pub email: String,
  pub password: String,
}

/// First-run administrator registration.
#[derive(Debug, Clone, Serialize)]
pub struct SetupRequest {
  pub email: String,
  pub name: String,
  pub password: String,
  #[serde(skip_serializing_if = "is_blank")]
  pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
  pub access_token: String,
  #[serde(default = "default_token_type")]
  pub token_type: String,
  pub user: User,
}

fn default_token_type() -> String {
  "bearer".to_string()
}

// ---------------------------------------------------------------------------
// Accounts and contacts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
  pub id: String,
  pub name: String,
  #[serde(rename = "type")]
  pub account_type: String,
  pub status: String,
  pub primary_contact_id: Option<String>,
  pub assigned_producer_id: Option<String>,
  pub assigned_csr_id: Option<String>,
  pub address_line1: Option<String>,
  pub address_line2: Option<String>,
  pub city: Option<String>,
  pub state: Option<String>,
  pub zip_code: Option<String>,
  pub county: Option<String>,
  pub phone: Option<String>,
  pub email: Option<String>,
  pub created_at: String,
  pub updated_at: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NewAccount {
  pub name: String,
  /// Personal or Commercial
  #[serde(rename = "type")]
  pub account_type: String,
  #[serde(skip_serializing_if = "is_blank")]
  pub status: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub assigned_producer_id: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub assigned_csr_id: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub address_line1: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub address_line2: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub city: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub state: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub zip_code: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub county: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub phone: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AccountUpdate {
  #[serde(skip_serializing_if = "is_blank")]
  pub name: Option<String>,
  #[serde(rename = "type", skip_serializing_if = "is_blank")]
  pub account_type: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub status: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub primary_contact_id: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub assigned_producer_id: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub assigned_csr_id: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub address_line1: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub address_line2: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub city: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub state: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub zip_code: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub county: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub phone: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub email: Option<String>,
}

/// Filters for the accounts list. Also the key segment for cached lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AccountFilter {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub page: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub page_size: Option<u32>,
  #[serde(skip_serializing_if = "is_blank")]
  pub search: Option<String>,
  #[serde(rename = "type", skip_serializing_if = "is_blank")]
  pub account_type: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub status: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub zip_code: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub county: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
  pub id: String,
  pub account_id: String,
  pub first_name: String,
  pub last_name: String,
  pub email: Option<String>,
  pub phone: Option<String>,
  pub mobile_phone: Option<String>,
  pub role: Option<String>,
  pub is_primary: bool,
  pub communication_preference: Option<String>,
  pub date_of_birth: Option<NaiveDate>,
  pub created_at: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NewContact {
  pub account_id: String,
  pub first_name: String,
  pub last_name: String,
  #[serde(skip_serializing_if = "is_blank")]
  pub email: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub phone: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub mobile_phone: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub role: Option<String>,
  pub is_primary: bool,
  #[serde(skip_serializing_if = "is_blank")]
  pub communication_preference: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub date_of_birth: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ContactUpdate {
  #[serde(skip_serializing_if = "is_blank")]
  pub first_name: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub last_name: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub email: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub phone: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub mobile_phone: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub role: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub is_primary: Option<bool>,
  #[serde(skip_serializing_if = "is_blank")]
  pub communication_preference: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub date_of_birth: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Carriers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Carrier {
  pub id: String,
  pub name: String,
  #[serde(rename = "type")]
  pub carrier_type: String,
  pub phone: Option<String>,
  pub email: Option<String>,
  pub portal_url: Option<String>,
  pub appetite_notes: Option<String>,
  pub am_best_rating: Option<String>,
  pub created_at: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NewCarrier {
  pub name: String,
  /// Direct, Wholesaler or MGA
  #[serde(rename = "type")]
  pub carrier_type: String,
  #[serde(skip_serializing_if = "is_blank")]
  pub phone: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub email: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub portal_url: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub appetite_notes: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub am_best_rating: Option<String>,
}

// ---------------------------------------------------------------------------
// Policies and installments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
  pub id: String,
  pub account_id: String,
  pub carrier_id: Option<String>,
  pub line_of_business: String,
  pub policy_number: Option<String>,
  pub effective_date: NaiveDate,
  pub expiration_date: NaiveDate,
  pub premium: Option<Amount>,
  pub payment_plan: Option<String>,
  pub renewal_status: String,
  pub status: String,
  pub servicing_owner_id: Option<String>,
  pub producing_agent_id: Option<String>,
  #[serde(default)]
  pub carrier_name: Option<String>,
  #[serde(default)]
  pub account_name: Option<String>,
  pub created_at: String,
  pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPolicy {
  pub account_id: String,
  #[serde(skip_serializing_if = "is_blank")]
  pub carrier_id: Option<String>,
  pub line_of_business: String,
  #[serde(skip_serializing_if = "is_blank")]
  pub policy_number: Option<String>,
  pub effective_date: NaiveDate,
  pub expiration_date: NaiveDate,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub premium: Option<Amount>,
  #[serde(skip_serializing_if = "is_blank")]
  pub payment_plan: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub status: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub servicing_owner_id: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub producing_agent_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PolicyUpdate {
  #[serde(skip_serializing_if = "is_blank")]
  pub carrier_id: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub line_of_business: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub policy_number: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub effective_date: Option<NaiveDate>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub expiration_date: Option<NaiveDate>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub premium: Option<Amount>,
  #[serde(skip_serializing_if = "is_blank")]
  pub payment_plan: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub renewal_status: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub status: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub servicing_owner_id: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub producing_agent_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PolicyFilter {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub page: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub page_size: Option<u32>,
  #[serde(skip_serializing_if = "is_blank")]
  pub account_id: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub line_of_business: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub carrier_id: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub status: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub expiring_before: Option<NaiveDate>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub expiring_after: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
  pub id: String,
  pub policy_id: String,
  pub due_date: NaiveDate,
  pub amount: Amount,
  pub status: String,
  pub payment_method: Option<String>,
  pub paid_date: Option<NaiveDate>,
  pub reminder_sent_at: Option<String>,
  pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewInstallment {
  pub due_date: NaiveDate,
  pub amount: Amount,
  #[serde(skip_serializing_if = "is_blank")]
  pub payment_method: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InstallmentUpdate {
  #[serde(skip_serializing_if = "is_blank")]
  pub status: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub paid_date: Option<NaiveDate>,
  #[serde(skip_serializing_if = "is_blank")]
  pub payment_method: Option<String>,
}

// ---------------------------------------------------------------------------
// Service board
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceItem {
  pub id: String,
  #[serde(rename = "type")]
  pub item_type: String,
  pub account_id: String,
  pub policy_id: Option<String>,
  pub description: Option<String>,
  pub status: String,
  pub assigned_to: Option<String>,
  pub due_date: Option<NaiveDate>,
  pub urgency: String,
  pub workflow_instance_id: Option<String>,
  pub created_at: String,
  pub updated_at: String,
  pub completed_at: Option<String>,
  pub account_name: Option<String>,
  pub policy_lob: Option<String>,
  pub assignee_name: Option<String>,
}

/// Service board list with the aggregate counts shown in its header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceBoard {
  pub items: Vec<ServiceItem>,
  pub total: u64,
  #[serde(default)]
  pub counts_by_status: BTreeMap<String, u64>,
  #[serde(default)]
  pub counts_by_type: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NewServiceItem {
  #[serde(rename = "type")]
  pub item_type: String,
  pub account_id: String,
  #[serde(skip_serializing_if = "is_blank")]
  pub policy_id: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub assigned_to: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub due_date: Option<NaiveDate>,
  #[serde(skip_serializing_if = "is_blank")]
  pub urgency: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ServiceItemUpdate {
  #[serde(skip_serializing_if = "is_blank")]
  pub status: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub assigned_to: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub due_date: Option<NaiveDate>,
  #[serde(skip_serializing_if = "is_blank")]
  pub urgency: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServiceBoardFilter {
  #[serde(rename = "type", skip_serializing_if = "is_blank")]
  pub item_type: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub status: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub urgency: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub assigned_to: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub due_before: Option<NaiveDate>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub due_after: Option<NaiveDate>,
  #[serde(skip_serializing_if = "is_blank")]
  pub account_id: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub policy_id: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub search: Option<String>,
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
  pub id: String,
  pub title: String,
  pub description: Option<String>,
  pub linked_entity_type: Option<String>,
  pub linked_entity_id: Option<String>,
  pub assigned_to: Option<String>,
  pub created_by: Option<String>,
  pub due_date: Option<NaiveDate>,
  pub priority: String,
  pub status: String,
  pub completed_at: Option<String>,
  pub source: String,
  pub created_at: String,
}

/// Task list (not paginated, but shaped like a page).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskList {
  pub items: Vec<Task>,
  pub total: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NewTask {
  pub title: String,
  #[serde(skip_serializing_if = "is_blank")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub linked_entity_type: Option<EntityKind>,
  #[serde(skip_serializing_if = "is_blank")]
  pub linked_entity_id: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub assigned_to: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub due_date: Option<NaiveDate>,
  #[serde(skip_serializing_if = "is_blank")]
  pub priority: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskUpdate {
  #[serde(skip_serializing_if = "is_blank")]
  pub title: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub assigned_to: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub due_date: Option<NaiveDate>,
  #[serde(skip_serializing_if = "is_blank")]
  pub priority: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskFilter {
  #[serde(skip_serializing_if = "is_blank")]
  pub assigned_to: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub status: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub priority: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub due_before: Option<NaiveDate>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub linked_entity_type: Option<EntityKind>,
  #[serde(skip_serializing_if = "is_blank")]
  pub linked_entity_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Prospects
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prospect {
  pub id: String,
  pub first_name: String,
  pub last_name: String,
  pub business_name: Option<String>,
  pub email: Option<String>,
  pub phone: Option<String>,
  pub source: Option<String>,
  pub source_detail: Option<String>,
  pub referrer_account_id: Option<String>,
  pub lob_interest: Option<String>,
  pub estimated_premium: Option<Amount>,
  pub current_carrier: Option<String>,
  pub current_expiration: Option<NaiveDate>,
  pub pipeline_stage: String,
  pub assigned_producer_id: Option<String>,
  pub zip_code: Option<String>,
  pub county: Option<String>,
  pub created_at: String,
  pub updated_at: String,
  pub closed_at: Option<String>,
  pub close_reason: Option<String>,
  pub converted_account_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NewProspect {
  pub first_name: String,
  pub last_name: String,
  #[serde(skip_serializing_if = "is_blank")]
  pub business_name: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub email: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub phone: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub source: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub source_detail: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub referrer_account_id: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub lob_interest: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub estimated_premium: Option<Amount>,
  #[serde(skip_serializing_if = "is_blank")]
  pub current_carrier: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub current_expiration: Option<NaiveDate>,
  #[serde(skip_serializing_if = "is_blank")]
  pub assigned_producer_id: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub zip_code: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub county: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProspectUpdate {
  #[serde(skip_serializing_if = "is_blank")]
  pub first_name: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub last_name: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub business_name: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub email: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub phone: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub source: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub source_detail: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub lob_interest: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub estimated_premium: Option<Amount>,
  #[serde(skip_serializing_if = "is_blank")]
  pub current_carrier: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub current_expiration: Option<NaiveDate>,
  #[serde(skip_serializing_if = "is_blank")]
  pub pipeline_stage: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub assigned_producer_id: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub zip_code: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub county: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub close_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProspectFilter {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub page: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub page_size: Option<u32>,
  #[serde(skip_serializing_if = "is_blank")]
  pub pipeline_stage: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub source: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub assigned_producer_id: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub search: Option<String>,
}

/// Count and estimated premium of open prospects in one pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageStats {
  pub count: u64,
  pub value: f64,
}

/// Open pipeline by stage name.
pub type PipelineStats = BTreeMap<String, StageStats>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageChange {
  pub id: String,
  pub pipeline_stage: String,
}

// ---------------------------------------------------------------------------
// Sales log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
  pub id: String,
  pub sale_date: NaiveDate,
  pub account_id: String,
  pub prospect_id: Option<String>,
  pub policy_id: Option<String>,
  pub line_of_business: String,
  pub premium: Amount,
  pub carrier_id: Option<String>,
  pub producer_id: String,
  pub source: Option<String>,
  pub source_detail: Option<String>,
  pub zip_code: Option<String>,
  pub county: Option<String>,
  pub sale_type: String,
  pub notes: Option<String>,
  pub created_at: String,
  pub account_name: Option<String>,
  pub carrier_name: Option<String>,
  pub producer_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewSale {
  /// Defaults to today on the server
  #[serde(skip_serializing_if = "Option::is_none")]
  pub sale_date: Option<NaiveDate>,
  #[serde(skip_serializing_if = "is_blank")]
  pub account_id: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub prospect_id: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub policy_id: Option<String>,
  pub line_of_business: String,
  pub premium: Amount,
  #[serde(skip_serializing_if = "is_blank")]
  pub carrier_id: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub source: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub source_detail: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub zip_code: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub county: Option<String>,
  /// New Business, Rewrite, Cross-Sell or Renewal
  pub sale_type: String,
  #[serde(skip_serializing_if = "is_blank")]
  pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SalesFilter {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub page: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub page_size: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub date_from: Option<NaiveDate>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub date_to: Option<NaiveDate>,
  #[serde(skip_serializing_if = "is_blank")]
  pub line_of_business: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub sale_type: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodStats {
  pub count: u64,
  pub premium: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaStatus {
  pub auto_items_this_month: u64,
  pub target: u64,
  pub remaining: u64,
  pub on_track: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesSummary {
  pub today: PeriodStats,
  pub this_week: PeriodStats,
  pub this_month: PeriodStats,
  pub ytd: PeriodStats,
  pub allstate_quota: QuotaStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendPeriod {
  Daily,
  Weekly,
  Monthly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendGrouping {
  Lob,
  Source,
  Zip,
  County,
  Carrier,
  SaleType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendQuery {
  pub period: TrendPeriod,
  pub group_by: TrendGrouping,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub date_from: Option<NaiveDate>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub date_to: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
  pub period: Option<String>,
  pub group: String,
  pub count: u64,
  pub premium: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesTrends {
  pub trends: Vec<TrendPoint>,
  pub period: String,
  pub group_by: String,
}

// ---------------------------------------------------------------------------
// Notes and communication logs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
  pub id: String,
  pub content: String,
  pub linked_entity_type: String,
  pub linked_entity_id: String,
  pub created_by: Option<String>,
  pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewNote {
  pub content: String,
  pub linked_entity_type: EntityKind,
  pub linked_entity_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommLog {
  pub id: String,
  pub direction: String,
  pub channel: String,
  pub subject: Option<String>,
  pub body_preview: Option<String>,
  pub linked_entity_type: String,
  pub linked_entity_id: String,
  pub contact_id: Option<String>,
  pub user_id: Option<String>,
  pub call_duration_seconds: Option<u32>,
  pub sent_at: Option<String>,
  pub logged_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewCommLog {
  /// Inbound or Outbound
  pub direction: String,
  /// Email, Phone, SMS, InPerson or Other
  pub channel: String,
  #[serde(skip_serializing_if = "is_blank")]
  pub subject: Option<String>,
  #[serde(skip_serializing_if = "is_blank")]
  pub body_preview: Option<String>,
  pub linked_entity_type: EntityKind,
  pub linked_entity_id: String,
  #[serde(skip_serializing_if = "is_blank")]
  pub contact_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub call_duration_seconds: Option<u32>,
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
  pub tasks_due_today: u64,
  pub tasks_overdue: u64,
  pub service_items_due_this_week: u64,
  pub service_items_overdue: u64,
  pub installments_due_this_week: u64,
  pub installments_past_due: u64,
  pub pipeline_value: Amount,
  pub pipeline_count: u64,
  pub sales_this_month: u64,
  pub sales_premium_this_month: Amount,
  pub auto_items_this_month: u64,
  #[serde(default)]
  pub recent_tasks: Vec<Task>,
  #[serde(default)]
  pub recent_service_items: Vec<ServiceItem>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_amount_accepts_strings_and_numbers() {
    let from_text: Amount = serde_json::from_value(json!("1250.00")).unwrap();
    let from_number: Amount = serde_json::from_value(json!(1250.5)).unwrap();

    assert_eq!(from_text.as_str(), "1250.00");
    assert_eq!(from_number.to_f64(), Some(1250.5));
    assert_eq!(serde_json::to_value(&from_text).unwrap(), json!("1250.00"));
  }

  #[test]
  fn test_amount_parses_user_input() {
    assert_eq!("$1,200.50".parse::<Amount>().unwrap().as_str(), "1200.50");
    assert!("twelve".parse::<Amount>().is_err());
  }

  #[test]
  fn test_optional_and_blank_fields_are_omitted() {
    let account = NewAccount {
      name: "Acme Roofing".into(),
      account_type: "Commercial".into(),
      city: Some("Tulsa".into()),
      phone: Some("   ".into()),
      email: Some(String::new()),
      ..NewAccount::default()
    };

    let body = serde_json::to_value(&account).unwrap();
    assert_eq!(
      body,
      json!({"name": "Acme Roofing", "type": "Commercial", "city": "Tulsa"})
    );
  }

  #[test]
  fn test_entity_kind_wire_format_and_key_stem() {
    assert_eq!(serde_json::to_value(EntityKind::ServiceItem).unwrap(), json!("ServiceItem"));
    assert_eq!(EntityKind::Policy.key_stem(), "policy");
    assert_eq!("service-item".parse::<EntityKind>().unwrap(), EntityKind::ServiceItem);
  }

  #[test]
  fn test_service_board_decodes_counts() {
    let board: ServiceBoard = serde_json::from_value(json!({
      "items": [],
      "total": 0,
      "counts_by_status": {"Not Started": 3, "Escalated": 1},
      "counts_by_type": {"Renewal": 4}
    }))
    .unwrap();

    assert_eq!(board.counts_by_status.get("Not Started"), Some(&3));
    assert_eq!(board.counts_by_type.get("Renewal"), Some(&4));
  }

  #[test]
  fn test_pipeline_stats_decode() {
    let stats: PipelineStats = serde_json::from_value(json!({
      "Lead": {"count": 4, "value": 8200.0},
      "Quoted": {"count": 1, "value": 950.5}
    }))
    .unwrap();

    assert_eq!(stats["Lead"].count, 4);
    assert_eq!(stats["Quoted"].value, 950.5);
  }
}
