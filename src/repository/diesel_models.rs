//! Diesel ORM models for database tables.
//!
//! Field order matches `schema.rs`. Timestamps are RFC 3339 text and flags
//! are 0/1 integers; conversion to domain types lives in the repositories.

use diesel::prelude::*;

use crate::schema;

/// Search configuration record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::search_configs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SearchConfigRecord {
    pub id: i32,
    pub search_value: String,
    pub ne_lat: f64,
    pub ne_long: f64,
    pub sw_lat: f64,
    pub sw_long: f64,
    pub pagination: i32,
    pub is_active: i32,
    pub description: String,
    pub created_at: String,
    pub updated_at: String,
}

/// New search configuration for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::search_configs)]
pub struct NewSearchConfig<'a> {
    pub search_value: &'a str,
    pub ne_lat: f64,
    pub ne_long: f64,
    pub sw_lat: f64,
    pub sw_long: f64,
    pub pagination: i32,
    pub is_active: i32,
    pub description: &'a str,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Property record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::properties)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PropertyRecord {
    pub id: i32,
    pub search_term: String,
    pub address: String,
    pub price: Option<String>,
    pub sold_by: Option<String>,
    pub url: Option<String>,
    pub ne_lat: Option<f64>,
    pub ne_long: Option<f64>,
    pub sw_lat: Option<f64>,
    pub sw_long: Option<f64>,
    pub attribution_agent_email: Option<String>,
    pub attribution_agent_license_number: Option<String>,
    pub attribution_agent_name: Option<String>,
    pub attribution_agent_phone_number: Option<String>,
    pub attribution_title: Option<String>,
    pub attribution_broker_name: Option<String>,
    pub attribution_broker_phone_number: Option<String>,
    pub attribution_buyer_agent_member_state_license: Option<String>,
    pub attribution_buyer_agent_name: Option<String>,
    pub attribution_buyer_brokerage_name: Option<String>,
    pub attribution_co_agent_license_number: Option<String>,
    pub attribution_co_agent_name: Option<String>,
    pub attribution_co_agent_number: Option<String>,
    pub attribution_last_checked: Option<String>,
    pub attribution_last_updated: Option<String>,
    pub attribution_listing_offices: Option<String>,
    pub attribution_listing_agents: Option<String>,
    pub attribution_mls_disclaimer: Option<String>,
    pub attribution_mls_id: Option<String>,
    pub attribution_mls_name: Option<String>,
    pub attribution_provider_logo: Option<String>,
    pub attribution_listing_agreement: Option<String>,
    pub attribution_listing_attribution_contact: Option<String>,
    pub attribution_listing_agent_attribution_contact: Option<String>,
    pub attribution_info_string3: Option<String>,
    pub attribution_info_string5: Option<String>,
    pub attribution_info_string10: Option<String>,
    pub attribution_info_string16: Option<String>,
    pub attribution_true_status: Option<String>,
    pub attribution_extra: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// New property for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::properties)]
pub struct NewProperty<'a> {
    pub search_term: &'a str,
    pub address: &'a str,
    pub price: Option<&'a str>,
    pub sold_by: Option<&'a str>,
    pub url: Option<&'a str>,
    pub ne_lat: Option<f64>,
    pub ne_long: Option<f64>,
    pub sw_lat: Option<f64>,
    pub sw_long: Option<f64>,
    pub attribution_agent_email: Option<&'a str>,
    pub attribution_agent_license_number: Option<&'a str>,
    pub attribution_agent_name: Option<&'a str>,
    pub attribution_agent_phone_number: Option<&'a str>,
    pub attribution_title: Option<&'a str>,
    pub attribution_broker_name: Option<&'a str>,
    pub attribution_broker_phone_number: Option<&'a str>,
    pub attribution_buyer_agent_member_state_license: Option<&'a str>,
    pub attribution_buyer_agent_name: Option<&'a str>,
    pub attribution_buyer_brokerage_name: Option<&'a str>,
    pub attribution_co_agent_license_number: Option<&'a str>,
    pub attribution_co_agent_name: Option<&'a str>,
    pub attribution_co_agent_number: Option<&'a str>,
    pub attribution_last_checked: Option<&'a str>,
    pub attribution_last_updated: Option<&'a str>,
    pub attribution_listing_offices: Option<&'a str>,
    pub attribution_listing_agents: Option<&'a str>,
    pub attribution_mls_disclaimer: Option<&'a str>,
    pub attribution_mls_id: Option<&'a str>,
    pub attribution_mls_name: Option<&'a str>,
    pub attribution_provider_logo: Option<&'a str>,
    pub attribution_listing_agreement: Option<&'a str>,
    pub attribution_listing_attribution_contact: Option<&'a str>,
    pub attribution_listing_agent_attribution_contact: Option<&'a str>,
    pub attribution_info_string3: Option<&'a str>,
    pub attribution_info_string5: Option<&'a str>,
    pub attribution_info_string10: Option<&'a str>,
    pub attribution_info_string16: Option<&'a str>,
    pub attribution_true_status: Option<&'a str>,
    pub attribution_extra: Option<&'a str>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Execution log record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::scraper_logs)]
#[diesel(primary_key(execution_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ExecutionLogRecord {
    pub execution_id: String,
    pub status: String,
    pub start_time: String,
    pub end_time: Option<String>,
    pub total_searches: i32,
    pub successful_searches: i32,
    pub total_properties: i32,
    pub properties_saved: i32,
    pub error_message: Option<String>,
    pub error_details: Option<String>,
    pub log_file_path: Option<String>,
    pub heartbeat_at: Option<String>,
}

/// New execution log for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::scraper_logs)]
pub struct NewExecutionLog<'a> {
    pub execution_id: &'a str,
    pub status: &'a str,
    pub start_time: &'a str,
    pub end_time: Option<&'a str>,
    pub total_searches: i32,
    pub successful_searches: i32,
    pub total_properties: i32,
    pub properties_saved: i32,
    pub error_message: Option<&'a str>,
    pub error_details: Option<&'a str>,
    pub log_file_path: Option<&'a str>,
    pub heartbeat_at: Option<&'a str>,
}

/// Scheduler configuration record (single row, id = 1).
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::scraper_config)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SchedulerConfigRecord {
    pub id: i32,
    pub is_enabled: i32,
    pub schedule_interval_minutes: i32,
    pub last_scheduled_run: Option<String>,
    pub next_scheduled_run: Option<String>,
    pub max_concurrent_workers: i32,
    pub timeout_minutes: i32,
    pub retry_attempts: i32,
    pub updated_at: String,
}

/// Scheduler configuration row for insert-or-replace.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::scraper_config)]
pub struct NewSchedulerConfig<'a> {
    pub id: i32,
    pub is_enabled: i32,
    pub schedule_interval_minutes: i32,
    pub last_scheduled_run: Option<&'a str>,
    pub next_scheduled_run: Option<&'a str>,
    pub max_concurrent_workers: i32,
    pub timeout_minutes: i32,
    pub retry_attempts: i32,
    pub updated_at: &'a str,
}

/// Message template record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::message_templates)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MessageTemplateRecord {
    pub id: i32,
    pub name: String,
    pub body: String,
    pub is_default: i32,
    pub is_active: i32,
    pub created_at: String,
    pub updated_at: String,
}

/// New message template for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::message_templates)]
pub struct NewMessageTemplate<'a> {
    pub name: &'a str,
    pub body: &'a str,
    pub is_default: i32,
    pub is_active: i32,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}
