//! Diesel-based message template repository.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};

use super::diesel_models::{MessageTemplateRecord, NewMessageTemplate};
use super::parse_datetime;
use super::pool::{DbPool, DieselError};
use super::util::flag;
use crate::models::MessageTemplate;
use crate::schema::message_templates;
use crate::with_conn;

impl From<MessageTemplateRecord> for MessageTemplate {
    fn from(record: MessageTemplateRecord) -> Self {
        MessageTemplate {
            id: record.id,
            name: record.name,
            body: record.body,
            is_default: record.is_default != 0,
            is_active: record.is_active != 0,
            created_at: parse_datetime(&record.created_at),
            updated_at: parse_datetime(&record.updated_at),
        }
    }
}

#[derive(Clone)]
pub struct DieselMessageTemplateRepository {
    pool: DbPool,
}

impl DieselMessageTemplateRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// All templates, by name.
    pub async fn list(&self) -> Result<Vec<MessageTemplate>, DieselError> {
        with_conn!(self.pool, conn => {
            message_templates::table
                .order(message_templates::name.asc())
                .select(MessageTemplateRecord::as_select())
                .load::<MessageTemplateRecord>(&mut conn)
                .await
                .map(|records| records.into_iter().map(MessageTemplate::from).collect())
        })
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<MessageTemplate>, DieselError> {
        with_conn!(self.pool, conn => {
            message_templates::table
                .filter(message_templates::name.eq(name))
                .select(MessageTemplateRecord::as_select())
                .first::<MessageTemplateRecord>(&mut conn)
                .await
                .optional()
                .map(|opt| opt.map(MessageTemplate::from))
        })
    }

    /// The active default template, if one is set.
    pub async fn get_default(&self) -> Result<Option<MessageTemplate>, DieselError> {
        with_conn!(self.pool, conn => {
            message_templates::table
                .filter(message_templates::is_default.eq(1))
                .filter(message_templates::is_active.eq(1))
                .select(MessageTemplateRecord::as_select())
                .first::<MessageTemplateRecord>(&mut conn)
                .await
                .optional()
                .map(|opt| opt.map(MessageTemplate::from))
        })
    }

    /// Insert or update by name. The default flag is managed by `set_default`.
    pub async fn upsert(&self, name: &str, body: &str) -> Result<MessageTemplate, DieselError> {
        let now = Utc::now().to_rfc3339();

        with_conn!(self.pool, conn => {
            diesel::insert_into(message_templates::table)
                .values(&NewMessageTemplate {
                    name,
                    body,
                    is_default: 0,
                    is_active: 1,
                    created_at: &now,
                    updated_at: &now,
                })
                .on_conflict(message_templates::name)
                .do_update()
                .set((
                    message_templates::body.eq(body),
                    message_templates::updated_at.eq(&now),
                ))
                .execute(&mut conn)
                .await?;

            message_templates::table
                .filter(message_templates::name.eq(name))
                .select(MessageTemplateRecord::as_select())
                .first::<MessageTemplateRecord>(&mut conn)
                .await
                .map(MessageTemplate::from)
        })
    }

    /// Make `name` the only default template. Returns false when it doesn't exist.
    pub async fn set_default(&self, name: &str) -> Result<bool, DieselError> {
        let now = Utc::now().to_rfc3339();
        let mut conn = self.pool.get().await?;

        conn.transaction(|conn| {
            Box::pin(async move {
                let exists: i64 = message_templates::table
                    .filter(message_templates::name.eq(name))
                    .count()
                    .get_result(conn)
                    .await?;
                if exists == 0 {
                    return Ok(false);
                }

                diesel::update(message_templates::table.filter(message_templates::is_default.eq(1)))
                    .set(message_templates::is_default.eq(0))
                    .execute(conn)
                    .await?;
                diesel::update(message_templates::table.filter(message_templates::name.eq(name)))
                    .set((
                        message_templates::is_default.eq(1),
                        message_templates::is_active.eq(1),
                        message_templates::updated_at.eq(&now),
                    ))
                    .execute(conn)
                    .await?;
                Ok(true)
            })
        })
        .await
    }

    pub async fn set_active(&self, name: &str, active: bool) -> Result<bool, DieselError> {
        let now = Utc::now().to_rfc3339();
        with_conn!(self.pool, conn => {
            let rows = diesel::update(message_templates::table.filter(message_templates::name.eq(name)))
                .set((
                    message_templates::is_active.eq(flag(active)),
                    message_templates::updated_at.eq(&now),
                ))
                .execute(&mut conn)
                .await?;
            Ok(rows > 0)
        })
    }

    pub async fn delete(&self, name: &str) -> Result<bool, DieselError> {
        with_conn!(self.pool, conn => {
            let rows = diesel::delete(message_templates::table.filter(message_templates::name.eq(name)))
                .execute(&mut conn)
                .await?;
            Ok(rows > 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::setup_test_db;

    #[tokio::test]
    async fn test_single_default() {
        let (ctx, _dir) = setup_test_db().await;
        let repo = ctx.message_templates();

        repo.upsert("intro", "Hi {agent_name}").await.unwrap();
        repo.upsert("followup", "Following up on {property_address}").await.unwrap();
        assert!(repo.get_default().await.unwrap().is_none());

        assert!(repo.set_default("intro").await.unwrap());
        assert!(repo.set_default("followup").await.unwrap());
        assert!(!repo.set_default("missing").await.unwrap());

        let defaults: Vec<_> = repo
            .list()
            .await
            .unwrap()
            .into_iter()
            .filter(|t| t.is_default)
            .collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].name, "followup");
    }

    #[tokio::test]
    async fn test_upsert_keeps_default_flag() {
        let (ctx, _dir) = setup_test_db().await;
        let repo = ctx.message_templates();

        repo.upsert("intro", "v1").await.unwrap();
        repo.set_default("intro").await.unwrap();
        let updated = repo.upsert("intro", "v2").await.unwrap();
        assert_eq!(updated.body, "v2");
        assert!(updated.is_default);

        assert!(repo.set_active("intro", false).await.unwrap());
        assert!(repo.get_default().await.unwrap().is_none());
        assert!(repo.delete("intro").await.unwrap());
        assert!(repo.get_by_name("intro").await.unwrap().is_none());
    }
}
