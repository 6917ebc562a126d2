use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    db::LinksDB,
    db_pool::DbPool,
    models::{Link, NewLink},
    schema,
};

#[derive(Clone)]
pub struct PostgresDb {
    db: DbPool,
}

impl PostgresDb {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LinksDB for PostgresDb {
    async fn list(&self) -> Result<Vec<Link>, super::DbError> {
        use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
        use diesel_async::RunQueryDsl;

        Ok(schema::links::table
            .order((schema::links::created_at.desc(), schema::links::code.asc()))
            .select(Link::as_select())
            .load(&mut self.db.0.get().await?)
            .await?)
    }

    async fn get(&self, code: &str) -> Result<Option<Link>, super::DbError> {
        use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
        use diesel_async::RunQueryDsl;

        Ok(schema::links::table
            .filter(schema::links::code.eq(code))
            .select(Link::as_select())
            .first(&mut self.db.0.get().await?)
            .await
            .optional()?)
    }

    async fn create(&self, link: &NewLink) -> Result<Link, super::DbError> {
        use diesel::SelectableHelper;
        use diesel_async::RunQueryDsl;

        // the primary key on `code` closes the exists-then-insert race
        Ok(diesel::insert_into(schema::links::table)
            .values(link)
            .returning(Link::as_returning())
            .get_result(&mut self.db.0.get().await?)
            .await?)
    }

    async fn increment_click(&self, code: &str, at: DateTime<Utc>) -> Result<bool, super::DbError> {
        use diesel::{ExpressionMethods, QueryDsl};
        use diesel_async::RunQueryDsl;

        let affected = diesel::update(schema::links::table.filter(schema::links::code.eq(code)))
            .set((
                schema::links::clicks.eq(schema::links::clicks + 1_i64),
                schema::links::last_clicked.eq(Some(at)),
            ))
            .execute(&mut self.db.0.get().await?)
            .await?;

        Ok(affected > 0)
    }

    async fn delete(&self, code: &str) -> Result<bool, super::DbError> {
        use diesel::{ExpressionMethods, QueryDsl};
        use diesel_async::RunQueryDsl;

        let affected = diesel::delete(schema::links::table.filter(schema::links::code.eq(code)))
            .execute(&mut self.db.0.get().await?)
            .await?;

        Ok(affected > 0)
    }

    async fn exists(&self, code: &str) -> Result<bool, super::DbError> {
        use diesel::{ExpressionMethods, QueryDsl, dsl};
        use diesel_async::RunQueryDsl;

        Ok(diesel::select(dsl::exists(
            schema::links::table.filter(schema::links::code.eq(code)),
        ))
        .get_result::<bool>(&mut self.db.0.get().await?)
        .await?)
    }
}
