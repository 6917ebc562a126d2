use chrono::{DateTime, Utc};
use diesel::prelude::*;
use tinylink_rs::LinkResponse;

#[derive(Insertable, Clone, Debug)]
#[diesel(table_name = crate::schema::links)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewLink {
    pub code: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Clone, PartialEq, Eq, Debug)]
#[diesel(table_name = crate::schema::links)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Link {
    pub code: String,
    pub url: String,
    pub clicks: i64,
    pub last_clicked: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<NewLink> for Link {
    fn from(link: NewLink) -> Self {
        Self {
            code: link.code,
            url: link.url,
            clicks: 0,
            last_clicked: None,
            created_at: link.created_at,
        }
    }
}

impl From<Link> for LinkResponse {
    fn from(link: Link) -> Self {
        Self {
            code: link.code,
            url: link.url,
            // the column carries a `clicks >= 0` check
            clicks: u64::try_from(link.clicks).unwrap_or_default(),
            last_clicked: link.last_clicked,
            created_at: link.created_at,
        }
    }
}
