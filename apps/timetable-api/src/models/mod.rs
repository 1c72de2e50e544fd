pub mod group;
pub mod professor;
pub mod room;
pub mod schedule;
pub mod subject;
pub mod user;

/// Maps a fieldless enum onto a Postgres `TEXT` column through its
/// `as_str()` / `FromStr` pair.
macro_rules! text_sql_enum {
    ($ty:ty) => {
        impl diesel::serialize::ToSql<diesel::sql_types::Text, diesel::pg::Pg> for $ty {
            fn to_sql<'b>(
                &'b self,
                out: &mut diesel::serialize::Output<'b, '_, diesel::pg::Pg>,
            ) -> diesel::serialize::Result {
                use std::io::Write;
                out.write_all(self.as_str().as_bytes())?;
                Ok(diesel::serialize::IsNull::No)
            }
        }

        impl diesel::deserialize::FromSql<diesel::sql_types::Text, diesel::pg::Pg> for $ty {
            fn from_sql(bytes: diesel::pg::PgValue<'_>) -> diesel::deserialize::Result<Self> {
                let raw = std::str::from_utf8(bytes.as_bytes())?;
                raw.parse().map_err(|e: String| e.into())
            }
        }
    };
}

pub(crate) use text_sql_enum;
