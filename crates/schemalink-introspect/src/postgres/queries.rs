use sqlx::PgPool;

use schemalink_core::{Error, RawColumnRow, RawForeignKeyRow, RawPrimaryKeyRow, Result};

fn db_error(err: sqlx::Error) -> Error {
    Error::Db(err.to_string())
}

pub async fn list_columns(pool: &PgPool) -> Result<Vec<RawColumnRow>> {
    let rows = sqlx::query_as::<_, (String, String, String, String, bool, i32)>(
        r#"
        select
          c.table_schema::text,
          c.table_name::text,
          c.column_name::text,
          c.data_type::text,
          (c.is_nullable = 'YES'),
          c.ordinal_position::int4
        from information_schema.columns c
        join information_schema.tables t
          on t.table_schema = c.table_schema and t.table_name = c.table_name
        where t.table_type in ('BASE TABLE', 'VIEW', 'FOREIGN')
        order by c.table_schema, c.table_name, c.ordinal_position
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(db_error)?;

    Ok(rows
        .into_iter()
        .map(
            |(schema, table, column, data_type, nullable, ordinal)| RawColumnRow {
                schema: Some(schema),
                table,
                column: Some(column),
                data_type,
                nullable,
                ordinal: Some(ordinal),
            },
        )
        .collect())
}

pub async fn list_primary_keys(pool: &PgPool) -> Result<Vec<RawPrimaryKeyRow>> {
    let rows = sqlx::query_as::<_, (String, String, String, i32)>(
        r#"
        select
          tc.table_schema::text,
          tc.table_name::text,
          kcu.column_name::text,
          kcu.ordinal_position::int4
        from information_schema.table_constraints tc
        join information_schema.key_column_usage kcu
          on kcu.constraint_schema = tc.constraint_schema
         and kcu.constraint_name = tc.constraint_name
         and kcu.table_schema = tc.table_schema
         and kcu.table_name = tc.table_name
        where tc.constraint_type = 'PRIMARY KEY'
        order by tc.table_schema, tc.table_name, kcu.ordinal_position
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(db_error)?;

    Ok(rows
        .into_iter()
        .map(|(schema, table, column, position)| RawPrimaryKeyRow {
            schema: Some(schema),
            table,
            column,
            position: Some(position),
        })
        .collect())
}

pub async fn list_foreign_keys(pool: &PgPool) -> Result<Vec<RawForeignKeyRow>> {
    let rows = sqlx::query_as::<_, (String, String, String, String, String, String, String, i32)>(
        r#"
        select
          con.conname::text,
          src_nsp.nspname::text,
          src_rel.relname::text,
          src_att.attname::text,
          ref_nsp.nspname::text,
          ref_rel.relname::text,
          ref_att.attname::text,
          k.ordinality::int4
        from pg_constraint con
        join pg_class src_rel on src_rel.oid = con.conrelid
        join pg_namespace src_nsp on src_nsp.oid = src_rel.relnamespace
        join pg_class ref_rel on ref_rel.oid = con.confrelid
        join pg_namespace ref_nsp on ref_nsp.oid = ref_rel.relnamespace
        join unnest(con.conkey, con.confkey) with ordinality as k(src_attnum, ref_attnum, ordinality) on true
        join pg_attribute src_att on src_att.attrelid = src_rel.oid and src_att.attnum = k.src_attnum
        join pg_attribute ref_att on ref_att.attrelid = ref_rel.oid and ref_att.attnum = k.ref_attnum
        where con.contype = 'f'
        order by src_nsp.nspname, src_rel.relname, con.conname, k.ordinality
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(db_error)?;

    Ok(rows
        .into_iter()
        .map(
            |(name, schema, table, column, referenced_schema, referenced_table, referenced_column, position)| {
                RawForeignKeyRow {
                    constraint_name: Some(name),
                    schema: Some(schema),
                    table,
                    column: Some(column),
                    referenced_schema: Some(referenced_schema),
                    referenced_table,
                    referenced_column: Some(referenced_column),
                    position: Some(position),
                }
            },
        )
        .collect())
}

pub async fn sample_values(pool: &PgPool, sql: &str, limit: u32) -> Result<Vec<String>> {
    let values = sqlx::query_scalar::<_, Option<String>>(sql)
        .bind(i64::from(limit))
        .fetch_all(pool)
        .await
        .map_err(db_error)?;
    Ok(values.into_iter().flatten().collect())
}
