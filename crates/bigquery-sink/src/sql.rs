//! GoogleSQL statement builders.
//!
//! Every statement the sink sends is built here, as plain text, so the
//! exact SQL can be tested without a BigQuery project.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use sync_core::{UniversalRow, UniversalValue, WarehouseColumn, WarehouseType};

/// Staging tables outlive a crashed run by at most this long.
pub const STAGING_EXPIRATION_HOURS: u32 = 24;

/// Quote an identifier with backticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
}

/// Quote a string literal.
pub fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn float_literal(f: f64) -> String {
    if f.is_nan() {
        "CAST('NaN' AS FLOAT64)".to_string()
    } else if f.is_infinite() {
        let sign = if f > 0.0 { "" } else { "-" };
        format!("CAST('{sign}inf' AS FLOAT64)")
    } else {
        // Exponent form is always a FLOAT64 literal, never an INT64 one.
        format!("{f:e}")
    }
}

/// Render a value as a literal for a column of type `target`.
pub fn render_literal(value: &UniversalValue, target: WarehouseType) -> String {
    use UniversalValue as V;

    match value {
        V::Null => "NULL".to_string(),
        V::Bool(true) => "TRUE".to_string(),
        V::Bool(false) => "FALSE".to_string(),
        V::Int32(i) => i.to_string(),
        V::Int64(i) => i.to_string(),
        V::Float32(f) => float_literal(f64::from(*f)),
        V::Float64(f) => float_literal(*f),
        V::Decimal(s) => match target {
            WarehouseType::BigNumeric => format!("BIGNUMERIC {}", quote_string(s)),
            _ => format!("NUMERIC {}", quote_string(s)),
        },
        V::Text(s) => match target {
            WarehouseType::Json => format!("JSON {}", quote_string(s)),
            _ => quote_string(s),
        },
        V::Bytes(b) => format!("FROM_BASE64('{}')", STANDARD.encode(b)),
        V::Date(d) => format!("DATE '{}'", d.format("%Y-%m-%d")),
        V::Time(t) => format!("TIME '{}'", t.format("%H:%M:%S%.6f")),
        V::LocalDateTime(dt) => format!("DATETIME '{}'", dt.format("%Y-%m-%d %H:%M:%S%.6f")),
        V::ZonedDateTime(dt) => {
            format!("TIMESTAMP '{} UTC'", dt.format("%Y-%m-%d %H:%M:%S%.6f"))
        }
        V::Uuid(u) => quote_string(&u.to_string()),
        V::Json(j) => match target {
            WarehouseType::Json => format!("JSON {}", quote_string(&j.to_string())),
            _ => quote_string(&j.to_string()),
        },
    }
}

fn column_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn column_ddl(column: &WarehouseColumn, keep_not_null: bool) -> String {
    let not_null = if keep_not_null && !column.nullable {
        " NOT NULL"
    } else {
        ""
    };
    format!(
        "{} {}{not_null}",
        quote_identifier(&column.name),
        column.data_type.as_sql()
    )
}

/// A dataset in a project; tables are addressed relative to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    pub project_id: String,
    pub dataset_id: String,
}

impl Dataset {
    pub fn new(project_id: impl Into<String>, dataset_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            dataset_id: dataset_id.into(),
        }
    }

    pub fn path(&self) -> String {
        format!(
            "{}.{}",
            quote_identifier(&self.project_id),
            quote_identifier(&self.dataset_id)
        )
    }

    pub fn table_path(&self, table: &str) -> String {
        format!("{}.{}", self.path(), quote_identifier(table))
    }

    pub fn create_schema(&self, location: Option<&str>) -> String {
        match location {
            Some(location) => format!(
                "CREATE SCHEMA IF NOT EXISTS {} OPTIONS (location = {})",
                self.path(),
                quote_string(location)
            ),
            None => format!("CREATE SCHEMA IF NOT EXISTS {}", self.path()),
        }
    }

    /// Yields `column_name, data_type, is_nullable`; no rows if the table
    /// does not exist.
    pub fn columns_query(&self, table: &str) -> String {
        format!(
            "SELECT column_name, data_type, is_nullable \
             FROM {}.INFORMATION_SCHEMA.COLUMNS \
             WHERE table_name = {} ORDER BY ordinal_position",
            self.path(),
            quote_string(table)
        )
    }

    pub fn create_table(&self, table: &str, columns: &[WarehouseColumn]) -> String {
        let defs = columns
            .iter()
            .map(|c| column_ddl(c, true))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({defs})",
            self.table_path(table)
        )
    }

    /// Staging columns are all nullable and the table expires on its own.
    pub fn create_staging(&self, table: &str, columns: &[WarehouseColumn]) -> String {
        let defs = columns
            .iter()
            .map(|c| column_ddl(c, false))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "CREATE OR REPLACE TABLE {} ({defs}) OPTIONS (expiration_timestamp = \
             TIMESTAMP_ADD(CURRENT_TIMESTAMP(), INTERVAL {STAGING_EXPIRATION_HOURS} HOUR))",
            self.table_path(table)
        )
    }

    pub fn add_columns(&self, table: &str, columns: &[WarehouseColumn]) -> String {
        let adds = columns
            .iter()
            .map(|c| format!("ADD COLUMN IF NOT EXISTS {}", column_ddl(c, false)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("ALTER TABLE {} {adds}", self.table_path(table))
    }

    /// One multi-row `INSERT ... VALUES`. Missing columns are NULL.
    pub fn insert_values(
        &self,
        table: &str,
        columns: &[WarehouseColumn],
        rows: &[UniversalRow],
    ) -> String {
        let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
        let tuples = rows
            .iter()
            .map(|row| {
                let literals = columns
                    .iter()
                    .map(|c| match row.get(&c.name) {
                        Some(value) => render_literal(value, c.data_type),
                        None => "NULL".to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("({literals})")
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES {tuples}",
            self.table_path(table),
            column_list(&names)
        )
    }

    pub fn insert_select(&self, staging: &str, target: &str, columns: &[String]) -> String {
        let cols = column_list(columns);
        format!(
            "INSERT INTO {} ({cols}) SELECT {cols} FROM {}",
            self.table_path(target),
            self.table_path(staging)
        )
    }

    /// `MERGE` on `keys`.
    ///
    /// Key equality is plain `=`, so a NULL key never matches and its row is
    /// inserted. Staging rows that repeat a non-NULL key collapse to one;
    /// rows with a NULL key are all kept.
    pub fn merge(&self, staging: &str, target: &str, keys: &[String], columns: &[String]) -> String {
        let partition = column_list(keys);
        let null_keys = keys
            .iter()
            .map(|k| format!(" OR {} IS NULL", quote_identifier(k)))
            .collect::<String>();
        let on = keys
            .iter()
            .map(|k| {
                let k = quote_identifier(k);
                format!("T.{k} = S.{k}")
            })
            .collect::<Vec<_>>()
            .join(" AND ");
        let updates: Vec<String> = columns
            .iter()
            .filter(|c| !keys.contains(c))
            .map(|c| {
                let c = quote_identifier(c);
                format!("{c} = S.{c}")
            })
            .collect();
        let insert_values = columns
            .iter()
            .map(|c| format!("S.{}", quote_identifier(c)))
            .collect::<Vec<_>>()
            .join(", ");

        let mut sql = format!(
            "MERGE {} T USING (SELECT * FROM {} WHERE TRUE \
             QUALIFY ROW_NUMBER() OVER (PARTITION BY {partition}) = 1{null_keys}) S ON {on}",
            self.table_path(target),
            self.table_path(staging)
        );
        if !updates.is_empty() {
            sql.push_str(&format!(
                " WHEN MATCHED THEN UPDATE SET {}",
                updates.join(", ")
            ));
        }
        sql.push_str(&format!(
            " WHEN NOT MATCHED THEN INSERT ({}) VALUES ({insert_values})",
            column_list(columns)
        ));
        sql
    }

    pub fn drop_table(&self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", self.table_path(table))
    }
}
