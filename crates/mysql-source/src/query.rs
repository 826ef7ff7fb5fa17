//! SQL for page reads.

use mysql_async::Value;
use mysql_types::to_mysql_value;
use sync_engine::{PageAfter, PageRequest};

/// Quote an identifier with backticks, doubling any embedded backtick.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Build the statement and positional parameters for one page.
///
/// ```text
/// SELECT `a`, `b` FROM `t`
/// WHERE `inc` IS NOT NULL AND `inc` > ? AND `inc` <= ? AND (`inc`, `k`) > (?, ?)
/// ORDER BY `inc` ASC, `k` ASC
/// LIMIT 1000
/// ```
///
/// Rows whose incremental column is NULL can never be ordered against a
/// watermark, so they are excluded.
pub fn build_page_query(request: &PageRequest) -> (String, Vec<Value>) {
    let inc = quote_identifier(&request.incremental_column);
    let select = request
        .columns
        .iter()
        .map(|c| quote_identifier(&c.name))
        .collect::<Vec<_>>()
        .join(", ");

    let mut conditions = vec![format!("{inc} IS NOT NULL")];
    let mut params = Vec::new();

    if let Some(lower) = &request.lower {
        conditions.push(format!("{inc} {} ?", lower.op.as_sql()));
        params.push(to_mysql_value(&lower.value));
    }
    if let Some(upper) = &request.upper {
        conditions.push(format!("{inc} <= ?"));
        params.push(to_mysql_value(upper));
    }

    let keyset: Vec<String> = request
        .keyset_columns()
        .into_iter()
        .map(quote_identifier)
        .collect();

    if let PageAfter::Key(values) = &request.after {
        let placeholders = vec!["?"; values.len()].join(", ");
        conditions.push(format!("({}) > ({placeholders})", keyset.join(", ")));
        params.extend(values.iter().map(to_mysql_value));
    }

    let order_by = keyset
        .iter()
        .map(|c| format!("{c} ASC"))
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!(
        "SELECT {select} FROM {} WHERE {} ORDER BY {order_by} LIMIT {}",
        quote_identifier(&request.table),
        conditions.join(" AND "),
        request.limit
    );
    if let PageAfter::Offset(offset) = request.after {
        sql.push_str(&format!(" OFFSET {offset}"));
    }

    (sql, params)
}
