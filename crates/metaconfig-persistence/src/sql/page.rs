//! Name listing and paging

use sea_orm::{
    ConnectionTrait,
    sea_query::{Asterisk, Cond, Expr, JoinType, LikeExpr, Order, Query, SelectStatement},
};

use metaconfig_api::{PageRequest, PageResponse};
use metaconfig_common::Result;

use super::column::*;
use super::{ident, query_all, query_one};
use crate::mapping::TableMapping;

const C: &str = "C";
const CA: &str = "CA";
const LIKE_ESCAPE: char = '\\';

pub(crate) async fn find_names<Db: ConnectionTrait>(
    conn: &Db,
    mapping: &TableMapping,
) -> Result<Vec<String>> {
    let stmt = Query::select()
        .distinct()
        .column(ident(NAME))
        .from(ident(&mapping.configs))
        .order_by(ident(NAME), Order::Asc)
        .to_owned();

    query_all(conn, &stmt)
        .await?
        .iter()
        .map(|row| Ok(row.try_get::<String>("", NAME)?))
        .collect()
}

pub(crate) async fn find_page<Db: ConnectionTrait>(
    conn: &Db,
    mapping: &TableMapping,
    request: &PageRequest,
) -> Result<PageResponse> {
    let matching = matching_names(mapping, request);

    let count = Query::select()
        .expr_as(Expr::col(Asterisk).count(), ident("total"))
        .from_subquery(matching.clone(), ident("N"))
        .to_owned();
    let total = match query_one(conn, &count).await? {
        Some(row) => row.try_get::<i64>("", "total")?,
        None => 0,
    };
    if total == 0 {
        return Ok(PageResponse::empty(request.page));
    }

    let order = if request.ascending {
        Order::Asc
    } else {
        Order::Desc
    };
    let mut page = matching;
    page.order_by((ident(C), ident(NAME)), order)
        .limit(u64::from(request.size))
        .offset(request.offset());

    let names = query_all(conn, &page)
        .await?
        .iter()
        .map(|row| Ok(row.try_get::<String>("", NAME)?))
        .collect::<Result<Vec<_>>>()?;

    Ok(PageResponse::new(names, request.page, total as u64))
}

/// `SELECT DISTINCT C.NAME` of every config passing the filters.
///
/// The attribute join is a left join so that configs without attributes
/// still match when no attribute filter is given.
fn matching_names(mapping: &TableMapping, request: &PageRequest) -> SelectStatement {
    let col = |table: &str, column: &str| Expr::col((ident(table), ident(column)));

    let mut attributes = Cond::any();
    let mut filters = request.attributes.iter().collect::<Vec<_>>();
    filters.sort_unstable();
    for (key, value) in filters {
        attributes = attributes.add(
            Cond::all()
                .add(col(CA, KEY).like(contains(key)))
                .add(col(CA, VALUE).like(contains(value))),
        );
    }

    let mut condition = Cond::all().add(col(C, NAME).like(contains(&request.name)));
    if !request.attributes.is_empty() {
        condition = condition.add(attributes);
    }

    Query::select()
        .distinct()
        .expr_as(col(C, NAME), ident(NAME))
        .from_as(ident(&mapping.configs), ident(C))
        .join_as(
            JoinType::LeftJoin,
            ident(&mapping.config_attributes),
            ident(CA),
            col(C, ID).equals((ident(CA), ident(CONFIG_ID))),
        )
        .cond_where(condition)
        .to_owned()
}

/// `%text%` with the LIKE wildcards of `text` escaped.
fn contains(text: &str) -> LikeExpr {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');

    LikeExpr::new(pattern).escape(LIKE_ESCAPE)
}

#[cfg(test)]
mod tests {
    use sea_orm::sea_query::{QueryStatementWriter, SqliteQueryBuilder, Value};

    use super::*;

    #[test]
    fn test_matching_names_without_attribute_filters() {
        let sql = matching_names(&TableMapping::default(), &PageRequest::new("app"))
            .to_string(SqliteQueryBuilder);

        assert!(sql.starts_with("SELECT DISTINCT"));
        assert!(sql.contains("LEFT JOIN \"CONFIG_ATTRIBUTES\" AS \"CA\""));
        assert!(sql.contains("LIKE '%app%'"));
        assert!(!sql.contains("\"CA\".\"KEY\" LIKE"));
    }

    #[test]
    fn test_matching_names_ors_attribute_filters() {
        let request = PageRequest::new("")
            .with_attribute("env", "dev")
            .with_attribute("team", "core");
        let sql = matching_names(&TableMapping::default(), &request).to_string(SqliteQueryBuilder);

        assert!(sql.contains("\"CA\".\"KEY\" LIKE '%env%'"));
        assert!(sql.contains("\"CA\".\"VALUE\" LIKE '%core%'"));
        assert!(sql.contains(" OR "));
    }

    #[test]
    fn test_contains_escapes_wildcards() {
        let (sql, values) = Query::select()
            .column(ident(NAME))
            .from(ident("T"))
            .and_where(Expr::col(ident(NAME)).like(contains("50%_off")))
            .build(SqliteQueryBuilder);

        assert!(sql.contains("ESCAPE"));
        assert_eq!(values.0, vec![Value::from("%50\\%\\_off%")]);
    }
}
