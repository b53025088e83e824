#![forbid(unsafe_code)]

use super::super::*;
use rusqlite::params_from_iter;
use rusqlite::types::Value as SqlValue;
use tg_core::DataPath;

impl SqliteStore {
    pub fn get_row(
        &self,
        revision_id: &str,
        table_id: &str,
        row_id: &str,
    ) -> Result<RowRecord, StoreError> {
        require_revision_tx(&self.conn, revision_id)?;
        let table = require_table_tx(&self.conn, revision_id, table_id)?;
        require_row_tx(&self.conn, &table, row_id)
    }

    pub fn find_row(
        &self,
        revision_id: &str,
        table_id: &str,
        row_id: &str,
    ) -> Result<Option<RowRecord>, StoreError> {
        require_revision_tx(&self.conn, revision_id)?;
        let table = require_table_tx(&self.conn, revision_id, table_id)?;
        find_row_tx(&self.conn, &table.version_id, row_id)
    }

    /// One page of a table's rows. `after` is the cursor returned with the
    /// previous page.
    pub fn get_rows(&self, request: &GetRowsRequest) -> Result<RowsPage, StoreError> {
        require_revision_tx(&self.conn, &request.revision_id)?;
        let table = require_table_tx(&self.conn, &request.revision_id, &request.table_id)?;
        let limit = self.config.page_size(request.first);
        let offset = match request.after.as_deref() {
            Some(cursor) => parse_cursor(cursor)?,
            None => 0,
        };

        let mut args = vec![SqlValue::Text(table.version_id.clone())];
        let mut filters = String::new();
        for filter in &request.filters {
            filters.push_str(" AND ");
            filters.push_str(&filter_clause(filter, &mut args)?);
        }

        let total_count = self.conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM table_rows tr \
                 JOIN rows r ON r.version_id = tr.row_version_id \
                 WHERE tr.table_version_id=?{filters}"
            ),
            params_from_iter(args.iter()),
            |row| row.get::<_, i64>(0),
        )?;
        let total_count = usize::try_from(total_count)
            .map_err(|_| StoreError::Corrupt("negative row count".to_string()))?;

        let mut order = String::new();
        for item in &request.order_by {
            order.push_str(&order_clause(item, &mut args)?);
            order.push_str(", ");
        }
        order.push_str("r.created_at_ms ASC, r.id ASC");
        args.push(SqlValue::Integer(to_sqlite_i64(limit)?));
        args.push(SqlValue::Integer(to_sqlite_i64(offset)?));

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ROW_COLUMNS} FROM table_rows tr \
             JOIN rows r ON r.version_id = tr.row_version_id \
             WHERE tr.table_version_id=?{filters} \
             ORDER BY {order} LIMIT ? OFFSET ?"
        ))?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), row_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let next_offset = offset + rows.len();
        let has_more = next_offset < total_count;
        Ok(RowsPage {
            rows,
            total_count,
            next_cursor: has_more.then(|| next_offset.to_string()),
            has_more,
        })
    }
}

fn parse_cursor(cursor: &str) -> Result<usize, StoreError> {
    cursor
        .parse::<usize>()
        .map_err(|_| StoreError::InvalidInput("invalid cursor"))
}

fn sqlite_json_path(path: &str) -> Result<String, StoreError> {
    let path = DataPath::parse(path)
        .map_err(|_| StoreError::InvalidInput("invalid data path"))?;
    path.to_sqlite_json_path()
        .ok_or(StoreError::InvalidInput("data paths must not contain wildcards"))
}

fn filter_clause(filter: &RowFilter, args: &mut Vec<SqlValue>) -> Result<String, StoreError> {
    let json_path = SqlValue::Text(sqlite_json_path(&filter.path)?);
    let operator = match filter.op {
        FilterOp::Eq => "=",
        FilterOp::Ne => "IS NOT",
        FilterOp::Gt => ">",
        FilterOp::Gte => ">=",
        FilterOp::Lt => "<",
        FilterOp::Lte => "<=",
        FilterOp::Contains => {
            let Some(needle) = filter.value.as_str() else {
                return Err(StoreError::InvalidInput("contains filters take a string"));
            };
            args.push(json_path);
            args.push(SqlValue::Text(needle.to_string()));
            return Ok("instr(json_extract(r.data, ?), ?) > 0".to_string());
        }
    };
    args.push(json_path);
    args.push(json_to_sql(&filter.value));
    Ok(format!("json_extract(r.data, ?) {operator} ?"))
}

fn order_clause(order: &RowOrder, args: &mut Vec<SqlValue>) -> Result<String, StoreError> {
    let direction = match order.direction {
        SortDirection::Asc => "ASC",
        SortDirection::Desc => "DESC",
    };
    let column = match &order.field {
        OrderField::Id => "r.id".to_string(),
        OrderField::CreatedAt => "r.created_at_ms".to_string(),
        OrderField::UpdatedAt => "r.updated_at_ms".to_string(),
        OrderField::Data(path) => {
            args.push(SqlValue::Text(sqlite_json_path(path)?));
            "json_extract(r.data, ?)".to_string()
        }
    };
    Ok(format!("{column} {direction}"))
}
