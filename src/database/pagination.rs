use serde::Serialize;

#[derive(Serialize, Debug)]
pub struct PageContext<T> {
    pub rows: Vec<T>,
    pub total_rows: i64,
    pub limit: i64,
    pub offset: i64,
    pub next_offset: Option<i64>,
    pub prev_offset: Option<i64>,
}

impl<T> PageContext<T> {
    /// `total_rows` comes from a `COUNT(*) OVER()` column of the page query.
    pub fn from_rows(rows: Vec<T>, total_rows: i64, page_size: i64, current_offset: i64) -> Self {
        if rows.is_empty() {
            return Self::no_rows(total_rows, page_size, current_offset);
        }

        let next_offset = current_offset + page_size;
        let next_offset = (next_offset < total_rows).then_some(next_offset);
        let prev_offset = (current_offset > 0).then(|| (current_offset - page_size).max(0));

        Self {
            rows,
            total_rows,
            limit: page_size,
            offset: current_offset,
            next_offset,
            prev_offset,
        }
    }

    pub fn no_rows(total_rows: i64, page_size: i64, current_offset: i64) -> Self {
        Self {
            rows: vec![],
            total_rows,
            limit: page_size,
            offset: current_offset,
            next_offset: None,
            prev_offset: (current_offset > 0).then(|| (current_offset - page_size).max(0)),
        }
    }

    pub fn map<U, F>(self, f: F) -> PageContext<U>
    where
        F: FnMut(T) -> U,
    {
        PageContext {
            rows: self.rows.into_iter().map(f).collect(),
            total_rows: self.total_rows,
            limit: self.limit,
            offset: self.offset,
            next_offset: self.next_offset,
            prev_offset: self.prev_offset,
        }
    }
}

/// Clamps a client supplied offset to a non-negative value.
pub fn sanitize_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}
