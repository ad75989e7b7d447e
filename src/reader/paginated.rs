//! Paginated-rows reader.
//!
//! Rows are pulled from the results API one page at a time and decoded by
//! their declared column type. Column descriptors come from the first page.
//! Row-returning queries repeat the column labels as the first row of the
//! first page; that row is dropped by statement classification, not by
//! comparing its cells.

use std::collections::VecDeque;

use tracing::debug;

use crate::classify::StatementKind;
use crate::convert::{decode_cell, Row};
use crate::error::{AthenaError, Result};
use crate::query::{ExecutionClient, ExecutionHandle};
use crate::result::ColumnDescriptor;
use crate::service::ResultPage;

/// Reads results through the paginated results API.
#[derive(Debug, Clone)]
pub struct PaginatedReader {
    client: ExecutionClient,
}

impl PaginatedReader {
    pub fn new(client: ExecutionClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ExecutionClient {
        &self.client
    }

    /// Submits `query` and opens a stream over its rows.
    pub async fn execute(&self, query: &str, reuse: bool) -> Result<RowStream> {
        let handle = self.client.submit(query, reuse).await?;
        RowStream::open(self.client.clone(), handle).await
    }
}

/// A forward-only stream of decoded rows.
///
/// The first page is read when the stream is opened; later pages are read
/// when the buffered rows run out. Once exhausted, `next_row` keeps
/// returning `None`.
#[derive(Debug)]
pub struct RowStream {
    client: ExecutionClient,
    handle: ExecutionHandle,
    descriptors: Vec<ColumnDescriptor>,
    buffer: VecDeque<Row>,
    next_token: Option<String>,
    update_count: Option<i64>,
    pages: usize,
}

impl RowStream {
    /// Reads the first page of a finished execution.
    pub async fn open(client: ExecutionClient, handle: ExecutionHandle) -> Result<Self> {
        let page = client.get_results(&handle.execution_id, None).await?;
        let descriptors: Vec<ColumnDescriptor> =
            page.columns.iter().map(ColumnDescriptor::from_service).collect();

        let mut stream = Self {
            client,
            handle,
            descriptors,
            buffer: VecDeque::new(),
            next_token: None,
            update_count: page.update_count,
            pages: 0,
        };
        stream.load(page, true)?;
        Ok(stream)
    }

    pub fn handle(&self) -> &ExecutionHandle {
        &self.handle
    }

    pub fn descriptors(&self) -> &[ColumnDescriptor] {
        &self.descriptors
    }

    pub fn column_names(&self) -> Vec<String> {
        self.descriptors.iter().map(|d| d.name.clone()).collect()
    }

    /// Rows affected, when the service reported a count.
    pub fn update_count(&self) -> Option<i64> {
        self.update_count
    }

    /// Returns the next row, or `None` once every page has been consumed.
    pub async fn next_row(&mut self) -> Result<Option<Row>> {
        loop {
            if let Some(row) = self.buffer.pop_front() {
                return Ok(Some(row));
            }
            let Some(token) = self.next_token.take() else {
                return Ok(None);
            };
            let page = self
                .client
                .get_results(&self.handle.execution_id, Some(&token))
                .await?;
            self.load(page, false)?;
        }
    }

    /// Returns up to `size` rows; fewer only when the stream is exhausted.
    pub async fn next_rows(&mut self, size: usize) -> Result<Vec<Row>> {
        let mut rows = Vec::with_capacity(size.min(self.buffer.len().max(1)));
        while rows.len() < size {
            match self.next_row().await? {
                Some(row) => rows.push(row),
                None => break,
            }
        }
        Ok(rows)
    }

    /// Drains the rest of the stream.
    pub async fn remaining(&mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_row().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    fn load(&mut self, page: ResultPage, first: bool) -> Result<()> {
        self.pages += 1;
        self.next_token = page.next_token;

        let mut rows = page.rows.into_iter();
        if first && carries_header_row(&self.handle) {
            rows.next();
        }

        for cells in rows {
            self.buffer.push_back(self.decode_row(&cells)?);
        }

        debug!(
            execution_id = %self.handle.execution_id,
            page = self.pages,
            buffered = self.buffer.len(),
            more = self.next_token.is_some(),
            "Loaded results page"
        );
        Ok(())
    }

    fn decode_row(&self, cells: &[Option<String>]) -> Result<Row> {
        if cells.len() != self.descriptors.len() {
            return Err(AthenaError::format(format!(
                "Execution {} returned a row with {} cells for {} columns",
                self.handle.execution_id,
                cells.len(),
                self.descriptors.len()
            )));
        }
        self.descriptors
            .iter()
            .zip(cells)
            .map(|(column, cell)| decode_cell(&column.name, &column.type_name, cell.as_deref()))
            .collect()
    }
}

/// Returns true if the first row of the first page is the column labels.
///
/// SELECT and WITH queries always carry it, as does any other statement the
/// service reports as non-mutating DML. DDL and utility results do not.
fn carries_header_row(handle: &ExecutionHandle) -> bool {
    match handle.kind {
        StatementKind::Select | StatementKind::With => true,
        _ if handle.is_mutating() => false,
        _ => handle
            .statement_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case("DML")),
    }
}
