//! Offset pagination over a host's connection listing.
//!
//! Pages are requested at strictly increasing offsets until a page comes back
//! without any connection. A failed fetch is yielded once and ends the
//! iteration.

use crate::error::StoreError;
use crate::features::{flatten_page, ConnectionRow};
use crate::graph::{Direction, GraphClient, HostEntry};
use crate::query::builder::{connection_listing, listing_query_name};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    Fetching { offset: u64 },
    Done,
}

/// One valid page of a listing.
#[derive(Debug, Clone)]
pub struct Page {
    pub offset: u64,
    pub entries: Vec<HostEntry>,
}

impl Page {
    /// A page is valid when at least one entry carries a connection.
    pub fn is_valid(entries: &[HostEntry]) -> bool {
        entries.iter().any(|e| !e.connections.is_empty())
    }

    pub fn connection_count(&self) -> usize {
        self.entries.iter().map(|e| e.connections.len()).sum()
    }

    pub fn into_rows(self, ip: &str, direction: Direction) -> Vec<ConnectionRow> {
        flatten_page(self.entries, ip, direction)
    }
}

pub struct Paginator<'a, C: GraphClient + ?Sized> {
    client: &'a C,
    direction: Direction,
    ip: String,
    page_size: u64,
    state: PageState,
}

impl<'a, C: GraphClient + ?Sized> Paginator<'a, C> {
    pub fn new(client: &'a C, direction: Direction, ip: impl Into<String>, page_size: u64) -> Self {
        Self {
            client,
            direction,
            ip: ip.into(),
            page_size: page_size.max(1),
            state: PageState::Fetching { offset: 0 },
        }
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    fn fetch(&self, offset: u64) -> Result<Vec<HostEntry>, StoreError> {
        let request = connection_listing(self.direction, &self.ip, offset, self.page_size);
        let mut data = self.client.query(&request.text, &request.variables)?;
        let entries = match data.get_mut(listing_query_name(self.direction)) {
            Some(v) => serde_json::from_value(v.take())?,
            None => Vec::new(),
        };
        Ok(entries)
    }
}

impl<C: GraphClient + ?Sized> Iterator for Paginator<'_, C> {
    type Item = Result<Page, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let PageState::Fetching { offset } = self.state else {
            return None;
        };
        match self.fetch(offset) {
            Ok(entries) if Page::is_valid(&entries) => {
                debug!(host = %self.ip, direction = self.direction.as_str(), offset, page_size = self.page_size, "valid page");
                self.state = PageState::Fetching {
                    offset: offset + self.page_size,
                };
                Some(Ok(Page { offset, entries }))
            }
            Ok(_) => {
                debug!(host = %self.ip, direction = self.direction.as_str(), offset, "page not valid, listing done");
                self.state = PageState::Done;
                None
            }
            Err(e) => {
                self.state = PageState::Done;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Variables;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Serves `total` connections of one host in offset/first slices.
    struct PagedStore {
        total: u64,
        fail_at: Option<u64>,
        offsets: Mutex<Vec<u64>>,
    }

    impl PagedStore {
        fn new(total: u64) -> Self {
            Self {
                total,
                fail_at: None,
                offsets: Mutex::new(Vec::new()),
            }
        }
    }

    impl GraphClient for PagedStore {
        fn query(&self, _text: &str, variables: &Variables) -> Result<Value, StoreError> {
            let offset: u64 = variables["$offset"].parse().unwrap();
            let first: u64 = variables["$first"].parse().unwrap();
            self.offsets.lock().unwrap().push(offset);
            if self.fail_at == Some(offset) {
                return Err(StoreError::Server("deadline exceeded".into()));
            }
            let end = (offset + first).min(self.total);
            let connections: Vec<Value> = (offset.min(end)..end)
                .map(|i| json!({"uid": format!("0x{:x}", i + 1), "peer": [{"ip": "10.0.0.2"}]}))
                .collect();
            Ok(json!({"queryHostOriginated": [{"host_ip": "10.0.0.1", "connections": connections}]}))
        }
    }

    fn drain(store: &PagedStore, page_size: u64) -> (usize, usize) {
        let mut pages = 0;
        let mut rows = 0;
        for page in Paginator::new(store, Direction::Originated, "10.0.0.1", page_size) {
            let page = page.unwrap();
            pages += 1;
            rows += page.connection_count();
        }
        (pages, rows)
    }

    #[test]
    fn stops_after_first_empty_page() {
        for (total, page_size) in [(0u64, 10u64), (25, 10), (30, 10), (1, 1), (7, 100)] {
            let store = PagedStore::new(total);
            let (pages, rows) = drain(&store, page_size);
            let expected_pages = (total + page_size - 1) / page_size;
            assert_eq!(pages as u64, expected_pages);
            assert_eq!(rows as u64, total);
            assert_eq!(store.offsets.lock().unwrap().len() as u64, expected_pages + 1);
        }
    }

    #[test]
    fn offsets_strictly_increase() {
        let store = PagedStore::new(45);
        drain(&store, 10);
        let offsets = store.offsets.lock().unwrap().clone();
        assert_eq!(offsets, vec![0, 10, 20, 30, 40, 50]);
    }

    #[test]
    fn failure_ends_iteration() {
        let mut store = PagedStore::new(50);
        store.fail_at = Some(20);
        let mut pager = Paginator::new(&store, Direction::Originated, "10.0.0.1", 10);
        assert!(pager.next().unwrap().is_ok());
        assert!(pager.next().unwrap().is_ok());
        assert!(matches!(pager.next(), Some(Err(StoreError::Server(_)))));
        assert_eq!(pager.state(), PageState::Done);
        assert!(pager.next().is_none());
        assert_eq!(store.offsets.lock().unwrap().len(), 3);
    }

    #[test]
    fn host_without_connections_is_not_valid() {
        assert!(!Page::is_valid(&[HostEntry::default()]));
        assert!(!Page::is_valid(&[]));
    }

    #[test]
    fn missing_listing_key_ends_listing() {
        struct Blank;
        impl GraphClient for Blank {
            fn query(&self, _: &str, _: &Variables) -> Result<Value, StoreError> {
                Ok(json!({}))
            }
        }
        assert!(Paginator::new(&Blank, Direction::Responded, "10.0.0.1", 5).next().is_none());
    }
}
