//! Per-request page model.

use std::collections::BTreeMap;

use minijinja::{context, Value};
use serde::Serialize;

use crate::config::schema::SiteSettings;
use crate::content::TocEntry;
use crate::host::nav::NavLink;
use crate::search::SearchHit;

/// Query parameters, every key possibly repeated.
pub type Query = BTreeMap<String, Vec<String>>;

/// Parse an `application/x-www-form-urlencoded` query string.
///
/// A query that cannot be decoded yields no parameters.
pub fn parse_query(raw: Option<&str>) -> Query {
    let pairs: Vec<(String, String)> =
        serde_urlencoded::from_str(raw.unwrap_or_default()).unwrap_or_default();
    let mut query = Query::new();
    for (key, value) in pairs {
        query.entry(key).or_default().push(value);
    }
    query
}

#[derive(Debug, Clone, Serialize)]
struct TocLink<'a> {
    level: u8,
    title: &'a str,
    id: &'a str,
}

/// Everything a template sees when rendering one request.
///
/// Created per request and dropped after the response is written.
#[derive(Debug, Default)]
pub struct Page {
    pub title: String,
    pub content: String,
    pub content_header: String,
    pub content_footer: String,
    pub is_home: bool,
    pub toc: Vec<TocEntry>,
    pub data: serde_yaml::Mapping,
    pub breadcrumb: Vec<NavLink>,
    pub menu: Vec<NavLink>,
    pub side_menu: Vec<NavLink>,
    pub request_host: String,
    pub request_path: String,
    pub base_path: String,
    pub file_path: String,
    pub mount_path: String,
    pub host_name: String,
    pub query: Query,
    pub search_terms: Option<String>,
    pub search_results: Vec<SearchHit>,
}

impl Page {
    /// Template context. Rendered HTML fields are passed as safe strings.
    pub fn to_context(&self, site: &SiteSettings) -> Value {
        let toc: Vec<TocLink<'_>> = self
            .toc
            .iter()
            .map(|e| TocLink {
                level: e.level,
                title: &e.title,
                id: &e.id,
            })
            .collect();

        context! {
            title => self.title,
            content => Value::from_safe_string(self.content.clone()),
            content_header => Value::from_safe_string(self.content_header.clone()),
            content_footer => Value::from_safe_string(self.content_footer.clone()),
            is_home => self.is_home,
            toc => toc,
            data => Value::from_serialize(&self.data),
            site => Value::from_serialize(site.as_value()),
            breadcrumb => self.breadcrumb,
            menu => self.menu,
            side_menu => self.side_menu,
            request_host => self.request_host,
            request_path => self.request_path,
            base_path => self.base_path,
            file_path => self.file_path,
            mount_path => self.mount_path,
            host => self.host_name,
            query => self.query,
            search_terms => self.search_terms,
            search_results => self.search_results,
        }
    }
}

/// Context for expanding `.tpl` content files.
pub fn content_context(request_host: &str, site: &SiteSettings, query: &Query) -> Value {
    context! {
        request_host => request_host,
        site => Value::from_serialize(site.as_value()),
        query => query,
    }
}
