use std::time::Duration;

use log::{debug, info, warn};
use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::query_builder::{self, GROUP_KEY};
use super::store_trait::LogStore;
use super::types::*;
use crate::configuration::types::{FieldMapping, StoreConfig};
use crate::error_handling::types::StoreError;
use crate::records::{IpAggregateRow, LogRecord};

/// Longest response body kept in a `RequestFailed` error.
const ERROR_BODY_LIMIT: usize = 2048;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "_scroll_id")]
    scroll_id: Option<String>,
    #[serde(default)]
    hits: Hits,
    aggregations: Option<Aggregations>,
}

#[derive(Debug, Default, Deserialize)]
struct Hits {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_id", default)]
    id: Option<String>,
    #[serde(rename = "_source")]
    source: Option<Value>,
    sort: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct Aggregations {
    #[serde(rename = "group_by_ip")]
    group: CompositeAggregation,
}

#[derive(Debug, Deserialize)]
struct CompositeAggregation {
    #[serde(default)]
    buckets: Vec<Bucket>,
    after_key: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct DocCount {
    doc_count: u64,
}

#[derive(Debug, Deserialize)]
struct Cardinality {
    #[serde(default)]
    value: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Bucket {
    key: Map<String, Value>,
    doc_count: u64,
    permit: DocCount,
    deny: DocCount,
    permit_tcp: DocCount,
    permit_udp: DocCount,
    distinct_dst_ports: Cardinality,
    distinct_src_ports: Cardinality,
    dst_well_known: DocCount,
    dst_registered: DocCount,
    dst_dynamic_private: DocCount,
}

impl Bucket {
    fn into_row(self) -> Result<IpAggregateRow, StoreError> {
        let source_ip = match self.key.get(GROUP_KEY) {
            Some(Value::String(ip)) => ip.clone(),
            Some(other) => other.to_string(),
            None => {
                return Err(StoreError::MalformedResponse(format!(
                    "composite bucket without {:?} key",
                    GROUP_KEY
                )))
            }
        };
        Ok(IpAggregateRow {
            source_ip,
            count: self.doc_count,
            permit: self.permit.doc_count,
            deny: self.deny.doc_count,
            permit_tcp: self.permit_tcp.doc_count,
            permit_udp: self.permit_udp.doc_count,
            distinct_dst_ports: self.distinct_dst_ports.value.unwrap_or(0),
            distinct_src_ports: self.distinct_src_ports.value.unwrap_or(0),
            dst_well_known: self.dst_well_known.doc_count,
            dst_registered: self.dst_registered.doc_count,
            dst_dynamic_private: self.dst_dynamic_private.doc_count,
        })
    }
}

/// `LogStore` backed by an Elasticsearch-compatible HTTP endpoint.
pub struct ElasticsearchStore {
    client: Client,
    base_url: String,
    index: String,
    fields: FieldMapping,
}

impl ElasticsearchStore {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| StoreError::ConnectionFailed(format!("failed to build HTTP client: {}", e)))?;
        let base_url = config.url.trim_end_matches('/').to_string();
        info!("Elasticsearch store at {} (index {})", base_url, config.index);
        Ok(Self {
            client,
            base_url,
            index: config.index.clone(),
            fields: config.fields.clone(),
        })
    }

    fn search_url(&self) -> String {
        format!("{}/{}/_search", self.base_url, self.index)
    }

    fn scroll_url(&self) -> String {
        format!("{}/_search/scroll", self.base_url)
    }

    fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, StoreError> {
        let response = request
            .send()
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().unwrap_or_default();
            if body.len() > ERROR_BODY_LIMIT {
                let mut cut = ERROR_BODY_LIMIT;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(StoreError::RequestFailed {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<T>()
            .map_err(|e| StoreError::MalformedResponse(e.to_string()))
    }

    fn scroll_page(&self, response: SearchResponse) -> ScrollPage {
        let hit_count = response.hits.hits.len();
        ScrollPage {
            scroll_id: response.scroll_id.map(ScrollId),
            records: decode_hits(response.hits.hits),
            hit_count,
        }
    }
}

/// Decodes hit sources, skipping documents that do not form a record.
fn decode_hits(hits: Vec<Hit>) -> Vec<LogRecord> {
    let mut records = Vec::with_capacity(hits.len());
    for hit in hits {
        let id = hit.id.unwrap_or_default();
        match hit.source.map(serde_json::from_value::<LogRecord>) {
            Some(Ok(record)) => records.push(record),
            Some(Err(e)) => warn!("Skipping document {}: {}", id, e),
            None => warn!("Skipping document {}: no _source", id),
        }
    }
    records
}

impl LogStore for ElasticsearchStore {
    fn aggregate_sources(&self, request: &AggregationRequest) -> Result<AggregationPage, StoreError> {
        let body = query_builder::composite_aggregation(&self.fields, request);
        let response: SearchResponse = self.send(self.client.post(self.search_url()).json(&body))?;
        let group = response
            .aggregations
            .ok_or_else(|| StoreError::MalformedResponse("missing aggregations".into()))?
            .group;
        let rows = group
            .buckets
            .into_iter()
            .map(Bucket::into_row)
            .collect::<Result<Vec<_>, _>>()?;
        debug!("Composite page with {} bucket(s)", rows.len());
        Ok(AggregationPage {
            rows,
            after_key: group.after_key.map(CompositeCursor),
        })
    }

    fn search_source(&self, request: &SourceSearch) -> Result<SearchPage, StoreError> {
        let body = query_builder::source_search(&self.fields, request);
        let response: SearchResponse = self.send(self.client.post(self.search_url()).json(&body))?;
        let hits = response.hits.hits;
        let hit_count = hits.len();
        let last_sort = hits.last().and_then(|hit| hit.sort.clone()).map(SortCursor);
        Ok(SearchPage {
            records: decode_hits(hits),
            hit_count,
            last_sort,
        })
    }

    fn open_scroll(&self, request: &ScrollRequest) -> Result<ScrollPage, StoreError> {
        let body = query_builder::scroll_open(request);
        let response: SearchResponse = self.send(
            self.client
                .post(self.search_url())
                .query(&[("scroll", request.keep_alive.as_str())])
                .json(&body),
        )?;
        if response.scroll_id.is_none() {
            return Err(StoreError::MalformedResponse("scroll opened without _scroll_id".into()));
        }
        Ok(self.scroll_page(response))
    }

    fn next_scroll(&self, scroll_id: &ScrollId, keep_alive: &str) -> Result<ScrollPage, StoreError> {
        let body = json!({ "scroll": keep_alive, "scroll_id": scroll_id.0 });
        let response: SearchResponse = self.send(self.client.post(self.scroll_url()).json(&body))?;
        Ok(self.scroll_page(response))
    }

    fn clear_scroll(&self, scroll_id: &ScrollId) -> Result<(), StoreError> {
        let body = json!({ "scroll_id": [scroll_id.0] });
        let _: Value = self.send(self.client.delete(self.scroll_url()).json(&body))?;
        debug!("Cleared scroll {}", scroll_id);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("elasticsearch {}/{}", self.base_url, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_into_row() {
        let raw = json!({
            "key": { "ipsrc": "10.70.4.2" },
            "doc_count": 12,
            "permit": { "doc_count": 9 },
            "deny": { "doc_count": 3 },
            "permit_tcp": { "doc_count": 5 },
            "permit_udp": { "doc_count": 4 },
            "distinct_dst_ports": { "value": 6 },
            "distinct_src_ports": { "value": 11 },
            "dst_well_known": { "doc_count": 7 },
            "dst_registered": { "doc_count": 2 },
            "dst_dynamic_private": { "doc_count": 3 }
        });
        let row = serde_json::from_value::<Bucket>(raw).unwrap().into_row().unwrap();
        assert_eq!(row.source_ip, "10.70.4.2");
        assert_eq!(row.count, 12);
        assert_eq!(row.permit_udp, 4);
        assert_eq!(row.distinct_src_ports, 11);
        assert_eq!(row.dst_dynamic_private, 3);
        assert!(row.is_consistent());
    }

    #[test]
    fn test_bucket_without_key_is_malformed() {
        let raw = json!({
            "key": { "other": "x" }, "doc_count": 1,
            "permit": { "doc_count": 0 }, "deny": { "doc_count": 0 },
            "permit_tcp": { "doc_count": 0 }, "permit_udp": { "doc_count": 0 },
            "distinct_dst_ports": { "value": 0 }, "distinct_src_ports": { "value": 0 },
            "dst_well_known": { "doc_count": 0 }, "dst_registered": { "doc_count": 0 },
            "dst_dynamic_private": { "doc_count": 0 }
        });
        let bucket: Bucket = serde_json::from_value(raw).unwrap();
        assert!(matches!(bucket.into_row(), Err(StoreError::MalformedResponse(_))));
    }

    #[test]
    fn test_decode_hits_skips_bad_documents() {
        let response: SearchResponse = serde_json::from_value(json!({
            "_scroll_id": "abc",
            "hits": { "hits": [
                { "_id": "1", "_source": {
                    "ipsrc": "1.2.3.4", "ipdst": "5.6.7.8", "portsrc": 5000, "portdst": 22,
                    "proto": "TCP", "action": "PERMIT", "timestamp": "2024-01-01T00:00:00Z"
                }, "sort": [1, 0] },
                { "_id": "2", "_source": { "ipsrc": "1.2.3.4" } },
                { "_id": "3" }
            ] }
        }))
        .unwrap();
        assert_eq!(response.scroll_id.as_deref(), Some("abc"));
        assert_eq!(response.hits.hits.len(), 3);
        let records = decode_hits(response.hits.hits);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].destination_port, 22);
    }

    #[test]
    fn test_unreachable_store_is_connection_failure() {
        let config = StoreConfig {
            url: "http://127.0.0.1:1/".into(),
            request_timeout_secs: 2,
            ..Default::default()
        };
        let store = ElasticsearchStore::new(&config).unwrap();
        assert_eq!(store.describe(), "elasticsearch http://127.0.0.1:1/application-logs");
        let request = SourceSearch {
            source_ip: "1.2.3.4".into(),
            page_size: 10,
            after: None,
        };
        assert!(matches!(
            store.search_source(&request),
            Err(StoreError::ConnectionFailed(_))
        ));
    }
}
