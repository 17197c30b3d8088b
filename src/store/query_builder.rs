//! JSON request bodies for Elasticsearch-compatible search endpoints.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use super::types::{AggregationRequest, ScrollRequest, SourceSearch};
use crate::configuration::types::FieldMapping;
use crate::filtering::TimeRange;
use crate::records::RECORD_FIELDS;

/// Name of the composite aggregation in requests and responses.
pub const GROUP_AGG: &str = "group_by_ip";
/// Key of the source address inside a composite bucket key.
pub const GROUP_KEY: &str = "ipsrc";

fn instant(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Range clause for a time window; open sides are omitted.
pub fn time_range_query(fields: &FieldMapping, range: Option<&TimeRange>) -> Value {
    let Some(range) = range else {
        return json!({ "match_all": {} });
    };
    let mut bounds = Map::new();
    if range.start != DateTime::<Utc>::MIN_UTC {
        bounds.insert("gte".into(), Value::String(instant(&range.start)));
    }
    if range.end != DateTime::<Utc>::MAX_UTC {
        bounds.insert("lte".into(), Value::String(instant(&range.end)));
    }
    if bounds.is_empty() {
        return json!({ "match_all": {} });
    }
    json!({ "range": { fields.timestamp.as_str(): Value::Object(bounds) } })
}

fn term(field: &str, value: &str) -> Value {
    json!({ "term": { field: value } })
}

/// Keyword match that folds case, as `Protocol` and `Action` do when decoding.
fn term_any_case(field: &str, value: &str) -> Value {
    json!({ "term": { field: { "value": value, "case_insensitive": true } } })
}

fn permitted_on(fields: &FieldMapping, protocol: &str) -> Value {
    json!({
        "filter": {
            "bool": {
                "must": [term_any_case(&fields.action, "PERMIT"), term_any_case(&fields.protocol, protocol)]
            }
        }
    })
}

fn port_range(fields: &FieldMapping, gte: Option<u16>, lte: Option<u16>) -> Value {
    let mut bounds = Map::new();
    if let Some(gte) = gte {
        bounds.insert("gte".into(), json!(gte));
    }
    if let Some(lte) = lte {
        bounds.insert("lte".into(), json!(lte));
    }
    json!({ "filter": { "range": { fields.destination_port.as_str(): Value::Object(bounds) } } })
}

/// Composite aggregation grouped by source IP with the per-row sub-aggregations.
///
/// Sub-aggregation names match the [`IpAggregateRow`](crate::records::IpAggregateRow) fields.
pub fn composite_aggregation(fields: &FieldMapping, request: &AggregationRequest) -> Value {
    let mut composite = json!({
        "size": request.batch_size,
        "sources": [ { GROUP_KEY: { "terms": { "field": fields.source_ip } } } ]
    });
    if let Some(after) = &request.after {
        composite["after"] = after.0.clone();
    }

    json!({
        "size": 0,
        "query": time_range_query(fields, request.time_range.as_ref()),
        "aggs": {
            GROUP_AGG: {
                "composite": composite,
                "aggs": {
                    "permit": { "filter": term_any_case(&fields.action, "PERMIT") },
                    "deny": { "filter": term_any_case(&fields.action, "DENY") },
                    "permit_tcp": permitted_on(fields, "TCP"),
                    "permit_udp": permitted_on(fields, "UDP"),
                    "distinct_dst_ports": { "cardinality": { "field": fields.destination_port } },
                    "distinct_src_ports": { "cardinality": { "field": fields.source_port } },
                    "dst_well_known": port_range(fields, None, Some(1023)),
                    "dst_registered": port_range(fields, Some(1024), Some(49151)),
                    "dst_dynamic_private": port_range(fields, Some(49152), None),
                }
            }
        }
    })
}

/// Term query on the source address, sorted by time with `_doc` as tie-breaker.
pub fn source_search(fields: &FieldMapping, request: &SourceSearch) -> Value {
    let mut body = json!({
        "query": term(&fields.source_ip, &request.source_ip),
        "_source": RECORD_FIELDS,
        "size": request.page_size,
        "sort": [
            { fields.timestamp.as_str(): { "order": "asc" } },
            { "_doc": { "order": "asc" } }
        ]
    });
    if let Some(after) = &request.after {
        body["search_after"] = Value::Array(after.0.clone());
    }
    body
}

/// First request of a scroll over the whole corpus, in index order.
pub fn scroll_open(request: &ScrollRequest) -> Value {
    json!({
        "query": { "match_all": {} },
        "_source": RECORD_FIELDS,
        "size": request.batch_size,
        "sort": ["_doc"]
    })
}
