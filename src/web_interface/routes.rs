use std::convert::Infallible;
use std::sync::Arc;

use warp::reply::{self, Response};
use warp::{Filter, Rejection, Reply};

use super::types::*;
use super::{run_blocking, ApiFailure};
use crate::explorer::FlowExplorer;
use crate::export::{export_bytes, ExportFormat};
use crate::filtering::{narrow, AggregateFilterParams, FilterSpec, LogFilterParams};
use crate::records::{IpAggregateRow, LogRecord};
use crate::stats::{
    daily_activity, protocol_breakdown, rows_in_networks, top_ports, top_sources, FilterOptions, LogOverview, Side,
    SourceSummary, Totals,
};
use crate::table::{paginate, parse_columns, AggregateColumn, LogColumn};

const INDEX_HTML: &str = r#"<html><head><title>flowlens</title></head>
<body><h1>flowlens is running</h1>
<ul>
<li>/api/aggregates</li>
<li>/api/aggregates/top</li>
<li>/api/aggregates/local</li>
<li>/api/aggregates/export</li>
<li>/api/sources/{ip}/logs</li>
<li>/api/logs</li>
<li>/api/logs/options</li>
<li>/api/logs/overview</li>
<li>/api/logs/export</li>
</ul></body></html>"#;

/// All routes of the HTTP surface.
pub fn routes(explorer: Arc<FlowExplorer>) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    index_route()
        .or(aggregates_route(explorer.clone()))
        .or(top_sources_route(explorer.clone()))
        .or(local_sources_route(explorer.clone()))
        .or(export_aggregates_route(explorer.clone()))
        .or(source_logs_route(explorer.clone()))
        .or(logs_route(explorer.clone()))
        .or(log_options_route(explorer.clone()))
        .or(log_overview_route(explorer.clone()))
        .or(export_logs_route(explorer))
}

fn with_explorer(
    explorer: Arc<FlowExplorer>,
) -> impl Filter<Extract = (Arc<FlowExplorer>,), Error = Infallible> + Clone {
    warp::any().map(move || explorer.clone())
}

/// GET /
pub fn index_route() -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path::end()
        .and(warp::get())
        .and_then(|| async move { Ok::<_, Rejection>(reply::html(INDEX_HTML)) })
}

/// GET /api/aggregates
pub fn aggregates_route(explorer: Arc<FlowExplorer>) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "aggregates")
        .and(warp::get())
        .and(with_explorer(explorer))
        .and(warp::query::<TimeParams>())
        .and(warp::query::<AggregateFilterParams>())
        .and_then(|explorer: Arc<FlowExplorer>, time: TimeParams, params: AggregateFilterParams| async move {
            Ok::<_, Rejection>(
                run_blocking(move || {
                    let rows = filtered_aggregates(&explorer, &time, &params)?;
                    let body = AggregatesResponse {
                        totals: Totals::of(&rows),
                        rows,
                    };
                    Ok(reply::json(&body).into_response())
                })
                .await,
            )
        })
}

/// GET /api/aggregates/top
pub fn top_sources_route(explorer: Arc<FlowExplorer>) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "aggregates" / "top")
        .and(warp::get())
        .and(with_explorer(explorer))
        .and(warp::query::<TimeParams>())
        .and(warp::query::<AggregateFilterParams>())
        .and(warp::query::<MetricParams>())
        .and(warp::query::<LimitParams>())
        .and_then(
            |explorer: Arc<FlowExplorer>,
             time: TimeParams,
             params: AggregateFilterParams,
             metric: MetricParams,
             limit: LimitParams| async move {
                Ok::<_, Rejection>(
                    run_blocking(move || {
                        let metric = metric.metric()?;
                        let n = parse_number("n", limit.n.as_deref(), 5)?;
                        let rows = filtered_aggregates(&explorer, &time, &params)?;
                        Ok(reply::json(&top_sources(&rows, metric, n)).into_response())
                    })
                    .await,
                )
            },
        )
}

/// GET /api/aggregates/local
pub fn local_sources_route(explorer: Arc<FlowExplorer>) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "aggregates" / "local")
        .and(warp::get())
        .and(with_explorer(explorer))
        .and(warp::query::<TimeParams>())
        .and(warp::query::<LimitParams>())
        .and_then(|explorer: Arc<FlowExplorer>, time: TimeParams, limit: LimitParams| async move {
            Ok::<_, Rejection>(
                run_blocking(move || {
                    let n = parse_number("n", limit.n.as_deref(), 10)?;
                    let range = time.range()?;
                    let rows = explorer.try_aggregates(range.as_ref())?;
                    let mut local = rows_in_networks(&rows, explorer.local_networks());
                    local.truncate(n);
                    Ok(reply::json(&local).into_response())
                })
                .await,
            )
        })
}

/// GET /api/aggregates/export
pub fn export_aggregates_route(
    explorer: Arc<FlowExplorer>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "aggregates" / "export")
        .and(warp::get())
        .and(with_explorer(explorer))
        .and(warp::query::<TimeParams>())
        .and(warp::query::<AggregateFilterParams>())
        .and(warp::query::<ExportParams>())
        .and_then(
            |explorer: Arc<FlowExplorer>, time: TimeParams, params: AggregateFilterParams, export: ExportParams| async move {
                Ok::<_, Rejection>(
                    run_blocking(move || {
                        let format = export.format()?;
                        let columns = parse_columns(export.columns.as_deref(), &AggregateColumn::all())?;
                        let rows = filtered_aggregates(&explorer, &time, &params)?;
                        let body = export_bytes(format, &rows, &columns)?;
                        Ok(download(format, "aggregates", body))
                    })
                    .await,
                )
            },
        )
}

/// GET /api/sources/:ip/logs
pub fn source_logs_route(explorer: Arc<FlowExplorer>) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "sources" / String / "logs")
        .and(warp::get())
        .and(with_explorer(explorer))
        .and(warp::query::<TimeParams>())
        .and_then(|source_ip: String, explorer: Arc<FlowExplorer>, time: TimeParams| async move {
            Ok::<_, Rejection>(
                run_blocking(move || {
                    let range = time.range()?;
                    let records = explorer.try_source_logs(&source_ip)?;
                    let spec = FilterSpec {
                        time_range: range,
                        ..Default::default()
                    };
                    let records = narrow(records.as_ref().clone(), &spec);
                    let body = SourceLogsResponse {
                        summary: SourceSummary::of(&source_ip, &records),
                        daily: daily_activity(&records),
                        top_destination_ports: top_ports(&records, Side::Destination, 5),
                        top_source_ports: top_ports(&records, Side::Source, 5),
                        protocols: protocol_breakdown(&records),
                        records,
                    };
                    Ok(reply::json(&body).into_response())
                })
                .await,
            )
        })
}

/// GET /api/logs
pub fn logs_route(explorer: Arc<FlowExplorer>) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "logs")
        .and(warp::get())
        .and(with_explorer(explorer))
        .and(warp::query::<ScanParams>())
        .and(warp::query::<LogFilterParams>())
        .and(warp::query::<PageParams>())
        .and_then(
            |explorer: Arc<FlowExplorer>, scan: ScanParams, filters: LogFilterParams, paging: PageParams| async move {
                Ok::<_, Rejection>(
                    run_blocking(move || {
                        let page = parse_number("page", paging.page.as_deref(), 1)?;
                        let per_page = parse_number("per_page", paging.per_page.as_deref(), explorer.page_size())?;
                        let (scanned, records) = filtered_scan(&explorer, &scan, &filters)?;
                        let body = LogsResponse {
                            scanned,
                            page: paginate(records, page, per_page),
                        };
                        Ok(reply::json(&body).into_response())
                    })
                    .await,
                )
            },
        )
}

/// GET /api/logs/options
pub fn log_options_route(explorer: Arc<FlowExplorer>) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "logs" / "options")
        .and(warp::get())
        .and(with_explorer(explorer))
        .and(warp::query::<ScanParams>())
        .and_then(|explorer: Arc<FlowExplorer>, scan: ScanParams| async move {
            Ok::<_, Rejection>(
                run_blocking(move || {
                    let max = parse_scan_size(&explorer, &scan)?;
                    let records = explorer.try_scan(Some(max))?;
                    Ok(reply::json(&FilterOptions::from_records(&records)).into_response())
                })
                .await,
            )
        })
}

/// GET /api/logs/overview
pub fn log_overview_route(explorer: Arc<FlowExplorer>) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "logs" / "overview")
        .and(warp::get())
        .and(with_explorer(explorer))
        .and(warp::query::<ScanParams>())
        .and(warp::query::<LogFilterParams>())
        .and(warp::query::<LimitParams>())
        .and_then(
            |explorer: Arc<FlowExplorer>, scan: ScanParams, filters: LogFilterParams, limit: LimitParams| async move {
                Ok::<_, Rejection>(
                    run_blocking(move || {
                        let n = parse_number("n", limit.n.as_deref(), 5)?;
                        let (_, records) = filtered_scan(&explorer, &scan, &filters)?;
                        let overview = LogOverview::build(&records, explorer.admin_ports(), n);
                        Ok(reply::json(&overview).into_response())
                    })
                    .await,
                )
            },
        )
}

/// GET /api/logs/export
pub fn export_logs_route(explorer: Arc<FlowExplorer>) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "logs" / "export")
        .and(warp::get())
        .and(with_explorer(explorer))
        .and(warp::query::<ScanParams>())
        .and(warp::query::<LogFilterParams>())
        .and(warp::query::<ExportParams>())
        .and_then(
            |explorer: Arc<FlowExplorer>, scan: ScanParams, filters: LogFilterParams, export: ExportParams| async move {
                Ok::<_, Rejection>(
                    run_blocking(move || {
                        let format = export.format()?;
                        let columns = parse_columns(export.columns.as_deref(), &LogColumn::DEFAULT)?;
                        let (_, records) = filtered_scan(&explorer, &scan, &filters)?;
                        let body = export_bytes(format, &records, &columns)?;
                        Ok(download(format, "logs", body))
                    })
                    .await,
                )
            },
        )
}

/// Validates the parameters, then aggregates and narrows.
fn filtered_aggregates(
    explorer: &FlowExplorer,
    time: &TimeParams,
    params: &AggregateFilterParams,
) -> Result<Vec<IpAggregateRow>, ApiFailure> {
    let range = time.range()?;
    let filter = params.to_filter()?;
    let rows = explorer.try_aggregates(range.as_ref())?;
    Ok(narrow(rows.as_ref().clone(), &filter))
}

fn parse_scan_size(explorer: &FlowExplorer, scan: &ScanParams) -> Result<usize, ApiFailure> {
    Ok(parse_number("max", scan.max.as_deref(), explorer.default_scan_records())?)
}

/// Runs the bounded scan and narrows it; also returns the unfiltered size.
fn filtered_scan(
    explorer: &FlowExplorer,
    scan: &ScanParams,
    filters: &LogFilterParams,
) -> Result<(usize, Vec<LogRecord>), ApiFailure> {
    let max = parse_scan_size(explorer, scan)?;
    let spec = filters.to_spec()?;
    let records = explorer.try_scan(Some(max))?;
    Ok((records.len(), narrow(records.as_ref().clone(), &spec)))
}

fn download(format: ExportFormat, stem: &str, body: Vec<u8>) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", format.file_name(stem));
    let body = reply::with_header(body, "Content-Type", format.content_type());
    reply::with_header(body, "Content-Disposition", disposition).into_response()
}
