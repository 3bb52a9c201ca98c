//! Exposition documents shared by the unit tests.

pub const EXPOSITION: &str = r#"# HELP http_requests_total The total number of HTTP requests.
# TYPE http_requests_total counter
http_requests_total{method="post",code="200"} 1027
http_requests_total{method="post",code="400"} 3
http_requests_total{method="get",code="200"} 1027
http_requests_total{method="get",code="400"} 3

# HELP http_request_duration_seconds The HTTP request latencies in seconds.
# TYPE http_request_duration_seconds histogram
http_request_duration_seconds_bucket{le="0.1"} 24054
http_request_duration_seconds_bucket{le="0.2"} 33444
http_request_duration_seconds_bucket{le="0.4"} 100392
http_request_duration_seconds_bucket{le="1"} 129389
http_request_duration_seconds_bucket{le="3"} 133988
http_request_duration_seconds_bucket{le="8"} 134331
http_request_duration_seconds_bucket{le="20"} 134332
http_request_duration_seconds_bucket{le="60"} 134333
http_request_duration_seconds_bucket{le="120"} 134334
http_request_duration_seconds_bucket{le="+Inf"} 134335
http_request_duration_seconds_sum 53423
http_request_duration_seconds_count 134335

# HELP rpc_duration_seconds A summary of the RPC duration in seconds.
# TYPE rpc_duration_seconds summary
rpc_duration_seconds{quantile="0.01"} 3102
rpc_duration_seconds{quantile="0.05"} 3272
rpc_duration_seconds{quantile="0.5"} 4773
rpc_duration_seconds{quantile="0.9"} 9001
rpc_duration_seconds{quantile="0.99"} 76656
rpc_duration_seconds_sum 1.7560473e+07
rpc_duration_seconds_count 2693

# HELP process_cpu_seconds_total Total user and system CPU time spent in seconds.
# TYPE process_cpu_seconds_total counter
process_cpu_seconds_total 12.34

# HELP go_memstats_alloc_bytes Number of bytes allocated and still in use.
# TYPE go_memstats_alloc_bytes gauge
go_memstats_alloc_bytes 4.478424e+06
"#;

/// Two histogram series told apart by `method`, buckets deliberately shuffled.
pub const LABELLED_HISTOGRAM: &str = r#"# TYPE request_size_bytes histogram
request_size_bytes_bucket{method="get",le="1000"} 6
request_size_bytes_bucket{method="get",le="100"} 2
request_size_bytes_bucket{method="get",le="+Inf"} 7
request_size_bytes_sum{method="get"} 3120
request_size_bytes_count{method="get"} 7
request_size_bytes_bucket{le="100",method="put"} 0
request_size_bytes_bucket{le="1000",method="put"} 1
request_size_bytes_bucket{le="+Inf",method="put"} 1
request_size_bytes_sum{method="put"} 512
request_size_bytes_count{method="put"} 1
"#;

pub const SPECIAL_VALUES: &str = r#"# TYPE temperature gauge
temperature{sensor="stale"} NaN
temperature{sensor="hot"} +Inf
temperature{sensor="cold"} -Inf
temperature{sensor="tiny"} 1.5e-3
temperature{sensor="plain"} 42 1700000000000
"#;

/// Two summary series told apart by `path`, quantiles deliberately shuffled.
pub const LABELLED_SUMMARY: &str = r#"# HELP handler_seconds Handler latency.
# TYPE handler_seconds summary
handler_seconds{path="/a",quantile="0.9"} 0.8
handler_seconds{quantile="0.5",path="/b"} 0.03
handler_seconds{path="/a",quantile="0.5"} 0.2
handler_seconds{path="/b",quantile="0.99"} 0.5
handler_seconds{path="/a",quantile="0.99"} 1.2
handler_seconds{path="/b",quantile="0.9"} 0.1
handler_seconds_sum{path="/a"} 42
handler_seconds_count{path="/a"} 100
handler_seconds_sum{path="/b"} 3
handler_seconds_count{path="/b"} 60
"#;

/// The histogram used in the text output scenario.
pub const SMALL_HISTOGRAM: &str = r#"# HELP latency_seconds Request latency.
# TYPE latency_seconds histogram
latency_seconds_bucket{le="0.4"} 15
latency_seconds_bucket{le="+Inf"} 20
latency_seconds_bucket{le="0.1"} 10
latency_seconds_bucket{le="0.2"} 15
latency_seconds_count 20
latency_seconds_sum 3.5
"#;
