//! Partition reads, schema discovery and assembly against scripted
//! collaborators, plus an end-to-end read of synthetic GRIB2 files.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use gfs_decode::{
    DecodeError, DecodeResult, FilterByKeys, FilterKey, GridDataset, PartitionDecoder,
    VariableData,
};
use gfs_source::{
    FetchError, FetchResult, GfsForecastSource, LocalFetcher, PartitionCause, PartitionFetcher,
    SourceConfig, SourceError, LEAD_DIMENSION,
};
use test_utils::grid::TINY;
use test_utils::time::mid_afternoon;
use test_utils::{build_grib2_file, create_snapshot, create_snapshot_with_f64, Grib2Builder};

/// Echoes the URL back as the partition body; URLs containing a listed lead
/// token fail with a 404.
#[derive(Default)]
struct ScriptedFetcher {
    failing: BTreeSet<String>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    fn failing(tokens: &[&str]) -> Self {
        Self {
            failing: tokens.iter().map(|t| t.to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PartitionFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.iter().any(|token| url.contains(token.as_str())) {
            return Err(FetchError::Status {
                status: 404,
                url: url.to_string(),
            });
        }
        Ok(Bytes::copy_from_slice(url.as_bytes()))
    }
}

/// Decodes an echoed URL into a TMP/UGRD snapshot for its lead time.
#[derive(Default)]
struct SnapshotDecoder {
    /// Lead whose snapshot carries an extra float64 variable.
    odd_lead: Option<u32>,
}

fn lead_of(bytes: &[u8]) -> u32 {
    let url = std::str::from_utf8(bytes).unwrap();
    let token = url.rsplit(".f").next().unwrap();
    token[..3].parse().unwrap()
}

impl PartitionDecoder for SnapshotDecoder {
    fn decode(&self, bytes: &[u8], filter: &FilterByKeys) -> DecodeResult<GridDataset> {
        let lead = lead_of(bytes);
        if Some(lead) == self.odd_lead {
            return Ok(create_snapshot_with_f64(&TINY, "TMP", "UGRD"));
        }
        let fields: Vec<(&str, f32)> = [("TMP", 270.0), ("UGRD", 5.0)]
            .into_iter()
            .filter(|(name, _)| filter.accepts_short_name(name))
            .collect();
        if fields.is_empty() {
            return Err(DecodeError::Empty(filter.to_string()));
        }
        Ok(create_snapshot(&TINY, &fields, lead))
    }

    fn format_name(&self) -> &'static str {
        "scripted"
    }
}

fn source_with(
    config: SourceConfig,
    fetcher: Arc<ScriptedFetcher>,
    decoder: SnapshotDecoder,
) -> GfsForecastSource {
    GfsForecastSource::with_collaborators(config, mid_afternoon(), fetcher, Arc::new(decoder))
        .unwrap()
}

fn cycle_config(max_lead_time: i64) -> SourceConfig {
    SourceConfig::new("2024-01-15T18:00:00", max_lead_time)
}

#[tokio::test]
async fn test_read_stacks_partitions_along_step() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let source = source_with(cycle_config(24), fetcher.clone(), SnapshotDecoder::default());

    let dataset = source.read().await.unwrap();

    let step = dataset.coord(LEAD_DIMENSION).unwrap();
    assert_eq!(step.values, vec![0.0, 3.0, 6.0, 9.0, 12.0, 15.0, 18.0, 21.0, 24.0]);
    assert_eq!(step.units.as_deref(), Some("hours"));

    let tmp = dataset.variable("TMP").unwrap();
    assert_eq!(tmp.dims, vec!["step", "latitude", "longitude"]);
    assert_eq!(tmp.shape(), &[9, TINY.height, TINY.width]);
    match &tmp.data {
        VariableData::Float32(a) => {
            assert_eq!(a[[0, 0, 0]], 270.0);
            assert_eq!(a[[8, 2, 3]], 294.0);
        }
        other => panic!("unexpected dtype {}", other.dtype()),
    }

    assert_eq!(dataset.attrs.get("cycle").map(String::as_str), Some("2024-01-15T18:00:00"));
    assert_eq!(dataset.attrs.get("model_run_time").map(String::as_str), Some("18Z"));
    assert!(!dataset.attrs.contains_key("valid_time"));

    // The probe doubles as partition 0
    assert_eq!(fetcher.calls(), 9);
    assert_eq!(
        source.cached_schema().unwrap().dataset_shape("TMP"),
        Some(vec![9, TINY.height, TINY.width])
    );
}

#[tokio::test]
async fn test_read_after_discovery_refetches_partition_zero() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let source = source_with(cycle_config(24), fetcher.clone(), SnapshotDecoder::default());

    source.discover_schema().await.unwrap();
    assert_eq!(fetcher.calls(), 1);

    let first = source.read().await.unwrap();
    assert_eq!(fetcher.calls(), 10);

    // A second read reuses the cached schema and fetches every partition once
    let second = source.read().await.unwrap();
    assert_eq!(fetcher.calls(), 19);
    assert_eq!(first, second);
    assert_eq!(first.coord(LEAD_DIMENSION).unwrap().values[0], 0.0);
}

#[tokio::test]
async fn test_read_partition_tags_lead_time() {
    let source = source_with(
        cycle_config(24),
        Arc::new(ScriptedFetcher::default()),
        SnapshotDecoder::default(),
    );

    let partition = source.read_partition(2).await.unwrap();
    assert_eq!(partition.coord("step").unwrap().values, vec![6.0]);
    assert_eq!(partition.shape_of("UGRD"), Some(&[1, TINY.height, TINY.width][..]));
    assert_eq!(
        partition.attrs.get("valid_time").map(String::as_str),
        Some("2024-01-16T00:00:00+00:00")
    );
}

#[tokio::test]
async fn test_schema_is_probed_once() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let source = source_with(cycle_config(12), fetcher.clone(), SnapshotDecoder::default());
    assert!(source.cached_schema().is_none());

    let first = source.discover_schema().await.unwrap().clone();
    let second = source.discover_schema().await.unwrap();

    assert_eq!(&first, second);
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(first.variable_names(), vec!["TMP", "UGRD"]);
    assert_eq!(first.npartitions, 5);
    assert_eq!(first.lead_times, vec![0, 3, 6, 9, 12]);
}

#[tokio::test]
async fn test_unreachable_probe_is_schema_discovery_error() {
    let fetcher = Arc::new(ScriptedFetcher::failing(&[".f000."]));
    let source = source_with(cycle_config(24), fetcher.clone(), SnapshotDecoder::default());

    let err = source.discover_schema().await.unwrap_err();
    match &err {
        SourceError::SchemaDiscovery { url, cause } => {
            assert!(url.ends_with("gfs.0p25.2024011518.f000.grib2"));
            assert!(matches!(
                cause,
                PartitionCause::Fetch(FetchError::Status { status: 404, .. })
            ));
        }
        other => panic!("expected schema discovery error, got {other}"),
    }
    assert!(source.cached_schema().is_none());

    // Not cached: a later call probes again
    assert!(source.discover_schema().await.is_err());
    assert_eq!(fetcher.calls(), 2);

    assert!(matches!(
        source.read().await.unwrap_err(),
        SourceError::SchemaDiscovery { .. }
    ));
}

#[tokio::test]
async fn test_failed_partition_names_index_and_url() {
    let source = source_with(
        cycle_config(24),
        Arc::new(ScriptedFetcher::failing(&[".f006."])),
        SnapshotDecoder::default(),
    );

    match source.read().await.unwrap_err() {
        SourceError::PartitionRead { index, url, .. } => {
            assert_eq!(index, 2);
            assert!(url.ends_with(".f006.grib2"));
        }
        other => panic!("expected partition read error, got {other}"),
    }

    let err = source.read_partition(2).await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("partition 2"), "{msg}");
    assert!(msg.contains("f006"), "{msg}");
}

#[tokio::test]
async fn test_nonconforming_partition_is_schema_mismatch() {
    let source = source_with(
        cycle_config(24),
        Arc::new(ScriptedFetcher::default()),
        SnapshotDecoder { odd_lead: Some(9) },
    );

    match source.read().await.unwrap_err() {
        SourceError::SchemaMismatch { index, url, details } => {
            assert_eq!(index, 3);
            assert!(url.ends_with(".f009.grib2"));
            assert!(details.contains("UGRD"), "{details}");
        }
        other => panic!("expected schema mismatch, got {other}"),
    }
}

#[tokio::test]
async fn test_filter_reaches_decoder() {
    let config = cycle_config(6)
        .with_filter(FilterByKeys::new().with_text(FilterKey::ShortName, "UGRD"));
    let source = source_with(
        config,
        Arc::new(ScriptedFetcher::default()),
        SnapshotDecoder::default(),
    );

    let dataset = source.read().await.unwrap();
    assert_eq!(dataset.variable_names(), vec!["UGRD"]);

    let config = cycle_config(6)
        .with_filter(FilterByKeys::new().with_text(FilterKey::ShortName, "REFC"));
    let source = source_with(
        config,
        Arc::new(ScriptedFetcher::default()),
        SnapshotDecoder::default(),
    );
    assert!(matches!(
        source.discover_schema().await.unwrap_err(),
        SourceError::SchemaDiscovery {
            cause: PartitionCause::Decode(DecodeError::Empty(_)),
            ..
        }
    ));
}

#[tokio::test]
async fn test_partition_counts() {
    let fetcher = Arc::new(ScriptedFetcher::default());

    let source = source_with(cycle_config(25), fetcher.clone(), SnapshotDecoder::default());
    assert_eq!(source.npartitions(), 9);
    assert_eq!(source.lead_times().last(), Some(24));

    let source = source_with(cycle_config(500), fetcher.clone(), SnapshotDecoder::default());
    assert_eq!(source.npartitions(), 167);
    assert_eq!(source.lead_times().last(), Some(498));

    let legacy: BTreeMap<String, serde_yaml::Value> =
        serde_yaml::from_str("date_str: '20240115'\nmax_lead_time_fXXX: f003\nmodel_run_time: '18'")
            .unwrap();
    let source = source_with(
        SourceConfig::from_overrides(&legacy).unwrap(),
        fetcher,
        SnapshotDecoder::default(),
    );
    assert_eq!(source.npartitions(), 1);
    assert!(source.partition_url(0).unwrap().ends_with("2024011518.f003.grib2"));
}

#[test]
fn test_identical_configuration_identical_urls() {
    let build = || {
        source_with(
            cycle_config(48),
            Arc::new(ScriptedFetcher::default()),
            SnapshotDecoder::default(),
        )
    };
    let (a, b) = (build(), build());
    assert_eq!(a.npartitions(), b.npartitions());
    for i in 0..a.npartitions() {
        assert_eq!(a.partition_url(i).unwrap(), b.partition_url(i).unwrap());
    }
}

#[tokio::test]
async fn test_end_to_end_local_grib2_mirror() {
    let dir = tempfile::tempdir().unwrap();
    for lead in [0u32, 3, 6] {
        let file = build_grib2_file(&[
            Grib2Builder::new_gfs(&TINY)
                .with_parameter(2, 2)
                .with_level(103, 10)
                .with_forecast_hour(lead)
                .with_constant_value(lead as f32),
            Grib2Builder::new_gfs(&TINY)
                .with_parameter(2, 3)
                .with_level(103, 10)
                .with_forecast_hour(lead)
                .with_constant_value(-(lead as f32)),
            Grib2Builder::new_gfs(&TINY)
                .with_level(103, 2)
                .with_forecast_hour(lead)
                .with_constant_value(280.0),
        ]);
        let name = format!("gfs.2024011506.f{:03}.grib2", lead);
        std::fs::write(dir.path().join(name), file).unwrap();
    }

    let overrides: BTreeMap<String, serde_yaml::Value> = serde_yaml::from_str(&format!(
        r#"
cycle: "2024-01-15T06:00:00"
max_lead_time: 6
base_url: "{}"
url_template: "{{base_url}}/gfs.{{date}}{{cycle:02}}.f{{forecast:03}}.grib2"
filter_by_keys: {{typeOfLevel: heightAboveGround, level: 10}}
"#,
        dir.path().display()
    ))
    .unwrap();

    let source = GfsForecastSource::with_collaborators(
        SourceConfig::from_overrides(&overrides).unwrap(),
        mid_afternoon(),
        Arc::new(LocalFetcher::new()),
        Arc::new(gfs_decode::Grib2Decoder::default()),
    )
    .unwrap();

    let dataset = source.read().await.unwrap();
    assert_eq!(dataset.variable_names(), vec!["UGRD", "VGRD"]);
    assert_eq!(dataset.coord("step").unwrap().values, vec![0.0, 3.0, 6.0]);

    match &dataset.variable("VGRD").unwrap().data {
        VariableData::Float32(a) => {
            assert!((a[[2, 1, 1]] + 6.0).abs() < 1e-3);
            assert!((a[[1, 0, 0]] + 3.0).abs() < 1e-3);
            assert!(a[[0, 2, 3]].abs() < 1e-3);
        }
        other => panic!("unexpected dtype {}", other.dtype()),
    }
}
