//! Batch thumbnail production.
//!
//! Takes a list of jobs (`url` → `output` path) and, for each one, runs the
//! acquisition pipeline:
//!
//! ```text
//! open(url) → trim (only when larger than the frame) → thumbnail → save
//! ```
//!
//! Every job ends in a [`JobOutcome`]; a failing image is reported and never
//! aborts the batch. The collected outcomes form a [`ProcessReport`] that the
//! CLI writes as JSON next to the outputs.
//!
//! ## Job file
//!
//! ```json
//! [
//!   { "url": "https://example.org/wp-content/uploads/poster.jpg",
//!     "output": "thumbs/poster.jpg",
//!     "public_url": "https://cdn.example.org/thumbs/poster.jpg" }
//! ]
//! ```
//!
//! `public_url` is optional; without it the output path doubles as the
//! display URL.
//!
//! ## Parallel Processing
//!
//! Jobs run on a dedicated [rayon](https://docs.rs/rayon) pool. They are
//! grouped by download cache key first, so one URL is opened (and fetched) by
//! exactly one worker even when several jobs want it. Keys are unique per full
//! URL, so two groups never write the same cache file.

use crate::cache::{CacheStore, url_key, url_name};
use crate::config::{self, PlaybillConfig};
use crate::fetch::{
    FetchError, HttpTransport, ResilientFetcher, WaybackArchive, download_cache,
};
use crate::imaging::{
    Color, ImageHandle, ImageServices, Orientation, OutputFormat, Quality, TesseractCli,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Fetcher setup failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Settings the batch driver needs, resolved from [`PlaybillConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessConfig {
    /// `(max_width, max_height)` of every thumbnail.
    pub frame: (u32, u32),
    pub quality: Quality,
    /// Record recognized text for each image.
    pub ocr: bool,
    pub threads: usize,
}

impl ProcessConfig {
    pub fn from_config(config: &PlaybillConfig) -> Self {
        Self {
            frame: config.images.frame(),
            quality: config.images.quality(),
            ocr: config.ocr.enabled,
            threads: config::effective_threads(&config.processing),
        }
    }
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self::from_config(&PlaybillConfig::default())
    }
}

/// One image to acquire and where to put its thumbnail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub url: String,
    pub output: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
}

/// What was produced for a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub url: String,
    pub output: String,
    /// Dimensions of the downloaded original.
    pub source_dimensions: (u32, u32),
    /// Dimensions of the written thumbnail.
    pub dimensions: (u32, u32),
    pub orientation: Orientation,
    /// Background color as `#rrggbb`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    pub trimmed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobOutcome {
    /// Larger than the frame: trimmed (when a frame was found) and scaled.
    Processed(ImageRecord),
    /// Already within the frame: saved as-is.
    Small(ImageRecord),
    Failed { url: String, reason: String },
}

impl JobOutcome {
    pub fn url(&self) -> &str {
        match self {
            Self::Processed(r) | Self::Small(r) => &r.url,
            Self::Failed { url, .. } => url,
        }
    }

    pub fn record(&self) -> Option<&ImageRecord> {
        match self {
            Self::Processed(r) | Self::Small(r) => Some(r),
            Self::Failed { .. } => None,
        }
    }

    fn failed(job: &Job, reason: impl Into<String>) -> Self {
        Self::Failed {
            url: job.url.clone(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessReport {
    pub processed: usize,
    pub small: usize,
    pub failed: usize,
    pub outcomes: Vec<JobOutcome>,
}

impl ProcessReport {
    pub fn from_outcomes(outcomes: Vec<JobOutcome>) -> Self {
        let count = |pred: fn(&JobOutcome) -> bool| outcomes.iter().filter(|o| pred(o)).count();
        Self {
            processed: count(|o| matches!(o, JobOutcome::Processed(_))),
            small: count(|o| matches!(o, JobOutcome::Small(_))),
            failed: count(|o| matches!(o, JobOutcome::Failed { .. })),
            outcomes,
        }
    }

    pub fn write(&self, path: &Path) -> Result<(), ProcessError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// The shared collaborators of a run: image services plus the concrete
/// fetcher, kept so its cache counters can be reported afterwards.
pub struct Pipeline {
    pub services: Arc<ImageServices>,
    pub fetcher: Arc<ResilientFetcher>,
    /// Structured-record caches under the cache root, governed by `[cache]`.
    pub store: CacheStore,
}

impl Pipeline {
    /// Wire the HTTP transport, archive, download cache and recognizer from config.
    pub fn from_config(config: &PlaybillConfig) -> Result<Self, ProcessError> {
        let transport = HttpTransport::new(config.fetch.timeout(), &config.fetch.user_agent)?;
        let fetcher = Arc::new(ResilientFetcher::new(
            Arc::new(transport),
            WaybackArchive::new(config.fetch.archive_endpoint.clone()),
            download_cache(&config.cache_root).with_policy(config.fetch.cache_policy()),
            config.fetch.settings(),
        ));
        let mut services =
            ImageServices::new(fetcher.clone()).with_trim_params(config.images.trim_params());
        if config.ocr.enabled {
            services = services.with_recognizer(Arc::new(TesseractCli::new(
                config.ocr.program.clone(),
                config.ocr.language.clone(),
            )));
        }
        Ok(Self {
            services: Arc::new(services),
            fetcher,
            store: CacheStore::new(&config.cache_root).with_policy(config.cache.policy()),
        })
    }
}

/// Read a JSON job list.
pub fn load_jobs(path: &Path) -> Result<Vec<Job>, ProcessError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// One job per URL under `out_dir`, named after the URL's last segment.
///
/// A URL whose segment was already taken by a different URL falls back to
/// its full [`url_key`], so no two URLs share an output file.
pub fn jobs_for_urls(urls: &[String], out_dir: &Path, format: OutputFormat) -> Vec<Job> {
    let mut taken: HashMap<String, &str> = HashMap::new();
    urls.iter()
        .map(|url| {
            let name = url_name(url);
            let clash = taken
                .get(&name)
                .is_some_and(|owner| *owner != url.as_str());
            let stem = if clash {
                url_key(url)
            } else {
                taken.insert(name.clone(), url.as_str());
                name
            };
            Job {
                url: url.clone(),
                output: out_dir.join(Path::new(&stem).with_extension(format.extension())),
                public_url: None,
            }
        })
        .collect()
}

/// Jobs sharing a download cache key, in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobGroup {
    pub key: String,
    pub url: String,
    pub jobs: Vec<Job>,
}

pub fn group_by_url(jobs: Vec<Job>) -> Vec<JobGroup> {
    let mut groups: Vec<JobGroup> = Vec::new();
    for job in jobs {
        let key = url_key(&job.url);
        match groups.iter_mut().find(|g| g.key == key) {
            Some(group) => group.jobs.push(job),
            None => groups.push(JobGroup {
                key,
                url: job.url.clone(),
                jobs: vec![job],
            }),
        }
    }
    groups
}

/// Run every job, optionally streaming outcomes to `progress` as they finish.
///
/// Outcomes in the report keep the order of the input jobs, grouped by URL.
pub fn process(
    services: &Arc<ImageServices>,
    jobs: Vec<Job>,
    config: &ProcessConfig,
    progress: Option<Sender<JobOutcome>>,
) -> Result<ProcessReport, ProcessError> {
    let groups = group_by_url(jobs);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads.max(1))
        .build()?;

    let outcomes: Vec<JobOutcome> = pool.install(|| {
        groups
            .par_iter()
            .map_with(progress, |progress, group| {
                let outcomes = process_group(services, group, config);
                if let Some(tx) = progress {
                    for outcome in &outcomes {
                        // Receiver gone means nobody is listening; keep working.
                        let _ = tx.send(outcome.clone());
                    }
                }
                outcomes
            })
            .flatten_iter()
            .collect()
    });

    Ok(ProcessReport::from_outcomes(outcomes))
}

fn process_group(
    services: &Arc<ImageServices>,
    group: &JobGroup,
    config: &ProcessConfig,
) -> Vec<JobOutcome> {
    let fail_all = |reason: &str| -> Vec<JobOutcome> {
        group
            .jobs
            .iter()
            .map(|job| JobOutcome::failed(job, reason))
            .collect()
    };

    let original = ImageHandle::open_url(services, &group.url);
    let Some(source_dimensions) = original.dimensions() else {
        return fail_all("image could not be downloaded or decoded");
    };

    let (max_w, max_h) = config.frame;
    let small = source_dimensions.0 <= max_w && source_dimensions.1 <= max_h;
    let trimmed = if small { None } else { original.trim() };
    let base = trimmed.clone().unwrap_or_else(|| original.clone());

    let Some(thumb) = base.thumbnail(max_w, max_h) else {
        return fail_all("thumbnail could not be produced");
    };
    let Some(dimensions) = thumb.dimensions() else {
        return fail_all("thumbnail could not be produced");
    };
    let text = if config.ocr { base.text() } else { None };

    group
        .jobs
        .iter()
        .map(|job| {
            let Some(saved) = thumb.save(&job.output, config.quality) else {
                return JobOutcome::failed(job, format!("could not write {}", job.output.display()));
            };
            saved.set_display_url(
                job.public_url
                    .clone()
                    .unwrap_or_else(|| job.output.display().to_string()),
            );
            let record = ImageRecord {
                url: job.url.clone(),
                output: job.output.display().to_string(),
                source_dimensions,
                dimensions,
                orientation: Orientation::of(dimensions.0, dimensions.1),
                background: saved.background().map(|c| c.hex()),
                trimmed: trimmed.is_some(),
                display_url: saved.display_url(),
                text: text.clone(),
            };
            tracing::info!(url = %job.url, output = %record.output, small, "saved thumbnail");
            if small {
                JobOutcome::Small(record)
            } else {
                JobOutcome::Processed(record)
            }
        })
        .collect()
}

// =============================================================================
// Inspection
// =============================================================================

/// Read-only facts about one image, as shown by `playbill inspect`.
#[derive(Debug, Clone, PartialEq)]
pub struct Inspection {
    pub dimensions: (u32, u32),
    pub orientation: Orientation,
    /// Top-left, top-right, bottom-left, bottom-right.
    pub corners: [Color; 4],
    pub background: Option<Color>,
    pub trim: Option<TrimSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimSummary {
    pub dimensions: (u32, u32),
    pub background: Color,
    pub removed_area: u64,
}

/// Decode `handle` and dry-run a trim. `None` when the image is KO.
pub fn inspect(handle: &ImageHandle) -> Option<Inspection> {
    let dimensions = handle.dimensions()?;
    let corners = handle.corner_colors()?.as_array();
    let trim = handle.trim().and_then(|t| {
        let record = t.trim_record()?;
        Some(TrimSummary {
            dimensions: t.dimensions()?,
            background: record.background,
            removed_area: record.removed_area,
        })
    });
    Some(Inspection {
        dimensions,
        orientation: Orientation::of(dimensions.0, dimensions.1),
        corners,
        background: handle.background(),
        trim,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::Fetch;
    use crate::imaging::{OcrError, TextRecognizer};
    use crate::test_helpers::*;
    use image::RgbImage;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Fetch answering from a URL → bytes table, counting requests per URL.
    #[derive(Default)]
    struct TableFetch {
        bodies: HashMap<String, Vec<u8>>,
        requests: Mutex<Vec<String>>,
    }

    impl TableFetch {
        fn with(mut self, url: &str, img: &RgbImage) -> Self {
            self.bodies.insert(url.to_string(), png_bytes(img));
            self
        }

        fn requests_for(&self, url: &str) -> usize {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|u| *u == url)
                .count()
        }
    }

    impl Fetch for TableFetch {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.bodies.get(url).cloned().ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    struct FixedText(&'static str);

    impl TextRecognizer for FixedText {
        fn recognize(&self, _img: &RgbImage) -> Result<String, OcrError> {
            Ok(self.0.to_string())
        }
    }

    const POSTER: &str = "https://example.org/uploads/poster.png";
    const ICON: &str = "https://example.org/uploads/icon.png";
    const MISSING: &str = "https://example.org/uploads/missing.png";

    fn config() -> ProcessConfig {
        ProcessConfig {
            frame: (50, 40),
            quality: Quality::new(90),
            ocr: false,
            threads: 2,
        }
    }

    fn setup(fetch: TableFetch) -> (Arc<TableFetch>, Arc<ImageServices>) {
        let fetch = Arc::new(fetch);
        let services = Arc::new(ImageServices::new(fetch.clone()));
        (fetch, services)
    }

    fn job(url: &str, output: PathBuf) -> Job {
        Job {
            url: url.to_string(),
            output,
            public_url: None,
        }
    }

    // =========================================================================
    // Job construction
    // =========================================================================

    #[test]
    fn jobs_for_urls_use_last_segment_and_format() {
        let urls = vec![POSTER.to_string(), "https://example.org/a/b/show.JPEG?v=2".to_string()];
        let jobs = jobs_for_urls(&urls, Path::new("out"), OutputFormat::WebP);
        assert_eq!(jobs[0].output, PathBuf::from("out/poster.webp"));
        assert_eq!(jobs[1].output, PathBuf::from("out/show.webp"));
        assert!(jobs.iter().all(|j| j.public_url.is_none()));
    }

    #[test]
    fn jobs_for_urls_sharing_a_segment_get_distinct_outputs() {
        let first = "https://tickets.example.org/show/1/cartel.jpg";
        let second = "https://tickets.example.org/show/2/cartel.jpg";
        let urls = vec![first.to_string(), second.to_string(), first.to_string()];
        let jobs = jobs_for_urls(&urls, Path::new("out"), OutputFormat::Jpeg);
        assert_eq!(jobs[0].output, PathBuf::from("out/cartel.jpg"));
        assert_ne!(jobs[1].output, jobs[0].output);
        assert!(jobs[1].output.display().to_string().ends_with("-cartel.jpg"));
        assert_eq!(jobs[2].output, jobs[0].output);
    }

    #[test]
    fn load_jobs_parses_optional_public_url() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("jobs.json");
        std::fs::write(
            &path,
            r#"[
                {"url": "https://a/x.jpg", "output": "t/x.jpg"},
                {"url": "https://a/y.jpg", "output": "t/y.jpg", "public_url": "https://cdn/y.jpg"}
            ]"#,
        )
        .unwrap();
        let jobs = load_jobs(&path).unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].public_url, None);
        assert_eq!(jobs[1].public_url.as_deref(), Some("https://cdn/y.jpg"));
    }

    #[test]
    fn load_jobs_rejects_malformed_json() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("jobs.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_jobs(&path), Err(ProcessError::Json(_))));
    }

    #[test]
    fn group_by_url_keeps_first_seen_order() {
        let groups = group_by_url(vec![
            job("a", "1".into()),
            job("b", "2".into()),
            job("a", "3".into()),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].url, "a");
        assert_eq!(groups[0].jobs.len(), 2);
        assert_eq!(groups[1].url, "b");
    }

    #[test]
    fn group_by_url_splits_urls_sharing_a_segment() {
        let groups = group_by_url(vec![
            job("https://tickets.example.org/show/1/cartel.jpg", "1".into()),
            job("https://tickets.example.org/show/2/cartel.jpg", "2".into()),
        ]);
        assert_eq!(groups.len(), 2);
        assert_ne!(groups[0].key, groups[1].key);
    }

    // =========================================================================
    // Batch processing
    // =========================================================================

    #[test]
    fn large_image_is_trimmed_and_scaled() {
        let tmp = TempDir::new().unwrap();
        let (_, services) = setup(
            TableFetch::default().with(POSTER, &bordered(200, 160, 20, Color::WHITE, Color::BLACK)),
        );
        let out = tmp.path().join("thumbs/poster.png");

        let report = process(&services, vec![job(POSTER, out.clone())], &config(), None).unwrap();

        assert_eq!(report.processed, 1);
        let JobOutcome::Processed(record) = &report.outcomes[0] else {
            panic!("expected processed, got {:?}", report.outcomes[0]);
        };
        assert!(out.exists());
        assert!(record.trimmed);
        assert_eq!(record.source_dimensions, (200, 160));
        assert!(record.dimensions.0 <= 50 && record.dimensions.1 <= 40);
        assert_eq!(record.background.as_deref(), Some("#ffffff"));
        assert_eq!(record.display_url.as_deref(), Some(out.display().to_string().as_str()));
    }

    #[test]
    fn small_image_is_saved_untrimmed() {
        let tmp = TempDir::new().unwrap();
        let (_, services) = setup(
            TableFetch::default().with(ICON, &bordered(30, 20, 4, Color::WHITE, Color::BLACK)),
        );
        let out = tmp.path().join("icon.png");

        let report = process(&services, vec![job(ICON, out.clone())], &config(), None).unwrap();

        assert_eq!(report.small, 1);
        let JobOutcome::Small(record) = &report.outcomes[0] else {
            panic!("expected small, got {:?}", report.outcomes[0]);
        };
        assert!(out.exists());
        assert!(!record.trimmed);
        assert_eq!(record.dimensions, (30, 20));
        assert_eq!(record.orientation, Orientation::Landscape);
    }

    #[test]
    fn failure_does_not_abort_batch() {
        let tmp = TempDir::new().unwrap();
        let (_, services) = setup(
            TableFetch::default().with(ICON, &solid(10, 10, Color::BLACK)),
        );
        let jobs = vec![
            job(MISSING, tmp.path().join("missing.png")),
            job(ICON, tmp.path().join("icon.png")),
        ];

        let report = process(&services, jobs, &config(), None).unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.small, 1);
        assert!(matches!(&report.outcomes[0], JobOutcome::Failed { url, .. } if url == MISSING));
        assert_eq!(report.outcomes[1].url(), ICON);
    }

    #[test]
    fn unwritable_output_fails_only_that_job() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let (_, services) = setup(
            TableFetch::default().with(ICON, &solid(10, 10, Color::BLACK)),
        );
        let jobs = vec![
            job(ICON, blocker.join("nested/icon.png")),
            job(ICON, tmp.path().join("ok/icon.png")),
        ];

        let report = process(&services, jobs, &config(), None).unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.small, 1);
        assert!(tmp.path().join("ok/icon.png").exists());
    }

    #[test]
    fn duplicate_urls_fetch_once_and_write_every_output() {
        let tmp = TempDir::new().unwrap();
        let (fetch, services) = setup(
            TableFetch::default().with(POSTER, &bordered(200, 160, 20, Color::WHITE, Color::BLACK)),
        );
        let jobs = vec![
            job(POSTER, tmp.path().join("a.png")),
            job(POSTER, tmp.path().join("b.jpg")),
        ];

        let report = process(&services, jobs, &config(), None).unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(fetch.requests_for(POSTER), 1);
        assert!(tmp.path().join("a.png").exists());
        assert!(tmp.path().join("b.jpg").exists());
    }

    #[test]
    fn public_url_becomes_display_url() {
        let tmp = TempDir::new().unwrap();
        let (_, services) = setup(
            TableFetch::default().with(ICON, &solid(10, 10, Color::BLACK)),
        );
        let mut j = job(ICON, tmp.path().join("icon.png"));
        j.public_url = Some("https://cdn.example.org/icon.png".into());

        let report = process(&services, vec![j], &config(), None).unwrap();

        let record = report.outcomes[0].record().unwrap();
        assert_eq!(
            record.display_url.as_deref(),
            Some("https://cdn.example.org/icon.png")
        );
    }

    #[test]
    fn ocr_text_recorded_when_enabled() {
        let tmp = TempDir::new().unwrap();
        let fetch = Arc::new(TableFetch::default().with(ICON, &solid(10, 10, Color::BLACK)));
        let services = Arc::new(
            ImageServices::new(fetch).with_recognizer(Arc::new(FixedText("LA TRAVIATA"))),
        );
        let mut cfg = config();

        let off = process(&services, vec![job(ICON, tmp.path().join("a.png"))], &cfg, None).unwrap();
        assert_eq!(off.outcomes[0].record().unwrap().text, None);

        cfg.ocr = true;
        let on = process(&services, vec![job(ICON, tmp.path().join("b.png"))], &cfg, None).unwrap();
        assert_eq!(
            on.outcomes[0].record().unwrap().text.as_deref(),
            Some("LA TRAVIATA")
        );
    }

    #[test]
    fn progress_receives_every_outcome() {
        let tmp = TempDir::new().unwrap();
        let (_, services) = setup(
            TableFetch::default().with(ICON, &solid(10, 10, Color::BLACK)),
        );
        let jobs = vec![
            job(ICON, tmp.path().join("icon.png")),
            job(MISSING, tmp.path().join("missing.png")),
        ];
        let (tx, rx) = std::sync::mpsc::channel();

        process(&services, jobs, &config(), Some(tx)).unwrap();

        let received: Vec<JobOutcome> = rx.iter().collect();
        assert_eq!(received.len(), 2);
    }

    // =========================================================================
    // Report
    // =========================================================================

    #[test]
    fn report_json_is_tagged_by_status() {
        let tmp = TempDir::new().unwrap();
        let report = ProcessReport::from_outcomes(vec![JobOutcome::Failed {
            url: MISSING.into(),
            reason: "gone".into(),
        }]);
        let path = tmp.path().join("out/report.json");
        report.write(&path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["failed"], 1);
        assert_eq!(json["outcomes"][0]["status"], "failed");
        assert_eq!(json["outcomes"][0]["reason"], "gone");

        let back: ProcessReport = serde_json::from_value(json).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn inspect_reports_trim_without_writing() {
        let services = Arc::new(ImageServices::offline());
        let handle =
            ImageHandle::from_bitmap(&services, bordered(100, 80, 10, Color::WHITE, Color::BLACK));

        let info = inspect(&handle).unwrap();

        assert_eq!(info.dimensions, (100, 80));
        assert_eq!(info.orientation, Orientation::Landscape);
        assert_eq!(info.corners, [Color::WHITE; 4]);
        assert_eq!(info.background, Some(Color::WHITE));
        let trim = info.trim.unwrap();
        assert_eq!(trim.dimensions, (80, 60));
        assert_eq!(trim.background, Color::WHITE);
        assert_eq!(trim.removed_area, 100 * 80 - 80 * 60);
    }

    #[test]
    fn inspect_ko_is_none() {
        let services = Arc::new(ImageServices::offline());
        assert!(inspect(&ImageHandle::open_url(&services, MISSING)).is_none());
    }

    #[test]
    fn pipeline_store_follows_cache_section() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = PlaybillConfig::default();
        cfg.cache_root = tmp.path().join("cache").display().to_string();
        cfg.cache.max_age_days = 7;

        let pipeline = Pipeline::from_config(&cfg).unwrap();

        assert_eq!(pipeline.store.root(), tmp.path().join("cache"));
        assert_eq!(pipeline.store.policy(), cfg.cache.policy());
        assert_eq!(
            pipeline.store.policy().max_age,
            Some(std::time::Duration::from_secs(7 * 24 * 60 * 60))
        );

        cfg.cache.expire = false;
        let pipeline = Pipeline::from_config(&cfg).unwrap();
        assert_eq!(pipeline.store.policy().max_age, None);
    }

    #[test]
    fn process_config_from_defaults() {
        let cfg = ProcessConfig::default();
        assert_eq!(cfg.frame, (500, 400));
        assert_eq!(cfg.quality.value(), 90);
        assert!(!cfg.ocr);
        assert!(cfg.threads >= 1);
    }
}
