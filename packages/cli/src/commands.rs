//! Command implementations shared by the flag-driven and interactive front
//! ends.

use std::path::{Path, PathBuf};
use std::time::Instant;

use crime_enrich::{EnrichConfig, EnrichError, EnrichStats, Enricher, period::current_window};
use crime_enrich_cli_utils::{MultiProgress, PropertyProgress};
use crime_enrich_property_models::{
    CrimeLookup, CrimeSummaryRow, EnrichedProperty, PropertyRecord,
};
use crime_enrich_source::police::PoliceClient;
use serde::Serialize;
use serde_json::{Map, Value, json};

/// Where a batch run reads from and writes to.
#[derive(Debug, Clone)]
pub struct EnrichJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub summaries: Option<PathBuf>,
    pub max_items: Option<usize>,
    pub config: Option<PathBuf>,
}

/// Enriches every record in `job.input` and writes the results.
///
/// # Errors
///
/// Returns an error if the config or input cannot be loaded, the HTTP
/// client cannot be built, or an output file cannot be written. Failed
/// lookups for individual properties are not errors.
pub async fn enrich(
    job: &EnrichJob,
    multi: &MultiProgress,
) -> Result<EnrichStats, Box<dyn std::error::Error>> {
    let config = EnrichConfig::load(job.config.as_deref())?;
    let mut records = read_records(&job.input)?;
    log::info!(
        "Loaded {} properties from {}",
        records.len(),
        job.input.display()
    );

    if let Some(max) = job.max_items
        && records.len() > max
    {
        log::info!("Limiting run to the first {max} of {} properties", records.len());
        records.truncate(max);
    }

    let window = current_window(config.window.months);
    let client = PoliceClient::new(config.police.clone())?;
    let enricher = Enricher::new(client, window)
        .with_options(config.options())
        .with_progress(PropertyProgress::batch(multi, "Enriching properties"));

    let start = Instant::now();
    let results = enricher.enrich_all(records).await;

    write_json(&job.output, &results)?;
    log::info!("Wrote {} properties to {}", results.len(), job.output.display());

    if let Some(path) = &job.summaries {
        let rows = summary_rows(&results);
        write_json(path, &rows)?;
        log::info!("Wrote {} crime summaries to {}", rows.len(), path.display());
    }

    let client_stats = enricher.source().stats();
    log::info!(
        "Finished in {:.1}s: {} lookups, {} soft failures",
        start.elapsed().as_secs_f64(),
        client_stats.calls,
        client_stats.soft_failures,
    );

    Ok(EnrichStats::from_results(&results))
}

/// Enriches a single coordinate and prints the result as JSON.
///
/// # Errors
///
/// Returns an error if the config cannot be loaded or the coordinate could
/// not be enriched.
pub async fn lookup(
    lat: f64,
    lng: f64,
    label: Option<String>,
    config: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = EnrichConfig::load(config)?;
    let client = PoliceClient::new(config.police.clone())?;
    let enricher =
        Enricher::new(client, current_window(config.window.months)).with_options(config.options());

    let record = coordinate_record(lat, lng, label);
    let crime = enricher.enrich_one("lookup", &record).await;
    if let CrimeLookup::Unavailable(reason) = &crime {
        return Err(format!("No crime data for {lat},{lng}: {reason}").into());
    }

    let result = EnrichedProperty { record, crime };
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Prints the months the next run would query, oldest first.
///
/// # Errors
///
/// Returns an error if the config cannot be loaded.
pub fn window(config: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = EnrichConfig::load(config)?;
    for period in current_window(config.window.months) {
        println!("{period}");
    }
    Ok(())
}

fn read_records(path: &Path) -> Result<Vec<PropertyRecord>, EnrichError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), EnrichError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    std::fs::write(path, text)?;
    Ok(())
}

fn summary_rows(results: &[EnrichedProperty]) -> Vec<CrimeSummaryRow> {
    results.iter().filter_map(EnrichedProperty::summary_row).collect()
}

fn coordinate_record(lat: f64, lng: f64, label: Option<String>) -> PropertyRecord {
    let mut fields = Map::new();
    fields.insert("lat".to_string(), json!(lat));
    fields.insert("lng".to_string(), json!(lng));
    if let Some(label) = label {
        fields.insert("address".to_string(), Value::String(label));
    }
    PropertyRecord::from(fields)
}
