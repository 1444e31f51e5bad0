//! Interactive prompts for the crime enrichment CLI.
//!
//! Provides a menu-driven interface using `dialoguer` for running the
//! enrichment commands without memorizing CLI flags.

use std::path::PathBuf;

use crime_enrich_cli_utils::MultiProgress;
use dialoguer::{Confirm, Input, Select};

use crate::commands::{self, EnrichJob};

enum Action {
    EnrichFile,
    LookupCoordinate,
    ShowWindow,
}

impl Action {
    const ALL: &[Self] = &[Self::EnrichFile, Self::LookupCoordinate, Self::ShowWindow];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::EnrichFile => "Enrich a property file",
            Self::LookupCoordinate => "Look up a single coordinate",
            Self::ShowWindow => "Show the lookback window",
        }
    }
}

/// Prompts for an action and its settings, then runs it.
///
/// # Errors
///
/// Returns an error if a prompt fails or the selected command fails.
pub async fn run(multi: &MultiProgress) -> Result<(), Box<dyn std::error::Error>> {
    println!("Crime Enrichment");
    println!();

    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match Action::ALL[idx] {
        Action::EnrichFile => enrich_file(multi).await?,
        Action::LookupCoordinate => lookup_coordinate().await?,
        Action::ShowWindow => commands::window(None)?,
    }

    Ok(())
}

async fn enrich_file(multi: &MultiProgress) -> Result<(), Box<dyn std::error::Error>> {
    let input: String = Input::new()
        .with_prompt("Input JSON file")
        .default("properties.json".to_string())
        .interact_text()?;
    let output: String = Input::new()
        .with_prompt("Output JSON file")
        .default("properties_enriched.json".to_string())
        .interact_text()?;

    let summaries = if Confirm::new()
        .with_prompt("Write a crime summaries report?")
        .default(true)
        .interact()?
    {
        let path: String = Input::new()
            .with_prompt("Summaries file")
            .default("property_crime_summaries.json".to_string())
            .interact_text()?;
        Some(PathBuf::from(path))
    } else {
        None
    };

    let max_items = prompt_optional_usize("Max properties to process (empty for all)")?;

    let job = EnrichJob {
        input: PathBuf::from(input),
        output: PathBuf::from(output),
        summaries,
        max_items,
        config: None,
    };
    let stats = commands::enrich(&job, multi).await?;
    println!("{stats}");

    Ok(())
}

async fn lookup_coordinate() -> Result<(), Box<dyn std::error::Error>> {
    let lat: f64 = Input::new().with_prompt("Latitude").interact_text()?;
    let lng: f64 = Input::new().with_prompt("Longitude").interact_text()?;
    let label: String = Input::new()
        .with_prompt("Label (empty for none)")
        .allow_empty(true)
        .interact_text()?;

    let label = Some(label.trim().to_string()).filter(|l| !l.is_empty());
    commands::lookup(lat, lng, label, None).await
}

fn prompt_optional_usize(prompt: &str) -> Result<Option<usize>, Box<dyn std::error::Error>> {
    let input: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;

    if input.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(input.trim().parse()?))
    }
}
