//! `test`: exercise a live Paperless-ngx server
//!
//! Runs status, statistics and a document listing, optionally a search and an
//! upload (followed by a task lookup), then lists tags, correspondents and
//! document types. Any failure stops the run.

use anyhow::{bail, Context};
use clap::Args;
use serde_json::{json, Value};
use std::io::Write;
use std::path::PathBuf;

use crate::config::PaperlessConfig;
use crate::models::{from_payload, DocumentSummary, Paginated, TaskStatus};
use crate::services::paperless::upload::guess_mime_type;
use crate::services::{Filters, Metadata, PaperlessService, UploadFile};

#[derive(Debug, Args)]
pub struct TestArgs {
    /// Path to a file to upload for testing
    #[arg(long)]
    pub upload: Option<PathBuf>,

    /// Search term to test search functionality
    #[arg(long)]
    pub search: Option<String>,
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn result_count(page: &Value) -> usize {
    page["results"].as_array().map_or(0, Vec::len)
}

pub async fn run<W: Write>(args: &TestArgs, config: &PaperlessConfig, out: &mut W) -> anyhow::Result<()> {
    let service = PaperlessService::new(config)?;
    let result = exercise(&service, args, out).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "Paperless test command failed");
    }
    result
}

async fn exercise<W: Write>(
    service: &PaperlessService,
    args: &TestArgs,
    out: &mut W,
) -> anyhow::Result<()> {
    writeln!(out, "Testing Paperless-ngx connection...")?;
    if !service.test_connection().await {
        bail!("Failed to connect to Paperless-ngx");
    }
    writeln!(out, "✅ Successfully connected to Paperless-ngx")?;

    let status = service.get_status().await?;
    writeln!(out, "System Status: {}", pretty(&status))?;

    let statistics = service.get_statistics().await?;
    writeln!(out, "Statistics: {}", pretty(&statistics))?;

    let documents: Paginated<DocumentSummary> =
        from_payload(service.get_documents(&Filters::new(), 1, Some(5)).await?)?;
    writeln!(
        out,
        "Recent Documents: {} found ({} total)",
        documents.results.len(),
        documents.count
    )?;
    for document in &documents.results {
        let created = document
            .created_date()
            .map(|d| d.to_string())
            .unwrap_or_else(|| "unknown date".to_string());
        writeln!(out, "  #{} {} ({})", document.id, document.title, created)?;
    }

    if let Some(term) = &args.search {
        writeln!(out, "Searching for: {}", term)?;
        let results = service.search_documents(term, false).await?;
        writeln!(out, "Search Results: {}", pretty(&results))?;
    }

    if let Some(path) = &args.upload {
        if !path.exists() {
            bail!("File not found: {}", path.display());
        }
        writeln!(out, "Uploading file: {}", path.display())?;

        let mut file = UploadFile::new(path);
        if let Some(mime) = guess_mime_type(path) {
            file = file.with_mime_type(mime);
        }
        let mut metadata = Metadata::new();
        metadata.insert(
            "title".into(),
            json!(format!("Test Upload - {}", file.file_name)),
        );

        let task = service.upload_document(&file, &metadata).await?;
        let task_id = task["task_id"]
            .as_str()
            .context("Upload response did not include a task id")?;
        writeln!(out, "✅ File uploaded successfully. Task ID: {}", task_id)?;

        let tasks: Vec<TaskStatus> = from_payload(service.get_task(task_id).await?)?;
        match tasks.first() {
            Some(task) => {
                writeln!(out, "Task Status: {:?}", task.status)?;
                if let Some(id) = task.related_document_id() {
                    let document = service.get_document(id).await?;
                    writeln!(out, "Uploaded Document: {}", pretty(&document))?;
                }
            }
            None => writeln!(out, "Task not reported yet")?,
        }
    }

    let tags = service.get_tags(&Filters::new(), 1, Some(10)).await?;
    writeln!(out, "Available Tags: {} found", result_count(&tags))?;

    let correspondents = service.get_correspondents(&Filters::new(), 1, Some(10)).await?;
    writeln!(
        out,
        "Available Correspondents: {} found",
        result_count(&correspondents)
    )?;

    let document_types = service.get_document_types(&Filters::new(), 1, Some(10)).await?;
    writeln!(
        out,
        "Available Document Types: {} found",
        result_count(&document_types)
    )?;

    writeln!(out, "✅ All tests completed successfully!")?;
    Ok(())
}
