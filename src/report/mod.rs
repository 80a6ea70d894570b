use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{Result, ScrapeError};
use crate::parser::PostRecord;
use crate::targets::ChannelTarget;
use crate::workers::ResultSet;

/// Human-readable run date, also embedded in the report filename.
const DATE_LABEL_FORMAT: &str = "%b %d %Y";

fn date_label(date: NaiveDate) -> String {
    date.format(DATE_LABEL_FORMAT).to_string()
}

fn report_path(output_dir: &Path, prefix: &str, date: NaiveDate) -> PathBuf {
    output_dir.join(format!("{}_{}.csv", prefix, date_label(date).replace(' ', "_")))
}

fn ensure_output_dir(output_dir: &Path) -> Result<()> {
    fs::create_dir_all(output_dir)
        .map_err(|e| ScrapeError::Report(format!("Failed to create output dir: {}", e)))?;
    Ok(())
}

/// Write the followers report: one row per input target, in input order, with
/// sentinel values standing in for unprocessed targets. The metric column is
/// headed by the run date.
pub fn write_follower_report(
    output_dir: &Path,
    targets: &[ChannelTarget],
    results: &ResultSet,
    date: NaiveDate,
) -> Result<PathBuf> {
    ensure_output_dir(output_dir)?;
    let path = report_path(output_dir, "Whatsapp_Followers_Tracking", date);

    let mut writer = csv::Writer::from_path(&path)
        .map_err(|e| ScrapeError::Report(format!("Failed to open report: {}", e)))?;

    writer
        .write_record(["GroupName", "Channel Name", "Links/URL", &date_label(date)])
        .map_err(|e| ScrapeError::Report(format!("Failed to write header: {}", e)))?;

    for row in results.rows(targets) {
        writer
            .write_record([&row.group, &row.channel_name, &row.link, &row.metric])
            .map_err(|e| ScrapeError::Report(format!("Failed to write row: {}", e)))?;
    }

    writer
        .flush()
        .map_err(|e| ScrapeError::Report(format!("Failed to flush report: {}", e)))?;
    info!("Followers report written to {:?}", path);
    Ok(path)
}

/// Write the posts report, one row per collected post.
pub fn write_posts_report(
    output_dir: &Path,
    records: &[PostRecord],
    date: NaiveDate,
) -> Result<PathBuf> {
    ensure_output_dir(output_dir)?;
    let path = report_path(output_dir, "Whatsapp_Posts", date);

    let mut writer = csv::Writer::from_path(&path)
        .map_err(|e| ScrapeError::Report(format!("Failed to open report: {}", e)))?;

    writer
        .write_record([
            "Channel_Name",
            "Type",
            "Post_Content",
            "Post_Type",
            "Timestamp",
            "Post_Reaction",
            "Links",
        ])
        .map_err(|e| ScrapeError::Report(format!("Failed to write header: {}", e)))?;

    for record in records {
        writer
            .write_record([
                record.channel.as_str(),
                record.category.as_str(),
                record.content.as_str(),
                record.post_type.as_str(),
                record.timestamp.as_deref().unwrap_or(""),
                &record.reactions.to_string(),
                &record.links.join(", "),
            ])
            .map_err(|e| ScrapeError::Report(format!("Failed to write row: {}", e)))?;
    }

    writer
        .flush()
        .map_err(|e| ScrapeError::Report(format!("Failed to flush report: {}", e)))?;
    info!("Posts report written to {:?} ({} posts)", path, records.len());
    Ok(path)
}
