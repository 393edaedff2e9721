//! Terminal rendering of rows, notices and status.

use std::fmt::Write as _;

use blescan_core::{Notice, NoticeLevel, ResultRow};

use crate::client::PermissionsResponse;

const HEADERS: [&str; 4] = ["#", "NAME", "ADDRESS", "SIGNAL"];

fn cells(row: &ResultRow) -> [String; 4] {
    [
        row.index.to_string(),
        row.name.clone(),
        row.address.clone(),
        row.signal.clone(),
    ]
}

fn pad_line(cells: &[String; 4], widths: &[usize; 4]) -> String {
    let mut line = String::new();
    for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
        if i > 0 {
            line.push_str("  ");
        }
        let _ = write!(line, "{cell:<width$}");
    }
    line.trim_end().to_string()
}

/// The result list as an aligned table.
pub fn table(rows: &[ResultRow]) -> String {
    if rows.is_empty() {
        return "No devices found yet.".to_string();
    }

    let headers = HEADERS.map(str::to_string);
    let body: Vec<[String; 4]> = rows.iter().map(cells).collect();

    let mut widths = headers.clone().map(|h| h.len());
    for row in &body {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = pad_line(&headers, &widths);
    for row in &body {
        out.push('\n');
        out.push_str(&pad_line(row, &widths));
    }
    out
}

/// A single row for the live feed.
pub fn row_line(row: &ResultRow) -> String {
    format!(
        "[{}] {}  {}  {}",
        row.index, row.name, row.address, row.signal
    )
}

/// A notice the way a toast would read.
pub fn notice(notice: &Notice) -> String {
    match notice.level {
        NoticeLevel::Info => notice.message.clone(),
        NoticeLevel::Warning => format!("warning: {}", notice.message),
        NoticeLevel::Error => format!("error: {}", notice.message),
    }
}

/// Permission states and pending prompts.
pub fn permissions(response: &PermissionsResponse) -> String {
    let mut out = String::new();
    for entry in &response.permissions {
        let name = format!("{} ({})", entry.label, entry.permission);
        let _ = writeln!(
            out,
            "{name:<32} {:<13} policy={:<7} {}",
            format!("{:?}", entry.status).to_lowercase(),
            format!("{:?}", entry.policy).to_lowercase(),
            if entry.required { "required" } else { "optional" },
        );
    }
    for prompt in &response.pending {
        let _ = write!(out, "pending prompt: {}", prompt.permission);
        if let Some(rationale) = &prompt.rationale {
            let _ = write!(out, " ({rationale})");
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}
