//! Output renderers and formatting helpers for CLI commands.

use std::fmt::Write as _;

use anyhow::anyhow;
use ledgerdesk_grid::entity::{EntityId, Record};
use ledgerdesk_grid::screen::{PresentedRow, Screen, ScreenView};
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};
use crate::screens::ScreenProfile;

const SELECTED_MARK: &str = "*";

#[derive(Serialize)]
struct ScreenJson<'a> {
    screen: &'a str,
    page: usize,
    page_size: usize,
    page_count: usize,
    total: usize,
    rows: Vec<Record>,
    selected: Vec<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct ProfileJson<'a> {
    name: &'a str,
    title: &'a str,
    endpoint: &'a str,
    search: &'a [String],
    categories: &'a [String],
    flags: Vec<FlagJson<'a>>,
    actions: Vec<&'a str>,
}

#[derive(Serialize)]
struct FlagJson<'a> {
    name: &'a str,
    label: &'a str,
}

pub(crate) fn render_screen(
    profile: &ScreenProfile,
    screen: &Screen<Record>,
    format: OutputFormat,
) -> CliResult<()> {
    let text = match format {
        OutputFormat::Json => screen_json(profile, screen)?,
        OutputFormat::Table => screen_table(profile, screen),
    };
    println!("{text}");
    Ok(())
}

pub(crate) fn render_profiles(profiles: &[ScreenProfile], format: OutputFormat) -> CliResult<()> {
    let text = match format {
        OutputFormat::Json => profiles_json(profiles)?,
        OutputFormat::Table => profiles_table(profiles),
    };
    println!("{text}");
    Ok(())
}

fn profiles_json(profiles: &[ScreenProfile]) -> CliResult<String> {
    let listing: Vec<ProfileJson<'_>> = profiles
        .iter()
        .map(|profile| ProfileJson {
            name: profile.name,
            title: profile.title,
            endpoint: profile.endpoint,
            search: profile.schema.search_fields(),
            categories: profile.schema.categories(),
            flags: profile
                .schema
                .flags()
                .iter()
                .map(|flag| FlagJson {
                    name: &flag.name,
                    label: &flag.label,
                })
                .collect(),
            actions: profile.actions.iter().map(|action| action.name).collect(),
        })
        .collect();
    to_json(&listing)
}

fn profiles_table(profiles: &[ScreenProfile]) -> String {
    let mut out = String::new();
    for profile in profiles {
        let flags: Vec<String> = profile
            .schema
            .flags()
            .iter()
            .map(|flag| format!("{} ({})", flag.name, flag.label))
            .collect();
        let actions: Vec<String> = profile
            .actions
            .iter()
            .map(|action| format!("{} ({})", action.name, action.summary))
            .collect();
        let _ = writeln!(out, "{} {}: {}", profile.name, profile.endpoint, profile.title);
        let _ = writeln!(out, "  search:  {}", or_dash(&profile.schema.search_fields().join(", ")));
        let _ = writeln!(out, "  where:   {}", or_dash(&profile.schema.categories().join(", ")));
        let _ = writeln!(out, "  flags:   {}", or_dash(&flags.join("; ")));
        let _ = writeln!(out, "  actions: {}", or_dash(&actions.join("; ")));
    }
    out.trim_end().to_string()
}

fn screen_json(profile: &ScreenProfile, screen: &Screen<Record>) -> CliResult<String> {
    let (page, page_size, total) = screen
        .store()
        .with_page(|page| (page.index.to_api().get(), page.size.get(), page.total));
    let error = match screen.view() {
        ScreenView::Error { message, .. } => Some(message),
        _ => None,
    };
    to_json(&ScreenJson {
        screen: profile.name,
        page,
        page_size,
        page_count: screen.page_count(),
        total,
        rows: screen.visible(),
        selected: screen.selection().selected(),
        error,
    })
}

fn screen_table(profile: &ScreenProfile, screen: &Screen<Record>) -> String {
    let headers: Vec<&str> = profile.columns.iter().map(|column| column.header.as_str()).collect();
    let mut out = String::new();
    match screen.view() {
        ScreenView::Idle | ScreenView::Loading => out.push_str("loading..."),
        ScreenView::Empty => {
            out.push_str(&format_table(&headers, &[]));
            out.push_str("no records\n");
        }
        ScreenView::Rows(rows) => out.push_str(&format_table(&headers, &rows)),
        ScreenView::Error {
            message,
            retryable,
            rows,
        } => {
            if !rows.is_empty() {
                out.push_str(&format_table(&headers, &rows));
            }
            let _ = write!(out, "error: {message}");
            if retryable {
                out.push_str(" (run the command again to retry)");
            }
            out.push('\n');
        }
    }
    let (page, total) = screen
        .store()
        .with_page(|page| (page.index.to_api().get(), page.total));
    let _ = write!(
        out,
        "{}: page {page}/{} | {total} total | {} selected",
        profile.title,
        screen.page_count(),
        screen.selection().len()
    );
    out
}

/// Left-aligned table with a leading selection marker column.
pub(crate) fn format_table(headers: &[&str], rows: &[PresentedRow]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|header| header.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(&row.cells) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_line(&mut out, " ", headers.iter().copied(), &widths);
    for row in rows {
        let mark = if row.selected { SELECTED_MARK } else { " " };
        push_line(&mut out, mark, row.cells.iter().map(String::as_str), &widths);
    }
    out
}

fn push_line<'a>(
    out: &mut String,
    mark: &str,
    cells: impl Iterator<Item = &'a str>,
    widths: &[usize],
) {
    let mut line = String::from(mark);
    for (cell, width) in cells.zip(widths) {
        let padding = width.saturating_sub(cell.chars().count());
        line.push(' ');
        line.push_str(cell);
        line.extend(std::iter::repeat_n(' ', padding + 1));
    }
    out.push_str(line.trim_end());
    out.push('\n');
}

fn or_dash(text: &str) -> &str {
    if text.is_empty() { "-" } else { text }
}

fn to_json<T: Serialize>(value: &T) -> CliResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::list::tests::context_for;
    use crate::screens;
    use httpmock::prelude::*;
    use ledgerdesk_grid::paging::{PageIndex, PageRequest, PageSize};
    use serde_json::{Value, json};

    fn row(id: u64, selected: bool, cells: &[&str]) -> PresentedRow {
        PresentedRow {
            id: EntityId::from(id),
            selected,
            cells: cells.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn table_aligns_columns_by_widest_cell() {
        let table = format_table(
            &["ID", "NAME"],
            &[row(1, false, &["1", "Ana"]), row(22, true, &["22", "Bartholomew"])],
        );
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "  ID  NAME");
        assert_eq!(lines[1], "  1   Ana");
        assert_eq!(lines[2], "* 22  Bartholomew");
    }

    #[test]
    fn profile_listing_shows_flag_labels_and_where_fields() {
        let profiles = screens::profiles();
        let table = profiles_table(&profiles);
        assert!(table.contains("attendance /attendance/report: Attendance report"));
        assert!(table.contains("late (Only late arrivals)"));
        assert!(table.contains("  where:   status, department.name"));

        let value: Value = serde_json::from_str(&profiles_json(&profiles).expect("json"))
            .expect("parse");
        let attendance = value
            .as_array()
            .and_then(|all| all.iter().find(|entry| entry["name"] == "attendance"))
            .expect("attendance listed");
        assert_eq!(attendance["flags"][0], json!({"name": "late", "label": "Only late arrivals"}));
    }

    #[tokio::test]
    async fn table_distinguishes_empty_from_error() {
        let server = MockServer::start_async().await;
        let mut ok = server.mock(|when, then| {
            when.method(GET).path("/prospects");
            then.status(200).json_body(json!({"data": []}));
        });
        let ctx = context_for(&server, Some("tok"));
        let profile = screens::find("prospects").expect("profile");
        let screen = profile.open(ctx.api.clone(), PageRequest::default());
        screen.mount().await;
        let empty = screen_table(&profile, &screen);
        assert!(empty.contains("no records"));
        assert!(!empty.contains("error:"));

        ok.delete();
        server.mock(|when, then| {
            when.method(GET).path("/prospects");
            then.status(500).json_body(json!({"message": "database unavailable"}));
        });
        screen.refetch().await;
        let failed = screen_table(&profile, &screen);
        assert!(failed.contains("error: ") && failed.contains("database unavailable"));
        assert!(failed.contains("retry"));
        assert!(!failed.contains("no records"));
    }

    #[tokio::test]
    async fn json_reports_one_based_page_and_rows() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/employees");
            then.status(200).json_body(json!({
                "data": {"data": [{"id": 11, "name": "Kay"}], "total": 21, "current_page": 2}
            }));
        });
        let ctx = context_for(&server, Some("tok"));
        let profile = screens::find("employees").expect("profile");
        let screen = profile.open(
            ctx.api.clone(),
            PageRequest::new(PageIndex::new(1), PageSize::new(10)),
        );
        screen.mount().await;
        screen.selection().select([EntityId::from(11)]);

        let text = screen_json(&profile, &screen).expect("json");
        let value: Value = serde_json::from_str(&text).expect("parse");
        assert_eq!(value["page"], 2);
        assert_eq!(value["page_count"], 3);
        assert_eq!(value["total"], 21);
        assert_eq!(value["rows"][0]["name"], "Kay");
        assert_eq!(value["selected"], json!(["11"]));
        assert!(value.get("error").is_none());

        let table = screen_table(&profile, &screen);
        assert!(table.contains("Employees: page 2/3 | 21 total | 1 selected"));
        assert!(table.contains("* 11"));
    }
}
