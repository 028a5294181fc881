//! `ls` and `screens`.

use anyhow::anyhow;
use ledgerdesk_grid::entity::Record;
use ledgerdesk_grid::filter::{DateRange, FilterState};
use ledgerdesk_grid::paging::{ApiPage, PageRequest, PageSize};
use ledgerdesk_grid::screen::Screen;
use ledgerdesk_grid::store::LoadOutcome;

use crate::cli::{ListArgs, ListOptions, OutputFormat};
use crate::client::{AppContext, CliError, CliResult};
use crate::output::{render_profiles, render_screen};
use crate::screens::{self, ScreenProfile};

pub(crate) async fn handle_list(
    ctx: &AppContext,
    args: ListArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let profile = screens::find(&args.screen)?;
    let screen = open_screen(ctx, &profile, &args.options)?;
    load_page(&screen).await?;
    render_screen(&profile, &screen, format)
}

pub(crate) fn handle_screens(format: OutputFormat) -> CliResult<()> {
    render_profiles(&screens::profiles(), format)
}

/// Build a screen for the requested page with local filters applied.
pub(crate) fn open_screen(
    ctx: &AppContext,
    profile: &ScreenProfile,
    options: &ListOptions,
) -> CliResult<Screen<Record>> {
    let request = page_request(options)?;
    let filter = filter_state(profile, options)?;
    let screen = profile.open(ctx.api.clone(), request);
    screen.set_filter(filter);
    Ok(screen)
}

/// Fetch the screen's first page, turning failures into CLI errors.
pub(crate) async fn load_page(screen: &Screen<Record>) -> CliResult<()> {
    let requested = screen.request().index;
    match screen.mount().await {
        LoadOutcome::Loaded {
            index,
            index_corrected,
            ..
        } => {
            if index_corrected {
                eprintln!(
                    "note: page {} is out of range; showing page {}",
                    requested.to_api().get(),
                    index.to_api().get()
                );
            }
            Ok(())
        }
        LoadOutcome::Failed(err) => Err(CliError::from(err)),
        LoadOutcome::Stale | LoadOutcome::Detached => Err(CliError::failure(anyhow!(
            "load of {} was interrupted",
            screen.endpoint()
        ))),
    }
}

fn page_request(options: &ListOptions) -> CliResult<PageRequest> {
    if options.page == 0 {
        return Err(CliError::validation("--page starts at 1"));
    }
    let size = match options.page_size {
        Some(0) => return Err(CliError::validation("--page-size must be at least 1")),
        Some(size) => PageSize::new(size),
        None => PageSize::default(),
    };
    if options.page_size.is_some_and(|requested| requested != size.get()) {
        eprintln!("note: page size clamped to {}", size.get());
    }
    let mut request = PageRequest::new(ApiPage::new(options.page).to_index(), size);
    for param in &options.params {
        if !request.query.set(param.key.as_str(), param.value.as_str()) {
            return Err(CliError::validation(format!(
                "--param {} is reserved; use --page or --page-size",
                param.key
            )));
        }
    }
    Ok(request)
}

fn filter_state(profile: &ScreenProfile, options: &ListOptions) -> CliResult<FilterState> {
    let mut state = FilterState {
        query: options.search.clone().unwrap_or_default(),
        date_range: DateRange {
            from: options.from,
            to: options.to,
        },
        ..FilterState::default()
    };
    if let (Some(from), Some(to)) = (options.from, options.to)
        && from > to
    {
        return Err(CliError::validation("--from must not be after --to"));
    }
    if !state.date_range.is_open() && profile.schema.date_field_path().is_none() {
        return Err(CliError::validation(format!(
            "screen '{}' has no date field to filter on",
            profile.name
        )));
    }
    for category in &options.categories {
        if !profile.schema.has_category(&category.key) {
            return Err(CliError::validation(format!(
                "unknown --where field '{}' for screen '{}' (available: {})",
                category.key,
                profile.name,
                or_none(&profile.schema.categories().join(", "))
            )));
        }
        state.accept(category.key.as_str(), category.value.as_str());
    }
    for flag in &options.flags {
        if profile.schema.find_flag(flag).is_none() {
            let known: Vec<&str> = profile
                .schema
                .flags()
                .iter()
                .map(|flag| flag.name.as_str())
                .collect();
            return Err(CliError::validation(format!(
                "unknown flag '{flag}' for screen '{}' (available: {})",
                profile.name,
                or_none(&known.join(", "))
            )));
        }
        state.flags.insert(flag.clone());
    }
    Ok(state)
}

fn or_none(list: &str) -> &str {
    if list.is_empty() { "none" } else { list }
}
