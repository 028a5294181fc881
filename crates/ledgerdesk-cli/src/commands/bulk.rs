//! `bulk`: select rows on a page and run one of the screen's bulk actions.

use anyhow::anyhow;
use ledgerdesk_grid::entity::EntityId;
use ledgerdesk_grid::error::ErrorKind;
use ledgerdesk_grid::selection::{BulkEndpoint, BulkOutcome};

use crate::cli::{BulkArgs, OutputFormat};
use crate::client::{AppContext, CliError, CliResult};
use crate::commands::list::{load_page, open_screen};
use crate::output::render_screen;
use crate::screens;

pub(crate) async fn handle_bulk(
    ctx: &AppContext,
    args: BulkArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let profile = screens::find(&args.screen)?;
    let action = profile.action(&args.action)?;
    let requested: Vec<EntityId> = args
        .ids
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .map(EntityId::from)
        .collect();
    if requested.is_empty() {
        return Err(CliError::validation("--ids must name at least one row"));
    }

    let screen = open_screen(ctx, &profile, &args.options)?;
    load_page(&screen).await?;

    let selection = screen.selection();
    selection.select(requested.iter().cloned());
    let skipped = selection.prune(&screen.page_ids());
    if skipped > 0 {
        eprintln!("warning: {skipped} id(s) are not on this page and were skipped");
    }

    let endpoint = BulkEndpoint::new(action.endpoint);
    match screen.run_bulk(&endpoint, |ids| action.payload(ids)).await {
        Ok(BulkOutcome::Completed { affected, .. }) => {
            eprintln!("{}: applied to {affected} row(s)", action.name);
            render_screen(&profile, &screen, format)
        }
        Ok(BulkOutcome::Skipped) => Err(CliError::validation(
            "none of the given ids are on the selected page",
        )),
        Ok(BulkOutcome::Detached) => Err(CliError::failure(anyhow!(
            "bulk action was interrupted"
        ))),
        Err(err) => match err.source.kind() {
            ErrorKind::NetworkOrServer => Err(CliError::failure(err)),
            ErrorKind::Unauthenticated | ErrorKind::SessionInvalid => {
                Err(CliError::from(err.source))
            }
        },
    }
}
